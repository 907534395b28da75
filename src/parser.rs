//! Chunk parsing: one wrapped `<mediawiki>` chunk into a batch of pages.
//!
//! All parse state lives inside [`parse_chunk`], so nothing can leak from one
//! chunk into the next; workers call it fresh per chunk.

use crate::models::{PageBatch, WikiPage};
use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use quick_xml::events::Event;
use quick_xml::Reader;
use regex::Regex;

/// Matches `[[target]]` and `[[target|label]]` wikilinks, capturing the target.
static LINK_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[\[([^|\]]+?)(?:\|[^\]]+)?\]\]").unwrap());

#[derive(PartialEq)]
enum Capture {
    None,
    Title,
    Text,
}

/// Parses a self-contained chunk of page XML into a batch of [`WikiPage`]s.
///
/// Malformed XML is an error, not a partial result; the pipeline treats it
/// as fatal for the whole run.
pub fn parse_chunk(chunk: &str) -> Result<PageBatch> {
    let mut reader = Reader::from_str(chunk);
    let mut pages = PageBatch::new();

    let mut in_page = false;
    let mut capture = Capture::None;
    let mut raw_title = String::new();
    let mut text = String::new();
    let mut redirect = false;

    loop {
        match reader.read_event().context("malformed XML in chunk")? {
            Event::Start(e) => match e.name().as_ref() {
                b"page" => {
                    in_page = true;
                    raw_title.clear();
                    text.clear();
                    redirect = false;
                }
                b"title" if in_page => capture = Capture::Title,
                b"text" if in_page => capture = Capture::Text,
                b"redirect" if in_page => redirect = true,
                _ => {}
            },
            Event::Empty(e) => {
                if in_page && e.name().as_ref() == b"redirect" {
                    redirect = true;
                }
            }
            Event::Text(t) => {
                if capture != Capture::None {
                    let unescaped = t.unescape().context("invalid text encoding in chunk")?;
                    match capture {
                        Capture::Title => raw_title.push_str(&unescaped),
                        Capture::Text => text.push_str(&unescaped),
                        Capture::None => {}
                    }
                }
            }
            Event::CData(t) => {
                let raw = t.into_inner();
                match capture {
                    Capture::Title => raw_title.push_str(&String::from_utf8_lossy(&raw)),
                    Capture::Text => text.push_str(&String::from_utf8_lossy(&raw)),
                    Capture::None => {}
                }
            }
            Event::End(e) => match e.name().as_ref() {
                b"page" => {
                    pages.push(build_page(&raw_title, &text, redirect));
                    in_page = false;
                }
                b"title" | b"text" => capture = Capture::None,
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(pages)
}

fn build_page(raw_title: &str, text: &str, redirect: bool) -> WikiPage {
    let links = LINK_REGEX
        .captures_iter(text)
        .map(|c| normalize_title(&c[1]))
        .filter(|s| !s.is_empty())
        .collect();

    WikiPage {
        title: normalize_title(raw_title),
        display_title: display_title(raw_title),
        links,
        redirect,
    }
}

/// Identifying form of a title or link target: trimmed, section fragment
/// stripped, lowercased so in-links match case-insensitively.
pub fn normalize_title(raw: &str) -> String {
    let trimmed = raw.trim();
    let base = match trimmed.split_once('#') {
        Some((head, _)) => head.trim_end(),
        None => trimmed,
    };
    base.to_lowercase()
}

/// Canonical display form: trimmed, first character uppercased.
pub fn display_title(raw: &str) -> String {
    let trimmed = raw.trim();
    let mut chars = trimmed.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
