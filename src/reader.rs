//! Streaming dump traversal and chunk assembly.
//!
//! [`PageCursor`] walks the dump with `quick-xml` without ever holding the
//! whole document, yielding each `<page>` element's raw XML. [`ChunkReader`]
//! batches those pages into self-contained `<mediawiki>` chunks and feeds the
//! input queue; the queue's capacity bound is what throttles the reader when
//! the workers fall behind.

use crate::progress::ProgressState;
use crate::queue::WorkQueue;
use anyhow::{bail, Context, Result};
use bzip2::read::MultiBzDecoder;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;

/// Opening marker making each chunk an independently parseable document.
pub const CHUNK_OPEN: &str = "<mediawiki>\n";
/// Closing marker sealing a chunk.
pub const CHUNK_CLOSE: &str = "</mediawiki>";

const READ_BUF_SIZE: usize = 256 * 1024;

/// Streaming cursor over the dump's top-level `<page>` elements.
///
/// Transparently decompresses `.bz2` input. Tracks cumulative serialized
/// bytes so uncompressed runs can report a completion percentage; for
/// compressed input the on-disk length says nothing about the XML stream, so
/// no percentage is reported.
pub struct PageCursor {
    reader: Reader<Box<dyn BufRead + Send>>,
    buf: Vec<u8>,
    bytes_seen: u64,
    source_len: Option<u64>,
}

impl PageCursor {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open dump file: {}", path.display()))?;
        let metadata = file
            .metadata()
            .with_context(|| format!("Failed to stat dump file: {}", path.display()))?;

        let compressed = path.extension().is_some_and(|ext| ext == "bz2");
        let source: Box<dyn BufRead + Send> = if compressed {
            Box::new(BufReader::with_capacity(
                READ_BUF_SIZE,
                MultiBzDecoder::new(file),
            ))
        } else {
            Box::new(BufReader::with_capacity(READ_BUF_SIZE, file))
        };

        Ok(Self {
            reader: Reader::from_reader(source),
            buf: Vec::with_capacity(4 * 1024),
            bytes_seen: 0,
            source_len: (!compressed).then_some(metadata.len()),
        })
    }

    /// Advances to the next `<page>` element and returns its raw XML, or
    /// `None` once the dump is exhausted.
    pub fn next_page(&mut self) -> Result<Option<String>> {
        loop {
            self.buf.clear();
            let opened = match self
                .reader
                .read_event_into(&mut self.buf)
                .context("XML error while scanning dump")?
            {
                Event::Start(e) if e.name().as_ref() == b"page" => {
                    let mut out = Vec::with_capacity(8 * 1024);
                    write_start(&mut out, &e);
                    out
                }
                Event::Eof => return Ok(None),
                _ => continue,
            };

            let xml = self.capture_page(opened)?;
            self.bytes_seen += xml.len() as u64;
            return Ok(Some(xml));
        }
    }

    /// Consumes events up to the matching `</page>`, re-serializing them
    /// verbatim (text stays in its escaped form, so the chunk re-parses
    /// identically).
    fn capture_page(&mut self, mut out: Vec<u8>) -> Result<String> {
        let mut depth = 1u32;
        while depth > 0 {
            self.buf.clear();
            match self
                .reader
                .read_event_into(&mut self.buf)
                .context("XML error inside <page> element")?
            {
                Event::Start(e) => {
                    if e.name().as_ref() == b"page" {
                        depth += 1;
                    }
                    write_start(&mut out, &e);
                }
                Event::Empty(e) => {
                    out.extend_from_slice(b"<");
                    out.extend_from_slice(&e);
                    out.extend_from_slice(b"/>");
                }
                Event::End(e) => {
                    if e.name().as_ref() == b"page" {
                        depth -= 1;
                    }
                    out.extend_from_slice(b"</");
                    out.extend_from_slice(&e);
                    out.extend_from_slice(b">");
                }
                Event::Text(t) => out.extend_from_slice(&t),
                Event::CData(t) => {
                    out.extend_from_slice(b"<![CDATA[");
                    out.extend_from_slice(&t);
                    out.extend_from_slice(b"]]>");
                }
                Event::Eof => bail!("dump ended inside a <page> element"),
                // Comments, PIs and doctype noise inside a page carry no data.
                _ => {}
            }
        }
        String::from_utf8(out).context("page XML is not valid UTF-8")
    }

    /// Fraction of the source consumed, as a percentage capped at 99.9 until
    /// the run is confirmed complete. `None` when the input is compressed.
    pub fn progress_percent(&self) -> Option<f64> {
        let len = self.source_len?;
        if len == 0 {
            return None;
        }
        Some(((self.bytes_seen as f64 / len as f64) * 100.0).min(99.9))
    }
}

fn write_start(out: &mut Vec<u8>, start: &quick_xml::events::BytesStart<'_>) {
    out.extend_from_slice(b"<");
    out.extend_from_slice(start);
    out.extend_from_slice(b">");
}

/// Feeder stage: batches raw pages into wrapped chunks and pushes them to the
/// input queue, reporting per-page progress.
pub struct ChunkReader {
    cursor: PageCursor,
    queue: Arc<WorkQueue<String>>,
    progress: Arc<ProgressState>,
    pages_per_chunk: usize,
}

impl ChunkReader {
    pub fn new(
        cursor: PageCursor,
        queue: Arc<WorkQueue<String>>,
        progress: Arc<ProgressState>,
        pages_per_chunk: usize,
    ) -> Self {
        Self {
            cursor,
            queue,
            progress,
            pages_per_chunk,
        }
    }

    /// Drives the cursor to exhaustion, flushing a final undersized chunk if
    /// one is pending. Returns the number of pages read. Stops early if the
    /// input queue is closed underneath it (a downstream stage failed).
    pub fn run(mut self) -> Result<u64> {
        let mut chunk = String::from(CHUNK_OPEN);
        let mut pages_in_chunk = 0usize;
        let mut total_pages = 0u64;

        while let Some(page_xml) = self.cursor.next_page()? {
            chunk.push_str(&page_xml);
            chunk.push('\n');
            pages_in_chunk += 1;
            total_pages += 1;

            self.progress.increment();
            if let Some(pct) = self.cursor.progress_percent() {
                self.progress.set_file_progress(pct);
            }

            if pages_in_chunk >= self.pages_per_chunk {
                chunk.push_str(CHUNK_CLOSE);
                if !self.queue.push(chunk) {
                    return Ok(total_pages);
                }
                chunk = String::from(CHUNK_OPEN);
                pages_in_chunk = 0;
            }
        }

        if pages_in_chunk > 0 {
            chunk.push_str(CHUNK_CLOSE);
            self.queue.push(chunk);
        }

        self.progress.set_file_progress(100.0);
        Ok(total_pages)
    }
}
