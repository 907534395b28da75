/// A single page extracted from the dump.
///
/// `title` is the normalized identifying form used for node IDs and link
/// endpoints; `display_title` keeps the page's canonical spelling. `links`
/// holds normalized outbound wikilink targets, duplicates included. Pages
/// move through the output queue by value and are never mutated after parse.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WikiPage {
    pub title: String,
    pub display_title: String,
    pub links: Vec<String>,
    pub redirect: bool,
}

/// Unit of transfer on the output queue: one parsed chunk's worth of pages.
pub type PageBatch = Vec<WikiPage>;
