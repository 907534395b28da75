use std::sync::atomic::{AtomicU64, Ordering};

/// Statistics collected across the pipeline stages
///
/// Workers and the writer bump these through shared handles; the relaxed
/// ordering is fine because the values are only read after every stage has
/// been joined.
#[derive(Default)]
pub struct PipelineStats {
    pub chunks_parsed: AtomicU64,
    pub pages_parsed: AtomicU64,
    pub nodes_written: AtomicU64,
    pub redirects_found: AtomicU64,
    pub links_written: AtomicU64,
}

impl PipelineStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_chunks(&self) {
        self.chunks_parsed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_pages(&self, count: u64) {
        self.pages_parsed.fetch_add(count, Ordering::Relaxed);
    }

    pub fn inc_nodes(&self) {
        self.nodes_written.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_redirects(&self) {
        self.redirects_found.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_links(&self, count: u64) {
        self.links_written.fetch_add(count, Ordering::Relaxed);
    }

    pub fn chunks(&self) -> u64 {
        self.chunks_parsed.load(Ordering::Relaxed)
    }

    pub fn pages(&self) -> u64 {
        self.pages_parsed.load(Ordering::Relaxed)
    }

    pub fn nodes(&self) -> u64 {
        self.nodes_written.load(Ordering::Relaxed)
    }

    pub fn redirects(&self) -> u64 {
        self.redirects_found.load(Ordering::Relaxed)
    }

    pub fn links(&self) -> u64 {
        self.links_written.load(Ordering::Relaxed)
    }
}
