//! Single-consumer CSV writer stage.
//!
//! Serializes page batches into the node and link sinks. One thread owns both
//! files for the whole run, so no other synchronization is needed on the
//! output side. Flushes once per batch, not per row.

use crate::config::{LINKS_FILE, NODES_FILE};
use crate::models::PageBatch;
use crate::queue::WorkQueue;
use crate::stats::PipelineStats;
use anyhow::{Context, Result};
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

const CSV_BUF_SIZE: usize = 128 * 1024;

/// Relationship type tag emitted on every link row.
const LINK_TYPE: &str = "LINK";

/// The two CSV output sinks, created fresh (truncating any prior run's
/// output) with their neo4j-admin import headers already written.
pub struct CsvSinks {
    nodes: csv::Writer<BufWriter<File>>,
    links: csv::Writer<BufWriter<File>>,
}

impl CsvSinks {
    pub fn create(output_dir: &Path) -> Result<Self> {
        let nodes_path = output_dir.join(NODES_FILE);
        let links_path = output_dir.join(LINKS_FILE);

        // Stale outputs from a prior run are removed up front.
        let _ = fs::remove_file(&nodes_path);
        let _ = fs::remove_file(&links_path);

        let mut nodes = csv::Writer::from_writer(BufWriter::with_capacity(
            CSV_BUF_SIZE,
            File::create(&nodes_path)
                .with_context(|| format!("Failed to create {}", nodes_path.display()))?,
        ));
        let mut links = csv::Writer::from_writer(BufWriter::with_capacity(
            CSV_BUF_SIZE,
            File::create(&links_path)
                .with_context(|| format!("Failed to create {}", links_path.display()))?,
        ));

        nodes
            .write_record(["pageName:ID", "title", ":LABEL"])
            .context("Failed to write node header")?;
        links
            .write_record([":START_ID", ":END_ID", ":TYPE"])
            .context("Failed to write link header")?;
        nodes.flush()?;
        links.flush()?;

        Ok(Self { nodes, links })
    }

    /// Writes one batch: a link row per outbound target and exactly one node
    /// row per page. Pages with an empty title are dropped, they cannot key
    /// a node.
    fn write_batch(&mut self, batch: &PageBatch, stats: &PipelineStats) -> Result<()> {
        for page in batch {
            if page.title.is_empty() {
                continue;
            }

            for target in &page.links {
                self.links
                    .write_record([page.title.as_str(), target.as_str(), LINK_TYPE])?;
            }
            stats.add_links(page.links.len() as u64);

            let label = if page.redirect { "REDIRECT" } else { "PAGE" };
            self.nodes
                .write_record([page.title.as_str(), page.display_title.as_str(), label])?;
            stats.inc_nodes();
            if page.redirect {
                stats.inc_redirects();
            }
        }

        self.nodes.flush()?;
        self.links.flush()?;
        Ok(())
    }
}

/// Spawns the writer thread. Termination mirrors the worker pool: keep-alive
/// cleared plus queue closed, with buffered batches drained first.
pub fn spawn_writer(
    queue: Arc<WorkQueue<PageBatch>>,
    sinks: CsvSinks,
    keep_alive: Arc<AtomicBool>,
    stats: Arc<PipelineStats>,
) -> Result<JoinHandle<Result<()>>> {
    thread::Builder::new()
        .name("csv-writer".into())
        .spawn(move || writer_loop(&queue, sinks, &keep_alive, &stats))
        .context("Failed to spawn CSV writer")
}

fn writer_loop(
    queue: &WorkQueue<PageBatch>,
    mut sinks: CsvSinks,
    keep_alive: &AtomicBool,
    stats: &PipelineStats,
) -> Result<()> {
    while keep_alive.load(Ordering::Acquire) || !queue.is_empty() {
        let Some(batch) = queue.pop() else {
            break;
        };
        if let Err(e) = sinks.write_batch(&batch, stats) {
            // Unblock the workers; the error surfaces at join.
            queue.close();
            return Err(e).context("Failed to write CSV batch");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::WikiPage;
    use tempfile::TempDir;

    fn page(title: &str, display: &str, links: &[&str], redirect: bool) -> WikiPage {
        WikiPage {
            title: title.to_string(),
            display_title: display.to_string(),
            links: links.iter().map(|s| s.to_string()).collect(),
            redirect,
        }
    }

    fn read_lines(path: &Path) -> Vec<String> {
        fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn writes_headers_on_create() {
        let dir = TempDir::new().unwrap();
        CsvSinks::create(dir.path()).unwrap();

        let nodes = read_lines(&dir.path().join(NODES_FILE));
        let links = read_lines(&dir.path().join(LINKS_FILE));
        assert_eq!(nodes, vec!["pageName:ID,title,:LABEL"]);
        assert_eq!(links, vec![":START_ID,:END_ID,:TYPE"]);
    }

    #[test]
    fn writes_node_and_link_rows() {
        let dir = TempDir::new().unwrap();
        let mut sinks = CsvSinks::create(dir.path()).unwrap();
        let stats = PipelineStats::new();

        let batch = vec![
            page("rust", "Rust", &["mozilla", "c++"], false),
            page("ferris", "Ferris", &[], true),
            page("", "", &["dropped"], false),
        ];
        sinks.write_batch(&batch, &stats).unwrap();

        let nodes = read_lines(&dir.path().join(NODES_FILE));
        assert_eq!(nodes.len(), 3);
        assert_eq!(nodes[1], "rust,Rust,PAGE");
        assert_eq!(nodes[2], "ferris,Ferris,REDIRECT");

        let links = read_lines(&dir.path().join(LINKS_FILE));
        assert_eq!(links.len(), 3);
        assert_eq!(links[1], "rust,mozilla,LINK");
        assert_eq!(links[2], "rust,c++,LINK");

        assert_eq!(stats.nodes(), 2);
        assert_eq!(stats.redirects(), 1);
        assert_eq!(stats.links(), 2);
    }

    #[test]
    fn fields_with_delimiters_are_quoted() {
        let dir = TempDir::new().unwrap();
        let mut sinks = CsvSinks::create(dir.path()).unwrap();
        let stats = PipelineStats::new();

        let batch = vec![page("a, b", "A, b \"quoted\"", &[], false)];
        sinks.write_batch(&batch, &stats).unwrap();

        let nodes = read_lines(&dir.path().join(NODES_FILE));
        assert_eq!(nodes[1], r#""a, b","A, b ""quoted""",PAGE"#);
    }

    #[test]
    fn create_truncates_previous_run() {
        let dir = TempDir::new().unwrap();
        {
            let mut sinks = CsvSinks::create(dir.path()).unwrap();
            let stats = PipelineStats::new();
            sinks
                .write_batch(&vec![page("old", "Old", &[], false)], &stats)
                .unwrap();
        }

        CsvSinks::create(dir.path()).unwrap();
        let nodes = read_lines(&dir.path().join(NODES_FILE));
        assert_eq!(nodes.len(), 1, "only the header should remain");
    }

    #[test]
    fn writer_thread_drains_queue_on_shutdown() {
        let dir = TempDir::new().unwrap();
        let sinks = CsvSinks::create(dir.path()).unwrap();
        let queue = Arc::new(WorkQueue::unbounded());
        let keep_alive = Arc::new(AtomicBool::new(true));
        let stats = Arc::new(PipelineStats::new());

        for i in 0..5 {
            queue.push(vec![page(&format!("p{i}"), "P", &["t"], false)]);
        }

        let handle = spawn_writer(
            Arc::clone(&queue),
            sinks,
            Arc::clone(&keep_alive),
            Arc::clone(&stats),
        )
        .unwrap();

        keep_alive.store(false, Ordering::Release);
        queue.close();
        handle.join().unwrap().unwrap();

        assert_eq!(stats.nodes(), 5);
        assert_eq!(stats.links(), 5);
        let nodes = read_lines(&dir.path().join(NODES_FILE));
        assert_eq!(nodes.len(), 6);
    }
}
