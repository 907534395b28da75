//! Pipeline orchestration: wiring, thread lifetimes, shutdown order.
//!
//! The orchestrator owns every piece of shared state (queues, keep-alive
//! flags, progress, stats) and hands stages `Arc` handles. Shutdown is
//! cooperative and drain-based: per stage, clear the keep-alive flag, close
//! the feeding queue, then join. The queue's drain-before-close guarantee is
//! what makes the order safe even when a stage observes the flag slightly
//! before the close.

use crate::config;
use crate::progress::{ProgressRenderer, ProgressState};
use crate::queue::WorkQueue;
use crate::reader::{ChunkReader, PageCursor};
use crate::stats::PipelineStats;
use crate::workers::spawn_workers;
use crate::writer::{spawn_writer, CsvSinks};
use anyhow::{anyhow, Result};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

pub struct PipelineOptions {
    pub threads: usize,
    pub pages_per_chunk: usize,
    pub queue_capacity: usize,
    pub show_progress: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            threads: config::WORKER_THREADS,
            pages_per_chunk: config::PAGES_PER_CHUNK,
            queue_capacity: config::INPUT_QUEUE_CAPACITY,
            show_progress: true,
        }
    }
}

pub struct PipelineSummary {
    pub pages_read: u64,
    pub chunks: u64,
    pub nodes: u64,
    pub redirects: u64,
    pub links: u64,
    pub final_rate: f64,
}

/// Runs the full extraction: dump at `input`, CSV files into `output_dir`.
///
/// The reader runs on the calling thread; workers, the writer and the
/// renderer get their own. Any stage failure shuts the rest down cleanly and
/// the first error is returned.
pub fn run_pipeline(
    input: &Path,
    output_dir: &Path,
    opts: &PipelineOptions,
) -> Result<PipelineSummary> {
    let cursor = PageCursor::open(input)?;
    let sinks = CsvSinks::create(output_dir)?;

    let input_queue = Arc::new(WorkQueue::bounded(opts.queue_capacity));
    let output_queue = Arc::new(WorkQueue::unbounded());
    let process_keep_alive = Arc::new(AtomicBool::new(true));
    let writer_keep_alive = Arc::new(AtomicBool::new(true));
    let progress = Arc::new(ProgressState::new());
    let stats = Arc::new(PipelineStats::new());

    info!(
        threads = opts.threads,
        pages_per_chunk = opts.pages_per_chunk,
        "Starting extraction pipeline"
    );

    let workers = spawn_workers(
        opts.threads,
        Arc::clone(&input_queue),
        Arc::clone(&output_queue),
        Arc::clone(&process_keep_alive),
        Arc::clone(&stats),
    )?;
    let writer = spawn_writer(
        Arc::clone(&output_queue),
        sinks,
        Arc::clone(&writer_keep_alive),
        Arc::clone(&stats),
    )?;
    let renderer = if opts.show_progress {
        Some(ProgressRenderer::spawn(Arc::clone(&progress))?)
    } else {
        None
    };

    let reader = ChunkReader::new(
        cursor,
        Arc::clone(&input_queue),
        Arc::clone(&progress),
        opts.pages_per_chunk,
    );
    let reader_result = reader.run();

    // Workers first: stop signal, then close, then join.
    process_keep_alive.store(false, Ordering::Release);
    input_queue.close();
    let mut first_worker_error = None;
    for handle in workers {
        let result = handle
            .join()
            .unwrap_or_else(|_| Err(anyhow!("parser worker panicked")));
        if let Err(e) = result {
            first_worker_error.get_or_insert(e);
        }
    }

    // Then the writer, once no worker can push another batch.
    writer_keep_alive.store(false, Ordering::Release);
    output_queue.close();
    let writer_result = writer
        .join()
        .unwrap_or_else(|_| Err(anyhow!("CSV writer panicked")));

    if let Some(renderer) = renderer {
        renderer.finish();
    }

    let pages_read = reader_result?;
    if let Some(e) = first_worker_error {
        return Err(e);
    }
    writer_result?;

    info!(
        pages = pages_read,
        nodes = stats.nodes(),
        links = stats.links(),
        "Extraction pipeline complete"
    );

    Ok(PipelineSummary {
        pages_read,
        chunks: stats.chunks(),
        nodes: stats.nodes(),
        redirects: stats.redirects(),
        links: stats.links(),
        final_rate: progress.rate(),
    })
}
