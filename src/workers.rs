//! Fan-out worker pool: chunks in, page batches out.

use crate::models::PageBatch;
use crate::parser;
use crate::queue::WorkQueue;
use crate::stats::PipelineStats;
use anyhow::{Context, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::debug;

/// Spawns `count` parser workers. Each worker keeps iterating while the
/// keep-alive flag is set or chunks remain buffered, so nothing queued before
/// shutdown is lost.
pub fn spawn_workers(
    count: usize,
    input: Arc<WorkQueue<String>>,
    output: Arc<WorkQueue<PageBatch>>,
    keep_alive: Arc<AtomicBool>,
    stats: Arc<PipelineStats>,
) -> Result<Vec<JoinHandle<Result<()>>>> {
    (0..count)
        .map(|i| {
            let input = Arc::clone(&input);
            let output = Arc::clone(&output);
            let keep_alive = Arc::clone(&keep_alive);
            let stats = Arc::clone(&stats);
            thread::Builder::new()
                .name(format!("parse-worker-{i}"))
                .spawn(move || worker_loop(&input, &output, &keep_alive, &stats))
                .context("Failed to spawn parser worker")
        })
        .collect()
}

fn worker_loop(
    input: &WorkQueue<String>,
    output: &WorkQueue<PageBatch>,
    keep_alive: &AtomicBool,
    stats: &PipelineStats,
) -> Result<()> {
    while keep_alive.load(Ordering::Acquire) || !input.is_empty() {
        let Some(chunk) = input.pop() else {
            break;
        };

        let batch = match parser::parse_chunk(&chunk) {
            Ok(batch) => batch,
            Err(e) => {
                // Fail fast: closing the input unblocks the reader and lets
                // the rest of the pool drain out; the error surfaces at join.
                input.close();
                return Err(e).context("Failed to parse chunk");
            }
        };

        stats.inc_chunks();
        stats.add_pages(batch.len() as u64);
        debug!(pages = batch.len(), "Chunk parsed");

        if !output.push(batch) {
            // Writer is gone; close the input too so the reader and the rest
            // of the pool are not left blocking on a dead pipeline.
            input.close();
            break;
        }
    }
    Ok(())
}
