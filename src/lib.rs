//! Ariadne: threaded Wikipedia dump extraction into graph CSV files
//!
//! This crate turns a Wikipedia XML dump into two flat CSV files ready for
//! `neo4j-admin` bulk import -- a node file classifying every page as PAGE or
//! REDIRECT, and a link file with one row per outbound wikilink -- through a
//! fixed concurrent pipeline:
//!
//! ```text
//! ChunkReader -> input queue -> worker pool (xN) -> output queue -> CSV writer
//!                    |
//!               ProgressState <- renderer thread
//! ```
//!
//! # Architecture
//!
//! - **Streaming XML traversal** -- The dump is never held in memory; a
//!   `quick-xml` cursor yields one `<page>` at a time, with transparent BZ2
//!   decompression
//! - **Chunked fan-out** -- Pages are wrapped 400 at a time into
//!   self-contained `<mediawiki>` chunks so workers parse independently
//! - **Bounded hand-off** -- The input queue enforces a capacity, so the
//!   reader blocks instead of outrunning the pool
//! - **Drain-based shutdown** -- Queues deliver everything buffered before
//!   reporting end-of-stream; stages are joined in pipeline order and no
//!   work is lost or duplicated
//! - **Live telemetry** -- Atomic counters feed a 30-second rolling rate
//!   window rendered in place on a fixed-interval loop
//!
//! # Key Modules
//!
//! - [`queue`] -- Thread-safe FIFO with close-then-drain semantics
//! - [`reader`] -- Streaming page cursor and chunk assembly
//! - [`parser`] -- Chunk XML into [`models::WikiPage`] batches
//! - [`workers`] -- Parser worker pool
//! - [`writer`] -- Single-consumer CSV output stage
//! - [`progress`] -- Shared progress state and terminal renderer
//! - [`extract`] -- Orchestration and shutdown sequencing
//! - [`stats`] -- Thread-safe counters for the run summary
//! - [`config`] -- Pipeline tuning constants
//!
//! # Example Usage
//!
//! ```bash
//! ariadne enwiki-latest-pages-articles.xml.bz2 -o output/
//! ```

pub mod config;
pub mod extract;
pub mod models;
pub mod parser;
pub mod progress;
pub mod queue;
pub mod reader;
pub mod stats;
pub mod workers;
pub mod writer;
