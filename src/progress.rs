//! Concurrency-safe progress telemetry and the terminal renderer.
//!
//! [`ProgressState`] is written by the reader thread (count + file
//! percentage) and read by the render loop; the rolling rate window smooths
//! the throughput estimate over the last 30 seconds. The renderer thread is
//! the sole writer to stdout while it runs; everything else in the process
//! logs to stderr.

use crate::config::{RATE_WINDOW_SECS, RENDER_INTERVAL_MS};
use anyhow::{Context, Result};
use crossterm::cursor::MoveUp;
use crossterm::terminal::{Clear, ClearType};
use crossterm::QueueableCommand;
use std::collections::VecDeque;
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Sentinel for "file progress unknown" (compressed input, or not yet set).
const UNKNOWN_PROGRESS: f64 = -1.0;

/// Inner box width of the progress display.
const BOX_WIDTH: usize = 38;
/// Lines rewritten on every refresh: five body rows plus the bottom border.
const REDRAW_LINES: u16 = 6;

struct RateWindow {
    samples: VecDeque<(Instant, u64)>,
    rate: f64,
}

/// Shared progress counters. Created by the orchestrator, written by the
/// reader, read by the renderer.
pub struct ProgressState {
    processed: AtomicU64,
    file_pct_bits: AtomicU64,
    started: Instant,
    window: Mutex<RateWindow>,
}

impl ProgressState {
    pub fn new() -> Self {
        Self {
            processed: AtomicU64::new(0),
            file_pct_bits: AtomicU64::new(UNKNOWN_PROGRESS.to_bits()),
            started: Instant::now(),
            window: Mutex::new(RateWindow {
                samples: VecDeque::new(),
                rate: 0.0,
            }),
        }
    }

    /// Counts one processed page and folds a sample into the rate window.
    pub fn increment(&self) {
        let count = self.processed.fetch_add(1, Ordering::Relaxed) + 1;
        let mut window = self.window.lock().expect("rate window mutex poisoned");
        record_sample(
            &mut window,
            Instant::now(),
            count,
            Duration::from_secs(RATE_WINDOW_SECS),
        );
    }

    /// Updates the file-completion percentage. Values outside `[0, 100]` are
    /// ignored outright, not clamped.
    pub fn set_file_progress(&self, percentage: f64) {
        if (0.0..=100.0).contains(&percentage) {
            self.file_pct_bits
                .store(percentage.to_bits(), Ordering::Relaxed);
        }
    }

    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    /// Smoothed pages-per-second over the rolling window. Holds its last
    /// value when the window has fewer than two samples.
    pub fn rate(&self) -> f64 {
        self.window.lock().expect("rate window mutex poisoned").rate
    }

    /// `None` until a percentage has been reported.
    pub fn file_progress(&self) -> Option<f64> {
        let pct = f64::from_bits(self.file_pct_bits.load(Ordering::Relaxed));
        (pct >= 0.0).then_some(pct)
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

impl Default for ProgressState {
    fn default() -> Self {
        Self::new()
    }
}

/// Appends a `(now, count)` sample, evicts samples older than `max_age`, and
/// recomputes the rate when at least two samples remain. With fewer samples
/// the previous rate is retained unchanged.
fn record_sample(window: &mut RateWindow, now: Instant, count: u64, max_age: Duration) {
    window.samples.push_back((now, count));
    while let Some(&(oldest, _)) = window.samples.front() {
        if now.duration_since(oldest) > max_age {
            window.samples.pop_front();
        } else {
            break;
        }
    }

    if window.samples.len() >= 2 {
        let (t0, c0) = window.samples[0];
        let (t1, c1) = window.samples[window.samples.len() - 1];
        let dt = t1.duration_since(t0).as_secs_f64();
        if dt > 0.0 {
            window.rate = (c1 - c0) as f64 / dt;
        }
    }
}

/// Handle to the render thread. Dropping without [`finish`] leaves the loop
/// running; the orchestrator always finishes it.
///
/// [`finish`]: ProgressRenderer::finish
pub struct ProgressRenderer {
    running: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl ProgressRenderer {
    /// Spawns the render loop on its own thread. From here until `finish`
    /// returns, the renderer owns stdout exclusively.
    pub fn spawn(state: Arc<ProgressState>) -> Result<Self> {
        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);
        let handle = thread::Builder::new()
            .name("progress-render".into())
            .spawn(move || render_loop(&state, &flag))
            .context("Failed to spawn progress renderer")?;
        Ok(Self { running, handle })
    }

    /// Stops the loop; the thread paints exactly one final completed frame
    /// before exiting, then the join returns.
    pub fn finish(self) {
        self.running.store(false, Ordering::Release);
        let _ = self.handle.join();
    }
}

fn render_loop(state: &ProgressState, running: &AtomicBool) {
    let mut out = io::stdout();
    if draw_static_frame(&mut out).is_err() {
        return;
    }

    while running.load(Ordering::Acquire) {
        thread::sleep(Duration::from_millis(RENDER_INTERVAL_MS));
        if render_frame(&mut out, state).is_err() {
            return;
        }
    }

    let _ = render_final(&mut out, state);
}

fn draw_static_frame(out: &mut impl Write) -> io::Result<()> {
    writeln!(out, "┌{}┐", "─".repeat(BOX_WIDTH))?;
    writeln!(out, "│{:^width$}│", "Wikipedia Graph Extractor", width = BOX_WIDTH)?;
    writeln!(out, "├{}┤", "─".repeat(BOX_WIDTH))?;
    for _ in 0..5 {
        writeln!(out, "│{}│", " ".repeat(BOX_WIDTH))?;
    }
    writeln!(out, "└{}┘", "─".repeat(BOX_WIDTH))?;
    out.flush()
}

fn write_body_line(out: &mut impl Write, label: &str, value: &str) -> io::Result<()> {
    out.queue(Clear(ClearType::CurrentLine))?;
    writeln!(out, "│ {:<17}{:<19} │", label, value)
}

fn render_frame(out: &mut impl Write, state: &ProgressState) -> io::Result<()> {
    let count = state.processed();
    let rate = state.rate();
    let elapsed = state.elapsed();

    out.queue(MoveUp(REDRAW_LINES))?;
    write_body_line(out, "Pages processed:", &count.to_string())?;
    write_body_line(out, "Processing rate:", &format_rate(rate))?;
    write_body_line(out, "Elapsed time:", &format_duration(elapsed))?;
    match state.file_progress() {
        Some(pct) => {
            write_body_line(out, "File progress:", &format!("{:.1}%", pct))?;
            write_body_line(out, "Est. remaining:", &estimate_remaining(elapsed, pct))?;
        }
        None => {
            write_body_line(out, "File progress:", "unknown")?;
            write_body_line(out, "Est. remaining:", "unknown")?;
        }
    }
    writeln!(out, "└{}┘", "─".repeat(BOX_WIDTH))?;
    out.flush()
}

fn render_final(out: &mut impl Write, state: &ProgressState) -> io::Result<()> {
    let count = state.processed();
    let elapsed = state.elapsed();
    let rate = state.rate();

    out.queue(MoveUp(REDRAW_LINES))?;
    write_body_line(out, "Status:", "COMPLETED!")?;
    write_body_line(out, "Total processed:", &count.to_string())?;
    write_body_line(out, "Total time:", &format_duration(elapsed))?;
    write_body_line(out, "Final rate:", &format_rate(rate))?;
    write_body_line(out, "", "")?;
    writeln!(out, "└{}┘", "─".repeat(BOX_WIDTH))?;
    writeln!(out)?;
    writeln!(out, "Processing complete!")?;
    out.flush()
}

/// Linear extrapolation from elapsed time and completion percentage. Only
/// meaningful strictly inside (0.1, 99.9); the edges divide by almost
/// nothing or chase rounding noise.
fn estimate_remaining(elapsed: Duration, pct: f64) -> String {
    if pct > 0.1 && pct < 99.9 {
        let elapsed_secs = elapsed.as_secs_f64();
        let estimated_total = elapsed_secs / (pct / 100.0);
        let remaining = (estimated_total - elapsed_secs).max(0.0);
        format_duration(Duration::from_secs(remaining as u64))
    } else {
        "calculating...".to_string()
    }
}

fn format_rate(rate: f64) -> String {
    if rate >= 1000.0 {
        format!("{:.1}k pages/s", rate / 1000.0)
    } else if rate >= 1.0 {
        format!("{:.1} pages/s", rate)
    } else if rate > 0.0 {
        format!("{:.1} pages/min", rate * 60.0)
    } else {
        "calculating...".to_string()
    }
}

fn format_duration(duration: Duration) -> String {
    let total = duration.as_secs();
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window() -> RateWindow {
        RateWindow {
            samples: VecDeque::new(),
            rate: 0.0,
        }
    }

    #[test]
    fn rate_converges_on_steady_increments() {
        let mut w = window();
        let base = Instant::now();
        let max_age = Duration::from_secs(30);

        for i in 0..10u64 {
            record_sample(&mut w, base + Duration::from_secs(i), i * 10, max_age);
        }

        // 90 pages over 9 seconds.
        assert!((w.rate - 10.0).abs() < 1e-9);
    }

    #[test]
    fn stale_samples_are_evicted_from_window() {
        let mut w = window();
        let base = Instant::now();
        let max_age = Duration::from_secs(30);

        record_sample(&mut w, base, 0, max_age);
        record_sample(&mut w, base + Duration::from_secs(10), 100, max_age);
        // 50 seconds in: both earlier samples fall out of the window.
        record_sample(&mut w, base + Duration::from_secs(50), 200, max_age);

        assert_eq!(w.samples.len(), 1);
    }

    #[test]
    fn sparse_window_retains_previous_rate() {
        let mut w = window();
        let base = Instant::now();
        let max_age = Duration::from_secs(30);

        record_sample(&mut w, base, 0, max_age);
        record_sample(&mut w, base + Duration::from_secs(1), 10, max_age);
        assert!((w.rate - 10.0).abs() < 1e-9);

        // The next sample evicts everything older, leaving a single sample;
        // the rate must hold rather than reset to zero.
        record_sample(&mut w, base + Duration::from_secs(60), 20, max_age);
        assert_eq!(w.samples.len(), 1);
        assert!((w.rate - 10.0).abs() < 1e-9);
    }

    #[test]
    fn zero_time_span_does_not_divide() {
        let mut w = window();
        let base = Instant::now();
        let max_age = Duration::from_secs(30);

        record_sample(&mut w, base, 0, max_age);
        record_sample(&mut w, base, 100, max_age);
        assert_eq!(w.rate, 0.0);
    }

    #[test]
    fn increment_advances_count() {
        let state = ProgressState::new();
        assert_eq!(state.processed(), 0);
        state.increment();
        state.increment();
        assert_eq!(state.processed(), 2);
    }

    #[test]
    fn file_progress_starts_unknown() {
        let state = ProgressState::new();
        assert_eq!(state.file_progress(), None);
    }

    #[test]
    fn file_progress_rejects_out_of_range_values() {
        let state = ProgressState::new();
        state.set_file_progress(42.5);
        assert_eq!(state.file_progress(), Some(42.5));

        // Out-of-range updates are dropped, not clamped.
        state.set_file_progress(100.1);
        assert_eq!(state.file_progress(), Some(42.5));
        state.set_file_progress(-3.0);
        assert_eq!(state.file_progress(), Some(42.5));

        state.set_file_progress(100.0);
        assert_eq!(state.file_progress(), Some(100.0));
    }

    #[test]
    fn remaining_estimate_only_inside_confidence_band() {
        let elapsed = Duration::from_secs(100);
        assert_eq!(estimate_remaining(elapsed, 0.05), "calculating...");
        assert_eq!(estimate_remaining(elapsed, 99.95), "calculating...");
        // At 50% after 100s, another ~100s remain.
        assert_eq!(estimate_remaining(elapsed, 50.0), "1m 40s");
    }

    #[test]
    fn rate_formatting_tiers() {
        assert_eq!(format_rate(2500.0), "2.5k pages/s");
        assert_eq!(format_rate(12.34), "12.3 pages/s");
        assert_eq!(format_rate(0.5), "30.0 pages/min");
        assert_eq!(format_rate(0.0), "calculating...");
    }

    #[test]
    fn duration_formatting_tiers() {
        assert_eq!(format_duration(Duration::from_secs(5)), "5s");
        assert_eq!(format_duration(Duration::from_secs(65)), "1m 5s");
        assert_eq!(format_duration(Duration::from_secs(3725)), "1h 2m 5s");
    }
}
