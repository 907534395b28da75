/// Number of parser worker threads
pub const WORKER_THREADS: usize = 16;

/// Raw pages wrapped into one chunk before it is queued
pub const PAGES_PER_CHUNK: usize = 400;

/// Input queue capacity in chunks; the reader blocks while it is full
pub const INPUT_QUEUE_CAPACITY: usize = 5;

/// Progress display refresh interval in milliseconds
pub const RENDER_INTERVAL_MS: u64 = 500;

/// Rolling window for the processing-rate estimate, in seconds
pub const RATE_WINDOW_SECS: u64 = 30;

/// Node CSV output file name
pub const NODES_FILE: &str = "nodes.csv";

/// Link CSV output file name
pub const LINKS_FILE: &str = "links.csv";
