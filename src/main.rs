use anyhow::Result;
use ariadne::config;
use ariadne::extract::{run_pipeline, PipelineOptions};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser)]
#[command(name = "ariadne")]
#[command(about = "Extract a Wikipedia XML dump into graph CSV files")]
struct Cli {
    /// Path to the Wikipedia dump file (.xml or .xml.bz2)
    input: PathBuf,

    /// Output directory for nodes.csv and links.csv
    #[arg(short, long, default_value = ".")]
    output: PathBuf,

    /// Number of parser worker threads
    #[arg(long, default_value_t = config::WORKER_THREADS)]
    threads: usize,

    /// Pages wrapped into each work chunk
    #[arg(long, default_value_t = config::PAGES_PER_CHUNK)]
    pages_per_chunk: usize,

    /// Input queue capacity in chunks; bounds how far the reader runs ahead
    #[arg(long, default_value_t = config::INPUT_QUEUE_CAPACITY)]
    queue_capacity: usize,

    /// Disable the live progress display
    #[arg(long)]
    no_progress: bool,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn run(cli: Cli) -> Result<()> {
    let opts = PipelineOptions {
        threads: cli.threads,
        pages_per_chunk: cli.pages_per_chunk,
        queue_capacity: cli.queue_capacity,
        show_progress: !cli.no_progress,
    };

    let start = Instant::now();
    let summary = run_pipeline(&cli.input, &cli.output, &opts)?;
    let elapsed = start.elapsed();

    println!();
    println!("=== Summary ===");
    println!("Pages read:       {}", summary.pages_read);
    println!("Chunks parsed:    {}", summary.chunks);
    println!("Nodes written:    {}", summary.nodes);
    println!("  redirects:      {}", summary.redirects);
    println!("Links written:    {}", summary.links);
    println!("Elapsed:          {:.2}s", elapsed.as_secs_f64());
    println!("Final rate:       {:.1} pages/s", summary.final_rate);

    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    // Logs go to stderr; the progress renderer owns stdout while it runs.
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");

    match run(cli) {
        Ok(()) => {
            info!("Completed successfully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Error: {:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
