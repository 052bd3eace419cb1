use std::path::PathBuf;
use std::time::Duration;

use blueprint_storage::location;
use blueprint_storage::{AnnotationLog, DecodeOptions, SessionDecoder, TracingObserver};
use clap::{ArgAction, Parser};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "blueprint-storage")]
#[command(about = "Decode a Factorio blueprint library file and print it as JSON")]
struct Args {
    /// Library file. Defaults to the one in Factorio's user data directory
    path: Option<PathBuf>,

    /// Look for the 1.x file name (blueprint-storage.dat)
    #[arg(long)]
    legacy: bool,

    /// Print JSON on one line
    #[arg(long)]
    compact: bool,

    /// Write a byte-level trace of the decode to FILE
    #[arg(long, value_name = "FILE")]
    annotate: Option<PathBuf>,

    #[arg(long, default_value = "100")]
    drain_timeout_ms: u64,

    /// Accept names with unusual characters
    #[arg(long)]
    no_string_check: bool,

    /// More logging (-vvv traces every read)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let level = match args.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_writer(std::io::stderr)
        .init();

    let path = match args.path {
        Some(path) => path,
        None => location::blueprint_storage_path(args.legacy)
            .ok_or("no Factorio data directory found, pass a path or set FACTORIO_DIR")?,
    };

    let decoder = SessionDecoder::new(DecodeOptions {
        drain_timeout: Duration::from_millis(args.drain_timeout_ms),
        validate_strings: !args.no_string_check,
        ..DecodeOptions::default()
    });

    let result = match &args.annotate {
        Some(out) => {
            let data = tokio::fs::read(&path).await?;
            let mut log = AnnotationLog::new();
            let result = decoder.decode(&data[..], Some(&mut log)).await;
            let rest = data.get(log.next_offset() as usize..).unwrap_or_default();
            tokio::fs::write(out, log.finish(rest)).await?;
            eprintln!("Annotation written to {}", out.display());
            result
        }
        None => {
            let file = tokio::fs::File::open(&path).await?;
            if args.verbose >= 3 {
                let mut observer = TracingObserver::new();
                decoder.decode(file, Some(&mut observer)).await
            } else {
                decoder.decode(file, None).await
            }
        }
    };
    let session = result.map_err(|e| format!("{}: {e}", path.display()))?;

    let json = if args.compact {
        serde_json::to_string(&session)?
    } else {
        serde_json::to_string_pretty(&session)?
    };
    println!("{json}");
    Ok(())
}
