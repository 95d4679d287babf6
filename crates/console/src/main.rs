mod logging;

use anyhow::{Context, Result};
use clap::Parser;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::warn;
use transcript::{RenderItem, TranscriptController};
use transport::recording::{PlaybackEventStream, TranscriptRecording};
use transport::EventStream;

/// Replay a recorded response stream with typewriter pacing.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Recording file to play back
    recording: PathBuf,

    /// Ignore recorded chunk timing and play back as fast as possible
    #[arg(long)]
    fast: bool,

    /// Increase logging verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Write logs to a cache file instead of stderr
    #[arg(long)]
    log_file: bool,
}

async fn replay(args: Args) -> Result<()> {
    let recording = TranscriptRecording::from_file(&args.recording)?;
    let mut stream = PlaybackEventStream::new(recording, args.fast);

    let controller = Arc::new(Mutex::new(TranscriptController::new()));
    controller.lock().await.begin_turn();

    let feeder = {
        let controller = controller.clone();
        tokio::spawn(async move {
            loop {
                match stream.next_event().await {
                    Ok(Some(event)) => controller.lock().await.handle_event(&event),
                    Ok(None) => break,
                    Err(err) => {
                        warn!("playback stream failed: {err}");
                        break;
                    }
                }
            }
        })
    };

    // Print revealed text as it is paced out, like a live session would.
    let mut printed = 0usize;
    let mut stdout = std::io::stdout();
    loop {
        let (revealed, typing) = {
            let controller = controller.lock().await;
            (controller.revealed(), controller.is_typing())
        };
        if revealed.len() > printed {
            stdout.write_all(revealed[printed..].as_bytes())?;
            stdout.flush()?;
            printed = revealed.len();
        }
        if feeder.is_finished() && !typing {
            break;
        }
        tokio::time::sleep(Duration::from_millis(30)).await;
    }
    feeder.await.context("playback feeder panicked")?;
    println!();

    print_transcript(&controller.lock().await.render_items());
    Ok(())
}

fn print_transcript(items: &[RenderItem]) {
    println!("--- transcript ({} items) ---", items.len());
    for item in items {
        match item {
            RenderItem::Think { text, closed } => {
                let marker = if *closed { "" } else { " (unfinished)" };
                println!("[thinking{marker}] {text}");
            }
            RenderItem::Tool(cell) => {
                let status = if cell.active { "running" } else { "done" };
                let elapsed = cell
                    .elapsed_ms
                    .map(|ms| format!(" {:.1}s", ms as f64 / 1000.0))
                    .unwrap_or_default();
                println!(
                    "[tool {} {status}{elapsed}] {} -> {}",
                    cell.name,
                    cell.input_summary.as_deref().unwrap_or("?"),
                    cell.output_summary.as_deref().unwrap_or("?"),
                );
            }
            RenderItem::BatchTool {
                batch_size,
                calls,
                active,
                elapsed_ms,
                ..
            } => {
                let status = if *active { "running" } else { "done" };
                let elapsed = elapsed_ms
                    .map(|ms| format!(" {:.1}s", ms as f64 / 1000.0))
                    .unwrap_or_default();
                println!("[batch of {batch_size} {status}{elapsed}]");
                for call in calls {
                    println!(
                        "    {} {} -> {}",
                        call.name,
                        call.input_summary.as_deref().unwrap_or("?"),
                        call.output_summary.as_deref().unwrap_or("?"),
                    );
                }
            }
            RenderItem::Text { text } => println!("{text}"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.log_file {
        logging::setup_logging_to_file(args.verbose);
    } else {
        logging::setup_logging(args.verbose);
    }

    replay(args).await
}
