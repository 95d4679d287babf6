use std::fs::OpenOptions;
use std::io;

pub fn setup_logging(verbose_level: u8) {
    setup_logging_with_file(verbose_level, None);
}

/// Log to a file so tracing output does not interleave with the paced
/// transcript on stdout.
pub fn setup_logging_to_file(verbose_level: u8) {
    let log_file_path = dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("transcript-console")
        .join("console.log");

    if let Some(parent) = log_file_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    setup_logging_with_file(verbose_level, Some(log_file_path));
}

fn setup_logging_with_file(verbose_level: u8, log_file: Option<std::path::PathBuf>) {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::EnvFilter::from_default_env()
    } else {
        let filter_str = match verbose_level {
            0 => "warn,console=info,transcript=info,transport=info",
            1 => "info,console=debug,transcript=debug,transport=debug",
            _ => "debug,console=trace,transcript=trace,transport=trace",
        };
        tracing_subscriber::EnvFilter::new(filter_str)
    };

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .with_level(true);

    if let Some(log_file_path) = log_file {
        match OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file_path)
        {
            Ok(file) => {
                subscriber
                    .with_writer(move || {
                        file.try_clone()
                            .map(|f| Box::new(f) as Box<dyn io::Write + Send>)
                            .unwrap_or_else(|_| Box::new(io::sink()))
                    })
                    .init();
            }
            Err(err) => {
                eprintln!(
                    "Warning: could not open log file {:?} ({err}), logging to stderr",
                    log_file_path
                );
                subscriber
                    .with_writer(|| Box::new(std::io::stderr()) as Box<dyn io::Write + Send>)
                    .init();
            }
        }
    } else {
        // Keep stdout clean for the transcript itself.
        subscriber
            .with_writer(|| Box::new(std::io::stderr()) as Box<dyn io::Write + Send>)
            .init();
    }
}
