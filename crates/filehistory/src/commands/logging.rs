//! Logging initialization.
//!
//! One-shot commands log to stderr. The long-running watcher logs to a file
//! in the platform log directory.

use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Initialize logging based on verbosity and mode.
///
/// `RUST_LOG` overrides the computed filter. Returns the log file path if
/// logging to a file.
pub fn init_logging(verbose: bool, to_file: bool) -> Option<PathBuf> {
    let filter = if verbose {
        "filehistory=debug,filehistory_snapshot=debug,filehistory_util=debug"
    } else if to_file {
        "filehistory=info,filehistory_snapshot=info,filehistory_util=info"
    } else {
        "filehistory=warn,filehistory_snapshot=warn"
    };
    let env_filter = || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    if !to_file {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter())
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
        return None;
    }

    let log_dir = filehistory_util::path::log_dir();
    let file = std::fs::create_dir_all(&log_dir).and_then(|()| {
        std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_dir.join("filehistory.log"))
    });

    match file {
        Ok(file) => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter())
                .with_target(false)
                .with_ansi(false)
                .with_writer(file)
                .init();
            Some(log_dir.join("filehistory.log"))
        }
        Err(e) => {
            eprintln!("Warning: Could not open log file in {}: {e}", log_dir.display());
            tracing_subscriber::fmt()
                .with_env_filter(env_filter())
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
            None
        }
    }
}
