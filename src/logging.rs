use std::{
    fs::{self, OpenOptions},
    path::{Path, PathBuf},
    sync::Mutex,
};

use color_eyre::{Result, eyre::WrapErr};
use directories::ProjectDirs;
use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const LOG_FILE: &str = "segscope.log";

pub enum Target<'a> {
    /// The terminal belongs to the TUI, so logs go to a file.
    File(Option<&'a Path>),
    Stderr,
}

fn level_for(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

pub fn default_log_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "segscope").map(|dirs| dirs.data_dir().join(LOG_FILE))
}

/// Install the global subscriber. Returns the log file path when logging to
/// a file.
pub fn init(verbose: u8, target: Target<'_>) -> Result<Option<PathBuf>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("segscope={}", level_for(verbose))));
    let registry = tracing_subscriber::registry()
        .with(filter)
        .with(ErrorLayer::default());

    match target {
        Target::Stderr => {
            registry
                .with(fmt::layer().with_writer(std::io::stderr))
                .try_init()
                .wrap_err("failed to install tracing subscriber")?;
            Ok(None)
        }
        Target::File(path) => {
            let Some(path) = path.map(Path::to_path_buf).or_else(default_log_path) else {
                registry
                    .try_init()
                    .wrap_err("failed to install tracing subscriber")?;
                return Ok(None);
            };
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)
                    .wrap_err_with(|| format!("failed to create {}", parent.display()))?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .wrap_err_with(|| format!("failed to open log file {}", path.display()))?;
            registry
                .with(
                    fmt::layer()
                        .with_ansi(false)
                        .with_writer(Mutex::new(file)),
                )
                .try_init()
                .wrap_err("failed to install tracing subscriber")?;
            Ok(Some(path))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::level_for;

    #[test]
    fn verbosity_maps_to_levels() {
        assert_eq!(level_for(0), "warn");
        assert_eq!(level_for(1), "info");
        assert_eq!(level_for(2), "debug");
        assert_eq!(level_for(7), "trace");
    }
}
