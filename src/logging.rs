use anyhow::{Context, Result};
use directories::ProjectDirs;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter directive.
pub const LOG_ENV: &str = "MUSE_LOG";

fn filter_from(directive: Option<String>) -> EnvFilter {
  directive.and_then(|d| EnvFilter::try_new(d).ok()).unwrap_or_else(|| EnvFilter::new("info"))
}

/// Route tracing output to `muse.log` in the data dir; the terminal belongs to the UI.
/// Keep the guard alive until exit so buffered lines get flushed.
pub fn init() -> Result<Option<WorkerGuard>> {
  let Some(proj_dirs) = ProjectDirs::from("", "", "muse") else { return Ok(None) };
  let dir = proj_dirs.data_dir();
  std::fs::create_dir_all(dir).with_context(|| format!("Failed to create log dir {}", dir.display()))?;

  let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(dir, "muse.log"));
  tracing_subscriber::fmt()
    .with_env_filter(filter_from(std::env::var(LOG_ENV).ok()))
    .with_writer(writer)
    .with_ansi(false)
    .try_init()
    .map_err(|e| anyhow::anyhow!("Failed to install log subscriber: {}", e))?;
  Ok(Some(guard))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn filter_defaults_to_info() {
    assert_eq!(filter_from(None).to_string(), "info");
    assert_eq!(filter_from(Some("muse=debug".into())).to_string(), "muse=debug");
  }
}
