use std::fs::{self, OpenOptions};
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter directives
pub const LOG_ENV: &str = "VOXSNAKE_LOG";

/// Send tracing output to `path`; the terminal belongs to the game.
///
/// Filtering follows `VOXSNAKE_LOG` and defaults to `info`. Calling it a
/// second time is harmless, the first subscriber stays in place.
pub fn init(path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(path)?;

    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(ChronoLocal::rfc_3339())
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .try_init()
        .is_ok();

    if installed {
        tracing::info!(path = %path.display(), "logging initialised");
    }
    Ok(())
}
