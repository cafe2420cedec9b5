//! Logging setup for the osbr renderer: a compact console layer on stderr and
//! an optional non-blocking file layer.

use std::io::IsTerminal;
use std::path::Path;

use once_cell::sync::OnceCell;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

pub use tracing_subscriber::filter::LevelFilter;

pub const DEFAULT_CONSOLE_LEVEL: LevelFilter = LevelFilter::INFO;
pub const DEFAULT_FILE_LEVEL: LevelFilter = LevelFilter::DEBUG;

// The appender guard must live for the whole process or buffered log lines
// are lost on exit.
static WORKER_GUARD: OnceCell<WorkerGuard> = OnceCell::new();

/// Initialise the global subscriber. `RUST_LOG` overrides `console_level`
/// when set. When `log_file` is given, a `DEFAULT_FILE_LEVEL` file layer is
/// added next to the console layer.
pub fn init_logging(console_level: LevelFilter, log_file: Option<&Path>) {
  let console_filter = EnvFilter::builder()
    .with_default_directive(console_level.into())
    .from_env_lossy();

  let console_layer = fmt::layer()
    .compact()
    .with_ansi(std::io::stderr().is_terminal())
    .with_target(false)
    .with_file(false)
    .without_time()
    .with_writer(std::io::stderr)
    .with_filter(console_filter);

  let file_layer = log_file.map(|path| {
    let dir = path.parent().filter(|p| !p.as_os_str().is_empty());
    let file_name = path.file_name().map_or_else(
      || std::ffi::OsString::from("osbr.log"),
      std::ffi::OsStr::to_os_string,
    );
    let appender =
      tracing_appender::rolling::never(dir.unwrap_or_else(|| Path::new(".")), file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(appender);
    WORKER_GUARD
      .set(guard)
      .expect("init_logging called twice");

    fmt::layer()
      .with_ansi(false)
      .with_target(true)
      .with_level(true)
      .with_writer(non_blocking)
      .with_filter(
        EnvFilter::builder()
          .with_default_directive(DEFAULT_FILE_LEVEL.into())
          .parse_lossy(""),
      )
  });

  tracing_subscriber::registry()
    .with(file_layer)
    .with(console_layer)
    .init();

  tracing::debug!("logging initialised");
}
