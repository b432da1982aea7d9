//! Log output for inspectmaker.
//!
//! Every `log::info!()` etc. from any crate ends up in `inspectmaker.log` in
//! the temp directory (`/tmp/inspectmaker.log` on Unix). Stdout is reserved
//! for the command protocol, so when `RUST_LOG` is set lines are mirrored to
//! stderr instead.
//!
//! Level precedence: `--log-level` flag, then `RUST_LOG`, then `log_level`
//! from the config file (applied after the config is loaded).

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use log::{LevelFilter, Log, Metadata, Record};
use parking_lot::Mutex;

/// Path of the log file.
pub fn log_path() -> PathBuf {
    std::env::temp_dir().join("inspectmaker.log")
}

struct LogBridge {
    file: Mutex<Option<File>>,
    mirror_stderr: bool,
}

impl LogBridge {
    fn new(mirror_stderr: bool) -> Self {
        let file = OpenOptions::new()
            .write(true)
            .truncate(true)
            .create(true)
            .open(log_path())
            .ok();
        let bridge = Self {
            file: Mutex::new(file),
            mirror_stderr,
        };
        bridge.write_line(&format!(
            "{}\ninspectmaker session started at {}\n{}",
            "=".repeat(80),
            get_timestamp(),
            "=".repeat(80)
        ));
        bridge
    }

    fn write_line(&self, line: &str) {
        if let Some(file) = self.file.lock().as_mut() {
            let _ = writeln!(file, "{line}");
            let _ = file.flush();
        }
    }
}

impl Log for LogBridge {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = format!(
            "[{}] [{:<5}] [{}] {}",
            get_timestamp(),
            record.level(),
            record.target(),
            record.args()
        );
        self.write_line(&line);
        if self.mirror_stderr {
            eprintln!("{line}");
        }
    }

    fn flush(&self) {
        if let Some(file) = self.file.lock().as_mut() {
            let _ = file.flush();
        }
    }
}

static LOGGER: OnceLock<LogBridge> = OnceLock::new();

/// Set when the CLI flag or `RUST_LOG` chose the level; the config file then
/// has no say.
static LEVEL_PINNED: AtomicBool = AtomicBool::new(false);

fn get_timestamp() -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    format!("{}.{:06}", now.as_secs(), now.subsec_micros())
}

/// Parse a level name (`off`, `error`, `warn`, `info`, `debug`, `trace`).
pub fn parse_level(value: &str) -> Result<LevelFilter, String> {
    value
        .trim()
        .parse::<LevelFilter>()
        .map_err(|_| format!("invalid log level '{value}'"))
}

/// Install the log bridge. Safe to call more than once; later calls only
/// adjust the level.
pub fn init_log_bridge(cli_level: Option<LevelFilter>) {
    let rust_log = std::env::var("RUST_LOG").ok();
    let env_level = rust_log.as_deref().and_then(|v| parse_level(v).ok());

    let level = match (cli_level, env_level) {
        (Some(level), _) | (None, Some(level)) => {
            LEVEL_PINNED.store(true, Ordering::SeqCst);
            level
        }
        (None, None) => LevelFilter::Info,
    };

    let logger = LOGGER.get_or_init(|| LogBridge::new(rust_log.is_some()));
    if log::set_logger(logger).is_err() {
        log::debug!("Log bridge already installed");
    }
    log::set_max_level(level);
}

/// Apply the config file's level unless the CLI or `RUST_LOG` already chose one.
pub fn apply_config_level(level: LevelFilter) {
    if !LEVEL_PINNED.load(Ordering::SeqCst) {
        log::set_max_level(level);
    }
}
