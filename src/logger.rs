//! Run logger: mirrors pipeline progress to a single log file.
//!
//! The file is **truncated at each launch**, so it only ever holds output
//! from the most recent run. Until [`init`] succeeds every macro is a no-op,
//! which keeps library users and tests silent.
//!
//! Usage: anywhere in the crate use the `log_info!` / `log_warn!` /
//! `log_err!` macros, or call `crate::logger::write_line(...)` directly.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};

static LOG_FILE: OnceLock<Mutex<File>> = OnceLock::new();
static LOG_PATH: OnceLock<PathBuf> = OnceLock::new();

/// Returns the path of the active log file, if logging was initialised.
pub fn log_path() -> Option<&'static PathBuf> {
    LOG_PATH.get()
}

/// Write a line to the log. I/O errors are ignored so that logging never
/// aborts a render.
pub fn write_line(line: &str) {
    if let Some(mutex) = LOG_FILE.get()
        && let Ok(mut file) = mutex.lock()
    {
        let _ = writeln!(file, "{}", line);
    }
}

/// Write a timestamped, level-tagged line to the log.
pub fn write(level: &str, msg: &str) {
    if LOG_FILE.get().is_none() {
        return;
    }
    write_line(&format!("[{}] [{}] {}", timestamp(), level, msg));
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::logger::write("INFO", &format!($($arg)*));
    };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        $crate::logger::write("WARN", &format!($($arg)*));
    };
}

#[macro_export]
macro_rules! log_err {
    ($($arg:tt)*) => {
        $crate::logger::write("ERROR", &format!($($arg)*));
    };
}

/// Initialise the logger, writing to `path`.
///
/// * Creates the parent directory and creates (or truncates) the file.
/// * Installs a panic hook that writes the panic message to the log before
///   running the previous handler.
///
/// Returns the I/O error when the file cannot be opened; the caller decides
/// whether that is fatal. Only the first successful call takes effect.
pub fn init(path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }

    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)?;

    if LOG_FILE.set(Mutex::new(file)).is_err() {
        return Ok(());
    }
    let _ = LOG_PATH.set(path.to_path_buf());

    write_line(&format!(
        "=== gifstamp run started {} ===",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    ));
    write_line("");

    let prev = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        write_line(&format!("[{}] [PANIC] {}", timestamp(), info));
        prev(info);
    }));
    Ok(())
}

fn timestamp() -> String {
    chrono::Local::now().format("%H:%M:%S").to_string()
}
