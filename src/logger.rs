//! File logger with per-target attribution
//!
//! Concurrent fleet workers log interleaved lines, so every message produced
//! on behalf of a target carries a `[target:host]` tag built with
//! [`target_tag`]. Lines are written to a single rotating log file; console
//! echo is enabled in debug builds only.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};

use chrono::Utc;

use crate::constants::MAX_LOG_BYTES;

struct Logger {
    path: PathBuf,
    verbose: bool,
    enabled: bool,
    // Serializes rotate+append so concurrent workers cannot interleave a
    // rename with a write.
    write_lock: Mutex<()>,
}

impl Logger {
    fn init() -> Self {
        let base = std::env::var("PA_LOG_DIR").unwrap_or_else(|_| "logs".to_string());
        let dir = PathBuf::from(base);
        let _ = fs::create_dir_all(&dir);

        // Use a different log file name for debug vs release builds
        let filename = if cfg!(debug_assertions) {
            "pa-query-dev.log"
        } else {
            "pa-query.log"
        };
        let path = dir.join(filename);

        let verbose = std::env::var("PA_LOG_VERBOSE")
            .map(|v| v == "1")
            .unwrap_or(false);

        // Debug builds always log to file; release builds opt in.
        let enabled = if cfg!(debug_assertions) {
            true
        } else {
            std::env::var("PA_ENABLE_LOGGING")
                .map(|v| v == "1")
                .unwrap_or(false)
        };

        Self {
            path,
            verbose,
            enabled,
            write_lock: Mutex::new(()),
        }
    }

    fn rotate_if_needed(&self) {
        if let Ok(meta) = fs::metadata(&self.path) {
            if meta.len() > MAX_LOG_BYTES {
                let backup = self.path.with_extension("log.bak");
                let _ = fs::remove_file(&backup);
                let _ = fs::rename(&self.path, &backup);
            }
        }
    }

    fn log(&self, level: &str, message: &str) {
        if !self.enabled {
            return;
        }

        let _guard = self.write_lock.lock().unwrap_or_else(|p| p.into_inner());
        self.rotate_if_needed();
        if let Ok(mut file) = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
        {
            let _ = writeln!(
                file,
                "{} [{}] {}",
                Utc::now().to_rfc3339(),
                level,
                message
            );
        }
    }
}

static LOGGER: OnceLock<Logger> = OnceLock::new();

fn get_logger() -> &'static Logger {
    LOGGER.get_or_init(Logger::init)
}

/// Builds the `[target:host]` attribution tag prepended to per-target log lines.
pub fn target_tag(target_id: &str, host: &str) -> String {
    format!("[{}:{}]", target_id, host)
}

pub fn log_debug(message: &str) {
    if get_logger().verbose {
        log_internal("DEBUG", message);
    }
}

pub fn log_info(message: &str) {
    log_internal("INFO", message);
}

pub fn log_warn(message: &str) {
    log_internal("WARN", message);
}

pub fn log_error(message: &str) {
    log_internal("ERROR", message);
}

fn log_internal(level: &str, message: &str) {
    // Console echo in dev builds; stderr keeps output unbuffered.
    #[cfg(debug_assertions)]
    eprintln!("[{}] {}", level, message);

    get_logger().log(level, message);
}
