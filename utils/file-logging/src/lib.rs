//! Process logger of the `dsx` binary.
//!
//! Logs go to stderr and, when a directory is given, to daily rotated files.
//! `RUST_LOG` takes precedence over the computed log spec.
use anyhow::Result;
use chrono::format::strftime::StrftimeItems;
use chrono::format::DelayedFormat;
use chrono::{DateTime, Local};
use flexi_logger::{
    style, AdaptiveFormat, Age, Cleanup, Criterion, DeferredNow, Duplicate, Logger, Naming, Record,
};
use std::path::Path;

pub use flexi_logger::LoggerHandle;

/// Chatty dependencies kept at `info` unless overridden.
pub const DEFAULT_MODULE_OVERRIDES: &str = "hyper=info,reqwest=info,mio=info,r2d2=info";

const LOG_FILE_BASENAME: &str = "dsx";
const MAX_LOG_FILE_SIZE: u64 = 256 * 1024 * 1024;

fn format_date(now: &mut DeferredNow) -> DelayedFormat<StrftimeItems> {
    // local time with offset and milliseconds, e.g. 2024-05-06T10:15:00.123+0200
    DateTime::<Local>::from(*now.now()).format("%Y-%m-%dT%H:%M:%S%.3f%z")
}

fn plain_format(w: &mut dyn std::io::Write, now: &mut DeferredNow, record: &Record) -> Result<(), std::io::Error> {
    write!(
        w,
        "[{} {:5} {}] {}",
        format_date(now),
        record.level(),
        record.module_path().unwrap_or("<unnamed>"),
        record.args()
    )
}

fn color_format(w: &mut dyn std::io::Write, now: &mut DeferredNow, record: &Record) -> Result<(), std::io::Error> {
    let level = record.level();
    write!(
        w,
        "[{} {:5} {}] {}",
        yansi::Color::Fixed(247).paint(format_date(now)),
        style(level, level),
        yansi::Color::Fixed(247).paint(record.module_path().unwrap_or("<unnamed>")),
        record.args()
    )
}

/// Log spec with `--debug` applied; module overrides always win over the
/// default level.
pub fn log_spec(default_level: &str, module_overrides: &str, force_debug: bool) -> String {
    let level = if force_debug { "debug" } else { default_level };
    if module_overrides.is_empty() {
        level.to_string()
    } else {
        format!("{},{}", level, module_overrides)
    }
}

pub fn start_logger(
    default_level: &str,
    log_dir: Option<&Path>,
    module_overrides: &str,
    force_debug: bool,
) -> Result<LoggerHandle> {
    let mut logger =
        Logger::with_env_or_str(log_spec(default_level, module_overrides, force_debug)).format(plain_format);

    if let Some(log_dir) = log_dir {
        logger = logger
            .log_to_file()
            .directory(log_dir)
            .basename(LOG_FILE_BASENAME)
            .rotate(
                Criterion::AgeOrSize(Age::Day, MAX_LOG_FILE_SIZE),
                Naming::Timestamps,
                Cleanup::KeepLogAndCompressedFiles(1, 7),
            )
            .print_message()
            .duplicate_to_stderr(Duplicate::All);
    }

    let handle = logger
        .adaptive_format_for_stderr(AdaptiveFormat::Custom(plain_format, color_format))
        .set_palette("9;11;2;7;8".to_string())
        .start()?;
    Ok(handle)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_log_spec() {
        assert_eq!(log_spec("info", "", false), "info");
        assert_eq!(log_spec("info", "hyper=warn", true), "debug,hyper=warn");
        assert_eq!(
            log_spec("warn", DEFAULT_MODULE_OVERRIDES, false),
            format!("warn,{}", DEFAULT_MODULE_OVERRIDES)
        );
    }
}
