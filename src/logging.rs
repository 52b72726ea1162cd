use crate::error::{Result, ScraperError};
use log::LevelFilter;
use log4rs::append::console::ConsoleAppender;
use log4rs::config::{Appender, Config, Logger, Root};
use log4rs::encode::pattern::PatternEncoder;
use std::path::Path;

pub const DEFAULT_LOG_CONFIG: &str = "log4rs.yml";

const CONSOLE_PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S)} {h({l})} {t} - {m}{n}";

/// Initialize log4rs from `path`, or a console-only setup at `level` when the file is missing
///
/// Returns `true` when the file was used; its levels then win over `level`.
pub fn init(path: impl AsRef<Path>, level: LevelFilter) -> Result<bool> {
    let path = path.as_ref();
    if path.exists() {
        return log4rs::init_file(path, Default::default())
            .map(|_| true)
            .map_err(|e| ScraperError::Config(format!("{}: {}", path.display(), e)));
    }

    log4rs::init_config(console_config(level)?)
        .map(|_| false)
        .map_err(|e| ScraperError::Config(format!("logging: {}", e)))
}

fn console_config(level: LevelFilter) -> Result<Config> {
    let stdout = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new(CONSOLE_PATTERN)))
        .build();
    Config::builder()
        .appender(Appender::builder().build("stdout", Box::new(stdout)))
        .logger(Logger::builder().build("headless_chrome", LevelFilter::Warn))
        .logger(Logger::builder().build("tungstenite", LevelFilter::Warn))
        .build(Root::builder().appender("stdout").build(level))
        .map_err(|e| ScraperError::Config(format!("logging: {}", e)))
}
