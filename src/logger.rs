//! Logging setup.
//!
//! The library logs through the `log` facade; the binary installs a `log4rs`
//! console appender on stderr so that stdout stays clean for JSON output.

use log::LevelFilter;
use log4rs::append::console::{ConsoleAppender, Target};
use log4rs::config::{Appender, Config, Root};
use log4rs::encode::pattern::PatternEncoder;
use std::str::FromStr;

/// Environment variable that overrides the log level (`off`, `error`, `warn`,
/// `info`, `debug`, `trace`).
pub const LEVEL_ENV: &str = "WIKI_LOG";

const PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S%.3f)} [{l}] {t} - {m}{n}";

/// Picks the level: a valid `env_level` wins, otherwise `-v` count decides.
pub fn resolve_level(verbosity: u8, env_level: Option<&str>) -> LevelFilter {
    if let Some(level) = env_level.and_then(|s| LevelFilter::from_str(s.trim()).ok()) {
        return level;
    }
    match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    }
}

/// Installs the stderr logger. Call once, at startup.
///
/// # Errors
/// Returns an error if the configuration is rejected or a logger is already set.
pub fn init(level: LevelFilter) -> Result<(), Box<dyn std::error::Error>> {
    let stderr = ConsoleAppender::builder()
        .target(Target::Stderr)
        .encoder(Box::new(PatternEncoder::new(PATTERN)))
        .build();
    let config = Config::builder()
        .appender(Appender::builder().build("stderr", Box::new(stderr)))
        .build(Root::builder().appender("stderr").build(level))?;
    log4rs::init_config(config)?;
    Ok(())
}
