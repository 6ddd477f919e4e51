use log::LevelFilter;
use log4rs::{
    Config,
    append::{
        console::{ConsoleAppender, Target},
        rolling_file::{
            RollingFileAppender,
            policy::compound::{
                CompoundPolicy, roll::fixed_window::FixedWindowRoller, trigger::size::SizeTrigger,
            },
        },
    },
    config::{Appender, Logger, Root},
    encode::pattern::PatternEncoder,
    filter::threshold::ThresholdFilter,
};

const LOG_SIZE_LIMIT: u64 = 10 * 1024 * 1024; // 10 MB

const LOG_FILE_COUNT: u32 = 3;

const CONSOLE_PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S)} {h({l})} {t} - {m}{n}";
const FILE_PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S)} {l} {t} - {m}{n}";

/// HTTP stack crates that would otherwise flood the debug log file.
const QUIET_TARGETS: [&str; 3] = ["hyper", "hyper_util", "reqwest"];

#[derive(Debug, PartialEq, Eq)]
struct LogFile {
    path: String,
    archive_pattern: String,
}

#[derive(Debug, PartialEq, Eq)]
struct LogConfig {
    console_level: LevelFilter,
    file: Option<LogFile>,
}

impl LogConfig {
    fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        let console_level = var("TTT_LOG_LEVEL")
            .and_then(|level| level.parse().ok())
            .unwrap_or(LevelFilter::Info);
        let file = var("LOG_FILE_PATH")
            .filter(|path| !path.is_empty())
            .map(|path| LogFile {
                archive_pattern: var("LOG_ARCHIVE_PATTERN")
                    .unwrap_or_else(|| format!("{}.{{}}.gz", path)),
                path,
            });
        LogConfig {
            console_level,
            file,
        }
    }

    fn from_env() -> Self {
        Self::from_vars(|name| std::env::var(name).ok())
    }
}

pub fn init_logger() {
    let config = LogConfig::from_env();

    let stderr = ConsoleAppender::builder()
        .target(Target::Stderr)
        .encoder(Box::new(PatternEncoder::new(CONSOLE_PATTERN)))
        .build();

    let mut builder = Config::builder().appender(
        Appender::builder()
            .filter(Box::new(ThresholdFilter::new(config.console_level)))
            .build("stderr", Box::new(stderr)),
    );
    let mut root = Root::builder().appender("stderr");

    if let Some(file) = &config.file {
        let trigger = SizeTrigger::new(LOG_SIZE_LIMIT);
        let roller = FixedWindowRoller::builder()
            .build(&file.archive_pattern, LOG_FILE_COUNT)
            .expect("Invalid LOG_ARCHIVE_PATTERN");
        let policy = CompoundPolicy::new(Box::new(trigger), Box::new(roller));
        let logfile = RollingFileAppender::builder()
            .encoder(Box::new(PatternEncoder::new(FILE_PATTERN)))
            .build(&file.path, Box::new(policy))
            .expect("Failed to open log file");
        builder = builder.appender(
            Appender::builder()
                .filter(Box::new(ThresholdFilter::new(LevelFilter::Debug)))
                .build("logfile", Box::new(logfile)),
        );
        root = root.appender("logfile");
    }

    for target in QUIET_TARGETS {
        builder = builder.logger(Logger::builder().build(target, LevelFilter::Warn));
    }

    let log_config = builder
        .build(root.build(LevelFilter::Trace))
        .expect("Invalid logger configuration");
    let _handle = log4rs::init_config(log_config).expect("Failed to initialize logger");

    match &config.file {
        Some(file) => log::info!("Logging to stderr and {}", file.path),
        None => log::info!("LOG_FILE_PATH not set, logging to stderr only"),
    }
}
