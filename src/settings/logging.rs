use lazy_static::lazy_static;
use serde::{de::Error as _, Deserialize, Deserializer, Serialize, Serializer};
use std::{
    fmt::{self, Display},
    fs, io,
    path::PathBuf,
    str::FromStr,
};
use structopt::StructOpt;
use tracing::level_filters::LevelFilter;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::util::TryInitError;

const DEFAULT_FILTER_LEVEL: LevelFilter = LevelFilter::INFO;
const DEFAULT_LOG_FORMAT: LogFormat = LogFormat::Default;
const DEFAULT_LOG_OUTPUT: LogOutput = LogOutput::Stderr;

lazy_static! {
    static ref LOG_FILTER_LEVEL_POSSIBLE_VALUES: Vec<&'static str> = {
        [
            LevelFilter::OFF,
            LevelFilter::TRACE,
            LevelFilter::DEBUG,
            LevelFilter::INFO,
            LevelFilter::WARN,
            LevelFilter::ERROR,
        ]
        .iter()
        .map(|name| name.to_string().to_ascii_lowercase())
        .map(|name| &*Box::leak(name.into_boxed_str()))
        .collect()
    };
}

pub struct LogSettings {
    pub config: LogSettingsEntry,
    pub msgs: LogInfoMsg,
}

/// Messages about overridden settings, to be logged with `info!` once
/// the logger is up.
pub type LogInfoMsg = Option<Vec<String>>;

#[derive(Clone, Debug, PartialEq)]
pub struct LogSettingsEntry {
    pub level: LevelFilter,
    pub format: LogFormat,
    pub output: LogOutput,
}

#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
/// Format of the logger.
pub enum LogFormat {
    Default,
    Plain,
    Json,
}

impl Default for LogFormat {
    fn default() -> Self {
        LogFormat::Default
    }
}

impl Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogFormat::Default => "default",
            LogFormat::Plain => "plain",
            LogFormat::Json => "json",
        };
        f.write_str(s)
    }
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match &*s.trim().to_lowercase() {
            "plain" => Ok(LogFormat::Plain),
            "json" => Ok(LogFormat::Json),
            "default" => Ok(LogFormat::Default),
            other => Err(format!("unknown log format '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
/// Output of the logger.
pub enum LogOutput {
    Stdout,
    Stderr,
    File(PathBuf),
}

impl FromStr for LogOutput {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.to_lowercase().as_str() {
            "stdout" => Ok(LogOutput::Stdout),
            "stderr" => Ok(LogOutput::Stderr),
            // the path keeps its case
            _ => match s.strip_prefix("file:") {
                Some(path) if !path.is_empty() => Ok(LogOutput::File(path.into())),
                _ => Err(format!("unknown log output '{}'", s)),
            },
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to open the log file `{}`", .path.to_string_lossy())]
    FileError {
        path: PathBuf,
        #[source]
        cause: io::Error,
    },
    #[error("failed to set global subscriber")]
    SetGlobalSubscriberError(#[source] TryInitError),
}

impl LogSettings {
    pub fn new(command_line: &CliSettings, file: Option<&FileSettings>) -> LogSettings {
        let mut log_config = LogSettingsEntry {
            level: DEFAULT_FILTER_LEVEL,
            format: DEFAULT_LOG_FORMAT,
            output: DEFAULT_LOG_OUTPUT,
        };
        let mut info_msgs: Vec<String> = Vec::new();

        if let Some(cfg) = file {
            if let Some(level) = cfg.level {
                log_config.level = level;
            }
            if let Some(format) = cfg.format {
                log_config.format = format;
            }
            if let Some(output) = &cfg.output {
                log_config.output = output.clone();
            }
        }

        // the command line overrides the configuration file
        if let Some(output) = &command_line.log_output {
            if &log_config.output != output {
                info_msgs.push(format!(
                    "log output overriden from command line: {:?} replaced with {:?}",
                    log_config.output, output
                ));
            }
            log_config.output = output.clone();
        }
        if let Some(level) = command_line.log_level {
            if log_config.level != level {
                info_msgs.push(format!(
                    "log level overriden from command line: {:?} replaced with {:?}",
                    log_config.level, level
                ));
            }
            log_config.level = level;
        }
        if let Some(format) = command_line.log_format {
            if log_config.format != format {
                info_msgs.push(format!(
                    "log format overriden from command line: {:?} replaced with {:?}",
                    log_config.format, format
                ));
            }
            log_config.format = format;
        }

        LogSettings {
            config: log_config,
            msgs: if info_msgs.is_empty() {
                None
            } else {
                Some(info_msgs)
            },
        }
    }

    /// Install the global subscriber. The returned guards flush the
    /// pending records when dropped and must be held until exit.
    pub fn init_log(self) -> Result<(Vec<WorkerGuard>, LogInfoMsg), Error> {
        let (non_blocking, guard) = match &self.config.output {
            LogOutput::Stdout => tracing_appender::non_blocking(io::stdout()),
            LogOutput::Stderr => tracing_appender::non_blocking(io::stderr()),
            LogOutput::File(path) => {
                let file = fs::OpenOptions::new()
                    .create(true)
                    .write(true)
                    .append(true)
                    .open(path)
                    .map_err(|cause| Error::FileError {
                        path: path.clone(),
                        cause,
                    })?;
                tracing_appender::non_blocking(file)
            }
        };
        install(self.config.level, self.config.format, non_blocking)?;
        Ok((vec![guard], self.msgs))
    }
}

fn install(level: LevelFilter, format: LogFormat, writer: NonBlocking) -> Result<(), Error> {
    use tracing_subscriber::prelude::*;

    let registry = tracing_subscriber::registry().with(level);
    let result = match format {
        LogFormat::Default => registry
            .with(
                tracing_subscriber::fmt::Layer::new()
                    .with_level(true)
                    .with_writer(writer),
            )
            .try_init(),
        LogFormat::Plain => registry
            .with(
                tracing_subscriber::fmt::Layer::new()
                    .with_level(true)
                    .with_ansi(false)
                    .with_writer(writer),
            )
            .try_init(),
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::Layer::new()
                    .json()
                    .with_level(true)
                    .with_writer(writer),
            )
            .try_init(),
    };
    result.map_err(Error::SetGlobalSubscriberError)
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct FileSettings {
    #[serde(default, with = "filter_level_opt_serde")]
    pub level: Option<LevelFilter>,
    #[serde(default)]
    pub format: Option<LogFormat>,
    #[serde(default)]
    pub output: Option<LogOutput>,
}

mod filter_level_opt_serde {
    use super::*;

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<LevelFilter>, D::Error> {
        Option::<String>::deserialize(deserializer)?
            .map(|variant| {
                variant.parse().map_err(|_| {
                    D::Error::unknown_variant(&variant, &**LOG_FILTER_LEVEL_POSSIBLE_VALUES)
                })
            })
            .transpose()
    }

    pub fn serialize<S: Serializer>(
        data: &Option<LevelFilter>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        data.map(|level| level.to_string()).serialize(serializer)
    }
}

fn log_level_parse(level: &str) -> Result<LevelFilter, String> {
    level
        .parse()
        .map_err(|_| format!("Unknown log level value: '{}'", level))
}

#[derive(Debug, Default, StructOpt)]
pub struct CliSettings {
    /// Set log messages minimum severity. If not configured anywhere, defaults to "info".
    #[structopt(
        long = "log-level",
        parse(try_from_str = log_level_parse),
        possible_values = &LOG_FILTER_LEVEL_POSSIBLE_VALUES
    )]
    pub log_level: Option<LevelFilter>,

    /// Set format of the log emitted. Can be "default", "plain" or "json".
    /// If not configured anywhere, defaults to "default".
    #[structopt(long = "log-format", parse(try_from_str))]
    pub log_format: Option<LogFormat>,

    /// Set the output of the log. Can be "stdout", "stderr" or
    /// "file:<path>". If not configured anywhere, defaults to "stderr".
    #[structopt(long = "log-output", parse(try_from_str))]
    pub log_output: Option<LogOutput>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_has_priority() {
        let cli = CliSettings::from_iter(vec!["example", "--log-level", "trace"]);

        let file: FileSettings = serde_yaml::from_str(
            r#"
            level: info
            output:
                file:
                    output.log
            "#,
        )
        .unwrap();

        let settings = LogSettings::new(&cli, Some(&file));

        assert_eq!(settings.config.level, LevelFilter::TRACE);
        assert_eq!(settings.config.output, LogOutput::File("output.log".into()));
        assert_eq!(settings.config.format, DEFAULT_LOG_FORMAT);
        assert_eq!(settings.msgs.map(|msgs| msgs.len()), Some(1));
    }

    #[test]
    fn defaults_apply_without_any_setting() {
        let settings = LogSettings::new(&CliSettings::default(), None);
        assert_eq!(settings.config.level, DEFAULT_FILTER_LEVEL);
        assert_eq!(settings.config.output, DEFAULT_LOG_OUTPUT);
        assert!(settings.msgs.is_none());
    }

    #[test]
    fn output_parses_file_paths() {
        assert_eq!(
            "file:/tmp/explorer.log".parse(),
            Ok(LogOutput::File("/tmp/explorer.log".into()))
        );
        assert!("syslog".parse::<LogOutput>().is_err());
    }
}
