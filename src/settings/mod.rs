mod command_arguments;
pub mod config;
pub mod logging;

pub use self::command_arguments::{CommandLine, SettingsArguments};
use self::config::{Config, MockConfig, SourceConfig, TraversalConfig};
use self::logging::LogSettings;
use crate::frontier::FrontierConfig;
use crate::mock::{DEFAULT_BASE, DEFAULT_MAX_HEIGHT, DEFAULT_MAX_PAGE_SIZE};
use crate::node::NodeId;
use reqwest::Url;
use std::{fs::File, str::FromStr, time::Duration};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Cannot read the configuration file")]
    ConfigIo(#[from] std::io::Error),
    #[error("Error while parsing the configuration file")]
    Config(#[from] serde_yaml::Error),
    #[error("No data source configured, use `--node`, `--mock-length` or the `source` section of the configuration file")]
    NoSource,
    #[error("The node at `{url}` needs the identifier of its genesis node, use `--genesis` or `source.rest.genesis`")]
    NoGenesis { url: Url },
    #[error("Invalid node address `{url}`")]
    InvalidUrl {
        url: String,
        #[source]
        source: <Url as FromStr>::Err,
    },
    #[error("Page size and page count must be at least 1, got {page_size} x {page_count}")]
    InvalidPageShape { page_size: u32, page_count: u32 },
}

/// Where the chain is read from.
#[derive(Debug, Clone, PartialEq)]
pub enum Source {
    Rest { url: Url, genesis: NodeId },
    Mock(MockConfig),
}

/// Overall settings of the explorer.
#[derive(Debug, Clone)]
pub struct Settings {
    pub source: Source,
    pub traversal: TraversalConfig,
    pub frontier: FrontierConfig,
    pub cache_size: usize,
}

pub struct RawSettings {
    arguments: SettingsArguments,
    config: Option<Config>,
}

impl RawSettings {
    pub fn load(arguments: SettingsArguments) -> Result<Self, Error> {
        let config = if let Some(path) = &arguments.config {
            Some(serde_yaml::from_reader(File::open(path)?)?)
        } else {
            None
        };
        Ok(RawSettings { arguments, config })
    }

    pub fn log_settings(&self) -> LogSettings {
        let file = self.config.as_ref().and_then(|config| config.log.as_ref());
        LogSettings::new(&self.arguments.log, file)
    }

    fn source(&self) -> Result<Source, Error> {
        let configured = self.config.as_ref().and_then(|config| config.source.as_ref());
        let arguments = &self.arguments;

        if let Some(length) = arguments.mock_length {
            let mock = match configured {
                Some(SourceConfig::Mock(mock)) => MockConfig {
                    length,
                    ..mock.clone()
                },
                _ => MockConfig {
                    length,
                    base: DEFAULT_BASE,
                    max_height: DEFAULT_MAX_HEIGHT,
                    max_page_size: DEFAULT_MAX_PAGE_SIZE,
                    seed: 0,
                },
            };
            return Ok(Source::Mock(mock));
        }

        let configured_genesis = match configured {
            Some(SourceConfig::Rest(rest)) => rest.genesis,
            _ => None,
        };
        let url = match (&arguments.node, configured) {
            (Some(url), _) => url.clone(),
            (None, Some(SourceConfig::Rest(rest))) => rest.url.clone(),
            (None, Some(SourceConfig::Mock(mock))) => return Ok(Source::Mock(mock.clone())),
            (None, None) => return Err(Error::NoSource),
        };
        let url = Url::parse(&url).map_err(|source| Error::InvalidUrl { url, source })?;
        match arguments.genesis.or(configured_genesis) {
            Some(genesis) => Ok(Source::Rest { url, genesis }),
            None => Err(Error::NoGenesis { url }),
        }
    }

    /// Merge the command line and the configuration file, the command
    /// line taking precedence.
    pub fn try_into_settings(self) -> Result<Settings, Error> {
        let source = self.source()?;
        let config = self.config.unwrap_or_default();
        let TraversalConfig {
            page_size,
            page_count,
        } = config.traversal;
        if page_size == 0 || page_count == 0 {
            return Err(Error::InvalidPageShape {
                page_size,
                page_count,
            });
        }
        let frontier = FrontierConfig {
            batch_size: config.frontier.batch_size,
            debounce: Duration::from_millis(config.frontier.debounce_ms),
            geometry: config.frontier.geometry(),
        };
        Ok(Settings {
            source,
            traversal: config.traversal,
            frontier,
            cache_size: config.cache_size,
        })
    }
}
