use crate::frontier::{Geometry, DEFAULT_BATCH_SIZE};
use crate::mock::{DEFAULT_BASE, DEFAULT_MAX_HEIGHT, DEFAULT_MAX_PAGE_SIZE};
use crate::node::NodeId;
use crate::settings::logging::FileSettings;
use crate::traversal::{DEFAULT_PAGE_COUNT, DEFAULT_PAGE_SIZE};
use serde::{Deserialize, Serialize};

const DEFAULT_CACHE_SIZE: usize = 1024;
const DEFAULT_DEBOUNCE_MS: u64 = 200;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub source: Option<SourceConfig>,

    #[serde(default)]
    pub log: Option<FileSettings>,

    #[serde(default)]
    pub traversal: TraversalConfig,

    #[serde(default)]
    pub frontier: FrontierSection,

    #[serde(default = "default_cache_size")]
    pub cache_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase", deny_unknown_fields)]
pub enum SourceConfig {
    Rest(RestConfig),
    Mock(MockConfig),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RestConfig {
    pub url: String,
    /// identifier of the first node, where head lookups start
    #[serde(default)]
    pub genesis: Option<NodeId>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct MockConfig {
    pub length: u64,
    #[serde(default = "default_base")]
    pub base: u32,
    #[serde(default = "default_max_height")]
    pub max_height: u32,
    #[serde(default = "default_max_page_size")]
    pub max_page_size: u32,
    #[serde(default)]
    pub seed: u64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct TraversalConfig {
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default = "default_page_count")]
    pub page_count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FrontierSection {
    #[serde(default = "default_batch_size")]
    pub batch_size: u64,
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    #[serde(default)]
    pub node_width: Option<f64>,
    #[serde(default)]
    pub padding: Option<f64>,
    #[serde(default)]
    pub viewport_width: Option<f64>,
}

impl FrontierSection {
    /// pixel layout, with the defaults filling what is not configured
    pub fn geometry(&self) -> Geometry {
        let default = Geometry::default();
        Geometry {
            node_width: self.node_width.unwrap_or(default.node_width),
            padding: self.padding.unwrap_or(default.padding),
            viewport_width: self.viewport_width.unwrap_or(default.viewport_width),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            source: None,
            log: None,
            traversal: TraversalConfig::default(),
            frontier: FrontierSection::default(),
            cache_size: DEFAULT_CACHE_SIZE,
        }
    }
}

impl Default for TraversalConfig {
    fn default() -> Self {
        TraversalConfig {
            page_size: DEFAULT_PAGE_SIZE,
            page_count: DEFAULT_PAGE_COUNT,
        }
    }
}

impl Default for FrontierSection {
    fn default() -> Self {
        FrontierSection {
            batch_size: DEFAULT_BATCH_SIZE,
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            node_width: None,
            padding: None,
            viewport_width: None,
        }
    }
}

fn default_cache_size() -> usize {
    DEFAULT_CACHE_SIZE
}

fn default_base() -> u32 {
    DEFAULT_BASE
}

fn default_max_height() -> u32 {
    DEFAULT_MAX_HEIGHT
}

fn default_max_page_size() -> u32 {
    DEFAULT_MAX_PAGE_SIZE
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

fn default_page_count() -> u32 {
    DEFAULT_PAGE_COUNT
}

fn default_batch_size() -> u64 {
    DEFAULT_BATCH_SIZE
}

fn default_debounce_ms() -> u64 {
    DEFAULT_DEBOUNCE_MS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_gives_defaults() {
        let config: Config = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config.source, None);
        assert_eq!(config.cache_size, DEFAULT_CACHE_SIZE);
        assert_eq!(config.traversal, TraversalConfig::default());
        assert_eq!(config.frontier.batch_size, DEFAULT_BATCH_SIZE);
        assert_eq!(config.frontier.geometry(), Geometry::default());
    }

    #[test]
    fn full_document_is_read() {
        let config: Config = serde_yaml::from_str(
            r#"
            source:
              mock:
                length: 500
                max_page_size: 20
            log:
              level: debug
              format: json
            traversal:
              page_size: 25
            frontier:
              debounce_ms: 50
              viewport_width: 800
            cache_size: 16
            "#,
        )
        .unwrap();
        assert_eq!(
            config.source,
            Some(SourceConfig::Mock(MockConfig {
                length: 500,
                base: DEFAULT_BASE,
                max_height: DEFAULT_MAX_HEIGHT,
                max_page_size: 20,
                seed: 0,
            }))
        );
        assert_eq!(config.traversal.page_size, 25);
        assert_eq!(config.traversal.page_count, DEFAULT_PAGE_COUNT);
        assert_eq!(config.frontier.debounce_ms, 50);
        assert_eq!(config.frontier.geometry().viewport_width, 800.0);
        assert_eq!(config.cache_size, 16);
    }

    #[test]
    fn unknown_fields_are_refused() {
        assert!(serde_yaml::from_str::<Config>("page_size: 3").is_err());
        assert!(serde_yaml::from_str::<Config>("traversal: { size: 3 }").is_err());
    }

    #[test]
    fn rest_source_takes_a_genesis() {
        let genesis = "00".repeat(32);
        let config: Config = serde_yaml::from_str(&format!(
            "source: {{ rest: {{ url: \"http://127.0.0.1:8080/api\", genesis: \"{}\" }} }}",
            genesis
        ))
        .unwrap();
        match config.source {
            Some(SourceConfig::Rest(rest)) => {
                assert_eq!(rest.url, "http://127.0.0.1:8080/api");
                assert_eq!(rest.genesis, Some(NodeId::from_bytes([0; 32])));
            }
            other => panic!("unexpected source {:?}", other),
        }
    }
}
