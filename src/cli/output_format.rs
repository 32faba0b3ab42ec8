use serde::Serialize;
use std::str::FromStr;
use structopt::StructOpt;
use thiserror::Error;

#[derive(StructOpt, Debug, Clone, Copy)]
#[structopt(rename_all = "kebab-case")]
pub struct OutputFormat {
    /// Format of output data. Possible values: yaml, json
    #[structopt(long = "output-format", default_value = "yaml")]
    format: FormatVariant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FormatVariant {
    Yaml,
    Json,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("formatting output as YAML failed")]
    Yaml(#[from] serde_yaml::Error),
    #[error("formatting output as JSON failed")]
    Json(#[from] serde_json::Error),
}

impl FromStr for FormatVariant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "yaml" => Ok(FormatVariant::Yaml),
            "json" => Ok(FormatVariant::Json),
            other => Err(format!("unknown output format '{}'", other)),
        }
    }
}

impl Default for OutputFormat {
    fn default() -> Self {
        OutputFormat {
            format: FormatVariant::Yaml,
        }
    }
}

impl OutputFormat {
    pub fn json() -> Self {
        OutputFormat {
            format: FormatVariant::Json,
        }
    }

    pub fn format<T: Serialize>(&self, data: &T) -> Result<String, Error> {
        let formatted = match self.format {
            FormatVariant::Yaml => serde_yaml::to_string(data)?,
            FormatVariant::Json => serde_json::to_string_pretty(data)?,
        };
        Ok(formatted)
    }

    /// One record per line, for output that is read while it streams.
    pub fn format_line<T: Serialize>(&self, data: &T) -> Result<String, Error> {
        match self.format {
            FormatVariant::Yaml => self.format(data),
            FormatVariant::Json => Ok(serde_json::to_string(data)?),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn both_formats_render() {
        let data = json!({ "index": 3, "height": 1 });
        let yaml = OutputFormat::default().format(&data).unwrap();
        assert!(yaml.contains("index: 3"));
        let line = OutputFormat::json().format_line(&data).unwrap();
        assert_eq!(line, r#"{"height":1,"index":3}"#);
    }

    #[test]
    fn format_is_read_from_the_command_line() {
        let format = OutputFormat::from_iter(vec!["test", "--output-format", "JSON"]);
        assert_eq!(format.format, FormatVariant::Json);
        assert!(OutputFormat::from_iter_safe(vec!["test", "--output-format", "xml"]).is_err());
    }
}
