use crate::cli::Command;
use crate::node::NodeId;
use crate::settings::logging::CliSettings;
use std::path::PathBuf;
use structopt::StructOpt;

#[derive(StructOpt, Debug)]
#[structopt(
    name = "skipchain-explorer",
    rename_all = "kebab-case",
    setting = structopt::clap::AppSettings::ColoredHelp
)]
pub struct CommandLine {
    #[structopt(flatten)]
    pub settings: SettingsArguments,

    #[structopt(subcommand)]
    pub command: Command,
}

#[derive(StructOpt, Debug, Default)]
#[structopt(rename_all = "kebab-case")]
pub struct SettingsArguments {
    #[structopt(flatten)]
    pub log: CliSettings,

    /// Set the configuration file (in YAML format)
    #[structopt(long = "config", parse(from_os_str))]
    pub config: Option<PathBuf>,

    /// Address of the node serving the chain, e.g. `http://127.0.0.1:8080/api`.
    /// Takes precedence over the source of the configuration file.
    #[structopt(long = "node")]
    pub node: Option<String>,

    /// Identifier of the genesis node of the chain served by `--node`
    #[structopt(long = "genesis", parse(try_from_str))]
    pub genesis: Option<NodeId>,

    /// Explore a generated chain of that many nodes held in memory
    /// instead of a remote node.
    #[structopt(long = "mock-length", conflicts_with = "node")]
    pub mock_length: Option<u64>,
}
