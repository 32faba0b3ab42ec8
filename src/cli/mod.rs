//! The sub-commands of the `skipchain-explorer` binary.

mod explore;
mod fetch;
mod head;
pub mod output_format;
mod search;

use self::output_format::OutputFormat;
use crate::frontier::FrontierConfig;
use crate::head::{HeadError, HeadResolver};
use crate::mock::MockChain;
use crate::network::{rest::RestTransport, FetchError, PageFetcher, Transport};
use crate::node::{NodeCache, NodeId};
use crate::settings::{Settings, Source};
use crate::traversal::{TraversalEngine, WalkError};
use std::{io, sync::Arc};
use structopt::StructOpt;
use thiserror::Error;

#[derive(StructOpt, Debug)]
#[structopt(rename_all = "kebab-case")]
pub enum Command {
    /// Resolve and print the current head of the chain
    Head(head::Head),
    /// Print the pages of one paginated request
    Fetch(fetch::Fetch),
    /// Walk the chain and print the nodes touching an instance or a contract
    Search(search::Search),
    /// Load the nodes around a node as the viewport read on stdin moves
    Explore(explore::Explore),
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot resolve the head of the chain")]
    Head(#[from] HeadError),
    #[error("fetching from the data source failed")]
    Fetch(#[from] FetchError),
    #[error("search failed")]
    Walk(#[from] WalkError),
    #[error("cannot read from standard input")]
    Stdin(#[source] io::Error),
    #[error("cannot listen for the interrupt signal")]
    Signal(#[source] io::Error),
    #[error(transparent)]
    Format(#[from] output_format::Error),
}

/// Where a command starts: a node identifier, or `genesis`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartPoint {
    Id(NodeId),
    Genesis,
}

impl std::str::FromStr for StartPoint {
    type Err = crate::node::InvalidIdentifier;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "genesis" => Ok(StartPoint::Genesis),
            id => id.parse().map(StartPoint::Id),
        }
    }
}

/// Everything a command needs to talk to the data source.
pub struct Context<T> {
    pub fetcher: PageFetcher<T>,
    pub head: HeadResolver<T>,
    pub engine: TraversalEngine<T>,
    pub frontier: FrontierConfig,
}

impl<T: Transport> Context<T> {
    pub fn new(transport: T, genesis: NodeId, settings: &Settings) -> Self {
        let fetcher = PageFetcher::new(Arc::new(transport))
            .with_cache(NodeCache::new(settings.cache_size));
        let head = HeadResolver::new(fetcher.clone(), genesis);
        let engine = TraversalEngine::new(fetcher.clone())
            .with_head_resolver(head.clone())
            .with_page_shape(settings.traversal.page_size, settings.traversal.page_count);
        Context {
            fetcher,
            head,
            engine,
            frontier: settings.frontier.clone(),
        }
    }

    pub fn start_id(&self, start: StartPoint) -> NodeId {
        match start {
            StartPoint::Id(id) => id,
            StartPoint::Genesis => self.head.genesis(),
        }
    }
}

impl Command {
    pub async fn exec(self, settings: Settings) -> Result<(), Error> {
        match &settings.source {
            Source::Rest { url, genesis } => {
                tracing::info!(node = %url, "exploring remote chain");
                let context = Context::new(RestTransport::new(url.clone()), *genesis, &settings);
                self.exec_with(context).await
            }
            Source::Mock(mock) => {
                let chain = MockChain::builder()
                    .length(mock.length)
                    .base(mock.base)
                    .max_height(mock.max_height)
                    .max_page_size(mock.max_page_size)
                    .seed(mock.seed)
                    .build();
                tracing::info!(length = chain.len(), "exploring generated chain");
                let genesis = chain.genesis_id();
                self.exec_with(Context::new(chain, genesis, &settings)).await
            }
        }
    }

    async fn exec_with<T: Transport>(self, context: Context<T>) -> Result<(), Error> {
        match self {
            Command::Head(head) => head.exec(context).await,
            Command::Fetch(fetch) => fetch.exec(context).await,
            Command::Search(search) => search.exec(context).await,
            Command::Explore(explore) => explore.exec(context).await,
        }
    }
}

fn print(output_format: &OutputFormat, data: &impl serde::Serialize) -> Result<(), Error> {
    println!("{}", output_format.format(data)?);
    Ok(())
}
