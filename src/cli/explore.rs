use super::{output_format::OutputFormat, Context, Error, StartPoint};
use crate::frontier::{
    Bounds, FrontierLoader, FrontierRegistry, LoaderEvent, LoaderId, Neighbours, Side,
    ViewportTransform,
};
use crate::network::{Session, Transport};
use crate::node::{Node, NodeRef};
use crate::utils::async_msg;
use futures::prelude::*;
use serde::Serialize;
use std::{error::Error as _, sync::Arc};
use structopt::StructOpt;
use tokio::io::{AsyncBufReadExt, BufReader};

const VIEWPORT_BUFFER: usize = 32;
const EVENT_BUFFER: usize = 256;

#[derive(StructOpt, Debug)]
#[structopt(rename_all = "kebab-case")]
pub struct Explore {
    /// Hex identifier of the node to load around, or `genesis`
    center: StartPoint,

    /// Nodes to load left of the center right away
    #[structopt(long, default_value = "10")]
    left: u64,

    /// Nodes to load right of the center right away
    #[structopt(long, default_value = "10")]
    right: u64,

    #[structopt(flatten)]
    output_format: OutputFormat,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Loaded<'a> {
    loader: LoaderId,
    side: Side,
    nodes: &'a [Arc<Node>],
}

impl Explore {
    pub async fn exec<T: Transport>(self, context: Context<T>) -> Result<(), Error> {
        let mut session = Session::new();
        let center = NodeRef::from(context.start_id(self.center));
        let center = context.fetcher.resolve(&mut session, &center).await?;

        let (mut loader, events) = FrontierLoader::open(
            context.engine.clone(),
            FrontierRegistry::new(),
            center,
            Bounds {
                left: self.left,
                right: self.right,
            },
            Neighbours::default(),
            context.frontier.clone(),
        )
        .await;
        for event in events {
            self.show(event)?;
        }

        let (mut viewport_box, viewport_queue) = async_msg::channel(VIEWPORT_BUFFER);
        let (event_box, mut event_queue) = async_msg::channel(EVENT_BUFFER);

        let feed = async move {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            while let Some(line) = lines.next_line().await.map_err(Error::Stdin)? {
                if line.trim().is_empty() {
                    continue;
                }
                match line.parse::<ViewportTransform>() {
                    Ok(transform) => {
                        if viewport_box.send(transform).await.is_err() {
                            break;
                        }
                    }
                    Err(error) => tracing::warn!(%line, %error, "ignoring viewport line"),
                }
            }
            Ok::<(), Error>(())
        };
        let show = async {
            while let Some(event) = event_queue.next().await {
                self.show(event)?;
            }
            Ok::<(), Error>(())
        };
        let (fed, (), shown) = future::join3(feed, loader.run(viewport_queue, event_box), show).await;
        loader.close().await;
        fed.and(shown)
    }

    fn show(&self, event: LoaderEvent) -> Result<(), Error> {
        match event {
            LoaderEvent::NodesLoaded {
                loader,
                side,
                nodes,
            } => {
                let loaded = Loaded {
                    loader,
                    side,
                    nodes: &nodes,
                };
                println!("{}", self.output_format.format_line(&loaded)?);
            }
            LoaderEvent::GenesisReached { loader } => {
                eprintln!("{}: genesis reached", loader);
            }
            LoaderEvent::EndOfChain { loader, head } => {
                eprintln!("{}: end of chain at index {}", loader, head.index);
            }
            LoaderEvent::LoadFailed { error, .. } => {
                let mut message = error.to_string();
                let mut source = error.source();
                while let Some(cause) = source {
                    message.push_str(&format!("\n  |-> {}", cause));
                    source = cause.source();
                }
                eprintln!("{}", message);
            }
        }
        Ok(())
    }
}
