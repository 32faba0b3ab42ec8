use super::{output_format::OutputFormat, Context, Error};
use crate::network::{FetchError, Session, Transport};
use crate::node::{Direction, InvalidIdentifier};
use futures::prelude::*;
use structopt::StructOpt;

#[derive(StructOpt, Debug)]
#[structopt(rename_all = "kebab-case")]
pub struct Fetch {
    /// Hex identifier of the first node, or `genesis`
    start: String,

    /// Number of nodes per page
    #[structopt(long, default_value = "10")]
    page_size: u32,

    /// Number of pages to ask for
    #[structopt(long, default_value = "1")]
    page_count: u32,

    /// Walk toward genesis instead of toward the head
    #[structopt(long)]
    backward: bool,

    #[structopt(flatten)]
    output_format: OutputFormat,
}

impl Fetch {
    pub async fn exec<T: Transport>(self, context: Context<T>) -> Result<(), Error> {
        let start = match self.start.as_str() {
            "genesis" => context.head.genesis().as_ref().to_vec(),
            hex_id => hex::decode(hex_id)
                .map_err(|e| FetchError::InvalidIdentifier(InvalidIdentifier::from(e)))?,
        };
        let mut session = Session::new();
        let mut pages = context
            .fetcher
            .fetch_pages_from(
                &mut session,
                &start,
                self.page_size,
                self.page_count,
                Direction::from_backward(self.backward),
            )
            .await?;
        while let Some(page) = pages.try_next().await? {
            println!("{}", self.output_format.format_line(&page)?);
        }
        Ok(())
    }
}
