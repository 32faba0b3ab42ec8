use super::{output_format::OutputFormat, print, Context, Error};
use crate::network::{Session, Transport};
use crate::node::NodeId;
use structopt::StructOpt;

#[derive(StructOpt, Debug)]
#[structopt(rename_all = "kebab-case")]
pub struct Head {
    /// Start the lookup from this node instead of genesis
    #[structopt(long = "from")]
    from: Option<NodeId>,

    #[structopt(flatten)]
    output_format: OutputFormat,
}

impl Head {
    pub async fn exec<T: Transport>(self, context: Context<T>) -> Result<(), Error> {
        let mut session = Session::new();
        let head = context.head.resolve_head(&mut session, self.from).await?;
        tracing::info!(index = head.index, hash = %head.hash, "head resolved");
        print(&self.output_format, &head)
    }
}
