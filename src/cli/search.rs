use super::{output_format::OutputFormat, Context, Error, StartPoint};
use crate::network::{Session, Transport};
use crate::node::{Direction, Instruction};
use crate::traversal::{
    MatchLimit, Progress, ProgressThrottle, Query, SearchState, WalkControl, WalkEvent,
};
use std::time::Duration;
use structopt::StructOpt;
use tokio::{sync::mpsc, time::Instant};
use tokio_util::sync::CancellationToken;

#[derive(StructOpt, Debug)]
#[structopt(rename_all = "kebab-case")]
pub struct Search {
    /// Instances whose hex identifier starts with this prefix
    #[structopt(long, conflicts_with = "contract", required_unless = "contract")]
    instance: Option<String>,

    /// Instructions of the named contract
    #[structopt(long)]
    contract: Option<String>,

    /// Hex identifier of the node to start from, or `genesis`
    #[structopt(long, default_value = "genesis")]
    start: StartPoint,

    /// Stop after that many matches, a negative value walks to the end
    #[structopt(long, default_value = "-1", allow_hyphen_values = true)]
    limit: i64,

    /// Walk toward genesis instead of toward the head
    #[structopt(long)]
    backward: bool,

    /// Shortest time between two progress lines, in milliseconds
    #[structopt(long, default_value = "250")]
    progress_interval: u64,

    #[structopt(flatten)]
    output_format: OutputFormat,
}

impl Search {
    fn query(&self) -> Query {
        match (&self.instance, &self.contract) {
            (Some(prefix), _) => Query::Instance(prefix.to_lowercase()),
            (None, Some(name)) => Query::Contract(name.clone()),
            // ruled out by the argument parser
            (None, None) => Query::Contract(String::new()),
        }
    }

    pub async fn exec<T: Transport>(self, context: Context<T>) -> Result<(), Error> {
        let query = self.query();
        let start = context.start_id(self.start);
        let direction = Direction::from_backward(self.backward);
        let (events, mut received) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let control = WalkControl::default()
            .with_limit(MatchLimit::from_signed(self.limit))
            .with_cancel(cancel.clone())
            .with_events(events);
        let mut throttle = ProgressThrottle::new(Duration::from_millis(self.progress_interval));
        let mut session = Session::new();

        let state = {
            let walk = context
                .engine
                .walk(&mut session, start, direction, &query, &control);
            let interrupt = tokio::signal::ctrl_c();
            tokio::pin!(walk);
            tokio::pin!(interrupt);
            let mut interrupted = false;
            loop {
                tokio::select! {
                    state = &mut walk => break state?,
                    Some(event) = received.recv() => self.show(event, &mut throttle)?,
                    signal = &mut interrupt, if !interrupted => {
                        signal.map_err(Error::Signal)?;
                        tracing::info!("interrupted, stopping the search");
                        interrupted = true;
                        cancel.cancel();
                    }
                }
            }
        };
        drop(control);
        while let Some(event) = received.recv().await {
            self.show(event, &mut throttle)?;
        }
        if let Some(progress) = throttle.flush() {
            show_progress(&progress);
        }
        summarize(&state);
        Ok(())
    }

    fn show(
        &self,
        event: WalkEvent<Vec<Instruction>>,
        throttle: &mut ProgressThrottle,
    ) -> Result<(), Error> {
        match event {
            WalkEvent::Progress(progress) => {
                if let Some(progress) = throttle.offer(progress, Instant::now()) {
                    show_progress(&progress);
                }
            }
            WalkEvent::Match(found) => {
                println!("{}", self.output_format.format_line(&found)?);
            }
        }
        Ok(())
    }
}

fn show_progress(progress: &Progress) {
    match progress.percent {
        Some(percent) => eprintln!(
            "{:>3}% {} nodes seen, {} found",
            percent, progress.seen_count, progress.found_count
        ),
        None => eprintln!(
            "     {} nodes seen, {} found",
            progress.seen_count, progress.found_count
        ),
    }
}

fn summarize<I>(state: &SearchState<I>) {
    eprintln!(
        "{}: {} found in {} nodes ({:?})",
        state.query, state.found, state.seen_count, state.termination
    );
}
