use skipchain_explorer::{
    cli::Command,
    settings::{CommandLine, RawSettings, SettingsArguments},
};
use std::error::Error;
use structopt::StructOpt;

fn main() {
    let CommandLine { settings, command } = CommandLine::from_args();
    run(settings, command).unwrap_or_else(report_error)
}

fn run(arguments: SettingsArguments, command: Command) -> Result<(), Box<dyn Error>> {
    let raw_settings = RawSettings::load(arguments)?;
    let (_guards, log_info_msgs) = raw_settings.log_settings().init_log()?;
    if let Some(msgs) = log_info_msgs {
        for msg in msgs {
            tracing::info!("{}", msg);
        }
    }
    let settings = raw_settings.try_into_settings()?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(command.exec(settings))?;
    Ok(())
}

fn report_error(error: Box<dyn Error>) {
    eprintln!("{}", error);
    let mut source = error.source();
    while let Some(sub_error) = source {
        eprintln!("  |-> {}", sub_error);
        source = sub_error.source();
    }
    std::process::exit(1)
}
