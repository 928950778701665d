use clap::Parser as _;
use knx_device_info::commands;
use tracing_subscriber::{layer::SubscriberExt as _, util::SubscriberInitExt as _};

const LOG_ENV: &str = "KNX_DEVICE_INFO_LOG";

#[derive(clap::Parser)]
#[clap(version, about, author)]
enum Commands {
    Parameters(commands::parameters::Args),
    Info(commands::info::Args),
}

fn end<E: std::error::Error>(r: Result<(), E>) {
    std::process::exit(match r {
        Ok(_) => 0,
        Err(e) => {
            eprintln!("error: {e}");
            let mut cause = e.source();
            while let Some(e) = cause {
                eprintln!("  because: {e}");
                cause = e.source();
            }
            1
        }
    });
}

fn log_filter() -> tracing_subscriber::filter::Targets {
    let default = tracing_subscriber::filter::Targets::new()
        .with_default(tracing_subscriber::filter::LevelFilter::WARN);
    let Ok(description) = std::env::var(LOG_ENV) else {
        return default;
    };
    match description.parse() {
        Ok(filter) => filter,
        Err(e) => {
            eprintln!("warning: ignoring {LOG_ENV}: {e}");
            default
        }
    }
}

fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(log_filter())
        .init();
    match Commands::parse() {
        Commands::Parameters(args) => end(commands::parameters::run(args)),
        Commands::Info(args) => end(commands::info::run(args)),
    }
}
