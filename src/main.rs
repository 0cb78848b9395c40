use backtrace::Backtrace;
use clap::{value_parser, Arg, ArgAction, Command};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;

mod backend;
mod collector;
mod config;
mod inventory;
mod logging;
mod point;

use config::Config;
use inventory::SnapshotConnector;

pub use tracing::{debug, error, info, warn};

fn main() {
    // custom panic hook to terminate whole process after unwinding
    std::panic::set_hook(Box::new(|s| {
        eprintln!("{s}");
        eprintln!("{:?}", Backtrace::new());
        std::process::exit(101);
    }));

    // parse command line options
    let matches = Command::new(env!("CARGO_BIN_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .long_about(
            "Polls vSphere performance counters for every configured vCenter and \
            writes them, enriched with inventory metadata, to Graphite or InfluxDB.",
        )
        .arg(
            Arg::new("CONFIG")
                .help("Collector configuration file")
                .value_parser(value_parser!(PathBuf))
                .action(ArgAction::Set)
                .required(true)
                .index(1),
        )
        .arg(
            Arg::new("VERBOSE")
                .long("verbose")
                .short('v')
                .help("Increase the log verbosity, may be repeated")
                .action(ArgAction::Count),
        )
        .get_matches();

    // load config from file
    let config = {
        let Some(file) = matches.get_one::<PathBuf>("CONFIG") else {
            eprintln!("no config file given");
            std::process::exit(1);
        };

        match Config::load(file) {
            Ok(c) => c,
            Err(error) => {
                eprintln!("error loading config file: {}\n{error}", file.display());
                std::process::exit(1);
            }
        }
    };

    let verbose = matches.get_count("VERBOSE");

    if let Err(e) = run(config, verbose) {
        eprintln!("{e:#}");
        std::process::exit(1);
    }
}

fn run(config: Config, verbose: u8) -> anyhow::Result<()> {
    let _guards = logging::init(logging::verbosity(config.log().level(), verbose))?;

    // initialize async runtime
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("vsphere-collector")
        .build()?;

    let (stop, shutdown) = watch::channel(false);

    ctrlc::set_handler(move || {
        let _ = stop.send(true);
    })?;

    rt.block_on(async {
        let backend = backend::connect(config.backend()).await.map_err(|e| {
            error!(backend = config.backend().kind().as_str(), "{e}");
            e
        })?;

        collector::run(
            &config,
            Arc::new(SnapshotConnector::new()),
            backend,
            shutdown,
        )
        .await;

        info!("collector stopped");

        Ok::<_, anyhow::Error>(())
    })
}
