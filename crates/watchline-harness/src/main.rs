#![forbid(unsafe_code)]

//! Watchline harness binary entry point.

use std::process;

use watchline_core::logging::init_subscriber;
use watchline_harness::cli;
use watchline_harness::driver::{RealTime, Session};
use watchline_harness::scenario::Scenario;
use watchline_runtime::{InteractiveReporter, MemoryState, ReporterConfig};

fn main() {
    let opts = cli::Opts::parse();

    if let Some(path) = &opts.log_file
        && let Err(e) = init_subscriber(path, opts.log_format)
    {
        eprintln!("Failed to initialize logging: {e}");
        process::exit(1);
    }

    let loaded = match &opts.scenario {
        Some(path) => Scenario::load(path),
        None => Scenario::demo(),
    };
    let scenario = match loaded {
        Ok(scenario) => scenario,
        Err(e) => {
            eprintln!("{e}");
            process::exit(1);
        }
    };

    let mut config = ReporterConfig::from_env();
    if let Some(live) = opts.live {
        config = config.with_live(live);
    }
    if let Some(root) = &scenario.root {
        config = config.with_root(root.clone());
    }

    let state = MemoryState::new();
    let reporter = InteractiveReporter::builder(config)
        .state(state.clone())
        .build();
    let mut session = Session::new(reporter, state);
    if let Err(e) = session.run(&scenario, &RealTime, opts.speed) {
        eprintln!("Output error: {e}");
        process::exit(1);
    }
}
