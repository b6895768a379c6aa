use std::path::Path;
use std::process::ExitCode;
use std::time::Instant;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use torne::config::Config;
use torne::model::Model;

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();
    let config_path = match args.get(1) {
        Some(p) => p.clone(),
        None => {
            eprintln!("usage: torne <config.toml>");
            return ExitCode::FAILURE;
        }
    };
    let config = match Config::from_file(Path::new(&config_path)) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.verbosity.clone()));
    tracing_subscriber::fmt().with_env_filter(filter).init();
    info!("torne {}", env!("TORNE_VERSION"));

    let timing = config.logging.timing;
    let started = Instant::now();
    let mut model = match Model::initialize(config) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };
    match model.run() {
        Ok(()) => {
            if timing {
                info!("wall clock: {:.3} s", started.elapsed().as_secs_f64());
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            // Keep whatever frames made it into the buffers.
            let _ = model.finalize();
            eprintln!("{e}");
            error!(
                "simulation failed at t = {} s with return code {:?}",
                model.get_current_time(),
                model.return_code()
            );
            ExitCode::FAILURE
        }
    }
}
