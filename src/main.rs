use cryosig::param;
use flexi_logger::{FileSpec, Logger};
use log::{error, info};
use std::env;
use std::process;

fn main() {
    let args: Vec<String> = env::args().collect();
    let param_path = args.get(1).cloned().unwrap_or_else(|| "param.yaml".to_string());

    let param = match param::get(param_path.clone()) {
        Ok(param) => param,
        Err(e) => {
            eprintln!("Cannot load parameter file {}: {}", param_path, e);
            process::exit(1);
        }
    };

    let logger = match Logger::try_with_env_or_str(&param.general.log_level) {
        Ok(logger) => logger,
        Err(e) => {
            eprintln!("Invalid log level '{}': {}", param.general.log_level, e);
            process::exit(1);
        }
    };
    let logger = if param.general.log_base.is_empty() {
        logger
    } else {
        logger.log_to_file(
            FileSpec::default()
                .basename(param.general.log_base.clone())
                .suffix(param.general.log_suffix.clone()),
        )
    };
    let _logger_handle = match logger.start() {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("Cannot start logger: {}", e);
            process::exit(1);
        }
    };

    info!("cryosig v{} | parameters from {}", env!("CARGO_PKG_VERSION"), param_path);

    let experiment = match cryosig::run(&param) {
        Ok(experiment) => experiment,
        Err(e) => {
            error!("Pipeline failed: {}", e);
            process::exit(1);
        }
    };

    println!("{}", experiment.display_results());

    if !param.output.dir.is_empty() {
        if let Err(e) = experiment.export_tables(&param.output.dir) {
            error!("Cannot export result tables to {}: {}", param.output.dir, e);
            process::exit(1);
        }
    }

    if !param.output.save_exp.is_empty() {
        if let Err(e) = experiment.save(&param.output.save_exp) {
            error!("Cannot save experiment to {}: {}", param.output.save_exp, e);
            process::exit(1);
        }
        info!("Experiment saved to {}", param.output.save_exp);
    }
}
