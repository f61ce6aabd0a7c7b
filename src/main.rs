use flexi_logger::{FileSpec, Logger, LoggerHandle};
use gesnp::param::{self, Param};
use gesnp::ranking::{format_ranking, write_ranking};
use log::{error, info, warn};
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::iterator::Signals;
use std::error::Error;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::{env, thread};

fn start_logger(param: &Param) -> Result<LoggerHandle, Box<dyn Error>> {
    let logger = Logger::try_with_str(&param.general.log_level)?;
    let handle = if param.general.log_base.is_empty() {
        logger.start()?
    } else {
        logger
            .log_to_file(
                FileSpec::default()
                    .basename(&param.general.log_base)
                    .suffix(&param.general.log_suffix),
            )
            .start()?
    };
    Ok(handle)
}

/// Clears `running` on SIGINT or SIGTERM
fn watch_signals(running: Arc<AtomicBool>) -> Result<(), Box<dyn Error>> {
    let mut signals = Signals::new([SIGINT, SIGTERM])?;
    thread::spawn(move || {
        for signal in signals.forever() {
            warn!("Received signal {}: the current run will finish, no new run will start", signal);
            running.store(false, Ordering::SeqCst);
        }
    });
    Ok(())
}

fn try_main() -> Result<(), Box<dyn Error>> {
    let param_path = env::args().nth(1).unwrap_or_else(|| "param.yaml".to_string());
    let param = param::get(param_path.clone())?;
    let _logger = start_logger(&param)?;
    info!("gesnp {} using {}", gesnp::experiment::version_string(), param_path);

    let running = Arc::new(AtomicBool::new(true));
    watch_signals(Arc::clone(&running))?;

    let experiment = gesnp::run(&param, running)?;
    info!("\n{}", experiment.display_results());
    info!("\n{}", format_ranking(&experiment.ranking));

    write_ranking(&param.general.rank_file, &experiment.ranking)?;
    info!("Candidate interactions written to {}", param.general.rank_file);

    if !param.general.save_exp.is_empty() {
        match experiment.save_auto(&param.general.save_exp) {
            Ok(()) => info!("Experiment saved to {}", param.general.save_exp),
            Err(e) => warn!("Failed to save experiment: {}", e),
        }
    }

    Ok(())
}

fn main() {
    if let Err(e) = try_main() {
        error!("{}", e);
        eprintln!("gesnp: {}", e);
        std::process::exit(1);
    }
}
