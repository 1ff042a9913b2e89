use std::process::ExitCode;

use engine::run_app;
use tracing::{error, info};

use super::bootstrap::AppWiring;

pub(crate) fn run(app: AppWiring) -> ExitCode {
    let AppWiring {
        config,
        mut machine,
        first_scene,
        mut input,
        progress,
    } = app;

    match run_app(config, &mut machine, first_scene, &mut input) {
        Ok(summary) => {
            let progress = progress.borrow();
            info!(
                ticks = summary.ticks,
                switches = summary.switches_applied,
                stop_reason = ?summary.stop_reason,
                running_at_exit = ?summary.running_at_exit,
                gold = progress.stats.gold,
                experience = progress.stats.experience,
                quests = progress.quests.len(),
                "run_finished"
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(error = %err, "startup_failed");
            ExitCode::FAILURE
        }
    }
}
