use std::process::ExitCode;

use engine::run_app;
use tracing::{error, info};

use super::bootstrap::AppWiring;

pub(crate) fn run(app: AppWiring) -> ExitCode {
    let AppWiring {
        config,
        mut director,
        initial_scene,
        mut input,
    } = app;

    match run_app(config, &mut director, &initial_scene, &mut input) {
        Ok(summary) => {
            info!(
                ticks = summary.ticks,
                simulated_ms = summary.simulated.as_millis() as u64,
                final_scene = summary.final_scene.as_deref().unwrap_or("none"),
                scenes_loaded = summary.scenes_loaded,
                stop_reason = ?summary.stop_reason,
                unplayed_inputs = input.remaining(),
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
