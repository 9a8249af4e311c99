use std::process::ExitCode;
use std::time::SystemTime;

use rpg_engine::run_app;
use tracing::{error, info, warn};

use super::bootstrap::AppWiring;
use super::crash_report;

const CRASH_REPORT_DIR: &str = "crash-reports";

pub(crate) fn run(app: AppWiring) -> ExitCode {
    let AppWiring {
        config,
        paths,
        title_screen,
        localizer,
    } = app;
    let game_title = config.game_title.clone();

    let Err(err) = run_app(config, &paths, Box::new(title_screen), localizer) else {
        info!("=== shutdown ===");
        return ExitCode::SUCCESS;
    };

    error!(error = %err, "engine_failed");
    let report_dir = paths.root.join(CRASH_REPORT_DIR);
    match crash_report::write(&report_dir, &game_title, &err, SystemTime::now()) {
        Ok(path) => info!(path = %path.display(), "crash_report_written"),
        Err(write_err) => warn!(
            dir = %report_dir.display(),
            error = %write_err,
            "crash_report_write_failed"
        ),
    }
    ExitCode::FAILURE
}
