use std::process::ExitCode;

use tracing::error;

mod app;

fn main() -> ExitCode {
    match app::bootstrap::build_app() {
        Ok(wiring) => app::loop_runner::run(wiring),
        Err(err) => {
            app::bootstrap::init_tracing(false);
            error!(error = %err, "startup_failed");
            ExitCode::FAILURE
        }
    }
}
