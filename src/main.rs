mod app;
mod data;
mod logging;
mod monitor;
mod stop;

use app::SamplerConfig;
use monitor::NvmlMonitor;
use std::process::ExitCode;
use tracing::error;

#[tokio::main]
async fn main() -> ExitCode {
    logging::init();

    let config = SamplerConfig::default();
    let (handle, token) = stop::channel();
    let listener = match stop::listen(handle) {
        Ok(listener) => listener,
        Err(err) => {
            error!("Failed to install signal handler: {}", err);
            return ExitCode::FAILURE;
        }
    };

    // NVML calls block, keep them off the runtime threads
    let outcome = tokio::task::spawn_blocking(move || {
        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        app::run(NvmlMonitor::init, &config, &token, &mut out)
    })
    .await;
    listener.abort();

    match outcome {
        Ok(result) => {
            if let Err(err) = &result {
                error!("{}", err);
            }
            ExitCode::from(app::exit_status(&result))
        }
        Err(err) => {
            error!("Sampler task failed: {}", err);
            ExitCode::FAILURE
        }
    }
}
