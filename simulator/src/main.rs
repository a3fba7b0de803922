mod camera;

use camera::SimulatedCamera;
use converge3a_common::config::{Config, ConfigError};
use converge3a_common::frame::RequestNumber;
use converge3a_listener::{
    Deferred, Listener3A, ListenerError, Result3A, Result3AStateListener, Status3A, WaitError,
};
use futures_util::future::join_all;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum SimulatorError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("invalid 3A wait: {0}")]
    Listener(#[from] ListenerError),
}

#[tokio::main]
async fn main() {
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    let config = match Config::load(&config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {e}", config_path.display());
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.parse().unwrap_or_default()),
        )
        .init();

    info!(
        frame_limit = ?config.wait.frame_limit,
        time_limit_ms = ?config.wait.time_limit_ms,
        first_request = config.simulation.first_request,
        frames = config.simulation.frames,
        "starting 3A convergence simulation"
    );

    match run(config).await {
        Ok(outcome) => report(outcome),
        Err(e) => {
            error!(error = %e, "simulation failed");
            std::process::exit(1);
        }
    }
}

async fn run(config: Config) -> Result<Result<Result3A, WaitError>, SimulatorError> {
    let listener = Arc::new(Result3AStateListener::from_entries(
        config.wait.exit_condition_entries(),
        config.wait.frame_limit,
        config.wait.time_limit_ms.map(Duration::from_millis),
    )?);
    let result = listener.get_result();

    let dispatch = Arc::new(Listener3A::new());
    dispatch.add_listener(listener);
    dispatch.on_request_sequence_created(RequestNumber(config.simulation.first_request));

    let camera = SimulatedCamera::new(config.simulation);
    let lanes = join_all(camera.spawn_callbacks(Arc::clone(&dispatch)));

    let outcome = tokio::select! {
        biased;
        outcome = result.wait() => outcome,
        delivered = lanes => {
            let delivered: u64 = delivered.into_iter().filter_map(Result::ok).sum();
            finish_after_lanes(&dispatch, &result, delivered).await
        }
        Ok(()) = tokio::signal::ctrl_c() => {
            info!("interrupted, closing session");
            dispatch.cancel_all();
            result.wait().await
        }
    };

    // Lanes that are still running stop on their own once nothing is listening.
    dispatch.cancel_all();
    Ok(outcome)
}

/// All callback lanes are done. Lanes also stop once the listener resolves,
/// so only a still-pending wait means the camera ran dry.
async fn finish_after_lanes(
    dispatch: &Listener3A,
    result: &Deferred<Result3A>,
    delivered: u64,
) -> Result<Result3A, WaitError> {
    if !result.is_terminal() {
        warn!(delivered, "camera ran out of frames before the 3A wait finished");
        dispatch.cancel_all();
    }
    result.wait().await
}

fn report(outcome: Result<Result3A, WaitError>) {
    match outcome {
        Ok(Result3A {
            frame_number,
            status: Status3A::Ok,
        }) => info!(frame = %frame_number, "3A converged"),
        Ok(Result3A {
            frame_number,
            status,
        }) => warn!(frame = %frame_number, %status, "3A did not converge"),
        Err(e) => warn!(error = %e, "3A wait abandoned"),
    }
}
