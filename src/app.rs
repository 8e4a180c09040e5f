use crate::data::Reading;
use crate::monitor::{BackendError, DeviceHandle, TelemetryBackend};
use crate::stop::StopToken;
use std::io::Write;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, warn};

pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Clone, Debug)]
pub struct SamplerConfig {
    pub device_index: u32,
    pub interval: Duration,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            device_index: 0,
            interval: DEFAULT_INTERVAL,
        }
    }
}

#[derive(Error, Debug)]
pub enum SamplerError {
    #[error("failed to initialize NVML: {0}")]
    Init(#[source] BackendError),
    #[error("unable to query device count: {0}")]
    DeviceCount(#[source] BackendError),
    #[error("no NVIDIA devices found")]
    NoDevices,
    #[error("device {index} requested but only {count} found")]
    DeviceOutOfRange { index: u32, count: u32 },
    #[error("unable to get handle for device {index}: {source}")]
    DeviceHandle { index: u32, source: BackendError },
    #[error("failed to shut down NVML: {0}")]
    Shutdown(#[source] BackendError),
}

/// Process exit status for the outcome of [`run`].
pub fn exit_status(result: &Result<(), SamplerError>) -> u8 {
    match result {
        Ok(()) => 0,
        Err(_) => 1,
    }
}

/// Initializes the library through `init`, selects the configured device and
/// prints one reading per `config.interval` to `out` until `stop` fires.
pub fn run<B, F, W>(
    init: F,
    config: &SamplerConfig,
    stop: &StopToken,
    out: &mut W,
) -> Result<(), SamplerError>
where
    B: TelemetryBackend,
    F: FnOnce() -> Result<B, BackendError>,
    W: Write,
{
    let backend = init().map_err(SamplerError::Init)?;

    let device = match select_device(&backend, config.device_index) {
        Ok(device) => device,
        Err(err) => {
            if let Err(shutdown_err) = backend.shutdown() {
                warn!("Failed to shut down NVML: {}", shutdown_err);
            }
            return Err(err);
        }
    };

    match backend.device_name(device) {
        Ok(name) => emit(out, format_args!("Using GPU: {}", name)),
        Err(err) => warn!("Unable to get device name: {}", err),
    }

    while !stop.is_stopped() {
        let reading = sample(&backend, device);
        emit(out, format_args!("{}", reading));
        if stop.wait(config.interval) {
            break;
        }
    }
    debug!("Sampler loop stopped");

    backend.shutdown().map_err(SamplerError::Shutdown)?;
    emit(out, format_args!("Done. Exiting normally."));
    Ok(())
}

fn select_device<B: TelemetryBackend>(
    backend: &B,
    index: u32,
) -> Result<DeviceHandle, SamplerError> {
    let count = backend.device_count().map_err(SamplerError::DeviceCount)?;
    if count == 0 {
        return Err(SamplerError::NoDevices);
    }
    if index >= count {
        return Err(SamplerError::DeviceOutOfRange { index, count });
    }
    backend
        .device_handle(index)
        .map_err(|source| SamplerError::DeviceHandle { index, source })
}

// Both queries are always attempted; a failed one is left empty
fn sample<B: TelemetryBackend>(backend: &B, device: DeviceHandle) -> Reading {
    let utilization = backend
        .utilization(device)
        .inspect_err(|err| error!("Unable to get utilization rates: {}", err))
        .ok();
    let memory = backend
        .memory(device)
        .inspect_err(|err| error!("Unable to get memory info: {}", err))
        .ok();
    Reading {
        utilization,
        memory,
    }
}

fn emit<W: Write>(out: &mut W, line: std::fmt::Arguments<'_>) {
    if let Err(err) = writeln!(out, "{}", line).and_then(|()| out.flush()) {
        warn!("Failed to write to stdout: {}", err);
    }
}
