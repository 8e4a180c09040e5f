use crate::data::{MemorySample, UtilizationSample};
use nvml_wrapper::error::NvmlError;
use nvml_wrapper::{Device, Nvml};
use thiserror::Error;

#[cfg(test)]
use mockall::automock;

/// Error reported by the telemetry library, carrying its own description.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct BackendError(String);

impl BackendError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl From<NvmlError> for BackendError {
    fn from(err: NvmlError) -> Self {
        Self::new(err.to_string())
    }
}

/// Opaque handle to a device, valid until the backend is shut down.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeviceHandle(pub u32);

/// The queries the sampler needs from the GPU management library.
/// Initialization is the implementor's constructor.
#[cfg_attr(test, automock)]
pub trait TelemetryBackend {
    fn device_count(&self) -> Result<u32, BackendError>;
    fn device_handle(&self, index: u32) -> Result<DeviceHandle, BackendError>;
    fn device_name(&self, device: DeviceHandle) -> Result<String, BackendError>;
    fn utilization(&self, device: DeviceHandle) -> Result<UtilizationSample, BackendError>;
    fn memory(&self, device: DeviceHandle) -> Result<MemorySample, BackendError>;
    fn shutdown(self) -> Result<(), BackendError>;
}

pub struct NvmlMonitor {
    nvml: Nvml,
}

impl NvmlMonitor {
    pub fn init() -> Result<Self, BackendError> {
        let nvml = Nvml::init()?;
        Ok(Self { nvml })
    }

    // Resolve the device each time instead of holding a borrow of `nvml`
    fn device(&self, handle: DeviceHandle) -> Result<Device<'_>, BackendError> {
        Ok(self.nvml.device_by_index(handle.0)?)
    }
}

impl TelemetryBackend for NvmlMonitor {
    fn device_count(&self) -> Result<u32, BackendError> {
        Ok(self.nvml.device_count()?)
    }

    fn device_handle(&self, index: u32) -> Result<DeviceHandle, BackendError> {
        self.nvml.device_by_index(index)?;
        Ok(DeviceHandle(index))
    }

    fn device_name(&self, device: DeviceHandle) -> Result<String, BackendError> {
        Ok(self.device(device)?.name()?)
    }

    fn utilization(&self, device: DeviceHandle) -> Result<UtilizationSample, BackendError> {
        let util = self.device(device)?.utilization_rates()?;
        Ok(UtilizationSample { gpu: util.gpu })
    }

    fn memory(&self, device: DeviceHandle) -> Result<MemorySample, BackendError> {
        let mem = self.device(device)?.memory_info()?;
        Ok(MemorySample {
            used: mem.used,
            total: mem.total,
        })
    }

    fn shutdown(self) -> Result<(), BackendError> {
        Ok(self.nvml.shutdown()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_error_displays_library_text_verbatim() {
        let err = BackendError::new("Driver Not Loaded");
        assert_eq!(err.to_string(), "Driver Not Loaded");
    }

    #[test]
    fn nvml_errors_keep_their_description() {
        let err = BackendError::from(NvmlError::Uninitialized);
        assert_eq!(err.to_string(), NvmlError::Uninitialized.to_string());
    }

    #[test]
    fn mock_backend_reports_configured_samples() {
        let mut mock = MockTelemetryBackend::new();
        mock.expect_utilization()
            .with(mockall::predicate::eq(DeviceHandle(1)))
            .times(1)
            .returning(|_| Ok(UtilizationSample { gpu: 80 }));

        let util = mock.utilization(DeviceHandle(1)).unwrap();
        assert_eq!(util.gpu, 80);
    }
}
