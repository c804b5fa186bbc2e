use thiserror::Error;

#[derive(Debug, Error)]
pub enum TopologyError {
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Invalid device path: {0}")]
    InvalidPath(String),

    #[error("Platform not supported: {0}")]
    PlatformNotSupported(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(String),
}

impl TopologyError {
    /// Scans abort on these instead of skipping the candidate.
    pub fn is_permission_failure(&self) -> bool {
        match self {
            TopologyError::AccessDenied(_) => true,
            TopologyError::IoError(e) => e.kind() == std::io::ErrorKind::PermissionDenied,
            _ => false,
        }
    }
}
