use crate::device::{DeviceClass, Privilege};
use crate::TopologyError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Resolver settings, usually read from a JSON file.
///
/// ```json
/// { "privilege": "standard", "device_classes": ["disk"] }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResolverOptions {
    /// Overrides the detected privilege level when set.
    pub privilege: Option<Privilege>,
    /// Device classes scanned when looking up a device by number.
    pub device_classes: Vec<DeviceClass>,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            privilege: None,
            device_classes: DeviceClass::storage_classes(),
        }
    }
}

impl ResolverOptions {
    pub fn from_json(json: &str) -> Result<Self, TopologyError> {
        let options: ResolverOptions = serde_json::from_str(json)
            .map_err(|e| TopologyError::Configuration(format!("Failed to parse options: {}", e)))?;
        options.validate()?;
        Ok(options)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, TopologyError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            TopologyError::Configuration(format!("Failed to read {}: {}", path.display(), e))
        })?;
        log::debug!("Loaded resolver options from {}", path.display());
        Self::from_json(&json)
    }

    pub fn validate(&self) -> Result<(), TopologyError> {
        if self.device_classes.is_empty() {
            return Err(TopologyError::Configuration(
                "device_classes must name at least one class".to_string(),
            ));
        }
        Ok(())
    }

    pub fn effective_privilege(&self, detected: Privilege) -> Privilege {
        self.privilege.unwrap_or(detected)
    }
}
