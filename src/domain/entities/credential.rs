use serde::{Deserialize, Serialize};
use std::fmt;

/// Durable device token issued by the cloud on registration
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceToken(String);

impl DeviceToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Keep tokens out of logs
impl fmt::Debug for DeviceToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix: String = self.0.chars().take(8).collect();
        write!(f, "DeviceToken({}...)", prefix)
    }
}

/// Session credential persisted between restarts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionCredential {
    pub device_token: DeviceToken,
}

impl SessionCredential {
    pub fn new(device_token: DeviceToken) -> Self {
        Self { device_token }
    }
}
