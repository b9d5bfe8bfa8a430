//! Device/session registry.

use crate::error::{ServerError, ServerResult};
use ledgersync_protocol::unix_millis;
use parking_lot::RwLock;
use std::collections::HashMap;
use uuid::Uuid;

/// A registered device and its pull progress.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceSession {
    /// Device id.
    pub device_id: Uuid,
    /// User the device belongs to.
    pub user_id: String,
    /// Highest watermark the device has reported as fully applied.
    pub last_watermark: u64,
    /// When the device first registered (Unix millis).
    pub registered_at_ms: i64,
}

/// Tracks device identity and pull watermarks.
///
/// One row per device; registering an already-known device is a no-op,
/// which keeps a reinstalling device from creating a duplicate session.
/// A device may never move between users.
pub struct DeviceRegistry {
    sessions: RwLock<HashMap<Uuid, DeviceSession>>,
}

impl DeviceRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Registers a device for a user. Re-registering with the same user is
    /// a no-op; a different user is rejected.
    pub fn register(&self, device_id: Uuid, user_id: &str) -> ServerResult<()> {
        let mut sessions = self.sessions.write();
        match sessions.get(&device_id) {
            Some(session) if session.user_id != user_id => Err(ServerError::NotAuthorized(
                format!("device {device_id} is registered to another user"),
            )),
            Some(_) => Ok(()),
            None => {
                sessions.insert(
                    device_id,
                    DeviceSession {
                        device_id,
                        user_id: user_id.to_string(),
                        last_watermark: 0,
                        registered_at_ms: unix_millis(),
                    },
                );
                Ok(())
            }
        }
    }

    /// Returns the session for a device.
    pub fn session(&self, device_id: Uuid) -> Option<DeviceSession> {
        self.sessions.read().get(&device_id).cloned()
    }

    /// Records the watermark a device reported on pull. Watermarks only
    /// move forward.
    pub fn record_pull(&self, device_id: Uuid, watermark: u64) -> ServerResult<()> {
        let mut sessions = self.sessions.write();
        let session = sessions
            .get_mut(&device_id)
            .ok_or(ServerError::UnknownDevice(device_id))?;
        session.last_watermark = session.last_watermark.max(watermark);
        Ok(())
    }

    /// Returns all sessions belonging to a user.
    pub fn sessions_for_user(&self, user_id: &str) -> Vec<DeviceSession> {
        self.sessions
            .read()
            .values()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect()
    }

    /// Returns the number of registered devices.
    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    /// Returns true if no device is registered.
    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}

impl Default for DeviceRegistry {
    fn default() -> Self {
        Self::new()
    }
}
