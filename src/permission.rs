//! Camera and microphone permission gate
//!
//! Access is probed by opening a trial stream and stopping it straight away.
//! Recording is refused until the gate reports `Granted`.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::error::RecorderResult;
use crate::host::privacy_settings_uri;
use crate::media::{MediaDevices, MediaError, UserMediaConstraints};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionState {
    Granted,
    /// Refused or not yet answered
    #[default]
    Denied,
    /// Refused by OS privacy settings; only the settings page can fix it
    Blocked,
}

/// Permission state as reported to the UI
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionStatus {
    pub state: PermissionState,

    /// Where the user can lift a block, if the platform has such a page
    pub settings_uri: Option<String>,

    /// Error text from the last failed probe
    pub message: Option<String>,
}

pub struct PermissionGate {
    media: Arc<dyn MediaDevices>,
    state: RwLock<PermissionState>,
    last_error: RwLock<Option<String>>,
}

impl PermissionGate {
    pub fn new(media: Arc<dyn MediaDevices>) -> Self {
        Self {
            media,
            state: RwLock::new(PermissionState::Denied),
            last_error: RwLock::new(None),
        }
    }

    pub async fn state(&self) -> PermissionState {
        *self.state.read().await
    }

    pub async fn is_granted(&self) -> bool {
        self.state().await == PermissionState::Granted
    }

    pub async fn status(&self) -> PermissionStatus {
        PermissionStatus {
            state: self.state().await,
            settings_uri: privacy_settings_uri().map(str::to_string),
            message: self.last_error.read().await.clone(),
        }
    }

    /// Initial probe; any failure leaves the gate `Denied`
    pub async fn check(&self) -> PermissionState {
        let state = match self.probe().await {
            Ok(()) => PermissionState::Granted,
            Err(e) => {
                warn!("Permission check failed: {}", e);
                *self.last_error.write().await = Some(e.to_string());
                PermissionState::Denied
            }
        };
        self.set(state).await;
        state
    }

    /// Ask again after the user was told access is missing
    ///
    /// A policy refusal moves the gate to `Blocked` and is reported as a
    /// state; any other failure is returned as an error with the gate `Denied`.
    pub async fn retry(&self) -> RecorderResult<PermissionState> {
        match self.probe().await {
            Ok(()) => {
                self.set(PermissionState::Granted).await;
                Ok(PermissionState::Granted)
            }
            Err(MediaError::NotAllowed(message)) => {
                warn!("Camera/microphone access blocked: {}", message);
                *self.last_error.write().await = Some(message);
                self.set(PermissionState::Blocked).await;
                Ok(PermissionState::Blocked)
            }
            Err(e) => {
                *self.last_error.write().await = Some(e.to_string());
                self.set(PermissionState::Denied).await;
                Err(e.into())
            }
        }
    }

    async fn probe(&self) -> Result<(), MediaError> {
        let stream = self
            .media
            .user_media(&UserMediaConstraints::camera_and_microphone())
            .await?;
        stream.stop();
        Ok(())
    }

    async fn set(&self, state: PermissionState) {
        let mut current = self.state.write().await;
        if *current != state {
            info!("Permission state {:?} -> {:?}", *current, state);
        }
        *current = state;
        if state == PermissionState::Granted {
            *self.last_error.write().await = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::{PermissionBehavior, SyntheticMedia};

    #[tokio::test]
    async fn test_check_grants_when_allowed() {
        let media = Arc::new(SyntheticMedia::default());
        let gate = PermissionGate::new(media.clone());

        assert_eq!(gate.check().await, PermissionState::Granted);
        assert!(gate.is_granted().await);
        assert_eq!(media.user_media_requests(), 1);
    }

    #[tokio::test]
    async fn test_check_failure_is_denied_even_when_blocked() {
        let media = Arc::new(SyntheticMedia::default());
        media.set_permission(PermissionBehavior::Block);
        let gate = PermissionGate::new(media);

        assert_eq!(gate.check().await, PermissionState::Denied);
        assert!(gate.status().await.message.is_some());
    }

    #[tokio::test]
    async fn test_retry_distinguishes_blocked_from_denied() {
        let media = Arc::new(SyntheticMedia::default());
        let gate = PermissionGate::new(media.clone());

        media.set_permission(PermissionBehavior::Block);
        assert_eq!(gate.retry().await.unwrap(), PermissionState::Blocked);

        media.set_permission(PermissionBehavior::Deny);
        assert!(gate.retry().await.is_err());
        assert_eq!(gate.state().await, PermissionState::Denied);

        media.set_permission(PermissionBehavior::Allow);
        assert_eq!(gate.retry().await.unwrap(), PermissionState::Granted);
        assert!(gate.status().await.message.is_none());
    }
}
