use std::sync::Arc;

use crate::app::App;
use crate::events::EventBus;
use crate::host::HostHandle;
use crate::permission::PermissionGate;
use crate::session::SessionController;

/// Body limit for save-video when none is configured
pub const DEFAULT_UPLOAD_LIMIT: usize = 1024 * 1024 * 1024;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub host: HostHandle,
    pub controller: SessionController,
    pub permission: Arc<PermissionGate>,
    pub events: EventBus,
    pub upload_limit: usize,
}

impl AppState {
    pub fn new(
        host: HostHandle,
        controller: SessionController,
        permission: Arc<PermissionGate>,
        events: EventBus,
    ) -> Self {
        Self {
            host,
            controller,
            permission,
            events,
            upload_limit: DEFAULT_UPLOAD_LIMIT,
        }
    }

    pub fn with_upload_limit_mb(mut self, megabytes: usize) -> Self {
        self.upload_limit = megabytes.saturating_mul(1024 * 1024);
        self
    }
}

impl From<&App> for AppState {
    fn from(app: &App) -> Self {
        Self::new(
            app.host().clone(),
            app.controller().clone(),
            Arc::clone(app.permission()),
            app.events().clone(),
        )
    }
}
