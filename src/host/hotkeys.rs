use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::info;

use crate::error::{RecorderError, RecorderResult};
use crate::events::UiEvent;

pub const DEFAULT_START_STOP: &str = "F9";
pub const DEFAULT_PAUSE_RESUME: &str = "F10";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HotkeyAction {
    StartStop,
    PauseResume,
}

impl HotkeyAction {
    /// Event forwarded to the UI when this shortcut fires
    pub fn event(self) -> UiEvent {
        match self {
            HotkeyAction::StartStop => UiEvent::HotkeyStartStop,
            HotkeyAction::PauseResume => UiEvent::HotkeyPauseResume,
        }
    }
}

/// Process-wide shortcut bindings
#[derive(Debug, Default)]
pub struct HotkeyRegistry {
    bindings: HashMap<String, HotkeyAction>,
}

fn normalize(accelerator: &str) -> String {
    accelerator
        .split('+')
        .map(|part| part.trim().to_ascii_uppercase())
        .collect::<Vec<_>>()
        .join("+")
}

impl HotkeyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, accelerator: &str, action: HotkeyAction) -> RecorderResult<()> {
        let key = normalize(accelerator);
        if key.is_empty() || key.split('+').any(str::is_empty) {
            return Err(RecorderError::InvalidRequest(format!(
                "invalid accelerator '{}'",
                accelerator
            )));
        }
        if let Some(existing) = self.bindings.get(&key) {
            return Err(RecorderError::InvalidRequest(format!(
                "{} is already bound to {:?}",
                key, existing
            )));
        }
        info!("Registered global shortcut {} -> {:?}", key, action);
        self.bindings.insert(key, action);
        Ok(())
    }

    pub fn resolve(&self, accelerator: &str) -> Option<HotkeyAction> {
        self.bindings.get(&normalize(accelerator)).copied()
    }

    /// Release every binding, returning how many were held
    pub fn unregister_all(&mut self) -> usize {
        let count = self.bindings.len();
        self.bindings.clear();
        if count > 0 {
            info!("Released {} global shortcuts", count);
        }
        count
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_resolve_case_insensitive() {
        let mut registry = HotkeyRegistry::new();
        registry.register(DEFAULT_START_STOP, HotkeyAction::StartStop).unwrap();
        registry
            .register("ctrl + shift + p", HotkeyAction::PauseResume)
            .unwrap();

        assert_eq!(registry.resolve("f9"), Some(HotkeyAction::StartStop));
        assert_eq!(registry.resolve("Ctrl+Shift+P"), Some(HotkeyAction::PauseResume));
        assert_eq!(registry.resolve("F11"), None);
    }

    #[test]
    fn test_duplicate_and_empty_bindings_rejected() {
        let mut registry = HotkeyRegistry::new();
        registry.register("F9", HotkeyAction::StartStop).unwrap();

        assert!(registry.register("f9", HotkeyAction::PauseResume).is_err());
        assert!(registry.register("", HotkeyAction::PauseResume).is_err());
        assert!(registry.register("Ctrl+", HotkeyAction::PauseResume).is_err());
    }

    #[test]
    fn test_unregister_all() {
        let mut registry = HotkeyRegistry::new();
        registry.register("F9", HotkeyAction::StartStop).unwrap();
        registry.register("F10", HotkeyAction::PauseResume).unwrap();

        assert_eq!(registry.unregister_all(), 2);
        assert!(registry.is_empty());
        assert_eq!(registry.resolve("F9"), None);
    }
}
