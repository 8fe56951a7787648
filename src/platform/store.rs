use super::ConfigurationStore;
use crate::negotiation::ConfigurationRequest;
use std::sync::{Arc, Mutex};

/// In-memory store. Clones share the same slot, so a caller can keep one
/// clone to observe what the session saved.
#[derive(Debug, Clone, Default)]
pub struct MemoryConfigurationStore {
    slot: Arc<Mutex<ConfigurationRequest>>,
    saves: Arc<Mutex<u64>>,
}

impl MemoryConfigurationStore {
    pub fn new(initial: ConfigurationRequest) -> Self {
        Self {
            slot: Arc::new(Mutex::new(initial)),
            saves: Arc::new(Mutex::new(0)),
        }
    }

    pub fn current(&self) -> ConfigurationRequest {
        self.load()
    }

    pub fn save_count(&self) -> u64 {
        *self.saves.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl ConfigurationStore for MemoryConfigurationStore {
    fn load(&self) -> ConfigurationRequest {
        self.slot.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn save(&mut self, request: &ConfigurationRequest) {
        *self.slot.lock().unwrap_or_else(|e| e.into_inner()) = request.clone();
        let mut saves = self.saves.lock().unwrap_or_else(|e| e.into_inner());
        *saves = saves.saturating_add(1);
    }
}
