//! Configuration registry
//!
//! Decides whether a configuration announced by an agent is known to the
//! manager. Standard configurations come from the registered
//! specializations; extended ones are learned from configuration reports
//! and kept in an [`ExtConfigStore`] keyed by `(system_id, config_id)`.

use crate::specialization::{Specialization, standard_specializations};
use phd_asn1::{ConfigObject, ConfigReport};
use phd_core::ConfigResult;
use phd_core::protocol::{is_extended_config_id, is_standard_config_id};
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Storage of extended configurations learned from agents
pub trait ExtConfigStore: Send + Sync {
    /// Check whether `config_id` was registered for `system_id`
    fn is_supported(&self, system_id: &[u8], config_id: u16) -> bool;

    /// Get the objects registered for `(system_id, config_id)`
    fn get_attributes(&self, system_id: &[u8], config_id: u16) -> Option<Vec<ConfigObject>>;

    /// Remember the objects of `(system_id, config_id)`
    fn register(&self, system_id: &[u8], config_id: u16, objects: Vec<ConfigObject>);
}

/// Extended configuration store held in memory
#[derive(Debug, Default)]
pub struct InMemoryExtConfigStore {
    entries: RwLock<HashMap<(Vec<u8>, u16), Vec<ConfigObject>>>,
}

impl InMemoryExtConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored configurations
    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    // A panic while holding the lock cannot leave a half-written map
    fn read(&self) -> RwLockReadGuard<'_, HashMap<(Vec<u8>, u16), Vec<ConfigObject>>> {
        self.entries.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<(Vec<u8>, u16), Vec<ConfigObject>>> {
        self.entries.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl ExtConfigStore for InMemoryExtConfigStore {
    fn is_supported(&self, system_id: &[u8], config_id: u16) -> bool {
        self.read().contains_key(&(system_id.to_vec(), config_id))
    }

    fn get_attributes(&self, system_id: &[u8], config_id: u16) -> Option<Vec<ConfigObject>> {
        self.read().get(&(system_id.to_vec(), config_id)).cloned()
    }

    fn register(&self, system_id: &[u8], config_id: u16, objects: Vec<ConfigObject>) {
        self.write().insert((system_id.to_vec(), config_id), objects);
    }
}

/// Known configurations, shared between connections
pub struct ConfigurationRegistry {
    standard: RwLock<HashMap<u16, Arc<dyn Specialization>>>,
    extended: Arc<dyn ExtConfigStore>,
}

impl ConfigurationRegistry {
    /// Create an empty registry backed by `extended`
    ///
    /// Call [`init`](Self::init) to load the standard configurations.
    pub fn new(extended: Arc<dyn ExtConfigStore>) -> Self {
        Self {
            standard: RwLock::new(HashMap::new()),
            extended,
        }
    }

    /// Registry with the standard configurations and an in-memory store
    pub fn with_defaults() -> Self {
        let registry = Self::new(Arc::new(InMemoryExtConfigStore::new()));
        registry.init();
        registry
    }

    /// Load the standard specializations
    pub fn init(&self) {
        for specialization in standard_specializations() {
            self.register_specialization(specialization);
        }
        log::debug!(
            "Configuration registry initialized with {} standard configurations",
            self.standard_read().len()
        );
    }

    /// Forget every standard configuration
    pub fn shutdown(&self) {
        self.standard_write().clear();
    }

    /// Add a specialization as a known standard configuration
    pub fn register_specialization(&self, specialization: Arc<dyn Specialization>) {
        self.standard_write()
            .insert(specialization.dev_config_id(), specialization);
    }

    /// Specialization registered for a standard configuration id
    pub fn specialization(&self, config_id: u16) -> Option<Arc<dyn Specialization>> {
        self.standard_read().get(&config_id).cloned()
    }

    /// Extended configuration store
    pub fn extended_store(&self) -> &Arc<dyn ExtConfigStore> {
        &self.extended
    }

    /// Check whether the manager knows `config_id` for `system_id`
    pub fn is_supported(&self, system_id: &[u8], config_id: u16) -> bool {
        if is_standard_config_id(config_id) && self.standard_read().contains_key(&config_id) {
            return true;
        }
        is_extended_config_id(config_id) && self.extended.is_supported(system_id, config_id)
    }

    /// Objects of a known configuration
    pub fn get(&self, system_id: &[u8], config_id: u16) -> Option<Vec<ConfigObject>> {
        if let Some(specialization) = self.specialization(config_id) {
            return Some(specialization.config_objects());
        }
        if is_extended_config_id(config_id) {
            return self.extended.get_attributes(system_id, config_id);
        }
        None
    }

    /// Evaluate a configuration report sent by an agent
    ///
    /// Known standard configurations are accepted as they are. Any other
    /// report carrying objects is accepted and remembered when its id is in
    /// the standard or extended range. An empty report only succeeds for a
    /// configuration that is already known.
    pub fn evaluate(&self, system_id: &[u8], report: &ConfigReport) -> ConfigResult {
        let config_id = report.config_report_id;
        if !is_standard_config_id(config_id) && !is_extended_config_id(config_id) {
            log::warn!("Configuration 0x{config_id:04X} is outside the assignable ranges");
            return ConfigResult::UnsupportedConfig;
        }

        if self.standard_read().contains_key(&config_id) {
            return ConfigResult::AcceptedConfig;
        }
        if report.config_obj_list.is_empty() {
            return if self.is_supported(system_id, config_id) {
                ConfigResult::AcceptedConfig
            } else {
                ConfigResult::StandardConfigUnknown
            };
        }

        self.extended
            .register(system_id, config_id, report.config_obj_list.clone());
        log::info!(
            "Registered configuration 0x{config_id:04X} with {} objects",
            report.config_obj_list.len()
        );
        ConfigResult::AcceptedConfig
    }

    fn standard_read(&self) -> RwLockReadGuard<'_, HashMap<u16, Arc<dyn Specialization>>> {
        self.standard.read().unwrap_or_else(|e| e.into_inner())
    }

    fn standard_write(&self) -> RwLockWriteGuard<'_, HashMap<u16, Arc<dyn Specialization>>> {
        self.standard.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for ConfigurationRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl std::fmt::Debug for ConfigurationRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut ids: Vec<u16> = self.standard_read().keys().copied().collect();
        ids.sort_unstable();
        f.debug_struct("ConfigurationRegistry")
            .field("standard", &ids)
            .finish_non_exhaustive()
    }
}
