//! Detector registry
//!
//! Maps detector names to factories. A registry is an ordinary value built
//! at startup and handed to the executor; there is no process-wide table.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use contracts::{ContractError, Detector, DetectorConfig};
use tracing::{debug, instrument};

use super::precomputed::{PrecomputedDetector, PRECOMPUTED_DETECTOR};

/// Builds a detector instance from its launch config
pub type DetectorFactory =
    Arc<dyn Fn(&DetectorConfig) -> Result<Box<dyn Detector>, ContractError> + Send + Sync>;

/// Name -> factory table
#[derive(Clone, Default)]
pub struct DetectorRegistry {
    factories: BTreeMap<String, DetectorFactory>,
}

impl fmt::Debug for DetectorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DetectorRegistry")
            .field("detectors", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl DetectorRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in detectors (`precomputed`)
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.factories.insert(
            PRECOMPUTED_DETECTOR.to_string(),
            Arc::new(|config: &DetectorConfig| {
                let path = config.path.as_ref().ok_or_else(|| {
                    ContractError::config_validation(
                        "detector.path",
                        "precomputed detector requires a detection file",
                    )
                })?;
                let detector = PrecomputedDetector::from_path(path, config.class_names.clone())?;
                Ok(Box::new(detector) as Box<dyn Detector>)
            }),
        );
        registry
    }

    /// Register a detector factory.
    ///
    /// # Errors
    /// `DuplicateDetector` if the name is taken.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F) -> Result<(), ContractError>
    where
        F: Fn(&DetectorConfig) -> Result<Box<dyn Detector>, ContractError> + Send + Sync + 'static,
    {
        let name = name.into();
        if self.factories.contains_key(&name) {
            return Err(ContractError::DuplicateDetector { name });
        }
        debug!(detector = %name, "detector registered");
        self.factories.insert(name, Arc::new(factory));
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// Instantiate detector `name`.
    ///
    /// # Errors
    /// `DetectorNotRegistered` for unknown names, or whatever the factory returns.
    #[instrument(level = "debug", name = "detector_registry_build", skip(self, config))]
    pub fn build(&self, name: &str, config: &DetectorConfig) -> Result<Box<dyn Detector>, ContractError> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| ContractError::DetectorNotRegistered {
                name: name.to_string(),
            })?;
        factory(config)
    }
}
