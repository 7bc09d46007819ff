//! Platform registry for looking up platform definitions.

use std::collections::HashMap;
use std::sync::Arc;

use super::definition::PlatformDefinition;
use super::vendors;
use crate::error::{PlatformError, Result};

/// Registry of platform definitions, keyed by name.
///
/// There is no process-wide instance: callers build one (usually with
/// [`PlatformRegistry::with_builtins`]) and pass it where it is needed.
#[derive(Debug, Default)]
pub struct PlatformRegistry {
    platforms: HashMap<String, Arc<PlatformDefinition>>,
}

impl PlatformRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            platforms: HashMap::new(),
        }
    }

    /// A registry holding the built-in device families.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for platform in [vendors::cisco_ios::platform(), vendors::f5_bigip::platform()] {
            registry
                .platforms
                .insert(platform.name.clone(), Arc::new(platform));
        }
        registry
    }

    /// Register a platform definition.
    pub fn register(&mut self, platform: PlatformDefinition) -> Result<()> {
        if self.platforms.contains_key(&platform.name) {
            return Err(PlatformError::AlreadyRegistered {
                name: platform.name.clone(),
            }
            .into());
        }
        platform.validate()?;
        self.platforms
            .insert(platform.name.clone(), Arc::new(platform));
        Ok(())
    }

    /// Register a platform, replacing any existing one with the same name.
    pub fn replace(&mut self, platform: PlatformDefinition) -> Result<()> {
        platform.validate()?;
        self.platforms
            .insert(platform.name.clone(), Arc::new(platform));
        Ok(())
    }

    /// Get a platform by name.
    pub fn get(&self, name: &str) -> Option<Arc<PlatformDefinition>> {
        self.platforms.get(name).cloned()
    }

    /// Get a platform by name or fail with [`PlatformError::UnknownPlatform`].
    pub fn resolve(&self, name: &str) -> Result<Arc<PlatformDefinition>> {
        self.get(name).ok_or_else(|| {
            PlatformError::UnknownPlatform {
                name: name.to_string(),
            }
            .into()
        })
    }

    /// Check if a platform is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.platforms.contains_key(name)
    }

    /// List all registered platform names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.platforms.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::PromptSignature;
    use crate::error::Error;

    #[test]
    fn test_builtins() {
        let registry = PlatformRegistry::with_builtins();
        assert_eq!(registry.names(), vec!["cisco_ios", "f5_bigip"]);
        assert!(registry.contains("cisco_ios"));
        assert!(registry.get("juniper_junos").is_none());
    }

    #[test]
    fn test_resolve_unknown() {
        let registry = PlatformRegistry::new();
        let err = registry.resolve("cisco_ios").unwrap_err();
        assert!(matches!(
            err,
            Error::Platform(PlatformError::UnknownPlatform { .. })
        ));
    }

    #[test]
    fn test_register_duplicate() {
        let mut registry = PlatformRegistry::with_builtins();
        let dup = PlatformDefinition::new("cisco_ios", PromptSignature::new(&[r"#"]).unwrap());
        assert!(registry.register(dup.clone()).is_err());
        assert!(registry.replace(dup).is_ok());
        assert!(registry.get("cisco_ios").unwrap().elevation.is_none());
    }

    #[test]
    fn test_register_validates() {
        let mut registry = PlatformRegistry::new();
        let bad = PlatformDefinition::new("bad", PromptSignature::new::<&str>(&[]).unwrap());
        assert!(registry.register(bad).is_err());
        assert!(!registry.contains("bad"));
    }
}
