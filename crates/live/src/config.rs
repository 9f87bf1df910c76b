use std::collections::HashMap;

/// Fixed lookup path for the credential token
pub const TOKEN_CONFIG_KEY: &str = "stream-services:constellation:token";

/// A string-valued configuration lookup
pub trait Config: Send + Sync + 'static {
    /// Returns the value at `key`, if set
    fn get(&self, key: &str) -> Option<String>;
}

/// Static, map-backed configuration
#[derive(Debug, Clone, Default)]
pub struct MapConfig {
    values: HashMap<String, String>,
}

impl MapConfig {
    /// Creates an empty configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a key/value pair
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }
}

impl Config for MapConfig {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }
}

/// Environment-backed configuration
///
/// Maps a `lower:case:path` key to the `UPPER_CASE_PATH` environment
/// variable (separators become underscores).
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvConfig;

impl Config for EnvConfig {
    fn get(&self, key: &str) -> Option<String> {
        let var = key.replace([':', '-', '.'], "_").to_uppercase();
        std::env::var(var).ok()
    }
}
