//! Configuration for the gate server.

/// Configuration for the gate.
#[derive(Debug, Clone)]
pub struct GateConfig {
    /// Maximum number of resources in one bulk request.
    pub max_bulk: usize,
    /// Icon names served by the onboarding icon-listing call.
    pub icons: Vec<String>,
}

impl GateConfig {
    /// Creates a configuration with default limits and icon catalog.
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_bulk: 100,
            icons: [
                "list", "cart", "gift", "star", "heart", "home", "briefcase", "plane",
            ]
            .iter()
            .map(|s| (*s).to_string())
            .collect(),
        }
    }

    /// Sets the bulk batch limit.
    #[must_use]
    pub fn with_max_bulk(mut self, max: usize) -> Self {
        self.max_bulk = max;
        self
    }

    /// Replaces the icon catalog.
    #[must_use]
    pub fn with_icons(mut self, icons: Vec<String>) -> Self {
        self.icons = icons;
        self
    }
}

impl Default for GateConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = GateConfig::default();
        assert_eq!(config.max_bulk, 100);
        assert!(!config.icons.is_empty());
    }

    #[test]
    fn builder_overrides() {
        let config = GateConfig::new()
            .with_max_bulk(10)
            .with_icons(vec!["cat".into()]);
        assert_eq!(config.max_bulk, 10);
        assert_eq!(config.icons, vec!["cat".to_string()]);
    }
}
