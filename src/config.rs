//! Ambient compiler configuration.
//!
//! A compiler-wide config struct, loadable from a YAML file or built with
//! [`Default`].

use serde::{Deserialize, Serialize};

/// Tunables that bound the otherwise-unbounded recursive phases of the
/// pipeline, and the remote import fallback list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// Whole-program fixed-point bound. Exceeding it raises
    /// `MacroError::MacroRecursion`.
    pub max_iterations: usize,
    /// Per-call recursive expansion depth bound. Exceeding it raises
    /// `MacroError::MacroDepth`.
    pub max_expand_depth: usize,
    /// Alias of `max_expand_depth` scoped to a single macro invocation;
    /// kept distinct in config so a host can tune them independently even
    /// though the expander currently enforces them identically.
    pub max_macro_recursion_depth: usize,
    /// Fallback hosts tried, in order, after a direct `npm:` import fails.
    pub cdn_roots: Vec<String>,
    pub enable_expansion_cache: bool,
}

fn default_cdn_roots() -> Vec<String> {
    DEFAULT_CDN_ROOTS.iter().map(|s| s.to_string()).collect()
}

static DEFAULT_CDN_ROOTS: once_cell::sync::Lazy<[&str; 2]> =
    once_cell::sync::Lazy::new(|| ["https://esm.sh", "https://cdn.skypack.dev"]);

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            max_expand_depth: 100,
            max_macro_recursion_depth: 100,
            cdn_roots: default_cdn_roots(),
            enable_expansion_cache: true,
        }
    }
}

impl CompilerConfig {
    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(text)
    }

    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_has_two_cdn_roots() {
        let cfg = CompilerConfig::default();
        assert_eq!(cfg.cdn_roots.len(), 2);
        assert_eq!(cfg.max_iterations, 100);
    }

    #[test]
    fn round_trips_through_yaml() {
        let cfg = CompilerConfig::default();
        let yaml = cfg.to_yaml().unwrap();
        let back = CompilerConfig::from_yaml(&yaml).unwrap();
        assert_eq!(back.max_iterations, cfg.max_iterations);
        assert_eq!(back.cdn_roots, cfg.cdn_roots);
    }

    #[test]
    fn partial_yaml_falls_back_to_defaults() {
        let cfg = CompilerConfig::from_yaml("max_iterations: 5\n").unwrap();
        assert_eq!(cfg.max_iterations, 5);
        assert_eq!(cfg.max_expand_depth, 100);
    }
}
