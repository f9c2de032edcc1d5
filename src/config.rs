//! Runtime configuration types.

use serde::Deserialize;
use std::path::Path;

/// Machine limits for one run.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Number of stack cells. The top index must stay below this after
    /// every top-level instruction.
    pub stack_capacity: usize,
    /// Number of memory cells addressable by `Load`/`Store`.
    pub memory_capacity: usize,
    /// Cap on composition recursion depth (`Repeat`/`Extend`/
    /// `Conditional` nesting), distinct from the stack capacity.
    pub max_nesting_depth: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            stack_capacity: 100,
            memory_capacity: 1000,
            max_nesting_depth: 64,
        }
    }
}

/// Machine profile file (TOML). All fields optional; missing ones keep
/// their defaults.
///
/// ```toml
/// [limits]
/// stack_capacity = 200
/// memory_capacity = 4096
/// max_nesting_depth = 128
/// ```
#[derive(Debug, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub limits: Limits,
}

#[derive(Debug, Default, Deserialize)]
pub struct Limits {
    pub stack_capacity: Option<usize>,
    pub memory_capacity: Option<usize>,
    pub max_nesting_depth: Option<usize>,
}

impl Profile {
    /// Load a profile from a TOML file.
    pub fn load(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("failed to read {}: {}", path.display(), e))?;
        toml::from_str(&content)
            .map_err(|e| format!("failed to parse {}: {}", path.display(), e))
    }

    /// Overlay the profile's limits onto a configuration.
    pub fn apply(&self, config: &mut RuntimeConfig) {
        if let Some(n) = self.limits.stack_capacity {
            config.stack_capacity = n;
        }
        if let Some(n) = self.limits.memory_capacity {
            config.memory_capacity = n;
        }
        if let Some(n) = self.limits.max_nesting_depth {
            config.max_nesting_depth = n;
        }
    }
}
