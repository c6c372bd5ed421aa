use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Presets controlling how aggressively the refactorer rewrites a merged
/// AST.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RefactorSettings {
    /// Maximum recursion depth the refactor loop will descend to.
    pub max_depth: usize,
    /// Minimum number of predicates sharing a candidate pivot before a
    /// branch-rewrite is considered worthwhile.
    pub min_select: usize,
    /// Upper bound on peephole-optimizer passes per refactor iteration.
    pub max_opt_pass: usize,
    /// Minimum fraction of nodes a pass must change to be worth another
    /// iteration of the refactor loop.
    pub min_change: f64,
    /// Minimum duplicate-node density before the CSE compactor bothers
    /// wrapping a subtree in a cache node.
    pub min_density: f64,
}

impl RefactorSettings {
    pub fn minimum() -> Self {
        Self {
            max_depth: 2,
            min_select: 4,
            max_opt_pass: 2,
            min_change: 0.25,
            min_density: 0.5,
        }
    }

    pub fn shallow() -> Self {
        Self {
            max_depth: 4,
            min_select: 2,
            max_opt_pass: 4,
            min_change: 0.1,
            min_density: 0.25,
        }
    }

    pub fn deep() -> Self {
        Self {
            max_depth: 8,
            min_select: 2,
            max_opt_pass: 8,
            min_change: 0.05,
            min_density: 0.1,
        }
    }

    pub fn extreme() -> Self {
        Self {
            max_depth: 32,
            min_select: 1,
            max_opt_pass: 16,
            min_change: 0.0,
            min_density: 0.0,
        }
    }
}

impl Default for RefactorSettings {
    /// A moderate "shallow" default; extreme rewriting is opt-in.
    fn default() -> Self {
        Self::shallow()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub refactor: RefactorSettings,
    pub log_level: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            refactor: RefactorSettings::default(),
            log_level: "info".to_string(),
        }
    }
}

impl EngineConfig {
    /// Loads `CONFIG_FILE` (default `predctl.toml`) if present, otherwise
    /// returns the defaults.
    pub fn load() -> Result<Self> {
        let config_file =
            std::env::var("CONFIG_FILE").unwrap_or_else(|_| "predctl.toml".to_string());

        if std::path::Path::new(&config_file).exists() {
            let settings = config::Config::builder()
                .add_source(config::File::with_name(&config_file))
                .build()?;
            Ok(settings.try_deserialize()?)
        } else {
            Ok(Self::default())
        }
    }
}
