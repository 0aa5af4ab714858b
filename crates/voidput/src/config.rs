use std::path::PathBuf;

use voidput_rewrite::RewriteConfig;

/// Comma-separated owner names of base store implementations to extend.
pub const BASE_IMPLS_ENV: &str = "VOIDPUT_BASE_IMPLS";
/// Directory that receives a copy of every artifact the agent transforms.
pub const DUMP_DIR_ENV: &str = "VOIDPUT_DUMP_DIR";

#[derive(Debug, Clone, Default)]
pub struct AgentConfig {
    /// Owners extended with the capability marker when they are defined.
    pub base_implementations: Vec<String>,
    pub dump_dir: Option<PathBuf>,
    pub rewrite: RewriteConfig,
}

impl AgentConfig {
    /// Reads [`BASE_IMPLS_ENV`] and [`DUMP_DIR_ENV`]; unset or blank
    /// variables leave the defaults in place.
    pub fn from_env() -> Self {
        Self::from_values(
            std::env::var(BASE_IMPLS_ENV).ok().as_deref(),
            std::env::var(DUMP_DIR_ENV).ok().as_deref(),
        )
    }

    pub fn from_values(base_impls: Option<&str>, dump_dir: Option<&str>) -> Self {
        let base_implementations = base_impls
            .map(|list| {
                list.split(',')
                    .map(str::trim)
                    .filter(|owner| !owner.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        let dump_dir = dump_dir
            .map(str::trim)
            .filter(|dir| !dir.is_empty())
            .map(PathBuf::from);

        Self {
            base_implementations,
            dump_dir,
            rewrite: RewriteConfig::default(),
        }
    }

    pub fn with_base_implementation(mut self, owner: impl Into<String>) -> Self {
        self.base_implementations.push(owner.into());
        self
    }

    pub fn with_dump_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dump_dir = Some(dir.into());
        self
    }

    pub fn is_base_implementation(&self, owner: &str) -> bool {
        self.base_implementations.iter().any(|b| b == owner)
    }
}
