use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::Path;

pub const DEFAULT_CONFIG_FILE: &str = ".ada-eval.yaml";

/// How to settle an overload set that type matching could not narrow to one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OverloadPolicy {
    /// Ask the installed selector; behaves like `Error` when none is installed.
    #[default]
    Menu,
    /// Keep every remaining candidate.
    All,
    /// Keep the first candidate in lookup order.
    First,
    /// Report the ambiguity as an evaluation error.
    Error,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Largest byte length a fixed type may have before it is reported as corrupt.
    pub oversize_limit: u64,
    /// Advisory warnings shown per top-level evaluation.
    pub max_warnings: u32,
    /// Follow the runtime tag of tagged records to their dynamic type.
    pub trust_runtime_tags: bool,
    pub overload_policy: OverloadPolicy,
    /// Default bit order for packed data; `None` follows the binary's byte order.
    pub big_endian_bits: Option<bool>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            oversize_limit: 65536,
            max_warnings: 5,
            trust_runtime_tags: true,
            overload_policy: OverloadPolicy::Menu,
            big_endian_bits: None,
        }
    }
}

impl EngineConfig {
    pub fn from_yaml(text: &str) -> Result<Self> {
        let config: EngineConfig =
            serde_yaml::from_str(text).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml(&text)
    }

    /// Load `path` if it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() { Self::load(path) } else { Ok(Self::default()) }
    }

    fn validate(&self) -> Result<()> {
        if self.oversize_limit == 0 {
            return Err(Error::Config("oversize_limit must be greater than 0".into()));
        }
        if self.max_warnings == 0 {
            return Err(Error::Config("max_warnings must be greater than 0".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_document_uses_defaults() {
        let config = EngineConfig::from_yaml("{}").unwrap();
        assert_eq!(config.oversize_limit, 65536);
        assert_eq!(config.max_warnings, 5);
        assert!(config.trust_runtime_tags);
        assert_eq!(config.overload_policy, OverloadPolicy::Menu);
    }

    #[test]
    fn partial_document_overrides_fields() {
        let config =
            EngineConfig::from_yaml("oversize_limit: 1024\noverload_policy: first\n").unwrap();
        assert_eq!(config.oversize_limit, 1024);
        assert_eq!(config.overload_policy, OverloadPolicy::First);
        assert_eq!(config.max_warnings, 5);
    }

    #[test]
    fn zero_limits_are_rejected() {
        assert!(matches!(EngineConfig::from_yaml("oversize_limit: 0"), Err(Error::Config(_))));
        assert!(matches!(EngineConfig::from_yaml("max_warnings: 0"), Err(Error::Config(_))));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(EngineConfig::from_yaml("oversize: 10").is_err());
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "max_warnings: 2\nbig_endian_bits: true").unwrap();
        let config = EngineConfig::load(file.path()).unwrap();
        assert_eq!(config.max_warnings, 2);
        assert_eq!(config.big_endian_bits, Some(true));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = EngineConfig::load_or_default(&dir.path().join("absent.yaml")).unwrap();
        assert_eq!(config.max_warnings, 5);
    }
}
