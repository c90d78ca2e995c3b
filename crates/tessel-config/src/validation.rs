//! Pluggable config validation strategies
//!
//! Separates filesystem validation (for CLI use) from schema validation (for library use).

use std::path::{Path, PathBuf};

use crate::error::{ConfigError, Result};
use crate::options::BuildOptions;

/// Trait for pluggable config validation strategies
pub trait ConfigValidator {
    fn validate(&self, config: &BuildOptions) -> Result<()>;
}

/// Schema-only validation (no filesystem checks)
///
/// # Example
///
/// ```
/// use tessel_config::{BuildOptions, ConfigValidator, SchemaValidator};
///
/// let config = BuildOptions::default().with_entry("index", "src/index.tsx");
/// SchemaValidator.validate(&config).unwrap();
/// ```
pub struct SchemaValidator;

impl ConfigValidator for SchemaValidator {
    fn validate(&self, config: &BuildOptions) -> Result<()> {
        if config.entries.is_empty() {
            return Err(ConfigError::NoEntries);
        }

        for (name, path) in &config.entries {
            if name.trim().is_empty() || path.as_os_str().is_empty() {
                return Err(ConfigError::SchemaValidation {
                    message: format!("entry '{}' has an empty name or path", name),
                    hint: Some("Each entry needs a logical name and a file path".to_string()),
                });
            }
        }

        if config.output_dir.as_os_str().is_empty() {
            return Err(ConfigError::SchemaValidation {
                message: "output_dir cannot be empty".to_string(),
                hint: None,
            });
        }

        if config.manifest.trim().is_empty() {
            return Err(ConfigError::SchemaValidation {
                message: "manifest file name cannot be empty".to_string(),
                hint: Some("The default is 'manifest.json'".to_string()),
            });
        }

        if config.workers == Some(0) {
            return Err(ConfigError::SchemaValidation {
                message: "workers must be at least 1".to_string(),
                hint: Some("Omit 'workers' to use the CPU count".to_string()),
            });
        }

        if !(4..=64).contains(&config.hash_length) {
            return Err(ConfigError::SchemaValidation {
                message: format!("hash_length {} is out of range (4 to 64)", config.hash_length),
                hint: None,
            });
        }

        if config.rules.is_empty() {
            return Err(ConfigError::SchemaValidation {
                message: "rule table is empty".to_string(),
                hint: Some("Remove 'rules' to use the default table".to_string()),
            });
        }

        for rule in &config.rules {
            if rule.stages.is_empty() {
                return Err(ConfigError::SchemaValidation {
                    message: format!("rule '{}' has no stages", rule.label()),
                    hint: Some("List at least one stage, e.g. stages = [\"file\"]".to_string()),
                });
            }
        }

        for (specifier, global) in &config.resolve.externals {
            if !is_global_path(global) {
                return Err(ConfigError::SchemaValidation {
                    message: format!(
                        "external '{}' maps to '{}', which is not a global name",
                        specifier, global
                    ),
                    hint: Some("Use an identifier or a dotted path, e.g. \"alt\" or \"window.alt\"".to_string()),
                });
            }
        }

        Ok(())
    }
}

/// `name` or `name.name...` with JavaScript identifier characters.
fn is_global_path(value: &str) -> bool {
    !value.is_empty()
        && value.split('.').all(|part| {
            let mut chars = part.chars();
            chars
                .next()
                .is_some_and(|c| c.is_ascii_alphabetic() || c == '_' || c == '$')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
        })
}

/// Filesystem validator (for CLI use)
///
/// Validates that entry points and the HTML template exist on disk.
pub struct FsValidator {
    root: PathBuf,
}

impl FsValidator {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }
}

impl ConfigValidator for FsValidator {
    fn validate(&self, config: &BuildOptions) -> Result<()> {
        SchemaValidator.validate(config)?;

        for (name, entry) in &config.entries {
            let path = self.root.join(entry);
            if !path.is_file() {
                return Err(ConfigError::EntryNotFound {
                    name: name.clone(),
                    path,
                });
            }
        }

        if let Some(html) = &config.html {
            let template = self.root.join(&html.template);
            if !template.is_file() {
                return Err(ConfigError::TemplateNotFound(template));
            }
        }

        Ok(())
    }
}

/// Validate without touching the filesystem.
pub fn validate_schema(config: &BuildOptions) -> Result<()> {
    SchemaValidator.validate(config)
}

/// Validate, including filesystem checks relative to `root`.
pub fn validate_fs(config: &BuildOptions, root: impl AsRef<Path>) -> Result<()> {
    FsValidator::new(root).validate(config)
}
