// FILE: src/cli/config.rs

use crate::error::{CompilerError, Result};
use crate::{CompilerOptions, ShadowPolicy};
use serde::{Deserialize, Serialize};
use std::fs;

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub buffer_size: Option<usize>,
    pub globals: Option<Vec<String>>,
    pub shadow_policy: Option<ShadowPolicy>,
    pub strict_identifiers: Option<bool>,
    pub disabled_filters: Option<Vec<String>>,
}

impl ConfigFile {
    /// Overlay the values present in the file onto `options`.
    pub fn apply(&self, options: &mut CompilerOptions) {
        if let Some(buffer_size) = self.buffer_size {
            options.buffer_size = buffer_size;
        }
        if let Some(globals) = &self.globals {
            options.globals = globals.clone();
        }
        if let Some(policy) = self.shadow_policy {
            options.shadow_policy = policy;
        }
        if let Some(strict) = self.strict_identifiers {
            options.strict_identifiers = strict;
        }
        if let Some(disabled) = &self.disabled_filters {
            options.disabled_filters = disabled.clone();
        }
    }
}

pub fn load(config_path: &str) -> Result<ConfigFile> {
    let config_content = fs::read_to_string(config_path).map_err(|e| CompilerError::FileNotFound {
        path: format!("Config file {}: {}", config_path, e),
    })?;

    let config = if config_path.ends_with(".json") {
        serde_json::from_str(&config_content).map_err(|e| CompilerError::InvalidFormat {
            message: format!("Invalid JSON config: {}", e),
        })?
    } else if config_path.ends_with(".toml") {
        toml::from_str(&config_content).map_err(|e| CompilerError::InvalidFormat {
            message: format!("Invalid TOML config: {}", e),
        })?
    } else {
        return Err(CompilerError::InvalidFormat {
            message: "Config file must be .json or .toml format".to_string(),
        });
    };
    log::info!("Loaded configuration from {}", config_path);
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(suffix: &str, content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_toml_config() {
        let file = write_config(
            ".toml",
            "buffer_size = 16\nshadow_policy = \"error\"\nglobals = [\"site\"]\n",
        );
        let config = load(file.path().to_str().unwrap()).unwrap();
        let mut options = CompilerOptions::default();
        config.apply(&mut options);
        assert_eq!(options.buffer_size, 16);
        assert_eq!(options.shadow_policy, ShadowPolicy::Error);
        assert_eq!(options.globals, vec!["site".to_string()]);
        assert!(!options.strict_identifiers);
    }

    #[test]
    fn test_json_config() {
        let file = write_config(".json", r#"{"strict_identifiers": true, "disabled_filters": ["join"]}"#);
        let config = load(file.path().to_str().unwrap()).unwrap();
        let mut options = CompilerOptions::default();
        config.apply(&mut options);
        assert!(options.strict_identifiers);
        assert_eq!(options.disabled_filters, vec!["join".to_string()]);
        assert_eq!(options.buffer_size, crate::core::DEFAULT_BUFFER_SIZE);
    }

    #[test]
    fn test_rejected_configs() {
        let unknown_key = write_config(".json", r#"{"optimization_level": 2}"#);
        assert!(matches!(
            load(unknown_key.path().to_str().unwrap()),
            Err(CompilerError::InvalidFormat { .. })
        ));

        let bad_policy = write_config(".toml", "shadow_policy = \"loud\"\n");
        assert!(load(bad_policy.path().to_str().unwrap()).is_err());

        let yaml = write_config(".yaml", "buffer_size: 1\n");
        assert!(load(yaml.path().to_str().unwrap()).is_err());

        assert!(matches!(load("/no/such/config.toml"), Err(CompilerError::FileNotFound { .. })));
    }
}
