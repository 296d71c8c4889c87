// Profiles Configuration
// Loads warehouse credentials from a dbt-style YAML profiles file

use crate::db::credentials::{Credentials, ADAPTER_TYPE};
use crate::db::traits::AdapterError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Overrides the directory holding `profiles.yml`
pub const PROFILES_DIR_ENV: &str = "DBT_PROFILES_DIR";
pub const PROFILES_FILE_NAME: &str = "profiles.yml";

/// Top-level key holding global settings rather than a profile
const GLOBAL_CONFIG_KEY: &str = "config";

fn default_threads() -> u32 {
    1
}

/// One named profile: a default target plus its outputs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub target: String,
    #[serde(default)]
    pub outputs: HashMap<String, serde_json::Value>,
}

/// Resolved target ready to hand to a connection manager
#[derive(Debug, Clone)]
pub struct TargetConfig {
    pub profile_name: String,
    pub target_name: String,
    pub threads: u32,
    pub credentials: Credentials,
}

/// Contents of a profiles file, keyed by profile name
#[derive(Debug, Clone, Default)]
pub struct ProfilesFile {
    pub profiles: HashMap<String, Profile>,
}

impl ProfilesFile {
    /// `$DBT_PROFILES_DIR/profiles.yml`, else `~/.dbt/profiles.yml`
    pub fn default_path() -> Result<PathBuf, AdapterError> {
        if let Ok(dir) = std::env::var(PROFILES_DIR_ENV) {
            if !dir.is_empty() {
                return Ok(PathBuf::from(dir).join(PROFILES_FILE_NAME));
            }
        }
        let base = directories::BaseDirs::new()
            .ok_or_else(|| AdapterError::Config("home directory not found".to_string()))?;
        Ok(base.home_dir().join(".dbt").join(PROFILES_FILE_NAME))
    }

    pub fn load(path: &Path) -> Result<Self, AdapterError> {
        let contents = fs::read_to_string(path).map_err(|e| {
            AdapterError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_yaml_str(&contents)
    }

    /// Parse a profiles document. A top-level `config:` block is ignored.
    pub fn from_yaml_str(contents: &str) -> Result<Self, AdapterError> {
        let mut root: HashMap<String, serde_yaml::Value> = serde_yaml::from_str(contents)
            .map_err(|e| AdapterError::Config(format!("failed to parse profiles: {}", e)))?;
        root.remove(GLOBAL_CONFIG_KEY);

        let profiles = root
            .into_iter()
            .map(|(name, value)| {
                serde_yaml::from_value::<Profile>(value)
                    .map(|profile| (name.clone(), profile))
                    .map_err(|e| {
                        AdapterError::Config(format!("invalid profile '{}': {}", name, e))
                    })
            })
            .collect::<Result<HashMap<_, _>, _>>()?;

        Ok(Self { profiles })
    }

    /// Pick a target (the profile default when `target` is None) and validate
    /// its credentials. `type` and `threads` belong to the profile entry, not
    /// the credential record, and are stripped before validation.
    pub fn resolve(
        &self,
        profile_name: &str,
        target: Option<&str>,
    ) -> Result<TargetConfig, AdapterError> {
        let profile = self
            .profiles
            .get(profile_name)
            .ok_or_else(|| AdapterError::Config(format!("profile '{}' not found", profile_name)))?;
        let target_name = target.unwrap_or(profile.target.as_str());
        let output = profile.outputs.get(target_name).ok_or_else(|| {
            AdapterError::Config(format!(
                "target '{}' not found in profile '{}'",
                target_name, profile_name
            ))
        })?;

        let mut fields = output
            .as_object()
            .cloned()
            .ok_or_else(|| {
                AdapterError::SchemaValidation(format!(
                    "target '{}' must be an object",
                    target_name
                ))
            })?;

        if let Some(kind) = fields.remove("type") {
            if kind.as_str() != Some(ADAPTER_TYPE) {
                return Err(AdapterError::Config(format!(
                    "target '{}' has type {}, expected '{}'",
                    target_name, kind, ADAPTER_TYPE
                )));
            }
        }
        let threads = match fields.remove("threads") {
            Some(value) => value
                .as_u64()
                .filter(|n| *n > 0)
                .map(|n| n as u32)
                .ok_or_else(|| {
                    AdapterError::SchemaValidation(format!(
                        "threads must be a positive integer, got {}",
                        value
                    ))
                })?,
            None => default_threads(),
        };

        let credentials = Credentials::from_value(serde_json::Value::Object(fields))?;
        Ok(TargetConfig {
            profile_name: profile_name.to_string(),
            target_name: target_name.to_string(),
            threads,
            credentials,
        })
    }
}
