use std::path::Path;

use anyhow::anyhow;
use config::{Config, File};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

/// Workspace options. File based sources use the snake_case keys; the editor's
/// `helm-ls` configuration section uses the camelCase aliases.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Settings {
    #[serde(alias = "logLevel")]
    pub log_level: String,
    #[serde(alias = "mainValuesFileName")]
    pub main_values_file_name: String,
    #[serde(alias = "additionalValuesFilesGlobPattern")]
    pub additional_values_files_glob_pattern: String,
    #[serde(alias = "lintOverlayValuesFileName")]
    pub lint_overlay_values_file_name: String,
    #[serde(alias = "validatorEnabled")]
    pub validator_enabled: bool,
    /// Executable of the yaml validator, started with `--stdio`.
    #[serde(alias = "validatorPath")]
    pub validator_path: String,
    /// Upper bound of diagnostics republished per document.
    #[serde(alias = "validatorDiagnosticsLimit")]
    pub validator_diagnostics_limit: usize,
    /// Passed through untouched as the validator's `yaml` settings section.
    #[serde(alias = "validatorSettings")]
    pub validator_settings: Value,
}

/// The subset of [`Settings`] the chart store cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValuesFilesConfig {
    pub main_values_file_name: String,
    pub additional_values_files_glob_pattern: String,
    pub lint_overlay_values_file_name: String,
}

impl Default for ValuesFilesConfig {
    fn default() -> Self {
        ValuesFilesConfig {
            main_values_file_name: "values.yaml".to_string(),
            additional_values_files_glob_pattern: "values*.yaml".to_string(),
            lint_overlay_values_file_name: "values.lint.yaml".to_string(),
        }
    }
}

pub fn default_validator_settings() -> Value {
    json!({
        "schemas": { "kubernetes": "templates/**" },
        "completion": true,
        "hover": true,
        "validate": true,
        "schemaStore": {
            "enable": true,
            "url": "https://www.schemastore.org/api/json/catalog.json"
        }
    })
}

impl Settings {
    pub fn new(root_dir: &Path) -> anyhow::Result<Settings> {
        let expanded = shellexpand::tilde("~/.config/helm-lens/settings");
        let defaults = Settings::default();
        let settings = Config::builder()
            .add_source(File::with_name(&expanded).required(false))
            .add_source(
                File::with_name(&format!(
                    "{}/.helm-lens",
                    root_dir
                        .to_str()
                        .ok_or(anyhow!("Can't convert root_dir to str"))?
                ))
                .required(false),
            )
            .set_default("log_level", defaults.log_level)?
            .set_default("main_values_file_name", defaults.main_values_file_name)?
            .set_default(
                "additional_values_files_glob_pattern",
                defaults.additional_values_files_glob_pattern,
            )?
            .set_default(
                "lint_overlay_values_file_name",
                defaults.lint_overlay_values_file_name,
            )?
            .set_default("validator_enabled", defaults.validator_enabled)?
            .set_default("validator_path", defaults.validator_path)?
            .set_default(
                "validator_diagnostics_limit",
                defaults.validator_diagnostics_limit as u64,
            )?
            .build()
            .map_err(|err| anyhow!("Build err: {err}"))?;

        let settings = settings.try_deserialize::<Settings>()?;

        anyhow::Ok(settings)
    }

    /// Overlay the editor's `helm-ls` configuration section on top of these settings.
    ///
    /// Fields absent from `section` keep their current value. A section that does not
    /// deserialize leaves the settings untouched.
    pub fn merged_with_client(&self, section: &Value) -> Settings {
        let Value::Object(overrides) = section else {
            debug!("workspace configuration is empty");
            return self.clone();
        };

        let mut current = match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => return self.clone(),
        };
        for (key, value) in overrides {
            current.insert(camel_to_snake(key), value.clone());
        }

        match serde_json::from_value::<Settings>(Value::Object(current)) {
            Ok(settings) => settings,
            Err(err) => {
                warn!("ignoring malformed workspace configuration: {err}");
                self.clone()
            }
        }
    }

    pub fn values_files_config(&self) -> ValuesFilesConfig {
        ValuesFilesConfig {
            main_values_file_name: self.main_values_file_name.clone(),
            additional_values_files_glob_pattern: self
                .additional_values_files_glob_pattern
                .clone(),
            lint_overlay_values_file_name: self.lint_overlay_values_file_name.clone(),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        let values = ValuesFilesConfig::default();
        Settings {
            log_level: "info".to_string(),
            main_values_file_name: values.main_values_file_name,
            additional_values_files_glob_pattern: values.additional_values_files_glob_pattern,
            lint_overlay_values_file_name: values.lint_overlay_values_file_name,
            validator_enabled: true,
            validator_path: "yaml-language-server".to_string(),
            validator_diagnostics_limit: 50,
            validator_settings: default_validator_settings(),
        }
    }
}

fn camel_to_snake(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    for c in key.chars() {
        if c.is_ascii_uppercase() {
            out.push('_');
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_defaults_without_config_files() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let settings = Settings::new(temp_dir.path()).expect("settings should build");

        assert_eq!(settings.main_values_file_name, "values.yaml");
        assert_eq!(settings.additional_values_files_glob_pattern, "values*.yaml");
        assert_eq!(settings.lint_overlay_values_file_name, "values.lint.yaml");
        assert!(settings.validator_enabled);
        assert_eq!(settings.validator_diagnostics_limit, 50);
    }

    #[test]
    fn test_workspace_file_overrides_defaults() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        fs::write(
            temp_dir.path().join(".helm-lens.yaml"),
            "main_values_file_name: custom.yaml\nvalidator_enabled: false\n",
        )
        .unwrap();

        let settings = Settings::new(temp_dir.path()).unwrap();

        assert_eq!(settings.main_values_file_name, "custom.yaml");
        assert!(!settings.validator_enabled);
        assert_eq!(settings.lint_overlay_values_file_name, "values.lint.yaml");
    }

    /// Test: The editor's camelCase section merges field by field.
    #[test]
    fn test_client_section_merges_camel_case_fields() {
        let settings = Settings::default();
        let merged = settings.merged_with_client(&json!({
            "mainValuesFileName": "value.yaml",
            "lintOverlayValuesFileName": "something.yaml",
            "validatorSettings": { "schemas": {} }
        }));

        assert_eq!(merged.main_values_file_name, "value.yaml");
        assert_eq!(merged.lint_overlay_values_file_name, "something.yaml");
        assert_eq!(merged.additional_values_files_glob_pattern, "values*.yaml");
        assert_eq!(merged.validator_settings, json!({ "schemas": {} }));
        assert_eq!(merged.log_level, "info");
    }

    /// Test: Settings serialize under their snake_case names, so a merge keeps
    /// every field the editor leaves out.
    #[test]
    fn test_merge_keeps_unmentioned_fields() {
        let mut settings = Settings::default();
        settings.validator_path = "/opt/yamlls".to_string();
        settings.validator_diagnostics_limit = 7;

        let serialized = serde_json::to_value(&settings).unwrap();
        assert_eq!(serialized["validator_path"], "/opt/yamlls");
        assert!(serialized.get("validatorPath").is_none());

        let merged = settings.merged_with_client(&json!({ "logLevel": "debug" }));
        assert_eq!(merged.log_level, "debug");
        assert_eq!(merged.validator_path, "/opt/yamlls");
        assert_eq!(merged.validator_diagnostics_limit, 7);
        assert_eq!(merged.validator_settings, settings.validator_settings);
    }

    #[test]
    fn test_malformed_client_section_is_ignored() {
        let settings = Settings::default();

        assert_eq!(settings.merged_with_client(&json!(null)), settings);
        assert_eq!(
            settings.merged_with_client(&json!({ "validatorEnabled": "sometimes" })),
            settings
        );
    }
}
