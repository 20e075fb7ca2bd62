//! Converter configuration.
//!
//! ```yaml
//! template_dirs:
//!   - ./templates/ccda
//! code_mapping: ./code_mapping.yaml
//! replace_filters: false
//! template_globals:
//!   render_narrative: true
//! ```
//!
//! Relative paths in a file loaded with [`ConverterConfig::load`] are
//! resolved against the directory containing that file.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::RenderError;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConverterConfig {
    /// Directories searched for templates, in priority order.
    pub template_dirs: Vec<PathBuf>,
    /// Code mapping file (YAML or JSON).
    pub code_mapping: Option<PathBuf>,
    /// Whether the conversion filters overwrite same-named custom filters.
    pub replace_filters: bool,
    /// Extra variables bound in every render.
    pub template_globals: serde_json::Map<String, serde_json::Value>,
}

impl ConverterConfig {
    pub fn from_yaml_str(source: &str) -> Result<Self, RenderError> {
        Ok(serde_yaml::from_str(source)?)
    }

    /// Reads a config file, anchoring relative paths at its directory.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, RenderError> {
        let path = path.as_ref();
        let mut config = Self::from_yaml_str(&std::fs::read_to_string(path)?)?;
        if let Some(base) = path.parent() {
            config.anchor(base);
        }
        Ok(config)
    }

    fn anchor(&mut self, base: &Path) {
        for dir in &mut self.template_dirs {
            if dir.is_relative() {
                *dir = base.join(&*dir);
            }
        }
        if let Some(mapping) = self.code_mapping.as_mut().filter(|p| p.is_relative()) {
            *mapping = base.join(&*mapping);
        }
    }

    /// Loads the configured code mapping, or an empty mapping when none is set.
    pub fn load_code_mapping(&self) -> Result<serde_json::Value, RenderError> {
        match &self.code_mapping {
            Some(path) => load_code_mapping(path),
            None => Ok(serde_json::Value::Object(Default::default())),
        }
    }
}

/// Reads a code mapping file. JSON is accepted as a subset of YAML.
pub fn load_code_mapping(path: impl AsRef<Path>) -> Result<serde_json::Value, RenderError> {
    let path = path.as_ref();
    let mapping: serde_json::Value = serde_yaml::from_str(&std::fs::read_to_string(path)?)?;
    if !mapping.is_object() {
        return Err(RenderError::ConfigError(format!(
            "code mapping {} must be a mapping",
            path.display()
        )));
    }
    Ok(mapping)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn defaults() {
        let config = ConverterConfig::from_yaml_str("{}").unwrap();
        assert_eq!(config, ConverterConfig::default());
        assert!(!config.replace_filters);
        assert_eq!(config.load_code_mapping().unwrap(), json!({}));
    }

    #[test]
    fn parses_all_fields() {
        let config = ConverterConfig::from_yaml_str(
            "template_dirs: [a, /abs/b]\ncode_mapping: cm.yaml\nreplace_filters: true\n",
        )
        .unwrap();
        assert_eq!(config.template_dirs, vec![PathBuf::from("a"), PathBuf::from("/abs/b")]);
        assert_eq!(config.code_mapping, Some(PathBuf::from("cm.yaml")));
        assert!(config.replace_filters);
    }

    #[test]
    fn parses_template_globals() {
        let config = ConverterConfig::from_yaml_str(
            "template_globals:\n  render_narrative: true\n  system: urn:x\n",
        )
        .unwrap();
        assert_eq!(config.template_globals["render_narrative"], json!(true));
        assert_eq!(config.template_globals["system"], json!("urn:x"));
    }

    #[test]
    fn rejects_unknown_fields() {
        assert!(matches!(
            ConverterConfig::from_yaml_str("template_dir: x"),
            Err(RenderError::SerializationError(_))
        ));
    }

    #[test]
    fn load_anchors_relative_paths() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("fhirconv.yaml");
        fs::write(&path, "template_dirs: [templates]\ncode_mapping: cm.json\n").unwrap();

        let config = ConverterConfig::load(&path).unwrap();
        assert_eq!(config.template_dirs, vec![tmp.path().join("templates")]);
        assert_eq!(config.code_mapping, Some(tmp.path().join("cm.json")));
    }

    #[test]
    fn code_mapping_yaml_and_json() {
        let tmp = TempDir::new().unwrap();
        let yaml = tmp.path().join("cm.yaml");
        fs::write(&yaml, "status:\n  active: {code: A}\n").unwrap();
        let json_file = tmp.path().join("cm.json");
        fs::write(&json_file, r#"{"status": {"active": {"code": "A"}}}"#).unwrap();

        let expected = json!({"status": {"active": {"code": "A"}}});
        assert_eq!(load_code_mapping(&yaml).unwrap(), expected);
        assert_eq!(load_code_mapping(&json_file).unwrap(), expected);
    }

    #[test]
    fn code_mapping_must_be_mapping() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("cm.yaml");
        fs::write(&path, "- a\n- b\n").unwrap();
        assert!(matches!(load_code_mapping(&path), Err(RenderError::ConfigError(_))));
    }

    #[test]
    fn missing_file_is_io_error() {
        assert!(matches!(
            ConverterConfig::load("/definitely/not/here.yaml"),
            Err(RenderError::IoError(_))
        ));
    }
}
