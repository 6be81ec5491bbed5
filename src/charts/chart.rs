use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use serde::Deserialize;
use tower_lsp::lsp_types::Position;
use tracing::warn;

use super::values::{key_positions, ValuesFiles};
use crate::config::ValuesFilesConfig;

pub const CHART_FILE_NAME: &str = "Chart.yaml";

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct Maintainer {
    pub name: String,
    pub email: String,
    pub url: String,
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct Dependency {
    pub name: String,
    pub version: String,
    pub repository: String,
    pub condition: String,
    pub alias: String,
}

/// Contents of `Chart.yaml`. Unknown keys are ignored and missing ones default.
#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct ChartMetadata {
    pub api_version: String,
    pub name: String,
    pub version: String,
    pub kube_version: String,
    pub description: String,
    #[serde(rename = "type")]
    pub chart_type: String,
    pub keywords: Vec<String>,
    pub home: String,
    pub sources: Vec<String>,
    pub dependencies: Vec<Dependency>,
    pub maintainers: Vec<Maintainer>,
    pub icon: String,
    pub app_version: String,
    pub deprecated: bool,
    pub annotations: BTreeMap<String, String>,
}

/// Accessor for one field of [`ChartMetadata`], rendered as YAML.
pub struct MetadataField {
    /// Name used in templates, `.Chart.<name>`.
    pub name: &'static str,
    /// Key in `Chart.yaml`.
    pub key: &'static str,
    pub get: fn(&ChartMetadata) -> String,
}

fn yaml_list<T: serde::Serialize>(items: &[T]) -> String {
    serde_yaml::to_string(items).unwrap_or_default()
}

pub static METADATA_FIELDS: &[MetadataField] = &[
    MetadataField {
        name: "APIVersion",
        key: "apiVersion",
        get: |m| m.api_version.clone(),
    },
    MetadataField {
        name: "Name",
        key: "name",
        get: |m| m.name.clone(),
    },
    MetadataField {
        name: "Version",
        key: "version",
        get: |m| m.version.clone(),
    },
    MetadataField {
        name: "KubeVersion",
        key: "kubeVersion",
        get: |m| m.kube_version.clone(),
    },
    MetadataField {
        name: "Description",
        key: "description",
        get: |m| m.description.clone(),
    },
    MetadataField {
        name: "Type",
        key: "type",
        get: |m| m.chart_type.clone(),
    },
    MetadataField {
        name: "Keywords",
        key: "keywords",
        get: |m| yaml_list(&m.keywords),
    },
    MetadataField {
        name: "Home",
        key: "home",
        get: |m| m.home.clone(),
    },
    MetadataField {
        name: "Sources",
        key: "sources",
        get: |m| yaml_list(&m.sources),
    },
    MetadataField {
        name: "Dependencies",
        key: "dependencies",
        get: |m| {
            let names: Vec<&str> = m.dependencies.iter().map(|d| d.name.as_str()).collect();
            yaml_list(&names)
        },
    },
    MetadataField {
        name: "Maintainers",
        key: "maintainers",
        get: |m| {
            let names: Vec<&str> = m.maintainers.iter().map(|d| d.name.as_str()).collect();
            yaml_list(&names)
        },
    },
    MetadataField {
        name: "Icon",
        key: "icon",
        get: |m| m.icon.clone(),
    },
    MetadataField {
        name: "AppVersion",
        key: "appVersion",
        get: |m| m.app_version.clone(),
    },
    MetadataField {
        name: "Deprecated",
        key: "deprecated",
        get: |m| m.deprecated.to_string(),
    },
    MetadataField {
        name: "Annotations",
        key: "annotations",
        get: |m| serde_yaml::to_string(&m.annotations).unwrap_or_default(),
    },
];

pub fn metadata_field(name: &str) -> Option<&'static MetadataField> {
    METADATA_FIELDS.iter().find(|field| field.name == name)
}

/// A chart directory: `Chart.yaml` plus its values files.
///
/// Charts are immutable once loaded. Reconfiguration and invalidation build new
/// ones, so a chart handed to a request never changes under it.
#[derive(Debug, Clone, PartialEq)]
pub struct Chart {
    pub root: PathBuf,
    pub metadata: ChartMetadata,
    metadata_positions: BTreeMap<String, Position>,
    pub values_files: ValuesFiles,
    /// Set for charts living in `<parent>/charts/<name>/`.
    pub parent_root: Option<PathBuf>,
    pub subcharts: Vec<PathBuf>,
}

impl Chart {
    pub fn load(root: &Path, config: &ValuesFilesConfig) -> Chart {
        let chart_file = root.join(CHART_FILE_NAME);
        let text = fs::read_to_string(&chart_file).unwrap_or_default();
        let metadata = match serde_yaml::from_str::<Option<ChartMetadata>>(&text) {
            Ok(metadata) => metadata.unwrap_or_default(),
            Err(err) => {
                warn!("failed to parse {}: {err}", chart_file.display());
                ChartMetadata::default()
            }
        };

        Chart {
            root: root.to_path_buf(),
            metadata,
            metadata_positions: top_level_key_positions(&text),
            values_files: ValuesFiles::load(root, config),
            parent_root: parent_chart_root(root),
            subcharts: subchart_roots(root),
        }
    }

    pub fn chart_file(&self) -> PathBuf {
        self.root.join(CHART_FILE_NAME)
    }

    pub fn templates_dir(&self) -> PathBuf {
        self.root.join("templates")
    }

    /// Name under which the parent chart addresses this chart's values.
    pub fn subchart_name(&self) -> Option<String> {
        self.parent_root.as_ref()?;
        self.root
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
    }

    /// Position of `.Chart.<field>` in `Chart.yaml`; the top of the file when the
    /// key is not written out.
    pub fn metadata_position(&self, field: &str) -> Position {
        metadata_field(field)
            .and_then(|field| self.metadata_positions.get(field.key))
            .copied()
            .unwrap_or_default()
    }
}

fn top_level_key_positions(text: &str) -> BTreeMap<String, Position> {
    key_positions(text)
        .into_iter()
        .filter_map(|(mut path, position)| (path.len() == 1).then(|| (path.remove(0), position)))
        .collect()
}

fn parent_chart_root(root: &Path) -> Option<PathBuf> {
    let charts_dir = root.parent()?;
    if charts_dir.file_name()? != "charts" {
        return None;
    }
    let parent = charts_dir.parent()?;
    parent
        .join(CHART_FILE_NAME)
        .is_file()
        .then(|| parent.to_path_buf())
}

fn subchart_roots(root: &Path) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(root.join("charts")) else {
        return Vec::new();
    };
    let mut roots: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.join(CHART_FILE_NAME).is_file())
        .collect();
    roots.sort();
    roots
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_accessors() {
        let metadata: ChartMetadata = serde_yaml::from_str(
            "apiVersion: v2\nname: demo\nversion: 1.2.3\nappVersion: \"2.0\"\nkeywords: [a, b]\n",
        )
        .unwrap();

        let get = |name| (metadata_field(name).unwrap().get)(&metadata);
        assert_eq!(get("Name"), "demo");
        assert_eq!(get("APIVersion"), "v2");
        assert_eq!(get("AppVersion"), "2.0");
        assert_eq!(get("Keywords"), "- a\n- b\n");
        assert!(metadata_field("Nope").is_none());
    }

    #[test]
    fn test_empty_and_malformed_chart_file_yield_default_metadata() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        fs::write(temp_dir.path().join(CHART_FILE_NAME), "").unwrap();
        let chart = Chart::load(temp_dir.path(), &ValuesFilesConfig::default());
        assert_eq!(chart.metadata, ChartMetadata::default());

        fs::write(temp_dir.path().join(CHART_FILE_NAME), "name: [oops").unwrap();
        let chart = Chart::load(temp_dir.path(), &ValuesFilesConfig::default());
        assert_eq!(chart.metadata, ChartMetadata::default());
    }

    /// Test: Quoted and flow style keys of `Chart.yaml` are located too; nested
    /// keys with a metadata name are not.
    #[test]
    fn test_metadata_positions_of_quoted_and_flow_keys() {
        let quoted = top_level_key_positions(
            "\"apiVersion\": v2\n'name': demo\nmaintainers:\n  - name: me\nversion: 1.0.0\n",
        );
        assert_eq!(quoted["apiVersion"].line, 0);
        assert_eq!(quoted["name"], Position::new(1, 0));
        assert_eq!(quoted["version"], Position::new(4, 0));

        let flow = top_level_key_positions("{name: demo, version: 1.0.0}\n");
        assert_eq!(flow["name"], Position::new(0, 1));
        assert_eq!(flow["version"], Position::new(0, 13));
    }

    #[test]
    fn test_metadata_positions_and_subchart_layout() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::write(root.join(CHART_FILE_NAME), "apiVersion: v2\nname: parent\n").unwrap();
        let sub = root.join("charts").join("redis");
        fs::create_dir_all(&sub).unwrap();
        fs::write(sub.join(CHART_FILE_NAME), "name: redis\n").unwrap();

        let parent = Chart::load(root, &ValuesFilesConfig::default());
        assert_eq!(parent.metadata_position("Name").line, 1);
        assert_eq!(parent.subcharts, vec![sub.clone()]);
        assert_eq!(parent.subchart_name(), None);

        let child = Chart::load(&sub, &ValuesFilesConfig::default());
        assert_eq!(child.metadata_position("Name"), Position::new(0, 0));
        assert_eq!(child.parent_root.as_deref(), Some(root));
        assert_eq!(child.subchart_name().as_deref(), Some("redis"));
    }
}
