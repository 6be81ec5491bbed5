//! Chart store: charts discovered from template locations, with their values files.
//!
//! Charts are loaded lazily the first time a document inside them is touched
//! and cached by root directory. Reconfiguration swaps the values file
//! configuration and drops the cache in one step; in-flight loads that started
//! under the old configuration are not cached.

mod chart;
mod values;


use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::Arc,
};

use parking_lot::RwLock;
use serde_yaml::Value;
use tower_lsp::lsp_types::{Location, Range, Url};
use tracing::debug;

pub use chart::{
    metadata_field, Chart, ChartMetadata, Dependency, Maintainer, MetadataField,
    CHART_FILE_NAME, METADATA_FIELDS,
};
pub use values::{ValuesFile, ValuesFileKind, ValuesFiles};

use crate::{
    config::ValuesFilesConfig,
    error::{Error, Result},
};

/// The values of one file at one selector.
#[derive(Debug, Clone)]
pub struct ResolvedValue {
    pub chart: Arc<Chart>,
    /// Index into `chart.values_files.all()`.
    pub file: usize,
    /// The selector as seen from the file's chart. Differs from the requested
    /// one for parent chart files of a subchart.
    pub selector: Vec<String>,
    pub value: Option<Value>,
}

impl ResolvedValue {
    pub fn values_file(&self) -> Option<&ValuesFile> {
        self.chart.values_files.all().nth(self.file)
    }
}

struct StoreState {
    config: Arc<ValuesFilesConfig>,
    generation: u64,
}

pub struct ChartStore {
    root_dir: PathBuf,
    state: RwLock<StoreState>,
    charts: RwLock<HashMap<PathBuf, Arc<Chart>>>,
}

impl ChartStore {
    pub fn new(root_dir: PathBuf, config: ValuesFilesConfig) -> ChartStore {
        ChartStore {
            root_dir,
            state: RwLock::new(StoreState {
                config: Arc::new(config),
                generation: 0,
            }),
            charts: RwLock::new(HashMap::new()),
        }
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    pub fn values_files_config(&self) -> Arc<ValuesFilesConfig> {
        self.state.read().config.clone()
    }

    /// Replace the configuration. Cached charts are dropped and reloaded lazily.
    pub fn set_values_files_config(&self, config: ValuesFilesConfig) {
        let mut state = self.state.write();
        if *state.config == config {
            return;
        }
        debug!("values files configuration changed: {config:?}");
        state.config = Arc::new(config);
        state.generation += 1;
        self.charts.write().clear();
    }

    /// Forget the cached chart that owns `path`, e.g. after its `Chart.yaml` or a
    /// values file was saved.
    pub fn invalidate(&self, path: &Path) {
        let mut state = self.state.write();
        state.generation += 1;
        self.charts
            .write()
            .retain(|root, _| !path.starts_with(root));
    }

    fn find_chart_root(&self, path: &Path) -> Option<PathBuf> {
        let start = if path.is_dir() { path } else { path.parent()? };
        for dir in start.ancestors() {
            if !dir.starts_with(&self.root_dir) {
                break;
            }
            if dir.join(CHART_FILE_NAME).is_file() {
                return Some(dir.to_path_buf());
            }
        }
        None
    }

    /// The nearest chart containing `path`, searching upward to the workspace root.
    /// Charts outside the workspace are never found.
    pub fn chart_for_location(&self, path: &Path) -> Result<Arc<Chart>> {
        let root = self
            .find_chart_root(path)
            .ok_or_else(|| Error::ChartNotFound(path.to_path_buf()))?;
        Ok(self.chart_at_root(&root))
    }

    fn chart_at_root(&self, root: &Path) -> Arc<Chart> {
        if let Some(chart) = self.charts.read().get(root) {
            return chart.clone();
        }

        let (config, generation) = {
            let state = self.state.read();
            (state.config.clone(), state.generation)
        };
        debug!("loading chart {}", root.display());
        let chart = Arc::new(Chart::load(root, &config));

        let state = self.state.read();
        if state.generation == generation {
            self.charts
                .write()
                .entry(root.to_path_buf())
                .or_insert_with(|| chart.clone())
                .clone()
        } else {
            chart
        }
    }

    fn parent_chart(&self, chart: &Chart) -> Option<Arc<Chart>> {
        chart
            .parent_root
            .as_ref()
            .map(|root| self.chart_at_root(root))
    }

    /// The value at `selector` in every values file that applies to `chart`, lowest
    /// precedence first.
    ///
    /// A subchart also sees its parent's files, at `[<subchart>, selector..]` and,
    /// for `global` selectors, at the selector itself.
    pub fn resolve_value_sources(
        &self,
        chart: &Arc<Chart>,
        selector: &[String],
    ) -> Vec<ResolvedValue> {
        let mut resolved = Vec::new();
        self.collect_sources(chart, selector.to_vec(), &mut resolved);
        resolved
    }

    fn collect_sources(
        &self,
        chart: &Arc<Chart>,
        selector: Vec<String>,
        out: &mut Vec<ResolvedValue>,
    ) {
        for (index, file) in chart.values_files.all().enumerate() {
            out.push(ResolvedValue {
                chart: chart.clone(),
                file: index,
                selector: selector.clone(),
                value: file.lookup(&selector).cloned(),
            });
        }

        let (Some(parent), Some(name)) = (self.parent_chart(chart), chart.subchart_name()) else {
            return;
        };
        let mut scoped = vec![name];
        scoped.extend(selector.iter().cloned());
        self.collect_sources(&parent, scoped, out);
        if selector.first().map(String::as_str) == Some("global") {
            self.collect_sources(&parent, selector, out);
        }
    }

    /// The value a template would see: the last source that defines it.
    pub fn effective_value(&self, chart: &Arc<Chart>, selector: &[String]) -> Option<Value> {
        let sources = self.resolve_value_sources(chart, selector);
        // Parent chart sources are appended after the chart's own files and
        // override them.
        sources.into_iter().rev().find_map(|source| source.value)
    }

    /// Where `selector` is written, in every contributing values file.
    pub fn value_locations(&self, chart: &Arc<Chart>, selector: &[String]) -> Vec<Location> {
        self.resolve_value_sources(chart, selector)
            .iter()
            .filter_map(|source| {
                let file = source.values_file()?;
                let position = file.position_of(&source.selector)?;
                Some(Location {
                    uri: Url::from_file_path(&file.path).ok()?,
                    range: Range {
                        start: position,
                        end: position,
                    },
                })
            })
            .collect()
    }
}
