use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use rayon::prelude::*;
use serde_yaml::Value;
use tower_lsp::lsp_types::Position;
use tracing::{debug, warn};
use yaml_rust2::{
    parser::{Event, MarkedEventReceiver, Parser},
    scanner::Marker,
};

use crate::{
    config::ValuesFilesConfig,
    error::{Error, Result},
    symbol::ELEMENT_SEGMENT,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValuesFileKind {
    Main,
    Additional,
    Overlay,
}

/// One values file of a chart, parsed once when the chart is loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct ValuesFile {
    pub kind: ValuesFileKind,
    pub path: PathBuf,
    pub values: Value,
    key_positions: HashMap<Vec<String>, Position>,
}

impl ValuesFile {
    /// Parse `text` as the contents of `path`.
    pub fn from_text(kind: ValuesFileKind, path: PathBuf, text: &str) -> Result<ValuesFile> {
        let values = match serde_yaml::from_str::<Value>(text) {
            Ok(Value::Null) => Value::Mapping(Default::default()),
            Ok(values) => values,
            Err(source) => return Err(Error::ValueFileParse { path, source }),
        };
        Ok(ValuesFile {
            kind,
            path,
            values,
            key_positions: key_positions(text),
        })
    }

    /// Read and parse `path`. A missing file has no values; a malformed one is
    /// logged and contributes no keys either.
    pub fn load(kind: ValuesFileKind, path: PathBuf) -> ValuesFile {
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) => {
                debug!("values file {} not readable: {err}", path.display());
                String::new()
            }
        };
        ValuesFile::from_text(kind, path.clone(), &text).unwrap_or_else(|err| {
            warn!("{err}");
            ValuesFile::empty(kind, path)
        })
    }

    pub fn empty(kind: ValuesFileKind, path: PathBuf) -> ValuesFile {
        ValuesFile {
            kind,
            path,
            values: Value::Mapping(Default::default()),
            key_positions: HashMap::new(),
        }
    }

    /// The value at `selector`, or `None` when any segment is missing.
    pub fn lookup(&self, selector: &[String]) -> Option<&Value> {
        selector.iter().try_fold(&self.values, |current, segment| {
            match current {
                Value::Mapping(map) => map.get(segment.as_str()),
                Value::Sequence(items) => {
                    let index = match segment.as_str() {
                        ELEMENT_SEGMENT => 0,
                        other => other.parse::<usize>().ok()?,
                    };
                    items.get(index)
                }
                _ => None,
            }
        })
    }

    /// Where the key for `selector` is written in this file.
    pub fn position_of(&self, selector: &[String]) -> Option<Position> {
        let key: Vec<String> = selector
            .iter()
            .map(|segment| match segment.as_str() {
                ELEMENT_SEGMENT => "0".to_string(),
                other => other.to_string(),
            })
            .collect();
        self.key_positions.get(&key).copied()
    }
}

/// The values files of one chart in resolution order.
#[derive(Debug, Clone, PartialEq)]
pub struct ValuesFiles {
    pub main: ValuesFile,
    /// Sorted by file name.
    pub additional: Vec<ValuesFile>,
    pub overlay: ValuesFile,
}

impl ValuesFiles {
    pub fn load(chart_root: &Path, config: &ValuesFilesConfig) -> ValuesFiles {
        let main_path = chart_root.join(&config.main_values_file_name);
        let overlay_path = chart_root.join(&config.lint_overlay_values_file_name);

        let pattern = chart_root.join(&config.additional_values_files_glob_pattern);
        let mut additional_paths: Vec<PathBuf> = match glob::glob(&pattern.to_string_lossy()) {
            Ok(paths) => paths
                .filter_map(|entry| entry.ok())
                .filter(|path| path.is_file() && *path != main_path && *path != overlay_path)
                .collect(),
            Err(err) => {
                warn!(
                    "invalid additional values glob {:?}: {err}",
                    config.additional_values_files_glob_pattern
                );
                Vec::new()
            }
        };
        additional_paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

        let additional = additional_paths
            .into_par_iter()
            .map(|path| ValuesFile::load(ValuesFileKind::Additional, path))
            .collect();

        ValuesFiles {
            main: ValuesFile::load(ValuesFileKind::Main, main_path),
            additional,
            overlay: ValuesFile::load(ValuesFileKind::Overlay, overlay_path),
        }
    }

    /// Every file, lowest precedence first.
    pub fn all(&self) -> impl Iterator<Item = &ValuesFile> {
        std::iter::once(&self.main)
            .chain(self.additional.iter())
            .chain(std::iter::once(&self.overlay))
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.all().any(|file| file.path == path)
    }
}

/// Position of every mapping key in `text`, keyed by its full path.
pub(super) fn key_positions(text: &str) -> HashMap<Vec<String>, Position> {
    let mut collector = KeyCollector::default();
    let mut parser = Parser::new_from_str(text);
    if let Err(err) = parser.load(&mut collector, false) {
        debug!("key positions incomplete: {err}");
    }
    collector.positions
}

enum Container {
    Mapping { key: Option<String> },
    Sequence { index: usize },
}

/// Records the position of every mapping key, keyed by its full path.
#[derive(Default)]
struct KeyCollector {
    stack: Vec<Container>,
    path: Vec<String>,
    /// Whether `path` has a segment pushed for the current container.
    pushed: Vec<bool>,
    positions: HashMap<Vec<String>, Position>,
}

impl KeyCollector {
    /// A complete value (scalar or container) was consumed by the current container.
    fn value_done(&mut self) {
        match self.stack.last_mut() {
            Some(Container::Mapping { key }) => *key = None,
            Some(Container::Sequence { index }) => *index += 1,
            None => {}
        }
    }

    fn open(&mut self, container: Container) {
        let segment = match self.stack.last() {
            Some(Container::Mapping { key: Some(key) }) => Some(key.clone()),
            Some(Container::Sequence { index }) => Some(index.to_string()),
            _ => None,
        };
        self.pushed.push(segment.is_some());
        if let Some(segment) = segment {
            self.path.push(segment);
        }
        self.stack.push(container);
    }

    fn close(&mut self) {
        self.stack.pop();
        if self.pushed.pop() == Some(true) {
            self.path.pop();
        }
        self.value_done();
    }
}

impl MarkedEventReceiver for KeyCollector {
    fn on_event(&mut self, event: Event, mark: Marker) {
        match event {
            Event::MappingStart(..) => self.open(Container::Mapping { key: None }),
            Event::SequenceStart(..) => self.open(Container::Sequence { index: 0 }),
            Event::MappingEnd | Event::SequenceEnd => self.close(),
            Event::Scalar(value, ..) => {
                if let Some(Container::Mapping { key: key @ None }) = self.stack.last_mut() {
                    let mut full = self.path.clone();
                    full.push(value.clone());
                    *key = Some(value);
                    self.positions.insert(
                        full,
                        Position {
                            line: mark.line().saturating_sub(1) as u32,
                            character: mark.col() as u32,
                        },
                    );
                } else {
                    self.value_done();
                }
            }
            Event::Alias(..) => self.value_done(),
            _ => {}
        }
    }
}
