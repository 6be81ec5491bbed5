use std::path::{Path, PathBuf};

use crate::{charts::ChartStore, config::ValuesFilesConfig, document::DocumentStore};

/// Everything the server knows about the folder it was started in.
pub struct Workspace {
    root_dir: PathBuf,
    pub charts: ChartStore,
    pub documents: DocumentStore,
}

impl Workspace {
    pub fn new(root_dir: PathBuf, values_files: ValuesFilesConfig) -> Workspace {
        Workspace {
            charts: ChartStore::new(root_dir.clone(), values_files),
            documents: DocumentStore::new(),
            root_dir,
        }
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }
}
