//! helm-lens: A Language Server Protocol implementation for Helm chart templates
//!
//! This crate provides the core functionality for the helm-lens server,
//! enabling editing support for the Go-template-in-yaml files under a
//! chart's `templates/` directory.
//!
//! # Overview
//!
//! helm-lens provides:
//!
//! - **Chart awareness**: `Chart.yaml` metadata and values files, including the
//!   override order of additional and overlay values files and parent charts
//! - **Template analysis**: A fault-tolerant parse of every open template with
//!   scoped variables and the meaning of `.` at each position
//! - **Navigation**: Go-to-definition and find-references for values paths,
//!   chart metadata, variables and named templates
//! - **Hover and completion** for values, built-in objects, variables and functions
//! - **Diagnostics**: yaml schema validation delegated to yaml-language-server
//!
//! # Architecture
//!
//! The crate is organized around several key modules:
//!
//! - [`charts`] and [`document`]: The chart and open document stores
//! - [`template`] and [`symbol`]: Syntax tree and symbol table of a template
//! - [`features`]: Node-kind based dispatch of language features
//! - [`yamlls`] and [`diagnostics`]: The validator bridge
//! - [`server`]: The `tower_lsp` backend wiring it together
//!
//! # Usage
//!
//! This crate is primarily used as the backing library for the `helm-lens`
//! binary. The stores can be used directly:
//!
//! ```ignore
//! use helm_lens::{config::ValuesFilesConfig, workspace::Workspace};
//!
//! let workspace = Workspace::new(chart_dir, ValuesFilesConfig::default());
//! workspace.documents.open(uri.clone(), &text, 1);
//! let hover = helm_lens::hover::hover(&workspace, &uri, position);
//! ```

// Stores
pub mod charts;
pub mod document;
pub mod workspace;

// Template analysis
pub mod builtins;
pub mod symbol;
pub mod template;

// LSP feature modules
pub mod completion;
pub mod features;
pub mod gotodef;
pub mod hover;
pub mod references;
pub mod server;

// Validator bridge
pub mod diagnostics;
pub mod yamlls;

// Configuration, errors and logging
pub mod config;
pub mod error;
pub mod logging;

pub use error::{Error, Result};

// Test utilities (only available in test builds)
#[cfg(test)]
pub mod test_utils;
