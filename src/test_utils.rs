//! Shared test utilities for helm-lens.
//!
//! This module provides common helpers used across multiple test modules.
//! It is only compiled when running tests.

use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

/// Creates a temporary chart directory for testing.
///
/// Returns a tuple of (TempDir, PathBuf) where:
/// - TempDir: The temp directory handle (must be kept alive for the test duration)
/// - PathBuf: The path to the chart subdirectory
///
/// The chart directory is a non-hidden subdirectory called "chart", so tests
/// that walk the templates directory never see a dot-prefixed temp path. No
/// `Chart.yaml` is written; tests that need a chart create one.
///
/// # Example
///
/// ```ignore
/// use crate::test_utils::create_test_chart_dir;
///
/// let (_temp_dir, chart_dir) = create_test_chart_dir();
/// std::fs::write(chart_dir.join("Chart.yaml"), "name: demo\n").unwrap();
/// ```
pub fn create_test_chart_dir() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let chart_dir = temp_dir.path().join("chart");
    fs::create_dir(&chart_dir).expect("Failed to create chart subdirectory");
    (temp_dir, chart_dir)
}

/// Creates a chart with `Chart.yaml`, `values.yaml` and the given templates.
///
/// `templates` holds `(file name, text)` pairs written under `templates/`.
pub fn create_test_chart(
    name: &str,
    values: &str,
    templates: &[(&str, &str)],
) -> (TempDir, PathBuf) {
    let (temp_dir, chart_dir) = create_test_chart_dir();
    fs::write(
        chart_dir.join("Chart.yaml"),
        format!("apiVersion: v2\nname: {name}\nversion: 0.1.0\n"),
    )
    .expect("Failed to write Chart.yaml");
    fs::write(chart_dir.join("values.yaml"), values).expect("Failed to write values.yaml");

    let templates_dir = chart_dir.join("templates");
    fs::create_dir(&templates_dir).expect("Failed to create templates directory");
    for (file, text) in templates {
        fs::write(templates_dir.join(file), text).expect("Failed to write template");
    }
    (temp_dir, chart_dir)
}
