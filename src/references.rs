use itertools::Itertools;
use tower_lsp::lsp_types::{Location, Position, Url};

use crate::{features, features::FeatureContext, workspace::Workspace};

pub fn references(
    workspace: &Workspace,
    uri: &Url,
    cursor_position: Position,
) -> Option<Vec<Location>> {
    let document = workspace.documents.get(uri)?;
    let offset = document.offset_at(cursor_position);
    let context = FeatureContext::new(workspace, &document, offset);

    let references = unique_locations(features::references(&context));
    (!references.is_empty()).then_some(references)
}

/// Drop repeated locations, keeping the first occurrence. `Location` is not
/// `Hash`, so the key is built from its parts.
fn unique_locations(locations: Vec<Location>) -> Vec<Location> {
    locations
        .into_iter()
        .unique_by(|location| {
            let range = location.range;
            (
                location.uri.to_string(),
                range.start.line,
                range.start.character,
                range.end.line,
                range.end.character,
            )
        })
        .collect_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ValuesFilesConfig;
    use crate::test_utils::create_test_chart_dir;
    use std::fs;
    use tower_lsp::lsp_types::Range;

    fn location(uri: &Url, line: u32, start: u32, end: u32) -> Location {
        Location {
            uri: uri.clone(),
            range: Range::new(Position::new(line, start), Position::new(line, end)),
        }
    }

    /// Test: The same location reported by two feature variants is listed once.
    #[test]
    fn test_duplicate_locations_are_listed_once() {
        let template = Url::parse("file:///chart/templates/a.yaml").unwrap();
        let values = Url::parse("file:///chart/values.yaml").unwrap();

        let locations = unique_locations(vec![
            location(&template, 0, 14, 18),
            location(&values, 2, 2, 2),
            location(&template, 0, 14, 18),
            location(&template, 0, 14, 19),
            location(&values, 2, 2, 2),
        ]);

        assert_eq!(
            locations,
            vec![
                location(&template, 0, 14, 18),
                location(&values, 2, 2, 2),
                location(&template, 0, 14, 19),
            ]
        );
    }

    /// Test: Find every access of a values path across open templates.
    /// Both documents reference `.Values.image.tag`; values.yaml contributes the definition.
    #[test]
    fn test_references_to_values_path_across_documents() {
        let (_temp_dir, chart_dir) = create_test_chart_dir();
        fs::write(chart_dir.join("Chart.yaml"), "name: demo\n").unwrap();
        fs::write(chart_dir.join("values.yaml"), "image:\n  tag: v1\n").unwrap();
        let templates = chart_dir.join("templates");
        fs::create_dir_all(&templates).unwrap();

        let workspace = Workspace::new(chart_dir.clone(), ValuesFilesConfig::default());
        let deployment = Url::from_file_path(templates.join("deployment.yaml")).unwrap();
        let job = Url::from_file_path(templates.join("job.yaml")).unwrap();
        workspace
            .documents
            .open(deployment.clone(), "image: {{ .Values.image.tag }}\n", 1);
        workspace.documents.open(
            job.clone(),
            "{{ with .Values.image }}tag: {{ .tag }}{{ end }}\n",
            1,
        );

        let locations = references(&workspace, &deployment, Position::new(0, 25)).unwrap();

        assert_eq!(locations.len(), 3);
        assert!(locations.iter().any(|location| location.uri == job));
        assert!(locations
            .iter()
            .any(|location| location.uri.path().ends_with("values.yaml")));
    }

    /// Test: Variable references stay inside their document, declaration included.
    #[test]
    fn test_references_to_variable() {
        let (_temp_dir, chart_dir) = create_test_chart_dir();
        let workspace = Workspace::new(chart_dir.clone(), ValuesFilesConfig::default());
        let uri = Url::from_file_path(chart_dir.join("templates/a.yaml")).unwrap();
        workspace.documents.open(
            uri.clone(),
            "{{ $name := .Release.Name }}\na: {{ $name }}\nb: {{ $name | upper }}\n",
            1,
        );

        let locations = references(&workspace, &uri, Position::new(1, 7)).unwrap();

        assert_eq!(
            locations
                .iter()
                .map(|location| location.range.start.line)
                .collect_vec(),
            vec![0, 1, 2]
        );
    }
}
