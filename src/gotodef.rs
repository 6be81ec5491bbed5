use tower_lsp::lsp_types::{Location, Position, Url};

use crate::{features, features::FeatureContext, workspace::Workspace};

/// Definition locations for the syntax node under the cursor of an open document.
pub fn goto_definition(
    workspace: &Workspace,
    uri: &Url,
    cursor_position: Position,
) -> Option<Vec<Location>> {
    let document = workspace.documents.get(uri)?;
    let offset = document.offset_at(cursor_position);
    let context = FeatureContext::new(workspace, &document, offset);

    let locations = features::definition(&context);
    (!locations.is_empty()).then_some(locations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ValuesFilesConfig;
    use crate::test_utils::create_test_chart_dir;
    use std::fs;

    /// Test: Go-to-definition on a values selector lands on the key in values.yaml.
    #[test]
    fn test_goto_definition_values_key() {
        let (_temp_dir, chart_dir) = create_test_chart_dir();
        fs::write(chart_dir.join("Chart.yaml"), "name: demo\n").unwrap();
        fs::write(
            chart_dir.join("values.yaml"),
            "service:\n  type: ClusterIP\n  port: 80\n",
        )
        .unwrap();
        let template = chart_dir.join("templates/service.yaml");
        fs::create_dir_all(template.parent().unwrap()).unwrap();

        let workspace = Workspace::new(chart_dir.clone(), ValuesFilesConfig::default());
        let uri = Url::from_file_path(&template).unwrap();
        workspace
            .documents
            .open(uri.clone(), "port: {{ .Values.service.port }}\n", 1);

        let locations = goto_definition(
            &workspace,
            &uri,
            Position {
                line: 0,
                character: 27,
            },
        )
        .unwrap();

        assert_eq!(locations.len(), 1);
        assert_eq!(
            locations[0].uri,
            Url::from_file_path(chart_dir.join("values.yaml")).unwrap()
        );
        assert_eq!(locations[0].range.start, Position::new(2, 2));
    }

    /// Test: A variable use resolves to its declaration in the same document.
    #[test]
    fn test_goto_definition_variable() {
        let (_temp_dir, chart_dir) = create_test_chart_dir();
        let workspace = Workspace::new(chart_dir.clone(), ValuesFilesConfig::default());
        let uri = Url::from_file_path(chart_dir.join("templates/a.yaml")).unwrap();
        workspace.documents.open(
            uri.clone(),
            "{{ range $i, $item := .Values.list }}\n- {{ $item }}\n{{ end }}\n",
            1,
        );

        let locations = goto_definition(&workspace, &uri, Position::new(1, 6)).unwrap();

        assert_eq!(locations.len(), 1);
        assert_eq!(locations[0].uri, uri);
        assert_eq!(locations[0].range.start, Position::new(0, 13));
    }

    /// Test: Nothing is returned for plain yaml text or unknown documents.
    #[test]
    fn test_goto_definition_outside_template() {
        let (_temp_dir, chart_dir) = create_test_chart_dir();
        let workspace = Workspace::new(chart_dir.clone(), ValuesFilesConfig::default());
        let uri = Url::from_file_path(chart_dir.join("templates/a.yaml")).unwrap();
        workspace.documents.open(uri.clone(), "kind: Service\n", 1);

        assert!(goto_definition(&workspace, &uri, Position::new(0, 2)).is_none());

        let unknown = Url::from_file_path(chart_dir.join("templates/b.yaml")).unwrap();
        assert!(goto_definition(&workspace, &unknown, Position::new(0, 0)).is_none());
    }
}
