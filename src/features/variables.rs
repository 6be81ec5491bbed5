use tower_lsp::lsp_types::{
    CompletionItem, CompletionItemKind, CompletionTextEdit, Location, TextEdit,
};

use super::{template_context, FeatureContext, FeatureVariant};
use crate::{
    error::Result,
    symbol::{BindingKind, Candidate},
    template::{NodeId, NodeKind},
};

pub const VARIABLES: FeatureVariant = FeatureVariant {
    name: "variables",
    applies,
    definition: Some(definition),
    references: Some(references),
    hover: Some(hover),
    completion: Some(completion),
};

fn applies(kind: NodeKind, parent: Option<NodeKind>) -> bool {
    kind == NodeKind::Variable
        || (matches!(kind, NodeKind::Identifier | NodeKind::Dollar)
            && parent == Some(NodeKind::Variable))
}

fn variable_node(context: &FeatureContext) -> NodeId {
    match context.kind() {
        NodeKind::Variable => context.node,
        _ => context.tree().parent(context.node).unwrap_or(context.node),
    }
}

fn definition(context: &FeatureContext) -> Result<Vec<Location>> {
    let binding = context
        .document
        .symbols
        .definition_for(context.tree(), context.node)?;
    if binding.kind == BindingKind::Root {
        return Ok(Vec::new());
    }
    Ok(vec![context.location(binding.span.clone())])
}

fn references(context: &FeatureContext) -> Result<Vec<Location>> {
    let spans = context
        .document
        .symbols
        .references_for(context.tree(), context.node)?;
    Ok(spans
        .into_iter()
        .map(|span| context.location(span))
        .collect())
}

fn hover(context: &FeatureContext) -> Result<Option<String>> {
    let binding = context
        .document
        .symbols
        .definition_for(context.tree(), context.node)?;
    if binding.kind == BindingKind::Root {
        return Ok(Some("`$`: the root context".to_string()));
    }

    let declaration = &context.document.text()[binding.declaration.clone()];
    let mut contents = format!("```helm\n{declaration}\n```\n");

    let values = binding
        .context
        .as_ref()
        .filter(|bound| bound.namespace() == Some("Values"))
        .map(|bound| template_context::values_hover(context, bound.tail()))
        .transpose()?
        .flatten();
    if let Some(values) = values {
        contents.push('\n');
        contents.push_str(&values);
    }
    Ok(Some(contents))
}

fn completion(context: &FeatureContext) -> Result<Vec<CompletionItem>> {
    let variable = variable_node(context);
    let range = context
        .document
        .lsp_range(context.tree().node(variable).span.clone());
    let text = context.document.text();

    Ok(context
        .document
        .symbols
        .completions_at(context.offset)
        .into_iter()
        .filter_map(|candidate| match candidate {
            Candidate::Variable(binding) => Some(binding),
            Candidate::Namespace(_) => None,
        })
        .map(|binding| {
            let label = format!("${}", binding.name);
            CompletionItem {
                label: label.clone(),
                kind: Some(CompletionItemKind::VARIABLE),
                detail: Some(text[binding.declaration.clone()].to_string()),
                text_edit: Some(CompletionTextEdit::Edit(TextEdit {
                    range,
                    new_text: label,
                })),
                ..Default::default()
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tower_lsp::lsp_types::Url;

    use super::*;
    use crate::{
        config::ValuesFilesConfig, document::Document, test_utils::create_test_chart_dir,
        workspace::Workspace,
    };

    fn setup(template: &str) -> (tempfile::TempDir, Workspace, Document) {
        let (temp_dir, chart_dir) = create_test_chart_dir();
        fs::write(chart_dir.join("Chart.yaml"), "name: demo\n").unwrap();
        fs::write(chart_dir.join("values.yaml"), "image:\n  tag: v1\n").unwrap();
        let path = chart_dir.join("templates").join("a.yaml");
        fs::create_dir_all(path.parent().unwrap()).unwrap();

        let workspace = Workspace::new(chart_dir, ValuesFilesConfig::default());
        let document = Document::new(Url::from_file_path(&path).unwrap(), template, 1);
        (temp_dir, workspace, document)
    }

    fn at<'a>(
        workspace: &'a Workspace,
        document: &'a Document,
        needle: &str,
        nth: usize,
    ) -> FeatureContext<'a> {
        let offset = document.text().match_indices(needle).nth(nth).unwrap().0 + 1;
        FeatureContext::new(workspace, document, offset)
    }

    #[test]
    fn test_definition_and_references() {
        let (_temp_dir, workspace, document) =
            setup("{{ $tag := .Values.image.tag }}\ntag: {{ $tag }}\n");

        let context = at(&workspace, &document, "$tag", 1);
        let definitions = definition(&context).unwrap();
        assert_eq!(definitions.len(), 1);
        assert_eq!(definitions[0].range.start.line, 0);
        assert_eq!(definitions[0].range.start.character, 3);

        assert_eq!(references(&context).unwrap().len(), 2);
    }

    #[test]
    fn test_hover_shows_declaration_and_value() {
        let (_temp_dir, workspace, document) =
            setup("{{ $tag := .Values.image.tag }}\ntag: {{ $tag }}\n");

        let context = at(&workspace, &document, "$tag", 1);
        let contents = hover(&context).unwrap().unwrap();

        assert!(contents.contains("$tag := .Values.image.tag"));
        assert!(contents.contains("v1"));
    }

    #[test]
    fn test_completion_lists_visible_variables() {
        let (_temp_dir, workspace, document) =
            setup("{{ $a := 1 }}{{ range .Values.list }}{{ $b := . }}{{ end }}{{ $ }}");

        let offset = document.text().rfind('$').unwrap() + 1;
        let context = FeatureContext::new(&workspace, &document, offset);
        let labels: Vec<String> = completion(&context)
            .unwrap()
            .into_iter()
            .map(|item| item.label)
            .collect();

        assert_eq!(labels, vec!["$a".to_string()]);
    }

    #[test]
    fn test_unbound_variable_yields_empty_result() {
        let (_temp_dir, workspace, document) = setup("{{ $nope }}");
        let context = at(&workspace, &document, "$nope", 0);

        assert!(super::super::definition(&context).is_empty());
        assert!(super::super::hover(&context).is_none());
    }
}
