//! `.Values.*`, `.Chart.*` and the other built-in objects.

use std::collections::BTreeMap;

use serde_yaml::Value;
use tower_lsp::lsp_types::{
    CompletionItem, CompletionItemKind, Documentation, Location, MarkupContent, MarkupKind, Range,
    Url,
};

use super::{FeatureContext, FeatureVariant};
use crate::{
    builtins,
    charts::{metadata_field, METADATA_FIELDS},
    error::Result,
    symbol::{Candidate, TemplateContext},
    template::NodeKind,
};

pub const TEMPLATE_CONTEXT: FeatureVariant = FeatureVariant {
    name: "template-context",
    applies,
    definition: Some(definition),
    references: Some(references),
    hover: Some(hover),
    completion: Some(completion),
};

fn applies(kind: NodeKind, parent: Option<NodeKind>) -> bool {
    match kind {
        NodeKind::Dot | NodeKind::Field | NodeKind::FieldIdentifier => true,
        NodeKind::Identifier => parent == Some(NodeKind::Field),
        _ => false,
    }
}

fn template_context(context: &FeatureContext) -> Option<TemplateContext> {
    context
        .document
        .symbols
        .template_context_at(context.tree(), context.node)
        .filter(|template_context| !template_context.is_empty())
}

fn definition_locations(
    context: &FeatureContext,
    template_context: &TemplateContext,
) -> Result<Vec<Location>> {
    match template_context.namespace() {
        Some("Values") => {
            let chart = context.chart()?;
            Ok(context
                .workspace
                .charts
                .value_locations(&chart, template_context.tail()))
        }
        Some("Chart") => {
            let chart = context.chart()?;
            let field = template_context
                .tail()
                .first()
                .map(String::as_str)
                .unwrap_or_default();
            let position = chart.metadata_position(field);
            Ok(Url::from_file_path(chart.chart_file())
                .map(|uri| Location {
                    uri,
                    range: Range {
                        start: position,
                        end: position,
                    },
                })
                .into_iter()
                .collect())
        }
        _ => Ok(Vec::new()),
    }
}

fn definition(context: &FeatureContext) -> Result<Vec<Location>> {
    match template_context(context) {
        Some(template_context) => definition_locations(context, &template_context),
        None => Ok(Vec::new()),
    }
}

/// Accesses of the same path in every open document, then its definitions.
fn references(context: &FeatureContext) -> Result<Vec<Location>> {
    let Some(template_context) = template_context(context) else {
        return Ok(Vec::new());
    };

    let mut locations: Vec<Location> = context
        .workspace
        .documents
        .documents()
        .iter()
        .flat_map(|document| {
            document
                .symbols
                .context_references(&template_context)
                .into_iter()
                .map(|span| Location {
                    uri: document.uri.clone(),
                    range: document.lsp_range(span),
                })
                .collect::<Vec<_>>()
        })
        .collect();
    if context.workspace.documents.get(&context.document.uri).is_none() {
        locations.extend(
            context
                .document
                .symbols
                .context_references(&template_context)
                .into_iter()
                .map(|span| context.location(span)),
        );
    }
    locations.extend(definition_locations(context, &template_context)?);
    Ok(locations)
}

fn format_value(value: &Value) -> String {
    match value {
        Value::String(string) if string.is_empty() => "\"\"".to_string(),
        Value::String(string) => string.clone(),
        Value::Null => "null".to_string(),
        other => serde_yaml::to_string(other)
            .unwrap_or_default()
            .trim_end()
            .to_string(),
    }
}

/// The value of `selector` in each values file that defines it, highest
/// precedence first. `None` when no file does.
pub(super) fn values_hover(
    context: &FeatureContext,
    selector: &[String],
) -> Result<Option<String>> {
    let chart = context.chart()?;
    let root = context.workspace.root_dir();

    let sections: Vec<String> = context
        .workspace
        .charts
        .resolve_value_sources(&chart, selector)
        .iter()
        .rev()
        .filter_map(|source| {
            let value = source.value.as_ref()?;
            let file = source.values_file()?;
            let name = pathdiff::diff_paths(&file.path, root).unwrap_or_else(|| file.path.clone());
            Some(format!(
                "### {}\n```yaml\n{}\n```\n",
                name.display(),
                format_value(value)
            ))
        })
        .collect();

    Ok((!sections.is_empty()).then(|| sections.join("\n")))
}

fn hover(context: &FeatureContext) -> Result<Option<String>> {
    let Some(template_context) = template_context(context) else {
        return Ok(None);
    };
    let path = template_context.tail().join(".");

    match template_context.namespace() {
        Some("Values") => values_hover(context, template_context.tail()),
        Some("Chart") => {
            let Some(doc) = builtins::field_doc("Chart", &path) else {
                return Ok(None);
            };
            let chart = context.chart()?;
            let value = template_context
                .tail()
                .first()
                .and_then(|field| metadata_field(field))
                .map(|field| (field.get)(&chart.metadata))
                .unwrap_or_default();
            Ok(Some(format!("{doc}\n\n{value}\n")))
        }
        Some(namespace) => Ok(builtins::field_doc(namespace, &path).map(str::to_string)),
        None => Ok(None),
    }
}

fn markdown(value: String) -> Documentation {
    Documentation::MarkupContent(MarkupContent {
        kind: MarkupKind::Markdown,
        value,
    })
}

fn value_keys(context: &FeatureContext, selector: &[String]) -> Result<Vec<CompletionItem>> {
    let chart = context.chart()?;
    let mut keys: BTreeMap<String, String> = BTreeMap::new();
    for source in context
        .workspace
        .charts
        .resolve_value_sources(&chart, selector)
    {
        if let Some(Value::Mapping(mapping)) = source.value {
            for (key, value) in mapping {
                if let Some(key) = key.as_str() {
                    keys.insert(key.to_string(), format_value(&value));
                }
            }
        }
    }

    Ok(keys
        .into_iter()
        .map(|(key, value)| CompletionItem {
            label: key,
            kind: Some(CompletionItemKind::VALUE),
            documentation: Some(markdown(format!("```yaml\n{value}\n```"))),
            ..Default::default()
        })
        .collect())
}

fn builtin_fields(namespace: &str, prefix: &[String]) -> Vec<CompletionItem> {
    if namespace == "Chart" && prefix.is_empty() {
        return METADATA_FIELDS
            .iter()
            .map(|field| CompletionItem {
                label: field.name.to_string(),
                kind: Some(CompletionItemKind::FIELD),
                documentation: builtins::field_doc("Chart", field.name)
                    .map(|doc| markdown(doc.to_string())),
                ..Default::default()
            })
            .collect();
    }

    let Some(namespace) = builtins::namespace(namespace) else {
        return Vec::new();
    };
    let prefix = if prefix.is_empty() {
        String::new()
    } else {
        format!("{}.", prefix.join("."))
    };
    namespace
        .fields
        .iter()
        .filter_map(|field| {
            let rest = field.name.strip_prefix(prefix.as_str())?;
            (!rest.contains('.')).then(|| CompletionItem {
                label: rest.to_string(),
                kind: Some(CompletionItemKind::FIELD),
                documentation: Some(markdown(field.doc.to_string())),
                ..Default::default()
            })
        })
        .collect()
}

fn completion(context: &FeatureContext) -> Result<Vec<CompletionItem>> {
    let Some(current) = context
        .document
        .symbols
        .template_context_at(context.tree(), context.node)
    else {
        return Ok(Vec::new());
    };

    // A partially typed name is completed from its parent's children.
    let typing = matches!(
        context.kind(),
        NodeKind::Identifier | NodeKind::FieldIdentifier | NodeKind::Field
    ) && !context.node_text().trim_start_matches('.').is_empty();
    let parent = if typing { current.parent() } else { current };

    match parent.namespace() {
        None => Ok(context
            .document
            .symbols
            .completions_at(context.offset)
            .into_iter()
            .filter_map(|candidate| match candidate {
                Candidate::Namespace(name) => Some(CompletionItem {
                    label: name.to_string(),
                    kind: Some(CompletionItemKind::MODULE),
                    documentation: builtins::field_doc(name, "")
                        .map(|doc| markdown(doc.to_string())),
                    ..Default::default()
                }),
                Candidate::Variable(_) => None,
            })
            .collect()),
        Some("Values") => value_keys(context, parent.tail()),
        Some(namespace) => Ok(builtin_fields(namespace, parent.tail())),
    }
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
        fs::write(
            chart_dir.join("Chart.yaml"),
            "apiVersion: v2\nname: demo\nversion: 0.1.0\n",
        )
        .unwrap();
        fs::write(
            chart_dir.join("values.yaml"),
            "image:\n  repository: nginx\n  tag: v1\nreplicas: 1\n",
        )
        .unwrap();
        fs::write(chart_dir.join("values.lint.yaml"), "replicas: 3\n").unwrap();
        let path = chart_dir.join("templates").join("deployment.yaml");
        fs::create_dir_all(path.parent().unwrap()).unwrap();

        let workspace = Workspace::new(chart_dir, ValuesFilesConfig::default());
        let document = Document::new(Url::from_file_path(&path).unwrap(), template, 1);
        (temp_dir, workspace, document)
    }

    fn context_at<'a>(
        workspace: &'a Workspace,
        document: &'a Document,
        needle: &str,
    ) -> FeatureContext<'a> {
        let offset = document.text().find(needle).unwrap() + 1;
        FeatureContext::new(workspace, document, offset)
    }

    /// Test: Hovering an undefined key is empty, not an error.
    #[test]
    fn test_missing_values_key_hover_is_empty() {
        let (_temp_dir, workspace, document) = setup("{{ .Values.missingKey }}");
        let context = context_at(&workspace, &document, "missingKey");

        assert_eq!(hover(&context).unwrap(), None);
    }

    #[test]
    fn test_values_hover_lists_every_defining_file() {
        let (_temp_dir, workspace, document) = setup("replicas: {{ .Values.replicas }}");
        let context = context_at(&workspace, &document, "replicas }}");

        let contents = hover(&context).unwrap().unwrap();
        let overlay = contents.find("### values.lint.yaml\n```yaml\n3\n```").unwrap();
        let main = contents.find("### values.yaml\n```yaml\n1\n```").unwrap();
        assert!(overlay < main);
    }

    #[test]
    fn test_values_definition_points_at_key() {
        let (_temp_dir, workspace, document) = setup("tag: {{ .Values.image.tag }}");
        let context = context_at(&workspace, &document, "tag }}");

        let locations = definition(&context).unwrap();
        assert_eq!(locations.len(), 1);
        assert!(locations[0].uri.path().ends_with("values.yaml"));
        assert_eq!(locations[0].range.start.line, 2);
        assert_eq!(locations[0].range.start.character, 2);
    }

    #[test]
    fn test_chart_hover_and_definition() {
        let (_temp_dir, workspace, document) = setup("name: {{ .Chart.Name }}");
        let context = context_at(&workspace, &document, "Name");

        let contents = hover(&context).unwrap().unwrap();
        assert!(contents.starts_with("The name of the chart"));
        assert!(contents.ends_with("demo\n"));

        let locations = definition(&context).unwrap();
        assert!(locations[0].uri.path().ends_with("Chart.yaml"));
        assert_eq!(locations[0].range.start.line, 1);
    }

    #[test]
    fn test_release_hover_uses_builtin_docs() {
        let (_temp_dir, workspace, document) = setup("ns: {{ .Release.Namespace }}");
        let context = context_at(&workspace, &document, "Namespace");

        assert!(hover(&context).unwrap().unwrap().contains("namespace to be released"));
    }

    #[test]
    fn test_completion_of_values_keys_and_roots() {
        let (_temp_dir, workspace, document) = setup("{{ .Values.image. }}\n{{ . }}");

        let offset = document.text().find(". }}").unwrap() + 1;
        let context = FeatureContext::new(&workspace, &document, offset);
        let labels: Vec<String> = completion(&context)
            .unwrap()
            .into_iter()
            .map(|item| item.label)
            .collect();
        assert_eq!(labels, vec!["repository".to_string(), "tag".to_string()]);

        let offset = document.text().rfind(". }}").unwrap() + 1;
        let context = FeatureContext::new(&workspace, &document, offset);
        let labels: Vec<String> = completion(&context)
            .unwrap()
            .into_iter()
            .map(|item| item.label)
            .collect();
        assert!(labels.contains(&"Values".to_string()));
        assert!(labels.contains(&"Release".to_string()));
    }

    #[test]
    fn test_references_include_accesses_and_definitions() {
        let (_temp_dir, workspace, document) =
            setup("a: {{ .Values.replicas }}\nb: {{ .Values.replicas | quote }}");
        let context = context_at(&workspace, &document, "replicas");

        let locations = references(&context).unwrap();
        // Two accesses, plus the key in values.yaml and values.lint.yaml.
        assert_eq!(locations.len(), 4);
    }
}
