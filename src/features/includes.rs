use std::{fs, path::Path, sync::Arc};

use itertools::Itertools;
use tower_lsp::lsp_types::{CompletionItem, CompletionItemKind, Location, Url};
use tracing::debug;
use walkdir::WalkDir;

use super::{FeatureContext, FeatureVariant};
use crate::{
    document::Document,
    error::Result,
    symbol::unquote,
    template::NodeKind,
};

pub const INCLUDES: FeatureVariant = FeatureVariant {
    name: "includes",
    applies,
    definition: Some(definition),
    references: Some(references),
    hover: Some(hover),
    completion: Some(completion),
};

fn applies(kind: NodeKind, parent: Option<NodeKind>) -> bool {
    matches!(kind, NodeKind::StringLiteral | NodeKind::RawStringLiteral)
        && matches!(
            parent,
            Some(
                NodeKind::FunctionCall
                    | NodeKind::TemplateAction
                    | NodeKind::DefineAction
                    | NodeKind::BlockAction
            )
        )
}

/// The template name under the cursor, if the literal names one.
fn template_name<'a>(context: &'a FeatureContext) -> Option<&'a str> {
    let tree = context.tree();
    let parent = tree.parent(context.node)?;
    if tree.kind(parent) == NodeKind::FunctionCall {
        let children = tree.children(parent);
        let callee = tree.text(*children.first()?);
        if !matches!(callee, "include" | "template") || children.get(1) != Some(&context.node) {
            return None;
        }
    }
    Some(unquote(context.node_text()))
}

/// Open documents of the chart plus every template file on disk that is not open.
fn chart_templates(context: &FeatureContext) -> Vec<Arc<Document>> {
    let mut documents = context.workspace.documents.documents();
    if !documents
        .iter()
        .any(|document| document.uri == context.document.uri)
    {
        documents.push(Arc::new(Document::new(
            context.document.uri.clone(),
            context.document.text(),
            context.document.version,
        )));
    }

    let Ok(chart) = context.chart() else {
        return documents;
    };
    let on_disk: Vec<Arc<Document>> = WalkDir::new(chart.templates_dir())
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file() && is_template_file(entry.path()))
        .filter_map(|entry| {
            let uri = Url::from_file_path(entry.path()).ok()?;
            if documents.iter().any(|document| document.uri == uri) {
                return None;
            }
            let text = fs::read_to_string(entry.path())
                .map_err(|err| debug!("skipping {}: {err}", entry.path().display()))
                .ok()?;
            Some(Arc::new(Document::new(uri, &text, 0)))
        })
        .collect();
    documents.extend(on_disk);
    documents
}

fn is_template_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("yaml" | "yml" | "tpl" | "txt")
    )
}

fn define_locations(documents: &[Arc<Document>], name: &str) -> Vec<Location> {
    documents
        .iter()
        .flat_map(|document| {
            document
                .symbols
                .define_spans(name)
                .into_iter()
                .map(|define| Location {
                    uri: document.uri.clone(),
                    range: document.lsp_range(define.name_span.clone()),
                })
                .collect::<Vec<_>>()
        })
        .collect()
}

fn definition(context: &FeatureContext) -> Result<Vec<Location>> {
    let Some(name) = template_name(context) else {
        return Ok(Vec::new());
    };
    Ok(define_locations(&chart_templates(context), name))
}

fn references(context: &FeatureContext) -> Result<Vec<Location>> {
    let Some(name) = template_name(context) else {
        return Ok(Vec::new());
    };
    let documents = chart_templates(context);

    let mut locations: Vec<Location> = documents
        .iter()
        .flat_map(|document| {
            document
                .symbols
                .includes()
                .iter()
                .filter(|include| include.name == name)
                .map(|include| Location {
                    uri: document.uri.clone(),
                    range: document.lsp_range(include.span.clone()),
                })
                .collect::<Vec<_>>()
        })
        .collect();
    locations.extend(define_locations(&documents, name));
    Ok(locations)
}

fn hover(context: &FeatureContext) -> Result<Option<String>> {
    let Some(name) = template_name(context) else {
        return Ok(None);
    };
    let blocks = chart_templates(context)
        .iter()
        .flat_map(|document| {
            document
                .symbols
                .define_spans(name)
                .into_iter()
                .map(|define| format!("```helm\n{}\n```", &document.text()[define.span.clone()]))
                .collect::<Vec<_>>()
        })
        .join("\n\n");
    Ok((!blocks.is_empty()).then_some(blocks))
}

fn completion(context: &FeatureContext) -> Result<Vec<CompletionItem>> {
    let documents = chart_templates(context);
    Ok(documents
        .iter()
        .flat_map(|document| document.symbols.defines().iter().map(|define| define.name.clone()))
        .unique()
        .sorted()
        .map(|name| CompletionItem {
            label: name,
            kind: Some(CompletionItemKind::REFERENCE),
            ..Default::default()
        })
        .collect())
}
