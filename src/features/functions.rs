use tower_lsp::lsp_types::{
    CompletionItem, CompletionItemKind, Documentation, MarkupContent, MarkupKind,
};

use super::{FeatureContext, FeatureVariant};
use crate::{builtins, error::Result, template::NodeKind};

pub const FUNCTIONS: FeatureVariant = FeatureVariant {
    name: "functions",
    applies,
    definition: None,
    references: None,
    hover: Some(hover),
    completion: Some(completion),
};

fn applies(kind: NodeKind, parent: Option<NodeKind>) -> bool {
    kind == NodeKind::Identifier && parent == Some(NodeKind::FunctionCall)
}

fn hover(context: &FeatureContext) -> Result<Option<String>> {
    Ok(builtins::function(context.node_text())
        .map(|function| format!("```helm\n{}\n```\n\n{}", function.signature, function.doc)))
}

fn completion(_context: &FeatureContext) -> Result<Vec<CompletionItem>> {
    Ok(builtins::FUNCTIONS
        .iter()
        .map(|function| CompletionItem {
            label: function.name.to_string(),
            kind: Some(CompletionItemKind::FUNCTION),
            detail: Some(function.signature.to_string()),
            documentation: Some(Documentation::MarkupContent(MarkupContent {
                kind: MarkupKind::Markdown,
                value: function.doc.to_string(),
            })),
            ..Default::default()
        })
        .collect())
}
