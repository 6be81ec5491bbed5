use tower_lsp::lsp_types::{CompletionList, CompletionParams, CompletionResponse};

use crate::{features, features::FeatureContext, template::NodeKind, workspace::Workspace};

mod matcher;

/// Upper bound of items returned for one request. The list is marked
/// incomplete so editors re-query as the user types.
const MAX_ITEMS: usize = 50;

pub fn get_completions(
    workspace: &Workspace,
    params: &CompletionParams,
) -> Option<CompletionResponse> {
    let uri = &params.text_document_position.text_document.uri;
    let document = workspace.documents.get(uri)?;
    let offset = document.offset_at(params.text_document_position.position);
    let context = FeatureContext::new(workspace, &document, offset);

    let items = features::completion(&context);
    if items.is_empty() {
        return None;
    }

    let items = matcher::rank(typed_prefix(&context), items)
        .into_iter()
        .take(MAX_ITEMS)
        .collect();

    Some(CompletionResponse::List(CompletionList {
        is_incomplete: true,
        items,
    }))
}

/// What the user has typed of the name under the cursor.
fn typed_prefix<'a>(context: &'a FeatureContext) -> &'a str {
    let tree = context.tree();
    let span = &tree.node(context.node).span;
    if !matches!(
        context.kind(),
        NodeKind::Identifier
            | NodeKind::FieldIdentifier
            | NodeKind::Field
            | NodeKind::Variable
            | NodeKind::StringLiteral
            | NodeKind::RawStringLiteral
    ) || context.offset < span.start
    {
        return "";
    }
    let end = context.offset.min(span.end);
    context.document.text()[span.start..end].trim_start_matches(['.', '$', '"', '`'])
}
