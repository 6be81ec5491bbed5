//! Hover provider for Helm templates.
//!
//! This module implements the LSP `textDocument/hover` capability. The
//! content depends on the syntax node under the cursor:
//!
//! | Target | Shows |
//! |--------|-------|
//! | `.Values.a.b` | The value in every values file that defines it |
//! | `.Chart.Name` | Field documentation and the value from `Chart.yaml` |
//! | `.Release.*`, `.Capabilities.*`, ... | Field documentation |
//! | `$var` | The declaration, plus its value when bound to `.Values` |
//! | `include "name"` | The `define` block |
//! | Function name | Signature and documentation |

use tower_lsp::lsp_types::{Hover, HoverContents, MarkupContent, MarkupKind, Position, Url};

use crate::{features, features::FeatureContext, workspace::Workspace};

/// Generate hover content for the node at the cursor position.
///
/// Returns `None` for unknown documents, for plain yaml text and when the
/// node has nothing to show (a values key no file defines, for example).
/// The hover range covers the node the content was computed for.
pub fn hover(workspace: &Workspace, uri: &Url, cursor_position: Position) -> Option<Hover> {
    let document = workspace.documents.get(uri)?;
    let offset = document.offset_at(cursor_position);
    let context = FeatureContext::new(workspace, &document, offset);

    let value = features::hover(&context)?;
    Some(Hover {
        contents: HoverContents::Markup(MarkupContent {
            kind: MarkupKind::Markdown,
            value,
        }),
        range: Some(document.lsp_range(context.tree().node(context.node).span.clone())),
    })
}
