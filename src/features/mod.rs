//! Language features selected by the syntax node under the cursor.
//!
//! Each [`FeatureVariant`] is a predicate over `(node kind, parent kind)` plus the
//! handlers it supports. [`FEATURES`] is ordered most specific first and the first
//! variant whose predicate holds serves the request. Handler errors are logged and
//! turned into empty results.

mod functions;
mod includes;
mod template_context;
mod variables;

use std::{ops::Range, path::PathBuf, sync::Arc};

use tower_lsp::lsp_types::{CompletionItem, Location};
use tracing::debug;

use crate::{
    charts::Chart,
    document::Document,
    error::{Error, Result},
    template::{NodeId, NodeKind, SyntaxTree},
    workspace::Workspace,
};

/// Everything a handler may look at for one request.
pub struct FeatureContext<'a> {
    pub workspace: &'a Workspace,
    pub document: &'a Document,
    pub node: NodeId,
    pub offset: usize,
}

impl<'a> FeatureContext<'a> {
    pub fn new(workspace: &'a Workspace, document: &'a Document, offset: usize) -> Self {
        FeatureContext {
            workspace,
            document,
            node: document.tree.node_at(offset),
            offset,
        }
    }

    pub fn tree(&self) -> &SyntaxTree {
        &self.document.tree
    }

    pub fn kind(&self) -> NodeKind {
        self.tree().kind(self.node)
    }

    pub fn parent_kind(&self) -> Option<NodeKind> {
        self.tree().parent_kind(self.node)
    }

    pub fn node_text(&self) -> &str {
        self.tree().text(self.node)
    }

    pub fn chart(&self) -> Result<Arc<Chart>> {
        let path = self
            .document
            .path
            .as_deref()
            .ok_or_else(|| Error::ChartNotFound(PathBuf::from(self.document.uri.path())))?;
        self.workspace.charts.chart_for_location(path)
    }

    pub fn location(&self, span: Range<usize>) -> Location {
        Location {
            uri: self.document.uri.clone(),
            range: self.document.lsp_range(span),
        }
    }
}

type LocationsHandler = fn(&FeatureContext) -> Result<Vec<Location>>;
type HoverHandler = fn(&FeatureContext) -> Result<Option<String>>;
type CompletionHandler = fn(&FeatureContext) -> Result<Vec<CompletionItem>>;

pub struct FeatureVariant {
    pub name: &'static str,
    pub applies: fn(NodeKind, Option<NodeKind>) -> bool,
    pub definition: Option<LocationsHandler>,
    pub references: Option<LocationsHandler>,
    pub hover: Option<HoverHandler>,
    pub completion: Option<CompletionHandler>,
}

pub static FEATURES: &[FeatureVariant] = &[
    variables::VARIABLES,
    includes::INCLUDES,
    template_context::TEMPLATE_CONTEXT,
    functions::FUNCTIONS,
];

/// The variant serving a node of `kind` under a parent of `parent`.
pub fn select(kind: NodeKind, parent: Option<NodeKind>) -> Option<&'static FeatureVariant> {
    FEATURES.iter().find(|feature| (feature.applies)(kind, parent))
}

fn run<T: Default>(
    context: &FeatureContext,
    capability: &str,
    pick: impl Fn(&FeatureVariant) -> Option<fn(&FeatureContext) -> Result<T>>,
) -> T {
    let Some(feature) = select(context.kind(), context.parent_kind()) else {
        debug!("no {capability} feature for {:?}", context.kind());
        return T::default();
    };
    let Some(handler) = pick(feature) else {
        return T::default();
    };
    handler(context).unwrap_or_else(|err| {
        debug!("{} {capability} failed: {err}", feature.name);
        T::default()
    })
}

pub fn definition(context: &FeatureContext) -> Vec<Location> {
    run(context, "definition", |feature| feature.definition)
}

pub fn references(context: &FeatureContext) -> Vec<Location> {
    run(context, "references", |feature| feature.references)
}

pub fn hover(context: &FeatureContext) -> Option<String> {
    run(context, "hover", |feature| feature.hover)
}

pub fn completion(context: &FeatureContext) -> Vec<CompletionItem> {
    run(context, "completion", |feature| feature.completion)
}
