use std::ops::Range;

use super::lexer::action_at;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Document,
    Text,
    Comment,
    /// `{{ pipeline }}` without a keyword.
    Action,
    IfAction,
    RangeAction,
    WithAction,
    DefineAction,
    BlockAction,
    TemplateAction,
    /// `{{ else }}`, `{{ else if }}`, `{{ else with }}` up to the next branch or `end`.
    ElseClause,
    BreakAction,
    ContinueAction,
    ChainedPipeline,
    ParenthesizedPipeline,
    VariableDefinition,
    RangeVariableDefinition,
    Assignment,
    Variable,
    Dollar,
    Dot,
    Field,
    SelectorExpression,
    FieldIdentifier,
    Identifier,
    FunctionCall,
    StringLiteral,
    RawStringLiteral,
    NumberLiteral,
    BoolLiteral,
    NilLiteral,
    Error,
}

impl NodeKind {
    /// Block constructs that own a body and therefore a variable scope.
    pub fn is_block(self) -> bool {
        matches!(
            self,
            NodeKind::IfAction
                | NodeKind::RangeAction
                | NodeKind::WithAction
                | NodeKind::DefineAction
                | NodeKind::BlockAction
        )
    }

    pub fn introduces_scope(self) -> bool {
        self.is_block() || self == NodeKind::ElseClause
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub kind: NodeKind,
    /// Byte range in the source text.
    pub span: Range<usize>,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

/// Concrete syntax tree of one template, stored as an arena.
///
/// The tree owns its source so node text can be sliced without threading the
/// document around.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxTree {
    source: String,
    nodes: Vec<Node>,
}

impl SyntaxTree {
    pub(crate) fn new(source: String) -> SyntaxTree {
        let len = source.len();
        SyntaxTree {
            source,
            nodes: vec![Node {
                kind: NodeKind::Document,
                span: 0..len,
                parent: None,
                children: Vec::new(),
            }],
        }
    }

    pub(crate) fn push(&mut self, kind: NodeKind, span: Range<usize>, parent: NodeId) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node {
            kind,
            span,
            parent: Some(parent),
            children: Vec::new(),
        });
        self.nodes[parent.0 as usize].children.push(id);
        id
    }

    /// Move an already created node under a new parent. Used when a pipeline is
    /// wrapped after its operands were built.
    pub(crate) fn reparent(&mut self, id: NodeId, new_parent: NodeId) {
        if let Some(old) = self.nodes[id.0 as usize].parent {
            self.nodes[old.0 as usize].children.retain(|child| *child != id);
        }
        self.nodes[id.0 as usize].parent = Some(new_parent);
        self.nodes[new_parent.0 as usize].children.push(id);
    }

    pub(crate) fn set_end(&mut self, id: NodeId, end: usize) {
        self.nodes[id.0 as usize].span.end = end;
    }

    pub(crate) fn set_kind(&mut self, id: NodeId, kind: NodeKind) {
        self.nodes[id.0 as usize].kind = kind;
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0 as usize]
    }

    pub fn kind(&self, id: NodeId) -> NodeKind {
        self.node(id).kind
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    pub fn parent_kind(&self, id: NodeId) -> Option<NodeKind> {
        self.parent(id).map(|parent| self.kind(parent))
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.node(id).children
    }

    pub fn text(&self, id: NodeId) -> &str {
        let span = &self.node(id).span;
        &self.source[span.clone()]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len() as u32).map(NodeId)
    }

    /// Nodes in document order (pre-order walk).
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.children(next).iter().rev());
        }
        out
    }

    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(id), move |current| self.parent(*current))
    }

    /// Deepest node whose span covers `offset`. The end of a span counts as covered so
    /// that a cursor placed right after an identifier still lands on it.
    pub fn node_at(&self, offset: usize) -> NodeId {
        let mut current = self.root();
        loop {
            let children = self.children(current);
            let inside = children.iter().find(|child| {
                let span = &self.node(**child).span;
                span.start <= offset && offset < span.end
            });
            let touching = || {
                children.iter().rev().find(|child| {
                    let span = &self.node(**child).span;
                    span.start <= offset && offset == span.end
                })
            };
            match inside.or_else(touching) {
                Some(child) => current = *child,
                None => return current,
            }
        }
    }

    /// End of the opening `{{ ... }}` of a node that starts with an action, such as
    /// a block or an else clause. Where its body begins.
    pub fn header_end(&self, id: NodeId) -> usize {
        let span = &self.node(id).span;
        action_at(&self.source, span.start)
            .map(|action| action.span.end.min(span.end))
            .unwrap_or(span.end)
    }

    pub fn first_child_of_kind(&self, id: NodeId, kind: NodeKind) -> Option<NodeId> {
        self.children(id)
            .iter()
            .copied()
            .find(|child| self.kind(*child) == kind)
    }
}
