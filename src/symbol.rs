//! Scoped symbol table derived from a template's [`SyntaxTree`].
//!
//! Block constructs (`if`, `else`, `range`, `with`, `define`, `block`) open a
//! scope spanning the whole construct. A `$name` use resolves to the closest
//! preceding declaration, searching the narrowest enclosing scope first and then
//! walking outward. `$` itself is always bound to the root context.
//!
//! Besides variables the table records what `.` means inside `with` and `range`
//! bodies, so that `.image.tag` inside `{{ with .Values }}` is known to be
//! `Values.image.tag`.

use std::{collections::HashMap, fmt, ops::Range};

use crate::{
    builtins,
    error::{Error, Result},
    template::{NodeId, NodeKind, SyntaxTree},
};

/// Segment standing for "an element of the ranged list".
pub const ELEMENT_SEGMENT: &str = "[]";

/// Identifier path under the root context, e.g. `Values.image.tag`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct TemplateContext(Vec<String>);

impl TemplateContext {
    pub fn new<I, S>(segments: I) -> TemplateContext
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        TemplateContext(segments.into_iter().map(Into::into).collect())
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The built-in namespace this path starts with.
    pub fn namespace(&self) -> Option<&str> {
        self.0.first().map(String::as_str)
    }

    /// Everything after the namespace.
    pub fn tail(&self) -> &[String] {
        self.0.get(1..).unwrap_or_default()
    }

    pub fn child(&self, segment: &str) -> TemplateContext {
        let mut segments = self.0.clone();
        segments.push(segment.to_string());
        TemplateContext(segments)
    }

    pub fn parent(&self) -> TemplateContext {
        let mut segments = self.0.clone();
        segments.pop();
        TemplateContext(segments)
    }

    pub fn format(&self) -> String {
        self.0.join(".")
    }
}

impl fmt::Display for TemplateContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    /// `$`
    Root,
    Variable,
    RangeIndex,
    RangeElement,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    /// Without the leading `$`. Empty for the root binding.
    pub name: String,
    pub kind: BindingKind,
    /// The `$name` token at the declaration.
    pub span: Range<usize>,
    /// The whole declaration, `$name := value`.
    pub declaration: Range<usize>,
    pub scope: usize,
    pub context: Option<TemplateContext>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scope {
    pub span: Range<usize>,
    pub parent: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct VariableUse {
    span: Range<usize>,
    binding: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct DotRegion {
    span: Range<usize>,
    context: TemplateContext,
}

/// One access of a built-in namespace path. The span covers the last segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextUse {
    pub context: TemplateContext,
    pub span: Range<usize>,
}

/// `{{ define "name" }}` or `{{ block "name" }}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Define {
    pub name: String,
    pub name_span: Range<usize>,
    pub span: Range<usize>,
}

/// `include "name"` or `template "name"`. The span covers the string literal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Include {
    pub name: String,
    pub span: Range<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Candidate<'a> {
    Variable(&'a Binding),
    Namespace(&'static str),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SymbolTable {
    scopes: Vec<Scope>,
    bindings: Vec<Binding>,
    uses: Vec<VariableUse>,
    use_at: HashMap<usize, usize>,
    binding_at: HashMap<usize, usize>,
    regions: Vec<DotRegion>,
    context_uses: Vec<ContextUse>,
    defines: Vec<Define>,
    includes: Vec<Include>,
}

impl SymbolTable {
    pub fn build(tree: &SyntaxTree) -> SymbolTable {
        let root_span = tree.node(tree.root()).span.clone();
        let mut table = SymbolTable {
            scopes: vec![Scope {
                span: root_span,
                parent: None,
            }],
            bindings: vec![Binding {
                name: String::new(),
                kind: BindingKind::Root,
                span: 0..0,
                declaration: 0..0,
                scope: 0,
                context: Some(TemplateContext::default()),
            }],
            ..SymbolTable::default()
        };

        for child in tree.children(tree.root()) {
            table.visit(tree, *child, 0);
        }
        table
    }

    fn visit(&mut self, tree: &SyntaxTree, id: NodeId, scope: usize) {
        let kind = tree.kind(id);
        match kind {
            _ if kind.introduces_scope() => self.visit_block(tree, id, scope),
            NodeKind::VariableDefinition | NodeKind::RangeVariableDefinition => {
                self.visit_definition(tree, id, scope)
            }
            NodeKind::Variable => self.visit_variable_use(tree, id, scope),
            NodeKind::Field | NodeKind::SelectorExpression => {
                for child in tree.children(id) {
                    self.visit(tree, *child, scope);
                }
                self.record_context_use(tree, id);
            }
            NodeKind::FunctionCall => {
                self.record_include_call(tree, id);
                for child in tree.children(id) {
                    self.visit(tree, *child, scope);
                }
            }
            NodeKind::TemplateAction => {
                if let Some(name) = name_literal(tree, id) {
                    self.includes.push(Include {
                        name: unquote(tree.text(name)).to_string(),
                        span: tree.node(name).span.clone(),
                    });
                }
                for child in tree.children(id) {
                    self.visit(tree, *child, scope);
                }
            }
            _ => {
                for child in tree.children(id) {
                    self.visit(tree, *child, scope);
                }
            }
        }
    }

    fn visit_block(&mut self, tree: &SyntaxTree, id: NodeId, parent: usize) {
        let kind = tree.kind(id);
        let span = tree.node(id).span.clone();
        let scope = self.scopes.len();
        self.scopes.push(Scope {
            span: span.clone(),
            parent: Some(parent),
        });

        if matches!(kind, NodeKind::DefineAction | NodeKind::BlockAction) {
            if let Some(name) = name_literal(tree, id) {
                self.defines.push(Define {
                    name: unquote(tree.text(name)).to_string(),
                    name_span: tree.node(name).span.clone(),
                    span: span.clone(),
                });
            }
        }

        let header_end = tree.header_end(id);
        let (header, body): (Vec<NodeId>, Vec<NodeId>) = tree
            .children(id)
            .iter()
            .copied()
            .partition(|child| tree.node(*child).span.end <= header_end);

        for child in &header {
            self.visit(tree, *child, scope);
        }

        let rebinds_dot = match kind {
            NodeKind::WithAction | NodeKind::RangeAction => true,
            NodeKind::ElseClause => is_else_with(tree.text(id)),
            _ => false,
        };
        if rebinds_dot {
            let condition = header
                .iter()
                .rev()
                .copied()
                .find(|child| tree.kind(*child) != NodeKind::Error);
            let context = condition.and_then(|condition| {
                let value = match tree.kind(condition) {
                    NodeKind::VariableDefinition | NodeKind::RangeVariableDefinition => {
                        tree.children(condition).last().copied()?
                    }
                    _ => condition,
                };
                self.context_of(tree, value)
            });
            if let Some(context) = context {
                let context = match kind {
                    NodeKind::RangeAction => context.child(ELEMENT_SEGMENT),
                    _ => context,
                };
                let region_end = body
                    .iter()
                    .find(|child| tree.kind(**child) == NodeKind::ElseClause)
                    .map(|clause| tree.node(*clause).span.start)
                    .unwrap_or(span.end);
                self.regions.push(DotRegion {
                    span: header_end..region_end,
                    context,
                });
            }
        }

        for child in &body {
            self.visit(tree, *child, scope);
        }
    }

    fn visit_definition(&mut self, tree: &SyntaxTree, id: NodeId, scope: usize) {
        let children = tree.children(id);
        let variables: Vec<NodeId> = children
            .iter()
            .copied()
            .take_while(|child| tree.kind(*child) == NodeKind::Variable)
            .collect();
        let value = children.get(variables.len()).copied();

        // The value is evaluated before the new name exists.
        for child in &children[variables.len()..] {
            self.visit(tree, *child, scope);
        }
        let context = value.and_then(|value| self.context_of(tree, value));
        let declaration = tree.node(id).span.clone();

        let in_range = tree.kind(id) == NodeKind::RangeVariableDefinition;
        for (position, variable) in variables.iter().enumerate() {
            let (kind, context) = match (in_range, variables.len(), position) {
                (false, _, _) => (BindingKind::Variable, context.clone()),
                (true, 2, 0) => (BindingKind::RangeIndex, None),
                (true, _, _) => (
                    BindingKind::RangeElement,
                    context.as_ref().map(|context| context.child(ELEMENT_SEGMENT)),
                ),
            };
            let span = tree.node(*variable).span.clone();
            self.binding_at.insert(span.start, self.bindings.len());
            self.bindings.push(Binding {
                name: variable_name(tree, *variable).to_string(),
                kind,
                span,
                declaration: declaration.clone(),
                scope,
                context,
            });
        }
    }

    fn visit_variable_use(&mut self, tree: &SyntaxTree, id: NodeId, scope: usize) {
        let span = tree.node(id).span.clone();
        let name = variable_name(tree, id);
        let binding = match name {
            "" => Some(0),
            _ => self.resolve(name, span.start, scope),
        };
        self.use_at.insert(span.start, self.uses.len());
        self.uses.push(VariableUse { span, binding });
    }

    fn resolve(&self, name: &str, offset: usize, scope: usize) -> Option<usize> {
        let mut current = Some(scope);
        while let Some(scope) = current {
            let found = self
                .bindings
                .iter()
                .enumerate()
                .filter(|(_, binding)| {
                    binding.scope == scope
                        && binding.kind != BindingKind::Root
                        && binding.name == name
                        && binding.declaration.end <= offset
                })
                .max_by_key(|(_, binding)| binding.span.start)
                .map(|(index, _)| index);
            if found.is_some() {
                return found;
            }
            current = self.scopes[scope].parent;
        }
        None
    }

    fn record_context_use(&mut self, tree: &SyntaxTree, id: NodeId) {
        let segment = match tree.kind(id) {
            NodeKind::Field => tree.first_child_of_kind(id, NodeKind::Identifier),
            _ => tree.first_child_of_kind(id, NodeKind::FieldIdentifier),
        };
        let Some(segment) = segment else {
            return;
        };
        let span = tree.node(segment).span.clone();
        if span.is_empty() {
            return;
        }
        if let Some(context) = self.context_of(tree, id).filter(|c| !c.is_empty()) {
            self.context_uses.push(ContextUse { context, span });
        }
    }

    fn record_include_call(&mut self, tree: &SyntaxTree, id: NodeId) {
        let children = tree.children(id);
        let is_include = children
            .first()
            .is_some_and(|callee| matches!(tree.text(*callee), "include" | "template"));
        if !is_include {
            return;
        }
        if let Some(name) = children.get(1).filter(|name| {
            matches!(
                tree.kind(**name),
                NodeKind::StringLiteral | NodeKind::RawStringLiteral
            )
        }) {
            self.includes.push(Include {
                name: unquote(tree.text(*name)).to_string(),
                span: tree.node(*name).span.clone(),
            });
        }
    }

    fn dot_context_at(&self, offset: usize) -> TemplateContext {
        self.regions
            .iter()
            .filter(|region| region.span.start <= offset && offset < region.span.end)
            .min_by_key(|region| region.span.len())
            .map(|region| region.context.clone())
            .unwrap_or_default()
    }

    fn context_of(&self, tree: &SyntaxTree, id: NodeId) -> Option<TemplateContext> {
        let span = &tree.node(id).span;
        match tree.kind(id) {
            NodeKind::Dot => Some(self.dot_context_at(span.start)),
            NodeKind::Field => {
                let name = tree.first_child_of_kind(id, NodeKind::Identifier)?;
                Some(self.dot_context_at(span.start).child(tree.text(name)))
            }
            NodeKind::SelectorExpression => {
                let operand = *tree.children(id).first()?;
                let operand = self.context_of(tree, operand)?;
                match tree.first_child_of_kind(id, NodeKind::FieldIdentifier) {
                    Some(field) if !tree.text(field).is_empty() => {
                        Some(operand.child(tree.text(field)))
                    }
                    _ => Some(operand),
                }
            }
            NodeKind::Variable => {
                let binding = self
                    .use_at
                    .get(&span.start)
                    .and_then(|index| self.uses[*index].binding)
                    .or_else(|| self.binding_at.get(&span.start).copied())?;
                self.bindings[binding].context.clone()
            }
            NodeKind::ParenthesizedPipeline => {
                let inner = *tree.children(id).last()?;
                self.context_of(tree, inner)
            }
            _ => None,
        }
    }

    /// Namespace path for a node under the cursor. Identifiers are resolved
    /// through the expression that owns them.
    pub fn template_context_at(
        &self,
        tree: &SyntaxTree,
        node: NodeId,
    ) -> Option<TemplateContext> {
        match tree.kind(node) {
            NodeKind::Identifier | NodeKind::FieldIdentifier | NodeKind::Dollar => {
                self.context_of(tree, tree.parent(node)?)
            }
            _ => self.context_of(tree, node),
        }
    }

    fn binding_for(&self, tree: &SyntaxTree, node: NodeId) -> Result<usize> {
        let variable = match tree.kind(node) {
            NodeKind::Variable => node,
            _ => tree
                .parent(node)
                .filter(|parent| tree.kind(*parent) == NodeKind::Variable)
                .ok_or_else(|| Error::UnboundVariable(tree.text(node).to_string()))?,
        };
        let start = tree.node(variable).span.start;
        if let Some(binding) = self.binding_at.get(&start) {
            return Ok(*binding);
        }
        self.use_at
            .get(&start)
            .and_then(|index| self.uses[*index].binding)
            .ok_or_else(|| Error::UnboundVariable(variable_name(tree, variable).to_string()))
    }

    /// The declaration a variable node refers to. A declaration resolves to itself.
    pub fn definition_for(&self, tree: &SyntaxTree, node: NodeId) -> Result<&Binding> {
        self.binding_for(tree, node)
            .map(|binding| &self.bindings[binding])
    }

    /// Declaration and every use of the variable under `node`, in document order.
    pub fn references_for(&self, tree: &SyntaxTree, node: NodeId) -> Result<Vec<Range<usize>>> {
        let binding = self.binding_for(tree, node)?;
        let mut spans: Vec<Range<usize>> = self
            .uses
            .iter()
            .filter(|variable_use| variable_use.binding == Some(binding))
            .map(|variable_use| variable_use.span.clone())
            .collect();
        if self.bindings[binding].kind != BindingKind::Root {
            spans.push(self.bindings[binding].span.clone());
        }
        spans.sort_by_key(|span| span.start);
        Ok(spans)
    }

    fn scope_at(&self, offset: usize) -> usize {
        let end_of_text = self.scopes[0].span.end;
        self.scopes
            .iter()
            .enumerate()
            .filter(|(_, scope)| {
                scope.span.start <= offset
                    && (offset < scope.span.end || scope.span.end == end_of_text)
            })
            .min_by_key(|(_, scope)| scope.span.len())
            .map(|(index, _)| index)
            .unwrap_or(0)
    }

    /// Variables visible at `offset`, innermost first, followed by the built-in
    /// namespace roots. A shadowed name is listed once.
    pub fn completions_at(&self, offset: usize) -> Vec<Candidate<'_>> {
        let mut candidates = Vec::new();
        let mut seen = Vec::new();
        let mut current = Some(self.scope_at(offset));

        while let Some(scope) = current {
            let mut visible: Vec<&Binding> = self
                .bindings
                .iter()
                .filter(|binding| {
                    binding.scope == scope
                        && binding.kind != BindingKind::Root
                        && binding.declaration.end <= offset
                })
                .collect();
            visible.sort_by_key(|binding| std::cmp::Reverse(binding.span.start));
            for binding in visible {
                if !seen.contains(&binding.name.as_str()) {
                    seen.push(binding.name.as_str());
                    candidates.push(Candidate::Variable(binding));
                }
            }
            current = self.scopes[scope].parent;
        }

        candidates.extend(builtins::NAMESPACES.iter().map(|ns| Candidate::Namespace(ns.name)));
        candidates
    }

    /// Every access of exactly `context`, in document order.
    pub fn context_references(&self, context: &TemplateContext) -> Vec<Range<usize>> {
        self.context_uses
            .iter()
            .filter(|context_use| &context_use.context == context)
            .map(|context_use| context_use.span.clone())
            .collect()
    }

    pub fn define_spans(&self, name: &str) -> Vec<&Define> {
        self.defines
            .iter()
            .filter(|define| define.name == name)
            .collect()
    }

    pub fn defines(&self) -> &[Define] {
        &self.defines
    }

    pub fn includes(&self) -> &[Include] {
        &self.includes
    }

    pub fn scopes(&self) -> &[Scope] {
        &self.scopes
    }
}

fn variable_name(tree: &SyntaxTree, variable: NodeId) -> &str {
    tree.text(variable).trim_start_matches('$')
}

fn name_literal(tree: &SyntaxTree, id: NodeId) -> Option<NodeId> {
    tree.children(id).iter().copied().find(|child| {
        matches!(
            tree.kind(*child),
            NodeKind::StringLiteral | NodeKind::RawStringLiteral
        )
    })
}

pub(crate) fn unquote(literal: &str) -> &str {
    let trimmed = literal
        .strip_prefix(['"', '`'])
        .unwrap_or(literal);
    trimmed.strip_suffix(['"', '`']).unwrap_or(trimmed)
}

fn is_else_with(text: &str) -> bool {
    let rest = text.trim_start_matches("{{").trim_start_matches('-').trim_start();
    rest.strip_prefix("else")
        .map(|rest| rest.trim_start().starts_with("with"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::parse;

    fn node_at(tree: &SyntaxTree, text: &str, needle: &str, nth: usize) -> NodeId {
        let offset = text
            .match_indices(needle)
            .nth(nth)
            .map(|(offset, _)| offset)
            .unwrap_or_else(|| panic!("{needle:?} occurs fewer than {} times", nth + 1));
        tree.node_at(offset + 1)
    }

    #[test]
    fn test_use_resolves_to_declaration() {
        let text = "{{ $name := .Values.name }}\nname: {{ $name }}";
        let tree = parse(text);
        let table = SymbolTable::build(&tree);

        let use_node = node_at(&tree, text, "$name", 1);
        let binding = table.definition_for(&tree, use_node).unwrap();

        assert_eq!(binding.name, "name");
        assert_eq!(&text[binding.span.clone()], "$name");
        assert_eq!(binding.span.start, text.find("$name").unwrap());
        assert_eq!(
            binding.context,
            Some(TemplateContext::new(["Values", "name"]))
        );
    }

    #[test]
    fn test_unbound_variable_is_an_error() {
        let text = "{{ $missing }}";
        let tree = parse(text);
        let table = SymbolTable::build(&tree);

        let node = node_at(&tree, text, "$missing", 0);
        assert!(matches!(
            table.definition_for(&tree, node),
            Err(Error::UnboundVariable(name)) if name == "missing"
        ));
    }

    /// Test: A variable bound inside a loop body is invisible after the loop.
    #[test]
    fn test_loop_local_binding_invisible_outside() {
        let text = "{{ range .Values.items }}{{ $item := . }}{{ $item }}{{ end }}\n{{ $item }}";
        let tree = parse(text);
        let table = SymbolTable::build(&tree);

        let inside = node_at(&tree, text, "$item", 1);
        assert!(table.definition_for(&tree, inside).is_ok());

        let outside = node_at(&tree, text, "$item", 2);
        assert!(table.definition_for(&tree, outside).is_err());

        let after_loop = text.rfind("{{").unwrap();
        assert!(table
            .completions_at(after_loop)
            .iter()
            .all(|candidate| !matches!(candidate, Candidate::Variable(b) if b.name == "item")));
    }

    /// Test: Shadowing inside a conditional applies only until its `end`.
    #[test]
    fn test_shadowing_inside_conditional() {
        let text = "{{ $x := 1 }}{{ if .Values.on }}{{ $x := 2 }}{{ $x }}{{ end }}{{ $x }}";
        let tree = parse(text);
        let table = SymbolTable::build(&tree);

        let outer_decl = text.find("$x").unwrap();
        let inner_decl = text.match_indices("$x").nth(1).unwrap().0;

        let inner_use = node_at(&tree, text, "$x", 2);
        assert_eq!(
            table.definition_for(&tree, inner_use).unwrap().span.start,
            inner_decl
        );

        let outer_use = node_at(&tree, text, "$x", 3);
        assert_eq!(
            table.definition_for(&tree, outer_use).unwrap().span.start,
            outer_decl
        );
    }

    /// Test: At the exact edges of a shadowing scope the narrowest enclosing scope
    /// wins; the scope's end belongs to its parent.
    #[test]
    fn test_scope_boundaries_resolve_to_narrowest_scope() {
        let text = "{{ $x := 1 }}{{ if .Values.on }}{{ $x := 2 }}{{ $x }}{{ end }}{{ $x }}";
        let tree = parse(text);
        let table = SymbolTable::build(&tree);
        let inner = table
            .scopes()
            .iter()
            .position(|scope| scope.parent == Some(0))
            .unwrap();
        let span = table.scopes()[inner].span.clone();

        assert_eq!(table.scope_at(span.start), inner);
        assert_eq!(table.scope_at(span.end - 1), inner);
        assert_eq!(table.scope_at(span.end), 0);

        let inner_decl = text.match_indices("$x").nth(1).unwrap().0;
        let first_visible = |offset| match table.completions_at(offset).first() {
            Some(Candidate::Variable(binding)) => binding.span.start,
            other => panic!("expected a variable, got {other:?}"),
        };
        assert_eq!(first_visible(span.end - 1), inner_decl);
        assert_eq!(first_visible(span.end), text.find("$x").unwrap());
    }

    #[test]
    fn test_declaration_value_sees_previous_binding() {
        let text = "{{ $x := 1 }}{{ $x := add $x 1 }}";
        let tree = parse(text);
        let table = SymbolTable::build(&tree);

        let in_value = node_at(&tree, text, "$x", 2);
        assert_eq!(
            table.definition_for(&tree, in_value).unwrap().span.start,
            text.find("$x").unwrap()
        );
    }

    #[test]
    fn test_references_in_document_order() {
        let text = "{{ $v := .Values.a }}{{ $v }}{{ if $v }}{{ $v }}{{ end }}";
        let tree = parse(text);
        let table = SymbolTable::build(&tree);

        let node = node_at(&tree, text, "$v", 2);
        let references = table.references_for(&tree, node).unwrap();
        let expected: Vec<usize> = text.match_indices("$v").map(|(i, _)| i).collect();

        assert_eq!(
            references.iter().map(|span| span.start).collect::<Vec<_>>(),
            expected
        );
    }

    #[test]
    fn test_completion_candidates_have_binding_sites() {
        let text = "{{ $a := 1 }}{{ with .Values.x }}{{ $b := . }}{{ $ }}{{ end }}";
        let tree = parse(text);
        let table = SymbolTable::build(&tree);
        let cursor = text.find("{{ $ }}").unwrap() + 4;

        let names: Vec<&str> = table
            .completions_at(cursor)
            .into_iter()
            .filter_map(|candidate| match candidate {
                Candidate::Variable(binding) => {
                    assert_eq!(&text[binding.span.clone()], format!("${}", binding.name));
                    Some(binding.name.as_str())
                }
                Candidate::Namespace(_) => None,
            })
            .collect();

        assert_eq!(names, vec!["b", "a"]);
        assert!(table
            .completions_at(cursor)
            .contains(&Candidate::Namespace("Values")));
    }

    #[test]
    fn test_dot_context_inside_with_and_range() {
        let text = "{{ with .Values.image }}{{ .tag }}{{ end }}{{ range .Values.ports }}{{ .name }}{{ end }}";
        let tree = parse(text);
        let table = SymbolTable::build(&tree);

        let tag = node_at(&tree, text, "tag", 0);
        assert_eq!(
            table.template_context_at(&tree, tag),
            Some(TemplateContext::new(["Values", "image", "tag"]))
        );

        let name = node_at(&tree, text, "name", 0);
        assert_eq!(
            table.template_context_at(&tree, name),
            Some(TemplateContext::new(["Values", "ports", "[]", "name"]))
        );
    }

    #[test]
    fn test_with_else_restores_outer_dot() {
        let text = "{{ with .Values.a }}{{ .x }}{{ else }}{{ .Values.b }}{{ end }}";
        let tree = parse(text);
        let table = SymbolTable::build(&tree);

        let b = node_at(&tree, text, "b }}", 0);
        assert_eq!(
            table.template_context_at(&tree, b),
            Some(TemplateContext::new(["Values", "b"]))
        );
    }

    #[test]
    fn test_variable_and_dollar_contexts() {
        let text = "{{ range $i, $port := .Values.ports }}{{ $port.number }}{{ $.Values.x }}{{ end }}";
        let tree = parse(text);
        let table = SymbolTable::build(&tree);

        let number = node_at(&tree, text, "number", 0);
        assert_eq!(
            table.template_context_at(&tree, number),
            Some(TemplateContext::new(["Values", "ports", "[]", "number"]))
        );

        let x = node_at(&tree, text, "x }}", 0);
        assert_eq!(
            table.template_context_at(&tree, x),
            Some(TemplateContext::new(["Values", "x"]))
        );

        let index = node_at(&tree, text, "$i", 0);
        let binding = table.definition_for(&tree, index).unwrap();
        assert_eq!(binding.kind, BindingKind::RangeIndex);
        assert_eq!(binding.context, None);
    }

    #[test]
    fn test_context_references_and_includes() {
        let text = "{{ define \"app.labels\" }}a: {{ .Values.a }}{{ end }}\n{{ include \"app.labels\" . }}\n{{ .Values.a | quote }}";
        let tree = parse(text);
        let table = SymbolTable::build(&tree);

        let references = table.context_references(&TemplateContext::new(["Values", "a"]));
        assert_eq!(references.len(), 2);

        assert_eq!(table.define_spans("app.labels").len(), 1);
        assert_eq!(table.includes().len(), 1);
        assert_eq!(table.includes()[0].name, "app.labels");
    }

    #[test]
    fn test_template_context_display() {
        let context = TemplateContext::new(["Values", "image", "tag"]);
        assert_eq!(context.to_string(), "Values.image.tag");
        assert_eq!(context.namespace(), Some("Values"));
        assert_eq!(context.tail(), ["image".to_string(), "tag".to_string()]);
    }
}
