use super::lexer::{scan_actions, tokenize, ActionSpan, Token, TokenKind};
use super::tree::{NodeId, NodeKind, SyntaxTree};

/// Parse a chart template into a [`SyntaxTree`].
///
/// Never fails. Broken input yields `Error` nodes, and blocks without an `end`
/// extend to the end of the text.
pub fn parse(text: &str) -> SyntaxTree {
    let parser = Parser {
        tree: SyntaxTree::new(text.to_string()),
        stack: Vec::new(),
    };
    parser.run()
}

struct Frame {
    block: NodeId,
    /// The block itself, or its latest else clause.
    body: NodeId,
}

struct Parser {
    tree: SyntaxTree,
    stack: Vec<Frame>,
}

impl Parser {
    fn body(&self) -> NodeId {
        self.stack
            .last()
            .map(|frame| frame.body)
            .unwrap_or_else(|| self.tree.root())
    }

    fn run(mut self) -> SyntaxTree {
        let len = self.tree.source().len();
        let actions = scan_actions(self.tree.source());

        let mut cursor = 0;
        for action in &actions {
            if action.span.start > cursor {
                let body = self.body();
                self.tree
                    .push(NodeKind::Text, cursor..action.span.start, body);
            }
            self.action(action);
            cursor = action.span.end;
        }
        if cursor < len {
            let body = self.body();
            self.tree.push(NodeKind::Text, cursor..len, body);
        }

        while let Some(frame) = self.stack.pop() {
            if frame.body != frame.block {
                self.tree.set_end(frame.body, len);
            }
            self.tree.set_end(frame.block, len);
        }

        self.tree
    }

    fn keyword(&self, token: Option<&Token>) -> Option<String> {
        token
            .filter(|token| token.kind == TokenKind::Keyword)
            .map(|token| self.tree.source()[token.span.clone()].to_string())
    }

    fn action(&mut self, action: &ActionSpan) {
        let body = self.body();
        if action.comment {
            self.tree
                .push(NodeKind::Comment, action.span.clone(), body);
            return;
        }

        let tokens = tokenize(self.tree.source(), action.inner.clone());
        let rest = tokens.get(1..).unwrap_or_default();

        match self.keyword(tokens.first()).as_deref() {
            Some("if") => self.open_block(NodeKind::IfAction, action, rest),
            Some("with") => self.open_block(NodeKind::WithAction, action, rest),
            Some("range") => self.open_block(NodeKind::RangeAction, action, rest),
            Some("define") => self.open_named_block(NodeKind::DefineAction, action, rest),
            Some("block") => self.open_named_block(NodeKind::BlockAction, action, rest),
            Some("template") => {
                let node = self.open(NodeKind::TemplateAction, action, body);
                self.named_call(node, rest);
            }
            Some("else") => self.else_clause(action, rest),
            Some("end") => self.end(action),
            Some("break") => {
                self.open(NodeKind::BreakAction, action, body);
            }
            Some("continue") => {
                self.open(NodeKind::ContinueAction, action, body);
            }
            Some(_) => {
                self.tree.push(NodeKind::Error, action.span.clone(), body);
            }
            None if tokens.is_empty() => {
                self.tree.push(NodeKind::Error, action.span.clone(), body);
            }
            None => {
                let node = self.open(NodeKind::Action, action, body);
                self.pipeline(&tokens, node, false);
            }
        }
    }

    /// Push the node for an action. An unterminated action gets an `Error` child
    /// over its opening delimiter; its pipeline is still parsed.
    fn open(&mut self, kind: NodeKind, action: &ActionSpan, parent: NodeId) -> NodeId {
        let node = self.tree.push(kind, action.span.clone(), parent);
        if !action.terminated {
            let start = action.span.start;
            self.tree.push(NodeKind::Error, start..start + 2, node);
        }
        node
    }

    fn open_block(&mut self, kind: NodeKind, action: &ActionSpan, rest: &[Token]) {
        let body = self.body();
        let node = self.open(kind, action, body);
        self.pipeline(rest, node, kind == NodeKind::RangeAction);
        self.stack.push(Frame {
            block: node,
            body: node,
        });
    }

    fn open_named_block(&mut self, kind: NodeKind, action: &ActionSpan, rest: &[Token]) {
        let body = self.body();
        let node = self.open(kind, action, body);
        self.named_call(node, rest);
        self.stack.push(Frame {
            block: node,
            body: node,
        });
    }

    /// `"name" pipeline?` after `define`, `block` and `template`.
    fn named_call(&mut self, node: NodeId, rest: &[Token]) {
        let name_kind = match rest.first().map(|token| token.kind) {
            Some(TokenKind::String) => Some(NodeKind::StringLiteral),
            Some(TokenKind::RawString) => Some(NodeKind::RawStringLiteral),
            _ => None,
        };
        match name_kind {
            Some(kind) => {
                self.tree.push(kind, rest[0].span.clone(), node);
                self.pipeline(&rest[1..], node, false);
            }
            None => self.pipeline(rest, node, false),
        }
    }

    fn else_clause(&mut self, action: &ActionSpan, rest: &[Token]) {
        let top = self.stack.last().map(|frame| (frame.block, frame.body));
        let Some((block, body)) = top.filter(|(block, _)| {
            matches!(
                self.tree.kind(*block),
                NodeKind::IfAction | NodeKind::WithAction | NodeKind::RangeAction
            )
        }) else {
            let body = self.body();
            self.tree.push(NodeKind::Error, action.span.clone(), body);
            return;
        };

        if body != block {
            self.tree.set_end(body, action.span.start);
        }
        let clause = self.open(NodeKind::ElseClause, action, block);
        let condition = match self.keyword(rest.first()).as_deref() {
            Some("if") | Some("with") => &rest[1..],
            _ => rest,
        };
        self.pipeline(condition, clause, false);
        if let Some(frame) = self.stack.last_mut() {
            frame.body = clause;
        }
    }

    fn end(&mut self, action: &ActionSpan) {
        match self.stack.pop() {
            Some(frame) => {
                if frame.body != frame.block {
                    self.tree.set_end(frame.body, action.span.start);
                }
                self.tree.set_end(frame.block, action.span.end);
            }
            None => {
                let root = self.tree.root();
                self.tree.push(NodeKind::Error, action.span.clone(), root);
            }
        }
    }

    fn pipeline(&mut self, tokens: &[Token], parent: NodeId, in_range: bool) {
        let (Some(first), Some(last)) = (tokens.first(), tokens.last()) else {
            return;
        };
        let span = first.span.start..last.span.end;

        let kinds: Vec<TokenKind> = tokens.iter().take(4).map(|token| token.kind).collect();
        let declaration = match kinds.as_slice() {
            [TokenKind::Variable, TokenKind::Declare, ..] if in_range => {
                Some((NodeKind::RangeVariableDefinition, 1, 2))
            }
            [TokenKind::Variable, TokenKind::Declare, ..] => {
                Some((NodeKind::VariableDefinition, 1, 2))
            }
            [TokenKind::Variable, TokenKind::Assign, ..] => Some((NodeKind::Assignment, 1, 2)),
            [TokenKind::Variable, TokenKind::Comma, TokenKind::Variable, TokenKind::Declare]
                if in_range =>
            {
                Some((NodeKind::RangeVariableDefinition, 2, 4))
            }
            _ => None,
        };

        match declaration {
            Some((kind, variables, value_start)) => {
                let node = self.tree.push(kind, span, parent);
                self.variable(&tokens[0], node);
                if variables == 2 {
                    self.variable(&tokens[2], node);
                }
                self.commands(&tokens[value_start..], node);
            }
            None => self.commands(tokens, parent),
        }
    }

    fn commands(&mut self, tokens: &[Token], parent: NodeId) {
        let mut parts = Vec::new();
        let mut depth = 0usize;
        let mut start = 0;
        for (i, token) in tokens.iter().enumerate() {
            match token.kind {
                TokenKind::LeftParen => depth += 1,
                TokenKind::RightParen => depth = depth.saturating_sub(1),
                TokenKind::Pipe if depth == 0 => {
                    parts.push(&tokens[start..i]);
                    start = i + 1;
                }
                _ => {}
            }
        }
        parts.push(&tokens[start..]);

        if parts.len() == 1 {
            self.command(parts[0], parent);
            return;
        }
        let (Some(first), Some(last)) = (tokens.first(), tokens.last()) else {
            return;
        };
        let chain = self.tree.push(
            NodeKind::ChainedPipeline,
            first.span.start..last.span.end,
            parent,
        );
        for part in parts {
            self.command(part, chain);
        }
    }

    fn command(&mut self, tokens: &[Token], parent: NodeId) {
        let (Some(first), Some(last)) = (tokens.first(), tokens.last()) else {
            return;
        };
        if first.kind == TokenKind::Identifier {
            let call = self.tree.push(
                NodeKind::FunctionCall,
                first.span.start..last.span.end,
                parent,
            );
            self.tree
                .push(NodeKind::Identifier, first.span.clone(), call);
            self.operands(&tokens[1..], call);
        } else {
            self.operands(tokens, parent);
        }
    }

    fn operands(&mut self, tokens: &[Token], parent: NodeId) {
        let mut index = 0;
        while index < tokens.len() {
            self.operand(tokens, &mut index, parent);
        }
    }

    fn operand(&mut self, tokens: &[Token], index: &mut usize, parent: NodeId) {
        let token = &tokens[*index];
        *index += 1;
        let span = token.span.clone();

        let mut node = match token.kind {
            TokenKind::Dot => self.tree.push(NodeKind::Dot, span, parent),
            TokenKind::Field => {
                let field = self.tree.push(NodeKind::Field, span.clone(), parent);
                self.tree
                    .push(NodeKind::Identifier, span.start + 1..span.end, field);
                field
            }
            TokenKind::Variable => self.variable(token, parent),
            TokenKind::String => self.tree.push(NodeKind::StringLiteral, span, parent),
            TokenKind::RawString => self.tree.push(NodeKind::RawStringLiteral, span, parent),
            TokenKind::Number | TokenKind::Char => {
                self.tree.push(NodeKind::NumberLiteral, span, parent)
            }
            TokenKind::Bool => self.tree.push(NodeKind::BoolLiteral, span, parent),
            TokenKind::Nil => self.tree.push(NodeKind::NilLiteral, span, parent),
            TokenKind::Identifier => {
                let call = self.tree.push(NodeKind::FunctionCall, span.clone(), parent);
                self.tree.push(NodeKind::Identifier, span, call);
                call
            }
            TokenKind::LeftParen => {
                let close = matching_paren(tokens, *index - 1);
                let inner_end = close.unwrap_or(tokens.len());
                let end = close
                    .map(|close| tokens[close].span.end)
                    .or_else(|| tokens.last().map(|last| last.span.end))
                    .unwrap_or(span.end);
                let group =
                    self.tree
                        .push(NodeKind::ParenthesizedPipeline, span.start..end, parent);
                self.pipeline(&tokens[*index..inner_end], group, false);
                *index = close.map(|close| close + 1).unwrap_or(tokens.len());
                group
            }
            _ => self.tree.push(NodeKind::Error, span, parent),
        };

        // `.a.b` chains: every adjacent field wraps what came before it.
        while let Some(next) = tokens.get(*index) {
            let start = self.tree.node(node).span.start;
            let end = self.tree.node(node).span.end;
            if next.span.start != end || !matches!(next.kind, TokenKind::Field | TokenKind::Dot) {
                break;
            }
            *index += 1;
            let field_span = match next.kind {
                TokenKind::Field => next.span.start + 1..next.span.end,
                _ => next.span.end..next.span.end,
            };
            let selector =
                self.tree
                    .push(NodeKind::SelectorExpression, start..field_span.end, parent);
            self.tree.reparent(node, selector);
            self.tree
                .push(NodeKind::FieldIdentifier, field_span, selector);
            node = selector;
        }
    }

    fn variable(&mut self, token: &Token, parent: NodeId) -> NodeId {
        let span = token.span.clone();
        let variable = self.tree.push(NodeKind::Variable, span.clone(), parent);
        if span.len() == 1 {
            self.tree.push(NodeKind::Dollar, span, variable);
        } else {
            self.tree
                .push(NodeKind::Identifier, span.start + 1..span.end, variable);
        }
        variable
    }
}

fn matching_paren(tokens: &[Token], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (i, token) in tokens.iter().enumerate().skip(open) {
        match token.kind {
            TokenKind::LeftParen => depth += 1,
            TokenKind::RightParen => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}
