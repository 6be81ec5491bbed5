//! Validator diagnostics, mapped back onto the template they were computed for.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use tower_lsp::lsp_types::{Diagnostic, Position, Range};

use crate::template::{self, scan_actions, NodeKind};

/// Prefix of every republished message.
pub const MESSAGE_PREFIX: &str = "Yamlls: ";

/// Parser complaints caused by the blanked-out actions rather than by the yaml
/// around them.
static STRUCTURAL_MESSAGES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(All mapping items must start at the same column|Implicit map keys need to be followed by map values|Implicit keys need to be on a single line|A block sequence may not be used as an implicit map key)",
    )
    .unwrap()
});

/// Duplicate keys across `if`/`else` branches are legal in a template.
static DUPLICATE_KEY: Lazy<Regex> = Lazy::new(|| Regex::new(r"^Map keys must be unique").unwrap());

/// Line geometry of the original template.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PositionMap {
    /// UTF-16 code units per line, line terminators excluded. Validator
    /// positions count in the same unit.
    line_lengths: Vec<u32>,
    /// Lines overlapping a `{{ ... }}` action.
    template_lines: HashSet<u32>,
    /// Lines inside an `else` branch.
    else_lines: HashSet<u32>,
}

impl PositionMap {
    pub fn new(text: &str) -> PositionMap {
        let line_starts: Vec<usize> = std::iter::once(0)
            .chain(text.match_indices('\n').map(|(index, _)| index + 1))
            .collect();
        let line_of = |offset: usize| match line_starts.binary_search(&offset) {
            Ok(line) => line as u32,
            Err(next) => next.saturating_sub(1) as u32,
        };

        let line_lengths = text
            .split('\n')
            .map(|line| line.trim_end_matches('\r').encode_utf16().count() as u32)
            .collect();

        let template_lines = scan_actions(text)
            .iter()
            .flat_map(|action| {
                line_of(action.span.start)..=line_of(action.span.end.saturating_sub(1))
            })
            .collect();

        let tree = template::parse(text);
        let else_lines = tree
            .ids()
            .filter(|id| tree.kind(*id) == NodeKind::ElseClause)
            .flat_map(|id| {
                let span = &tree.node(id).span;
                line_of(span.start)..=line_of(span.end.saturating_sub(1))
            })
            .collect();

        PositionMap {
            line_lengths,
            template_lines,
            else_lines,
        }
    }

    pub fn line_count(&self) -> usize {
        self.line_lengths.len()
    }

    /// The nearest position that exists in the original text.
    pub fn clamp(&self, position: Position) -> Position {
        let Some(last) = self.line_lengths.len().checked_sub(1) else {
            return Position::default();
        };
        let line = (position.line as usize).min(last);
        Position {
            line: line as u32,
            character: position.character.min(self.line_lengths[line]),
        }
    }

    pub fn touches_template(&self, line: u32) -> bool {
        self.template_lines.contains(&line)
    }

    pub fn in_else_branch(&self, line: u32) -> bool {
        self.else_lines.contains(&line)
    }
}

/// What the bridge keeps per open document.
#[derive(Debug, Clone)]
pub struct DiagnosticsRecord {
    /// Version sent to the validator. Starts at 1 and has no relation to the
    /// editor's version.
    pub synthetic_version: i32,
    pub map: PositionMap,
    /// Last diagnostics published for the document.
    pub diagnostics: Vec<Diagnostic>,
}

impl DiagnosticsRecord {
    pub fn new(text: &str) -> DiagnosticsRecord {
        DiagnosticsRecord {
            synthetic_version: 1,
            map: PositionMap::new(text),
            diagnostics: Vec::new(),
        }
    }

    /// Replace the geometry for a new text and bump the synthetic version.
    pub fn update(&mut self, text: &str) -> i32 {
        self.synthetic_version += 1;
        self.map = PositionMap::new(text);
        self.synthetic_version
    }
}

fn keep(map: &PositionMap, diagnostic: &Diagnostic) -> bool {
    let line = diagnostic.range.start.line;
    if STRUCTURAL_MESSAGES.is_match(&diagnostic.message) && map.touches_template(line) {
        return false;
    }
    !(DUPLICATE_KEY.is_match(&diagnostic.message) && map.in_else_branch(line))
}

/// Clamp, filter, prefix and limit validator diagnostics for the original text.
pub fn remap(map: &PositionMap, diagnostics: Vec<Diagnostic>, limit: usize) -> Vec<Diagnostic> {
    diagnostics
        .into_iter()
        .filter(|diagnostic| keep(map, diagnostic))
        .take(limit)
        .map(|diagnostic| Diagnostic {
            range: Range {
                start: map.clamp(diagnostic.range.start),
                end: map.clamp(diagnostic.range.end),
            },
            message: format!("{MESSAGE_PREFIX}{}", diagnostic.message),
            ..diagnostic
        })
        .collect()
}
