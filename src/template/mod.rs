//! Tolerant parser for Go templates embedded in YAML.

mod lexer;
mod parser;
mod tree;

pub use lexer::{action_at, scan_actions, ActionSpan};
pub use parser::parse;
pub use tree::{Node, NodeId, NodeKind, SyntaxTree};
