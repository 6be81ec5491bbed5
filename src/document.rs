//! Open template documents.

use std::{
    ops::Range,
    path::PathBuf,
    sync::Arc,
};

use dashmap::DashMap;
use ropey::Rope;
use tower_lsp::lsp_types::{Position, Url};
use tracing::debug;

use crate::{
    symbol::SymbolTable,
    template::{self, NodeId, SyntaxTree},
};

/// An open document with its syntax tree and symbol table.
///
/// Both are derived in [`Document::new`], so a document never exists with a tree
/// that does not match its text.
#[derive(Debug)]
pub struct Document {
    pub uri: Url,
    pub path: Option<PathBuf>,
    pub version: i32,
    pub rope: Rope,
    pub tree: SyntaxTree,
    pub symbols: SymbolTable,
}

impl Document {
    pub fn new(uri: Url, text: &str, version: i32) -> Document {
        let tree = template::parse(text);
        let symbols = SymbolTable::build(&tree);
        Document {
            path: uri.to_file_path().ok(),
            uri,
            version,
            rope: Rope::from_str(text),
            tree,
            symbols,
        }
    }

    pub fn text(&self) -> &str {
        self.tree.source()
    }

    /// Byte offset of an editor position. Positions past the end of a line or of
    /// the document are clamped.
    pub fn offset_at(&self, position: Position) -> usize {
        let line = position.line as usize;
        if line >= self.rope.len_lines() {
            return self.rope.len_bytes();
        }
        let line_start = self.rope.line_to_char(line);
        let line_len = self.rope.line(line).len_chars();
        let char_index = line_start + (position.character as usize).min(line_len);
        self.rope.char_to_byte(char_index)
    }

    pub fn position_at(&self, offset: usize) -> Position {
        let char_index = self.rope.byte_to_char(offset.min(self.rope.len_bytes()));
        let line = self.rope.char_to_line(char_index);
        Position {
            line: line as u32,
            character: (char_index - self.rope.line_to_char(line)) as u32,
        }
    }

    pub fn lsp_range(&self, span: Range<usize>) -> tower_lsp::lsp_types::Range {
        tower_lsp::lsp_types::Range {
            start: self.position_at(span.start),
            end: self.position_at(span.end),
        }
    }

    /// The deepest syntax node under the cursor.
    pub fn node_at(&self, position: Position) -> NodeId {
        self.tree.node_at(self.offset_at(position))
    }
}

/// Documents currently open in the editor, keyed by URI.
#[derive(Debug, Default)]
pub struct DocumentStore {
    documents: DashMap<Url, Arc<Document>>,
}

impl DocumentStore {
    pub fn new() -> DocumentStore {
        DocumentStore::default()
    }

    pub fn open(&self, uri: Url, text: &str, version: i32) -> Arc<Document> {
        debug!("open {uri} (version {version})");
        let document = Arc::new(Document::new(uri.clone(), text, version));
        self.documents.insert(uri, document.clone());
        document
    }

    /// Replace the text of a document and re-derive its tree. Also opens documents
    /// the store has not seen.
    pub fn on_document_change(&self, uri: Url, text: &str, version: i32) -> Arc<Document> {
        let document = Arc::new(Document::new(uri.clone(), text, version));
        self.documents.insert(uri, document.clone());
        document
    }

    pub fn close(&self, uri: &Url) -> Option<Arc<Document>> {
        self.documents.remove(uri).map(|(_, document)| document)
    }

    pub fn get(&self, uri: &Url) -> Option<Arc<Document>> {
        self.documents.get(uri).map(|entry| entry.value().clone())
    }

    pub fn documents(&self) -> Vec<Arc<Document>> {
        self.documents
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uri() -> Url {
        Url::parse("file:///chart/templates/a.yaml").unwrap()
    }

    #[test]
    fn test_offsets_and_positions_round_trip() {
        let document = Document::new(uri(), "a: ü\nb: {{ .Values.b }}\n", 1);

        let position = Position {
            line: 1,
            character: 6,
        };
        let offset = document.offset_at(position);
        assert_eq!(&document.text()[offset..offset + 7], ".Values");
        assert_eq!(document.position_at(offset), position);

        let past_end = document.offset_at(Position {
            line: 40,
            character: 0,
        });
        assert_eq!(past_end, document.text().len());
    }

    #[test]
    fn test_change_replaces_tree_and_version() {
        let store = DocumentStore::new();
        store.open(uri(), "a: {{ $x := 1 }}", 1);

        let changed = store.on_document_change(uri(), "a: {{ $y := 1 }}{{ $y }}", 2);

        let current = store.get(&uri()).unwrap();
        assert!(Arc::ptr_eq(&changed, &current));
        assert_eq!(current.version, 2);
        assert!(current.text().contains("$y"));
        assert_eq!(current.tree.source(), current.text());
    }

    #[test]
    fn test_close_removes_document() {
        let store = DocumentStore::new();
        store.open(uri(), "a: 1", 1);

        assert!(store.close(&uri()).is_some());
        assert!(store.get(&uri()).is_none());
        assert!(store.is_empty());
    }
}
