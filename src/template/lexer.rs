//! Two-level lexer: [`scan_actions`] splits the source into literal text and
//! `{{ ... }}` actions, [`tokenize`] splits the inside of one action.

use std::ops::Range;

/// One `{{ ... }}` occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionSpan {
    /// Delimiters included.
    pub span: Range<usize>,
    /// Delimiters and trim markers excluded.
    pub inner: Range<usize>,
    pub comment: bool,
    /// False when the input ended, or a new `{{` started, before the closing `}}`.
    pub terminated: bool,
}

pub fn scan_actions(text: &str) -> Vec<ActionSpan> {
    let mut actions = Vec::new();
    let mut pos = 0;

    while let Some(found) = text[pos..].find("{{") {
        let start = pos + found;
        let Some(action) = action_at(text, start) else {
            break;
        };
        pos = action.span.end.max(start + 2);
        actions.push(action);
    }

    actions
}

/// The action opening at `start`, if `text[start..]` begins with `{{`.
pub fn action_at(text: &str, start: usize) -> Option<ActionSpan> {
    if !text[start..].starts_with("{{") {
        return None;
    }
    let bytes = text.as_bytes();
    let mut inner_start = start + 2;
    if bytes.get(inner_start) == Some(&b'-')
        && bytes
            .get(inner_start + 1)
            .is_some_and(|b| b.is_ascii_whitespace())
    {
        inner_start += 1;
    }

    let after_trim = skip_whitespace(bytes, inner_start);
    if text[after_trim..].starts_with("/*") {
        Some(scan_comment(text, start, inner_start, after_trim))
    } else {
        Some(scan_pipeline(text, start, inner_start))
    }
}

fn skip_whitespace(bytes: &[u8], mut pos: usize) -> usize {
    while bytes.get(pos).is_some_and(|b| b.is_ascii_whitespace()) {
        pos += 1;
    }
    pos
}

fn closing_at(text: &str, pos: usize) -> Option<(usize, usize)> {
    let rest = &text[pos..];
    if rest.starts_with("}}") {
        let trimmed = pos > 0
            && text.as_bytes()[pos - 1] == b'-'
            && pos >= 2
            && text.as_bytes()[pos - 2].is_ascii_whitespace();
        let inner_end = if trimmed { pos - 1 } else { pos };
        return Some((inner_end, pos + 2));
    }
    None
}

fn scan_comment(text: &str, start: usize, inner_start: usize, body: usize) -> ActionSpan {
    match text[body + 2..].find("*/") {
        Some(rel) => {
            let comment_end = body + 2 + rel + 2;
            let bytes = text.as_bytes();
            let mut close = skip_whitespace(bytes, comment_end);
            if bytes.get(close) == Some(&b'-') {
                close = skip_whitespace(bytes, close + 1);
            }
            let (span_end, terminated) = match text[close..].starts_with("}}") {
                true => (close + 2, true),
                false => (comment_end, false),
            };
            ActionSpan {
                span: start..span_end,
                inner: inner_start..comment_end,
                comment: true,
                terminated,
            }
        }
        None => ActionSpan {
            span: start..text.len(),
            inner: inner_start..text.len(),
            comment: true,
            terminated: false,
        },
    }
}

fn scan_pipeline(text: &str, start: usize, inner_start: usize) -> ActionSpan {
    let bytes = text.as_bytes();
    let mut pos = inner_start;

    while pos < bytes.len() {
        match bytes[pos] {
            b'}' => {
                if let Some((inner_end, span_end)) = closing_at(text, pos) {
                    return ActionSpan {
                        span: start..span_end,
                        inner: inner_start..inner_end,
                        comment: false,
                        terminated: true,
                    };
                }
                pos += 1;
            }
            b'{' if text[pos..].starts_with("{{") => {
                return ActionSpan {
                    span: start..pos,
                    inner: inner_start..pos,
                    comment: false,
                    terminated: false,
                };
            }
            b'"' => pos = skip_quoted(bytes, pos, b'"'),
            b'\'' => pos = skip_quoted(bytes, pos, b'\''),
            b'`' => {
                pos = match text[pos + 1..].find('`') {
                    Some(rel) => pos + 1 + rel + 1,
                    None => bytes.len(),
                }
            }
            _ => pos += 1,
        }
    }

    ActionSpan {
        span: start..text.len(),
        inner: inner_start..text.len(),
        comment: false,
        terminated: false,
    }
}

/// Interpreted strings and char literals cannot span lines; an unterminated one
/// stops at the newline so the rest of the file still lexes.
fn skip_quoted(bytes: &[u8], start: usize, quote: u8) -> usize {
    let mut pos = start + 1;
    while pos < bytes.len() {
        match bytes[pos] {
            b'\\' => pos += 2,
            b'\n' => return pos,
            b if b == quote => return pos + 1,
            _ => pos += 1,
        }
    }
    bytes.len()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// A lone `.`
    Dot,
    /// `.Name`
    Field,
    /// `$` or `$name`
    Variable,
    Identifier,
    Keyword,
    String,
    RawString,
    Char,
    Number,
    Bool,
    Nil,
    Declare,
    Assign,
    Pipe,
    LeftParen,
    RightParen,
    Comma,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Range<usize>,
}

const KEYWORDS: &[&str] = &[
    "if", "else", "end", "range", "with", "define", "template", "block", "break", "continue",
];

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

fn is_ident_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Tokenize `text[range]`. Offsets in the returned tokens are absolute.
pub fn tokenize(text: &str, range: Range<usize>) -> Vec<Token> {
    let bytes = text.as_bytes();
    let end = range.end.min(bytes.len());
    let mut pos = range.start;
    let mut tokens = Vec::new();

    while pos < end {
        let b = bytes[pos];
        let start = pos;
        let kind = match b {
            _ if b.is_ascii_whitespace() => {
                pos += 1;
                continue;
            }
            b'.' => {
                pos += 1;
                if pos < end && is_ident_start(bytes[pos]) {
                    while pos < end && is_ident_char(bytes[pos]) {
                        pos += 1;
                    }
                    TokenKind::Field
                } else {
                    TokenKind::Dot
                }
            }
            b'$' => {
                pos += 1;
                while pos < end && is_ident_char(bytes[pos]) {
                    pos += 1;
                }
                TokenKind::Variable
            }
            b'"' => {
                pos = skip_quoted(bytes, pos, b'"').min(end);
                TokenKind::String
            }
            b'\'' => {
                pos = skip_quoted(bytes, pos, b'\'').min(end);
                TokenKind::Char
            }
            b'`' => {
                pos = match text[pos + 1..end].find('`') {
                    Some(rel) => pos + 1 + rel + 1,
                    None => end,
                };
                TokenKind::RawString
            }
            b':' if bytes.get(pos + 1) == Some(&b'=') => {
                pos += 2;
                TokenKind::Declare
            }
            b'=' => {
                pos += 1;
                TokenKind::Assign
            }
            b'|' => {
                pos += 1;
                TokenKind::Pipe
            }
            b'(' => {
                pos += 1;
                TokenKind::LeftParen
            }
            b')' => {
                pos += 1;
                TokenKind::RightParen
            }
            b',' => {
                pos += 1;
                TokenKind::Comma
            }
            b'-' | b'+' if bytes.get(pos + 1).is_some_and(|n| n.is_ascii_digit()) => {
                pos += 1;
                pos = scan_number(bytes, pos, end);
                TokenKind::Number
            }
            _ if b.is_ascii_digit() => {
                pos = scan_number(bytes, pos, end);
                TokenKind::Number
            }
            _ if is_ident_start(b) => {
                while pos < end && is_ident_char(bytes[pos]) {
                    pos += 1;
                }
                match &text[start..pos] {
                    "true" | "false" => TokenKind::Bool,
                    "nil" => TokenKind::Nil,
                    word if KEYWORDS.contains(&word) => TokenKind::Keyword,
                    _ => TokenKind::Identifier,
                }
            }
            _ => {
                pos += text[pos..].chars().next().map(char::len_utf8).unwrap_or(1);
                TokenKind::Unknown
            }
        };
        tokens.push(Token {
            kind,
            span: start..pos,
        });
    }

    tokens
}

fn scan_number(bytes: &[u8], mut pos: usize, end: usize) -> usize {
    while pos < end {
        let b = bytes[pos];
        let exponent_sign =
            (b == b'-' || b == b'+') && matches!(bytes[pos - 1], b'e' | b'E' | b'p' | b'P');
        if b.is_ascii_alphanumeric() || b == b'_' || b == b'.' || exponent_sign {
            pos += 1;
        } else {
            break;
        }
    }
    pos
}
