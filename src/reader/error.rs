//! Construction helpers bridging `pest`'s span/error types to `HqlError`.

use pest::error::{Error as PestError, InputLocation};

use crate::error::{ErrorKind, HqlError, ParseErrorKind, SourceInfo};
use crate::span::{SourcePosition, Span};

use super::Rule;

const PHASE: &str = "reader";

pub fn parse_error(name: &str, content: &str, kind: ParseErrorKind, span: Span) -> HqlError {
    HqlError::new(
        ErrorKind::Parse(kind),
        SourceInfo::new(name, content, span, PHASE),
    )
}

/// Converts a raw `pest::error::Error` into a `HqlError`. Pest's own
/// `positives` set can't tell an unclosed `list` from an unclosed `vector`
/// apart — both end up expecting the same `expr` alternation at the
/// failure point, since `list`/`vector`/`map`/`set` all retry a fresh `expr`
/// before giving up — so the delimiter kind is classified here directly by
/// walking the text up to the failure and tracking which brackets are still
/// open, the same nesting a balanced reader would track.
pub fn from_pest_error(name: &str, content: &str, err: PestError<Rule>) -> HqlError {
    let (start, end) = match err.location {
        InputLocation::Pos(pos) => (pos, pos),
        InputLocation::Span((a, b)) => (a, b),
    };
    let span = Span::new(offset_position(content, start), offset_position(content, end));
    let kind = classify(content, start);
    parse_error(name, content, kind, span)
}

#[derive(Clone, Copy)]
enum Opener {
    List,
    Vector,
    Set,
    Map,
}

fn classify(content: &str, start: usize) -> ParseErrorKind {
    match scan_delimiters(content, start) {
        Some(Some(opener)) => match opener {
            Opener::List => ParseErrorKind::UnclosedList,
            Opener::Vector => ParseErrorKind::UnclosedVector,
            Opener::Set => ParseErrorKind::UnclosedSet,
            Opener::Map => ParseErrorKind::UnclosedMap,
        },
        Some(None) => ParseErrorKind::UnexpectedClose,
        None => fallback_kind(content, start),
    }
}

/// Scans `content[..=start]` (the character pest's error points at, plus
/// everything before it), skipping string contents and comments exactly as
/// the grammar's `string_inner`/`COMMENT` rules do, tracking a stack of open
/// delimiters. `Some(Some(opener))` means the stack is non-empty (the
/// innermost opener is still unclosed); `Some(None)` means a closing
/// delimiter was seen with nothing open to match it; `None` means the
/// brackets are perfectly balanced, so the failure has nothing to do with
/// delimiter nesting.
fn scan_delimiters(content: &str, start: usize) -> Option<Option<Opener>> {
    let bytes = content.as_bytes();
    // Scan one byte past `start`: a stray closing delimiter is the
    // character pest's error points *at*, not one before it, so it has to
    // be included in the same pass that builds the stack state leading up
    // to it.
    let end = (start + 1).min(bytes.len());
    let mut stack: Vec<Opener> = Vec::new();
    let mut i = 0;
    while i < end {
        match bytes[i] {
            b'"' => {
                i += 1;
                while i < end && bytes[i] != b'"' {
                    i += if bytes[i] == b'\\' { 2 } else { 1 };
                }
                i += 1;
            }
            b';' => while_to_eol(bytes, &mut i, end),
            b'/' if bytes.get(i + 1) == Some(&b'/') => while_to_eol(bytes, &mut i, end),
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i += 2;
                while i + 1 < end && !(bytes[i] == b'*' && bytes[i + 1] == b'/') {
                    i += 1;
                }
                i = (i + 2).min(end);
            }
            b'#' if bytes.get(i + 1) == Some(&b'[') => {
                stack.push(Opener::Set);
                i += 2;
            }
            b'(' => {
                stack.push(Opener::List);
                i += 1;
            }
            b'[' => {
                stack.push(Opener::Vector);
                i += 1;
            }
            b'{' => {
                stack.push(Opener::Map);
                i += 1;
            }
            b')' | b']' | b'}' => {
                if stack.pop().is_none() {
                    return Some(None);
                }
                i += 1;
            }
            _ => i += 1,
        }
    }
    stack.last().copied().map(Some)
}

fn while_to_eol(bytes: &[u8], i: &mut usize, end: usize) {
    while *i < end && bytes[*i] != b'\n' {
        *i += 1;
    }
}

fn fallback_kind(content: &str, start: usize) -> ParseErrorKind {
    if start >= content.len() {
        ParseErrorKind::UnexpectedEof
    } else {
        ParseErrorKind::UnexpectedChar {
            found: content[start..].chars().next().unwrap_or('\0'),
        }
    }
}

/// Computes 1-based line/column for a byte offset by scanning from the
/// start of `content`. The reader only calls this on error paths, so
/// linear rescanning is an acceptable simplicity/speed tradeoff.
pub fn offset_position(content: &str, offset: usize) -> SourcePosition {
    let mut line = 1;
    let mut column = 1;
    for ch in content[..offset.min(content.len())].chars() {
        if ch == '\n' {
            line += 1;
            column = 1;
        } else {
            column += 1;
        }
    }
    SourcePosition { line, column, offset }
}
