//! The Reader (R): `read(source) -> Vec<Sx>`.
//!
//! Split between a `pest` grammar (`grammar.pest`) and a recursive-descent
//! build step here that turns `pest::iterators::Pairs` into `Sx` nodes.

pub mod error;

use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser;

use crate::error::{ErrorKind, HqlError, ParseErrorKind};
use crate::gensym;
use crate::sexp::{self, boolean, form, list, nil, number, string, sym, Sx};
use crate::span::Span;

use self::error::{from_pest_error, offset_position, parse_error};

#[derive(Parser)]
#[grammar = "reader/grammar.pest"]
struct HqlParser;

/// Reads `source` (as authored in file `name`, used only for diagnostics)
/// into a flat sequence of top-level forms. Total over well-formed input;
/// fails with a `HqlError` carrying a `ParseErrorKind` otherwise.
pub fn read(name: &str, source: &str) -> Result<Vec<Sx>, HqlError> {
    if source.trim().is_empty() {
        return Ok(Vec::new());
    }
    let mut pairs = HqlParser::parse(Rule::program, source)
        .map_err(|e| from_pest_error(name, source, e))?;
    let program = pairs.next().expect("grammar guarantees `program`");

    program
        .into_inner()
        .filter(|p| p.as_rule() != Rule::EOI)
        .map(|p| build(p, name, source))
        .collect()
}

fn span_of(pair: &Pair<Rule>, source: &str) -> Span {
    let s = pair.as_span();
    Span::new(offset_position(source, s.start()), offset_position(source, s.end()))
}

fn build(pair: Pair<Rule>, name: &str, source: &str) -> Result<Sx, HqlError> {
    let span = span_of(&pair, source);
    match pair.as_rule() {
        Rule::expr => build(inner_one(pair, name, source)?, name, source),
        Rule::atom => build(inner_one(pair, name, source)?, name, source),

        Rule::quote => build_wrapped("quote", pair, name, source, span),
        Rule::quasiquote => build_wrapped("quasiquote", pair, name, source, span),
        Rule::unquote => build_wrapped("unquote", pair, name, source, span),
        Rule::unquote_splicing => build_wrapped("unquote-splicing", pair, name, source, span),

        Rule::list => {
            let items = pair
                .into_inner()
                .map(|p| build(p, name, source))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(list(items, span))
        }

        Rule::vector => {
            let items = pair
                .into_inner()
                .map(|p| build(p, name, source))
                .collect::<Result<Vec<_>, _>>()?;
            if items.is_empty() {
                Ok(form("empty-array", Vec::new(), span))
            } else {
                Ok(form("vector", items, span))
            }
        }

        Rule::set => {
            let items = pair
                .into_inner()
                .map(|p| build(p, name, source))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(form("hash-set", items, span))
        }

        Rule::map => {
            let mut args = Vec::new();
            for entry in pair.into_inner() {
                let entry_span = span_of(&entry, source);
                let mut parts = entry.into_inner();
                let key = parts.next().ok_or_else(|| {
                    parse_error(name, source, ParseErrorKind::ExpectedColonInMap, entry_span)
                })?;
                let value = parts.next().ok_or_else(|| {
                    parse_error(name, source, ParseErrorKind::ExpectedColonInMap, entry_span)
                })?;
                args.push(build(key, name, source)?);
                args.push(build(value, name, source)?);
            }
            if args.is_empty() {
                Ok(form("empty-map", Vec::new(), span))
            } else {
                Ok(form("hash-map", args, span))
            }
        }

        Rule::number => {
            let text = pair.as_str();
            let value: f64 = text.parse().map_err(|_| {
                parse_error(
                    name,
                    source,
                    ParseErrorKind::UnexpectedChar {
                        found: text.chars().next().unwrap_or('\0'),
                    },
                    span,
                )
            })?;
            Ok(number(value, span))
        }

        Rule::boolean => Ok(boolean(pair.as_str() == "true", span)),
        Rule::nil => Ok(nil(span)),

        Rule::string => {
            let raw = pair.as_str();
            let inner = &raw[1..raw.len().saturating_sub(1)];
            Ok(string(unescape(inner), span))
        }

        Rule::symbol => build_symbol(pair.as_str(), name, source, span),

        other => Err(parse_error(
            name,
            source,
            ParseErrorKind::UnexpectedChar { found: '\0' },
            span,
        )
        .with_help(format!("internal: unhandled grammar rule {other:?}"))),
    }
}

fn inner_one<'i>(pair: Pair<'i, Rule>, name: &str, source: &str) -> Result<Pair<'i, Rule>, HqlError> {
    let span = span_of(&pair, source);
    pair.into_inner()
        .next()
        .ok_or_else(|| parse_error(name, source, ParseErrorKind::UnexpectedEof, span))
}

fn build_wrapped(head: &str, pair: Pair<Rule>, name: &str, source: &str, span: Span) -> Result<Sx, HqlError> {
    let inner = inner_one(pair, name, source)?;
    let target = build(inner, name, source)?;
    Ok(form(head, vec![target], span))
}

/// Implements the three symbol-related literal-form rules:
/// `.method` stays a plain symbol, `obj.prop` stays a plain dotted
/// symbol, `obj.dash-prop` rewrites to `(get obj "dash-prop")` because
/// dashes aren't legal in the target identifier syntax.
fn build_symbol(text: &str, name: &str, source: &str, span: Span) -> Result<Sx, HqlError> {
    if gensym::looks_like_gensym(text) {
        return Err(parse_error(
            name,
            source,
            ParseErrorKind::ReservedGensymName { name: text.to_string() },
            span,
        ));
    }

    if !text.starts_with('.') {
        if let Some(dot_at) = text.find('.') {
            let head = &text[..dot_at];
            let rest = &text[dot_at + 1..];
            if rest.is_empty() {
                return Err(parse_error(
                    name,
                    source,
                    ParseErrorKind::ExpectedPropertyAfterDot,
                    span,
                ));
            }
            if !head.is_empty() && rest.contains('-') {
                return Ok(form(
                    "get",
                    vec![sym(head, span), string(rest, span)],
                    span,
                ));
            }
        }
    }

    Ok(sym(text, span))
}

fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('r') => out.push('\r'),
                Some('\\') => out.push('\\'),
                Some('"') => out.push('"'),
                Some(other) => {
                    out.push('\\');
                    out.push(other);
                }
                None => out.push('\\'),
            }
        } else {
            out.push(ch);
        }
    }
    out
}

/// Renders `nodes` back to source-ish text via the canonical pretty
/// printer. Used to check the reader round-trip property:
/// `read(serialize(read(s)))` must equal `read(s)` up to whitespace.
pub fn serialize(nodes: &[Sx]) -> String {
    nodes.iter().map(sexp::pretty).collect::<Vec<_>>().join(" ")
}
