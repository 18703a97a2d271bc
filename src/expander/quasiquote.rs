//! Quasiquote evaluation.
//!
//! List contents are copied verbatim except `(unquote x)`, which evaluates
//! `x` and splices its single value in place, and `(unquote-splicing x)`,
//! which evaluates `x` (must yield a list) and splices its elements in
//! place. Nested quasiquotes increase the depth counter; `unquote` only
//! takes effect at depth 1.

use crate::env::Frame;
use crate::error::{ErrorKind, HqlError, MacroErrorKind, SourceInfo};
use crate::sexp::{form, SExp, Sx};

use super::interpreter::evaluate_for_macro;

const PHASE: &str = "expander";

pub fn evaluate_quasiquote(node: &Sx, frame: &Frame, depth: usize) -> Result<Sx, HqlError> {
    if node.value.head_symbol() == Some("unquote-splicing") && depth == 1 {
        return Err(HqlError::new(
            ErrorKind::Macro(MacroErrorKind::MacroSyntax {
                detail: "unquote-splicing is only valid inside a list".into(),
            }),
            SourceInfo::unspanned(PHASE),
        ));
    }
    walk(node, frame, depth)
}

fn walk(node: &Sx, frame: &Frame, depth: usize) -> Result<Sx, HqlError> {
    let span = node.span;
    match node.value.as_ref() {
        SExp::List(items) if node.value.head_symbol() == Some("unquote") => {
            let target = items.get(1).cloned().unwrap_or_else(|| crate::sexp::nil(span));
            if depth == 1 {
                evaluate_for_macro(&target, frame)
            } else {
                let inner = walk(&target, frame, depth - 1)?;
                Ok(form("unquote", vec![inner], span))
            }
        }
        SExp::List(items) if node.value.head_symbol() == Some("quasiquote") => {
            let target = items.get(1).cloned().unwrap_or_else(|| crate::sexp::nil(span));
            let inner = walk(&target, frame, depth + 1)?;
            Ok(form("quasiquote", vec![inner], span))
        }
        SExp::List(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                if item.value.head_symbol() == Some("unquote-splicing") {
                    let inner_items = item.value.as_list().expect("checked head_symbol");
                    let target = inner_items
                        .get(1)
                        .cloned()
                        .unwrap_or_else(|| crate::sexp::nil(span));
                    if depth == 1 {
                        let value = evaluate_for_macro(&target, frame)?;
                        let spliced = value.value.as_list().ok_or_else(|| {
                            HqlError::new(
                                ErrorKind::Macro(MacroErrorKind::MacroSyntax {
                                    detail: "unquote-splicing target did not evaluate to a list"
                                        .into(),
                                }),
                                SourceInfo::unspanned(PHASE),
                            )
                        })?;
                        out.extend(spliced.iter().cloned());
                    } else {
                        let inner = walk(&target, frame, depth - 1)?;
                        out.push(form("unquote-splicing", vec![inner], span));
                    }
                } else {
                    out.push(walk(item, frame, depth)?);
                }
            }
            Ok(crate::sexp::list(out, span))
        }
        _ => Ok(node.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader;

    #[test]
    fn unquote_and_splicing_substitute_values_in_place() {
        let frame = Frame::root();
        frame.define_host("+", |args| {
            let sum: f64 = args
                .iter()
                .map(|a| match a.value.as_ref() {
                    SExp::Literal(crate::sexp::Literal::Number(n)) => *n,
                    _ => 0.0,
                })
                .sum();
            Ok(crate::sexp::number(sum, crate::span::Span::synthetic()))
        });
        let template = reader::read("test", "`(a ~(+ 1 2) ~@(list 3 4))").unwrap().remove(0);
        let inner = template.value.as_list().unwrap()[1].clone();
        frame.define_host("list", |args| {
            Ok(crate::sexp::list(args.to_vec(), crate::span::Span::synthetic()))
        });
        let result = evaluate_quasiquote(&inner, &frame, 1).unwrap();
        assert_eq!(crate::sexp::pretty(&result), "(a 3 3 4)");
    }
}
