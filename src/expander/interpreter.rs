//! The miniature interpreter macro bodies run under (`evaluateForMacro`).
//!
//! A tree-walking interpreter: a handful of special forms recognized by
//! head symbol, host-function application for anything
//! else bound in the environment, and literal data for everything that
//! falls through untouched. Unknown heads are deliberately *not* errors —
//! they are returned verbatim, since a macro body frequently builds pieces
//! of syntax that only make sense to the lowerer downstream, not to this
//! interpreter.

use crate::env::{Binding, Frame};
use crate::error::HqlError;
use crate::sexp::{nil, SExp, Sx};

use super::quasiquote::evaluate_quasiquote;

pub fn evaluate_for_macro(expr: &Sx, frame: &Frame) -> Result<Sx, HqlError> {
    match expr.value.as_ref() {
        SExp::Literal(_) => Ok(expr.clone()),
        SExp::Symbol(name) => match frame.lookup(name) {
            Ok(Binding::Value(v)) => Ok(v),
            Ok(Binding::Host(_)) => Ok(expr.clone()),
            Err(_) => Ok(expr.clone()),
        },
        SExp::List(items) => {
            if items.is_empty() {
                return Ok(expr.clone());
            }
            let head = items[0].value.as_symbol();
            match head {
                Some("quote") => Ok(items.get(1).cloned().unwrap_or_else(|| nil(expr.span))),
                Some("quasiquote") => {
                    let target = items.get(1).cloned().unwrap_or_else(|| nil(expr.span));
                    evaluate_quasiquote(&target, frame, 1)
                }
                Some("unquote") => {
                    let target = items.get(1).cloned().unwrap_or_else(|| nil(expr.span));
                    evaluate_for_macro(&target, frame)
                }
                Some("if") => eval_if(items, frame),
                Some("cond") => eval_cond(items, frame),
                Some("let") => eval_let(items, frame),
                Some("do") => eval_do(&items[1..], frame),
                Some("def") | Some("defn") | Some("fn") => Ok(nil(expr.span)),
                Some(name) if frame.has(name) => eval_call(name, items, frame, expr.span),
                _ => Ok(expr.clone()),
            }
        }
    }
}

fn eval_if(items: &[Sx], frame: &Frame) -> Result<Sx, HqlError> {
    let span = items[0].span;
    let cond = items.get(1).cloned().unwrap_or_else(|| nil(span));
    let cond_val = evaluate_for_macro(&cond, frame)?;
    if !cond_val.value.is_falsy() {
        let then = items.get(2).cloned().unwrap_or_else(|| nil(span));
        evaluate_for_macro(&then, frame)
    } else {
        match items.get(3) {
            Some(else_branch) => evaluate_for_macro(else_branch, frame),
            None => Ok(nil(span)),
        }
    }
}

fn eval_cond(items: &[Sx], frame: &Frame) -> Result<Sx, HqlError> {
    let span = items[0].span;
    for clause in &items[1..] {
        let Some(pair) = clause.value.as_list() else {
            continue;
        };
        let Some(test) = pair.first() else { continue };
        let is_else = test.value.as_symbol() == Some("else");
        let matched = is_else || !evaluate_for_macro(test, frame)?.value.is_falsy();
        if matched {
            let body = pair.get(1).cloned().unwrap_or_else(|| nil(span));
            return evaluate_for_macro(&body, frame);
        }
    }
    Ok(nil(span))
}

fn eval_let(items: &[Sx], frame: &Frame) -> Result<Sx, HqlError> {
    let span = items[0].span;
    let bindings = items
        .get(1)
        .and_then(|b| b.value.as_list())
        .unwrap_or_default();
    // `[tmp ~a]` reads as `(vector tmp (unquote a))`; drop the read-time
    // `vector` head before pairing up bindings.
    let bindings = match bindings.first().and_then(|n| n.value.as_symbol()) {
        Some("vector") | Some("empty-array") => &bindings[1..],
        _ => bindings,
    };
    let child = frame.extend();
    let mut pairs = bindings.chunks_exact(2);
    for pair in &mut pairs {
        let Some(name) = pair[0].value.as_symbol() else {
            continue;
        };
        let value = evaluate_for_macro(&pair[1], frame)?;
        child.define(name, value);
    }
    eval_do(&items[2..], &child)
}

fn eval_do(body: &[Sx], frame: &Frame) -> Result<Sx, HqlError> {
    let mut result = None;
    for expr in body {
        result = Some(evaluate_for_macro(expr, frame)?);
    }
    Ok(result.unwrap_or_else(|| nil(crate::span::Span::synthetic())))
}

fn eval_call(name: &str, items: &[Sx], frame: &Frame, span: crate::span::Span) -> Result<Sx, HqlError> {
    match frame.lookup(name)? {
        Binding::Host(f) => {
            let mut args = Vec::with_capacity(items.len() - 1);
            for arg in &items[1..] {
                args.push(evaluate_for_macro(arg, frame)?);
            }
            f(&args)
        }
        Binding::Value(_) => Ok(crate::sexp::list(items.to_vec(), span)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader;
    use crate::sexp::pretty;

    fn eval_str(src: &str, frame: &Frame) -> Sx {
        let parsed = reader::read("test", src).unwrap();
        evaluate_for_macro(&parsed[0], frame).unwrap()
    }

    #[test]
    fn literals_and_symbols_self_evaluate_or_resolve() {
        let frame = Frame::root();
        frame.define("x", crate::sexp::number(42.0, crate::span::Span::synthetic()));
        assert_eq!(pretty(&eval_str("42", &frame)), "42");
        assert_eq!(pretty(&eval_str("x", &frame)), "42");
    }

    #[test]
    fn if_picks_branch_by_truthiness() {
        let frame = Frame::root();
        assert_eq!(pretty(&eval_str("(if true 1 2)", &frame)), "1");
        assert_eq!(pretty(&eval_str("(if false 1 2)", &frame)), "2");
        assert_eq!(pretty(&eval_str("(if nil 1)", &frame)), "nil");
    }

    #[test]
    fn cond_falls_through_to_else() {
        let frame = Frame::root();
        assert_eq!(pretty(&eval_str("(cond (false 1) (else 2))", &frame)), "2");
    }

    #[test]
    fn let_binds_in_parallel_in_a_child_frame() {
        let frame = Frame::root();
        assert_eq!(pretty(&eval_str("(let (a 1 b 2) (if a b a))", &frame)), "2");
    }

    #[test]
    fn unbound_head_is_returned_unevaluated() {
        let frame = Frame::root();
        assert_eq!(pretty(&eval_str("(widget 1 2)", &frame)), "(widget 1 2)");
    }

    #[test]
    fn host_function_is_applied_with_evaluated_args() {
        let frame = Frame::root();
        frame.define_host("inc", |args| match args[0].value.as_ref() {
            SExp::Literal(crate::sexp::Literal::Number(n)) => {
                Ok(crate::sexp::number(n + 1.0, crate::span::Span::synthetic()))
            }
            _ => unreachable!(),
        });
        assert_eq!(pretty(&eval_str("(inc 41)", &frame)), "42");
    }
}
