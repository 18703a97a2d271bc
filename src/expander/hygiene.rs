//! Hygiene: per-parameter gensym renaming and macro-introduced-temporary
//! renaming, so that expanding the same macro twice at different call
//! sites never lets one expansion's internal names collide with the
//! other's, or with the names already live at the splice site.
//!
//! Two independent mechanisms, both grounded in the same gensym shape:
//! - `bind_params` gives every macro parameter a fresh alias and binds
//!   *both* the original name and the alias to the call argument, so a
//!   macro body is free to reference the parameter under either name.
//! - `rename_let_temporaries` rewrites `let`-bound names introduced by the
//!   macro's own body (not its parameters) to fresh names throughout their
//!   lexical scope, so a macro's internal scratch variable never shadows
//!   one visible at the call site.

use std::collections::HashMap;

use crate::env::{Frame, MacroFn};
use crate::error::{ErrorKind, HqlError, MacroErrorKind, SourceInfo};
use crate::gensym;
use crate::sexp::{form, list, sym, SExp, Sx};

const PHASE: &str = "expander";

/// Binds `macro_fn`'s parameters (and `&rest`, if any) against the call's
/// unevaluated argument forms in a fresh child of `macro_fn.defining_env`.
pub fn bind_params(macro_fn: &MacroFn, call_args: &[Sx], call_span: crate::span::Span) -> Result<Frame, HqlError> {
    let min = macro_fn.params.len();
    if macro_fn.rest.is_none() && call_args.len() != min {
        return Err(arity_error(&macro_fn.name, min, call_args.len()));
    }
    if macro_fn.rest.is_some() && call_args.len() < min {
        return Err(arity_error(&macro_fn.name, min, call_args.len()));
    }

    let child = macro_fn.defining_env.extend();
    for (param, arg) in macro_fn.params.iter().zip(call_args.iter()) {
        bind_with_alias(&child, param, arg.clone());
    }
    if let Some(rest_name) = &macro_fn.rest {
        let rest_args = call_args[min..].to_vec();
        let rest_value = list(rest_args, call_span);
        bind_with_alias(&child, rest_name, rest_value);
    }
    Ok(child)
}

fn bind_with_alias(frame: &Frame, name: &str, value: Sx) {
    let alias = gensym::fresh_name(name);
    frame.define(name, value.clone());
    frame.define(alias, value);
}

fn arity_error(name: &str, expected_min: usize, got: usize) -> HqlError {
    HqlError::new(
        ErrorKind::Macro(MacroErrorKind::BadParameterList {
            detail: format!("macro '{name}' expects at least {expected_min} argument(s), got {got}"),
        }),
        SourceInfo::unspanned(PHASE),
    )
}

/// Rewrites `let`-introduced names in `body` to fresh gensym'd names,
/// threading the substitution map through nested scopes. Leaves quoted
/// subtrees untouched, since those are data, not binding forms.
pub fn rename_let_temporaries(body: &Sx) -> Sx {
    walk(body, &HashMap::new())
}

fn walk(node: &Sx, rename: &HashMap<String, String>) -> Sx {
    match node.value.as_ref() {
        SExp::Symbol(name) => match rename.get(name) {
            Some(fresh) => sym(fresh.clone(), node.span),
            None => node.clone(),
        },
        SExp::Literal(_) => node.clone(),
        SExp::List(_) if node.value.head_symbol() == Some("quote") => node.clone(),
        SExp::List(items) if node.value.head_symbol() == Some("let") => {
            let span = node.span;
            let bindings = items.get(1).and_then(|b| b.value.as_list()).unwrap_or_default();
            // `[tmp ~a]` reads as `(vector tmp (unquote a))`; drop the
            // read-time `vector` head before pairing up bindings.
            let bindings = match bindings.first().and_then(|n| n.value.as_symbol()) {
                Some("vector") | Some("empty-array") => &bindings[1..],
                _ => bindings,
            };
            let mut inner_rename = rename.clone();
            let mut new_bindings = Vec::with_capacity(bindings.len());
            let mut pairs = bindings.chunks_exact(2);
            for pair in &mut pairs {
                let value = walk(&pair[1], rename);
                let fresh = match pair[0].value.as_symbol() {
                    Some(original) => {
                        let fresh = gensym::fresh_name(original);
                        inner_rename.insert(original.to_string(), fresh.clone());
                        fresh
                    }
                    None => continue,
                };
                new_bindings.push(sym(fresh, pair[0].span));
                new_bindings.push(value);
            }
            let body_forms: Vec<Sx> = items[2..].iter().map(|e| walk(e, &inner_rename)).collect();
            let mut out = vec![list(new_bindings, span)];
            out.extend(body_forms);
            form("let", out, span)
        }
        SExp::List(items) => {
            let rewritten: Vec<Sx> = items.iter().map(|i| walk(i, rename)).collect();
            list(rewritten, node.span)
        }
    }
}
