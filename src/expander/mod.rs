//! Macro expansion: whole-program fixed-point expansion over macro calls,
//! hygienic parameter binding, and quasiquote evaluation.
//!
//! Each iteration expands every macro call reachable from the program's
//! top-level forms; macro definitions themselves are stripped once the
//! expansion has stabilized, so the lowerer only ever sees ordinary forms.

pub mod hygiene;
pub mod interpreter;
pub mod quasiquote;

use std::cell::RefCell;
use std::collections::HashMap;

use sha2::{Digest, Sha256};

use crate::config::CompilerConfig;
use crate::env::{Frame, MacroFn};
use crate::error::{ErrorKind, HqlError, MacroErrorKind, SourceInfo};
use crate::sexp::{pretty, SExp, Sx};

const PHASE: &str = "expander";

/// A per-program cache from a macro call's canonical textual form to its
/// already-computed expansion, avoiding re-running identical expansions
/// when the same call shape recurs across a fixed-point iteration.
#[derive(Default)]
pub struct ExpansionCache {
    entries: RefCell<HashMap<[u8; 32], Sx>>,
}

impl ExpansionCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(node: &Sx) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(pretty(node).as_bytes());
        hasher.finalize().into()
    }

    fn get(&self, node: &Sx) -> Option<Sx> {
        self.entries.borrow().get(&Self::key(node)).cloned()
    }

    fn insert(&self, node: &Sx, expansion: Sx) {
        self.entries.borrow_mut().insert(Self::key(node), expansion);
    }
}

/// Expands every macro call in `forms` to a fixed point, then strips macro
/// definitions from the result.
pub fn expand_program(
    forms: &[Sx],
    env: &Frame,
    config: &CompilerConfig,
) -> Result<Vec<Sx>, HqlError> {
    let cache = ExpansionCache::new();
    let mut current = forms.to_vec();

    for _ in 0..config.max_iterations {
        let mut changed_any = false;
        let mut next = Vec::with_capacity(current.len());
        for f in &current {
            let (expanded, changed) = expand_node(f, env, config, &cache, 0)?;
            changed_any |= changed;
            next.push(expanded);
        }
        current = next;
        if !changed_any {
            return Ok(strip_macro_definitions(current));
        }
    }

    Err(HqlError::new(
        ErrorKind::Macro(MacroErrorKind::MacroRecursion),
        SourceInfo::unspanned(PHASE),
    ))
}

fn expand_node(
    node: &Sx,
    env: &Frame,
    config: &CompilerConfig,
    cache: &ExpansionCache,
    depth: usize,
) -> Result<(Sx, bool), HqlError> {
    if depth > config.max_expand_depth {
        return Err(HqlError::new(
            ErrorKind::Macro(MacroErrorKind::MacroDepth),
            SourceInfo::unspanned(PHASE),
        ));
    }

    let items = match node.value.as_ref() {
        SExp::List(items) => items,
        _ => return Ok((node.clone(), false)),
    };

    if let Some(name) = node.value.head_symbol() {
        if name == "quote" {
            return Ok((node.clone(), false));
        }
        if matches!(name, "defmacro" | "macro") {
            return Ok((node.clone(), false));
        }
        if let Some(macro_fn) = resolve_macro(env, name) {
            if config.enable_expansion_cache {
                if let Some(hit) = cache.get(node) {
                    return Ok((hit, true));
                }
            }
            let expansion = expand_call(&macro_fn, &items[1..], node.span, env)?;
            let (settled, _) = expand_node(&expansion, env, config, cache, depth + 1)?;
            if config.enable_expansion_cache {
                cache.insert(node, settled.clone());
            }
            return Ok((settled, true));
        }
    }

    let mut rebuilt = Vec::with_capacity(items.len());
    let mut changed_any = false;
    for item in items {
        let (expanded, changed) = expand_node(item, env, config, cache, depth)?;
        changed_any |= changed;
        rebuilt.push(expanded);
    }
    Ok((crate::sexp::list(rebuilt, node.span), changed_any))
}

/// Looks up a macro by name: module-scoped macros for the current file
/// take precedence over globally-defined ones, matching ordinary lexical
/// shadowing.
fn resolve_macro(env: &Frame, name: &str) -> Option<MacroFn> {
    if let Some(file) = env.current_file() {
        if let Some(m) = env.get_module_macro(&file, name) {
            return Some(m);
        }
    }
    env.get_macro(name)
}

fn expand_call(
    macro_fn: &MacroFn,
    args: &[Sx],
    call_span: crate::span::Span,
    env: &Frame,
) -> Result<Sx, HqlError> {
    let context_id = crate::gensym::fresh_name(&format!("macro_{}", macro_fn.name));
    let _ctx_guard = env.set_current_macro_context(context_id);
    let _file_guard = macro_fn
        .source_file
        .clone()
        .map(|f| env.set_current_file(f));

    let call_frame = hygiene::bind_params(macro_fn, args, call_span)?;
    if macro_fn.body.is_empty() {
        return Err(HqlError::new(
            ErrorKind::Macro(MacroErrorKind::MissingBody {
                name: macro_fn.name.clone(),
            }),
            SourceInfo::unspanned(PHASE),
        ));
    }
    let renamed_body: Vec<Sx> = macro_fn
        .body
        .iter()
        .map(hygiene::rename_let_temporaries)
        .collect();

    evaluate_body(&renamed_body, &call_frame)
}

fn evaluate_body(body: &[Sx], frame: &Frame) -> Result<Sx, HqlError> {
    let mut result = None;
    for expr in body {
        result = Some(interpreter::evaluate_for_macro(expr, frame)?);
    }
    Ok(result.unwrap_or_else(|| crate::sexp::nil(crate::span::Span::synthetic())))
}

/// Drops `defmacro`/`macro` forms from the expanded program: once expansion
/// has stabilized their definitions have no further effect and the
/// lowerer has no use for them.
fn strip_macro_definitions(forms: Vec<Sx>) -> Vec<Sx> {
    forms
        .into_iter()
        .filter(|f| !matches!(f.value.head_symbol(), Some("defmacro") | Some("macro")))
        .collect()
}
