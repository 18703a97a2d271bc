//! Exercises the whole-program macro expansion pipeline: quasiquote
//! substitution, fixed-point re-expansion of macro-generated macro calls,
//! `&rest` collection, and definition stripping.

mod common;

use common::compile_one;
use hql_core::sexp::pretty;

#[test]
fn a_simple_macro_expands_its_body_with_substitution() {
    let forms = compile_one(
        "/m.hql",
        "(defmacro double [x] `(+ ~x ~x)) (double 21)",
    )
    .unwrap();
    assert_eq!(forms.len(), 1);
    assert_eq!(pretty(&forms[0]), "(+ 21 21)");
}

#[test]
fn macro_definitions_do_not_survive_into_the_output() {
    let forms = compile_one(
        "/m.hql",
        "(defmacro noop [x] x) (def y 1) (noop y)",
    )
    .unwrap();
    let heads: Vec<_> = forms.iter().map(|f| f.value.head_symbol()).collect();
    assert!(!heads.contains(&Some("defmacro")));
}

#[test]
fn nested_macro_calls_expand_to_a_fixed_point() {
    // `outer` expands to a call of `inner`, which must itself expand
    // before the program is considered stable.
    let forms = compile_one(
        "/m.hql",
        "(defmacro inner [x] `(+ ~x 1)) \
         (defmacro outer [x] `(inner ~x)) \
         (outer 10)",
    )
    .unwrap();
    assert_eq!(pretty(&forms[0]), "(+ 10 1)");
}

#[test]
fn rest_parameters_collect_the_remaining_call_arguments() {
    let forms = compile_one(
        "/m.hql",
        "(defmacro wrap [head & rest] `(list ~head ~@rest)) (wrap 1 2 3 4)",
    )
    .unwrap();
    assert_eq!(pretty(&forms[0]), "(list 1 2 3 4)");
}

#[test]
fn a_macro_body_referencing_a_def_bound_name_sees_its_value_not_its_form() {
    // `greeting` is bound during definition registration so a macro
    // appearing textually before it can still reference it; the binding
    // must be the value `"hi"`, not the whole `(def greeting "hi")` form.
    let forms = compile_one(
        "/m.hql",
        "(defmacro shout [] `(print ~greeting)) (def greeting \"hi\") (shout)",
    )
    .unwrap();
    let shout_expansion = forms.iter().find(|f| f.value.head_symbol() == Some("print")).unwrap();
    assert_eq!(pretty(shout_expansion), "(print \"hi\")");
}

#[test]
fn unquote_splicing_inlines_a_quoted_lists_elements() {
    let forms = compile_one(
        "/m.hql",
        "(defmacro pair [] `(list ~@(quote (7 8)))) (pair)",
    )
    .unwrap();
    assert_eq!(pretty(&forms[0]), "(list 7 8)");
}

#[test]
fn a_module_scoped_macro_expands_at_top_level_in_its_own_file() {
    // `macro` (as opposed to `defmacro`) registers against the current
    // file; a same-file, top-level call must resolve it just like a
    // global macro would, not only when called from inside another
    // macro's body.
    let forms = compile_one(
        "/m.hql",
        "(macro local-only [x] `(+ ~x 1)) (local-only 41)",
    )
    .unwrap();
    assert_eq!(forms.len(), 1);
    assert_eq!(pretty(&forms[0]), "(+ 41 1)");
}

#[test]
fn module_scoped_macros_are_invisible_outside_their_defining_file() {
    let result = common::compile_many(
        &[
            ("/a.hql", "(macro local-only [x] x) (local-only 1)"),
            ("/b.hql", "(import a from \"/a.hql\") (local-only 2)"),
        ],
        "/b.hql",
    );
    // `local-only` is never exported, so `/b.hql` sees it as a plain
    // (unbound) call head, not a macro to expand — it is left untouched
    // rather than erroring, since unresolved heads are not an expander
    // error.
    let forms = result.unwrap();
    assert!(forms.iter().any(|f| f.value.head_symbol() == Some("local-only")));
}
