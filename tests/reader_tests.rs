//! Exercises the reader end to end: literal-form desugaring, escapes, and
//! the round-trip property (`read . serialize . read == read`).

mod common;

use hql_core::reader::{read, serialize};
use hql_core::sexp::{pretty, Literal, SExp};

#[test]
fn numbers_strings_and_booleans_read_as_literals() {
    let forms = read("t", r#"(list 1 2.5 "hi" true false nil)"#).unwrap();
    let items = forms[0].value.as_list().unwrap();
    assert_eq!(items[1].value.as_ref(), &SExp::Literal(Literal::Number(1.0)));
    assert_eq!(items[2].value.as_ref(), &SExp::Literal(Literal::Number(2.5)));
    assert_eq!(
        items[3].value.as_ref(),
        &SExp::Literal(Literal::String("hi".into()))
    );
    assert_eq!(items[4].value.as_ref(), &SExp::Literal(Literal::Bool(true)));
    assert_eq!(items[5].value.as_ref(), &SExp::Literal(Literal::Bool(false)));
    assert_eq!(items[6].value.as_ref(), &SExp::Literal(Literal::Nil));
}

#[test]
fn quote_family_desugars_to_named_forms() {
    assert_eq!(read("t", "'x").unwrap()[0].value.head_symbol(), Some("quote"));
    assert_eq!(read("t", "`x").unwrap()[0].value.head_symbol(), Some("quasiquote"));
    assert_eq!(read("t", "~x").unwrap()[0].value.head_symbol(), Some("unquote"));
    assert_eq!(
        read("t", "~@x").unwrap()[0].value.head_symbol(),
        Some("unquote-splicing")
    );
}

#[test]
fn vectors_maps_and_sets_desugar_to_calls() {
    assert_eq!(read("t", "[1 2 3]").unwrap()[0].value.head_symbol(), Some("vector"));
    assert_eq!(read("t", "[]").unwrap()[0].value.head_symbol(), Some("empty-array"));
    assert_eq!(read("t", "{a: 1}").unwrap()[0].value.head_symbol(), Some("hash-map"));
    assert_eq!(read("t", "{}").unwrap()[0].value.head_symbol(), Some("empty-map"));
    assert_eq!(read("t", "#[a b]").unwrap()[0].value.head_symbol(), Some("hash-set"));
}

#[test]
fn dashed_property_access_rewrites_to_get() {
    let node = read("t", "obj.dash-name").unwrap().remove(0);
    let items = node.value.as_list().unwrap();
    assert_eq!(items[0].value.as_symbol(), Some("get"));
    assert_eq!(items[1].value.as_symbol(), Some("obj"));
    assert_eq!(
        items[2].value.as_ref(),
        &SExp::Literal(Literal::String("dash-name".into()))
    );
}

#[test]
fn trailing_dot_with_no_property_name_is_a_parse_error() {
    use hql_core::error::{ErrorKind, ParseErrorKind};

    let err = read("t", "obj.").unwrap_err();
    assert!(matches!(
        err.kind,
        ErrorKind::Parse(ParseErrorKind::ExpectedPropertyAfterDot)
    ));
}

#[test]
fn string_escapes_are_unescaped() {
    let forms = read("t", r#""line\nbreak\ttab\"quote""#).unwrap();
    assert_eq!(
        forms[0].value.as_ref(),
        &SExp::Literal(Literal::String("line\nbreak\ttab\"quote".into()))
    );
}

#[test]
fn gensym_shaped_symbols_are_rejected_at_read_time() {
    let err = read("t", "(def tmp_a1 1)").unwrap_err();
    assert!(matches!(
        err.kind,
        hql_core::error::ErrorKind::Parse(hql_core::error::ParseErrorKind::ReservedGensymName { .. })
    ));
}

#[test]
fn unbalanced_delimiters_are_parse_errors() {
    use hql_core::error::{ErrorKind, ParseErrorKind};

    let err = read("t", "(a (b)").unwrap_err();
    assert!(matches!(err.kind, ErrorKind::Parse(ParseErrorKind::UnclosedList)));

    let err = read("t", "[1 2").unwrap_err();
    assert!(matches!(err.kind, ErrorKind::Parse(ParseErrorKind::UnclosedVector)));

    let err = read("t", "{a: 1").unwrap_err();
    assert!(matches!(err.kind, ErrorKind::Parse(ParseErrorKind::UnclosedMap)));

    let err = read("t", "#[a").unwrap_err();
    assert!(matches!(err.kind, ErrorKind::Parse(ParseErrorKind::UnclosedSet)));

    let err = read("t", "(a b))").unwrap_err();
    assert!(matches!(err.kind, ErrorKind::Parse(ParseErrorKind::UnexpectedClose)));
}

#[test]
fn true_false_and_nil_are_not_mistaken_for_a_prefix_of_a_longer_symbol() {
    assert_eq!(read("t", "truthy").unwrap()[0].value.as_symbol(), Some("truthy"));
    assert_eq!(read("t", "falsely").unwrap()[0].value.as_symbol(), Some("falsely"));
    assert_eq!(read("t", "nilable").unwrap()[0].value.as_symbol(), Some("nilable"));
}

#[test]
fn serialize_then_read_round_trips_structure() {
    let original = read("t", "(defn add [a b] (+ a ~@b 'c `(d ~e)))").unwrap();
    let text = serialize(&original);
    let reparsed = read("t", &text).unwrap();
    assert_eq!(pretty(&original[0]), pretty(&reparsed[0]));
}
