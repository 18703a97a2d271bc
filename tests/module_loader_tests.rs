//! Exercises the Module Loader: import/export resolution, cyclic-import
//! termination, cross-module macro sharing, and remote-import handling.

mod common;

use std::path::Path;
use std::sync::Arc;

use hql_core::config::CompilerConfig;
use hql_core::env::Frame;
use hql_core::module::remote::AlwaysFailingRemoteSource;
use hql_core::module::ModuleLoader;
use hql_core::source::MemorySourceProvider;

#[test]
fn vector_export_and_import_bind_the_value_in_the_importing_file() {
    let (_, env) = common::load(
        &[
            ("/a.hql", "(def greeting \"hi\") (export [greeting])"),
            ("/b.hql", "(import [greeting] from \"/a.hql\")"),
        ],
        "/b.hql",
    )
    .unwrap();
    assert!(env.lookup("greeting").is_ok());
}

#[test]
fn aliased_import_binds_under_the_alias_not_the_original_name() {
    let (_, env) = common::load(
        &[
            ("/a.hql", "(def greeting \"hi\") (export [greeting])"),
            ("/b.hql", "(import [greeting as hello] from \"/a.hql\")"),
        ],
        "/b.hql",
    )
    .unwrap();
    assert!(env.lookup("hello").is_ok());
    assert!(env.lookup("greeting").is_err());
}

#[test]
fn namespace_import_exposes_dotted_property_access() {
    let (_, env) = common::load(
        &[
            ("/a.hql", "(def greeting \"hi\") (export [greeting])"),
            ("/b.hql", "(import a from \"/a.hql\")"),
        ],
        "/b.hql",
    )
    .unwrap();
    assert!(env.lookup("a.greeting").is_ok());
}

#[test]
fn importing_an_unexported_name_is_an_error() {
    let result = common::load(
        &[
            ("/a.hql", "(def secret 1)"),
            ("/b.hql", "(import [secret] from \"/a.hql\")"),
        ],
        "/b.hql",
    );
    assert!(result.is_err());
}

#[test]
fn cyclic_imports_resolve_via_partial_completion_instead_of_looping() {
    let result = common::load(
        &[
            ("/a.hql", "(import x from \"/b.hql\") (def a-val 1)"),
            ("/b.hql", "(import y from \"/a.hql\") (def b-val 2)"),
        ],
        "/a.hql",
    );
    assert!(result.is_ok());
}

#[test]
fn exported_macros_become_visible_to_importing_files() {
    let (_, env) = common::load(
        &[
            ("/a.hql", "(macro incr [x] `(+ ~x 1)) (export [incr])"),
            ("/b.hql", "(import [incr] from \"/a.hql\")"),
        ],
        "/b.hql",
    )
    .unwrap();
    assert!(env.has_module_macro(Path::new("/b.hql"), "incr"));
}

#[test]
fn unexported_module_macros_stay_invisible_to_other_files() {
    let (_, env) = common::load(
        &[
            ("/a.hql", "(macro private-helper [x] x)"),
            ("/b.hql", "(import a from \"/a.hql\")"),
        ],
        "/b.hql",
    )
    .unwrap();
    assert!(!env.has_module_macro(Path::new("/b.hql"), "private-helper"));
}

#[test]
fn importing_a_missing_local_file_reports_file_not_found() {
    let result = common::load(&[("/b.hql", "(import x from \"/missing.hql\")")], "/b.hql");
    assert!(result.is_err());
}

#[test]
fn importing_an_unsupported_file_extension_is_rejected() {
    let result = common::load(&[("/b.hql", "(import x from \"/data.txt\")")], "/b.hql");
    assert!(result.is_err());
}

#[test]
fn npm_import_succeeds_against_the_recording_remote_source_by_default() {
    let (_, env) = common::load(&[("/b.hql", "(import [debounce] from \"npm:lodash\")")], "/b.hql").unwrap();
    assert!(env.lookup("debounce").is_ok());
}

#[test]
fn remote_import_failure_aggregates_a_reason_per_cdn_root() {
    let provider =
        MemorySourceProvider::new().with_file("/b.hql", "(import [x] from \"npm:left-pad\")");
    let loader = ModuleLoader::new(Arc::new(provider), CompilerConfig::default())
        .with_remote_source(Arc::new(AlwaysFailingRemoteSource));
    let env = Frame::root();
    let err = loader.load(Path::new("/b.hql"), &env).unwrap_err();
    let rendered = err.render();
    assert!(rendered.contains("left-pad") || format!("{err}").contains("left-pad"));
}
