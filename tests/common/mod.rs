//! Shared fixtures for the integration suite: an in-memory source tree
//! plus a couple of small assertion helpers used across multiple files.

use std::path::Path;
use std::sync::Arc;

use hql_core::{compile, CompilerConfig, Frame, HqlError, ModuleLoader, Sx};

pub use hql_core::source::MemorySourceProvider;

/// Builds a loader over the given fixture files and loads `root` into a
/// fresh environment, returning both the root's surviving top-level forms
/// and the environment they were loaded into.
pub fn load(files: &[(&str, &str)], root: &str) -> Result<(Vec<Sx>, Frame), HqlError> {
    let mut provider = MemorySourceProvider::new();
    for (path, content) in files {
        provider = provider.with_file(*path, *content);
    }
    let loader = ModuleLoader::new(Arc::new(provider), CompilerConfig::default());
    let env = Frame::root();
    let forms = loader.load(Path::new(root), &env)?;
    Ok((forms, env))
}

/// Runs the full `compile()` pipeline (load + expand) over a single-file
/// in-memory fixture.
pub fn compile_one(path: &str, content: &str) -> Result<Vec<Sx>, HqlError> {
    let provider = MemorySourceProvider::new().with_file(path, content);
    compile(Path::new(path), Arc::new(provider), CompilerConfig::default())
}

/// Runs `compile()` over a multi-file in-memory fixture.
pub fn compile_many(files: &[(&str, &str)], root: &str) -> Result<Vec<Sx>, HqlError> {
    let mut provider = MemorySourceProvider::new();
    for (path, content) in files {
        provider = provider.with_file(*path, *content);
    }
    compile(Path::new(root), Arc::new(provider), CompilerConfig::default())
}

pub fn pretty_all(forms: &[Sx]) -> Vec<String> {
    forms.iter().map(hql_core::sexp::pretty).collect()
}
