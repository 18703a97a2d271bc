//! `hql-core`: the HQL front-end compiler pipeline — reader, hygienic
//! macro expander, and module graph loader. Everything downstream of the
//! `Lowerer` boundary (IR, codegen, bundling) lives outside this crate.

pub mod config;
pub mod env;
pub mod error;
pub mod expander;
pub mod gensym;
pub mod lower;
pub mod module;
pub mod reader;
pub mod sexp;
pub mod source;
pub mod span;

pub use config::CompilerConfig;
pub use env::Frame;
pub use error::HqlError;
pub use lower::{HqlAstNode, IdentityLowerer, Lowerer};
pub use module::ModuleLoader;
pub use sexp::{SExp, Sx};
pub use source::{FsSourceProvider, SourceProvider};

use std::path::Path;
use std::sync::Arc;

/// Runs the full pipeline short of lowering: load `root` and its
/// transitive imports into a fresh environment, then expand every macro
/// call to a fixed point. Returns the root module's expanded, macro-free
/// top-level forms, ready for a `Lowerer`.
pub fn compile(
    root: &Path,
    source: Arc<dyn SourceProvider>,
    config: CompilerConfig,
) -> Result<Vec<Sx>, HqlError> {
    let env = Frame::root();
    let canonical_root = source.canonicalize(root).unwrap_or_else(|_| root.to_path_buf());
    let loader = ModuleLoader::new(source, config.clone());
    let forms = loader.load(root, &env)?;
    // Module-scoped (`macro`, not `defmacro`) definitions are only visible
    // to `resolve_macro` while `currentFile` names their defining file; the
    // Module Loader's own scoped guard is long gone by the time expansion
    // runs, so the root file has to be named again here.
    let _file_guard = env.set_current_file(canonical_root);
    expander::expand_program(&forms, &env, &config)
}
