//! The Module Loader: resolves a dependency graph, installs bindings and
//! macros into the Environment, and returns the root module's remaining
//! top-level forms for the Expander.

pub mod record;
pub mod remote;
pub mod resolve;

use std::cell::RefCell;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::CompilerConfig;
use crate::env::{symbol_not_exported, Binding, Frame, MacroFn};
use crate::error::{ErrorKind, HqlError, ImportErrorKind, MacroErrorKind, SourceInfo};
use crate::reader;
use crate::sexp::{Sx, SExp};
use crate::source::SourceProvider;

use self::record::{ModuleRecord, ModuleState};
use self::remote::{RecordingRemoteSource, RemoteSource};
use self::resolve::{classify, ResolvedImport};

const PHASE: &str = "module_loader";

/// One selected name in a vector import/export: `a`, or `b as c`.
struct NamedSelector {
    name: String,
    alias: Option<String>,
}

pub struct ModuleLoader {
    source: Arc<dyn SourceProvider>,
    remote: Arc<dyn RemoteSource>,
    config: CompilerConfig,
    graph: RefCell<std::collections::HashMap<PathBuf, ModuleRecord>>,
}

impl ModuleLoader {
    pub fn new(source: Arc<dyn SourceProvider>, config: CompilerConfig) -> Self {
        Self {
            source,
            remote: Arc::new(RecordingRemoteSource),
            config,
            graph: RefCell::new(std::collections::HashMap::new()),
        }
    }

    pub fn with_remote_source(mut self, remote: Arc<dyn RemoteSource>) -> Self {
        self.remote = remote;
        self
    }

    /// Loads `root` and its transitive dependencies into `env`, returning
    /// the root module's top-level forms (still containing `defmacro`/
    /// `macro` forms; stripping those is the Expander's job).
    pub fn load(&self, root: &Path, env: &Frame) -> Result<Vec<Sx>, HqlError> {
        self.process_file(root, env)
    }

    fn process_file(&self, path: &Path, env: &Frame) -> Result<Vec<Sx>, HqlError> {
        let canonical = self
            .source
            .canonicalize(path)
            .unwrap_or_else(|_| path.to_path_buf());

        match self.graph.borrow().get(&canonical).and_then(ModuleRecord::state) {
            Some(ModuleState::Done) => {
                return Ok(self.cached_exprs(&canonical));
            }
            Some(ModuleState::InProgress) => {
                // Cycle: partial resolution is deliberate. The ancestor
                // already on the stack will finish populating its own
                // exports on the way back up.
                return Ok(Vec::new());
            }
            None => {}
        }

        self.graph
            .borrow_mut()
            .insert(canonical.clone(), ModuleRecord::new_local(canonical.clone()));

        let content = self
            .source
            .read_to_string(&canonical)
            .map_err(|_| file_not_found(&canonical))?;

        let name = canonical.display().to_string();
        let forms = reader::read(&name, &content)?;

        let _file_guard = env.set_current_file(canonical.clone());
        let importer_dir = canonical.parent().unwrap_or_else(|| Path::new(".")).to_path_buf();

        let (import_forms, export_forms, other_forms): (Vec<&Sx>, Vec<&Sx>, Vec<&Sx>) =
            partition_forms(&forms);

        self.process_imports(&import_forms, &importer_dir, &canonical, env)
            .map_err(|e| e.push_import_frame(name.clone()))?;

        register_definitions(&other_forms, &canonical, env)
            .map_err(|e| e.push_import_frame(name.clone()))?;

        self.register_exports(&export_forms, &canonical, env)
            .map_err(|e| e.push_import_frame(name.clone()))?;

        let export_names: HashSet<String> = env.exports_of(&canonical).into_keys().collect();
        let exported_macro_names = collect_exported_macro_names(&export_forms);

        let kept: Vec<Sx> = other_forms.into_iter().cloned().collect();
        self.graph.borrow_mut().insert(
            canonical.clone(),
            ModuleRecord::Local {
                path: canonical.clone(),
                parsed_exprs: kept.clone(),
                export_names,
                exported_macro_names,
                state: ModuleState::Done,
            },
        );

        Ok(kept)
    }

    fn cached_exprs(&self, path: &Path) -> Vec<Sx> {
        match self.graph.borrow().get(path) {
            Some(ModuleRecord::Local { parsed_exprs, .. }) => parsed_exprs.clone(),
            _ => Vec::new(),
        }
    }

    fn process_imports(
        &self,
        import_forms: &[&Sx],
        importer_dir: &Path,
        importer_path: &Path,
        env: &Frame,
    ) -> Result<(), HqlError> {
        let mut remotes = Vec::new();
        let mut locals = Vec::new();
        for form in import_forms {
            let (selectors, raw_path) = parse_import_form(form)?;
            match classify(&raw_path, importer_dir)? {
                ResolvedImport::Npm(pkg) => remotes.push((form, format!("npm:{pkg}"), selectors)),
                ResolvedImport::Remote(uri) => remotes.push((form, uri, selectors)),
                ResolvedImport::LocalHql(p) => locals.push((form, p, selectors, true)),
                ResolvedImport::LocalJs(p) => locals.push((form, p, selectors, false)),
            }
        }

        // Remote imports complete in parallel, before local processing
        // begins.
        let cdn_roots = self.config.cdn_roots.clone();
        let remote_results: Vec<_> = std::thread::scope(|scope| {
            let handles: Vec<_> = remotes
                .iter()
                .map(|(_, identifier, _)| {
                    let remote = Arc::clone(&self.remote);
                    let cdn_roots = cdn_roots.clone();
                    let identifier = identifier.clone();
                    scope.spawn(move || remote.resolve(&identifier, &cdn_roots))
                })
                .collect();
            handles.into_iter().map(|h| h.join().expect("remote import thread panicked")).collect()
        });

        for ((_, identifier, selectors), result) in remotes.into_iter().zip(remote_results) {
            match result {
                Ok(ModuleRecord::External { identifier }) => {
                    bind_external_selectors(env, &identifier, selectors);
                }
                Ok(ModuleRecord::Local { .. }) => unreachable!("remote source never returns Local"),
                Err(reasons) => {
                    return Err(HqlError::new(
                        ErrorKind::Import(ImportErrorKind::FetchFailure {
                            identifier: identifier.clone(),
                            reasons,
                        }),
                        SourceInfo::unspanned(PHASE),
                    ));
                }
            }
        }

        for (_, dep_path, selectors, is_hql) in locals {
            if is_hql {
                self.process_file(&dep_path, env)?;
                self.bind_local_selectors(env, &dep_path, selectors, importer_path)?;
            } else {
                // Local JS: loaded dynamically by the target runtime, not
                // introspected here.
                bind_external_selectors(env, &dep_path.display().to_string(), selectors);
            }
        }

        Ok(())
    }

    fn bind_local_selectors(
        &self,
        env: &Frame,
        dep_path: &Path,
        selectors: ImportSelectors,
        importer_path: &Path,
    ) -> Result<(), HqlError> {
        let canonical = self
            .source
            .canonicalize(dep_path)
            .unwrap_or_else(|_| dep_path.to_path_buf());
        match selectors {
            ImportSelectors::Vector(items) => {
                for item in items {
                    let dest = item.alias.clone().unwrap_or_else(|| item.name.clone());
                    if env.import_macro(&canonical, &item.name, importer_path, item.alias.as_deref()) {
                        continue;
                    }
                    match env.get_export(&canonical, &item.name) {
                        Some(binding) => env.define(dest, as_sx(binding)),
                        None => {
                            return Err(symbol_not_exported(&item.name, &canonical));
                        }
                    }
                }
            }
            ImportSelectors::Namespace(name) => {
                let exports = env.exports_of(&canonical);
                env.import_module(name, exports);
            }
        }
        Ok(())
    }

    fn register_exports(&self, export_forms: &[&Sx], file: &Path, env: &Frame) -> Result<(), HqlError> {
        for form in export_forms {
            let items = form.value.as_list().expect("export forms are lists");
            match items.get(1).map(|n| n.value.as_ref()) {
                Some(SExp::List(_)) => {
                    // Vector shape: (export [a, b]), read as `(vector a b)`.
                    let names = items[1].value.as_list().expect("vector export body");
                    let names = match names.first().and_then(|n| n.value.as_symbol()) {
                        Some("vector") | Some("empty-array") => &names[1..],
                        _ => &names[..],
                    };
                    for name_node in names {
                        let name = name_node.value.as_symbol().expect("export name is a symbol");
                        if env.has_module_macro(file, name) {
                            env.export_macro(file, name);
                        } else {
                            let binding = env.lookup(name).map_err(|_| {
                                HqlError::new(
                                    ErrorKind::SymbolNotFound {
                                        symbol: name.to_string(),
                                    },
                                    SourceInfo::unspanned(PHASE),
                                )
                            })?;
                            env.define_export(file, name, binding);
                        }
                    }
                }
                Some(SExp::Literal(crate::sexp::Literal::String(name))) => {
                    // Legacy shape: (export "name" expr)
                    let expr = items.get(2).expect("legacy export carries an expression");
                    env.define_export(file, name.clone(), Binding::Value(expr.clone()));
                }
                _ => {}
            }
        }
        Ok(())
    }
}

enum ImportSelectors {
    Vector(Vec<NamedSelector>),
    Namespace(String),
}

fn as_sx(binding: Binding) -> Sx {
    match binding {
        Binding::Value(v) => v,
        Binding::Host(_) => crate::sexp::nil(crate::span::Span::synthetic()),
    }
}

fn file_not_found(path: &Path) -> HqlError {
    HqlError::new(
        ErrorKind::Import(ImportErrorKind::FileNotFound {
            path: path.display().to_string(),
        }),
        SourceInfo::unspanned(PHASE),
    )
}

fn partition_forms(forms: &[Sx]) -> (Vec<&Sx>, Vec<&Sx>, Vec<&Sx>) {
    let mut imports = Vec::new();
    let mut exports = Vec::new();
    let mut rest = Vec::new();
    for form in forms {
        match form.value.head_symbol() {
            Some("import") => imports.push(form),
            Some("export") => exports.push(form),
            _ => rest.push(form),
        }
    }
    (imports, exports, rest)
}

/// Parses `(import [a, b as c] from "path")` or `(import name from
/// "path")`.
fn parse_import_form(form: &Sx) -> Result<(ImportSelectors, String), HqlError> {
    let items = form.value.as_list().expect("import forms are lists");
    let spec_node = items.get(1).ok_or_else(|| malformed_import(form))?;
    let path_node = items.last().ok_or_else(|| malformed_import(form))?;
    let raw_path = match path_node.value.as_ref() {
        SExp::Literal(crate::sexp::Literal::String(s)) => s.clone(),
        _ => return Err(malformed_import(form)),
    };

    let selectors = match spec_node.value.as_ref() {
        SExp::List(items) => {
            // `[a, b as c]` reads as `(vector a b as c)`; the leading
            // `vector` symbol is read-time sugar, not a selector name.
            let items = match items.first().and_then(|n| n.value.as_symbol()) {
                Some("vector") | Some("empty-array") => &items[1..],
                _ => &items[..],
            };
            let mut names = Vec::new();
            let mut i = 0;
            while i < items.len() {
                let name = items[i].value.as_symbol().ok_or_else(|| malformed_import(form))?.to_string();
                if items.get(i + 1).and_then(|n| n.value.as_symbol()) == Some("as") {
                    let alias = items
                        .get(i + 2)
                        .and_then(|n| n.value.as_symbol())
                        .ok_or_else(|| malformed_import(form))?
                        .to_string();
                    names.push(NamedSelector { name, alias: Some(alias) });
                    i += 3;
                } else {
                    names.push(NamedSelector { name, alias: None });
                    i += 1;
                }
            }
            ImportSelectors::Vector(names)
        }
        SExp::Symbol(name) => ImportSelectors::Namespace(name.clone()),
        _ => return Err(malformed_import(form)),
    };

    Ok((selectors, raw_path))
}

fn malformed_import(form: &Sx) -> HqlError {
    HqlError::new(
        ErrorKind::Import(ImportErrorKind::UnsupportedFileType {
            path: crate::sexp::pretty(form),
        }),
        SourceInfo::unspanned(PHASE),
    )
    .with_help("malformed import form")
}

fn bind_external_selectors(env: &Frame, identifier: &str, selectors: ImportSelectors) {
    use crate::sexp::{form, string, sym};
    let span = crate::span::Span::synthetic();
    match selectors {
        ImportSelectors::Vector(items) => {
            for item in items {
                let dest = item.alias.unwrap_or_else(|| item.name.clone());
                let stub = form(
                    "js-get",
                    vec![string(identifier, span), string(&item.name, span)],
                    span,
                );
                env.define(dest, stub);
            }
        }
        ImportSelectors::Namespace(name) => {
            env.define(name, sym(identifier, span));
        }
    }
}

/// Two-phase definition registration: first every `def`/`let`/`defn`/`fn`
/// stub, then every `defmacro` (global) and `macro` (module-scoped)
/// declaration. This makes macros able to reference later-defined
/// bindings textually.
fn register_definitions(forms: &[&Sx], file: &Path, env: &Frame) -> Result<(), HqlError> {
    for form in forms {
        let Some(head) = form.value.head_symbol() else { continue };
        let Some(items) = form.value.as_list() else { continue };
        let Some(name) = items.get(1).and_then(|n| n.value.as_symbol()) else { continue };
        match head {
            // `def`/`let` bind a name straight to its value, so a later
            // macro body referencing it by symbol sees the value, not the
            // defining form.
            "def" | "let" => {
                let value = items.get(2).cloned().unwrap_or_else(|| crate::sexp::nil(form.span));
                env.define(name, value);
            }
            // `defn`/`fn` register a stub only: this environment never
            // calls functions, it only needs the name bound to something
            // so macros can reference it before its textual definition.
            "defn" | "fn" => env.define(name, (*form).clone()),
            _ => {}
        }
    }
    for form in forms {
        match form.value.head_symbol() {
            Some("macro") => {
                let macro_fn = build_macro_fn(form, env)?;
                env.define_module_macro(file, macro_fn.name.clone(), macro_fn);
            }
            Some("defmacro") => {
                let macro_fn = build_macro_fn(form, env)?;
                env.define_macro(macro_fn.name.clone(), macro_fn);
            }
            _ => {}
        }
    }
    Ok(())
}

fn collect_exported_macro_names(export_forms: &[&Sx]) -> HashSet<String> {
    let mut names = HashSet::new();
    for form in export_forms {
        if let Some(items) = form.value.as_list() {
            if let Some(SExp::List(vec_items)) = items.get(1).map(|n| n.value.as_ref()) {
                let vec_items = match vec_items.first().and_then(|n| n.value.as_symbol()) {
                    Some("vector") | Some("empty-array") => &vec_items[1..],
                    _ => &vec_items[..],
                };
                for name_node in vec_items {
                    if let Some(name) = name_node.value.as_symbol() {
                        names.insert(name.to_string());
                    }
                }
            }
        }
    }
    names
}

/// Builds a `MacroFn` from `(macro name [params...] body...)` or
/// `(defmacro name [params...] body...)`. Shared by the loader's
/// module-scoped pass and its global `defmacro` pass.
pub fn build_macro_fn(form: &Sx, defining_env: &Frame) -> Result<MacroFn, HqlError> {
    let items = form.value.as_list().ok_or_else(|| macro_syntax("not a list"))?;
    let name = items
        .get(1)
        .and_then(|n| n.value.as_symbol())
        .ok_or_else(|| macro_syntax("missing macro name"))?
        .to_string();
    let param_items = items
        .get(2)
        .and_then(|n| n.value.as_list())
        .ok_or_else(|| bad_parameter_list(&name, "missing parameter list"))?;
    // `[x y]` reads as `(vector x y)`; drop the read-time `vector` head.
    let param_items = match param_items.first().and_then(|n| n.value.as_symbol()) {
        Some("vector") | Some("empty-array") => &param_items[1..],
        _ => &param_items[..],
    };
    let (params, rest) = parse_param_list(param_items, &name)?;
    let body = items.get(3..).unwrap_or_default().to_vec();
    if body.is_empty() {
        return Err(HqlError::new(
            ErrorKind::Macro(MacroErrorKind::MissingBody { name }),
            SourceInfo::unspanned(PHASE),
        ));
    }
    Ok(MacroFn {
        name,
        params,
        rest,
        body,
        defining_env: defining_env.clone(),
        source_file: None,
    })
}

/// `&rest` collects every remaining positional argument; only one `&`
/// marker is allowed per parameter list.
fn parse_param_list(items: &[Sx], macro_name: &str) -> Result<(Vec<String>, Option<String>), HqlError> {
    let mut params = Vec::new();
    let mut rest = None;
    let mut i = 0;
    while i < items.len() {
        let name = items[i]
            .value
            .as_symbol()
            .ok_or_else(|| bad_parameter_list(macro_name, "parameter names must be symbols"))?;
        if name == "&" {
            if rest.is_some() {
                return Err(HqlError::new(
                    ErrorKind::Macro(MacroErrorKind::MacroSyntax {
                        detail: format!("macro '{macro_name}' has more than one '&' rest marker"),
                    }),
                    SourceInfo::unspanned(PHASE),
                ));
            }
            let rest_name = items
                .get(i + 1)
                .and_then(|n| n.value.as_symbol())
                .ok_or_else(|| bad_parameter_list(macro_name, "'&' must be followed by a name"))?;
            rest = Some(rest_name.to_string());
            i += 2;
        } else {
            params.push(name.to_string());
            i += 1;
        }
    }
    Ok((params, rest))
}

fn bad_parameter_list(name: &str, detail: &str) -> HqlError {
    HqlError::new(
        ErrorKind::Macro(MacroErrorKind::BadParameterList {
            detail: format!("macro '{name}': {detail}"),
        }),
        SourceInfo::unspanned(PHASE),
    )
}

fn macro_syntax(detail: &str) -> HqlError {
    HqlError::new(
        ErrorKind::Macro(MacroErrorKind::MacroSyntax {
            detail: detail.to_string(),
        }),
        SourceInfo::unspanned(PHASE),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemorySourceProvider;

    fn loader(provider: MemorySourceProvider) -> ModuleLoader {
        ModuleLoader::new(Arc::new(provider), CompilerConfig::default())
    }

    #[test]
    fn imported_exports_are_visible_in_the_importing_file() {
        let provider = MemorySourceProvider::new()
            .with_file("/a.hql", "(def greeting \"hi\") (export [greeting])")
            .with_file("/b.hql", "(import [greeting] from \"/a.hql\")");
        let loader = loader(provider);
        let env = Frame::root();
        loader.load(Path::new("/b.hql"), &env).unwrap();
        assert!(env.lookup("greeting").is_ok());
    }

    #[test]
    fn cyclic_import_terminates_instead_of_looping() {
        let provider = MemorySourceProvider::new()
            .with_file("/a.hql", "(import x from \"/b.hql\") (def a-val 1)")
            .with_file("/b.hql", "(import y from \"/a.hql\") (def b-val 2)");
        let loader = loader(provider);
        let env = Frame::root();
        let result = loader.load(Path::new("/a.hql"), &env);
        assert!(result.is_ok());
    }

    #[test]
    fn cross_module_macro_import_and_export() {
        let provider = MemorySourceProvider::new()
            .with_file("/A.hql", "(macro incr [x] `(+ ~x 1)) (export [incr])")
            .with_file("/B.hql", "(import [incr] from \"/A.hql\")");
        let loader = loader(provider);
        let env = Frame::root();
        loader.load(Path::new("/B.hql"), &env).unwrap();
        assert!(env.has_module_macro(Path::new("/B.hql"), "incr"));
    }
}
