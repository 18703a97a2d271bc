//! The Environment: the sole mutable name-space threaded through reading,
//! expansion, and module loading.
//!
//! Frames are `Rc<RefCell<FrameData>>` with an `Option<...>` parent link —
//! reference-counting suffices because the chain is built strictly by
//! `extend()` and can never cycle. Bindings use `im::HashMap`, a
//! persistent map, over a plain mutable one, since a value may be
//! captured by a macro context across time.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use im::HashMap as PersistentMap;

use crate::error::{ErrorKind, HqlError, ImportErrorKind, SourceInfo};
use crate::sexp::Sx;

/// A value bound in the environment: either ordinary data or a host
/// function callable from macro bodies.
#[derive(Clone)]
pub enum Binding {
    Value(Sx),
    Host(Rc<dyn Fn(&[Sx]) -> Result<Sx, HqlError>>),
}

/// `MacroFn`: `(args, callerEnv) -> Sx`, carrying `{isMacro, name,
/// sourceFile?}`. Represented as `{params, rest, body, definingEnv}`, the
/// natural shape for a host language without first-class closures, and
/// applied by `expander::interpreter`.
#[derive(Clone)]
pub struct MacroFn {
    pub name: String,
    pub params: Vec<String>,
    pub rest: Option<String>,
    pub body: Vec<Sx>,
    pub defining_env: Frame,
    pub source_file: Option<PathBuf>,
}

#[derive(Default)]
struct FrameData {
    bindings: PersistentMap<String, Binding>,
    macros: HashMap<String, MacroFn>,
    module_macros: HashMap<PathBuf, HashMap<String, MacroFn>>,
    module_exports: HashMap<PathBuf, HashMap<String, Binding>>,
    exported_macros: HashMap<PathBuf, HashSet<String>>,
    imported_modules: HashMap<String, HashMap<String, Binding>>,
    current_file: Option<PathBuf>,
    current_macro_context: Option<String>,
}

/// A lexical frame with a parent link. Cloning a `Frame` clones the handle,
/// not the data (`Rc` semantics), since reference-counting is enough here —
/// nothing in this pipeline needs a frame to outlive the thread that built it.
#[derive(Clone)]
pub struct Frame {
    data: Rc<RefCell<FrameData>>,
    parent: Option<Box<Frame>>,
}

impl Frame {
    pub fn root() -> Self {
        Self {
            data: Rc::new(RefCell::new(FrameData::default())),
            parent: None,
        }
    }

    /// `extend() -> childFrame`.
    pub fn extend(&self) -> Self {
        Self {
            data: Rc::new(RefCell::new(FrameData::default())),
            parent: Some(Box::new(self.clone())),
        }
    }

    fn root_frame(&self) -> Frame {
        let mut current = self.clone();
        while let Some(parent) = current.parent.clone() {
            current = *parent;
        }
        current
    }

    /// `define(name, value)`: installs in the current frame, later defines
    /// shadow earlier ones in the same frame.
    pub fn define(&self, name: impl Into<String>, value: Sx) {
        self.data
            .borrow_mut()
            .bindings
            .insert(name.into(), Binding::Value(value));
    }

    pub fn define_host(&self, name: impl Into<String>, f: impl Fn(&[Sx]) -> Result<Sx, HqlError> + 'static) {
        self.data
            .borrow_mut()
            .bindings
            .insert(name.into(), Binding::Host(Rc::new(f)));
    }

    /// `lookup(name)`: walks frames root-ward; supports dotted
    /// `module.prop` notation by splitting at the first dot and descending
    /// via property access on the looked-up head.
    pub fn lookup(&self, name: &str) -> Result<Binding, HqlError> {
        if let Some(dot) = name.find('.') {
            let (head, rest) = (&name[..dot], &name[dot + 1..]);
            if let Some(exports) = self.data.borrow().imported_modules.get(head) {
                return exports
                    .get(rest)
                    .cloned()
                    .ok_or_else(|| symbol_not_found(name));
            }
            if let Some(parent) = &self.parent {
                return parent.lookup(name);
            }
            return Err(symbol_not_found(name));
        }

        if let Some(binding) = self.data.borrow().bindings.get(name) {
            return Ok(binding.clone());
        }
        match &self.parent {
            Some(parent) => parent.lookup(name),
            None => Err(symbol_not_found(name)),
        }
    }

    pub fn has(&self, name: &str) -> bool {
        self.lookup(name).is_ok()
    }

    // -- Global macros (always stored on the root frame) --------------------

    pub fn define_macro(&self, name: impl Into<String>, mut fn_: MacroFn) {
        let name = name.into();
        fn_.name = name.clone();
        self.root_frame().data.borrow_mut().macros.insert(name, fn_);
    }

    pub fn has_macro(&self, name: &str) -> bool {
        self.root_frame().data.borrow().macros.contains_key(name)
    }

    pub fn get_macro(&self, name: &str) -> Option<MacroFn> {
        self.root_frame().data.borrow().macros.get(name).cloned()
    }

    // -- Module-scoped macros (root frame only) ----------------------------

    pub fn define_module_macro(&self, file: &Path, name: impl Into<String>, mut fn_: MacroFn) {
        let name = name.into();
        fn_.name = name.clone();
        fn_.source_file = Some(file.to_path_buf());
        self.root_frame()
            .data
            .borrow_mut()
            .module_macros
            .entry(file.to_path_buf())
            .or_default()
            .insert(name, fn_);
    }

    pub fn has_module_macro(&self, file: &Path, name: &str) -> bool {
        self.root_frame()
            .data
            .borrow()
            .module_macros
            .get(file)
            .is_some_and(|m| m.contains_key(name))
    }

    pub fn get_module_macro(&self, file: &Path, name: &str) -> Option<MacroFn> {
        self.root_frame()
            .data
            .borrow()
            .module_macros
            .get(file)
            .and_then(|m| m.get(name))
            .cloned()
    }

    /// `isUserLevelMacro(name, file)`: true iff `moduleMacros[file]` has
    /// `name`.
    pub fn is_user_level_macro(&self, name: &str, file: &Path) -> bool {
        self.has_module_macro(file, name)
    }

    /// `exportMacro(file, name)`: fails silently if the named macro is not
    /// defined in that file.
    pub fn export_macro(&self, file: &Path, name: &str) {
        if self.has_module_macro(file, name) {
            self.root_frame()
                .data
                .borrow_mut()
                .exported_macros
                .entry(file.to_path_buf())
                .or_default()
                .insert(name.to_string());
        }
    }

    pub fn is_macro_exported(&self, file: &Path, name: &str) -> bool {
        self.root_frame()
            .data
            .borrow()
            .exported_macros
            .get(file)
            .is_some_and(|set| set.contains(name))
    }

    /// `importMacro(srcFile, name, dstFile, alias?) -> bool`: succeeds iff
    /// `name` is in `exportedMacros[srcFile]`.
    pub fn import_macro(&self, src_file: &Path, name: &str, dst_file: &Path, alias: Option<&str>) -> bool {
        if !self.is_macro_exported(src_file, name) {
            return false;
        }
        let Some(fn_) = self.get_module_macro(src_file, name) else {
            return false;
        };
        let dest_name = alias.unwrap_or(name).to_string();
        self.root_frame()
            .data
            .borrow_mut()
            .module_macros
            .entry(dst_file.to_path_buf())
            .or_default()
            .insert(dest_name, fn_);
        true
    }

    // -- Module value exports ----------------------------------------------

    pub fn define_export(&self, file: &Path, name: impl Into<String>, value: Binding) {
        self.root_frame()
            .data
            .borrow_mut()
            .module_exports
            .entry(file.to_path_buf())
            .or_default()
            .insert(name.into(), value);
    }

    pub fn get_export(&self, file: &Path, name: &str) -> Option<Binding> {
        self.root_frame()
            .data
            .borrow()
            .module_exports
            .get(file)
            .and_then(|m| m.get(name))
            .cloned()
    }

    pub fn exports_of(&self, file: &Path) -> HashMap<String, Binding> {
        self.root_frame()
            .data
            .borrow()
            .module_exports
            .get(file)
            .cloned()
            .unwrap_or_default()
    }

    /// `importModule(name, exports)`: registers `name.x` resolution against
    /// `exports["x"]`.
    pub fn import_module(&self, name: impl Into<String>, exports: HashMap<String, Binding>) {
        self.data
            .borrow_mut()
            .imported_modules
            .insert(name.into(), exports);
    }

    // -- Scoped current-file / current-macro-context -----------------------

    /// `setCurrentFile(path)`: returns a scoped token; on release, the
    /// previous file is restored on every exit path. Implemented as an
    /// RAII guard (`Drop`) rather than manual try/finally.
    pub fn set_current_file(&self, path: PathBuf) -> CurrentFileGuard {
        let root = self.root_frame();
        let previous = root.data.borrow_mut().current_file.replace(path);
        CurrentFileGuard { root, previous }
    }

    pub fn current_file(&self) -> Option<PathBuf> {
        self.root_frame().data.borrow().current_file.clone()
    }

    pub fn set_current_macro_context(&self, id: String) -> CurrentMacroContextGuard {
        let root = self.root_frame();
        let previous = root.data.borrow_mut().current_macro_context.replace(id);
        CurrentMacroContextGuard { root, previous }
    }

    pub fn current_macro_context(&self) -> Option<String> {
        self.root_frame().data.borrow().current_macro_context.clone()
    }
}

fn symbol_not_found(name: &str) -> HqlError {
    HqlError::new(
        ErrorKind::SymbolNotFound { symbol: name.to_string() },
        SourceInfo::unspanned("environment"),
    )
}

/// Also usable by the Module Loader to surface a not-exported failure
/// distinct from a plain lookup miss.
pub fn symbol_not_exported(symbol: &str, module: &Path) -> HqlError {
    HqlError::new(
        ErrorKind::Import(ImportErrorKind::SymbolNotExported {
            symbol: symbol.to_string(),
            module: module.display().to_string(),
        }),
        SourceInfo::unspanned("environment"),
    )
}

/// Restores the previous `currentFile` when dropped, on every exit path
/// including early returns via `?`.
pub struct CurrentFileGuard {
    root: Frame,
    previous: Option<PathBuf>,
}

impl Drop for CurrentFileGuard {
    fn drop(&mut self) {
        self.root.data.borrow_mut().current_file = self.previous.take();
    }
}

pub struct CurrentMacroContextGuard {
    root: Frame,
    previous: Option<String>,
}

impl Drop for CurrentMacroContextGuard {
    fn drop(&mut self) {
        self.root.data.borrow_mut().current_macro_context = self.previous.take();
    }
}
