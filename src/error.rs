//! Unified error type for every pipeline stage.
//!
//! One struct, `HqlError`, carries a semantic `ErrorKind`, a `SourceInfo`
//! (where it happened), and a `DiagnosticInfo` (how to help). `err_msg!`/
//! `err_ctx!` remove the boilerplate of wiring those three pieces together
//! at each call site.

use std::fmt;
use std::sync::Arc;

use miette::{Diagnostic, LabeledSpan, NamedSource, SourceSpan};

use crate::span::Span;

/// The four error categories, each carrying the payload needed to render
/// a useful message. No type names beyond these — the variants are the
/// semantic categories themselves.
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorKind {
    Parse(ParseErrorKind),
    Import(ImportErrorKind),
    Macro(MacroErrorKind),
    SymbolNotFound { symbol: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParseErrorKind {
    UnexpectedChar { found: char },
    UnexpectedClose,
    UnclosedList,
    UnclosedVector,
    UnclosedMap,
    UnclosedSet,
    ExpectedColonInMap,
    UnexpectedEof,
    ExpectedPropertyAfterDot,
    /// A plain symbol whose tail looks like a gensym suffix
    /// (`_<base36>`), reserved for hygiene.
    ReservedGensymName { name: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum ImportErrorKind {
    FileNotFound { path: String },
    CyclicResolutionFailure { path: String },
    UnsupportedFileType { path: String },
    FetchFailure { identifier: String, reasons: Vec<String> },
    SymbolNotExported { symbol: String, module: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum MacroErrorKind {
    BadParameterList { detail: String },
    MissingBody { name: String },
    SymbolCollision { name: String },
    MacroRecursion,
    MacroDepth,
    MacroSyntax { detail: String },
}

impl ErrorKind {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ErrorKind::Parse(_) => ErrorCategory::Parse,
            ErrorKind::Import(_) => ErrorCategory::Import,
            ErrorKind::Macro(_) => ErrorCategory::Macro,
            ErrorKind::SymbolNotFound { .. } => ErrorCategory::SymbolNotFound,
        }
    }

    pub const fn code_suffix(&self) -> &'static str {
        match self {
            ErrorKind::Parse(k) => match k {
                ParseErrorKind::UnexpectedChar { .. } => "unexpected_char",
                ParseErrorKind::UnexpectedClose => "unexpected_close",
                ParseErrorKind::UnclosedList => "unclosed_list",
                ParseErrorKind::UnclosedVector => "unclosed_vector",
                ParseErrorKind::UnclosedMap => "unclosed_map",
                ParseErrorKind::UnclosedSet => "unclosed_set",
                ParseErrorKind::ExpectedColonInMap => "expected_colon_in_map",
                ParseErrorKind::UnexpectedEof => "unexpected_eof",
                ParseErrorKind::ExpectedPropertyAfterDot => "expected_property_after_dot",
                ParseErrorKind::ReservedGensymName { .. } => "reserved_gensym_name",
            },
            ErrorKind::Import(k) => match k {
                ImportErrorKind::FileNotFound { .. } => "file_not_found",
                ImportErrorKind::CyclicResolutionFailure { .. } => "cyclic_resolution_failure",
                ImportErrorKind::UnsupportedFileType { .. } => "unsupported_file_type",
                ImportErrorKind::FetchFailure { .. } => "fetch_failure",
                ImportErrorKind::SymbolNotExported { .. } => "symbol_not_exported",
            },
            ErrorKind::Macro(k) => match k {
                MacroErrorKind::BadParameterList { .. } => "bad_parameter_list",
                MacroErrorKind::MissingBody { .. } => "missing_body",
                MacroErrorKind::SymbolCollision { .. } => "symbol_collision",
                MacroErrorKind::MacroRecursion => "macro_recursion",
                MacroErrorKind::MacroDepth => "macro_depth",
                MacroErrorKind::MacroSyntax { .. } => "macro_syntax",
            },
            ErrorKind::SymbolNotFound { .. } => "symbol_not_found",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Parse,
    Import,
    Macro,
    SymbolNotFound,
}

/// Context-specific source information: which file, which span, which phase
/// of the pipeline raised it.
#[derive(Debug, Clone)]
pub struct SourceInfo {
    pub source: Arc<NamedSource<String>>,
    pub primary_span: SourceSpan,
    pub phase: String,
}

impl SourceInfo {
    pub fn new(
        name: impl Into<String>,
        content: impl Into<String>,
        span: Span,
        phase: impl Into<String>,
    ) -> Self {
        Self {
            source: Arc::new(NamedSource::new(name.into(), content.into())),
            primary_span: span.into(),
            phase: phase.into(),
        }
    }

    pub fn unspanned(phase: impl Into<String>) -> Self {
        Self {
            source: Arc::new(NamedSource::new("<unknown>", String::new())),
            primary_span: SourceSpan::from((0, 0)),
            phase: phase.into(),
        }
    }
}

/// Help text and a stable machine-parseable error code.
#[derive(Debug, Clone, Default)]
pub struct DiagnosticInfo {
    pub help: Option<String>,
    pub error_code: String,
    /// Files between the root compilation unit and the one that actually
    /// raised, innermost first. Populated by the Module Loader as it
    /// unwinds past each file it was processing.
    pub import_chain: Vec<String>,
}

/// The single error type shared by the reader, environment, module loader,
/// and expander.
#[derive(Debug, Clone)]
pub struct HqlError {
    pub kind: ErrorKind,
    pub source_info: SourceInfo,
    pub diagnostic_info: DiagnosticInfo,
}

impl HqlError {
    pub fn new(kind: ErrorKind, source_info: SourceInfo) -> Self {
        let error_code = format!("hql::{}::{}", source_info.phase, kind.code_suffix());
        Self {
            kind,
            source_info,
            diagnostic_info: DiagnosticInfo {
                help: None,
                error_code,
                import_chain: Vec::new(),
            },
        }
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.diagnostic_info.help = Some(help.into());
        self
    }

    /// Wraps the error with one more link in the import chain, called by
    /// the Module Loader as a per-import failure unwinds past the
    /// containing file.
    pub fn push_import_frame(mut self, file: impl Into<String>) -> Self {
        self.diagnostic_info.import_chain.push(file.into());
        self
    }

    /// Renders the diagnostic as a caret-annotated, human-readable report —
    /// the one operation every raising component funnels through.
    pub fn render(&self) -> String {
        let report = miette::Report::new(self.clone());
        let mut out = format!("{report:?}");
        if !self.diagnostic_info.import_chain.is_empty() {
            out.push_str("\nimport chain:\n");
            for (depth, file) in self.diagnostic_info.import_chain.iter().enumerate() {
                out.push_str(&"  ".repeat(depth + 1));
                out.push_str("-> ");
                out.push_str(file);
                out.push('\n');
            }
        }
        out
    }

    fn primary_label(&self) -> String {
        match &self.kind {
            ErrorKind::Parse(_) => "here".into(),
            ErrorKind::Import(_) => "while resolving this import".into(),
            ErrorKind::Macro(_) => "in this macro".into(),
            ErrorKind::SymbolNotFound { .. } => "not found".into(),
        }
    }
}

impl std::error::Error for HqlError {}

impl fmt::Display for HqlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ErrorKind::Parse(k) => write!(f, "parse error: {}", describe_parse(k)),
            ErrorKind::Import(k) => write!(f, "import error: {}", describe_import(k)),
            ErrorKind::Macro(k) => write!(f, "macro error: {}", describe_macro(k)),
            ErrorKind::SymbolNotFound { symbol } => {
                write!(f, "symbol not found: '{}'", symbol)
            }
        }
    }
}

fn describe_parse(kind: &ParseErrorKind) -> String {
    match kind {
        ParseErrorKind::UnexpectedChar { found } => format!("unexpected character '{}'", found),
        ParseErrorKind::UnexpectedClose => "unexpected closing delimiter".into(),
        ParseErrorKind::UnclosedList => "unclosed list".into(),
        ParseErrorKind::UnclosedVector => "unclosed vector".into(),
        ParseErrorKind::UnclosedMap => "unclosed map".into(),
        ParseErrorKind::UnclosedSet => "unclosed set".into(),
        ParseErrorKind::ExpectedColonInMap => "expected ':' in map literal".into(),
        ParseErrorKind::UnexpectedEof => "unexpected end of input".into(),
        ParseErrorKind::ExpectedPropertyAfterDot => "expected a property name after '.'".into(),
        ParseErrorKind::ReservedGensymName { name } => {
            format!(
                "'{}' looks like a hygiene-generated name and cannot be user-written",
                name
            )
        }
    }
}

fn describe_import(kind: &ImportErrorKind) -> String {
    match kind {
        ImportErrorKind::FileNotFound { path } => format!("file not found: '{}'", path),
        ImportErrorKind::CyclicResolutionFailure { path } => {
            format!("could not resolve '{}' (cyclic import)", path)
        }
        ImportErrorKind::UnsupportedFileType { path } => {
            format!("unsupported file type: '{}'", path)
        }
        ImportErrorKind::FetchFailure { identifier, reasons } => {
            format!("failed to fetch '{}': {}", identifier, reasons.join("; "))
        }
        ImportErrorKind::SymbolNotExported { symbol, module } => {
            format!("'{}' is not exported by '{}'", symbol, module)
        }
    }
}

fn describe_macro(kind: &MacroErrorKind) -> String {
    match kind {
        MacroErrorKind::BadParameterList { detail } => format!("bad parameter list: {}", detail),
        MacroErrorKind::MissingBody { name } => format!("macro '{}' has no body", name),
        MacroErrorKind::SymbolCollision { name } => format!("'{}' is already defined", name),
        MacroErrorKind::MacroRecursion => "fixed-point iteration limit exceeded".into(),
        MacroErrorKind::MacroDepth => "macro expansion depth limit exceeded".into(),
        MacroErrorKind::MacroSyntax { detail } => format!("macro syntax error: {}", detail),
    }
}

impl Diagnostic for HqlError {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        Some(Box::new(&self.diagnostic_info.error_code))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        self.diagnostic_info
            .help
            .as_ref()
            .map(|h| Box::new(h) as Box<dyn fmt::Display>)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        let labels = vec![LabeledSpan::new_with_span(
            Some(self.primary_label()),
            self.source_info.primary_span,
        )];
        Some(Box::new(labels.into_iter()))
    }

    fn source_code(&self) -> Option<&dyn miette::SourceCode> {
        Some(&*self.source_info.source)
    }
}

/// Builds a `HqlError` without a meaningful source span, for failures that
/// aren't tied to one token (e.g. a fetch failure aggregating several CDN
/// attempts). Use [`err_ctx`] when a span is available.
#[macro_export]
macro_rules! err_msg {
    ($kind:expr, $phase:expr) => {
        $crate::error::HqlError::new($kind, $crate::error::SourceInfo::unspanned($phase))
    };
}

/// Builds a `HqlError` with full source context: file name, file content,
/// and the offending span.
#[macro_export]
macro_rules! err_ctx {
    ($kind:expr, $name:expr, $content:expr, $span:expr, $phase:expr) => {
        $crate::error::HqlError::new(
            $kind,
            $crate::error::SourceInfo::new($name, $content, $span, $phase),
        )
    };
}
