//! Import path classification and resolution order.

use std::path::{Path, PathBuf};

use crate::error::{ErrorKind, HqlError, ImportErrorKind, SourceInfo};

/// The classification of an import path, in the order each shape must be
/// tried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedImport {
    Npm(String),
    Remote(String),
    LocalHql(PathBuf),
    LocalJs(PathBuf),
}

/// Classifies `raw_path`, resolving local paths relative to `importer_dir`.
/// Step order: `npm:` → `jsr:`/`http:`/`https:` → `.hql` → `.js` family →
/// `UnsupportedFileType`.
pub fn classify(raw_path: &str, importer_dir: &Path) -> Result<ResolvedImport, HqlError> {
    if let Some(pkg) = raw_path.strip_prefix("npm:") {
        return Ok(ResolvedImport::Npm(pkg.to_string()));
    }
    if raw_path.starts_with("jsr:") || raw_path.starts_with("http:") || raw_path.starts_with("https:") {
        return Ok(ResolvedImport::Remote(raw_path.to_string()));
    }
    if raw_path.ends_with(".hql") {
        return Ok(ResolvedImport::LocalHql(importer_dir.join(raw_path)));
    }
    if raw_path.ends_with(".js") || raw_path.ends_with(".mjs") || raw_path.ends_with(".cjs") {
        return Ok(ResolvedImport::LocalJs(importer_dir.join(raw_path)));
    }
    Err(HqlError::new(
        ErrorKind::Import(ImportErrorKind::UnsupportedFileType {
            path: raw_path.to_string(),
        }),
        SourceInfo::unspanned("module_loader"),
    ))
}
