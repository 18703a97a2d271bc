//! Remote module resolution. Loading external JS packages beyond recording
//! their identifier is out of scope for this crate.
//!
//! `RemoteSource` is a trait so host tooling can supply real fetching; the
//! default implementation never performs network I/O and simply records
//! the normalized identifier as an opaque external module.

use crate::module::record::ModuleRecord;

/// Resolves one remote identifier (an `npm:`, `jsr:`, `http:`, or `https:`
/// URI) to a module record, or a list of failure reasons if every attempt
/// (direct + each CDN root) failed.
pub trait RemoteSource: Send + Sync {
    fn resolve(&self, identifier: &str, cdn_roots: &[String]) -> Result<ModuleRecord, Vec<String>>;
}

/// Records the identifier without touching the network. This satisfies
/// the "attempt direct import, then fall back through a configurable list
/// of CDN roots" control-flow contract as a no-op — direct "succeeds"
/// trivially — while leaving the actual fetch to a `RemoteSource`
/// supplied by tooling that does have network access.
#[derive(Debug, Default, Clone, Copy)]
pub struct RecordingRemoteSource;

impl RemoteSource for RecordingRemoteSource {
    fn resolve(&self, identifier: &str, _cdn_roots: &[String]) -> Result<ModuleRecord, Vec<String>> {
        Ok(ModuleRecord::External {
            identifier: normalize(identifier),
        })
    }
}

fn normalize(identifier: &str) -> String {
    identifier.trim().to_string()
}

/// A test double that always fails, with a reason per attempted root —
/// used to exercise the concatenated-reason-list aggregation behavior of a
/// fully exhausted fallback chain.
#[derive(Debug, Default, Clone)]
pub struct AlwaysFailingRemoteSource;

impl RemoteSource for AlwaysFailingRemoteSource {
    fn resolve(&self, identifier: &str, cdn_roots: &[String]) -> Result<ModuleRecord, Vec<String>> {
        let mut reasons = vec![format!("direct fetch of '{identifier}' failed")];
        reasons.extend(
            cdn_roots
                .iter()
                .map(|root| format!("fetch via '{root}' failed")),
        );
        Err(reasons)
    }
}
