//! The shared `Resolver` surface and cooperative cancellation (§5, §6).

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::Result;
use crate::graph::ResolvedGraph;
use crate::ident::VersionKey;
use crate::source::PackageDataSource;

/// A cooperative cancellation flag threaded through every
/// `PackageDataSource` call a resolver makes. Cloning shares the
/// underlying flag; `cancel()` is visible to every clone.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// The public surface every ecosystem resolver implements (§6):
/// `Resolve(ctx, VersionKey) -> (Graph, Error)`. Top-level `Err` is
/// reserved for ecosystem/version-type mismatches, data-source I/O
/// errors, and cancellation; semantic resolution failures (no
/// satisfying version, impossible resolution, too many iterations) are
/// returned in-band on `ResolvedGraph.error` and/or per-node errors.
pub trait Resolver {
    fn resolve(
        &self,
        source: &dyn PackageDataSource,
        root: &VersionKey,
        cancel: &CancellationToken,
    ) -> Result<ResolvedGraph>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancellation_is_visible_across_clones() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }
}
