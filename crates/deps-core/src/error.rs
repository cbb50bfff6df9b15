use thiserror::Error;

/// Core error type shared by the data-source and graph layers.
///
/// Ecosystem resolver crates define their own error enums (`NpmError`,
/// `MavenError`, `PypiError`) and convert `CoreError` into them with
/// `#[from]`; callers of a single resolver never need to match on this
/// type directly.
#[derive(Error, Debug)]
pub enum CoreError {
    /// A `PackageDataSource` lookup found no record for the given key.
    #[error("not found: {0}")]
    NotFound(String),

    /// The underlying data source failed (adapter-specific transport or
    /// storage failure); the core never constructs this variant itself.
    #[error("data source error: {0}")]
    DataSource(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The resolve was cancelled via a `CancellationToken`.
    #[error("resolve cancelled")]
    Cancelled,

    /// A `VersionKey` passed to a resolver did not match its ecosystem.
    #[error("ecosystem mismatch: expected {expected}, got {actual}")]
    EcosystemMismatch {
        expected: &'static str,
        actual: String,
    },

    /// A `VersionKey` passed to `Resolver::resolve` was not `Concrete`.
    #[error("expected a concrete version key, got a requirement: {0}")]
    NotConcrete(String),

    /// Two nodes compared equal during BFS canonicalization (§4.2 step 3).
    #[error("duplicate direct dependency: {0}")]
    DuplicateDirectDependency(String),

    /// A node was never reached by BFS canonicalization.
    #[error("unreached node in graph: index {0}")]
    UnreachedNode(usize),

    /// Malformed schema-fixture text.
    #[error("fixture parse error at line {line}: {message}")]
    FixtureParse { line: usize, message: String },
}

/// Convenience alias for `Result<T, CoreError>`.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Sentinel for "no record found", convertible into any crate's error
/// enum. This is the sole not-found signal crossed by the
/// `PackageDataSource` boundary (§7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotFound;

impl std::fmt::Display for NotFound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "not found")
    }
}

impl std::error::Error for NotFound {}
