// We want a few things here:
// 1. A way to create a new error with a backtrace
// 2. A way to centralize setting a breakpoint to trap any error in the system fairly soon
//    after it's created (or at least when it's propagated from a library we use back to us)
// 3. Same but for logging / emitting error messages into the tracing/logging system
// 4. A coarse kind that callers can match on, since "vector not found" and
//    "task was cancelled" call for different reactions

use backtrace_error::DynBacktraceError;
use std::borrow::Cow;
use tracing::error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ErrorKind {
    /// Numeric and string appends mixed, or chunk types disagree.
    SchemaMismatch,
    /// Categorical value outside a frozen domain.
    Domain,
    /// Task inputs whose chunk row ranges do not match 1:1.
    Alignment,
    /// Row or chunk index beyond the end of a vector.
    OutOfRange,
    /// User map or reduce failed (or panicked).
    TaskFailed,
    Cancelled,
    NotFound,
    AlreadyPublished,
    /// Vector is pinned by a running task.
    InUse,
    /// Task submitted over inputs with no chunks.
    EmptyInput,
    /// Malformed bytes, or a vector built from abandoned buffers.
    Corrupt,
    /// Invalid configuration value.
    Config,
    /// Anything absorbed from a library via `?`.
    External,
}

pub struct Error {
    kind: ErrorKind,
    msg: String,
    inner: DynBacktraceError,
}
pub type Result<T> = std::result::Result<T, Error>;

struct SimpleErr(Cow<'static, str>);
impl std::fmt::Debug for SimpleErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
impl std::fmt::Display for SimpleErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
impl std::error::Error for SimpleErr {}

impl<E: std::error::Error + Send + Sync + 'static> From<E> for Error {
    fn from(err: E) -> Error {
        Error::new(ErrorKind::External, err)
    }
}

impl Error {
    pub fn new<E: std::error::Error + Send + Sync + 'static>(kind: ErrorKind, err: E) -> Error {
        error!(target: "strata", "{:?}: {:?}", kind, err);
        let msg = err.to_string();
        let inner = DynBacktraceError::from(err);
        Error { kind, msg, inner }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.msg
    }

    /// Re-labels an error, keeping its message and backtrace. A failed
    /// `map` or `reduce` surfaces this way as a task failure.
    pub fn with_kind(self, kind: ErrorKind) -> Error {
        Error { kind, ..self }
    }
}

impl std::fmt::Debug for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {:?}", self.kind, self.inner)
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.msg)
    }
}

pub fn err(kind: ErrorKind, msg: impl Into<Cow<'static, str>>) -> Error {
    let err = SimpleErr(msg.into());
    Error::new(kind, err)
}
