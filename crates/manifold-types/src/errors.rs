//! Error types for Manifold operations.

use thiserror::Error;

/// The main error type for Manifold operations.
///
/// Every stage of the pipeline returns this type. Callers that need to know
/// the underlying category after context has been attached should match on
/// [`ManifoldError::root`].
#[derive(Error, Debug)]
pub enum ManifoldError {
    /// No generator is registered for the requested type identifier
    #[error("generator for {0} not found")]
    UnknownGeneratorType(String),

    /// A generator manifest could not be decoded into its typed spec
    #[error("invalid generator spec: {0}")]
    InvalidSpec(String),

    /// Two objects share the same identity key
    #[error("object {0} already exists")]
    DuplicateObject(String),

    /// A raw document stream could not be decoded
    #[error("decode error: {0}")]
    Decode(String),

    /// Secret decryption or parsing failed
    #[error("secret error: {0}")]
    Secret(String),

    /// Fetching an external resource (network or cache) failed
    #[error("fetch error: {0}")]
    Fetch(String),

    /// The kind filter is not a valid regular expression
    #[error("invalid kind filter: {0}")]
    FilterCompile(String),

    /// An object could not be serialized or written out
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Configuration-related error
    #[error("configuration error: {0}")]
    Config(String),

    /// The configuration source could not be evaluated
    #[error("evaluation error: {0}")]
    Evaluation(String),

    /// An external tool exited unsuccessfully or could not be started
    #[error("{tool} failed: {message}")]
    Tool {
        /// Tool binary name
        tool: String,
        /// Captured diagnostic output
        message: String,
    },

    /// I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// An error annotated with the step or input element it came from
    #[error("{context}: {cause}")]
    Context {
        /// Description of where the error happened
        context: String,
        /// The wrapped error
        cause: Box<ManifoldError>,
    },

    /// Internal bug - should never happen in production
    #[error("Bug detected: {0}\n\nThis is an internal error. Please report this issue at:\nhttps://github.com/manifold-dev/manifold/issues")]
    Bug(String),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl ManifoldError {
    /// Wrap this error with a description of where it happened.
    pub fn context(self, context: impl Into<String>) -> Self {
        ManifoldError::Context {
            context: context.into(),
            cause: Box::new(self),
        }
    }

    /// The innermost error, with all context layers peeled off.
    pub fn root(&self) -> &ManifoldError {
        let mut current = self;
        while let ManifoldError::Context { cause, .. } = current {
            current = cause;
        }
        current
    }
}

/// A specialized Result type for Manifold operations.
pub type Result<T> = std::result::Result<T, ManifoldError>;

/// Attach context to any result whose error converts into [`ManifoldError`].
pub trait ResultExt<T> {
    /// Wrap the error with a fixed context message.
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Wrap the error with a lazily built context message.
    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        C: Into<String>,
        F: FnOnce() -> C;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Into<ManifoldError>,
{
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.into().context(context))
    }

    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        C: Into<String>,
        F: FnOnce() -> C,
    {
        self.map_err(|e| e.into().context(f()))
    }
}

/// Helper macro to create and return a ManifoldError::Bug
///
/// This should be used for conditions that should never occur
/// in normal operation and indicate a bug in Manifold itself.
#[macro_export]
macro_rules! bug {
    ($msg:expr) => {
        return Err($crate::ManifoldError::Bug($msg.to_string()))
    };
    ($fmt:expr, $($arg:tt)*) => {
        return Err($crate::ManifoldError::Bug(format!($fmt, $($arg)*)))
    };
}

/// Helper macro to bail out with a ManifoldError
///
/// # Example
///
/// ```ignore
/// if !valid {
///     bail!(Config, "invalid cache dir: {}", reason);
/// }
/// ```
#[macro_export]
macro_rules! bail {
    ($variant:ident, $msg:expr) => {
        return Err($crate::ManifoldError::$variant($msg.to_string()))
    };
    ($variant:ident, $fmt:expr, $($arg:tt)*) => {
        return Err($crate::ManifoldError::$variant(format!($fmt, $($arg)*)))
    };
    ($msg:expr) => {
        return Err($crate::ManifoldError::Other($msg.to_string()))
    };
    ($fmt:expr, $($arg:tt)*) => {
        return Err($crate::ManifoldError::Other(format!($fmt, $($arg)*)))
    };
}
