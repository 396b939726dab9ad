use thiserror::Error;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        $crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        $crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

pub(crate) use malformed_error;

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// This enum covers the failure modes of blob parsing, identity handling, context registration
/// and importing. Recoverable *resolution* outcomes are deliberately not represented here:
/// reference-to-definition queries return [`ResolutionError`] so callers can dispatch on the
/// status without unwinding (see the crate-level documentation).
#[derive(Error, Debug)]
pub enum Error {
    /// An out of bound access was attempted while parsing a blob.
    ///
    /// This error occurs when trying to read data beyond the end of a signature or
    /// custom-attribute blob. It's a safety check to prevent buffer overruns during parsing.
    #[error("Out of Bound read would have occurred!")]
    OutOfBounds,

    /// The blob or identity string is damaged and could not be parsed.
    ///
    /// The error includes the source location where the malformation was detected
    /// for debugging purposes.
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// The requested operation or format variant is not supported.
    #[error("This operation is not supported")]
    NotSupported,

    /// File I/O error.
    ///
    /// Wraps standard I/O errors surfaced by the file service during probing
    /// and assembly reads.
    #[error("{0}")]
    FileError(#[from] std::io::Error),

    /// Recursion limit reached.
    ///
    /// To prevent stack overflow during recursive signature parsing or substitution,
    /// a maximum recursion depth is enforced. The associated value shows the limit
    /// that was reached.
    #[error("Reached the maximum recursion level allowed - {0}")]
    RecursionLimit(usize),

    /// Failed to lock target.
    ///
    /// This error occurs when thread synchronization fails, typically when the mutex
    /// guarding the loaded-assembly table was poisoned by a panicking thread.
    #[error("Failed to lock target")]
    LockError,

    /// An assembly with an equivalent identity is already registered in the context.
    ///
    /// Loaded-assembly keys are unique under the version-agnostic comparer; the first
    /// registration wins and later ones fail with this error.
    #[error("An equivalent assembly is already loaded - {0}")]
    DuplicateAssembly(String),

    /// The assembly is already attached to a runtime context.
    ///
    /// A definition enters a context exactly once; attaching it to a second context
    /// (or twice to the same one) is a programmer error.
    #[error("Assembly is already attached to a runtime context - {0}")]
    AssemblyHasContext(String),

    /// The descriptor cannot be imported into the target module.
    ///
    /// Raised for kind mismatches and invalid placeholders; importing is otherwise
    /// infallible reference construction.
    #[error("Cannot import into target module - {0}")]
    ImportInvalid(String),

    /// A resolution query failed.
    ///
    /// Embeds the [`ResolutionError`] status taxonomy for callers that funnel
    /// everything through one error type.
    #[error(transparent)]
    Resolution(#[from] ResolutionError),
}

/// Status taxonomy for reference-to-definition resolution.
///
/// Every resolution entry point returns `Result<T, ResolutionError>`; the `Ok` arm is
/// the *Success* status and each variant below is one recoverable failure status.
/// Collaborator failures never cross a resolution boundary unwrapped - a candidate
/// file that fails to parse becomes [`ResolutionError::AssemblyBadImage`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    /// The reference is syntactically incomplete (missing name or scope) or structurally
    /// impossible (e.g. a generic parameter resolved as a type definition).
    #[error("Invalid reference - {0}")]
    InvalidReference(String),

    /// The scope stack already contains the current scope (type-reference loop,
    /// exported-type loop).
    #[error("Circular resolution scope - {0}")]
    CircularResolutionScope(String),

    /// The assembly resolver returned no candidate file or bytes.
    #[error("Assembly not found - {0}")]
    AssemblyNotFound(String),

    /// A candidate was found but parsing it failed.
    #[error("Assembly candidate could not be parsed - {0}")]
    AssemblyBadImage(String),

    /// A file-entry implementation named a module not present in the declaring assembly.
    #[error("Module not found - {0}")]
    ModuleNotFound(String),

    /// The declaring assembly or module was found but does not contain the named type.
    #[error("Type not found - {0}")]
    TypeNotFound(String),

    /// The declaring type was found but does not contain a member with the requested
    /// name and signature.
    #[error("Member not found - {0}")]
    MemberNotFound(String),
}

/// Result alias for resolution queries; `Ok` carries the resolved definition.
pub type ResolutionResult<T> = std::result::Result<T, ResolutionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_error_captures_location() {
        let err = malformed_error!("bad byte - {}", 0x42);
        match err {
            Error::Malformed { message, file, .. } => {
                assert_eq!(message, "bad byte - 66");
                assert!(file.ends_with("error.rs"));
            }
            _ => panic!("Expected Malformed variant"),
        }
    }

    #[test]
    fn test_resolution_error_embeds_into_error() {
        let resolution = ResolutionError::TypeNotFound("System.Object".to_string());
        let err: Error = resolution.clone().into();
        match err {
            Error::Resolution(inner) => assert_eq!(inner, resolution),
            _ => panic!("Expected Resolution variant"),
        }
    }

    #[test]
    fn test_resolution_error_display() {
        let err = ResolutionError::CircularResolutionScope("A -> B -> A".to_string());
        assert_eq!(err.to_string(), "Circular resolution scope - A -> B -> A");
    }
}
