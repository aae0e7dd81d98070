use thiserror::Error;

use crate::runtime::VmError;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// The variants fall into three groups: failures of the patch pipeline itself (the ones a
/// caller of [`crate::PatchEngine`] usually matches on), failures of the class image toolkit
/// that the pipeline wraps, and failures of the reference runtime.
///
/// # Error Categories
///
/// ## Patch Pipeline Errors
/// - [`Error::TargetNotFound`] - The patch target is not known to the type pool
/// - [`Error::MethodNotFound`] - No method matches the patch's method description
/// - [`Error::Transform`] - The caller's transformation failed
/// - [`Error::Definition`] - Finalizing the edited type into bytecode or a class failed
/// - [`Error::LiveClassNotFound`] - The target is not currently loaded in the runtime
/// - [`Error::Attach`] - The live-redefinition capability could not be obtained
/// - [`Error::Redefinition`] - The runtime rejected a live bytecode swap
///
/// ## Class Image Errors
/// - [`Error::Malformed`] - Corrupted or invalid class image or descriptor
/// - [`Error::OutOfBounds`] - Attempted to read beyond the input
/// - [`Error::Verification`] - A method body failed structural verification
/// - [`Error::Frozen`] - Structural edit attempted on a frozen type
///
/// ## Type Pool Errors
/// - [`Error::TypeNotFound`] - No classpath source provides the requested type
/// - [`Error::NoSuchMethod`] - A method lookup on a type found nothing
/// - [`Error::AmbiguousMethod`] - A lookup by parameter list matched several overloads
/// - [`Error::DuplicateMember`] - A field or method with the same identity already exists
///
/// # Examples
///
/// ```rust,no_run
/// use typepatch::prelude::*;
///
/// # fn example(engine: &PatchEngine, patch: &PatchSpec) {
/// match engine.get_bytecode(patch) {
///     Ok(bytes) => println!("patched image: {} bytes", bytes.len()),
///     Err(Error::TargetNotFound(name)) => eprintln!("no such type: {name}"),
///     Err(Error::MethodNotFound { method, source, .. }) => {
///         eprintln!("cannot resolve {method}: {source}");
///     }
///     Err(e) => eprintln!("patch failed: {e}"),
/// }
/// # }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    // Input parsing errors
    /// The input is damaged and could not be parsed.
    ///
    /// This error indicates that a class image or a descriptor string does not conform to
    /// the expected format. The error includes the source location where the malformation
    /// was detected for debugging purposes.
    ///
    /// # Fields
    ///
    /// * `message` - Detailed description of what was malformed
    /// * `file` - Source file where the error was detected
    /// * `line` - Source line where the error was detected
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// An out of bound access was attempted while parsing the input.
    #[error("Out of Bound read would have occurred!")]
    OutOfBounds,

    /// Provided input was empty.
    #[error("Provided input was empty")]
    Empty,

    /// File I/O error.
    ///
    /// Wraps standard I/O errors that can occur while reading class images from a
    /// directory classpath.
    #[error("{0}")]
    FileError(#[from] std::io::Error),

    /// Generic error for miscellaneous failures.
    ///
    /// Used for errors that don't fit into other categories, most commonly raised by
    /// transformation callbacks to abort a patch with a message.
    #[error("{0}")]
    Error(String),

    /// Failed to lock target.
    ///
    /// This error occurs when a lock guarding a mutable type or a loaded class was
    /// poisoned by a panicking thread.
    #[error("Failed to lock target")]
    LockError,

    /// Recursion limit reached.
    ///
    /// Nested array descriptors are limited in depth; the associated value shows the
    /// limit that was reached.
    #[error("Reach the maximum recursion level allowed - {0}")]
    RecursionLimit(usize),

    // Type pool and toolkit errors
    /// No classpath source provides a type with this qualified name.
    #[error("Type not found in pool - {0}")]
    TypeNotFound(String),

    /// A method lookup on a type found no match.
    #[error("No method {name}{descriptor} in {class}")]
    NoSuchMethod {
        /// Qualified name of the type that was searched
        class: String,
        /// Method name that was looked up
        name: String,
        /// Descriptor (or parameter list) that was looked up
        descriptor: String,
    },

    /// More than one declared method matches a lookup by name and parameter list.
    ///
    /// Overloads that differ only in their return type need a descriptor to be told apart.
    #[error("Method {name}{params} of {class} is not unique, candidates: {candidates:?}")]
    AmbiguousMethod {
        /// Qualified name of the type that was searched
        class: String,
        /// Method name that was looked up
        name: String,
        /// Parameter list that was looked up
        params: String,
        /// Descriptors of every matching method
        candidates: Vec<String>,
    },

    /// A field or method with the same identity is already declared.
    #[error("Duplicate member {member} in {class}")]
    DuplicateMember {
        /// Qualified name of the type
        class: String,
        /// Name and descriptor of the conflicting member
        member: String,
    },

    /// A structural edit was attempted on a frozen type.
    ///
    /// Types are frozen once they have been finalized into bytecode; they must be thawed
    /// again before further edits.
    #[error("{0} is frozen")]
    Frozen(String),

    /// Structural verification of a class image failed.
    #[error("Verification failed for {class}.{method}: {message}")]
    Verification {
        /// Qualified name of the class
        class: String,
        /// Name and descriptor of the offending method (empty for class level problems)
        method: String,
        /// What the verifier found
        message: String,
    },

    /// A patch description could not be built.
    #[error("Invalid patch - {0}")]
    InvalidPatch(String),

    // Patch pipeline errors
    /// The patch target is absent from the type pool and its classpath.
    #[error("Cannot find {0} class")]
    TargetNotFound(String),

    /// No method of the target matches the patch's method name and parameter description.
    ///
    /// The underlying lookup failure is preserved as the error source.
    #[error("Cannot resolve method {method} of {target}")]
    MethodNotFound {
        /// Qualified name of the patch target
        target: String,
        /// Method name from the patch
        method: String,
        /// The lookup failure
        #[source]
        source: Box<Error>,
    },

    /// The caller's transformation failed.
    #[error("Transformation of {target} failed")]
    Transform {
        /// Qualified name of the patch target
        target: String,
        /// The error raised by the transformation
        #[source]
        source: Box<Error>,
    },

    /// Finalizing an edited type into bytecode or into a loaded class failed.
    #[error("Cannot define patched {target}")]
    Definition {
        /// Qualified name of the patch target
        target: String,
        /// The verification, encoding or definition failure
        #[source]
        source: Box<Error>,
    },

    /// The patch target is not currently loaded in the running process.
    #[error("{0} is not loaded in the running process")]
    LiveClassNotFound(String),

    /// The live-redefinition capability could not be obtained.
    #[error("Cannot attach to the running process")]
    Attach(#[source] Box<Error>),

    /// The runtime rejected a live redefinition.
    #[error("Live redefinition rejected")]
    Redefinition(#[source] Box<Error>),

    /// Failure reported by the reference runtime.
    #[error(transparent)]
    Vm(#[from] VmError),
}
