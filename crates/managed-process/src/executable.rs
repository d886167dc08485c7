//! Executable definitions

/// A concrete executable: its program identifier and how domain arguments
/// become the literal command line.
///
/// # Examples
/// ```
/// use managed_process::Executable;
///
/// struct Compress;
///
/// impl Executable for Compress {
///     type Args = (u8, String);
///
///     fn program(&self) -> &str {
///         "gzip"
///     }
///
///     fn arguments(&self, (level, file): Self::Args) -> Vec<String> {
///         vec![format!("-{}", level), "-c".to_string(), file]
///     }
/// }
///
/// assert_eq!(Compress.arguments((9, "a.txt".into())), ["-9", "-c", "a.txt"]);
/// ```
pub trait Executable {
    /// Domain arguments accepted by `ManagedProcess::spawn`
    type Args;

    /// Executable name or path
    fn program(&self) -> &str;

    /// Map domain arguments to the argument list passed to the OS
    fn arguments(&self, args: Self::Args) -> Vec<String>;
}

/// Executable whose domain arguments already are the literal argument list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
    program: String,
}

impl Program {
    /// Create a program from its name or path
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Executable for Program {
    type Args = Vec<String>;

    fn program(&self) -> &str {
        &self.program
    }

    fn arguments(&self, args: Self::Args) -> Vec<String> {
        args
    }
}
