use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse binary: {0}")]
    ObjectParse(#[from] object::read::Error),

    #[error("No debug information found. Compile with -g flag to include DWARF debug info.")]
    NoDebugInfo,

    #[error("Unsupported binary format. Only ELF, Mach-O and PE binaries are supported.")]
    UnsupportedFormat,

    #[error("DWARF parsing error: {0}")]
    Dwarf(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Bad index, type mismatch, unknown member, ambiguous overload, wrong arity.
    #[error("{0}")]
    Eval(String),

    /// Malformed compiler encodings after the caller committed to an interpretation.
    #[error("Malformed debug information: {0}")]
    DebugInfo(String),

    #[error("Cannot access memory at address {address:#x} ({length} bytes): {reason}")]
    Target { address: u64, length: usize, reason: String },

    #[error("Cannot access register {regnum}: {reason}")]
    Register { regnum: u32, reason: String },

    /// The engine itself is inconsistent; never caused by user input alone.
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Evaluation cancelled")]
    Cancelled,
}

impl Error {
    pub fn eval(msg: impl Into<String>) -> Self {
        Error::Eval(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Error::Internal(msg.into())
    }

    pub fn is_internal(&self) -> bool {
        matches!(self, Error::Internal(_))
    }

    pub fn is_target(&self) -> bool {
        matches!(self, Error::Target { .. } | Error::Register { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Early-return an [`Error::Eval`] built from a format string.
macro_rules! eval_bail {
    ($($arg:tt)*) => {
        return Err($crate::error::Error::Eval(format!($($arg)*)))
    };
}

pub(crate) use eval_bail;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn internal_errors_are_distinguished() {
        assert!(Error::internal("oversized").is_internal());
        assert!(!Error::eval("bad index").is_internal());
    }

    #[test]
    fn target_error_message_names_address() {
        let e = Error::Target { address: 0x1000, length: 4, reason: "unmapped".into() };
        assert!(e.is_target());
        assert_eq!(e.to_string(), "Cannot access memory at address 0x1000 (4 bytes): unmapped");
    }
}
