use thiserror::Error;

/// Errors produced while parsing or validating a command line.
///
/// All of these are terminal for the triggering request: the caller reports
/// the message to the user and aborts, never retries.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    /// The raw text could not be tokenized (unbalanced quote etc).
    #[error("malformed command: {0}")]
    BadQuoting(String),

    /// A flag was present that no registered definition covers.
    #[error("unknown flag: [{0}]")]
    UnknownFlag(String),

    /// An argument was supplied to a flag that takes none.
    #[error("flag [{0}] does not accept an argument")]
    NoArgAllowed(String),

    /// More than one argument reached a single-argument flag; directly or
    /// through alias merging.
    #[error("flag [{0}] accepts exactly one argument")]
    SingleArgOnly(String),

    /// Two flags sharing a mutual-exclusion group were both present.
    #[error("flag [{a}] is mutually exclusive with flag [{b}] (group [{group}])")]
    MutuallyExclusive {
        a: String,
        b: String,
        group: String,
    },
}

pub type Result<T> = std::result::Result<T, CommandError>;
