use core::fmt;

/// Result alias for `coterie`.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by graph building, partitioning and the clustering pipeline.
///
/// Every variant is a caller-contract violation. Running out of resolver
/// levers is a normal outcome and never surfaces here.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Input was empty.
    EmptyInput,

    /// An id was referenced that has no gene set.
    UnknownId {
        /// The offending id.
        id: String,
    },

    /// An ontology-typed id reached the eligibility lever without stats.
    MissingOntologyStats {
        /// The offending id.
        id: String,
    },

    /// The same term id was supplied more than once.
    DuplicateId {
        /// The duplicated id.
        id: String,
    },

    /// Invalid parameter value.
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// Error message.
        message: &'static str,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::EmptyInput => write!(f, "empty input provided"),
            Error::UnknownId { id } => write!(f, "no gene set for id '{id}'"),
            Error::MissingOntologyStats { id } => {
                write!(f, "ontology-typed id '{id}' has no descendant/level stats")
            }
            Error::DuplicateId { id } => write!(f, "duplicate term id '{id}'"),
            Error::InvalidParameter { name, message } => {
                write!(f, "invalid parameter '{name}': {message}")
            }
        }
    }
}

impl std::error::Error for Error {}
