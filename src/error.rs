//! Fatal build errors.
//!
//! Every variant aborts the current build. They travel inside `anyhow::Error`
//! and can be recovered with `downcast_ref::<BuildError>()`.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BuildError {
    /// A second node module was registered under a name already in use.
    #[error("Can't set node module name `{0}` twice")]
    DuplicateName(String),

    /// The last published version of a package could not be determined.
    #[error("Can't compute the next version of `{name}`: {reason}")]
    VersionLookupFailure { name: String, reason: String },

    /// An import matched a known package but no version could be found for it.
    #[error("Can't get version of `{0}`")]
    MissingVersionForDependency(String),

    /// A source module did not end up with exactly one compiled chunk.
    #[error("Node module `{name}` should have exactly one chunk output, found {count}")]
    UnexpectedOutputShape { name: String, count: usize },

    /// The bundler emitted an entry chunk no source module claims.
    #[error("Entry chunk `{0}` does not belong to any node module")]
    UnknownEntry(String),

    /// A rewritten import points at a module that is not in the node module map.
    #[error("`{0}` should be included in the node module map")]
    UnregisteredModule(String),
}
