//! Status values for link-level operations.

/// Why a link-level operation could not run.
///
/// Returned by the non-allocating API (`link`, `link_or_replace`) and by the
/// heap's key-update family. Nothing has been mutated when one of these comes
/// back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum LinkError {
    /// The key does not name an occupied storage slot.
    #[error("key does not refer to a stored node")]
    InvalidKey,
    /// The node is in storage but not linked into this structure.
    #[error("node is not linked")]
    NotLinked,
    /// The node is already linked.
    #[error("node is already linked")]
    AlreadyLinked,
    /// A node with an equal key is already linked.
    #[error("an equal key is already linked")]
    Occupied,
}
