use linetrack_core::ServiceError;

use crate::error::DocError;

/// A writable view onto an open transaction.
///
/// Reads observe writes staged earlier in the same transaction. Nothing
/// becomes visible to other callers until the transaction commits.
pub trait DocTxn {
    /// Get a document by collection and id. Returns None if absent.
    fn get(&self, collection: &str, id: &str) -> Result<Option<Vec<u8>>, DocError>;

    /// Stage a document write.
    fn set(&mut self, collection: &str, id: &str, value: &[u8]) -> Result<(), DocError>;

    /// Stage a document deletion.
    fn delete(&mut self, collection: &str, id: &str) -> Result<(), DocError>;
}

/// DocStore provides a document storage interface with multi-document
/// atomic transactions.
///
/// Documents are opaque byte values (JSON by convention) keyed by
/// `(collection, id)`. The store guarantees that `transact` bodies run
/// isolated from one another: a body either commits every staged write or
/// none of them, and a body that runs after another committed observes the
/// committed state. Callers see only terminal success or abort; any
/// internal conflict retry is the store's concern.
pub trait DocStore: Send + Sync {
    /// Get a document by collection and id. Returns None if absent.
    fn get(&self, collection: &str, id: &str) -> Result<Option<Vec<u8>>, DocError>;

    /// Write a single document outside any caller transaction.
    fn set(&self, collection: &str, id: &str, value: &[u8]) -> Result<(), DocError>;

    /// Delete a single document.
    fn delete(&self, collection: &str, id: &str) -> Result<(), DocError>;

    /// Scan all documents in a collection, ordered by id.
    fn scan(&self, collection: &str) -> Result<Vec<(String, Vec<u8>)>, DocError>;

    /// Run `body` as one atomic transaction.
    ///
    /// Commits iff the body returns Ok; an Err discards every staged write
    /// and is surfaced to the caller unchanged, so typed precondition
    /// failures abort with zero partial writes.
    fn transact(
        &self,
        body: &mut dyn FnMut(&mut dyn DocTxn) -> Result<(), ServiceError>,
    ) -> Result<(), ServiceError>;
}
