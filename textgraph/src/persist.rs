//! Store/load contract shared by documents, sentences and tags

use crate::error::Result;
use crate::node::NodeId;
use crate::storage::GraphStore;

/// Something that can be materialized into the graph and read back
pub trait Persistable: Sized {
    /// Persist into `graph`, returning the node handle
    ///
    /// Implementations run inside whatever unit of work the caller holds and
    /// never commit or roll back on their own.
    fn store(&self, graph: &GraphStore) -> Result<NodeId>;

    /// Rebuild the in-memory value from a persisted node
    fn load(graph: &GraphStore, id: NodeId) -> Result<Self>;
}
