//! RocksDB-backed property graph
//!
//! Key layout:
//!
//! - `node:{uuid}` → bincode [`NodeKind`]
//! - `edge:{from}:{REL}:{to}` → bincode [`EdgeProperties`]
//! - `idx:{label}:{key}` → 16 uuid bytes
//!
//! An edge is identified by its endpoints and type, so writing the same
//! edge twice never produces a duplicate. Outgoing edges come back in key
//! order, which says nothing about insertion order; ordered structures must
//! be encoded explicitly (see [`crate::chain`]).

use dashmap::DashMap;
use parking_lot::Mutex;
use rocksdb::{Direction, IteratorMode, WriteBatch, DB};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::StoreConfig;
use crate::error::{GraphError, Result};
use crate::node::{EdgeProperties, Label, NodeId, NodeKind, Relationship};

const NODE_PREFIX: &str = "node:";
const EDGE_PREFIX: &str = "edge:";

fn node_key(id: NodeId) -> String {
    format!("{}{}", NODE_PREFIX, id)
}

fn edge_key(from: NodeId, rel: Relationship, to: NodeId) -> String {
    format!("{}{}:{}:{}", EDGE_PREFIX, from, rel.as_str(), to)
}

fn edge_prefix(from: NodeId, rel: Relationship) -> String {
    format!("{}{}:{}:", EDGE_PREFIX, from, rel.as_str())
}

fn index_key(label: Label, key: &str) -> String {
    format!("idx:{}:{}", label.as_str(), key)
}

/// Storage handle for annotated text graphs
pub struct GraphStore {
    db: Arc<DB>,
    config: StoreConfig,
    key_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl GraphStore {
    /// Open (or create) a store with default settings
    pub fn open_default(path: impl AsRef<Path>) -> Result<Self> {
        Self::open(StoreConfig::new(path))
    }

    /// Open a store
    pub fn open(config: StoreConfig) -> Result<Self> {
        let path = config.path.clone();
        if config.create_if_missing {
            std::fs::create_dir_all(&path)?;
        } else if !path.exists() {
            return Err(GraphError::invalid_path(path.display().to_string()));
        }

        let db = DB::open(&config.rocksdb_options(), &path)?;
        let version = crate::migration::ensure_schema(&db)?;

        log::info!(
            "GraphStore opened at: {} (schema v{})",
            path.display(),
            version
        );

        Ok(Self {
            db: Arc::new(db),
            config,
            key_locks: DashMap::new(),
        })
    }

    fn write(&self, batch: WriteBatch) -> Result<()> {
        self.db.write(batch)?;
        if self.config.flush_on_write {
            self.db.flush()?;
        }
        Ok(())
    }

    /// Run `f` while holding the lock for `key`
    ///
    /// Locks are not reentrant: `f` must not take the same key again, which
    /// rules out calling [`GraphStore::modify_node`] on a node whose
    /// [`NodeId::lock_key`] is held.
    ///
    /// The lock entry is dropped again once no other caller holds or waits
    /// on it.
    pub fn locked<T>(&self, key: &str, f: impl FnOnce() -> Result<T>) -> Result<T> {
        let lock = self
            .key_locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let result = {
            let _guard = lock.lock();
            f()
        };
        drop(lock);
        // Runs under the shard lock, so no caller can clone the entry between
        // the count check and the removal.
        self.key_locks
            .remove_if(key, |_, lock| Arc::strong_count(lock) == 1);
        result
    }

    /// Number of live per-key lock entries
    #[cfg(test)]
    pub(crate) fn lock_entries(&self) -> usize {
        self.key_locks.len()
    }

    /// Create a node with a fresh handle
    pub fn create_node(&self, kind: NodeKind) -> Result<NodeId> {
        let id = NodeId::new();
        self.put_node(id, &kind)?;
        Ok(id)
    }

    /// Overwrite a node's record
    pub fn put_node(&self, id: NodeId, kind: &NodeKind) -> Result<()> {
        let mut batch = WriteBatch::default();
        batch.put(node_key(id).as_bytes(), bincode::serialize(kind)?);
        self.write(batch)
    }

    /// Get a node by handle
    pub fn node(&self, id: NodeId) -> Result<Option<NodeKind>> {
        match self.db.get(node_key(id).as_bytes())? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Get a node by handle, failing when it does not exist
    pub fn require_node(&self, id: NodeId) -> Result<NodeKind> {
        self.node(id)?
            .ok_or_else(|| GraphError::not_found(format!("node {}", id)))
    }

    /// Read-modify-write a node under its lock
    pub fn modify_node<F>(&self, id: NodeId, f: F) -> Result<NodeKind>
    where
        F: FnOnce(&mut NodeKind) -> Result<()>,
    {
        self.locked(&id.lock_key(), || {
            let mut kind = self.require_node(id)?;
            f(&mut kind)?;
            self.put_node(id, &kind)?;
            Ok(kind)
        })
    }

    /// Look up a node through a unique index
    pub fn find_indexed(&self, label: Label, key: &str) -> Result<Option<NodeId>> {
        match self.db.get(index_key(label, key).as_bytes())? {
            Some(bytes) => {
                let uuid_bytes: [u8; 16] = bytes
                    .as_slice()
                    .try_into()
                    .map_err(|_| GraphError::other(format!("Corrupt index entry for {}", key)))?;
                Ok(Some(NodeId::from_uuid(Uuid::from_bytes(uuid_bytes))))
            }
            None => Ok(None),
        }
    }

    /// Atomically find or create the node indexed under `(label, key)`
    ///
    /// Returns the handle and whether it was created by this call. The node
    /// record and its index entry land in one write batch.
    pub fn get_or_create_indexed<F>(
        &self,
        label: Label,
        key: &str,
        init: F,
    ) -> Result<(NodeId, bool)>
    where
        F: FnOnce() -> NodeKind,
    {
        let idx = index_key(label, key);
        self.locked(&idx, || {
            if let Some(existing) = self.find_indexed(label, key)? {
                return Ok((existing, false));
            }

            let kind = init();
            debug_assert_eq!(kind.label(), label);
            let id = NodeId::new();
            let mut batch = WriteBatch::default();
            batch.put(node_key(id).as_bytes(), bincode::serialize(&kind)?);
            batch.put(idx.as_bytes(), id.0.as_bytes());
            self.write(batch)?;
            Ok((id, true))
        })
    }

    /// Create or overwrite the edge `from -[rel]-> to`
    pub fn put_edge(
        &self,
        from: NodeId,
        rel: Relationship,
        to: NodeId,
        properties: EdgeProperties,
    ) -> Result<()> {
        let mut batch = WriteBatch::default();
        batch.put(
            edge_key(from, rel, to).as_bytes(),
            bincode::serialize(&properties)?,
        );
        self.write(batch)
    }

    /// Get the properties of a single edge
    pub fn edge(
        &self,
        from: NodeId,
        rel: Relationship,
        to: NodeId,
    ) -> Result<Option<EdgeProperties>> {
        match self.db.get(edge_key(from, rel, to).as_bytes())? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    /// All outgoing edges of one type, in key order
    pub fn outgoing(
        &self,
        from: NodeId,
        rel: Relationship,
    ) -> Result<Vec<(NodeId, EdgeProperties)>> {
        let prefix = edge_prefix(from, rel);
        let mut edges = Vec::new();

        let iter = self
            .db
            .iterator(IteratorMode::From(prefix.as_bytes(), Direction::Forward));
        for item in iter {
            let (key, value) = item?;
            let key_str = String::from_utf8_lossy(&key);
            let Some(target) = key_str.strip_prefix(prefix.as_str()) else {
                break;
            };
            let to: NodeId = target.parse()?;
            edges.push((to, bincode::deserialize(&value)?));
        }

        Ok(edges)
    }

    /// Target of a to-one relationship
    ///
    /// Returns the first edge in key order when several exist.
    pub fn single_outgoing(&self, from: NodeId, rel: Relationship) -> Result<Option<NodeId>> {
        let prefix = edge_prefix(from, rel);
        let mut iter = self
            .db
            .iterator(IteratorMode::From(prefix.as_bytes(), Direction::Forward));
        match iter.next() {
            Some(item) => {
                let (key, _) = item?;
                let key_str = String::from_utf8_lossy(&key);
                match key_str.strip_prefix(prefix.as_str()) {
                    Some(target) => Ok(Some(target.parse()?)),
                    None => Ok(None),
                }
            }
            None => Ok(None),
        }
    }

    /// Handles of every node with the given label
    pub fn nodes_with_label(&self, label: Label) -> Result<Vec<NodeId>> {
        let mut ids = Vec::new();
        self.scan_nodes(|id, kind| {
            if kind.label() == label {
                ids.push(id);
            }
        })?;
        Ok(ids)
    }

    /// Number of nodes with the given label
    pub fn count_nodes(&self, label: Label) -> Result<usize> {
        let mut count = 0;
        self.scan_nodes(|_, kind| {
            if kind.label() == label {
                count += 1;
            }
        })?;
        Ok(count)
    }

    /// Number of edges of the given type
    pub fn count_edges(&self, rel: Relationship) -> Result<usize> {
        Ok(self.edge_counts()?.get(&rel).copied().unwrap_or(0))
    }

    fn scan_nodes(&self, mut visit: impl FnMut(NodeId, NodeKind)) -> Result<()> {
        let iter = self
            .db
            .iterator(IteratorMode::From(NODE_PREFIX.as_bytes(), Direction::Forward));

        for item in iter {
            let (key, value) = item?;
            let key_str = String::from_utf8_lossy(&key);
            let Some(id_str) = key_str.strip_prefix(NODE_PREFIX) else {
                break;
            };

            match (id_str.parse::<NodeId>(), bincode::deserialize::<NodeKind>(&value)) {
                (Ok(id), Ok(kind)) => visit(id, kind),
                (Err(e), _) => log::warn!("Skipping node with bad key {}: {}", key_str, e),
                (_, Err(e)) => log::warn!("Failed to deserialize node {}: {}. Skipping.", id_str, e),
            }
        }
        Ok(())
    }

    fn edge_counts(&self) -> Result<HashMap<Relationship, usize>> {
        let mut counts = HashMap::new();
        let iter = self
            .db
            .iterator(IteratorMode::From(EDGE_PREFIX.as_bytes(), Direction::Forward));

        for item in iter {
            let (key, _) = item?;
            let key_str = String::from_utf8_lossy(&key);
            let Some(rest) = key_str.strip_prefix(EDGE_PREFIX) else {
                break;
            };
            if let Some(rel) = rest.split(':').nth(1).and_then(Relationship::parse) {
                *counts.entry(rel).or_insert(0) += 1;
            }
        }
        Ok(counts)
    }

    /// Get store statistics
    pub fn stats(&self) -> Result<serde_json::Value> {
        let mut documents = 0;
        let mut sentences = 0;
        let mut tags = 0;
        self.scan_nodes(|_, kind| match kind.label() {
            Label::Document => documents += 1,
            Label::Sentence => sentences += 1,
            Label::Tag => tags += 1,
        })?;

        let counts = self.edge_counts()?;
        let edges: serde_json::Map<String, serde_json::Value> = Relationship::ALL
            .iter()
            .map(|rel| {
                let n = counts.get(rel).copied().unwrap_or(0);
                (rel.as_str().to_string(), serde_json::json!(n))
            })
            .collect();

        Ok(serde_json::json!({
            "documents": documents,
            "sentences": sentences,
            "tags": tags,
            "edges": edges,
        }))
    }
}
