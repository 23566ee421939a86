//! Tags: deduplicated lexical units
//!
//! A tag is identified store-wide by its normalized `(lemma, POS)` pair. The
//! same normalization drives filter matching, so a tag that deduplicates
//! with another at storage time also matches the same filter terms.

use serde::{Deserialize, Serialize};

use crate::error::{GraphError, Result};
use crate::node::{Label, NodeId, NodeKind, TagNode};
use crate::persist::Persistable;
use crate::storage::GraphStore;

/// Case-insensitive normal form shared by dedup keys and filter matching
pub fn normalize(text: &str) -> String {
    text.to_lowercase()
}

/// Compare two strings under [`normalize`]
pub fn eq_normalized(a: &str, b: &str) -> bool {
    a == b || normalize(a) == normalize(b)
}

/// A lemma with its part of speech and optional named-entity label
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub lemma: String,
    #[serde(default)]
    pub pos: String,
    #[serde(default)]
    pub ne: Option<String>,
    /// Occurrence count. Loaded tags report the store-wide total.
    #[serde(default = "default_multiplicity")]
    pub multiplicity: u64,
}

fn default_multiplicity() -> u64 {
    1
}

impl Tag {
    pub fn new(lemma: impl Into<String>, pos: impl Into<String>) -> Self {
        Self {
            lemma: lemma.into(),
            pos: pos.into(),
            ne: None,
            multiplicity: default_multiplicity(),
        }
    }

    /// Attach a named-entity label
    pub fn with_ne(mut self, ne: impl Into<String>) -> Self {
        self.ne = Some(ne.into());
        self
    }

    /// Store-wide identity of this tag
    pub fn dedup_key(&self) -> String {
        format!("{}\u{1f}{}", normalize(&self.lemma), normalize(&self.pos))
    }

    /// Case-insensitive lemma comparison
    pub fn lemma_matches(&self, lemma: &str) -> bool {
        eq_normalized(&self.lemma, lemma)
    }

    /// Case-insensitive NE comparison; a tag without NE matches nothing
    pub fn ne_matches(&self, ne: &str) -> bool {
        self.ne
            .as_deref()
            .map(|own| eq_normalized(own, ne))
            .unwrap_or(false)
    }

    fn from_node(node: TagNode) -> Self {
        Self {
            lemma: node.lemma,
            pos: node.pos,
            ne: node.ne,
            multiplicity: node.multiplicity,
        }
    }
}

impl Persistable for Tag {
    /// Find the shared tag node by dedup key, creating it when absent
    ///
    /// Multiplicity is owned by sentence links and is not touched here. An
    /// incoming NE label replaces the stored one.
    fn store(&self, graph: &GraphStore) -> Result<NodeId> {
        let (id, created) = graph.get_or_create_indexed(Label::Tag, &self.dedup_key(), || {
            NodeKind::Tag(TagNode {
                lemma: self.lemma.clone(),
                pos: self.pos.clone(),
                ne: self.ne.clone(),
                multiplicity: 0,
            })
        })?;

        if !created {
            if let Some(ne) = &self.ne {
                let stored_ne = match graph.require_node(id)? {
                    NodeKind::Tag(node) => node.ne,
                    other => {
                        return Err(GraphError::unexpected_node(
                            id,
                            Label::Tag.as_str(),
                            other.label().as_str(),
                        ))
                    }
                };
                if stored_ne.as_deref() != Some(ne.as_str()) {
                    graph.modify_node(id, |kind| {
                        if let NodeKind::Tag(node) = kind {
                            node.ne = Some(ne.clone());
                        }
                        Ok(())
                    })?;
                }
            }
        }

        Ok(id)
    }

    fn load(graph: &GraphStore, id: NodeId) -> Result<Self> {
        match graph.require_node(id)? {
            NodeKind::Tag(node) => Ok(Self::from_node(node)),
            other => Err(GraphError::unexpected_node(
                id,
                Label::Tag.as_str(),
                other.label().as_str(),
            )),
        }
    }
}
