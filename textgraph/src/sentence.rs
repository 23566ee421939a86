//! Sentences: ordered, weighted tag occurrences

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::{GraphError, Result};
use crate::node::{EdgeProperties, Label, NodeId, NodeKind, Relationship, SentenceNode};
use crate::persist::Persistable;
use crate::storage::GraphStore;
use crate::tag::Tag;

/// A tag as it occurs in one sentence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagOccurrence {
    pub tag: Tag,
    /// Occurrences of the tag within the sentence
    #[serde(default = "default_weight")]
    pub weight: u32,
}

fn default_weight() -> u32 {
    1
}

/// One sentence of an annotated text
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "RawSentence")]
pub struct Sentence {
    /// Stable identity used to upsert the sentence on re-store
    pub id: Option<String>,
    pub sentence_number: u32,
    tags: Vec<TagOccurrence>,
}

/// Wire shape of a sentence; converted through `add_weighted_tag` so
/// duplicate tags merge the same way as when built in code.
#[derive(Deserialize)]
struct RawSentence {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    sentence_number: u32,
    #[serde(default)]
    tags: Vec<TagOccurrence>,
}

impl From<RawSentence> for Sentence {
    fn from(raw: RawSentence) -> Self {
        let mut sentence = Sentence::new(raw.sentence_number);
        sentence.id = raw.id;
        for occurrence in raw.tags {
            sentence.add_weighted_tag(occurrence.tag, occurrence.weight);
        }
        sentence
    }
}

impl Sentence {
    pub fn new(sentence_number: u32) -> Self {
        Self {
            id: None,
            sentence_number,
            tags: Vec::new(),
        }
    }

    /// Set an explicit sentence id
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Add one occurrence of `tag`
    pub fn add_tag(&mut self, tag: Tag) {
        self.add_weighted_tag(tag, 1);
    }

    /// Add `weight` occurrences of `tag`
    ///
    /// Tags sharing a dedup key are merged into the first occurrence, whose
    /// position in the sentence is kept.
    pub fn add_weighted_tag(&mut self, tag: Tag, weight: u32) {
        let key = tag.dedup_key();
        if let Some(existing) = self.tags.iter_mut().find(|o| o.tag.dedup_key() == key) {
            existing.weight = existing.weight.saturating_add(weight);
            if tag.ne.is_some() {
                existing.tag.ne = tag.ne;
            }
            return;
        }
        self.tags.push(TagOccurrence { tag, weight });
    }

    /// Builder-style [`Sentence::add_tag`]
    pub fn tag(mut self, tag: Tag) -> Self {
        self.add_tag(tag);
        self
    }

    pub fn occurrences(&self) -> &[TagOccurrence] {
        &self.tags
    }

    /// Tags in sentence order
    pub fn tags(&self) -> impl Iterator<Item = &Tag> {
        self.tags.iter().map(|o| &o.tag)
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// Persist under an explicit key
    ///
    /// With a key the sentence node is upserted; without one a new node is
    /// always created. Tag links are written (or refreshed) in sentence
    /// order and never removed; links to tags the sentence no longer carries
    /// lose their position so they load after the current ones.
    pub fn store_as(&self, graph: &GraphStore, key: Option<&str>) -> Result<NodeId> {
        let record = || {
            NodeKind::Sentence(SentenceNode {
                id: self.id.clone(),
                sentence_number: self.sentence_number,
            })
        };

        let (id, created) = match key {
            Some(key) => graph.get_or_create_indexed(Label::Sentence, key, record)?,
            None => (graph.create_node(record())?, true),
        };
        if !created {
            self.refresh_number(graph, id)?;
        }

        let mut current = HashSet::with_capacity(self.tags.len());
        for (position, occurrence) in self.tags.iter().enumerate() {
            let tag_id = occurrence.tag.store(graph)?;
            link_tag(graph, id, tag_id, occurrence.weight, position as u32)?;
            current.insert(tag_id);
        }

        if !created {
            for (tag_id, props) in graph.outgoing(id, Relationship::HasTag)? {
                if !current.contains(&tag_id) && props.position.is_some() {
                    let stale = EdgeProperties {
                        position: None,
                        ..props
                    };
                    graph.put_edge(id, Relationship::HasTag, tag_id, stale)?;
                }
            }
        }

        Ok(id)
    }

    fn refresh_number(&self, graph: &GraphStore, id: NodeId) -> Result<()> {
        match graph.require_node(id)? {
            NodeKind::Sentence(node) if node.sentence_number == self.sentence_number => Ok(()),
            NodeKind::Sentence(_) => {
                graph.modify_node(id, |kind| {
                    if let NodeKind::Sentence(node) = kind {
                        node.sentence_number = self.sentence_number;
                    }
                    Ok(())
                })?;
                Ok(())
            }
            other => Err(GraphError::unexpected_node(
                id,
                Label::Sentence.as_str(),
                other.label().as_str(),
            )),
        }
    }
}

/// Write the weighted sentence→tag edge and move the tag's multiplicity by
/// the change in weight, so multiplicity always equals the sum of link
/// weights.
fn link_tag(
    graph: &GraphStore,
    sentence: NodeId,
    tag: NodeId,
    weight: u32,
    position: u32,
) -> Result<()> {
    graph.locked(&tag.lock_key(), || {
        let existing = graph.edge(sentence, Relationship::HasTag, tag)?;
        let previous = existing.and_then(|props| props.weight).unwrap_or(0);

        let props = EdgeProperties::weighted(weight, position);
        if existing != Some(props) {
            graph.put_edge(sentence, Relationship::HasTag, tag, props)?;
        }

        let delta = i64::from(weight) - i64::from(previous);
        if delta != 0 {
            let mut kind = graph.require_node(tag)?;
            match &mut kind {
                NodeKind::Tag(node) => {
                    node.multiplicity = (node.multiplicity as i64 + delta).max(0) as u64;
                }
                other => {
                    return Err(GraphError::unexpected_node(
                        tag,
                        Label::Tag.as_str(),
                        other.label().as_str(),
                    ))
                }
            }
            graph.put_node(tag, &kind)?;
        }
        Ok(())
    })
}

impl Persistable for Sentence {
    fn store(&self, graph: &GraphStore) -> Result<NodeId> {
        self.store_as(graph, self.id.as_deref())
    }

    fn load(graph: &GraphStore, id: NodeId) -> Result<Self> {
        let node = match graph.require_node(id)? {
            NodeKind::Sentence(node) => node,
            other => {
                return Err(GraphError::unexpected_node(
                    id,
                    Label::Sentence.as_str(),
                    other.label().as_str(),
                ))
            }
        };

        let mut edges = graph.outgoing(id, Relationship::HasTag)?;
        edges.sort_by_key(|(tag_id, props)| (props.position.unwrap_or(u32::MAX), *tag_id));

        let mut sentence = Sentence::new(node.sentence_number);
        sentence.id = node.id;
        for (tag_id, props) in edges {
            sentence.tags.push(TagOccurrence {
                tag: Tag::load(graph, tag_id)?,
                weight: props.weight.unwrap_or(1),
            });
        }
        Ok(sentence)
    }
}
