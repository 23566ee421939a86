//! Graph node and relationship types
//!
//! Typed records for everything the store persists. Records are written
//! with bincode, so no field here may be conditionally skipped.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque handle to a persisted node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub Uuid);

impl NodeId {
    /// Create a new random NodeId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create from existing UUID
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Key under which per-node read-modify-write is serialized
    pub(crate) fn lock_key(&self) -> String {
        format!("node:{}", self.0)
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for NodeId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Caller-supplied document identifier
///
/// Opaque to the store. Text and numeric ids never collide: `"7"` and `7`
/// name different documents.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExternalId {
    Number(i64),
    Text(String),
}

impl ExternalId {
    /// Stable, type-tagged encoding used for index keys and records
    pub fn encode(&self) -> String {
        match self {
            Self::Number(n) => format!("n:{}", n),
            Self::Text(s) => format!("t:{}", s),
        }
    }

    /// Inverse of [`ExternalId::encode`]
    pub fn decode(encoded: &str) -> Option<Self> {
        if let Some(rest) = encoded.strip_prefix("n:") {
            rest.parse().ok().map(Self::Number)
        } else {
            encoded
                .strip_prefix("t:")
                .map(|rest| Self::Text(rest.to_string()))
        }
    }
}

impl std::fmt::Display for ExternalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{}", n),
            Self::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<&str> for ExternalId {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for ExternalId {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for ExternalId {
    fn from(value: i64) -> Self {
        Self::Number(value)
    }
}

/// Node labels, used for unique indexes and statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Label {
    Document,
    Sentence,
    Tag,
}

impl Label {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Document => "AnnotatedText",
            Self::Sentence => "Sentence",
            Self::Tag => "Tag",
        }
    }
}

/// Persisted document attributes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentNode {
    /// Encoded [`ExternalId`], if the document had one
    pub external_id: Option<String>,
    /// Total token count when the document was first stored
    pub num_terms: u64,
    pub created_at: DateTime<Utc>,
    /// Last time the update path refreshed this document
    pub updated_at: DateTime<Utc>,
}

/// Persisted sentence attributes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentenceNode {
    pub id: Option<String>,
    pub sentence_number: u32,
}

/// Persisted tag attributes, shared store-wide by dedup key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagNode {
    pub lemma: String,
    pub pos: String,
    pub ne: Option<String>,
    /// Sum of all (sentence, tag) link weights in the store
    pub multiplicity: u64,
}

/// A persisted node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NodeKind {
    Document(DocumentNode),
    Sentence(SentenceNode),
    Tag(TagNode),
}

impl NodeKind {
    pub fn label(&self) -> Label {
        match self {
            Self::Document(_) => Label::Document,
            Self::Sentence(_) => Label::Sentence,
            Self::Tag(_) => Label::Tag,
        }
    }
}

/// Relationship types between nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Relationship {
    /// Document to every one of its sentences
    ContainsSentence,
    /// Document to the head of its sentence chain
    FirstSentence,
    /// Sentence to its successor
    NextSentence,
    /// Sentence to a tag, weighted
    HasTag,
}

impl Relationship {
    pub const ALL: [Relationship; 4] = [
        Self::ContainsSentence,
        Self::FirstSentence,
        Self::NextSentence,
        Self::HasTag,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ContainsSentence => "CONTAINS_SENTENCE",
            Self::FirstSentence => "FIRST_SENTENCE",
            Self::NextSentence => "NEXT_SENTENCE",
            Self::HasTag => "HAS_TAG",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|r| r.as_str() == s)
    }
}

/// Properties carried on a relationship
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeProperties {
    /// Occurrence count of a tag within a sentence
    pub weight: Option<u32>,
    /// Position of a tag within a sentence
    pub position: Option<u32>,
}

impl EdgeProperties {
    pub fn weighted(weight: u32, position: u32) -> Self {
        Self {
            weight: Some(weight),
            position: Some(position),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_id_generation() {
        assert_ne!(NodeId::new(), NodeId::new());
    }

    #[test]
    fn test_node_id_parse() {
        let id = NodeId::new();
        let parsed: NodeId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_external_id_encoding_is_type_tagged() {
        let text = ExternalId::from("7");
        let number = ExternalId::from(7i64);
        assert_ne!(text.encode(), number.encode());
        assert_eq!(ExternalId::decode(&text.encode()), Some(text));
        assert_eq!(ExternalId::decode(&number.encode()), Some(number));
        assert_eq!(ExternalId::decode("x:7"), None);
    }

    #[test]
    fn test_external_id_json_is_untagged() {
        let ids: Vec<ExternalId> = serde_json::from_str(r#"["doc-1", 42]"#).unwrap();
        assert_eq!(ids, vec![ExternalId::from("doc-1"), ExternalId::from(42i64)]);
    }

    #[test]
    fn test_relationship_names_round_trip() {
        for rel in Relationship::ALL {
            assert_eq!(Relationship::parse(rel.as_str()), Some(rel));
        }
        assert_eq!(Relationship::parse("DESCRIBES"), None);
    }

    #[test]
    fn test_node_kind_bincode() {
        let kind = NodeKind::Tag(TagNode {
            lemma: "attack".into(),
            pos: "NN".into(),
            ne: None,
            multiplicity: 3,
        });
        let bytes = bincode::serialize(&kind).unwrap();
        let decoded: NodeKind = bincode::deserialize(&bytes).unwrap();
        assert_eq!(decoded, kind);
        assert_eq!(decoded.label(), Label::Tag);
    }
}
