//! Annotated text documents
//!
//! `store` branches on whether the document already exists:
//!
//! - **create**: new document node, every sentence stored and threaded into
//!   the first/next chain in list order
//! - **update**: sentences re-stored in place; the chain and every other
//!   document-level edge stay as they are
//!
//! `load` walks the chain, so sentence order survives any storage iteration
//! order.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::chain::{link_chain, SentenceChain};
use crate::error::{GraphError, Result};
use crate::filter::{FilterOptions, FilterQuery};
use crate::node::{DocumentNode, ExternalId, Label, NodeId, NodeKind, Relationship};
use crate::persist::Persistable;
use crate::sentence::Sentence;
use crate::storage::GraphStore;
use crate::tag::Tag;

/// A tagged document: ordered sentences keyed by an optional external id
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AnnotatedText {
    #[serde(default)]
    pub id: Option<ExternalId>,
    #[serde(default)]
    sentences: Vec<Sentence>,
}

impl AnnotatedText {
    pub fn new(id: Option<ExternalId>) -> Self {
        Self {
            id,
            sentences: Vec::new(),
        }
    }

    /// Document with an id
    pub fn with_id(id: impl Into<ExternalId>) -> Self {
        Self::new(Some(id.into()))
    }

    pub fn add_sentence(&mut self, sentence: Sentence) {
        self.sentences.push(sentence);
    }

    /// Builder-style [`AnnotatedText::add_sentence`]
    pub fn sentence(mut self, sentence: Sentence) -> Self {
        self.add_sentence(sentence);
        self
    }

    pub fn sentences(&self) -> &[Sentence] {
        &self.sentences
    }

    /// Lemmas of every tag, sentence by sentence
    pub fn tokens(&self) -> Vec<String> {
        self.tags().map(|tag| tag.lemma.clone()).collect()
    }

    /// Every tag, sentence by sentence
    pub fn tags(&self) -> impl Iterator<Item = &Tag> {
        self.sentences.iter().flat_map(|s| s.tags())
    }

    /// Evaluate a filter query against this document's tags
    pub fn filter(&self, query: &str) -> bool {
        FilterQuery::parse(query).evaluate(self.tags())
    }

    /// [`AnnotatedText::filter`] with explicit parse options
    pub fn filter_with(&self, query: &str, options: FilterOptions) -> bool {
        FilterQuery::parse_with(query, options).evaluate(self.tags())
    }

    /// Evaluate an already parsed query
    pub fn matches(&self, query: &FilterQuery) -> bool {
        query.evaluate(self.tags())
    }

    /// Upsert keys for every sentence, scoped to `document`
    ///
    /// A sentence is keyed by its own id, else its sentence number, else its
    /// list position, taking the first of these not already used by an
    /// earlier sentence. Keys are unique within the document and never shared
    /// with another document.
    fn sentence_keys(&self, document: NodeId) -> Vec<String> {
        let mut seen = HashSet::with_capacity(self.sentences.len());
        let mut keys = Vec::with_capacity(self.sentences.len());
        for (index, sentence) in self.sentences.iter().enumerate() {
            let candidates = [
                sentence.id.as_ref().map(|id| format!("{}/id:{}", document, id)),
                Some(format!("{}/num:{}", document, sentence.sentence_number)),
            ];
            let key = candidates
                .into_iter()
                .flatten()
                .find(|key| !seen.contains(key))
                .unwrap_or_else(|| format!("{}/pos:{}", document, index));
            seen.insert(key.clone());
            keys.push(key);
        }
        keys
    }

    fn create(&self, graph: &GraphStore, document: NodeId) -> Result<()> {
        let keys = self.sentence_keys(document);
        let mut handles = Vec::with_capacity(self.sentences.len());
        for (sentence, key) in self.sentences.iter().zip(&keys) {
            handles.push(sentence.store_as(graph, Some(key))?);
        }
        link_chain(graph, document, &handles)?;

        log::debug!(
            "Created document {} with {} sentences",
            document,
            handles.len()
        );
        Ok(())
    }

    fn update(&self, graph: &GraphStore, document: NodeId) -> Result<()> {
        let keys = self.sentence_keys(document);
        for (sentence, key) in self.sentences.iter().zip(&keys) {
            let handle = sentence.store_as(graph, Some(key))?;
            if graph
                .edge(document, Relationship::ContainsSentence, handle)?
                .is_none()
            {
                log::warn!(
                    "Sentence {} of document {} is not on its chain; stored without linking",
                    handle,
                    document
                );
            }
        }

        graph.modify_node(document, |kind| match kind {
            NodeKind::Document(node) => {
                node.updated_at = Utc::now();
                Ok(())
            }
            other => Err(GraphError::unexpected_node(
                document,
                Label::Document.as_str(),
                other.label().as_str(),
            )),
        })?;

        log::debug!(
            "Refreshed {} sentences of document {}",
            self.sentences.len(),
            document
        );
        Ok(())
    }

    /// Load the document stored under an external id
    pub fn load_by_id(graph: &GraphStore, id: &ExternalId) -> Result<Self> {
        let node = graph
            .find_document(id)?
            .ok_or_else(|| GraphError::not_found(format!("document {}", id)))?;
        Self::load(graph, node)
    }

    /// Handles and ids of every stored document for which `query` holds
    pub fn filter_stored(
        graph: &GraphStore,
        query: &FilterQuery,
    ) -> Result<Vec<(NodeId, Option<ExternalId>)>> {
        let mut matches = Vec::new();
        if query.is_empty() {
            return Ok(matches);
        }
        for node in graph.nodes_with_label(Label::Document)? {
            let document = Self::load(graph, node)?;
            if document.matches(query) {
                matches.push((node, document.id));
            }
        }
        Ok(matches)
    }
}

impl Persistable for AnnotatedText {
    fn store(&self, graph: &GraphStore) -> Result<NodeId> {
        let now = Utc::now();
        let record = || {
            NodeKind::Document(DocumentNode {
                external_id: self.id.as_ref().map(ExternalId::encode),
                num_terms: self.tags().count() as u64,
                created_at: now,
                updated_at: now,
            })
        };

        let (document, created) = match &self.id {
            Some(id) => graph.get_or_create_indexed(Label::Document, &id.encode(), record)?,
            None => (graph.create_node(record())?, true),
        };

        if created {
            self.create(graph, document)?;
        } else {
            self.update(graph, document)?;
        }
        Ok(document)
    }

    fn load(graph: &GraphStore, id: NodeId) -> Result<Self> {
        let node = match graph.require_node(id)? {
            NodeKind::Document(node) => node,
            other => {
                return Err(GraphError::unexpected_node(
                    id,
                    Label::Document.as_str(),
                    other.label().as_str(),
                ))
            }
        };

        let external_id = match node.external_id.as_deref() {
            Some(encoded) => Some(ExternalId::decode(encoded).ok_or_else(|| {
                GraphError::other(format!("Undecodable document id {}", encoded))
            })?),
            None => None,
        };

        let mut document = AnnotatedText::new(external_id);
        for sentence in SentenceChain::new(graph, id) {
            document.add_sentence(Sentence::load(graph, sentence?)?);
        }
        Ok(document)
    }
}

impl GraphStore {
    /// Handle of the document stored under `id`
    pub fn find_document(&self, id: &ExternalId) -> Result<Option<NodeId>> {
        self.find_indexed(Label::Document, &id.encode())
    }

    /// Persisted attributes of a document
    pub fn document_node(&self, id: NodeId) -> Result<DocumentNode> {
        match self.require_node(id)? {
            NodeKind::Document(node) => Ok(node),
            other => Err(GraphError::unexpected_node(
                id,
                Label::Document.as_str(),
                other.label().as_str(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_graph() -> (TempDir, GraphStore) {
        let temp_dir = TempDir::new().unwrap();
        let graph = GraphStore::open_default(temp_dir.path()).unwrap();
        (temp_dir, graph)
    }

    fn nice_attack(id: &str) -> AnnotatedText {
        AnnotatedText::with_id(id)
            .sentence(
                Sentence::new(0)
                    .tag(Tag::new("nice", "NNP").with_ne("Location"))
                    .tag(Tag::new("attack", "NN")),
            )
            .sentence(
                Sentence::new(1)
                    .tag(Tag::new("attack", "NN"))
                    .tag(Tag::new("truck", "NN")),
            )
    }

    fn numbered(id: &str, n: u32) -> AnnotatedText {
        let mut document = AnnotatedText::with_id(id);
        for i in 0..n {
            document.add_sentence(Sentence::new(i).tag(Tag::new(format!("word{}", i), "NN")));
        }
        document
    }

    fn ne_sequence(document: &AnnotatedText) -> Vec<Vec<(String, Option<String>)>> {
        document
            .sentences()
            .iter()
            .map(|s| s.tags().map(|t| (t.lemma.clone(), t.ne.clone())).collect())
            .collect()
    }

    #[test]
    fn test_tokens_and_tags_are_flattened_in_order() {
        let document = nice_attack("doc-1");
        assert_eq!(document.tokens(), vec!["nice", "attack", "attack", "truck"]);
        assert_eq!(document.tags().count(), 4);
        assert_eq!(document.tokens(), document.tokens());
    }

    #[test]
    fn test_filter_examples() {
        let document = AnnotatedText::with_id("doc").sentence(
            Sentence::new(0)
                .tag(Tag::new("nice", "NNP").with_ne("Location"))
                .tag(Tag::new("attack", "NN")),
        );
        assert!(document.filter("Nice/Location, attack"));
        assert!(!document.filter("Nice/Person"));
        assert!(!document.filter(""));
    }

    #[test]
    fn test_filter_case_insensitive() {
        let document =
            AnnotatedText::with_id("doc").sentence(Sentence::new(0).tag(Tag::new("Attack", "NN")));
        assert!(document.filter("ATTACK"));
    }

    #[test]
    fn test_filter_with_trim() {
        let document = nice_attack("doc");
        let options = FilterOptions {
            trim_whitespace: true,
        };
        assert!(!document.filter(" truck"));
        assert!(document.filter_with(" truck", options));
    }

    #[test]
    fn test_round_trip() {
        let (_dir, graph) = open_graph();
        let document = nice_attack("doc-1");

        let handle = document.store(&graph).unwrap();
        let loaded = AnnotatedText::load(&graph, handle).unwrap();

        assert_eq!(loaded.id, Some(ExternalId::from("doc-1")));
        assert_eq!(loaded.sentences().len(), 2);
        assert_eq!(ne_sequence(&loaded), ne_sequence(&document));
        assert_eq!(loaded.tokens(), document.tokens());
    }

    #[test]
    fn test_round_trip_numeric_id() {
        let (_dir, graph) = open_graph();
        let mut document = numbered("ignored", 3);
        document.id = Some(ExternalId::from(42i64));

        document.store(&graph).unwrap();
        let loaded = AnnotatedText::load_by_id(&graph, &ExternalId::from(42i64)).unwrap();
        assert_eq!(loaded.id, Some(ExternalId::Number(42)));
        assert_eq!(loaded.sentences().len(), 3);
        assert!(AnnotatedText::load_by_id(&graph, &ExternalId::from("42"))
            .unwrap_err()
            .is_not_found());
    }

    #[test]
    fn test_load_by_missing_id_is_not_found() {
        let (_dir, graph) = open_graph();
        let err = AnnotatedText::load_by_id(&graph, &ExternalId::from("missing")).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_load_wrong_kind() {
        let (_dir, graph) = open_graph();
        let tag = Tag::new("attack", "NN").store(&graph).unwrap();
        assert!(matches!(
            AnnotatedText::load(&graph, tag).unwrap_err(),
            GraphError::UnexpectedNode { .. }
        ));
    }

    #[test]
    fn test_restore_is_idempotent() {
        let (_dir, graph) = open_graph();
        let document = numbered("doc-1", 3);

        let first = document.store(&graph).unwrap();
        let second = document.store(&graph).unwrap();

        assert_eq!(first, second);
        assert_eq!(graph.count_nodes(Label::Document).unwrap(), 1);
        assert_eq!(graph.count_nodes(Label::Sentence).unwrap(), 3);
        assert_eq!(graph.count_edges(Relationship::FirstSentence).unwrap(), 1);
        assert_eq!(graph.count_edges(Relationship::NextSentence).unwrap(), 2);
        assert_eq!(graph.count_edges(Relationship::ContainsSentence).unwrap(), 3);

        let loaded = AnnotatedText::load(&graph, first).unwrap();
        assert_eq!(loaded.tokens(), document.tokens());
    }

    #[test]
    fn test_update_leaves_chain_and_num_terms() {
        let (_dir, graph) = open_graph();
        let handle = numbered("doc-1", 2).store(&graph).unwrap();
        let before = graph.document_node(handle).unwrap();

        // Re-processing produced an extra sentence
        numbered("doc-1", 3).store(&graph).unwrap();

        let after = graph.document_node(handle).unwrap();
        assert_eq!(after.num_terms, before.num_terms);
        assert_eq!(after.created_at, before.created_at);
        assert!(after.updated_at >= before.updated_at);

        assert_eq!(graph.count_edges(Relationship::FirstSentence).unwrap(), 1);
        assert_eq!(graph.count_edges(Relationship::NextSentence).unwrap(), 1);
        assert_eq!(graph.count_edges(Relationship::ContainsSentence).unwrap(), 2);
        assert_eq!(AnnotatedText::load(&graph, handle).unwrap().sentences().len(), 2);
    }

    #[test]
    fn test_update_refreshes_ne_labels() {
        let (_dir, graph) = open_graph();
        let plain = AnnotatedText::with_id("doc")
            .sentence(Sentence::new(0).tag(Tag::new("nice", "NNP")));
        let handle = plain.store(&graph).unwrap();
        assert!(!AnnotatedText::load(&graph, handle)
            .unwrap()
            .filter("nice/Location"));

        let labelled = AnnotatedText::with_id("doc")
            .sentence(Sentence::new(0).tag(Tag::new("nice", "NNP").with_ne("Location")));
        labelled.store(&graph).unwrap();

        assert!(AnnotatedText::load(&graph, handle)
            .unwrap()
            .filter("nice/Location"));
    }

    #[test]
    fn test_document_without_id_is_always_new() {
        let (_dir, graph) = open_graph();
        let document =
            AnnotatedText::new(None).sentence(Sentence::new(0).tag(Tag::new("attack", "NN")));

        let a = document.store(&graph).unwrap();
        let b = document.store(&graph).unwrap();

        assert_ne!(a, b);
        assert_eq!(graph.count_nodes(Label::Document).unwrap(), 2);
        assert_eq!(graph.count_nodes(Label::Sentence).unwrap(), 2);
        assert_eq!(graph.count_edges(Relationship::FirstSentence).unwrap(), 2);
        assert_eq!(AnnotatedText::load(&graph, a).unwrap().id, None);
    }

    #[test]
    fn test_tags_are_shared_within_and_across_documents() {
        let (_dir, graph) = open_graph();
        let handle = nice_attack("doc-1").store(&graph).unwrap();

        let sentences: Vec<NodeId> = SentenceChain::new(&graph, handle)
            .collect::<Result<_>>()
            .unwrap();
        let attack_key = Tag::new("attack", "NN").dedup_key();
        let attack = graph.find_indexed(Label::Tag, &attack_key).unwrap().unwrap();
        for sentence in &sentences {
            assert!(graph
                .edge(*sentence, Relationship::HasTag, attack)
                .unwrap()
                .is_some());
        }
        assert!(Tag::load(&graph, attack).unwrap().multiplicity >= 2);

        AnnotatedText::with_id("doc-2")
            .sentence(Sentence::new(0).tag(Tag::new("ATTACK", "NN")))
            .store(&graph)
            .unwrap();
        assert_eq!(Tag::load(&graph, attack).unwrap().multiplicity, 3);
        assert_eq!(graph.count_nodes(Label::Tag).unwrap(), 3);
    }

    #[test]
    fn test_restore_keeps_multiplicity_stable() {
        let (_dir, graph) = open_graph();
        let document = nice_attack("doc-1");
        document.store(&graph).unwrap();
        document.store(&graph).unwrap();

        let attack = graph
            .find_indexed(Label::Tag, &Tag::new("attack", "NN").dedup_key())
            .unwrap()
            .unwrap();
        assert_eq!(Tag::load(&graph, attack).unwrap().multiplicity, 2);
    }

    #[test]
    fn test_chain_order_for_various_lengths() {
        for n in [1u32, 2, 10] {
            let (_dir, graph) = open_graph();
            let document = numbered("doc", n);
            let handle = document.store(&graph).unwrap();

            let loaded = AnnotatedText::load(&graph, handle).unwrap();
            let numbers: Vec<u32> = loaded.sentences().iter().map(|s| s.sentence_number).collect();
            assert_eq!(numbers, (0..n).collect::<Vec<_>>());
            assert_eq!(loaded.tokens(), document.tokens());

            assert_eq!(graph.count_edges(Relationship::FirstSentence).unwrap(), 1);
            assert_eq!(
                graph.count_edges(Relationship::NextSentence).unwrap(),
                n as usize - 1
            );
        }
    }

    #[test]
    fn test_chain_follows_list_order_not_sentence_number() {
        let (_dir, graph) = open_graph();
        let document = AnnotatedText::with_id("doc")
            .sentence(Sentence::new(2).tag(Tag::new("c", "NN")))
            .sentence(Sentence::new(0).tag(Tag::new("a", "NN")))
            .sentence(Sentence::new(1).tag(Tag::new("b", "NN")));

        let handle = document.store(&graph).unwrap();
        let loaded = AnnotatedText::load(&graph, handle).unwrap();
        assert_eq!(loaded.tokens(), vec!["c", "a", "b"]);
    }

    #[test]
    fn test_missing_sentence_numbers_keep_every_sentence() {
        let (_dir, graph) = open_graph();
        let document: AnnotatedText = serde_json::from_str(
            r#"{"id": "doc", "sentences": [
                {"tags": [{"tag": {"lemma": "a", "pos": "NN"}}]},
                {"tags": [{"tag": {"lemma": "b", "pos": "NN"}}]}
            ]}"#,
        )
        .unwrap();

        let handle = document.store(&graph).unwrap();
        let loaded = AnnotatedText::load(&graph, handle).unwrap();
        assert_eq!(loaded.sentences().len(), 2);
        assert_eq!(loaded.tokens(), vec!["a", "b"]);
        assert_eq!(graph.count_nodes(Label::Sentence).unwrap(), 2);
        assert_eq!(graph.count_edges(Relationship::NextSentence).unwrap(), 1);

        document.store(&graph).unwrap();
        let reloaded = AnnotatedText::load(&graph, handle).unwrap();
        assert_eq!(reloaded.tokens(), vec!["a", "b"]);
        assert_eq!(graph.count_nodes(Label::Sentence).unwrap(), 2);
    }

    #[test]
    fn test_repeated_sentence_numbers_keep_list_order() {
        let (_dir, graph) = open_graph();
        let document = AnnotatedText::with_id("doc")
            .sentence(Sentence::new(0).tag(Tag::new("a", "NN")))
            .sentence(Sentence::new(1).tag(Tag::new("b", "NN")))
            .sentence(Sentence::new(0).tag(Tag::new("c", "NN")));

        let handle = document.store(&graph).unwrap();
        let loaded = AnnotatedText::load(&graph, handle).unwrap();
        assert_eq!(loaded.tokens(), vec!["a", "b", "c"]);
        let numbers: Vec<u32> = loaded.sentences().iter().map(|s| s.sentence_number).collect();
        assert_eq!(numbers, vec![0, 1, 0]);
    }

    #[test]
    fn test_repeated_sentence_ids_keep_every_sentence() {
        let (_dir, graph) = open_graph();
        let document = AnnotatedText::with_id("doc")
            .sentence(Sentence::new(0).with_id("s").tag(Tag::new("a", "NN")))
            .sentence(Sentence::new(1).with_id("s").tag(Tag::new("b", "NN")));

        let handle = document.store(&graph).unwrap();
        let loaded = AnnotatedText::load(&graph, handle).unwrap();
        assert_eq!(loaded.tokens(), vec!["a", "b"]);
        assert_eq!(loaded.sentences()[0].id.as_deref(), Some("s"));
    }

    #[test]
    fn test_sentence_ids_are_scoped_to_their_document() {
        let (_dir, graph) = open_graph();
        let first = AnnotatedText::with_id("doc-a")
            .sentence(Sentence::new(0).with_id("s").tag(Tag::new("a", "NN")))
            .sentence(Sentence::new(1).tag(Tag::new("b", "NN")));
        let second = AnnotatedText::with_id("doc-b")
            .sentence(Sentence::new(0).with_id("s").tag(Tag::new("x", "NN")))
            .sentence(Sentence::new(1).tag(Tag::new("y", "NN")));

        let a = first.store(&graph).unwrap();
        let b = second.store(&graph).unwrap();

        assert_eq!(AnnotatedText::load(&graph, a).unwrap().tokens(), vec!["a", "b"]);
        assert_eq!(AnnotatedText::load(&graph, b).unwrap().tokens(), vec!["x", "y"]);
        assert_eq!(graph.count_nodes(Label::Sentence).unwrap(), 4);
        assert_eq!(graph.count_edges(Relationship::NextSentence).unwrap(), 2);
    }

    #[test]
    fn test_filter_stored() {
        let (_dir, graph) = open_graph();
        nice_attack("doc-1").store(&graph).unwrap();
        numbered("doc-2", 2).store(&graph).unwrap();

        let hits = AnnotatedText::filter_stored(&graph, &FilterQuery::parse("TRUCK")).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].1, Some(ExternalId::from("doc-1")));

        let hits = AnnotatedText::filter_stored(&graph, &FilterQuery::parse("word1,truck")).unwrap();
        assert_eq!(hits.len(), 2);

        assert!(AnnotatedText::filter_stored(&graph, &FilterQuery::parse(""))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_json_round_trip() {
        let json = r#"{
            "id": "doc-9",
            "sentences": [
                {"sentence_number": 0, "tags": [{"tag": {"lemma": "nice", "pos": "NNP", "ne": "Location"}}]},
                {"sentence_number": 1, "tags": [{"tag": {"lemma": "attack", "pos": "NN"}, "weight": 2}]}
            ]
        }"#;
        let document: AnnotatedText = serde_json::from_str(json).unwrap();
        assert_eq!(document.id, Some(ExternalId::from("doc-9")));
        assert!(document.filter("nice/location"));

        let (_dir, graph) = open_graph();
        let handle = document.store(&graph).unwrap();
        let loaded = AnnotatedText::load(&graph, handle).unwrap();
        assert_eq!(loaded.sentences()[1].occurrences()[0].weight, 2);
    }
}
