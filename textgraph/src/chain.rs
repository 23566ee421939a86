//! Sentence chain traversal
//!
//! A document points at its first sentence and every sentence points at the
//! next one. Walking these links is the only way sentence order is recovered.

use std::collections::HashSet;

use crate::error::Result;
use crate::node::{NodeId, Relationship};
use crate::storage::GraphStore;

enum Cursor {
    Start,
    At(NodeId),
    Done,
}

/// Iterator over a document's sentence handles in chain order
///
/// Each sentence is yielded at most once; a link back to a sentence already
/// visited ends the walk.
pub struct SentenceChain<'g> {
    graph: &'g GraphStore,
    document: NodeId,
    cursor: Cursor,
    visited: HashSet<NodeId>,
}

impl<'g> SentenceChain<'g> {
    pub fn new(graph: &'g GraphStore, document: NodeId) -> Self {
        Self {
            graph,
            document,
            cursor: Cursor::Start,
            visited: HashSet::new(),
        }
    }

    fn step(&self, from: NodeId, rel: Relationship) -> Result<Cursor> {
        Ok(match self.graph.single_outgoing(from, rel)? {
            Some(next) => Cursor::At(next),
            None => Cursor::Done,
        })
    }
}

impl Iterator for SentenceChain<'_> {
    type Item = Result<NodeId>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Cursor::Start = self.cursor {
            match self.step(self.document, Relationship::FirstSentence) {
                Ok(cursor) => self.cursor = cursor,
                Err(e) => {
                    self.cursor = Cursor::Done;
                    return Some(Err(e));
                }
            }
        }

        let current = match std::mem::replace(&mut self.cursor, Cursor::Done) {
            Cursor::At(id) => id,
            Cursor::Start | Cursor::Done => return None,
        };
        if !self.visited.insert(current) {
            log::warn!(
                "Sentence chain of document {} loops back to {}; stopping",
                self.document,
                current
            );
            return None;
        }

        match self.step(current, Relationship::NextSentence) {
            Ok(cursor) => self.cursor = cursor,
            Err(e) => return Some(Err(e)),
        }
        Some(Ok(current))
    }
}

/// Link `sentences` into a chain hanging off `document`
///
/// Every sentence gets a containment edge; the head also gets the first
/// edge and each later sentence a next edge from its predecessor.
pub fn link_chain(graph: &GraphStore, document: NodeId, sentences: &[NodeId]) -> Result<()> {
    let mut previous: Option<NodeId> = None;
    for &sentence in sentences {
        graph.put_edge(
            document,
            Relationship::ContainsSentence,
            sentence,
            Default::default(),
        )?;
        match previous {
            None => graph.put_edge(
                document,
                Relationship::FirstSentence,
                sentence,
                Default::default(),
            )?,
            Some(prev) => graph.put_edge(
                prev,
                Relationship::NextSentence,
                sentence,
                Default::default(),
            )?,
        }
        previous = Some(sentence);
    }
    Ok(())
}
