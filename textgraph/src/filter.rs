//! Filter queries over a document's tags
//!
//! Grammar:
//!
//! ```text
//! query := term (',' term)*
//! term  := lemma ['/' ne]
//! ```
//!
//! Parsing never fails. Empty terms are skipped and a term whose NE half is
//! missing or malformed falls back to matching on the lemma alone. Terms are
//! keyed by their raw lemma text; a later term with the same lemma replaces
//! the earlier one.

use crate::tag::Tag;

/// A single parsed filter term
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryTerm {
    /// Lemma that must carry a specific NE label
    TermWithNe { lemma: String, ne: String },
    /// Lemma with any (or no) NE label
    TermLemmaOnly { lemma: String },
}

impl QueryTerm {
    pub fn lemma(&self) -> &str {
        match self {
            Self::TermWithNe { lemma, .. } | Self::TermLemmaOnly { lemma } => lemma,
        }
    }

    pub fn ne(&self) -> Option<&str> {
        match self {
            Self::TermWithNe { ne, .. } => Some(ne),
            Self::TermLemmaOnly { .. } => None,
        }
    }

    /// Case-insensitive match against one tag
    pub fn matches(&self, tag: &Tag) -> bool {
        match self {
            Self::TermWithNe { lemma, ne } => tag.lemma_matches(lemma) && tag.ne_matches(ne),
            Self::TermLemmaOnly { lemma } => tag.lemma_matches(lemma),
        }
    }
}

/// Parsing options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterOptions {
    /// Trim whitespace around each lemma and NE label
    pub trim_whitespace: bool,
}

/// A parsed filter query
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterQuery {
    terms: Vec<QueryTerm>,
}

impl FilterQuery {
    /// Parse with strict (untrimmed) tokens
    pub fn parse(query: &str) -> Self {
        Self::parse_with(query, FilterOptions::default())
    }

    pub fn parse_with(query: &str, options: FilterOptions) -> Self {
        Parser::new(query, options).parse_query()
    }

    /// Terms in first-seen order of their lemma
    pub fn terms(&self) -> &[QueryTerm] {
        &self.terms
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Whether any term matches `tag`
    pub fn matches_tag(&self, tag: &Tag) -> bool {
        self.terms.iter().any(|term| term.matches(tag))
    }

    /// Scan `tags` in order, stopping at the first match
    pub fn evaluate<'a>(&self, tags: impl IntoIterator<Item = &'a Tag>) -> bool {
        if self.is_empty() {
            return false;
        }
        tags.into_iter().any(|tag| self.matches_tag(tag))
    }

    fn insert(&mut self, term: QueryTerm) {
        match self.terms.iter_mut().find(|t| t.lemma() == term.lemma()) {
            Some(existing) => *existing = term,
            None => self.terms.push(term),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token<'q> {
    Text(&'q str),
    Comma,
    Slash,
}

fn lex(query: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut start = 0;
    for (i, c) in query.char_indices() {
        let delimiter = match c {
            ',' => Token::Comma,
            '/' => Token::Slash,
            _ => continue,
        };
        if start < i {
            tokens.push(Token::Text(&query[start..i]));
        }
        tokens.push(delimiter);
        start = i + c.len_utf8();
    }
    if start < query.len() {
        tokens.push(Token::Text(&query[start..]));
    }
    tokens
}

struct Parser<'q> {
    tokens: Vec<Token<'q>>,
    pos: usize,
    options: FilterOptions,
}

impl<'q> Parser<'q> {
    fn new(query: &'q str, options: FilterOptions) -> Self {
        Self {
            tokens: lex(query),
            pos: 0,
            options,
        }
    }

    fn peek(&self) -> Option<Token<'q>> {
        self.tokens.get(self.pos).copied()
    }

    fn advance(&mut self) {
        self.pos += 1;
    }

    fn parse_query(mut self) -> FilterQuery {
        let mut query = FilterQuery::default();
        loop {
            if let Some(term) = self.parse_term() {
                query.insert(term);
            }
            match self.peek() {
                Some(Token::Comma) => self.advance(),
                _ => break,
            }
        }
        query
    }

    fn parse_term(&mut self) -> Option<QueryTerm> {
        let mut parts = vec![self.parse_segment()];
        while let Some(Token::Slash) = self.peek() {
            self.advance();
            parts.push(self.parse_segment());
        }
        self.classify(parts)
    }

    fn parse_segment(&mut self) -> &'q str {
        match self.peek() {
            Some(Token::Text(text)) => {
                self.advance();
                if self.options.trim_whitespace {
                    text.trim()
                } else {
                    text
                }
            }
            _ => "",
        }
    }

    /// Trailing empty parts are dropped; exactly two parts carry an NE,
    /// anything else degrades to the first part alone.
    fn classify(&self, mut parts: Vec<&'q str>) -> Option<QueryTerm> {
        while parts.last().is_some_and(|p| p.is_empty()) {
            parts.pop();
        }

        let lemma = *parts.first()?;
        if lemma.is_empty() {
            return None;
        }

        Some(match parts.as_slice() {
            [_, ne] => QueryTerm::TermWithNe {
                lemma: lemma.to_string(),
                ne: ne.to_string(),
            },
            _ => QueryTerm::TermLemmaOnly {
                lemma: lemma.to_string(),
            },
        })
    }
}
