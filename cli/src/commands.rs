//! Command implementations
//!
//! Each command takes an open store and returns the text to print, so the
//! binary stays a thin argument-parsing shell.

use anyhow::Context;
use std::io::Read;
use std::path::Path;

use textgraph::{
    AnnotatedText, ExternalId, FilterOptions, FilterQuery, GraphStore, Persistable,
};

use crate::error::{CliError, CliResult};

/// Interpret a raw command-line id
pub fn parse_id(raw: &str, numeric: bool) -> CliResult<ExternalId> {
    if numeric {
        raw.trim()
            .parse::<i64>()
            .map(ExternalId::Number)
            .map_err(|_| CliError::InvalidNumericId(raw.to_string()))
    } else {
        Ok(ExternalId::Text(raw.to_string()))
    }
}

/// Read a JSON document from a file, or from stdin when `source` is `-`
pub fn read_document(source: &Path) -> anyhow::Result<AnnotatedText> {
    let raw = if source == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read document from stdin")?;
        buf
    } else {
        std::fs::read_to_string(source)
            .with_context(|| format!("Failed to read {}", source.display()))?
    };
    parse_document(&raw, &source.display().to_string())
}

/// Parse a JSON document; `origin` only labels errors
pub fn parse_document(raw: &str, origin: &str) -> anyhow::Result<AnnotatedText> {
    if raw.trim().is_empty() {
        return Err(CliError::EmptyInput(origin.to_string()).into());
    }
    serde_json::from_str(raw).with_context(|| format!("Invalid document JSON in {}", origin))
}

/// Store a document and return its handle
pub fn store(graph: &GraphStore, document: &AnnotatedText) -> anyhow::Result<String> {
    let handle = document.store(graph).context("Failed to store document")?;
    tracing::info!(
        "Stored document {} ({} sentences) as {}",
        document
            .id
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_else(|| "<anonymous>".to_string()),
        document.sentences().len(),
        handle
    );
    Ok(handle.to_string())
}

fn load_document(graph: &GraphStore, id: &ExternalId) -> anyhow::Result<AnnotatedText> {
    match AnnotatedText::load_by_id(graph, id) {
        Ok(document) => Ok(document),
        Err(e) if e.is_not_found() => Err(CliError::DocumentNotFound(id.to_string()).into()),
        Err(e) => Err(e).with_context(|| format!("Failed to load document {}", id)),
    }
}

/// Load a document and render it as pretty JSON
pub fn load(graph: &GraphStore, id: &ExternalId) -> anyhow::Result<String> {
    let document = load_document(graph, id)?;
    Ok(serde_json::to_string_pretty(&document)?)
}

/// Evaluate a filter query against one stored document
pub fn filter(
    graph: &GraphStore,
    id: &ExternalId,
    query: &str,
    options: FilterOptions,
) -> anyhow::Result<String> {
    let document = load_document(graph, id)?;
    let matched = document.filter_with(query, options);
    tracing::debug!("Filter {:?} on document {}: {}", query, id, matched);
    Ok(matched.to_string())
}

/// Ids of every stored document matching the query, one per line
///
/// Documents stored without an id are listed by their handle.
pub fn search(graph: &GraphStore, query: &str, options: FilterOptions) -> anyhow::Result<String> {
    let query = FilterQuery::parse_with(query, options);
    let hits = AnnotatedText::filter_stored(graph, &query).context("Search failed")?;
    tracing::debug!("Search matched {} documents", hits.len());

    let lines: Vec<String> = hits
        .into_iter()
        .map(|(handle, id)| match id {
            Some(id) => id.to_string(),
            None => handle.to_string(),
        })
        .collect();
    Ok(lines.join("\n"))
}

/// Node and edge counts as pretty JSON
pub fn stats(graph: &GraphStore) -> anyhow::Result<String> {
    let stats = graph.stats().context("Failed to collect stats")?;
    Ok(serde_json::to_string_pretty(&stats)?)
}
