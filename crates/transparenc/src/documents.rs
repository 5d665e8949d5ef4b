//! Legislative document records and the shape-sniffing of retrieval payloads.
//!
//! The retrieval service has answered with several payload shapes over time
//! (`{type: "summaries", results}`, `{type: "chunks", chunks}`, a bare
//! `result` array, a bare `results` array). None of them is a contract, so
//! classification is tolerant and anything unrecognised falls through to
//! [`RetrievalView::Other`].

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

pub const UNTITLED_DOCUMENT: &str = "Untitled document";

/// One retrieved document.
///
/// Deserialization never rejects an object: a null or missing `id` falls back
/// to `metadata.id`, and scalar fields accept strings, numbers or booleans.
/// Records that still have no id are shown but cannot be selected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawDocument")]
pub struct DocumentRecord {
    pub id: String,
    pub metadata: DocumentMetadata,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DocumentMetadata {
    #[serde(default, deserialize_with = "optional_scalar", skip_serializing_if = "Option::is_none")]
    pub short_title: Option<String>,
    #[serde(default, deserialize_with = "optional_scalar", skip_serializing_if = "Option::is_none")]
    pub long_title: Option<String>,
    #[serde(default, deserialize_with = "optional_scalar", skip_serializing_if = "Option::is_none")]
    pub first_reading: Option<String>,
    /// Either a JSON array or a Python-repr string like `"['A', 'B']"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sponsors: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A section of a single document returned by chunk-level retrieval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentChunk {
    #[serde(default, deserialize_with = "text_or_empty")]
    pub content: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Wire shape of a document before the id is resolved.
#[derive(Deserialize)]
struct RawDocument {
    #[serde(default, deserialize_with = "optional_scalar")]
    id: Option<String>,
    #[serde(default, deserialize_with = "lenient_metadata")]
    metadata: DocumentMetadata,
    #[serde(default, deserialize_with = "optional_scalar")]
    page_content: Option<String>,
    #[serde(default, deserialize_with = "optional_scalar")]
    summary: Option<String>,
}

impl From<RawDocument> for DocumentRecord {
    fn from(raw: RawDocument) -> Self {
        let id = raw
            .id
            .filter(|id| !id.trim().is_empty())
            .or_else(|| raw.metadata.extra.get("id").and_then(scalar_text))
            .unwrap_or_default();
        Self {
            id,
            metadata: raw.metadata,
            page_content: raw.page_content,
            summary: raw.summary,
        }
    }
}

/// Strings, numbers and booleans as text; null, arrays and objects as `None`.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

fn optional_scalar<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(scalar_text(&Value::deserialize(deserializer)?))
}

fn text_or_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(value_as_text(&Value::deserialize(deserializer)?).unwrap_or_default())
}

fn lenient_metadata<'de, D>(deserializer: D) -> Result<DocumentMetadata, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        value @ Value::Object(_) => DocumentMetadata::deserialize(value).map_err(serde::de::Error::custom),
        other => {
            debug!("Ignoring non-object document metadata: {}", other);
            Ok(DocumentMetadata::default())
        }
    }
}

impl DocumentRecord {
    /// Short title when present, otherwise the raw id.
    pub fn display_title(&self) -> &str {
        match self.metadata.short_title.as_deref().filter(|t| !t.trim().is_empty()) {
            Some(title) => title,
            None if self.has_id() => &self.id,
            None => UNTITLED_DOCUMENT,
        }
    }

    /// Only records with an id can be remembered or selected.
    pub fn has_id(&self) -> bool {
        !self.id.trim().is_empty()
    }

    /// Stand-in for a result entry that is not a JSON object.
    fn from_loose(value: &Value) -> Self {
        Self {
            id: String::new(),
            metadata: DocumentMetadata::default(),
            page_content: value_as_text(value),
            summary: None,
        }
    }

    /// Page content, falling back to the summary.
    pub fn body(&self) -> &str {
        self.page_content
            .as_deref()
            .or(self.summary.as_deref())
            .unwrap_or("")
    }

    pub fn sponsors(&self) -> Vec<String> {
        self.metadata.sponsors_list()
    }
}

impl DocumentMetadata {
    pub fn sponsors_list(&self) -> Vec<String> {
        match &self.sponsors {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items.iter().filter_map(value_as_text).collect(),
            Some(Value::String(raw)) => parse_sponsor_string(raw),
            Some(other) => value_as_text(other).into_iter().collect(),
        }
    }
}

fn value_as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

/// Sponsors were indexed as Python list reprs. Swap the quotes and read it as
/// JSON; if that still fails, treat the whole string as one sponsor.
fn parse_sponsor_string(raw: &str) -> Vec<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }
    match serde_json::from_str::<Vec<Value>>(&trimmed.replace('\'', "\"")) {
        Ok(items) => items.iter().filter_map(value_as_text).collect(),
        Err(e) => {
            debug!("Sponsors field is not a list ({}), keeping it verbatim", e);
            vec![trimmed.to_string()]
        }
    }
}

/// How a retrieval payload should be presented.
#[derive(Debug, Clone, PartialEq)]
pub enum RetrievalView {
    Summaries(Vec<DocumentRecord>),
    Chunks(Vec<DocumentChunk>),
    Results(Vec<DocumentRecord>),
    Other,
}

impl RetrievalView {
    pub fn classify(payload: &Value) -> Self {
        let Some(object) = payload.as_object() else {
            return RetrievalView::Other;
        };
        let kind = object.get("type").and_then(Value::as_str);

        if kind == Some("summaries") {
            if let Some(docs) = object.get("results").and_then(parse_documents) {
                return RetrievalView::Summaries(docs);
            }
        }
        if kind == Some("chunks") {
            if let Some(chunks) = object.get("chunks").and_then(parse_chunks) {
                return RetrievalView::Chunks(chunks);
            }
        }
        if let Some(docs) = object.get("result").and_then(parse_documents) {
            return RetrievalView::Results(docs);
        }
        if let Some(docs) = object.get("results").and_then(parse_documents) {
            return RetrievalView::Results(docs);
        }
        RetrievalView::Other
    }

    /// Documents that should be remembered by the session, if any.
    pub fn documents(&self) -> &[DocumentRecord] {
        match self {
            RetrievalView::Summaries(docs) | RetrievalView::Results(docs) => docs,
            RetrievalView::Chunks(_) | RetrievalView::Other => &[],
        }
    }
}

/// Parses an array of documents, one record per entry.
fn parse_documents(value: &Value) -> Option<Vec<DocumentRecord>> {
    let items = value.as_array()?;
    let docs = items
        .iter()
        .map(|item| {
            DocumentRecord::deserialize(item).unwrap_or_else(|e| {
                debug!("Keeping malformed document in retrieval payload as text: {}", e);
                DocumentRecord::from_loose(item)
            })
        })
        .collect();
    Some(docs)
}

fn parse_chunks(value: &Value) -> Option<Vec<DocumentChunk>> {
    let items = value.as_array()?;
    Some(
        items
            .iter()
            .map(|item| {
                DocumentChunk::deserialize(item).unwrap_or_else(|_| DocumentChunk {
                    content: value_as_text(item).unwrap_or_default(),
                    extra: Map::new(),
                })
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_doc(id: &str) -> Value {
        json!({
            "id": id,
            "metadata": {
                "short_title": format!("R{}", id),
                "long_title": "A Resolution Supporting Reapportionment",
                "first_reading": "2024-02-07",
                "sponsors": "['Sen. Alvarez', 'Sen. Brooks']",
                "session": 104
            },
            "summary": "Reapportions senate seats by college."
        })
    }

    #[test]
    fn test_classify_summaries() {
        let payload = json!({"type": "summaries", "results": [sample_doc("29"), sample_doc("30")]});
        match RetrievalView::classify(&payload) {
            RetrievalView::Summaries(docs) => {
                assert_eq!(docs.len(), 2);
                assert_eq!(docs[0].id, "29");
                assert_eq!(docs[0].display_title(), "R29");
            }
            other => panic!("unexpected view: {:?}", other),
        }
    }

    #[test]
    fn test_classify_chunks() {
        let payload = json!({"type": "chunks", "chunks": [{"content": "Section 1."}, {"content": "Section 2."}]});
        match RetrievalView::classify(&payload) {
            RetrievalView::Chunks(chunks) => {
                assert_eq!(chunks.len(), 2);
                assert_eq!(chunks[1].content, "Section 2.");
            }
            other => panic!("unexpected view: {:?}", other),
        }
        assert!(RetrievalView::classify(&payload).documents().is_empty());
    }

    #[test]
    fn test_classify_bare_result_and_results() {
        let result = json!({"result": [sample_doc("1")]});
        let results = json!({"results": [sample_doc("2")]});

        assert!(matches!(RetrievalView::classify(&result), RetrievalView::Results(ref d) if d[0].id == "1"));
        assert!(matches!(RetrievalView::classify(&results), RetrievalView::Results(ref d) if d[0].id == "2"));
    }

    #[test]
    fn test_classify_other_shapes() {
        assert_eq!(RetrievalView::classify(&json!("plain")), RetrievalView::Other);
        assert_eq!(RetrievalView::classify(&json!({"detail": "Not Found"})), RetrievalView::Other);
        // summaries without results is not enough
        assert_eq!(RetrievalView::classify(&json!({"type": "summaries"})), RetrievalView::Other);
    }

    #[test]
    fn test_numeric_ids_are_normalized() {
        let doc: DocumentRecord = serde_json::from_value(json!({"id": 17, "metadata": {}})).unwrap();
        assert_eq!(doc.id, "17");
        assert_eq!(doc.display_title(), "17");
    }

    #[test]
    fn test_sponsors_from_python_repr_and_array() {
        let doc: DocumentRecord = serde_json::from_value(sample_doc("5")).unwrap();
        assert_eq!(doc.sponsors(), vec!["Sen. Alvarez", "Sen. Brooks"]);

        let metadata = DocumentMetadata {
            sponsors: Some(json!(["A", "B"])),
            ..Default::default()
        };
        assert_eq!(metadata.sponsors_list(), vec!["A", "B"]);

        let odd = DocumentMetadata {
            sponsors: Some(json!("Student Senate")),
            ..Default::default()
        };
        assert_eq!(odd.sponsors_list(), vec!["Student Senate"]);
    }

    #[test]
    fn test_unknown_metadata_survives_round_trip() {
        let original = sample_doc("8");
        let doc: DocumentRecord = serde_json::from_value(original.clone()).unwrap();
        assert_eq!(doc.metadata.extra.get("session"), Some(&json!(104)));
        assert_eq!(serde_json::to_value(&doc).unwrap(), original);
    }

    #[test]
    fn test_documents_without_top_level_id_are_kept() {
        let payload = json!({"type": "summaries", "results": [
            {"id": null, "metadata": {"id": "29", "short_title": "R29"}},
            {"metadata": {"first_reading": 20240207}},
            {"id": "31"}
        ]});
        let view = RetrievalView::classify(&payload);
        let docs = view.documents();

        assert_eq!(docs.len(), 3);
        assert_eq!(docs[0].id, "29");
        assert_eq!(docs[0].display_title(), "R29");
        assert!(!docs[1].has_id());
        assert_eq!(docs[1].metadata.first_reading.as_deref(), Some("20240207"));
        assert_eq!(docs[1].display_title(), UNTITLED_DOCUMENT);
        assert_eq!(docs[2].id, "31");
    }

    #[test]
    fn test_scalar_metadata_fields_are_tolerated() {
        let doc: DocumentRecord = serde_json::from_value(json!({
            "id": "3",
            "metadata": {"short_title": 29, "long_title": true, "first_reading": null, "sponsors": null},
            "summary": 12
        }))
        .unwrap();
        assert_eq!(doc.metadata.short_title.as_deref(), Some("29"));
        assert_eq!(doc.metadata.long_title.as_deref(), Some("true"));
        assert_eq!(doc.metadata.first_reading, None);
        assert_eq!(doc.body(), "12");

        let bare: DocumentRecord = serde_json::from_value(json!({"id": 4, "metadata": null})).unwrap();
        assert_eq!(bare.id, "4");
        assert_eq!(bare.metadata, DocumentMetadata::default());
    }

    #[test]
    fn test_non_object_entries_still_count() {
        let payload = json!({"results": ["stray text", {"id": "1"}]});
        let view = RetrievalView::classify(&payload);
        assert_eq!(view.documents().len(), 2);
        assert_eq!(view.documents()[0].body(), "stray text");
        assert_eq!(view.documents()[1].id, "1");
    }

    #[test]
    fn test_body_prefers_page_content() {
        let doc = DocumentRecord {
            id: "1".into(),
            metadata: DocumentMetadata::default(),
            page_content: Some("full text".into()),
            summary: Some("short".into()),
        };
        assert_eq!(doc.body(), "full text");
    }
}
