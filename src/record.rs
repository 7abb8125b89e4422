use serde::{Deserialize, Serialize};

/// Separator placed between title and description in `combined_text`.
pub const COMBINED_TEXT_SEPARATOR: &str = ". ";

/// Placeholder used for any title or description that is missing or empty.
pub const MISSING_FIELD_PLACEHOLDER: &str = "Information Not Available";

/// One row of the raw catalog as produced by the data-acquisition step.
///
/// Every column is optional so that a sparse row still parses; unknown
/// columns are ignored by serde.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct RawRecord {
    #[serde(rename = "Title", default)]
    pub title: Option<String>,
    #[serde(rename = "Description", default)]
    pub description: Option<String>,
    #[serde(rename = "URL", default)]
    pub url: Option<String>,
}

/// A raw record after normalization. No field is ever empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct CanonicalRecord {
    #[serde(rename = "Title")]
    pub title: String,
    #[serde(rename = "Description")]
    pub description: String,
    #[serde(rename = "URL")]
    pub url: String,
}

impl CanonicalRecord {
    /// The text that gets embedded for this record.
    pub fn combined_text(&self) -> String {
        format!(
            "{}{}{}",
            self.title, COMBINED_TEXT_SEPARATOR, self.description
        )
    }

    /// Attach an embedding, computing `combined_text` exactly once.
    pub fn into_embedded(self, embedding: Vec<f32>) -> EmbeddedRecord {
        let combined_text = self.combined_text();
        EmbeddedRecord {
            id: None,
            title: self.title,
            description: self.description,
            url: self.url,
            combined_text,
            embedding,
        }
    }
}

/// A canonical record together with its embedding, as stored in the
/// embedding artifact. `id` is absent until `assign_ids` runs.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct EmbeddedRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "Title")]
    pub title: String,
    #[serde(rename = "Description")]
    pub description: String,
    #[serde(rename = "URL")]
    pub url: String,
    pub combined_text: String,
    pub embedding: Vec<f32>,
}

impl EmbeddedRecord {
    /// Convert into an index document. Returns `None` when no id is set.
    pub fn to_document(&self) -> Option<Document> {
        let id = self.id.clone()?;
        Some(Document {
            id,
            title: self.title.clone(),
            description: self.description.clone(),
            url: self.url.clone(),
            combined_text: self.combined_text.clone(),
            embedding: self.embedding.clone(),
        })
    }
}

/// A record as it lives inside a collection: the id is mandatory.
///
/// `embedding` defaults to empty because search responses may exclude it.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Document {
    pub id: String,
    #[serde(rename = "Title")]
    pub title: String,
    #[serde(rename = "Description")]
    pub description: String,
    #[serde(rename = "URL")]
    pub url: String,
    pub combined_text: String,
    #[serde(default)]
    pub embedding: Vec<f32>,
}

/// A single nearest-neighbor match.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub document: Document,
    /// Cosine distance to the query; `None` when the backend omitted it.
    pub distance: Option<f32>,
}

/// The fields shown to a user for one hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisplayRecord {
    #[serde(rename = "Title")]
    pub title: String,
    #[serde(rename = "Description")]
    pub description: String,
    #[serde(rename = "URL")]
    pub url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn canonical(title: &str, description: &str) -> CanonicalRecord {
        CanonicalRecord {
            title: title.to_string(),
            description: description.to_string(),
            url: "u".to_string(),
        }
    }

    #[test]
    fn test_combined_text_uses_period_separator() {
        assert_eq!(canonical("A", "B").combined_text(), "A. B");
    }

    #[test]
    fn test_into_embedded_keeps_fields() {
        let record = canonical("Printer", "Resin 3D printer").into_embedded(vec![0.5, 0.5]);
        assert_eq!(record.id, None);
        assert_eq!(record.combined_text, "Printer. Resin 3D printer");
        assert_eq!(record.embedding, vec![0.5, 0.5]);
    }

    #[test]
    fn test_to_document_requires_id() {
        let mut record = canonical("A", "B").into_embedded(vec![1.0]);
        assert!(record.to_document().is_none());

        record.id = Some("7".to_string());
        let doc = record.to_document().unwrap();
        assert_eq!(doc.id, "7");
        assert_eq!(doc.combined_text, "A. B");
    }

    #[test]
    fn test_embedded_record_json_field_names() {
        let mut record = canonical("A", "B").into_embedded(vec![1.0]);
        let json = serde_json::to_value(&record).unwrap();
        assert!(json.get("id").is_none());
        assert_eq!(json["Title"], "A");
        assert_eq!(json["URL"], "u");
        assert_eq!(json["combined_text"], "A. B");

        record.id = Some("0".to_string());
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["id"], "0");
    }

    #[test]
    fn test_document_without_embedding_deserializes() {
        let doc: Document = serde_json::from_str(
            r#"{"id":"1","Title":"A","Description":"B","URL":"u","combined_text":"A. B"}"#,
        )
        .unwrap();
        assert!(doc.embedding.is_empty());
    }
}
