//! Data types shared between extraction, export, and the API client.
//!
//! Remote resources are modeled as serde views of the service's response
//! envelopes. Fields the service does not guarantee are `Option` with an
//! explicit fallback resolution order at the use site, rather than being
//! probed dynamically.

use serde::{Deserialize, Serialize};

/// One independently exportable piece of extracted content.
///
/// A page may yield several blocks (research conversations do); each block
/// is immutable once created and carries the index of the container it was
/// extracted from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContentBlock {
    /// Block title, falling back to a generated one when the page has none.
    pub title: String,
    /// The block body as Markdown.
    pub content: String,
    /// Document-order index of the source container.
    pub source_index: usize,
}

/// Transient pairing state between the challenge and verify steps.
///
/// Created by a challenge request, consumed by the verification request,
/// and dropped after success or cancellation. At most one exists at a time.
#[derive(Debug, Clone)]
pub struct PairingSession {
    pub challenge_id: String,
    pub app_name: String,
}

/// Generic listing envelope: `{"data": [...]}`.
///
/// The service omits `data` on empty listings, which deserializes to an
/// empty vec.
#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct DataEnvelope<T> {
    #[serde(default)]
    pub data: Vec<T>,
}

/// A top-level container (workspace) in the knowledge base.
#[derive(Debug, Clone, Deserialize)]
pub struct Space {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// A content schema within a space.
#[derive(Debug, Clone, Deserialize)]
pub struct ObjectType {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    /// Stable key used when creating objects of this type.
    #[serde(default)]
    pub key: Option<String>,
}

/// A pre-filled instance of a type, selectable at object creation.
#[derive(Debug, Clone, Deserialize)]
pub struct Template {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// A property definition within a space.
#[derive(Debug, Clone, Deserialize)]
pub struct Property {
    pub id: String,
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// A tag option on a multi-select property.
#[derive(Debug, Clone, Deserialize)]
pub struct Tag {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
}

/// Challenge response; the service has shipped both field names.
///
/// Resolution order is `id` first, then `challenge_id`.
#[derive(Debug, Deserialize)]
pub struct ChallengeResponse {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub challenge_id: Option<String>,
}

impl ChallengeResponse {
    /// Resolves the challenge id with the documented fallback order.
    pub fn resolve(self) -> Option<String> {
        self.id.or(self.challenge_id)
    }
}

/// Key-exchange response for the verify step.
#[derive(Debug, Deserialize)]
pub struct ApiKeyResponse {
    #[serde(default)]
    pub api_key: Option<String>,
}

/// Request payload for tag creation.
#[derive(Debug, Clone, Serialize)]
pub struct NewTag {
    pub name: String,
    pub color: String,
}

/// A property value attached to a created object.
///
/// Only multi-select assignment is used today (tags under the fixed
/// `"tag"` key).
#[derive(Debug, Clone, Serialize)]
pub struct ObjectProperty {
    pub key: String,
    pub multi_select: Vec<String>,
}

/// Request payload for object creation.
#[derive(Debug, Clone, Serialize)]
pub struct CreateObjectRequest {
    pub name: String,
    pub type_key: String,
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<Vec<ObjectProperty>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_missing_data_is_empty() {
        let envelope: DataEnvelope<Space> = serde_json::from_str("{}").unwrap();
        assert!(envelope.data.is_empty());
    }

    #[test]
    fn test_envelope_with_data() {
        let envelope: DataEnvelope<Space> =
            serde_json::from_str(r#"{"data": [{"id": "s1", "name": "Work"}]}"#).unwrap();
        assert_eq!(envelope.data.len(), 1);
        assert_eq!(envelope.data[0].id, "s1");
        assert_eq!(envelope.data[0].name.as_deref(), Some("Work"));
    }

    #[test]
    fn test_challenge_prefers_id() {
        let resp: ChallengeResponse =
            serde_json::from_str(r#"{"id": "a", "challenge_id": "b"}"#).unwrap();
        assert_eq!(resp.resolve(), Some("a".to_string()));
    }

    #[test]
    fn test_challenge_falls_back_to_challenge_id() {
        let resp: ChallengeResponse = serde_json::from_str(r#"{"challenge_id": "b"}"#).unwrap();
        assert_eq!(resp.resolve(), Some("b".to_string()));
    }

    #[test]
    fn test_challenge_neither_field() {
        let resp: ChallengeResponse = serde_json::from_str(r#"{"other": 1}"#).unwrap();
        assert_eq!(resp.resolve(), None);
    }

    #[test]
    fn test_create_object_skips_absent_optionals() {
        let req = CreateObjectRequest {
            name: "Clip".into(),
            type_key: "page".into(),
            body: "# Clip".into(),
            template_id: None,
            properties: None,
        };

        let json = serde_json::to_string(&req).unwrap();
        assert!(!json.contains("template_id"));
        assert!(!json.contains("properties"));
    }

    #[test]
    fn test_create_object_with_tags() {
        let req = CreateObjectRequest {
            name: "Clip".into(),
            type_key: "page".into(),
            body: "body".into(),
            template_id: Some("t1".into()),
            properties: Some(vec![ObjectProperty {
                key: "tag".into(),
                multi_select: vec!["tag1".into(), "tag2".into()],
            }]),
        };

        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains(r#""template_id":"t1""#));
        assert!(json.contains(r#""multi_select":["tag1","tag2"]"#));
    }
}
