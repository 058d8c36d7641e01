//! Canonical metadata documents and their codec.
//!
//! The persisted document is the wire contract: struct field order fixes
//! the byte encoding, and `attributes` carries the completed-count and
//! certification summary first, then one score entry per module in
//! ascending order. Decoding verifies labels positionally under an
//! explicit schema tag rather than scanning label text, and coerces
//! values from JSON numbers or the stringified integers older writers
//! produced.

use serde::{Deserialize, Serialize};

use crate::types::{Result, TalmidError, Token, MODULE_COUNT};

/// Schema tag written into every document
pub const SCHEMA_VERSION: &str = "talmid/1";

const TRAIT_COMPLETED: &str = "Completed Modules";
const TRAIT_CERTIFICATION: &str = "Certification Status";
const CERTIFIED: &str = "Certified";
const NOT_CERTIFIED: &str = "Not Certified";

/// Structured point-in-time view of a token's progress
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataSnapshot {
    pub token_id: u64,
    pub completed_modules: u8,
    pub certified: bool,
    pub module_scores: [u64; MODULE_COUNT],
}

/// One attribute entry in the persisted document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub trait_type: String,
    pub value: AttrValue,
}

/// Attribute values arrive as JSON numbers from this writer and as
/// stringified integers from older writers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Int(u64),
    Text(String),
}

impl AttrValue {
    fn as_int(&self) -> Option<u64> {
        match self {
            AttrValue::Int(n) => Some(*n),
            AttrValue::Text(s) => s.parse().ok(),
        }
    }

    fn as_text(&self) -> Option<&str> {
        match self {
            AttrValue::Text(s) => Some(s),
            AttrValue::Int(_) => None,
        }
    }
}

/// Persisted document; serialization order is the canonical encoding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenDocument {
    /// Versioned schema tag; absent in pre-tag documents
    #[serde(default = "default_schema")]
    pub schema: String,
    pub name: String,
    pub description: String,
    pub image: String,
    pub attributes: Vec<Attribute>,
}

fn default_schema() -> String {
    SCHEMA_VERSION.to_string()
}

fn module_label(module: usize) -> String {
    format!("Module {module} Score")
}

impl MetadataSnapshot {
    /// Deterministic snapshot of a ledger token
    pub fn of(token: &Token) -> Self {
        Self {
            token_id: token.token_id,
            completed_modules: token.num_completed_modules,
            certified: token.is_certified,
            module_scores: token.module_scores,
        }
    }

    /// Pin name convention for a token's snapshots
    pub fn pin_name(token_id: u64) -> String {
        format!("Token_{token_id}.json")
    }

    /// Render the canonical document
    pub fn to_document(&self) -> TokenDocument {
        let mut attributes = Vec::with_capacity(2 + MODULE_COUNT);
        attributes.push(Attribute {
            trait_type: TRAIT_COMPLETED.to_string(),
            value: AttrValue::Int(self.completed_modules as u64),
        });
        attributes.push(Attribute {
            trait_type: TRAIT_CERTIFICATION.to_string(),
            value: AttrValue::Text(
                if self.certified { CERTIFIED } else { NOT_CERTIFIED }.to_string(),
            ),
        });
        for (idx, score) in self.module_scores.iter().enumerate() {
            attributes.push(Attribute {
                trait_type: module_label(idx + 1),
                value: AttrValue::Int(*score),
            });
        }

        TokenDocument {
            schema: SCHEMA_VERSION.to_string(),
            name: format!("Talmid #{}", self.token_id),
            description: "Learning progress record: completed modules, per-module scores, \
                          and certification status for this token."
                .to_string(),
            image: format!("https://talmid.example/images/token_{}.png", self.token_id),
            attributes,
        }
    }

    /// Canonical byte encoding of this snapshot
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(&self.to_document())?)
    }

    /// Parse canonical bytes back into a structured snapshot
    pub fn decode(token_id: u64, bytes: &[u8]) -> Result<Self> {
        let doc: TokenDocument = serde_json::from_slice(bytes)
            .map_err(|e| TalmidError::SchemaParse(format!("malformed document: {e}")))?;
        Self::from_document(token_id, &doc)
    }

    /// Reconcile a retrieved document into the structured shape.
    ///
    /// Labels are verified in their fixed positions; mismatches are
    /// schema errors, never silent skips.
    pub fn from_document(token_id: u64, doc: &TokenDocument) -> Result<Self> {
        if doc.schema != SCHEMA_VERSION {
            return Err(TalmidError::SchemaParse(format!(
                "unsupported schema version: {}",
                doc.schema
            )));
        }
        let expected = 2 + MODULE_COUNT;
        if doc.attributes.len() != expected {
            return Err(TalmidError::SchemaParse(format!(
                "expected {expected} attributes, got {}",
                doc.attributes.len()
            )));
        }

        let completed = &doc.attributes[0];
        if completed.trait_type != TRAIT_COMPLETED {
            return Err(TalmidError::SchemaParse(format!(
                "attribute 0: expected \"{TRAIT_COMPLETED}\", got \"{}\"",
                completed.trait_type
            )));
        }
        let completed_modules = completed.value.as_int().ok_or_else(|| {
            TalmidError::SchemaParse("completed-modules value is not an integer".into())
        })?;
        if completed_modules > MODULE_COUNT as u64 {
            return Err(TalmidError::SchemaParse(format!(
                "completed-modules count {completed_modules} exceeds {MODULE_COUNT}"
            )));
        }

        let certification = &doc.attributes[1];
        if certification.trait_type != TRAIT_CERTIFICATION {
            return Err(TalmidError::SchemaParse(format!(
                "attribute 1: expected \"{TRAIT_CERTIFICATION}\", got \"{}\"",
                certification.trait_type
            )));
        }
        let certified = match certification.value.as_text() {
            Some(CERTIFIED) => true,
            Some(NOT_CERTIFIED) => false,
            other => {
                return Err(TalmidError::SchemaParse(format!(
                    "certification status must be \"{CERTIFIED}\" or \"{NOT_CERTIFIED}\", got {other:?}"
                )))
            }
        };

        let mut module_scores = [0u64; MODULE_COUNT];
        for (idx, score) in module_scores.iter_mut().enumerate() {
            let attr = &doc.attributes[2 + idx];
            let label = module_label(idx + 1);
            if attr.trait_type != label {
                return Err(TalmidError::SchemaParse(format!(
                    "attribute {}: expected \"{label}\", got \"{}\"",
                    2 + idx,
                    attr.trait_type
                )));
            }
            *score = attr.value.as_int().ok_or_else(|| {
                TalmidError::SchemaParse(format!("\"{label}\" value is not an integer"))
            })?;
        }

        Ok(Self {
            token_id,
            completed_modules: completed_modules as u8,
            certified,
            module_scores,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> MetadataSnapshot {
        MetadataSnapshot {
            token_id: 4,
            completed_modules: 3,
            certified: false,
            module_scores: [10, 20, 30, 0, 0, 0, 0, 0, 0, 0],
        }
    }

    #[test]
    fn attribute_order_is_fixed() {
        let snap = MetadataSnapshot {
            token_id: 1,
            completed_modules: 10,
            certified: true,
            module_scores: [10, 20, 30, 40, 50, 60, 70, 80, 90, 100],
        };
        let doc = snap.to_document();

        assert_eq!(doc.attributes[0].trait_type, "Completed Modules");
        assert_eq!(doc.attributes[1].trait_type, "Certification Status");
        assert_eq!(doc.attributes[1].value, AttrValue::Text("Certified".into()));
        for module in 1..=MODULE_COUNT {
            let attr = &doc.attributes[1 + module];
            assert_eq!(attr.trait_type, format!("Module {module} Score"));
            assert_eq!(attr.value, AttrValue::Int(module as u64 * 10));
        }
    }

    #[test]
    fn encode_decode_round_trip() {
        let snap = snapshot();
        let bytes = snap.encode().unwrap();
        let decoded = MetadataSnapshot::decode(4, &bytes).unwrap();
        assert_eq!(decoded, snap);
    }

    #[test]
    fn round_trip_preserves_certification() {
        for certified in [false, true] {
            let mut snap = snapshot();
            snap.certified = certified;
            snap.completed_modules = 10;
            let decoded = MetadataSnapshot::decode(4, &snap.encode().unwrap()).unwrap();
            assert_eq!(decoded.certified, certified);
        }
    }

    #[test]
    fn decodes_stringified_values() {
        // Older writers stored uint256 values as strings
        let mut doc = snapshot().to_document();
        doc.attributes[0].value = AttrValue::Text("3".into());
        doc.attributes[2].value = AttrValue::Text("10".into());
        let bytes = serde_json::to_vec(&doc).unwrap();

        let decoded = MetadataSnapshot::decode(4, &bytes).unwrap();
        assert_eq!(decoded.completed_modules, 3);
        assert_eq!(decoded.module_scores[0], 10);
    }

    #[test]
    fn decodes_documents_without_schema_tag() {
        let doc = snapshot().to_document();
        let mut raw = serde_json::to_value(&doc).unwrap();
        raw.as_object_mut().unwrap().remove("schema");
        let bytes = serde_json::to_vec(&raw).unwrap();

        let decoded = MetadataSnapshot::decode(4, &bytes).unwrap();
        assert_eq!(decoded, snapshot());
    }

    #[test]
    fn rejects_unknown_schema_version() {
        let mut doc = snapshot().to_document();
        doc.schema = "talmid/9".into();
        let bytes = serde_json::to_vec(&doc).unwrap();

        let err = MetadataSnapshot::decode(4, &bytes).unwrap_err();
        assert!(matches!(err, TalmidError::SchemaParse(_)));
    }

    #[test]
    fn rejects_shuffled_attributes() {
        let mut doc = snapshot().to_document();
        doc.attributes.swap(0, 1);
        let bytes = serde_json::to_vec(&doc).unwrap();

        let err = MetadataSnapshot::decode(4, &bytes).unwrap_err();
        assert!(matches!(err, TalmidError::SchemaParse(_)));
    }

    #[test]
    fn rejects_missing_attributes() {
        let mut doc = snapshot().to_document();
        doc.attributes.pop();
        let bytes = serde_json::to_vec(&doc).unwrap();

        let err = MetadataSnapshot::decode(4, &bytes).unwrap_err();
        assert!(matches!(err, TalmidError::SchemaParse(_)));
    }

    #[test]
    fn rejects_non_numeric_score() {
        let mut doc = snapshot().to_document();
        doc.attributes[5].value = AttrValue::Text("ninety".into());
        let bytes = serde_json::to_vec(&doc).unwrap();

        let err = MetadataSnapshot::decode(4, &bytes).unwrap_err();
        assert!(matches!(err, TalmidError::SchemaParse(_)));
    }

    #[test]
    fn rejects_out_of_range_completed_count() {
        let mut doc = snapshot().to_document();
        doc.attributes[0].value = AttrValue::Int(11);
        let bytes = serde_json::to_vec(&doc).unwrap();

        let err = MetadataSnapshot::decode(4, &bytes).unwrap_err();
        assert!(matches!(err, TalmidError::SchemaParse(_)));
    }

    #[test]
    fn snapshot_is_deterministic() {
        let token = Token {
            token_id: 2,
            owner: "0xowner".into(),
            base_uri: "https://gw/".into(),
            module_scores: [5; MODULE_COUNT],
            completed: [true; MODULE_COUNT],
            num_completed_modules: 10,
            is_certified: true,
        };
        let a = MetadataSnapshot::of(&token);
        let b = MetadataSnapshot::of(&token);
        assert_eq!(a, b);
        assert_eq!(a.encode().unwrap(), b.encode().unwrap());
    }
}
