//! Core data model (spec §3): Document, TextUnit, Entity, Relationship,
//! Claim, Community, CommunityReport, and the SOTA table row/column shape.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

/// A source document. Equality and hashing are by `id` only, matching the
/// upstream `entities/document.py` contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub title: String,
    pub abstract_: String,
    pub authors: Vec<String>,
    pub content: String,
}

impl PartialEq for Document {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}
impl Eq for Document {}

impl Hash for Document {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// An embedded, positioned chunk of a document. Immutable after creation;
/// destroyed only on a graph rebuild.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextUnit {
    pub document_id: String,
    pub text: String,
    pub unit_id: String,
    pub position: usize,
    pub number_tokens: usize,
    pub embedding: Vec<f32>,
}

impl TextUnit {
    pub fn new(
        document_id: String,
        text: String,
        position: usize,
        number_tokens: usize,
        embedding: Vec<f32>,
    ) -> Self {
        let unit_id = format!("{document_id}-{position}");
        Self {
            document_id,
            text,
            unit_id,
            position,
            number_tokens,
            embedding,
        }
    }
}

/// Entity type taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum EntityType {
    Person,
    Organization,
    Location,
    Event,
    Concept,
    Date,
    Time,
    Other,
}

/// A canonicalized entity, unique by lowercased `name` after the merge
/// phase of graph building.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub name: String,
    pub entity_type: EntityType,
    pub description: String,
}

impl Entity {
    pub fn new(name: impl Into<String>, entity_type: EntityType, description: impl Into<String>) -> Self {
        Self {
            name: name.into().to_lowercase(),
            entity_type,
            description: description.into(),
        }
    }
}

/// A directional, untyped relationship between two entity names, unique by
/// `(source, target)` after merging.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relationship {
    pub source: String,
    pub target: String,
    pub description: String,
}

/// Truth status of an optional covariate claim attached to an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClaimStatus {
    True,
    False,
    Suspected,
}

/// An optional covariate on entities, e.g. "X acquired Y in 2019".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claim {
    pub subject: String,
    pub object: String,
    pub claim_type: String,
    pub status: ClaimStatus,
    pub description: String,
    pub date_range: Option<(String, String)>,
    pub source_quotes: Vec<String>,
}

/// A community of entities produced by recursive Louvain detection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Community {
    pub id: String,
    pub level: usize,
    pub members: Vec<(String, EntityType)>,
    pub parent: Option<String>,
    pub report: Option<CommunityReport>,
}

/// LLM-produced summary of a community.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommunityReport {
    pub summary: String,
    pub key_entities: Vec<String>,
    pub key_relationships: Vec<String>,
    pub embedding: Option<Vec<f32>>,
}

/// A single paper's extracted feature values plus bibliographic metadata,
/// one row of the SOTA table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaperFeatures {
    pub authors: Vec<String>,
    pub title: String,
    pub year: i32,
    pub domain: String,
    /// column name -> extracted value. Must contain exactly the current
    /// column set (spec invariant 7).
    pub features: HashMap<String, String>,
}

pub const NOT_AVAILABLE: &str = "Not Available";
