//! KnowledgeGraph store (spec §4.3): append-only in-memory collections.
//! Deliberately does no deduplication — merging entities/relationships by
//! name is GraphBuilder's job (grounded in `graphrag/knowledge_graph.py`,
//! which is a flat set of `add_*` methods with no merge logic at all).

use crate::entities::{Claim, Community, CommunityReport, Document, Entity, Relationship, TextUnit};
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct KnowledgeGraph {
    pub documents: Vec<Document>,
    pub text_units: Vec<TextUnit>,
    pub entities: Vec<Entity>,
    pub relationships: Vec<Relationship>,
    pub claims: Vec<Claim>,
    pub communities: Vec<Community>,
    pub community_reports: Vec<CommunityReport>,
    /// text_unit_id -> provenance entities, populated during extraction.
    pub textunit_entities: HashMap<String, Vec<Entity>>,
}

impl KnowledgeGraph {
    pub fn new(documents: Vec<Document>) -> Self {
        Self {
            documents,
            ..Default::default()
        }
    }

    pub fn add_document(&mut self, document: Document) {
        if !self.documents.iter().any(|d| d.id == document.id) {
            self.documents.push(document);
        }
    }

    pub fn add_text_unit(&mut self, unit: TextUnit) {
        self.text_units.push(unit);
    }

    pub fn add_entity(&mut self, entity: Entity) {
        self.entities.push(entity);
    }

    pub fn add_relationship(&mut self, relationship: Relationship) {
        self.relationships.push(relationship);
    }

    pub fn add_claim(&mut self, claim: Claim) {
        self.claims.push(claim);
    }

    pub fn add_community(&mut self, community: Community) {
        self.communities.push(community);
    }

    pub fn add_community_report(&mut self, report: CommunityReport) {
        self.community_reports.push(report);
    }

    pub fn add_textunit_entities(&mut self, text_unit_id: String, entities: Vec<Entity>) {
        self.textunit_entities.insert(text_unit_id, entities);
    }

    /// Drops all communities and reports, in preparation for a Phase 3-4
    /// rerun (spec §4.4 incremental update: "drop all Communities/Reports
    /// and re-run Phases 3-4").
    pub fn clear_communities(&mut self) {
        self.communities.clear();
        self.community_reports.clear();
    }

    pub fn find_document(&self, id: &str) -> Option<&Document> {
        self.documents.iter().find(|d| d.id == id)
    }

    pub fn find_entity(&self, name: &str) -> Option<&Entity> {
        let lowered = name.to_lowercase();
        self.entities.iter().find(|e| e.name == lowered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::EntityType;

    #[test]
    fn add_document_is_idempotent_by_id() {
        let mut kg = KnowledgeGraph::new(vec![]);
        let doc = Document {
            id: "doc-1".into(),
            title: "T".into(),
            abstract_: "A".into(),
            authors: vec![],
            content: "C".into(),
        };
        kg.add_document(doc.clone());
        kg.add_document(doc);
        assert_eq!(kg.documents.len(), 1);
    }

    #[test]
    fn clear_communities_empties_both_lists() {
        let mut kg = KnowledgeGraph::new(vec![]);
        kg.add_community(Community {
            id: "L0_C0".into(),
            level: 0,
            members: vec![("alpha".into(), EntityType::Concept)],
            parent: None,
            report: None,
        });
        kg.clear_communities();
        assert!(kg.communities.is_empty());
        assert!(kg.community_reports.is_empty());
    }
}
