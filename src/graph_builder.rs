//! GraphBuilder (spec §4.4): turns a corpus into a knowledge graph via a
//! four-phase pipeline, plus an incremental update entry point.
//!
//! Grounded in `graphrag/graphrag.py`'s `build_knowledge_graph` /
//! `update_knowledge_graph` / `detect_communities`. Community detection is
//! enriched from the wider example pack (`petgraph`, used for graph
//! structures across several retrieved repos) since the teacher crate has
//! no graph-algorithm module of its own.

use crate::chunker::{ChunkerConfig, TextChunker};
use crate::config::GraphSettings;
use crate::entities::{Community, CommunityReport, Document, Entity, EntityType, Relationship, TextUnit};
use crate::knowledge_graph::KnowledgeGraph;
use crate::ports::{generate, Embedder, JsonModelClient, ModelSchema};
use petgraph::graphmap::UnGraphMap;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

/// `{entities: [...], relationships: [...]}` extraction schema (spec §4.4
/// Phase 2).
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ExtractionResult {
    #[serde(default)]
    pub entities: Vec<ExtractedEntity>,
    #[serde(default)]
    pub relationships: Vec<ExtractedRelationship>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExtractedEntity {
    pub name: String,
    #[serde(rename = "type")]
    pub entity_type: EntityType,
    pub description: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExtractedRelationship {
    pub source: String,
    pub target: String,
    pub description: String,
}

impl ModelSchema for ExtractionResult {
    fn schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "entities": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "name": {"type": "string"},
                            "type": {"type": "string", "enum": ["Person","Organization","Location","Event","Concept","Date","Time","Other"]},
                            "description": {"type": "string"},
                        },
                        "required": ["name", "type", "description"],
                    },
                },
                "relationships": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "source": {"type": "string"},
                            "target": {"type": "string"},
                            "description": {"type": "string"},
                        },
                        "required": ["source", "target", "description"],
                    },
                },
            },
            "required": ["entities", "relationships"],
        })
    }

    fn neutral() -> Self {
        Self::default()
    }
}

/// `{summary, key_entities: [...], key_relationships: [...]}` (spec §4.4
/// Phase 4).
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CommunitySummary {
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub key_entities: Vec<String>,
    #[serde(default)]
    pub key_relationships: Vec<String>,
}

impl ModelSchema for CommunitySummary {
    fn schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "summary": {"type": "string"},
                "key_entities": {"type": "array", "items": {"type": "string"}},
                "key_relationships": {"type": "array", "items": {"type": "string"}},
            },
            "required": ["summary", "key_entities", "key_relationships"],
        })
    }

    fn neutral() -> Self {
        Self::default()
    }
}

pub struct GraphBuilder {
    json_client: Arc<dyn JsonModelClient>,
    embedder: Arc<dyn Embedder>,
    chunker: TextChunker,
    settings: GraphSettings,
    worker_pool_size: usize,
}

impl GraphBuilder {
    pub fn new(
        json_client: Arc<dyn JsonModelClient>,
        embedder: Arc<dyn Embedder>,
        chunker_config: ChunkerConfig,
        settings: GraphSettings,
        worker_pool_size: usize,
    ) -> Self {
        Self {
            json_client,
            embedder,
            chunker: TextChunker::new(chunker_config),
            settings,
            worker_pool_size,
        }
    }

    /// Full build over `documents` (spec §4.4 Phases 1-4).
    pub async fn build_knowledge_graph(&self, documents: Vec<Document>) -> KnowledgeGraph {
        let mut kg = KnowledgeGraph::new(documents.clone());
        self.chunk_documents(&mut kg, &documents).await;
        self.extract_and_merge(&mut kg).await;
        self.detect_communities(&mut kg);
        self.summarize_communities(&mut kg).await;
        kg
    }

    /// Incremental update (spec §4.4 "Incremental update"): repeats
    /// Phase 1-2 for new documents only, merges into existing entity/
    /// relationship sets, drops all communities/reports, and reruns
    /// Phase 3-4 so the graph ends indistinguishable from a full rebuild
    /// over the union corpus.
    pub async fn update_knowledge_graph(&self, kg: &mut KnowledgeGraph, new_documents: Vec<Document>) {
        for doc in &new_documents {
            kg.add_document(doc.clone());
        }
        self.chunk_documents(kg, &new_documents).await;
        self.extract_and_merge_incremental(kg, &new_documents).await;
        kg.clear_communities();
        self.detect_communities(kg);
        self.summarize_communities(kg).await;
    }

    // ---- Phase 1: chunking ----

    async fn chunk_documents(&self, kg: &mut KnowledgeGraph, documents: &[Document]) {
        let semaphore = Arc::new(Semaphore::new(self.worker_pool_size));
        let mut handles = Vec::new();

        for doc in documents.iter().cloned() {
            let semaphore = semaphore.clone();
            let chunker = self.chunker.clone();
            let embedder = self.embedder.clone();
            handles.push(tokio::spawn(async move {
                let _permit = semaphore.acquire().await.expect("semaphore closed");
                let chunks = chunker.chunk(&doc.content);
                let mut units = Vec::with_capacity(chunks.len());
                for (position, chunk) in chunks.into_iter().enumerate() {
                    let embedding = embedder
                        .embed(&chunk.text)
                        .await
                        .map(|e| e.vector)
                        .unwrap_or_default();
                    units.push(TextUnit::new(
                        doc.id.clone(),
                        chunk.text,
                        position,
                        chunk.number_tokens,
                        embedding,
                    ));
                }
                units
            }));
        }

        for handle in handles {
            if let Ok(units) = handle.await {
                for unit in units {
                    kg.add_text_unit(unit);
                }
            }
        }
        info!("chunked {} document(s) into {} text units", documents.len(), kg.text_units.len());
    }

    // ---- Phase 2: extraction & merge ----

    async fn extract_and_merge(&self, kg: &mut KnowledgeGraph) {
        let units: Vec<TextUnit> = kg.text_units.clone();
        self.extract_and_merge_units(kg, &units).await;
    }

    async fn extract_and_merge_incremental(&self, kg: &mut KnowledgeGraph, new_documents: &[Document]) {
        let new_ids: HashSet<&str> = new_documents.iter().map(|d| d.id.as_str()).collect();
        let units: Vec<TextUnit> = kg
            .text_units
            .iter()
            .filter(|u| new_ids.contains(u.document_id.as_str()))
            .cloned()
            .collect();
        self.extract_and_merge_units(kg, &units).await;
    }

    async fn extract_and_merge_units(&self, kg: &mut KnowledgeGraph, units: &[TextUnit]) {
        let semaphore = Arc::new(Semaphore::new(self.worker_pool_size));
        let mut handles = Vec::new();

        for unit in units.iter().cloned() {
            let semaphore = semaphore.clone();
            let client = self.json_client.clone();
            handles.push(tokio::spawn(async move {
                let _permit = semaphore.acquire().await.expect("semaphore closed");
                let prompt = format!(
                    "Extract entities and relationships from the following text. \
                     Entity names must be returned as written; they will be lowercased by the caller.\n\n{}",
                    unit.text
                );
                // A single text-unit extraction failure yields (∅, ∅) and
                // is swallowed (spec §4.4 failure semantics) — `generate`
                // already degrades to `ExtractionResult::default()`.
                let extraction: ExtractionResult = generate(client.as_ref(), &prompt).await;
                (unit.unit_id, extraction)
            }));
        }

        let mut entity_descriptions: HashMap<String, (EntityType, Vec<String>)> = HashMap::new();
        let mut relationship_descriptions: HashMap<(String, String), Vec<String>> = HashMap::new();
        let mut provenance: HashMap<String, Vec<Entity>> = HashMap::new();

        for handle in handles {
            let Ok((unit_id, extraction)) = handle.await else {
                continue;
            };
            let mut unit_entities = Vec::new();
            for e in extraction.entities {
                let name = e.name.to_lowercase();
                entity_descriptions
                    .entry(name.clone())
                    .or_insert_with(|| (e.entity_type, Vec::new()))
                    .1
                    .push(e.description.clone());
                unit_entities.push(Entity::new(name, e.entity_type, e.description));
            }
            for r in extraction.relationships {
                let key = (r.source.to_lowercase(), r.target.to_lowercase());
                relationship_descriptions
                    .entry(key)
                    .or_insert_with(Vec::new)
                    .push(r.description);
            }
            provenance.insert(unit_id, unit_entities);
        }

        for (unit_id, entities) in provenance {
            kg.add_textunit_entities(unit_id, entities);
        }

        // Merge entities: one summary description per name.
        for (name, (entity_type, descriptions)) in entity_descriptions {
            let summary = self.summarize_descriptions(&descriptions).await;
            kg.add_entity(Entity {
                name,
                entity_type,
                description: summary,
            });
        }

        // Repair invariant violations: a relationship endpoint absent from
        // the entity set gets a placeholder entity with empty description
        // (spec §7 Invariant-violation handling).
        let known_names: HashSet<String> = kg.entities.iter().map(|e| e.name.clone()).collect();
        for ((source, target), descriptions) in relationship_descriptions {
            for name in [&source, &target] {
                if !known_names.contains(name) && !kg.entities.iter().any(|e| &e.name == name) {
                    warn!("relationship endpoint '{}' missing from entity set; creating placeholder", name);
                    kg.add_entity(Entity {
                        name: name.clone(),
                        entity_type: EntityType::Other,
                        description: String::new(),
                    });
                }
            }
            let summary = self.summarize_descriptions(&descriptions).await;
            kg.add_relationship(Relationship {
                source,
                target,
                description: summary,
            });
        }
    }

    /// One summary description per entity/relationship (spec §4.4 Phase
    /// 2): via the model, or a deterministic join with truncation when
    /// unavailable.
    async fn summarize_descriptions(&self, descriptions: &[String]) -> String {
        if descriptions.len() == 1 {
            return descriptions[0].clone();
        }
        let prompt = format!(
            "Produce one concise description that merges the following descriptions of the same entity:\n{}",
            descriptions.join("\n- ")
        );
        let result: crate::ports::StringResponse = generate(self.json_client.as_ref(), &prompt).await;
        if result.value != crate::entities::NOT_AVAILABLE && !result.value.is_empty() {
            return result.value;
        }
        let mut shuffled = descriptions.to_vec();
        deterministic_shuffle(&mut shuffled, self.settings.louvain_seed);
        let joined = shuffled.join("; ");
        if joined.len() > 5000 {
            joined[..5000].to_string()
        } else {
            joined
        }
    }

    // ---- Phase 3: community detection ----

    fn detect_communities(&self, kg: &mut KnowledgeGraph) {
        let mut graph: UnGraphMap<&str, f64> = UnGraphMap::new();
        for entity in &kg.entities {
            graph.add_node(entity.name.as_str());
        }
        for rel in &kg.relationships {
            if graph.contains_node(rel.source.as_str()) && graph.contains_node(rel.target.as_str()) {
                let weight = graph
                    .edge_weight(rel.source.as_str(), rel.target.as_str())
                    .copied()
                    .unwrap_or(0.0);
                graph.add_edge(rel.source.as_str(), rel.target.as_str(), weight + 1.0);
            }
        }

        let entity_type: HashMap<&str, EntityType> =
            kg.entities.iter().map(|e| (e.name.as_str(), e.entity_type)).collect();

        let mut counter = 0usize;
        let communities = self.recurse_communities(&graph, &entity_type, 0, None, &mut counter);
        for community in communities {
            kg.add_community(community);
        }
    }

    fn recurse_communities(
        &self,
        graph: &UnGraphMap<&str, f64>,
        entity_type: &HashMap<&str, EntityType>,
        level: usize,
        parent: Option<String>,
        counter: &mut usize,
    ) -> Vec<Community> {
        if graph.node_count() == 0 {
            return Vec::new();
        }
        let resolution = self.settings.base_resolution + self.settings.resolution_level_step * level as f64;
        let partition = louvain_partition(graph, resolution, self.settings.louvain_seed + level as u64);

        let mut communities = Vec::new();
        let min_size = self.settings.min_community_size;

        for members in partition {
            if members.len() < min_size {
                continue;
            }
            let id = format!("L{level}_C{}", *counter);
            *counter += 1;
            let member_pairs: Vec<(String, EntityType)> = members
                .iter()
                .map(|name| (name.to_string(), entity_type.get(name).copied().unwrap_or(EntityType::Other)))
                .collect();
            communities.push(Community {
                id: id.clone(),
                level,
                members: member_pairs,
                parent: parent.clone(),
                report: None,
            });

            let should_recurse =
                members.len() >= min_size * 3 && members.len() > min_size && level < self.settings.max_level;
            if should_recurse {
                let subgraph = induced_subgraph(graph, &members);
                let children = self.recurse_communities(&subgraph, entity_type, level + 1, Some(id), counter);
                communities.extend(children);
            }
        }

        communities
    }

    // ---- Phase 4: community summarization ----

    async fn summarize_communities(&self, kg: &mut KnowledgeGraph) {
        let semaphore = Arc::new(Semaphore::new(self.worker_pool_size));
        let entities_by_name: HashMap<String, Entity> =
            kg.entities.iter().map(|e| (e.name.clone(), e.clone())).collect();
        let relationships = kg.relationships.clone();
        let mut handles = Vec::new();

        for (index, community) in kg.communities.clone().into_iter().enumerate() {
            let semaphore = semaphore.clone();
            let client = self.json_client.clone();
            let entities_by_name = entities_by_name.clone();
            let relationships = relationships.clone();
            handles.push(tokio::spawn(async move {
                let _permit = semaphore.acquire().await.expect("semaphore closed");
                let member_names: HashSet<&str> = community.members.iter().map(|(n, _)| n.as_str()).collect();
                let key_entities: Vec<&Entity> = member_names
                    .iter()
                    .filter_map(|n| entities_by_name.get(*n))
                    .collect();
                let key_relationships: Vec<&Relationship> = relationships
                    .iter()
                    .filter(|r| member_names.contains(r.source.as_str()) && member_names.contains(r.target.as_str()))
                    .collect();

                let entity_lines: Vec<String> =
                    key_entities.iter().map(|e| format!("- {} ({:?}): {}", e.name, e.entity_type, e.description)).collect();
                let rel_lines: Vec<String> = key_relationships
                    .iter()
                    .map(|r| format!("- {} -> {}: {}", r.source, r.target, r.description))
                    .collect();
                let prompt = format!(
                    "Summarize this community of entities.\nEntities:\n{}\nRelationships:\n{}",
                    entity_lines.join("\n"),
                    rel_lines.join("\n")
                );

                let summary: CommunitySummary = generate(client.as_ref(), &prompt).await;
                let report = if summary.summary.is_empty() && entity_lines.is_empty() {
                    // Summarization failure leaves report = none (spec §4.4
                    // failure semantics).
                    None
                } else {
                    Some(CommunityReport {
                        summary: if summary.summary.is_empty() {
                            entity_lines.join("; ")
                        } else {
                            summary.summary
                        },
                        key_entities: key_entities.iter().map(|e| e.name.clone()).collect(),
                        key_relationships: key_relationships
                            .iter()
                            .map(|r| format!("{}->{}", r.source, r.target))
                            .collect(),
                        embedding: None,
                    })
                };
                (index, report)
            }));
        }

        for handle in handles {
            if let Ok((index, report)) = handle.await {
                if let Some(community) = kg.communities.get_mut(index) {
                    community.report = report;
                }
            }
        }
        debug!("summarized {} communities", kg.communities.len());
    }
}

/// Deterministic pseudo-shuffle keyed by a seed, standing in for Python's
/// `random.shuffle` fallback join when the model is unavailable (spec
/// §4.4 Phase 2).
fn deterministic_shuffle<T>(items: &mut [T], seed: u64) {
    let mut state = seed.wrapping_add(0x9E3779B97F4A7C15);
    let len = items.len();
    for i in (1..len).rev() {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        let j = (state as usize) % (i + 1);
        items.swap(i, j);
    }
}

/// Single-level greedy modularity optimization (the Louvain "local moving"
/// phase, without the aggregation phase): repeatedly moves each node into
/// the neighboring community that most increases modularity at the given
/// `resolution`, until no move improves it. One pass is sufficient for the
/// recursive-subgraph structure this builder imposes (spec §4.4 Phase 3;
/// resolution schedule `1 + 0.2*level` preserved per spec §9 Open
/// Question 3).
fn louvain_partition<'a>(
    graph: &UnGraphMap<&'a str, f64>,
    resolution: f64,
    seed: u64,
) -> Vec<Vec<&'a str>> {
    let mut nodes: Vec<&str> = graph.nodes().collect();
    deterministic_shuffle(&mut nodes, seed);

    let mut community_of: HashMap<&str, usize> = nodes.iter().enumerate().map(|(i, n)| (*n, i)).collect();
    let total_weight: f64 = graph.all_edges().map(|(_, _, w)| *w).sum::<f64>().max(1.0);

    let degree = |node: &str| -> f64 {
        graph.edges(node).map(|(_, _, w)| *w).sum()
    };

    let mut improved = true;
    while improved {
        improved = false;
        for &node in &nodes {
            let current_community = community_of[node];
            let mut neighbor_communities: HashMap<usize, f64> = HashMap::new();
            for (_, neighbor, weight) in graph.edges(node) {
                let community = community_of[neighbor];
                *neighbor_communities.entry(community).or_insert(0.0) += *weight;
            }
            if neighbor_communities.is_empty() {
                continue;
            }

            let node_degree = degree(node);
            let mut best_community = current_community;
            let mut best_gain = 0.0f64;

            for (&community, &weight_to) in &neighbor_communities {
                if community == current_community {
                    continue;
                }
                let community_degree: f64 = nodes
                    .iter()
                    .filter(|n| community_of[*n] == community)
                    .map(|n| degree(n))
                    .sum();
                let gain = weight_to - resolution * node_degree * community_degree / (2.0 * total_weight);
                if gain > best_gain {
                    best_gain = gain;
                    best_community = community;
                }
            }

            if best_community != current_community {
                community_of.insert(node, best_community);
                improved = true;
            }
        }
    }

    let mut groups: HashMap<usize, Vec<&str>> = HashMap::new();
    for (&node, &community) in &community_of {
        groups.entry(community).or_default().push(node);
    }
    groups.into_values().collect()
}

fn induced_subgraph<'a>(graph: &UnGraphMap<&'a str, f64>, members: &[&'a str]) -> UnGraphMap<&'a str, f64> {
    let member_set: HashSet<&str> = members.iter().copied().collect();
    let mut subgraph = UnGraphMap::new();
    for &m in members {
        subgraph.add_node(m);
    }
    for (a, b, w) in graph.all_edges() {
        if member_set.contains(a) && member_set.contains(b) {
            subgraph.add_edge(a, b, *w);
        }
    }
    subgraph
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_shuffle_is_stable_for_fixed_seed() {
        let mut a = vec![1, 2, 3, 4, 5];
        let mut b = a.clone();
        deterministic_shuffle(&mut a, 42);
        deterministic_shuffle(&mut b, 42);
        assert_eq!(a, b);
    }

    #[test]
    fn louvain_partition_keeps_disconnected_components_separate() {
        let mut graph: UnGraphMap<&str, f64> = UnGraphMap::new();
        graph.add_node("a");
        graph.add_node("b");
        graph.add_node("c");
        graph.add_node("d");
        graph.add_edge("a", "b", 5.0);
        graph.add_edge("c", "d", 5.0);
        let partition = louvain_partition(&graph, 1.0, 42);
        // a/b must never land with c/d since there's no edge between them.
        let community_of_a = partition.iter().position(|g| g.contains(&"a")).unwrap();
        let community_of_c = partition.iter().position(|g| g.contains(&"c")).unwrap();
        assert_ne!(community_of_a, community_of_c);
    }
}
