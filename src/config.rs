//! Configuration for the SOTA engine (spec §9: "thread through a config
//! struct instead of a module-level toggle" — the CLI inspection flag and
//! every tunable constant named in spec.md live here, not as globals).

use serde::{Deserialize, Serialize};

/// Top-level engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub chunker: ChunkerSettings,
    pub graph: GraphSettings,
    pub recoverer: RecovererSettings,
    pub expert_set: ExpertSetSettings,
    pub concurrency: ConcurrencySettings,
    /// Only process-global flag permitted by spec §9: gates interactive
    /// inspection of every model call. Threaded explicitly, never a
    /// module-level static.
    #[serde(default)]
    pub inspect_query: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            chunker: ChunkerSettings::default(),
            graph: GraphSettings::default(),
            recoverer: RecovererSettings::default(),
            expert_set: ExpertSetSettings::default(),
            concurrency: ConcurrencySettings::default(),
            inspect_query: false,
        }
    }
}

/// TextChunker defaults (spec §4.1).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ChunkerSettings {
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
    #[serde(default = "default_overlap_tokens")]
    pub overlap_tokens: usize,
    /// Chunk size used specifically by PaperAdder feature extraction
    /// (spec §4.10 step 3a: "max_tokens ~500").
    #[serde(default = "default_paper_adder_chunk_tokens")]
    pub paper_adder_chunk_tokens: usize,
}

impl Default for ChunkerSettings {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
            overlap_tokens: default_overlap_tokens(),
            paper_adder_chunk_tokens: default_paper_adder_chunk_tokens(),
        }
    }
}

fn default_max_tokens() -> usize {
    3000
}
fn default_overlap_tokens() -> usize {
    50
}
fn default_paper_adder_chunk_tokens() -> usize {
    500
}

/// GraphBuilder community-detection defaults (spec §4.4 Phase 3).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GraphSettings {
    #[serde(default = "default_min_community_size")]
    pub min_community_size: usize,
    #[serde(default = "default_base_resolution")]
    pub base_resolution: f64,
    #[serde(default = "default_resolution_level_step")]
    pub resolution_level_step: f64,
    #[serde(default = "default_max_level")]
    pub max_level: usize,
    #[serde(default = "default_louvain_seed")]
    pub louvain_seed: u64,
    /// Global phase: number of top communities considered in `respond`.
    #[serde(default = "default_global_top_communities")]
    pub global_top_communities: usize,
    /// Local phase: TextUnits retrieved per follow-up question.
    #[serde(default = "default_local_top_units")]
    pub local_top_units: usize,
    /// Local phase early-exit threshold (spec §4.5 step 3).
    #[serde(default = "default_local_confidence_floor")]
    pub local_confidence_floor: f64,
}

impl Default for GraphSettings {
    fn default() -> Self {
        Self {
            min_community_size: default_min_community_size(),
            base_resolution: default_base_resolution(),
            resolution_level_step: default_resolution_level_step(),
            max_level: default_max_level(),
            louvain_seed: default_louvain_seed(),
            global_top_communities: default_global_top_communities(),
            local_top_units: default_local_top_units(),
            local_confidence_floor: default_local_confidence_floor(),
        }
    }
}

fn default_min_community_size() -> usize {
    3
}
fn default_base_resolution() -> f64 {
    1.0
}
fn default_resolution_level_step() -> f64 {
    0.2
}
fn default_max_level() -> usize {
    5
}
fn default_louvain_seed() -> u64 {
    42
}
fn default_global_top_communities() -> usize {
    5
}
fn default_local_top_units() -> usize {
    5
}
fn default_local_confidence_floor() -> f64 {
    0.3
}

/// Recoverer iteration bounds (spec §4.6).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RecovererSettings {
    /// Preserved verbatim from `recoverer_agent.py`'s literal `range(2)`.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    #[serde(default = "default_recover_k")]
    pub k: usize,
    #[serde(default = "default_per_query_k")]
    pub per_query_k: usize,
    #[serde(default = "default_survey_k")]
    pub survey_k: usize,
}

impl Default for RecovererSettings {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            k: default_recover_k(),
            per_query_k: default_per_query_k(),
            survey_k: default_survey_k(),
        }
    }
}

fn default_max_iterations() -> usize {
    2
}
fn default_recover_k() -> usize {
    5
}
fn default_per_query_k() -> usize {
    2
}
fn default_survey_k() -> usize {
    3
}

/// Expert-set deliberation bounds (spec §4.7-§4.11).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ExpertSetSettings {
    #[serde(default = "default_max_rounds")]
    pub max_rounds: usize,
    #[serde(default = "default_documents_to_remove")]
    pub documents_to_remove: usize,
    #[serde(default = "default_extra_context_papers")]
    pub extra_context_papers: usize,
    #[serde(default = "default_max_delete_votes_per_expert")]
    pub max_delete_votes_per_expert: usize,
}

impl Default for ExpertSetSettings {
    fn default() -> Self {
        Self {
            max_rounds: default_max_rounds(),
            documents_to_remove: default_documents_to_remove(),
            extra_context_papers: default_extra_context_papers(),
            max_delete_votes_per_expert: default_max_delete_votes_per_expert(),
        }
    }
}

fn default_max_rounds() -> usize {
    10
}
fn default_documents_to_remove() -> usize {
    2
}
fn default_extra_context_papers() -> usize {
    2
}
fn default_max_delete_votes_per_expert() -> usize {
    3
}

/// Bounded worker pool sizes (spec §5/§9: "bounded worker pools (≈10)").
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ConcurrencySettings {
    #[serde(default = "default_worker_pool_size")]
    pub worker_pool_size: usize,
    #[serde(default = "default_kanban_poll_interval_secs")]
    pub kanban_poll_interval_secs: u64,
    #[serde(default = "default_kanban_timeout_secs")]
    pub kanban_timeout_secs: u64,
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_schema_retry_attempts")]
    pub schema_retry_attempts: u32,
}

impl Default for ConcurrencySettings {
    fn default() -> Self {
        Self {
            worker_pool_size: default_worker_pool_size(),
            kanban_poll_interval_secs: default_kanban_poll_interval_secs(),
            kanban_timeout_secs: default_kanban_timeout_secs(),
            http_timeout_secs: default_http_timeout_secs(),
            max_retries: default_max_retries(),
            schema_retry_attempts: default_schema_retry_attempts(),
        }
    }
}

fn default_worker_pool_size() -> usize {
    10
}
fn default_kanban_poll_interval_secs() -> u64 {
    3
}
fn default_kanban_timeout_secs() -> u64 {
    600
}
fn default_http_timeout_secs() -> u64 {
    15
}
fn default_max_retries() -> u32 {
    3
}
fn default_schema_retry_attempts() -> u32 {
    3
}

impl EngineConfig {
    /// Load configuration from a json/toml/yaml file, dispatched by
    /// extension — same pattern as the teacher's `AgentConfig::from_file`.
    pub fn from_file<P: AsRef<std::path::Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        let config = match path.as_ref().extension().and_then(|s| s.to_str()) {
            Some("json") => serde_json::from_str(&content)?,
            Some("toml") => toml::from_str(&content)?,
            Some("yaml") | Some("yml") => serde_yml::from_str(&content)?,
            _ => return Err(anyhow::anyhow!("unsupported config file format")),
        };
        Ok(config)
    }

    pub fn to_file<P: AsRef<std::path::Path>>(&self, path: P) -> anyhow::Result<()> {
        let content = match path.as_ref().extension().and_then(|s| s.to_str()) {
            Some("json") => serde_json::to_string_pretty(self)?,
            Some("toml") => toml::to_string(self)?,
            Some("yaml") | Some("yml") => serde_yml::to_string(self)?,
            _ => return Err(anyhow::anyhow!("unsupported config file format")),
        };
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.chunker.overlap_tokens >= self.chunker.max_tokens {
            return Err(anyhow::anyhow!("overlap_tokens must be < max_tokens"));
        }
        if self.graph.min_community_size == 0 {
            return Err(anyhow::anyhow!("min_community_size must be > 0"));
        }
        if self.recoverer.max_iterations == 0 {
            return Err(anyhow::anyhow!("recoverer max_iterations must be > 0"));
        }
        if self.expert_set.max_rounds == 0 {
            return Err(anyhow::anyhow!("expert_set max_rounds must be > 0"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.expert_set.max_rounds, 10);
        assert_eq!(config.recoverer.max_iterations, 2);
        assert_eq!(config.graph.louvain_seed, 42);
    }

    #[test]
    fn invalid_overlap_rejected() {
        let mut config = EngineConfig::default();
        config.chunker.overlap_tokens = config.chunker.max_tokens;
        assert!(config.validate().is_err());
    }
}
