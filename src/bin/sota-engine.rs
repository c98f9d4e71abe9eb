//! CLI entry point: wires the HTTP JsonModelClient/Embedder backend into
//! the engine and runs the expert-set round loop for one topic (spec §10.4
//! "CLI & binary").

use sota_engine::llm::{HttpEmbedder, HttpJsonModelClient, OpenAiCompatibleConfig};
use sota_engine::ports::{ConsoleUserApi, Embedder, JsonModelClient, SourceAdapter};
use sota_engine::{
    ActionPicker, ChunkerConfig, Document, DocumentRemover, EngineConfig, Expert, ExpertSetDriver,
    GraphBuilder, GraphQuery, Kanban, KnowledgeGraph, KnowledgeRecoverer, PaperAdder, RagScratchpad,
    Recoverer, SotaTable, ThesisKnowledge, UserQuestioner,
};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing_subscriber::EnvFilter;

const EMBEDDING_DIM: usize = 768;
const DEFAULT_TOPIC: &str = "Large language model evaluation methodologies";

fn parse_args(config: &mut EngineConfig) -> anyhow::Result<String> {
    let mut topic = None;
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-i" | "--inspect-query" => config.inspect_query = true,
            "-c" | "--config" => {
                let path = args.next().ok_or_else(|| anyhow::anyhow!("--config requires a path"))?;
                *config = EngineConfig::from_file(path)?;
            }
            other => topic = Some(other.to_string()),
        }
    }
    Ok(topic.unwrap_or_else(|| DEFAULT_TOPIC.to_string()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let mut config = EngineConfig::default();
    let topic_description = parse_args(&mut config)?;
    config.validate()?;

    let model_config = OpenAiCompatibleConfig {
        max_retries: config.concurrency.max_retries,
        schema_retry_attempts: config.concurrency.schema_retry_attempts,
        timeout_secs: config.concurrency.http_timeout_secs,
        ..OpenAiCompatibleConfig::default()
    };
    let json_client: Arc<dyn JsonModelClient> = Arc::new(HttpJsonModelClient::new(model_config.clone(), None));
    let embedder: Arc<dyn Embedder> = Arc::new(HttpEmbedder::new(model_config, EMBEDDING_DIM));

    let graph_builder = Arc::new(GraphBuilder::new(
        json_client.clone(),
        embedder.clone(),
        ChunkerConfig::new(config.chunker.max_tokens, config.chunker.overlap_tokens),
        config.graph,
        config.concurrency.worker_pool_size,
    ));
    let graph_query = Arc::new(GraphQuery::new(json_client.clone(), embedder.clone(), config.graph));
    let kg = Arc::new(RwLock::new(KnowledgeGraph::new(Vec::new())));

    // No concrete SourceAdapter is wired by default: external document
    // sources (arXiv, PubMed, web scrapers) are out of scope for this
    // engine (spec §1) and are supplied by embedding applications.
    let sources: Vec<Arc<dyn SourceAdapter>> = Vec::new();
    let recoverer: Arc<dyn KnowledgeRecoverer> = Arc::new(Recoverer::new(
        json_client.clone(),
        graph_query.clone(),
        graph_builder.clone(),
        sources,
        None,
        config.recoverer,
        kg.clone(),
    ));

    let mut topic = ThesisKnowledge::new(topic_description.clone());
    let mut table = SotaTable::new();

    let survey_docs: Vec<Document> = recoverer.get_survey_docs(&topic_description, config.recoverer.survey_k).await;
    let scratchpad = RagScratchpad::new(embedder.clone(), config.chunker);
    for doc in &survey_docs {
        let content = format!("{} {} {}", doc.title, doc.abstract_, doc.content);
        scratchpad.store_document(doc, &content).await;
    }
    let mut experts = vec![Expert::new("Generalist".to_string(), topic_description.clone(), scratchpad)];

    let action_picker = ActionPicker::new(json_client.clone(), config.expert_set.extra_context_papers);
    let paper_adder = PaperAdder::new(
        json_client.clone(),
        recoverer.clone(),
        config.concurrency.worker_pool_size,
        config.recoverer.k,
        config.chunker.paper_adder_chunk_tokens,
    );
    let document_remover = DocumentRemover::new(
        json_client.clone(),
        config.expert_set.documents_to_remove,
        config.expert_set.max_delete_votes_per_expert,
    );
    let user_questioner = UserQuestioner::new(
        json_client.clone(),
        Arc::new(ConsoleUserApi),
        embedder.clone(),
        recoverer.clone(),
        config.chunker,
        config.recoverer.survey_k,
    );

    // Reserved for richer frontends that offload rounds onto the Kanban
    // board's async task queue (spec §5); the CLI drives the loop inline.
    let _kanban = Kanban::new();

    let driver = ExpertSetDriver::new(action_picker, paper_adder, document_remover, user_questioner, config.expert_set.max_rounds);
    let outcome = driver.run(&mut topic, &mut table, &mut experts).await;

    println!("stopped after {} round(s): {:?}", outcome.rounds_run, outcome.stop_reason);
    println!("{}", table.to_markdown());

    Ok(())
}
