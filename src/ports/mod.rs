//! External interface ports the core consumes (spec §6). Concrete
//! providers, vector DBs, and scrapers are out of scope (spec §1) — these
//! are the seams a caller plugs them into.

pub mod embedder;
pub mod json_model_client;
pub mod source_adapter;
pub mod user_api;

pub use embedder::{Embedder, Embedding};
pub use json_model_client::{generate, BoolAnswer, JsonModelClient, ModelSchema, SchemaBuilder, StringResponse};
pub use source_adapter::{DateFilter, SourceAdapter};
pub use user_api::{ConsoleUserApi, UserApi};
