//! Concrete HTTP-backed implementations of the [`JsonModelClient`] and
//! [`Embedder`] ports, against an OpenAI-compatible API surface (spec §6
//! leaves the concrete model provider out of scope; this is the one
//! reference adapter the CLI binary wires by default).
//!
//! Grounded in the teacher's `HttpProviderClient`/`OpenAICompatible`
//! pattern (request building, auth headers, status-code mapping), now
//! built against [`EngineError`] and a single JSON-schema-constrained
//! call shape rather than a multi-provider chat abstraction.

mod http_client;

pub use http_client::{HttpEmbedder, HttpJsonModelClient, OpenAiCompatibleConfig};
