//! Furniture vector sandbox — vision-model cataloging, embeddings, and
//! pgvector similarity search.
//!
//! Furnivec chains three external services behind a small HTTP API and a CLI:
//! a vision model (OpenRouter chat completions) turns each furniture image
//! into a structured JSON description, an embedding model converts that
//! description into a vector, and Supabase stores the rows and answers
//! nearest-neighbor queries via a pgvector RPC.
//!
//! # Architecture
//!
//! - **Describe**: OpenRouter chat completions with image input and a fixed
//!   cataloging prompt
//! - **Embed**: OpenRouter embeddings over the serialized description
//! - **Store & search**: Supabase storage bucket for 200x200 JPEG previews,
//!   PostgREST inserts, and the `match_furniture` RPC for ranking
//! - **Batch pipeline**: strictly sequential per-item driver with failure
//!   isolation and snapshot-based progress reporting
//!
//! # Modules
//!
//! - [`config`] — Configuration loading from TOML files and environment variables
//! - [`error`] — Failure taxonomy mapped to HTTP status codes
//! - [`normalize`] — Fixed-canvas letterboxing and JPEG re-encoding
//! - [`pipeline`] — The batch ingestion state machine
//! - [`server`] — The axum API routes
//! - [`api_client`] — CLI-side client for the API routes

pub mod api_client;
pub mod config;
pub mod describe;
pub mod embed;
pub mod error;
pub mod normalize;
pub mod pipeline;
pub mod server;
pub mod supabase;
