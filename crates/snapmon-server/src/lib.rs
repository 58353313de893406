//! HTTP server for snapmon: snapshot ingestion, snapshot queries and local
//! sampling behind a JSON envelope, with per-request trace ids.

pub mod api;
pub mod app;
pub mod config;
pub mod ingest;
pub mod logging;
pub mod openapi;
pub mod state;
