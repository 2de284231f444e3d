// src/ingest/providers/mod.rs
pub mod reddit;
pub mod sample;
