// src/extractors/mod.rs
pub mod metrics;
pub mod statement;
