// src/portal/mod.rs
pub mod challenge;
pub mod client;
pub mod listing;
pub mod models;
