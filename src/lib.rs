pub mod cli;
pub mod config;
pub mod embedding;
pub mod engine;
pub mod errors;
pub mod indexer;
pub mod models;
pub mod pipeline;
pub mod postprocess;
pub mod probe;
pub mod prompt;
pub mod provider;
pub mod render;
pub mod report;
pub mod retrieval;
pub mod scoring;
pub mod sections;
pub mod session;
pub mod splitter;
pub mod store;
pub mod util;
