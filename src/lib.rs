pub mod classifier;
pub mod config;
pub mod fetch;
pub mod infra;
pub mod model;
pub mod output;
pub mod overlay;
pub mod parser;
pub mod pipeline;
pub mod service;
pub mod services;
pub mod snapshot;
pub mod stats;
pub mod store;
