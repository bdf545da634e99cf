pub mod audit;
pub mod cache;
pub mod engine;
pub mod keyrings;
pub mod keyserver;
pub mod prompts;
