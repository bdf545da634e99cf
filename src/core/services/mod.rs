pub mod credential_resolver;
pub mod key_probe;
pub mod orchestrator;
pub mod output_target;
pub mod payload_source;
pub mod result_interpreter;
