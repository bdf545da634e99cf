pub mod audit_entry;
pub mod credential;
pub mod key_id;
pub mod outcome;
pub mod payload;
pub mod probe_result;
pub mod request;
