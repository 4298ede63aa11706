//! Agent-under-test client adapters.

pub mod http_client;

pub use http_client::HttpAgentClient;
