// ABOUTME: Network operations trait for the container engine.
// ABOUTME: Ensures the per-app bridge network exists.

use async_trait::async_trait;
use std::collections::HashMap;

use crate::types::NetworkId;

/// Network operations.
#[async_trait]
pub trait NetworkOps: Send + Sync {
    /// Create a network.
    async fn create_network(&self, config: &NetworkConfig) -> Result<NetworkId, NetworkError>;

    /// Check if a network exists.
    async fn network_exists(&self, name: &str) -> Result<bool, NetworkError>;
}

/// Configuration for creating a network.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    pub name: String,
    pub driver: Option<String>,
    pub labels: HashMap<String, String>,
}

/// Errors from network operations.
#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    #[error("network already exists: {0}")]
    AlreadyExists(String),

    #[error("runtime error: {0}")]
    Runtime(String),
}
