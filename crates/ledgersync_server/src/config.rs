//! Server configuration.

/// Configuration for the sync server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Maximum number of operations accepted in one push batch.
    pub max_push_batch: usize,
    /// Maximum number of entities returned in one pull response.
    pub max_pull_batch: usize,
    /// Maximum number of audit events kept in the in-memory audit log.
    pub audit_history: usize,
}

impl ServerConfig {
    /// Creates a configuration with default limits.
    pub fn new() -> Self {
        Self {
            max_push_batch: 100,
            max_pull_batch: 100,
            audit_history: 10_000,
        }
    }

    /// Sets the maximum push batch size.
    pub fn with_max_push_batch(mut self, size: usize) -> Self {
        self.max_push_batch = size;
        self
    }

    /// Sets the maximum pull batch size.
    pub fn with_max_pull_batch(mut self, size: usize) -> Self {
        self.max_pull_batch = size;
        self
    }

    /// Sets the audit history limit.
    pub fn with_audit_history(mut self, size: usize) -> Self {
        self.audit_history = size;
        self
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_builder() {
        let config = ServerConfig::new()
            .with_max_push_batch(10)
            .with_max_pull_batch(20)
            .with_audit_history(50);

        assert_eq!(config.max_push_batch, 10);
        assert_eq!(config.max_pull_batch, 20);
        assert_eq!(config.audit_history, 50);
    }
}
