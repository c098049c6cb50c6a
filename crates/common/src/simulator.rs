use thiserror::Error;

#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum BlockSimError {
    #[error("block validation failed. Reason: {0}")]
    BlockValidationFailed(String),

    #[error("validation request timeout")]
    Timeout,

    #[error("rpc error. {0}")]
    RpcError(String),

    #[error("simulation request dropped")]
    SimulationDropped,
}

impl BlockSimError {
    /// The simulator reporting an already-known block means the chain has
    /// accepted it; treated as success.
    pub fn is_already_known(&self) -> bool {
        match self {
            BlockSimError::BlockValidationFailed(reason) => {
                reason.to_lowercase().contains("block already known")
            }
            _ => false,
        }
    }

    /// Transient failures that must not demote a builder.
    pub fn is_temporary(&self) -> bool {
        matches!(
            self,
            BlockSimError::Timeout | BlockSimError::RpcError(_) | BlockSimError::SimulationDropped
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn already_known_is_detected() {
        let err =
            BlockSimError::BlockValidationFailed("simulation failed: block already known".into());
        assert!(err.is_already_known());
        assert!(!err.is_temporary());

        let err = BlockSimError::BlockValidationFailed("invalid state root".into());
        assert!(!err.is_already_known());

        assert!(BlockSimError::Timeout.is_temporary());
    }
}
