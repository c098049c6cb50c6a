use ethereum_consensus::{primitives::U256, serde::as_str};

/// Per-builder status and collateral, cached in-process and refreshed from the
/// durable store every slot. A missing entry behaves as `Default`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, Default, Eq, PartialEq)]
pub struct BuilderInfo {
    /// Maximum per-block loss the relay will cover for this builder.
    #[serde(with = "as_str")]
    pub collateral: U256,
    pub is_high_prio: bool,
    pub is_blacklisted: bool,
    pub is_demoted: bool,
    pub builder_id: Option<String>,
}

impl BuilderInfo {
    /// Optimistic acceptance requires strictly more collateral than the bid
    /// value and a non-demoted builder. The slot-window check lives with the
    /// submission pipeline.
    pub fn can_process_optimistically(&self, value: U256) -> bool {
        !self.is_demoted && self.collateral > value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn optimistic_gate_is_strict_on_collateral() {
        let mut info = BuilderInfo { collateral: U256::from(100u64), ..Default::default() };
        assert!(info.can_process_optimistically(U256::from(99u64)));
        assert!(!info.can_process_optimistically(U256::from(100u64)));

        info.is_demoted = true;
        assert!(!info.can_process_optimistically(U256::from(1u64)));
    }
}
