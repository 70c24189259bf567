//! Trustchain configuration.

use lkrp_core::BlockHash;

/// Configuration for loading a [`crate::Trustchain`].
#[derive(Debug, Clone)]
pub struct TrustchainConfig {
    /// Reject responses whose streams fail validation.
    pub validate_on_load: bool,
    /// Expected parent of the root stream's first block.
    pub root_parent: Option<BlockHash>,
}

impl Default for TrustchainConfig {
    fn default() -> Self {
        Self {
            validate_on_load: true,
            root_parent: None,
        }
    }
}

impl TrustchainConfig {
    /// Skip validation when loading.
    pub fn unchecked() -> Self {
        Self {
            validate_on_load: false,
            ..Self::default()
        }
    }

    pub fn with_root_parent(mut self, parent: BlockHash) -> Self {
        self.root_parent = Some(parent);
        self
    }
}
