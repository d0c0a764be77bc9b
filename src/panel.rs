//! One processing panel: which endpoint it talks to and what it accepts.

use crate::{
    config::Config,
    transport::{EndpointConfig, EndpointKind},
    validator::ValidationPolicy,
};

/// Strategy pair handed to an upload session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Panel {
    pub endpoint: EndpointConfig,
    pub policy: ValidationPolicy,
}

impl Panel {
    pub fn new(endpoint: EndpointConfig, policy: ValidationPolicy) -> Self {
        Self { endpoint, policy }
    }

    pub fn background_removal(policy: ValidationPolicy) -> Self {
        Self::new(EndpointConfig::remove_background(), policy)
    }

    pub fn watermark_removal(policy: ValidationPolicy) -> Self {
        Self::new(EndpointConfig::dewatermark(), policy)
    }

    /// Panel for `kind` with the policy from config.
    pub fn from_config(kind: EndpointKind, cfg: &Config) -> Self {
        match kind {
            EndpointKind::RemoveBackground => Self::background_removal(cfg.background.clone()),
            EndpointKind::Dewatermark => Self::watermark_removal(cfg.watermark.clone()),
        }
    }

    pub fn kind(&self) -> EndpointKind {
        self.endpoint.kind
    }

    /// File name prefix for saved results.
    pub fn download_prefix(&self) -> &'static str {
        match self.kind() {
            EndpointKind::RemoveBackground => "background_removed",
            EndpointKind::Dewatermark => "dewatermarked",
        }
    }
}
