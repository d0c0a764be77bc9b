//! Checks a selected file against a panel's policy before any request is made.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::source::SourceFile;

const MIB: u64 = 1024 * 1024;

/// Why a file was rejected. Checks run in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("no file selected")]
    MissingFile,

    #[error("unsupported media type '{media_type}'")]
    UnsupportedType { media_type: String },

    #[error("file too large: {size} bytes (max: {max} bytes)")]
    TooLarge { size: u64, max: u64 },
}

/// Allowed media types and size cap for one panel.
///
/// An entry ending in `/*` matches every subtype of its top-level type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationPolicy {
    pub allowed_types: Vec<String>,
    pub max_bytes: u64,
}

impl ValidationPolicy {
    pub fn new(allowed_types: Vec<String>, max_bytes: u64) -> Self {
        Self {
            allowed_types,
            max_bytes,
        }
    }

    /// Any image, up to 16 MiB.
    pub fn background_removal() -> Self {
        Self::new(vec!["image/*".into()], 16 * MIB)
    }

    /// JPEG, PNG or WEBP, up to 10 MiB.
    pub fn watermark_removal() -> Self {
        Self::new(
            vec![
                "image/jpeg".into(),
                "image/jpg".into(),
                "image/png".into(),
                "image/webp".into(),
            ],
            10 * MIB,
        )
    }

    /// Whether a declared media type is accepted.
    pub fn allows(&self, media_type: &str) -> bool {
        // Parameters such as `; charset=` never take part in matching.
        let declared = media_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        if declared.is_empty() {
            return false;
        }
        self.allowed_types.iter().any(|allowed| {
            let allowed = allowed.trim().to_ascii_lowercase();
            match allowed.strip_suffix("/*") {
                Some(top) => declared
                    .strip_prefix(top)
                    .is_some_and(|rest| rest.starts_with('/') && rest.len() > 1),
                None => allowed == declared,
            }
        })
    }

    /// Cap expressed in whole MiB, for messages.
    pub fn max_mib(&self) -> u64 {
        self.max_bytes / MIB
    }
}

/// Validate a selection: presence, then media type, then size.
pub fn validate(file: Option<&SourceFile>, policy: &ValidationPolicy) -> Result<(), ValidationError> {
    let file = file.ok_or(ValidationError::MissingFile)?;

    if !policy.allows(file.media_type()) {
        return Err(ValidationError::UnsupportedType {
            media_type: file.media_type().to_string(),
        });
    }

    if file.size() > policy.max_bytes {
        return Err(ValidationError::TooLarge {
            size: file.size(),
            max: policy.max_bytes,
        });
    }

    Ok(())
}
