//! Client-local preference storage. Only the UI language is persisted.

use anyhow::Result;
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use crate::i18n::Language;

/// Key under which the language code is stored.
pub const LANGUAGE_KEY: &str = "ai-bg-remover-language";

/// Key-value file holding the language entry.
#[derive(Debug, Clone)]
pub struct PrefStore {
    path: PathBuf,
}

impl PrefStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stored language, or English when missing or unknown.
    pub fn language(&self) -> Language {
        self.load_map()
            .ok()
            .and_then(|m| m.get(LANGUAGE_KEY).and_then(|c| Language::from_code(c)))
            .unwrap_or_default()
    }

    /// Persist the language entry.
    pub fn set_language(&self, lang: Language) -> Result<()> {
        let mut map = self.load_map()?;
        map.insert(LANGUAGE_KEY.to_string(), lang.code().to_string());
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, toml::to_string(&map)?)?;
        tracing::info!("language set to {}", lang.code());
        Ok(())
    }

    fn load_map(&self) -> Result<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let s = fs::read_to_string(&self.path)?;
        Ok(toml::from_str(&s)?)
    }
}
