//! キーバインド設定の管理。

use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// キーバインド設定の全体。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Shortcuts {
    pub main: MainShortcuts,
    pub input_box: InputBoxShortcuts,
}

/// メイン画面のキーバインド。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MainShortcuts {
    pub quit: Vec<String>,
    pub switch_panel: Vec<String>,
    pub open: Vec<String>,
    pub reset: Vec<String>,
    pub save: Vec<String>,
    pub health: Vec<String>,
    pub language: Vec<String>,
}

/// InputBoxのキーバインド。
///
/// パス入力で`h`/`l`を打てるよう、カーソル移動は矢印キーのみ。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InputBoxShortcuts {
    pub confirm: Vec<String>,
    pub cancel: Vec<String>,
    pub backspace: Vec<String>,
    pub delete: Vec<String>,
    pub left: Vec<String>,
    pub right: Vec<String>,
    pub home: Vec<String>,
    pub end: Vec<String>,
    pub clear_line: Vec<String>,
}

impl Shortcuts {
    /// TOMLから読み込み、無ければデフォルトを返す。
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Ok(toml::from_str(&content)?)
        } else {
            Ok(Self::default())
        }
    }
}

impl Default for MainShortcuts {
    fn default() -> Self {
        Self {
            quit: vec!["q".into()],
            switch_panel: vec!["Tab".into()],
            open: vec!["o".into(), "Enter".into()],
            reset: vec!["n".into()],
            save: vec!["s".into()],
            health: vec!["h".into()],
            language: vec!["l".into()],
        }
    }
}

impl Default for InputBoxShortcuts {
    fn default() -> Self {
        Self {
            confirm: vec!["Enter".into()],
            cancel: vec!["Esc".into()],
            backspace: vec!["Backspace".into()],
            delete: vec!["Delete".into()],
            left: vec!["Left".into()],
            right: vec!["Right".into()],
            home: vec!["Home".into()],
            end: vec!["End".into()],
            clear_line: vec!["Ctrl+u".into()],
        }
    }
}

/// KeyEventがいずれかのキー文字列と一致するか判定する。
pub fn matches_shortcut(key: &KeyEvent, shortcuts: &[String]) -> bool {
    shortcuts.iter().any(|s| matches_single_shortcut(key, s))
}

/// KeyEventが単一のキー文字列と一致するか判定する。
fn matches_single_shortcut(key: &KeyEvent, shortcut: &str) -> bool {
    // "Ctrl+u" のような修飾キー付き表記を分解する。
    let (modifiers_str, key_str) = match shortcut.rsplit_once('+') {
        Some((mods, key)) if !key.is_empty() => (mods.split('+').collect::<Vec<_>>(), key),
        _ => (vec![], shortcut),
    };

    let mut expected = KeyModifiers::empty();
    for modifier in modifiers_str {
        match modifier.to_ascii_lowercase().as_str() {
            "ctrl" => expected |= KeyModifiers::CONTROL,
            "alt" => expected |= KeyModifiers::ALT,
            "shift" => expected |= KeyModifiers::SHIFT,
            _ => return false,
        }
    }

    // 大文字入力ではSHIFTが付くため、Char同士の比較ではSHIFTを無視する。
    let actual = match key.code {
        KeyCode::Char(_) => key.modifiers.difference(KeyModifiers::SHIFT),
        _ => key.modifiers,
    };
    if actual != expected {
        return false;
    }

    match key_str.to_ascii_lowercase().as_str() {
        "enter" => key.code == KeyCode::Enter,
        "esc" => key.code == KeyCode::Esc,
        "tab" => key.code == KeyCode::Tab,
        "backspace" => key.code == KeyCode::Backspace,
        "delete" => key.code == KeyCode::Delete,
        "up" => key.code == KeyCode::Up,
        "down" => key.code == KeyCode::Down,
        "left" => key.code == KeyCode::Left,
        "right" => key.code == KeyCode::Right,
        "home" => key.code == KeyCode::Home,
        "end" => key.code == KeyCode::End,
        _ => {
            let mut chars = key_str.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => key.code == KeyCode::Char(c),
                _ => false,
            }
        }
    }
}
