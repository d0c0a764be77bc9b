//! 描画側と共有するUI状態。

use airemover::{i18n::Language, transport::EndpointKind};

/// 描画側と共有するUI状態。
#[derive(Clone, Debug)]
pub struct UiState {
    /// 表示中のパネル。
    pub active: EndpointKind,
    /// 表示言語。
    pub lang: Language,
    /// 右側パネルに表示するログ。
    pub log: Vec<String>,
    /// 画面下部のステータス文言。
    pub status: String,
    /// エラーメッセージ（強調表示用）。
    pub error: Option<String>,
}

impl UiState {
    pub fn new(lang: Language) -> Self {
        Self {
            active: EndpointKind::RemoveBackground,
            lang,
            log: vec![],
            status: lang.texts().upload_prompt.into(),
            error: None,
        }
    }

    /// もう一方のパネルへ切り替える。
    pub fn switch_panel(&mut self) {
        self.active = match self.active {
            EndpointKind::RemoveBackground => EndpointKind::Dewatermark,
            EndpointKind::Dewatermark => EndpointKind::RemoveBackground,
        };
        self.error = None;
    }

    /// ログを追加する（古いものから捨てる）。
    pub fn push_log(&mut self, line: impl Into<String>) {
        self.log.push(line.into());
        if self.log.len() > LOG_CAP {
            let overflow = self.log.len() - LOG_CAP;
            self.log.drain(..overflow);
        }
    }
}

/// 保持するログ行数の上限。
const LOG_CAP: usize = 200;
