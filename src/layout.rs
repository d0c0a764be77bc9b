//! レイアウト計算のヘルパー関数

use ratatui::prelude::*;

/// メインレイアウトの領域
pub struct MainLayout {
    /// パネル切替タブの領域
    pub tabs: Rect,
    /// パネル本体 + ログの領域
    pub body: Rect,
    /// HELPバーの領域
    pub help_bar: Rect,
    /// STATUSバーの領域
    pub status_bar: Rect,
}

/// ボディ部の2つの領域
pub struct BodyLayout {
    /// 選択中パネルの領域
    pub panel: Rect,
    /// LOGの領域
    pub log: Rect,
}

/// メイン画面を分割（Tabs + Body + HELP + STATUS）
pub fn create_main_layout(area: Rect) -> MainLayout {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Tabs
            Constraint::Min(1),    // Body
            Constraint::Length(3), // HELPバー
            Constraint::Length(3), // STATUSバー
        ])
        .split(area);

    MainLayout {
        tabs: chunks[0],
        body: chunks[1],
        help_bar: chunks[2],
        status_bar: chunks[3],
    }
}

/// Body領域を分割（パネル 60% + LOG 40%）
pub fn create_body_layout(area: Rect) -> BodyLayout {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(area);

    BodyLayout {
        panel: chunks[0],
        log: chunks[1],
    }
}
