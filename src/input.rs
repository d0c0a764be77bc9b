//! パス入力用の1行入力コンポーネント（InputBox）。

use airemover::transport::EndpointKind;
use ratatui::{
    layout::Alignment,
    prelude::*,
    widgets::{Block, Borders, Clear, Paragraph},
};

/// InputBox入力状態
#[derive(Clone, Debug)]
pub struct InputBoxState {
    /// プロンプトメッセージ
    pub prompt: String,
    /// 現在の入力値
    pub value: String,
    /// カーソル位置（文字単位）
    pub cursor: usize,
    /// 入力完了時のコールバック識別子
    pub callback_id: InputCallbackId,
}

/// 入力完了時のコールバック識別子
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputCallbackId {
    /// 指定パネルで処理する画像のパス
    OpenFile(EndpointKind),
    /// 指定パネルの結果の保存先
    SaveResult(EndpointKind),
}

impl InputBoxState {
    /// 初期値を入れ、カーソルを末尾に置いて開く。
    pub fn new(prompt: impl Into<String>, value: impl Into<String>, callback_id: InputCallbackId) -> Self {
        let value = value.into();
        Self {
            prompt: prompt.into(),
            cursor: value.chars().count(),
            value,
            callback_id,
        }
    }

    /// カーソル位置のバイトオフセット。
    fn byte_offset(&self, char_idx: usize) -> usize {
        self.value
            .char_indices()
            .nth(char_idx)
            .map(|(i, _)| i)
            .unwrap_or(self.value.len())
    }

    /// 文字を挿入
    pub fn insert_char(&mut self, c: char) {
        let at = self.byte_offset(self.cursor);
        self.value.insert(at, c);
        self.cursor += 1;
    }

    /// Backspace（カーソル前の文字を削除）
    pub fn backspace(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
            let at = self.byte_offset(self.cursor);
            self.value.remove(at);
        }
    }

    /// Delete（カーソル位置の文字を削除）
    pub fn delete(&mut self) {
        if self.cursor < self.value.chars().count() {
            let at = self.byte_offset(self.cursor);
            self.value.remove(at);
        }
    }

    /// カーソルを左に移動
    pub fn move_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    /// カーソルを右に移動
    pub fn move_right(&mut self) {
        if self.cursor < self.value.chars().count() {
            self.cursor += 1;
        }
    }

    /// カーソルを先頭に移動
    pub fn move_home(&mut self) {
        self.cursor = 0;
    }

    /// カーソルを末尾に移動
    pub fn move_end(&mut self) {
        self.cursor = self.value.chars().count();
    }

    /// 行全体をクリア
    pub fn clear_line(&mut self) {
        self.value.clear();
        self.cursor = 0;
    }
}

/// InputBoxをポップアップとして描画
pub fn render_input_box(f: &mut Frame, state: &InputBoxState) {
    // 中央に配置されたポップアップ領域を計算する。
    let popup_area = centered_popup(f.area(), 70, 7);
    f.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .title("Input")
        .style(Style::default().bg(Color::DarkGray));
    f.render_widget(block, popup_area);

    // プロンプト + 入力フィールド + 空行 + ヘルプ
    let inner = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .split(popup_area);

    let prompt = Paragraph::new(state.prompt.clone()).style(
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD),
    );
    f.render_widget(prompt, inner[0]);

    let input = Paragraph::new(visible_with_cursor(state, inner[1].width as usize))
        .style(Style::default().fg(Color::Green));
    f.render_widget(input, inner[1]);

    let help = Paragraph::new("Enter=OK | Esc=Cancel | Ctrl+U=Clear")
        .style(Style::default().fg(Color::Gray))
        .alignment(Alignment::Center);
    f.render_widget(help, inner[3]);
}

/// 表示幅に収まる範囲を切り出し、カーソル位置に`|`を挿入する。
fn visible_with_cursor(state: &InputBoxState, width: usize) -> String {
    // 長いパスではカーソルが見える位置まで横スクロールする。
    let scroll = state.cursor.saturating_sub(width.saturating_sub(2));
    let chars: Vec<char> = state.value.chars().skip(scroll).take(width).collect();
    let at = state.cursor.saturating_sub(scroll).min(chars.len());
    let before: String = chars[..at].iter().collect();
    let after: String = chars[at..].iter().collect();
    format!("{before}|{after}")
}

/// 中央配置のポップアップ領域を計算
fn centered_popup(area: Rect, width_percent: u16, height: u16) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length((area.height.saturating_sub(height)) / 2),
            Constraint::Length(height),
            Constraint::Min(0),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - width_percent) / 2),
            Constraint::Percentage(width_percent),
            Constraint::Percentage((100 - width_percent) / 2),
        ])
        .split(popup_layout[1])[1]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open(value: &str) -> InputBoxState {
        InputBoxState::new(
            "path",
            value,
            InputCallbackId::OpenFile(EndpointKind::RemoveBackground),
        )
    }

    #[test]
    fn test_editing_multibyte_path() {
        let mut s = open("写真.png");
        assert_eq!(s.cursor, 6);
        s.move_home();
        s.insert_char('/');
        assert_eq!(s.value, "/写真.png");
        s.move_right();
        s.delete();
        assert_eq!(s.value, "/写.png");
        s.backspace();
        assert_eq!(s.value, "写.png");
        assert_eq!(s.cursor, 0);
    }

    #[test]
    fn test_cursor_stays_in_bounds() {
        let mut s = open("ab");
        s.move_right();
        assert_eq!(s.cursor, 2);
        s.clear_line();
        s.move_left();
        s.backspace();
        assert_eq!(s.cursor, 0);
        assert!(s.value.is_empty());
    }

    #[test]
    fn test_visible_text_scrolls_to_cursor() {
        let s = open("abcdefghij");
        assert_eq!(visible_with_cursor(&s, 6), "ghij|");
        let mut s = open("abc");
        s.move_home();
        assert_eq!(visible_with_cursor(&s, 10), "|abc");
    }
}
