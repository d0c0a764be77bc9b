//! TUI描画関連の関数。

use airemover::{
    i18n::{self, Language, Texts},
    session::{SessionState, UploadSession},
    transport::{EndpointKind, NormalizedImageResult},
};
use ratatui::{
    Frame,
    prelude::*,
    widgets::{Block, Borders, Paragraph, Tabs, Wrap},
};

use crate::{input, layout, shortcuts::Shortcuts};

use super::App;

/// 画面全体のレイアウトを描画する。
pub fn draw(f: &mut Frame, app: &App) {
    let t = app.ui.lang.texts();
    let main_layout = layout::create_main_layout(f.area());
    let body_layout = layout::create_body_layout(main_layout.body);

    // パネル切替タブ（処理中のパネルには印を付ける）。
    let titles = [EndpointKind::RemoveBackground, EndpointKind::Dewatermark].map(|kind| {
        let busy = app.session(kind).state() == SessionState::Uploading;
        format!("{}{}", panel_title(t, kind), if busy { " *" } else { "" })
    });
    let selected = match app.ui.active {
        EndpointKind::RemoveBackground => 0,
        EndpointKind::Dewatermark => 1,
    };
    let tabs = Tabs::new(titles)
        .block(Block::default().borders(Borders::ALL).title("AI Remover"))
        .select(selected)
        .highlight_style(
            Style::default()
                .bg(Color::Rgb(255, 140, 0))
                .fg(Color::Black)
                .add_modifier(Modifier::BOLD),
        );
    f.render_widget(tabs, main_layout.tabs);

    // 選択中パネルの内容。
    let session = app.active_session();
    let panel = Paragraph::new(build_panel_text(app.ui.lang, session))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(panel_title(t, app.ui.active)),
        )
        .wrap(Wrap { trim: true });
    f.render_widget(panel, body_layout.panel);

    // ログは末尾から表示できる分だけ出す。
    let visible = body_layout.log.height.saturating_sub(2) as usize;
    let skip = app.ui.log.len().saturating_sub(visible);
    let log = Paragraph::new(app.ui.log[skip..].join("\n"))
        .block(Block::default().borders(Borders::ALL).title("LOG"))
        .wrap(Wrap { trim: true });
    f.render_widget(log, body_layout.log);

    let help_bar = Paragraph::new(get_help_text(&app.shortcuts))
        .block(Block::default().borders(Borders::ALL).title("HELP"))
        .wrap(Wrap { trim: true });
    f.render_widget(help_bar, main_layout.help_bar);

    f.render_widget(build_status_bar(app), main_layout.status_bar);

    // 入力ボックスが開いていれば重ねて描画する。
    if let Some(input_state) = &app.input_box {
        input::render_input_box(f, input_state);
    }
}

fn panel_title(t: &Texts, kind: EndpointKind) -> &'static str {
    match kind {
        EndpointKind::RemoveBackground => t.background_title,
        EndpointKind::Dewatermark => t.watermark_title,
    }
}

/// パネル本文を構築する。
fn build_panel_text(lang: Language, session: &UploadSession) -> String {
    let t = lang.texts();
    let policy = &session.panel().policy;
    let mut lines = vec![format!(
        "Accepts: {} (max {}MB)",
        policy.allowed_types.join(", "),
        policy.max_mib()
    )];
    lines.push(String::new());

    if let Some(task) = session.task() {
        let file = task.source();
        lines.push(format!(
            "File: {} ({}, {} KB)",
            file.name(),
            file.media_type(),
            file.size().div_ceil(1024)
        ));
        lines.push(format!("Preview: {}", task.preview().url()));
        lines.push(String::new());
    }

    match session.state() {
        SessionState::Idle | SessionState::Validating => lines.push(t.upload_prompt.into()),
        SessionState::Uploading => {
            lines.push(t.processing.into());
            lines.push(t.processing_hint.into());
        }
        SessionState::Succeeded => {
            if let Some(result) = session.result() {
                lines.push(format!("Result: {}", describe_result(result)));
            }
            lines.push(String::new());
            lines.push(t.upload_new.into());
        }
        SessionState::Failed => {
            if let Some(failure) = session.failure() {
                lines.push(i18n::category_message(lang, failure.category).into());
            }
            lines.push(String::new());
            lines.push(t.upload_new.into());
        }
    }
    lines.join("\n")
}

/// 結果を1行で表す。インラインのdata URLは長すぎるので要約する。
fn describe_result(result: &NormalizedImageResult) -> String {
    match result {
        NormalizedImageResult::RemoteReference { url } => url.clone(),
        NormalizedImageResult::InlinePayload {
            media_type,
            data,
            session_id,
        } => {
            let mut s = format!("inline {media_type}, {} bytes", data.len());
            if let Some(id) = session_id {
                s.push_str(&format!(" (session {id})"));
            }
            s
        }
    }
}

/// ステータスバーを構築する。
fn build_status_bar(app: &App) -> Paragraph<'static> {
    let text = match &app.ui.error {
        Some(err) => format!("[{}] ERROR: {}", app.ui.lang.code(), err),
        None => format!("[{}] {}", app.ui.lang.code(), app.ui.status),
    };
    let mut status_bar = Paragraph::new(text)
        .block(Block::default().borders(Borders::ALL).title("STATUS"))
        .wrap(Wrap { trim: true });
    if app.ui.error.is_some() {
        status_bar = status_bar.style(Style::default().fg(Color::Red));
    }
    status_bar
}

/// ヘルプ文字列を返す。
fn get_help_text(shortcuts: &Shortcuts) -> String {
    let sc = &shortcuts.main;
    format!(
        "{}: open | {}: upload new | {}: save | {}: switch panel | {}: health | {}: language | {}: quit",
        format_keys(&sc.open),
        format_keys(&sc.reset),
        format_keys(&sc.save),
        format_keys(&sc.switch_panel),
        format_keys(&sc.health),
        format_keys(&sc.language),
        format_keys(&sc.quit),
    )
}

/// キー配列を表示用文字列に変換する。
fn format_keys(keys: &[String]) -> String {
    keys.join("/")
}
