//! キー入力ハンドラー関数。

use airemover::{
    i18n,
    session::{SelectError, SessionState},
    source::SourceFile,
};
use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use std::path::{Path, PathBuf};

use crate::{
    input::{InputBoxState, InputCallbackId},
    shortcuts,
    worker::WorkerCmd,
};

use super::App;

/// キー入力を1件処理し、終了すべきならtrueを返す。
pub async fn handle_key(app: &mut App, k: KeyEvent) -> Result<bool> {
    // 入力ボックスが開いていれば最優先で処理する。
    if app.input_box.is_some() {
        return handle_input_box_key(app, k).await;
    }
    handle_main_key(app, k).await
}

/// Ctrl+Cかどうかを判定する。
pub fn is_ctrl_c(k: &KeyEvent) -> bool {
    k.modifiers.contains(KeyModifiers::CONTROL) && k.code == KeyCode::Char('c')
}

/// メイン画面のキー処理。
async fn handle_main_key(app: &mut App, k: KeyEvent) -> Result<bool> {
    let sc = &app.shortcuts.main;
    let kind = app.ui.active;
    let t = app.ui.lang.texts();

    if shortcuts::matches_shortcut(&k, &sc.quit) {
        return Ok(true);
    } else if shortcuts::matches_shortcut(&k, &sc.switch_panel) {
        app.ui.switch_panel();
    } else if shortcuts::matches_shortcut(&k, &sc.open) {
        // 処理中は選択を受け付けない。
        if app.session(kind).state() == SessionState::Uploading {
            app.ui.error = Some(t.busy.into());
            return Ok(false);
        }
        let prompt = if app.session(kind).result().is_some() {
            t.upload_new
        } else {
            t.upload_prompt
        };
        app.input_box = Some(InputBoxState::new(
            prompt,
            app.last_path.clone(),
            InputCallbackId::OpenFile(kind),
        ));
    } else if shortcuts::matches_shortcut(&k, &sc.reset) {
        app.session_mut(kind).reset();
        app.ui.error = None;
        app.ui.status = t.upload_prompt.into();
    } else if shortcuts::matches_shortcut(&k, &sc.save) {
        if app.session(kind).result().is_some() {
            let name = default_result_name(
                app.session(kind).panel().download_prefix(),
                chrono::Utc::now().timestamp_millis(),
            );
            app.input_box = Some(InputBoxState::new(
                "Save as:",
                name,
                InputCallbackId::SaveResult(kind),
            ));
        } else {
            app.ui.status = "Nothing to save yet".into();
        }
    } else if shortcuts::matches_shortcut(&k, &sc.health) {
        app.worker_tx.send(WorkerCmd::HealthCheck).await?;
        app.ui.status = "Checking backend...".into();
    } else if shortcuts::matches_shortcut(&k, &sc.language) {
        app.ui.lang = app.ui.lang.next();
        // 保存に失敗しても表示は切り替える。
        if let Err(e) = app.prefs.set_language(app.ui.lang) {
            tracing::warn!("failed to persist language: {e}");
            app.ui.push_log(format!("language not saved: {e}"));
        }
        app.ui.error = None;
        app.ui.status = app.ui.lang.texts().upload_prompt.into();
    }

    Ok(false)
}

/// 入力ボックスのキー処理。
async fn handle_input_box_key(app: &mut App, k: KeyEvent) -> Result<bool> {
    let Some(input_state) = &mut app.input_box else {
        return Ok(false);
    };
    let sc = &app.shortcuts.input_box;

    // 入力ボックス中でもCtrl+Cで終了できるようにする。
    if is_ctrl_c(&k) {
        return Ok(true);
    }

    if shortcuts::matches_shortcut(&k, &sc.confirm) {
        // 閉じる前に値とコールバック種別を取り出す。
        let value = input_state.value.clone();
        let callback_id = input_state.callback_id;
        app.input_box = None;
        apply_input_callback(app, callback_id, value).await?;
    } else if shortcuts::matches_shortcut(&k, &sc.cancel) {
        app.input_box = None;
    } else if shortcuts::matches_shortcut(&k, &sc.backspace) {
        input_state.backspace();
    } else if shortcuts::matches_shortcut(&k, &sc.delete) {
        input_state.delete();
    } else if shortcuts::matches_shortcut(&k, &sc.left) {
        input_state.move_left();
    } else if shortcuts::matches_shortcut(&k, &sc.right) {
        input_state.move_right();
    } else if shortcuts::matches_shortcut(&k, &sc.home) {
        input_state.move_home();
    } else if shortcuts::matches_shortcut(&k, &sc.end) {
        input_state.move_end();
    } else if shortcuts::matches_shortcut(&k, &sc.clear_line) {
        input_state.clear_line();
    } else if let KeyCode::Char(c) = k.code
        && !k.modifiers.contains(KeyModifiers::CONTROL)
    {
        input_state.insert_char(c);
    }

    Ok(false)
}

/// 入力ボックスのコールバックを適用する。
async fn apply_input_callback(
    app: &mut App,
    callback_id: InputCallbackId,
    value: String,
) -> Result<()> {
    let lang = app.ui.lang;
    match callback_id {
        InputCallbackId::OpenFile(kind) => {
            app.last_path = value.clone();
            let file = load_source(app, &value).await;
            match app.session_mut(kind).select(file) {
                Ok(ticket) => {
                    app.ui.error = None;
                    app.ui.status = lang.texts().processing.into();
                    app.worker_tx
                        .send(WorkerCmd::Process { kind, ticket })
                        .await?;
                }
                Err(SelectError::Busy) => {
                    app.ui.error = Some(lang.texts().busy.into());
                }
                Err(SelectError::Rejected(e)) => {
                    app.ui.error = Some(i18n::rejection_message(lang, &e));
                }
            }
        }
        InputCallbackId::SaveResult(kind) => {
            let path = PathBuf::from(unquote(&value));
            if let Some(result) = app.session(kind).result().cloned() {
                app.worker_tx
                    .send(WorkerCmd::Download { result, path })
                    .await?;
                app.ui.status = "Saving...".into();
            }
        }
    }
    Ok(())
}

/// 入力パスを読み込む。空欄や読み込み失敗は未選択として扱う。
async fn load_source(app: &mut App, value: &str) -> Option<SourceFile> {
    let path = unquote(value);
    if path.is_empty() {
        return None;
    }
    match SourceFile::from_path(Path::new(path)).await {
        Ok(file) => Some(file),
        Err(e) => {
            tracing::warn!(path, "failed to read file: {e}");
            app.ui.push_log(format!("cannot read {path}: {e}"));
            None
        }
    }
}

/// 端末へのドラッグ&ドロップで付く引用符を外す。
fn unquote(value: &str) -> &str {
    value.trim().trim_matches(|c| c == '\'' || c == '"')
}

/// 保存ファイル名の既定値。
fn default_result_name(prefix: &str, millis: i64) -> String {
    format!("{prefix}_{millis}.png")
}
