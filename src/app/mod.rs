//! TUIのイベントループ、入力処理、状態管理。

mod handlers;
mod render;

use airemover::{
    classifier::Failure,
    config::Config,
    i18n,
    panel::Panel,
    prefs::PrefStore,
    preview::PreviewStore,
    session::{Completion, SessionState, UploadSession},
    settings::Settings,
    transport::{EndpointKind, HttpTransport},
};
use anyhow::Result;
use crossterm::event::{self, Event};
use std::{sync::Arc, time::Duration};
use tokio::sync::mpsc;

use crate::{
    events::UiState,
    input::InputBoxState,
    shortcuts::Shortcuts,
    ui::Tui,
    worker::{self, WorkerCmd, WorkerEvent},
};

use handlers::{handle_key, is_ctrl_c};
use render::draw;

/// 入力処理と描画で共有するアプリ状態。
pub struct App {
    /// 背景除去パネルのセッション。
    pub background: UploadSession,
    /// 透かし除去パネルのセッション。
    pub watermark: UploadSession,
    /// 両パネルで共有するプレビュー登録簿。
    pub previews: PreviewStore,
    /// 言語設定の保存先。
    pub prefs: PrefStore,
    /// 選択パネルやステータスなどUI固有の状態。
    pub ui: UiState,
    /// Workerへのコマンド送信チャネル。
    pub worker_tx: mpsc::Sender<WorkerCmd>,
    /// Workerからのイベント受信チャネル。
    pub worker_rx: mpsc::Receiver<WorkerEvent>,
    /// 入力ボックスの状態（入力中はSome）。
    pub input_box: Option<InputBoxState>,
    /// 直前に開いたパス（次回の初期値）。
    pub last_path: String,
    /// キーバインド設定。
    pub shortcuts: Shortcuts,
}

impl App {
    pub fn new(
        cfg: &Config,
        prefs: PrefStore,
        shortcuts: Shortcuts,
        worker_tx: mpsc::Sender<WorkerCmd>,
        worker_rx: mpsc::Receiver<WorkerEvent>,
    ) -> Self {
        let previews = PreviewStore::new();
        let lang = prefs.language();
        Self {
            background: UploadSession::new(
                Panel::from_config(EndpointKind::RemoveBackground, cfg),
                previews.clone(),
            ),
            watermark: UploadSession::new(
                Panel::from_config(EndpointKind::Dewatermark, cfg),
                previews.clone(),
            ),
            previews,
            prefs,
            ui: UiState::new(lang),
            worker_tx,
            worker_rx,
            input_box: None,
            last_path: String::new(),
            shortcuts,
        }
    }

    pub fn session(&self, kind: EndpointKind) -> &UploadSession {
        match kind {
            EndpointKind::RemoveBackground => &self.background,
            EndpointKind::Dewatermark => &self.watermark,
        }
    }

    pub fn session_mut(&mut self, kind: EndpointKind) -> &mut UploadSession {
        match kind {
            EndpointKind::RemoveBackground => &mut self.background,
            EndpointKind::Dewatermark => &mut self.watermark,
        }
    }

    /// 表示中パネルのセッション。
    pub fn active_session(&self) -> &UploadSession {
        self.session(self.ui.active)
    }
}

/// ユーザーが終了するまでメインTUIループを回す。
pub async fn run_app(terminal: &mut Tui, cfg: Config, settings: Settings, prefs: PrefStore) -> Result<()> {
    // キーバインド設定を読み込む（無ければデフォルト）。
    let shortcuts = Shortcuts::load_or_default("shortcut.toml")?;

    // Worker通信用のコマンド/イベントチャネルを作る。
    let (tx_cmd, rx_cmd) = mpsc::channel::<WorkerCmd>(64);
    let (tx_ev, rx_ev) = mpsc::channel::<WorkerEvent>(256);

    // 通信はWorker側のみで行う。
    let transport = Arc::new(HttpTransport::new(reqwest::Client::new(), settings));
    tokio::spawn(worker::run(rx_cmd, tx_ev, transport));

    let mut app = App::new(&cfg, prefs, shortcuts, tx_cmd, rx_ev);

    loop {
        // 現在の状態を描画する。
        terminal.draw(|f| draw(f, &app))?;

        // 入力処理の前にWorkerイベントを消化する。
        while let Ok(ev) = app.worker_rx.try_recv() {
            handle_worker_event(&mut app, ev);
        }

        // UIの応答性確保のため短いタイムアウトで入力をポーリングする。
        if event::poll(Duration::from_millis(50))?
            && let Event::Key(k) = event::read()?
        {
            if is_ctrl_c(&k) {
                break;
            }
            if handle_key(&mut app, k).await? {
                break;
            }
        }
    }
    Ok(())
}

/// WorkerイベントをUI状態へ反映する。
fn handle_worker_event(app: &mut App, ev: WorkerEvent) {
    let lang = app.ui.lang;
    match ev {
        WorkerEvent::Processed {
            kind,
            task_id,
            outcome,
        } => {
            let completion = app.session_mut(kind).complete(task_id, outcome);
            match completion {
                Completion::Applied(SessionState::Succeeded) => {
                    app.ui.push_log(format!("{kind:?}: done"));
                    if kind == app.ui.active {
                        app.ui.error = None;
                        app.ui.status = lang.texts().upload_new.into();
                    }
                }
                Completion::Applied(SessionState::Failed) => {
                    if let Some(Failure { category, detail }) = app.session(kind).failure().cloned() {
                        let message = i18n::category_message(lang, category);
                        app.ui.push_log(format!("{kind:?}: {detail}"));
                        if kind == app.ui.active {
                            app.ui.error = Some(message.into());
                        }
                    }
                }
                Completion::Applied(_) => {}
                Completion::Stale => {
                    // リセット後に届いた応答は捨てる。
                    app.ui.push_log(format!("{kind:?}: late response ignored"));
                }
            }
        }
        WorkerEvent::Saved(path) => {
            app.ui.status = format!("Saved {}", path.display());
            app.ui.push_log(format!("saved {}", path.display()));
        }
        WorkerEvent::Health(Ok(h)) => {
            app.ui.status = format!("backend: {} {} {}", h.status, h.version, h.message);
        }
        WorkerEvent::Health(Err(e)) => {
            let failure = Failure::from_error(&e);
            app.ui.push_log(format!("health: {}", failure.detail));
            app.ui.error = Some(i18n::category_message(lang, failure.category).into());
        }
        WorkerEvent::Log(s) => app.ui.push_log(s),
        WorkerEvent::DownloadFailed(s) => {
            app.ui.push_log(format!("save failed: {s}"));
            app.ui.error = Some(lang.texts().download_error.into());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use airemover::{
        source::SourceFile,
        transport::{NormalizedImageResult, TransportError},
    };

    pub(super) fn test_app(dir: &std::path::Path) -> (App, mpsc::Receiver<WorkerCmd>) {
        let (tx_cmd, rx_cmd) = mpsc::channel(8);
        let (_tx_ev, rx_ev) = mpsc::channel(8);
        let app = App::new(
            &Config::default(),
            PrefStore::new(dir.join("prefs.toml")),
            Shortcuts::default(),
            tx_cmd,
            rx_ev,
        );
        (app, rx_cmd)
    }

    fn png() -> SourceFile {
        SourceFile::new("a.png", "image/png", vec![1u8; 64])
    }

    #[test]
    fn test_failure_is_localized_for_active_panel() {
        let dir = tempfile::tempdir().unwrap();
        let (mut app, _rx) = test_app(dir.path());
        let ticket = app.background.select(Some(png())).unwrap();

        handle_worker_event(
            &mut app,
            WorkerEvent::Processed {
                kind: EndpointKind::RemoveBackground,
                task_id: ticket.task_id,
                outcome: Err(TransportError::HttpError {
                    status: 500,
                    message: "AI302_API_KEY not configured".into(),
                    body: String::new(),
                }),
            },
        );

        assert_eq!(app.background.state(), SessionState::Failed);
        assert_eq!(
            app.ui.error.as_deref(),
            Some("API key is not configured. Please contact administrator")
        );
    }

    #[test]
    fn test_completion_after_reset_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let (mut app, _rx) = test_app(dir.path());
        let ticket = app.watermark.select(Some(png())).unwrap();
        app.watermark.reset();

        handle_worker_event(
            &mut app,
            WorkerEvent::Processed {
                kind: EndpointKind::Dewatermark,
                task_id: ticket.task_id,
                outcome: Ok(NormalizedImageResult::RemoteReference {
                    url: "https://file.302.ai/x.png".into(),
                }),
            },
        );

        assert_eq!(app.watermark.state(), SessionState::Idle);
        assert_eq!(app.previews.live_count(), 0);
        assert!(app.ui.log.last().unwrap().contains("late response ignored"));
    }

    #[test]
    fn test_download_failure_message() {
        let dir = tempfile::tempdir().unwrap();
        let (mut app, _rx) = test_app(dir.path());
        handle_worker_event(&mut app, WorkerEvent::DownloadFailed("boom".into()));
        assert_eq!(app.ui.error.as_deref(), Some("Download failed. Please try again"));
    }
}
