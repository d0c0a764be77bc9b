//! アプリケーションのエントリポイントとランタイム初期化。

use airemover::{config::Config, prefs::PrefStore, settings};
use anyhow::Result;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;

mod app;
mod events;
mod input;
mod layout;
mod shortcuts;
mod ui;
mod worker;

/// ファイルロギングを初期化し、非同期ガードを生存させる。
fn init_logging() -> Result<WorkerGuard> {
    // TUIの画面を汚さないよう、ファイルへ直接書き込む。
    let log_file = "airemover.log";
    let file_appender = tracing_appender::rolling::never(".", log_file);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to init logging: {e}"))?;
    tracing::info!("logging to {}", log_file);
    Ok(guard)
}

#[tokio::main]
/// エントリポイント：ログ初期化→設定解決→UI開始→端末復元。
async fn main() -> Result<()> {
    let _log_guard = init_logging()?;
    tracing::info!("app starting");

    // 設定ファイルを読み込む（初回はデフォルトを生成）。
    let cfg = Config::load_or_default(Path::new("config.toml"))?;
    // バックエンドURLは起動時に一度だけ解決する。
    let resolved = settings::install(settings::Settings::from_config(&cfg)?);
    tracing::info!(
        page_origin = resolved.page_origin(),
        base_url = resolved.base_url(),
        "backend resolved"
    );
    let prefs = PrefStore::new("prefs.toml");

    let res = {
        // ガードのDropで端末を必ず元に戻す。
        let mut guard = ui::TerminalGuard::enter()?;
        app::run_app(&mut guard.terminal, cfg, resolved.clone(), prefs).await
    };
    if let Err(ref e) = res {
        tracing::error!("app error: {e}");
    }
    tracing::info!("app exiting");
    res
}
