//! Upload/process/result state machine for one processing panel.
//!
//! ```text
//! Idle --select--> Validating --rejected--> Idle
//!                      |
//!                      +--accepted--> Uploading --ok--> Succeeded
//!                                         |
//!                                         +--err--> Failed
//! Succeeded | Failed | Uploading --reset--> Idle
//! ```
//!
//! The session never performs I/O itself. [`UploadSession::select`] hands
//! out an [`UploadTicket`]; whoever runs the request reports back through
//! [`UploadSession::complete`] with the ticket's task id. Completions for a
//! task that has since been reset or replaced are ignored.

use thiserror::Error;
use uuid::Uuid;

use crate::{
    classifier::Failure,
    panel::Panel,
    preview::{PreviewHandle, PreviewStore},
    source::SourceFile,
    transport::{EndpointConfig, NormalizedImageResult, Transport, TransportError},
    validator::{self, ValidationError},
};

/// Observable state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Validating,
    Uploading,
    Succeeded,
    Failed,
}

/// Why a selection did not start an upload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectError {
    #[error("an upload is already in progress")]
    Busy,

    #[error(transparent)]
    Rejected(#[from] ValidationError),
}

/// Everything needed to run the request for an accepted selection.
#[derive(Debug, Clone)]
pub struct UploadTicket {
    pub task_id: Uuid,
    pub file: SourceFile,
    pub endpoint: EndpointConfig,
}

/// Whether a completion changed the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Applied(SessionState),
    Stale,
}

/// One accepted file and the preview it owns.
#[derive(Debug)]
pub struct UploadTask {
    id: Uuid,
    source: SourceFile,
    preview: PreviewHandle,
}

impl UploadTask {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn source(&self) -> &SourceFile {
        &self.source
    }

    pub fn preview(&self) -> &PreviewHandle {
        &self.preview
    }
}

#[derive(Debug)]
enum Phase {
    Idle,
    Validating,
    Uploading(UploadTask),
    Succeeded(UploadTask, NormalizedImageResult),
    Failed(UploadTask, Failure),
}

/// Owns at most one live task for a panel.
#[derive(Debug)]
pub struct UploadSession {
    panel: Panel,
    previews: PreviewStore,
    phase: Phase,
    rejection: Option<ValidationError>,
}

impl UploadSession {
    pub fn new(panel: Panel, previews: PreviewStore) -> Self {
        Self {
            panel,
            previews,
            phase: Phase::Idle,
            rejection: None,
        }
    }

    pub fn panel(&self) -> &Panel {
        &self.panel
    }

    pub fn state(&self) -> SessionState {
        match self.phase {
            Phase::Idle => SessionState::Idle,
            Phase::Validating => SessionState::Validating,
            Phase::Uploading(_) => SessionState::Uploading,
            Phase::Succeeded(..) => SessionState::Succeeded,
            Phase::Failed(..) => SessionState::Failed,
        }
    }

    /// The live task, if any.
    pub fn task(&self) -> Option<&UploadTask> {
        match &self.phase {
            Phase::Uploading(t) | Phase::Succeeded(t, _) | Phase::Failed(t, _) => Some(t),
            Phase::Idle | Phase::Validating => None,
        }
    }

    pub fn result(&self) -> Option<&NormalizedImageResult> {
        match &self.phase {
            Phase::Succeeded(_, r) => Some(r),
            _ => None,
        }
    }

    pub fn failure(&self) -> Option<&Failure> {
        match &self.phase {
            Phase::Failed(_, f) => Some(f),
            _ => None,
        }
    }

    /// The last selection the validator turned down, until the next selection or reset.
    pub fn rejection(&self) -> Option<&ValidationError> {
        self.rejection.as_ref()
    }

    /// Start a task for a selected file.
    ///
    /// Ignored with [`SelectError::Busy`] while a request is in flight. A
    /// finished task is discarded first, as if the user had reset.
    pub fn select(&mut self, file: Option<SourceFile>) -> Result<UploadTicket, SelectError> {
        if let Phase::Uploading(task) = &self.phase {
            tracing::warn!(task_id = %task.id, "selection ignored: upload in progress");
            return Err(SelectError::Busy);
        }
        self.discard_task();
        self.rejection = None;

        self.phase = Phase::Validating;
        if let Err(e) = validator::validate(file.as_ref(), &self.panel.policy) {
            tracing::warn!(kind = ?self.panel.kind(), "file rejected: {e}");
            self.phase = Phase::Idle;
            self.rejection = Some(e.clone());
            return Err(SelectError::Rejected(e));
        }
        let Some(file) = file else {
            self.phase = Phase::Idle;
            return Err(SelectError::Rejected(ValidationError::MissingFile));
        };

        let task = UploadTask {
            id: Uuid::new_v4(),
            preview: self.previews.create(&file),
            source: file,
        };
        tracing::info!(
            task_id = %task.id,
            kind = ?self.panel.kind(),
            file = task.source.name(),
            "upload started"
        );
        let ticket = UploadTicket {
            task_id: task.id,
            file: task.source.clone(),
            endpoint: self.panel.endpoint.clone(),
        };
        self.phase = Phase::Uploading(task);
        Ok(ticket)
    }

    /// Record the outcome of a ticket's request.
    pub fn complete(
        &mut self,
        task_id: Uuid,
        outcome: Result<NormalizedImageResult, TransportError>,
    ) -> Completion {
        let task = match std::mem::replace(&mut self.phase, Phase::Idle) {
            Phase::Uploading(task) if task.id == task_id => task,
            other => {
                self.phase = other;
                tracing::warn!(%task_id, "late response ignored");
                return Completion::Stale;
            }
        };

        self.phase = match outcome {
            Ok(result) => {
                tracing::info!(%task_id, "upload succeeded");
                Phase::Succeeded(task, result)
            }
            Err(e) => {
                let failure = Failure::from_error(&e);
                tracing::error!(%task_id, category = ?failure.category, "upload failed: {e}");
                Phase::Failed(task, failure)
            }
        };
        Completion::Applied(self.state())
    }

    /// "Upload new": drop the task and its preview. No-op when already idle.
    pub fn reset(&mut self) {
        self.rejection = None;
        if self.task().is_some() {
            tracing::info!(kind = ?self.panel.kind(), "session reset");
        }
        self.discard_task();
    }

    /// Select, submit and complete in one go.
    pub async fn process<T>(
        &mut self,
        file: Option<SourceFile>,
        transport: &T,
    ) -> Result<SessionState, SelectError>
    where
        T: Transport + ?Sized,
    {
        let ticket = self.select(file)?;
        let outcome = transport.submit(&ticket.file, &ticket.endpoint).await;
        self.complete(ticket.task_id, outcome);
        Ok(self.state())
    }

    fn discard_task(&mut self) {
        match std::mem::replace(&mut self.phase, Phase::Idle) {
            Phase::Uploading(task) | Phase::Succeeded(task, _) | Phase::Failed(task, _) => {
                task.preview.release();
            }
            Phase::Idle | Phase::Validating => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        classifier::UserFacingCategory, transport::EndpointKind, validator::ValidationPolicy,
    };
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    };

    /// Answers every submit with the next scripted outcome.
    struct FakeTransport {
        outcomes: Mutex<Vec<Result<NormalizedImageResult, TransportError>>>,
        calls: AtomicUsize,
        fields: Mutex<Vec<String>>,
    }

    impl FakeTransport {
        fn new(outcomes: Vec<Result<NormalizedImageResult, TransportError>>) -> Self {
            Self {
                outcomes: Mutex::new(outcomes.into_iter().rev().collect()),
                calls: AtomicUsize::new(0),
                fields: Mutex::new(vec![]),
            }
        }
    }

    #[async_trait]
    impl Transport for FakeTransport {
        async fn submit(
            &self,
            _file: &SourceFile,
            endpoint: &EndpointConfig,
        ) -> Result<NormalizedImageResult, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.fields.lock().unwrap().push(endpoint.field_name.clone());
            self.outcomes
                .lock()
                .unwrap()
                .pop()
                .expect("no scripted outcome left")
        }
    }

    fn remote(url: &str) -> NormalizedImageResult {
        NormalizedImageResult::RemoteReference { url: url.into() }
    }

    fn png(size: usize) -> SourceFile {
        SourceFile::new("photo.png", "image/png", vec![7u8; size])
    }

    fn background() -> (UploadSession, PreviewStore) {
        let store = PreviewStore::new();
        let session = UploadSession::new(
            Panel::background_removal(ValidationPolicy::background_removal()),
            store.clone(),
        );
        (session, store)
    }

    #[tokio::test]
    async fn test_oversized_file_never_reaches_transport() {
        let (mut session, store) = background();
        let transport = FakeTransport::new(vec![]);
        let jpeg = SourceFile::new("big.jpg", "image/jpeg", vec![0u8; 20_000_000]);

        let err = session.process(Some(jpeg), &transport).await.unwrap_err();

        assert!(matches!(
            err,
            SelectError::Rejected(ValidationError::TooLarge { .. })
        ));
        assert_eq!(session.state(), SessionState::Idle);
        assert!(session.rejection().is_some());
        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
        assert_eq!(store.created_count(), 0);
    }

    #[tokio::test]
    async fn test_success_stores_result() {
        let (mut session, store) = background();
        let transport = FakeTransport::new(vec![Ok(remote("https://x.test/files/abc.png"))]);

        let state = session.process(Some(png(2_000_000)), &transport).await.unwrap();

        assert_eq!(state, SessionState::Succeeded);
        assert_eq!(
            session.result().map(|r| r.display_url()),
            Some("https://x.test/files/abc.png".to_string())
        );
        assert!(session.failure().is_none());
        assert_eq!(store.live_count(), 1);
        assert_eq!(transport.fields.lock().unwrap().as_slice(), ["image_file"]);
    }

    #[tokio::test]
    async fn test_service_unavailable_fails_with_server_error() {
        let (mut session, _store) = background();
        let transport = FakeTransport::new(vec![Err(TransportError::HttpError {
            status: 503,
            message: "Service Unavailable".into(),
            body: r#"{"detail":"Service Unavailable"}"#.into(),
        })]);

        let state = session.process(Some(png(10)), &transport).await.unwrap();

        assert_eq!(state, SessionState::Failed);
        let failure = session.failure().unwrap();
        assert_eq!(failure.category, UserFacingCategory::ServerError);
        assert!(failure.detail.contains("503"));
        assert!(session.result().is_none());
    }

    #[test]
    fn test_select_while_uploading_is_busy() {
        let (mut session, store) = background();
        let first = session.select(Some(png(10))).unwrap();

        assert!(matches!(
            session.select(Some(png(20))),
            Err(SelectError::Busy)
        ));
        assert_eq!(session.state(), SessionState::Uploading);
        assert_eq!(session.task().unwrap().id(), first.task_id);
        assert_eq!(store.created_count(), 1);
    }

    #[test]
    fn test_reset_twice_is_noop() {
        let (mut session, store) = background();
        let ticket = session.select(Some(png(10))).unwrap();
        session.complete(ticket.task_id, Ok(remote("https://x.test/a.png")));

        session.reset();
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(store.released_count(), 1);

        session.reset();
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(store.released_count(), 1);
        assert!(session.result().is_none());
    }

    #[test]
    fn test_late_response_after_reset_is_ignored() {
        let (mut session, store) = background();
        let ticket = session.select(Some(png(10))).unwrap();

        session.reset();
        assert_eq!(store.live_count(), 0);

        let completion = session.complete(ticket.task_id, Ok(remote("https://x.test/a.png")));
        assert_eq!(completion, Completion::Stale);
        assert_eq!(session.state(), SessionState::Idle);
        assert!(session.result().is_none());
    }

    #[test]
    fn test_late_response_does_not_touch_newer_task() {
        let (mut session, _store) = background();
        let old = session.select(Some(png(10))).unwrap();
        session.reset();
        let new = session.select(Some(png(10))).unwrap();

        assert_eq!(
            session.complete(old.task_id, Err(TransportError::NetworkFailure("x".into()))),
            Completion::Stale
        );
        assert_eq!(session.state(), SessionState::Uploading);
        assert_eq!(
            session.complete(new.task_id, Ok(remote("https://x.test/b.png"))),
            Completion::Applied(SessionState::Succeeded)
        );
    }

    #[test]
    fn test_each_cycle_releases_previous_preview_once() {
        let (mut session, store) = background();
        let n = 5;
        let mut last_url = String::new();

        for i in 0..n {
            let ticket = session.select(Some(png(10 + i))).unwrap();
            last_url = session.task().unwrap().preview().url().to_string();
            let outcome = if i % 2 == 0 {
                Ok(remote("https://x.test/a.png"))
            } else {
                Err(TransportError::MalformedResponse("bad".into()))
            };
            session.complete(ticket.task_id, outcome);
        }

        // Every new selection released the previous preview.
        assert_eq!(store.created_count(), n as u64);
        assert_eq!(store.released_count(), n as u64 - 1);
        assert_eq!(store.live_count(), 1);
        assert!(store.resolve(&last_url).is_some());

        session.reset();
        assert_eq!(store.released_count(), n as u64);
        assert_eq!(store.live_count(), 0);
    }

    #[test]
    fn test_rejection_after_success_discards_old_task() {
        let (mut session, store) = background();
        let ticket = session.select(Some(png(10))).unwrap();
        session.complete(ticket.task_id, Ok(remote("https://x.test/a.png")));

        let err = session.select(None).unwrap_err();
        assert_eq!(err, SelectError::Rejected(ValidationError::MissingFile));
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(store.live_count(), 0);
    }

    #[tokio::test]
    async fn test_watermark_panel_uses_its_own_contract() {
        let store = PreviewStore::new();
        let mut session = UploadSession::new(
            Panel::watermark_removal(ValidationPolicy::watermark_removal()),
            store,
        );
        let transport = FakeTransport::new(vec![Ok(NormalizedImageResult::InlinePayload {
            media_type: "image/png".into(),
            data: Bytes::from_static(b"png"),
            session_id: Some("s1".into()),
        })]);

        // GIF is fine for background removal but not here.
        let gif = SourceFile::new("a.gif", "image/gif", vec![1u8; 10]);
        assert!(session.process(Some(gif), &transport).await.is_err());

        let state = session.process(Some(png(10)), &transport).await.unwrap();
        assert_eq!(state, SessionState::Succeeded);
        assert_eq!(session.panel().kind(), EndpointKind::Dewatermark);
        assert_eq!(transport.fields.lock().unwrap().as_slice(), ["image"]);
    }
}
