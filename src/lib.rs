//! Client core for the background-removal and watermark-removal panels.
//!
//! The UI shell hands a file to an [`session::UploadSession`], which
//! validates it, keeps a local preview alive, submits it through a
//! [`transport::Transport`] and publishes a terminal state. The
//! [`relay`] module is the server-side forwarder used when the backend
//! cannot be reached directly.

/// Config model and persistence helpers.
pub mod config;
/// Localized user-facing strings.
pub mod i18n;
/// Maps transport failures to user-facing categories.
pub mod classifier;
/// Endpoint + policy pairs for each processing panel.
pub mod panel;
/// The single persisted UI preference.
pub mod prefs;
/// Scoped local preview handles.
pub mod preview;
/// Byte-for-byte relay proxy.
pub mod relay;
/// Upload/process/result state machine.
pub mod session;
/// Process-wide settings and base URL resolution.
pub mod settings;
/// Files selected by the user.
pub mod source;
/// Multipart submission and response normalization.
pub mod transport;
/// Pre-network file checks.
pub mod validator;
