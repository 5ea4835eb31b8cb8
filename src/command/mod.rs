//! Out-of-band protocol commands
//!
//! Three one-shot commands layered on the IMAP-like session: close the
//! introductory tutorial, change the spoken-menu language and change the
//! spoken-menu password. Each is a single request line answered with a
//! free-text line the client matches against a small substring table.

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use crate::store::SessionProvider;
use crate::types::error::SyncError;

pub const CLOSE_NUT: &str = "XCLOSE_NUT";
pub const CHANGE_TUI_LANGUAGE: &str = "XCHANGE_TUI_LANGUAGE";
pub const CHANGE_VM_PIN: &str = "XCHANGE_VM_PIN";

/// Language codes are a fixed table of at most 17 entries on the TUI side.
pub const MAX_LANGUAGE_CODE: u8 = 16;

/// Failure modes of a protocol command.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("transport failure: {0}")]
    Transport(String),

    /// Rejected before any network activity.
    #[error("language code out of range: {0}")]
    LanguageCodeOutOfRange(u8),

    #[error("language not offered by the service")]
    InvalidLanguage,

    #[error("old password mismatch")]
    OldPasswordMismatch,

    #[error("password too long")]
    PasswordTooLong,

    #[error("password too short")]
    PasswordTooShort,

    #[error("password contains invalid characters")]
    PasswordInvalidCharacters,

    #[error("unrecognized server response: {0}")]
    UnrecognizedResponse(String),
}

impl From<CommandError> for SyncError {
    fn from(err: CommandError) -> Self {
        match err {
            CommandError::Transport(cause) => SyncError::Transport(cause),
            CommandError::LanguageCodeOutOfRange(code) => {
                SyncError::InvalidInput(format!("language code out of range: {code}"))
            }
            other => SyncError::Domain(other.to_string()),
        }
    }
}

/// Issues OMTP session commands and maps the textual responses to typed
/// outcomes.
pub struct ProtocolCommandClient {
    sessions: Arc<dyn SessionProvider>,
}

impl ProtocolCommandClient {
    pub fn new(sessions: Arc<dyn SessionProvider>) -> Self {
        Self { sessions }
    }

    /// Close the new-user tutorial on the TUI.
    pub async fn close_nut(&self) -> Result<(), CommandError> {
        self.run_command(CLOSE_NUT.to_string(), "NUT closed", &[])
            .await
    }

    /// Change the spoken-menu language. Codes above the table size are
    /// rejected without touching the network.
    pub async fn change_tui_language(&self, code: u8) -> Result<(), CommandError> {
        if code > MAX_LANGUAGE_CODE {
            return Err(CommandError::LanguageCodeOutOfRange(code));
        }

        self.run_command(
            format!("{CHANGE_TUI_LANGUAGE} LANG={code}"),
            "language changed successfully",
            &[("invalid language", CommandError::InvalidLanguage)],
        )
        .await
    }

    /// Change the spoken-menu password.
    pub async fn change_tui_password(
        &self,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), CommandError> {
        self.run_command(
            format!("{CHANGE_VM_PIN} PWD={new_password} OLD_PWD={old_password}"),
            "password changed successfully",
            &[
                ("old password mismatch", CommandError::OldPasswordMismatch),
                ("password too long", CommandError::PasswordTooLong),
                ("password too short", CommandError::PasswordTooShort),
                (
                    "password contains invalid characters",
                    CommandError::PasswordInvalidCharacters,
                ),
            ],
        )
        .await
    }

    /// Send one request line and scan the response for the success marker
    /// or a recognized failure. Anything else is a generic failure.
    async fn run_command(
        &self,
        line: String,
        success_marker: &str,
        failures: &[(&str, CommandError)],
    ) -> Result<(), CommandError> {
        let mut session = self
            .sessions
            .open()
            .await
            .map_err(|e| CommandError::Transport(e.to_string()))?;

        let response = session
            .send_command(&line)
            .await
            .map_err(|e| CommandError::Transport(e.to_string()))?;

        for text in &response {
            if text.contains(success_marker) {
                info!(command = %command_name(&line), "command succeeded");
                // Best-effort: a failed logout never turns a successful
                // command into a failure.
                if let Err(err) = session.terminate().await {
                    warn!(error = %err, "session termination failed after success");
                }
                return Ok(());
            }
            for (marker, outcome) in failures {
                if text.contains(marker) {
                    return Err(outcome.clone());
                }
            }
        }

        Err(CommandError::UnrecognizedResponse(response.join(" / ")))
    }
}

fn command_name(line: &str) -> &str {
    line.split_whitespace().next().unwrap_or(line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ProtocolSession;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use tokio::sync::Mutex;

    struct ScriptedSession {
        response: Vec<String>,
        sent: Arc<Mutex<Vec<String>>>,
        terminated: Arc<AtomicBool>,
        fail_terminate: bool,
    }

    #[async_trait]
    impl ProtocolSession for ScriptedSession {
        async fn send_command(
            &mut self,
            line: &str,
        ) -> std::result::Result<Vec<String>, SyncError> {
            self.sent.lock().await.push(line.to_string());
            Ok(self.response.clone())
        }

        async fn terminate(&mut self) -> std::result::Result<(), SyncError> {
            if self.fail_terminate {
                return Err(SyncError::Transport("BYE lost".to_string()));
            }
            self.terminated.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    struct ScriptedProvider {
        response: Vec<String>,
        sent: Arc<Mutex<Vec<String>>>,
        terminated: Arc<AtomicBool>,
        opens: AtomicU32,
        fail_terminate: bool,
    }

    impl ScriptedProvider {
        fn new(response: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                response: response.iter().map(|s| s.to_string()).collect(),
                sent: Arc::new(Mutex::new(Vec::new())),
                terminated: Arc::new(AtomicBool::new(false)),
                opens: AtomicU32::new(0),
                fail_terminate: false,
            })
        }
    }

    #[async_trait]
    impl SessionProvider for ScriptedProvider {
        async fn open(&self) -> std::result::Result<Box<dyn ProtocolSession>, SyncError> {
            self.opens.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(ScriptedSession {
                response: self.response.clone(),
                sent: self.sent.clone(),
                terminated: self.terminated.clone(),
                fail_terminate: self.fail_terminate,
            }))
        }
    }

    fn client(provider: &Arc<ScriptedProvider>) -> ProtocolCommandClient {
        ProtocolCommandClient::new(provider.clone())
    }

    #[tokio::test]
    async fn test_close_nut_success_terminates_session() {
        let provider = ScriptedProvider::new(&["NUT closed"]);

        client(&provider).close_nut().await.unwrap();

        assert_eq!(provider.sent.lock().await.as_slice(), ["XCLOSE_NUT"]);
        assert!(provider.terminated.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_close_nut_unexpected_response_is_generic_failure() {
        let provider = ScriptedProvider::new(&["NUT already closed?"]);

        let err = client(&provider).close_nut().await.unwrap_err();
        assert!(matches!(err, CommandError::UnrecognizedResponse(_)));
        assert!(!provider.terminated.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_change_language_builds_request_line() {
        let provider = ScriptedProvider::new(&["language changed successfully"]);

        client(&provider).change_tui_language(7).await.unwrap();

        assert_eq!(
            provider.sent.lock().await.as_slice(),
            ["XCHANGE_TUI_LANGUAGE LANG=7"]
        );
    }

    #[tokio::test]
    async fn test_change_language_rejects_out_of_range_before_network() {
        let provider = ScriptedProvider::new(&["language changed successfully"]);

        let err = client(&provider).change_tui_language(17).await.unwrap_err();

        assert_eq!(err, CommandError::LanguageCodeOutOfRange(17));
        assert_eq!(provider.opens.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_change_language_invalid_language_is_domain_failure() {
        let provider = ScriptedProvider::new(&["NO invalid language"]);

        let err = client(&provider).change_tui_language(3).await.unwrap_err();
        assert_eq!(err, CommandError::InvalidLanguage);
    }

    #[tokio::test]
    async fn test_change_password_maps_each_rejection() {
        let cases = [
            ("old password mismatch", CommandError::OldPasswordMismatch),
            ("password too long", CommandError::PasswordTooLong),
            ("password too short", CommandError::PasswordTooShort),
            (
                "password contains invalid characters",
                CommandError::PasswordInvalidCharacters,
            ),
        ];

        for (response, expected) in cases {
            let provider = ScriptedProvider::new(&[response]);
            let err = client(&provider)
                .change_tui_password("0000", "1234")
                .await
                .unwrap_err();
            assert_eq!(err, expected);
        }
    }

    #[tokio::test]
    async fn test_change_password_success() {
        let provider = ScriptedProvider::new(&["OK password changed successfully"]);

        client(&provider)
            .change_tui_password("0000", "1234")
            .await
            .unwrap();

        assert_eq!(
            provider.sent.lock().await.as_slice(),
            ["XCHANGE_VM_PIN PWD=1234 OLD_PWD=0000"]
        );
        assert!(provider.terminated.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_failed_termination_does_not_fail_the_command() {
        let provider = Arc::new(ScriptedProvider {
            response: vec!["NUT closed".to_string()],
            sent: Arc::new(Mutex::new(Vec::new())),
            terminated: Arc::new(AtomicBool::new(false)),
            opens: AtomicU32::new(0),
            fail_terminate: true,
        });

        // Logout errors are logged, never surfaced.
        client(&provider).close_nut().await.unwrap();
    }
}
