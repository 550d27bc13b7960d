//! Login state persisted between invocations in `session.json`.
//!
//! The session is loaded once in `main` and passed to command handlers through
//! [`crate::commands::Context`]; nothing reads it from a global.

use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Failed to access session file: {0}")]
    Io(#[from] std::io::Error),

    /// The file exists but is not a valid session document.
    #[error("Corrupt session file: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Name of the logged-in user, if any.
    #[serde(default)]
    pub current_user_name: Option<String>,
}

impl Session {
    /// Load the session, treating a missing file as "nobody logged in".
    pub fn load(path: &Path) -> Result<Self, SessionError> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No session file, starting logged out");
                return Ok(Self::default());
            }
            Err(e) => return Err(SessionError::Io(e)),
        };

        let session: Session = serde_json::from_str(&content)?;
        Ok(session)
    }

    /// Persist the session using write-to-temp-then-rename, so a crash never
    /// leaves a truncated file behind.
    pub fn save(&self, path: &Path) -> Result<(), SessionError> {
        let json = serde_json::to_string_pretty(self)?;
        let temp_path = path.with_extension(format!("tmp.{:016x}", std::process::id()));

        let write_result = (|| -> std::io::Result<()> {
            let mut file = std::fs::File::create(&temp_path)?;
            file.write_all(json.as_bytes())?;
            file.sync_all()?;
            std::fs::rename(&temp_path, path)
        })();

        if let Err(e) = write_result {
            let _ = std::fs::remove_file(&temp_path);
            return Err(SessionError::Io(e));
        }

        tracing::debug!(path = %path.display(), user = ?self.current_user_name, "Saved session");
        Ok(())
    }

    pub fn current_user(&self) -> Option<&str> {
        self.current_user_name.as_deref()
    }

    pub fn set_user(&mut self, name: &str) {
        self.current_user_name = Some(name.to_string());
    }

    pub fn clear(&mut self) {
        self.current_user_name = None;
    }
}
