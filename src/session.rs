//! Self-issued client session tokens.
//!
//! A token only partitions private-message visibility. It is not a
//! credential: there is no server-side registration and anyone holding a
//! token sees that session's private messages.

use std::fs;
use std::path::{Path, PathBuf};

use rand::Rng;

use crate::error::AppError;

const SUFFIX_LEN: usize = 13;
const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// `session_<unix millis>_<random base36>`
pub fn generate_session_id() -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..SUFFIX_LEN)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect();

    format!("session_{}_{}", chrono::Utc::now().timestamp_millis(), suffix)
}

/// Client-side token storage backed by a single file.
pub struct SessionFile {
    path: PathBuf,
}

impl SessionFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Return the stored token, creating and persisting one on first use.
    pub fn get_or_create(&self) -> Result<String, AppError> {
        if let Ok(existing) = fs::read_to_string(&self.path) {
            let existing = existing.trim();
            if !existing.is_empty() {
                return Ok(existing.to_string());
            }
        }

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let token = generate_session_id();
        fs::write(&self.path, &token)?;
        tracing::debug!(path = %self.path.display(), "Created new session token");
        Ok(token)
    }
}
