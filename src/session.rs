//! Saved login session
//!
//! A [`SessionCredential`] is the browser state captured right after a
//! successful login: cookies plus local storage. It lives in a single JSON
//! file owned by [`CredentialStore`]; writes replace the file atomically.

use crate::browser::{BrowserError, PageSurface};
use crate::error::{Result, ScraperError};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredCookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    pub path: String,
    /// Unix seconds, `None` for session cookies
    pub expires: Option<f64>,
    #[serde(default)]
    pub http_only: bool,
    #[serde(default)]
    pub secure: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionCredential {
    pub cookies: Vec<StoredCookie>,
    #[serde(default)]
    pub local_storage: BTreeMap<String, String>,
    pub captured_at: DateTime<Utc>,
    pub last_validated: DateTime<Utc>,
}

/// Why a stored credential can't be used
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialProblem {
    MissingCookie,
    Expired,
}

impl SessionCredential {
    /// Snapshot the browser state of a surface
    pub async fn capture<S: PageSurface + ?Sized>(
        surface: &S,
    ) -> std::result::Result<Self, BrowserError> {
        let cookies = surface.cookies().await?;
        let local_storage = surface.local_storage().await?;
        let now = Utc::now();

        Ok(Self {
            cookies,
            local_storage,
            captured_at: now,
            last_validated: now,
        })
    }

    pub fn has_cookie(&self, name: &str) -> bool {
        self.cookies
            .iter()
            .any(|c| c.name == name && !c.value.is_empty())
    }

    /// A credential is usable when it carries the auth cookie and is younger than `max_age`
    pub fn check(
        &self,
        auth_cookie: &str,
        max_age: Duration,
        now: DateTime<Utc>,
    ) -> std::result::Result<(), CredentialProblem> {
        if !self.has_cookie(auth_cookie) {
            return Err(CredentialProblem::MissingCookie);
        }
        if now - self.captured_at > max_age {
            return Err(CredentialProblem::Expired);
        }
        Ok(())
    }

    /// Load this session into a fresh surface. Local storage is origin-scoped,
    /// so the surface navigates to `origin_url` first.
    pub async fn restore<S: PageSurface + ?Sized>(
        &self,
        surface: &S,
        origin_url: &str,
    ) -> std::result::Result<(), BrowserError> {
        surface.set_cookies(&self.cookies).await?;
        if !self.local_storage.is_empty() {
            surface.navigate(origin_url).await?;
            surface.set_local_storage(&self.local_storage).await?;
        }
        Ok(())
    }
}

/// The single credential slot on disk
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Read the stored credential, `None` when the slot is empty
    pub fn load(&self) -> Result<Option<SessionCredential>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&self.path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    /// Atomically replace the stored credential
    pub fn save(&self, credential: &SessionCredential) -> Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;

        let json = serde_json::to_vec_pretty(credential)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        tmp.write_all(&json)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| ScraperError::Io(e.error))?;

        log::info!("Session saved to {}", self.path.display());
        Ok(())
    }

    /// Remove the stored credential. Missing file is not an error.
    pub fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                log::info!("Cleared saved session {}", self.path.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Load and check the credential; missing or stale sessions become errors
    pub fn require_valid(&self, auth_cookie: &str, max_age: Duration) -> Result<SessionCredential> {
        let credential = self.load()?.ok_or_else(|| {
            ScraperError::AuthenticationRequired("no saved session".to_string())
        })?;

        match credential.check(auth_cookie, max_age, Utc::now()) {
            Ok(()) => Ok(credential),
            Err(CredentialProblem::MissingCookie) => Err(ScraperError::AuthenticationRequired(
                format!("saved session has no {} cookie", auth_cookie),
            )),
            Err(CredentialProblem::Expired) => Err(ScraperError::SessionExpired(
                credential.captured_at.to_rfc3339(),
            )),
        }
    }

    /// Record that the stored session was used successfully
    pub fn mark_validated(&self) -> Result<()> {
        if let Some(mut credential) = self.load()? {
            credential.last_validated = Utc::now();
            self.save(&credential)?;
        }
        Ok(())
    }
}
