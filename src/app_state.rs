//! Application facade
//!
//! `AppState` owns the configuration, the post store and the credential slot,
//! and exposes the top-level operations used by the CLI:
//!
//! - `authenticate`: interactive login, saves the browser session
//! - `search`: discover and extract posts, nothing persisted
//! - `persist`: idempotent bulk insert
//! - `query` / `update` / `delete`: manage stored posts

use crate::auth;
use crate::browser::{BrowserManager, BrowserSession};
use crate::config::Config;
use crate::db::Database;
use crate::error::{Result, ScraperError};
use crate::models::{
    AuthOutcome, ExtractedItem, PersistSummary, PostFilter, PostUpdate, SearchOutcome, StoredPost,
};
use crate::scrape;
use crate::session::{CredentialStore, SessionCredential};
use log::{info, warn};

pub struct AppState {
    pub config: Config,
    pub db: Database,
    pub credentials: CredentialStore,
}

impl AppState {
    /// Open the store named in `config`
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let db = Database::open(&config.database_path)?;
        Ok(Self::with_database(config, db))
    }

    /// Use an already opened store
    pub fn with_database(config: Config, db: Database) -> Self {
        let credentials = CredentialStore::new(&config.session_path);
        Self {
            config,
            db,
            credentials,
        }
    }

    /// Run the login flow in a visible browser window
    ///
    /// Without `force`, a valid saved session short-circuits the flow. With
    /// `force` the saved session stays in place until a new login replaces it.
    pub async fn authenticate(&self, force: bool) -> Result<AuthOutcome> {
        if let Some(outcome) = self.already_authenticated(force) {
            return Ok(outcome);
        }

        let browser = BrowserManager::launch(self.config.browser.interactive()).await?;
        auth::run_login_flow(&browser, &self.credentials, &self.config).await
    }

    /// Login flow against a caller-provided session
    pub async fn authenticate_in<B: BrowserSession>(
        &self,
        session: &B,
        force: bool,
    ) -> Result<AuthOutcome> {
        if let Some(outcome) = self.already_authenticated(force) {
            return Ok(outcome);
        }
        auth::run_login_flow(session, &self.credentials, &self.config).await
    }

    fn already_authenticated(&self, force: bool) -> Option<AuthOutcome> {
        if force || self.valid_credential().is_err() {
            return None;
        }
        info!("Saved session is still valid");
        Some(AuthOutcome {
            success: true,
            reason: "already authenticated".to_string(),
        })
    }

    /// Search posts for `keywords`, `depth` extra result pages deep
    ///
    /// Fails with an authentication error before any browser is launched when
    /// no usable session is saved.
    pub async fn search(&self, keywords: &str, depth: Option<u32>) -> Result<SearchOutcome> {
        Self::check_keywords(keywords)?;
        let credential = self.valid_credential()?;

        let browser = BrowserManager::launch(self.config.browser.clone()).await?;
        self.search_in(&browser, &credential, keywords, depth).await
    }

    /// Search against a caller-provided session
    pub async fn search_in<B: BrowserSession>(
        &self,
        session: &B,
        credential: &SessionCredential,
        keywords: &str,
        depth: Option<u32>,
    ) -> Result<SearchOutcome> {
        Self::check_keywords(keywords)?;
        let depth = depth.unwrap_or(self.config.scrape.default_pagination_depth);
        let outcome = scrape::search(session, credential, &self.config, keywords, depth).await?;

        if let Err(e) = self.credentials.mark_validated() {
            warn!("Could not record session validation: {}", e);
        }
        Ok(outcome)
    }

    pub fn persist(&self, items: &[ExtractedItem], keywords: Option<&str>) -> Result<PersistSummary> {
        Ok(self.db.persist(items, keywords)?)
    }

    pub fn query(&self, filter: &PostFilter) -> Result<Vec<StoredPost>> {
        Ok(self.db.query_posts(filter)?)
    }

    pub fn count(&self, filter: &PostFilter) -> Result<i64> {
        Ok(self.db.count_posts(filter)?)
    }

    pub fn get(&self, id: i64) -> Result<Option<StoredPost>> {
        Ok(self.db.get_post(id)?)
    }

    /// Apply only the fields set in `update`; returns rows changed
    pub fn update(&self, ids: &[i64], update: &PostUpdate) -> Result<usize> {
        if update.is_empty() {
            return Err(ScraperError::InvalidInput("no fields to update".to_string()));
        }
        Ok(self.db.update_posts(ids, update)?)
    }

    pub fn delete(&self, ids: &[i64]) -> Result<usize> {
        Ok(self.db.delete_posts(ids)?)
    }

    fn valid_credential(&self) -> Result<SessionCredential> {
        self.credentials
            .require_valid(&self.config.site.auth_cookie, self.config.site.session_max_age())
    }

    fn check_keywords(keywords: &str) -> Result<()> {
        if keywords.trim().is_empty() {
            return Err(ScraperError::InvalidInput("search keywords are empty".to_string()));
        }
        Ok(())
    }
}
