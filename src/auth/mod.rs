//! Interactive login: open the login page, let the user sign in, and save the
//! browser session the moment the login is seen.

pub mod detector;

use crate::browser::{BrowserSession, PageSurface};
use crate::config::Config;
use crate::error::Result;
use crate::models::AuthOutcome;
use crate::session::{CredentialStore, SessionCredential};
use log::{debug, info, warn};

pub use detector::{DetectionChannel, DetectorConfig, SessionDetector, WatchOutcome};

/// Drive one login flow on `session`, persisting the captured session to `store`
pub async fn run_login_flow<B: BrowserSession>(
    session: &B,
    store: &CredentialStore,
    config: &Config,
) -> Result<AuthOutcome> {
    let detector = SessionDetector::new(DetectorConfig::from_config(config)?);
    let surface = session.open_surface().await?;

    info!("Opening {}; sign in to continue", config.site.login_url);
    if let Err(e) = surface.navigate(&config.site.login_url).await {
        // The user can still finish the login by hand
        warn!("Login page did not settle: {}", e);
    }

    let persist = {
        let surface = surface.clone();
        let store = store.clone();
        move || {
            let surface = surface.clone();
            let store = store.clone();
            async move {
                let credential = SessionCredential::capture(surface.as_ref()).await?;
                debug!(
                    "Captured {} cookies, {} storage entries",
                    credential.cookies.len(),
                    credential.local_storage.len()
                );
                store.save(&credential)
            }
        }
    };

    let outcome = detector
        .watch(surface.clone(), persist, |channel| {
            info!("Authentication succeeded ({})", channel);
        })
        .await;

    match outcome {
        WatchOutcome::LoggedIn(channel) => {
            if let Err(e) = surface.close().await {
                debug!("Closing login surface failed: {}", e);
            }
            Ok(AuthOutcome {
                success: true,
                reason: format!("login detected via {}", channel),
            })
        }
        WatchOutcome::Closed => {
            warn!("Login window closed before a session was saved");
            Ok(AuthOutcome {
                success: false,
                reason: "login window closed before a session was saved".to_string(),
            })
        }
    }
}
