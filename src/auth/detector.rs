use crate::browser::{PageEvent, PageSurface};
use crate::config::Config;
use crate::error::{Result, ScraperError};
use futures::future::BoxFuture;
use futures::FutureExt;
use log::{debug, info, warn};
use regex::Regex;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;

/// What counts as "logged in" and how often to poll for it
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    pub logged_in_pattern: Regex,
    pub auth_cookie: String,
    pub poll_interval: Duration,
}

impl DetectorConfig {
    pub fn from_config(config: &Config) -> Result<Self> {
        let logged_in_pattern = Regex::new(&config.site.logged_in_url_pattern)
            .map_err(|e| ScraperError::Config(format!("site.logged_in_url_pattern: {}", e)))?;
        Ok(Self {
            logged_in_pattern,
            auth_cookie: config.site.auth_cookie.clone(),
            poll_interval: config.auth.poll_interval(),
        })
    }
}

/// The observation channel that saw the login first
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionChannel {
    /// URL already matched when the detector attached
    Immediate,
    /// Main-frame navigation landed on the logged-in page
    Navigation,
    /// Content finished loading on the logged-in page
    ContentLoaded,
    /// Periodic check of the auth cookie and URL
    Poll,
}

impl fmt::Display for DetectionChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DetectionChannel::Immediate => "immediate check",
            DetectionChannel::Navigation => "navigation",
            DetectionChannel::ContentLoaded => "content load",
            DetectionChannel::Poll => "poll",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchOutcome {
    /// Session saved; the channel that won the race
    LoggedIn(DetectionChannel),
    /// Surface closed before a session was saved
    Closed,
}

type PersistFn = Box<dyn Fn() -> BoxFuture<'static, Result<()>> + Send + Sync>;
type SuccessFn = Box<dyn FnOnce(DetectionChannel) + Send>;

/// First-signal-wins guard shared by every channel
///
/// `saved` flips before the save starts. A save that then fails leaves it
/// set, so no later signal can retry.
struct Latch {
    saved: AtomicBool,
    torn_down: AtomicBool,
    persist: PersistFn,
    on_success: Mutex<Option<SuccessFn>>,
    done: Mutex<Option<oneshot::Sender<DetectionChannel>>>,
}

impl Latch {
    fn is_settled(&self) -> bool {
        self.saved.load(Ordering::SeqCst) || self.torn_down.load(Ordering::SeqCst)
    }

    /// Returns true only for the call that persisted the session
    async fn fire(&self, channel: DetectionChannel) -> bool {
        if self.torn_down.load(Ordering::SeqCst) {
            return false;
        }
        if self.saved.swap(true, Ordering::SeqCst) {
            debug!("Login signal from {} ignored, session already claimed", channel);
            return false;
        }

        info!("Login detected via {}, saving session", channel);
        if let Err(e) = (self.persist)().await {
            warn!("Saving session after {} failed: {}", channel, e);
            return false;
        }

        let callback = self
            .on_success
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .take();
        if let Some(callback) = callback {
            callback(channel);
        }
        let done = self.done.lock().unwrap_or_else(|p| p.into_inner()).take();
        if let Some(done) = done {
            let _ = done.send(channel);
        }
        true
    }
}

/// Watches a user-driven login surface and saves the session exactly once
pub struct SessionDetector {
    config: DetectorConfig,
}

impl SessionDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self { config }
    }

    /// Observe `surface` until a login is detected and saved, or the surface closes
    ///
    /// Navigation events, content-load events and a poll timer race; `persist`
    /// runs for the first of them and `on_success` is called once after it
    /// succeeds. All channels are torn down before this returns.
    pub async fn watch<S, P, Fut, C>(
        &self,
        surface: Arc<S>,
        persist: P,
        on_success: C,
    ) -> WatchOutcome
    where
        S: PageSurface + 'static,
        P: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
        C: FnOnce(DetectionChannel) + Send + 'static,
    {
        let (done_tx, mut done_rx) = oneshot::channel();
        let persist: PersistFn = Box::new(move || persist().boxed());
        let on_success: SuccessFn = Box::new(on_success);
        let latch = Arc::new(Latch {
            saved: AtomicBool::new(false),
            torn_down: AtomicBool::new(false),
            persist,
            on_success: Mutex::new(Some(on_success)),
            done: Mutex::new(Some(done_tx)),
        });

        // Subscribe before the immediate check so no event slips between
        let navigations = surface.subscribe();
        let loads = surface.subscribe();
        let closes = surface.subscribe();

        if self.url_matches(surface.as_ref()).await {
            latch.fire(DetectionChannel::Immediate).await;
        }

        let tasks: Vec<JoinHandle<()>> = vec![
            tokio::spawn(navigation_channel(
                navigations,
                self.config.logged_in_pattern.clone(),
                latch.clone(),
            )),
            tokio::spawn(content_channel(
                loads,
                surface.clone(),
                self.config.logged_in_pattern.clone(),
                latch.clone(),
            )),
            tokio::spawn(poll_channel(surface.clone(), self.config.clone(), latch.clone())),
        ];

        let outcome = tokio::select! {
            biased;
            won = &mut done_rx => match won {
                Ok(channel) => WatchOutcome::LoggedIn(channel),
                Err(_) => WatchOutcome::Closed,
            },
            _ = wait_for_close(closes, surface.as_ref(), self.config.poll_interval) => {
                // A save may have finished in the same instant
                match done_rx.try_recv() {
                    Ok(channel) => WatchOutcome::LoggedIn(channel),
                    Err(_) => WatchOutcome::Closed,
                }
            }
        };

        latch.torn_down.store(true, Ordering::SeqCst);
        for task in tasks {
            task.abort();
        }
        debug!("Session detector torn down ({:?})", outcome);
        outcome
    }

    async fn url_matches<S: PageSurface + ?Sized>(&self, surface: &S) -> bool {
        match surface.current_url().await {
            Ok(url) => self.config.logged_in_pattern.is_match(&url),
            Err(e) => {
                debug!("Reading current URL failed: {}", e);
                false
            }
        }
    }
}

async fn navigation_channel(
    mut events: broadcast::Receiver<PageEvent>,
    pattern: Regex,
    latch: Arc<Latch>,
) {
    loop {
        match events.recv().await {
            Ok(PageEvent::Navigated { url, main_frame: true }) if pattern.is_match(&url) => {
                latch.fire(DetectionChannel::Navigation).await;
                return;
            }
            Ok(PageEvent::Closed) | Err(RecvError::Closed) => return,
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => debug!("Navigation listener skipped {} events", skipped),
        }
    }
}

async fn content_channel<S: PageSurface>(
    mut events: broadcast::Receiver<PageEvent>,
    surface: Arc<S>,
    pattern: Regex,
    latch: Arc<Latch>,
) {
    loop {
        match events.recv().await {
            Ok(PageEvent::ContentLoaded) => {
                let matched = surface
                    .current_url()
                    .await
                    .map(|url| pattern.is_match(&url))
                    .unwrap_or(false);
                if matched {
                    latch.fire(DetectionChannel::ContentLoaded).await;
                    return;
                }
            }
            Ok(PageEvent::Closed) | Err(RecvError::Closed) => return,
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => debug!("Content listener skipped {} events", skipped),
        }
    }
}

async fn poll_channel<S: PageSurface>(surface: Arc<S>, config: DetectorConfig, latch: Arc<Latch>) {
    let mut ticker = tokio::time::interval(config.poll_interval);
    // First tick completes immediately; the immediate check already covered it
    ticker.tick().await;

    loop {
        ticker.tick().await;
        if latch.is_settled() {
            return;
        }

        let has_cookie = match surface.cookies().await {
            Ok(cookies) => cookies
                .iter()
                .any(|c| c.name == config.auth_cookie && !c.value.is_empty()),
            Err(e) => {
                debug!("Cookie poll failed: {}", e);
                false
            }
        };
        let url_match = !has_cookie
            && surface
                .current_url()
                .await
                .map(|url| config.logged_in_pattern.is_match(&url))
                .unwrap_or(false);

        if has_cookie || url_match {
            latch.fire(DetectionChannel::Poll).await;
            return;
        }
    }
}

/// Resolves once the surface reports a close event or its target is gone
async fn wait_for_close<S: PageSurface + ?Sized>(
    mut events: broadcast::Receiver<PageEvent>,
    surface: &S,
    poll: Duration,
) {
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(PageEvent::Closed) | Err(RecvError::Closed) => return,
                _ => {}
            },
            _ = tokio::time::sleep(poll) => {
                if surface.is_closed().await {
                    return;
                }
            }
        }
    }
}
