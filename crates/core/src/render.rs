//! Rendering fallback for pages that only fill in with script.
//!
//! When the static HTML yields almost nothing, the page is loaded in a script
//! executing engine and polled until its text stops growing. The whole wait is
//! bounded by a hard timeout, after which whatever has rendered is used.
//!
//! A headless Chromium implementation is available with the `render` feature.

use std::future::Future;
use std::time::{Duration, Instant};

use tokio::time::timeout;
use tracing::{debug, warn};
use url::Url;

use crate::parse::Document;
use crate::{ExtractError, Result};

/// A page loaded in a rendering engine.
pub trait RenderSession: Send {
    /// Current HTML of the page.
    fn snapshot(&mut self) -> impl Future<Output = Result<String>> + Send;

    /// Releases the page.
    fn close(self) -> impl Future<Output = ()> + Send
    where
        Self: Sized,
    {
        async {}
    }
}

/// Something that can load a URL and run its scripts.
pub trait Renderer: Send + Sync {
    type Session: RenderSession;

    /// Starts loading `url`.
    fn open(&self, url: &Url) -> impl Future<Output = Result<Self::Session>> + Send;
}

/// Polling schedule for [`render_with_retry`].
#[derive(Debug, Clone, PartialEq)]
pub struct RenderConfig {
    /// Content polls before giving up on stabilization (default: 5)
    pub attempts: u32,
    /// Wait after the first poll, doubled after each following one (default: 500ms)
    pub initial_backoff: Duration,
    /// Upper bound on the wait between polls (default: 4s)
    pub max_backoff: Duration,
    /// Body text length a stable page must reach (default: 100)
    pub stable_threshold: usize,
    /// Bound on the whole render, including page load (default: 30s)
    pub hard_timeout: Duration,
    /// Time allowed for the forced snapshot after a hard timeout (default: 5s)
    pub final_snapshot_timeout: Duration,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            attempts: 5,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(4),
            stable_threshold: 100,
            hard_timeout: Duration::from_secs(30),
            final_snapshot_timeout: Duration::from_secs(5),
        }
    }
}

/// Renders `url` and returns its HTML once the content has settled.
///
/// The page is polled with exponential backoff; two consecutive polls with
/// the same body text length above the threshold end the wait early. On hard
/// timeout the current page content is taken as is.
///
/// # Errors
///
/// Returns [`ExtractError::Timeout`] if the page never opened in time and
/// [`ExtractError::Render`] (or the renderer's own error) if it could not be
/// loaded or read at all.
pub async fn render_with_retry<R>(renderer: &R, url: &Url, config: &RenderConfig) -> Result<String>
where
    R: Renderer + ?Sized,
{
    let started = Instant::now();
    let hard_timeout_secs = config.hard_timeout.as_secs();

    let mut session = match timeout(config.hard_timeout, renderer.open(url)).await {
        Ok(session) => session?,
        Err(_) => return Err(ExtractError::Timeout { timeout: hard_timeout_secs }),
    };

    let mut latest: Option<String> = None;
    let remaining = config.hard_timeout.saturating_sub(started.elapsed());
    let polled = timeout(remaining, poll_until_stable(&mut session, config, &mut latest)).await;

    let html = match polled {
        Ok(Ok(())) => latest,
        Ok(Err(e)) if latest.is_none() => {
            session.close().await;
            return Err(e);
        }
        Ok(Err(e)) => {
            warn!(url = %url, error = %e, "render poll failed, using last snapshot");
            latest
        }
        Err(_) => {
            warn!(url = %url, "render timed out, extracting current content");
            match timeout(config.final_snapshot_timeout, session.snapshot()).await {
                Ok(Ok(html)) => Some(html),
                _ => latest,
            }
        }
    };

    session.close().await;
    html.ok_or(ExtractError::Timeout { timeout: hard_timeout_secs })
}

async fn poll_until_stable<S: RenderSession>(
    session: &mut S,
    config: &RenderConfig,
    latest: &mut Option<String>,
) -> Result<()> {
    let attempts = config.attempts.max(1);
    let mut delay = config.initial_backoff;
    let mut previous_len: Option<usize> = None;

    for attempt in 1..=attempts {
        let html = session.snapshot().await?;
        let len = visible_text_len(&html);
        *latest = Some(html);
        debug!(attempt, len, "render poll");

        if len >= config.stable_threshold && previous_len == Some(len) {
            return Ok(());
        }
        previous_len = Some(len);

        if attempt < attempts {
            tokio::time::sleep(delay).await;
            delay = (delay * 2).min(config.max_backoff);
        }
    }
    Ok(())
}

fn visible_text_len(html: &str) -> usize {
    Document::parse(html).map(|doc| doc.body_text_len()).unwrap_or(0)
}

#[cfg(feature = "render")]
pub use chromium::{ChromiumRenderer, ChromiumSession};

#[cfg(feature = "render")]
mod chromium {
    use chromiumoxide::browser::{Browser, BrowserConfig};
    use chromiumoxide::page::Page;
    use futures::StreamExt;
    use tokio::task::JoinHandle;
    use tracing::{debug, warn};
    use url::Url;

    use super::{RenderSession, Renderer};
    use crate::{ExtractError, Result};

    fn render_error(e: impl std::fmt::Display) -> ExtractError {
        ExtractError::Render(e.to_string())
    }

    /// Headless Chromium behind the [`Renderer`] interface.
    pub struct ChromiumRenderer {
        browser: Browser,
        handler: JoinHandle<()>,
    }

    impl ChromiumRenderer {
        /// Launches a headless browser.
        ///
        /// # Errors
        ///
        /// Returns [`ExtractError::Render`] if no Chromium executable can be started.
        pub async fn launch() -> Result<Self> {
            let config = BrowserConfig::builder().no_sandbox().build().map_err(ExtractError::Render)?;
            let (browser, mut handler) = Browser::launch(config).await.map_err(render_error)?;

            let handler = tokio::spawn(async move {
                while let Some(event) = handler.next().await {
                    if let Err(e) = event {
                        debug!(error = %e, "browser handler event failed");
                    }
                }
            });
            Ok(Self { browser, handler })
        }

        /// Closes the browser and waits for its process to exit.
        pub async fn shutdown(mut self) {
            if let Err(e) = self.browser.close().await {
                warn!(error = %e, "failed to close browser");
            }
            if let Err(e) = self.browser.wait().await {
                warn!(error = %e, "failed to wait for browser exit");
            }
            self.handler.abort();
        }
    }

    pub struct ChromiumSession {
        page: Page,
    }

    impl RenderSession for ChromiumSession {
        async fn snapshot(&mut self) -> Result<String> {
            self.page.content().await.map_err(render_error)
        }

        async fn close(self) {
            if let Err(e) = self.page.close().await {
                debug!(error = %e, "failed to close page");
            }
        }
    }

    impl Renderer for ChromiumRenderer {
        type Session = ChromiumSession;

        async fn open(&self, url: &Url) -> Result<ChromiumSession> {
            let page = self.browser.new_page(url.as_str()).await.map_err(render_error)?;
            Ok(ChromiumSession { page })
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use url::Url;

    use super::{RenderSession, Renderer};
    use crate::{ExtractError, Result};

    /// Renderer that replays a fixed series of snapshots.
    #[derive(Clone, Default)]
    pub struct ScriptedRenderer {
        pub snapshots: Vec<String>,
        pub poll_delay: Duration,
        pub open_delay: Duration,
        pub fail_open: bool,
        pub polls: Arc<AtomicUsize>,
    }

    impl ScriptedRenderer {
        pub fn new(snapshots: &[&str]) -> Self {
            Self { snapshots: snapshots.iter().map(|s| s.to_string()).collect(), ..Default::default() }
        }

        pub fn poll_count(&self) -> usize {
            self.polls.load(Ordering::SeqCst)
        }
    }

    pub struct ScriptedSession {
        renderer: ScriptedRenderer,
    }

    impl RenderSession for ScriptedSession {
        async fn snapshot(&mut self) -> Result<String> {
            tokio::time::sleep(self.renderer.poll_delay).await;
            let n = self.renderer.polls.fetch_add(1, Ordering::SeqCst);
            let last = self.renderer.snapshots.len().saturating_sub(1);
            self.renderer
                .snapshots
                .get(n.min(last))
                .cloned()
                .ok_or_else(|| ExtractError::Render("nothing rendered".to_string()))
        }
    }

    impl Renderer for ScriptedRenderer {
        type Session = ScriptedSession;

        async fn open(&self, _url: &Url) -> Result<ScriptedSession> {
            tokio::time::sleep(self.open_delay).await;
            if self.fail_open {
                return Err(ExtractError::Render("browser unavailable".to_string()));
            }
            Ok(ScriptedSession { renderer: self.clone() })
        }
    }

    pub fn page(text: &str) -> String {
        format!("<html><body><main><p>{}</p></main></body></html>", text)
    }
}
