//! A ready-made HTTP iteration for soaking a site over a fixed page list.
//!
//! Reproduces the classic CMS soak-test shape: GET requests round-robined
//! over a page list, a `wordpress_logged_in=` cookie sent to punch through
//! any logged-in-aware cache layer, response bodies discarded, and status
//! 200 as the sole success criterion.
use crate::error::Error;
use crate::rotation::PageRotation;
use reqwest::{header, Client, StatusCode};
use std::future::Future;
use std::num::NonZeroUsize;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
#[allow(unused)]
use tracing::{debug, error, info, trace, warn};

const DEFAULT_BASE_URL_VAR: &str = "TARGET_URL";
const DEFAULT_BASE_URL: &str = "http://127.0.0.1";
const CACHE_BUSTER_COOKIE: &str = "wordpress_logged_in=";
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// The boxed future one page-plan iteration resolves to.
pub type PageIterationFuture = Pin<Box<dyn Future<Output = Result<(), RequestError>> + Send>>;

/// A failed page fetch. Both variants count as failed iterations; neither
/// ever aborts a run.
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected status {0}")]
    Status(StatusCode),
}

/// Builder for the HTTP iteration: base URL, page rotation, and client knobs.
#[derive(Debug, Clone)]
pub struct PagePlan {
    base_url: Option<String>,
    base_url_var: String,
    pages: Vec<String>,
    insecure_skip_tls_verify: bool,
    request_timeout: Duration,
    cookie: Option<String>,
}

impl PagePlan {
    pub fn new<I, S>(pages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            base_url: None,
            base_url_var: DEFAULT_BASE_URL_VAR.to_string(),
            pages: pages.into_iter().map(Into::into).collect(),
            insecure_skip_tls_verify: false,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            cookie: Some(CACHE_BUSTER_COOKIE.to_string()),
        }
    }

    /// Explicit base URL; takes precedence over the environment variable.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Environment variable the base URL is read from when not set
    /// explicitly (default `TARGET_URL`); falls back to `http://127.0.0.1`.
    pub fn base_url_env(mut self, var: impl Into<String>) -> Self {
        self.base_url_var = var.into();
        self
    }

    /// Skip TLS certificate verification (self-signed staging targets).
    pub fn insecure_skip_tls_verify(mut self, skip: bool) -> Self {
        self.insecure_skip_tls_verify = skip;
        self
    }

    /// Per-request timeout. A timed-out request is a failed iteration, and
    /// this bound is also what keeps the cooperative shutdown drain short.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Replace the default `wordpress_logged_in=` cache-buster cookie.
    pub fn cookie(mut self, cookie: impl Into<String>) -> Self {
        self.cookie = Some(cookie.into());
        self
    }

    /// Send no cookie at all (let caches serve the cached variant).
    pub fn no_cookie(mut self) -> Self {
        self.cookie = None;
        self
    }

    /// Validate the plan and produce the iteration function to hand to
    /// [`Harness::new`](crate::Harness::new).
    pub fn build(
        self,
    ) -> Result<impl Fn() -> PageIterationFuture + Clone + Send + Sync + 'static, Error> {
        let len = NonZeroUsize::new(self.pages.len()).ok_or(Error::NoPages)?;

        let base_url = match self.base_url {
            Some(url) => url,
            None => std::env::var(&self.base_url_var)
                .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
        };
        let base_url = base_url.trim_end_matches('/').to_string();

        let mut builder = Client::builder().timeout(self.request_timeout);
        if self.insecure_skip_tls_verify {
            builder = builder.danger_accept_invalid_certs(true);
        }
        let client = builder.build()?;

        let shared = Arc::new(SharedPlan {
            client,
            base_url,
            pages: self.pages,
            rotation: PageRotation::new(len),
            cookie: self.cookie,
        });

        Ok(move || {
            let shared = shared.clone();
            Box::pin(async move { shared.fetch_next().await }) as PageIterationFuture
        })
    }
}

struct SharedPlan {
    client: Client,
    base_url: String,
    pages: Vec<String>,
    rotation: PageRotation,
    cookie: Option<String>,
}

impl SharedPlan {
    async fn fetch_next(&self) -> Result<(), RequestError> {
        let page = &self.pages[self.rotation.next()];

        let mut request = self.client.get(format!("{}{}", self.base_url, page));
        if let Some(cookie) = &self.cookie {
            request = request.header(header::COOKIE, cookie.as_str());
        }

        let response = request.send().await?;
        let status = response.status();
        // Drain and discard the body; only its presence is of interest.
        let body = response.bytes().await?;
        trace!(%status, bytes = body.len(), "GET {page}");

        if status == StatusCode::OK {
            Ok(())
        } else {
            Err(RequestError::Status(status))
        }
    }
}
