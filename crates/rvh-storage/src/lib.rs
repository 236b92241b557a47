//! Page fetching + the URL-addressed page cache for RVH.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::StatusCode;
use rvh_core::sha256_hex;
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info_span, Instrument};
use uuid::Uuid;

pub const CRATE_NAME: &str = "rvh-storage";

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("http status {status} for {url}")]
    HttpStatus { status: u16, url: String },
    #[error("response body for {url} is not valid utf-8")]
    Decode {
        url: String,
        #[source]
        source: std::string::FromUtf8Error,
    },
    #[error("page cache i/o at {path}")]
    Cache {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Anything that can turn a URL into raw page text.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;
}

#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub timeout: Duration,
    pub user_agent: Option<String>,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(20),
            user_agent: None,
        }
    }
}

/// Plain GET fetcher. One attempt per call; failures go straight back to the caller.
#[derive(Debug)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(config: HttpClientConfig) -> anyhow::Result<Self> {
        let mut builder = reqwest::Client::builder()
            .gzip(true)
            .brotli(true)
            .timeout(config.timeout);

        if let Some(user_agent) = &config.user_agent {
            builder = builder.user_agent(user_agent.clone());
        }

        let client = builder.build().context("building reqwest client")?;
        Ok(Self { client })
    }

    async fn get_text(&self, url: &str) -> Result<String, FetchError> {
        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        let final_url = resp.url().to_string();

        if !status.is_success() {
            return Err(http_status_error(status, final_url));
        }

        let body = resp.bytes().await?.to_vec();
        String::from_utf8(body).map_err(|source| FetchError::Decode {
            url: final_url,
            source,
        })
    }
}

fn http_status_error(status: StatusCode, url: String) -> FetchError {
    FetchError::HttpStatus {
        status: status.as_u16(),
        url,
    }
}

#[async_trait]
impl PageSource for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let span = info_span!("http_fetch", url);
        self.get_text(url).instrument(span).await
    }
}

/// One file per URL, named by the SHA-256 of the URL. Files are never rewritten.
#[derive(Debug, Clone)]
pub struct PageCache {
    root: PathBuf,
}

impl PageCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, url: &str) -> PathBuf {
        self.root.join(sha256_hex(url.as_bytes()))
    }

    pub async fn load(&self, url: &str) -> Result<Option<String>, FetchError> {
        let path = self.path_for(url);
        match fs::read_to_string(&path).await {
            Ok(contents) => Ok(Some(contents)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(FetchError::Cache { path, source }),
        }
    }

    /// Persist `contents` (plus a trailing newline) through a temp file and rename.
    pub async fn store(&self, url: &str, contents: &str) -> Result<PathBuf, FetchError> {
        let path = self.path_for(url);

        fs::create_dir_all(&self.root)
            .await
            .map_err(cache_error(&self.root))?;

        if fs::try_exists(&path).await.map_err(cache_error(&path))? {
            return Ok(path);
        }

        let temp_path = self.root.join(format!(".{}.tmp", Uuid::new_v4()));
        let mut file = fs::OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&temp_path)
            .await
            .map_err(cache_error(&temp_path))?;
        file.write_all(contents.as_bytes())
            .await
            .map_err(cache_error(&temp_path))?;
        file.write_all(b"\n").await.map_err(cache_error(&temp_path))?;
        file.flush().await.map_err(cache_error(&temp_path))?;
        drop(file);

        // `rename` replaces an existing target; append-only rests on `try_exists` above.
        match fs::rename(&temp_path, &path).await {
            Ok(()) => Ok(path),
            Err(source) => {
                let _ = fs::remove_file(&temp_path).await;
                Err(FetchError::Cache { path, source })
            }
        }
    }
}

fn cache_error(path: &Path) -> impl FnOnce(std::io::Error) -> FetchError {
    let path = path.to_path_buf();
    move |source| FetchError::Cache { path, source }
}

/// Serves pages from a [`PageCache`] when enabled, falling back to `inner`.
#[derive(Debug)]
pub struct CachingFetcher<S> {
    inner: S,
    cache: PageCache,
    enabled: bool,
}

impl<S: PageSource> CachingFetcher<S> {
    pub fn new(inner: S, cache: PageCache, enabled: bool) -> Self {
        Self {
            inner,
            cache,
            enabled,
        }
    }

    pub fn cache(&self) -> &PageCache {
        &self.cache
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

#[async_trait]
impl<S: PageSource> PageSource for CachingFetcher<S> {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        if !self.enabled {
            return self.inner.fetch(url).await;
        }

        if let Some(contents) = self.cache.load(url).await? {
            debug!(url, "page cache hit");
            return Ok(contents);
        }

        let contents = self.inner.fetch(url).await?;
        let path = self.cache.store(url, &contents).await?;
        debug!(url, path = %path.display(), "page cached");
        Ok(contents)
    }
}
