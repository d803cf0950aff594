//! Corpus loading and the book selector it populates.

use crate::corpus::{Corpus, book_label};
use crate::osis::{self, OsisError};
use crate::render::{RenderedBook, render_book};
use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

/// Path of the endpoint serving the full corpus as JSON.
pub const CONTENT_PATH: &str = "/load_content";

#[derive(Debug)]
pub enum LoadError {
    Io(std::io::Error),
    #[cfg(feature = "client")]
    Http(reqwest::Error),
    Status(u16),
    Decode(serde_json::Error),
    Osis(OsisError),
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::Io(err) => write!(f, "io error: {err}"),
            #[cfg(feature = "client")]
            LoadError::Http(err) => write!(f, "http error: {err}"),
            LoadError::Status(status) => write!(f, "unexpected http status {status}"),
            LoadError::Decode(err) => write!(f, "corpus is not valid JSON: {err}"),
            LoadError::Osis(err) => write!(f, "osis error: {err}"),
        }
    }
}

impl std::error::Error for LoadError {}

impl From<std::io::Error> for LoadError {
    fn from(value: std::io::Error) -> Self {
        LoadError::Io(value)
    }
}

#[cfg(feature = "client")]
impl From<reqwest::Error> for LoadError {
    fn from(value: reqwest::Error) -> Self {
        LoadError::Http(value)
    }
}

impl From<serde_json::Error> for LoadError {
    fn from(value: serde_json::Error) -> Self {
        LoadError::Decode(value)
    }
}

impl From<OsisError> for LoadError {
    fn from(value: OsisError) -> Self {
        LoadError::Osis(value)
    }
}

/// Where a corpus comes from.
pub trait CorpusSource {
    fn describe(&self) -> String;

    fn fetch(&self) -> impl Future<Output = Result<Corpus, LoadError>> + Send;
}

/// Fetches the corpus with a single GET to `<base_url>/load_content`.
#[cfg(feature = "client")]
#[derive(Debug, Clone)]
pub struct HttpSource {
    url: String,
    client: reqwest::Client,
}

#[cfg(feature = "client")]
impl HttpSource {
    pub fn new(base_url: &str) -> Self {
        Self {
            url: format!("{}{}", base_url.trim_end_matches('/'), CONTENT_PATH),
            client: reqwest::Client::new(),
        }
    }
}

#[cfg(feature = "client")]
impl CorpusSource for HttpSource {
    fn describe(&self) -> String {
        self.url.clone()
    }

    async fn fetch(&self) -> Result<Corpus, LoadError> {
        let response = self.client.get(&self.url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(LoadError::Status(status.as_u16()));
        }
        let bytes = response.bytes().await?;
        Ok(Corpus::from_json_slice(&bytes)?)
    }
}

/// A corpus previously exported as JSON.
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CorpusSource for JsonFileSource {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    async fn fetch(&self) -> Result<Corpus, LoadError> {
        let bytes = std::fs::read(&self.path)?;
        Ok(Corpus::from_json_slice(&bytes)?)
    }
}

/// A directory holding the OSIS text and, optionally, the Strong's dictionary.
#[derive(Debug, Clone)]
pub struct OsisSource {
    dir: PathBuf,
}

impl OsisSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl CorpusSource for OsisSource {
    fn describe(&self) -> String {
        self.dir.join(osis::TEXT_FILE).display().to_string()
    }

    async fn fetch(&self) -> Result<Corpus, LoadError> {
        Ok(osis::load_dir(&self.dir)?)
    }
}

/// One entry of the book selector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookOption {
    /// Raw book key used for lookup.
    pub value: String,
    /// Key with underscores shown as periods.
    pub label: String,
}

/// Selector entries for every book, in received order.
pub fn selector_options(corpus: &Corpus) -> Vec<BookOption> {
    corpus
        .book_keys()
        .map(|key| BookOption {
            value: key.to_string(),
            label: book_label(key),
        })
        .collect()
}

pub struct Loader<S> {
    source: S,
}

impl<S: CorpusSource> Loader<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    /// Loads the corpus, propagating any failure.
    pub async fn try_load(&self) -> Result<Viewer, LoadError> {
        let corpus = self.source.fetch().await?;
        info!(
            source = %self.source.describe(),
            books = corpus.len(),
            "Loaded corpus"
        );
        Ok(Viewer::new(Arc::new(corpus)))
    }

    /// Loads the corpus; a failure is logged and leaves the selector empty.
    pub async fn load(&self) -> Viewer {
        match self.try_load().await {
            Ok(viewer) => viewer,
            Err(err) => {
                error!(source = %self.source.describe(), %err, "Error loading content");
                Viewer::default()
            }
        }
    }
}

/// A loaded corpus with its populated selector.
#[derive(Debug, Clone, Default)]
pub struct Viewer {
    corpus: Arc<Corpus>,
    options: Vec<BookOption>,
}

impl Viewer {
    pub fn new(corpus: Arc<Corpus>) -> Self {
        let options = selector_options(&corpus);
        Self { corpus, options }
    }

    pub fn corpus(&self) -> &Arc<Corpus> {
        &self.corpus
    }

    pub fn options(&self) -> &[BookOption] {
        &self.options
    }

    /// Renders the selected book; an empty or unknown key renders nothing.
    pub fn select(&self, book_key: &str) -> RenderedBook<'_> {
        render_book(&self.corpus, book_key)
    }
}
