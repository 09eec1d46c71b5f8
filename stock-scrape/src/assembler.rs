//! Turns a finished job document into the per-ticker result data.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

use crate::types::{Document, ResolvedStock, ScrapeRequestOptions, StockData, TickerSymbol};
use stock_common::{Error, Result, ResultExt};

/// Attempts before giving up on finding a free file name.
const MAX_NAME_ATTEMPTS: usize = 16;

/// Append-only store for scraped markdown.
#[async_trait]
pub trait MarkdownStore: Send + Sync {
    /// Write `contents` under a name derived from `stem`, never overwriting.
    /// Returns the generated file name, without the store location.
    async fn save(&self, stem: &str, contents: &str) -> Result<String>;
}

/// Markdown store backed by a local directory.
pub struct FsMarkdownStore {
    root: PathBuf,
}

impl FsMarkdownStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl MarkdownStore for FsMarkdownStore {
    async fn save(&self, stem: &str, contents: &str) -> Result<String> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .context(format!("creating output directory {}", self.root.display()))?;

        for attempt in 0..MAX_NAME_ATTEMPTS {
            let name = if attempt == 0 {
                format!("{}.md", stem)
            } else {
                format!("{}_{}.md", stem, attempt)
            };
            let path = self.root.join(&name);

            let file = tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await;

            match file {
                Ok(mut file) => {
                    file.write_all(contents.as_bytes()).await?;
                    file.flush().await?;
                    return Ok(name);
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e.into()),
            }
        }

        Err(Error::Internal(format!(
            "no free file name for {} in {}",
            stem,
            self.root.display()
        )))
    }
}

pub struct ResultAssembler {
    store: Arc<dyn MarkdownStore>,
}

impl ResultAssembler {
    pub fn new(store: Arc<dyn MarkdownStore>) -> Self {
        Self { store }
    }

    /// Build the result data for one ticker.
    ///
    /// Persistence failures are logged and leave `markdown_file` empty.
    pub async fn assemble(
        &self,
        ticker: &TickerSymbol,
        resolved: &ResolvedStock,
        document: Document,
        options: &ScrapeRequestOptions,
    ) -> StockData {
        let markdown = if options.want_markdown {
            document.markdown
        } else {
            None
        };

        let mut markdown_file = None;
        if options.persist_markdown {
            if let Some(ref body) = markdown {
                let stem = format!("{}_{}", ticker.as_str(), chrono::Utc::now().timestamp_millis());
                match self.store.save(&stem, body).await {
                    Ok(file_name) => {
                        info!(ticker = %ticker, file = %file_name, "Saved markdown");
                        markdown_file = Some(file_name);
                    }
                    Err(e) => warn!(ticker = %ticker, error = %e, "Failed to save markdown"),
                }
            }
        }

        let extract = if options.want_extract {
            document.extract
        } else {
            None
        };

        StockData {
            url: resolved.url.clone(),
            exchange: resolved.exchange.clone(),
            symbol: resolved.symbol.clone(),
            markdown,
            markdown_file,
            extract,
        }
    }
}
