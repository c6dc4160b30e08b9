//! Raw event sources.
//!
//! The live transport is an external collaborator; these sources replay
//! captured payloads so the engine can be driven without it. Each item is one
//! raw message, exactly as delivered.

use std::path::PathBuf;

use anyhow::{Context, Result};
use async_stream::stream;
use async_trait::async_trait;
use futures_util::stream::BoxStream;
use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{debug, instrument};

pub type RawEventStream = BoxStream<'static, Result<String>>;

#[async_trait]
pub trait RawEventSource: Send + Sync {
    async fn open(&self) -> Result<RawEventStream>;
}

/// Newline-delimited capture: one JSON payload per line.
#[derive(Debug, Clone)]
pub struct JsonlFileSource {
    path: PathBuf,
}

impl JsonlFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl RawEventSource for JsonlFileSource {
    #[instrument(skip(self), fields(path = ?self.path))]
    async fn open(&self) -> Result<RawEventStream> {
        let file = File::open(&self.path)
            .await
            .with_context(|| format!("failed opening event log {:?}", self.path))?;
        debug!("event log opened");
        Ok(line_stream(BufReader::new(file)))
    }
}

/// Newline-delimited payloads on standard input.
#[derive(Debug, Clone, Default)]
pub struct StdinSource;

#[async_trait]
impl RawEventSource for StdinSource {
    async fn open(&self) -> Result<RawEventStream> {
        Ok(line_stream(BufReader::new(tokio::io::stdin())))
    }
}

fn line_stream<R>(reader: R) -> RawEventStream
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    let mut lines = reader.lines();
    Box::pin(stream! {
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    yield Ok(line);
                }
                Ok(None) => break,
                Err(error) => {
                    yield Err(anyhow::Error::new(error).context("failed reading event line"));
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use std::time::{SystemTime, UNIX_EPOCH};

    use anyhow::Result;
    use futures_util::StreamExt;
    use tokio::fs;

    use super::*;

    fn unique_test_path(name: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        std::env::temp_dir().join(format!("{name}-{nanos}.jsonl"))
    }

    #[tokio::test]
    async fn jsonl_source_yields_non_blank_lines_verbatim() -> Result<()> {
        let path = unique_test_path("swarm-events-source");
        fs::write(
            &path,
            "{\"type\":\"swarm_started\",\"run_id\":\"r\"}\n\n   \n{ \"type\":\"x\" }\n",
        )
        .await?;

        let source = JsonlFileSource::new(&path);
        let lines: Vec<String> = source
            .open()
            .await?
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .collect::<Result<_>>()?;
        assert_eq!(
            lines,
            vec![
                "{\"type\":\"swarm_started\",\"run_id\":\"r\"}".to_owned(),
                "{ \"type\":\"x\" }".to_owned(),
            ]
        );

        let _ = fs::remove_file(path).await;
        Ok(())
    }

    #[tokio::test]
    async fn missing_file_is_reported_with_context() {
        let source = JsonlFileSource::new(unique_test_path("swarm-events-missing"));
        let err = source.open().await.err().map(|e| e.to_string());
        assert!(err.is_some_and(|message| message.contains("failed opening event log")));
    }
}
