//! Fallback error sink.

use async_trait::async_trait;
use tracing::warn;

use crate::traits::ErrorSink;

/// Reports failures as warning logs; used when no aggregator is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

#[async_trait]
impl ErrorSink for LogSink {
    async fn capture_message(&self, message: &str) -> anyhow::Result<()> {
        warn!(event = "validation.failure", "{message}");
        Ok(())
    }
}
