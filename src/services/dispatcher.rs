use std::sync::Arc;

use async_trait::async_trait;
use tokio::task::JoinHandle;

use crate::domain::sheet_row::SheetRow;

#[async_trait]
pub trait RowSink: Send + Sync {
    async fn append_row(&self, destination_id: &str, row: &SheetRow) -> anyhow::Result<()>;
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchSummary {
    pub sent: usize,
    pub failed: usize,
}

/// Appends each row on its own task so the browser can move on to the next page.
/// Rows are never retried.
pub struct SinkDispatcher {
    sink: Arc<dyn RowSink>,
    destination_id: Arc<str>,
    in_flight: Vec<JoinHandle<bool>>,
}

impl SinkDispatcher {
    pub fn new(sink: Arc<dyn RowSink>, destination_id: &str) -> Self {
        SinkDispatcher {
            sink,
            destination_id: Arc::from(destination_id),
            in_flight: vec![],
        }
    }

    pub fn destination_id(&self) -> &str {
        &self.destination_id
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    pub fn dispatch(&mut self, row: SheetRow) {
        let sink = self.sink.clone();
        let destination_id = self.destination_id.clone();

        self.in_flight.push(tokio::spawn(async move {
            match sink.append_row(&destination_id, &row).await {
                Ok(()) => true,
                Err(e) => {
                    log::error!("Failed to append row for {}: {:?}", row.url(), e);
                    false
                }
            }
        }));
    }

    /// Waits for every row dispatched since the last join.
    pub async fn join(&mut self) -> DispatchSummary {
        let mut summary = DispatchSummary::default();

        for handle in self.in_flight.drain(..) {
            match handle.await {
                Ok(true) => summary.sent += 1,
                Ok(false) => summary.failed += 1,
                Err(e) => {
                    log::error!("Append task died: {:?}", e);
                    summary.failed += 1;
                }
            }
        }

        summary
    }
}
