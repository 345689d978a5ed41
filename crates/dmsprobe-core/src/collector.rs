//! Windowed stream collector.
//!
//! Every pass re-reads the single partition from the trim horizon and keeps
//! only records that arrived strictly after the window threshold. Earlier
//! phases can leave records in the log; the threshold is what separates
//! them, so no cursor is carried between passes.

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::error::{ResourceKind, ServiceError};
use crate::services::PartitionedLog;
use crate::settings::CollectorSettings;
use crate::types::{CursorPosition, StreamRecord, StreamRef};

/// Acceptance criterion for one collection pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventWindow {
    /// Sampled before the triggering mutation.
    pub threshold_time: DateTime<Utc>,
    pub expected_count: usize,
}

impl EventWindow {
    pub fn new(threshold_time: DateTime<Utc>, expected_count: usize) -> Self {
        Self {
            threshold_time,
            expected_count,
        }
    }

    /// Strictly after the threshold; equality is excluded.
    pub fn admits(&self, record: &StreamRecord) -> bool {
        record.arrival_time > self.threshold_time
    }
}

pub struct StreamCollector<'a> {
    log: &'a dyn PartitionedLog,
    settings: CollectorSettings,
}

impl<'a> StreamCollector<'a> {
    pub fn new(log: &'a dyn PartitionedLog, settings: CollectorSettings) -> Self {
        Self { log, settings }
    }

    /// Drain `stream` until `window.expected_count` records are admitted or
    /// the partition reports no further cursor.
    ///
    /// A short result is not an error here. Callers compare the length
    /// against the expectation and keep the records for diagnostics.
    ///
    /// Without `max_polls` this loops for as long as a live stream keeps
    /// returning cursors.
    pub async fn collect(
        &self,
        stream: &StreamRef,
        window: EventWindow,
    ) -> Result<Vec<StreamRecord>, ServiceError> {
        let partitions = self.log.describe_partitions(stream).await?;
        let Some(partition) = partitions.first() else {
            return Err(ServiceError::not_found(
                ResourceKind::Partition,
                stream.as_str(),
            ));
        };
        if partitions.len() > 1 {
            warn!(
                stream = %stream,
                partitions = partitions.len(),
                partition = %partition,
                "stream has several partitions; reading only the first"
            );
        }

        let mut cursor = Some(
            self.log
                .open_cursor(stream, partition, CursorPosition::TrimHorizon)
                .await?,
        );
        let mut collected = Vec::new();
        let mut polls: u32 = 0;

        while let Some(current) = cursor.take() {
            let page = self.log.fetch(&current, self.settings.page_limit).await?;
            polls += 1;
            let fetched = page.records.len();
            collected.extend(page.records.into_iter().filter(|r| window.admits(r)));
            cursor = page.next_cursor;

            debug!(
                stream = %stream,
                poll = polls,
                fetched,
                found = collected.len(),
                expected = window.expected_count,
                "fetched stream page"
            );

            if collected.len() >= window.expected_count {
                break;
            }
            if cursor.is_none() {
                debug!(stream = %stream, "partition exhausted");
                break;
            }
            if polls == self.settings.stall_warning_polls {
                warn!(
                    stream = %stream,
                    polls,
                    found = collected.len(),
                    expected = window.expected_count,
                    "still waiting for stream records"
                );
            }
            if self.settings.max_polls.is_some_and(|max| polls >= max) {
                warn!(
                    stream = %stream,
                    polls,
                    found = collected.len(),
                    expected = window.expected_count,
                    "poll limit reached"
                );
                break;
            }

            tokio::time::sleep(self.settings.poll_interval).await;
        }

        info!(
            stream = %stream,
            found = collected.len(),
            expected = window.expected_count,
            "collected stream records"
        );
        Ok(collected)
    }
}
