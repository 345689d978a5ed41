use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_kinesis::Client;
use aws_sdk_kinesis::primitives::DateTime as AwsDateTime;
use aws_sdk_kinesis::types::{Record, ShardIteratorType};
use chrono::{DateTime, Utc};
use serde_json::Value;

use dmsprobe_core::error::{ResourceKind, ServiceError};
use dmsprobe_core::services::PartitionedLog;
use dmsprobe_core::types::{
    CursorPosition, FetchPage, PartitionId, StreamCursor, StreamRecord, StreamRef,
};

use crate::error::classify;

/// Kinesis data stream addressed by ARN.
#[derive(Debug, Clone)]
pub struct KinesisLog {
    client: Client,
}

impl KinesisLog {
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            client: Client::new(config),
        }
    }
}

/// JSON payloads decode as JSON; anything else is kept as text.
pub fn decode_payload(data: &[u8]) -> Value {
    serde_json::from_slice(data)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(data).into_owned()))
}

pub fn to_chrono(time: &AwsDateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(time.secs(), time.subsec_nanos())
}

fn convert_record(record: &Record) -> Result<StreamRecord, ServiceError> {
    let arrival_time = record
        .approximate_arrival_timestamp()
        .and_then(to_chrono)
        .ok_or_else(|| {
            ServiceError::invalid(
                "get records",
                format!("record {} has no arrival timestamp", record.sequence_number()),
            )
        })?;

    Ok(StreamRecord {
        payload: decode_payload(record.data().as_ref()),
        partition_key: record.partition_key().unwrap_or_default().to_owned(),
        arrival_time,
        sequence: record.sequence_number().to_owned(),
    })
}

#[async_trait]
impl PartitionedLog for KinesisLog {
    async fn describe_partitions(&self, stream: &StreamRef) -> Result<Vec<PartitionId>, ServiceError> {
        let out = self
            .client
            .list_shards()
            .stream_arn(stream.as_str())
            .send()
            .await
            .map_err(|e| classify("list shards", (ResourceKind::Stream, stream.as_str()), e))?;

        Ok(out
            .shards()
            .iter()
            .map(|s| PartitionId::new(s.shard_id()))
            .collect())
    }

    async fn open_cursor(
        &self,
        stream: &StreamRef,
        partition: &PartitionId,
        position: CursorPosition,
    ) -> Result<StreamCursor, ServiceError> {
        const OPERATION: &str = "get shard iterator";
        let iterator_type = match position {
            CursorPosition::TrimHorizon => ShardIteratorType::TrimHorizon,
            _ => return Err(ServiceError::invalid(OPERATION, "unsupported cursor position")),
        };

        let out = self
            .client
            .get_shard_iterator()
            .stream_arn(stream.as_str())
            .shard_id(partition.as_str())
            .shard_iterator_type(iterator_type)
            .send()
            .await
            .map_err(|e| classify(OPERATION, (ResourceKind::Partition, partition.as_str()), e))?;

        out.shard_iterator()
            .map(StreamCursor::from)
            .ok_or_else(|| ServiceError::invalid(OPERATION, "no shard iterator returned"))
    }

    async fn fetch(&self, cursor: &StreamCursor, limit: u32) -> Result<FetchPage, ServiceError> {
        let out = self
            .client
            .get_records()
            .shard_iterator(cursor.as_str())
            .limit(i32::try_from(limit).unwrap_or(i32::MAX))
            .send()
            .await
            .map_err(|e| classify("get records", (ResourceKind::Partition, cursor.as_str()), e))?;

        let records = out
            .records()
            .iter()
            .map(convert_record)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(FetchPage {
            records,
            next_cursor: out.next_shard_iterator().map(StreamCursor::from),
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn json_payload_is_decoded() {
        let data = br#"{"metadata":{"operation":"insert"},"data":{"id":1}}"#;
        assert_eq!(decode_payload(data)["metadata"]["operation"], "insert");
    }

    #[test]
    fn non_json_payload_is_kept_as_text() {
        assert_eq!(decode_payload(b"not json"), json!("not json"));
    }

    #[test]
    fn arrival_time_keeps_subsecond_precision() {
        let time = AwsDateTime::from_secs_and_nanos(1_700_000_000, 250_000_000);
        let converted = to_chrono(&time).unwrap();
        assert_eq!(converted.timestamp(), 1_700_000_000);
        assert_eq!(converted.timestamp_subsec_millis(), 250);
    }
}
