//! # DynamoDB tables
//!
//! Flag table keyed by `tile_hash`, rate-limit table keyed by `ip_minute`.
//! Both rely on the table's TTL attribute (`ttl`, unix seconds) for expiry.

use std::collections::HashMap;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_dynamodb::error::{DisplayErrorContext, SdkError};
use aws_sdk_dynamodb::types::{AttributeValue, KeysAndAttributes, ReturnValue};
use aws_sdk_dynamodb::Client;
use domains::{
    BatchGetPage, DomainError, DomainResult, FlagRecord, FlagStatus, FlagTable, PutOutcome,
    RateLimitTable, RateWindow, ScanKey, ScanPage, ScanRequest, TileHash,
};
use tracing::{instrument, warn};

type Item = HashMap<String, AttributeValue>;

const TILE_HASH: &str = "tile_hash";
const TILE_PATH: &str = "tile_path";
const FLAG_STATUS: &str = "flag_status";
const FLAGGED_AT: &str = "flagged_at";
const FLAGGED_BY_IP: &str = "flagged_by_ip";
const TTL: &str = "ttl";
const IP_MINUTE: &str = "ip_minute";
const FLAG_COUNT: &str = "flag_count";

/// Builds a client from the ambient credential chain for `region`.
pub async fn client_for_region(region: &str) -> Client {
    let config = aws_config::defaults(BehaviorVersion::latest())
        .region(aws_config::Region::new(region.to_string()))
        .load()
        .await;
    Client::new(&config)
}

fn map_sdk_error<E>(err: SdkError<E>) -> DomainError
where
    E: std::error::Error + Send + Sync + 'static,
{
    DomainError::store(DisplayErrorContext(&err))
}

fn string_attr<'a>(item: &'a Item, name: &str) -> Option<&'a str> {
    item.get(name).and_then(|v| v.as_s().ok()).map(String::as_str)
}

fn number_attr(item: &Item, name: &str) -> Option<i64> {
    let raw = item.get(name).and_then(|v| v.as_n().ok())?;
    raw.parse::<i64>()
        .ok()
        .or_else(|| raw.parse::<f64>().ok().map(|n| n as i64))
}

fn hash_key(tile_hash: &str) -> Item {
    HashMap::from([(TILE_HASH.to_string(), AttributeValue::S(tile_hash.to_string()))])
}

fn encode_flag(record: &FlagRecord) -> Item {
    let mut item = hash_key(record.tile_hash.as_str());
    item.insert(TILE_PATH.into(), AttributeValue::S(record.tile_path.clone()));
    item.insert(
        FLAG_STATUS.into(),
        AttributeValue::S(record.flag_status.as_str().to_string()),
    );
    item.insert(
        FLAGGED_BY_IP.into(),
        AttributeValue::S(record.flagged_by_ip.clone()),
    );
    if let Some(flagged_at) = &record.flagged_at {
        item.insert(FLAGGED_AT.into(), AttributeValue::S(flagged_at.clone()));
    }
    if let Some(ttl) = record.ttl {
        item.insert(TTL.into(), AttributeValue::N(ttl.to_string()));
    }
    item
}

/// Items without a usable key or with an unknown status are skipped.
fn decode_flag(item: &Item) -> Option<FlagRecord> {
    let raw_hash = string_attr(item, TILE_HASH)?;
    let tile_hash = match TileHash::parse(raw_hash) {
        Ok(hash) => hash,
        Err(err) => {
            warn!(tile_hash = raw_hash, error = %err, "skipping flag item with invalid key");
            return None;
        }
    };
    let flag_status = match string_attr(item, FLAG_STATUS) {
        None => FlagStatus::default(),
        Some(raw) => match raw.parse() {
            Ok(status) => status,
            Err(_) => {
                warn!(%tile_hash, flag_status = raw, "skipping flag item with unknown status");
                return None;
            }
        },
    };
    Some(FlagRecord {
        tile_hash,
        tile_path: string_attr(item, TILE_PATH).unwrap_or_default().to_string(),
        flag_status,
        flagged_at: string_attr(item, FLAGGED_AT).map(str::to_string),
        flagged_by_ip: string_attr(item, FLAGGED_BY_IP)
            .unwrap_or_default()
            .to_string(),
        ttl: number_attr(item, TTL),
    })
}

#[derive(Debug, Clone)]
pub struct DynamoFlagTable {
    client: Client,
    table: String,
}

impl DynamoFlagTable {
    pub fn new(client: Client, table: impl Into<String>) -> Self {
        Self {
            client,
            table: table.into(),
        }
    }
}

#[async_trait]
impl FlagTable for DynamoFlagTable {
    #[instrument(skip(self), fields(table = %self.table))]
    async fn get(&self, tile_hash: &TileHash) -> DomainResult<Option<FlagRecord>> {
        let output = self
            .client
            .get_item()
            .table_name(&self.table)
            .set_key(Some(hash_key(tile_hash.as_str())))
            .send()
            .await
            .map_err(map_sdk_error)?;
        Ok(output.item().and_then(decode_flag))
    }

    #[instrument(skip(self, record), fields(table = %self.table, tile_hash = %record.tile_hash))]
    async fn put_if_absent(&self, record: &FlagRecord) -> DomainResult<PutOutcome> {
        let result = self
            .client
            .put_item()
            .table_name(&self.table)
            .set_item(Some(encode_flag(record)))
            .condition_expression("attribute_not_exists(#key)")
            .expression_attribute_names("#key", TILE_HASH)
            .send()
            .await;

        match result {
            Ok(_) => Ok(PutOutcome::Inserted),
            Err(err)
                if err
                    .as_service_error()
                    .is_some_and(|e| e.is_conditional_check_failed_exception()) =>
            {
                Ok(PutOutcome::AlreadyExists)
            }
            Err(err) => Err(map_sdk_error(err)),
        }
    }

    #[instrument(skip(self, tile_hashes), fields(table = %self.table, keys = tile_hashes.len()))]
    async fn batch_get(&self, tile_hashes: &[TileHash]) -> DomainResult<BatchGetPage> {
        if tile_hashes.is_empty() {
            return Ok(BatchGetPage::default());
        }
        let keys = tile_hashes
            .iter()
            .map(|hash| hash_key(hash.as_str()))
            .collect();
        let request = KeysAndAttributes::builder()
            .set_keys(Some(keys))
            .build()
            .map_err(DomainError::store)?;

        let output = self
            .client
            .batch_get_item()
            .request_items(&self.table, request)
            .send()
            .await
            .map_err(map_sdk_error)?;

        let records = output
            .responses()
            .and_then(|responses| responses.get(&self.table))
            .map(|items| items.iter().filter_map(decode_flag).collect())
            .unwrap_or_default();
        let unprocessed = output
            .unprocessed_keys()
            .and_then(|pending| pending.get(&self.table))
            .map(|pending| {
                pending
                    .keys()
                    .iter()
                    .filter_map(|key| string_attr(key, TILE_HASH))
                    .filter_map(|raw| TileHash::parse(raw).ok())
                    .collect()
            })
            .unwrap_or_default();

        Ok(BatchGetPage {
            records,
            unprocessed,
        })
    }

    #[instrument(skip(self), fields(table = %self.table))]
    async fn delete(&self, tile_hash: &TileHash) -> DomainResult<()> {
        self.client
            .delete_item()
            .table_name(&self.table)
            .set_key(Some(hash_key(tile_hash.as_str())))
            .send()
            .await
            .map_err(map_sdk_error)?;
        Ok(())
    }

    #[instrument(skip(self), fields(table = %self.table))]
    async fn scan(&self, request: ScanRequest) -> DomainResult<ScanPage> {
        let output = self
            .client
            .scan()
            .table_name(&self.table)
            .limit(i32::try_from(request.limit).unwrap_or(i32::MAX))
            .filter_expression("#status = :status")
            .expression_attribute_names("#status", FLAG_STATUS)
            .expression_attribute_values(
                ":status",
                AttributeValue::S(request.status.as_str().to_string()),
            )
            .set_exclusive_start_key(
                request
                    .exclusive_start
                    .map(|start| hash_key(&start.tile_hash)),
            )
            .send()
            .await
            .map_err(map_sdk_error)?;

        Ok(ScanPage {
            records: output.items().iter().filter_map(decode_flag).collect(),
            last_evaluated_key: output
                .last_evaluated_key()
                .and_then(|key| string_attr(key, TILE_HASH))
                .map(|tile_hash| ScanKey {
                    tile_hash: tile_hash.to_string(),
                }),
            scanned_count: usize::try_from(output.scanned_count()).unwrap_or_default(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct DynamoRateLimitTable {
    client: Client,
    table: String,
}

impl DynamoRateLimitTable {
    pub fn new(client: Client, table: impl Into<String>) -> Self {
        Self {
            client,
            table: table.into(),
        }
    }

    fn key(window: &RateWindow) -> Item {
        HashMap::from([(
            IP_MINUTE.to_string(),
            AttributeValue::S(window.storage_key()),
        )])
    }
}

#[async_trait]
impl RateLimitTable for DynamoRateLimitTable {
    #[instrument(skip(self), fields(table = %self.table))]
    async fn current_count(&self, window: &RateWindow) -> DomainResult<u32> {
        let output = self
            .client
            .get_item()
            .table_name(&self.table)
            .set_key(Some(Self::key(window)))
            .send()
            .await
            .map_err(map_sdk_error)?;
        Ok(output
            .item()
            .and_then(|item| number_attr(item, FLAG_COUNT))
            .and_then(|count| u32::try_from(count).ok())
            .unwrap_or(0))
    }

    #[instrument(skip(self), fields(table = %self.table))]
    async fn increment(&self, window: &RateWindow, expires_at: i64) -> DomainResult<u32> {
        let output = self
            .client
            .update_item()
            .table_name(&self.table)
            .set_key(Some(Self::key(window)))
            .update_expression("ADD #count :inc SET #ttl = if_not_exists(#ttl, :ttl)")
            .expression_attribute_names("#count", FLAG_COUNT)
            .expression_attribute_names("#ttl", TTL)
            .expression_attribute_values(":inc", AttributeValue::N("1".into()))
            .expression_attribute_values(":ttl", AttributeValue::N(expires_at.to_string()))
            .return_values(ReturnValue::UpdatedNew)
            .send()
            .await
            .map_err(map_sdk_error)?;
        output
            .attributes()
            .and_then(|item| number_attr(item, FLAG_COUNT))
            .and_then(|count| u32::try_from(count).ok())
            .ok_or_else(|| DomainError::store("rate-limit update returned no count"))
    }
}
