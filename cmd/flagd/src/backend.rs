//! Store selection from settings.

use std::sync::Arc;

use anyhow::Result;
use configs::{Settings, StoreBackend};
use domains::{FlagTable, RateLimitTable};
use storage_adapters::memory::{MemoryFlagTable, MemoryRateLimitTable};
use tracing::warn;

pub struct Tables {
    pub flags: Arc<dyn FlagTable>,
    pub rate_limits: Arc<dyn RateLimitTable>,
}

pub async fn connect(settings: &Settings) -> Result<Tables> {
    let store = &settings.store;
    let mut tables = match store.backend {
        StoreBackend::Memory => {
            warn!("using the in-memory store; flags are lost on restart");
            Tables {
                flags: Arc::new(MemoryFlagTable::new()),
                rate_limits: Arc::new(MemoryRateLimitTable::new()),
            }
        }
        #[cfg(feature = "dynamodb")]
        StoreBackend::Dynamodb => {
            use storage_adapters::dynamodb::{client_for_region, DynamoFlagTable, DynamoRateLimitTable};

            let client = client_for_region(&store.region).await;
            tracing::info!(
                region = %store.region,
                flags_table = %store.flags_table(),
                rate_limit_table = %store.rate_limit_table(),
                "using DynamoDB store"
            );
            Tables {
                flags: Arc::new(DynamoFlagTable::new(client.clone(), store.flags_table())),
                rate_limits: Arc::new(DynamoRateLimitTable::new(client, store.rate_limit_table())),
            }
        }
        #[cfg(not(feature = "dynamodb"))]
        StoreBackend::Dynamodb => {
            anyhow::bail!("store.backend = \"dynamodb\" needs a build with the `dynamodb` feature")
        }
    };

    if let Some(url) = &store.redis_url {
        tables.rate_limits = redis_counters(url)?;
    }
    Ok(tables)
}

#[cfg(feature = "redis")]
fn redis_counters(url: &secrecy::SecretString) -> Result<Arc<dyn RateLimitTable>> {
    use secrecy::ExposeSecret;
    use storage_adapters::redis::RedisRateLimitTable;

    tracing::info!("rate-limit counters in Redis");
    Ok(Arc::new(RedisRateLimitTable::connect(url.expose_secret())?))
}

#[cfg(not(feature = "redis"))]
fn redis_counters(_url: &secrecy::SecretString) -> Result<Arc<dyn RateLimitTable>> {
    anyhow::bail!("store.redis_url is set but this build lacks the `redis` feature")
}
