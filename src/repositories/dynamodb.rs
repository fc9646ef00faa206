use crate::{
    domain::MemeRepository,
    errors::RepoError,
    models::{Meme, MemePatch, NewMeme, TripleKey},
};
use anyhow::Context;
use async_trait::async_trait;
use aws_sdk_dynamodb::{
    error::SdkError,
    operation::transact_write_items::TransactWriteItemsError,
    types::{AttributeValue, Delete, Put, TransactWriteItem, Update},
    Client as DynamoDbClient,
};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tracing::{self, info};
use uuid::Uuid;

/// Global secondary index on (`listing`, `created_at`) used for newest-first listing.
pub const CREATED_AT_INDEX: &str = "created_at_index";
/// Every meme item carries this constant `listing` value so one index partition holds them all.
pub const LISTING_PARTITION: &str = "MEME";

pub const MEME_ID_ATTR: &str = "meme_id";
pub const TRIPLE_KEY_ATTR: &str = "triple_key";
pub const LISTING_ATTR: &str = "listing";
pub const CREATED_AT_ATTR: &str = "created_at";

const CONDITIONAL_CHECK_FAILED: &str = "ConditionalCheckFailed";

// Positions of the items inside the insert and update transactions.
const INSERT_GUARD_ITEM: usize = 1;
const UPDATE_MEME_ITEM: usize = 0;
const UPDATE_GUARD_ITEM: usize = 2;

/// Stores memes in one table and uniqueness guards in a second one.
///
/// A guard item is keyed by the digest of a meme's (name, url, caption)
/// triple. Guards are only ever written in the same transaction as the meme
/// item they protect, with `attribute_not_exists`, which makes DynamoDB the
/// arbiter between concurrent writers.
#[derive(Debug, Clone)]
pub struct DynamoDbMemeRepository {
    client: DynamoDbClient,
    table_name: String,
    triples_table_name: String,
}

impl DynamoDbMemeRepository {
    pub fn new(client: DynamoDbClient, table_name: String, triples_table_name: String) -> Self {
        info!(%table_name, %triples_table_name, "Initializing DynamoDbMemeRepository");
        Self {
            client,
            table_name,
            triples_table_name,
        }
    }

    fn claim_triple(&self, triple: &TripleKey, id: Uuid) -> Result<Put, RepoError> {
        let put = Put::builder()
            .table_name(&self.triples_table_name)
            .item(TRIPLE_KEY_ATTR, AttributeValue::S(triple.as_str().to_string()))
            .item(MEME_ID_ATTR, AttributeValue::S(id.to_string()))
            .condition_expression("attribute_not_exists(triple_key)")
            .build()
            .context("DynamoDB: Failed to build triple guard put")?;
        Ok(put)
    }
}

#[async_trait]
impl MemeRepository for DynamoDbMemeRepository {
    /// Writes the meme and its triple guard in one transaction.
    async fn insert(&self, new_meme: NewMeme) -> Result<Meme, RepoError> {
        let meme = Meme::from_new(Uuid::new_v4(), new_meme, Utc::now());

        let put_meme = Put::builder()
            .table_name(&self.table_name)
            .set_item(Some(meme_to_item(&meme)))
            .condition_expression("attribute_not_exists(meme_id)")
            .build()
            .context("DynamoDB: Failed to build meme put")?;
        let put_guard = self.claim_triple(&meme.triple_key(), meme.id)?;

        let result = self
            .client
            .transact_write_items()
            .transact_items(TransactWriteItem::builder().put(put_meme).build())
            .transact_items(TransactWriteItem::builder().put(put_guard).build())
            .send()
            .await;

        match result {
            Ok(_) => {
                tracing::debug!(meme_id = %meme.id, table_name = %self.table_name, "DynamoDB: Meme inserted");
                Ok(meme)
            }
            Err(sdk_err) => match insert_conflict(&sdk_err) {
                Some(conflict) => {
                    tracing::debug!(table_name = %self.triples_table_name, "DynamoDB: Triple guard already present");
                    Err(conflict)
                }
                None => Err(RepoError::BackendError(anyhow::Error::new(sdk_err).context(format!(
                    "DynamoDB (table: {}): Failed to insert meme (id: {})",
                    self.table_name, meme.id
                )))),
            },
        }
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<Meme>, RepoError> {
        let id_str = id.to_string();
        let resp = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .key(MEME_ID_ATTR, AttributeValue::S(id_str.clone()))
            .consistent_read(true)
            .send()
            .await
            .context(format!("DynamoDB (table: {}): Failed to get meme (id: {})", self.table_name, id_str))
            .map_err(RepoError::BackendError)?;

        match resp.item {
            Some(item) => match item_to_meme(&item) {
                Some(meme) => Ok(Some(meme)),
                None => {
                    tracing::error!(meme_id = %id_str, table_name = %self.table_name, "DynamoDB: Retrieved item but failed to parse into Meme");
                    Err(RepoError::DataCorruption(format!(
                        "Failed to parse meme data retrieved from DynamoDB table '{}' for id {}",
                        self.table_name, id_str
                    )))
                }
            },
            None => Ok(None),
        }
    }

    /// Queries the `created_at` index backwards, following pages until `limit` items are collected.
    async fn list_recent(&self, limit: usize) -> Result<Vec<Meme>, RepoError> {
        let mut memes: Vec<Meme> = Vec::with_capacity(limit);
        if limit == 0 {
            return Ok(memes);
        }
        let mut last_evaluated_key: Option<HashMap<String, AttributeValue>> = None;

        loop {
            let remaining = i32::try_from(limit - memes.len()).unwrap_or(i32::MAX);
            let mut request_builder = self
                .client
                .query()
                .table_name(&self.table_name)
                .index_name(CREATED_AT_INDEX)
                .key_condition_expression("#listing = :listing")
                .expression_attribute_names("#listing", LISTING_ATTR)
                .expression_attribute_values(":listing", AttributeValue::S(LISTING_PARTITION.to_string()))
                .scan_index_forward(false)
                .limit(remaining);

            if let Some(lek) = last_evaluated_key {
                request_builder = request_builder.set_exclusive_start_key(Some(lek));
            }

            let resp = request_builder
                .send()
                .await
                .context(format!("DynamoDB: Failed to query index '{}' of table '{}'", CREATED_AT_INDEX, self.table_name))
                .map_err(RepoError::BackendError)?;

            if let Some(items) = resp.items {
                tracing::debug!("DynamoDB Query (table: {}): Returned {} items", self.table_name, items.len());
                for item in items {
                    match item_to_meme(&item) {
                        Some(meme) => memes.push(meme),
                        None => {
                            let item_id = item.get(MEME_ID_ATTR).and_then(|v| v.as_s().ok());
                            tracing::error!(item.id = ?item_id, table_name = %self.table_name, "DynamoDB: Failed to parse item from query into Meme");
                            return Err(RepoError::DataCorruption(format!(
                                "DynamoDB: Failed to parse item {:?} while listing table '{}'",
                                item_id, self.table_name
                            )));
                        }
                    }
                }
            }

            last_evaluated_key = resp.last_evaluated_key;
            if memes.len() >= limit || last_evaluated_key.is_none() {
                break;
            }
            tracing::debug!("DynamoDB Query (table: {}): Continuing with LastEvaluatedKey...", self.table_name);
        }

        memes.truncate(limit);
        tracing::debug!("DynamoDB (table: {}): Listed {} memes", self.table_name, memes.len());
        Ok(memes)
    }

    /// Conditional on the url/caption read just before, so a concurrent update
    /// in between cancels this one instead of being overwritten. When the triple
    /// changes, the old guard is released and the new one claimed in the same
    /// transaction.
    async fn update_by_id(&self, id: Uuid, patch: MemePatch) -> Result<Option<Meme>, RepoError> {
        let Some(current) = self.get_by_id(id).await? else {
            tracing::debug!(meme_id = %id, table_name = %self.table_name, "DynamoDB: Update target not found");
            return Ok(None);
        };
        let updated = current.patched(&patch, Utc::now());
        let old_triple = current.triple_key();
        let new_triple = updated.triple_key();

        let update = Update::builder()
            .table_name(&self.table_name)
            .key(MEME_ID_ATTR, AttributeValue::S(id.to_string()))
            .update_expression("SET #url = :url, #caption = :caption, #edited_at = :edited_at")
            .condition_expression("#url = :old_url AND #caption = :old_caption")
            .expression_attribute_names("#url", "url")
            .expression_attribute_names("#caption", "caption")
            .expression_attribute_names("#edited_at", "edited_at")
            .expression_attribute_values(":url", AttributeValue::S(updated.url.clone()))
            .expression_attribute_values(":caption", AttributeValue::S(updated.caption.clone()))
            .expression_attribute_values(":edited_at", timestamp_value(updated.edited_at))
            .expression_attribute_values(":old_url", AttributeValue::S(current.url.clone()))
            .expression_attribute_values(":old_caption", AttributeValue::S(current.caption.clone()))
            .build()
            .context("DynamoDB: Failed to build meme update")?;

        let mut items = vec![TransactWriteItem::builder().update(update).build()];
        if old_triple != new_triple {
            let release = Delete::builder()
                .table_name(&self.triples_table_name)
                .key(TRIPLE_KEY_ATTR, AttributeValue::S(old_triple.as_str().to_string()))
                .build()
                .context("DynamoDB: Failed to build triple guard delete")?;
            items.push(TransactWriteItem::builder().delete(release).build());
            items.push(TransactWriteItem::builder().put(self.claim_triple(&new_triple, id)?).build());
        }

        let result = self
            .client
            .transact_write_items()
            .set_transact_items(Some(items))
            .send()
            .await;

        match result {
            Ok(_) => {
                tracing::debug!(meme_id = %id, table_name = %self.table_name, "DynamoDB: Meme updated");
                Ok(Some(updated))
            }
            Err(sdk_err) => match update_conflict(&sdk_err, id) {
                Some(conflict) => {
                    tracing::warn!(meme_id = %id, error = %conflict, "DynamoDB: Conditional update rejected");
                    Err(conflict)
                }
                None => Err(RepoError::BackendError(anyhow::Error::new(sdk_err).context(format!(
                    "DynamoDB (table: {}): Failed to update meme (id: {})",
                    self.table_name, id
                )))),
            },
        }
    }
}

/// Maps a cancelled (meme put, guard put) transaction to a duplicate.
fn insert_conflict<R>(err: &SdkError<TransactWriteItemsError, R>) -> Option<RepoError> {
    cancelled_by_condition(err, INSERT_GUARD_ITEM).then_some(RepoError::Duplicate)
}

/// Maps a cancelled (update, guard delete, guard put) transaction to its conflict.
/// A taken target triple wins over a stale read.
fn update_conflict<R>(err: &SdkError<TransactWriteItemsError, R>, id: Uuid) -> Option<RepoError> {
    if cancelled_by_condition(err, UPDATE_GUARD_ITEM) {
        Some(RepoError::Duplicate)
    } else if cancelled_by_condition(err, UPDATE_MEME_ITEM) {
        Some(RepoError::ConcurrentUpdate(id))
    } else {
        None
    }
}

/// True if the transaction was cancelled because the condition on item `index` failed.
fn cancelled_by_condition<R>(err: &SdkError<TransactWriteItemsError, R>, index: usize) -> bool {
    match err.as_service_error() {
        Some(TransactWriteItemsError::TransactionCanceledException(cancelled)) => cancelled
            .cancellation_reasons()
            .get(index)
            .and_then(|reason| reason.code())
            == Some(CONDITIONAL_CHECK_FAILED),
        _ => false,
    }
}

fn timestamp_value(at: DateTime<Utc>) -> AttributeValue {
    AttributeValue::N(at.timestamp_micros().to_string())
}

fn timestamp_attr(item: &HashMap<String, AttributeValue>, key: &str) -> Option<DateTime<Utc>> {
    let micros: i64 = item.get(key)?.as_n().ok()?.parse().ok()?;
    DateTime::from_timestamp_micros(micros)
}

fn meme_to_item(meme: &Meme) -> HashMap<String, AttributeValue> {
    HashMap::from([
        (MEME_ID_ATTR.to_string(), AttributeValue::S(meme.id.to_string())),
        ("name".to_string(), AttributeValue::S(meme.name.clone())),
        ("url".to_string(), AttributeValue::S(meme.url.clone())),
        ("caption".to_string(), AttributeValue::S(meme.caption.clone())),
        (CREATED_AT_ATTR.to_string(), timestamp_value(meme.created_at)),
        ("edited_at".to_string(), timestamp_value(meme.edited_at)),
        (LISTING_ATTR.to_string(), AttributeValue::S(LISTING_PARTITION.to_string())),
    ])
}

fn item_to_meme(item: &HashMap<String, AttributeValue>) -> Option<Meme> {
    let id = item
        .get(MEME_ID_ATTR)?
        .as_s()
        .ok()
        .and_then(|s| Uuid::parse_str(s).ok())?;
    let name = item.get("name")?.as_s().ok()?.to_string();
    let url = item.get("url")?.as_s().ok()?.to_string();
    let caption = item.get("caption")?.as_s().ok()?.to_string();
    let created_at = timestamp_attr(item, CREATED_AT_ATTR)?;
    let edited_at = timestamp_attr(item, "edited_at")?;

    Some(Meme {
        id,
        name,
        url,
        caption,
        created_at,
        edited_at,
    })
}
