use crate::errors::AppError;
use crate::repositories::{CREATED_AT_ATTR, CREATED_AT_INDEX, LISTING_ATTR, MEME_ID_ATTR, TRIPLE_KEY_ATTR};
use aws_sdk_dynamodb::{
    error::SdkError,
    operation::create_table::{CreateTableError, CreateTableOutput},
    types::{
        AttributeDefinition, BillingMode, GlobalSecondaryIndex, IndexStatus, KeySchemaElement, KeyType,
        Projection, ProjectionType, ScalarAttributeType, TableStatus,
    },
    Client as DynamoDbClient,
};
use backoff::ExponentialBackoffBuilder;
use std::time::Duration;
use tracing;

fn attribute(name: &str, kind: ScalarAttributeType) -> Result<AttributeDefinition, AppError> {
    AttributeDefinition::builder()
        .attribute_name(name)
        .attribute_type(kind)
        .build()
        .map_err(|e| AppError::InitError(format!("Failed to build attribute definition '{}': {}", name, e)))
}

fn key(name: &str, key_type: KeyType) -> Result<KeySchemaElement, AppError> {
    KeySchemaElement::builder()
        .attribute_name(name)
        .key_type(key_type)
        .build()
        .map_err(|e| AppError::InitError(format!("Failed to build key schema '{}': {}", name, e)))
}

/// Memes table: hash key `meme_id`, plus the `created_at_index` GSI
/// (`listing` hash, `created_at` range) that serves newest-first listing.
async fn create_memes_table_if_not_exists(client: &DynamoDbClient, table_name: &str) -> Result<(), AppError> {
    let created_at_index = GlobalSecondaryIndex::builder()
        .index_name(CREATED_AT_INDEX)
        .key_schema(key(LISTING_ATTR, KeyType::Hash)?)
        .key_schema(key(CREATED_AT_ATTR, KeyType::Range)?)
        .projection(Projection::builder().projection_type(ProjectionType::All).build())
        .build()
        .map_err(|e| AppError::InitError(format!("Failed to build index '{}': {}", CREATED_AT_INDEX, e)))?;

    let result = client
        .create_table()
        .table_name(table_name)
        .attribute_definitions(attribute(MEME_ID_ATTR, ScalarAttributeType::S)?)
        .attribute_definitions(attribute(LISTING_ATTR, ScalarAttributeType::S)?)
        .attribute_definitions(attribute(CREATED_AT_ATTR, ScalarAttributeType::N)?)
        .key_schema(key(MEME_ID_ATTR, KeyType::Hash)?)
        .global_secondary_indexes(created_at_index)
        .billing_mode(BillingMode::PayPerRequest)
        .send()
        .await;
    handle_create_result(table_name, result)
}

/// Triples table: one guard item per (name, url, caption) digest.
async fn create_triples_table_if_not_exists(client: &DynamoDbClient, table_name: &str) -> Result<(), AppError> {
    let result = client
        .create_table()
        .table_name(table_name)
        .attribute_definitions(attribute(TRIPLE_KEY_ATTR, ScalarAttributeType::S)?)
        .key_schema(key(TRIPLE_KEY_ATTR, KeyType::Hash)?)
        .billing_mode(BillingMode::PayPerRequest)
        .send()
        .await;
    handle_create_result(table_name, result)
}

fn handle_create_result(
    table_name: &str,
    result: Result<CreateTableOutput, SdkError<CreateTableError>>,
) -> Result<(), AppError> {
    match result {
        Ok(_) => {
            tracing::info!("Startup: Table '{}' created successfully or setup initiated.", table_name);
            Ok(())
        }
        Err(e) => {
            if let SdkError::ServiceError(service_err) = &e {
                if service_err.err().is_resource_in_use_exception() {
                    tracing::info!("Startup: Table '{}' already exists, no action needed.", table_name);
                    Ok(())
                } else {
                    let context = format!("Startup: Service error creating DynamoDB table '{}'", table_name);
                    tracing::error!("{}: {:?}", context, service_err);
                    Err(AppError::InitError(format!("{}: {}", context, e)))
                }
            } else {
                let context = format!("Startup: SDK error creating DynamoDB table '{}'", table_name);
                tracing::error!("{}: {}", context, e);
                Err(AppError::InitError(format!("{}: {}", context, e)))
            }
        }
    }
}

/// Polls `DescribeTable` until the table and all of its indexes are ACTIVE.
async fn wait_until_active(client: &DynamoDbClient, table_name: &str) -> Result<(), AppError> {
    let policy = ExponentialBackoffBuilder::new()
        .with_initial_interval(Duration::from_millis(200))
        .with_max_interval(Duration::from_secs(5))
        .with_max_elapsed_time(Some(Duration::from_secs(60)))
        .build();

    backoff::future::retry(policy, || async move {
        let resp = client
            .describe_table()
            .table_name(table_name)
            .send()
            .await
            .map_err(|e| {
                backoff::Error::permanent(AppError::InitError(format!(
                    "Startup: Failed to describe table '{}': {}",
                    table_name, e
                )))
            })?;

        let table = resp.table();
        let table_active = table.and_then(|t| t.table_status()) == Some(&TableStatus::Active);
        let indexes_active = table
            .map(|t| t.global_secondary_indexes().iter().all(|i| i.index_status() == Some(&IndexStatus::Active)))
            .unwrap_or(false);

        if table_active && indexes_active {
            Ok::<(), backoff::Error<AppError>>(())
        } else {
            tracing::debug!(%table_name, "Startup: Waiting for table to become ACTIVE");
            Err(backoff::Error::transient(AppError::InitError(format!(
                "Startup: Table '{}' did not become ACTIVE in time",
                table_name
            ))))
        }
    })
    .await
}

/// Ensures both meme tables exist and are ready for traffic.
pub async fn init_tables(client: &DynamoDbClient, memes_table: &str, triples_table: &str) -> Result<(), AppError> {
    tracing::info!("Startup: Initializing DynamoDB tables...");
    create_memes_table_if_not_exists(client, memes_table).await?;
    create_triples_table_if_not_exists(client, triples_table).await?;
    wait_until_active(client, memes_table).await?;
    wait_until_active(client, triples_table).await?;
    tracing::info!("Startup: DynamoDB table initialization complete.");
    Ok(())
}
