use crate::config::Config;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_sdk_dynamodb::Client as DynamoDbClient;
use tracing;

/// Builds the shared AWS SDK configuration.
///
/// The region always comes from `Config`. An `AWS_ENDPOINT_URL` override points
/// the clients at DynamoDB Local or LocalStack. Credentials come from the default
/// provider chain.
pub async fn create_sdk_config(config: &Config) -> SdkConfig {
    let region = Region::new(config.aws_region.clone());
    tracing::info!(sdk_region = %config.aws_region, "Setting SDK region");

    let mut config_loader = aws_config::defaults(BehaviorVersion::latest()).region(region);

    if let Some(endpoint_url) = &config.aws_endpoint {
        tracing::info!("Using endpoint override: {}", endpoint_url);
        config_loader = config_loader.endpoint_url(endpoint_url);
    } else {
        tracing::info!("Using default AWS endpoints and credential resolution.");
    }

    config_loader.load().await
}

/// DynamoDB client for the meme repository and table provisioning.
pub fn create_dynamodb_client(sdk_config: &SdkConfig) -> DynamoDbClient {
    DynamoDbClient::new(sdk_config)
}
