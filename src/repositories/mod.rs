mod dynamodb;
mod memory;

pub use dynamodb::{DynamoDbMemeRepository, CREATED_AT_ATTR, CREATED_AT_INDEX, LISTING_ATTR, MEME_ID_ATTR, TRIPLE_KEY_ATTR};
pub use memory::InMemoryMemeRepository;
