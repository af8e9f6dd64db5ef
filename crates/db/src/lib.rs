pub mod connection;
pub mod feed;
pub mod fixtures;
pub mod migrations;
pub mod repositories;

pub use connection::{connect, connect_with_config, connect_with_settings, DbPool};
pub use feed::{ChangeFeed, ChangeHub, FeedError, FeedSubscription};
pub use fixtures::{DemoSeedDataset, SeedResult, VerificationResult};
