//! Newspaper feed of The Daily Bite: per-topic, date-bucketed pages of
//! summarized articles loaded newest first from an article store.

pub mod config;
pub mod db;
pub mod error;
pub mod http;
pub mod logger;
pub mod models;
pub mod newspaper;
pub mod store;

pub use config::Config;
pub use error::{FeedError, StoreError};
pub use models::{Article, DateBucket, SummarizationLength, Topic};
pub use newspaper::{Cursor, DateSection, FeedPage, HydrateOutcome, LoadOutcome, Newspaper, SkipReason};
