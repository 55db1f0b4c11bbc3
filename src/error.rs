use thiserror::Error;

/// Failures of a single feed operation. None of them is fatal to the session.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("topic {0} is not subscribed")]
    UnknownTopic(String),

    #[error("topic {0} already has a fetch in flight")]
    TopicBusy(String),

    #[error("article {article_id} not found in topic {topic_id}")]
    UnknownArticle { topic_id: String, article_id: String },

    #[error("article count must be positive")]
    InvalidCount,

    #[error("invalid record from store: {0}")]
    InvalidRecord(String),

    #[error("{context}: {source}")]
    Store {
        context: String,
        #[source]
        source: StoreError,
    },
}

impl FeedError {
    pub fn store(context: impl Into<String>, source: StoreError) -> Self {
        Self::Store {
            context: context.into(),
            source,
        }
    }
}

/// Errors raised by the external collaborators.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("malformed encoded value: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("object {bucket}/{reference} not found")]
    NotFound { bucket: String, reference: String },

    #[error("{0}")]
    Unavailable(String),
}
