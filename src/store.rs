use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StoreError;
use crate::models::{ArticleRecord, TopicRecord, User};

/// Who is reading. Login itself happens elsewhere.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn current_user(&self) -> Option<User>;
}

/// Fixed identity, used by the command line front end.
pub struct StaticIdentity(pub Option<User>);

#[async_trait]
impl IdentityProvider for StaticIdentity {
    async fn current_user(&self) -> Option<User> {
        self.0.clone()
    }
}

#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Topics the user subscribed to, in subscription order.
    async fn subscribed_topics(&self, user_id: &str) -> Result<Vec<TopicRecord>, StoreError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

impl ApprovalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
        }
    }
}

/// One page request against the article store, always newest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleQuery {
    pub topic_id: String,
    pub status: ApprovalStatus,
    /// Continuation token of the previous page; `None` starts at the newest article.
    pub after: Option<String>,
    pub limit: usize,
}

#[derive(Debug, Clone, Default)]
pub struct ArticlePage {
    pub records: Vec<ArticleRecord>,
    /// `None` when the query has nothing left after this page.
    pub next: Option<String>,
}

#[async_trait]
pub trait ArticleStore: Send + Sync {
    /// Returns at most `query.limit` records. A page may hold fewer records
    /// while still carrying a continuation token.
    async fn query_articles(&self, query: ArticleQuery) -> Result<ArticlePage, StoreError>;
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get_text(&self, bucket: &str, reference: &str) -> Result<String, StoreError>;
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
