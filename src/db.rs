use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Days, NaiveDate, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;

use crate::error::StoreError;
use crate::models::{ArticleRecord, DateBucket, TopicRecord, User};
use crate::store::{ApprovalStatus, ArticlePage, ArticleQuery, ArticleStore, ObjectStore, SubscriptionStore};

/// Position of the last article handed out, encoded as the continuation token.
#[derive(Debug, Serialize, Deserialize)]
struct ArticleKey {
    published_at: DateTime<Utc>,
    article_id: String,
}

/// A published topic as shown on the subscription page.
#[derive(Debug, Clone, PartialEq)]
pub struct TopicListing {
    pub topic: TopicRecord,
    pub is_user_subscribed: bool,
    pub last_publishing_date: Option<DateTime<Utc>>,
}

pub struct Database {
    pub pool: SqlitePool,
}

impl Database {
    pub async fn new(database_url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePool::connect_with(options).await?;
        let db = Self { pool };
        db.init().await?;
        Ok(db)
    }

    /// A private in-memory database. A single connection that never expires
    /// keeps the data alive for the lifetime of the pool.
    pub async fn open_in_memory() -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None::<Duration>)
            .max_lifetime(None::<Duration>)
            .connect_with(options)
            .await?;
        let db = Self { pool };
        db.init().await?;
        Ok(db)
    }

    pub async fn init(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                user_id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS topics (
                topic_id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                category TEXT NOT NULL DEFAULT '',
                is_published INTEGER NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS subscriptions (
                user_id TEXT NOT NULL,
                topic_id TEXT NOT NULL,
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                date_subscribed DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (topic_id) REFERENCES topics(topic_id),
                UNIQUE(user_id, topic_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS articles (
                article_id TEXT PRIMARY KEY,
                topic_id TEXT NOT NULL,
                title TEXT NOT NULL,
                date_published TEXT NOT NULL,
                published_at DATETIME NOT NULL,
                approval_status TEXT NOT NULL,
                source_urls TEXT NOT NULL DEFAULT '[]',
                source_providers TEXT NOT NULL DEFAULT '[]',
                short_summary_ref TEXT NOT NULL,
                medium_summary_ref TEXT NOT NULL,
                full_summary_ref TEXT NOT NULL,
                FOREIGN KEY (topic_id) REFERENCES topics(topic_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_articles_topic_published
            ON articles (topic_id, approval_status, published_at DESC, article_id DESC)
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS topic_suggestions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL,
                topic TEXT NOT NULL,
                created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS summaries (
                bucket TEXT NOT NULL,
                reference TEXT NOT NULL,
                body TEXT NOT NULL,
                PRIMARY KEY (bucket, reference)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn add_user(&self, user_id: &str, name: &str) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO users (user_id, name)
            VALUES (?, ?)
            "#,
        )
        .bind(user_id)
        .bind(name)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn find_user(&self, user_id: &str) -> Result<Option<User>, StoreError> {
        let row = sqlx::query("SELECT user_id, name FROM users WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|row| User {
            user_id: row.get(0),
            name: row.get(1),
        }))
    }

    pub async fn add_topic(&self, topic: &TopicRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO topics (topic_id, name, category, is_published)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(&topic.topic_id)
        .bind(&topic.name)
        .bind(&topic.category)
        .bind(topic.is_published)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Published topics with the user's subscription flag and the time of
    /// their newest approved article.
    pub async fn list_topics(&self, user_id: &str) -> Result<Vec<TopicListing>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT t.topic_id, t.name, t.category, t.is_published,
                   EXISTS (
                       SELECT 1 FROM subscriptions s
                       WHERE s.user_id = ? AND s.topic_id = t.topic_id
                   ) AS subscribed,
                   (
                       SELECT MAX(a.published_at) FROM articles a
                       WHERE a.topic_id = t.topic_id AND a.approval_status = ?
                   ) AS last_publishing_date
            FROM topics t
            WHERE t.is_published = 1
            ORDER BY t.name
            "#,
        )
        .bind(user_id)
        .bind(ApprovalStatus::Approved.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<TopicListing, StoreError> {
                let last: Option<String> = row.try_get("last_publishing_date")?;
                Ok(TopicListing {
                    topic: topic_from_row(row)?,
                    is_user_subscribed: row.try_get("subscribed")?,
                    last_publishing_date: last.and_then(|s| parse_stored_datetime(&s)),
                })
            })
            .collect()
    }

    pub async fn subscribe(&self, user_id: &str, topic_id: &str) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO subscriptions (user_id, topic_id)
            SELECT ?, topic_id FROM topics WHERE topic_id = ?
            "#,
        )
        .bind(user_id)
        .bind(topic_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn unsubscribe(&self, user_id: &str, topic_id: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM subscriptions WHERE user_id = ? AND topic_id = ?")
            .bind(user_id)
            .bind(topic_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Records a reader's idea for a new topic. Blank suggestions are
    /// ignored and return `false`.
    pub async fn suggest_topic(&self, user_id: &str, topic: &str) -> Result<bool, StoreError> {
        let topic = topic.trim();
        if topic.is_empty() {
            return Ok(false);
        }

        sqlx::query("INSERT INTO topic_suggestions (user_id, topic) VALUES (?, ?)")
            .bind(user_id)
            .bind(topic)
            .execute(&self.pool)
            .await?;

        Ok(true)
    }

    pub async fn add_article(
        &self,
        article: &ArticleRecord,
        status: ApprovalStatus,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO articles (
                article_id, topic_id, title, date_published, published_at, approval_status,
                source_urls, source_providers, short_summary_ref, medium_summary_ref, full_summary_ref
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&article.article_id)
        .bind(&article.topic_id)
        .bind(&article.title)
        .bind(&article.date_published)
        .bind(article.published_at)
        .bind(status.as_str())
        .bind(serde_json::to_string(&article.source_urls)?)
        .bind(serde_json::to_string(&article.source_providers)?)
        .bind(&article.short_summary_ref)
        .bind(&article.medium_summary_ref)
        .bind(&article.full_summary_ref)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn put_summary(&self, bucket: &str, reference: &str, body: &str) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO summaries (bucket, reference, body)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(bucket)
        .bind(reference)
        .bind(body)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Fills the database with a demo reader, three published topics and a few weeks
    /// of summarized articles. Returns the demo user.
    pub async fn seed_demo(&self, bucket: &str, today: NaiveDate) -> Result<User, StoreError> {
        let user = User {
            user_id: "demo".to_string(),
            name: "Demo Reader".to_string(),
        };
        self.add_user(&user.user_id, &user.name).await?;

        let topics = [
            ("technology", "Technology", "Science & Technology", true),
            ("world", "World News", "News", true),
            ("markets", "Markets", "Business", true),
            ("drafts", "Drafts", "Internal", false),
        ];
        for (topic_id, name, category, is_published) in topics {
            self.add_topic(&TopicRecord {
                topic_id: topic_id.to_string(),
                name: name.to_string(),
                category: category.to_string(),
                is_published,
            })
            .await?;
        }

        for (topic_id, name, _, _) in topics.iter().take(3) {
            for n in 0..40u64 {
                let day = today.checked_sub_days(Days::new(n / 3)).unwrap_or(today);
                let published_at = day
                    .and_hms_opt(18 - (n % 3) as u32, 30, 0)
                    .unwrap_or_default()
                    .and_utc();
                let article_id = format!("{}-{:03}", topic_id, n);
                let refs = ["short", "medium", "full"].map(|length| format!("{}/{}", article_id, length));

                let record = ArticleRecord {
                    article_id: article_id.clone(),
                    topic_id: topic_id.to_string(),
                    title: format!("{} story #{}", name, n + 1),
                    date_published: DateBucket::from_date(day).to_string(),
                    published_at,
                    source_urls: (1..=4)
                        .map(|i| format!("https://source{}.example/{}", i, article_id))
                        .collect(),
                    source_providers: (1..=4).map(|i| format!("Source {}", i)).collect(),
                    short_summary_ref: refs[0].clone(),
                    medium_summary_ref: refs[1].clone(),
                    full_summary_ref: refs[2].clone(),
                };
                // Every seventh story is still waiting for review
                let status = if n % 7 == 6 {
                    ApprovalStatus::Pending
                } else {
                    ApprovalStatus::Approved
                };
                self.add_article(&record, status).await?;

                let sentence = format!("{} story #{} in brief. ", name, n + 1);
                self.put_summary(bucket, &refs[0], &format!("{}\n{}", sentence.repeat(2), sentence))
                    .await?;
                self.put_summary(bucket, &refs[1], &format!("{}\n\n{}", sentence.repeat(5), sentence.repeat(5)))
                    .await?;
                self.put_summary(bucket, &refs[2], &format!("{}\n\n{}", sentence.repeat(20), sentence.repeat(20)))
                    .await?;
            }
        }

        for topic_id in ["technology", "world"] {
            self.subscribe(&user.user_id, topic_id).await?;
        }

        info!("Seeded demo data for user {}", user.user_id);
        Ok(user)
    }
}

fn topic_from_row(row: &SqliteRow) -> Result<TopicRecord, StoreError> {
    Ok(TopicRecord {
        topic_id: row.try_get("topic_id")?,
        name: row.try_get("name")?,
        category: row.try_get("category")?,
        is_published: row.try_get("is_published")?,
    })
}

fn article_from_row(row: &SqliteRow) -> Result<ArticleRecord, StoreError> {
    let source_urls: String = row.try_get("source_urls")?;
    let source_providers: String = row.try_get("source_providers")?;
    Ok(ArticleRecord {
        article_id: row.try_get("article_id")?,
        topic_id: row.try_get("topic_id")?,
        title: row.try_get("title")?,
        date_published: row.try_get("date_published")?,
        published_at: row.try_get("published_at")?,
        source_urls: serde_json::from_str(&source_urls)?,
        source_providers: serde_json::from_str(&source_providers)?,
        short_summary_ref: row.try_get("short_summary_ref")?,
        medium_summary_ref: row.try_get("medium_summary_ref")?,
        full_summary_ref: row.try_get("full_summary_ref")?,
    })
}

// Aggregates come back as plain text, not as a typed DATETIME column
fn parse_stored_datetime(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f%:z")
        .or_else(|_| DateTime::parse_from_rfc3339(value))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[async_trait]
impl SubscriptionStore for Database {
    async fn subscribed_topics(&self, user_id: &str) -> Result<Vec<TopicRecord>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT t.topic_id, t.name, t.category, t.is_published
            FROM subscriptions s
            JOIN topics t ON t.topic_id = s.topic_id
            WHERE s.user_id = ?
            ORDER BY s.seq
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(topic_from_row).collect()
    }
}

#[async_trait]
impl ArticleStore for Database {
    async fn query_articles(&self, query: ArticleQuery) -> Result<ArticlePage, StoreError> {
        if query.limit == 0 {
            return Ok(ArticlePage {
                records: Vec::new(),
                next: query.after,
            });
        }

        // One extra row tells whether anything is left after this page
        let fetch = i64::try_from(query.limit.saturating_add(1)).unwrap_or(i64::MAX);
        let rows = match &query.after {
            Some(token) => {
                let key: ArticleKey = serde_json::from_str(token)?;
                sqlx::query(
                    r#"
                    SELECT * FROM articles
                    WHERE topic_id = ? AND approval_status = ?
                      AND (published_at < ? OR (published_at = ? AND article_id < ?))
                    ORDER BY published_at DESC, article_id DESC
                    LIMIT ?
                    "#,
                )
                .bind(&query.topic_id)
                .bind(query.status.as_str())
                .bind(key.published_at)
                .bind(key.published_at)
                .bind(&key.article_id)
                .bind(fetch)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    r#"
                    SELECT * FROM articles
                    WHERE topic_id = ? AND approval_status = ?
                    ORDER BY published_at DESC, article_id DESC
                    LIMIT ?
                    "#,
                )
                .bind(&query.topic_id)
                .bind(query.status.as_str())
                .bind(fetch)
                .fetch_all(&self.pool)
                .await?
            }
        };

        let has_more = rows.len() > query.limit;
        let records = rows
            .iter()
            .take(query.limit)
            .map(article_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        let next = match records.last() {
            Some(last) if has_more => Some(serde_json::to_string(&ArticleKey {
                published_at: last.published_at,
                article_id: last.article_id.clone(),
            })?),
            _ => None,
        };

        debug!(
            "Article query for topic {} returned {} rows, more: {}",
            query.topic_id,
            records.len(),
            has_more
        );
        Ok(ArticlePage { records, next })
    }
}

#[async_trait]
impl ObjectStore for Database {
    async fn get_text(&self, bucket: &str, reference: &str) -> Result<String, StoreError> {
        let row = sqlx::query("SELECT body FROM summaries WHERE bucket = ? AND reference = ?")
            .bind(bucket)
            .bind(reference)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(row.try_get("body")?),
            None => Err(StoreError::NotFound {
                bucket: bucket.to_string(),
                reference: reference.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::collections::HashSet;

    async fn setup_db() -> Database {
        Database::open_in_memory().await.unwrap()
    }

    fn topic(id: &str, is_published: bool) -> TopicRecord {
        TopicRecord {
            topic_id: id.to_string(),
            name: format!("Topic {}", id),
            category: "General".to_string(),
            is_published,
        }
    }

    fn article(id: &str, topic_id: &str, day: u32, hour: u32) -> ArticleRecord {
        ArticleRecord {
            article_id: id.to_string(),
            topic_id: topic_id.to_string(),
            title: format!("Article {}", id),
            date_published: format!("2024/03/{:02}", day),
            published_at: Utc.with_ymd_and_hms(2024, 3, day, hour, 0, 0).unwrap(),
            source_urls: vec!["https://a.example".to_string()],
            source_providers: vec!["A".to_string()],
            short_summary_ref: format!("{}/short", id),
            medium_summary_ref: format!("{}/medium", id),
            full_summary_ref: format!("{}/full", id),
        }
    }

    fn query(topic_id: &str, after: Option<String>, limit: usize) -> ArticleQuery {
        ArticleQuery {
            topic_id: topic_id.to_string(),
            status: ApprovalStatus::Approved,
            after,
            limit,
        }
    }

    #[tokio::test]
    async fn test_keyset_pagination_newest_first() {
        let db = setup_db().await;
        db.add_topic(&topic("t1", true)).await.unwrap();
        db.add_topic(&topic("t2", true)).await.unwrap();

        // Two articles share a timestamp to exercise the id tie-break
        db.add_article(&article("a1", "t1", 1, 9), ApprovalStatus::Approved).await.unwrap();
        db.add_article(&article("a2", "t1", 2, 9), ApprovalStatus::Approved).await.unwrap();
        db.add_article(&article("a3", "t1", 2, 9), ApprovalStatus::Approved).await.unwrap();
        db.add_article(&article("a4", "t1", 3, 9), ApprovalStatus::Pending).await.unwrap();
        db.add_article(&article("a5", "t1", 4, 9), ApprovalStatus::Approved).await.unwrap();
        db.add_article(&article("b1", "t2", 5, 9), ApprovalStatus::Approved).await.unwrap();

        let first = db.query_articles(query("t1", None, 2)).await.unwrap();
        let ids: Vec<_> = first.records.iter().map(|r| r.article_id.as_str()).collect();
        assert_eq!(ids, vec!["a5", "a3"]);
        assert!(first.next.is_some());

        let second = db.query_articles(query("t1", first.next, 2)).await.unwrap();
        let ids: Vec<_> = second.records.iter().map(|r| r.article_id.as_str()).collect();
        assert_eq!(ids, vec!["a2", "a1"]);
        assert_eq!(second.next, None);
    }

    #[tokio::test]
    async fn test_pagination_yields_each_article_once() {
        let db = setup_db().await;
        db.add_topic(&topic("t1", true)).await.unwrap();
        for n in 0..7u32 {
            db.add_article(&article(&format!("a{}", n), "t1", 1 + n % 3, n), ApprovalStatus::Approved)
                .await
                .unwrap();
        }

        let mut seen = HashSet::new();
        let mut after = None;
        loop {
            let page = db.query_articles(query("t1", after, 3)).await.unwrap();
            for record in page.records {
                assert!(seen.insert(record.article_id));
            }
            after = page.next;
            if after.is_none() {
                break;
            }
        }
        assert_eq!(seen.len(), 7);
    }

    #[tokio::test]
    async fn test_bad_token_is_an_error() {
        let db = setup_db().await;
        let result = db.query_articles(query("t1", Some("not json".to_string()), 3)).await;
        assert!(matches!(result, Err(StoreError::Encoding(_))));
    }

    #[tokio::test]
    async fn test_unbounded_limit_returns_everything() {
        let db = setup_db().await;
        db.add_topic(&topic("t1", true)).await.unwrap();
        db.add_article(&article("a1", "t1", 1, 9), ApprovalStatus::Approved).await.unwrap();
        db.add_article(&article("a2", "t1", 2, 9), ApprovalStatus::Approved).await.unwrap();

        for limit in [i64::MAX as usize, usize::MAX] {
            let page = db.query_articles(query("t1", None, limit)).await.unwrap();
            assert_eq!(page.records.len(), 2);
            assert_eq!(page.next, None);
        }
    }

    #[tokio::test]
    async fn test_suggest_topic_skips_blank_input() {
        let db = setup_db().await;
        assert!(db.suggest_topic("u1", "  Space exploration ").await.unwrap());
        assert!(!db.suggest_topic("u1", "").await.unwrap());
        assert!(!db.suggest_topic("u1", "   ").await.unwrap());

        let rows = sqlx::query("SELECT user_id, topic FROM topic_suggestions")
            .fetch_all(&db.pool)
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get::<String, _>("user_id"), "u1");
        assert_eq!(rows[0].get::<String, _>("topic"), "Space exploration");
    }

    #[tokio::test]
    async fn test_subscriptions_keep_order() {
        let db = setup_db().await;
        db.add_topic(&topic("t1", true)).await.unwrap();
        db.add_topic(&topic("t2", false)).await.unwrap();
        db.add_topic(&topic("t3", true)).await.unwrap();

        assert!(db.subscribe("u1", "t3").await.unwrap());
        assert!(db.subscribe("u1", "t2").await.unwrap());
        assert!(db.subscribe("u1", "t1").await.unwrap());
        assert!(!db.subscribe("u1", "t1").await.unwrap());
        assert!(!db.subscribe("u1", "missing").await.unwrap());

        let topics = db.subscribed_topics("u1").await.unwrap();
        let ids: Vec<_> = topics.iter().map(|t| t.topic_id.as_str()).collect();
        assert_eq!(ids, vec!["t3", "t2", "t1"]);
        assert!(!topics[1].is_published);

        assert!(db.unsubscribe("u1", "t3").await.unwrap());
        assert!(!db.unsubscribe("u1", "t3").await.unwrap());
        assert_eq!(db.subscribed_topics("u1").await.unwrap().len(), 2);
        assert!(db.subscribed_topics("u2").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_topics_marks_subscriptions() {
        let db = setup_db().await;
        db.add_topic(&topic("t1", true)).await.unwrap();
        db.add_topic(&topic("t2", true)).await.unwrap();
        db.add_topic(&topic("t3", false)).await.unwrap();
        db.add_article(&article("a1", "t1", 2, 10), ApprovalStatus::Approved).await.unwrap();
        db.subscribe("u1", "t2").await.unwrap();

        let listings = db.list_topics("u1").await.unwrap();
        assert_eq!(listings.len(), 2);
        assert_eq!(listings[0].topic.topic_id, "t1");
        assert!(!listings[0].is_user_subscribed);
        assert_eq!(
            listings[0].last_publishing_date,
            Some(Utc.with_ymd_and_hms(2024, 3, 2, 10, 0, 0).unwrap())
        );
        assert!(listings[1].is_user_subscribed);
        assert_eq!(listings[1].last_publishing_date, None);
    }

    #[tokio::test]
    async fn test_summaries_and_users() {
        let db = setup_db().await;
        db.put_summary("bucket", "a1/short", "Short text").await.unwrap();

        assert_eq!(db.get_text("bucket", "a1/short").await.unwrap(), "Short text");
        assert!(matches!(
            db.get_text("other", "a1/short").await,
            Err(StoreError::NotFound { .. })
        ));

        assert_eq!(db.find_user("u1").await.unwrap(), None);
        db.add_user("u1", "Reader").await.unwrap();
        assert_eq!(db.find_user("u1").await.unwrap().unwrap().name, "Reader");
    }

    #[tokio::test]
    async fn test_seed_demo() {
        let db = setup_db().await;
        let today = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        let user = db.seed_demo("bucket", today).await.unwrap();

        let topics = db.subscribed_topics(&user.user_id).await.unwrap();
        assert_eq!(topics.len(), 2);

        let page = db.query_articles(query("technology", None, 5)).await.unwrap();
        assert_eq!(page.records.len(), 5);
        assert_eq!(page.records[0].date_published, "2024/03/10");
        assert_eq!(page.records[0].source_urls.len(), 4);

        let text = db.get_text("bucket", &page.records[0].short_summary_ref).await.unwrap();
        assert!(text.contains('\n'));
    }
}
