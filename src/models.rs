use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::FeedError;

static DATE_BUCKET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}/\d{2}/\d{2}$").expect("valid date bucket pattern"));

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub user_id: String,
    pub name: String,
}

/// A topic as the subscription store reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicRecord {
    pub topic_id: String,
    pub name: String,
    pub category: String,
    pub is_published: bool,
}

/// A subscribed topic in the reader session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    pub topic_id: String,
    pub name: String,
    pub category: String,
    pub is_selected: bool,
}

impl Topic {
    pub fn from_record(record: TopicRecord, is_selected: bool) -> Self {
        Self {
            topic_id: record.topic_id,
            name: record.name,
            category: record.category,
            is_selected,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SummarizationLength {
    #[default]
    Short,
    Medium,
    Full,
}

impl SummarizationLength {
    pub const ALL: [SummarizationLength; 3] = [Self::Short, Self::Medium, Self::Full];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Short => "SHORT",
            Self::Medium => "MEDIUM",
            Self::Full => "FULL",
        }
    }
}

impl fmt::Display for SummarizationLength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SummarizationLength {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "short" => Ok(Self::Short),
            "medium" => Ok(Self::Medium),
            "full" => Ok(Self::Full),
            other => Err(format!("unknown summarization length: {}", other)),
        }
    }
}

/// Coarse publishing day of an article, `YYYY/MM/DD`.
///
/// The key is zero padded so that ordering the raw strings orders the days.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DateBucket(String);

impl DateBucket {
    pub fn parse(key: &str) -> Result<Self, FeedError> {
        if !DATE_BUCKET_RE.is_match(key) || NaiveDate::parse_from_str(key, "%Y/%m/%d").is_err() {
            return Err(FeedError::InvalidRecord(format!("bad date bucket '{}'", key)));
        }
        Ok(Self(key.to_string()))
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self(date.format("%Y/%m/%d").to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Human readable label, e.g. "Sunday, March 10, 2024".
    pub fn label(&self) -> String {
        NaiveDate::parse_from_str(&self.0, "%Y/%m/%d")
            .map(|date| date.format("%A, %B %d, %Y").to_string())
            .unwrap_or_else(|_| self.0.clone())
    }
}

impl fmt::Display for DateBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An approved article row as returned by the article store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleRecord {
    pub article_id: String,
    pub topic_id: String,
    pub title: String,
    pub date_published: String,
    pub published_at: DateTime<Utc>,
    pub source_urls: Vec<String>,
    pub source_providers: Vec<String>,
    pub short_summary_ref: String,
    pub medium_summary_ref: String,
    pub full_summary_ref: String,
}

/// Pointer to summary text held by the object store, plus the text once fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub reference: String,
    pub text: Option<String>,
}

impl Summary {
    pub fn new(reference: String) -> Self {
        Self { reference, text: None }
    }

    pub fn is_hydrated(&self) -> bool {
        self.text.as_deref().is_some_and(|text| !text.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub article_id: String,
    pub topic_id: String,
    pub title: String,
    pub date_published: DateBucket,
    pub published_at: DateTime<Utc>,
    pub source_urls: Vec<String>,
    pub source_providers: Vec<String>,
    pub short_summary: Summary,
    pub medium_summary: Summary,
    pub full_summary: Summary,
    // A single slot keeps the shown length exclusive
    pub shown_length: Option<SummarizationLength>,
    pub is_expanded: bool,
}

impl Article {
    /// Validates a store record and caps its sources at `max_sources`.
    pub fn from_record(record: ArticleRecord, max_sources: usize) -> Result<Self, FeedError> {
        if record.article_id.trim().is_empty() {
            return Err(FeedError::InvalidRecord("article without id".to_string()));
        }
        let date_published = DateBucket::parse(&record.date_published)?;

        let mut source_urls = record.source_urls;
        source_urls.truncate(max_sources);
        let mut source_providers = record.source_providers;
        source_providers.truncate(max_sources);

        Ok(Self {
            article_id: record.article_id,
            topic_id: record.topic_id,
            title: record.title,
            date_published,
            published_at: record.published_at,
            source_urls,
            source_providers,
            short_summary: Summary::new(record.short_summary_ref),
            medium_summary: Summary::new(record.medium_summary_ref),
            full_summary: Summary::new(record.full_summary_ref),
            shown_length: None,
            is_expanded: false,
        })
    }

    pub fn summary(&self, length: SummarizationLength) -> &Summary {
        match length {
            SummarizationLength::Short => &self.short_summary,
            SummarizationLength::Medium => &self.medium_summary,
            SummarizationLength::Full => &self.full_summary,
        }
    }

    pub fn summary_mut(&mut self, length: SummarizationLength) -> &mut Summary {
        match length {
            SummarizationLength::Short => &mut self.short_summary,
            SummarizationLength::Medium => &mut self.medium_summary,
            SummarizationLength::Full => &mut self.full_summary,
        }
    }

    pub fn is_shown(&self, length: SummarizationLength) -> bool {
        self.shown_length == Some(length)
    }

    /// Showing one length hides the other two.
    pub fn set_show_length(&mut self, length: SummarizationLength, shown: bool) {
        if shown {
            self.shown_length = Some(length);
        } else if self.shown_length == Some(length) {
            self.shown_length = None;
        }
    }

    /// Text of the shown length, if it has been fetched.
    pub fn shown_text(&self) -> Option<&str> {
        self.shown_length
            .and_then(|length| self.summary(length).text.as_deref())
    }

    pub fn published_on(&self) -> String {
        self.published_at.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record() -> ArticleRecord {
        ArticleRecord {
            article_id: "a1".to_string(),
            topic_id: "t1".to_string(),
            title: "Title".to_string(),
            date_published: "2024/03/01".to_string(),
            published_at: Utc.with_ymd_and_hms(2024, 3, 1, 18, 59, 24).unwrap(),
            source_urls: vec![
                "https://one.example".to_string(),
                "https://two.example".to_string(),
                "https://three.example".to_string(),
            ],
            source_providers: vec!["One".to_string(), "Two".to_string(), "Three".to_string()],
            short_summary_ref: "a1/short".to_string(),
            medium_summary_ref: "a1/medium".to_string(),
            full_summary_ref: "a1/full".to_string(),
        }
    }

    #[test]
    fn test_from_record_truncates_sources() {
        let article = Article::from_record(record(), 2).unwrap();
        assert_eq!(article.source_urls.len(), 2);
        assert_eq!(article.source_providers, vec!["One", "Two"]);
        assert_eq!(article.shown_length, None);
        assert_eq!(article.published_on(), "2024-03-01 18:59:24");
    }

    #[test]
    fn test_from_record_rejects_bad_bucket() {
        let mut bad = record();
        bad.date_published = "2024-3-1".to_string();
        assert!(matches!(
            Article::from_record(bad, 3),
            Err(FeedError::InvalidRecord(_))
        ));

        let mut impossible = record();
        impossible.date_published = "2024/02/31".to_string();
        assert!(Article::from_record(impossible, 3).is_err());
    }

    #[test]
    fn test_set_show_length_is_exclusive() {
        let mut article = Article::from_record(record(), 3).unwrap();
        for length in SummarizationLength::ALL {
            article.set_show_length(length, true);
            let shown: Vec<_> = SummarizationLength::ALL
                .into_iter()
                .filter(|l| article.is_shown(*l))
                .collect();
            assert_eq!(shown, vec![length]);
        }

        article.set_show_length(SummarizationLength::Short, false);
        assert!(article.is_shown(SummarizationLength::Full));
        article.set_show_length(SummarizationLength::Full, false);
        assert_eq!(article.shown_length, None);
    }

    #[test]
    fn test_date_bucket_label_and_order() {
        let older = DateBucket::parse("2024/01/02").unwrap();
        let newer = DateBucket::parse("2024/01/10").unwrap();
        assert!(newer > older);
        assert_eq!(newer.label(), "Wednesday, January 10, 2024");
    }

    #[test]
    fn test_summarization_length_parse() {
        assert_eq!("Medium".parse::<SummarizationLength>(), Ok(SummarizationLength::Medium));
        assert!("tiny".parse::<SummarizationLength>().is_err());
        assert_eq!(SummarizationLength::default(), SummarizationLength::Short);
    }
}
