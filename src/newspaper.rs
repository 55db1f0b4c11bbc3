use std::collections::{HashMap, HashSet};
use std::sync::{Arc, LazyLock, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use futures::future::join_all;
use log::{debug, error, info, warn};
use regex::Regex;

use crate::config::Config;
use crate::error::FeedError;
use crate::models::{Article, DateBucket, SummarizationLength, Topic, TopicRecord};
use crate::store::{
    ApprovalStatus, ArticleQuery, ArticleStore, Clock, IdentityProvider, ObjectStore,
    SubscriptionStore, SystemClock,
};

static LINE_BREAK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\r\n|\r|\n").expect("valid line break pattern"));

/// Where the next page of a topic starts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Cursor {
    /// Never fetched: start from the newest article
    #[default]
    NotStarted,
    /// Continuation token reported by the article store
    Token(String),
    /// The store reported no continuation, nothing left to load
    Exhausted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activity {
    Refreshing,
    LoadingMore,
}

/// Why an operation returned without touching the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NotAuthenticated,
    NoTopicSelected,
    CoolingDown,
    Exhausted,
    CapacityReached,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded { articles: usize, exhausted: bool },
    Skipped(SkipReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HydrateOutcome {
    Fetched(SummarizationLength),
    Cached(SummarizationLength),
    /// Another call is already fetching this summary
    InFlight,
    /// The article was replaced by a refresh while its text was in flight
    Discarded,
    Skipped(SkipReason),
}

/// One day of a topic's newspaper, ready for display.
#[derive(Debug, Clone, PartialEq)]
pub struct DateSection {
    pub date: DateBucket,
    pub label: String,
    pub articles: Vec<Article>,
}

/// Articles loaded so far for one topic, grouped by publishing day.
#[derive(Debug, Clone)]
pub struct FeedPage {
    buckets: HashMap<DateBucket, Vec<Article>>,
    cursor: Cursor,
    last_refresh: DateTime<Utc>,
    activity: Option<Activity>,
}

impl Default for FeedPage {
    fn default() -> Self {
        Self {
            buckets: HashMap::new(),
            cursor: Cursor::NotStarted,
            last_refresh: DateTime::<Utc>::UNIX_EPOCH,
            activity: None,
        }
    }
}

impl FeedPage {
    pub fn buckets(&self) -> &HashMap<DateBucket, Vec<Article>> {
        &self.buckets
    }

    pub fn cursor(&self) -> &Cursor {
        &self.cursor
    }

    pub fn last_refresh(&self) -> DateTime<Utc> {
        self.last_refresh
    }

    pub fn activity(&self) -> Option<Activity> {
        self.activity
    }

    pub fn len(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.values().all(Vec::is_empty)
    }

    pub fn article_ids(&self) -> HashSet<String> {
        self.buckets
            .values()
            .flatten()
            .map(|article| article.article_id.clone())
            .collect()
    }

    pub fn article(&self, article_id: &str) -> Option<&Article> {
        self.buckets
            .values()
            .flatten()
            .find(|article| article.article_id == article_id)
    }

    fn article_mut(&mut self, article_id: &str) -> Option<&mut Article> {
        self.buckets
            .values_mut()
            .flatten()
            .find(|article| article.article_id == article_id)
    }

    /// Appends to the existing day lists, keeping fetch order.
    fn append(&mut self, articles: Vec<Article>) {
        for article in articles {
            self.buckets
                .entry(article.date_published.clone())
                .or_default()
                .push(article);
        }
    }

    /// Days newest first, articles in fetch order within a day.
    pub fn sections(&self) -> Vec<DateSection> {
        let mut dates: Vec<&DateBucket> = self.buckets.keys().collect();
        dates.sort_by(|a, b| b.cmp(a));
        dates
            .into_iter()
            .map(|date| DateSection {
                date: date.clone(),
                label: date.label(),
                articles: self.buckets[date].clone(),
            })
            .collect()
    }
}

type SummaryKey = (String, String, SummarizationLength);

#[derive(Default)]
struct NewspaperState {
    topics: Vec<Topic>,
    pages: HashMap<String, FeedPage>,
    selected_length: SummarizationLength,
    hydrating: HashSet<SummaryKey>,
}

impl NewspaperState {
    fn is_subscribed(&self, topic_id: &str) -> bool {
        self.topics.iter().any(|topic| topic.topic_id == topic_id)
    }

    fn selected_topic(&self) -> Option<&Topic> {
        self.topics.iter().find(|topic| topic.is_selected)
    }

    fn page_mut(&mut self, topic_id: &str) -> Result<&mut FeedPage, FeedError> {
        if !self.is_subscribed(topic_id) {
            return Err(FeedError::UnknownTopic(topic_id.to_string()));
        }
        Ok(self.pages.entry(topic_id.to_string()).or_default())
    }

    fn article_mut(&mut self, topic_id: &str, article_id: &str) -> Result<&mut Article, FeedError> {
        if !self.is_subscribed(topic_id) {
            return Err(FeedError::UnknownTopic(topic_id.to_string()));
        }
        self.pages
            .get_mut(topic_id)
            .and_then(|page| page.article_mut(article_id))
            .ok_or_else(|| FeedError::UnknownArticle {
                topic_id: topic_id.to_string(),
                article_id: article_id.to_string(),
            })
    }

    fn release(&mut self, claim: &Claim) {
        match claim {
            Claim::Topic(topic_id) => {
                if let Some(page) = self.pages.get_mut(topic_id) {
                    page.activity = None;
                }
            }
            Claim::Summary(key) => {
                self.hydrating.remove(key);
            }
        }
    }
}

fn lock(state: &Mutex<NewspaperState>) -> MutexGuard<'_, NewspaperState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

enum Claim {
    Topic(String),
    Summary(SummaryKey),
}

/// Holds a topic (or a summary) busy while a store call is outstanding.
/// Dropping it, including when the owning future is dropped, releases the claim.
struct InFlight<'a> {
    state: &'a Mutex<NewspaperState>,
    claim: Option<Claim>,
}

impl<'a> InFlight<'a> {
    fn new(state: &'a Mutex<NewspaperState>, claim: Claim) -> Self {
        Self {
            state,
            claim: Some(claim),
        }
    }

    /// Releases the claim and applies the result under the same lock.
    fn finish<T>(mut self, apply: impl FnOnce(&mut NewspaperState) -> T) -> T {
        let mut state = lock(self.state);
        if let Some(claim) = self.claim.take() {
            state.release(&claim);
        }
        apply(&mut state)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if let Some(claim) = self.claim.take() {
            lock(self.state).release(&claim);
        }
    }
}

struct Batch {
    articles: Vec<Article>,
    cursor: Cursor,
}

pub fn normalize_line_breaks(text: &str) -> String {
    LINE_BREAK_RE.replace_all(text, "<br>").into_owned()
}

/// A reader's newspaper: subscribed topics and the articles loaded for each.
///
/// All methods take `&self`. Store calls run without holding the state lock,
/// so different topics load concurrently while each topic allows a single
/// fetch at a time.
pub struct Newspaper {
    config: Config,
    identity: Arc<dyn IdentityProvider>,
    subscriptions: Arc<dyn SubscriptionStore>,
    articles: Arc<dyn ArticleStore>,
    objects: Arc<dyn ObjectStore>,
    clock: Arc<dyn Clock>,
    state: Mutex<NewspaperState>,
}

impl Newspaper {
    pub fn new(
        config: Config,
        identity: Arc<dyn IdentityProvider>,
        subscriptions: Arc<dyn SubscriptionStore>,
        articles: Arc<dyn ArticleStore>,
        objects: Arc<dyn ObjectStore>,
    ) -> Self {
        Self {
            config,
            identity,
            subscriptions,
            articles,
            objects,
            clock: Arc::new(SystemClock),
            state: Mutex::new(NewspaperState::default()),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn state(&self) -> MutexGuard<'_, NewspaperState> {
        lock(&self.state)
    }

    async fn authenticated(&self, operation: &str) -> bool {
        if self.identity.current_user().await.is_some() {
            true
        } else {
            warn!("User is not logged in. Cannot {}", operation);
            false
        }
    }

    /// Reloads the subscribed topics. Only published topics are kept; the
    /// current selection survives if still subscribed, else the first topic
    /// is selected.
    pub async fn refresh_subscribed_topics(&self) -> Result<Vec<Topic>, FeedError> {
        let Some(user) = self.identity.current_user().await else {
            warn!("User is not logged in. Cannot get news topics");
            return Ok(Vec::new());
        };

        info!("Refreshing subscribed newspaper topics for user {}", user.user_id);
        let records = self
            .subscriptions
            .subscribed_topics(&user.user_id)
            .await
            .map_err(|e| {
                let err = FeedError::store(format!("getting news topics for user {}", user.user_id), e);
                error!("{}", err);
                err
            })?;

        let published: Vec<TopicRecord> = records.into_iter().filter(|r| r.is_published).collect();

        let mut state = self.state();
        let selected_id = state
            .selected_topic()
            .map(|topic| topic.topic_id.clone())
            .filter(|id| published.iter().any(|r| &r.topic_id == id))
            .or_else(|| published.first().map(|r| r.topic_id.clone()));

        state.topics = published
            .into_iter()
            .map(|record| {
                let is_selected = selected_id.as_deref() == Some(record.topic_id.as_str());
                Topic::from_record(record, is_selected)
            })
            .collect();

        let subscribed: HashSet<String> = state.topics.iter().map(|t| t.topic_id.clone()).collect();
        state.pages.retain(|topic_id, _| subscribed.contains(topic_id));

        info!("User {} has {} newspaper topics", user.user_id, state.topics.len());
        Ok(state.topics.clone())
    }

    /// Fetches up to `count` more approved articles for a topic, continuing
    /// from its cursor. On failure the page is left exactly as it was.
    pub async fn load_articles_for_topic(
        &self,
        topic_id: &str,
        count: usize,
    ) -> Result<LoadOutcome, FeedError> {
        if count == 0 {
            return Err(FeedError::InvalidCount);
        }
        if !self.authenticated("load articles").await {
            return Ok(LoadOutcome::Skipped(SkipReason::NotAuthenticated));
        }

        let (start, wanted, known, in_flight) = {
            let mut state = self.state();
            let page = state.page_mut(topic_id)?;
            if page.activity.is_some() {
                return Err(FeedError::TopicBusy(topic_id.to_string()));
            }
            if page.cursor == Cursor::Exhausted {
                debug!("All articles already loaded for topic id {}", topic_id);
                return Ok(LoadOutcome::Skipped(SkipReason::Exhausted));
            }
            let capacity = self.config.max_articles_per_topic.saturating_sub(page.len());
            if capacity == 0 {
                warn!(
                    "Topic id {} holds {} articles, not loading more",
                    topic_id, self.config.max_articles_per_topic
                );
                return Ok(LoadOutcome::Skipped(SkipReason::CapacityReached));
            }
            page.activity = Some(Activity::LoadingMore);
            (
                page.cursor.clone(),
                count.min(capacity),
                page.article_ids(),
                InFlight::new(&self.state, Claim::Topic(topic_id.to_string())),
            )
        };

        info!("Loading up to {} articles for topic id {}", wanted, topic_id);
        let result = self.fetch_batch(topic_id, start, wanted, known).await;

        in_flight.finish(|state| {
            let batch = match result {
                Ok(batch) => batch,
                Err(err) => {
                    error!("Error loading articles for topic id {}: {}", topic_id, err);
                    return Err(err);
                }
            };
            let page = state
                .pages
                .get_mut(topic_id)
                .ok_or_else(|| FeedError::UnknownTopic(topic_id.to_string()))?;

            let loaded = batch.articles.len();
            page.append(batch.articles);
            page.cursor = batch.cursor;
            debug!("Topic id {} cursor is now {:?}", topic_id, page.cursor);

            Ok(LoadOutcome::Loaded {
                articles: loaded,
                exhausted: page.cursor == Cursor::Exhausted,
            })
        })
    }

    /// Loads one more page for the selected topic.
    pub async fn load_more_articles(&self) -> Result<LoadOutcome, FeedError> {
        let selected = self.state().selected_topic().map(|t| t.topic_id.clone());
        match selected {
            Some(topic_id) => {
                info!("Loading more articles for topic id {}", topic_id);
                self.load_articles_for_topic(&topic_id, self.config.page_size).await
            }
            None => Ok(LoadOutcome::Skipped(SkipReason::NoTopicSelected)),
        }
    }

    /// Reloads a topic from its newest article, replacing everything loaded
    /// so far. Calls within the cooldown of the last successful refresh are
    /// ignored.
    pub async fn refresh_topic(&self, topic_id: &str) -> Result<LoadOutcome, FeedError> {
        if !self.authenticated("refresh newspaper articles").await {
            return Ok(LoadOutcome::Skipped(SkipReason::NotAuthenticated));
        }

        let in_flight = {
            let now = self.clock.now();
            let mut state = self.state();
            let page = state.page_mut(topic_id)?;
            let elapsed = now.signed_duration_since(page.last_refresh);
            if elapsed < self.config.refresh_cooldown() {
                debug!(
                    "Topic id {} was refreshed {}s ago, skipping",
                    topic_id,
                    elapsed.num_seconds()
                );
                return Ok(LoadOutcome::Skipped(SkipReason::CoolingDown));
            }
            if page.activity.is_some() {
                return Err(FeedError::TopicBusy(topic_id.to_string()));
            }
            page.activity = Some(Activity::Refreshing);
            InFlight::new(&self.state, Claim::Topic(topic_id.to_string()))
        };

        info!("Refreshing newspaper articles for topic id {}", topic_id);
        let count = self.config.page_size.min(self.config.max_articles_per_topic);
        let result = self
            .fetch_batch(topic_id, Cursor::NotStarted, count, HashSet::new())
            .await;
        let now = self.clock.now();

        in_flight.finish(|state| {
            let batch = match result {
                Ok(batch) => batch,
                Err(err) => {
                    error!("Error refreshing topic id {}: {}", topic_id, err);
                    return Err(err);
                }
            };
            let page = state
                .pages
                .get_mut(topic_id)
                .ok_or_else(|| FeedError::UnknownTopic(topic_id.to_string()))?;

            let loaded = batch.articles.len();
            page.buckets.clear();
            page.append(batch.articles);
            page.cursor = batch.cursor;
            page.last_refresh = now;

            Ok(LoadOutcome::Loaded {
                articles: loaded,
                exhausted: page.cursor == Cursor::Exhausted,
            })
        })
    }

    /// Refreshes every subscribed topic concurrently.
    pub async fn refresh_all(&self) -> Vec<(String, Result<LoadOutcome, FeedError>)> {
        let topic_ids: Vec<String> = self
            .state()
            .topics
            .iter()
            .map(|topic| topic.topic_id.clone())
            .collect();

        let results = join_all(topic_ids.iter().map(|id| self.refresh_topic(id))).await;

        topic_ids
            .into_iter()
            .zip(results)
            .inspect(|(topic_id, result)| {
                if let Err(err) = result {
                    warn!("Refresh of topic id {} failed: {}", topic_id, err);
                }
            })
            .collect()
    }

    /// Pages through the article store until `count` records are consumed
    /// or the store has nothing more. Nothing is applied to the page here.
    async fn fetch_batch(
        &self,
        topic_id: &str,
        start: Cursor,
        count: usize,
        mut known: HashSet<String>,
    ) -> Result<Batch, FeedError> {
        let mut after = match start {
            Cursor::Token(token) => Some(token),
            Cursor::NotStarted | Cursor::Exhausted => None,
        };
        let mut consumed = 0;
        let mut articles = Vec::new();

        loop {
            let query = ArticleQuery {
                topic_id: topic_id.to_string(),
                status: ApprovalStatus::Approved,
                after: after.clone(),
                limit: count - consumed,
            };
            let page = self.articles.query_articles(query).await.map_err(|e| {
                FeedError::store(format!("querying articles for topic {}", topic_id), e)
            })?;

            let received = page.records.len();
            for record in page.records.into_iter().take(count - consumed) {
                consumed += 1;
                if !known.insert(record.article_id.clone()) {
                    debug!("Skipping duplicate article {}", record.article_id);
                    continue;
                }
                debug!("Loading article {}", record.article_id);
                match Article::from_record(record, self.config.max_sources) {
                    Ok(article) => articles.push(article),
                    Err(err) => warn!("Skipping article of topic id {}: {}", topic_id, err),
                }
            }

            // An empty page that does not move the token would loop forever
            let stalled = received == 0 && page.next == after;
            after = page.next;
            if consumed >= count || after.is_none() || stalled {
                break;
            }
        }

        let cursor = match after {
            Some(token) => Cursor::Token(token),
            None => Cursor::Exhausted,
        };
        Ok(Batch { articles, cursor })
    }

    /// Makes sure the text of the article's shown length is loaded, showing
    /// the session length first if nothing is shown yet. Each summary is
    /// fetched at most once.
    pub async fn populate_article_text(
        &self,
        topic_id: &str,
        article_id: &str,
    ) -> Result<HydrateOutcome, FeedError> {
        if !self.authenticated("load article text").await {
            return Ok(HydrateOutcome::Skipped(SkipReason::NotAuthenticated));
        }

        let (length, reference, in_flight) = {
            let mut state = self.state();
            let selected_length = state.selected_length;
            let article = state.article_mut(topic_id, article_id)?;
            let length = *article.shown_length.get_or_insert(selected_length);
            let summary = article.summary(length);
            if summary.is_hydrated() {
                return Ok(HydrateOutcome::Cached(length));
            }
            let reference = summary.reference.clone();

            let key = (topic_id.to_string(), article_id.to_string(), length);
            if !state.hydrating.insert(key.clone()) {
                return Ok(HydrateOutcome::InFlight);
            }
            (length, reference, InFlight::new(&self.state, Claim::Summary(key)))
        };

        debug!("Fetching {} summary {} of article {}", length, reference, article_id);
        let result = self
            .objects
            .get_text(&self.config.object_store.bucket, &reference)
            .await
            .map_err(|e| {
                FeedError::store(format!("fetching {} summary of article {}", length, article_id), e)
            });

        in_flight.finish(|state| {
            let text = result.inspect_err(|err| error!("{}", err))?;
            match state.article_mut(topic_id, article_id) {
                Ok(article) => {
                    article.summary_mut(length).text = Some(normalize_line_breaks(&text));
                    Ok(HydrateOutcome::Fetched(length))
                }
                Err(_) => {
                    debug!("Article {} is gone, dropping its {} summary", article_id, length);
                    Ok(HydrateOutcome::Discarded)
                }
            }
        })
    }

    pub fn set_show_length(
        &self,
        topic_id: &str,
        article_id: &str,
        length: SummarizationLength,
        shown: bool,
    ) -> Result<(), FeedError> {
        let mut state = self.state();
        state
            .article_mut(topic_id, article_id)?
            .set_show_length(length, shown);
        Ok(())
    }

    /// Returns the new expanded state.
    pub fn toggle_expanded(&self, topic_id: &str, article_id: &str) -> Result<bool, FeedError> {
        let mut state = self.state();
        let article = state.article_mut(topic_id, article_id)?;
        article.is_expanded = !article.is_expanded;
        Ok(article.is_expanded)
    }

    pub fn set_expanded(&self, topic_id: &str, article_id: &str, expanded: bool) -> Result<(), FeedError> {
        let mut state = self.state();
        state.article_mut(topic_id, article_id)?.is_expanded = expanded;
        Ok(())
    }

    pub fn select_topic(&self, topic_id: &str) -> Result<(), FeedError> {
        let mut state = self.state();
        if !state.is_subscribed(topic_id) {
            return Err(FeedError::UnknownTopic(topic_id.to_string()));
        }
        for topic in state.topics.iter_mut() {
            topic.is_selected = topic.topic_id == topic_id;
        }
        Ok(())
    }

    pub fn select_summarization_length(&self, length: SummarizationLength) {
        self.state().selected_length = length;
    }

    pub fn selected_length(&self) -> SummarizationLength {
        self.state().selected_length
    }

    pub fn topics(&self) -> Vec<Topic> {
        self.state().topics.clone()
    }

    pub fn has_subscribed_topics(&self) -> bool {
        !self.state().topics.is_empty()
    }

    pub fn selected_topic(&self) -> Option<Topic> {
        self.state().selected_topic().cloned()
    }

    pub fn selected_topic_name(&self) -> String {
        self.selected_topic().map(|topic| topic.name).unwrap_or_default()
    }

    /// Snapshot of a topic's page.
    pub fn page(&self, topic_id: &str) -> Option<FeedPage> {
        self.state().pages.get(topic_id).cloned()
    }

    pub fn is_refreshing(&self, topic_id: &str) -> bool {
        self.activity(topic_id) == Some(Activity::Refreshing)
    }

    pub fn is_loading_more(&self, topic_id: &str) -> bool {
        self.activity(topic_id) == Some(Activity::LoadingMore)
    }

    fn activity(&self, topic_id: &str) -> Option<Activity> {
        self.state().pages.get(topic_id).and_then(|page| page.activity)
    }

    pub fn sections(&self, topic_id: &str) -> Vec<DateSection> {
        self.state()
            .pages
            .get(topic_id)
            .map(FeedPage::sections)
            .unwrap_or_default()
    }

    pub fn selected_sections(&self) -> Vec<DateSection> {
        let state = self.state();
        state
            .selected_topic()
            .and_then(|topic| state.pages.get(&topic.topic_id))
            .map(FeedPage::sections)
            .unwrap_or_default()
    }
}
