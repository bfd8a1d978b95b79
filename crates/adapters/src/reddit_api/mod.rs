//! Reddit API adapters

mod client;

pub use client::{
    DEFAULT_API_BASE_URL, DEFAULT_AUTH_BASE_URL, MAX_PAGE_SIZE, RedditApiClient, RedditConnector,
};

use async_trait::async_trait;
use reddit_face_domain::{
    Connector, Credentials, ListingPage, ListingSort, RedditClient, RemoteError, SubmitKind,
    SubmitRequest, Submission, Subreddit,
};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use time::OffsetDateTime;

const STUB_SUBSCRIBERS: u64 = 1000;

/// Submissions shared by every client a [`StubConnector`] hands out
struct StubStore {
    submissions: Mutex<Vec<Submission>>,
    next_id: AtomicU64,
}

/// In-memory Reddit for offline runs and tests
pub struct StubRedditClient {
    store: Arc<StubStore>,
    closed: AtomicBool,
}

impl StubRedditClient {
    /// Create an empty stub
    pub fn new() -> Self {
        Self::with_submissions(vec![])
    }

    /// Create a stub with predefined submissions
    pub fn with_submissions(submissions: Vec<Submission>) -> Self {
        Self::on_store(Arc::new(StubStore {
            submissions: Mutex::new(submissions),
            next_id: AtomicU64::new(1),
        }))
    }

    fn on_store(store: Arc<StubStore>) -> Self {
        Self {
            store,
            closed: AtomicBool::new(false),
        }
    }

    /// Get all submissions, including the ones created through `submit`
    pub fn submissions(&self) -> Vec<Submission> {
        self.store
            .submissions
            .lock()
            .map(|submissions| submissions.clone())
            .unwrap_or_default()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> Result<(), RemoteError> {
        if self.is_closed() {
            Err(RemoteError::Closed)
        } else {
            Ok(())
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Vec<Submission>>, RemoteError> {
        self.store
            .submissions
            .lock()
            .map_err(|_| RemoteError::Api("Stub store is poisoned".to_string()))
    }
}

impl Default for StubRedditClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RedditClient for StubRedditClient {
    async fn subreddit(&self, name: &str) -> Result<Subreddit, RemoteError> {
        self.ensure_open()?;
        Ok(Subreddit {
            name: name.to_string(),
            subscribers: Some(STUB_SUBSCRIBERS),
        })
    }

    async fn submission(&self, native_id: &str) -> Result<Submission, RemoteError> {
        self.ensure_open()?;
        self.lock()?
            .iter()
            .find(|submission| submission.id == native_id)
            .cloned()
            .ok_or_else(|| RemoteError::NotFound(format!("t3_{}", native_id)))
    }

    async fn submit(&self, request: &SubmitRequest) -> Result<Submission, RemoteError> {
        self.ensure_open()?;

        let id = format!("stub{}", self.store.next_id.fetch_add(1, Ordering::SeqCst));
        let (is_self, selftext, url) = match &request.kind {
            SubmitKind::SelfPost { text } => (true, text.clone(), None),
            SubmitKind::Link { url } => (false, String::new(), Some(url.clone())),
        };

        let submission = Submission {
            permalink: format!("/r/{}/comments/{}/", request.subreddit, id),
            id,
            subreddit: request.subreddit.clone(),
            title: request.title.clone(),
            selftext,
            url,
            author: Some("stub".to_string()),
            is_self,
            score: 1,
            upvote_ratio: 1.0,
            num_comments: 0,
            subreddit_subscribers: Some(STUB_SUBSCRIBERS),
            created_at: OffsetDateTime::now_utc(),
        };

        self.lock()?.push(submission.clone());
        tracing::info!(native_id = %submission.id, "Stub submission created");
        Ok(submission)
    }

    async fn listing(
        &self,
        subreddit: &Subreddit,
        sort: ListingSort,
        after: Option<&str>,
        limit: u32,
    ) -> Result<ListingPage, RemoteError> {
        self.ensure_open()?;

        let mut items: Vec<Submission> = self
            .lock()?
            .iter()
            .filter(|submission| submission.subreddit.eq_ignore_ascii_case(&subreddit.name))
            .cloned()
            .collect();

        match sort {
            ListingSort::New => items.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
            ListingSort::Hot => items.sort_by(|a, b| b.score.cmp(&a.score)),
        }

        let start = match after {
            Some(cursor) => {
                let id = cursor.strip_prefix("t3_").unwrap_or(cursor);
                items
                    .iter()
                    .position(|submission| submission.id == id)
                    .map(|index| index + 1)
                    .unwrap_or(items.len())
            }
            None => 0,
        };

        let page: Vec<Submission> = items
            .into_iter()
            .skip(start)
            .take(limit.max(1) as usize)
            .collect();
        let after = if page.len() == limit.max(1) as usize {
            page.last().map(|submission| format!("t3_{}", submission.id))
        } else {
            None
        };

        Ok(ListingPage { items: page, after })
    }

    async fn close(&self) -> Result<(), RemoteError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Hands out [`StubRedditClient`]s sharing one in-memory subreddit
pub struct StubConnector {
    store: Arc<StubStore>,
}

impl StubConnector {
    pub fn new() -> Self {
        Self::with_submissions(vec![])
    }

    pub fn with_submissions(submissions: Vec<Submission>) -> Self {
        Self {
            store: Arc::new(StubStore {
                submissions: Mutex::new(submissions),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// A stub seeded with a handful of posts in `subreddit`
    pub fn sample(subreddit: &str) -> Self {
        Self::with_submissions(sample_submissions(subreddit))
    }
}

impl Default for StubConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Connector for StubConnector {
    async fn connect(
        &self,
        credentials: &Credentials,
    ) -> Result<Arc<dyn RedditClient>, RemoteError> {
        tracing::info!(user_agent = %credentials.user_agent, "Connected to stub Reddit");
        Ok(Arc::new(StubRedditClient::on_store(self.store.clone())))
    }
}

/// Deterministic posts: two self posts, an image link and an article link
fn sample_submissions(subreddit: &str) -> Vec<Submission> {
    let base = OffsetDateTime::UNIX_EPOCH + time::Duration::seconds(1_704_067_200);

    let post = |index: i64, id: &str, title: &str, selftext: &str, url: Option<&str>, score| {
        Submission {
            id: id.to_string(),
            subreddit: subreddit.to_string(),
            title: title.to_string(),
            selftext: selftext.to_string(),
            url: url.map(String::from),
            permalink: format!("/r/{}/comments/{}/", subreddit, id),
            author: Some("stub".to_string()),
            is_self: url.is_none(),
            score,
            upvote_ratio: 0.9,
            num_comments: 0,
            subreddit_subscribers: Some(STUB_SUBSCRIBERS),
            created_at: base + time::Duration::hours(index),
        }
    };

    vec![
        post(0, "sample1", "First post", "Hello from the stub", None, 12),
        post(1, "sample2", "A picture", "", Some("https://i.redd.it/sample.png"), 30),
        post(2, "sample3", "An article", "", Some("https://example.com/article"), 5),
        post(3, "sample4", "Latest post", "Newest text", None, 2),
    ]
}
