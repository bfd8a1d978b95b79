//! Scrapers walking subreddit listings

use futures::stream::BoxStream;
use reddit_face_domain::{
    ListingSort, Params, RedditClient, Scraper, Strategy, StrategyError, Submission, Subreddit,
    parse_params,
};
use serde::Deserialize;
use std::sync::Arc;
use time::OffsetDateTime;

use crate::reddit_api::MAX_PAGE_SIZE;

fn default_page_size() -> u32 {
    MAX_PAGE_SIZE
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ListingParams {
    #[serde(default = "default_page_size")]
    page_size: u32,
}

/// Pages through a listing, keeping posts created strictly between `after`
/// and `before`.
///
/// The `new` listing is newest first, so it stops at the first post not
/// newer than `after`. Other orders are filtered to the end.
pub struct ListingScraper {
    sort: ListingSort,
    page_size: u32,
}

impl ListingScraper {
    pub const NEW: &'static str = "new";
    pub const HOT: &'static str = "hot";

    pub fn from_params(sort: ListingSort, params: &Params) -> Result<Self, StrategyError> {
        let params: ListingParams = parse_params(params)?;

        if params.page_size == 0 || params.page_size > MAX_PAGE_SIZE {
            return Err(StrategyError::InvalidParameters(format!(
                "page_size must be between 1 and {}",
                MAX_PAGE_SIZE
            )));
        }

        Ok(Self {
            sort,
            page_size: params.page_size,
        })
    }
}

impl Strategy for ListingScraper {
    fn category(&self) -> &str {
        match self.sort {
            ListingSort::New => Self::NEW,
            ListingSort::Hot => Self::HOT,
        }
    }
}

impl Scraper for ListingScraper {
    fn scrap(
        &self,
        client: Arc<dyn RedditClient>,
        subreddit: Subreddit,
        before: Option<OffsetDateTime>,
        after: Option<OffsetDateTime>,
    ) -> BoxStream<'static, Result<Submission, StrategyError>> {
        let sort = self.sort;
        let page_size = self.page_size;

        let stream = async_stream::stream! {
            let mut cursor: Option<String> = None;

            loop {
                let page = match client
                    .listing(&subreddit, sort, cursor.as_deref(), page_size)
                    .await
                {
                    Ok(page) => page,
                    Err(error) => {
                        yield Err(StrategyError::from(error));
                        return;
                    }
                };

                for submission in page.items {
                    if after.is_some_and(|after| submission.created_at <= after) {
                        if sort == ListingSort::New {
                            return;
                        }
                        continue;
                    }
                    if before.is_some_and(|before| submission.created_at >= before) {
                        continue;
                    }
                    yield Ok(submission);
                }

                match page.after {
                    Some(next) => cursor = Some(next),
                    None => break,
                }
            }
        };

        Box::pin(stream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reddit_api::StubRedditClient;
    use futures::StreamExt;
    use reddit_face_domain::{ListingPage, RemoteError, SubmitRequest};
    use serde_json::json;

    fn at(hours: i64) -> OffsetDateTime {
        OffsetDateTime::UNIX_EPOCH + time::Duration::hours(hours)
    }

    fn submission(id: &str, hours: i64, score: i64) -> Submission {
        Submission {
            id: id.to_string(),
            subreddit: "rust".to_string(),
            title: id.to_string(),
            selftext: String::new(),
            url: None,
            permalink: format!("/r/rust/comments/{}/", id),
            author: None,
            is_self: true,
            score,
            upvote_ratio: 1.0,
            num_comments: 0,
            subreddit_subscribers: None,
            created_at: at(hours),
        }
    }

    fn subreddit() -> Subreddit {
        Subreddit {
            name: "rust".to_string(),
            subscribers: None,
        }
    }

    fn scraper(sort: ListingSort, page_size: u32) -> ListingScraper {
        let mut params = Params::new();
        params.insert("page_size".to_string(), json!(page_size));
        ListingScraper::from_params(sort, &params).unwrap()
    }

    fn client() -> Arc<dyn RedditClient> {
        Arc::new(StubRedditClient::with_submissions(vec![
            submission("a", 1, 50),
            submission("b", 2, 10),
            submission("c", 3, 30),
            submission("d", 4, 20),
            submission("e", 5, 40),
        ]))
    }

    async fn ids(
        scraper: &ListingScraper,
        client: Arc<dyn RedditClient>,
        before: Option<OffsetDateTime>,
        after: Option<OffsetDateTime>,
    ) -> Vec<String> {
        scraper
            .scrap(client, subreddit(), before, after)
            .map(|item| item.unwrap().id)
            .collect()
            .await
    }

    #[tokio::test]
    async fn test_new_pages_through_everything() {
        let ids = ids(&scraper(ListingSort::New, 2), client(), None, None).await;
        assert_eq!(ids, vec!["e", "d", "c", "b", "a"]);
    }

    #[tokio::test]
    async fn test_new_respects_time_window() {
        let ids = ids(&scraper(ListingSort::New, 2), client(), Some(at(5)), Some(at(2))).await;
        assert_eq!(ids, vec!["d", "c"]);
    }

    #[tokio::test]
    async fn test_hot_filters_without_stopping() {
        let ids = ids(&scraper(ListingSort::Hot, 2), client(), None, Some(at(2))).await;
        assert_eq!(ids, vec!["e", "c", "d"]);
    }

    struct FailingClient;

    #[async_trait::async_trait]
    impl RedditClient for FailingClient {
        async fn subreddit(&self, _name: &str) -> Result<Subreddit, RemoteError> {
            Err(RemoteError::Network("down".to_string()))
        }

        async fn submission(&self, _native_id: &str) -> Result<Submission, RemoteError> {
            Err(RemoteError::Network("down".to_string()))
        }

        async fn submit(&self, _request: &SubmitRequest) -> Result<Submission, RemoteError> {
            Err(RemoteError::Network("down".to_string()))
        }

        async fn listing(
            &self,
            _subreddit: &Subreddit,
            _sort: ListingSort,
            _after: Option<&str>,
            _limit: u32,
        ) -> Result<ListingPage, RemoteError> {
            Err(RemoteError::Network("down".to_string()))
        }

        async fn close(&self) -> Result<(), RemoteError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_listing_failure_ends_stream_with_error() {
        let items: Vec<_> = scraper(ListingSort::New, 10)
            .scrap(Arc::new(FailingClient), subreddit(), None, None)
            .collect()
            .await;

        assert_eq!(items.len(), 1);
        assert!(matches!(
            items[0],
            Err(StrategyError::Remote(RemoteError::Network(_)))
        ));
    }

    #[test]
    fn test_page_size_is_validated() {
        let mut params = Params::new();
        params.insert("page_size".to_string(), json!(500));

        assert!(matches!(
            ListingScraper::from_params(ListingSort::New, &params),
            Err(StrategyError::InvalidParameters(_))
        ));
    }
}
