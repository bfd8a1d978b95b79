//! Reddit OAuth API client

use async_trait::async_trait;
use reddit_face_domain::{
    Connector, Credentials, ListingPage, ListingSort, RedditClient, RemoteError, SubmitKind,
    SubmitRequest, Submission, Subreddit,
};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use time::OffsetDateTime;
use tokio::sync::Mutex;

pub const DEFAULT_API_BASE_URL: &str = "https://oauth.reddit.com";
pub const DEFAULT_AUTH_BASE_URL: &str = "https://www.reddit.com";

/// Refresh the access token this long before Reddit expires it
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Largest page Reddit serves for a listing
pub const MAX_PAGE_SIZE: u32 = 100;

struct AccessToken {
    value: SecretString,
    expires_at: Instant,
}

/// Reddit API client authenticating with a refresh token
pub struct RedditApiClient {
    http: Client,
    client_id: String,
    client_secret: SecretString,
    refresh_token: SecretString,
    api_base_url: String,
    auth_base_url: String,
    ratelimit: Duration,
    token: Mutex<Option<AccessToken>>,
    closed: AtomicBool,
}

impl RedditApiClient {
    pub fn new(credentials: &Credentials) -> Result<Self, RemoteError> {
        Self::with_base_urls(
            credentials,
            DEFAULT_API_BASE_URL.to_string(),
            DEFAULT_AUTH_BASE_URL.to_string(),
        )
    }

    pub fn with_base_urls(
        credentials: &Credentials,
        api_base_url: String,
        auth_base_url: String,
    ) -> Result<Self, RemoteError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(credentials.user_agent.clone())
            .build()
            .map_err(|e| RemoteError::Network(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            client_id: credentials.client_id.clone(),
            client_secret: SecretString::new(credentials.client_secret.expose_secret().into()),
            refresh_token: SecretString::new(credentials.refresh_token.expose_secret().into()),
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            auth_base_url: auth_base_url.trim_end_matches('/').to_string(),
            ratelimit: Duration::from_secs(credentials.ratelimit_seconds),
            token: Mutex::new(None),
            closed: AtomicBool::new(false),
        })
    }

    /// Current access token, exchanging the refresh token when the cached
    /// one is missing or about to expire
    async fn access_token(&self) -> Result<SecretString, RemoteError> {
        let mut cached = self.token.lock().await;

        if let Some(token) = cached.as_ref() {
            if Instant::now() + TOKEN_EXPIRY_MARGIN < token.expires_at {
                return Ok(SecretString::new(token.value.expose_secret().into()));
            }
        }

        tracing::debug!("Refreshing Reddit access token");

        let url = format!("{}/api/v1/access_token", self.auth_base_url);
        let response = self
            .http
            .post(&url)
            .basic_auth(&self.client_id, Some(self.client_secret.expose_secret()))
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", self.refresh_token.expose_secret()),
            ])
            .send()
            .await
            .map_err(|e| RemoteError::Network(e.to_string()))?;

        if matches!(
            response.status(),
            StatusCode::UNAUTHORIZED | StatusCode::BAD_REQUEST
        ) {
            return Err(RemoteError::Auth("Invalid client credentials".to_string()));
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteError::Api(format!(
                "Token exchange returned {}: {}",
                status, body
            )));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| RemoteError::Api(e.to_string()))?;

        // A rejected refresh token still comes back as 200
        if let Some(error) = body.error {
            return Err(RemoteError::Auth(format!("Token exchange failed: {}", error)));
        }

        let value = body
            .access_token
            .ok_or_else(|| RemoteError::Api("Token response has no access_token".to_string()))?;

        let token = AccessToken {
            value: SecretString::new(value.into()),
            expires_at: Instant::now() + Duration::from_secs(body.expires_in.unwrap_or(3600)),
        };
        let current = SecretString::new(token.value.expose_secret().into());
        *cached = Some(token);

        Ok(current)
    }

    /// Send an authenticated request and map HTTP failures.
    ///
    /// A 429 whose reset is within the configured rate-limit budget is
    /// waited out and retried once.
    async fn send<F>(&self, build: F) -> Result<Response, RemoteError>
    where
        F: Fn(&Client) -> RequestBuilder + Send + Sync,
    {
        let mut retried = false;

        loop {
            if self.closed.load(Ordering::SeqCst) {
                return Err(RemoteError::Closed);
            }

            let token = self.access_token().await?;
            let response = build(&self.http)
                .bearer_auth(token.expose_secret())
                .send()
                .await
                .map_err(|e| RemoteError::Network(e.to_string()))?;

            match response.status() {
                StatusCode::UNAUTHORIZED => {
                    self.token.lock().await.take();
                    return Err(RemoteError::Auth("Access token rejected".to_string()));
                }
                StatusCode::FORBIDDEN => {
                    return Err(RemoteError::Auth(format!(
                        "Access to {} is forbidden",
                        response.url().path()
                    )));
                }
                StatusCode::NOT_FOUND => {
                    return Err(RemoteError::NotFound(response.url().path().to_string()));
                }
                StatusCode::TOO_MANY_REQUESTS => {
                    let wait = rate_limit_reset(&response);
                    match wait {
                        Some(wait) if !retried && wait <= self.ratelimit => {
                            tracing::warn!(wait_secs = wait.as_secs_f64(), "Rate limited, waiting");
                            tokio::time::sleep(wait).await;
                            retried = true;
                        }
                        _ => return Err(RemoteError::RateLimited(wait)),
                    }
                }
                status if !status.is_success() => {
                    let body = response.text().await.unwrap_or_default();
                    return Err(RemoteError::Api(format!(
                        "Reddit returned {}: {}",
                        status, body
                    )));
                }
                _ => return Ok(response),
            }
        }
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, RemoteError> {
        let response = self
            .send(|http| http.get(url).query(&[("raw_json", "1")]).query(query))
            .await?;

        response
            .json()
            .await
            .map_err(|e| RemoteError::Api(format!("Unexpected response from {}: {}", url, e)))
    }
}

/// Seconds until the rate limit window resets, from `x-ratelimit-reset`
fn rate_limit_reset(response: &Response) -> Option<Duration> {
    response
        .headers()
        .get("x-ratelimit-reset")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .map(Duration::from_secs_f64)
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    expires_in: Option<u64>,
    error: Option<String>,
}

#[derive(Deserialize)]
struct Thing<T> {
    kind: String,
    data: T,
}

#[derive(Deserialize)]
struct Listing {
    children: Vec<Thing<RawSubmission>>,
    after: Option<String>,
}

#[derive(Deserialize)]
struct RawSubreddit {
    display_name: String,
    subscribers: Option<u64>,
}

#[derive(Deserialize)]
struct RawSubmission {
    id: String,
    subreddit: String,
    title: String,
    #[serde(default)]
    selftext: String,
    url: Option<String>,
    permalink: String,
    author: Option<String>,
    is_self: bool,
    score: i64,
    #[serde(default)]
    upvote_ratio: f64,
    #[serde(default)]
    num_comments: u64,
    subreddit_subscribers: Option<u64>,
    created_utc: f64,
}

impl RawSubmission {
    fn into_submission(self) -> Result<Submission, RemoteError> {
        let created_at = OffsetDateTime::from_unix_timestamp(self.created_utc as i64)
            .map_err(|e| RemoteError::Api(format!("Invalid created_utc: {}", e)))?;

        Ok(Submission {
            id: self.id,
            subreddit: self.subreddit,
            title: self.title,
            selftext: self.selftext,
            url: self.url,
            permalink: self.permalink,
            author: self.author,
            is_self: self.is_self,
            score: self.score,
            upvote_ratio: self.upvote_ratio,
            num_comments: self.num_comments,
            subreddit_subscribers: self.subreddit_subscribers,
            created_at,
        })
    }
}

impl Listing {
    fn into_page(self) -> Result<ListingPage, RemoteError> {
        let items = self
            .children
            .into_iter()
            .filter(|thing| thing.kind == "t3")
            .map(|thing| thing.data.into_submission())
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ListingPage {
            items,
            after: self.after,
        })
    }
}

#[derive(Deserialize)]
struct SubmitResponse {
    json: SubmitJson,
}

#[derive(Deserialize)]
struct SubmitJson {
    #[serde(default)]
    errors: Vec<Value>,
    data: Option<SubmitData>,
}

#[derive(Deserialize)]
struct SubmitData {
    id: String,
}

#[async_trait]
impl RedditClient for RedditApiClient {
    async fn subreddit(&self, name: &str) -> Result<Subreddit, RemoteError> {
        let url = format!("{}/r/{}/about", self.api_base_url, name);
        let thing: Thing<RawSubreddit> = self.get_json(&url, &[]).await?;

        // Unknown subreddits may come back as a search listing
        if thing.kind != "t5" {
            return Err(RemoteError::NotFound(format!("r/{}", name)));
        }

        tracing::debug!(subreddit = %thing.data.display_name, "Resolved subreddit");
        Ok(Subreddit {
            name: thing.data.display_name,
            subscribers: thing.data.subscribers,
        })
    }

    async fn submission(&self, native_id: &str) -> Result<Submission, RemoteError> {
        let url = format!("{}/by_id/t3_{}", self.api_base_url, native_id);
        let listing: Thing<Listing> = self.get_json(&url, &[]).await?;

        listing
            .data
            .into_page()?
            .items
            .into_iter()
            .next()
            .ok_or_else(|| RemoteError::NotFound(format!("t3_{}", native_id)))
    }

    async fn submit(&self, request: &SubmitRequest) -> Result<Submission, RemoteError> {
        tracing::info!(subreddit = %request.subreddit, title = %request.title, "Submitting to Reddit");

        let mut form = vec![
            ("api_type", "json"),
            ("resubmit", "true"),
            ("sr", request.subreddit.as_str()),
            ("title", request.title.as_str()),
        ];
        match &request.kind {
            SubmitKind::SelfPost { text } => {
                form.push(("kind", "self"));
                form.push(("text", text.as_str()));
            }
            SubmitKind::Link { url } => {
                form.push(("kind", "link"));
                form.push(("url", url.as_str()));
            }
        }

        let url = format!("{}/api/submit", self.api_base_url);
        let response = self.send(|http| http.post(&url).form(&form)).await?;

        let body: SubmitResponse = response
            .json()
            .await
            .map_err(|e| RemoteError::Api(format!("Unexpected submit response: {}", e)))?;

        if !body.json.errors.is_empty() {
            return Err(RemoteError::Api(format!(
                "Submit rejected: {}",
                Value::Array(body.json.errors)
            )));
        }

        let data = body
            .json
            .data
            .ok_or_else(|| RemoteError::Api("Submit response has no data".to_string()))?;

        self.submission(&data.id).await
    }

    async fn listing(
        &self,
        subreddit: &Subreddit,
        sort: ListingSort,
        after: Option<&str>,
        limit: u32,
    ) -> Result<ListingPage, RemoteError> {
        let url = format!("{}/r/{}/{}", self.api_base_url, subreddit.name, sort.as_str());

        let mut query = vec![("limit", limit.clamp(1, MAX_PAGE_SIZE).to_string())];
        if let Some(after) = after {
            query.push(("after", after.to_string()));
        }

        let listing: Thing<Listing> = self.get_json(&url, &query).await?;
        let page = listing.data.into_page()?;

        tracing::debug!(
            subreddit = %subreddit.name,
            sort = sort.as_str(),
            count = page.items.len(),
            after = ?page.after,
            "Fetched listing page"
        );
        Ok(page)
    }

    async fn close(&self) -> Result<(), RemoteError> {
        self.closed.store(true, Ordering::SeqCst);
        self.token.lock().await.take();
        Ok(())
    }
}

/// Opens authenticated [`RedditApiClient`]s
pub struct RedditConnector {
    api_base_url: String,
    auth_base_url: String,
}

impl RedditConnector {
    pub fn new() -> Self {
        Self::with_base_urls(
            DEFAULT_API_BASE_URL.to_string(),
            DEFAULT_AUTH_BASE_URL.to_string(),
        )
    }

    pub fn with_base_urls(api_base_url: String, auth_base_url: String) -> Self {
        Self {
            api_base_url,
            auth_base_url,
        }
    }
}

impl Default for RedditConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Connector for RedditConnector {
    async fn connect(
        &self,
        credentials: &Credentials,
    ) -> Result<Arc<dyn RedditClient>, RemoteError> {
        let client = RedditApiClient::with_base_urls(
            credentials,
            self.api_base_url.clone(),
            self.auth_base_url.clone(),
        )?;

        // Fail early on bad credentials
        client.access_token().await?;
        tracing::info!(client_id = %credentials.client_id, "Connected to Reddit");

        Ok(Arc::new(client))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn credentials(ratelimit_seconds: u64) -> Credentials {
        Credentials {
            client_id: "client".to_string(),
            client_secret: SecretString::new("secret".into()),
            refresh_token: SecretString::new("refresh".into()),
            user_agent: "reddit-face-test/0.1".to_string(),
            ratelimit_seconds,
        }
    }

    fn client(server: &MockServer, ratelimit_seconds: u64) -> RedditApiClient {
        RedditApiClient::with_base_urls(&credentials(ratelimit_seconds), server.uri(), server.uri())
            .unwrap()
    }

    async fn mount_token(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/api/v1/access_token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "access-token",
                "token_type": "bearer",
                "expires_in": 86400,
                "scope": "*"
            })))
            .mount(server)
            .await;
    }

    fn raw_submission(id: &str) -> Value {
        json!({
            "kind": "t3",
            "data": {
                "id": id,
                "subreddit": "rust",
                "title": format!("Title {}", id),
                "selftext": "Body",
                "url": format!("https://www.reddit.com/r/rust/comments/{}/title/", id),
                "permalink": format!("/r/rust/comments/{}/title/", id),
                "author": "ferris",
                "is_self": true,
                "score": 42,
                "upvote_ratio": 0.97,
                "num_comments": 3,
                "subreddit_subscribers": 300000,
                "created_utc": 1705320000.0
            }
        })
    }

    fn listing(children: Vec<Value>, after: Option<&str>) -> Value {
        json!({
            "kind": "Listing",
            "data": {"children": children, "after": after}
        })
    }

    #[tokio::test]
    async fn test_subreddit_about() {
        let server = MockServer::start().await;
        mount_token(&server).await;

        Mock::given(method("GET"))
            .and(path("/r/rust/about"))
            .and(header("Authorization", "Bearer access-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "kind": "t5",
                "data": {"display_name": "rust", "subscribers": 300000}
            })))
            .mount(&server)
            .await;

        let subreddit = client(&server, 0).subreddit("rust").await.unwrap();

        assert_eq!(subreddit.name, "rust");
        assert_eq!(subreddit.subscribers, Some(300000));
    }

    #[tokio::test]
    async fn test_access_token_is_cached() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/v1/access_token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "access-token",
                "expires_in": 3600
            })))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/by_id/t3_abc"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(listing(vec![raw_submission("abc")], None)),
            )
            .expect(2)
            .mount(&server)
            .await;

        let client = client(&server, 0);
        client.submission("abc").await.unwrap();
        let submission = client.submission("abc").await.unwrap();

        assert_eq!(submission.id, "abc");
        assert_eq!(submission.score, 42);
        assert_eq!(submission.created_at.unix_timestamp(), 1705320000);
    }

    #[tokio::test]
    async fn test_missing_submission_is_not_found() {
        let server = MockServer::start().await;
        mount_token(&server).await;

        Mock::given(method("GET"))
            .and(path("/by_id/t3_gone"))
            .respond_with(ResponseTemplate::new(200).set_body_json(listing(vec![], None)))
            .mount(&server)
            .await;

        let result = client(&server, 0).submission("gone").await;
        assert!(matches!(result, Err(RemoteError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_http_errors_are_mapped() {
        let server = MockServer::start().await;
        mount_token(&server).await;

        Mock::given(method("GET"))
            .and(path("/r/private/about"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/r/nowhere/about"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/r/broken/about"))
            .respond_with(ResponseTemplate::new(500).set_body_string("oops"))
            .mount(&server)
            .await;

        let client = client(&server, 0);
        assert!(matches!(
            client.subreddit("private").await,
            Err(RemoteError::Auth(_))
        ));
        assert!(matches!(
            client.subreddit("nowhere").await,
            Err(RemoteError::NotFound(_))
        ));
        assert!(matches!(
            client.subreddit("broken").await,
            Err(RemoteError::Api(_))
        ));
    }

    #[tokio::test]
    async fn test_rate_limit_beyond_budget_fails() {
        let server = MockServer::start().await;
        mount_token(&server).await;

        Mock::given(method("GET"))
            .and(path("/r/rust/about"))
            .respond_with(ResponseTemplate::new(429).insert_header("x-ratelimit-reset", "120"))
            .mount(&server)
            .await;

        let result = client(&server, 5).subreddit("rust").await;

        assert!(matches!(
            result,
            Err(RemoteError::RateLimited(Some(wait))) if wait == Duration::from_secs(120)
        ));
    }

    #[tokio::test]
    async fn test_rate_limit_within_budget_is_retried() {
        let server = MockServer::start().await;
        mount_token(&server).await;

        Mock::given(method("GET"))
            .and(path("/r/rust/about"))
            .respond_with(ResponseTemplate::new(429).insert_header("x-ratelimit-reset", "0"))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/r/rust/about"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "kind": "t5",
                "data": {"display_name": "rust", "subscribers": 1}
            })))
            .mount(&server)
            .await;

        let subreddit = client(&server, 5).subreddit("rust").await.unwrap();
        assert_eq!(subreddit.subscribers, Some(1));
    }

    #[tokio::test]
    async fn test_listing_pagination() {
        let server = MockServer::start().await;
        mount_token(&server).await;

        Mock::given(method("GET"))
            .and(path("/r/rust/new"))
            .and(query_param("limit", "2"))
            .and(query_param("after", "t3_b"))
            .respond_with(ResponseTemplate::new(200).set_body_json(listing(
                vec![raw_submission("c"), raw_submission("d")],
                Some("t3_d"),
            )))
            .mount(&server)
            .await;

        let subreddit = Subreddit {
            name: "rust".to_string(),
            subscribers: None,
        };
        let page = client(&server, 0)
            .listing(&subreddit, ListingSort::New, Some("t3_b"), 2)
            .await
            .unwrap();

        let ids: Vec<_> = page.items.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "d"]);
        assert_eq!(page.after.as_deref(), Some("t3_d"));
    }

    #[tokio::test]
    async fn test_submit_self_post() {
        let server = MockServer::start().await;
        mount_token(&server).await;

        Mock::given(method("POST"))
            .and(path("/api/submit"))
            .and(body_string_contains("kind=self"))
            .and(body_string_contains("sr=rust"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "json": {
                    "errors": [],
                    "data": {"id": "new1", "name": "t3_new1", "url": "https://www.reddit.com/r/rust/comments/new1/title/"}
                }
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/by_id/t3_new1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(listing(vec![raw_submission("new1")], None)),
            )
            .mount(&server)
            .await;

        let request = SubmitRequest {
            subreddit: "rust".to_string(),
            title: "Title".to_string(),
            kind: SubmitKind::SelfPost {
                text: "Body".to_string(),
            },
        };
        let submission = client(&server, 0).submit(&request).await.unwrap();

        assert_eq!(submission.id, "new1");
    }

    #[tokio::test]
    async fn test_submit_errors_are_reported() {
        let server = MockServer::start().await;
        mount_token(&server).await;

        Mock::given(method("POST"))
            .and(path("/api/submit"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "json": {"errors": [["SUBREDDIT_NOEXIST", "that subreddit doesn't exist", "sr"]]}
            })))
            .mount(&server)
            .await;

        let request = SubmitRequest {
            subreddit: "nowhere".to_string(),
            title: "Title".to_string(),
            kind: SubmitKind::Link {
                url: "https://i.redd.it/a.png".to_string(),
            },
        };
        let result = client(&server, 0).submit(&request).await;

        assert!(matches!(result, Err(RemoteError::Api(message)) if message.contains("SUBREDDIT_NOEXIST")));
    }

    #[tokio::test]
    async fn test_closed_client_refuses_requests() {
        let server = MockServer::start().await;
        mount_token(&server).await;

        let client = client(&server, 0);
        client.close().await.unwrap();

        assert!(matches!(
            client.subreddit("rust").await,
            Err(RemoteError::Closed)
        ));
    }

    #[tokio::test]
    async fn test_connect_rejects_bad_refresh_token() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/v1/access_token"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"error": "invalid_grant"})),
            )
            .mount(&server)
            .await;

        let connector = RedditConnector::with_base_urls(server.uri(), server.uri());
        let result = connector.connect(&credentials(0)).await;

        assert!(matches!(result, Err(RemoteError::Auth(_))));
    }
}
