//! Posters

use async_trait::async_trait;
use reddit_face_domain::{
    Params, PostData, Poster, RedditClient, Strategy, StrategyError, SubmitKind, SubmitRequest,
    Submission, Subreddit, parse_params,
};
use serde::Deserialize;

/// Reddit rejects longer titles
pub const MAX_TITLE_CHARS: usize = 300;

const UNTITLED: &str = "Untitled";

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct BasicParams {
    /// Fixed title; otherwise the first line of the text is used
    #[serde(default)]
    title: Option<String>,
}

/// Self posts for text, link posts for images
pub struct BasicPoster {
    title: Option<String>,
}

impl BasicPoster {
    pub const CATEGORY: &'static str = "basic";

    pub fn from_params(params: &Params) -> Result<Self, StrategyError> {
        let params: BasicParams = parse_params(params)?;

        if let Some(title) = &params.title {
            if title.trim().is_empty() {
                return Err(StrategyError::InvalidParameters(
                    "title must not be blank".to_string(),
                ));
            }
        }

        Ok(Self {
            title: params.title.map(|title| truncate(title.trim())),
        })
    }

    /// Build the submit request for a post
    fn request(
        &self,
        subreddit: &Subreddit,
        post: &PostData,
    ) -> Result<SubmitRequest, StrategyError> {
        let text = post.text.as_deref().map(str::trim).unwrap_or_default();

        let (title, body) = match &self.title {
            Some(title) => (title.clone(), text.to_string()),
            None => split_title(text),
        };

        let kind = match &post.image {
            Some(image) => SubmitKind::Link { url: image.clone() },
            None if text.is_empty() => {
                return Err(StrategyError::UnsupportedContent(
                    "nothing to post".to_string(),
                ));
            }
            None => SubmitKind::SelfPost { text: body },
        };

        Ok(SubmitRequest {
            subreddit: subreddit.name.clone(),
            title,
            kind,
        })
    }
}

/// First non-empty line as title, the rest as body
fn split_title(text: &str) -> (String, String) {
    let mut lines = text.lines();
    let title = lines
        .by_ref()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or(UNTITLED);
    let body = lines.collect::<Vec<_>>().join("\n").trim().to_string();

    (truncate(title), body)
}

fn truncate(title: &str) -> String {
    title.chars().take(MAX_TITLE_CHARS).collect()
}

#[async_trait]
impl Strategy for BasicPoster {
    fn category(&self) -> &str {
        Self::CATEGORY
    }
}

#[async_trait]
impl Poster for BasicPoster {
    async fn post(
        &self,
        client: &dyn RedditClient,
        subreddit: &Subreddit,
        post: &PostData,
    ) -> Result<Submission, StrategyError> {
        let request = self.request(subreddit, post)?;
        tracing::debug!(
            subreddit = %request.subreddit,
            title = %request.title,
            link = matches!(request.kind, SubmitKind::Link { .. }),
            "Posting"
        );

        Ok(client.submit(&request).await?)
    }
}
