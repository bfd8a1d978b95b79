//! Domain models and value objects

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::ports::StrategyError;

/// Parameters handed to a strategy factory
pub type Params = Map<String, Value>;

/// Parameters for every category of one slot, keyed by category name
pub type CategoryParams = BTreeMap<String, Params>;

/// Stable 128-bit identifier of a post.
///
/// Derived from the Reddit base-36 submission id by reading it as an
/// integer, so the conversion is exact in both directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PostId(Uuid);

impl PostId {
    /// Convert a canonical base-36 native id (lowercase, no leading zeros)
    pub fn from_native_id(native_id: &str) -> Result<Self, InvalidNativeId> {
        let canonical = !native_id.is_empty()
            && native_id
                .bytes()
                .all(|b| b.is_ascii_digit() || b.is_ascii_lowercase())
            && (native_id == "0" || !native_id.starts_with('0'));

        if !canonical {
            return Err(InvalidNativeId(native_id.to_string()));
        }

        let value = u128::from_str_radix(native_id, 36)
            .map_err(|_| InvalidNativeId(native_id.to_string()))?;

        Ok(Self(Uuid::from_u128(value)))
    }

    /// The Reddit base-36 id this identifier was derived from
    pub fn native_id(&self) -> String {
        to_base36(self.0.as_u128())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl From<Uuid> for PostId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for PostId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// A native id that is not canonical lowercase base-36
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid native id '{0}': expected lowercase base-36 without leading zeros")]
pub struct InvalidNativeId(pub String);

fn to_base36(mut value: u128) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

    if value == 0 {
        return "0".to_string();
    }

    let mut digits = Vec::new();
    while value > 0 {
        digits.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }

    digits.iter().rev().map(|&b| b as char).collect()
}

/// A resolved subreddit handle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subreddit {
    /// Display name without the `r/` prefix
    pub name: String,
    /// Subscriber count, if the API reported one
    pub subscribers: Option<u64>,
}

/// A Reddit submission as returned by the API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    /// Native base-36 id (without the `t3_` prefix)
    pub id: String,
    pub subreddit: String,
    pub title: String,
    /// Body of a self post, empty for link posts
    #[serde(default)]
    pub selftext: String,
    /// Link target for link posts
    pub url: Option<String>,
    /// Site-relative permalink, e.g. `/r/rust/comments/abc/title/`
    pub permalink: String,
    pub author: Option<String>,
    pub is_self: bool,
    /// Net votes
    pub score: i64,
    pub upvote_ratio: f64,
    pub num_comments: u64,
    pub subreddit_subscribers: Option<u64>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Submission {
    /// Public URL of the submission, if it has a permalink
    pub fn public_url(&self) -> Option<String> {
        if self.permalink.is_empty() {
            None
        } else {
            Some(format!("https://www.reddit.com{}", self.permalink))
        }
    }
}

/// Strategy-facing form of a post
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostData {
    pub text: Option<String>,
    /// URL of the attached image
    pub image: Option<String>,
}

impl PostData {
    /// Extract post data from a submission.
    ///
    /// Self posts become text (title, then body); link posts are accepted only
    /// when they point at an image.
    pub fn from_submission(submission: &Submission) -> Result<Self, StrategyError> {
        if submission.is_self {
            let body = submission.selftext.trim();
            if body == "[removed]" || body == "[deleted]" {
                return Err(StrategyError::UnsupportedContent(format!(
                    "submission {} was removed",
                    submission.id
                )));
            }

            let text = if body.is_empty() {
                submission.title.clone()
            } else {
                format!("{}\n\n{}", submission.title, body)
            };

            return Ok(Self {
                text: Some(text),
                image: None,
            });
        }

        match submission.url.as_deref() {
            Some(url) if is_image_url(url) => Ok(Self {
                text: non_blank(&submission.title),
                image: Some(url.to_string()),
            }),
            _ => Err(StrategyError::UnsupportedContent(format!(
                "submission {} is a non-image link",
                submission.id
            ))),
        }
    }
}

fn non_blank(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Whether a URL points at an image Reddit can host or embed
pub fn is_image_url(url: &str) -> bool {
    let lower = url.to_ascii_lowercase();
    let path = lower.split(['?', '#']).next().unwrap_or_default();

    if path.starts_with("https://i.redd.it/") {
        return true;
    }

    [".jpg", ".jpeg", ".png", ".gif", ".webp"]
        .iter()
        .any(|ext| path.ends_with(ext))
}

/// Kind of a new submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitKind {
    SelfPost { text: String },
    Link { url: String },
}

/// Request to create a submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitRequest {
    pub subreddit: String,
    pub title: String,
    pub kind: SubmitKind,
}

/// Listing order for subreddit scraping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingSort {
    New,
    Hot,
}

impl ListingSort {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListingSort::New => "new",
            ListingSort::Hot => "hot",
        }
    }
}

/// One page of a subreddit listing
#[derive(Debug, Clone, Default)]
pub struct ListingPage {
    pub items: Vec<Submission>,
    /// Cursor for the next page, `None` on the last page
    pub after: Option<String>,
}

/// The pluggable roles of a face
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Slot {
    Processor,
    Poster,
    Scorer,
    ScoreModifier,
    Scraper,
    Restriction,
}

impl Slot {
    pub const ALL: [Slot; 6] = [
        Slot::Processor,
        Slot::Poster,
        Slot::Scorer,
        Slot::ScoreModifier,
        Slot::Scraper,
        Slot::Restriction,
    ];

    /// Name used in the manifest and for the slot's state directory
    pub fn as_str(&self) -> &'static str {
        match self {
            Slot::Processor => "processor",
            Slot::Poster => "poster",
            Slot::Scorer => "scorer",
            Slot::ScoreModifier => "score_modifier",
            Slot::Scraper => "scraper",
            Slot::Restriction => "restriction",
        }
    }

    /// Optional slots may have no active strategy
    pub fn is_optional(&self) -> bool {
        matches!(self, Slot::ScoreModifier | Slot::Restriction)
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Slot {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Slot::ALL
            .into_iter()
            .find(|slot| slot.as_str() == s.trim())
            .ok_or_else(|| format!("Unknown slot: {}", s))
    }
}

/// Selected category and per-category parameters of one slot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SlotSelection {
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub params: CategoryParams,
}

impl SlotSelection {
    pub fn new(category: impl Into<String>) -> Self {
        Self {
            category: Some(category.into()),
            params: CategoryParams::new(),
        }
    }

    /// Parameters of the selected category (empty when none were given)
    pub fn selected_params(&self) -> Params {
        self.category
            .as_ref()
            .and_then(|category| self.params.get(category))
            .cloned()
            .unwrap_or_default()
    }
}

/// Credentials for the Reddit API
#[derive(Debug)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: SecretString,
    pub refresh_token: SecretString,
    pub user_agent: String,
    /// Longest rate-limit wait the client will sit out before failing
    pub ratelimit_seconds: u64,
}

/// Immutable configuration of a face
#[derive(Debug)]
pub struct FaceConfig {
    pub credentials: Credentials,
    /// Target subreddit name
    pub subreddit: String,
    /// Content shape of the face; selects the processor category
    pub post_type: String,
    pub poster: SlotSelection,
    pub scorer: SlotSelection,
    pub score_modifier: SlotSelection,
    pub scraper: SlotSelection,
    pub restriction: SlotSelection,
}

impl FaceConfig {
    /// Configured selection for a slot. The processor is keyed to
    /// `post_type` and has no selection of its own.
    pub fn selection(&self, slot: Slot) -> Option<&SlotSelection> {
        match slot {
            Slot::Processor => None,
            Slot::Poster => Some(&self.poster),
            Slot::Scorer => Some(&self.scorer),
            Slot::ScoreModifier => Some(&self.score_modifier),
            Slot::Scraper => Some(&self.scraper),
            Slot::Restriction => Some(&self.restriction),
        }
    }
}

/// Result of a successful submit
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostedItem {
    pub id: PostId,
    /// Public URL of the new submission, if available
    pub url: Option<String>,
}

/// One item produced by the scrap pipeline
#[derive(Debug, Clone, Serialize)]
pub struct ScrapedPost {
    pub id: PostId,
    /// Externally-facing content as produced by the processor
    pub content: Value,
    pub score: f64,
}
