//! Restrictions

use async_trait::async_trait;
use regex::{Regex, RegexBuilder};
use reddit_face_domain::{
    Params, Persistable, PostData, Restriction, Strategy, StrategyError, parse_params,
};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Mutex;

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct MaxLengthParams {
    max_chars: usize,
}

/// Rejects posts whose text is longer than `max_chars` characters
pub struct MaxLengthRestriction {
    max_chars: usize,
}

impl MaxLengthRestriction {
    pub const CATEGORY: &'static str = "max_length";

    pub fn from_params(params: &Params) -> Result<Self, StrategyError> {
        let params: MaxLengthParams = parse_params(params)?;
        Ok(Self {
            max_chars: params.max_chars,
        })
    }
}

#[async_trait]
impl Strategy for MaxLengthRestriction {
    fn category(&self) -> &str {
        Self::CATEGORY
    }
}

#[async_trait]
impl Restriction for MaxLengthRestriction {
    async fn check(&self, post: &PostData) -> Result<bool, StrategyError> {
        let length = post.text.as_deref().map_or(0, |text| text.chars().count());
        Ok(length <= self.max_chars)
    }
}

fn default_case_insensitive() -> bool {
    true
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ForbiddenPatternsParams {
    patterns: Vec<String>,
    #[serde(default = "default_case_insensitive")]
    case_insensitive: bool,
}

/// Rejects posts whose text or image URL matches any pattern
pub struct ForbiddenPatternsRestriction {
    patterns: Vec<Regex>,
}

impl ForbiddenPatternsRestriction {
    pub const CATEGORY: &'static str = "forbidden_patterns";

    pub fn from_params(params: &Params) -> Result<Self, StrategyError> {
        let params: ForbiddenPatternsParams = parse_params(params)?;

        let patterns = params
            .patterns
            .iter()
            .map(|pattern| {
                RegexBuilder::new(pattern)
                    .case_insensitive(params.case_insensitive)
                    .build()
                    .map_err(|e| {
                        StrategyError::InvalidParameters(format!(
                            "invalid pattern '{}': {}",
                            pattern, e
                        ))
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { patterns })
    }
}

#[async_trait]
impl Strategy for ForbiddenPatternsRestriction {
    fn category(&self) -> &str {
        Self::CATEGORY
    }
}

#[async_trait]
impl Restriction for ForbiddenPatternsRestriction {
    async fn check(&self, post: &PostData) -> Result<bool, StrategyError> {
        let parts = [post.text.as_deref(), post.image.as_deref()];

        let hit = self.patterns.iter().find(|pattern| {
            parts
                .iter()
                .flatten()
                .any(|part| pattern.is_match(part))
        });

        if let Some(pattern) = hit {
            tracing::debug!(pattern = %pattern, "Post matches forbidden pattern");
        }
        Ok(hit.is_none())
    }
}

const DIGESTS_FILE: &str = "digests.json";

/// Rejects content that was posted before.
///
/// Remembers a SHA-256 digest of every submitted post and keeps them across
/// restarts through its slot directory. A post that passes `check` is held
/// as pending until it is settled, so a concurrent duplicate is rejected;
/// a failed submit releases it and the same content may be tried again.
#[derive(Default)]
pub struct UniqueRestriction {
    digests: Mutex<Digests>,
}

#[derive(Default)]
struct Digests {
    seen: BTreeSet<String>,
    pending: BTreeSet<String>,
}

impl UniqueRestriction {
    pub const CATEGORY: &'static str = "unique";

    pub fn from_params(params: &Params) -> Result<Self, StrategyError> {
        super::no_params(params)?;
        Ok(Self::default())
    }

    fn digests(&self) -> Result<std::sync::MutexGuard<'_, Digests>, StrategyError> {
        self.digests
            .lock()
            .map_err(|_| StrategyError::Serialization("digest set is poisoned".to_string()))
    }
}

/// Digest of a post's normalized content
fn digest(post: &PostData) -> String {
    let mut hasher = Sha256::new();
    hasher.update(post.text.as_deref().unwrap_or_default().trim().as_bytes());
    hasher.update([0u8]);
    hasher.update(post.image.as_deref().unwrap_or_default().trim().as_bytes());
    format!("{:x}", hasher.finalize())
}

#[async_trait]
impl Strategy for UniqueRestriction {
    fn category(&self) -> &str {
        Self::CATEGORY
    }

    fn persistable(&self) -> Option<&dyn Persistable> {
        Some(self)
    }

    fn persistable_mut(&mut self) -> Option<&mut dyn Persistable> {
        Some(self)
    }
}

#[async_trait]
impl Restriction for UniqueRestriction {
    async fn check(&self, post: &PostData) -> Result<bool, StrategyError> {
        let digest = digest(post);
        let mut digests = self.digests()?;
        if digests.seen.contains(&digest) {
            return Ok(false);
        }
        Ok(digests.pending.insert(digest))
    }

    async fn settle(&self, post: &PostData, submitted: bool) -> Result<(), StrategyError> {
        let digest = digest(post);
        let mut digests = self.digests()?;
        if digests.pending.remove(&digest) && submitted {
            digests.seen.insert(digest);
        }
        Ok(())
    }
}

#[async_trait]
impl Persistable for UniqueRestriction {
    async fn save(&self, directory: &Path) -> Result<(), StrategyError> {
        let digests: Vec<String> = self.digests()?.seen.iter().cloned().collect();
        let content = serde_json::to_vec_pretty(&digests)
            .map_err(|e| StrategyError::Serialization(e.to_string()))?;

        tokio::fs::write(directory.join(DIGESTS_FILE), content).await?;
        tracing::debug!(count = digests.len(), "Saved post digests");
        Ok(())
    }

    async fn load(&mut self, directory: &Path) -> Result<(), StrategyError> {
        let path = directory.join(DIGESTS_FILE);
        let raw = match tokio::fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };

        let digests: BTreeSet<String> = serde_json::from_slice(&raw)
            .map_err(|e| StrategyError::Serialization(format!("{}: {}", path.display(), e)))?;

        tracing::debug!(count = digests.len(), "Loaded post digests");
        self.digests()?.seen = digests;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn params(value: serde_json::Value) -> Params {
        value.as_object().cloned().unwrap_or_default()
    }

    fn text(text: &str) -> PostData {
        PostData {
            text: Some(text.to_string()),
            image: None,
        }
    }

    #[tokio::test]
    async fn test_max_length_counts_characters() {
        let restriction =
            MaxLengthRestriction::from_params(&params(json!({"max_chars": 5}))).unwrap();

        assert!(restriction.check(&text("héllo")).await.unwrap());
        assert!(!restriction.check(&text("hello!")).await.unwrap());
        assert!(restriction.check(&PostData::default()).await.unwrap());
    }

    #[tokio::test]
    async fn test_forbidden_patterns() {
        let restriction = ForbiddenPatternsRestriction::from_params(&params(json!({
            "patterns": ["\\bspam\\b", "example\\.com"]
        })))
        .unwrap();

        assert!(!restriction.check(&text("Buy SPAM now")).await.unwrap());
        assert!(restriction.check(&text("spammer")).await.unwrap());

        let image = PostData {
            text: None,
            image: Some("https://example.com/a.png".to_string()),
        };
        assert!(!restriction.check(&image).await.unwrap());
    }

    #[tokio::test]
    async fn test_forbidden_patterns_case_sensitive() {
        let restriction = ForbiddenPatternsRestriction::from_params(&params(json!({
            "patterns": ["spam"],
            "case_insensitive": false
        })))
        .unwrap();

        assert!(restriction.check(&text("SPAM")).await.unwrap());
        assert!(!restriction.check(&text("spam")).await.unwrap());
    }

    #[test]
    fn test_invalid_pattern_is_rejected() {
        let result =
            ForbiddenPatternsRestriction::from_params(&params(json!({"patterns": ["(unclosed"]})));
        assert!(matches!(result, Err(StrategyError::InvalidParameters(_))));
    }

    #[tokio::test]
    async fn test_unique_rejects_repeats() {
        let restriction = UniqueRestriction::from_params(&Params::new()).unwrap();

        assert!(restriction.check(&text("hello")).await.unwrap());
        restriction.settle(&text("hello"), true).await.unwrap();

        assert!(!restriction.check(&text("hello ")).await.unwrap());
        assert!(restriction.check(&text("world")).await.unwrap());
    }

    #[tokio::test]
    async fn test_unique_rejects_pending_duplicate() {
        let restriction = UniqueRestriction::default();

        assert!(restriction.check(&text("hello")).await.unwrap());
        assert!(!restriction.check(&text("hello")).await.unwrap());
    }

    #[tokio::test]
    async fn test_unique_failed_submit_can_be_retried() {
        let dir = TempDir::new().unwrap();
        let restriction = UniqueRestriction::default();

        assert!(restriction.check(&text("hello")).await.unwrap());
        restriction.settle(&text("hello"), false).await.unwrap();

        // Nothing was posted, so nothing is remembered
        restriction.save(dir.path()).await.unwrap();
        let saved: Vec<String> =
            serde_json::from_slice(&std::fs::read(dir.path().join(DIGESTS_FILE)).unwrap())
                .unwrap();
        assert!(saved.is_empty());

        assert!(restriction.check(&text("hello")).await.unwrap());
        restriction.settle(&text("hello"), true).await.unwrap();
        assert!(!restriction.check(&text("hello")).await.unwrap());
    }

    #[tokio::test]
    async fn test_unique_survives_save_and_load() {
        let dir = TempDir::new().unwrap();

        let restriction = UniqueRestriction::default();
        restriction.check(&text("hello")).await.unwrap();
        restriction.settle(&text("hello"), true).await.unwrap();
        restriction.save(dir.path()).await.unwrap();

        let mut restored = UniqueRestriction::default();
        restored.load(dir.path()).await.unwrap();

        assert!(!restored.check(&text("hello")).await.unwrap());
        assert!(restored.check(&text("other")).await.unwrap());
    }

    #[tokio::test]
    async fn test_unique_load_from_empty_directory() {
        let dir = TempDir::new().unwrap();

        let mut restriction = UniqueRestriction::default();
        restriction.load(dir.path()).await.unwrap();

        assert!(restriction.check(&text("hello")).await.unwrap());
    }
}
