//! Score modifiers

use async_trait::async_trait;
use reddit_face_domain::{
    Params, ScoreModifier, Strategy, StrategyError, Submission, parse_params,
};
use serde::Deserialize;
use time::OffsetDateTime;

fn default_factor() -> f64 {
    1.0
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ScaleParams {
    #[serde(default = "default_factor")]
    factor: f64,
    #[serde(default)]
    offset: f64,
}

/// `score * factor + offset`
pub struct ScaleModifier {
    factor: f64,
    offset: f64,
}

impl ScaleModifier {
    pub const CATEGORY: &'static str = "scale";

    pub fn from_params(params: &Params) -> Result<Self, StrategyError> {
        let params: ScaleParams = parse_params(params)?;

        if !params.factor.is_finite() || !params.offset.is_finite() {
            return Err(StrategyError::InvalidParameters(
                "factor and offset must be finite".to_string(),
            ));
        }

        Ok(Self {
            factor: params.factor,
            offset: params.offset,
        })
    }
}

#[async_trait]
impl Strategy for ScaleModifier {
    fn category(&self) -> &str {
        Self::CATEGORY
    }
}

#[async_trait]
impl ScoreModifier for ScaleModifier {
    async fn modify(&self, _submission: &Submission, score: f64) -> Result<f64, StrategyError> {
        Ok(score * self.factor + self.offset)
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ClampParams {
    #[serde(default)]
    min: Option<f64>,
    #[serde(default)]
    max: Option<f64>,
}

/// Bounds the score to `[min, max]`; either bound may be omitted
pub struct ClampModifier {
    min: f64,
    max: f64,
}

impl ClampModifier {
    pub const CATEGORY: &'static str = "clamp";

    pub fn from_params(params: &Params) -> Result<Self, StrategyError> {
        let params: ClampParams = parse_params(params)?;
        let min = params.min.unwrap_or(f64::NEG_INFINITY);
        let max = params.max.unwrap_or(f64::INFINITY);

        if min.is_nan() || max.is_nan() || min > max {
            return Err(StrategyError::InvalidParameters(format!(
                "min ({}) must not exceed max ({})",
                min, max
            )));
        }

        Ok(Self { min, max })
    }
}

#[async_trait]
impl Strategy for ClampModifier {
    fn category(&self) -> &str {
        Self::CATEGORY
    }
}

#[async_trait]
impl ScoreModifier for ClampModifier {
    async fn modify(&self, _submission: &Submission, score: f64) -> Result<f64, StrategyError> {
        Ok(score.clamp(self.min, self.max))
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct AgeDecayParams {
    half_life_hours: f64,
}

/// Halves the score every `half_life_hours` of post age
pub struct AgeDecayModifier {
    half_life_hours: f64,
}

impl AgeDecayModifier {
    pub const CATEGORY: &'static str = "age_decay";

    pub fn from_params(params: &Params) -> Result<Self, StrategyError> {
        let params: AgeDecayParams = parse_params(params)?;

        if !(params.half_life_hours.is_finite() && params.half_life_hours > 0.0) {
            return Err(StrategyError::InvalidParameters(
                "half_life_hours must be positive".to_string(),
            ));
        }

        Ok(Self {
            half_life_hours: params.half_life_hours,
        })
    }

    fn decay(&self, created_at: OffsetDateTime, now: OffsetDateTime) -> f64 {
        let age_hours = ((now - created_at).as_seconds_f64() / 3600.0).max(0.0);
        0.5_f64.powf(age_hours / self.half_life_hours)
    }
}

#[async_trait]
impl Strategy for AgeDecayModifier {
    fn category(&self) -> &str {
        Self::CATEGORY
    }
}

#[async_trait]
impl ScoreModifier for AgeDecayModifier {
    async fn modify(&self, submission: &Submission, score: f64) -> Result<f64, StrategyError> {
        Ok(score * self.decay(submission.created_at, OffsetDateTime::now_utc()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategies::scorers::tests::submission;
    use serde_json::{Value, json};

    fn params(value: Value) -> Params {
        match value {
            Value::Object(map) => map,
            _ => panic!("params must be an object"),
        }
    }

    #[tokio::test]
    async fn test_scale() {
        let modifier = ScaleModifier::from_params(&params(json!({"factor": 2.0, "offset": 1.5})))
            .unwrap();
        assert_eq!(modifier.modify(&submission(1, None), 10.0).await.unwrap(), 21.5);

        let identity = ScaleModifier::from_params(&Params::new()).unwrap();
        assert_eq!(identity.modify(&submission(1, None), 3.0).await.unwrap(), 3.0);
    }

    #[tokio::test]
    async fn test_clamp() {
        let modifier = ClampModifier::from_params(&params(json!({"min": 0.0, "max": 10.0})))
            .unwrap();
        let post = submission(1, None);

        assert_eq!(modifier.modify(&post, -5.0).await.unwrap(), 0.0);
        assert_eq!(modifier.modify(&post, 5.0).await.unwrap(), 5.0);
        assert_eq!(modifier.modify(&post, 50.0).await.unwrap(), 10.0);

        let floor = ClampModifier::from_params(&params(json!({"min": 1.0}))).unwrap();
        assert_eq!(floor.modify(&post, 1e9).await.unwrap(), 1e9);
    }

    #[test]
    fn test_clamp_rejects_inverted_bounds() {
        assert!(matches!(
            ClampModifier::from_params(&params(json!({"min": 5.0, "max": 1.0}))),
            Err(StrategyError::InvalidParameters(_))
        ));
    }

    #[test]
    fn test_age_decay() {
        let modifier =
            AgeDecayModifier::from_params(&params(json!({"half_life_hours": 12.0}))).unwrap();
        let now = OffsetDateTime::now_utc();

        assert_eq!(modifier.decay(now, now), 1.0);
        let decay = modifier.decay(now - time::Duration::hours(24), now);
        assert!((decay - 0.25).abs() < 1e-9);
        // Posts from the future are not boosted
        assert_eq!(modifier.decay(now + time::Duration::hours(5), now), 1.0);
    }

    #[test]
    fn test_age_decay_requires_positive_half_life() {
        for value in [json!({}), json!({"half_life_hours": 0.0}), json!({"half_life_hours": -1})] {
            assert!(matches!(
                AgeDecayModifier::from_params(&params(value)),
                Err(StrategyError::InvalidParameters(_))
            ));
        }
    }
}
