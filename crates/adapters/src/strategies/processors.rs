//! Processors, one per face post type
//!
//! External content is a JSON object with an optional `text` string and an
//! optional `image` URL. Each post type decides which parts are required,
//! optional or not accepted.

use async_trait::async_trait;
use reddit_face_domain::{Params, PostData, Processor, Strategy, StrategyError};
use serde_json::{Map, Value, json};
use std::fmt;
use std::str::FromStr;

use super::no_params;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Part {
    Required,
    Optional,
    Forbidden,
}

/// Content shape of a face
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostType {
    TextOnly,
    ImageOnly,
    TextAndImage,
    TextOrImage,
    TextWithOptionalImage,
    ImageWithOptionalText,
}

impl PostType {
    pub const ALL: [PostType; 6] = [
        PostType::TextOnly,
        PostType::ImageOnly,
        PostType::TextAndImage,
        PostType::TextOrImage,
        PostType::TextWithOptionalImage,
        PostType::ImageWithOptionalText,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PostType::TextOnly => "text_only",
            PostType::ImageOnly => "image_only",
            PostType::TextAndImage => "text_and_image",
            PostType::TextOrImage => "text_or_image",
            PostType::TextWithOptionalImage => "text_with_optional_image",
            PostType::ImageWithOptionalText => "image_with_optional_text",
        }
    }

    fn text(&self) -> Part {
        match self {
            PostType::TextOnly | PostType::TextAndImage | PostType::TextWithOptionalImage => {
                Part::Required
            }
            PostType::TextOrImage | PostType::ImageWithOptionalText => Part::Optional,
            PostType::ImageOnly => Part::Forbidden,
        }
    }

    fn image(&self) -> Part {
        match self {
            PostType::ImageOnly | PostType::TextAndImage | PostType::ImageWithOptionalText => {
                Part::Required
            }
            PostType::TextOrImage | PostType::TextWithOptionalImage => Part::Optional,
            PostType::TextOnly => Part::Forbidden,
        }
    }
}

impl fmt::Display for PostType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PostType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PostType::ALL
            .into_iter()
            .find(|post_type| post_type.as_str() == s)
            .ok_or_else(|| format!("Unknown post type: {}", s))
    }
}

/// Translates content of one post type
pub struct PostTypeProcessor {
    post_type: PostType,
}

impl PostTypeProcessor {
    pub fn new(post_type: PostType) -> Self {
        Self { post_type }
    }

    pub fn from_params(post_type: PostType, params: &Params) -> Result<Self, StrategyError> {
        no_params(params)?;
        Ok(Self::new(post_type))
    }

    /// Check that required parts are present
    fn complete(
        &self,
        text: Option<String>,
        image: Option<String>,
    ) -> Result<PostData, StrategyError> {
        if self.post_type.text() == Part::Required && text.is_none() {
            return Err(self.unsupported("text is required"));
        }
        if self.post_type.image() == Part::Required && image.is_none() {
            return Err(self.unsupported("an image is required"));
        }
        if text.is_none() && image.is_none() {
            return Err(self.unsupported("text or an image is required"));
        }

        Ok(PostData { text, image })
    }

    fn unsupported(&self, message: &str) -> StrategyError {
        StrategyError::UnsupportedContent(format!("{} posts: {}", self.post_type, message))
    }
}

fn string_field(content: &Map<String, Value>, key: &str) -> Result<Option<String>, String> {
    match content.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(value)) => {
            let trimmed = value.trim();
            Ok((!trimmed.is_empty()).then(|| trimmed.to_string()))
        }
        Some(_) => Err(format!("'{}' must be a string", key)),
    }
}

fn is_http_url(value: &str) -> bool {
    value.starts_with("https://") || value.starts_with("http://")
}

#[async_trait]
impl Strategy for PostTypeProcessor {
    fn category(&self) -> &str {
        self.post_type.as_str()
    }
}

#[async_trait]
impl Processor for PostTypeProcessor {
    fn post_schema(&self) -> Value {
        let mut properties = Map::new();
        let mut required = vec![];

        if self.post_type.text() != Part::Forbidden {
            properties.insert(
                "text".to_string(),
                json!({"type": "string", "minLength": 1}),
            );
        }
        if self.post_type.image() != Part::Forbidden {
            properties.insert(
                "image".to_string(),
                json!({"type": "string", "format": "uri"}),
            );
        }
        if self.post_type.text() == Part::Required {
            required.push("text");
        }
        if self.post_type.image() == Part::Required {
            required.push("image");
        }

        let needs_any_part = required.is_empty();
        let mut schema = json!({
            "$schema": "http://json-schema.org/draft-07/schema#",
            "title": self.post_type.as_str(),
            "type": "object",
            "properties": properties,
            "required": required,
            "additionalProperties": false,
        });
        if needs_any_part {
            schema["minProperties"] = json!(1);
        }
        schema
    }

    async fn to_internal(&self, content: &Value) -> Result<PostData, StrategyError> {
        let content = content
            .as_object()
            .ok_or_else(|| self.unsupported("content must be a JSON object"))?;

        let text = string_field(content, "text").map_err(|e| self.unsupported(&e))?;
        let image = string_field(content, "image").map_err(|e| self.unsupported(&e))?;

        if text.is_some() && self.post_type.text() == Part::Forbidden {
            return Err(self.unsupported("text is not accepted"));
        }
        if image.is_some() && self.post_type.image() == Part::Forbidden {
            return Err(self.unsupported("images are not accepted"));
        }
        if let Some(image) = &image {
            if !is_http_url(image) {
                return Err(self.unsupported("image must be an http(s) URL"));
            }
        }

        self.complete(text, image)
    }

    async fn to_external(&self, post: &PostData) -> Result<Value, StrategyError> {
        // Parts this post type does not carry are dropped
        let text = post
            .text
            .clone()
            .filter(|_| self.post_type.text() != Part::Forbidden);
        let image = post
            .image
            .clone()
            .filter(|_| self.post_type.image() != Part::Forbidden);

        let data = self.complete(text, image)?;

        let mut content = Map::new();
        if let Some(text) = data.text {
            content.insert("text".to_string(), Value::String(text));
        }
        if let Some(image) = data.image {
            content.insert("image".to_string(), Value::String(image));
        }
        Ok(Value::Object(content))
    }
}
