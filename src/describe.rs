//! Vision-model description client.
//!
//! Sends a furniture image to the OpenRouter chat-completions endpoint with a
//! fixed cataloging prompt and parses the model's JSON reply into a
//! [`Description`]. The typed struct doubles as the schema check: a reply
//! missing a required attribute fails deserialization and surfaces as
//! [`Error::MalformedUpstreamResponse`].

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::config::OpenRouterConfig;
use crate::error::{Error, Result};

/// Cataloging prompt shared by ingestion and search so query descriptions
/// align with the stored dataset.
const PROMPT: &str = r#"You are an expert furniture cataloger and design specialist with a keen eye for detail. Your task is to analyze an image of a piece of furniture and generate a detailed, structured description in JSON format. This description will be used to create embeddings for a vector database to enable precise similarity searches. The description must be comprehensive, capturing everything from the high-level style to the most minute details.

JSON Output Schema:

{
  "object_type": "The specific type of furniture (e.g., 'Armchair', 'Side Table', 'Dining Chair').",
  "style": "The primary design style (e.g., 'Mid-Century Modern', 'Scandinavian', 'Industrial', 'Bohemian', 'Minimalist').",
  "materials": {
    "frame": "Material of the main structure (e.g., 'Solid Oak', 'Bent Plywood', 'Powder-coated Steel').",
    "upholstery": "Type and texture of the fabric or leather (e.g., 'Beige Linen', 'Black Top-grain Leather', 'Velvet'). Specify if not applicable.",
    "legs": "Material of the legs (e.g., 'Walnut', 'Brushed Brass', 'Chrome').",
    "other": "Any other notable materials (e.g., 'Cane webbing', 'Rattan accents')."
  },
  "colors": {
    "primary": "The dominant color of the piece.",
    "secondary": "Any significant secondary or accent colors.",
    "finish": "The finish of the materials (e.g., 'Matte Black', 'Natural Oil Finish', 'High-Gloss Lacquer')."
  },
  "shape_and_form": {
    "silhouette": "A description of the overall shape (e.g., 'Low-profile and rectangular', 'Organic and curved', 'Geometric and angular').",
    "backrest": "Description of the back (e.g., 'High-back with wings', 'Spindle back', 'Curved, open-frame').",
    "legs": "Description of the legs (e.g., 'Tapered and splayed', 'Straight block legs', 'Cantilever base').",
    "arms": "Description of the arms, if any (e.g., 'Track arms', 'Sloped arms', 'Armless')."
  },
  "key_features_and_details": [
    "A list of specific, notable details. Be very precise. Examples: 'Button-tufted backrest', 'Piped edge seams', 'Exposed finger joint construction', 'Woven cane panel on the back', 'Visible wood grain', 'Distressed finish on leather'."
  ],
  "overall_aesthetic": "A brief summary of the vibe or feeling the piece evokes (e.g., 'Elegant and formal', 'Cozy and casual', 'Sleek and professional', 'Airy and light')."
}

Instructions:
1. Strictly adhere to the provided JSON schema.
2. Be as descriptive and accurate as possible based on the visual information in the image.
3. Fill every field. If a feature is not present (e.g., upholstery on a wooden chair), use 'N/A' or a similar indicator.

Now, analyze the provided furniture image and generate the JSON description."#;

/// Structured description of a single furniture piece, as produced by the
/// vision model. Immutable once produced; passed by value to the embedding
/// and ingestion clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Description {
    pub object_type: String,
    pub style: String,
    pub materials: Materials,
    pub colors: Colors,
    pub shape_and_form: ShapeAndForm,
    pub key_features_and_details: Vec<String>,
    pub overall_aesthetic: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Materials {
    pub frame: String,
    pub upholstery: String,
    pub legs: String,
    pub other: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Colors {
    pub primary: String,
    pub secondary: String,
    pub finish: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapeAndForm {
    pub silhouette: String,
    pub backrest: String,
    pub legs: String,
    pub arms: String,
}

/// Client for the OpenRouter chat-completions endpoint with image input.
#[derive(Debug, Clone)]
pub struct DescribeClient {
    http: reqwest::Client,
    config: OpenRouterConfig,
}

impl DescribeClient {
    pub fn new(http: reqwest::Client, config: OpenRouterConfig) -> Self {
        Self { http, config }
    }

    /// Describe one image (any common raster format) as a [`Description`].
    pub async fn describe(&self, image: &[u8], mime: &str) -> Result<Description> {
        if self.config.api_key.is_empty() {
            return Err(Error::ConfigurationMissing {
                name: "OPENROUTER_API_KEY",
            });
        }

        use base64::Engine;
        let encoded = base64::engine::general_purpose::STANDARD.encode(image);
        let mime = if mime.is_empty() { "image/jpeg" } else { mime };

        let body = json!({
            "model": self.config.describe_model,
            "response_format": { "type": "json_object" },
            "messages": [
                {
                    "role": "system",
                    "content": [{ "type": "text", "text": PROMPT }],
                },
                {
                    "role": "user",
                    "content": [
                        {
                            "type": "text",
                            "text": "Analyze the attached furniture image and respond with JSON.",
                        },
                        {
                            "type": "image_url",
                            "image_url": { "url": format!("data:{mime};base64,{encoded}") },
                        },
                    ],
                },
            ],
        });

        let response = self
            .http
            .post(format!("{}/chat/completions", self.config.base_url))
            .bearer_auth(&self.config.api_key)
            .header("HTTP-Referer", &self.config.referer)
            .header("X-Title", &self.config.title)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Error::from_upstream("openrouter describe", response).await);
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| Error::malformed("openrouter describe", e.to_string()))?;

        let raw = extract_message_content(&payload)
            .ok_or_else(|| Error::malformed("openrouter describe", "response was empty"))?;

        serde_json::from_str(&raw).map_err(|e| {
            Error::malformed(
                "openrouter describe",
                format!("response was not a valid description: {e}"),
            )
        })
    }
}

/// Pull the assistant's text out of a chat-completions payload. The content
/// field is either a plain string or an array of typed parts, depending on
/// the model.
fn extract_message_content(payload: &Value) -> Option<String> {
    let content = payload.get("choices")?.get(0)?.get("message")?.get("content")?;

    let raw = match content {
        Value::String(text) => text.clone(),
        Value::Array(parts) => parts
            .iter()
            .find(|part| {
                matches!(
                    part.get("type").and_then(Value::as_str),
                    Some("output_text") | Some("text")
                )
            })
            .and_then(|part| part.get("text"))
            .and_then(Value::as_str)
            .map(str::to_string)?,
        _ => return None,
    };

    if raw.is_empty() {
        None
    } else {
        Some(raw)
    }
}

#[cfg(test)]
pub(crate) fn sample_description() -> Description {
    Description {
        object_type: "Armchair".into(),
        style: "Mid-Century Modern".into(),
        materials: Materials {
            frame: "Bent Plywood".into(),
            upholstery: "Beige Linen".into(),
            legs: "Walnut".into(),
            other: "N/A".into(),
        },
        colors: Colors {
            primary: "Beige".into(),
            secondary: "Walnut Brown".into(),
            finish: "Natural Oil Finish".into(),
        },
        shape_and_form: ShapeAndForm {
            silhouette: "Low-profile and rectangular".into(),
            backrest: "Curved, open-frame".into(),
            legs: "Tapered and splayed".into(),
            arms: "Sloped arms".into(),
        },
        key_features_and_details: vec![
            "Button-tufted backrest".into(),
            "Visible wood grain".into(),
        ],
        overall_aesthetic: "Cozy and casual".into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_plain_string_content() {
        let payload = json!({
            "choices": [{ "message": { "content": "{\"ok\":true}" } }]
        });
        assert_eq!(
            extract_message_content(&payload).as_deref(),
            Some("{\"ok\":true}")
        );
    }

    #[test]
    fn extracts_text_part_from_array_content() {
        let payload = json!({
            "choices": [{ "message": { "content": [
                { "type": "reasoning", "text": "thinking" },
                { "type": "output_text", "text": "{\"a\":1}" }
            ] } }]
        });
        assert_eq!(extract_message_content(&payload).as_deref(), Some("{\"a\":1}"));
    }

    #[test]
    fn empty_or_missing_content_yields_none() {
        assert!(extract_message_content(&json!({})).is_none());
        let empty = json!({ "choices": [{ "message": { "content": "" } }] });
        assert!(extract_message_content(&empty).is_none());
        let untyped = json!({ "choices": [{ "message": { "content": 42 } }] });
        assert!(extract_message_content(&untyped).is_none());
    }

    #[test]
    fn description_round_trips_through_json() {
        let description = sample_description();
        let json = serde_json::to_string(&description).unwrap();
        let back: Description = serde_json::from_str(&json).unwrap();
        assert_eq!(back, description);
    }

    #[test]
    fn missing_schema_field_is_rejected() {
        let mut value = serde_json::to_value(sample_description()).unwrap();
        value.as_object_mut().unwrap().remove("materials");
        assert!(serde_json::from_value::<Description>(value).is_err());
    }
}
