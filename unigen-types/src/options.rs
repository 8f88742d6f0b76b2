//! Generation parameter bags, one per output modality.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::tool::ToolDef;

/// Generation cap ceiling: 1 GiB of tokens is already nonsense.
const MAX_TOKENS_CEILING: u64 = 1 << 30;

/// A content modality, used for option bags and capability declarations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Modality {
    /// Plain text.
    Text,
    /// Still images.
    Image,
    /// Audio.
    Audio,
    /// Video.
    Video,
    /// Documents (PDF and friends).
    Document,
}

/// How strongly the model is pushed toward calling tools.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCallRequest {
    /// The model decides whether to call tools.
    #[default]
    Any,
    /// The model must call at least one tool.
    Required,
    /// The model must not call tools.
    None,
}

/// A JSON schema derived from a concrete struct, for schema-constrained
/// output.
///
/// Built via [`StructTemplate::of`], which rejects non-object roots: the
/// decode target must be a struct template, not a raw hand-written schema.
#[derive(Debug, Clone, PartialEq)]
pub struct StructTemplate {
    schema: serde_json::Value,
}

impl StructTemplate {
    /// Reflect the schema of `T`.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] when `T`'s schema root is not an
    /// object (e.g. a bare string or array type).
    pub fn of<T: JsonSchema>() -> Result<Self, ValidationError> {
        let schema = serde_json::to_value(schemars::schema_for!(T)).map_err(|e| {
            ValidationError::Invalid {
                container: "struct_template",
                reason: format!("schema reflection failed: {e}"),
            }
        })?;
        let root_type = schema.get("type").and_then(|t| t.as_str());
        if root_type != Some("object") {
            return Err(ValidationError::Invalid {
                container: "struct_template",
                reason: format!(
                    "root must be an object, got {}",
                    root_type.unwrap_or("none")
                ),
            });
        }
        Ok(Self { schema })
    }

    /// The reflected JSON schema.
    #[must_use]
    pub fn schema(&self) -> &serde_json::Value {
        &self.schema
    }
}

/// Options for text-output generation.
#[derive(Debug, Clone, Default)]
pub struct OptionsText {
    /// Sampling temperature, in [0, 100].
    pub temperature: Option<f64>,
    /// Nucleus sampling cutoff, in [0, 1].
    pub top_p: Option<f64>,
    /// Top-K truncation, in [0, 1024].
    pub top_k: Option<u32>,
    /// Generation cap; also bounds reasoning on thinking models.
    pub max_tokens: Option<u64>,
    /// Prepended as a system-role message.
    pub system_prompt: Option<String>,
    /// Deterministic-sampling seed.
    pub seed: Option<i64>,
    /// Sequences that end generation.
    pub stop_sequences: Vec<String>,
    /// Force valid-JSON output.
    pub reply_as_json: bool,
    /// Struct template for schema-constrained output.
    pub decode_as: Option<StructTemplate>,
    /// Tools available to the model.
    pub tools: Vec<ToolDef>,
    /// How strongly tool calling is requested.
    pub tool_call_request: ToolCallRequest,
}

impl OptionsText {
    /// Whether the caller asked for JSON output, by flag or by template.
    #[must_use]
    pub fn json_requested(&self) -> bool {
        self.reply_as_json || self.decode_as.is_some()
    }

    /// Validate ranges, tool-name uniqueness, and the required-tools rule.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] (possibly `Multiple`) for every
    /// violated constraint.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut errs = Vec::new();

        if let Some(t) = self.temperature
            && !(0.0..=100.0).contains(&t)
        {
            errs.push(ValidationError::OutOfRange {
                field: "temperature",
                value: t,
                min: 0.0,
                max: 100.0,
            });
        }
        if let Some(p) = self.top_p
            && !(0.0..=1.0).contains(&p)
        {
            errs.push(ValidationError::OutOfRange {
                field: "top_p",
                value: p,
                min: 0.0,
                max: 1.0,
            });
        }
        if let Some(k) = self.top_k
            && k > 1024
        {
            errs.push(ValidationError::OutOfRange {
                field: "top_k",
                value: f64::from(k),
                min: 0.0,
                max: 1024.0,
            });
        }
        if let Some(m) = self.max_tokens
            && m > MAX_TOKENS_CEILING
        {
            errs.push(ValidationError::OutOfRange {
                field: "max_tokens",
                value: m as f64,
                min: 0.0,
                max: MAX_TOKENS_CEILING as f64,
            });
        }

        let mut seen = std::collections::HashSet::new();
        for tool in &self.tools {
            if !seen.insert(tool.name.as_str()) {
                errs.push(ValidationError::DuplicateTool(tool.name.clone()));
            }
        }
        if self.tool_call_request == ToolCallRequest::Required && self.tools.is_empty() {
            errs.push(ValidationError::Missing {
                container: "options_text",
                field: "tools (required by tool_call_request = required)",
            });
        }

        ValidationError::join(errs)
    }
}

/// Options for image-output generation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OptionsImage {
    /// Deterministic-sampling seed.
    pub seed: Option<i64>,
    /// Output width in pixels.
    pub width: Option<u32>,
    /// Output height in pixels.
    pub height: Option<u32>,
}

impl OptionsImage {
    /// Validate the dimensions.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] when a dimension is zero.
    pub fn validate(&self) -> Result<(), ValidationError> {
        for (field, v) in [("width", self.width), ("height", self.height)] {
            if v == Some(0) {
                return Err(ValidationError::Invalid {
                    container: "options_image",
                    reason: format!("{field} must be non-zero"),
                });
            }
        }
        Ok(())
    }
}

/// Options for audio-output generation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OptionsAudio {
    /// Deterministic-sampling seed.
    pub seed: Option<i64>,
    /// Provider-specific voice identifier.
    pub voice: Option<String>,
}

impl OptionsAudio {
    /// Validate the options. Currently all field values are legal.
    ///
    /// # Errors
    ///
    /// Reserved; always `Ok` today.
    pub fn validate(&self) -> Result<(), ValidationError> {
        Ok(())
    }
}

/// Options for video-output generation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OptionsVideo {
    /// Deterministic-sampling seed.
    pub seed: Option<i64>,
    /// Output width in pixels.
    pub width: Option<u32>,
    /// Output height in pixels.
    pub height: Option<u32>,
}

impl OptionsVideo {
    /// Validate the dimensions.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] when a dimension is zero.
    pub fn validate(&self) -> Result<(), ValidationError> {
        for (field, v) in [("width", self.width), ("height", self.height)] {
            if v == Some(0) {
                return Err(ValidationError::Invalid {
                    container: "options_video",
                    reason: format!("{field} must be non-zero"),
                });
            }
        }
        Ok(())
    }
}

/// A generation option bag tagged by its declared output modality.
///
/// Providers receive this and honor what they can; recognized-but-ignored
/// fields surface as a continuable error.
#[derive(Debug, Clone)]
pub enum GenOptions {
    /// Text output.
    Text(OptionsText),
    /// Image output.
    Image(OptionsImage),
    /// Audio output.
    Audio(OptionsAudio),
    /// Video output.
    Video(OptionsVideo),
}

impl GenOptions {
    /// The output modality this bag declares.
    #[must_use]
    pub fn modality(&self) -> Modality {
        match self {
            GenOptions::Text(_) => Modality::Text,
            GenOptions::Image(_) => Modality::Image,
            GenOptions::Audio(_) => Modality::Audio,
            GenOptions::Video(_) => Modality::Video,
        }
    }

    /// The text options, when this is a text bag.
    #[must_use]
    pub fn as_text(&self) -> Option<&OptionsText> {
        match self {
            GenOptions::Text(t) => Some(t),
            _ => None,
        }
    }

    /// Mutable access to the text options, when this is a text bag.
    #[must_use]
    pub fn as_text_mut(&mut self) -> Option<&mut OptionsText> {
        match self {
            GenOptions::Text(t) => Some(t),
            _ => None,
        }
    }

    /// Validate the wrapped bag.
    ///
    /// # Errors
    ///
    /// Returns the wrapped bag's [`ValidationError`].
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            GenOptions::Text(o) => o.validate(),
            GenOptions::Image(o) => o.validate(),
            GenOptions::Audio(o) => o.validate(),
            GenOptions::Video(o) => o.validate(),
        }
    }
}

impl From<OptionsText> for GenOptions {
    fn from(o: OptionsText) -> Self {
        GenOptions::Text(o)
    }
}

impl From<OptionsImage> for GenOptions {
    fn from(o: OptionsImage) -> Self {
        GenOptions::Image(o)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::{ToolContext, ToolDef};
    use serde::Deserialize;

    #[derive(Debug, Deserialize, JsonSchema)]
    struct Weather {
        #[allow(dead_code)]
        city: String,
    }

    fn noop_tool(name: &str) -> ToolDef {
        ToolDef::new::<Weather, _, _>(name, "Reports the weather", |_ctx: ToolContext, _args| {
            async { Ok("sunny".to_string()) }
        })
        .unwrap()
    }

    #[test]
    fn temperature_range() {
        let o = OptionsText {
            temperature: Some(150.0),
            ..OptionsText::default()
        };
        assert!(o.validate().is_err());

        let ok = OptionsText {
            temperature: Some(0.7),
            ..OptionsText::default()
        };
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn top_p_and_top_k_ranges() {
        let p = OptionsText {
            top_p: Some(1.5),
            ..OptionsText::default()
        };
        assert!(p.validate().is_err());

        let k = OptionsText {
            top_k: Some(2048),
            ..OptionsText::default()
        };
        assert!(k.validate().is_err());
    }

    #[test]
    fn max_tokens_ceiling() {
        let o = OptionsText {
            max_tokens: Some((1 << 30) + 1),
            ..OptionsText::default()
        };
        assert!(o.validate().is_err());
    }

    #[test]
    fn duplicate_tool_names_rejected() {
        let o = OptionsText {
            tools: vec![noop_tool("weather"), noop_tool("weather")],
            ..OptionsText::default()
        };
        let err = o.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate tool name"));
    }

    #[test]
    fn required_mode_needs_a_tool() {
        let o = OptionsText {
            tool_call_request: ToolCallRequest::Required,
            ..OptionsText::default()
        };
        assert!(o.validate().is_err());

        let ok = OptionsText {
            tool_call_request: ToolCallRequest::Required,
            tools: vec![noop_tool("weather")],
            ..OptionsText::default()
        };
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn struct_template_accepts_structs_and_rejects_scalars() {
        let t = StructTemplate::of::<Weather>().unwrap();
        assert_eq!(
            t.schema().get("type").and_then(|v| v.as_str()),
            Some("object")
        );

        assert!(StructTemplate::of::<String>().is_err());
        assert!(StructTemplate::of::<Vec<u32>>().is_err());
    }

    #[test]
    fn json_requested_by_flag_or_template() {
        let flag = OptionsText {
            reply_as_json: true,
            ..OptionsText::default()
        };
        assert!(flag.json_requested());

        let template = OptionsText {
            decode_as: Some(StructTemplate::of::<Weather>().unwrap()),
            ..OptionsText::default()
        };
        assert!(template.json_requested());

        assert!(!OptionsText::default().json_requested());
    }

    #[test]
    fn gen_options_modality() {
        assert_eq!(
            GenOptions::Text(OptionsText::default()).modality(),
            Modality::Text
        );
        assert_eq!(
            GenOptions::Image(OptionsImage::default()).modality(),
            Modality::Image
        );
    }

    #[test]
    fn image_dimensions_must_be_nonzero() {
        let o = OptionsImage {
            width: Some(0),
            ..OptionsImage::default()
        };
        assert!(o.validate().is_err());
    }
}
