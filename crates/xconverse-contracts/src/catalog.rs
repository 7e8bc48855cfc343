use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct ModelLifecycle {
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FoundationModelSummary {
    pub model_id: String,
    #[serde(default)]
    pub model_name: String,
    #[serde(default)]
    pub provider_name: String,
    #[serde(default)]
    pub input_modalities: Vec<String>,
    #[serde(default)]
    pub output_modalities: Vec<String>,
    #[serde(default)]
    pub response_streaming_supported: Option<bool>,
    #[serde(default)]
    pub inference_types_supported: Vec<String>,
    #[serde(default)]
    pub model_lifecycle: Option<ModelLifecycle>,
}

impl FoundationModelSummary {
    pub fn supports_streaming(&self) -> bool {
        self.response_streaming_supported.unwrap_or(false)
    }

    pub fn accepts_text(&self) -> bool {
        has_modality(&self.input_modalities, "TEXT")
    }

    pub fn produces_text(&self) -> bool {
        has_modality(&self.output_modalities, "TEXT")
    }

    pub fn accepts_images(&self) -> bool {
        has_modality(&self.input_modalities, "IMAGE")
    }

    pub fn invocable_on_demand(&self) -> bool {
        self.inference_types_supported.iter().any(|kind| kind.eq_ignore_ascii_case("ON_DEMAND"))
    }

    pub fn invocable_via_profile(&self) -> bool {
        self.inference_types_supported
            .iter()
            .any(|kind| kind.eq_ignore_ascii_case("INFERENCE_PROFILE"))
    }

    pub fn is_legacy(&self) -> bool {
        self.model_lifecycle
            .as_ref()
            .is_some_and(|lifecycle| lifecycle.status.eq_ignore_ascii_case("LEGACY"))
    }
}

fn has_modality(modalities: &[String], wanted: &str) -> bool {
    modalities.iter().any(|modality| modality.eq_ignore_ascii_case(wanted))
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProfileModel {
    #[serde(default)]
    pub model_arn: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct InferenceProfileSummary {
    pub inference_profile_id: String,
    #[serde(default)]
    pub inference_profile_name: String,
    #[serde(default)]
    pub inference_profile_arn: String,
    #[serde(default, rename = "type")]
    pub profile_type: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub models: Vec<ProfileModel>,
}

impl InferenceProfileSummary {
    pub fn is_active(&self) -> bool {
        self.status.is_empty() || self.status.eq_ignore_ascii_case("ACTIVE")
    }

    /// Base model id taken from the first model ARN, e.g.
    /// `arn:aws:bedrock:us-east-1::foundation-model/anthropic.claude-3-haiku`
    /// -> `anthropic.claude-3-haiku`.
    pub fn base_model_id(&self) -> Option<String> {
        self.models.iter().find_map(|model| {
            let (_, id) = model.model_arn.rsplit_once("foundation-model/")?;
            (!id.is_empty()).then(|| id.to_string())
        })
    }
}

/// A user-provisioned deployment (application profile or imported model) offered as a model.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct CustomDeployment {
    pub id: String,
    pub name: String,
    pub base_model_id: Option<String>,
}

impl From<&InferenceProfileSummary> for CustomDeployment {
    fn from(profile: &InferenceProfileSummary) -> Self {
        let id = if profile.inference_profile_arn.is_empty() {
            profile.inference_profile_id.clone()
        } else {
            profile.inference_profile_arn.clone()
        };
        let name = if profile.inference_profile_name.is_empty() {
            profile.inference_profile_id.clone()
        } else {
            profile.inference_profile_name.clone()
        };
        Self { id, name, base_model_id: profile.base_model_id() }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RouteKind {
    Global,
    Regional,
    Base,
    Custom,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, ToSchema)]
pub struct ModelEntry {
    pub id: String,
    pub display_name: String,
    pub provider_name: String,
    pub base_model_id: String,
    pub route: RouteKind,
    pub max_input_tokens: u32,
    pub max_output_tokens: u32,
    pub supports_image_input: bool,
    pub tool_calling: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, ToSchema)]
pub struct ModelList {
    pub models: Vec<ModelEntry>,
}
