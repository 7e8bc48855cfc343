use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use futures::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use xconverse_contracts::{CustomDeployment, FoundationModelSummary, ModelEntry, RouteKind};

use crate::backend::{BackendClient, ProfileKind};
use crate::error::CoreError;
use crate::limits::{TokenLimits, effective_input_limit, limits_for};
use crate::profile::resolve as resolve_profile;

// Families that stream text but cannot take tool definitions.
const NO_TOOL_FAMILIES: &[&str] = &[
    "amazon.titan",
    "anthropic.claude-instant",
    "anthropic.claude-v2",
    "meta.llama2",
    "ai21.j2",
    "cohere.command-text",
    "cohere.command-light",
    "stability.",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionRouting {
    pub prefix: String,
    pub standard_partition: bool,
}

/// Routing prefix the backend uses for regional aliases in `region`.
pub fn region_routing(region: &str) -> RegionRouting {
    let region = region.trim().to_ascii_lowercase();
    let segments = region.split('-').collect::<Vec<_>>();
    let has_segment = |wanted: &[&str]| segments.iter().any(|segment| wanted.contains(segment));

    let isolated = |take: usize| RegionRouting {
        prefix: segments.iter().take(take).copied().collect::<Vec<_>>().join("-"),
        standard_partition: false,
    };

    if has_segment(&["iso", "isob"]) {
        return isolated(3);
    }
    if region.starts_with("us-gov-") || has_segment(&["isof", "isoe"]) {
        return isolated(2);
    }
    let first = segments.first().copied().unwrap_or_default();
    if first == "cn" {
        return isolated(1);
    }
    let prefix = if first == "ap" { "apac" } else { first };
    RegionRouting { prefix: prefix.to_string(), standard_partition: true }
}

fn supports_tool_calling(model_id: &str) -> bool {
    let id = model_id.to_ascii_lowercase();
    !NO_TOOL_FAMILIES.iter().any(|family| id.starts_with(family))
}

fn has_chat_capabilities(model: &FoundationModelSummary) -> bool {
    model.supports_streaming()
        && model.accepts_text()
        && model.produces_text()
        && supports_tool_calling(&model.model_id)
}

/// Chat-capable, invocable and not marked legacy by its lifecycle.
pub fn is_candidate(model: &FoundationModelSummary) -> bool {
    has_chat_capabilities(model)
        && !model.is_legacy()
        && (model.invocable_on_demand() || model.invocable_via_profile())
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct RouteOption {
    id: String,
    kind: RouteKind,
}

fn route_options(
    model: &FoundationModelSummary,
    aliases: &HashSet<String>,
    routing: &RegionRouting,
) -> Vec<RouteOption> {
    let base = &model.model_id;
    let mut options = Vec::with_capacity(3);
    let global = format!("global.{base}");
    if routing.standard_partition && aliases.contains(&global) {
        options.push(RouteOption { id: global, kind: RouteKind::Global });
    }
    let regional = format!("{}.{base}", routing.prefix);
    if aliases.contains(&regional) {
        options.push(RouteOption { id: regional, kind: RouteKind::Regional });
    }
    if model.invocable_on_demand() {
        options.push(RouteOption { id: base.clone(), kind: RouteKind::Base });
    }
    options
}

fn display_name(name: &str, kind: RouteKind, routing: &RegionRouting) -> String {
    match kind {
        RouteKind::Global => format!("{name} (Global)"),
        RouteKind::Regional => format!("{name} (Regional: {})", routing.prefix),
        RouteKind::Base => name.to_string(),
        RouteKind::Custom => format!("{name} (Custom)"),
    }
}

fn catalog_entry(
    model: &FoundationModelSummary,
    option: &RouteOption,
    routing: &RegionRouting,
) -> ModelEntry {
    let limits = limits_for(&model.model_id);
    let name = if model.model_name.is_empty() { &model.model_id } else { &model.model_name };
    ModelEntry {
        id: option.id.clone(),
        display_name: display_name(name, option.kind, routing),
        provider_name: model.provider_name.clone(),
        base_model_id: model.model_id.clone(),
        route: option.kind,
        max_input_tokens: limits.max_input_tokens,
        max_output_tokens: limits.max_output_tokens,
        supports_image_input: model.accepts_images(),
        tool_calling: true,
    }
}

fn custom_entry(
    deployment: &CustomDeployment,
    base: Option<&FoundationModelSummary>,
    routing: &RegionRouting,
) -> ModelEntry {
    let base_model_id = deployment.base_model_id.clone().unwrap_or_else(|| deployment.id.clone());
    let limits = limits_for(&base_model_id);
    ModelEntry {
        id: deployment.id.clone(),
        display_name: display_name(&deployment.name, RouteKind::Custom, routing),
        provider_name: base
            .map_or_else(|| "Custom".to_string(), |model| model.provider_name.clone()),
        base_model_id,
        route: RouteKind::Custom,
        max_input_tokens: limits.max_input_tokens,
        max_output_tokens: limits.max_output_tokens,
        supports_image_input: base.is_some_and(FoundationModelSummary::accepts_images),
        tool_calling: true,
    }
}

pub struct ModelResolver {
    backend: Arc<dyn BackendClient>,
    extended_context: bool,
}

impl ModelResolver {
    pub fn new(backend: Arc<dyn BackendClient>) -> Self {
        Self { backend, extended_context: false }
    }

    /// Reports the 1M-token input window for models whose profile supports it.
    pub fn with_extended_context(mut self, enabled: bool) -> Self {
        self.extended_context = enabled;
        self
    }

    pub async fn resolve(&self, cancel: &CancellationToken) -> Result<Vec<ModelEntry>, CoreError> {
        let catalog = match self.backend.list_foundation_models(cancel).await {
            Ok(catalog) => catalog,
            Err(CoreError::Cancelled) => return Ok(Vec::new()),
            Err(error) => return Err(CoreError::Catalog(error.to_string())),
        };
        if cancel.is_cancelled() {
            return Ok(Vec::new());
        }

        let profiles =
            self.backend.list_inference_profiles(ProfileKind::SystemDefined, cancel).await;
        let aliases = match profiles {
            Ok(profiles) => profiles
                .into_iter()
                .filter(|profile| profile.is_active())
                .map(|profile| profile.inference_profile_id)
                .collect::<HashSet<_>>(),
            Err(CoreError::Cancelled) => return Ok(Vec::new()),
            Err(error) => {
                warn!(event = "routing.aliases.unavailable", error = %error);
                HashSet::new()
            }
        };
        let custom = match self.backend.list_custom_deployments(cancel).await {
            Ok(custom) => custom,
            Err(CoreError::Cancelled) => return Ok(Vec::new()),
            Err(error) => {
                warn!(event = "routing.custom.unavailable", error = %error);
                Vec::new()
            }
        };

        let routing = region_routing(self.backend.region());
        let mut models = self.route_catalog(&catalog, &aliases, &custom, &routing, cancel).await;
        if cancel.is_cancelled() {
            debug!(event = "routing.cancelled");
            return Ok(Vec::new());
        }
        info!(
            event = "routing.resolved",
            region = %self.backend.region(),
            prefix = %routing.prefix,
            catalog = catalog.len(),
            aliases = aliases.len(),
            models = models.len()
        );
        for entry in &mut models {
            let limits = TokenLimits {
                max_input_tokens: entry.max_input_tokens,
                max_output_tokens: entry.max_output_tokens,
            };
            let profile = resolve_profile(&entry.base_model_id);
            entry.max_input_tokens = effective_input_limit(limits, &profile, self.extended_context);
        }
        Ok(models)
    }

    async fn route_catalog(
        &self,
        catalog: &[FoundationModelSummary],
        aliases: &HashSet<String>,
        custom: &[CustomDeployment],
        routing: &RegionRouting,
        cancel: &CancellationToken,
    ) -> Vec<ModelEntry> {
        let candidates = catalog
            .iter()
            .filter(|model| is_candidate(model))
            .map(|model| (model, route_options(model, aliases, routing)))
            .filter(|(_, options)| !options.is_empty())
            .collect::<Vec<_>>();

        let mut to_check = HashSet::new();
        for (model, options) in &candidates {
            to_check.insert(model.model_id.clone());
            to_check.extend(options.iter().map(|option| option.id.clone()));
        }
        to_check.extend(custom.iter().map(|deployment| deployment.id.clone()));

        let access = self.check_all(to_check, cancel).await;
        let allowed = |id: &str| access.get(id).copied().unwrap_or(false);

        let mut entries = Vec::with_capacity(candidates.len());
        for (model, options) in &candidates {
            if !allowed(&model.model_id) {
                debug!(event = "routing.base.denied", model = %model.model_id);
                continue;
            }
            let Some(option) = options.iter().find(|option| {
                let ok = allowed(&option.id);
                if !ok {
                    debug!(
                        event = "routing.alias.denied",
                        model = %model.model_id,
                        alias = %option.id
                    );
                }
                ok
            }) else {
                continue;
            };
            entries.push(catalog_entry(model, option, routing));
        }
        entries.sort_by(|left, right| {
            left.provider_name
                .to_ascii_lowercase()
                .cmp(&right.provider_name.to_ascii_lowercase())
                .then_with(|| left.display_name.cmp(&right.display_name))
        });

        let mut customs = custom
            .iter()
            .filter(|deployment| {
                let ok = allowed(&deployment.id);
                if !ok {
                    debug!(event = "routing.custom.denied", deployment = %deployment.id);
                }
                ok
            })
            .filter_map(|deployment| {
                let base = deployment
                    .base_model_id
                    .as_deref()
                    .and_then(|base_id| catalog.iter().find(|model| model.model_id == base_id));
                if base.is_some_and(|model| !has_chat_capabilities(model)) {
                    return None;
                }
                Some(custom_entry(deployment, base, routing))
            })
            .collect::<Vec<_>>();
        customs.sort_by(|left, right| left.display_name.cmp(&right.display_name));

        entries.extend(customs);
        entries
    }

    async fn check_all(
        &self,
        ids: HashSet<String>,
        cancel: &CancellationToken,
    ) -> HashMap<String, bool> {
        let checks = ids.into_iter().map(|id| async move {
            let allowed = match self.backend.check_access(&id, cancel).await {
                Ok(allowed) => allowed,
                Err(error) => {
                    debug!(event = "routing.access.failed", model = %id, error = %error);
                    false
                }
            };
            (id, allowed)
        });
        join_all(checks).await.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use xconverse_contracts::{ConverseStreamRequest, InferenceProfileSummary, ModelLifecycle};

    use super::*;
    use crate::backend::EventStream;

    #[derive(Default)]
    struct FakeBackend {
        region: String,
        catalog: Vec<FoundationModelSummary>,
        aliases: Vec<String>,
        custom: Vec<CustomDeployment>,
        denied: HashSet<String>,
        failing: HashSet<String>,
        catalog_fails: bool,
        checked: Mutex<Vec<String>>,
        cancel_on_check: Option<CancellationToken>,
    }

    #[async_trait]
    impl BackendClient for FakeBackend {
        fn region(&self) -> &str {
            &self.region
        }

        async fn list_foundation_models(
            &self,
            _cancel: &CancellationToken,
        ) -> Result<Vec<FoundationModelSummary>, CoreError> {
            if self.catalog_fails {
                return Err(CoreError::Backend("catalog down".to_string()));
            }
            Ok(self.catalog.clone())
        }

        async fn list_inference_profiles(
            &self,
            _kind: ProfileKind,
            _cancel: &CancellationToken,
        ) -> Result<Vec<InferenceProfileSummary>, CoreError> {
            Ok(self
                .aliases
                .iter()
                .map(|id| InferenceProfileSummary {
                    inference_profile_id: id.clone(),
                    ..InferenceProfileSummary::default()
                })
                .collect())
        }

        async fn list_custom_deployments(
            &self,
            _cancel: &CancellationToken,
        ) -> Result<Vec<CustomDeployment>, CoreError> {
            Ok(self.custom.clone())
        }

        async fn check_access(
            &self,
            model_id: &str,
            _cancel: &CancellationToken,
        ) -> Result<bool, CoreError> {
            self.checked.lock().expect("checked lock").push(model_id.to_string());
            if let Some(cancel) = &self.cancel_on_check {
                cancel.cancel();
            }
            if self.failing.contains(model_id) {
                return Err(CoreError::Backend("throttled".to_string()));
            }
            Ok(!self.denied.contains(model_id))
        }

        async fn open_stream(
            &self,
            _model_id: &str,
            _request: &ConverseStreamRequest,
            _cancel: &CancellationToken,
        ) -> Result<EventStream, CoreError> {
            Err(CoreError::Backend("not used".to_string()))
        }
    }

    fn model(id: &str, name: &str, provider: &str) -> FoundationModelSummary {
        FoundationModelSummary {
            model_id: id.to_string(),
            model_name: name.to_string(),
            provider_name: provider.to_string(),
            input_modalities: vec!["TEXT".to_string()],
            output_modalities: vec!["TEXT".to_string()],
            response_streaming_supported: Some(true),
            inference_types_supported: vec!["ON_DEMAND".to_string()],
            model_lifecycle: None,
        }
    }

    fn profile_only(mut summary: FoundationModelSummary) -> FoundationModelSummary {
        summary.inference_types_supported = vec!["INFERENCE_PROFILE".to_string()];
        summary
    }

    fn backend(region: &str) -> FakeBackend {
        FakeBackend { region: region.to_string(), ..FakeBackend::default() }
    }

    fn render(entries: &[ModelEntry]) -> Vec<String> {
        entries.iter().map(|entry| format!("{} | {}", entry.id, entry.display_name)).collect()
    }

    async fn resolve(backend: FakeBackend) -> Vec<ModelEntry> {
        ModelResolver::new(Arc::new(backend))
            .resolve(&CancellationToken::new())
            .await
            .expect("resolution must succeed")
    }

    #[test]
    fn region_prefix_follows_partition() {
        let cases = [
            ("us-east-1", "us", true),
            ("eu-central-1", "eu", true),
            ("ap-northeast-1", "apac", true),
            ("us-gov-west-1", "us-gov", false),
            ("us-iso-east-1", "us-iso-east", false),
            ("us-isob-east-1", "us-isob-east", false),
            ("us-isof-south-1", "us-isof", false),
            ("eu-isoe-west-1", "eu-isoe", false),
            ("cn-north-1", "cn", false),
            ("cn-northwest-1", "cn", false),
        ];
        for (region, prefix, standard) in cases {
            assert_eq!(
                region_routing(region),
                RegionRouting { prefix: prefix.to_string(), standard_partition: standard },
                "{region}"
            );
        }
    }

    #[test]
    fn candidate_filter_requires_streaming_text_and_tools() {
        let mut no_stream = model("anthropic.claude-3-haiku", "Haiku", "Anthropic");
        no_stream.response_streaming_supported = Some(false);
        let mut image_out = model("stability.sd3", "SD3", "Stability");
        image_out.output_modalities = vec!["IMAGE".to_string()];
        let mut provisioned = model("anthropic.claude-3-haiku", "Haiku", "Anthropic");
        provisioned.inference_types_supported = vec!["PROVISIONED".to_string()];
        let mut legacy = model("anthropic.claude-3-sonnet", "Sonnet", "Anthropic");
        legacy.model_lifecycle = Some(ModelLifecycle { status: "LEGACY".to_string() });
        let mut active = model("anthropic.claude-3-sonnet", "Sonnet", "Anthropic");
        active.model_lifecycle = Some(ModelLifecycle { status: "ACTIVE".to_string() });

        assert!(is_candidate(&model("anthropic.claude-3-haiku", "Haiku", "Anthropic")));
        assert!(!is_candidate(&no_stream));
        assert!(!is_candidate(&image_out));
        assert!(!is_candidate(&provisioned));
        assert!(!is_candidate(&legacy));
        assert!(is_candidate(&active));
        assert!(!is_candidate(&model("amazon.titan-text-express-v1", "Titan", "Amazon")));
    }

    #[tokio::test]
    async fn global_alias_is_preferred_and_falls_back() {
        let mut fake = backend("us-east-1");
        fake.catalog = vec![
            model("anthropic.claude-a", "Claude A", "Anthropic"),
            model("anthropic.claude-b", "Claude B", "Anthropic"),
            model("anthropic.claude-c", "Claude C", "Anthropic"),
            model("anthropic.claude-d", "Claude D", "Anthropic"),
        ];
        fake.aliases = [
            "global.anthropic.claude-a",
            "us.anthropic.claude-a",
            "global.anthropic.claude-b",
            "us.anthropic.claude-b",
            "global.anthropic.claude-c",
        ]
        .into_iter()
        .map(str::to_string)
        .collect();
        fake.denied =
            ["global.anthropic.claude-b", "global.anthropic.claude-c", "anthropic.claude-d"]
                .into_iter()
                .map(str::to_string)
                .collect();

        assert_eq!(
            render(&resolve(fake).await),
            vec![
                "global.anthropic.claude-a | Claude A (Global)",
                "us.anthropic.claude-b | Claude B (Regional: us)",
                "anthropic.claude-c | Claude C",
            ]
        );
    }

    #[tokio::test]
    async fn denied_base_drops_model_even_with_accessible_alias() {
        let mut fake = backend("eu-west-1");
        fake.catalog = vec![model("anthropic.claude-a", "Claude A", "Anthropic")];
        fake.aliases = vec!["eu.anthropic.claude-a".to_string()];
        fake.denied = HashSet::from(["anthropic.claude-a".to_string()]);

        assert!(resolve(fake).await.is_empty());
    }

    #[tokio::test]
    async fn failed_checks_count_as_denied() {
        let mut fake = backend("us-east-1");
        fake.catalog = vec![profile_only(model("anthropic.claude-a", "Claude A", "Anthropic"))];
        fake.aliases = vec!["us.anthropic.claude-a".to_string()];
        fake.failing = HashSet::from(["us.anthropic.claude-a".to_string()]);

        assert!(
            resolve(fake).await.is_empty(),
            "profile-only model without a usable alias is dropped"
        );
    }

    #[tokio::test]
    async fn bare_id_is_offered_only_for_on_demand_models() {
        let mut fake = backend("us-east-1");
        fake.catalog = vec![
            profile_only(model("anthropic.claude-a", "Claude A", "Anthropic")),
            model("anthropic.claude-b", "Claude B", "Anthropic"),
        ];
        fake.aliases = [
            "global.anthropic.claude-a",
            "us.anthropic.claude-a",
            "global.anthropic.claude-b",
            "us.anthropic.claude-b",
        ]
        .into_iter()
        .map(str::to_string)
        .collect();
        fake.denied = [
            "global.anthropic.claude-a",
            "us.anthropic.claude-a",
            "global.anthropic.claude-b",
            "us.anthropic.claude-b",
        ]
        .into_iter()
        .map(str::to_string)
        .collect();

        let entries = resolve(fake).await;
        assert_eq!(render(&entries), vec!["anthropic.claude-b | Claude B"]);
        assert_eq!(entries[0].route, RouteKind::Base);
    }

    #[tokio::test]
    async fn china_regions_use_regional_aliases_only() {
        let mut fake = backend("cn-north-1");
        fake.catalog = vec![profile_only(model("anthropic.claude-a", "Claude A", "Anthropic"))];
        fake.aliases =
            vec!["global.anthropic.claude-a".to_string(), "cn.anthropic.claude-a".to_string()];

        assert_eq!(
            render(&resolve(fake).await),
            vec!["cn.anthropic.claude-a | Claude A (Regional: cn)"]
        );
    }

    #[tokio::test]
    async fn global_aliases_are_skipped_outside_standard_partition() {
        let mut fake = backend("us-gov-west-1");
        fake.catalog = vec![profile_only(model("anthropic.claude-a", "Claude A", "Anthropic"))];
        fake.aliases =
            vec!["global.anthropic.claude-a".to_string(), "us-gov.anthropic.claude-a".to_string()];

        let entries = resolve(fake).await;
        assert_eq!(
            render(&entries),
            vec!["us-gov.anthropic.claude-a | Claude A (Regional: us-gov)"]
        );
        assert_eq!(entries[0].route, RouteKind::Regional);
        assert_eq!(entries[0].base_model_id, "anthropic.claude-a");
    }

    #[tokio::test]
    async fn entries_sort_by_provider_with_customs_last() {
        let mut fake = backend("ap-southeast-2");
        let mut nova = model("amazon.nova-pro-v1:0", "Nova Pro", "Amazon");
        nova.input_modalities.push("IMAGE".to_string());
        fake.catalog = vec![
            model("mistral.mistral-large-2407-v1:0", "Mistral Large", "Mistral AI"),
            model("anthropic.claude-3-5-haiku-20241022-v1:0", "Claude 3.5 Haiku", "Anthropic"),
            nova,
        ];
        fake.aliases = vec!["apac.amazon.nova-pro-v1:0".to_string()];
        fake.custom = vec![
            CustomDeployment {
                id: "arn:custom/zeta".to_string(),
                name: "zeta".to_string(),
                base_model_id: Some("anthropic.claude-3-5-haiku-20241022-v1:0".to_string()),
            },
            CustomDeployment {
                id: "arn:custom/alpha".to_string(),
                name: "alpha".to_string(),
                base_model_id: None,
            },
        ];

        let entries = resolve(fake).await;
        assert_eq!(
            render(&entries),
            vec![
                "apac.amazon.nova-pro-v1:0 | Nova Pro (Regional: apac)",
                "anthropic.claude-3-5-haiku-20241022-v1:0 | Claude 3.5 Haiku",
                "mistral.mistral-large-2407-v1:0 | Mistral Large",
                "arn:custom/alpha | alpha (Custom)",
                "arn:custom/zeta | zeta (Custom)",
            ]
        );
        assert!(entries[0].supports_image_input);
        assert_eq!(entries[0].max_output_tokens, 10_000);
        assert_eq!(entries[4].max_output_tokens, 8_192);
        assert_eq!(entries[4].provider_name, "Anthropic");
        assert_eq!(entries[3].provider_name, "Custom");
        assert!(entries.iter().all(|entry| entry.tool_calling));
    }

    #[tokio::test]
    async fn customs_follow_base_capabilities_and_access() {
        let mut fake = backend("us-east-1");
        fake.catalog = vec![model("amazon.titan-text-express-v1", "Titan", "Amazon")];
        fake.custom = vec![
            CustomDeployment {
                id: "arn:custom/titan".to_string(),
                name: "titan".to_string(),
                base_model_id: Some("amazon.titan-text-express-v1".to_string()),
            },
            CustomDeployment {
                id: "arn:custom/denied".to_string(),
                name: "denied".to_string(),
                base_model_id: None,
            },
        ];
        fake.denied = HashSet::from(["arn:custom/denied".to_string()]);

        assert!(resolve(fake).await.is_empty());
    }

    #[tokio::test]
    async fn catalog_failure_is_an_error() {
        let mut fake = backend("us-east-1");
        fake.catalog_fails = true;

        let error = ModelResolver::new(Arc::new(fake))
            .resolve(&CancellationToken::new())
            .await
            .expect_err("catalog failure must surface");
        assert_eq!(error.kind(), "Catalog");
    }

    #[tokio::test]
    async fn cancellation_returns_empty_list() {
        let cancel = CancellationToken::new();
        let mut fake = backend("us-east-1");
        fake.catalog = vec![model("anthropic.claude-a", "Claude A", "Anthropic")];
        fake.cancel_on_check = Some(cancel.clone());

        let entries = ModelResolver::new(Arc::new(fake))
            .resolve(&cancel)
            .await
            .expect("cancel is not an error");
        assert!(entries.is_empty());
    }

    #[tokio::test]
    async fn extended_context_raises_input_limit_for_capable_models() {
        let mut fake = backend("us-east-1");
        fake.catalog = vec![
            model("anthropic.claude-sonnet-4-20250514-v1:0", "Claude Sonnet 4", "Anthropic"),
            model("amazon.nova-pro-v1:0", "Nova Pro", "Amazon"),
        ];
        let fake = Arc::new(fake);

        let standard = ModelResolver::new(fake.clone())
            .resolve(&CancellationToken::new())
            .await
            .expect("resolution must succeed");
        let extended = ModelResolver::new(fake)
            .with_extended_context(true)
            .resolve(&CancellationToken::new())
            .await
            .expect("resolution must succeed");

        let input_limits = |entries: &[ModelEntry]| {
            entries
                .iter()
                .map(|entry| format!("{} | {}", entry.id, entry.max_input_tokens))
                .collect::<Vec<_>>()
        };
        assert_eq!(
            input_limits(&standard),
            vec![
                "amazon.nova-pro-v1:0 | 300000",
                "anthropic.claude-sonnet-4-20250514-v1:0 | 200000",
            ]
        );
        assert_eq!(
            input_limits(&extended),
            vec![
                "amazon.nova-pro-v1:0 | 300000",
                "anthropic.claude-sonnet-4-20250514-v1:0 | 1000000",
            ]
        );
    }

    #[tokio::test]
    async fn base_and_aliases_are_checked_once_each() {
        let mut fake = backend("us-east-1");
        fake.catalog = vec![model("anthropic.claude-a", "Claude A", "Anthropic")];
        fake.aliases =
            vec!["global.anthropic.claude-a".to_string(), "us.anthropic.claude-a".to_string()];
        let fake = Arc::new(fake);

        let resolver = ModelResolver::new(fake.clone());
        let entries =
            resolver.resolve(&CancellationToken::new()).await.expect("resolution must succeed");

        let mut checked = fake.checked.lock().expect("checked lock").clone();
        checked.sort();
        assert_eq!(
            checked,
            vec!["anthropic.claude-a", "global.anthropic.claude-a", "us.anthropic.claude-a"]
        );
        assert_eq!(entries[0].route, RouteKind::Global);
    }
}
