use serde::{Deserialize, Serialize};

/// MCP server enabled for advanced search models
pub const ADVANCED_SEARCH_SERVER: &str = "advanced-search";

/// Behavior selected by the suffix of the caller's model name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelVariant {
    Default,
    Search,
    AdvancedSearch,
    NoThinking,
}

impl ModelVariant {
    #[must_use]
    pub fn from_model(model: &str) -> Self {
        if model.ends_with("-advanced-search") {
            Self::AdvancedSearch
        } else if model.ends_with("-search") {
            Self::Search
        } else if model.ends_with("-nothinking") {
            Self::NoThinking
        } else {
            Self::Default
        }
    }
}

/// `features` object of the upstream request body
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FeatureFlags {
    pub image_generation: bool,
    pub web_search: bool,
    pub auto_web_search: bool,
    pub preview_mode: bool,
    pub flags: Vec<String>,
    pub enable_thinking: bool,
}

/// Feature flags plus the MCP servers to enable, resolved once per request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeatureSet {
    pub features: FeatureFlags,
    pub mcp_servers: Vec<String>,
}

impl FeatureSet {
    /// Resolve flags for a caller model. Non-streaming requests always get
    /// everything off, thinking included.
    #[must_use]
    pub fn resolve(model: &str, streaming: bool) -> Self {
        if !streaming {
            return Self::default();
        }

        let variant = ModelVariant::from_model(model);
        let searching = matches!(variant, ModelVariant::Search | ModelVariant::AdvancedSearch);

        let features = FeatureFlags {
            web_search: searching,
            auto_web_search: searching,
            preview_mode: searching,
            enable_thinking: variant != ModelVariant::NoThinking,
            ..FeatureFlags::default()
        };

        let mcp_servers = if variant == ModelVariant::AdvancedSearch {
            vec![ADVANCED_SEARCH_SERVER.to_string()]
        } else {
            Vec::new()
        };

        Self {
            features,
            mcp_servers,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_model_thinks_without_search() {
        let set = FeatureSet::resolve("glm-4.6", true);
        assert!(set.features.enable_thinking);
        assert!(!set.features.web_search);
        assert!(!set.features.auto_web_search);
        assert!(!set.features.preview_mode);
        assert!(!set.features.image_generation);
        assert!(set.features.flags.is_empty());
        assert!(set.mcp_servers.is_empty());
    }

    #[test]
    fn search_model_enables_search_only() {
        let set = FeatureSet::resolve("glm-4.6-search", true);
        assert!(set.features.web_search);
        assert!(set.features.auto_web_search);
        assert!(set.features.preview_mode);
        assert!(set.features.enable_thinking);
        assert!(set.mcp_servers.is_empty());
    }

    #[test]
    fn advanced_search_adds_mcp_server() {
        let set = FeatureSet::resolve("glm-4.6-advanced-search", true);
        assert!(set.features.web_search);
        assert!(set.features.enable_thinking);
        assert_eq!(set.mcp_servers, vec!["advanced-search".to_string()]);
    }

    #[test]
    fn nothinking_disables_thinking() {
        let set = FeatureSet::resolve("glm-4.6-nothinking", true);
        assert!(!set.features.enable_thinking);
        assert!(!set.features.web_search);
        assert!(set.mcp_servers.is_empty());
    }

    #[test]
    fn non_streaming_turns_everything_off() {
        for model in ["glm-4.6", "glm-4.6-search", "glm-4.6-advanced-search", "glm-4.6-nothinking"] {
            assert_eq!(FeatureSet::resolve(model, false), FeatureSet::default(), "{model}");
        }
    }

    #[test]
    fn serializes_flags_in_wire_shape() {
        let value = serde_json::to_value(FeatureSet::resolve("glm-4.6", true).features).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "image_generation": false,
                "web_search": false,
                "auto_web_search": false,
                "preview_mode": false,
                "flags": [],
                "enable_thinking": true
            })
        );
    }
}
