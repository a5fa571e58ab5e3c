use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::collections::HashMap;

/// Model configuration for the relay.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ModelConfig {
    #[serde(default)]
    pub name: String,
    #[serde(alias = "type")]
    pub provider: ModelProvider,
    #[serde(default, flatten)]
    pub settings: HashMap<String, serde_yaml::Value>,
}

impl ModelConfig {
    /// Reads a typed value from the provider-specific settings.
    pub fn get_setting<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.settings
            .get(key)
            .and_then(|v| serde_yaml::from_value(v.clone()).ok())
    }
}

/// Supported model provider integrations (serialized as lowercase strings).
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum ModelProvider {
    Openai,
    Test,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_setting() {
        let config = ModelConfig {
            name: "m".to_string(),
            provider: ModelProvider::Test,
            settings: HashMap::from([
                ("base_url".to_string(), "http://localhost".into()),
                (
                    "max_tokens".to_string(),
                    serde_yaml::Value::Number(4096.into()),
                ),
            ]),
        };
        assert_eq!(
            config.get_setting::<String>("base_url"),
            Some("http://localhost".to_string())
        );
        assert_eq!(config.get_setting::<u32>("max_tokens"), Some(4096));
        assert_eq!(config.get_setting::<String>("missing"), None);
    }
}
