use serde::Deserialize;
use serde::Deserializer;

fn default_max_backoff_exponent() -> u32 {
    8
}

fn default_reload_delay_secs() -> u64 {
    30
}

/// Access point ids are printed with dashes on the device label; the cloud wants them bare.
fn normalize_accesspoint_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    Ok(raw.replace('-', "").to_uppercase())
}

/// Configuration for the HomematicIP cloud integration
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// SGTIN of the access point (dashes allowed)
    #[serde(deserialize_with = "normalize_accesspoint_id")]
    pub accesspoint_id: String,

    /// Auth token issued when the client was registered
    pub auth_token: String,

    /// Pre-computed client auth header value
    pub client_auth: String,

    /// Optional home name, prefixed to every entity name
    #[serde(default)]
    pub name: Option<String>,

    /// Base URL of the REST endpoint, e.g. `https://ps1.homematic.com:6969`
    pub rest_url: String,

    /// URL of the push websocket, e.g. `wss://ws1.homematic.com:8888`
    pub websocket_url: String,

    /// Reconnect delays are `2^n` seconds with `n` capped at this value
    #[serde(default = "default_max_backoff_exponent")]
    pub max_backoff_exponent: u32,

    /// Delay before re-creating entities after a device was removed
    #[serde(default = "default_reload_delay_secs")]
    pub reload_delay_secs: u64,
}

impl Config {
    pub(crate) fn validate(&self) -> Result<(), String> {
        if self.accesspoint_id.is_empty() {
            return Err("integrations.homematicip.accesspoint_id must not be empty".into());
        }
        if self.auth_token.is_empty() {
            return Err("integrations.homematicip.auth_token must not be empty".into());
        }
        if self.max_backoff_exponent > 16 {
            return Err(format!(
                "integrations.homematicip.max_backoff_exponent must be at most 16, got {}",
                self.max_backoff_exponent
            ));
        }
        for (key, value) in [
            ("rest_url", &self.rest_url),
            ("websocket_url", &self.websocket_url),
        ] {
            url::Url::parse(value).map_err(|e| {
                format!("integrations.homematicip.{key} is not a valid URL ({value}): {e}")
            })?;
        }
        Ok(())
    }

    /// Home name with empty strings treated as unset
    pub fn home_name(&self) -> Option<&str> {
        self.name.as_deref().filter(|n| !n.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &str) -> Config {
        toml::from_str(&format!(
            r#"
            accesspoint_id = "3014-F711-A000-0000-0000-0001"
            auth_token = "token"
            client_auth = "auth"
            rest_url = "https://ps1.homematic.com:6969"
            websocket_url = "wss://ws1.homematic.com:8888"
            {extra}
            "#
        ))
        .unwrap()
    }

    #[test]
    fn test_accesspoint_id_normalized() {
        let config = parse("");
        assert_eq!(config.accesspoint_id, "3014F711A000000000000001");
        assert!(config.validate().is_ok());
        assert_eq!(config.home_name(), None);
    }

    #[test]
    fn test_empty_name_is_unset() {
        assert_eq!(parse(r#"name = """#).home_name(), None);
        assert_eq!(parse(r#"name = "Cabin""#).home_name(), Some("Cabin"));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = parse("max_backoff_exponent = 40");
        assert!(config.validate().unwrap_err().contains("max_backoff_exponent"));

        let mut config = parse("");
        config.rest_url = "not a url".to_string();
        assert!(config.validate().unwrap_err().contains("rest_url"));
    }
}
