//! Layered configuration: defaults, then `roost.toml`, then `ROOST_`
//! environment variables (nested fields separated by `__`, e.g.
//! `ROOST_BLUESKY__TARGET_HANDLE`).

pub mod error;

use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ErrorKind, Result};

pub const CONFIG_FILE: &str = "roost.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub bluesky: BlueskyConfig,
    pub storage: StorageConfig,
    pub transcode: TranscodeConfig,
    pub rehost: RehostConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BlueskyConfig {
    /// PDS host used for sessions and blob retrieval.
    pub service: String,
    /// Account identifier for an app-password session. Optional; without
    /// credentials all reads go through the public API.
    pub identifier: Option<String>,
    pub password: Option<String>,
    /// Handle of the account being archived.
    pub target_handle: String,
}

impl Default for BlueskyConfig {
    fn default() -> Self {
        Self {
            service: "https://bsky.social".to_string(),
            identifier: None,
            password: None,
            target_handle: String::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub bucket: String,
    pub region: Option<String>,
    /// Custom S3 endpoint for non-AWS providers.
    pub endpoint: Option<String>,
    /// Base URL under which stored blobs are publicly served.
    pub public_base_url: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscodeConfig {
    pub token_id: Option<String>,
    pub token_secret: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RehostConfig {
    /// Hosts besides the blob store whose URLs are treated as already
    /// rehosted.
    pub extra_owned_hosts: Vec<String>,
}

impl Default for RehostConfig {
    fn default() -> Self {
        Self {
            extra_owned_hosts: vec!["stream.mux.com".to_string(), "image.mux.com".to_string()],
        }
    }
}

impl Config {
    /// The layered figment backing [`Config::load`], exposed for callers
    /// that want to merge additional sources.
    pub fn figment() -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(CONFIG_FILE))
            .merge(Env::prefixed("ROOST_").split("__"))
    }

    pub fn load() -> Result<Self> {
        let config: Config = Self::figment().extract().or_raise(|| ErrorKind::Load)?;
        config.validate()?;
        debug!(target = config.bluesky.target_handle, "configuration loaded");
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.bluesky.target_handle.trim().is_empty() {
            exn::bail!(ErrorKind::Invalid("bluesky.target_handle must be set"));
        }
        if self.bluesky.identifier.is_some() != self.bluesky.password.is_some() {
            exn::bail!(ErrorKind::Invalid("bluesky.identifier and bluesky.password must be set together"));
        }
        if self.storage.bucket.trim().is_empty() {
            exn::bail!(ErrorKind::Invalid("storage.bucket must be set"));
        }
        if self.storage.public_base_url.trim().is_empty() {
            exn::bail!(ErrorKind::Invalid("storage.public_base_url must be set"));
        }
        if self.transcode.token_id.is_some() != self.transcode.token_secret.is_some() {
            exn::bail!(ErrorKind::Invalid("transcode.token_id and transcode.token_secret must be set together"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn valid() -> Config {
        let mut config = Config::default();
        config.bluesky.target_handle = "target.example".to_string();
        config.storage.bucket = "roost-media".to_string();
        config.storage.public_base_url = "https://media.example".to_string();
        config
    }

    #[test]
    fn test_valid_config_passes() {
        valid().validate().unwrap();
    }

    #[rstest]
    #[case::missing_target(|c: &mut Config| c.bluesky.target_handle.clear())]
    #[case::missing_bucket(|c: &mut Config| c.storage.bucket.clear())]
    #[case::missing_base_url(|c: &mut Config| c.storage.public_base_url.clear())]
    #[case::password_without_identifier(|c: &mut Config| c.bluesky.password = Some("secret".to_string()))]
    #[case::token_id_without_secret(|c: &mut Config| c.transcode.token_id = Some("id".to_string()))]
    fn test_invalid_config_rejected(#[case] mutate: fn(&mut Config)) {
        let mut config = valid();
        mutate(&mut config);
        let err = config.validate().unwrap_err();
        assert!(matches!(&*err, ErrorKind::Invalid(_)));
    }

    #[test]
    fn test_layering_file_then_env() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                CONFIG_FILE,
                r#"
                    [bluesky]
                    target_handle = "from-file.example"

                    [storage]
                    bucket = "roost-media"
                    public_base_url = "https://media.example"
                "#,
            )?;
            jail.set_env("ROOST_BLUESKY__TARGET_HANDLE", "from-env.example");
            jail.set_env("ROOST_STORAGE__REGION", "eu-west-1");

            let config = Config::load().expect("config should load");
            // Environment overrides the file; file fills the rest.
            assert_eq!(config.bluesky.target_handle, "from-env.example");
            assert_eq!(config.storage.bucket, "roost-media");
            assert_eq!(config.storage.region.as_deref(), Some("eu-west-1"));
            // Untouched fields keep their defaults.
            assert_eq!(config.bluesky.service, "https://bsky.social");
            assert!(config.rehost.extra_owned_hosts.contains(&"stream.mux.com".to_string()));
            Ok(())
        });
    }

    #[test]
    fn test_defaults_alone_fail_validation() {
        figment::Jail::expect_with(|_jail| {
            let err = Config::load().expect_err("empty config must not validate");
            assert!(matches!(&*err, ErrorKind::Invalid(_)));
            Ok(())
        });
    }
}
