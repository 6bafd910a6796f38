use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Settings for delivering directly to recipient MX servers.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectConfig {
    /// Envelope and header sender address. Also the DKIM `i=` identity.
    pub from_email: String,
    /// Display name for the From header. May be empty.
    pub from_name: String,
    /// Domain claimed by the DKIM signature (`d=` tag). Also used as the
    /// HELO name when talking to receiving servers.
    pub signing_domain: String,
    /// DKIM selector (`s=` tag); the public key must be published at
    /// `<selector>._domainkey.<signing_domain>`.
    pub dkim_selector: String,
    /// Path to the PEM-encoded RSA private key.
    pub dkim_private_key: PathBuf,
    /// Connection and read timeout for each delivery attempt.
    pub connection_timeout_secs: u64,
    /// Port to connect to on receiving servers.
    pub smtp_port: u16,
}

impl Default for DirectConfig {
    fn default() -> DirectConfig {
        DirectConfig {
            from_email: String::new(),
            from_name: String::new(),
            signing_domain: String::new(),
            dkim_selector: String::new(),
            dkim_private_key: PathBuf::new(),
            connection_timeout_secs: 60,
            smtp_port: 25,
        }
    }
}

impl DirectConfig {
    /// Check that every required field is present, reporting all missing
    /// fields at once.
    pub fn validate(&self) -> Result<(), Error> {
        let mut missing: Vec<String> = Vec::new();
        if self.from_email.is_empty() {
            missing.push("from_email".to_owned());
        }
        if self.signing_domain.is_empty() {
            missing.push("signing_domain".to_owned());
        }
        if self.dkim_selector.is_empty() {
            missing.push("dkim_selector".to_owned());
        }
        if self.dkim_private_key.as_os_str().is_empty() {
            missing.push("dkim_private_key".to_owned());
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::Config(missing))
        }
    }
}

/// Settings for delivering through a fixed authenticated relay over
/// implicit TLS.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub from_email: String,
    pub from_name: String,
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub connection_timeout_secs: u64,
}

impl Default for RelayConfig {
    fn default() -> RelayConfig {
        RelayConfig {
            from_email: String::new(),
            from_name: String::new(),
            host: String::new(),
            port: 465,
            username: String::new(),
            password: String::new(),
            connection_timeout_secs: 60,
        }
    }
}

impl RelayConfig {
    pub fn validate(&self) -> Result<(), Error> {
        let mut missing: Vec<String> = Vec::new();
        if self.from_email.is_empty() {
            missing.push("from_email".to_owned());
        }
        if self.host.is_empty() {
            missing.push("host".to_owned());
        }
        if self.username.is_empty() {
            missing.push("username".to_owned());
        }
        if self.password.is_empty() {
            missing.push("password".to_owned());
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::Config(missing))
        }
    }
}

/// Which delivery mechanism to use.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryConfig {
    /// Resolve MX records and deliver straight to the recipient's servers.
    Direct(DirectConfig),
    /// Hand everything to one authenticated relay.
    Relay(RelayConfig),
}

impl Default for DeliveryConfig {
    fn default() -> DeliveryConfig {
        DeliveryConfig::Direct(Default::default())
    }
}

/// Settings for the templated dispatcher.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateConfig {
    /// Directory holding the message templates.
    pub templates: PathBuf,
    /// When false, rendered messages are logged instead of sent.
    pub enabled: bool,
    /// Run deliveries on a dedicated worker thread instead of blocking
    /// the caller.
    pub use_worker: bool,
}

impl Default for TemplateConfig {
    fn default() -> TemplateConfig {
        TemplateConfig {
            templates: PathBuf::new(),
            enabled: true,
            use_worker: false,
        }
    }
}

impl TemplateConfig {
    pub fn validate(&self) -> Result<(), Error> {
        if self.templates.as_os_str().is_empty() {
            Err(Error::Config(vec!["templates".to_owned()]))
        } else {
            Ok(())
        }
    }
}

/// Top-level configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub delivery: DeliveryConfig,
    pub template: Option<TemplateConfig>,
}

impl Config {
    /// Load and parse a TOML configuration file.
    pub fn from_toml_file(path: &Path) -> Result<Config, Error> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::ConfigLoad(format!("{}: {}", path.display(), e)))?;
        toml::from_str(&text).map_err(|e| Error::ConfigLoad(format!("{}: {}", path.display(), e)))
    }

    pub fn validate(&self) -> Result<(), Error> {
        match self.delivery {
            DeliveryConfig::Direct(ref dc) => dc.validate()?,
            DeliveryConfig::Relay(ref rc) => rc.validate()?,
        }
        if let Some(ref tc) = self.template {
            tc.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn direct_validation_lists_every_missing_field() {
        let config = DirectConfig::default();
        match config.validate() {
            Err(Error::Config(missing)) => {
                assert_eq!(
                    missing,
                    vec![
                        "from_email",
                        "signing_domain",
                        "dkim_selector",
                        "dkim_private_key"
                    ]
                );
            }
            other => panic!("expected Config error, got {:?}", other),
        }
    }

    #[test]
    fn direct_validation_accepts_complete_config() {
        let config = DirectConfig {
            from_email: "postmaster@example.com".to_owned(),
            signing_domain: "example.com".to_owned(),
            dkim_selector: "mail".to_owned(),
            dkim_private_key: PathBuf::from("dkim8.pem"),
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn relay_validation_lists_every_missing_field() {
        let config = RelayConfig {
            host: "smtp.example.com".to_owned(),
            ..Default::default()
        };
        match config.validate() {
            Err(Error::Config(missing)) => {
                assert_eq!(missing, vec!["from_email", "username", "password"]);
            }
            other => panic!("expected Config error, got {:?}", other),
        }
    }

    #[test]
    fn defaults_are_sensible() {
        let config = DirectConfig::default();
        assert_eq!(config.connection_timeout_secs, 60);
        assert_eq!(config.smtp_port, 25);
        let relay = RelayConfig::default();
        assert_eq!(relay.port, 465);
    }

    #[test]
    fn parses_toml() {
        let text = r#"
            [delivery.direct]
            from_email = "postmaster@example.com"
            from_name = "PostMaster"
            signing_domain = "example.com"
            dkim_selector = "mail"
            dkim_private_key = "/etc/mxsend/dkim8.pem"
            connection_timeout_secs = 5

            [template]
            templates = "/etc/mxsend/templates"
            use_worker = true
        "#;
        let config: Config = toml::from_str(text).unwrap();
        config.validate().unwrap();
        match config.delivery {
            DeliveryConfig::Direct(ref dc) => {
                assert_eq!(dc.signing_domain, "example.com");
                assert_eq!(dc.connection_timeout_secs, 5);
                assert_eq!(dc.smtp_port, 25);
            }
            _ => panic!("expected direct delivery"),
        }
        assert!(config.template.unwrap().use_worker);
    }
}
