use anyhow::{bail, Result};
use clap::Parser;
use std::path::PathBuf;

use crate::api::AuthSettings;

#[derive(Parser, Debug, Clone)]
#[command(name = "chartboard-server")]
#[command(about = "CSV datasets and chart dashboards over HTTP", long_about = None)]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Config {
    /// Address to bind
    #[arg(long, env = "CHARTBOARD_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port to bind
    #[arg(long, env = "CHARTBOARD_PORT", default_value_t = 3000)]
    pub port: u16,

    /// Directory holding the table files; blobs go to `<data-dir>/blobs`
    #[arg(long, env = "CHARTBOARD_DATA_DIR", default_value = "./data")]
    pub data_dir: PathBuf,

    /// Base URL clients use to reach this server, used for download links
    #[arg(long, env = "CHARTBOARD_PUBLIC_URL", default_value = "http://127.0.0.1:3000")]
    pub public_url: String,

    /// External identity that is always granted the admin role
    #[arg(long, env = "CHARTBOARD_OWNER_OPEN_ID")]
    pub owner_open_id: Option<String>,

    /// Shared secret the identity broker sends to the sign-in callback
    #[arg(long, env = "CHARTBOARD_IDENTITY_SECRET", hide_env_values = true)]
    pub identity_secret: String,
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.identity_secret.trim().is_empty() {
            bail!("identity secret must not be empty");
        }
        if !(self.public_url.starts_with("http://") || self.public_url.starts_with("https://")) {
            bail!("public URL must start with http:// or https://");
        }
        Ok(())
    }

    pub fn blob_dir(&self) -> PathBuf {
        self.data_dir.join("blobs")
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn auth_settings(&self) -> AuthSettings {
        AuthSettings {
            identity_secret: self.identity_secret.clone(),
            owner_open_id: self.owner_open_id.clone().filter(|id| !id.trim().is_empty()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Config {
        let mut argv = vec!["chartboard-server"];
        argv.extend_from_slice(args);
        Config::try_parse_from(argv).unwrap()
    }

    #[test]
    fn flags_override_defaults() {
        let config = parse(&[
            "--identity-secret",
            "s3cret",
            "--port",
            "8080",
            "--data-dir",
            "/var/lib/chartboard",
        ]);
        assert_eq!(config.port, 8080);
        assert_eq!(config.blob_dir(), PathBuf::from("/var/lib/chartboard/blobs"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_bad_public_url_and_blank_secret() {
        let config = parse(&["--identity-secret", "s", "--public-url", "ftp://files"]);
        assert!(config.validate().is_err());

        let config = parse(&["--identity-secret", "  "]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn blank_owner_is_ignored() {
        let config = parse(&["--identity-secret", "s", "--owner-open-id", ""]);
        assert_eq!(config.auth_settings().owner_open_id, None);
    }
}
