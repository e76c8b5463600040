// db config
// server config
// oss config

use crate::errors::Error;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    // db config
    pub db: DbConfig,
    // server config
    pub server: ServerConfig,
    pub oss: OssConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DbConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OssProvider {
    S3,
    Qiniu,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OssConfig {
    pub provider: OssProvider,
    pub endpoint: String,
    pub access_key: String,
    pub secret_key: String,
    pub bucket: String,
    #[serde(default = "default_region")]
    pub region: String,
    /// public base url the uploaded objects are served from
    pub public_url: String,
}

fn default_region() -> String {
    String::from("us-east-1")
}

impl Config {
    pub fn load(filename: impl AsRef<Path>) -> Result<Self, Error> {
        let content = fs::read_to_string(filename).map_err(|_| Error::config_read())?;
        serde_yaml::from_str(&content).map_err(|e| Error::config_parse(e.to_string()))
    }
}

impl DbConfig {
    pub fn server_url(&self) -> String {
        match (self.user.is_empty(), self.password.is_empty()) {
            (true, _) => format!("mongodb://{}:{}", self.host, self.port),
            (false, true) => format!("mongodb://{}@{}:{}", self.user, self.host, self.port),
            (false, false) => format!(
                "mongodb://{}:{}@{}:{}",
                self.user, self.password, self.host, self.port
            ),
        }
    }

    pub fn url(&self) -> String {
        format!("{}/{}", self.server_url(), self.database)
    }
}

impl ServerConfig {
    pub fn server_url(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn url(&self, https: bool) -> String {
        if https {
            format!("https://{}:{}", self.host, self.port)
        } else {
            format!("http://{}:{}", self.host, self.port)
        }
    }
}

impl OssConfig {
    /// provider credentials must be present before any upload is attempted
    pub fn validate(&self) -> Result<(), Error> {
        if self.access_key.is_empty() || self.secret_key.is_empty() {
            return Err(Error::config_parse("oss credentials are not configured"));
        }
        if self.bucket.is_empty() {
            return Err(Error::config_parse("oss bucket is not configured"));
        }
        if self.public_url.is_empty() {
            return Err(Error::config_parse("oss public url is not configured"));
        }
        Ok(())
    }

    pub fn object_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_url.trim_end_matches('/'), key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load() {
        let config = Config::load("./fixtures/blog.yml").unwrap();
        assert_eq!(config.db.host, "localhost");
        assert_eq!(config.db.port, 27017);
        assert_eq!(config.db.database, "blog");
        assert_eq!(config.oss.provider, OssProvider::S3);
    }

    #[test]
    fn test_object_url() {
        let config = Config::load("./fixtures/blog.yml").unwrap();
        assert_eq!(
            config.oss.object_url("images/abc.png"),
            "http://localhost:9000/blog/images/abc.png"
        );
    }

    #[test]
    fn test_validate() {
        let mut config = Config::load("./fixtures/blog.yml").unwrap();
        assert!(config.oss.validate().is_ok());
        config.oss.access_key.clear();
        assert!(config.oss.validate().is_err());
    }
}
