use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;
use bytes::Bytes;
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use sha1::Sha1;
use tracing::error;

use abi::config::{Config, OssConfig};
use abi::errors::Error;

use crate::Oss;

type HmacSha1 = Hmac<Sha1>;

/// qiniu kodo backend, form-upload protocol
#[derive(Debug, Clone)]
pub(crate) struct QiniuClient {
    oss_config: OssConfig,
    client: reqwest::Client,
}

const RS_HOST: &str = "https://rs.qiniu.com";
const TOKEN_TTL_SECS: i64 = 3600;

#[derive(Debug, Deserialize)]
struct QiniuError {
    error: String,
}

impl QiniuClient {
    pub fn new(config: &Config) -> Self {
        Self {
            oss_config: config.oss.clone(),
            client: reqwest::Client::new(),
        }
    }

    fn sign(&self, data: &[u8]) -> String {
        // hmac accepts keys of any length
        let mut mac = HmacSha1::new_from_slice(self.oss_config.secret_key.as_bytes())
            .expect("hmac accepts any key length");
        mac.update(data);
        URL_SAFE.encode(mac.finalize().into_bytes())
    }

    /// upload token: `AK:sign(policy):policy`
    fn upload_token(&self, key: &str) -> String {
        let policy = serde_json::json!({
            "scope": format!("{}:{}", self.oss_config.bucket, key),
            "deadline": Utc::now().timestamp() + TOKEN_TTL_SECS,
        });
        let encoded = URL_SAFE.encode(policy.to_string());
        let sign = self.sign(encoded.as_bytes());
        format!("{}:{}:{}", self.oss_config.access_key, sign, encoded)
    }

    /// management token for the rs api: `QBox AK:sign(path + "\n")`
    fn access_token(&self, path: &str) -> String {
        let sign = self.sign(format!("{path}\n").as_bytes());
        format!("QBox {}:{}", self.oss_config.access_key, sign)
    }

    fn entry(&self, key: &str) -> String {
        URL_SAFE.encode(format!("{}:{}", self.oss_config.bucket, key))
    }

    async fn fail(resp: reqwest::Response) -> Error {
        let status = resp.status();
        let message = match resp.json::<QiniuError>().await {
            Ok(e) => e.error,
            Err(_) => status.to_string(),
        };
        error!("qiniu request failed: {status} {message}");
        Error::oss(message)
    }
}

#[async_trait]
impl Oss for QiniuClient {
    async fn file_exists(&self, key: &str) -> Result<bool, Error> {
        let path = format!("/stat/{}", self.entry(key));
        let resp = self
            .client
            .get(format!("{RS_HOST}{path}"))
            .header("Authorization", self.access_token(&path))
            .send()
            .await?;
        Ok(resp.status().is_success())
    }

    async fn upload_file(
        &self,
        key: &str,
        content: Vec<u8>,
        content_type: &str,
    ) -> Result<String, Error> {
        let part = Part::bytes(content)
            .file_name(key.to_string())
            .mime_str(content_type)
            .map_err(|e| Error::oss(e.to_string()))?;
        let form = Form::new()
            .text("token", self.upload_token(key))
            .text("key", key.to_string())
            .part("file", part);

        let resp = self
            .client
            .post(&self.oss_config.endpoint)
            .multipart(form)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(Self::fail(resp).await);
        }
        Ok(self.oss_config.object_url(key))
    }

    async fn download_file(&self, key: &str) -> Result<Bytes, Error> {
        let resp = self.client.get(self.oss_config.object_url(key)).send().await?;
        if !resp.status().is_success() {
            return Err(Self::fail(resp).await);
        }
        Ok(resp.bytes().await?)
    }

    async fn delete_file(&self, key: &str) -> Result<(), Error> {
        let path = format!("/delete/{}", self.entry(key));
        let resp = self
            .client
            .post(format!("{RS_HOST}{path}"))
            .header("Authorization", self.access_token(&path))
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(Self::fail(resp).await);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use abi::config::OssProvider;

    fn client() -> QiniuClient {
        QiniuClient {
            oss_config: OssConfig {
                provider: OssProvider::Qiniu,
                endpoint: "https://upload.qiniup.com".into(),
                access_key: "ak".into(),
                secret_key: "sk".into(),
                bucket: "blog".into(),
                region: "z0".into(),
                public_url: "https://cdn.example.com".into(),
            },
            client: reqwest::Client::new(),
        }
    }

    #[test]
    fn upload_token_shape() {
        let token = client().upload_token("images/a.png");
        let parts: Vec<&str> = token.split(':').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "ak");
        // policy is url-safe base64 of the scope json
        let policy = URL_SAFE.decode(parts[2]).unwrap();
        let policy: serde_json::Value = serde_json::from_slice(&policy).unwrap();
        assert_eq!(policy["scope"], "blog:images/a.png");
    }

    #[test]
    fn access_token_is_prefixed() {
        let token = client().access_token("/stat/abc");
        assert!(token.starts_with("QBox ak:"));
    }

    #[test]
    fn entry_encodes_bucket_and_key() {
        let entry = client().entry("images/a.png");
        let decoded = URL_SAFE.decode(entry).unwrap();
        assert_eq!(decoded, b"blog:images/a.png");
    }
}
