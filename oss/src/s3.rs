use async_trait::async_trait;
use aws_sdk_s3::config::{Builder, Credentials, Region};
use aws_sdk_s3::Client;
use aws_smithy_runtime_api::client::result::SdkError;
use bytes::Bytes;
use tracing::error;

use abi::config::{Config, OssConfig};
use abi::errors::Error;

use crate::Oss;

/// s3-compatible backend (minio, cos, r2 and friends)
#[derive(Debug, Clone)]
pub(crate) struct S3Client {
    bucket: String,
    oss_config: OssConfig,
    client: Client,
}

impl S3Client {
    pub async fn new(config: &Config) -> Result<Self, Error> {
        let credentials = Credentials::new(
            &config.oss.access_key,
            &config.oss.secret_key,
            None,
            None,
            "S3Credentials",
        );

        let s3_config = Builder::new()
            .region(Region::new(config.oss.region.clone()))
            .credentials_provider(credentials)
            .endpoint_url(&config.oss.endpoint)
            .force_path_style(true)
            // use latest behavior version, have to set it manually,
            // although we turn on the feature
            .behavior_version(aws_sdk_s3::config::BehaviorVersion::latest())
            .build();

        let client = Client::from_conf(s3_config);

        let self_ = Self {
            client,
            bucket: config.oss.bucket.clone(),
            oss_config: config.oss.clone(),
        };

        self_.create_bucket().await?;
        Ok(self_)
    }

    async fn check_bucket_exists(&self) -> Result<bool, Error> {
        match self.client.head_bucket().bucket(&self.bucket).send().await {
            Ok(_response) => Ok(true),
            Err(SdkError::ServiceError(e)) => {
                if e.raw().status().as_u16() == 404 {
                    Ok(false)
                } else {
                    Err(Error::oss("check_bucket_exists error"))
                }
            }
            Err(e) => {
                error!("check_bucket_exists error: {:?}", e);
                Err(Error::oss(e.to_string()))
            }
        }
    }

    async fn create_bucket(&self) -> Result<(), Error> {
        if self.check_bucket_exists().await? {
            return Ok(());
        }
        self.client
            .create_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map_err(|e| Error::oss(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl Oss for S3Client {
    async fn file_exists(&self, key: &str) -> Result<bool, Error> {
        Ok(self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .is_ok())
    }

    async fn upload_file(
        &self,
        key: &str,
        content: Vec<u8>,
        content_type: &str,
    ) -> Result<String, Error> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(content.into())
            .send()
            .await
            .map_err(|e| Error::oss(e.to_string()))?;
        Ok(self.oss_config.object_url(key))
    }

    async fn download_file(&self, key: &str) -> Result<Bytes, Error> {
        let resp = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| Error::oss(e.to_string()))?;

        let data = resp
            .body
            .collect()
            .await
            .map_err(|e| Error::oss(e.to_string()))?;

        Ok(data.into_bytes())
    }

    async fn delete_file(&self, key: &str) -> Result<(), Error> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| Error::oss(e.to_string()))?;
        Ok(())
    }
}
