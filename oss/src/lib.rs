use abi::config::{Config, OssProvider};
use abi::errors::Error;
use async_trait::async_trait;
use bytes::Bytes;
use std::fmt::Debug;
use std::sync::Arc;

mod qiniu;
mod s3;
mod upload;

pub use upload::{derive_key, validate_content_type, UploadPipeline};

#[async_trait]
pub trait Oss: Debug + Send + Sync {
    async fn file_exists(&self, key: &str) -> Result<bool, Error>;

    /// uploads the object and returns its public url
    async fn upload_file(
        &self,
        key: &str,
        content: Vec<u8>,
        content_type: &str,
    ) -> Result<String, Error>;

    async fn download_file(&self, key: &str) -> Result<Bytes, Error>;

    async fn delete_file(&self, key: &str) -> Result<(), Error>;
}

/// build the storage backend the configuration selects
pub async fn oss(config: &Config) -> Result<Arc<dyn Oss>, Error> {
    config.oss.validate()?;
    let client: Arc<dyn Oss> = match config.oss.provider {
        OssProvider::S3 => Arc::new(s3::S3Client::new(config).await?),
        OssProvider::Qiniu => Arc::new(qiniu::QiniuClient::new(config)),
    };
    Ok(client)
}
