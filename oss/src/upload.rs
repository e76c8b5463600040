use std::sync::Arc;
use std::time::Duration;

use nanoid::nanoid;
use tracing::warn;

use abi::errors::Error;

use crate::Oss;

const MAX_UPLOAD_RETRIES: u32 = 3;
const BACKOFF_BASE: Duration = Duration::from_millis(500);
const BACKOFF_CAP: Duration = Duration::from_secs(8);

/// extensions accepted when the content type is too generic to decide
const ALLOWED_EXTENSIONS: [&str; 13] = [
    "md", "markdown", "txt", "png", "jpg", "jpeg", "gif", "webp", "svg", "mp4", "webm", "mov",
    "avi",
];

/// only markdown, plain text, images and videos may be uploaded
pub fn validate_content_type(filename: &str, content_type: &str) -> Result<(), Error> {
    let allowed = matches!(content_type, "text/markdown" | "text/plain")
        || content_type.starts_with("image/")
        || content_type.starts_with("video/");
    if allowed {
        return Ok(());
    }

    // browsers often send octet-stream for markdown files
    if content_type.is_empty() || content_type == "application/octet-stream" {
        if let Some(ext) = extension(filename) {
            if ALLOWED_EXTENSIONS.contains(&ext.to_lowercase().as_str()) {
                return Ok(());
            }
        }
    }

    Err(Error::bad_request(format!(
        "file type not allowed: {content_type}"
    )))
}

/// storage key: `{dir}/{category}/{nanoid}.{ext}`
pub fn derive_key(dir: &str, filename: &str, content_type: &str) -> String {
    let category = if content_type.starts_with("image/") {
        "images"
    } else if content_type.starts_with("video/") {
        "videos"
    } else {
        "files"
    };

    let suffix = match extension(filename) {
        Some(ext) => format!("{}.{}", nanoid!(), ext.to_lowercase()),
        None => nanoid!(),
    };

    let dir = dir.trim_matches('/');
    if dir.is_empty() {
        format!("{category}/{suffix}")
    } else {
        format!("{dir}/{category}/{suffix}")
    }
}

fn extension(filename: &str) -> Option<&str> {
    filename.rsplit_once('.').map(|(_, ext)| ext).filter(|e| !e.is_empty())
}

/// validates, derives the storage key and uploads with bounded
/// exponential-backoff retry
#[derive(Debug, Clone)]
pub struct UploadPipeline {
    oss: Arc<dyn Oss>,
    max_retries: u32,
    backoff_base: Duration,
    backoff_cap: Duration,
}

impl UploadPipeline {
    pub fn new(oss: Arc<dyn Oss>) -> Self {
        Self {
            oss,
            max_retries: MAX_UPLOAD_RETRIES,
            backoff_base: BACKOFF_BASE,
            backoff_cap: BACKOFF_CAP,
        }
    }

    pub fn with_backoff(mut self, base: Duration, cap: Duration) -> Self {
        self.backoff_base = base;
        self.backoff_cap = cap;
        self
    }

    /// returns the public url of the uploaded object
    pub async fn upload(
        &self,
        dir: &str,
        filename: &str,
        content_type: &str,
        data: Vec<u8>,
    ) -> Result<String, Error> {
        validate_content_type(filename, content_type)?;
        let key = derive_key(dir, filename, content_type);

        let mut delay = self.backoff_base;
        let mut last_err = Error::oss("upload not attempted");
        for attempt in 1..=self.max_retries {
            match self
                .oss
                .upload_file(&key, data.clone(), content_type)
                .await
            {
                Ok(url) => return Ok(url),
                Err(e) => {
                    warn!("upload attempt {attempt}/{} failed: {e}", self.max_retries);
                    last_err = e;
                    if attempt < self.max_retries {
                        tokio::time::sleep(delay).await;
                        delay = (delay * 2).min(self.backoff_cap);
                    }
                }
            }
        }
        Err(last_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// fails the first `failures` uploads, then succeeds
    #[derive(Debug)]
    struct FlakyOss {
        failures: u32,
        calls: AtomicU32,
    }

    impl FlakyOss {
        fn new(failures: u32) -> Self {
            Self {
                failures,
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl Oss for FlakyOss {
        async fn file_exists(&self, _key: &str) -> Result<bool, Error> {
            Ok(false)
        }

        async fn upload_file(
            &self,
            key: &str,
            _content: Vec<u8>,
            _content_type: &str,
        ) -> Result<String, Error> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                Err(Error::oss(format!("transient failure {n}")))
            } else {
                Ok(format!("http://cdn.test/{key}"))
            }
        }

        async fn download_file(&self, _key: &str) -> Result<Bytes, Error> {
            Ok(Bytes::new())
        }

        async fn delete_file(&self, _key: &str) -> Result<(), Error> {
            Ok(())
        }
    }

    fn pipeline(failures: u32) -> (UploadPipeline, Arc<FlakyOss>) {
        let oss = Arc::new(FlakyOss::new(failures));
        let pipeline = UploadPipeline::new(oss.clone())
            .with_backoff(Duration::from_millis(1), Duration::from_millis(4));
        (pipeline, oss)
    }

    #[tokio::test]
    async fn retries_until_success() {
        let (pipeline, oss) = pipeline(2);
        let url = pipeline
            .upload("blog", "a.png", "image/png", vec![1, 2, 3])
            .await
            .unwrap();
        assert!(url.starts_with("http://cdn.test/blog/images/"));
        assert_eq!(oss.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn surfaces_last_error_when_exhausted() {
        let (pipeline, oss) = pipeline(10);
        let err = pipeline
            .upload("blog", "a.png", "image/png", vec![1])
            .await
            .unwrap_err();
        // three attempts, the last error wins
        assert_eq!(oss.calls.load(Ordering::SeqCst), 3);
        assert!(err.to_string().contains("transient failure 2"));
    }

    #[tokio::test]
    async fn rejects_disallowed_type() {
        let (pipeline, oss) = pipeline(0);
        let err = pipeline
            .upload("blog", "x.exe", "application/x-msdownload", vec![1])
            .await
            .unwrap_err();
        assert_eq!(err.code(), 40000);
        // never reaches the provider
        assert_eq!(oss.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn allowlist() {
        assert!(validate_content_type("a.md", "text/markdown").is_ok());
        assert!(validate_content_type("a.txt", "text/plain").is_ok());
        assert!(validate_content_type("a.png", "image/png").is_ok());
        assert!(validate_content_type("a.mp4", "video/mp4").is_ok());
        assert!(validate_content_type("a.md", "application/octet-stream").is_ok());
        assert!(validate_content_type("a.exe", "application/octet-stream").is_err());
        assert!(validate_content_type("a.html", "text/html").is_err());
        assert!(validate_content_type("a.json", "application/json").is_err());
    }

    #[test]
    fn key_shape() {
        let key = derive_key("blog", "photo.PNG", "image/png");
        assert!(key.starts_with("blog/images/"));
        assert!(key.ends_with(".png"));

        let key = derive_key("", "clip.mp4", "video/mp4");
        assert!(key.starts_with("videos/"));

        let key = derive_key("/posts/", "readme.md", "text/markdown");
        assert!(key.starts_with("posts/files/"));
        assert!(key.ends_with(".md"));
    }

    #[test]
    fn keys_are_unique() {
        let a = derive_key("d", "a.png", "image/png");
        let b = derive_key("d", "a.png", "image/png");
        assert_ne!(a, b);
    }
}
