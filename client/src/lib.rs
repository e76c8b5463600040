//! thin wrapper around `reqwest` for talking to the admin api: prefixes
//! relative paths with the api root, attaches the bearer token when one is
//! set, unwraps the response envelope, retries on demand and tracks
//! in-flight requests so they can be canceled.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use abi::errors::{Error, ErrorKind};
use abi::types::ApiResponse;

/// identity of a request for de-duplication purposes
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestKey {
    method: String,
    url: String,
    params: String,
    body: String,
}

impl RequestKey {
    fn new(method: &Method, url: &str, params: &[(String, String)], body: Option<&Value>) -> Self {
        let params = params
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&");
        let body = body.map(|b| b.to_string()).unwrap_or_default();
        Self {
            method: method.to_string(),
            url: url.to_string(),
            params,
            body,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RequestOptions {
    /// additional attempts after the first failure; 0 means fail fast
    pub retry: u32,
    /// fixed delay between attempts
    pub retry_delay: Duration,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            retry: 0,
            retry_delay: Duration::from_secs(1),
        }
    }
}

/// tracked request: the generation id lets a finished request clean up
/// without clobbering a newer identical one
#[derive(Debug, Clone)]
struct InflightEntry {
    id: u64,
    token: CancellationToken,
}

#[derive(Debug, Clone)]
pub struct Http {
    inner: reqwest::Client,
    base_url: String,
    token: Arc<RwLock<Option<String>>>,
    inflight: Arc<DashMap<RequestKey, InflightEntry>>,
    seq: Arc<AtomicU64>,
}

impl Http {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            inner: reqwest::Client::new(),
            base_url: base_url.into(),
            token: Arc::new(RwLock::new(None)),
            inflight: Arc::new(DashMap::new()),
            seq: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn set_token(&self, token: impl Into<String>) {
        if let Ok(mut guard) = self.token.write() {
            *guard = Some(token.into());
        }
    }

    pub fn clear_token(&self) {
        if let Ok(mut guard) = self.token.write() {
            *guard = None;
        }
    }

    /// number of distinct requests currently being tracked
    pub fn inflight_len(&self) -> usize {
        self.inflight.len()
    }

    /// cancel one outstanding body-less request
    pub fn cancel(&self, method: Method, path: &str, params: &[(String, String)]) {
        self.cancel_with(method, path, params, None);
    }

    /// cancel one outstanding request, body included in the identity;
    /// `body` must match what was passed to `post`/`put`
    pub fn cancel_with(
        &self,
        method: Method,
        path: &str,
        params: &[(String, String)],
        body: Option<&Value>,
    ) {
        let url = self.absolute(path);
        let key = RequestKey::new(&method, &url, params, body);
        if let Some((_, entry)) = self.inflight.remove(&key) {
            entry.token.cancel();
        }
    }

    /// cancel everything that is still in flight
    pub fn cancel_all(&self) {
        for entry in self.inflight.iter() {
            entry.value().token.cancel();
        }
        self.inflight.clear();
    }

    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(String, String)],
    ) -> Result<T, Error> {
        self.request(Method::GET, path, params, None, RequestOptions::default())
            .await
    }

    pub async fn get_with<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(String, String)],
        opts: RequestOptions,
    ) -> Result<T, Error> {
        self.request(Method::GET, path, params, None, opts).await
    }

    pub async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, Error> {
        let body = serde_json::to_value(body)?;
        self.request(Method::POST, path, &[], Some(body), RequestOptions::default())
            .await
    }

    pub async fn put<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, Error> {
        let body = serde_json::to_value(body)?;
        self.request(Method::PUT, path, &[], Some(body), RequestOptions::default())
            .await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, Error> {
        self.request(Method::DELETE, path, &[], None, RequestOptions::default())
            .await
    }

    fn absolute(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        params: &[(String, String)],
        body: Option<Value>,
        opts: RequestOptions,
    ) -> Result<T, Error> {
        let url = self.absolute(path);
        let key = RequestKey::new(&method, &url, params, body.as_ref());

        // identical in-flight requests share one tracking entry
        let (token, owner_id) = match self.inflight.entry(key.clone()) {
            Entry::Occupied(e) => (e.get().token.clone(), None),
            Entry::Vacant(v) => {
                let entry = InflightEntry {
                    id: self.seq.fetch_add(1, Ordering::Relaxed),
                    token: CancellationToken::new(),
                };
                let token = entry.token.clone();
                let id = entry.id;
                v.insert(entry);
                (token, Some(id))
            }
        };

        let result = self
            .run(&method, &url, params, body.as_ref(), &token, &opts)
            .await;

        // only remove the entry this request created; a cancel may have
        // already replaced it with a newer identical request
        if let Some(id) = owner_id {
            self.inflight.remove_if(&key, |_, entry| entry.id == id);
        }
        result
    }

    async fn run<T: DeserializeOwned>(
        &self,
        method: &Method,
        url: &str,
        params: &[(String, String)],
        body: Option<&Value>,
        token: &CancellationToken,
        opts: &RequestOptions,
    ) -> Result<T, Error> {
        let mut attempts_left = opts.retry;
        loop {
            tokio::select! {
                _ = token.cancelled() => return Err(Error::canceled()),
                result = self.send_once::<T>(method, url, params, body) => {
                    match result {
                        Ok(value) => return Ok(value),
                        Err(e) if attempts_left > 0 => {
                            attempts_left -= 1;
                            warn!("request {method} {url} failed, retrying: {e}");
                            tokio::select! {
                                _ = token.cancelled() => return Err(Error::canceled()),
                                _ = tokio::time::sleep(opts.retry_delay) => {}
                            }
                        }
                        Err(e) => return Err(e),
                    }
                }
            }
        }
    }

    async fn send_once<T: DeserializeOwned>(
        &self,
        method: &Method,
        url: &str,
        params: &[(String, String)],
        body: Option<&Value>,
    ) -> Result<T, Error> {
        let mut req = self.inner.request(method.clone(), url);
        if !params.is_empty() {
            req = req.query(params);
        }
        let bearer = self.token.read().ok().and_then(|g| g.clone());
        if let Some(bearer) = bearer {
            req = req.bearer_auth(bearer);
        }
        if let Some(body) = body {
            req = req.json(body);
        }

        let resp = req.send().await?;
        let status = resp.status();
        debug!("{method} {url} -> {status}");

        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            // the server speaks the envelope even for errors; fall back to
            // the raw status when it does not
            if let Ok(envelope) = serde_json::from_str::<ApiResponse<Value>>(&text) {
                return Err(Error::with_details(
                    ErrorKind::from_code(envelope.code),
                    envelope.message,
                ));
            }
            return Err(Error::with_details(
                kind_for_status(status.as_u16()),
                format!("request failed with status {status}"),
            ));
        }

        let envelope: ApiResponse<T> = resp.json().await?;
        if !envelope.success {
            return Err(Error::with_details(
                ErrorKind::from_code(envelope.code),
                envelope.message,
            ));
        }
        envelope
            .data
            .ok_or_else(|| Error::parse("response envelope carried no data"))
    }
}

fn kind_for_status(status: u16) -> ErrorKind {
    match status {
        400 => ErrorKind::BadRequest,
        401 => ErrorKind::UnAuthorized,
        403 => ErrorKind::Forbidden,
        404 => ErrorKind::NotFound,
        409 => ErrorKind::Conflict,
        429 => ErrorKind::TooManyRequests,
        _ => ErrorKind::InternalServer,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::State;
    use axum::routing::get;
    use axum::{Json, Router};
    use std::sync::atomic::{AtomicU32, Ordering};

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn ok_app() -> Router {
        Router::new().route(
            "/ping",
            get(|| async { Json(ApiResponse::ok(String::from("pong"))) }),
        )
    }

    fn slow_app() -> Router {
        Router::new().route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_millis(300)).await;
                Json(ApiResponse::ok(1_i32))
            }),
        )
    }

    #[tokio::test]
    async fn unwraps_envelope() {
        let base = serve(ok_app()).await;
        let http = Http::new(base);
        let pong: String = http.get("/ping", &[]).await.unwrap();
        assert_eq!(pong, "pong");
    }

    #[tokio::test]
    async fn error_envelope_maps_to_kind() {
        let app = Router::new().route(
            "/missing",
            get(|| async {
                (
                    axum::http::StatusCode::NOT_FOUND,
                    Json(ApiResponse::<()>::err(40400, "no such thing")),
                )
            }),
        );
        let base = serve(app).await;
        let http = Http::new(base);
        let err = http.get::<Value>("/missing", &[]).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.code(), 40400);
    }

    #[tokio::test]
    async fn identical_requests_share_one_entry() {
        let base = serve(slow_app()).await;
        let http = Http::new(base);

        let a = http.clone();
        let b = http.clone();
        let h1 = tokio::spawn(async move { a.get::<i32>("/slow", &[]).await });
        let h2 = tokio::spawn(async move { b.get::<i32>("/slow", &[]).await });

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(http.inflight_len(), 1);

        let (r1, r2) = (h1.await.unwrap(), h2.await.unwrap());
        assert!(r1.is_ok() && r2.is_ok());
        assert_eq!(http.inflight_len(), 0);
    }

    #[tokio::test]
    async fn cancel_all_aborts_inflight() {
        let base = serve(slow_app()).await;
        let http = Http::new(base);

        let a = http.clone();
        let handle = tokio::spawn(async move { a.get::<i32>("/slow", &[]).await });

        tokio::time::sleep(Duration::from_millis(50)).await;
        http.cancel_all();

        let err = handle.await.unwrap().unwrap_err();
        assert!(err.is_canceled());
    }

    #[tokio::test]
    async fn cancel_targets_one_request() {
        let base = serve(slow_app()).await;
        let http = Http::new(base);

        let a = http.clone();
        let handle = tokio::spawn(async move { a.get::<i32>("/slow", &[]).await });

        tokio::time::sleep(Duration::from_millis(50)).await;
        http.cancel(Method::GET, "/slow", &[]);

        let err = handle.await.unwrap().unwrap_err();
        assert!(err.is_canceled());
        assert_eq!(http.inflight_len(), 0);
    }

    #[tokio::test]
    async fn cancel_reaches_request_with_body() {
        let app = Router::new().route(
            "/slow",
            axum::routing::post(|Json(_): Json<Value>| async {
                tokio::time::sleep(Duration::from_millis(300)).await;
                Json(ApiResponse::ok(1_i32))
            }),
        );
        let base = serve(app).await;
        let http = Http::new(base);
        let body = serde_json::json!({"name": "alice"});

        let a = http.clone();
        let b = body.clone();
        let handle = tokio::spawn(async move { a.post::<i32, _>("/slow", &b).await });

        tokio::time::sleep(Duration::from_millis(50)).await;
        http.cancel_with(Method::POST, "/slow", &[], Some(&body));

        let err = handle.await.unwrap().unwrap_err();
        assert!(err.is_canceled());
        assert_eq!(http.inflight_len(), 0);
    }

    #[test]
    fn stale_cleanup_spares_newer_entry() {
        let http = Http::new("http://unused.test");
        let key = RequestKey::new(&Method::GET, "http://unused.test/x", &[], None);

        http.inflight.insert(
            key.clone(),
            InflightEntry {
                id: 1,
                token: CancellationToken::new(),
            },
        );
        // canceled, then an identical request starts again under the same key
        http.inflight.remove(&key);
        let fresh = CancellationToken::new();
        http.inflight.insert(
            key.clone(),
            InflightEntry {
                id: 2,
                token: fresh.clone(),
            },
        );

        // the first request's cleanup must not touch the newer entry
        http.inflight.remove_if(&key, |_, entry| entry.id == 1);
        assert_eq!(http.inflight_len(), 1);

        // and the newer entry is still cancellable
        http.cancel(Method::GET, "http://unused.test/x", &[]);
        assert!(fresh.is_cancelled());
    }

    #[tokio::test]
    async fn retries_with_fixed_delay() {
        #[derive(Clone)]
        struct Counter(Arc<AtomicU32>);

        async fn flaky(State(counter): State<Counter>) -> (axum::http::StatusCode, Json<ApiResponse<i32>>) {
            let n = counter.0.fetch_add(1, Ordering::SeqCst);
            if n < 2 {
                (
                    axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ApiResponse::err(50000, "boom")),
                )
            } else {
                (axum::http::StatusCode::OK, Json(ApiResponse::ok(7)))
            }
        }

        let counter = Counter(Arc::new(AtomicU32::new(0)));
        let app = Router::new()
            .route("/flaky", get(flaky))
            .with_state(counter.clone());
        let base = serve(app).await;
        let http = Http::new(base);

        let opts = RequestOptions {
            retry: 3,
            retry_delay: Duration::from_millis(10),
        };
        let value: i32 = http.get_with("/flaky", &[], opts).await.unwrap();
        assert_eq!(value, 7);
        assert_eq!(counter.0.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn no_retry_by_default() {
        #[derive(Clone)]
        struct Counter(Arc<AtomicU32>);

        async fn failing(State(counter): State<Counter>) -> (axum::http::StatusCode, Json<ApiResponse<i32>>) {
            counter.0.fetch_add(1, Ordering::SeqCst);
            (
                axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::err(50000, "boom")),
            )
        }

        let counter = Counter(Arc::new(AtomicU32::new(0)));
        let app = Router::new()
            .route("/fail", get(failing))
            .with_state(counter.clone());
        let base = serve(app).await;
        let http = Http::new(base);

        assert!(http.get::<i32>("/fail", &[]).await.is_err());
        assert_eq!(counter.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn key_identity() {
        let m = Method::GET;
        let p = vec![(String::from("a"), String::from("1"))];
        let k1 = RequestKey::new(&m, "http://x/y", &p, None);
        let k2 = RequestKey::new(&m, "http://x/y", &p, None);
        assert_eq!(k1, k2);

        let body = serde_json::json!({"n": 1});
        let k3 = RequestKey::new(&m, "http://x/y", &p, Some(&body));
        assert_ne!(k1, k3);

        let k4 = RequestKey::new(&Method::POST, "http://x/y", &p, None);
        assert_ne!(k1, k4);
    }

    #[test]
    fn absolute_urls_pass_through() {
        let http = Http::new("http://api.test/api");
        assert_eq!(http.absolute("/friend"), "http://api.test/api/friend");
        assert_eq!(http.absolute("friend"), "http://api.test/api/friend");
        assert_eq!(
            http.absolute("https://elsewhere.test/x"),
            "https://elsewhere.test/x"
        );
    }
}
