use std::sync::Arc;

use abi::config::Config;
use abi::errors::Error;
use db::DbRepo;
use oss::UploadPipeline;

mod api_utils;
pub(crate) mod handlers;
pub(crate) mod routes;

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DbRepo>,
    pub upload: UploadPipeline,
    /// objects under this base are already in owned storage
    pub public_url: String,
    /// plain client for fetching externally hosted images
    pub http: reqwest::Client,
}

impl AppState {
    pub async fn new(config: &Config) -> Result<Self, Error> {
        let db = Arc::new(DbRepo::new(config).await?);
        let oss = oss::oss(config).await?;
        Ok(Self {
            db,
            upload: UploadPipeline::new(oss),
            public_url: config.oss.public_url.clone(),
            http: reqwest::Client::new(),
        })
    }
}

pub async fn start(config: Config) -> Result<(), Error> {
    let state = AppState::new(&config).await?;
    let app = routes::app_routes(state);
    let listener = tokio::net::TcpListener::bind(&config.server.server_url()).await?;
    tracing::info!("listening on {}", config.server.server_url());
    axum::serve(listener, app).await?;
    Ok(())
}
