use std::sync::Arc;

use anyhow::Result;
use database::Database;
use log::info;
use tokio::net::TcpListener;

use crate::{
    http_api_config::HttpApiConfig,
    routing::{router, AppState},
};

pub struct HttpApi {
    pub tiles_db: Arc<Database>,
    pub config: HttpApiConfig,
}

impl HttpApi {
    pub async fn run(self) -> Result<()> {
        let Self { tiles_db, config } = self;

        let listener = TcpListener::bind(config.address).await?;

        info!(
            "serving tiles on {} (public endpoint {})",
            config.address, config.public_endpoint,
        );

        let router = router(AppState { tiles_db, config });

        axum::serve(listener, router).await.map_err(Into::into)
    }
}
