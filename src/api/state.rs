use std::sync::Arc;
use std::time::Duration;
use sqlx::{Pool, Sqlite};
use crate::config::Config;
use crate::crypto::{build_codec, Codec};
use crate::guard::AbuseGuard;
use crate::preview::build_client;
use crate::service::ChatService;

#[derive(Clone)]
pub struct AppState {
    pub chat: ChatService,
    pub http: reqwest::Client,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(config: Arc<Config>, db: Pool<Sqlite>) -> Self {
        let codec: Arc<dyn Codec> = Arc::from(build_codec(config.privacy_cipher, &config.encryption_key));
        let guard = AbuseGuard::new(config.rate_limit_max, config.rate_limit_window_secs);
        let chat = ChatService::new(db, codec, guard, config.chat_history_limit);
        let http = build_client(Duration::from_secs(config.request_timeout_secs));

        Self { chat, http, config }
    }
}
