use std::sync::Arc;
use std::time::Instant;

use crate::config::Config;
use crate::db::Database;
use crate::services::tts::TtsService;

#[derive(Clone)]
pub struct AppState {
    db: Database,
    config: Arc<Config>,
    tts: Arc<TtsService>,
    started_at: Instant,
}

impl AppState {
    pub fn new(db: Database, config: Config, tts: TtsService) -> Self {
        Self {
            db,
            config: Arc::new(config),
            tts: Arc::new(tts),
            started_at: Instant::now(),
        }
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn tts(&self) -> &TtsService {
        &self.tts
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
