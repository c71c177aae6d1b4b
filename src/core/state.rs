use std::sync::Arc;

use crate::core::{clock::SharedClock, config::Settings, redis::RedisHandle};
use crate::services::session_manager::ExamSessionManager;
use crate::store::Stores;

#[derive(Clone)]
pub(crate) struct AppState {
    inner: Arc<InnerState>,
}

struct InnerState {
    settings: Settings,
    redis: RedisHandle,
    stores: Stores,
    clock: SharedClock,
    manager: ExamSessionManager,
}

impl AppState {
    pub(crate) fn new(
        settings: Settings,
        redis: RedisHandle,
        stores: Stores,
        clock: SharedClock,
    ) -> Self {
        let manager = ExamSessionManager::new(&stores, clock.clone());
        Self { inner: Arc::new(InnerState { settings, redis, stores, clock, manager }) }
    }

    pub(crate) fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    pub(crate) fn redis(&self) -> &RedisHandle {
        &self.inner.redis
    }

    pub(crate) fn stores(&self) -> &Stores {
        &self.inner.stores
    }

    pub(crate) fn clock(&self) -> &SharedClock {
        &self.inner.clock
    }

    pub(crate) fn manager(&self) -> &ExamSessionManager {
        &self.inner.manager
    }
}
