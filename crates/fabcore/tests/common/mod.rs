//! Shared setup for router integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use fabcore::{MemorySessionStore, Router};

use crate::mocks::{FakeDirectory, MockAuthClient};

pub const BOT_ID: i64 = 7;
pub const USER_ID: i64 = 100500;

/// Роутер поверх памяти с одним активным ботом
pub struct TestRig {
    pub router: Router,
    pub store: Arc<MemorySessionStore>,
    pub auth: Arc<MockAuthClient>,
}

impl TestRig {
    pub fn new() -> Self {
        let store = Arc::new(MemorySessionStore::new());
        let auth = Arc::new(MockAuthClient::new());
        let directory = Arc::new(FakeDirectory::new([(BOT_ID, true)]));
        let router = Router::new(store.clone(), directory, auth.clone());
        Self { router, store, auth }
    }
}
