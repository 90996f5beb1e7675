//! Реестр работающих воркер-ботов.
//!
//! The webhook server resolves an inbound `/webhook/{token}` call to a
//! worker through this map. It is a routing cache only; the `bots` table
//! stays authoritative, and the registry is rebuilt from it on startup.

use std::sync::Arc;

use dashmap::DashMap;

use fabcore::fsm::validation::mask_token;

#[derive(Debug, Clone)]
pub struct WorkerBot {
    pub bot_id: i64,
    pub token: String,
    pub template_id: i64,
}

#[derive(Default)]
pub struct WorkerRegistry {
    by_token: DashMap<String, Arc<WorkerBot>>,
}

impl WorkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, worker: WorkerBot) {
        log::info!(
            "Starting worker for bot {} (token {}, template {})",
            worker.bot_id,
            mask_token(&worker.token),
            worker.template_id
        );
        self.by_token.insert(worker.token.clone(), Arc::new(worker));
    }

    pub fn resolve(&self, token: &str) -> Option<Arc<WorkerBot>> {
        self.by_token.get(token).map(|w| w.value().clone())
    }

    pub fn remove(&self, token: &str) {
        self.by_token.remove(token);
    }

    pub fn len(&self) -> usize {
        self.by_token.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_token.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_resolve() {
        let registry = WorkerRegistry::new();
        registry.register(WorkerBot {
            bot_id: 5,
            token: "12345:abcdefghij".to_string(),
            template_id: 42,
        });

        let worker = registry.resolve("12345:abcdefghij").unwrap();
        assert_eq!(worker.bot_id, 5);
        assert_eq!(worker.template_id, 42);
        assert!(registry.resolve("99999:unknowntoken").is_none());
    }

    #[test]
    fn test_remove() {
        let registry = WorkerRegistry::new();
        registry.register(WorkerBot {
            bot_id: 5,
            token: "12345:abcdefghij".to_string(),
            template_id: 42,
        });
        registry.remove("12345:abcdefghij");
        assert!(registry.is_empty());
    }
}
