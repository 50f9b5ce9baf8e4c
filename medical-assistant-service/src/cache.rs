use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tracing::debug;

use crate::{error::GenerationError, llm::TextGenerator};

/// Memoizes generated text by exact prompt.
///
/// Without a capacity the cache only grows. With a capacity the oldest
/// inserted prompt is evicted first.
#[derive(Clone, Default)]
pub struct ResponseCache {
    entries: Arc<DashMap<String, String>>,
    order: Arc<Mutex<VecDeque<String>>>,
    capacity: Option<usize>,
}

impl ResponseCache {
    pub fn new(capacity: Option<usize>) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            order: Arc::new(Mutex::new(VecDeque::new())),
            capacity,
        }
    }

    pub fn get(&self, prompt: &str) -> Option<String> {
        self.entries.get(prompt).map(|entry| entry.value().clone())
    }

    pub fn insert(&self, prompt: String, response: String) {
        let mut order = self.order.lock().unwrap_or_else(|e| e.into_inner());
        if self.entries.insert(prompt.clone(), response).is_some() {
            return;
        }
        order.push_back(prompt);

        if let Some(capacity) = self.capacity {
            while order.len() > capacity {
                if let Some(oldest) = order.pop_front() {
                    debug!(prompt_len = oldest.len(), "Evicting cached response");
                    self.entries.remove(&oldest);
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A [`TextGenerator`] front that answers repeated prompts from a [`ResponseCache`].
#[derive(Clone)]
pub struct CachedGenerator {
    inner: Arc<dyn TextGenerator>,
    cache: ResponseCache,
}

impl CachedGenerator {
    pub fn new(inner: Arc<dyn TextGenerator>, cache: ResponseCache) -> Self {
        Self { inner, cache }
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    /// Failures are returned, never cached.
    pub async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        if let Some(cached) = self.cache.get(prompt) {
            debug!(prompt_len = prompt.len(), "Response cache hit");
            return Ok(cached);
        }

        let response = self.inner.generate(prompt).await?.trim().to_string();
        self.cache.insert(prompt.to_string(), response.clone());
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{GuardedGenerator, testing::ScriptedGenerator};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Never answers within a minute.
    #[derive(Default)]
    struct StalledGenerator {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TextGenerator for StalledGenerator {
        async fn generate(&self, _prompt: &str) -> Result<String, GenerationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok("too late".to_string())
        }
    }

    #[tokio::test]
    async fn identical_prompts_call_the_generator_once() {
        let generator = Arc::new(ScriptedGenerator::replying("  Rest and fluids.  "));
        let cached = CachedGenerator::new(generator.clone(), ResponseCache::new(None));

        let first = cached.generate("advice for fever").await.unwrap();
        let second = cached.generate("advice for fever").await.unwrap();

        assert_eq!(first, "Rest and fluids.");
        assert_eq!(second, first);
        assert_eq!(generator.calls(), 1);
    }

    #[tokio::test]
    async fn distinct_prompts_do_not_collide() {
        let generator = Arc::new(ScriptedGenerator::replying("ok"));
        let cached = CachedGenerator::new(generator.clone(), ResponseCache::new(None));

        cached.generate("advice for fever").await.unwrap();
        cached.generate("advice for Fever").await.unwrap();

        assert_eq!(generator.calls(), 2);
        assert_eq!(cached.cache().len(), 2);
    }

    #[tokio::test]
    async fn failures_are_not_cached() {
        let generator = Arc::new(ScriptedGenerator::failing(GenerationError::Provider(
            "quota exceeded".to_string(),
        )));
        let cached = CachedGenerator::new(generator.clone(), ResponseCache::new(None));

        assert!(cached.generate("advice").await.is_err());
        assert!(cached.generate("advice").await.is_err());
        assert_eq!(generator.calls(), 2);
        assert!(cached.cache().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn timed_out_advice_is_not_cached() {
        let stalled = Arc::new(StalledGenerator::default());
        let guarded = GuardedGenerator::new(stalled.clone(), Duration::from_secs(60));
        let cached = CachedGenerator::new(Arc::new(guarded), ResponseCache::new(None));

        for _ in 0..2 {
            assert_eq!(
                cached.generate("advice for fever").await,
                Err(GenerationError::Timeout(60))
            );
        }
        assert_eq!(stalled.calls.load(Ordering::SeqCst), 2);
        assert!(cached.cache().is_empty());
    }

    #[test]
    fn capacity_evicts_oldest_entry() {
        let cache = ResponseCache::new(Some(2));
        cache.insert("a".into(), "1".into());
        cache.insert("b".into(), "2".into());
        cache.insert("c".into(), "3".into());

        assert_eq!(cache.len(), 2);
        assert!(cache.get("a").is_none());
        assert_eq!(cache.get("c").as_deref(), Some("3"));
    }

    #[test]
    fn reinserting_a_prompt_does_not_grow_the_cache() {
        let cache = ResponseCache::new(Some(2));
        cache.insert("a".into(), "1".into());
        cache.insert("a".into(), "1 again".into());
        cache.insert("b".into(), "2".into());

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("a").as_deref(), Some("1 again"));
    }
}
