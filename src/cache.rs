//! Per-path render cache with a short freshness window.
//!
//! Pages are served stale-while-revalidate: a fresh entry is returned as-is,
//! a stale entry is returned while one background task re-renders it, and a
//! missing entry blocks the request until the first render lands. Only the
//! data-derived page fragment goes through here; session-dependent chrome is
//! composed per request.

use std::{
    collections::HashMap,
    future::Future,
    sync::Arc,
    time::{Duration, Instant},
};

use tokio::sync::RwLock;

use crate::AppResult;

#[derive(Clone)]
pub struct RenderCache {
    entries: Arc<RwLock<HashMap<String, Entry>>>,
    ttl: Duration,
}

struct Entry {
    html: String,
    rendered_at: Instant,
    revalidating: bool,
}

impl RenderCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }

    pub async fn get_or_render<F, Fut>(&self, key: &str, render: F) -> AppResult<String>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = AppResult<String>> + Send + 'static,
    {
        if let Some((html, age)) = self.lookup(key).await {
            if age <= self.ttl {
                return Ok(html);
            }

            if self.claim_revalidation(key).await {
                let cache = self.clone();
                let key = key.to_owned();
                tokio::spawn(async move {
                    match render().await {
                        Ok(html) => cache.store(&key, html).await,
                        Err(err) => {
                            tracing::warn!(%key, error = %err, "background revalidation failed");
                            cache.release(&key).await;
                        }
                    }
                });
            }

            return Ok(html);
        }

        // Blocking fallback for a path never rendered before.
        let html = render().await?;
        self.store(key, html.clone()).await;
        Ok(html)
    }

    async fn lookup(&self, key: &str) -> Option<(String, Duration)> {
        let entries = self.entries.read().await;
        entries
            .get(key)
            .map(|entry| (entry.html.clone(), entry.rendered_at.elapsed()))
    }

    async fn store(&self, key: &str, html: String) {
        let mut entries = self.entries.write().await;
        entries.insert(
            key.to_owned(),
            Entry {
                html,
                rendered_at: Instant::now(),
                revalidating: false,
            },
        );
    }

    /// Marks `key` as being re-rendered. Returns false when another task
    /// already claimed it.
    async fn claim_revalidation(&self, key: &str) -> bool {
        let mut entries = self.entries.write().await;
        match entries.get_mut(key) {
            Some(entry) if !entry.revalidating => {
                entry.revalidating = true;
                true
            }
            _ => false,
        }
    }

    async fn release(&self, key: &str) {
        let mut entries = self.entries.write().await;
        if let Some(entry) = entries.get_mut(key) {
            entry.revalidating = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::AppError;

    fn counting_render(
        counter: Arc<AtomicUsize>,
        html: &'static str,
    ) -> impl FnOnce() -> std::pin::Pin<Box<dyn Future<Output = AppResult<String>> + Send>> {
        move || {
            Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(html.to_owned())
            })
        }
    }

    #[tokio::test]
    async fn first_request_blocks_until_rendered() {
        let cache = RenderCache::new(Duration::from_secs(1));
        let renders = Arc::new(AtomicUsize::new(0));

        let html = cache
            .get_or_render("/", counting_render(renders.clone(), "<p>feed</p>"))
            .await
            .unwrap();

        assert_eq!(html, "<p>feed</p>");
        assert_eq!(renders.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn fresh_entries_are_served_without_rendering() {
        let cache = RenderCache::new(Duration::from_secs(60));
        let renders = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            cache
                .get_or_render("/", counting_render(renders.clone(), "<p>feed</p>"))
                .await
                .unwrap();
        }

        assert_eq!(renders.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stale_entries_serve_old_content_and_revalidate_in_background() {
        let cache = RenderCache::new(Duration::from_millis(20));
        let renders = Arc::new(AtomicUsize::new(0));

        cache
            .get_or_render("/", counting_render(renders.clone(), "<p>old</p>"))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;

        // Stale hit: the old body comes back immediately.
        let html = cache
            .get_or_render("/", counting_render(renders.clone(), "<p>new</p>"))
            .await
            .unwrap();
        assert_eq!(html, "<p>old</p>");

        // The background render replaces the entry shortly after.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(renders.load(Ordering::SeqCst), 2);

        let html = cache
            .get_or_render("/", counting_render(renders.clone(), "<p>unused</p>"))
            .await
            .unwrap();
        assert_eq!(html, "<p>new</p>");
    }

    #[tokio::test]
    async fn failed_blocking_render_propagates_and_caches_nothing() {
        let cache = RenderCache::new(Duration::from_secs(1));

        let result = cache
            .get_or_render("/post/missing", || async {
                Err(AppError::NotFound("post"))
            })
            .await;
        assert!(matches!(result, Err(AppError::NotFound("post"))));

        // Next request renders again instead of serving a cached failure.
        let html = cache
            .get_or_render("/post/missing", || async { Ok("<p>found</p>".to_owned()) })
            .await
            .unwrap();
        assert_eq!(html, "<p>found</p>");
    }

    #[tokio::test]
    async fn failed_revalidation_keeps_the_stale_entry() {
        let cache = RenderCache::new(Duration::from_millis(20));

        cache
            .get_or_render("/", || async { Ok("<p>old</p>".to_owned()) })
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        // The background render fails; the stale body keeps serving.
        let html = cache
            .get_or_render("/", || async {
                Err(AppError::Internal(anyhow::Error::msg("db down")))
            })
            .await
            .unwrap();
        assert_eq!(html, "<p>old</p>");
        tokio::time::sleep(Duration::from_millis(50)).await;

        // The failure released the claim, so a later stale hit revalidates.
        let html = cache
            .get_or_render("/", || async { Ok("<p>new</p>".to_owned()) })
            .await
            .unwrap();
        assert_eq!(html, "<p>old</p>");
        tokio::time::sleep(Duration::from_millis(50)).await;

        let html = cache
            .get_or_render("/", || async { Ok("<p>unused</p>".to_owned()) })
            .await
            .unwrap();
        assert_eq!(html, "<p>new</p>");
    }
}
