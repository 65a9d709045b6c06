//! Cancel-and-replace tracking for per-view backend requests
//!
//! Each page view (map, timeline, people list) tags its requests with a view
//! id. Starting a new request for a view cancels the one still in flight, so
//! a slow stale response can never overwrite a newer one.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{ApiError, ApiResult};

/// In-flight request registry keyed by view id
#[derive(Default)]
pub struct ViewRequests {
    inflight: Mutex<HashMap<String, (u64, CancellationToken)>>,
    generation: AtomicU64,
}

impl ViewRequests {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new request for `view`, cancelling any older one
    fn begin(&self, view: &str) -> (u64, CancellationToken) {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        let token = CancellationToken::new();

        let mut inflight = self.inflight.lock().unwrap_or_else(|e| e.into_inner());
        if let Some((old_generation, old)) =
            inflight.insert(view.to_string(), (generation, token.clone()))
        {
            debug!(view, old_generation, generation, "Superseding in-flight request");
            old.cancel();
        }

        (generation, token)
    }

    /// Drop the registry entry if it still belongs to this request
    fn finish(&self, view: &str, generation: u64) {
        let mut inflight = self.inflight.lock().unwrap_or_else(|e| e.into_inner());
        if inflight.get(view).map(|(g, _)| *g) == Some(generation) {
            inflight.remove(view);
        }
    }

    /// Number of views with a request currently in flight
    pub fn inflight_count(&self) -> usize {
        self.inflight.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Run `fut` as the current request for `view`
    ///
    /// Without a view id the future simply runs to completion. With one, a
    /// later call for the same view makes this one return
    /// [`ApiError::Superseded`].
    pub async fn run<T, F>(&self, view: Option<&str>, fut: F) -> ApiResult<T>
    where
        F: Future<Output = ApiResult<T>>,
    {
        let Some(view) = view.filter(|v| !v.is_empty()) else {
            return fut.await;
        };

        let (generation, token) = self.begin(view);

        let result = tokio::select! {
            _ = token.cancelled() => Err(ApiError::Superseded(view.to_string())),
            result = fut => result,
        };

        self.finish(view, generation);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn test_without_view_runs_to_completion() {
        let requests = ViewRequests::new();
        let value = requests.run(None, async { Ok::<_, ApiError>(7) }).await.unwrap();
        assert_eq!(value, 7);
        assert_eq!(requests.inflight_count(), 0);
    }

    #[tokio::test]
    async fn test_newer_request_supersedes_older() {
        let requests = Arc::new(ViewRequests::new());
        let (release_tx, release_rx) = oneshot::channel::<()>();

        let slow = {
            let requests = requests.clone();
            tokio::spawn(async move {
                requests
                    .run(Some("map"), async move {
                        let _ = release_rx.await;
                        Ok::<_, ApiError>("stale")
                    })
                    .await
            })
        };

        // Let the slow request register first
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(requests.inflight_count(), 1);

        let fresh = requests
            .run(Some("map"), async { Ok::<_, ApiError>("fresh") })
            .await
            .unwrap();
        assert_eq!(fresh, "fresh");

        let stale = slow.await.unwrap();
        assert!(matches!(stale, Err(ApiError::Superseded(ref v)) if v == "map"));
        drop(release_tx);

        assert_eq!(requests.inflight_count(), 0);
    }

    #[tokio::test]
    async fn test_different_views_do_not_interfere() {
        let requests = ViewRequests::new();
        let (a, b) = tokio::join!(
            requests.run(Some("map"), async {
                tokio::time::sleep(Duration::from_millis(10)).await;
                Ok::<_, ApiError>(1)
            }),
            requests.run(Some("timeline"), async { Ok::<_, ApiError>(2) }),
        );
        assert_eq!(a.unwrap(), 1);
        assert_eq!(b.unwrap(), 2);
    }
}
