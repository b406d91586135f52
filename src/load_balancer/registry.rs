//! Upstream registry and selection.
//!
//! # Responsibilities
//! - Own the live upstream set and the staged replacement set
//! - Select a random eligible upstream for a request
//! - Apply health transitions and invoke the host's hooks
//! - Own the lifetime signal that stops the health watcher

use std::sync::Arc;

use arc_swap::ArcSwap;
use axum::http::request::Parts;
use parking_lot::Mutex;
use rand::seq::SliceRandom;
use tokio::task::JoinHandle;
use url::Url;

use crate::config::HealthConfig;
use crate::health::classify::classify;
use crate::health::state::HealthState;
use crate::health::watcher::HealthWatcher;
use crate::http::forward::ForwardError;
use crate::lifecycle::Shutdown;
use crate::load_balancer::hooks::UpstreamHooks;
use crate::load_balancer::upstream::{Upstream, UpstreamKey};
use crate::observability::metrics::{self, UpstreamMetrics};

type UpstreamSet<T> = Vec<Arc<Upstream<T>>>;

/// Registry of upstreams with random selection among eligible ones.
pub struct LoadBalancer<T = ()> {
    upstreams: ArcSwap<UpstreamSet<T>>,
    staged: Mutex<UpstreamSet<T>>,
    hooks: Option<Arc<dyn UpstreamHooks<T>>>,
    lifetime: Shutdown,
}

impl<T> LoadBalancer<T> {
    /// Create an empty load balancer without hooks. The health watcher is
    /// not running until [`LoadBalancer::spawn_health_watcher`] is called.
    pub fn new() -> Self {
        Self {
            upstreams: ArcSwap::from_pointee(Vec::new()),
            staged: Mutex::new(Vec::new()),
            hooks: None,
            lifetime: Shutdown::new(),
        }
    }

    pub fn with_hooks(mut self, hooks: impl UpstreamHooks<T> + 'static) -> Self {
        self.hooks = Some(Arc::new(hooks));
        self
    }

    pub(crate) fn hooks(&self) -> Option<&dyn UpstreamHooks<T>> {
        self.hooks.as_deref()
    }

    // --- Registration ---

    /// Register an upstream. It is marked healthy without any probe.
    pub fn add(&self, upstream: impl Into<Arc<Upstream<T>>>) -> Arc<Upstream<T>> {
        let upstream = upstream.into();
        upstream.set_healthy(true);
        self.upstreams.rcu(|current| {
            let mut next = (**current).clone();
            next.push(upstream.clone());
            next
        });
        tracing::debug!(upstream = %upstream.key(), "Upstream added");
        upstream
    }

    /// Replace the live set wholesale. Every incoming upstream is marked healthy.
    pub fn set_upstreams<I, U>(&self, upstreams: I)
    where
        I: IntoIterator<Item = U>,
        U: Into<Arc<Upstream<T>>>,
    {
        let next: UpstreamSet<T> = upstreams.into_iter().map(Into::into).collect();
        for upstream in &next {
            upstream.set_healthy(true);
        }
        tracing::info!(count = next.len(), "Upstream set replaced");
        self.upstreams.store(Arc::new(next));
    }

    /// Add an upstream to the staged set. The live set is untouched.
    pub fn add_staged(&self, upstream: impl Into<Arc<Upstream<T>>>) -> Arc<Upstream<T>> {
        let upstream = upstream.into();
        upstream.set_healthy(true);
        self.staged.lock().push(upstream.clone());
        upstream
    }

    pub fn clear_staged(&self) {
        self.staged.lock().clear();
    }

    pub fn staged_len(&self) -> usize {
        self.staged.lock().len()
    }

    /// Swap the staged set in as the live set and clear staging.
    ///
    /// Concurrent selections observe either the old set or the new one.
    pub fn apply_staged(&self) {
        let next = std::mem::take(&mut *self.staged.lock());
        if next.is_empty() {
            tracing::warn!("Applying an empty staged set; no upstream will be selectable");
        }
        for upstream in &next {
            upstream.set_healthy(true);
        }
        tracing::info!(count = next.len(), "Staged upstream set applied");
        self.upstreams.store(Arc::new(next));
    }

    // --- Selection ---

    /// Snapshot of the live set, in registration order.
    pub fn upstreams(&self) -> Arc<UpstreamSet<T>> {
        self.upstreams.load_full()
    }

    /// Every upstream that can service the request, in live-set order.
    pub fn valid_upstreams(&self, request: &Parts) -> UpstreamSet<T> {
        self.upstreams
            .load()
            .iter()
            .filter(|u| u.can_service_request(request))
            .cloned()
            .collect()
    }

    /// Uniformly pick one of the valid upstreams, if any.
    pub fn random(&self, request: &Parts) -> Option<Arc<Upstream<T>>> {
        let candidates = self.valid_upstreams(request);
        candidates.choose(&mut rand::thread_rng()).cloned()
    }

    /// The live upstream whose scheme and host[:port] equal `address`'s.
    pub fn upstream_matching(&self, address: &Url) -> Option<Arc<Upstream<T>>> {
        let key = UpstreamKey::from_url(address);
        self.upstreams
            .load()
            .iter()
            .find(|u| *u.key() == key)
            .cloned()
    }

    // --- Health transitions ---

    /// Mark the upstream unhealthy; hooks fire only on an actual transition.
    pub fn mark_unhealthy(&self, upstream: &Upstream<T>) {
        if upstream.mark_unhealthy() {
            tracing::warn!(upstream = %upstream.key(), "Upstream marked unhealthy");
            metrics::record_upstream_health(upstream.host(), false);
            if let Some(hooks) = self.hooks() {
                hooks.on_mark_unhealthy(upstream);
            }
        }
    }

    /// Mark the upstream healthy; hooks fire only on an actual transition.
    pub fn mark_healthy(&self, upstream: &Upstream<T>) {
        if upstream.mark_healthy() {
            tracing::info!(upstream = %upstream.key(), "Upstream re-admitted as healthy");
            metrics::record_upstream_health(upstream.host(), true);
            if let Some(hooks) = self.hooks() {
                hooks.on_mark_healthy(upstream);
            }
        }
    }

    /// Account for a failed forwarding attempt.
    ///
    /// Invokes `on_error`, counts the error, and marks the upstream unhealthy
    /// when the failure implicates the backend. Returns the classification.
    pub fn report_error(
        &self,
        upstream: &Upstream<T>,
        request: &Parts,
        error: &ForwardError,
    ) -> HealthState {
        if let Some(hooks) = self.hooks() {
            hooks.on_error(upstream, request, error);
        }
        upstream.record_error();

        let verdict = classify(error);
        if !verdict.is_healthy() {
            self.mark_unhealthy(upstream);
        }
        verdict
    }

    // --- Metrics ---

    /// Per-upstream metrics, in live-set order.
    pub fn metrics(&self) -> Vec<UpstreamMetrics> {
        self.upstreams
            .load()
            .iter()
            .map(|u| UpstreamMetrics::of(&**u))
            .collect()
    }

    /// Emit one structured log line per upstream.
    pub fn log_metrics(&self) {
        for (index, m) in self.metrics().iter().enumerate() {
            tracing::info!(
                index,
                host = %m.host,
                healthy = m.healthy,
                average_response_time = ?m.average_response_time,
                total_requests = m.total_requests,
                total_error_responses = m.total_error_responses,
                "Upstream metrics"
            );
        }
    }

    // --- Lifetime ---

    /// Stop the health watcher. Idempotent; in-flight requests are unaffected.
    pub fn dispose(&self) {
        if !self.lifetime.is_triggered() {
            tracing::debug!("Load balancer disposed");
        }
        self.lifetime.trigger();
    }

    pub fn is_disposed(&self) -> bool {
        self.lifetime.is_triggered()
    }
}

impl<T: Send + Sync + 'static> LoadBalancer<T> {
    /// Start the health watcher on the current Tokio runtime.
    ///
    /// The watcher holds only a weak reference; it exits on [`dispose`] or
    /// when the last strong handle is dropped.
    ///
    /// [`dispose`]: LoadBalancer::dispose
    pub fn spawn_health_watcher(self: &Arc<Self>, config: &HealthConfig) -> JoinHandle<()> {
        let watcher = HealthWatcher::new(self, config);
        tokio::spawn(watcher.run(self.lifetime.subscribe()))
    }

    /// Wrap in an `Arc` and start the health watcher.
    pub fn start(self, config: &HealthConfig) -> Arc<Self> {
        let balancer = Arc::new(self);
        let _ = balancer.spawn_health_watcher(config);
        balancer
    }
}

impl<T> Default for LoadBalancer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for LoadBalancer<T> {
    fn drop(&mut self) {
        self.lifetime.trigger();
    }
}
