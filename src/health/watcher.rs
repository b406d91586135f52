//! Periodic re-admission of unhealthy upstreams.
//!
//! # Responsibilities
//! - Tick on a fixed interval for the life of the load balancer
//! - Flip unhealthy upstreams that have been idle for the cooldown back to healthy
//!
//! # Design Decisions
//! - No active probe: the next real request confirms or re-fails the upstream
//! - The only exit is the load balancer's lifetime signal (or its drop)

use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::time::{self, Instant, MissedTickBehavior};

use crate::config::HealthConfig;
use crate::lifecycle::ShutdownSignal;
use crate::load_balancer::LoadBalancer;

pub struct HealthWatcher<T> {
    balancer: Weak<LoadBalancer<T>>,
    interval: Duration,
    cooldown: Duration,
}

impl<T> HealthWatcher<T> {
    pub fn new(balancer: &Arc<LoadBalancer<T>>, config: &HealthConfig) -> Self {
        Self {
            balancer: Arc::downgrade(balancer),
            interval: config.interval(),
            cooldown: config.cooldown(),
        }
    }

    pub async fn run(self, mut lifetime: ShutdownSignal) {
        tracing::info!(
            interval = ?self.interval,
            cooldown = ?self.cooldown,
            "Health watcher starting"
        );

        // First tick one full interval after start.
        let mut ticker = time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let Some(balancer) = self.balancer.upgrade() else {
                        break;
                    };
                    let readmitted = sweep(&balancer, self.cooldown, Instant::now());
                    if readmitted > 0 {
                        tracing::debug!(readmitted, "Health watcher tick");
                    }
                }
                _ = lifetime.recv() => {
                    break;
                }
            }
        }

        tracing::info!("Health watcher stopped");
    }
}

/// One watcher tick: re-admit every unhealthy upstream whose last request is
/// at least `cooldown` before `now`. Returns how many were re-admitted.
pub fn sweep<T>(balancer: &LoadBalancer<T>, cooldown: Duration, now: Instant) -> usize {
    let mut readmitted = 0;
    for upstream in balancer.upstreams().iter() {
        if !upstream.is_healthy() && upstream.idle_for(now) >= cooldown {
            balancer.mark_healthy(upstream);
            readmitted += 1;
        }
    }
    readmitted
}
