#![allow(dead_code)]

use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use keel_core::AppContext;

/// Helper for testing [`AppContext`]: starts workers that finish only after
/// the context shuts down, and keeps a marker per worker.
pub struct ContextTestVehicle {
    ctx: AppContext,
    markers: Vec<Arc<AtomicBool>>,
}

impl ContextTestVehicle {
    pub fn new() -> Self {
        Self {
            ctx: AppContext::new(),
            markers: vec![],
        }
    }

    pub fn ctx(&self) -> &AppContext {
        &self.ctx
    }

    /// Starts a worker that flips its marker after the context shuts down.
    pub async fn start_waiting_worker(&mut self) {
        let marker = Arc::new(AtomicBool::new(false));
        let worker_marker = marker.clone();
        let ctx = self.ctx.clone();

        self.ctx.start_worker(async move {
            ctx.terminated().await;
            worker_marker.store(true, Ordering::SeqCst);
        });

        self.markers.push(marker);

        // Let the worker reach its suspension point
        tokio::task::yield_now().await;
    }

    pub fn assert_workers_not_finished(&self) {
        for marker in &self.markers {
            assert_eq!(marker.load(Ordering::SeqCst), false);
        }
    }

    pub fn assert_workers_finished(&self) {
        for marker in &self.markers {
            assert_eq!(marker.load(Ordering::SeqCst), true);
        }
    }
}
