use keel::config::{Validate, ValidationErrors};
use keel::{App, AppContext, ConfigSlot};
use serde::Deserialize;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct DemoSettings {
    workers: usize,
    tick: Duration,
    lifetime: Option<Duration>,
}

/// The part of the configuration document this service reads.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DemoDocument {
    demo: DemoSettings,
}

impl Default for DemoSettings {
    fn default() -> Self {
        Self {
            workers: 2,
            tick: Duration::from_secs(1),
            lifetime: None,
        }
    }
}

impl Validate for DemoDocument {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        errors.check(self.demo.workers > 0, "demo.workers must be positive");
        errors.check(!self.demo.tick.is_zero(), "demo.tick must not be zero");
        if let Some(lifetime) = self.demo.lifetime {
            errors.check(
                lifetime >= self.demo.tick,
                "demo.lifetime must not be shorter than demo.tick",
            );
        }

        errors.into_result()
    }
}

fn main() {
    let document = ConfigSlot::<DemoDocument>::new();

    let app = App::new();
    app.with_env_overrides("KEEL")
        .with_validated_config(document.clone());

    app.start(move |ctx| async move {
        let Some(settings) = document.get().map(|document| document.demo.clone()) else {
            warn!("Demo settings are missing; nothing to do");
            ctx.shutdown();
            return;
        };

        for id in 0..settings.workers {
            ctx.start_worker(tick(ctx.clone(), id, settings.tick));
        }

        if let Some(lifetime) = settings.lifetime {
            let timer_ctx = ctx.clone();
            ctx.start_worker(async move {
                sleep_or_shutdown(&timer_ctx, lifetime).await;
                if timer_ctx.shutdown() {
                    info!(?lifetime, "Lifetime is over, shutting down");
                }
            });
        }
    });
}

async fn tick(ctx: AppContext, id: usize, every: Duration) {
    let mut ticks = 0_u64;

    while !ctx.is_shutting_down() {
        ticks += 1;
        info!(worker = id, ticks, "Tick");
        sleep_or_shutdown(&ctx, every).await;
    }

    info!(worker = id, ticks, "Goodbye");
}

async fn sleep_or_shutdown(ctx: &AppContext, duration: Duration) {
    keel::tokio::select! {
        _ = ctx.terminated() => {}
        _ = keel::tokio::time::sleep(duration) => {}
    }
}
