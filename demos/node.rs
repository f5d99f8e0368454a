//! # Example: node service modules under supervision
//!
//! Registers a handful of modules with different priorities and capabilities,
//! then runs until Ctrl-C / SIGTERM:
//! - `config`   (priority 0): start only;
//! - `database` (priority 1): start + stop + health check;
//! - `mempool`  (priority 2): health flips to unhealthy every third probe;
//! - `rpc`      (priority 3): health derived from status.
//!
//! Run with:
//! ```text
//! RUST_LOG=nodevisor=debug,node=info cargo run --example node
//! ```
//!
//! Optional config file (TOML) as first argument:
//! ```text
//! health_interval_secs = 5
//! max_recovery_attempts = 2
//! ```

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use nodevisor::{Config, Event, EventKind, Health, ModuleError, ModuleFn, Orchestrator};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn load_config() -> Result<Config, Box<dyn std::error::Error>> {
    match std::env::args().nth(1) {
        Some(path) => Ok(Config::from_toml_str(&std::fs::read_to_string(path)?)?),
        None => Ok(Config {
            health_interval: Duration::from_secs(5),
            ..Config::default()
        }),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cfg = load_config()?;

    #[cfg(feature = "logging")]
    let subs: Vec<Arc<dyn nodevisor::Subscribe>> = vec![Arc::new(nodevisor::LogWriter)];
    #[cfg(not(feature = "logging"))]
    let subs: Vec<Arc<dyn nodevisor::Subscribe>> = Vec::new();

    let orch = Orchestrator::builder(cfg).with_subscribers(subs).build()?;

    orch.register_module(
        "config",
        ModuleFn::new()
            .on_start(|| async {
                info!("configuration loaded");
                Ok(())
            })
            .arc(),
        0,
    );

    orch.register_module(
        "database",
        ModuleFn::new()
            .on_start(|| async {
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok(())
            })
            .on_stop(|| async { Ok(()) })
            .on_health(|| async { Ok(Health::healthy().with_detail("pool 8/8")) })
            .arc(),
        1,
    );

    let probes = Arc::new(AtomicU32::new(0));
    orch.register_module(
        "mempool",
        ModuleFn::new()
            .on_start(|| async { Ok(()) })
            .on_stop(|| async { Ok(()) })
            .on_health(move || {
                let probes = Arc::clone(&probes);
                async move {
                    match probes.fetch_add(1, Ordering::SeqCst) % 3 {
                        2 => Ok(Health::unhealthy("tx backlog above threshold")),
                        _ => Ok(Health::healthy()),
                    }
                }
            })
            .arc(),
        2,
    );

    orch.register_module(
        "rpc",
        ModuleFn::new()
            .on_start(|| async {
                std::env::var("RPC_FAIL")
                    .map_or(Ok(()), |_| Err(ModuleError::startup("bind: address in use")))
            })
            .on_stop(|| async { Ok(()) })
            .arc(),
        3,
    );

    // Print recovery activity from the raw event stream.
    let mut rx = orch.subscribe();
    tokio::spawn(async move {
        while let Ok(ev) = rx.recv().await {
            print_recovery(&ev);
        }
    });

    let report = orch.run_until_signal().await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn print_recovery(ev: &Event) {
    match ev.kind {
        EventKind::RecoveryScheduled => println!(
            "recovery: {} attempt={} delay={:?}",
            ev.module.as_deref().unwrap_or("-"),
            ev.attempt.unwrap_or_default(),
            ev.delay().unwrap_or_default()
        ),
        EventKind::RecoveryExhausted => println!(
            "gave up on {}",
            ev.module.as_deref().unwrap_or("-")
        ),
        _ => {}
    }
}
