// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use anyhow::{bail, Context as _, Result};
use clap::Parser;
use kops_controller::{
    cloud::CloudProvider,
    cluster::{ClusterApi, KubeCluster},
    config::{Cli, Options},
    constants::TOKIO_WORKER_THREADS,
    context::Context,
    controllers::run_controllers,
    keystore::{FileKeystore, Keystore},
    metrics::{run_metrics_server, Readiness},
};
use kube::Client;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

fn main() -> Result<()> {
    // Build Tokio runtime with custom thread names
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(TOKIO_WORKER_THREADS)
        .thread_name("kops-controller")
        .enable_all()
        .build()?;

    runtime.block_on(async_main())
}

/// Initialize logging.
///
/// Respects `RUST_LOG` (default `info`) and `RUST_LOG_FORMAT` (`json` or text).
fn init_logging() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let log_format = std::env::var("RUST_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    match log_format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .json()
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .with_ansi(true)
                .compact()
                .init();
        }
    }
}

async fn async_main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    info!("Starting kops-controller");
    debug!(config = %cli.config.display(), "Loading configuration");
    let options = Arc::new(Options::load(&cli.config)?);
    info!(
        cloud = %options.cloud,
        hosts = options.hosts.is_some(),
        csr = options.csr.is_some(),
        cloud_ipam = options.enable_cloud_ipam,
        concurrency = options.concurrency,
        "Configuration loaded"
    );

    debug!("Initializing Kubernetes client");
    let client = Client::try_default()
        .await
        .context("creating Kubernetes client")?;
    let cluster: Arc<dyn ClusterApi> = Arc::new(KubeCluster::new(client.clone()));

    let cloud = Arc::new(
        CloudProvider::from_options(&options, cluster.clone())
            .await
            .context("configuring cloud provider")?,
    );
    debug!(cloud = %cloud.kind(), "Cloud provider ready");

    let keystore = match &options.csr {
        Some(csr) => Some(load_keystore(csr).await?),
        None => None,
    };

    let token = CancellationToken::new();
    tokio::spawn(shutdown_on_signal(token.clone()));

    let readiness = Arc::new(Readiness::new());
    let metrics_server = tokio::spawn(run_metrics_server(
        cli.metrics_bind_address,
        readiness.clone(),
        token.clone(),
    ));

    let ctx = Arc::new(Context::new(cluster, cloud, keystore, options, token.clone()));

    info!("Starting all controllers");
    readiness.set_ready(true);
    run_controllers(client, ctx).await;
    readiness.set_ready(false);

    if !token.is_cancelled() {
        error!("CRITICAL: controllers exited without a shutdown signal");
        token.cancel();
        bail!("controllers exited unexpectedly");
    }

    match metrics_server.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(error = %e, "metrics server failed"),
        Err(e) => warn!(error = %e, "metrics server task panicked"),
    }

    info!("kops-controller stopped");
    Ok(())
}

/// Open the keystore and make sure the signing keyset is usable.
///
/// A keystore that cannot be read at startup is fatal: the process exits and
/// the orchestrator restarts it.
async fn load_keystore(csr: &kops_controller::config::CsrOptions) -> Result<Arc<dyn Keystore>> {
    let keystore = FileKeystore::new(&csr.keystore_path);
    match keystore.find_keypair(&csr.signer).await {
        Ok(Some(keypair)) => {
            info!(
                signer = %csr.signer,
                keypair_id = %keypair.id,
                path = %csr.keystore_path.display(),
                "Loaded signing keyset"
            );
        }
        Ok(None) => bail!(
            "fatal: keyset '{}' not found in {}",
            csr.signer,
            csr.keystore_path.display()
        ),
        Err(e) => {
            return Err(e).with_context(|| {
                format!("fatal: loading keystore {}", csr.keystore_path.display())
            })
        }
    }
    Ok(Arc::new(keystore))
}

/// Cancel `token` on SIGTERM (pod termination) or SIGINT.
async fn shutdown_on_signal(token: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => info!("Received SIGINT, initiating graceful shutdown..."),
                    _ = sigterm.recv() => info!("Received SIGTERM (pod termination), initiating graceful shutdown..."),
                }
            }
            Err(e) => {
                warn!(error = %e, "cannot install SIGTERM handler, only SIGINT will stop the controller");
                let _ = tokio::signal::ctrl_c().await;
                info!("Received SIGINT, initiating graceful shutdown...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        info!("Received SIGINT, initiating graceful shutdown...");
    }

    info!("Stopping all controllers...");
    token.cancel();
}
