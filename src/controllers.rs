// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Controller wiring.
//!
//! One `kube::runtime::Controller` per reconciler. The runtime provides the
//! per-key work queue: a key is never reconciled concurrently with itself,
//! and distinct keys run in parallel up to `concurrency`.
//!
//! | Controller | Watches | Key | Enabled when |
//! |---|---|---|---|
//! | `node-labels` | `Node` | node name | always |
//! | `pod-cidr` | `Node` | node name | `enableCloudIPAM` |
//! | `hosts` | role-labelled `Node`s | a single worker | `hosts` configured |
//! | `certificate-request` | `CertificateRequest` | namespace/name | `csr` configured |
//!
//! On metal the node controllers also watch `Host` records in `kops-system`,
//! so a node that registered before its `Host` is reconciled once the `Host`
//! appears.
//!
//! The hosts table is one object built from many nodes, so it does not use a
//! `Controller`: node events wake a single worker (see [`run_hosts_worker`]),
//! and the target `ConfigMap` does not need to exist beforehand.
//!
//! Every controller shuts down when the context's token is cancelled.

use crate::cloud::CloudProvider;
use crate::constants::{
    CONTROLLER_CSR, CONTROLLER_HOSTS, CONTROLLER_NODE_LABELS, CONTROLLER_POD_CIDR,
    KOPS_SYSTEM_NAMESPACE,
};
use crate::context::Context;
use crate::crd::{CertificateRequest, Host};
use crate::errors::{ControllerError, ErrorKind};
use crate::metrics;
use crate::reconcilers::predicates::{hosts_relevant, node_fingerprint, node_for_host};
use crate::reconcilers::{
    reconcile_certificate_request, reconcile_hosts, reconcile_node_labels, reconcile_pod_cidr,
    Outcome,
};
use futures::future::BoxFuture;
use futures::{FutureExt, StreamExt};
use k8s_openapi::api::core::v1::Node;
use kube::runtime::controller::{Action, Config as ControllerConfig};
use kube::runtime::reflector;
use kube::runtime::{watcher, Controller, PredicateConfig, WatchStreamExt};
use kube::{Api, Client, Resource, ResourceExt};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Notify;
use tracing::{debug, error, info, warn};

/// Run every enabled controller until the context's token is cancelled.
pub async fn run_controllers(client: Client, ctx: Arc<Context>) {
    let mut controllers: Vec<BoxFuture<'static, ()>> =
        vec![run_node_labels_controller(client.clone(), ctx.clone()).boxed()];

    if ctx.options.enable_cloud_ipam {
        controllers.push(run_pod_cidr_controller(client.clone(), ctx.clone()).boxed());
    } else {
        info!("enableCloudIPAM is false, pod CIDR controller disabled");
    }

    if ctx.options.hosts.is_some() {
        controllers.push(run_hosts_controller(client.clone(), ctx.clone()).boxed());
    } else {
        info!("no hostnames configured, hosts controller disabled");
    }

    if ctx.options.csr.is_some() && ctx.keystore.is_some() {
        controllers.push(run_csr_controller(client, ctx.clone()).boxed());
    } else {
        info!("CSR signing not configured, certificate request controller disabled");
    }

    futures::future::join_all(controllers).await;
}

fn controller_config(ctx: &Context) -> ControllerConfig {
    ControllerConfig::default().concurrency(ctx.options.concurrency)
}

// ============================================================================
// Node controllers
// ============================================================================

/// Node controller with the heartbeat filter applied and, on metal, a
/// `Host` watch mapped back to the node of the same name.
fn node_controller(client: Client, ctx: &Context) -> Controller<Node> {
    let api = Api::<Node>::all(client.clone());
    let (reader, writer) = reflector::store();
    let stream = watcher(api, watcher::Config::default())
        .default_backoff()
        .reflect(writer)
        .applied_objects()
        .predicate_filter(node_fingerprint, PredicateConfig::default());

    let controller = Controller::for_stream(stream, reader)
        .with_config(controller_config(ctx))
        .graceful_shutdown_on(ctx.token.clone().cancelled_owned());

    if matches!(ctx.cloud.as_ref(), CloudProvider::Metal(_)) {
        controller.watches(
            Api::<Host>::namespaced(client, KOPS_SYSTEM_NAMESPACE),
            watcher::Config::default(),
            |host: Host| node_for_host(&host),
        )
    } else {
        controller
    }
}

/// Run the node labeler
async fn run_node_labels_controller(client: Client, ctx: Arc<Context>) {
    info!("Starting node-labels controller");

    node_controller(client, &ctx)
        .run(
            reconcile_node_labels_wrapper,
            error_policy::<Node>(CONTROLLER_NODE_LABELS),
            ctx,
        )
        .for_each(|_| futures::future::ready(()))
        .await;

    info!("node-labels controller stopped");
}

async fn reconcile_node_labels_wrapper(
    node: Arc<Node>,
    ctx: Arc<Context>,
) -> Result<Action, ControllerError> {
    let started = Instant::now();
    let key = object_key(CONTROLLER_NODE_LABELS, node.as_ref());
    let result =
        reconcile_node_labels(ctx.cluster.as_ref(), &ctx.cloud, &ctx.scope(), &node).await;
    finish(CONTROLLER_NODE_LABELS, &key, started, result, &ctx)
}

/// Run the pod CIDR allocator
async fn run_pod_cidr_controller(client: Client, ctx: Arc<Context>) {
    info!("Starting pod-cidr controller");

    node_controller(client, &ctx)
        .run(
            reconcile_pod_cidr_wrapper,
            error_policy::<Node>(CONTROLLER_POD_CIDR),
            ctx,
        )
        .for_each(|_| futures::future::ready(()))
        .await;

    info!("pod-cidr controller stopped");
}

async fn reconcile_pod_cidr_wrapper(
    node: Arc<Node>,
    ctx: Arc<Context>,
) -> Result<Action, ControllerError> {
    let started = Instant::now();
    let key = object_key(CONTROLLER_POD_CIDR, node.as_ref());
    let result = reconcile_pod_cidr(ctx.cluster.as_ref(), &ctx.cloud, &ctx.scope(), &node).await;
    finish(CONTROLLER_POD_CIDR, &key, started, result, &ctx)
}

// ============================================================================
// Hosts controller
// ============================================================================

/// Run the hosts controller.
///
/// A node watch wakes the worker whenever a node passes [`hosts_relevant`];
/// delete events are included. The worker also runs once at startup.
async fn run_hosts_controller(client: Client, ctx: Arc<Context>) {
    let Some(hosts) = ctx.options.hosts.as_ref() else {
        return;
    };
    info!(config_map = %hosts.config_map, "Starting hosts controller");

    let trigger = Arc::new(Notify::new());
    trigger.notify_one();

    futures::join!(
        forward_hosts_events(Api::<Node>::all(client), ctx.clone(), trigger.clone()),
        run_hosts_worker(ctx.clone(), trigger),
    );

    info!("hosts controller stopped");
}

async fn forward_hosts_events(api: Api<Node>, ctx: Arc<Context>, trigger: Arc<Notify>) {
    let mut events = watcher(api, watcher::Config::default())
        .default_backoff()
        .touched_objects()
        .take_until(ctx.token.clone().cancelled_owned())
        .boxed();

    while let Some(event) = events.next().await {
        match event {
            Ok(node) if hosts_relevant(&node, &ctx.hosts.tracked) => {
                debug!(node = %node.name_any(), "hosts-relevant node changed");
                trigger.notify_one();
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "node watch failed, retrying"),
        }
    }
}

/// Rebuild the hosts table each time `trigger` fires, until cancelled.
///
/// Triggers that arrive while a rebuild is running collapse into one more
/// rebuild. A failed rebuild is retried with the shared backoff; a new
/// trigger does not cut the backoff short.
pub async fn run_hosts_worker(ctx: Arc<Context>, trigger: Arc<Notify>) {
    let Some(options) = ctx.options.hosts.as_ref() else {
        return;
    };
    let key = format!("{CONTROLLER_HOSTS}/{}", options.config_map);

    loop {
        tokio::select! {
            () = ctx.token.cancelled() => return,
            () = trigger.notified() => {}
        }

        loop {
            let started = Instant::now();
            let result =
                reconcile_hosts(ctx.cluster.as_ref(), &ctx.scope(), options, &ctx.hosts).await;
            let Err(err) = finish(CONTROLLER_HOSTS, &key, started, result, &ctx) else {
                break;
            };
            let Some(delay) = retry_delay(CONTROLLER_HOSTS, &key, &err, &ctx) else {
                break;
            };
            tokio::select! {
                () = ctx.token.cancelled() => return,
                () = tokio::time::sleep(delay) => {}
            }
        }
    }
}

// ============================================================================
// CertificateRequest controller
// ============================================================================

/// Run the `CertificateRequest` signer
async fn run_csr_controller(client: Client, ctx: Arc<Context>) {
    info!("Starting certificate-request controller");

    let api = Api::<CertificateRequest>::all(client);

    Controller::new(api, watcher::Config::default())
        .with_config(controller_config(&ctx))
        .graceful_shutdown_on(ctx.token.clone().cancelled_owned())
        .run(
            reconcile_csr_wrapper,
            error_policy::<CertificateRequest>(CONTROLLER_CSR),
            ctx,
        )
        .for_each(|_| futures::future::ready(()))
        .await;

    info!("certificate-request controller stopped");
}

async fn reconcile_csr_wrapper(
    request: Arc<CertificateRequest>,
    ctx: Arc<Context>,
) -> Result<Action, ControllerError> {
    let started = Instant::now();
    let key = object_key(CONTROLLER_CSR, request.as_ref());
    let (Some(options), Some(keystore)) = (ctx.options.csr.as_ref(), ctx.keystore.as_ref()) else {
        return Ok(Action::await_change());
    };
    let result = reconcile_certificate_request(
        ctx.cluster.as_ref(),
        keystore.as_ref(),
        &ctx.scope(),
        options,
        &request,
    )
    .await;
    finish(CONTROLLER_CSR, &key, started, result, &ctx)
}

// ============================================================================
// Shared outcome handling
// ============================================================================

/// Requeue-tracker key: `controller/namespace/name`.
pub fn object_key<K: Resource>(controller: &str, obj: &K) -> String {
    format!(
        "{controller}/{}/{}",
        obj.namespace().unwrap_or_default(),
        obj.name_any()
    )
}

/// Record metrics and turn a reconcile result into the controller's answer.
///
/// `NotReady` is not a failure: the missing precondition arrives as a later
/// event, so the key waits for a change instead of backing off.
pub fn finish(
    controller: &str,
    key: &str,
    started: Instant,
    result: Result<Outcome, ControllerError>,
    ctx: &Context,
) -> Result<Action, ControllerError> {
    let elapsed = started.elapsed();
    match result {
        Ok(outcome) => {
            metrics::record_reconciliation(controller, outcome.as_str(), elapsed);
            ctx.requeues.reset(key);
            Ok(Action::await_change())
        }
        Err(e) if e.kind() == ErrorKind::NotReady => {
            debug!(controller, key, reason = %e, "waiting for precondition");
            metrics::record_reconciliation(controller, ErrorKind::NotReady.as_str(), elapsed);
            ctx.requeues.reset(key);
            Ok(Action::await_change())
        }
        Err(e) => {
            metrics::record_reconciliation_error(controller, e.kind().as_str(), elapsed);
            Err(e)
        }
    }
}

/// Error policy shared by every controller: exponential back-off per key,
/// immediate retry on conflict, no retry for terminal or cancelled work.
pub fn error_policy<K: Resource>(
    controller: &'static str,
) -> impl Fn(Arc<K>, &ControllerError, Arc<Context>) -> Action {
    move |obj, err, ctx| requeue_action(controller, &object_key(controller, obj.as_ref()), err, &ctx)
}

/// Decide and record the requeue for a failed reconcile.
pub fn requeue_action(
    controller: &str,
    key: &str,
    err: &ControllerError,
    ctx: &Context,
) -> Action {
    match retry_delay(controller, key, err, ctx) {
        Some(delay) => Action::requeue(delay),
        None => Action::await_change(),
    }
}

/// Log a failed reconcile and return how long to wait before the next
/// attempt, or `None` when the key must wait for a change.
pub fn retry_delay(
    controller: &str,
    key: &str,
    err: &ControllerError,
    ctx: &Context,
) -> Option<Duration> {
    let kind = err.kind();
    let attempt = ctx.requeues.next_attempt(key);

    match kind {
        ErrorKind::Terminal | ErrorKind::Fatal => {
            error!(controller, key, error = %err, "reconcile failed permanently");
        }
        ErrorKind::Cancelled => debug!(controller, key, "reconcile cancelled by shutdown"),
        _ => warn!(controller, key, attempt, error = %err, "reconcile failed, will retry"),
    }

    let delay = err.requeue_after(attempt);
    match delay {
        Some(delay) => {
            metrics::record_requeue(controller, kind.as_str());
            debug!(controller, key, delay_ms = delay.as_millis() as u64, "requeueing");
        }
        None => ctx.requeues.reset(key),
    }
    delay
}

#[cfg(test)]
#[path = "controllers_tests.rs"]
mod controllers_tests;
