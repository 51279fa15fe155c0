use crate::{
    acp::{Compiler, HandlerSwitcher, PolicyWatcher, RejectTokens, RoutingTable, WatcherMetrics},
    k8s::{
        hub::{AccessControlPolicy, Catalog},
        watcher,
    },
    platform,
    sync::{EdgeIngressHandler, IngressConfig, KubeHandler, ResourceSyncer, SyncMetrics},
};
use anyhow::{bail, Result};
use clap::Parser;
use parking_lot::RwLock;
use prometheus_client::registry::Registry;
use std::{net::SocketAddr, sync::Arc};
use tokio::time::Duration;
use tracing::{info_span, Instrument};

#[derive(Debug, Parser)]
#[clap(
    name = "hub-agent",
    about = "Synchronizes platform resources and serves access control policies"
)]
pub struct Args {
    #[clap(long, default_value = "hub_agent=info,warn", env = "HUB_AGENT_LOG")]
    log_level: kubert::LogFilter,

    #[clap(long, default_value = "plain")]
    log_format: kubert::LogFormat,

    #[clap(flatten)]
    client: kubert::ClientArgs,

    #[clap(flatten)]
    admin: kubert::AdminArgs,

    /// Address of the forward-auth server.
    #[clap(long, default_value = "0.0.0.0:9000")]
    auth_addr: SocketAddr,

    #[clap(long, env = "HUB_PLATFORM_URL")]
    platform_url: String,

    #[clap(long, env = "HUB_TOKEN", hide_env_values = true)]
    token: String,

    #[clap(long, default_value = "30")]
    sync_interval_secs: u64,

    /// Bounds every platform and cluster call made while synchronizing.
    #[clap(long, default_value = "20000")]
    sync_timeout_ms: u64,

    /// The number of policy changes buffered before new ones are dropped.
    #[clap(long, default_value = "1024")]
    policy_queue_size: usize,

    #[clap(long, default_value = "traefik-hub")]
    ingress_class_name: String,

    #[clap(long, default_value = "websecure")]
    traefik_entry_point: String,
}

impl Args {
    #[inline]
    pub async fn parse_and_run() -> Result<()> {
        Self::parse().run().await
    }

    pub async fn run(self) -> Result<()> {
        let Self {
            log_level,
            log_format,
            client,
            admin,
            auth_addr,
            platform_url,
            token,
            sync_interval_secs,
            sync_timeout_ms,
            policy_queue_size,
            ingress_class_name,
            traefik_entry_point,
        } = self;

        if policy_queue_size == 0 {
            bail!("--policy-queue-size must be positive");
        }
        let sync_interval = Duration::from_secs(sync_interval_secs);
        let sync_timeout = Duration::from_millis(sync_timeout_ms);

        // Routing tables are published here by the policy watcher and read by
        // the forward-auth server.
        let switcher = HandlerSwitcher::new(RoutingTable::default());

        let mut prom = <Registry>::default();
        switcher.register_metrics(&mut prom);
        let watcher_metrics = WatcherMetrics::register(&mut prom);
        let sync_metrics = SyncMetrics::register(&mut prom);
        let rt_metrics = kubert::RuntimeMetrics::register(prom.sub_registry_with_prefix("kube"));

        let mut runtime = kubert::Runtime::builder()
            .with_log(log_level, log_format)
            .with_metrics(rt_metrics)
            .with_admin(admin.into_builder().with_prometheus(prom))
            .with_client(client)
            .build()
            .await?;

        // Feed access control policies to the watcher, which compiles them
        // into routing tables.
        let compiler = Arc::new(Compiler::new(Arc::new(RejectTokens)));
        let (policy_watcher, policy_events) = PolicyWatcher::new(
            compiler,
            switcher.clone(),
            policy_queue_size,
            watcher_metrics,
        );
        let policies = runtime.watch_all::<AccessControlPolicy>(watcher::Config::default());
        tokio::spawn(
            kubert::index::namespaced(Arc::new(RwLock::new(policy_events)), policies)
                .instrument(info_span!("accesscontrolpolicies")),
        );
        tokio::spawn(
            policy_watcher
                .run(runtime.shutdown_handle())
                .instrument(info_span!("policy_watcher")),
        );

        // Spawn a synchronization loop per platform resource kind.
        let platform = platform::Client::new(platform_url, token, sync_timeout)?;

        let edge_ingresses = ResourceSyncer::new(
            "EdgeIngress",
            platform::EdgeIngresses::new(platform.clone()),
            EdgeIngressHandler::new(
                runtime.client(),
                IngressConfig {
                    ingress_class_name,
                    entry_point: traefik_entry_point,
                },
            ),
            sync_timeout,
            sync_metrics.clone(),
        );
        tokio::spawn(
            edge_ingresses
                .run(sync_interval, runtime.shutdown_handle())
                .instrument(info_span!("edgeingresses")),
        );

        let catalogs = ResourceSyncer::new(
            "Catalog",
            platform::Catalogs::new(platform),
            KubeHandler::<Catalog>::new(runtime.client()),
            sync_timeout,
            sync_metrics,
        );
        tokio::spawn(
            catalogs
                .run(sync_interval, runtime.shutdown_handle())
                .instrument(info_span!("catalogs")),
        );

        tokio::spawn(crate::server::serve(
            auth_addr,
            switcher,
            runtime.shutdown_handle(),
        ));

        // Block the main thread on the shutdown signal. Once it fires, wait for
        // the background tasks to complete before exiting.
        if runtime.run().await.is_err() {
            bail!("Aborted");
        }

        Ok(())
    }
}
