use crate::{
    Compile, CompileError, Compiler, HandlerSwitcher, Policy, PolicyEvents, PolicyWatcher,
    RejectTokens, RoutingEntry, RoutingTable, WatcherMetrics,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use http::{header, Request, StatusCode};
use hub_agent_core::{
    authz::{Authorize, Decision},
    ResourceKey,
};
use hub_agent_k8s_api::hub::{
    AccessControlPolicy, AccessControlPolicyBasicAuth, AccessControlPolicyJwt,
    AccessControlPolicySpec,
};
use kubert::index::IndexNamespacedResource;
use std::sync::Arc;
use tokio::time;
use tower::ServiceExt;

struct Harness {
    switcher: HandlerSwitcher,
    events: PolicyEvents,
    metrics: WatcherMetrics,
    signal: drain::Signal,
}

fn compiler() -> Arc<dyn Compile> {
    Arc::new(Compiler::new(Arc::new(RejectTokens)))
}

/// Starts a watcher publishing to a fresh switcher.
fn start() -> Harness {
    let switcher = HandlerSwitcher::new(RoutingTable::default());
    let metrics = WatcherMetrics::default();
    let (watcher, events) = PolicyWatcher::new(compiler(), switcher.clone(), 16, metrics.clone());
    let (signal, shutdown) = drain::channel();
    tokio::spawn(watcher.run(shutdown));
    Harness {
        switcher,
        events,
        metrics,
        signal,
    }
}

impl Harness {
    /// Waits until a table of at least `generation` is published.
    async fn published(&self, generation: u64) -> Arc<RoutingTable> {
        let mut rx = self.switcher.subscribe();
        let table = time::timeout(
            time::Duration::from_secs(5),
            rx.wait_for(|t| t.generation() >= generation),
        )
        .await
        .expect("routing table must be published")
        .expect("switcher must not be dropped")
        .clone();
        table
    }
}

async fn get(
    switcher: &HandlerSwitcher,
    path: &str,
    authorization: Option<String>,
) -> http::Response<crate::Body> {
    let mut req = Request::builder().uri(path);
    if let Some(authorization) = authorization {
        req = req.header(header::AUTHORIZATION, authorization);
    }
    switcher
        .clone()
        .oneshot(req.body(()).unwrap())
        .await
        .expect("switcher is infallible")
}

fn basic_auth(users: &[&str]) -> AccessControlPolicySpec {
    AccessControlPolicySpec {
        basic_auth: Some(AccessControlPolicyBasicAuth {
            users: users.iter().map(|u| u.to_string()).collect(),
            ..Default::default()
        }),
        jwt: None,
    }
}

fn acp(name: &str, ns: &str, spec: AccessControlPolicySpec) -> AccessControlPolicy {
    let mut acp = AccessControlPolicy::new(name, spec);
    acp.metadata.namespace = Some(ns.to_string());
    acp
}

fn credentials(user: &str, password: &str) -> Option<String> {
    Some(format!(
        "Basic {}",
        STANDARD.encode(format!("{user}:{password}"))
    ))
}

#[tokio::test]
async fn added_policy_is_served() {
    let h = start();
    h.events.on_add(acp("p1", "test", basic_auth(&["alice:pw"])));
    h.published(1).await;

    let rsp = get(&h.switcher, "/p1@test", None).await;
    assert_eq!(rsp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(rsp.headers()[header::WWW_AUTHENTICATE], "Basic realm=\"hub\"");

    let rsp = get(&h.switcher, "/p1@test", credentials("alice", "pw")).await;
    assert_eq!(rsp.status(), StatusCode::OK);

    let rsp = get(&h.switcher, "/p1@test/some/path", credentials("alice", "pw")).await;
    assert_eq!(rsp.status(), StatusCode::OK);

    let rsp = get(&h.switcher, "/unknown@test", None).await;
    assert_eq!(rsp.status(), StatusCode::NOT_FOUND);

    let rsp = get(&h.switcher, "/", None).await;
    assert_eq!(rsp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn encoded_policy_key_is_decoded() {
    let h = start();
    h.events.on_add(acp("p1", "test", basic_auth(&["alice:pw"])));
    h.published(1).await;

    let rsp = get(&h.switcher, "/p1%40test", credentials("alice", "pw")).await;
    assert_eq!(rsp.status(), StatusCode::OK);

    let rsp = get(&h.switcher, "/p1%40test/some/path", None).await;
    assert_eq!(rsp.status(), StatusCode::UNAUTHORIZED);

    let rsp = get(&h.switcher, "/p1%40other", credentials("alice", "pw")).await;
    assert_eq!(rsp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn deleted_policy_is_not_found() {
    let h = start();
    let p1 = acp("p1", "test", basic_auth(&["alice:pw"]));
    h.events.on_add(p1.clone());
    h.published(1).await;
    assert_eq!(
        get(&h.switcher, "/p1@test", credentials("alice", "pw")).await.status(),
        StatusCode::OK
    );

    h.events.on_delete(p1);
    let table = h.published(2).await;
    assert!(table.is_empty());
    assert_eq!(
        get(&h.switcher, "/p1@test", credentials("alice", "pw")).await.status(),
        StatusCode::NOT_FOUND
    );
}

#[tokio::test]
async fn last_write_wins() {
    let switcher = HandlerSwitcher::new(RoutingTable::default());
    let (watcher, events) = PolicyWatcher::new(
        compiler(),
        switcher.clone(),
        16,
        WatcherMetrics::default(),
    );

    let v1 = basic_auth(&["alice:one"]);
    let v2 = basic_auth(&["alice:two"]);
    events.on_add(acp("p1", "test", v1));
    events.on_update(acp("p1", "test", v2.clone()));

    let (_signal, shutdown) = drain::channel();
    tokio::spawn(watcher.run(shutdown));

    let mut rx = switcher.subscribe();
    let table = rx.wait_for(|t| t.generation() >= 2).await.unwrap().clone();
    assert_eq!(table.len(), 1);
    let expected = Policy::new(ResourceKey::new("p1", Some("test")), v2)
        .fingerprint()
        .unwrap();
    assert_eq!(table.get("p1@test").unwrap().fingerprint(), expected);

    assert_eq!(
        get(&switcher, "/p1@test", credentials("alice", "two")).await.status(),
        StatusCode::OK
    );
    assert_eq!(
        get(&switcher, "/p1@test", credentials("alice", "one")).await.status(),
        StatusCode::UNAUTHORIZED
    );
}

#[tokio::test]
async fn compile_failure_does_not_hide_other_policies() {
    let h = start();
    h.events.on_add(acp("good", "test", basic_auth(&["alice:pw"])));
    h.events.on_add(acp("empty", "test", AccessControlPolicySpec::default()));
    h.events.on_add(acp(
        "both",
        "test",
        AccessControlPolicySpec {
            jwt: Some(AccessControlPolicyJwt::default()),
            ..basic_auth(&["alice:pw"])
        },
    ));

    let table = h.published(3).await;
    assert_eq!(table.keys().map(|k| k.as_str()).collect::<Vec<_>>(), ["good@test"]);
    assert!(h.metrics.compile_failures() >= 2);
    assert_eq!(get(&h.switcher, "/empty@test", None).await.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        get(&h.switcher, "/good@test", credentials("alice", "pw")).await.status(),
        StatusCode::OK
    );
}

#[tokio::test]
async fn duplicate_events_do_not_republish() {
    let h = start();
    let p1 = acp("p1", "test", basic_auth(&["alice:pw"]));
    h.events.on_add(p1.clone());
    h.events.on_update(p1);
    h.events.on_add(acp("p2", "test", basic_auth(&["bob:pw"])));

    let table = h.published(2).await;
    assert_eq!(table.generation(), 2);
    assert_eq!(table.len(), 2);
}

#[tokio::test]
async fn indexes_watch_events() {
    let h = start();
    let mut events = h.events.clone();
    IndexNamespacedResource::apply(&mut events, acp("p1", "test", basic_auth(&["alice:pw"])));
    assert_eq!(h.published(1).await.len(), 1);

    IndexNamespacedResource::<AccessControlPolicy>::delete(
        &mut events,
        "test".to_string(),
        "p1".to_string(),
    );
    assert!(h.published(2).await.is_empty());
}

#[tokio::test]
async fn malformed_policies_are_dropped() {
    let h = start();
    h.events
        .on_add(AccessControlPolicy::new("no-namespace", basic_auth(&["alice:pw"])));
    h.events.on_add(acp("p1", "test", basic_auth(&["alice:pw"])));

    let table = h.published(1).await;
    assert_eq!(table.keys().map(|k| k.as_str()).collect::<Vec<_>>(), ["p1@test"]);
}

#[tokio::test]
async fn full_queue_drops_events() {
    let switcher = HandlerSwitcher::new(RoutingTable::default());
    let (watcher, events) = PolicyWatcher::new(
        compiler(),
        switcher.clone(),
        1,
        WatcherMetrics::default(),
    );
    events.on_add(acp("p1", "test", basic_auth(&["alice:pw"])));
    events.on_add(acp("p2", "test", basic_auth(&["alice:pw"])));

    let (_signal, shutdown) = drain::channel();
    tokio::spawn(watcher.run(shutdown));

    let mut rx = switcher.subscribe();
    let table = rx.wait_for(|t| t.generation() >= 1).await.unwrap().clone();
    assert_eq!(table.keys().map(|k| k.as_str()).collect::<Vec<_>>(), ["p1@test"]);
}

#[tokio::test]
async fn shutdown_discards_queued_events() {
    let switcher = HandlerSwitcher::new(RoutingTable::default());
    let (watcher, events) = PolicyWatcher::new(
        compiler(),
        switcher.clone(),
        16,
        WatcherMetrics::default(),
    );
    events.on_add(acp("p1", "test", basic_auth(&["alice:pw"])));

    let (signal, shutdown) = drain::channel();
    let probe = shutdown.clone();
    let drained = tokio::spawn(signal.drain());
    drop(probe.signaled().await);

    time::timeout(time::Duration::from_secs(5), watcher.run(shutdown))
        .await
        .expect("watcher must stop");
    drained.await.unwrap();

    assert_eq!(switcher.table().generation(), 0);
    assert!(switcher.table().is_empty());
}

#[tokio::test]
async fn watcher_stops_on_shutdown() {
    let h = start();
    h.events.on_add(acp("p1", "test", basic_auth(&["alice:pw"])));
    h.published(1).await;

    time::timeout(time::Duration::from_secs(5), h.signal.drain())
        .await
        .expect("watcher must release shutdown");

    // The table remains served after the watcher stops.
    assert_eq!(get(&h.switcher, "/p1@test", None).await.status(), StatusCode::UNAUTHORIZED);
}

#[test]
fn compiler_requires_exactly_one_method() {
    let compiler = compiler();
    let key = ResourceKey::new("p", Some("ns"));

    let res = compiler.compile(&Policy::new(key.clone(), AccessControlPolicySpec::default()));
    assert!(matches!(res, Err(CompileError::NoMethod)));

    let both = AccessControlPolicySpec {
        jwt: Some(AccessControlPolicyJwt::default()),
        ..basic_auth(&["alice:pw"])
    };
    let res = compiler.compile(&Policy::new(key.clone(), both));
    assert!(matches!(res, Err(CompileError::MultipleMethods)));

    let jwt = AccessControlPolicySpec {
        jwt: Some(AccessControlPolicyJwt::default()),
        basic_auth: None,
    };
    assert!(compiler.compile(&Policy::new(key, jwt)).is_ok());
}

#[tokio::test]
async fn default_validator_rejects_tokens() {
    let h = start();
    h.events.on_add(acp(
        "p1",
        "test",
        AccessControlPolicySpec {
            jwt: Some(AccessControlPolicyJwt::default()),
            basic_auth: None,
        },
    ));
    h.published(1).await;

    let rsp = get(&h.switcher, "/p1@test", Some("Bearer abc.def.ghi".to_string())).await;
    assert_eq!(rsp.status(), StatusCode::UNAUTHORIZED);
}

#[test]
fn replace_rejects_stale_tables() {
    let switcher = HandlerSwitcher::new(RoutingTable::default());
    assert!(switcher.replace(RoutingTable::new(2, None)));
    assert!(!switcher.replace(RoutingTable::new(2, None)));
    assert!(!switcher.replace(RoutingTable::new(1, None)));
    assert_eq!(switcher.table().generation(), 2);
    assert!(switcher.replace(RoutingTable::new(3, None)));
}

/// Allows every request, reporting the generation of its table.
struct Generation(u64);

#[async_trait::async_trait]
impl Authorize for Generation {
    async fn authorize(&self, _: &http::request::Parts) -> Decision {
        let mut headers = http::HeaderMap::new();
        headers.insert("x-generation", self.0.into());
        Decision::Allow(headers)
    }
}

fn generation_table(generation: u64) -> RoutingTable {
    RoutingTable::new(
        generation,
        (0..8).map(|i| {
            (
                ResourceKey::new(format!("p{i}"), Some("test")),
                RoutingEntry::new(Arc::new(Generation(generation)), generation.to_string()),
            )
        }),
    )
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn readers_observe_whole_tables() {
    const GENERATIONS: u64 = 200;
    let switcher = HandlerSwitcher::new(generation_table(1));

    let readers = (0..4)
        .map(|r| {
            let switcher = switcher.clone();
            tokio::spawn(async move {
                let mut last = 0;
                loop {
                    let table = switcher.table();
                    let generation = table.generation();
                    assert_eq!(table.len(), 8);
                    for key in table.keys() {
                        let entry = table.get(key.as_str()).unwrap();
                        assert_eq!(entry.fingerprint(), generation.to_string());
                    }

                    let path = format!("/p{}@test", r % 8);
                    let rsp = switcher
                        .serve(Request::builder().uri(path).body(()).unwrap())
                        .await;
                    assert_eq!(rsp.status(), StatusCode::OK);
                    let seen = rsp.headers()["x-generation"]
                        .to_str()
                        .unwrap()
                        .parse::<u64>()
                        .unwrap();
                    assert!(seen >= last, "generations must not regress");
                    last = seen;

                    if seen == GENERATIONS {
                        return;
                    }
                    tokio::task::yield_now().await;
                }
            })
        })
        .collect::<Vec<_>>();

    for generation in 2..=GENERATIONS {
        assert!(switcher.replace(generation_table(generation)));
        tokio::task::yield_now().await;
    }

    for reader in readers {
        time::timeout(time::Duration::from_secs(10), reader)
            .await
            .expect("reader must observe the final table")
            .expect("reader must not panic");
    }
}

#[test]
fn switcher_is_always_ready() {
    let mut switcher = HandlerSwitcher::new(RoutingTable::default());
    let mut task = tokio_test::task::spawn(());
    task.enter(|cx, _| {
        tokio_test::assert_ready_ok!(tower::Service::<Request<()>>::poll_ready(
            &mut switcher,
            cx
        ));
    });
}
