use crate::RoutingTable;
use futures::future;
use http::{Request, Response, StatusCode};
use hub_agent_core::authz::Decision;
use percent_encoding::percent_decode_str;
use prometheus_client::{
    collector::Collector,
    encoding::{DescriptorEncoder, EncodeMetric},
    metrics::{gauge::ConstGauge, MetricType},
    registry::Registry,
};
use std::{convert::Infallible, sync::Arc, task};
use tokio::sync::watch;
use tracing::{debug, trace};

pub type Body = http_body_util::Full<bytes::Bytes>;

/// Serves forward-auth requests against the current [`RoutingTable`].
///
/// Each request resolves against the table that was current when it started.
/// Replacing the table never waits for in-flight requests, and requests never
/// observe a table under construction.
#[derive(Clone, Debug)]
pub struct HandlerSwitcher {
    tx: Arc<watch::Sender<Arc<RoutingTable>>>,
}

#[derive(Debug)]
struct Instrumented(HandlerSwitcher);

// === impl HandlerSwitcher ===

impl HandlerSwitcher {
    pub fn new(table: RoutingTable) -> Self {
        let (tx, _) = watch::channel(Arc::new(table));
        Self { tx: Arc::new(tx) }
    }

    /// Registers gauges describing the active table.
    pub fn register_metrics(&self, prom: &mut Registry) {
        prom.register_collector(Box::new(Instrumented(self.clone())));
    }

    /// Returns the active table.
    pub fn table(&self) -> Arc<RoutingTable> {
        self.tx.borrow().clone()
    }

    /// Returns a receiver notified of each published table.
    pub fn subscribe(&self) -> watch::Receiver<Arc<RoutingTable>> {
        self.tx.subscribe()
    }

    /// Publishes `table` if it is newer than the active one.
    pub fn replace(&self, table: RoutingTable) -> bool {
        let table = Arc::new(table);
        self.tx.send_if_modified(|current| {
            if table.generation() <= current.generation() {
                debug!(
                    active = current.generation(),
                    rejected = table.generation(),
                    "Ignoring stale routing table"
                );
                return false;
            }
            *current = table.clone();
            true
        })
    }

    /// Authorizes a request against the policy named by the first segment of
    /// its path, i.e. `/<name>@<namespace>`. The segment is percent-decoded.
    pub async fn serve<B>(&self, req: Request<B>) -> Response<Body> {
        let table = self.table();
        let (parts, _) = req.into_parts();

        let segment = parts
            .uri
            .path()
            .trim_start_matches('/')
            .split('/')
            .next()
            .unwrap_or_default();
        let key = percent_decode_str(segment).decode_utf8_lossy();
        let Some(entry) = table.get(&key) else {
            trace!(%key, generation = table.generation(), "Unknown policy");
            return response(StatusCode::NOT_FOUND, Default::default());
        };

        match entry.handler().authorize(&parts).await {
            Decision::Allow(headers) => response(StatusCode::OK, headers),
            Decision::Deny(headers) => {
                debug!(%key, "Unauthorized");
                response(StatusCode::UNAUTHORIZED, headers)
            }
        }
    }
}

impl<B> tower::Service<Request<B>> for HandlerSwitcher
where
    B: Send + 'static,
{
    type Response = Response<Body>;
    type Error = Infallible;
    type Future = future::BoxFuture<'static, Result<Response<Body>, Infallible>>;

    fn poll_ready(&mut self, _cx: &mut task::Context<'_>) -> task::Poll<Result<(), Infallible>> {
        task::Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<B>) -> Self::Future {
        let switcher = self.clone();
        Box::pin(async move { Ok(switcher.serve(req).await) })
    }
}

fn response(status: StatusCode, headers: http::HeaderMap) -> Response<Body> {
    let mut rsp = Response::new(Body::default());
    *rsp.status_mut() = status;
    *rsp.headers_mut() = headers;
    rsp
}

// === impl Instrumented ===

impl Collector for Instrumented {
    fn encode(&self, mut encoder: DescriptorEncoder<'_>) -> Result<(), std::fmt::Error> {
        let table = self.0.table();

        let entries_encoder = encoder.encode_descriptor(
            "routing_table_entries",
            "The number of policies in the active routing table",
            None,
            MetricType::Gauge,
        )?;
        ConstGauge::new(table.len() as i64).encode(entries_encoder)?;

        let generation_encoder = encoder.encode_descriptor(
            "routing_table_generation",
            "The generation of the active routing table",
            None,
            MetricType::Gauge,
        )?;
        ConstGauge::new(table.generation() as i64).encode(generation_encoder)?;

        Ok(())
    }
}
