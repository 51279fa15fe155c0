use crate::acp::HandlerSwitcher;
use anyhow::Result;
use hyper_util::{rt::TokioIo, service::TowerToHyperService};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::{debug, debug_span, info, instrument, warn, Instrument};

/// Serves forward-auth requests until shutdown is signaled.
///
/// Open connections are closed gracefully, and shutdown is held until they
/// complete.
#[instrument(skip_all, fields(port = %addr.port()))]
pub(crate) async fn serve(
    addr: SocketAddr,
    switcher: HandlerSwitcher,
    drain: drain::Watch,
) -> Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "Authorization server listening");
    accept(listener, switcher, drain).await;
    Ok(())
}

async fn accept(listener: TcpListener, switcher: HandlerSwitcher, drain: drain::Watch) {
    let shutdown = drain.clone().signaled();
    tokio::pin!(shutdown);

    loop {
        let (io, client) = tokio::select! {
            biased;
            _ = &mut shutdown => {
                info!("Authorization server stopped");
                return;
            }
            res = listener.accept() => match res {
                Ok(conn) => conn,
                Err(error) => {
                    warn!(%error, "Failed to accept connection");
                    continue;
                }
            },
        };

        let svc = TowerToHyperService::new(switcher.clone());
        let drain = drain.clone();
        tokio::spawn(
            async move {
                let conn = hyper::server::conn::http1::Builder::new()
                    .serve_connection(TokioIo::new(io), svc);
                tokio::pin!(conn);

                let res = tokio::select! {
                    res = conn.as_mut() => res,
                    handle = drain.signaled() => {
                        conn.as_mut().graceful_shutdown();
                        handle.release_after(conn).await
                    }
                };
                if let Err(error) = res {
                    debug!(%error, "Connection closed");
                }
            }
            .instrument(debug_span!("conn", %client)),
        );
    }
}
