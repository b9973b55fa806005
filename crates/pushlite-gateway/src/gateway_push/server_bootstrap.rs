//! Push gateway server bootstrap and router wiring.

use pushlite_delivery::{start_push_dispatcher, PushDispatcherHandle};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use super::*;

/// Running gateway: HTTP listener plus dispatcher workers.
pub struct PushGatewayServerHandle {
    local_addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    server_task: Option<JoinHandle<std::io::Result<()>>>,
    dispatcher: PushDispatcherHandle,
}

impl PushGatewayServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stops accepting requests, then drains the delivery queue and the
    /// resulting outcome callbacks within the dispatcher drain timeout.
    pub async fn shutdown(mut self) -> Result<()> {
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            let _ = shutdown_tx.send(());
        }
        let serve_result = match self.server_task.take() {
            Some(task) => Some(task.await),
            None => None,
        };
        self.dispatcher.shutdown().await;
        match serve_result {
            Some(Ok(result)) => result.context("push gateway server exited unexpectedly"),
            Some(Err(error)) => Err(error).context("push gateway server task failed"),
            None => Ok(()),
        }
    }
}

/// Binds the listener, starts dispatcher workers, and serves in the background.
pub async fn start_push_gateway_server(
    config: PushGatewayServerConfig,
) -> Result<PushGatewayServerHandle> {
    let bind_addr = config
        .bind
        .parse::<SocketAddr>()
        .with_context(|| format!("invalid --bind '{}'", config.bind))?;
    let listener = TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind push gateway server on {bind_addr}"))?;
    let local_addr = listener
        .local_addr()
        .context("failed to resolve bound push gateway server address")?;

    let state = Arc::new(PushGatewayServerState::new(config)?);
    let dispatcher = start_push_dispatcher(
        state.config.dispatcher,
        Arc::clone(&state.queue),
        state.dispatch_context(),
    )?;
    tracing::info!(
        addr = %local_addr,
        target = state.config.target.as_str(),
        queue_capacity = state.config.queue_capacity,
        "push gateway started"
    );

    let app = build_push_gateway_router(state);
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let server_task = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
    });

    Ok(PushGatewayServerHandle {
        local_addr,
        shutdown_tx: Some(shutdown_tx),
        server_task: Some(server_task),
        dispatcher,
    })
}

/// Runs the gateway until Ctrl-C, then shuts down gracefully.
pub async fn run_push_gateway_server(config: PushGatewayServerConfig) -> Result<()> {
    let handle = start_push_gateway_server(config).await?;
    println!(
        "push gateway listening: endpoint={} addr={}",
        SEND_ENDPOINT,
        handle.local_addr()
    );
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received; draining delivery queue");
    handle.shutdown().await
}

pub(super) fn build_push_gateway_router(state: Arc<PushGatewayServerState>) -> Router {
    Router::new()
        .route(SEND_ENDPOINT, post(handle_push_send))
        .route(HEALTH_ENDPOINT, get(handle_push_health))
        .route(STATUS_ENDPOINT, get(handle_push_gateway_status))
        .with_state(state)
}
