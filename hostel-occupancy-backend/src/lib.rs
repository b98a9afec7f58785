pub mod error;
pub mod identity;
pub mod routes;

use core::convert::Infallible;
use core::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use error::{AppError, BoxError};
use hostel_occupancy_config::Config;
use hostel_occupancy_database::{
    get_database_connection, run_migrations, seed_rooms, DatabaseNotifier, PostgresStore,
};
use hostel_occupancy_ledger::memory::InMemoryStore;
use hostel_occupancy_ledger::notify::{Notification, Notifier, NotifyError};
use hostel_occupancy_ledger::Ledger;
use http::{Method, Request, Response};
use http_body_util::Full;
use hyper::body::Incoming;
use hyper_util::rt::{TokioExecutor, TokioIo};
use identity::identity_from_headers;
use routes::{profile, requests, rooms};
use tokio::net::TcpListener;
use tokio::select;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "info";

/// Paths that exist for some method, so a mismatch is a 405 and not a 404.
const KNOWN_PATHS: &[&str] = &[
    "/rooms/vacant",
    "/rector/rooms",
    "/rector/rooms/allocate",
    "/rector/rooms/price",
    "/rector/rooms/capacity",
    "/rector/students/fee",
    "/rector/room-requests",
    "/rector/room-requests/decide",
    "/student/room-requests",
];

/// `RUST_LOG` wins over the configured filter.
pub fn setup_tracing(config: &Config) -> Result<(), AppError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| {
            EnvFilter::try_new(config.log_filter.as_deref().unwrap_or(DEFAULT_LOG_FILTER))
        })
        .map_err(|error| AppError::Tracing(error.into()))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(AppError::Tracing)
}

/// Used without a database, notifications only end up in the log.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, notification: Notification) -> Result<(), NotifyError> {
        info!(
            user = %notification.user,
            kind = notification.kind.as_str(),
            title = %notification.title,
            "{}",
            notification.message
        );
        Ok(())
    }
}

pub async fn build_ledger(config: &Config) -> Result<Ledger, AppError> {
    if config.uses_memory_store() {
        info!("using the in-memory store, nothing will be persisted");
        let store = InMemoryStore::with_open_registration();
        store.seed_rooms().await;
        return Ok(Ledger::new(
            Arc::new(store),
            Arc::new(LogNotifier),
            config.default_hostel_name.clone(),
        ));
    }

    let pool = get_database_connection(&config.database_url)?;
    run_migrations(&pool).await?;
    if config.seed_rooms {
        seed_rooms(&pool).await?;
    }
    Ok(Ledger::new(
        Arc::new(PostgresStore::new(pool.clone())),
        Arc::new(DatabaseNotifier::new(pool)),
        config.default_hostel_name.clone(),
    ))
}

pub async fn handle(
    ledger: &Ledger,
    request: Request<impl http_body::Body<Data = Bytes, Error = impl Into<BoxError>>>,
) -> Response<Full<Bytes>> {
    let method = request.method().clone();
    let path = request.uri().path().to_owned();
    match route(ledger, request).await {
        Ok(response) => {
            debug!(%method, %path, status = %response.status(), "handled request");
            response
        }
        Err(app_error) => {
            if app_error.status().is_server_error() {
                error!(%method, %path, "{app_error}");
            } else {
                debug!(%method, %path, "{app_error}");
            }
            app_error.into_response()
        }
    }
}

async fn route(
    ledger: &Ledger,
    request: Request<impl http_body::Body<Data = Bytes, Error = impl Into<BoxError>>>,
) -> Result<Response<Full<Bytes>>, AppError> {
    let method = request.method().clone();
    let path = request.uri().path().to_owned();
    let caller = identity_from_headers(request.headers());

    match (method, path.as_str()) {
        (Method::GET, "/rooms/vacant") => rooms::vacant(ledger, caller?).await,
        (Method::GET, "/rector/rooms") => rooms::list(ledger, caller?).await,
        (Method::POST, "/rector/rooms/allocate") => {
            rooms::allocate(request, ledger, caller?).await
        }
        (Method::POST, "/rector/rooms/price") => rooms::price(request, ledger, caller?).await,
        (Method::POST, "/rector/rooms/capacity") => {
            rooms::capacity(request, ledger, caller?).await
        }
        (Method::POST, "/rector/students/fee") => rooms::fee(request, ledger, caller?).await,
        (Method::GET, "/rector/room-requests") => requests::overview(ledger, caller?).await,
        (Method::POST, "/rector/room-requests/decide") => {
            requests::decide(request, ledger, caller?).await
        }
        (Method::GET, "/student/room-requests") => requests::mine(ledger, caller?).await,
        (Method::POST, "/student/room-requests") => {
            requests::submit(request, ledger, caller?).await
        }
        (Method::GET, path) if path.starts_with("/profile/") => {
            let student = path.strip_prefix("/profile/").unwrap_or_default();
            profile::show(ledger, caller?, student).await
        }
        (_, path) if KNOWN_PATHS.contains(&path) || path.starts_with("/profile/") => {
            Err(AppError::MethodNotAllowed)
        }
        _ => Err(AppError::NotFound),
    }
}

pub async fn run_server(
    config: Config,
) -> Result<impl Future<Output = Result<(), AppError>>, AppError> {
    info!("starting up server...");

    let ledger = build_ledger(&config).await?;
    let listener = TcpListener::bind(config.listen_address).await?;

    // tell the connections to shutdown
    let (shutdown_tx, shutdown_rx) = watch::channel(());
    let shutdown_tx = Arc::new(shutdown_tx);

    // wait for the connections to finish shutdown
    let (closed_tx, closed_rx) = watch::channel(());

    info!(address = %config.listen_address, "started up server...");

    Ok(async move {
        let shutdown = shutdown_signal();
        tokio::pin!(shutdown);

        #[allow(clippy::redundant_pub_crate)]
        loop {
            select! {
                accept = listener.accept() => {
                    let (socket, remote_addr) = match accept {
                        Ok(accepted) => accepted,
                        Err(accept_error) => {
                            warn!("failed to accept connection: {accept_error}");
                            continue;
                        }
                    };

                    let ledger = ledger.clone();
                    let shutdown_tx = Arc::clone(&shutdown_tx);
                    let closed_rx = closed_rx.clone();

                    let fut = async move {
                        let socket = TokioIo::new(socket);

                        let hyper_service = hyper::service::service_fn(move |request: Request<Incoming>| {
                            let ledger = ledger.clone();
                            async move { Ok::<_, Infallible>(handle(&ledger, request).await) }
                        });

                        let builder = hyper_util::server::conn::auto::Builder::new(TokioExecutor::new());
                        let connection = builder.serve_connection(socket, hyper_service);
                        tokio::pin!(connection);

                        let mut draining = false;
                        loop {
                            select! {
                                connection_result = connection.as_mut() => {
                                    if let Err(err) = connection_result {
                                        error!(%remote_addr, "failed to serve connection: {err:#}");
                                    }
                                    break;
                                }
                                () = shutdown_tx.closed(), if !draining => {
                                    connection.as_mut().graceful_shutdown();
                                    draining = true;
                                }
                            }
                        }

                        drop(closed_rx);
                    };
                    tokio::spawn(fut);
                }
                signal = &mut shutdown => {
                    if let Err(signal_error) = signal {
                        error!("failed to listen for shutdown signals: {signal_error}");
                    }
                    warn!("shutting down");
                    drop(listener);
                    drop(shutdown_rx); // initiate shutdown
                    drop(closed_rx);
                    closed_tx.closed().await;
                    break;
                }
            }
        }

        Ok(())
    })
}

async fn shutdown_signal() -> std::io::Result<()> {
    let mut terminate =
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;

    tokio::select! {
        result = tokio::signal::ctrl_c() => result,
        _ = terminate.recv() => Ok(()),
    }
}
