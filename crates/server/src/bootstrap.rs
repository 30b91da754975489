//! Process startup: configuration through to a serving listener.
//!
//! Startup is a chain of states, each produced only by the previous one:
//!
//! 1. [`Bootstrap`]: configuration loaded.
//! 2. [`Prepared`]: credentials resolved, store session verified, façade
//!    checked, route groups mounted and the pipeline composed.
//! 3. [`Listening`]: port bound.
//!
//! Any failure along the way is a [`FatalError`]; there is no partial start.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::config::ProcessConfig;
use crate::data::{DataAccess, SurfaceError};
use crate::server::{router, routes, state::AppState};
use crate::store::{credentials, Connector, CredentialError, StoreError};

/// Errors that abort startup or serving.
#[derive(Debug, Error)]
pub enum FatalError {
    #[error("store credentials unavailable: {0}")]
    Credentials(#[from] CredentialError),

    #[error("document store unavailable: {0}")]
    Store(#[from] StoreError),

    #[error(transparent)]
    IncompleteFacade(#[from] SurfaceError),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("server error: {0}")]
    Serve(#[source] io::Error),
}

/// Configuration loaded; nothing else initialised.
pub struct Bootstrap<C> {
    config: Arc<ProcessConfig>,
    connector: C,
}

impl<C: Connector> Bootstrap<C> {
    pub fn new(config: Arc<ProcessConfig>, connector: C) -> Self {
        Self { config, connector }
    }

    /// Resolve credentials, open the store session, check the façade and
    /// compose the router.
    ///
    /// # Errors
    ///
    /// Returns the first failing step as a [`FatalError`]. Route groups are
    /// never constructed when the façade check fails.
    pub async fn prepare(self) -> Result<Prepared, FatalError> {
        let cfg = self.config;

        let (creds, source) = credentials::resolve(&cfg).await.map_err(|e| {
            error!(error = %e, "failed to resolve store credentials");
            e
        })?;
        info!(source = %source, "store credentials resolved");

        let store = self.connector.connect(creds, &cfg).await.map_err(|e| {
            error!(error = %e, "failed to open document store session");
            e
        })?;

        let db = DataAccess::new(store);
        if let Err(e) = db.verify() {
            error!(exposed = ?e.exposed, missing = ?e.missing, "data access façade is incomplete");
            return Err(e.into());
        }
        info!(surface = ?db.surface(), "data access façade verified");

        let groups = routes::collaborators(&db);
        let router = router::build(AppState::new(cfg.clone()), groups);

        Ok(Prepared {
            config: cfg,
            router,
        })
    }
}

/// Pipeline composed; port not yet bound.
pub struct Prepared {
    config: Arc<ProcessConfig>,
    router: Router,
}

impl Prepared {
    /// Bind the configured port.
    ///
    /// # Errors
    ///
    /// Returns [`FatalError::Bind`] if the port cannot be bound.
    pub async fn bind(self) -> Result<Listening, FatalError> {
        let addr = self.config.socket_addr();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| FatalError::Bind { addr, source })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| FatalError::Bind { addr, source })?;

        info!(
            port = local_addr.port(),
            mode = %self.config.environment,
            "listening"
        );

        Ok(Listening {
            listener,
            local_addr,
            router: self.router,
        })
    }
}

/// Bound and ready to serve.
pub struct Listening {
    listener: TcpListener,
    local_addr: SocketAddr,
    router: Router,
}

impl Listening {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Serve connections until `shutdown` resolves, then drain gracefully.
    ///
    /// # Errors
    ///
    /// Returns [`FatalError::Serve`] if the accept loop fails.
    pub async fn serve<F>(self, shutdown: F) -> Result<(), FatalError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(FatalError::Serve)?;
        info!("server stopped");
        Ok(())
    }
}

/// Resolves on SIGINT or, on Unix, SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install ctrl-c handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("shutdown signal received");
}
