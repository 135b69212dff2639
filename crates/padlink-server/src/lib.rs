//! Padlink production server.
//!
//! Session and room coordination for small real-time game lobbies, served
//! over WebSocket with axum and Tokio.
//!
//! # Architecture
//!
//! The [`ServerDriver`] follows the Sans-IO pattern: it consumes
//! [`ServerEvent`]s and emits [`ServerAction`]s without touching sockets,
//! which keeps routing logic deterministic and testable. [`Server`] is the
//! production runtime that executes those actions over real WebSocket
//! connections.
//!
//! # Components
//!
//! - [`ServerDriver`]: Action-based orchestrator (pure logic, no I/O)
//! - [`Server`]: Production runtime that executes ServerDriver actions
//! - [`ConnectionRegistry`]: Session-to-player and room mapping
//! - [`SystemEnv`]: Production environment (real time, crypto RNG)

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod driver;
mod error;
mod http;
mod registry;
mod system_env;
mod ws;

use std::{collections::HashMap, sync::Arc, time::Instant};

pub use driver::{DriverConfig, LogLevel, ServerAction, ServerDriver, ServerEvent};
pub use error::{DriverError, ServerError};
pub use registry::{ConnectionRegistry, SessionInfo};
pub use system_env::SystemEnv;
use tokio::sync::{Mutex, RwLock, mpsc};

/// Shared state for all connections.
///
/// Holds the driver behind a mutex plus the outbound channel map used for
/// message routing.
pub(crate) struct SharedState {
    /// The action-based session driver.
    driver: Mutex<ServerDriver<SystemEnv>>,
    /// Map of session ID to outbound message channel. All messages to a
    /// client go through its single writer task, ensuring ordering.
    senders: RwLock<HashMap<u64, mpsc::UnboundedSender<axum::extract::ws::Message>>>,
    /// Environment (time, RNG).
    env: SystemEnv,
    /// Origins accepted by the HTTP surface. `"*"` admits everything.
    allowed_origins: Vec<String>,
    /// Process start, for the health endpoint's uptime.
    started_at: Instant,
}

/// Server configuration for the production runtime.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Address to bind to (e.g., "0.0.0.0:3001").
    pub bind_address: String,
    /// Origins accepted for WebSocket upgrades and CORS. `"*"` admits all.
    pub allowed_origins: Vec<String>,
    /// Driver configuration (timeouts, limits).
    pub driver: DriverConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3001".to_string(),
            allowed_origins: vec!["*".to_string()],
            driver: DriverConfig::default(),
        }
    }
}

/// Production padlink server.
///
/// Wraps `ServerDriver` with an axum WebSocket transport and system
/// environment.
pub struct Server {
    listener: tokio::net::TcpListener,
    state: Arc<SharedState>,
    config: RuntimeConfig,
}

impl Server {
    /// Create and bind a new server.
    pub async fn bind(config: RuntimeConfig) -> Result<Self, ServerError> {
        let env = SystemEnv::new();
        let driver = ServerDriver::new(env.clone(), config.driver.clone());
        let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;

        let state = Arc::new(SharedState {
            driver: Mutex::new(driver),
            senders: RwLock::new(HashMap::new()),
            env,
            allowed_origins: config.allowed_origins.clone(),
            started_at: Instant::now(),
        });

        Ok(Self { listener, state, config })
    }

    /// Local address the server is bound to.
    pub fn local_addr(&self) -> Result<std::net::SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Run the server, accepting connections and processing frames.
    ///
    /// This method runs until the server is shut down or an error occurs.
    pub async fn run(self) -> Result<(), ServerError> {
        tracing::info!("server listening on {}", self.listener.local_addr()?);

        spawn_tick_loop(
            Arc::clone(&self.state),
            self.config.driver.reap_interval,
            ServerEvent::ReaperTick,
        );
        spawn_tick_loop(
            Arc::clone(&self.state),
            self.config.driver.keepalive_interval,
            ServerEvent::KeepaliveTick,
        );

        let router = http::router(Arc::clone(&self.state));
        axum::serve(self.listener, router).await?;
        Ok(())
    }
}

/// Feed the driver a periodic event forever.
fn spawn_tick_loop(state: Arc<SharedState>, interval: std::time::Duration, event: ServerEvent) {
    use padlink_core::Environment;

    tokio::spawn(async move {
        loop {
            state.env.sleep(interval).await;
            ws::dispatch(&state, event.clone()).await;
        }
    });
}
