//! LoL Smart Stats client library
//!
//! Authenticated API client and session guard for the stats dashboard.

pub mod api;
pub mod auth;
pub mod commands;
pub mod config;
pub mod dispatch;
pub mod envelope;
pub mod error;
pub mod guard;
pub mod logging;
pub mod notify;
pub mod pipeline;
pub mod storage;
pub mod transport;

use std::sync::Arc;

use api::ApiClient;
use auth::SessionStore;
use config::ClientConfig;
use dispatch::ErrorDispatcher;
use envelope::ResponseNormalizer;
use guard::NavigationGuard;
use notify::{NotificationCenter, RedirectRecorder};
use pipeline::RequestPipeline;
use storage::{FileStorage, KeyValueStore, StorageError};
use transport::{HttpTransport, Transport, TransportError};

pub use error::{ApiError, ErrorKind, NormalizedResult};
pub use reqwest::Method;

/// Application state shared across commands
pub struct AppState {
    pub config: ClientConfig,
    pub session: Arc<SessionStore>,
    pub api: ApiClient,
    pub guard: NavigationGuard,
    pub notifications: Arc<NotificationCenter>,
    pub redirects: Arc<RedirectRecorder>,
}

impl AppState {
    /// Wire the client against the real backend and on-disk storage
    pub fn from_config(config: ClientConfig) -> Result<Self, InitError> {
        let storage = match &config.data_dir {
            Some(dir) => FileStorage::at(dir)?,
            None => FileStorage::new()?,
        };
        let transport =
            HttpTransport::new(&config.base_url, &config.api_prefix, config.timeout)?;
        Ok(Self::assemble(config, Arc::new(storage), Arc::new(transport)))
    }

    /// Wire the client from explicit storage and transport
    pub fn assemble(
        config: ClientConfig,
        storage: Arc<dyn KeyValueStore>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let session = Arc::new(SessionStore::new(storage));
        let notifications = Arc::new(NotificationCenter::new());
        let redirects = Arc::new(RedirectRecorder::new());

        let dispatcher = Arc::new(ErrorDispatcher::new(
            session.clone(),
            notifications.clone(),
            redirects.clone(),
            config.login_path.clone(),
        ));
        let pipeline = RequestPipeline::new(
            transport,
            session.clone(),
            ResponseNormalizer::new(config.envelope.clone()),
            dispatcher,
        );
        let guard = NavigationGuard::new(session.clone(), &config.login_path);

        Self {
            api: ApiClient::new(pipeline, session.clone()),
            session,
            guard,
            notifications,
            redirects,
            config,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}
