//! Session façade: which workqueue does this worker draw from?
//!
//! Resolved once at startup. With a session id, the session and its process
//! are fetched and the process's workqueue is used. `ATS_WORKQUEUE_OVERRIDE`
//! replaces that answer, whatever the session says.
//!
//! Workers normally start through [`AutomationServer::init_from_env`], which
//! also installs logging and, inside a session, the server's audit log:
//!
//! ```no_run
//! # async fn run() -> ats_client::Result<()> {
//! use ats_client::AutomationServer;
//!
//! let (ats, telemetry) = AutomationServer::init_from_env("invoice-worker").await?;
//! let mut items = ats.items()?;
//! while let Some(mut item) = items.next().await? {
//!     ats.client()
//!         .process(&mut item, async |item| {
//!             tracing::info!("booking {item}");
//!             Ok::<_, ats_client::Error>(())
//!         })
//!         .await?;
//! }
//! telemetry.flush_audit_log().await;
//! # Ok(())
//! # }
//! ```

use crate::client::Client;
use crate::client::workqueue::WorkItems;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::model::{Process, Session, Workqueue, WorkqueueId};
use crate::telemetry::{TelemetryConfig, TelemetryGuard, init_telemetry};
use tracing::info;

#[derive(Debug)]
pub struct AutomationServer {
    client: Client,
    session: Option<Session>,
    process: Option<Process>,
    workqueue_id: Option<WorkqueueId>,
}

impl AutomationServer {
    /// Load `.env` and the environment, then [`AutomationServer::init`].
    ///
    /// Fails with [`Error::Config`] before any request when `ATS_URL` is missing.
    pub async fn init_from_env(service_name: &str) -> Result<(Self, TelemetryGuard)> {
        dotenvy::dotenv().ok();
        let config = Config::from_env()?;
        Self::init(&config, service_name).await
    }

    /// Install the global tracing subscriber, then resolve the session.
    ///
    /// When `config` names a session, every event from here on is also shipped
    /// to the server's audit log, tagged with the session and the work item
    /// being processed. Fails if a global subscriber is already installed.
    pub async fn init(config: &Config, service_name: &str) -> Result<(Self, TelemetryGuard)> {
        let client = Client::new(config)?;
        let telemetry = init_telemetry(TelemetryConfig::for_worker(config, &client, service_name))?;
        let server = Self::resolve(client, config.session, config.workqueue_override).await?;
        Ok((server, telemetry))
    }

    /// Load `.env` and the environment, then [`AutomationServer::connect`].
    /// Leaves logging to the caller.
    ///
    /// Fails with [`Error::Config`] before any request when `ATS_URL` is missing.
    pub async fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        let config = Config::from_env()?;
        Self::connect(&config).await
    }

    /// Build a client from `config` and resolve the session's workqueue.
    pub async fn connect(config: &Config) -> Result<Self> {
        let client = Client::new(config)?;
        Self::resolve(client, config.session, config.workqueue_override).await
    }

    /// Resolve against an existing client.
    pub async fn resolve(
        client: Client,
        session_id: Option<i64>,
        workqueue_override: Option<WorkqueueId>,
    ) -> Result<Self> {
        let (session, process) = match session_id {
            Some(id) => {
                let session = client.get_session(id).await?;
                let process = client.get_process(session.process_id).await?;
                (Some(session), Some(process))
            }
            None => (None, None),
        };

        let workqueue_id =
            workqueue_override.or_else(|| process.as_ref().and_then(|p| p.workqueue_id));

        info!(
            session_id,
            process_id = process.as_ref().map(|p| p.id),
            workqueue_id = workqueue_id.map(|id| id.0),
            overridden = workqueue_override.is_some(),
            "automation server resolved"
        );

        Ok(Self {
            client,
            session,
            process,
            workqueue_id,
        })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn process(&self) -> Option<&Process> {
        self.process.as_ref()
    }

    pub fn workqueue_id(&self) -> Option<WorkqueueId> {
        self.workqueue_id
    }

    /// Fetch the bound workqueue.
    pub async fn workqueue(&self) -> Result<Workqueue> {
        let id = self.workqueue_id.ok_or(Error::NoWorkqueue)?;
        self.client.get_workqueue(id).await
    }

    /// Cursor over the bound workqueue's items.
    pub fn items(&self) -> Result<WorkItems<'_>> {
        let id = self.workqueue_id.ok_or(Error::NoWorkqueue)?;
        Ok(self.client.items(id))
    }
}

impl std::fmt::Display for AutomationServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "AutomationServer(url={}, session={}, process={}, workqueue_id={})",
            self.client.base_url(),
            self.session.as_ref().map_or("-".to_string(), |s| s.id.to_string()),
            self.process.as_ref().map_or("-".to_string(), |p| p.name.clone()),
            self.workqueue_id.map_or("-".to_string(), |id| id.to_string()),
        )
    }
}
