//! Autoshop Rust Client Library
//!
//! Auto-shop management on top of Google Sheets and Google Drive: vehicle
//! reception, task tracking with history, billing, staff messaging, SMS
//! notifications and a customer portal. Every table is a sheet; every store
//! keeps an in-memory list, falls back to an offline snapshot when the
//! spreadsheet cannot be reached and can queue writes for later replay.

pub mod cache;
pub mod config;
pub mod error;
pub mod files;
pub mod models;
pub mod portal;
pub mod sms;
pub mod store;

use std::collections::HashSet;
use std::sync::Arc;

use log::{info, warn};
use reqwest::Client;

use autoshop_rust_auth::{
    AuthorizedClient, RefreshTokenSource, ServiceAccountSource, StaticToken, TokenSource,
    DRIVE_SCOPE, SHEETS_SCOPE,
};
use autoshop_rust_drive::DriveClient;
use autoshop_rust_sheets::SheetsClient;

use crate::cache::{DrainReport, FileStorage, LocalStorage, OfflineCache};
use crate::config::{Credentials, ShopConfig};
use crate::error::{Error, Result};
use crate::files::{DriveFiles, FileStore};
use crate::models::{
    Billing, Customer, Message, Reception, Record, SmsLog, SmsTemplate, Status, Task, User,
};
use crate::portal::Portal;
use crate::sms::SmsService;
use crate::store::{
    CustomerStore, EntityStore, LoadSource, MessageStore, Outcome, ReceptionStore, SheetsTable,
    TabularStore, TaskStore, UserStore,
};

/// Per-table result of [`Shopfront::load_all`]
#[derive(Debug, Clone, Default)]
pub struct LoadSummary {
    pub loaded: Vec<(&'static str, LoadSource)>,
    pub failed: Vec<(&'static str, String)>,
}

impl LoadSummary {
    fn record(&mut self, table: &'static str, result: Result<LoadSource>) {
        match result {
            Ok(source) => self.loaded.push((table, source)),
            Err(e) => self.failed.push((table, e.to_string())),
        }
    }

    /// True when some table came from the offline cache
    pub fn is_stale(&self) -> bool {
        self.loaded.iter().any(|(_, s)| *s == LoadSource::Cache)
    }
}

/// What happened to one task when its reception was completed
#[derive(Debug, Clone)]
pub struct TaskCascade {
    pub task_id: String,
    pub result: std::result::Result<Outcome<Task>, String>,
}

/// Result of [`Shopfront::complete_reception`] and
/// [`Shopfront::complete_reception_tasks`]
#[derive(Debug, Clone)]
pub struct CascadeReport {
    pub reception: Outcome<Reception>,
    pub tasks: Vec<TaskCascade>,
}

impl CascadeReport {
    pub fn completed_tasks(&self) -> usize {
        self.tasks
            .iter()
            .filter(|t| matches!(t.result, Ok(Outcome::Done(_)) | Ok(Outcome::Queued(_))))
            .count()
    }

    pub fn failed_tasks(&self) -> usize {
        self.tasks.iter().filter(|t| t.result.is_err()).count()
    }
}

/// The application context: every store over one spreadsheet.
///
/// Built once and passed by reference. Stores are cheap handles; cloning one
/// shares its state.
///
/// # Example
///
/// ```no_run
/// use autoshop_rust::prelude::*;
///
/// # async fn run() -> Result<()> {
/// let config = ShopConfig::new("spreadsheet-id", Credentials::AccessToken("token".into()));
/// let shop = Shopfront::connect(config)?;
/// shop.initialize().await?;
/// shop.load_all().await;
///
/// for task in shop.tasks.items().await {
///     println!("{} [{}]", task.title, task.status);
/// }
/// # Ok(())
/// # }
/// ```
pub struct Shopfront {
    config: ShopConfig,
    remote: Arc<dyn TabularStore>,
    cache: OfflineCache,
    pub users: UserStore,
    pub customers: CustomerStore,
    pub receptions: ReceptionStore,
    pub tasks: TaskStore,
    pub messages: MessageStore,
    pub sms: SmsService,
}

impl Shopfront {
    /// Connect to Google with the configured credentials
    pub fn connect(config: ShopConfig) -> Result<Self> {
        config.validate()?;

        let mut builder = Client::builder();
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let http_client = builder
            .build()
            .map_err(|e| Error::config(format!("HTTP client: {}", e)))?;

        let tokens = token_source(&config, &http_client)?;
        let authorized = AuthorizedClient::new(http_client.clone(), tokens);

        let sheets = match &config.sheets_base_url {
            Some(base) => SheetsClient::with_base_url(base, &config.spreadsheet_id, authorized.clone()),
            None => SheetsClient::new(&config.spreadsheet_id, authorized.clone()),
        };
        let drive = match &config.drive_base_url {
            Some(base) => DriveClient::with_base_url(base, authorized),
            None => DriveClient::new(authorized),
        };

        let remote = Arc::new(SheetsTable::new(sheets));
        let files = Arc::new(DriveFiles::new(drive, config.drive_folder.as_deref()));
        let storage = Arc::new(FileStorage::new(config.cache_dir.clone()));

        info!("Connected to spreadsheet {}", config.spreadsheet_id);
        Ok(Self::assemble(config, http_client, remote, files, storage))
    }

    /// Build on explicit backends, e.g. in-memory tables for tests
    pub fn with_backends(
        config: ShopConfig,
        remote: Arc<dyn TabularStore>,
        files: Arc<dyn FileStore>,
        storage: Arc<dyn LocalStorage>,
    ) -> Self {
        Self::assemble(config, Client::new(), remote, files, storage)
    }

    fn assemble(
        config: ShopConfig,
        http_client: Client,
        remote: Arc<dyn TabularStore>,
        files: Arc<dyn FileStore>,
        storage: Arc<dyn LocalStorage>,
    ) -> Self {
        let cache = OfflineCache::new(storage);
        let offline_writes = config.offline_writes;

        macro_rules! store {
            ($ty:ty) => {
                EntityStore::<$ty>::new(remote.clone(), cache.clone())
                    .with_offline_writes(offline_writes)
            };
        }

        let mut sms = SmsService::new(
            cache.clone(),
            store!(SmsTemplate),
            store!(SmsLog),
            http_client,
        );
        if let Some(url) = &config.sms_base_url {
            sms = sms.with_default_base_url(url);
        }

        Self {
            users: UserStore::new(store!(User)),
            customers: CustomerStore::new(store!(Customer)),
            receptions: ReceptionStore::new(store!(Reception)),
            tasks: TaskStore::new(store!(Task), files),
            messages: MessageStore::new(store!(Message)),
            sms,
            remote,
            cache,
            config,
        }
    }

    pub fn config(&self) -> &ShopConfig {
        &self.config
    }

    pub fn cache(&self) -> &OfflineCache {
        &self.cache
    }

    pub fn remote(&self) -> Arc<dyn TabularStore> {
        self.remote.clone()
    }

    /// Create missing tables with their headers. Returns the created ones.
    pub async fn initialize(&self) -> Result<Vec<&'static str>> {
        let schema: [(&'static str, &'static [&'static str]); 7] = [
            (User::TABLE, User::COLUMNS),
            (Customer::TABLE, Customer::COLUMNS),
            (Reception::TABLE, Reception::COLUMNS),
            (Task::TABLE, Task::COLUMNS),
            (Message::TABLE, Message::COLUMNS),
            (SmsTemplate::TABLE, SmsTemplate::COLUMNS),
            (SmsLog::TABLE, SmsLog::COLUMNS),
        ];

        let mut created = Vec::new();
        for (table, columns) in schema {
            if self.remote.ensure_table(table, columns).await? {
                created.push(table);
            }
        }
        Ok(created)
    }

    /// Restore every store from its persisted state. Returns the item count.
    pub async fn restore(&self) -> Result<usize> {
        Ok(self.users.restore().await?
            + self.customers.restore().await?
            + self.receptions.restore().await?
            + self.tasks.restore().await?
            + self.messages.restore().await?
            + self.sms.templates().restore().await?)
    }

    /// Load every table; one failing table does not stop the others
    pub async fn load_all(&self) -> LoadSummary {
        let mut summary = LoadSummary::default();
        summary.record(User::TABLE, self.users.load().await);
        summary.record(Customer::TABLE, self.customers.load().await);
        summary.record(Reception::TABLE, self.receptions.load().await);
        summary.record(Task::TABLE, self.tasks.load().await);
        summary.record(Message::TABLE, self.messages.load().await);
        summary.record(SmsTemplate::TABLE, self.sms.templates().load().await);
        if !summary.failed.is_empty() {
            warn!("{} table(s) failed to load", summary.failed.len());
        }
        summary
    }

    /// Whether the spreadsheet answers within the ping timeout
    pub async fn ping(&self) -> bool {
        match tokio::time::timeout(self.config.ping_timeout, self.remote.header(User::TABLE)).await {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                warn!("Ping failed: {}", e);
                false
            }
            Err(_) => {
                warn!("Ping timed out after {:?}", self.config.ping_timeout);
                false
            }
        }
    }

    /// Back online: replay queued writes, then reload every table
    pub async fn sync_pending(&self) -> Result<DrainReport> {
        let report = self.cache.drain(self.remote.as_ref()).await?;
        if report.replayed > 0 || report.skipped_missing > 0 {
            self.load_all().await;
        }
        Ok(report)
    }

    /// Complete a reception with its invoice, then complete every open task
    /// on its vehicle. Task failures are reported, not fatal.
    pub async fn complete_reception(
        &self,
        reception_id: &str,
        billing: Billing,
        completed_by: &str,
    ) -> Result<CascadeReport> {
        let outcome = self
            .receptions
            .complete_reception(reception_id, billing, completed_by)
            .await?;

        let Some(reception) = outcome.clone().value() else {
            return Ok(CascadeReport {
                reception: Outcome::NotFound,
                tasks: Vec::new(),
            });
        };

        let tasks = self.complete_open_tasks(&reception, completed_by).await;
        let report = CascadeReport {
            reception: outcome,
            tasks,
        };
        info!(
            "Completed reception {}: {} task(s) completed, {} failed",
            reception_id,
            report.completed_tasks(),
            report.failed_tasks()
        );
        Ok(report)
    }

    /// Re-run the task cascade of an already completed reception, e.g. after
    /// some task writes failed or tasks were added to its vehicle later.
    pub async fn complete_reception_tasks(
        &self,
        reception_id: &str,
        actor: &str,
    ) -> Result<CascadeReport> {
        self.receptions.ensure_loaded().await?;
        let Some(reception) = self.receptions.get(reception_id).await else {
            return Ok(CascadeReport {
                reception: Outcome::NotFound,
                tasks: Vec::new(),
            });
        };
        if reception.status != Status::Completed {
            return Err(Error::InvalidTransition {
                from: reception.status,
                to: Status::Completed,
            });
        }

        let tasks = self.complete_open_tasks(&reception, actor).await;
        Ok(CascadeReport {
            reception: Outcome::Done(reception),
            tasks,
        })
    }

    /// Complete every open task on the reception's vehicle or the reception
    /// itself. Task failures are reported, not fatal.
    async fn complete_open_tasks(&self, reception: &Reception, actor: &str) -> Vec<TaskCascade> {
        if let Err(e) = self.tasks.load().await {
            warn!("Could not refresh tasks before cascade: {}", e);
        }

        let mut seen = HashSet::new();
        let open: Vec<Task> = self
            .tasks
            .tasks_for_vehicle(&reception.vehicle_info.id)
            .await
            .into_iter()
            .chain(self.tasks.tasks_for_reception(&reception.id).await)
            .filter(|t| t.status != Status::Completed && seen.insert(t.id.clone()))
            .collect();

        let mut tasks = Vec::with_capacity(open.len());
        for task in open {
            let result = self
                .tasks
                .set_status(&task.id, Status::Completed, actor, Some("Reception completed"))
                .await
                .map_err(|e| e.to_string());
            tasks.push(TaskCascade {
                task_id: task.id,
                result,
            });
        }
        tasks
    }

    /// Login and customer portal over this shop's stores
    pub fn portal(&self) -> Portal {
        Portal::new(
            self.users.clone(),
            self.customers.clone(),
            self.receptions.clone(),
        )
    }
}

fn token_source(config: &ShopConfig, http_client: &Client) -> Result<Arc<dyn TokenSource>> {
    let source: Arc<dyn TokenSource> = match &config.credentials {
        Credentials::AccessToken(token) => Arc::new(StaticToken::new(token.clone())),
        Credentials::RefreshToken {
            client_id,
            client_secret,
            refresh_token,
        } => {
            let source =
                RefreshTokenSource::new(client_id, client_secret, refresh_token, http_client.clone());
            match &config.token_url {
                Some(url) => Arc::new(source.with_token_url(url)),
                None => Arc::new(source),
            }
        }
        Credentials::ServiceAccount(key_json) => {
            let source = ServiceAccountSource::from_json(
                key_json,
                &[SHEETS_SCOPE, DRIVE_SCOPE],
                http_client.clone(),
            )?;
            match &config.token_url {
                Some(url) => Arc::new(source.with_token_url(url)),
                None => Arc::new(source),
            }
        }
    };
    Ok(source)
}

/// A convenience module for common imports
pub mod prelude {
    pub use crate::cache::{FileStorage, LocalStorage, MemoryStorage, OfflineCache};
    pub use crate::config::{Credentials, ShopConfig};
    pub use crate::error::{Error, Result};
    pub use crate::files::{FileStore, MemoryFiles, Upload};
    pub use crate::models::*;
    pub use crate::portal::{CustomerSession, Portal, StaffSession};
    pub use crate::sms::{Recipient, SmsService};
    pub use crate::store::{LoadSource, MemoryTables, Outcome, TabularStore};
    pub use crate::{CascadeReport, Shopfront};
}
