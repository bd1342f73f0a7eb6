//! Application state wiring all services together.
//!
//! AppState holds the concrete service instances used by both CLI and REST API.
//! Services are generic over repository traits, but AppState pins them to the
//! SQLite implementations.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc;

use mymind_core::chat::ChatService;
use mymind_core::effects::{EffectQueue, SideEffect};
use mymind_core::ledger::EntitlementService;
use mymind_core::presence::InMemoryPresence;
use mymind_infra::config::load_global_config;
use mymind_infra::data_dir::resolve_data_dir;
use mymind_infra::sqlite::message::SqliteMessageStore;
use mymind_infra::sqlite::order::SqliteOrderRepository;
use mymind_infra::sqlite::pool::DatabasePool;
use mymind_infra::sqlite::token::SqliteTokenStore;
use mymind_infra::sqlite::user::SqliteUserDirectory;
use mymind_types::config::GlobalConfig;

pub type ConcreteLedger = EntitlementService<SqliteOrderRepository, SqliteUserDirectory>;

pub type ConcreteChatService =
    ChatService<SqliteOrderRepository, SqliteMessageStore, InMemoryPresence>;

/// Shared application state holding all services.
#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<ConcreteLedger>,
    pub chat: Arc<ConcreteChatService>,
    pub users: SqliteUserDirectory,
    pub tokens: SqliteTokenStore,
    pub config: Arc<GlobalConfig>,
    pub data_dir: PathBuf,
}

impl AppState {
    /// Initialize the application state: load config, connect to DB, wire services.
    ///
    /// Also returns the receiving end of the side-effect queue; `serve` hands
    /// it to the effect worker, one-shot CLI commands just drop it.
    pub async fn init() -> anyhow::Result<(Self, mpsc::Receiver<SideEffect>)> {
        let data_dir = resolve_data_dir();
        tokio::fs::create_dir_all(&data_dir).await?;

        let config = load_global_config(&data_dir).await;
        let db_url = format!(
            "sqlite://{}?mode=rwc",
            data_dir.join("mymind.db").display()
        );
        let db_pool = DatabasePool::new(&db_url).await?;

        Ok(Self::from_pool(db_pool, config, data_dir))
    }

    /// Wire services on top of an already-open pool.
    pub fn from_pool(
        db_pool: DatabasePool,
        config: GlobalConfig,
        data_dir: PathBuf,
    ) -> (Self, mpsc::Receiver<SideEffect>) {
        let (effects, effects_rx) = EffectQueue::new(config.effects.queue_capacity);

        let users = SqliteUserDirectory::new(db_pool.clone());
        let ledger = EntitlementService::new(
            SqliteOrderRepository::new(db_pool.clone()),
            users.clone(),
            config.plans.clone(),
            effects,
        );

        // Presence lives for as long as the server does; every socket shares it.
        let chat = ChatService::new(
            SqliteOrderRepository::new(db_pool.clone()),
            SqliteMessageStore::new(db_pool.clone()),
            Arc::new(InMemoryPresence::new()),
            config.chat.room_capacity,
        );

        let state = Self {
            ledger: Arc::new(ledger),
            chat: Arc::new(chat),
            users,
            tokens: SqliteTokenStore::new(db_pool),
            config: Arc::new(config),
            data_dir,
        };
        (state, effects_rx)
    }
}
