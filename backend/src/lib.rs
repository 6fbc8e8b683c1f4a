pub mod api;
pub mod config;
pub mod deletion;
pub mod error;
pub mod matches;
pub mod models;
pub mod schema;
pub mod storage;
pub mod upload;

pub mod diesel_sessionstore;
pub mod steam_api;

mod apikey;
pub use apikey::MasterKey;

mod usersession;
pub use usersession::{UserSession, UserSessionData};

use error::BackendError;

pub type DbPool = diesel_async::pooled_connection::deadpool::Pool<diesel_async::AsyncPgConnection>;
pub type DbConnection =
    diesel_async::pooled_connection::deadpool::Object<diesel_async::AsyncPgConnection>;

pub fn db_pool(database_url: &str) -> DbPool {
    let manager = diesel_async::pooled_connection::AsyncDieselConnectionManager::<
        diesel_async::AsyncPgConnection,
    >::new(database_url);

    diesel_async::pooled_connection::deadpool::Pool::builder(manager)
        .build()
        .expect("Building database pool")
}

pub struct SteamState {
    pub openid: steam_openid::SteamOpenId,
    pub api_key: String,
}

/// Everything the request handlers need, shared behind an [`std::sync::Arc`].
///
/// `storage` and `steam` are optional: without a configured demo backend the
/// upload and deletion endpoints reject, without a Steam api key the login
/// flow does.
pub struct Services {
    pub db: DbPool,
    pub storage: Option<Box<dyn storage::DemoStorage>>,
    pub deletions: deletion::DeletionQueue,
    pub steam: Option<SteamState>,
    pub config: config::ServerConfig,
}

impl Services {
    pub async fn db_connection(&self) -> Result<DbConnection, BackendError> {
        self.db
            .get()
            .await
            .map_err(|e| BackendError::Pool(e.to_string()))
    }
}
