use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::config::Config;
use crate::interactions::InteractionService;
use crate::posts::PostService;
use crate::profiles::ProfileService;
use crate::store::{DynEntityStore, SqliteEntityStore};

pub type DbPool = Pool<SqliteConnectionManager>;

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub config: Config,
    pub store: DynEntityStore,
    pub interactions: InteractionService,
    pub posts: PostService,
    pub profiles: ProfileService,
}

impl AppState {
    /// Wire the services over one shared store.
    pub fn new(db: DbPool, config: Config) -> Self {
        let store: DynEntityStore = Arc::new(SqliteEntityStore::new(db.clone()));
        Self {
            interactions: InteractionService::new(store.clone()),
            posts: PostService::new(
                store.clone(),
                config.storage.image_base_url.clone(),
                config.feed.clone(),
            ),
            profiles: ProfileService::new(store.clone())
                .with_bcrypt_cost(config.auth.bcrypt_cost),
            store,
            db,
            config,
        }
    }
}
