/// 应用全局状态

use common::ResponseCache;
use sea_orm::DatabaseConnection;
use std::sync::Arc;

use crate::config::Config;

/// 应用状态
#[cfg_attr(not(test), derive(Clone))]
pub struct AppState {
    /// SeaORM 数据库连接
    pub sea_db: DatabaseConnection,
    /// 列表接口的响应缓存
    pub cache: ResponseCache,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(sea_db: DatabaseConnection, config: Config) -> Self {
        let cache = ResponseCache::new(config.cache_capacity, config.cache_ttl());
        Self {
            sea_db,
            cache,
            config: Arc::new(config),
        }
    }

    /// 获取 SeaORM 数据库连接（克隆）
    pub fn sea_db(&self) -> DatabaseConnection {
        #[cfg(not(test))]
        {
            self.sea_db.clone()
        }
        #[cfg(test)]
        {
            clone_connection(&self.sea_db)
        }
    }

    /// 获取响应缓存
    pub fn cache(&self) -> ResponseCache {
        self.cache.clone()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

// sea-orm's `mock` feature (enabled for tests) removes `Clone` from
// `DatabaseConnection`; share the underlying handle the same way the derive does.
#[cfg(test)]
fn clone_connection(db: &DatabaseConnection) -> DatabaseConnection {
    match db {
        DatabaseConnection::SqlxPostgresPoolConnection(conn) => {
            DatabaseConnection::SqlxPostgresPoolConnection(conn.clone())
        }
        DatabaseConnection::MockDatabaseConnection(conn) => {
            DatabaseConnection::MockDatabaseConnection(Arc::clone(conn))
        }
        DatabaseConnection::Disconnected => DatabaseConnection::Disconnected,
    }
}

#[cfg(test)]
impl Clone for AppState {
    fn clone(&self) -> Self {
        Self {
            sea_db: clone_connection(&self.sea_db),
            cache: self.cache.clone(),
            config: self.config.clone(),
        }
    }
}
