/// 数据库访问层
///
/// 表结构由 M.O.S.S. 主库维护，这里只映射实体，不做迁移

pub mod models;

use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use tracing::info;

use crate::config::Config;

/// 按配置建立连接池 (SeaORM)
pub async fn establish_connection(cfg: &Config) -> Result<DatabaseConnection, anyhow::Error> {
    info!(
        "正在连接数据库（最大连接数 {}，超时 {} 秒）",
        cfg.db_max_connections, cfg.db_connect_timeout_secs
    );

    let mut options = ConnectOptions::new(cfg.database_url.clone());
    options
        .max_connections(cfg.db_max_connections)
        .connect_timeout(cfg.db_connect_timeout())
        .sqlx_logging(false);

    let db = Database::connect(options).await?;
    info!("数据库连接成功");

    Ok(db)
}
