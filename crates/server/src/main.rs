/// M.O.S.S. - Server
///
/// 网络拓扑与子网/IP 地址管理后端，提供 REST API 服务

mod api;
mod app_state;
mod config;
mod db;
mod error;
mod extractors;
mod services;

use axum::{extract::State, routing::get, Json, Router};
use serde_json::{json, Value};
use std::net::SocketAddr;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

use crate::{app_state::AppState, db::establish_connection};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 加载环境变量
    dotenvy::dotenv().ok();

    // 加载配置
    let cfg = config::Config::from_env()?;

    // 初始化日志，RUST_LOG 优先于配置中的级别
    tracing_subscriber::fmt()
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cfg.log_level)),
        )
        .init();

    info!("🚀 启动 M.O.S.S. Server...");
    info!("✅ 配置加载成功");

    // 建立数据库连接 (SeaORM)
    let sea_db = establish_connection(&cfg).await?;

    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.server_port));
    let cleanup_interval = cfg.cache_cleanup_interval();

    // 创建应用状态
    let app_state = AppState::new(sea_db, cfg);

    // 定期清理过期的响应缓存
    app_state.cache().start_cleanup_task(cleanup_interval);
    info!("✅ 缓存清理任务已启动（每 {} 秒）", cleanup_interval.as_secs());

    // 设置CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // 构建应用路由
    let app = Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .nest("/api", api::api_routes())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(app_state);

    // 启动服务器
    info!("🎯 服务器监听在 http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn root_handler() -> &'static str {
    "M.O.S.S. Server API v1"
}

async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    let cache = state.cache().stats().await;
    Json(json!({
        "success": true,
        "status": "ok",
        "cache": cache,
    }))
}
