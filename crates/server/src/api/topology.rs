/// 网络拓扑接口

use axum::{
    extract::{Query, State},
    response::IntoResponse,
    routing::get,
    Router,
};
use common::topology::{TopologyFilter, MAX_NEIGHBOR_DEPTH};
use serde::Deserialize;
use uuid::Uuid;

use crate::api::ApiResponse;
use crate::app_state::AppState;
use crate::error::{AppError, AppResult};
use crate::extractors::parse_uuid;
use crate::services::topology_service::TopologyService;

/// 拓扑查询参数，原样接收字符串后自行校验
#[derive(Debug, Default, Deserialize)]
pub struct TopologyQuery {
    pub location_id: Option<String>,
    pub device_id: Option<String>,
    pub network_id: Option<String>,
    pub depth: Option<String>,
}

impl TopologyQuery {
    /// 转换为过滤条件，空字符串视为未指定
    pub fn into_filter(self) -> Result<TopologyFilter, AppError> {
        let depth = match non_empty(self.depth) {
            None => TopologyFilter::default().depth,
            Some(raw) => raw
                .parse::<u8>()
                .ok()
                .filter(|d| (1..=MAX_NEIGHBOR_DEPTH).contains(d))
                .ok_or_else(|| {
                    AppError::BadRequest(format!("depth must be between 1 and {}", MAX_NEIGHBOR_DEPTH))
                })?,
        };

        Ok(TopologyFilter {
            location_id: optional_uuid(self.location_id, "location_id")?,
            device_id: optional_uuid(self.device_id, "device_id")?,
            network_id: optional_uuid(self.network_id, "network_id")?,
            depth,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn optional_uuid(value: Option<String>, field: &str) -> Result<Option<Uuid>, AppError> {
    non_empty(value).map(|raw| parse_uuid(&raw, field)).transpose()
}

/// 创建路由
pub fn routes() -> Router<AppState> {
    Router::new().route("/network", get(network_topology))
}

/// 获取网络拓扑
async fn network_topology(
    State(state): State<AppState>,
    Query(query): Query<TopologyQuery>,
) -> AppResult<impl IntoResponse> {
    let filter = query.into_filter()?;
    let service = TopologyService::new(state);
    let graph = service.network_topology(filter).await?;

    let message = if graph.nodes.is_empty() {
        "No topology data found".to_string()
    } else {
        format!(
            "Retrieved topology with {} devices and {} connections",
            graph.metadata.total_devices, graph.metadata.total_connections
        )
    };
    Ok(ApiResponse::ok(graph).with_message(message))
}
