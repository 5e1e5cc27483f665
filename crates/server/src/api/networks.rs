/// 网络管理接口

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use common::models::constants::DEFAULT_TOP_UTILIZED_LIMIT;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::api::{ApiResponse, MessageResponse};
use crate::app_state::AppState;
use crate::db::models::network::{CreateNetworkDto, NetworkListQuery, UpdateNetworkDto};
use crate::error::AppResult;
use crate::extractors::{IdPath, ValidatedJson, ValidatedQuery};
use crate::services::allocation_service::{AllocationService, DhcpRangeValidation};
use crate::services::network_service::NetworkService;

/// 可用地址查询参数
#[derive(Debug, Deserialize, Validate)]
pub struct AvailableIpsQuery {
    #[validate(range(min = 1))]
    pub limit: Option<usize>,
}

/// 利用率排行查询参数
#[derive(Debug, Deserialize, Validate)]
pub struct TopUtilizedQuery {
    #[validate(range(min = 1))]
    pub limit: Option<usize>,
}

/// DHCP 地址池校验请求
#[derive(Debug, Deserialize, Validate)]
pub struct DhcpRangeRequest {
    #[validate(length(min = 7))]
    pub dhcp_range_start: String,
    #[validate(length(min = 7))]
    pub dhcp_range_end: String,
}

/// DHCP 校验结果直接平铺在顶层
#[derive(Debug, Serialize)]
struct DhcpRangeResponse {
    success: bool,
    #[serde(flatten)]
    result: DhcpRangeValidation,
}

/// 创建路由
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_networks).post(create_network))
        .route("/top-utilized", get(top_utilized))
        .route("/:id", get(get_network).patch(update_network).delete(delete_network))
        .route("/:id/available-ips", get(available_ips))
        .route("/:id/validate-dhcp-range", post(validate_dhcp_range))
        .route("/:id/ip-utilization", get(ip_utilization))
        .route("/:id/utilization-summary", get(utilization_summary))
}

// ==================== 网络接口 ====================

/// 创建网络
async fn create_network(
    State(state): State<AppState>,
    ValidatedJson(dto): ValidatedJson<CreateNetworkDto>,
) -> AppResult<impl IntoResponse> {
    let service = NetworkService::new(state);
    let network = service.create_network(dto).await?;
    Ok((StatusCode::CREATED, ApiResponse::ok(network)))
}

/// 获取网络列表
async fn list_networks(
    State(state): State<AppState>,
    ValidatedQuery(query): ValidatedQuery<NetworkListQuery>,
) -> AppResult<impl IntoResponse> {
    let service = NetworkService::new(state);
    let response = service.list_networks(query).await?;
    Ok(ApiResponse::ok(response))
}

/// 获取单个网络
async fn get_network(State(state): State<AppState>, IdPath(id): IdPath) -> AppResult<impl IntoResponse> {
    let service = NetworkService::new(state);
    let network = service.get_network(id).await?;
    Ok(ApiResponse::ok(network))
}

/// 更新网络
async fn update_network(
    State(state): State<AppState>,
    IdPath(id): IdPath,
    ValidatedJson(dto): ValidatedJson<UpdateNetworkDto>,
) -> AppResult<impl IntoResponse> {
    let service = NetworkService::new(state);
    let network = service.update_network(id, dto).await?;
    Ok(ApiResponse::ok(network))
}

/// 删除网络
async fn delete_network(State(state): State<AppState>, IdPath(id): IdPath) -> AppResult<impl IntoResponse> {
    let service = NetworkService::new(state);
    service.delete_network(id).await?;
    Ok(MessageResponse::ok("Network deleted successfully"))
}

// ==================== 地址分配接口 ====================

/// 利用率最高的网络
async fn top_utilized(
    State(state): State<AppState>,
    ValidatedQuery(query): ValidatedQuery<TopUtilizedQuery>,
) -> AppResult<impl IntoResponse> {
    let service = NetworkService::new(state);
    let networks = service
        .top_utilized(query.limit.unwrap_or(DEFAULT_TOP_UTILIZED_LIMIT))
        .await?;
    Ok(ApiResponse::ok(networks))
}

/// 网络中的可用地址
async fn available_ips(
    State(state): State<AppState>,
    IdPath(id): IdPath,
    ValidatedQuery(query): ValidatedQuery<AvailableIpsQuery>,
) -> AppResult<impl IntoResponse> {
    let service = AllocationService::new(state);
    let response = service.available_ips(id, query.limit).await?;
    Ok(ApiResponse::ok(response))
}

/// 校验 DHCP 地址池
async fn validate_dhcp_range(
    State(state): State<AppState>,
    IdPath(id): IdPath,
    ValidatedJson(request): ValidatedJson<DhcpRangeRequest>,
) -> AppResult<impl IntoResponse> {
    let service = AllocationService::new(state);
    let result = service
        .validate_dhcp_range(id, &request.dhcp_range_start, &request.dhcp_range_end)
        .await?;
    Ok(Json(DhcpRangeResponse { success: true, result }))
}

/// 逐地址利用率
async fn ip_utilization(State(state): State<AppState>, IdPath(id): IdPath) -> AppResult<impl IntoResponse> {
    let service = AllocationService::new(state);
    let response = service.ip_utilization(id).await?;
    Ok(ApiResponse::ok(response))
}

/// 利用率汇总
async fn utilization_summary(State(state): State<AppState>, IdPath(id): IdPath) -> AppResult<impl IntoResponse> {
    let service = AllocationService::new(state);
    let summary = service.utilization_summary(id).await?;
    Ok(ApiResponse::ok(summary))
}
