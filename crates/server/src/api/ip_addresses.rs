/// IP 地址管理接口

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use common::ipam::ConflictKind;
use serde::Deserialize;
use uuid::Uuid;

use crate::api::{ApiResponse, MessageResponse};
use crate::app_state::AppState;
use crate::db::models::ip_address::{BulkIpOperation, CreateIpAddressDto, IpAddressListQuery, UpdateIpAddressDto};
use crate::error::{AppError, AppResult};
use crate::extractors::{parse_uuid, IdPath, ValidatedJson, ValidatedQuery};
use crate::services::ip_address_service::IpAddressService;

/// 冲突检测参数，空字符串视为未指定
#[derive(Debug, Default, Deserialize)]
pub struct ConflictQuery {
    #[serde(rename = "type")]
    pub conflict_type: Option<String>,
    pub network_id: Option<String>,
}

impl ConflictQuery {
    fn parse(self) -> Result<(Option<ConflictKind>, Option<Uuid>), AppError> {
        let kind = self
            .conflict_type
            .filter(|v| !v.trim().is_empty())
            .map(|raw| raw.trim().parse::<ConflictKind>().map_err(AppError::BadRequest))
            .transpose()?;
        let network_id = self
            .network_id
            .filter(|v| !v.trim().is_empty())
            .map(|raw| parse_uuid(raw.trim(), "network_id"))
            .transpose()?;
        Ok((kind, network_id))
    }
}

/// 创建路由
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_ip_addresses).post(create_ip_address))
        .route("/bulk", post(bulk_operation))
        .route("/conflicts", get(detect_conflicts))
        .route(
            "/:id",
            get(get_ip_address).patch(update_ip_address).delete(delete_ip_address),
        )
        .route("/:id/convert-to-static", post(convert_to_static))
}

/// 创建 IP 地址
async fn create_ip_address(
    State(state): State<AppState>,
    ValidatedJson(dto): ValidatedJson<CreateIpAddressDto>,
) -> AppResult<impl IntoResponse> {
    let service = IpAddressService::new(state);
    let ip = service.create_ip_address(dto).await?;
    Ok((StatusCode::CREATED, ApiResponse::ok(ip)))
}

/// 获取 IP 地址列表
async fn list_ip_addresses(
    State(state): State<AppState>,
    ValidatedQuery(query): ValidatedQuery<IpAddressListQuery>,
) -> AppResult<impl IntoResponse> {
    let service = IpAddressService::new(state);
    let response = service.list_ip_addresses(query).await?;
    Ok(ApiResponse::ok(response))
}

async fn get_ip_address(State(state): State<AppState>, IdPath(id): IdPath) -> AppResult<impl IntoResponse> {
    let service = IpAddressService::new(state);
    let ip = service.get_ip_address(id).await?;
    Ok(ApiResponse::ok(ip))
}

async fn update_ip_address(
    State(state): State<AppState>,
    IdPath(id): IdPath,
    ValidatedJson(dto): ValidatedJson<UpdateIpAddressDto>,
) -> AppResult<impl IntoResponse> {
    let service = IpAddressService::new(state);
    let ip = service.update_ip_address(id, dto).await?;
    Ok(ApiResponse::ok(ip))
}

async fn delete_ip_address(State(state): State<AppState>, IdPath(id): IdPath) -> AppResult<impl IntoResponse> {
    let service = IpAddressService::new(state);
    service.delete_ip_address(id).await?;
    Ok(MessageResponse::ok("IP address deleted successfully"))
}

/// 转为静态地址
async fn convert_to_static(State(state): State<AppState>, IdPath(id): IdPath) -> AppResult<impl IntoResponse> {
    let service = IpAddressService::new(state);
    let ip = service.convert_to_static(id).await?;
    let message = format!("IP address {} converted to static", ip.ip_address);
    Ok(ApiResponse::ok(ip).with_message(message))
}

/// 地址冲突检测
async fn detect_conflicts(
    State(state): State<AppState>,
    Query(query): Query<ConflictQuery>,
) -> AppResult<impl IntoResponse> {
    let (kind, network_id) = query.parse()?;
    let service = IpAddressService::new(state);
    let report = service.detect_conflicts(kind, network_id).await?;
    Ok(ApiResponse::ok(report))
}

/// 批量操作
///
/// 未知的 operation、缺失字段、非法 UUID 都在反序列化阶段以 400 拒绝
async fn bulk_operation(
    State(state): State<AppState>,
    payload: Result<Json<BulkIpOperation>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    let Json(operation) = payload.map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;
    let service = IpAddressService::new(state);
    let result = service.bulk_operation(operation).await?;
    Ok(ApiResponse::ok(result))
}
