/// IP 地址管理服务

use chrono::Utc;
use common::cache::list_cache_key;
use common::ipam::{detect_conflicts, parse_ipv4, AssignmentRecord, ConflictKind, ConflictReport};
use common::models::{IpAddressType, IpVersion};
use common::utils::validate_ip_address;
use sea_orm::entity::prelude::DateTimeWithTimeZone;
use sea_orm::sea_query::extension::postgres::PgExpr;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, FromQueryResult, JoinType, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, RelationTrait, Set,
};
use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;

use crate::app_state::AppState;
use crate::db::models::device::Column as DeviceColumn;
use crate::db::models::io::Relation as IoRelation;
use crate::db::models::ip_address::{
    ActiveModel as IpActiveModel, BulkIpOperation, BulkOperationResult, Column as IpColumn,
    CreateIpAddressDto, DnsUpdate, Entity as IpEntity, IpAddressListQuery, IpAddressListResponse,
    IpAddressResponse, Model as IpModel, Relation as IpRelation, UpdateIpAddressDto,
};
use crate::db::models::network::{Column as NetworkColumn, Entity as NetworkEntity};
use crate::error::{AppError, AppResult};
use crate::services::network_service::NetworkService;

const CACHE_RESOURCE: &str = "ip_addresses";

const INVALID_IP_FORMAT: &str =
    "Invalid IP address format. Must be a valid IPv4 (e.g., 192.168.1.1) or IPv6 address.";

/// 冲突检测读取的一行：地址、所属设备与网络
#[derive(Debug, Clone, FromQueryResult)]
struct ConflictRow {
    ip_id: Uuid,
    ip_address: String,
    ip_type: Option<String>,
    io_id: Option<Uuid>,
    network_id: Option<Uuid>,
    device_id: Option<Uuid>,
    device_name: Option<String>,
    network_name: Option<String>,
    network_address: Option<String>,
    dhcp_enabled: Option<bool>,
    dhcp_range_start: Option<String>,
    dhcp_range_end: Option<String>,
}

impl From<ConflictRow> for AssignmentRecord {
    fn from(row: ConflictRow) -> Self {
        Self {
            ip_id: row.ip_id,
            ip_address: row.ip_address,
            ip_type: row.ip_type,
            io_id: row.io_id,
            device_id: row.device_id,
            device_name: row.device_name,
            network_id: row.network_id,
            network_name: row.network_name,
            network_address: row.network_address,
            dhcp_enabled: row.dhcp_enabled.unwrap_or(false),
            dhcp_range_start: row.dhcp_range_start,
            dhcp_range_end: row.dhcp_range_end,
        }
    }
}

pub struct IpAddressService {
    state: AppState,
}

impl IpAddressService {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    async fn find_ip_address(&self, ip_id: Uuid) -> AppResult<IpModel> {
        IpEntity::find_by_id(ip_id)
            .one(&self.state.sea_db())
            .await?
            .ok_or_else(|| AppError::not_found("IP address"))
    }

    /// 地址格式与所属网络的一致性检查
    ///
    /// IPv4 地址绑定到 CIDR 可解析的网络时必须位于该子网内
    async fn check_address(
        &self,
        address: &str,
        version: Option<IpVersion>,
        network_id: Option<Uuid>,
    ) -> AppResult<()> {
        let version = version.unwrap_or_else(|| IpVersion::detect(address));
        if !validate_ip_address(address, Some(version)) {
            return Err(AppError::Validation {
                message: INVALID_IP_FORMAT.to_string(),
                errors: vec![format!("ip_address: {}", INVALID_IP_FORMAT)],
            });
        }

        let Some(network_id) = network_id else {
            return Ok(());
        };
        let network = NetworkService::new(self.state.clone()).find_network(network_id).await?;

        if version != IpVersion::V4 {
            return Ok(());
        }
        if let (Ok(subnet), Some(value)) = (network.addressing().parse_subnet(), parse_ipv4(address)) {
            if !subnet.contains(value) {
                return Err(AppError::BadRequest(format!(
                    "IP address {} is not within network {}",
                    address, subnet
                )));
            }
        }
        Ok(())
    }

    /// 创建 IP 地址记录
    pub async fn create_ip_address(&self, dto: CreateIpAddressDto) -> AppResult<IpAddressResponse> {
        let address = dto.ip_address.trim().to_string();
        let version = dto.ip_version.unwrap_or_else(|| IpVersion::detect(&address));
        self.check_address(&address, Some(version), dto.network_id).await?;

        let now = Utc::now();
        let ip_active = IpActiveModel {
            id: Set(Uuid::new_v4()),
            io_id: Set(dto.io_id),
            network_id: Set(dto.network_id),
            ip_address: Set(address),
            ip_version: Set(Some(version.as_str().to_string())),
            ip_type: Set(dto.ip_type.map(|t| t.as_str().to_string())),
            dns_name: Set(dto.dns_name),
            assignment_date: Set(dto.assignment_date),
            notes: Set(dto.notes),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };

        let ip = ip_active.insert(&self.state.sea_db()).await?;
        self.invalidate_cache().await;

        info!("IP 地址 {} 已创建", ip.ip_address);
        Ok(IpAddressResponse::from(ip))
    }

    /// 获取 IP 地址列表（带缓存）
    pub async fn list_ip_addresses(&self, query: IpAddressListQuery) -> AppResult<Value> {
        let key = list_cache_key(
            CACHE_RESOURCE,
            &[
                ("search", query.search.clone()),
                ("ip_version", query.ip_version.map(|v| v.as_str().to_string())),
                ("type", query.ip_type.map(|t| t.as_str().to_string())),
                ("io_id", query.io_id.map(|id| id.to_string())),
                ("network_id", query.network_id.map(|id| id.to_string())),
                ("limit", Some(query.limit.to_string())),
                ("offset", Some(query.offset.to_string())),
                ("sort_by", Some(query.sort_by.as_str().to_string())),
                ("sort_order", Some(query.sort_order.as_str().to_string())),
            ],
        );

        self.state
            .cache()
            .get_or_try_insert_with(&key, || async {
                let response = self.query_ip_addresses(&query).await?;
                Ok::<_, AppError>(serde_json::to_value(response)?)
            })
            .await
    }

    async fn query_ip_addresses(&self, query: &IpAddressListQuery) -> AppResult<IpAddressListResponse> {
        let db = &self.state.sea_db();

        let mut select = IpEntity::find();

        if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let pattern = format!("%{}%", search);
            select = select.filter(
                Condition::any()
                    .add(Expr::col(IpColumn::IpAddress).ilike(pattern.clone()))
                    .add(Expr::col(IpColumn::DnsName).ilike(pattern)),
            );
        }
        if let Some(version) = query.ip_version {
            select = select.filter(IpColumn::IpVersion.eq(version.as_str()));
        }
        if let Some(ip_type) = query.ip_type {
            select = select.filter(IpColumn::IpType.eq(ip_type.as_str()));
        }
        if let Some(io_id) = query.io_id {
            select = select.filter(IpColumn::IoId.eq(io_id));
        }
        if let Some(network_id) = query.network_id {
            select = select.filter(IpColumn::NetworkId.eq(network_id));
        }

        let total = select.clone().count(db).await?;

        let ip_addresses = select
            .order_by(query.sort_by.column(), query.sort_order.into())
            .offset(query.offset)
            .limit(query.limit)
            .all(db)
            .await?;

        Ok(IpAddressListResponse {
            ip_addresses: ip_addresses.into_iter().map(IpAddressResponse::from).collect(),
            total,
            limit: query.limit,
            offset: query.offset,
        })
    }

    /// 获取单条 IP 地址记录
    pub async fn get_ip_address(&self, ip_id: Uuid) -> AppResult<IpAddressResponse> {
        self.find_ip_address(ip_id).await.map(IpAddressResponse::from)
    }

    /// 更新 IP 地址记录，检查针对合并后的记录进行
    pub async fn update_ip_address(&self, ip_id: Uuid, dto: UpdateIpAddressDto) -> AppResult<IpAddressResponse> {
        if dto.is_empty() {
            return Err(AppError::BadRequest("No fields to update".to_string()));
        }

        let mut merged = self.find_ip_address(ip_id).await?;

        if let Some(io_id) = dto.io_id {
            merged.io_id = io_id;
        }
        if let Some(network_id) = dto.network_id {
            merged.network_id = network_id;
        }
        if let Some(address) = dto.ip_address {
            merged.ip_address = address.trim().to_string();
        }
        if let Some(version) = dto.ip_version {
            merged.ip_version = version.map(|v| v.as_str().to_string());
        }
        if let Some(ip_type) = dto.ip_type {
            merged.ip_type = ip_type.map(|t| t.as_str().to_string());
        }
        if let Some(dns_name) = dto.dns_name {
            merged.dns_name = dns_name;
        }
        if let Some(assignment_date) = dto.assignment_date {
            merged.assignment_date = assignment_date;
        }
        if let Some(notes) = dto.notes {
            merged.notes = notes;
        }

        let version = merged.ip_version.clone().map(IpVersion::from);
        self.check_address(&merged.ip_address, version, merged.network_id).await?;

        let mut ip_active = IpActiveModel::from(merged).reset_all();
        ip_active.updated_at = Set(Utc::now().into());

        let updated = ip_active.update(&self.state.sea_db()).await?;
        self.invalidate_cache().await;

        info!("IP 地址 {} 已更新", ip_id);
        Ok(IpAddressResponse::from(updated))
    }

    /// 删除 IP 地址记录
    pub async fn delete_ip_address(&self, ip_id: Uuid) -> AppResult<()> {
        let result = IpEntity::delete_by_id(ip_id).exec(&self.state.sea_db()).await?;
        if result.rows_affected == 0 {
            return Err(AppError::not_found("IP address"));
        }

        self.invalidate_cache().await;
        info!("IP 地址 {} 已删除", ip_id);
        Ok(())
    }

    /// 将 DHCP 等类型的地址改为静态地址
    pub async fn convert_to_static(&self, ip_id: Uuid) -> AppResult<IpAddressResponse> {
        let ip = self.find_ip_address(ip_id).await?;

        let current = ip.ip_type.as_deref();
        if current == Some(IpAddressType::Static.as_str()) {
            return Err(AppError::BadRequest("IP address is already static".to_string()));
        }
        if current == Some(IpAddressType::Reserved.as_str()) {
            return Err(AppError::BadRequest(
                "Cannot convert reserved IP to static. Assign it to a device first.".to_string(),
            ));
        }

        let mut ip_active = IpActiveModel::from(ip);
        ip_active.ip_type = Set(Some(IpAddressType::Static.as_str().to_string()));
        ip_active.updated_at = Set(Utc::now().into());

        let updated = ip_active.update(&self.state.sea_db()).await?;
        self.invalidate_cache().await;

        info!("IP 地址 {} 已转为静态地址", updated.ip_address);
        Ok(IpAddressResponse::from(updated))
    }

    /// 检测地址冲突，可按类别与网络过滤
    ///
    /// 指定网络时重复地址只在该网络内统计
    pub async fn detect_conflicts(
        &self,
        kind: Option<ConflictKind>,
        network_id: Option<Uuid>,
    ) -> AppResult<ConflictReport> {
        let mut select = IpEntity::find()
            .select_only()
            .column_as(IpColumn::Id, "ip_id")
            .column(IpColumn::IpAddress)
            .column_as(IpColumn::IpType, "ip_type")
            .column(IpColumn::IoId)
            .column(IpColumn::NetworkId)
            .column_as(DeviceColumn::Id, "device_id")
            .column_as(DeviceColumn::Hostname, "device_name")
            .column(NetworkColumn::NetworkName)
            .column(NetworkColumn::NetworkAddress)
            .column(NetworkColumn::DhcpEnabled)
            .column(NetworkColumn::DhcpRangeStart)
            .column(NetworkColumn::DhcpRangeEnd)
            .join(JoinType::LeftJoin, IpRelation::Network.def())
            .join(JoinType::LeftJoin, IpRelation::Io.def())
            .join(JoinType::LeftJoin, IoRelation::Device.def());

        if let Some(network_id) = network_id {
            select = select.filter(IpColumn::NetworkId.eq(network_id));
        }

        let records: Vec<AssignmentRecord> = select
            .order_by_asc(IpColumn::IpAddress)
            .order_by_asc(IpColumn::Id)
            .into_model::<ConflictRow>()
            .all(&self.state.sea_db())
            .await?
            .into_iter()
            .map(AssignmentRecord::from)
            .collect();

        let report = detect_conflicts(&records, kind);
        debug!(
            "冲突检测: {} 条地址记录，发现 {} 个冲突",
            records.len(),
            report.summary.total_conflicts
        );
        Ok(report)
    }

    /// 批量操作，每种操作都是单条语句
    pub async fn bulk_operation(&self, operation: BulkIpOperation) -> AppResult<BulkOperationResult> {
        let db = &self.state.sea_db();
        let now: DateTimeWithTimeZone = Utc::now().into();
        let name = operation.as_str().to_string();

        let (affected_count, details) = match operation {
            BulkIpOperation::Reserve { ip_ids, notes } => {
                require_ids(&ip_ids)?;
                let mut update = IpEntity::update_many()
                    .col_expr(IpColumn::IpType, Expr::value(IpAddressType::Reserved.as_str()))
                    .col_expr(IpColumn::UpdatedAt, Expr::value(now));
                if let Some(notes) = notes {
                    update = update.col_expr(IpColumn::Notes, Expr::value(notes));
                }
                let result = update.filter(IpColumn::Id.is_in(ip_ids)).exec(db).await?;
                (
                    result.rows_affected,
                    format!("{} IP(s) marked as reserved", result.rows_affected),
                )
            }
            BulkIpOperation::Release { ip_ids } => {
                require_ids(&ip_ids)?;
                let result = IpEntity::delete_many()
                    .filter(IpColumn::Id.is_in(ip_ids))
                    .exec(db)
                    .await?;
                (
                    result.rows_affected,
                    format!("{} IP(s) released and removed from allocation", result.rows_affected),
                )
            }
            BulkIpOperation::UpdateDns { updates } => {
                let dns_case = dns_case_expr(&updates)?;
                let ids: Vec<Uuid> = updates.iter().map(|u| u.ip_id).collect();
                let result = IpEntity::update_many()
                    .col_expr(IpColumn::DnsName, dns_case)
                    .col_expr(IpColumn::UpdatedAt, Expr::value(now))
                    .filter(IpColumn::Id.is_in(ids))
                    .exec(db)
                    .await?;
                (
                    result.rows_affected,
                    format!("{} IP(s) DNS names updated", result.rows_affected),
                )
            }
            BulkIpOperation::ReassignNetwork { ip_ids, new_network_id } => {
                require_ids(&ip_ids)?;
                NetworkEntity::find_by_id(new_network_id)
                    .one(db)
                    .await?
                    .ok_or_else(|| AppError::not_found("Target network"))?;

                let result = IpEntity::update_many()
                    .col_expr(IpColumn::NetworkId, Expr::value(new_network_id))
                    .col_expr(IpColumn::UpdatedAt, Expr::value(now))
                    .filter(IpColumn::Id.is_in(ip_ids))
                    .exec(db)
                    .await?;
                (
                    result.rows_affected,
                    format!("{} IP(s) reassigned to new network", result.rows_affected),
                )
            }
        };

        self.invalidate_cache().await;
        info!("批量操作 {} 完成: {}", name, details);

        Ok(BulkOperationResult {
            operation: name,
            affected_count,
            details,
        })
    }

    async fn invalidate_cache(&self) {
        let removed = self
            .state
            .cache()
            .invalidate_pattern(&format!("{}:*", CACHE_RESOURCE))
            .await;
        debug!("IP 地址缓存失效: {} 个条目", removed);
    }
}

fn require_ids(ids: &[Uuid]) -> AppResult<()> {
    if ids.is_empty() {
        return Err(AppError::BadRequest("At least one IP ID required".to_string()));
    }
    Ok(())
}

/// `CASE WHEN id = $1 THEN $2 ... ELSE dns_name END`
fn dns_case_expr(updates: &[DnsUpdate]) -> AppResult<sea_orm::sea_query::SimpleExpr> {
    let (first, rest) = updates
        .split_first()
        .ok_or_else(|| AppError::BadRequest("At least one update required".to_string()))?;

    let case = rest.iter().fold(
        Expr::case(Expr::col(IpColumn::Id).eq(first.ip_id), first.dns_name.clone()),
        |case, update| case.case(Expr::col(IpColumn::Id).eq(update.ip_id), update.dns_name.clone()),
    );

    Ok(case.finally(Expr::col(IpColumn::DnsName)).into())
}
