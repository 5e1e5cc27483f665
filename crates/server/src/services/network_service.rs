/// 网络管理服务

use chrono::Utc;
use common::cache::list_cache_key;
use common::ipam::{check_network_settings, network_utilization, NetworkAddressing};
use sea_orm::sea_query::extension::postgres::PgExpr;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, FromQueryResult, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::app_state::AppState;
use crate::db::models::io::{Column as IoColumn, Entity as IoEntity};
use crate::db::models::io_tagged_network::{Column as TaggedColumn, Entity as TaggedEntity};
use crate::db::models::ip_address::{Column as IpColumn, Entity as IpEntity};
use crate::db::models::network::{
    ActiveModel as NetworkActiveModel, Column as NetworkColumn, CreateNetworkDto, Entity as NetworkEntity,
    Model as NetworkModel, NetworkListQuery, NetworkListResponse, NetworkResponse, NetworkWithUtilization,
    UpdateNetworkDto,
};
use crate::error::{AppError, AppResult};

const CACHE_RESOURCE: &str = "networks";

/// 写入前的一致性检查失败时返回 400 并附带全部错误
pub(crate) fn ensure_settings(addressing: &NetworkAddressing<'_>) -> AppResult<()> {
    let errors = check_network_settings(addressing);
    if errors.is_empty() {
        return Ok(());
    }
    Err(AppError::Validation {
        message: errors.join("; "),
        errors,
    })
}

/// 每个网络的地址记录数
#[derive(Debug, FromQueryResult)]
struct NetworkIpCount {
    network_id: Uuid,
    allocated_count: i64,
}

pub struct NetworkService {
    state: AppState,
}

impl NetworkService {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    /// 按 id 读取网络，不存在时返回 404
    pub async fn find_network(&self, network_id: Uuid) -> AppResult<NetworkModel> {
        NetworkEntity::find_by_id(network_id)
            .one(&self.state.sea_db())
            .await?
            .ok_or_else(|| AppError::not_found("Network"))
    }

    /// 创建网络
    pub async fn create_network(&self, dto: CreateNetworkDto) -> AppResult<NetworkResponse> {
        ensure_settings(&NetworkAddressing {
            network_address: dto.network_address.as_deref(),
            gateway: dto.gateway.as_deref(),
            dhcp_enabled: dto.dhcp_enabled,
            dhcp_range_start: dto.dhcp_range_start.as_deref(),
            dhcp_range_end: dto.dhcp_range_end.as_deref(),
        })?;

        let now = Utc::now();
        let network_active = NetworkActiveModel {
            id: Set(Uuid::new_v4()),
            location_id: Set(dto.location_id),
            network_name: Set(dto.network_name),
            network_address: Set(dto.network_address),
            vlan_id: Set(dto.vlan_id),
            network_type: Set(dto.network_type.map(|t| t.as_str().to_string())),
            gateway: Set(dto.gateway),
            dns_servers: Set(dto.dns_servers),
            dhcp_enabled: Set(dto.dhcp_enabled),
            dhcp_range_start: Set(dto.dhcp_range_start),
            dhcp_range_end: Set(dto.dhcp_range_end),
            description: Set(dto.description),
            notes: Set(dto.notes),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };

        let network = network_active.insert(&self.state.sea_db()).await?;
        self.invalidate_cache().await;

        info!("网络 {} ({}) 已创建", network.network_name, network.id);
        Ok(NetworkResponse::from(network))
    }

    /// 获取网络列表（带缓存）
    pub async fn list_networks(&self, query: NetworkListQuery) -> AppResult<Value> {
        let key = list_cache_key(
            CACHE_RESOURCE,
            &[
                ("search", query.search.clone()),
                ("network_type", query.network_type.map(|t| t.as_str().to_string())),
                ("location_id", query.location_id.map(|id| id.to_string())),
                ("dhcp_enabled", query.dhcp_enabled.map(|b| b.to_string())),
                ("page", Some(query.page.to_string())),
                ("limit", Some(query.limit.to_string())),
                ("sort_by", Some(query.sort_by.as_str().to_string())),
                ("sort_order", Some(query.sort_order.as_str().to_string())),
            ],
        );

        self.state
            .cache()
            .get_or_try_insert_with(&key, || async {
                let response = self.query_networks(&query).await?;
                Ok::<_, AppError>(serde_json::to_value(response)?)
            })
            .await
    }

    async fn query_networks(&self, query: &NetworkListQuery) -> AppResult<NetworkListResponse> {
        let db = &self.state.sea_db();
        debug!("查询网络列表: {:?}", query);

        let mut select = NetworkEntity::find();

        if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let pattern = format!("%{}%", search);
            select = select.filter(
                Condition::any()
                    .add(Expr::col(NetworkColumn::NetworkName).ilike(pattern.clone()))
                    .add(Expr::col(NetworkColumn::NetworkAddress).ilike(pattern.clone()))
                    .add(Expr::col(NetworkColumn::Description).ilike(pattern)),
            );
        }
        if let Some(network_type) = query.network_type {
            select = select.filter(NetworkColumn::NetworkType.eq(network_type.as_str()));
        }
        if let Some(location_id) = query.location_id {
            select = select.filter(NetworkColumn::LocationId.eq(location_id));
        }
        if let Some(dhcp_enabled) = query.dhcp_enabled {
            select = select.filter(NetworkColumn::DhcpEnabled.eq(dhcp_enabled));
        }

        let total = select.clone().count(db).await?;

        let networks = select
            .order_by(query.sort_by.column(), query.sort_order.into())
            .offset((query.page - 1) * query.limit)
            .limit(query.limit)
            .all(db)
            .await?;

        Ok(NetworkListResponse {
            networks: networks.into_iter().map(NetworkResponse::from).collect(),
            total,
            page: query.page,
            limit: query.limit,
        })
    }

    /// 获取单个网络
    pub async fn get_network(&self, network_id: Uuid) -> AppResult<NetworkResponse> {
        self.find_network(network_id).await.map(NetworkResponse::from)
    }

    /// 更新网络
    ///
    /// 一致性检查针对合并后的完整记录进行
    pub async fn update_network(&self, network_id: Uuid, dto: UpdateNetworkDto) -> AppResult<NetworkResponse> {
        if dto.is_empty() {
            return Err(AppError::BadRequest("No fields to update".to_string()));
        }

        let mut merged = self.find_network(network_id).await?;

        if let Some(location_id) = dto.location_id {
            merged.location_id = location_id;
        }
        if let Some(name) = dto.network_name {
            merged.network_name = name;
        }
        if let Some(address) = dto.network_address {
            merged.network_address = address;
        }
        if let Some(vlan_id) = dto.vlan_id {
            merged.vlan_id = vlan_id;
        }
        if let Some(network_type) = dto.network_type {
            merged.network_type = network_type.map(|t| t.as_str().to_string());
        }
        if let Some(gateway) = dto.gateway {
            merged.gateway = gateway;
        }
        if let Some(dns_servers) = dto.dns_servers {
            merged.dns_servers = dns_servers;
        }
        if let Some(dhcp_enabled) = dto.dhcp_enabled {
            merged.dhcp_enabled = dhcp_enabled;
        }
        if let Some(start) = dto.dhcp_range_start {
            merged.dhcp_range_start = start;
        }
        if let Some(end) = dto.dhcp_range_end {
            merged.dhcp_range_end = end;
        }
        if let Some(description) = dto.description {
            merged.description = description;
        }
        if let Some(notes) = dto.notes {
            merged.notes = notes;
        }

        ensure_settings(&merged.addressing())?;

        let mut network_active = NetworkActiveModel::from(merged).reset_all();
        network_active.updated_at = Set(Utc::now().into());

        let updated = network_active.update(&self.state.sea_db()).await?;
        self.invalidate_cache().await;

        info!("网络 {} 已更新", network_id);
        Ok(NetworkResponse::from(updated))
    }

    /// 删除网络
    ///
    /// 仍有接口以原生或标记方式使用该网络时拒绝删除
    pub async fn delete_network(&self, network_id: Uuid) -> AppResult<()> {
        let db = &self.state.sea_db();

        let native_count = IoEntity::find()
            .filter(IoColumn::NativeNetworkId.eq(network_id))
            .count(db)
            .await?;
        let tagged_count = TaggedEntity::find()
            .filter(TaggedColumn::NetworkId.eq(network_id))
            .count(db)
            .await?;

        if native_count > 0 || tagged_count > 0 {
            warn!(
                "网络 {} 正在被 {} 个接口和 {} 个标记接口使用，拒绝删除",
                network_id, native_count, tagged_count
            );
            return Err(AppError::BadRequest(format!(
                "Cannot delete network: {} interface(s) and {} tagged interface(s) are using this network",
                native_count, tagged_count
            )));
        }

        let result = NetworkEntity::delete_by_id(network_id).exec(db).await?;
        if result.rows_affected == 0 {
            return Err(AppError::not_found("Network"));
        }

        self.invalidate_cache().await;
        info!("网络 {} 已删除", network_id);
        Ok(())
    }

    /// 按利用率降序返回有地址记录的网络
    ///
    /// 只统计 CIDR 可解析的网络，利用率相同时按名称排序
    pub async fn top_utilized(&self, limit: usize) -> AppResult<Vec<NetworkWithUtilization>> {
        let db = &self.state.sea_db();

        let networks = NetworkEntity::find()
            .filter(NetworkColumn::NetworkAddress.is_not_null())
            .all(db)
            .await?;

        let counts: HashMap<Uuid, u64> = IpEntity::find()
            .select_only()
            .column(IpColumn::NetworkId)
            .column_as(Expr::col(IpColumn::Id).count(), "allocated_count")
            .filter(IpColumn::NetworkId.is_not_null())
            .group_by(IpColumn::NetworkId)
            .into_model::<NetworkIpCount>()
            .all(db)
            .await?
            .into_iter()
            .map(|row| (row.network_id, row.allocated_count.max(0) as u64))
            .collect();

        let mut ranked: Vec<NetworkWithUtilization> = networks
            .into_iter()
            .filter_map(|network| {
                let allocated = counts.get(&network.id).copied().filter(|count| *count > 0)?;
                let subnet = match network.addressing().parse_subnet() {
                    Ok(subnet) => subnet,
                    Err(e) => {
                        warn!("网络 {} 的 CIDR 无法解析，跳过利用率统计: {}", network.id, e);
                        return None;
                    }
                };
                Some(NetworkWithUtilization {
                    usage: network_utilization(&subnet, allocated),
                    network: NetworkResponse::from(network),
                })
            })
            .collect();

        ranked.sort_by(|a, b| {
            b.usage
                .ratio()
                .total_cmp(&a.usage.ratio())
                .then_with(|| a.network.network_name.cmp(&b.network.network_name))
        });
        ranked.truncate(limit);

        debug!("利用率排行: 返回 {} 个网络", ranked.len());
        Ok(ranked)
    }

    async fn invalidate_cache(&self) {
        let removed = self
            .state
            .cache()
            .invalidate_pattern(&format!("{}:*", CACHE_RESOURCE))
            .await;
        debug!("网络缓存失效: {} 个条目", removed);
    }
}
