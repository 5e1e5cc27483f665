/// 网络数据模型

use common::ipam::{NetworkAddressing, NetworkUtilization};
use common::models::NetworkType;
use common::utils::double_option;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// 网络模型
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "networks")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub location_id: Option<Uuid>,
    pub network_name: String,
    /// CIDR，如 10.0.0.0/24
    pub network_address: Option<String>,
    pub vlan_id: Option<i32>,
    pub network_type: Option<String>,
    pub gateway: Option<String>,
    pub dns_servers: Option<String>,
    pub dhcp_enabled: bool,
    pub dhcp_range_start: Option<String>,
    pub dhcp_range_end: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub notes: Option<String>,

    // 时间戳
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::ip_address::Entity")]
    IpAddresses,
}

impl Related<super::ip_address::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::IpAddresses.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// 寻址相关字段的借用视图
    pub fn addressing(&self) -> NetworkAddressing<'_> {
        NetworkAddressing {
            network_address: self.network_address.as_deref(),
            gateway: self.gateway.as_deref(),
            dhcp_enabled: self.dhcp_enabled,
            dhcp_range_start: self.dhcp_range_start.as_deref(),
            dhcp_range_end: self.dhcp_range_end.as_deref(),
        }
    }
}

/// 创建网络 DTO
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreateNetworkDto {
    pub location_id: Option<Uuid>,

    #[validate(length(min = 1, max = 255))]
    pub network_name: String,

    #[validate(length(max = 50))]
    pub network_address: Option<String>,

    #[validate(range(min = 1, max = 4094))]
    pub vlan_id: Option<i32>,

    pub network_type: Option<NetworkType>,

    #[validate(length(max = 50))]
    pub gateway: Option<String>,

    pub dns_servers: Option<String>,

    #[serde(default)]
    pub dhcp_enabled: bool,

    #[validate(length(max = 50))]
    pub dhcp_range_start: Option<String>,

    #[validate(length(max = 50))]
    pub dhcp_range_end: Option<String>,

    pub description: Option<String>,
    pub notes: Option<String>,
}

/// 更新网络 DTO
///
/// 可空字段使用 `Option<Option<T>>`: 缺省表示不修改，显式 null 表示清空
#[derive(Debug, Default, Serialize, Deserialize, Validate)]
pub struct UpdateNetworkDto {
    #[serde(default, deserialize_with = "double_option")]
    pub location_id: Option<Option<Uuid>>,

    #[validate(length(min = 1, max = 255))]
    pub network_name: Option<String>,

    #[serde(default, deserialize_with = "double_option")]
    #[validate(length(max = 50))]
    pub network_address: Option<Option<String>>,

    #[serde(default, deserialize_with = "double_option")]
    #[validate(range(min = 1, max = 4094))]
    pub vlan_id: Option<Option<i32>>,

    #[serde(default, deserialize_with = "double_option")]
    pub network_type: Option<Option<NetworkType>>,

    #[serde(default, deserialize_with = "double_option")]
    #[validate(length(max = 50))]
    pub gateway: Option<Option<String>>,

    #[serde(default, deserialize_with = "double_option")]
    pub dns_servers: Option<Option<String>>,

    pub dhcp_enabled: Option<bool>,

    #[serde(default, deserialize_with = "double_option")]
    #[validate(length(max = 50))]
    pub dhcp_range_start: Option<Option<String>>,

    #[serde(default, deserialize_with = "double_option")]
    #[validate(length(max = 50))]
    pub dhcp_range_end: Option<Option<String>>,

    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,

    #[serde(default, deserialize_with = "double_option")]
    pub notes: Option<Option<String>>,
}

impl UpdateNetworkDto {
    pub fn is_empty(&self) -> bool {
        self.location_id.is_none()
            && self.network_name.is_none()
            && self.network_address.is_none()
            && self.vlan_id.is_none()
            && self.network_type.is_none()
            && self.gateway.is_none()
            && self.dns_servers.is_none()
            && self.dhcp_enabled.is_none()
            && self.dhcp_range_start.is_none()
            && self.dhcp_range_end.is_none()
            && self.description.is_none()
            && self.notes.is_none()
    }
}

/// 网络响应 DTO
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkResponse {
    pub id: Uuid,
    pub location_id: Option<Uuid>,
    pub network_name: String,
    pub network_address: Option<String>,
    pub vlan_id: Option<i32>,
    pub network_type: Option<String>,
    pub gateway: Option<String>,
    pub dns_servers: Option<String>,
    pub dhcp_enabled: bool,
    pub dhcp_range_start: Option<String>,
    pub dhcp_range_end: Option<String>,
    pub description: Option<String>,
    pub notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Model> for NetworkResponse {
    fn from(network: Model) -> Self {
        Self {
            id: network.id,
            location_id: network.location_id,
            network_name: network.network_name,
            network_address: network.network_address,
            vlan_id: network.vlan_id,
            network_type: network.network_type,
            gateway: network.gateway,
            dns_servers: network.dns_servers,
            dhcp_enabled: network.dhcp_enabled,
            dhcp_range_start: network.dhcp_range_start,
            dhcp_range_end: network.dhcp_range_end,
            description: network.description,
            notes: network.notes,
            created_at: network.created_at.to_rfc3339(),
            updated_at: network.updated_at.to_rfc3339(),
        }
    }
}

/// 利用率排行中的一项
#[derive(Debug, Clone, Serialize)]
pub struct NetworkWithUtilization {
    #[serde(flatten)]
    pub network: NetworkResponse,
    #[serde(flatten)]
    pub usage: NetworkUtilization,
}

/// 网络列表响应
#[derive(Debug, Serialize, Deserialize)]
pub struct NetworkListResponse {
    pub networks: Vec<NetworkResponse>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
}

/// 网络列表排序字段
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NetworkSortField {
    NetworkName,
    NetworkAddress,
    VlanId,
    NetworkType,
    #[default]
    CreatedAt,
    UpdatedAt,
}

impl NetworkSortField {
    pub fn as_str(&self) -> &'static str {
        match self {
            NetworkSortField::NetworkName => "network_name",
            NetworkSortField::NetworkAddress => "network_address",
            NetworkSortField::VlanId => "vlan_id",
            NetworkSortField::NetworkType => "network_type",
            NetworkSortField::CreatedAt => "created_at",
            NetworkSortField::UpdatedAt => "updated_at",
        }
    }

    pub fn column(&self) -> Column {
        match self {
            NetworkSortField::NetworkName => Column::NetworkName,
            NetworkSortField::NetworkAddress => Column::NetworkAddress,
            NetworkSortField::VlanId => Column::VlanId,
            NetworkSortField::NetworkType => Column::NetworkType,
            NetworkSortField::CreatedAt => Column::CreatedAt,
            NetworkSortField::UpdatedAt => Column::UpdatedAt,
        }
    }
}

/// 网络列表查询参数
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NetworkListQuery {
    pub search: Option<String>,
    pub network_type: Option<NetworkType>,
    pub location_id: Option<Uuid>,
    pub dhcp_enabled: Option<bool>,
    #[serde(default = "default_page")]
    #[validate(range(min = 1))]
    pub page: u64,
    #[serde(default = "default_limit")]
    #[validate(range(min = 1, max = 100))]
    pub limit: u64,
    #[serde(default)]
    pub sort_by: NetworkSortField,
    #[serde(default = "default_sort_order")]
    pub sort_order: SortOrder,
}

impl Default for NetworkListQuery {
    fn default() -> Self {
        Self {
            search: None,
            network_type: None,
            location_id: None,
            dhcp_enabled: None,
            page: default_page(),
            limit: default_limit(),
            sort_by: NetworkSortField::default(),
            sort_order: default_sort_order(),
        }
    }
}

fn default_page() -> u64 {
    1
}

fn default_limit() -> u64 {
    50
}

fn default_sort_order() -> SortOrder {
    SortOrder::Desc
}

/// 排序方向
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

impl From<SortOrder> for sea_orm::Order {
    fn from(order: SortOrder) -> Self {
        match order {
            SortOrder::Asc => sea_orm::Order::Asc,
            SortOrder::Desc => sea_orm::Order::Desc,
        }
    }
}
