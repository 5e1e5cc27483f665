/// IP 地址数据模型

use common::models::{IpAddressType, IpVersion};
use common::utils::double_option;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::network::SortOrder;

/// IP 地址记录
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "ip_addresses")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub io_id: Option<Uuid>,
    pub network_id: Option<Uuid>,
    pub ip_address: String,
    pub ip_version: Option<String>, // v4, v6
    #[sea_orm(column_name = "type")]
    #[serde(rename = "type")]
    pub ip_type: Option<String>, // static, dhcp, reserved, floating
    pub dns_name: Option<String>,
    pub assignment_date: Option<Date>,
    #[sea_orm(column_type = "Text", nullable)]
    pub notes: Option<String>,

    // 时间戳
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::network::Entity",
        from = "Column::NetworkId",
        to = "super::network::Column::Id"
    )]
    Network,

    #[sea_orm(
        belongs_to = "super::io::Entity",
        from = "Column::IoId",
        to = "super::io::Column::Id"
    )]
    Io,
}

impl Related<super::network::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Network.def()
    }
}

impl Related<super::io::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Io.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// 创建 IP 地址 DTO
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreateIpAddressDto {
    pub io_id: Option<Uuid>,
    pub network_id: Option<Uuid>,

    #[validate(length(min = 1, max = 50))]
    pub ip_address: String,

    pub ip_version: Option<IpVersion>,

    #[serde(rename = "type")]
    pub ip_type: Option<IpAddressType>,

    #[validate(length(max = 255))]
    pub dns_name: Option<String>,

    pub assignment_date: Option<Date>,
    pub notes: Option<String>,
}

/// 更新 IP 地址 DTO，可空字段显式 null 表示清空
#[derive(Debug, Default, Serialize, Deserialize, Validate)]
pub struct UpdateIpAddressDto {
    #[serde(default, deserialize_with = "double_option")]
    pub io_id: Option<Option<Uuid>>,

    #[serde(default, deserialize_with = "double_option")]
    pub network_id: Option<Option<Uuid>>,

    #[validate(length(min = 1, max = 50))]
    pub ip_address: Option<String>,

    #[serde(default, deserialize_with = "double_option")]
    pub ip_version: Option<Option<IpVersion>>,

    #[serde(rename = "type", default, deserialize_with = "double_option")]
    pub ip_type: Option<Option<IpAddressType>>,

    #[serde(default, deserialize_with = "double_option")]
    #[validate(length(max = 255))]
    pub dns_name: Option<Option<String>>,

    #[serde(default, deserialize_with = "double_option")]
    pub assignment_date: Option<Option<Date>>,

    #[serde(default, deserialize_with = "double_option")]
    pub notes: Option<Option<String>>,
}

impl UpdateIpAddressDto {
    pub fn is_empty(&self) -> bool {
        self.io_id.is_none()
            && self.network_id.is_none()
            && self.ip_address.is_none()
            && self.ip_version.is_none()
            && self.ip_type.is_none()
            && self.dns_name.is_none()
            && self.assignment_date.is_none()
            && self.notes.is_none()
    }
}

/// IP 地址响应 DTO
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpAddressResponse {
    pub id: Uuid,
    pub io_id: Option<Uuid>,
    pub network_id: Option<Uuid>,
    pub ip_address: String,
    pub ip_version: Option<String>,
    #[serde(rename = "type")]
    pub ip_type: Option<String>,
    pub dns_name: Option<String>,
    pub assignment_date: Option<String>,
    pub notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Model> for IpAddressResponse {
    fn from(ip: Model) -> Self {
        Self {
            id: ip.id,
            io_id: ip.io_id,
            network_id: ip.network_id,
            ip_address: ip.ip_address,
            ip_version: ip.ip_version,
            ip_type: ip.ip_type,
            dns_name: ip.dns_name,
            assignment_date: ip.assignment_date.map(|d| d.to_string()),
            notes: ip.notes,
            created_at: ip.created_at.to_rfc3339(),
            updated_at: ip.updated_at.to_rfc3339(),
        }
    }
}

/// IP 地址列表响应
#[derive(Debug, Serialize, Deserialize)]
pub struct IpAddressListResponse {
    pub ip_addresses: Vec<IpAddressResponse>,
    pub total: u64,
    pub limit: u64,
    pub offset: u64,
}

/// IP 地址列表排序字段
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IpAddressSortField {
    #[default]
    IpAddress,
    DnsName,
    AssignmentDate,
    CreatedAt,
}

impl IpAddressSortField {
    pub fn as_str(&self) -> &'static str {
        match self {
            IpAddressSortField::IpAddress => "ip_address",
            IpAddressSortField::DnsName => "dns_name",
            IpAddressSortField::AssignmentDate => "assignment_date",
            IpAddressSortField::CreatedAt => "created_at",
        }
    }

    pub fn column(&self) -> Column {
        match self {
            IpAddressSortField::IpAddress => Column::IpAddress,
            IpAddressSortField::DnsName => Column::DnsName,
            IpAddressSortField::AssignmentDate => Column::AssignmentDate,
            IpAddressSortField::CreatedAt => Column::CreatedAt,
        }
    }
}

/// IP 地址列表查询参数
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct IpAddressListQuery {
    pub search: Option<String>,
    pub ip_version: Option<IpVersion>,
    #[serde(rename = "type")]
    pub ip_type: Option<IpAddressType>,
    pub io_id: Option<Uuid>,
    pub network_id: Option<Uuid>,
    #[serde(default = "default_limit")]
    #[validate(range(min = 1, max = 100))]
    pub limit: u64,
    #[serde(default)]
    pub offset: u64,
    #[serde(default)]
    pub sort_by: IpAddressSortField,
    #[serde(default = "default_sort_order")]
    pub sort_order: SortOrder,
}

impl Default for IpAddressListQuery {
    fn default() -> Self {
        Self {
            search: None,
            ip_version: None,
            ip_type: None,
            io_id: None,
            network_id: None,
            limit: default_limit(),
            offset: 0,
            sort_by: IpAddressSortField::default(),
            sort_order: default_sort_order(),
        }
    }
}

fn default_limit() -> u64 {
    50
}

fn default_sort_order() -> SortOrder {
    SortOrder::Asc
}

/// 批量操作中的单条 DNS 更新
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DnsUpdate {
    pub ip_id: Uuid,
    pub dns_name: String,
}

/// 批量操作请求，按 `operation` 字段区分
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum BulkIpOperation {
    Reserve {
        ip_ids: Vec<Uuid>,
        notes: Option<String>,
    },
    Release {
        ip_ids: Vec<Uuid>,
    },
    UpdateDns {
        updates: Vec<DnsUpdate>,
    },
    ReassignNetwork {
        ip_ids: Vec<Uuid>,
        new_network_id: Uuid,
    },
}

impl BulkIpOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            BulkIpOperation::Reserve { .. } => "reserve",
            BulkIpOperation::Release { .. } => "release",
            BulkIpOperation::UpdateDns { .. } => "update_dns",
            BulkIpOperation::ReassignNetwork { .. } => "reassign_network",
        }
    }
}

/// 批量操作结果
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BulkOperationResult {
    pub operation: String,
    pub affected_count: u64,
    pub details: String,
}
