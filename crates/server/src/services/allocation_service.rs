/// 地址分配服务
///
/// 可用地址查询、DHCP 地址池校验、利用率视图。只读，不修改任何记录。

use common::ipam::{
    allocated_set, check_dhcp_range, find_available, map_utilization, parse_ipv4, summarize,
    AvailabilityReport, SlotStatus, SubnetCalculation, UtilizationSummary,
};
use common::models::IpAddressType;
use sea_orm::entity::prelude::Date;
use sea_orm::{ColumnTrait, EntityTrait, FromQueryResult, JoinType, QueryFilter, QuerySelect, RelationTrait};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::debug;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::db::models::device::Column as DeviceColumn;
use crate::db::models::io::Relation as IoRelation;
use crate::db::models::ip_address::{Column as IpColumn, Entity as IpEntity, Relation as IpRelation};
use crate::db::models::network::NetworkResponse;
use crate::error::AppResult;
use crate::services::network_service::NetworkService;

/// 网络内的一条分配记录，附带所属设备
#[derive(Debug, Clone, FromQueryResult)]
pub struct AllocationRow {
    pub id: Uuid,
    pub ip_address: String,
    pub ip_type: Option<String>,
    pub dns_name: Option<String>,
    pub io_id: Option<Uuid>,
    pub assignment_date: Option<Date>,
    pub device_id: Option<Uuid>,
    pub device_name: Option<String>,
}

/// available-ips 响应
#[derive(Debug, Serialize)]
pub struct AvailableIpsResponse {
    pub network: NetworkResponse,
    #[serde(flatten)]
    pub report: AvailabilityReport,
}

/// 与 DHCP 地址池重叠的已有分配
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DhcpConflict {
    pub ip_address: String,
    #[serde(rename = "type")]
    pub ip_type: Option<String>,
    pub device_name: Option<String>,
}

/// DHCP 地址池校验结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DhcpRangeValidation {
    pub valid: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub conflicts: Vec<DhcpConflict>,
}

impl DhcpRangeValidation {
    fn invalid(error: impl Into<String>) -> Self {
        Self {
            valid: false,
            errors: vec![error.into()],
            warnings: Vec::new(),
            conflicts: Vec::new(),
        }
    }
}

/// 单个地址的利用率条目
#[derive(Debug, Clone, Serialize)]
pub struct IpSlot {
    pub ip_address: String,
    pub status: SlotStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub io_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dns_name: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub ip_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignment_date: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UtilizationSubnetInfo {
    #[serde(flatten)]
    pub calculation: SubnetCalculation,
    pub allocated_count: u64,
    pub reserved_count: u64,
    pub dhcp_count: u64,
    pub available_count: u64,
    pub utilization_percent: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DhcpRangeBounds {
    pub start: String,
    pub end: String,
}

/// ip-utilization 响应
#[derive(Debug, Serialize)]
pub struct IpUtilizationResponse {
    pub network: NetworkResponse,
    pub subnet_info: UtilizationSubnetInfo,
    pub ip_allocations: Vec<IpSlot>,
    pub dhcp_range: Option<DhcpRangeBounds>,
}

pub struct AllocationService {
    state: AppState,
}

impl AllocationService {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    /// 读取网络的全部分配记录，经接口关联到设备
    async fn load_allocations(&self, network_id: Uuid) -> AppResult<Vec<AllocationRow>> {
        let rows = IpEntity::find()
            .select_only()
            .column(IpColumn::Id)
            .column(IpColumn::IpAddress)
            .column_as(IpColumn::IpType, "ip_type")
            .column(IpColumn::DnsName)
            .column(IpColumn::IoId)
            .column(IpColumn::AssignmentDate)
            .column_as(DeviceColumn::Id, "device_id")
            .column_as(DeviceColumn::Hostname, "device_name")
            .join(JoinType::LeftJoin, IpRelation::Io.def())
            .join(JoinType::LeftJoin, IoRelation::Device.def())
            .filter(IpColumn::NetworkId.eq(network_id))
            .into_model::<AllocationRow>()
            .all(&self.state.sea_db())
            .await?;

        debug!("网络 {} 共有 {} 条分配记录", network_id, rows.len());
        Ok(rows)
    }

    /// 查询网络中的可用地址
    pub async fn available_ips(&self, network_id: Uuid, limit: Option<usize>) -> AppResult<AvailableIpsResponse> {
        let network = NetworkService::new(self.state.clone()).find_network(network_id).await?;
        let limit = limit.unwrap_or(self.state.config().available_ips_default_limit);

        // 先校验 CIDR，避免对无效网络做多余的查询
        network.addressing().resolve_subnet()?;

        let rows = self.load_allocations(network_id).await?;
        let allocated = allocated_set(rows.iter().map(|r| r.ip_address.as_str()));
        let report = find_available(&network.addressing(), &allocated, limit)?;

        debug!(
            "网络 {} 可用地址 {} 个，返回 {} 个",
            network_id,
            report.total_available,
            report.available_ips.len()
        );

        Ok(AvailableIpsResponse {
            network: NetworkResponse::from(network),
            report,
        })
    }

    /// 校验候选 DHCP 地址池，并列出与之重叠的非 DHCP 分配
    pub async fn validate_dhcp_range(&self, network_id: Uuid, start: &str, end: &str) -> AppResult<DhcpRangeValidation> {
        let network = NetworkService::new(self.state.clone()).find_network(network_id).await?;

        let subnet = match network.addressing().parse_subnet() {
            Ok(subnet) => subnet,
            Err(e) => return Ok(DhcpRangeValidation::invalid(e.to_string())),
        };

        let check = check_dhcp_range(Some(&subnet), start.trim(), end.trim());

        let mut conflicts = Vec::new();
        if let Some(range) = check.range {
            let mut overlapping: Vec<(u32, DhcpConflict)> = self
                .load_allocations(network_id)
                .await?
                .into_iter()
                // 未标注类型的记录不算冲突
                .filter(|row| {
                    row.ip_type
                        .as_deref()
                        .is_some_and(|t| t != IpAddressType::Dhcp.as_str())
                })
                .filter_map(|row| {
                    let value = parse_ipv4(&row.ip_address).filter(|v| range.contains(*v))?;
                    Some((
                        value,
                        DhcpConflict {
                            ip_address: row.ip_address,
                            ip_type: row.ip_type,
                            device_name: row.device_name,
                        },
                    ))
                })
                .collect();
            overlapping.sort_by_key(|(value, _)| *value);
            conflicts = overlapping.into_iter().map(|(_, conflict)| conflict).collect();
        }

        let mut warnings = Vec::new();
        if !conflicts.is_empty() {
            warnings.push(format!(
                "{} existing static/reserved IP(s) are within this DHCP range and may cause conflicts",
                conflicts.len()
            ));
        }

        Ok(DhcpRangeValidation {
            valid: check.is_valid(),
            errors: check.errors,
            warnings,
            conflicts,
        })
    }

    /// 子网逐地址使用状态
    pub async fn ip_utilization(&self, network_id: Uuid) -> AppResult<IpUtilizationResponse> {
        let network = NetworkService::new(self.state.clone()).find_network(network_id).await?;
        let subnet = network.addressing().resolve_subnet()?;

        let rows = self.load_allocations(network_id).await?;
        let by_address: HashMap<u32, &AllocationRow> = rows
            .iter()
            .filter_map(|row| parse_ipv4(&row.ip_address).map(|value| (value, row)))
            .collect();
        let allocated: HashSet<u32> = by_address.keys().copied().collect();

        let map = map_utilization(&network.addressing(), &allocated)?;

        let ip_allocations = map
            .slots
            .iter()
            .map(|slot| {
                let row = by_address.get(&u32::from(slot.address)).filter(|_| slot.status == SlotStatus::Allocated);
                IpSlot {
                    ip_address: slot.address.to_string(),
                    status: slot.status,
                    io_id: row.and_then(|r| r.io_id),
                    device_id: row.and_then(|r| r.device_id),
                    device_name: row.and_then(|r| r.device_name.clone()),
                    dns_name: row.and_then(|r| r.dns_name.clone()),
                    ip_type: row.and_then(|r| r.ip_type.clone()),
                    assignment_date: row.and_then(|r| r.assignment_date).map(|d| d.to_string()),
                }
            })
            .collect();

        Ok(IpUtilizationResponse {
            subnet_info: UtilizationSubnetInfo {
                calculation: subnet.calculate(),
                allocated_count: map.allocated_count,
                reserved_count: map.reserved_count,
                dhcp_count: map.dhcp_count,
                available_count: map.available_count,
                utilization_percent: map.utilization_percent,
            },
            dhcp_range: map.dhcp_range.map(|range| DhcpRangeBounds {
                start: range.start_addr().to_string(),
                end: range.end_addr().to_string(),
            }),
            ip_allocations,
            network: NetworkResponse::from(network),
        })
    }

    /// 按分配类型汇总利用率
    pub async fn utilization_summary(&self, network_id: Uuid) -> AppResult<UtilizationSummary> {
        let network = NetworkService::new(self.state.clone()).find_network(network_id).await?;
        network.addressing().parse_subnet()?;

        let rows = self.load_allocations(network_id).await?;
        let summary = summarize(&network.addressing(), rows.iter().map(|r| r.ip_type.as_deref()))?;
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::db::models::network::Model as NetworkModel;
    use crate::error::AppError;
    use crate::services::test_support::network_model;
    use sea_orm::{DatabaseBackend, MockDatabase, Value};
    use std::collections::BTreeMap;

    fn service(db: MockDatabase) -> AllocationService {
        AllocationService::new(AppState::new(db.into_connection(), Config::default()))
    }

    fn allocation(address: &str, ip_type: &str, device_name: Option<&str>) -> BTreeMap<&'static str, Value> {
        BTreeMap::from([
            ("id", Value::from(Uuid::new_v4())),
            ("ip_address", Value::from(address.to_string())),
            ("ip_type", Value::from(Some(ip_type.to_string()))),
            ("dns_name", Value::from(None::<String>)),
            ("io_id", Value::from(None::<Uuid>)),
            ("assignment_date", Value::from(None::<Date>)),
            ("device_id", Value::from(None::<Uuid>)),
            ("device_name", Value::from(device_name.map(str::to_string))),
        ])
    }

    fn no_allocations() -> Vec<BTreeMap<&'static str, Value>> {
        Vec::new()
    }

    #[tokio::test]
    async fn test_available_ips_empty_network() {
        let network = network_model("10.0.0.0/24");
        let service = service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([vec![network.clone()]])
                .append_query_results([no_allocations()]),
        );

        let response = service.available_ips(network.id, None).await.unwrap();
        assert_eq!(response.report.total_available, 254);
        assert_eq!(response.report.available_ips.len(), 50);
        assert_eq!(response.report.next_available.as_deref(), Some("10.0.0.1"));
        assert_eq!(response.report.subnet_info.usable_hosts, 254);
    }

    #[tokio::test]
    async fn test_available_ips_skip_allocated() {
        let network = network_model("10.0.0.0/24");
        let service = service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([vec![network.clone()]])
                .append_query_results([vec![allocation("10.0.0.5", "static", None)]]),
        );

        let response = service.available_ips(network.id, Some(300)).await.unwrap();
        assert_eq!(response.report.total_available, 253);
        assert!(response.report.available_ips.iter().all(|ip| ip.ip_address != "10.0.0.5"));
    }

    #[tokio::test]
    async fn test_available_ips_without_address() {
        let mut network = network_model("10.0.0.0/24");
        network.network_address = None;
        let service = service(
            MockDatabase::new(DatabaseBackend::Postgres).append_query_results([vec![network.clone()]]),
        );

        let err = service.available_ips(network.id, None).await.unwrap_err();
        assert_eq!(err.status_code(), axum::http::StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "Network does not have a network address defined");
    }

    #[tokio::test]
    async fn test_available_ips_large_subnet() {
        let network = network_model("10.0.0.0/16");
        let service = service(
            MockDatabase::new(DatabaseBackend::Postgres).append_query_results([vec![network.clone()]]),
        );

        let err = service.available_ips(network.id, None).await.unwrap_err();
        assert_eq!(err.to_string(), "Subnet too large. Only /24 to /32 subnets are supported.");
    }

    #[tokio::test]
    async fn test_available_ips_missing_network() {
        let service = service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<NetworkModel>::new()]),
        );
        let err = service.available_ips(Uuid::new_v4(), None).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_validate_dhcp_range_invalid_octet() {
        let network = network_model("10.0.0.0/24");
        let service = service(
            MockDatabase::new(DatabaseBackend::Postgres).append_query_results([vec![network.clone()]]),
        );

        let result = service
            .validate_dhcp_range(network.id, "10.0.0.300", "10.0.0.200")
            .await
            .unwrap();
        assert!(!result.valid);
        assert_eq!(result.errors, vec!["Start IP 10.0.0.300 is not a valid IPv4 address".to_string()]);
    }

    #[tokio::test]
    async fn test_validate_dhcp_range_conflicts() {
        let network = network_model("10.0.0.0/24");
        let service = service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([vec![network.clone()]])
                .append_query_results([vec![
                    allocation("10.0.0.150", "static", Some("printer")),
                    allocation("10.0.0.120", "reserved", None),
                    allocation("10.0.0.130", "dhcp", None),
                    allocation("10.0.0.20", "static", None),
                ]]),
        );

        let result = service
            .validate_dhcp_range(network.id, "10.0.0.100", "10.0.0.200")
            .await
            .unwrap();
        assert!(result.valid);
        assert_eq!(result.warnings.len(), 1);
        let addresses: Vec<&str> = result.conflicts.iter().map(|c| c.ip_address.as_str()).collect();
        assert_eq!(addresses, vec!["10.0.0.120", "10.0.0.150"]);
        assert_eq!(result.conflicts[1].device_name.as_deref(), Some("printer"));
    }

    #[tokio::test]
    async fn test_validate_dhcp_range_ignores_untyped_rows() {
        let network = network_model("10.0.0.0/24");
        let mut untyped = allocation("10.0.0.140", "static", Some("legacy"));
        untyped.insert("ip_type", Value::from(None::<String>));
        let service = service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([vec![network.clone()]])
                .append_query_results([vec![untyped, allocation("10.0.0.160", "floating", None)]]),
        );

        let result = service
            .validate_dhcp_range(network.id, "10.0.0.100", "10.0.0.200")
            .await
            .unwrap();
        assert!(result.valid);
        assert_eq!(result.conflicts.len(), 1);
        assert_eq!(result.conflicts[0].ip_address, "10.0.0.160");
        assert_eq!(result.conflicts[0].ip_type.as_deref(), Some("floating"));
    }

    #[tokio::test]
    async fn test_validate_dhcp_range_without_cidr() {
        let mut network = network_model("10.0.0.0/24");
        network.network_address = Some("not-a-cidr".to_string());
        let service = service(
            MockDatabase::new(DatabaseBackend::Postgres).append_query_results([vec![network.clone()]]),
        );

        let result = service
            .validate_dhcp_range(network.id, "10.0.0.100", "10.0.0.200")
            .await
            .unwrap();
        assert!(!result.valid);
        assert_eq!(result.errors.len(), 1);
    }

    #[tokio::test]
    async fn test_ip_utilization() {
        let mut network = network_model("192.168.1.0/29");
        network.gateway = Some("192.168.1.6".to_string());
        let service = service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([vec![network.clone()]])
                .append_query_results([vec![allocation("192.168.1.2", "static", Some("nas"))]]),
        );

        let response = service.ip_utilization(network.id).await.unwrap();
        assert_eq!(response.ip_allocations.len(), 8);
        assert_eq!(response.subnet_info.allocated_count, 1);
        assert_eq!(response.subnet_info.reserved_count, 3);
        assert_eq!(response.subnet_info.available_count, 4);
        assert_eq!(response.subnet_info.calculation.subnet_mask, "255.255.255.248");

        let allocated = &response.ip_allocations[2];
        assert_eq!(allocated.status, SlotStatus::Allocated);
        assert_eq!(allocated.device_name.as_deref(), Some("nas"));
        assert!(response.ip_allocations[3].device_name.is_none());
    }

    #[tokio::test]
    async fn test_utilization_summary() {
        let mut network = network_model("10.0.0.0/24");
        network.dhcp_enabled = true;
        network.dhcp_range_start = Some("10.0.0.100".to_string());
        network.dhcp_range_end = Some("10.0.0.199".to_string());
        let service = service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([vec![network.clone()]])
                .append_query_results([vec![
                    allocation("10.0.0.10", "static", None),
                    allocation("10.0.0.11", "reserved", None),
                ]]),
        );

        let summary = service.utilization_summary(network.id).await.unwrap();
        assert_eq!(summary.allocated, 1);
        assert_eq!(summary.reserved, 1);
        assert_eq!(summary.dhcp_pool, 100);
        assert_eq!(summary.available, 152);
        assert_eq!(summary.total_hosts, 256);
    }
}
