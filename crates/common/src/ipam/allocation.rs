/// 地址分配核对
///
/// 将子网枚举结果与已分配地址、DHCP 地址池、网关/广播地址交叉比对，
/// 计算可用地址、逐地址状态以及利用率统计。

use serde::Serialize;
use std::collections::HashSet;
use std::net::Ipv4Addr;
use tracing::warn;

use super::cidr::{parse_ipv4, Cidr, MIN_ENUMERABLE_PREFIX};
use crate::errors::{Error, Result};
use crate::models::IpAddressType;
use crate::utils::round_one_decimal;

pub const NO_NETWORK_ADDRESS: &str = "Network does not have a network address defined";
pub const INVALID_NETWORK_ADDRESS: &str =
    "Invalid network address format. Must be in CIDR notation (e.g., 192.168.1.0/24)";
pub const SUBNET_TOO_LARGE: &str = "Subnet too large. Only /24 to /32 subnets are supported.";

/// 网络的寻址配置（networks 表中的相关字段）
#[derive(Debug, Clone, Copy, Default)]
pub struct NetworkAddressing<'a> {
    pub network_address: Option<&'a str>,
    pub gateway: Option<&'a str>,
    pub dhcp_enabled: bool,
    pub dhcp_range_start: Option<&'a str>,
    pub dhcp_range_end: Option<&'a str>,
}

impl<'a> NetworkAddressing<'a> {
    /// 解析网络的 CIDR，不限制子网大小
    pub fn parse_subnet(&self) -> Result<Cidr> {
        let address = self
            .network_address
            .filter(|a| !a.trim().is_empty())
            .ok_or_else(|| Error::InvalidArgument(NO_NETWORK_ADDRESS.to_string()))?;

        Cidr::parse(address).map_err(|_| Error::InvalidArgument(INVALID_NETWORK_ADDRESS.to_string()))
    }

    /// 解析网络的 CIDR，并要求子网可以被完整枚举（/24 到 /32）
    pub fn resolve_subnet(&self) -> Result<Cidr> {
        let subnet = self.parse_subnet()?;
        if subnet.prefix_len() < MIN_ENUMERABLE_PREFIX {
            return Err(Error::InvalidArgument(SUBNET_TOO_LARGE.to_string()));
        }
        Ok(subnet)
    }

    /// 启用了 DHCP 且两端都已配置时的地址池范围
    pub fn dhcp_range(&self) -> Option<DhcpRange> {
        if !self.dhcp_enabled {
            return None;
        }
        let (start, end) = (self.dhcp_range_start?, self.dhcp_range_end?);
        match (parse_ipv4(start), parse_ipv4(end)) {
            (Some(start), Some(end)) => Some(DhcpRange { start, end }),
            _ => {
                warn!("忽略无法解析的 DHCP 地址池: {} - {}", start, end);
                None
            }
        }
    }
}

/// DHCP 地址池（闭区间，数值比较）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DhcpRange {
    pub start: u32,
    pub end: u32,
}

impl DhcpRange {
    pub fn contains(&self, addr: u32) -> bool {
        self.start <= addr && addr <= self.end
    }

    pub fn start_addr(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.start)
    }

    pub fn end_addr(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.end)
    }

    /// 与子网重叠的地址数量
    pub fn overlap_with(&self, subnet: &Cidr) -> u64 {
        let lo = self.start.max(subnet.network());
        let hi = self.end.min(subnet.broadcast());
        if lo > hi {
            0
        } else {
            u64::from(hi - lo) + 1
        }
    }
}

/// 子网中永远不可分配的地址
#[derive(Debug, Clone, Copy)]
struct ReservedAddresses {
    network: u32,
    broadcast: u32,
    gateway: u32,
}

impl ReservedAddresses {
    /// 配置了网关且位于子网内时使用配置值，否则取子网第一个地址
    fn for_subnet(subnet: &Cidr, addressing: &NetworkAddressing<'_>) -> Self {
        let gateway = addressing
            .gateway
            .and_then(parse_ipv4)
            .filter(|gw| subnet.contains(*gw))
            .unwrap_or_else(|| subnet.network());

        Self {
            network: subnet.network(),
            broadcast: subnet.broadcast(),
            gateway,
        }
    }

    fn contains(&self, addr: u32) -> bool {
        addr == self.network || addr == self.broadcast || addr == self.gateway
    }
}

/// 将已分配地址字符串收集为数值集合，无法解析的（如 IPv6）被忽略
pub fn allocated_set<'a, I>(addresses: I) -> HashSet<u32>
where
    I: IntoIterator<Item = &'a str>,
{
    addresses.into_iter().filter_map(parse_ipv4).collect()
}

/// 可用地址条目
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AvailableIp {
    pub ip_address: String,
    pub is_gateway: bool,
    pub is_broadcast: bool,
}

/// 子网统计
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubnetInfo {
    pub network_address: String,
    pub cidr_notation: u8,
    pub total_hosts: u64,
    pub usable_hosts: u64,
    pub utilization_percent: f64,
}

/// 可用地址核对结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AvailabilityReport {
    pub available_ips: Vec<AvailableIp>,
    pub next_available: Option<String>,
    pub total_available: usize,
    pub subnet_info: SubnetInfo,
}

fn utilization_percent(allocated: u64, usable: u64) -> f64 {
    if usable == 0 {
        return 0.0;
    }
    round_one_decimal(allocated as f64 / usable as f64 * 100.0)
}

/// 网络整体利用率
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NetworkUtilization {
    pub allocated_count: u64,
    pub total_hosts: u64,
    pub utilization_percent: f64,
    #[serde(skip)]
    pub usable_hosts: u64,
}

impl NetworkUtilization {
    /// 未取整的占用比例，用于排序
    pub fn ratio(&self) -> f64 {
        if self.usable_hosts == 0 {
            return 0.0;
        }
        self.allocated_count as f64 / self.usable_hosts as f64
    }
}

/// 按已分配记录数计算网络利用率
///
/// /31 与 /32 没有网络地址和广播地址之分，全部地址都计入分母。
pub fn network_utilization(subnet: &Cidr, allocated_count: u64) -> NetworkUtilization {
    let total_hosts = subnet.host_count();
    let usable_hosts = if total_hosts > 2 { total_hosts - 2 } else { total_hosts };
    NetworkUtilization {
        allocated_count,
        total_hosts,
        utilization_percent: utilization_percent(allocated_count, usable_hosts),
        usable_hosts,
    }
}

/// 计算网络中的可用地址
///
/// 返回的列表按地址升序，截断到 `limit` 条；`total_available` 为截断前的总数。
pub fn find_available(
    addressing: &NetworkAddressing<'_>,
    allocated: &HashSet<u32>,
    limit: usize,
) -> Result<AvailabilityReport> {
    let subnet = addressing.resolve_subnet()?;
    let hosts = subnet.hosts()?;
    let reserved = ReservedAddresses::for_subnet(&subnet, addressing);
    let dhcp = addressing.dhcp_range();

    let mut available_ips = Vec::with_capacity(limit.min(hosts.len()));
    let mut total_available = 0;

    for ip in &hosts {
        let value = u32::from(*ip);
        if allocated.contains(&value)
            || reserved.contains(value)
            || dhcp.is_some_and(|range| range.contains(value))
        {
            continue;
        }

        total_available += 1;
        if available_ips.len() < limit {
            available_ips.push(AvailableIp {
                ip_address: ip.to_string(),
                is_gateway: value == reserved.gateway,
                is_broadcast: value == reserved.broadcast,
            });
        }
    }

    let allocated_count = allocated.iter().filter(|a| subnet.contains(**a)).count() as u64;
    let usable_hosts = subnet.usable_host_count();

    Ok(AvailabilityReport {
        next_available: available_ips.first().map(|ip| ip.ip_address.clone()),
        available_ips,
        total_available,
        subnet_info: SubnetInfo {
            network_address: addressing.network_address.unwrap_or_default().to_string(),
            cidr_notation: subnet.prefix_len(),
            total_hosts: subnet.host_count(),
            usable_hosts,
            utilization_percent: utilization_percent(allocated_count, usable_hosts),
        },
    })
}

/// 单个地址的使用状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotStatus {
    Allocated,
    Reserved,
    Dhcp,
    Available,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressSlot {
    pub address: Ipv4Addr,
    pub status: SlotStatus,
}

/// 子网逐地址状态图
#[derive(Debug, Clone)]
pub struct UtilizationMap {
    pub subnet: Cidr,
    pub slots: Vec<AddressSlot>,
    pub dhcp_range: Option<DhcpRange>,
    pub allocated_count: u64,
    pub reserved_count: u64,
    pub dhcp_count: u64,
    pub available_count: u64,
    pub utilization_percent: f64,
}

/// 为子网内每个地址标注状态，优先级: 已分配 > 保留 > DHCP > 可用
pub fn map_utilization(
    addressing: &NetworkAddressing<'_>,
    allocated: &HashSet<u32>,
) -> Result<UtilizationMap> {
    let subnet = addressing.resolve_subnet()?;
    let reserved = ReservedAddresses::for_subnet(&subnet, addressing);
    let dhcp_range = addressing.dhcp_range();

    let slots: Vec<AddressSlot> = subnet
        .hosts()?
        .into_iter()
        .map(|address| {
            let value = u32::from(address);
            let status = if allocated.contains(&value) {
                SlotStatus::Allocated
            } else if reserved.contains(value) {
                SlotStatus::Reserved
            } else if dhcp_range.is_some_and(|range| range.contains(value)) {
                SlotStatus::Dhcp
            } else {
                SlotStatus::Available
            };
            AddressSlot { address, status }
        })
        .collect();

    let count = |status: SlotStatus| slots.iter().filter(|s| s.status == status).count() as u64;
    let allocated_count = count(SlotStatus::Allocated);

    Ok(UtilizationMap {
        reserved_count: count(SlotStatus::Reserved),
        dhcp_count: count(SlotStatus::Dhcp),
        available_count: count(SlotStatus::Available),
        utilization_percent: utilization_percent(allocated_count, subnet.usable_host_count()),
        allocated_count,
        dhcp_range,
        slots,
        subnet,
    })
}

/// 按分配类型汇总的利用率
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UtilizationSummary {
    pub allocated: u64,
    pub dhcp_pool: u64,
    pub reserved: u64,
    pub available: u64,
    pub total_hosts: u64,
}

/// 汇总网络的地址使用情况
///
/// 只做算术计算，不枚举地址，因此对任意前缀长度都可用。
/// `allocation_types` 为该网络每条分配记录的 type 字段。
pub fn summarize<'a, I>(addressing: &NetworkAddressing<'_>, allocation_types: I) -> Result<UtilizationSummary>
where
    I: IntoIterator<Item = Option<&'a str>>,
{
    let subnet = addressing.parse_subnet()?;

    let (mut allocated, mut reserved) = (0u64, 0u64);
    for kind in allocation_types {
        if kind == Some(IpAddressType::Reserved.as_str()) {
            reserved += 1;
        } else {
            allocated += 1;
        }
    }

    let dhcp_pool = addressing
        .dhcp_range()
        .map(|range| range.overlap_with(&subnet))
        .unwrap_or(0);

    let available = subnet
        .usable_host_count()
        .saturating_sub(allocated)
        .saturating_sub(reserved)
        .saturating_sub(dhcp_pool);

    Ok(UtilizationSummary {
        allocated,
        dhcp_pool,
        reserved,
        available,
        total_hosts: subnet.host_count(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addressing(cidr: &str) -> NetworkAddressing<'_> {
        NetworkAddressing {
            network_address: Some(cidr),
            ..Default::default()
        }
    }

    #[test]
    fn test_empty_slash_24() {
        let report = find_available(&addressing("10.0.0.0/24"), &HashSet::new(), 50).unwrap();

        assert_eq!(report.total_available, 254);
        assert_eq!(report.available_ips.len(), 50);
        assert_eq!(report.next_available.as_deref(), Some("10.0.0.1"));
        assert_eq!(report.subnet_info.total_hosts, 256);
        assert_eq!(report.subnet_info.usable_hosts, 254);
        assert_eq!(report.subnet_info.utilization_percent, 0.0);
        assert_eq!(report.subnet_info.cidr_notation, 24);
    }

    #[test]
    fn test_network_and_broadcast_never_available() {
        for prefix in 24..=30u8 {
            let cidr = format!("192.168.5.0/{}", prefix);
            let report = find_available(&addressing(&cidr), &HashSet::new(), usize::MAX).unwrap();
            let hosts = Cidr::parse(&cidr).unwrap().hosts().unwrap();
            let first = hosts.first().unwrap().to_string();
            let last = hosts.last().unwrap().to_string();

            assert!(report.available_ips.iter().all(|ip| ip.ip_address != first && ip.ip_address != last));
            assert_eq!(report.total_available as u64, hosts.len() as u64 - 2);
        }
    }

    #[test]
    fn test_allocated_address_excluded() {
        let allocated = allocated_set(["10.0.0.5", "fe80::1"]);
        let report = find_available(&addressing("10.0.0.0/24"), &allocated, 300).unwrap();

        assert!(report.available_ips.iter().all(|ip| ip.ip_address != "10.0.0.5"));
        assert_eq!(report.total_available, 253);
        assert_eq!(report.subnet_info.utilization_percent, 0.4);
    }

    #[test]
    fn test_dhcp_range_is_numeric() {
        let network = NetworkAddressing {
            network_address: Some("10.0.0.0/24"),
            dhcp_enabled: true,
            dhcp_range_start: Some("10.0.0.9"),
            dhcp_range_end: Some("10.0.0.100"),
            ..Default::default()
        };
        let report = find_available(&network, &HashSet::new(), 300).unwrap();
        let ips: Vec<&str> = report.available_ips.iter().map(|ip| ip.ip_address.as_str()).collect();

        assert!(ips.contains(&"10.0.0.8"));
        assert!(!ips.contains(&"10.0.0.9"));
        assert!(!ips.contains(&"10.0.0.10"));
        assert!(!ips.contains(&"10.0.0.100"));
        assert!(ips.contains(&"10.0.0.101"));
        assert_eq!(report.total_available, 254 - 92);
    }

    #[test]
    fn test_dhcp_range_ignored_when_disabled() {
        let network = NetworkAddressing {
            network_address: Some("10.0.0.0/24"),
            dhcp_enabled: false,
            dhcp_range_start: Some("10.0.0.10"),
            dhcp_range_end: Some("10.0.0.20"),
            ..Default::default()
        };
        let report = find_available(&network, &HashSet::new(), 300).unwrap();
        assert_eq!(report.total_available, 254);
    }

    #[test]
    fn test_configured_gateway_excluded() {
        let network = NetworkAddressing {
            network_address: Some("10.0.0.0/24"),
            gateway: Some("10.0.0.1"),
            ..Default::default()
        };
        let report = find_available(&network, &HashSet::new(), 10).unwrap();
        assert_eq!(report.next_available.as_deref(), Some("10.0.0.2"));
        assert_eq!(report.total_available, 253);

        // 子网外的网关退回到首地址规则
        let network = NetworkAddressing {
            gateway: Some("192.168.0.1"),
            ..network
        };
        let report = find_available(&network, &HashSet::new(), 10).unwrap();
        assert_eq!(report.next_available.as_deref(), Some("10.0.0.1"));
        assert_eq!(report.total_available, 254);
    }

    #[test]
    fn test_limit_truncates_in_order() {
        let report = find_available(&addressing("10.0.0.0/24"), &HashSet::new(), 3).unwrap();
        let ips: Vec<&str> = report.available_ips.iter().map(|ip| ip.ip_address.as_str()).collect();
        assert_eq!(ips, vec!["10.0.0.1", "10.0.0.2", "10.0.0.3"]);
        assert!(report.available_ips.iter().all(|ip| !ip.is_gateway && !ip.is_broadcast));
    }

    #[test]
    fn test_resolve_errors() {
        let missing = NetworkAddressing::default();
        assert!(matches!(
            find_available(&missing, &HashSet::new(), 50),
            Err(Error::InvalidArgument(msg)) if msg == NO_NETWORK_ADDRESS
        ));

        assert!(matches!(
            find_available(&addressing("10.0.0/24"), &HashSet::new(), 50),
            Err(Error::InvalidArgument(msg)) if msg == INVALID_NETWORK_ADDRESS
        ));

        assert!(matches!(
            find_available(&addressing("10.0.0.0/23"), &HashSet::new(), 50),
            Err(Error::InvalidArgument(msg)) if msg == SUBNET_TOO_LARGE
        ));
    }

    #[test]
    fn test_tiny_subnets() {
        let report = find_available(&addressing("10.0.0.7/32"), &HashSet::new(), 50).unwrap();
        assert_eq!(report.total_available, 0);
        assert_eq!(report.next_available, None);
        assert_eq!(report.subnet_info.usable_hosts, 0);
        assert_eq!(report.subnet_info.utilization_percent, 0.0);

        let report = find_available(&addressing("10.0.0.6/31"), &HashSet::new(), 50).unwrap();
        assert_eq!(report.total_available, 0);
    }

    #[test]
    fn test_map_utilization() {
        let network = NetworkAddressing {
            network_address: Some("10.0.0.0/28"),
            gateway: Some("10.0.0.1"),
            dhcp_enabled: true,
            dhcp_range_start: Some("10.0.0.10"),
            dhcp_range_end: Some("10.0.0.12"),
            ..Default::default()
        };
        let allocated = allocated_set(["10.0.0.2", "10.0.0.11"]);
        let map = map_utilization(&network, &allocated).unwrap();

        assert_eq!(map.slots.len(), 16);
        assert_eq!(map.slots[0].status, SlotStatus::Reserved);
        assert_eq!(map.slots[1].status, SlotStatus::Reserved);
        assert_eq!(map.slots[2].status, SlotStatus::Allocated);
        assert_eq!(map.slots[11].status, SlotStatus::Allocated);
        assert_eq!(map.slots[10].status, SlotStatus::Dhcp);
        assert_eq!(map.slots[15].status, SlotStatus::Reserved);
        assert_eq!(map.allocated_count, 2);
        assert_eq!(map.reserved_count, 3);
        assert_eq!(map.dhcp_count, 2);
        assert_eq!(map.available_count, 9);
        assert_eq!(map.utilization_percent, 14.3);
    }

    #[test]
    fn test_summarize() {
        let network = NetworkAddressing {
            network_address: Some("10.0.0.0/24"),
            dhcp_enabled: true,
            dhcp_range_start: Some("10.0.0.100"),
            dhcp_range_end: Some("10.0.0.199"),
            ..Default::default()
        };
        let summary = summarize(&network, [Some("static"), None, Some("reserved"), Some("dhcp")]).unwrap();

        assert_eq!(summary.allocated, 3);
        assert_eq!(summary.reserved, 1);
        assert_eq!(summary.dhcp_pool, 100);
        assert_eq!(summary.available, 254 - 3 - 1 - 100);
        assert_eq!(summary.total_hosts, 256);
    }

    #[test]
    fn test_summarize_large_subnet() {
        let summary = summarize(&addressing("10.0.0.0/16"), std::iter::empty()).unwrap();
        assert_eq!(summary.total_hosts, 65536);
        assert_eq!(summary.available, 65534);
    }

    #[test]
    fn test_dhcp_overlap_clamped_to_subnet() {
        let subnet = Cidr::parse("10.0.0.0/24").unwrap();
        let range = DhcpRange { start: 0x0A00_00F0, end: 0x0A00_0110 };
        assert_eq!(range.overlap_with(&subnet), 16);
        let outside = DhcpRange { start: 0x0B00_0000, end: 0x0B00_0010 };
        assert_eq!(outside.overlap_with(&subnet), 0);
    }

    #[test]
    fn test_network_utilization() {
        let usage = network_utilization(&Cidr::parse("10.0.0.0/24").unwrap(), 127);
        assert_eq!(usage.total_hosts, 256);
        assert_eq!(usage.utilization_percent, 50.0);

        let usage = network_utilization(&Cidr::parse("10.0.0.0/30").unwrap(), 1);
        assert_eq!(usage.utilization_percent, 50.0);
        assert_eq!(usage.ratio(), 0.5);

        // /31 两个地址都可用
        let usage = network_utilization(&Cidr::parse("10.0.0.0/31").unwrap(), 1);
        assert_eq!(usage.utilization_percent, 50.0);
        let usage = network_utilization(&Cidr::parse("10.0.0.1/32").unwrap(), 1);
        assert_eq!(usage.utilization_percent, 100.0);
    }
}
