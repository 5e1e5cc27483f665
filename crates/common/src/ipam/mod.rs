/// IP 地址管理
///
/// 纯计算逻辑，不访问数据库：CIDR 解析、子网枚举、成员判断、
/// 可用地址核对、DHCP 地址池校验、冲突检测

pub mod allocation;
pub mod cidr;
pub mod conflicts;
pub mod dhcp;

pub use allocation::{
    allocated_set, find_available, map_utilization, network_utilization, summarize, AvailabilityReport,
    AvailableIp, DhcpRange, NetworkAddressing, NetworkUtilization, SlotStatus, SubnetInfo, UtilizationMap,
    UtilizationSummary,
};
pub use cidr::{
    enumerate_subnet, is_ip_in_network, parse_ipv4, Cidr, CidrError,
    SubnetCalculation,
};
pub use conflicts::{detect_conflicts, AssignmentRecord, ConflictKind, ConflictReport, IpConflict};
pub use dhcp::{check_dhcp_range, check_network_settings, DhcpRangeCheck};
