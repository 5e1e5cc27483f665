/// IP 地址冲突检测
///
/// 三类冲突：同一地址被多条记录占用、地址不在所属网络的 CIDR 内、
/// 非 DHCP 地址落在网络的 DHCP 地址池中。地址一律按数值比较。

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;
use uuid::Uuid;

use super::cidr::{parse_ipv4, Cidr};
use crate::models::IpAddressType;

/// 冲突类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    Duplicate,
    OutOfRange,
    Dhcp,
}

impl ConflictKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Duplicate => "duplicate",
            Self::OutOfRange => "out_of_range",
            Self::Dhcp => "dhcp",
        }
    }
}

impl FromStr for ConflictKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "duplicate" => Ok(Self::Duplicate),
            "out_of_range" => Ok(Self::OutOfRange),
            "dhcp" => Ok(Self::Dhcp),
            other => Err(format!(
                "Invalid conflict type '{}'. Must be one of: duplicate, out_of_range, dhcp",
                other
            )),
        }
    }
}

impl fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 一条地址记录及其所属接口、设备、网络
#[derive(Debug, Clone, Default)]
pub struct AssignmentRecord {
    pub ip_id: Uuid,
    pub ip_address: String,
    pub ip_type: Option<String>,
    pub io_id: Option<Uuid>,
    pub device_id: Option<Uuid>,
    pub device_name: Option<String>,
    pub network_id: Option<Uuid>,
    pub network_name: Option<String>,
    pub network_address: Option<String>,
    pub dhcp_enabled: bool,
    pub dhcp_range_start: Option<String>,
    pub dhcp_range_end: Option<String>,
}

/// 重复地址中的一条占用
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateAssignment {
    pub ip_id: Uuid,
    pub io_id: Option<Uuid>,
    pub device_id: Option<Uuid>,
    pub device_name: Option<String>,
    pub network_id: Option<Uuid>,
    pub network_name: Option<String>,
}

impl From<&AssignmentRecord> for DuplicateAssignment {
    fn from(record: &AssignmentRecord) -> Self {
        Self {
            ip_id: record.ip_id,
            io_id: record.io_id,
            device_id: record.device_id,
            device_name: record.device_name.clone(),
            network_id: record.network_id,
            network_name: record.network_name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IpConflict {
    Duplicate {
        ip_address: String,
        conflict_count: usize,
        assignments: Vec<DuplicateAssignment>,
    },
    OutOfRange {
        ip_id: Uuid,
        ip_address: String,
        network_id: Option<Uuid>,
        network_name: Option<String>,
        network_address: String,
        device_id: Option<Uuid>,
        device_name: Option<String>,
    },
    Dhcp {
        ip_id: Uuid,
        ip_address: String,
        network_id: Option<Uuid>,
        network_name: Option<String>,
        dhcp_range_start: String,
        dhcp_range_end: String,
        device_id: Option<Uuid>,
        device_name: Option<String>,
        assignment_type: String,
    },
}

impl IpConflict {
    pub fn kind(&self) -> ConflictKind {
        match self {
            Self::Duplicate { .. } => ConflictKind::Duplicate,
            Self::OutOfRange { .. } => ConflictKind::OutOfRange,
            Self::Dhcp { .. } => ConflictKind::Dhcp,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConflictSummary {
    pub total_conflicts: usize,
    pub duplicate_count: usize,
    pub out_of_range_count: usize,
    pub dhcp_conflict_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConflictReport {
    pub conflicts: Vec<IpConflict>,
    pub summary: ConflictSummary,
}

/// 排序与分组用的地址键，可解析的 IPv4 排在其他格式之前
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum AddressKey {
    V4(u32),
    Other(String),
}

impl AddressKey {
    fn of(address: &str) -> Self {
        let address = address.trim();
        match parse_ipv4(address) {
            Some(value) => Self::V4(value),
            None => Self::Other(address.to_ascii_lowercase()),
        }
    }

    fn display(&self) -> String {
        match self {
            Self::V4(value) => Ipv4Addr::from(*value).to_string(),
            Self::Other(address) => address.clone(),
        }
    }
}

/// 同一地址出现在多条记录中
///
/// 按占用数降序，数量相同时按地址升序。
pub fn find_duplicates(records: &[AssignmentRecord]) -> Vec<IpConflict> {
    let mut groups: BTreeMap<AddressKey, Vec<&AssignmentRecord>> = BTreeMap::new();
    for record in records {
        groups.entry(AddressKey::of(&record.ip_address)).or_default().push(record);
    }

    let mut duplicates: Vec<IpConflict> = groups
        .into_iter()
        .filter(|(_, group)| group.len() > 1)
        .map(|(key, group)| IpConflict::Duplicate {
            ip_address: key.display(),
            conflict_count: group.len(),
            assignments: group.into_iter().map(DuplicateAssignment::from).collect(),
        })
        .collect();

    // 稳定排序保留地址顺序
    duplicates.sort_by_key(|conflict| match conflict {
        IpConflict::Duplicate { conflict_count, .. } => std::cmp::Reverse(*conflict_count),
        _ => std::cmp::Reverse(0),
    });
    duplicates
}

/// 地址不在所属网络的 CIDR 内
///
/// 网络没有 CIDR 或 CIDR 无法解析时跳过；地址本身无法解析视为越界。
pub fn find_out_of_range(records: &[AssignmentRecord]) -> Vec<IpConflict> {
    let mut found: Vec<(AddressKey, IpConflict)> = records
        .iter()
        .filter_map(|record| {
            let network_address = record.network_address.as_deref()?;
            let subnet = Cidr::parse(network_address).ok()?;
            let inside = parse_ipv4(record.ip_address.trim()).is_some_and(|value| subnet.contains(value));
            if inside {
                return None;
            }
            Some((
                AddressKey::of(&record.ip_address),
                IpConflict::OutOfRange {
                    ip_id: record.ip_id,
                    ip_address: record.ip_address.clone(),
                    network_id: record.network_id,
                    network_name: record.network_name.clone(),
                    network_address: network_address.to_string(),
                    device_id: record.device_id,
                    device_name: record.device_name.clone(),
                },
            ))
        })
        .collect();

    found.sort_by(|a, b| a.0.cmp(&b.0));
    found.into_iter().map(|(_, conflict)| conflict).collect()
}

/// 非 DHCP 地址落在已启用的 DHCP 地址池中
///
/// 未标注类型的记录不参与判断，地址池端点无法解析的网络跳过。
pub fn find_dhcp_conflicts(records: &[AssignmentRecord]) -> Vec<IpConflict> {
    let mut found: Vec<(u32, IpConflict)> = records
        .iter()
        .filter(|record| record.dhcp_enabled)
        .filter_map(|record| {
            let assignment_type = record
                .ip_type
                .as_deref()
                .filter(|t| *t != IpAddressType::Dhcp.as_str())?;
            let start = record.dhcp_range_start.as_deref()?;
            let end = record.dhcp_range_end.as_deref()?;
            let (low, high) = (parse_ipv4(start.trim())?, parse_ipv4(end.trim())?);
            let value = parse_ipv4(record.ip_address.trim())?;
            if value < low || value > high {
                return None;
            }
            Some((
                value,
                IpConflict::Dhcp {
                    ip_id: record.ip_id,
                    ip_address: record.ip_address.clone(),
                    network_id: record.network_id,
                    network_name: record.network_name.clone(),
                    dhcp_range_start: start.to_string(),
                    dhcp_range_end: end.to_string(),
                    device_id: record.device_id,
                    device_name: record.device_name.clone(),
                    assignment_type: assignment_type.to_string(),
                },
            ))
        })
        .collect();

    found.sort_by_key(|(value, _)| *value);
    found.into_iter().map(|(_, conflict)| conflict).collect()
}

/// 检测冲突，`kind` 为空时检测全部类别
///
/// 结果依次为重复、越界、DHCP 冲突。
pub fn detect_conflicts(records: &[AssignmentRecord], kind: Option<ConflictKind>) -> ConflictReport {
    let wanted = |k: ConflictKind| kind.map_or(true, |only| only == k);

    let mut conflicts = Vec::new();
    if wanted(ConflictKind::Duplicate) {
        conflicts.extend(find_duplicates(records));
    }
    if wanted(ConflictKind::OutOfRange) {
        conflicts.extend(find_out_of_range(records));
    }
    if wanted(ConflictKind::Dhcp) {
        conflicts.extend(find_dhcp_conflicts(records));
    }

    let count = |k: ConflictKind| conflicts.iter().filter(|c| c.kind() == k).count();
    let summary = ConflictSummary {
        total_conflicts: conflicts.len(),
        duplicate_count: count(ConflictKind::Duplicate),
        out_of_range_count: count(ConflictKind::OutOfRange),
        dhcp_conflict_count: count(ConflictKind::Dhcp),
    };

    ConflictReport { conflicts, summary }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u128) -> Uuid {
        Uuid::from_u128(n)
    }

    fn record(n: u128, address: &str, ip_type: Option<&str>) -> AssignmentRecord {
        AssignmentRecord {
            ip_id: id(n),
            ip_address: address.to_string(),
            ip_type: ip_type.map(str::to_string),
            network_id: Some(id(1000)),
            network_name: Some("office".to_string()),
            network_address: Some("10.0.0.0/24".to_string()),
            ..Default::default()
        }
    }

    fn with_pool(mut record: AssignmentRecord, start: &str, end: &str) -> AssignmentRecord {
        record.dhcp_enabled = true;
        record.dhcp_range_start = Some(start.to_string());
        record.dhcp_range_end = Some(end.to_string());
        record
    }

    #[test]
    fn test_conflict_kind_parse() {
        assert_eq!("out_of_range".parse::<ConflictKind>(), Ok(ConflictKind::OutOfRange));
        assert_eq!("dhcp".parse::<ConflictKind>(), Ok(ConflictKind::Dhcp));
        assert!("static".parse::<ConflictKind>().is_err());
        assert_eq!(ConflictKind::Duplicate.to_string(), "duplicate");
    }

    #[test]
    fn test_duplicates_grouped_numerically() {
        let mut other = record(3, "10.0.0.5", Some("static"));
        other.device_name = Some("printer".to_string());
        let records = vec![
            record(1, "10.0.0.5", Some("static")),
            record(2, "010.000.000.005", Some("dhcp")),
            other,
            record(4, "10.0.0.9", Some("static")),
            record(5, "10.0.0.9", Some("static")),
            record(6, "10.0.0.20", Some("static")),
        ];

        let duplicates = find_duplicates(&records);
        assert_eq!(duplicates.len(), 2);
        match &duplicates[0] {
            IpConflict::Duplicate {
                ip_address,
                conflict_count,
                assignments,
            } => {
                assert_eq!(ip_address, "10.0.0.5");
                assert_eq!(*conflict_count, 3);
                assert_eq!(assignments[2].device_name.as_deref(), Some("printer"));
            }
            other => panic!("unexpected conflict: {:?}", other),
        }
        assert!(matches!(&duplicates[1], IpConflict::Duplicate { ip_address, .. } if ip_address == "10.0.0.9"));
    }

    #[test]
    fn test_out_of_range() {
        let mut no_cidr = record(4, "192.168.0.1", Some("static"));
        no_cidr.network_address = None;
        let mut bad_cidr = record(5, "192.168.0.2", Some("static"));
        bad_cidr.network_address = Some("10.0.0.0".to_string());

        let records = vec![
            record(1, "10.0.1.20", Some("static")),
            record(2, "10.0.0.20", Some("static")),
            record(3, "10.0.0.300", Some("static")),
            record(6, "9.255.255.255", Some("static")),
            no_cidr,
            bad_cidr,
        ];

        let found = find_out_of_range(&records);
        let addresses: Vec<&str> = found
            .iter()
            .map(|c| match c {
                IpConflict::OutOfRange { ip_address, .. } => ip_address.as_str(),
                _ => "",
            })
            .collect();
        assert_eq!(addresses, vec!["9.255.255.255", "10.0.1.20", "10.0.0.300"]);
    }

    #[test]
    fn test_dhcp_conflicts_compare_numerically() {
        let mut disabled = with_pool(record(5, "10.0.0.150", Some("static")), "10.0.0.100", "10.0.0.200");
        disabled.dhcp_enabled = false;

        let records = vec![
            with_pool(record(1, "10.0.0.150", Some("static")), "10.0.0.100", "10.0.0.200"),
            with_pool(record(2, "10.0.0.120", Some("dhcp")), "10.0.0.100", "10.0.0.200"),
            with_pool(record(3, "10.0.0.99", Some("reserved")), "10.0.0.100", "10.0.0.200"),
            with_pool(record(4, "10.0.0.130", None), "10.0.0.100", "10.0.0.200"),
            // 字符串比较会认为 10.0.0.20 在 10.0.0.100 之后
            with_pool(record(6, "10.0.0.20", Some("static")), "10.0.0.100", "10.0.0.200"),
            with_pool(record(7, "10.0.0.101", Some("floating")), "10.0.0.100", "10.0.0.200"),
            disabled,
        ];

        let found = find_dhcp_conflicts(&records);
        assert_eq!(found.len(), 2);
        match &found[0] {
            IpConflict::Dhcp {
                ip_address,
                assignment_type,
                dhcp_range_start,
                ..
            } => {
                assert_eq!(ip_address, "10.0.0.101");
                assert_eq!(assignment_type, "floating");
                assert_eq!(dhcp_range_start, "10.0.0.100");
            }
            other => panic!("unexpected conflict: {:?}", other),
        }
        assert_eq!(found[1].kind(), ConflictKind::Dhcp);
    }

    #[test]
    fn test_detect_conflicts_summary_and_filter() {
        let records = vec![
            record(1, "10.0.0.5", Some("static")),
            record(2, "10.0.0.5", Some("static")),
            record(3, "10.0.9.1", Some("static")),
            with_pool(record(4, "10.0.0.150", Some("static")), "10.0.0.100", "10.0.0.200"),
        ];

        let report = detect_conflicts(&records, None);
        assert_eq!(
            report.summary,
            ConflictSummary {
                total_conflicts: 3,
                duplicate_count: 1,
                out_of_range_count: 1,
                dhcp_conflict_count: 1,
            }
        );
        let kinds: Vec<ConflictKind> = report.conflicts.iter().map(IpConflict::kind).collect();
        assert_eq!(kinds, vec![ConflictKind::Duplicate, ConflictKind::OutOfRange, ConflictKind::Dhcp]);

        let report = detect_conflicts(&records, Some(ConflictKind::OutOfRange));
        assert_eq!(report.summary.total_conflicts, 1);
        assert_eq!(report.summary.duplicate_count, 0);

        assert_eq!(detect_conflicts(&[], None).summary, ConflictSummary::default());
    }

    #[test]
    fn test_conflict_serialization() {
        let conflict = find_out_of_range(&[record(1, "10.0.1.1", Some("static"))]).remove(0);
        let json = serde_json::to_value(&conflict).unwrap();
        assert_eq!(json["type"], "out_of_range");
        assert_eq!(json["network_address"], "10.0.0.0/24");
    }
}
