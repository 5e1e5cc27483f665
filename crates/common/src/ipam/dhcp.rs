/// DHCP 地址池与网络配置校验
///
/// 这些检查同时用于 validate-dhcp-range 接口和网络的写入路径

use super::allocation::{DhcpRange, NetworkAddressing};
use super::cidr::{parse_ipv4, Cidr};

/// DHCP 地址池校验结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DhcpRangeCheck {
    pub errors: Vec<String>,
    /// 两端均可解析且起始地址小于结束地址时给出
    pub range: Option<DhcpRange>,
}

impl DhcpRangeCheck {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// 校验一段 DHCP 地址池
///
/// `subnet` 为空时只检查地址格式和先后顺序。
pub fn check_dhcp_range(subnet: Option<&Cidr>, start: &str, end: &str) -> DhcpRangeCheck {
    let mut errors = Vec::new();

    let mut endpoint = |label: &str, text: &str| -> Option<u32> {
        let Some(value) = parse_ipv4(text) else {
            errors.push(format!("{} IP {} is not a valid IPv4 address", label, text));
            return None;
        };
        if let Some(subnet) = subnet {
            if !subnet.contains(value) {
                errors.push(format!("{} IP {} is not within subnet {}", label, text, subnet));
            }
        }
        Some(value)
    };

    let start_value = endpoint("Start", start);
    let end_value = endpoint("End", end);

    let range = match (start_value, end_value) {
        (Some(start), Some(end)) if start < end => Some(DhcpRange { start, end }),
        (Some(_), Some(_)) => {
            errors.push("Start IP must be less than end IP".to_string());
            None
        }
        _ => None,
    };

    DhcpRangeCheck { errors, range }
}

/// 网络写入前的一致性检查
///
/// - network_address 必须是合法 CIDR
/// - gateway 必须是合法 IPv4 且位于子网内
/// - 启用 DHCP 时地址池两端都必须配置，且位于子网内、起始小于结束
pub fn check_network_settings(addressing: &NetworkAddressing<'_>) -> Vec<String> {
    let mut errors = Vec::new();

    let subnet = match addressing.network_address.filter(|a| !a.trim().is_empty()) {
        Some(address) => match Cidr::parse(address) {
            Ok(subnet) => Some(subnet),
            Err(e) => {
                errors.push(format!("Invalid network address {}: {}", address, e));
                None
            }
        },
        None => None,
    };

    if let Some(gateway) = addressing.gateway.filter(|g| !g.trim().is_empty()) {
        match (parse_ipv4(gateway), subnet) {
            (None, _) => errors.push(format!("Gateway {} is not a valid IPv4 address", gateway)),
            (Some(value), Some(subnet)) if !subnet.contains(value) => {
                errors.push(format!("Gateway {} is not within subnet {}", gateway, subnet))
            }
            _ => {}
        }
    }

    if addressing.dhcp_enabled {
        match (addressing.dhcp_range_start, addressing.dhcp_range_end) {
            (Some(start), Some(end)) => {
                errors.extend(check_dhcp_range(subnet.as_ref(), start, end).errors);
            }
            _ => errors.push("DHCP is enabled but the DHCP range start and end are not both set".to_string()),
        }
    }

    errors
}
