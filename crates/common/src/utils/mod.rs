/// 工具函数集合

use serde::{Deserialize, Deserializer};
use std::net::Ipv6Addr;

use crate::ipam::parse_ipv4;
use crate::models::IpVersion;

/// 保留一位小数
pub fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// 按版本校验 IP 地址格式，未指定版本时根据文本推断
pub fn validate_ip_address(address: &str, version: Option<IpVersion>) -> bool {
    match version.unwrap_or_else(|| IpVersion::detect(address)) {
        IpVersion::V4 => parse_ipv4(address).is_some(),
        IpVersion::V6 => address.parse::<Ipv6Addr>().is_ok(),
    }
}

/// 区分 "字段缺省" 与 "显式为 null" 的反序列化辅助
///
/// 配合 `#[serde(default, deserialize_with = "double_option")]` 使用：
/// 缺省 → None，null → Some(None)，有值 → Some(Some(v))
pub fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
