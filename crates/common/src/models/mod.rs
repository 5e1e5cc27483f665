/// 共享数据模型
///
/// 定义网络、IP 地址、接口、设备相关的枚举类型

use serde::{Deserialize, Serialize};

/// 网络类型
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NetworkType {
    Lan,
    Wan,
    Dmz,
    Guest,
    Management,
    Storage,
    Production,
    Broadcast,
}

impl NetworkType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NetworkType::Lan => "lan",
            NetworkType::Wan => "wan",
            NetworkType::Dmz => "dmz",
            NetworkType::Guest => "guest",
            NetworkType::Management => "management",
            NetworkType::Storage => "storage",
            NetworkType::Production => "production",
            NetworkType::Broadcast => "broadcast",
        }
    }
}

/// IP 版本
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum IpVersion {
    V4,
    V6,
}

impl IpVersion {
    pub fn as_str(&self) -> &'static str {
        match self {
            IpVersion::V4 => "v4",
            IpVersion::V6 => "v6",
        }
    }

    /// 根据地址文本推断版本（包含冒号视为 IPv6）
    pub fn detect(address: &str) -> Self {
        if address.contains(':') {
            IpVersion::V6
        } else {
            IpVersion::V4
        }
    }
}

impl From<String> for IpVersion {
    fn from(s: String) -> Self {
        match s.as_str() {
            "v6" => IpVersion::V6,
            _ => IpVersion::V4,
        }
    }
}

/// IP 分配类型
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum IpAddressType {
    Static,
    Dhcp,
    Reserved,
    Floating,
}

impl IpAddressType {
    pub fn as_str(&self) -> &'static str {
        match self {
            IpAddressType::Static => "static",
            IpAddressType::Dhcp => "dhcp",
            IpAddressType::Reserved => "reserved",
            IpAddressType::Floating => "floating",
        }
    }
}

/// 拓扑节点状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TopologyNodeStatus {
    Active,
    Inactive,
    Unknown,
}

impl From<&str> for TopologyNodeStatus {
    /// 设备状态映射: active → active, retired/repair/storage → inactive
    fn from(s: &str) -> Self {
        match s {
            "active" => TopologyNodeStatus::Active,
            "retired" | "repair" | "storage" => TopologyNodeStatus::Inactive,
            _ => TopologyNodeStatus::Unknown,
        }
    }
}

/// 常量定义
pub mod constants {
    /// 默认 Server 端口
    pub const DEFAULT_SERVER_PORT: u16 = 3000;

    /// 可用 IP 列表默认返回数量
    pub const DEFAULT_AVAILABLE_IPS_LIMIT: usize = 50;

    /// 利用率排行默认返回数量
    pub const DEFAULT_TOP_UTILIZED_LIMIT: usize = 10;

    /// 响应缓存默认容量
    pub const DEFAULT_CACHE_CAPACITY: usize = 1000;

    /// 响应缓存默认过期时间（秒）
    pub const DEFAULT_CACHE_TTL_SECS: u64 = 60;

    /// 过期缓存清理间隔（秒）
    pub const DEFAULT_CACHE_CLEANUP_INTERVAL_SECS: u64 = 300;
}
