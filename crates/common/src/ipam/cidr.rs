/// CIDR 解析、子网枚举与成员判断
///
/// 子网运算交给 ipnetwork，对外仍以 u32 表示地址，只在边界处格式化为点分十进制

use ipnetwork::Ipv4Network;
use serde::Serialize;
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;
use thiserror::Error;

/// 调用方允许枚举的最小前缀长度（/24 及更小的子网）
pub const MIN_ENUMERABLE_PREFIX: u8 = 24;

/// 枚举器自身接受的最小前缀长度，防止一次生成过多地址
pub const ENUMERATION_FLOOR_PREFIX: u8 = 16;

/// CIDR 错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CidrError {
    #[error("Invalid CIDR notation: {0}")]
    InvalidNotation(String),

    #[error("Invalid IPv4 address: {0}")]
    InvalidAddress(String),

    #[error("Invalid prefix length: {0} (must be 0-32)")]
    InvalidPrefixLength(String),

    #[error("Subnet /{0} is too large to enumerate")]
    RangeTooLarge(u8),
}

/// 解析点分十进制 IPv4 地址
///
/// 每段 1-3 位十进制数字且不超过 255，与前端表单的校验规则一致（允许前导零）。
pub fn parse_ipv4(s: &str) -> Option<u32> {
    let mut parts = s.split('.');
    let mut value: u32 = 0;

    for _ in 0..4 {
        let part = parts.next()?;
        if part.is_empty() || part.len() > 3 || !part.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let octet: u32 = part.parse().ok()?;
        if octet > 255 {
            return None;
        }
        value = (value << 8) | octet;
    }

    if parts.next().is_some() {
        return None;
    }

    Some(value)
}

/// CIDR 块
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Cidr {
    /// 保留书写时的基地址（未做掩码）
    net: Ipv4Network,
}

impl Cidr {
    pub fn new(base: u32, prefix_len: u8) -> Result<Self, CidrError> {
        let net = Ipv4Network::new(Ipv4Addr::from(base), prefix_len)
            .map_err(|_| CidrError::InvalidPrefixLength(prefix_len.to_string()))?;
        Ok(Self { net })
    }

    /// 解析 "A.B.C.D/N" 格式
    pub fn parse(s: &str) -> Result<Self, CidrError> {
        let s = s.trim();
        let (addr, prefix) = s
            .split_once('/')
            .ok_or_else(|| CidrError::InvalidNotation(s.to_string()))?;

        let base = parse_ipv4(addr).ok_or_else(|| CidrError::InvalidAddress(addr.to_string()))?;

        if prefix.is_empty() || !prefix.bytes().all(|b| b.is_ascii_digit()) {
            return Err(CidrError::InvalidPrefixLength(prefix.to_string()));
        }
        let prefix_len: u8 = prefix
            .parse()
            .map_err(|_| CidrError::InvalidPrefixLength(prefix.to_string()))?;

        Self::new(base, prefix_len)
    }

    pub fn base(&self) -> u32 {
        u32::from(self.net.ip())
    }

    pub fn prefix_len(&self) -> u8 {
        self.net.prefix()
    }

    pub fn mask(&self) -> u32 {
        u32::from(self.net.mask())
    }

    /// 网络地址（主机位全 0）
    pub fn network(&self) -> u32 {
        u32::from(self.net.network())
    }

    /// 广播地址（主机位全 1）
    pub fn broadcast(&self) -> u32 {
        u32::from(self.net.broadcast())
    }

    pub fn network_addr(&self) -> Ipv4Addr {
        self.net.network()
    }

    pub fn broadcast_addr(&self) -> Ipv4Addr {
        self.net.broadcast()
    }

    /// 子网地址总数 2^(32-N)
    pub fn host_count(&self) -> u64 {
        // /0 的地址数超出 u32
        match self.net.prefix() {
            0 => 1u64 << 32,
            _ => u64::from(self.net.size()),
        }
    }

    /// 可用主机数（去掉网络地址和广播地址）
    pub fn usable_host_count(&self) -> u64 {
        self.host_count().saturating_sub(2)
    }

    pub fn contains(&self, addr: u32) -> bool {
        self.net.contains(Ipv4Addr::from(addr))
    }

    /// 枚举子网内全部地址（网络地址到广播地址）
    pub fn hosts(&self) -> Result<Vec<Ipv4Addr>, CidrError> {
        enumerate_subnet(self.base(), self.prefix_len())
    }

    /// 计算子网信息
    ///
    /// /31 与 /32 没有可用主机，首末可用地址为空。
    pub fn calculate(&self) -> SubnetCalculation {
        let usable_hosts = self.usable_host_count();
        let (first_usable_ip, last_usable_ip) = if usable_hosts == 0 {
            (None, None)
        } else {
            (
                Some(Ipv4Addr::from(self.network() + 1).to_string()),
                Some(Ipv4Addr::from(self.broadcast() - 1).to_string()),
            )
        };
        let [first_octet, ..] = self.net.ip().octets();

        SubnetCalculation {
            network_address: self.network_addr().to_string(),
            broadcast_address: self.broadcast_addr().to_string(),
            cidr_notation: self.prefix_len(),
            subnet_mask: self.net.mask().to_string(),
            wildcard_mask: Ipv4Addr::from(!self.mask()).to_string(),
            first_usable_ip,
            last_usable_ip,
            total_hosts: self.host_count(),
            usable_hosts,
            ip_class: ip_class(first_octet),
            is_private: self.net.ip().is_private(),
        }
    }
}

impl FromStr for Cidr {
    type Err = CidrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Cidr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network_addr(), self.prefix_len())
    }
}

/// 子网计算结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubnetCalculation {
    pub network_address: String,
    pub broadcast_address: String,
    pub cidr_notation: u8,
    pub subnet_mask: String,
    pub wildcard_mask: String,
    pub first_usable_ip: Option<String>,
    pub last_usable_ip: Option<String>,
    pub total_hosts: u64,
    pub usable_hosts: u64,
    pub ip_class: char,
    pub is_private: bool,
}

/// 按首字节划分地址类别
fn ip_class(first_octet: u8) -> char {
    match first_octet {
        1..=126 => 'A',
        128..=191 => 'B',
        192..=223 => 'C',
        224..=239 => 'D',
        _ => 'E',
    }
}

/// 枚举子网内的全部地址，升序，包含网络地址与广播地址
pub fn enumerate_subnet(base: u32, prefix_len: u8) -> Result<Vec<Ipv4Addr>, CidrError> {
    let net = Ipv4Network::new(Ipv4Addr::from(base), prefix_len)
        .map_err(|_| CidrError::InvalidPrefixLength(prefix_len.to_string()))?;
    if prefix_len < ENUMERATION_FLOOR_PREFIX {
        return Err(CidrError::RangeTooLarge(prefix_len));
    }

    Ok(net.iter().collect())
}

/// 判断候选地址是否位于 (网络地址, 前缀) 描述的子网内
///
/// 任意一方无法解析时返回 false。
pub fn is_ip_in_network(candidate: &str, network: &str, prefix_len: u8) -> bool {
    match (parse_ipv4(candidate), parse_ipv4(network)) {
        (Some(ip), Some(net)) => Ipv4Network::new(Ipv4Addr::from(net), prefix_len)
            .map(|net| net.contains(Ipv4Addr::from(ip)))
            .unwrap_or(false),
        _ => false,
    }
}
