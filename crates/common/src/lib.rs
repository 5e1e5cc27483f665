/// M.O.S.S. - 公共库
/// 
/// 提供 IP 地址管理、拓扑图构建、响应缓存以及共享的类型、错误处理、工具函数

pub mod cache;
pub mod errors;
pub mod ipam;
pub mod models;
pub mod topology;
pub mod utils;

// 重新导出常用类型
pub use cache::ResponseCache;
pub use errors::{Error, Result};
pub use ipam::{Cidr, CidrError};
