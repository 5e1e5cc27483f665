/// 数据库实体

pub mod device;
pub mod io;
pub mod io_tagged_network;
pub mod ip_address;
pub mod location;
pub mod network;
