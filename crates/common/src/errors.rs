use thiserror::Error;

use crate::ipam::CidrError;

/// 统一错误类型
#[derive(Error, Debug)]
pub enum Error {
    #[error("{0}")]
    InvalidArgument(String),

    #[error("{0}")]
    Cidr(#[from] CidrError),
}

impl Error {
    /// 是否属于客户端错误（参数、格式、地址范围）
    pub fn is_client_error(&self) -> bool {
        matches!(self, Error::InvalidArgument(_) | Error::Cidr(_))
    }
}

/// 统一结果类型
pub type Result<T> = std::result::Result<T, Error>;
