//! # error 模块说明
//!
//! ## 角色定位（Why）
//! - 汇总设备层的失败：参数非法、配置已封存、会话不存在，以及透传的缓冲错误；
//! - 通过 `From<EchoError>` 让会话分发路径直接用 `?` 传播缓冲错误。

use reflect_core::EchoError;
use thiserror::Error;

use crate::SessionId;

/// 设备层错误域。
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DeviceError {
    /// 参数校验失败，`name` 为出错的参数名。
    #[error("invalid device parameter `{name}`: {reason}")]
    InvalidParams {
        name: &'static str,
        reason: &'static str,
    },

    /// 参数文本无法解析。
    #[error("failed to parse device parameters: {0}")]
    ParamsSyntax(#[from] toml::de::Error),

    /// 已有会话打开过，缓冲大小不再允许修改。
    #[error("buffer size is sealed once the first session has been opened")]
    ConfigurationSealed,

    /// 会话不存在或已关闭。
    #[error("{0} is not an open session")]
    UnknownSession(SessionId),

    /// 缓冲层返回的错误。
    #[error(transparent)]
    Buffer(#[from] EchoError),
}

impl DeviceError {
    /// 字符设备语义下的 errno（正值）。
    ///
    /// 参数与配置错误对应 `EINVAL`/`EBUSY`，未知会话对应 `EBADF`。
    pub fn errno(&self) -> i32 {
        match self {
            DeviceError::InvalidParams { .. } | DeviceError::ParamsSyntax(_) => EINVAL,
            DeviceError::ConfigurationSealed => EBUSY,
            DeviceError::UnknownSession(_) => EBADF,
            DeviceError::Buffer(err) => err.errno(),
        }
    }

    /// 若为缓冲层错误，返回其原始值。
    pub fn as_buffer_error(&self) -> Option<EchoError> {
        match self {
            DeviceError::Buffer(err) => Some(*err),
            _ => None,
        }
    }
}

const EBADF: i32 = 9;
const EBUSY: i32 = 16;
const EINVAL: i32 = 22;
