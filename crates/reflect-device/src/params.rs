//! 设备参数。
//!
//! ### 设计目的（Why）
//! - 对应字符设备的模块参数：缓冲大小在加载时给定，默认 1024 字节，必须非零；
//! - 额外暴露取消检查粒度与部分读取策略，二者都只影响新打开的会话。
//!
//! ### 契约说明（What）
//! - 以 TOML 表达，未知字段被拒绝，缺省字段取默认值；
//! - [`ReflectParams::validate`] 是注册设备前的唯一校验入口。

use core::time::Duration;

use reflect_core::{BufferOptions, Capacity, PartialReadPolicy};
use serde::Deserialize;

use crate::DeviceError;

/// 部分读取策略的配置形态。
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartialRead {
    /// 剩余字节留在原偏移，下一次读取从存储区开头开始。
    #[default]
    Rewind,
    /// 剩余字节前移，下一次读取得到逻辑上剩下的部分。
    Consume,
}

impl From<PartialRead> for PartialReadPolicy {
    fn from(value: PartialRead) -> Self {
        match value {
            PartialRead::Rewind => PartialReadPolicy::Rewind,
            PartialRead::Consume => PartialReadPolicy::Consume,
        }
    }
}

/// 设备参数集合。
///
/// ```
/// use reflect_device::{PartialRead, ReflectParams};
///
/// let params = ReflectParams::from_toml_str("buffer_size = 64\npartial_read = \"consume\"")
///     .expect("参数合法");
/// assert_eq!(params.buffer_size, 64);
/// assert_eq!(params.partial_read, PartialRead::Consume);
/// assert_eq!(params.wait_slice_ms, 10);
/// ```
#[derive(Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReflectParams {
    pub buffer_size: usize,
    pub wait_slice_ms: u64,
    pub partial_read: PartialRead,
}

impl ReflectParams {
    pub const DEFAULT_BUFFER_SIZE: usize = 1024;
    pub const DEFAULT_WAIT_SLICE_MS: u64 = 10;
    /// 抢锁时检查取消的最长间隔。
    pub const MAX_WAIT_SLICE_MS: u64 = 1000;

    /// 解析并校验 TOML 文本。
    pub fn from_toml_str(text: &str) -> Result<Self, DeviceError> {
        let params: ReflectParams = toml::from_str(text)?;
        params.validate()?;
        Ok(params)
    }

    pub fn with_buffer_size(mut self, bytes: usize) -> Self {
        self.buffer_size = bytes;
        self
    }

    pub fn with_partial_read(mut self, policy: PartialRead) -> Self {
        self.partial_read = policy;
        self
    }

    pub fn with_wait_slice_ms(mut self, millis: u64) -> Self {
        self.wait_slice_ms = millis;
        self
    }

    /// 拒绝零缓冲大小，以及落在 `1..=MAX_WAIT_SLICE_MS` 之外的等待分片。
    pub fn validate(&self) -> Result<(), DeviceError> {
        self.capacity()?;
        if self.wait_slice_ms == 0 {
            return Err(DeviceError::InvalidParams {
                name: "wait_slice_ms",
                reason: "must be at least one millisecond",
            });
        }
        if self.wait_slice_ms > Self::MAX_WAIT_SLICE_MS {
            return Err(DeviceError::InvalidParams {
                name: "wait_slice_ms",
                reason: "must not exceed 1000 milliseconds",
            });
        }
        Ok(())
    }

    /// 缓冲容量；零值返回 [`DeviceError::InvalidParams`]。
    pub fn capacity(&self) -> Result<Capacity, DeviceError> {
        Capacity::new(self.buffer_size).map_err(|_| DeviceError::InvalidParams {
            name: "buffer_size",
            reason: "must be nonzero",
        })
    }

    /// 新会话创建缓冲时使用的选项。
    pub fn buffer_options(&self) -> BufferOptions {
        BufferOptions::default()
            .with_partial_read(self.partial_read.into())
            .with_wait_slice(Duration::from_millis(self.wait_slice_ms))
    }
}

impl Default for ReflectParams {
    fn default() -> Self {
        Self {
            buffer_size: Self::DEFAULT_BUFFER_SIZE,
            wait_slice_ms: Self::DEFAULT_WAIT_SLICE_MS,
            partial_read: PartialRead::Rewind,
        }
    }
}
