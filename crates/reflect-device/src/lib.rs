//! # reflect-device
//!
//! ## 定位与职责（Why）
//! - 以 `open`/`write`/`read`/`close` 四个文件式调用暴露 `reflect-core` 的回显缓冲；
//! - 每次 `open` 以设备当前配置的容量创建一个独占的 [`EchoBuffer`](reflect_core::EchoBuffer)，
//!   `close` 销毁它，会话之间互不影响。
//!
//! ## 架构嵌入（Where）
//! - `params` 模块解析并校验设备参数（缓冲大小、取消检查粒度、部分读取策略）；
//! - `device` 模块持有会话表，负责注册、会话生命周期与调用分发；
//! - `session` 模块封装单个会话的缓冲与打开标志；
//! - `logging` 模块安装 `tracing-subscriber`，供宿主进程查看设备日志。
//!
//! ## 兼容面（What）
//! - 写入 N 字节后，在没有其它写入插入的前提下，读回至多 N 字节且内容不变；
//! - 错误可经由 [`DeviceError::errno`] 还原为字符设备的返回码。

pub mod device;
pub mod error;
pub mod flags;
pub mod logging;
pub mod params;
pub mod session;

pub use device::{DEVICE_NAME, Device};
pub use error::DeviceError;
pub use flags::OpenFlags;
pub use params::{PartialRead, ReflectParams};
pub use session::{Session, SessionId};

pub use reflect_core::{Cancellation, EchoError, ReadMode, UserSink, UserSource};
