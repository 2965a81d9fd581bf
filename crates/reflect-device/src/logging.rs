//! 宿主进程的日志安装入口。
//!
//! 设备与缓冲只通过 `tracing` 宏发出事件；是否以及如何输出由宿主决定。
//! [`install`] 组装 `fmt + EnvFilter` 并设为全局 Subscriber，过滤规则取自 `RUST_LOG`，
//! 缺省为 `info`。

use std::sync::OnceLock;

use thiserror::Error;
use tracing::dispatcher;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt};

static INSTALLED: OnceLock<()> = OnceLock::new();

/// 日志安装失败的原因。
#[derive(Debug, Error)]
pub enum LoggingError {
    /// `install` 被重复调用。
    #[error("reflect logging is already installed")]
    AlreadyInstalled,
    /// 外部提前设置了全局 `tracing` Subscriber。
    #[error("a global tracing subscriber has already been set")]
    SubscriberAlreadySet,
    #[error("failed to set the global tracing subscriber: {0}")]
    SetGlobalSubscriber(#[from] tracing::subscriber::SetGlobalDefaultError),
}

/// 安装全局 Subscriber。
///
/// 多次调用返回 [`LoggingError::AlreadyInstalled`]；外部已配置 Subscriber 时返回
/// [`LoggingError::SubscriberAlreadySet`]。
pub fn install() -> Result<(), LoggingError> {
    if INSTALLED.get().is_some() {
        return Err(LoggingError::AlreadyInstalled);
    }
    if dispatcher::has_been_set() {
        return Err(LoggingError::SubscriberAlreadySet);
    }

    let subscriber = tracing_subscriber::registry()
        .with(build_env_filter())
        .with(tracing_subscriber::fmt::layer());
    tracing::subscriber::set_global_default(subscriber)?;

    INSTALLED
        .set(())
        .map_err(|_| LoggingError::AlreadyInstalled)
}

fn build_env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}
