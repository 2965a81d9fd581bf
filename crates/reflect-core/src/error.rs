//! # error 模块说明
//!
//! ## 角色定位（Why）
//! - 集中定义回显缓冲单次调用可能出现的全部失败，每个错误只作用于失败的那一次调用；
//! - 核心不做任何内部重试，`Interrupted` 与 `WouldBlock` 的重试由调用方决定。
//!
//! ## 设计要求（What）
//! - 错误类型派生 `thiserror::Error`，与 `std::error::Error` 生态兼容；
//! - 每个变体都有稳定错误码（[`codes`]）与 POSIX errno 映射（[`errno`]），会话层可据此
//!   还原字符设备语义。

use thiserror::Error;

/// 稳定错误码，遵循 `<域>.<语义>` 命名。
pub mod codes {
    pub const WRITE_TOO_LARGE: &str = "echo.write.too_large";
    pub const READ_WOULD_BLOCK: &str = "echo.read.would_block";
    pub const INTERRUPTED: &str = "echo.interrupted";
    pub const USER_FAULT: &str = "echo.user_fault";
    pub const OUT_OF_MEMORY: &str = "echo.out_of_memory";
}

/// 与字符设备返回值对齐的 errno 常量。
pub mod errno {
    pub const EAGAIN: i32 = 11;
    pub const ENOMEM: i32 = 12;
    pub const EFAULT: i32 = 14;
    pub const EFBIG: i32 = 27;
    /// 内核内部的“系统调用可重启”码，用户态通常看到的是 `EINTR`。
    pub const ERESTARTSYS: i32 = 512;
}

/// 回显缓冲错误域。
///
/// # 教案式说明
/// - **意图 (Why)**：为写入、读取与创建三条路径提供精确的失败分类；
/// - **契约 (What)**：
///   - 所有变体均为 `Send + Sync + 'static`，可跨线程传播；
///   - 任何变体返回时，缓冲的 `occupied_len` 都仍处于 `[0, capacity]` 范围内。
#[derive(Clone, Copy, Debug, Eq, PartialEq, Error)]
#[non_exhaustive]
pub enum EchoError {
    /// 写入负载超过容量；在抢锁前判定，不改变任何状态。
    #[error("payload of {len} bytes exceeds echo buffer capacity of {capacity} bytes")]
    TooLarge { len: usize, capacity: usize },

    /// 非阻塞读取遇到空缓冲。
    #[error("echo buffer is empty and the reader asked not to block")]
    WouldBlock,

    /// 阻塞等待（抢锁或等待数据）被外部取消打断；调用方应整体重试。
    #[error("blocking wait on echo buffer was interrupted")]
    Interrupted,

    /// 与调用方内存之间的拷贝失败。
    #[error("copy across the caller memory boundary faulted")]
    Fault,

    /// 无法为缓冲分配存储。
    #[error("unable to allocate {capacity} bytes of echo buffer storage")]
    OutOfMemory { capacity: usize },
}

impl EchoError {
    /// 返回稳定错误码。
    pub fn code(&self) -> &'static str {
        match self {
            EchoError::TooLarge { .. } => codes::WRITE_TOO_LARGE,
            EchoError::WouldBlock => codes::READ_WOULD_BLOCK,
            EchoError::Interrupted => codes::INTERRUPTED,
            EchoError::Fault => codes::USER_FAULT,
            EchoError::OutOfMemory { .. } => codes::OUT_OF_MEMORY,
        }
    }

    /// 返回字符设备语义下的 errno（正值）。
    pub fn errno(&self) -> i32 {
        match self {
            EchoError::TooLarge { .. } => errno::EFBIG,
            EchoError::WouldBlock => errno::EAGAIN,
            EchoError::Interrupted => errno::ERESTARTSYS,
            EchoError::Fault => errno::EFAULT,
            EchoError::OutOfMemory { .. } => errno::ENOMEM,
        }
    }

    /// 调用方原样重试是否可能成功。
    pub fn is_retryable(&self) -> bool {
        matches!(self, EchoError::Interrupted | EchoError::WouldBlock)
    }
}
