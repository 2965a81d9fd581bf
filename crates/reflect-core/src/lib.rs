//! `reflect-core` 提供单槽回显缓冲（Echo Buffer）的全部同步逻辑。
//!
//! # 模块定位（Why）
//! - 写入方把一段字节放进固定容量的缓冲，读取方稍后取走；缓冲同一时刻只保留一条消息，
//!   后写覆盖先写。
//! - 会话注册、参数解析等外围能力位于 `reflect-device`，本 crate 只关心容量校验、互斥、
//!   阻塞等待与部分消费的簿记。
//!
//! # 设计概要（How）
//! - [`EchoBuffer`] 以 `parking_lot::Mutex` 保护存储与占用长度，以 `Condvar` 唤醒等待中的读者；
//! - 等待数据的读者向 [`Cancellation`] 登记唤醒器，取消立即打断等待；抢锁受阻时按
//!   [`BufferOptions::wait_slice`] 分片检查取消位。被取消时返回 [`EchoError::Interrupted`]
//!   且不留下部分修改；
//! - 与调用方内存之间的拷贝经过 [`UserSource`]/[`UserSink`] 边界，拷贝失败映射为
//!   [`EchoError::Fault`]。
//!
//! # 命名约定（Consistency）
//! - `write`/`read`/`create`/`destroy` 与会话层的文件式接口一一对应，便于调用端对照。

mod buffer;
mod cancel;
mod capacity;
mod error;
mod user;

pub use buffer::{BufferOptions, EchoBuffer, PartialReadPolicy, ReadMode};
pub use cancel::{Cancellation, WakerRegistration};
pub use capacity::{Capacity, DEFAULT_CAPACITY, ZeroCapacity};
pub use error::{EchoError, codes, errno};
pub use user::{Fault, UserSink, UserSource};

/// `reflect-core` 统一的结果别名。
pub type Result<T, E = EchoError> = core::result::Result<T, E>;
