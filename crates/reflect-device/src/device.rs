//! # Device：会话表与调用分发
//!
//! ## 核心意图（Why）
//! - 把“打开一次得到一个独占缓冲”的字符设备语义落到进程内：`open` 创建缓冲，
//!   `close` 销毁缓冲，`write`/`read` 按句柄分发；
//! - 会话表基于 `DashMap`，多个线程可以同时对不同会话发起调用。
//!
//! ## 行为契约（What）
//! - 缓冲大小在第一次 `open` 之后封存，之后的修改返回 [`DeviceError::ConfigurationSealed`]；
//! - 分发时先克隆出 `Arc<Session>` 再调用缓冲，阻塞读取期间不持有 `DashMap` 分片锁；
//! - `close` 之后该句柄上的所有调用返回 [`DeviceError::UnknownSession`]。
//!
//! ## 风险提示（Trade-offs）
//! - `close` 时若仍有调用在途，缓冲随最后一个 `Arc` 释放，而非立即销毁。

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use dashmap::DashMap;
use parking_lot::Mutex;
use reflect_core::{Cancellation, EchoBuffer, UserSink, UserSource};
use tracing::{debug, info};

use crate::{DeviceError, OpenFlags, ReflectParams, Session, SessionId};

/// 设备注册名。
pub const DEVICE_NAME: &str = "reflect";

#[derive(Debug)]
struct DeviceConfig {
    params: ReflectParams,
    sealed: bool,
}

/// 回显设备。
///
/// ```
/// use reflect_device::{Cancellation, Device, OpenFlags, ReflectParams};
///
/// let device = Device::register(ReflectParams::default()).expect("默认参数合法");
/// let cancel = Cancellation::new();
/// let id = device.open(OpenFlags::EMPTY).expect("打开会话");
/// device.write(id, b"hello", &cancel).expect("写入");
/// let mut out = [0u8; 5];
/// assert_eq!(device.read(id, &mut out, &cancel).expect("读取"), 5);
/// assert_eq!(&out, b"hello");
/// device.close(id).expect("关闭");
/// ```
#[derive(Debug)]
pub struct Device {
    config: Mutex<DeviceConfig>,
    next_id: AtomicU64,
    sessions: DashMap<SessionId, Arc<Session>>,
}

impl Device {
    /// 校验参数并注册设备。
    pub fn register(params: ReflectParams) -> Result<Self, DeviceError> {
        params.validate()?;
        info!(
            device = DEVICE_NAME,
            buffer_size = params.buffer_size,
            partial_read = ?params.partial_read,
            "reflect device has been registered"
        );
        Ok(Self {
            config: Mutex::new(DeviceConfig {
                params,
                sealed: false,
            }),
            next_id: AtomicU64::new(1),
            sessions: DashMap::new(),
        })
    }

    /// 修改后续会话的缓冲大小；仅在第一次 `open` 之前允许。
    pub fn set_buffer_size(&self, bytes: usize) -> Result<(), DeviceError> {
        let mut config = self.config.lock();
        if config.sealed {
            return Err(DeviceError::ConfigurationSealed);
        }
        let candidate = config.params.clone().with_buffer_size(bytes);
        candidate.validate()?;
        config.params = candidate;
        Ok(())
    }

    pub fn buffer_size(&self) -> usize {
        self.config.lock().params.buffer_size
    }

    pub fn params(&self) -> ReflectParams {
        self.config.lock().params.clone()
    }

    /// 打开一个会话并为其分配独占缓冲。
    ///
    /// 分配失败时返回 `DeviceError::Buffer(EchoError::OutOfMemory { .. })`，不登记任何会话，
    /// 配置也不会被封存。
    pub fn open(&self, flags: OpenFlags) -> Result<SessionId, DeviceError> {
        let mut config = self.config.lock();
        let capacity = config.params.capacity()?;
        let buffer = EchoBuffer::create_with(capacity, config.params.buffer_options())?;
        let id = SessionId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.sessions
            .insert(id, Arc::new(Session::new(id, buffer, flags)));
        config.sealed = true;
        drop(config);

        debug!(session = %id, ?flags, capacity = capacity.get(), "session opened");
        Ok(id)
    }

    /// 按句柄取得会话的共享引用。
    pub fn session(&self, id: SessionId) -> Result<Arc<Session>, DeviceError> {
        self.sessions
            .get(&id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(DeviceError::UnknownSession(id))
    }

    pub fn write<S>(
        &self,
        id: SessionId,
        src: &S,
        cancel: &Cancellation,
    ) -> Result<usize, DeviceError>
    where
        S: UserSource + ?Sized,
    {
        Ok(self.session(id)?.write(src, cancel)?)
    }

    pub fn read<D>(
        &self,
        id: SessionId,
        dst: &mut D,
        cancel: &Cancellation,
    ) -> Result<usize, DeviceError>
    where
        D: UserSink + ?Sized,
    {
        Ok(self.session(id)?.read(dst, cancel)?)
    }

    pub fn set_flags(&self, id: SessionId, flags: OpenFlags) -> Result<(), DeviceError> {
        self.session(id)?.set_flags(flags);
        Ok(())
    }

    /// 关闭会话并销毁其缓冲。
    pub fn close(&self, id: SessionId) -> Result<(), DeviceError> {
        let (_, session) = self
            .sessions
            .remove(&id)
            .ok_or(DeviceError::UnknownSession(id))?;
        match Arc::try_unwrap(session) {
            Ok(session) => session.into_buffer().destroy(),
            Err(_) => debug!(session = %id, "session closed with calls in flight"),
        }
        debug!(session = %id, "session closed");
        Ok(())
    }

    pub fn open_sessions(&self) -> usize {
        self.sessions.len()
    }

    /// 注销设备，关闭所有仍然打开的会话。
    pub fn unregister(self) {
        drop(self);
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        let open = self.sessions.len();
        self.sessions.clear();
        info!(
            device = DEVICE_NAME,
            open_sessions = open,
            "reflect device has been unregistered"
        );
    }
}
