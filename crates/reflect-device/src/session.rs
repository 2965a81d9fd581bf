use core::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

use reflect_core::{Cancellation, EchoBuffer, UserSink, UserSource};

use crate::OpenFlags;

/// 会话句柄编号，由 [`Device::open`](crate::Device::open) 单调分配，永不复用。
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl SessionId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session#{}", self.0)
    }
}

/// 单个打开的会话：一个独占的回显缓冲加上打开标志。
///
/// # 契约说明（What）
/// - 读取模式在每次 `read` 时从当前标志推导，`set_flags` 之后的读取立即生效；
/// - 同一会话可以被多个线程同时读写，并发语义完全由 [`EchoBuffer`] 提供。
pub struct Session {
    id: SessionId,
    buffer: EchoBuffer,
    flags: AtomicU32,
}

impl Session {
    pub(crate) fn new(id: SessionId, buffer: EchoBuffer, flags: OpenFlags) -> Self {
        Self {
            id,
            buffer,
            flags: AtomicU32::new(flags.bits()),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn flags(&self) -> OpenFlags {
        OpenFlags::from_bits(self.flags.load(Ordering::Acquire))
    }

    pub fn set_flags(&self, flags: OpenFlags) {
        self.flags.store(flags.bits(), Ordering::Release);
    }

    pub fn buffer(&self) -> &EchoBuffer {
        &self.buffer
    }

    pub fn write<S>(&self, src: &S, cancel: &Cancellation) -> reflect_core::Result<usize>
    where
        S: UserSource + ?Sized,
    {
        self.buffer.write(src, cancel)
    }

    pub fn read<D>(&self, dst: &mut D, cancel: &Cancellation) -> reflect_core::Result<usize>
    where
        D: UserSink + ?Sized,
    {
        self.buffer.read(dst, self.flags().read_mode(), cancel)
    }

    pub(crate) fn into_buffer(self) -> EchoBuffer {
        self.buffer
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("flags", &self.flags())
            .field("buffer", &self.buffer)
            .finish()
    }
}
