use core::{fmt, num::NonZeroUsize};

use thiserror::Error;

/// 未显式配置时的缓冲容量（字节）。
pub const DEFAULT_CAPACITY: Capacity = match Capacity::new(1024) {
    Ok(capacity) => capacity,
    Err(_) => panic!("default capacity is nonzero"),
};

/// 回显缓冲的容量，保证非零。
///
/// # 契约说明（What）
/// - 零容量在类型层面不可表达，[`Capacity::new`] 对 0 返回 [`ZeroCapacity`]；
/// - 容量在 [`EchoBuffer`](crate::EchoBuffer) 创建时复制进实例，之后不可变，读取无需同步。
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Capacity(NonZeroUsize);

/// 试图以 0 构造 [`Capacity`]。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
#[error("echo buffer capacity must be nonzero")]
pub struct ZeroCapacity;

impl Capacity {
    /// 以字节数构造容量。
    pub const fn new(bytes: usize) -> Result<Self, ZeroCapacity> {
        match NonZeroUsize::new(bytes) {
            Some(value) => Ok(Self(value)),
            None => Err(ZeroCapacity),
        }
    }

    /// 返回容量字节数。
    pub const fn get(self) -> usize {
        self.0.get()
    }
}

impl Default for Capacity {
    fn default() -> Self {
        DEFAULT_CAPACITY
    }
}

impl TryFrom<usize> for Capacity {
    type Error = ZeroCapacity;

    fn try_from(bytes: usize) -> Result<Self, Self::Error> {
        Self::new(bytes)
    }
}

impl From<NonZeroUsize> for Capacity {
    fn from(value: NonZeroUsize) -> Self {
        Self(value)
    }
}

impl From<Capacity> for usize {
    fn from(value: Capacity) -> Self {
        value.get()
    }
}

impl fmt::Display for Capacity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} bytes", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_is_rejected() {
        assert_eq!(Capacity::new(0), Err(ZeroCapacity));
        assert_eq!(Capacity::try_from(0usize), Err(ZeroCapacity));
    }

    #[test]
    fn default_matches_device_default() {
        assert_eq!(Capacity::default().get(), 1024);
        assert_eq!(Capacity::new(7).map(Capacity::get), Ok(7));
    }
}
