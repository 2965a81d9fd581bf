use core::{fmt, ops::BitOr};

use reflect_core::ReadMode;

/// 打开会话时的标志位。
///
/// 目前只有 [`OpenFlags::NONBLOCK`] 有语义：它决定此后每次 `read` 是否允许挂起。
/// 数值与 Linux `O_NONBLOCK` 保持一致，便于适配层直接透传。
#[derive(Clone, Copy, Default, Eq, PartialEq, Hash)]
pub struct OpenFlags(u32);

impl OpenFlags {
    /// 无任何标志：阻塞读取。
    pub const EMPTY: OpenFlags = OpenFlags(0);
    /// 非阻塞：空缓冲上的读取立即返回 `WouldBlock`。
    pub const NONBLOCK: OpenFlags = OpenFlags(0o4000);

    /// 由原始位构造，未知位被保留但不参与任何判定。
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: OpenFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_nonblocking(self) -> bool {
        self.contains(Self::NONBLOCK)
    }

    /// 把非阻塞位取反映射为读取模式。
    pub fn read_mode(self) -> ReadMode {
        ReadMode::from_nonblocking(self.is_nonblocking())
    }
}

impl BitOr for OpenFlags {
    type Output = OpenFlags;

    fn bitor(self, rhs: Self) -> Self::Output {
        OpenFlags(self.0 | rhs.0)
    }
}

impl fmt::Debug for OpenFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_nonblocking() {
            write!(f, "OpenFlags(NONBLOCK | {:#o})", self.0 & !Self::NONBLOCK.0)
        } else {
            write!(f, "OpenFlags({:#o})", self.0)
        }
    }
}
