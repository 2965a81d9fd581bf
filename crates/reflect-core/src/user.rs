//! 调用方内存边界。
//!
//! 字符设备里的 `copy_from_user`/`copy_to_user` 可能在拷贝中途因源或目标不可访问而失败。
//! [`UserSource`] 与 [`UserSink`] 把这一边界显式化：普通切片永远成功，测试或适配层可以
//! 实现会失败的版本，缓冲据此返回 [`EchoError::Fault`](crate::EchoError::Fault)。

use thiserror::Error;

use crate::EchoError;

/// 调用方内存不可访问。
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Error)]
#[error("caller memory is not accessible")]
pub struct Fault;

impl From<Fault> for EchoError {
    fn from(_: Fault) -> Self {
        EchoError::Fault
    }
}

/// 写入路径的数据来源。
pub trait UserSource {
    /// 待写入的字节数。
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 把全部内容拷入 `dst`，调用方保证 `dst.len() == self.len()`。
    ///
    /// 失败时 `dst` 的内容不确定。
    fn copy_into(&self, dst: &mut [u8]) -> Result<(), Fault>;
}

/// 读取路径的目标内存。
pub trait UserSink {
    /// 调用方能够接收的最大字节数。
    fn max_len(&self) -> usize;

    /// 把 `src` 拷到目标的起始位置，调用方保证 `src.len() <= self.max_len()`。
    fn copy_from(&mut self, src: &[u8]) -> Result<(), Fault>;
}

impl UserSource for [u8] {
    fn len(&self) -> usize {
        <[u8]>::len(self)
    }

    fn copy_into(&self, dst: &mut [u8]) -> Result<(), Fault> {
        dst.copy_from_slice(self);
        Ok(())
    }
}

impl<const N: usize> UserSource for [u8; N] {
    fn len(&self) -> usize {
        N
    }

    fn copy_into(&self, dst: &mut [u8]) -> Result<(), Fault> {
        self.as_slice().copy_into(dst)
    }
}

impl UserSource for Vec<u8> {
    fn len(&self) -> usize {
        Vec::len(self)
    }

    fn copy_into(&self, dst: &mut [u8]) -> Result<(), Fault> {
        self.as_slice().copy_into(dst)
    }
}

impl UserSource for str {
    fn len(&self) -> usize {
        str::len(self)
    }

    fn copy_into(&self, dst: &mut [u8]) -> Result<(), Fault> {
        self.as_bytes().copy_into(dst)
    }
}

impl<T: UserSource + ?Sized> UserSource for &T {
    fn len(&self) -> usize {
        (**self).len()
    }

    fn copy_into(&self, dst: &mut [u8]) -> Result<(), Fault> {
        (**self).copy_into(dst)
    }
}

impl UserSink for [u8] {
    fn max_len(&self) -> usize {
        self.len()
    }

    fn copy_from(&mut self, src: &[u8]) -> Result<(), Fault> {
        self[..src.len()].copy_from_slice(src);
        Ok(())
    }
}

impl<const N: usize> UserSink for [u8; N] {
    fn max_len(&self) -> usize {
        N
    }

    fn copy_from(&mut self, src: &[u8]) -> Result<(), Fault> {
        self.as_mut_slice().copy_from(src)
    }
}

impl<T: UserSink + ?Sized> UserSink for &mut T {
    fn max_len(&self) -> usize {
        (**self).max_len()
    }

    fn copy_from(&mut self, src: &[u8]) -> Result<(), Fault> {
        (**self).copy_from(src)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slice_sink_writes_prefix_only() {
        let mut out = [9u8; 4];
        UserSink::copy_from(&mut out, b"ab").expect("切片拷贝不会失败");
        assert_eq!(out, [b'a', b'b', 9, 9]);
    }

    #[test]
    fn fault_maps_to_echo_fault() {
        assert_eq!(EchoError::from(Fault), EchoError::Fault);
    }
}
