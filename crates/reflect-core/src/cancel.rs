use core::{fmt, ops::DerefMut};
use std::task::Waker;

#[cfg(not(loom))]
use parking_lot::Mutex;
#[cfg(not(loom))]
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

#[cfg(loom)]
use loom::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, Ordering},
};

/// 外部中断信号，打断回显缓冲上的阻塞等待。
///
/// # 设计背景（Why）
/// - 回显缓冲的两个阻塞点（抢锁与等待数据）都必须能被外部打断，被打断的调用返回
///   [`EchoError::Interrupted`](crate::EchoError::Interrupted)，由调用方决定是否重试；
/// - 等待数据的读者不轮询令牌，而是在挂起前登记一个 [`Waker`]，`cancel` 直接唤醒它。
///
/// # 逻辑解析（How）
/// - 取消位与登记表共享同一个 [`Arc`]，克隆出的令牌观察同一状态；
/// - `register_waker` 在登记表锁内检查取消位：要么看到已取消并返回 `None`，
///   要么登记成功，此后的 `cancel` 必然在清空登记表时唤醒它；
/// - `cancel` 先置位再取走登记表，唤醒发生在锁外。
///
/// # 契约说明（What）
/// - `cancel` 仅在首次置位时返回 `true`，且只有这一次会触发唤醒；
/// - [`WakerRegistration`] 被丢弃时撤销登记，已撤销的唤醒器不会被调用。
#[derive(Clone)]
pub struct Cancellation {
    state: Arc<State>,
}

struct State {
    cancelled: AtomicBool,
    waiters: Mutex<Waiters>,
}

#[derive(Default)]
struct Waiters {
    next_key: u64,
    entries: Vec<(u64, Waker)>,
}

impl Cancellation {
    /// 创建处于“未取消”状态的令牌。
    pub fn new() -> Self {
        Self {
            state: Arc::new(State {
                cancelled: AtomicBool::new(false),
                waiters: Mutex::new(Waiters::default()),
            }),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.cancelled.load(Ordering::Acquire)
    }

    /// 标记取消并唤醒所有已登记的等待者。
    ///
    /// 唤醒器在本线程上同步执行，调用方不得在持有缓冲内部锁时调用。
    pub fn cancel(&self) -> bool {
        if self.state.cancelled.swap(true, Ordering::AcqRel) {
            return false;
        }
        let drained = core::mem::take(&mut lock(&self.state.waiters).entries);
        for (_, waker) in drained {
            waker.wake();
        }
        true
    }

    /// 登记一个在取消时被唤醒的 [`Waker`]。
    ///
    /// 令牌已被取消时返回 `None`，调用方应直接按“已中断”处理。
    pub fn register_waker(&self, waker: &Waker) -> Option<WakerRegistration> {
        let mut waiters = lock(&self.state.waiters);
        if self.state.cancelled.load(Ordering::Acquire) {
            return None;
        }
        let key = waiters.next_key;
        waiters.next_key = waiters.next_key.wrapping_add(1);
        waiters.entries.push((key, waker.clone()));
        Some(WakerRegistration {
            state: Arc::clone(&self.state),
            key,
        })
    }

    /// 当前仍登记在令牌上的唤醒器数量。
    pub fn registered_wakers(&self) -> usize {
        lock(&self.state.waiters).entries.len()
    }
}

impl Default for Cancellation {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Cancellation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cancellation")
            .field("cancelled", &self.is_cancelled())
            .finish_non_exhaustive()
    }
}

/// [`Cancellation::register_waker`] 返回的登记凭据，丢弃即撤销。
#[must_use = "丢弃凭据会立即撤销唤醒登记"]
pub struct WakerRegistration {
    state: Arc<State>,
    key: u64,
}

impl Drop for WakerRegistration {
    fn drop(&mut self) {
        let key = self.key;
        lock(&self.state.waiters)
            .entries
            .retain(|(entry, _)| *entry != key);
    }
}

impl fmt::Debug for WakerRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WakerRegistration")
            .field("key", &self.key)
            .finish()
    }
}

#[cfg(not(loom))]
fn lock<T>(mutex: &Mutex<T>) -> impl DerefMut<Target = T> + '_ {
    mutex.lock()
}

#[cfg(loom)]
fn lock<T>(mutex: &Mutex<T>) -> impl DerefMut<Target = T> + '_ {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}
