use core::{
    fmt,
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
};

use std::{
    sync::{Arc, Weak},
    task::{Wake, Waker},
};

use parking_lot::{Condvar, Mutex, MutexGuard};
use tracing::{debug, trace, warn};

use crate::{Cancellation, Capacity, EchoError, Result, UserSink, UserSource};

/// 读取方是否接受挂起。
///
/// 会话层把打开时的非阻塞标志取反后映射到这里。
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub enum ReadMode {
    /// 缓冲为空时挂起，直到有写入或被取消。
    #[default]
    Blocking,
    /// 缓冲为空时立即返回 [`EchoError::WouldBlock`]。
    NonBlocking,
}

impl ReadMode {
    /// 由“非阻塞”标志位构造读取模式。
    pub fn from_nonblocking(nonblocking: bool) -> Self {
        if nonblocking {
            ReadMode::NonBlocking
        } else {
            ReadMode::Blocking
        }
    }

    pub fn is_blocking(self) -> bool {
        matches!(self, ReadMode::Blocking)
    }
}

/// 部分读取后剩余字节的处理策略。
///
/// # 契约说明（What）
/// - `Rewind`：剩余字节留在原偏移，只递减占用长度。下一次读取返回的是存储区的前缀，
///   也就是原始写入的开头，而不是逻辑上剩下的后缀。写 `"HELLO"`、读 2、再读 3，得到
///   `"HE"` 与 `"HEL"`。这是字符设备一直以来的可观察行为，作为默认值保留；
/// - `Consume`：剩余字节搬移到偏移 0，同样的序列得到 `"HE"` 与 `"LLO"`。
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub enum PartialReadPolicy {
    #[default]
    Rewind,
    Consume,
}

/// 创建缓冲时的可选项。
///
/// `wait_slice` 决定抢锁受阻时多久检查一次 [`Cancellation`]，只影响中断被观察到的延迟，
/// 不影响任何结果。等待数据的读者由取消直接唤醒，不受它约束。
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct BufferOptions {
    pub partial_read: PartialReadPolicy,
    pub wait_slice: Duration,
}

impl BufferOptions {
    /// 默认的取消检查粒度。
    pub const DEFAULT_WAIT_SLICE: Duration = Duration::from_millis(10);

    pub fn with_partial_read(mut self, policy: PartialReadPolicy) -> Self {
        self.partial_read = policy;
        self
    }

    /// 设置取消检查粒度；零值会被提升为 1 微秒，避免忙等。
    pub fn with_wait_slice(mut self, slice: Duration) -> Self {
        self.wait_slice = slice.max(Duration::from_micros(1));
        self
    }
}

impl Default for BufferOptions {
    fn default() -> Self {
        Self {
            partial_read: PartialReadPolicy::Rewind,
            wait_slice: Self::DEFAULT_WAIT_SLICE,
        }
    }
}

/// 受锁保护的共享状态：存储区与占用长度。
struct Slot {
    store: Box<[u8]>,
    occupied_len: usize,
}

/// 锁、条件变量与占用镜像。
///
/// 以 `Arc` 持有，等待中的读者登记到 [`Cancellation`] 上的唤醒器只保留 `Weak`，
/// 缓冲销毁后迟到的唤醒直接失效。
struct Monitor {
    slot: Mutex<Slot>,
    not_empty: Condvar,
    occupied_hint: AtomicUsize,
}

impl Monitor {
    fn set_occupied(&self, slot: &mut Slot, len: usize) {
        slot.occupied_len = len;
        self.occupied_hint.store(len, Ordering::Release);
    }
}

/// 取消时唤醒挂在 `not_empty` 上的读者。
struct ReaderWake(Weak<Monitor>);

impl Wake for ReaderWake {
    fn wake(self: Arc<Self>) {
        self.wake_by_ref();
    }

    fn wake_by_ref(self: &Arc<Self>) {
        if let Some(monitor) = self.0.upgrade() {
            // 持锁通知：读者在检查取消位与进入等待之间始终持锁。
            let _slot = monitor.slot.lock();
            monitor.not_empty.notify_all();
        }
    }
}

/// `EchoBuffer` 是单槽、定容、后写覆盖的回显缓冲。
///
/// # 模块角色（Why）
/// - 一个会话独占一个实例：写入方放入一条消息，读取方稍后取走；
/// - 同一实例可被多个执行上下文并发读写，所有修改经由内部锁串行化。
///
/// # 核心机制（How）
/// - `slot` 由 `parking_lot::Mutex` 保护，`not_empty` 是与之配对的条件变量；
/// - 阻塞读取在条件变量上等待时不持有锁，每次醒来都重新检查 `occupied_len != 0`，
///   伪唤醒不会导致读出空数据；
/// - 读者挂起前向 [`Cancellation`] 登记唤醒器，取消立即唤醒它，空闲期间不轮询；
/// - 抢锁按 [`BufferOptions::wait_slice`] 分片，分片之间检查取消位；
/// - `occupied_hint` 是占用长度在锁外的镜像，仅供非阻塞读取在空缓冲上不抢锁地快速失败。
///
/// # 契约说明（What）
/// - **不变量**：锁外任意时刻 `0 <= occupied_len <= capacity`，超出 `occupied_len`
///   的存储内容不会暴露给调用方；
/// - **生命周期**：[`create`](Self::create) 与 [`destroy`](Self::destroy) 一一对应，
///   `destroy` 消耗实例，重复销毁在类型层面不可表达；
/// - **公平性**：不保证多个等待读者的先后顺序，多个写者之间“最后抢到锁者胜出”。
pub struct EchoBuffer {
    capacity: Capacity,
    options: BufferOptions,
    monitor: Arc<Monitor>,
}

impl EchoBuffer {
    /// 以默认选项创建缓冲。
    pub fn create(capacity: Capacity) -> Result<Self> {
        Self::create_with(capacity, BufferOptions::default())
    }

    /// 分配 `capacity` 字节的零初始化存储并返回就绪实例。
    ///
    /// # 契约说明（What）
    /// - 存储分配失败时返回 [`EchoError::OutOfMemory`]，不会留下半初始化对象；
    /// - 返回的实例 `occupied_len == 0`。
    pub fn create_with(capacity: Capacity, options: BufferOptions) -> Result<Self> {
        let store = allocate_zeroed(capacity.get())?;
        debug!(
            capacity = capacity.get(),
            partial_read = ?options.partial_read,
            "echo buffer created"
        );
        Ok(Self {
            capacity,
            options,
            monitor: Arc::new(Monitor {
                slot: Mutex::new(Slot {
                    store,
                    occupied_len: 0,
                }),
                not_empty: Condvar::new(),
                occupied_hint: AtomicUsize::new(0),
            }),
        })
    }

    pub fn capacity(&self) -> Capacity {
        self.capacity
    }

    pub fn options(&self) -> BufferOptions {
        self.options
    }

    /// 当前未读字节数的快照（在锁内读取）。
    pub fn occupied_len(&self) -> usize {
        self.monitor.slot.lock().occupied_len
    }

    pub fn is_empty(&self) -> bool {
        self.occupied_len() == 0
    }

    /// 以 `src` 的全部内容替换缓冲中的消息，返回接受的字节数。
    ///
    /// # 执行步骤（How）
    /// 1. 长度超过容量时直接返回 [`EchoError::TooLarge`]，不抢锁、不改状态；
    /// 2. 可中断地抢锁，等待期间被取消返回 [`EchoError::Interrupted`]；
    /// 3. 从偏移 0 覆盖写入，无论旧消息是否已被读取；
    /// 4. 设置占用长度并唤醒所有等待中的读者。
    ///
    /// # 契约说明（What）
    /// - 拷贝失败返回 [`EchoError::Fault`]，占用长度回滚为 0，残缺内容不会被读到。
    pub fn write<S>(&self, src: &S, cancel: &Cancellation) -> Result<usize>
    where
        S: UserSource + ?Sized,
    {
        let len = src.len();
        let capacity = self.capacity.get();
        if len > capacity {
            debug!(len, capacity, "rejecting oversized write");
            return Err(EchoError::TooLarge { len, capacity });
        }

        let mut slot = self.lock_interruptible(cancel)?;
        if let Err(fault) = src.copy_into(&mut slot.store[..len]) {
            self.monitor.set_occupied(&mut slot, 0);
            warn!(len, "source memory faulted during write; buffer emptied");
            return Err(fault.into());
        }

        let overwritten = slot.occupied_len;
        self.monitor.set_occupied(&mut slot, len);
        self.monitor.not_empty.notify_all();
        debug!(len, overwritten, "payload accepted");
        Ok(len)
    }

    /// 读取至多 `dst.max_len()` 字节，返回实际拷贝的字节数。
    ///
    /// # 执行步骤（How）
    /// 1. 非阻塞模式下若镜像显示为空，不抢锁直接返回 [`EchoError::WouldBlock`]；
    /// 2. 可中断地抢锁；
    /// 3. 缓冲为空时：非阻塞返回 `WouldBlock`，阻塞则登记唤醒器后在条件变量上等待，
    ///    每次醒来重新检查谓词，被取消时返回 [`EchoError::Interrupted`]；
    /// 4. 拷贝存储区的前 `min(occupied_len, max_len)` 字节；
    /// 5. 按 [`PartialReadPolicy`] 更新占用长度。
    ///
    /// # 契约说明（What）
    /// - 被中断或拷贝失败时不消费任何字节。
    pub fn read<D>(&self, dst: &mut D, mode: ReadMode, cancel: &Cancellation) -> Result<usize>
    where
        D: UserSink + ?Sized,
    {
        if !mode.is_blocking() && self.monitor.occupied_hint.load(Ordering::Acquire) == 0 {
            return Err(EchoError::WouldBlock);
        }

        let mut slot = self.lock_interruptible(cancel)?;
        if slot.occupied_len == 0 {
            if !mode.is_blocking() {
                return Err(EchoError::WouldBlock);
            }
            self.wait_for_payload(&mut slot, cancel)?;
        }

        let available = slot.occupied_len;
        let take = available.min(dst.max_len());
        dst.copy_from(&slot.store[..take])?;

        if self.options.partial_read == PartialReadPolicy::Consume && take < available {
            slot.store.copy_within(take..available, 0);
        }
        self.monitor.set_occupied(&mut slot, available - take);
        debug!(take, remaining = available - take, "payload consumed");
        Ok(take)
    }

    /// 释放存储与控制结构。
    ///
    /// 调用方需保证此时没有进行中的读写；会话层在会话完全静默后才调用。
    pub fn destroy(self) {
        drop(self);
    }

    /// 抢锁；等待期间每个分片检查一次取消。
    ///
    /// 锁空闲时直接获得，即便令牌已被取消，与“仅在等待中被打断”的语义一致。
    fn lock_interruptible(&self, cancel: &Cancellation) -> Result<MutexGuard<'_, Slot>> {
        if let Some(guard) = self.monitor.slot.try_lock() {
            return Ok(guard);
        }
        loop {
            if cancel.is_cancelled() {
                debug!("lock acquisition interrupted");
                return Err(EchoError::Interrupted);
            }
            if let Some(guard) = self.monitor.slot.try_lock_for(self.options.wait_slice) {
                return Ok(guard);
            }
        }
    }

    /// 在 `not_empty` 上挂起直到有数据；返回时仍持锁且 `occupied_len != 0`。
    fn wait_for_payload(
        &self,
        slot: &mut MutexGuard<'_, Slot>,
        cancel: &Cancellation,
    ) -> Result<()> {
        let waker = Waker::from(Arc::new(ReaderWake(Arc::downgrade(&self.monitor))));
        let Some(_registration) = cancel.register_waker(&waker) else {
            debug!("blocked reader interrupted");
            return Err(EchoError::Interrupted);
        };
        while slot.occupied_len == 0 {
            if cancel.is_cancelled() {
                debug!("blocked reader interrupted");
                return Err(EchoError::Interrupted);
            }
            trace!("reader waiting for data");
            self.monitor.not_empty.wait(slot);
        }
        trace!("reader woken with data");
        Ok(())
    }
}

impl Drop for EchoBuffer {
    fn drop(&mut self) {
        trace!(capacity = self.capacity.get(), "echo buffer released");
    }
}

impl fmt::Debug for EchoBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EchoBuffer")
            .field("capacity", &self.capacity)
            .field("options", &self.options)
            .field(
                "occupied_len",
                &self.monitor.occupied_hint.load(Ordering::Relaxed),
            )
            .finish()
    }
}

fn allocate_zeroed(len: usize) -> Result<Box<[u8]>> {
    let mut store = Vec::new();
    store
        .try_reserve_exact(len)
        .map_err(|_| EchoError::OutOfMemory { capacity: len })?;
    store.resize(len, 0);
    Ok(store.into_boxed_slice())
}
