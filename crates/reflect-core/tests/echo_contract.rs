//! `echo_contract` 集成测试：从 crate 公开 API 的视角验证回显缓冲的行为契约。
//!
//! # 测试目标（Why）
//! - 覆盖往返、容量拒绝、非阻塞空读、阻塞唤醒、覆盖写、部分读取簿记等核心性质；
//! - 覆盖取消打断与内存边界拷贝失败这两类“不留下部分修改”的路径。
//!
//! # 结构安排（How）
//! - 单线程性质直接断言返回值与 `occupied_len`；
//! - 并发性质借助 `std::thread` 与通道，把“仍在挂起”与“已返回”两个时间点显式化。

use std::{
    sync::{Arc, Barrier, mpsc},
    thread,
    time::{Duration, Instant},
};

use reflect_core::{
    BufferOptions, Cancellation, Capacity, EchoBuffer, EchoError, Fault, PartialReadPolicy,
    ReadMode, UserSink, UserSource,
};

const SETTLE: Duration = Duration::from_millis(50);

fn buffer(bytes: usize) -> EchoBuffer {
    EchoBuffer::create(Capacity::new(bytes).expect("容量非零")).expect("分配缓冲失败")
}

fn read_vec(buf: &EchoBuffer, max_len: usize, mode: ReadMode) -> Result<Vec<u8>, EchoError> {
    let mut out = vec![0u8; max_len];
    let n = buf.read(out.as_mut_slice(), mode, &Cancellation::new())?;
    out.truncate(n);
    Ok(out)
}

/// 拷贝到一半就失败的数据来源。
struct FaultingSource {
    len: usize,
}

impl UserSource for FaultingSource {
    fn len(&self) -> usize {
        self.len
    }

    fn copy_into(&self, dst: &mut [u8]) -> Result<(), Fault> {
        let half = dst.len() / 2;
        dst[..half].fill(b'X');
        Err(Fault)
    }
}

/// 总是失败的目标内存。
struct FaultingSink;

impl UserSink for FaultingSink {
    fn max_len(&self) -> usize {
        16
    }

    fn copy_from(&mut self, _src: &[u8]) -> Result<(), Fault> {
        Err(Fault)
    }
}

/// 在拷贝期间停住的目标内存，用于让读者在持锁状态下驻留。
struct GatedSink {
    entered: Arc<Barrier>,
    release: mpsc::Receiver<()>,
    out: Vec<u8>,
}

impl UserSink for GatedSink {
    fn max_len(&self) -> usize {
        16
    }

    fn copy_from(&mut self, src: &[u8]) -> Result<(), Fault> {
        self.entered.wait();
        self.release.recv().map_err(|_| Fault)?;
        self.out.extend_from_slice(src);
        Ok(())
    }
}

#[test]
fn round_trip_returns_payload() {
    let buf = buffer(1024);
    let payload = b"the quick brown fox";
    let cancel = Cancellation::new();
    assert_eq!(buf.write(payload, &cancel), Ok(payload.len()));
    let out = read_vec(&buf, payload.len(), ReadMode::Blocking).expect("读取失败");
    assert_eq!(out, payload);
    assert!(buf.is_empty());
}

#[test]
fn payload_of_exact_capacity_is_accepted() {
    let buf = buffer(4);
    assert_eq!(buf.write(b"abcd", &Cancellation::new()), Ok(4));
    assert_eq!(read_vec(&buf, 8, ReadMode::NonBlocking), Ok(b"abcd".to_vec()));
}

#[test]
fn oversized_write_keeps_previous_payload() {
    let buf = buffer(4);
    let cancel = Cancellation::new();
    buf.write(b"old", &cancel).expect("写入失败");
    assert_eq!(
        buf.write(b"12345", &cancel),
        Err(EchoError::TooLarge {
            len: 5,
            capacity: 4
        })
    );
    assert_eq!(read_vec(&buf, 8, ReadMode::NonBlocking), Ok(b"old".to_vec()));
}

#[test]
fn nonblocking_read_on_empty_buffer_would_block() {
    let buf = buffer(16);
    assert_eq!(
        read_vec(&buf, 4, ReadMode::NonBlocking),
        Err(EchoError::WouldBlock)
    );

    buf.write(b"ab", &Cancellation::new()).expect("写入失败");
    read_vec(&buf, 2, ReadMode::NonBlocking).expect("读取失败");
    assert_eq!(
        read_vec(&buf, 4, ReadMode::NonBlocking),
        Err(EchoError::WouldBlock),
        "读尽之后应再次返回 WouldBlock"
    );
}

#[test]
fn blocking_read_waits_for_writer() {
    let buf = Arc::new(buffer(64));
    let reader = {
        let buf = Arc::clone(&buf);
        thread::spawn(move || read_vec(&buf, 64, ReadMode::Blocking))
    };

    thread::sleep(SETTLE);
    assert!(!reader.is_finished(), "空缓冲上的阻塞读取必须挂起");

    buf.write(b"ping", &Cancellation::new()).expect("写入失败");
    let out = reader.join().expect("读取线程不应 panic");
    assert_eq!(out, Ok(b"ping".to_vec()));
}

#[test]
fn second_write_overwrites_unread_payload() {
    let buf = buffer(1024);
    let cancel = Cancellation::new();
    buf.write(b"AAA", &cancel).expect("写入失败");
    buf.write(b"BB", &cancel).expect("写入失败");
    assert_eq!(read_vec(&buf, 10, ReadMode::NonBlocking), Ok(b"BB".to_vec()));
}

#[test]
fn partial_reads_rewind_to_start_of_store() {
    let buf = buffer(1024);
    buf.write(b"HELLO", &Cancellation::new()).expect("写入失败");

    assert_eq!(read_vec(&buf, 2, ReadMode::NonBlocking), Ok(b"HE".to_vec()));
    assert_eq!(buf.occupied_len(), 3);
    assert_eq!(read_vec(&buf, 3, ReadMode::NonBlocking), Ok(b"HEL".to_vec()));
    assert!(buf.is_empty());
}

#[test]
fn partial_reads_consume_when_configured() {
    let options = BufferOptions::default().with_partial_read(PartialReadPolicy::Consume);
    let buf = EchoBuffer::create_with(Capacity::new(1024).expect("容量非零"), options)
        .expect("分配缓冲失败");
    buf.write(b"HELLO", &Cancellation::new()).expect("写入失败");

    assert_eq!(read_vec(&buf, 2, ReadMode::NonBlocking), Ok(b"HE".to_vec()));
    assert_eq!(read_vec(&buf, 3, ReadMode::NonBlocking), Ok(b"LLO".to_vec()));
}

#[test]
fn cancelling_blocked_reader_interrupts_without_consuming() {
    let buf = Arc::new(buffer(16));
    let cancel = Cancellation::new();
    let reader = {
        let buf = Arc::clone(&buf);
        let cancel = cancel.clone();
        thread::spawn(move || {
            let mut out = [0u8; 16];
            buf.read(&mut out, ReadMode::Blocking, &cancel)
        })
    };

    thread::sleep(SETTLE);
    assert!(cancel.cancel());
    assert_eq!(
        reader.join().expect("读取线程不应 panic"),
        Err(EchoError::Interrupted)
    );

    buf.write(b"after", &Cancellation::new()).expect("写入失败");
    assert_eq!(read_vec(&buf, 16, ReadMode::NonBlocking), Ok(b"after".to_vec()));
}

#[test]
fn cancelled_reader_on_full_buffer_still_reads() {
    let buf = buffer(16);
    buf.write(b"data", &Cancellation::new()).expect("写入失败");
    let cancel = Cancellation::new();
    cancel.cancel();
    let mut out = [0u8; 16];
    assert_eq!(buf.read(&mut out, ReadMode::Blocking, &cancel), Ok(4));
}

#[test]
fn cancelling_writer_blocked_on_lock_mutates_nothing() {
    let buf = Arc::new(buffer(16));
    buf.write(b"keep", &Cancellation::new()).expect("写入失败");

    let entered = Arc::new(Barrier::new(2));
    let (release_tx, release_rx) = mpsc::channel();
    let reader = {
        let buf = Arc::clone(&buf);
        let entered = Arc::clone(&entered);
        thread::spawn(move || {
            let mut sink = GatedSink {
                entered,
                release: release_rx,
                out: Vec::new(),
            };
            let n = buf.read(&mut sink, ReadMode::Blocking, &Cancellation::new());
            (n, sink.out)
        })
    };
    entered.wait();

    let cancel = Cancellation::new();
    let writer = {
        let buf = Arc::clone(&buf);
        let cancel = cancel.clone();
        thread::spawn(move || buf.write(b"clobber", &cancel))
    };
    thread::sleep(SETTLE);
    assert!(!writer.is_finished(), "读者持锁期间写者必须等待");
    cancel.cancel();
    assert_eq!(
        writer.join().expect("写入线程不应 panic"),
        Err(EchoError::Interrupted)
    );

    release_tx.send(()).expect("释放读者");
    let (n, out) = reader.join().expect("读取线程不应 panic");
    assert_eq!(n, Ok(4));
    assert_eq!(out, b"keep");
    assert!(buf.is_empty(), "被中断的写者不得留下任何数据");
}

#[test]
fn cancelling_reader_blocked_on_lock_consumes_nothing() {
    let buf = Arc::new(buffer(16));
    buf.write(b"HELLO", &Cancellation::new()).expect("写入失败");

    let entered = Arc::new(Barrier::new(2));
    let (release_tx, release_rx) = mpsc::channel();
    let holder = {
        let buf = Arc::clone(&buf);
        let entered = Arc::clone(&entered);
        thread::spawn(move || {
            let mut sink = GatedSink {
                entered,
                release: release_rx,
                out: Vec::new(),
            };
            let n = buf.read(&mut sink, ReadMode::Blocking, &Cancellation::new());
            (n, sink.out)
        })
    };
    entered.wait();

    let cancel = Cancellation::new();
    let contender = {
        let buf = Arc::clone(&buf);
        let cancel = cancel.clone();
        thread::spawn(move || {
            let mut out = [0u8; 2];
            buf.read(&mut out, ReadMode::Blocking, &cancel)
        })
    };
    thread::sleep(SETTLE);
    assert!(!contender.is_finished(), "持锁读者未返回前第二个读者必须等待");
    cancel.cancel();
    assert_eq!(
        contender.join().expect("读取线程不应 panic"),
        Err(EchoError::Interrupted)
    );

    release_tx.send(()).expect("释放读者");
    let (n, out) = holder.join().expect("读取线程不应 panic");
    assert_eq!(n, Ok(5));
    assert_eq!(out, b"HELLO");
    assert!(buf.is_empty(), "只有持锁读者消费了数据");
}

#[test]
fn cancel_wakes_blocked_reader_without_waiting_out_a_slice() {
    let options = BufferOptions::default().with_wait_slice(Duration::from_secs(3600));
    let buf = Arc::new(
        EchoBuffer::create_with(Capacity::new(8).expect("容量非零"), options)
            .expect("分配缓冲失败"),
    );
    let cancel = Cancellation::new();
    let reader = {
        let buf = Arc::clone(&buf);
        let cancel = cancel.clone();
        thread::spawn(move || {
            let mut out = [0u8; 8];
            buf.read(&mut out, ReadMode::Blocking, &cancel)
        })
    };
    while cancel.registered_wakers() == 0 {
        thread::yield_now();
    }

    let started = Instant::now();
    assert!(cancel.cancel());
    assert_eq!(
        reader.join().expect("读取线程不应 panic"),
        Err(EchoError::Interrupted)
    );
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[test]
fn woken_reader_withdraws_its_waker() {
    let buf = Arc::new(buffer(8));
    let cancel = Cancellation::new();
    let reader = {
        let buf = Arc::clone(&buf);
        let cancel = cancel.clone();
        thread::spawn(move || {
            let mut out = [0u8; 8];
            buf.read(&mut out, ReadMode::Blocking, &cancel)
        })
    };
    while cancel.registered_wakers() == 0 {
        thread::yield_now();
    }

    buf.write(b"data", &Cancellation::new()).expect("写入失败");
    assert_eq!(reader.join().expect("读取线程不应 panic"), Ok(4));
    assert_eq!(cancel.registered_wakers(), 0);
    assert!(cancel.cancel(), "读者返回后令牌仍可独立使用");
}

#[test]
fn faulting_source_empties_buffer() {
    let buf = buffer(16);
    let cancel = Cancellation::new();
    buf.write(b"previous", &cancel).expect("写入失败");
    assert_eq!(
        buf.write(&FaultingSource { len: 6 }, &cancel),
        Err(EchoError::Fault)
    );
    assert!(buf.is_empty());
    assert_eq!(
        read_vec(&buf, 16, ReadMode::NonBlocking),
        Err(EchoError::WouldBlock)
    );
}

#[test]
fn faulting_sink_consumes_nothing() {
    let buf = buffer(16);
    let cancel = Cancellation::new();
    buf.write(b"intact", &cancel).expect("写入失败");
    assert_eq!(
        buf.read(&mut FaultingSink, ReadMode::Blocking, &cancel),
        Err(EchoError::Fault)
    );
    assert_eq!(buf.occupied_len(), 6);
    assert_eq!(read_vec(&buf, 16, ReadMode::NonBlocking), Ok(b"intact".to_vec()));
}

#[test]
fn concurrent_writers_leave_one_complete_payload() {
    let buf = Arc::new(buffer(64));
    let payloads: Vec<Vec<u8>> = (0..8u8).map(|i| vec![b'a' + i; 8 + i as usize]).collect();

    let writers: Vec<_> = payloads
        .iter()
        .cloned()
        .map(|payload| {
            let buf = Arc::clone(&buf);
            thread::spawn(move || buf.write(&payload, &Cancellation::new()))
        })
        .collect();
    for writer in writers {
        writer.join().expect("写入线程不应 panic").expect("写入失败");
    }

    let out = read_vec(&buf, 64, ReadMode::NonBlocking).expect("读取失败");
    assert!(
        payloads.contains(&out),
        "最终内容必须是某一次完整写入，而不是混合结果"
    );
}

#[test]
fn many_blocked_readers_share_one_payload() {
    let buf = Arc::new(buffer(8));
    let cancel = Cancellation::new();
    let readers: Vec<_> = (0..3)
        .map(|_| {
            let buf = Arc::clone(&buf);
            let cancel = cancel.clone();
            thread::spawn(move || {
                let mut out = [0u8; 8];
                buf.read(&mut out, ReadMode::Blocking, &cancel)
            })
        })
        .collect();

    thread::sleep(SETTLE);
    buf.write(b"one", &Cancellation::new()).expect("写入失败");
    thread::sleep(SETTLE);
    cancel.cancel();

    let results: Vec<_> = readers
        .into_iter()
        .map(|reader| reader.join().expect("读取线程不应 panic"))
        .collect();
    let served = results.iter().filter(|r| **r == Ok(3)).count();
    let interrupted = results
        .iter()
        .filter(|r| **r == Err(EchoError::Interrupted))
        .count();
    assert_eq!(served, 1, "单条消息只能被一个读者完整取走");
    assert_eq!(interrupted, 2);
}

#[test]
fn destroy_consumes_the_buffer() {
    let buf = buffer(8);
    buf.write(b"bye", &Cancellation::new()).expect("写入失败");
    buf.destroy();
}
