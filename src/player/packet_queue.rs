use crate::core::Packet;
use log::warn;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::mem;

/// 队列积压超过该值时每次存取都打印警告（生产者快于消费者）
pub const HIGH_WATER_PACKETS: usize = 5000;

/// 每个队列元素的固定开销（用于字节统计）
const ENTRY_OVERHEAD: usize = mem::size_of::<Packet>();

/// `get` 的结果
#[derive(Debug, PartialEq, Eq)]
pub enum QueueGet {
    Packet(Packet),
    /// 非阻塞读取时队列为空
    Empty,
    /// 队列已结束（end() 之后的阻塞读取）
    Aborted,
}

impl QueueGet {
    pub fn into_packet(self) -> Option<Packet> {
        match self {
            QueueGet::Packet(packet) => Some(packet),
            _ => None,
        }
    }
}

struct QueueInner {
    packets: VecDeque<Packet>,
    size: usize,
    abort_request: bool,
}

/// 线程安全的 FIFO 数据包队列
///
/// - 无界：`put` 永不因容量拒绝，积压只做日志观测
/// - `get(true)` 阻塞直到有数据或队列被 `end()`
/// - 元素通过移动所有权进出，`flush`/drop 时释放
pub struct PacketQueue {
    name: &'static str,
    inner: Mutex<QueueInner>,
    cond: Condvar,
}

impl PacketQueue {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            inner: Mutex::new(QueueInner {
                packets: VecDeque::new(),
                size: 0,
                abort_request: false,
            }),
            cond: Condvar::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// 追加到队尾并唤醒一个等待者
    pub fn put(&self, packet: Packet) {
        let mut inner = self.inner.lock();
        inner.size += packet.size() + ENTRY_OVERHEAD;
        inner.packets.push_back(packet);

        let count = inner.packets.len();
        if count > HIGH_WATER_PACKETS {
            warn!(
                "{} 个包存入 {} 队列 - 输入是否快于实时？",
                count, self.name
            );
        }

        self.cond.notify_one();
    }

    /// 取出队首
    ///
    /// `block == false` 时队列为空立即返回 `Empty`；
    /// `block == true` 时等待新数据，队列被 `end()` 时返回 `Aborted`。
    pub fn get(&self, block: bool) -> QueueGet {
        let mut inner = self.inner.lock();

        loop {
            if let Some(packet) = inner.packets.pop_front() {
                inner.size -= packet.size() + ENTRY_OVERHEAD;
                let remaining = inner.packets.len();
                if remaining > HIGH_WATER_PACKETS {
                    warn!("从 {} 队列取出，剩余 {} 个包", self.name, remaining);
                }
                return QueueGet::Packet(packet);
            }

            if !block {
                return QueueGet::Empty;
            }

            if inner.abort_request {
                return QueueGet::Aborted;
            }

            self.cond.wait(&mut inner);
        }
    }

    /// 释放所有已排队的包，队列仍可继续使用
    pub fn flush(&self) {
        let mut inner = self.inner.lock();
        inner.packets.clear();
        inner.size = 0;
    }

    /// 清空并置中止标志，唤醒所有阻塞的读取者
    pub fn end(&self) {
        let mut inner = self.inner.lock();
        inner.packets.clear();
        inner.size = 0;
        inner.abort_request = true;
        self.cond.notify_all();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().packets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 当前排队数据的字节数（payload + 每项开销）
    pub fn size_bytes(&self) -> usize {
        self.inner.lock().size
    }

    pub fn is_aborted(&self) -> bool {
        self.inner.lock().abort_request
    }
}
