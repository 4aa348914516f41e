use crate::device::OutputDevice;
use crate::player::demuxer_thread::{ProducerStats, ProducerThread};
use crate::player::session::SessionContext;
use crossbeam_channel::{bounded, Receiver, Sender};
use log::{debug, info, warn};
use std::fmt;
use std::time::Duration;

/// 触发结束的原因
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownReason {
    /// 输入读完（正常结束）
    EndOfStream,
    /// 读包失败
    SourceError(String),
    /// 外部中断（Ctrl+C）
    Interrupted,
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownReason::EndOfStream => write!(f, "输入结束"),
            ShutdownReason::SourceError(e) => write!(f, "读取失败: {}", e),
            ShutdownReason::Interrupted => write!(f, "收到中断信号"),
        }
    }
}

/// 跨线程的一次性唤醒信号
///
/// 容量为 1 的通道：第一次触发被保留到主线程取走，之后的触发被忽略。
/// 在主线程开始等待之前触发也不会丢失。
#[derive(Clone)]
pub struct ShutdownSignal {
    tx: Sender<ShutdownReason>,
    rx: Receiver<ShutdownReason>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        let (tx, rx) = bounded(1);
        Self { tx, rx }
    }

    /// 触发结束；已有未处理的触发时返回 false
    pub fn trigger(&self, reason: ShutdownReason) -> bool {
        self.tx.try_send(reason).is_ok()
    }

    /// 阻塞直到被触发
    pub fn wait(&self) -> ShutdownReason {
        // 自己持有发送端，recv 不会因断开而失败
        self.rx.recv().unwrap_or(ShutdownReason::Interrupted)
    }

    pub fn wait_timeout(&self, timeout: Duration) -> Option<ShutdownReason> {
        self.rx.recv_timeout(timeout).ok()
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// 按固定顺序拆除会话：
/// 停止生产线程 -> 结束所有队列 -> 停止定时播出 -> 关闭音视频输出 -> 等待生产线程退出
pub fn coordinate_shutdown(
    ctx: &SessionContext,
    device: &dyn OutputDevice,
    producer: ProducerThread,
) -> ProducerStats {
    info!("退出中，开始清理");

    ctx.stop();
    for queue in [&ctx.video_queue, &ctx.audio_queue, &ctx.aux_queue] {
        if !queue.is_aborted() {
            debug!("结束 {} 队列（剩余 {} 个包）", queue.name(), queue.len());
        }
        queue.end();
    }

    if let Err(e) = device.stop_scheduled_playback() {
        warn!("停止定时播出失败: {}", e);
    }
    device.disable_audio_output();
    device.disable_video_output();

    producer.join()
}
