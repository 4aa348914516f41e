use crate::core::{Result, StreamKind};
use crate::player::demuxer_source::MediaSource;
use crate::player::session::SessionContext;
use crate::player::shutdown::ShutdownReason;
use log::{debug, error, info, warn};
use serde::Serialize;
use std::process;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

fn log_ctx() -> String {
    format!("[pid:{} tid:{:?}]", process::id(), thread::current().id())
}

/// 视频队列积压超过该值时提示一次（输入可能快于实时）
const VIDEO_BACKLOG_WARNING: usize = 1000;

/// 生产线程读包统计
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProducerStats {
    pub video_packets: u64,
    pub audio_packets: u64,
    pub aux_packets: u64,
    pub other_packets: u64,
}

/// 解封装/归一化生产线程
///
/// 唯一的正常退出路径是读到 EOF 或读包失败：此时触发结束信号并退出。
/// 运行标志被清除时在下一次循环退出（不会被抢占中断）。
pub struct ProducerThread {
    thread_handle: Option<JoinHandle<ProducerStats>>,
}

impl ProducerThread {
    /// 启动生产线程
    pub fn start(mut source: Box<dyn MediaSource>, ctx: Arc<SessionContext>) -> Result<Self> {
        let handle = thread::Builder::new()
            .name("demux-producer".to_string())
            .spawn(move || Self::fill_queues(&mut *source, &ctx))?;

        Ok(Self {
            thread_handle: Some(handle),
        })
    }

    /// 生产循环（在独立线程中运行）
    pub(crate) fn fill_queues(source: &mut dyn MediaSource, ctx: &SessionContext) -> ProducerStats {
        info!("{} 🎬 生产线程启动: {}", log_ctx(), source.description());

        let mut stats = ProducerStats::default();
        let mut backlog_warned = false;

        // 仅用于日志
        const LOG_FIRST_N: u64 = 5;

        while ctx.is_running() {
            let mut packet = match source.read_packet() {
                Ok(Some(packet)) => packet,
                Ok(None) => {
                    info!("{} 📄 到达文件末尾", log_ctx());
                    ctx.shutdown.trigger(ShutdownReason::EndOfStream);
                    break;
                }
                Err(e) => {
                    error!("{} ❌ 读取包失败: {}", log_ctx(), e);
                    ctx.shutdown.trigger(ShutdownReason::SourceError(e.to_string()));
                    break;
                }
            };

            if !backlog_warned && ctx.video_queue.len() > VIDEO_BACKLOG_WARNING {
                backlog_warned = true;
                warn!(
                    "{} 视频队列已积压 {} 字节，后面可能出问题",
                    log_ctx(),
                    ctx.video_queue.size_bytes()
                );
            }

            match packet.kind {
                StreamKind::Video => {
                    stats.video_packets += 1;
                    if stats.video_packets <= LOG_FIRST_N {
                        debug!("{} 📦 视频包 #{} pts={:?}", log_ctx(), stats.video_packets, packet.pts);
                    }
                    packet.pts = ctx.pts.normalize(StreamKind::Video, packet.pts);
                    ctx.video_queue.put(packet);
                }
                StreamKind::Audio => {
                    stats.audio_packets += 1;
                    if stats.audio_packets <= LOG_FIRST_N {
                        debug!("{} 🔊 音频包 #{} pts={:?}", log_ctx(), stats.audio_packets, packet.pts);
                    }
                    packet.pts = ctx.pts.normalize(StreamKind::Audio, packet.pts);
                    ctx.audio_queue.put(packet);
                }
                StreamKind::Auxiliary => {
                    stats.aux_packets += 1;
                    ctx.aux_queue.put(packet);
                }
                StreamKind::Other => {
                    stats.other_packets += 1;
                }
            }
        }

        info!(
            "{} 🛑 生产线程退出（视频 {}，音频 {}，辅助 {}，丢弃 {}）",
            log_ctx(),
            stats.video_packets,
            stats.audio_packets,
            stats.aux_packets,
            stats.other_packets
        );
        stats
    }

    /// 等待线程退出（调用前应先清除运行标志）
    pub fn join(mut self) -> ProducerStats {
        match self.thread_handle.take() {
            Some(handle) => handle.join().unwrap_or_else(|_| {
                error!("{} ❌ 生产线程 panic", log_ctx());
                ProducerStats::default()
            }),
            None => ProducerStats::default(),
        }
    }
}

impl Drop for ProducerThread {
    fn drop(&mut self) {
        if self.thread_handle.is_some() {
            warn!("{} ⚠ ProducerThread 被 drop 但未 join，线程将在读到下一个包后自行退出", log_ctx());
        }
    }
}
