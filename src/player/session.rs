use crate::core::{
    AudioFormat, OutputConnection, PixelDepth, PlayerError, Rational, Result, SessionStats,
};
use crate::device::{DisplayMode, FrameCompletion, OutputCallback, OutputDevice, AUDIO_SAMPLE_RATE};
use crate::player::audio_feeder::AudioFeeder;
use crate::player::aux_output::AuxOutput;
use crate::player::decoder::{ColorConvert, VideoDecode};
use crate::player::demuxer_source::MediaSource;
use crate::player::demuxer_thread::ProducerThread;
use crate::player::packet_queue::PacketQueue;
use crate::player::pts::PtsNormalizer;
use crate::player::scheduler::{OutputScheduler, PREROLL_FRAMES};
use crate::player::shutdown::{coordinate_shutdown, ShutdownReason, ShutdownSignal};
use log::{debug, error, info};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// 设备接受的声道数
const SUPPORTED_CHANNELS: [u16; 3] = [2, 8, 16];
/// 设备接受的采样位深
const SUPPORTED_SAMPLE_DEPTHS: [u32; 2] = [16, 32];

/// 一次播出会话共享的状态
///
/// 会话开始时创建一次，生产线程与设备回调线程通过 `Arc` 共享，
/// 会话结束时由 `coordinate_shutdown` 统一拆除。
pub struct SessionContext {
    pub video_queue: PacketQueue,
    pub audio_queue: PacketQueue,
    pub aux_queue: PacketQueue,
    pub pts: PtsNormalizer,
    pub shutdown: ShutdownSignal,
    running: AtomicBool,
}

impl SessionContext {
    pub fn new(video_time_base: Rational, audio_time_base: Option<Rational>) -> Self {
        Self::with_shutdown(video_time_base, audio_time_base, ShutdownSignal::new())
    }

    pub fn with_shutdown(
        video_time_base: Rational,
        audio_time_base: Option<Rational>,
        shutdown: ShutdownSignal,
    ) -> Self {
        Self {
            video_queue: PacketQueue::new("video"),
            audio_queue: PacketQueue::new("audio"),
            aux_queue: PacketQueue::new("aux"),
            pts: PtsNormalizer::new(video_time_base, audio_time_base),
            shutdown,
            running: AtomicBool::new(true),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

/// 会话参数
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub mode_index: usize,
    pub connection: Option<OutputConnection>,
    pub pixel_depth: PixelDepth,
    pub prebuffer: Duration,
}

/// 检查音频配置是否被设备支持
pub fn validate_audio_format(format: &AudioFormat) -> Result<()> {
    if !SUPPORTED_CHANNELS.contains(&format.channels) {
        return Err(PlayerError::UnsupportedAudio(format!(
            "不支持 {} 声道，请使用 2、8 或 16 声道",
            format.channels
        )));
    }
    if !SUPPORTED_SAMPLE_DEPTHS.contains(&format.sample_depth) {
        return Err(PlayerError::UnsupportedAudio(format!(
            "不支持 {}bit 音频，请使用 16bit 或 32bit",
            format.sample_depth
        )));
    }
    Ok(())
}

/// 设备回调的实现：帧完成驱动调度器，音频回调驱动音频补给
struct Playout<D: VideoDecode, C> {
    ctx: Arc<SessionContext>,
    device: Arc<dyn OutputDevice>,
    scheduler: OutputScheduler<D, C>,
    feeder: Option<AudioFeeder>,
}

impl<D, C> OutputCallback for Playout<D, C>
where
    D: VideoDecode,
    C: ColorConvert<D::Image>,
{
    fn scheduled_frame_completed(&self, result: FrameCompletion) {
        if result == FrameCompletion::DisplayedLate {
            debug!("帧播出延迟");
        }
        if self.ctx.is_running() {
            self.scheduler.schedule_next_frame(&self.ctx, false);
        }
    }

    fn render_audio_samples(&self, preroll: bool) {
        // 拆除开始后不再补给，也不能重新启动播出
        if !self.ctx.is_running() {
            return;
        }
        if let Some(feeder) = &self.feeder {
            feeder.write_next_audio_samples(&self.ctx.audio_queue);

            if preroll {
                if let Err(e) = self.device.start_scheduled_playback(0, 100, 1.0) {
                    error!("启动定时播出失败: {}", e);
                }
            }
        }
    }
}

/// 播出会话：启动生产线程，预缓冲，启动设备，等待结束信号后拆除
pub struct Session<D: VideoDecode, C> {
    ctx: Arc<SessionContext>,
    device: Arc<dyn OutputDevice>,
    playout: Arc<Playout<D, C>>,
    mode: DisplayMode,
    audio: Option<AudioFormat>,
    options: SessionOptions,
}

impl<D, C> Session<D, C>
where
    D: VideoDecode + 'static,
    C: ColorConvert<D::Image> + 'static,
{
    /// 准备会话；所有启动期的致命错误都在启动任何线程之前返回
    pub fn new(
        source: &dyn MediaSource,
        decoder: D,
        converter: C,
        device: Arc<dyn OutputDevice>,
        aux: Option<AuxOutput>,
        options: SessionOptions,
        shutdown: ShutdownSignal,
    ) -> Result<Self> {
        let video = source.video_stream();
        let audio_stream = source.audio_stream();

        let audio = match audio_stream.and_then(|s| s.audio) {
            Some(format) => {
                validate_audio_format(&format)?;
                Some(format)
            }
            None => None,
        };

        info!("使用输出设备: {}", device.model_name());
        let mode = device.display_mode(options.mode_index)?;
        info!("选择显示模式: {}", mode);

        if let Some(connection) = options.connection {
            device.set_connection(connection)?;
        }

        let ctx = Arc::new(SessionContext::with_shutdown(
            video.time_base,
            audio_stream.map(|s| s.time_base),
            shutdown,
        ));

        let scheduler = OutputScheduler::new(
            device.clone(),
            mode.clone(),
            options.pixel_depth.layout(),
            video.time_base,
            decoder,
            converter,
            aux,
        );
        let feeder = match (audio, audio_stream) {
            (Some(format), Some(stream)) => {
                Some(AudioFeeder::new(device.clone(), format, stream.time_base))
            }
            _ => None,
        };

        let playout = Arc::new(Playout {
            ctx: ctx.clone(),
            device: device.clone(),
            scheduler,
            feeder,
        });
        device.set_callback(playout.clone());

        Ok(Self {
            ctx,
            device,
            playout,
            mode,
            audio,
            options,
        })
    }

    /// 运行到输入结束或被中断
    pub fn run(self, source: Box<dyn MediaSource>) -> Result<SessionStats> {
        let producer = ProducerThread::start(source, self.ctx.clone())?;

        // 预缓冲：先让生产线程填充队列
        thread::sleep(self.options.prebuffer);

        let reason = match self.start_running() {
            Ok(()) => self.ctx.shutdown.wait(),
            Err(e) => {
                error!("启动播出失败: {}", e);
                let producer_stats = coordinate_shutdown(&self.ctx, &*self.device, producer);
                debug!("生产线程统计: {:?}", producer_stats);
                return Err(e);
            }
        };
        info!("结束播出: {}", reason);

        let video_left = self.ctx.video_queue.len();
        let audio_left = self.ctx.audio_queue.len();
        let producer_stats = coordinate_shutdown(&self.ctx, &*self.device, producer);
        let device_stats = self.device.stats();

        let stats = SessionStats {
            video_packets_read: producer_stats.video_packets,
            audio_packets_read: producer_stats.audio_packets,
            aux_packets_read: producer_stats.aux_packets,
            other_packets_dropped: producer_stats.other_packets,
            video_packets_left: video_left,
            audio_packets_left: audio_left,
            frames_scheduled: device_stats.frames_scheduled,
            frames_displayed: device_stats.frames_displayed,
            frames_late: device_stats.frames_late,
            audio_samples_submitted: self
                .playout
                .feeder
                .as_ref()
                .map(|f| f.samples_submitted())
                .unwrap_or(0),
        };

        if let ShutdownReason::SourceError(e) = reason {
            // 读包失败同样按正常结束处理，只记录原因
            info!("输入在读取错误后结束: {}", e);
        }

        Ok(stats)
    }

    /// 启用输出、预调度若干帧，然后开始音频预滚或直接开始播出
    fn start_running(&self) -> Result<()> {
        self.device.enable_video_output(&self.mode)?;

        match self.audio {
            Some(format) => {
                self.device.enable_audio_output(AUDIO_SAMPLE_RATE, format)?;

                for _ in 0..PREROLL_FRAMES {
                    self.playout.scheduler.schedule_next_frame(&self.ctx, true);
                }

                // 音频预滚开始后设备会回调音频补给，由它启动定时播出
                self.device.begin_audio_preroll()?;
            }
            None => {
                for _ in 0..PREROLL_FRAMES {
                    self.playout.scheduler.schedule_next_frame(&self.ctx, true);
                }

                self.device.start_scheduled_playback(0, 100, 1.0)?;
            }
        }

        Ok(())
    }
}
