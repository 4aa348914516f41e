// 定时输出设备抽象
//
// 核心只依赖 `OutputDevice` / `OutputCallback` 两个 trait；
// 设备在自己的回调线程里驱动调度器和音频补给。

pub mod audio_output;
pub mod virtual_device;

use crate::core::{AudioFormat, DevicePixelLayout, OutputConnection, PlayerError, Result};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

pub use audio_output::AudioMonitor;
pub use virtual_device::VirtualDevice;

/// 设备固定的音频采样率
pub const AUDIO_SAMPLE_RATE: u32 = 48_000;

/// 显示模式
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisplayMode {
    pub name: String,
    pub width: u32,
    pub height: u32,
    /// 每帧持续 `frame_duration / time_scale` 秒
    pub frame_duration: i64,
    pub time_scale: i64,
}

impl DisplayMode {
    pub fn new(name: &str, width: u32, height: u32, frame_duration: i64, time_scale: i64) -> Self {
        Self {
            name: name.to_string(),
            width,
            height,
            frame_duration,
            time_scale,
        }
    }

    pub fn frame_interval(&self) -> Duration {
        if self.time_scale <= 0 {
            return Duration::ZERO;
        }
        let nanos = self.frame_duration as i128 * 1_000_000_000 / self.time_scale as i128;
        Duration::from_nanos(nanos.max(0) as u64)
    }

    pub fn frames_per_second(&self) -> f64 {
        self.time_scale as f64 / self.frame_duration as f64
    }
}

impl fmt::Display for DisplayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}x{} @ {:.2} fps)",
            self.name,
            self.width,
            self.height,
            self.frames_per_second()
        )
    }
}

/// 常见广播显示模式（设备枚举顺序即命令行 `-m` 的编号）
pub fn standard_modes() -> Vec<DisplayMode> {
    vec![
        DisplayMode::new("NTSC", 720, 486, 1001, 30000),
        DisplayMode::new("PAL", 720, 576, 1000, 25000),
        DisplayMode::new("HD 1080i 50", 1920, 1080, 1000, 25000),
        DisplayMode::new("HD 1080i 59.94", 1920, 1080, 1001, 30000),
        DisplayMode::new("HD 1080p 23.98", 1920, 1080, 1001, 24000),
        DisplayMode::new("HD 1080p 24", 1920, 1080, 1000, 24000),
        DisplayMode::new("HD 1080p 25", 1920, 1080, 1000, 25000),
        DisplayMode::new("HD 1080p 29.97", 1920, 1080, 1001, 30000),
        DisplayMode::new("HD 1080p 30", 1920, 1080, 1000, 30000),
        DisplayMode::new("HD 720p 50", 1280, 720, 1000, 50000),
        DisplayMode::new("HD 720p 59.94", 1280, 720, 1001, 60000),
    ]
}

/// 设备原生视频帧缓冲（按显示模式尺寸分配）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoFrameBuffer {
    pub width: u32,
    pub height: u32,
    pub row_bytes: usize,
    pub layout: DevicePixelLayout,
    pub data: Vec<u8>,
}

impl VideoFrameBuffer {
    pub fn new(width: u32, height: u32, layout: DevicePixelLayout) -> Self {
        Self {
            width,
            height,
            row_bytes: layout.row_bytes(width),
            layout,
            data: vec![0u8; layout.buffer_size(width, height)],
        }
    }
}

/// 已调度帧的完成结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameCompletion {
    Completed,
    DisplayedLate,
    Dropped,
    Flushed,
}

/// 设备侧统计
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeviceStats {
    pub frames_scheduled: u64,
    pub frames_displayed: u64,
    pub frames_late: u64,
    pub frames_flushed: u64,
    pub audio_samples_scheduled: u64,
    pub audio_samples_played: u64,
    /// 帧间隔内缓冲不足一个间隔的音频的次数
    pub audio_underruns: u64,
}

/// 设备通知核心的两个回调
///
/// 在设备回调线程上调用，实现必须非阻塞、有界耗时。
pub trait OutputCallback: Send + Sync {
    /// 一帧播出完成（每个硬件帧间隔一次）
    fn scheduled_frame_completed(&self, result: FrameCompletion);

    /// 设备需要更多音频采样；`preroll` 为 true 表示仍处于预滚阶段
    fn render_audio_samples(&self, preroll: bool);
}

/// 定时输出设备协作者
pub trait OutputDevice: Send + Sync {
    fn model_name(&self) -> String;

    fn display_modes(&self) -> Vec<DisplayMode>;

    fn display_mode(&self, index: usize) -> Result<DisplayMode> {
        self.display_modes()
            .into_iter()
            .nth(index)
            .ok_or(PlayerError::NoDisplayMode(index))
    }

    fn set_connection(&self, connection: OutputConnection) -> Result<()>;

    fn set_callback(&self, handler: Arc<dyn OutputCallback>);

    fn enable_video_output(&self, mode: &DisplayMode) -> Result<()>;

    fn enable_audio_output(&self, sample_rate: u32, format: AudioFormat) -> Result<()>;

    fn create_video_frame(
        &self,
        width: u32,
        height: u32,
        row_bytes: usize,
        layout: DevicePixelLayout,
    ) -> Result<VideoFrameBuffer>;

    /// 在 `time / time_scale` 秒处播出，持续 `duration / time_scale` 秒
    fn schedule_video_frame(
        &self,
        frame: VideoFrameBuffer,
        time: i64,
        duration: i64,
        time_scale: i64,
    ) -> Result<()>;

    fn buffered_audio_sample_frames(&self) -> u32;

    /// 提交交错 PCM 采样帧，返回设备实际接收的采样帧数（可能少于请求数）
    fn schedule_audio_samples(
        &self,
        data: &[u8],
        sample_frames: u32,
        time: i64,
        time_scale: i64,
    ) -> Result<u32>;

    fn begin_audio_preroll(&self) -> Result<()>;

    fn start_scheduled_playback(&self, start_time: i64, time_scale: i64, speed: f64) -> Result<()>;

    fn stop_scheduled_playback(&self) -> Result<()>;

    fn disable_audio_output(&self);

    fn disable_video_output(&self);

    fn stats(&self) -> DeviceStats {
        DeviceStats::default()
    }
}

/// 系统中可用的输出设备
pub fn enumerate_devices(monitor_audio: bool) -> Vec<Arc<dyn OutputDevice>> {
    vec![Arc::new(VirtualDevice::new("Virtual Playout", monitor_audio)) as Arc<dyn OutputDevice>]
}

/// 按编号打开输出设备
pub fn open_device(index: usize, monitor_audio: bool) -> Result<Arc<dyn OutputDevice>> {
    enumerate_devices(monitor_audio)
        .into_iter()
        .nth(index)
        .ok_or(PlayerError::NoDevice(index))
}
