use crate::core::{PlayerError, Result};
use ffmpeg_next::format::Pixel;
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

/// 默认预缓冲时长（开始播出前让生产线程先填充队列）
pub const DEFAULT_PREBUFFER_MS: u64 = 2000;

/// 设备端像素位深
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PixelDepth {
    Eight,
    Ten,
}

impl PixelDepth {
    pub fn from_bits(bits: u32) -> Result<Self> {
        match bits {
            8 => Ok(PixelDepth::Eight),
            10 => Ok(PixelDepth::Ten),
            other => Err(PlayerError::Other(format!(
                "像素位深只能是 8 或 10，收到 {}",
                other
            ))),
        }
    }

    pub fn layout(&self) -> DevicePixelLayout {
        match self {
            PixelDepth::Eight => DevicePixelLayout::Uyvy422,
            PixelDepth::Ten => DevicePixelLayout::Yuv422p10,
        }
    }
}

/// 设备帧缓冲中的像素排布
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DevicePixelLayout {
    /// 8bit 打包 4:2:2（每像素 2 字节）
    Uyvy422,
    /// 10bit 平面 4:2:2（每个分量 2 字节，Y/U/V 三个平面依次排列）
    Yuv422p10,
}

impl DevicePixelLayout {
    /// 对应的 FFmpeg 像素格式（swscale 目标格式）
    pub fn ffmpeg_pixel(&self) -> Pixel {
        match self {
            DevicePixelLayout::Uyvy422 => Pixel::UYVY422,
            DevicePixelLayout::Yuv422p10 => Pixel::YUV422P10LE,
        }
    }

    /// 每个平面的 (行字节数, 行数)，平面在缓冲区中按 1 字节对齐紧密排列
    pub fn planes(&self, width: u32, height: u32) -> Vec<(usize, usize)> {
        let w = width as usize;
        let h = height as usize;
        match self {
            DevicePixelLayout::Uyvy422 => vec![(w * 2, h)],
            DevicePixelLayout::Yuv422p10 => {
                let chroma = w.div_ceil(2) * 2;
                vec![(w * 2, h), (chroma, h), (chroma, h)]
            }
        }
    }

    /// 首个平面的行字节数（设备创建帧时需要）
    pub fn row_bytes(&self, width: u32) -> usize {
        width as usize * 2
    }

    pub fn buffer_size(&self, width: u32, height: u32) -> usize {
        self.planes(width, height)
            .iter()
            .map(|(row, rows)| row * rows)
            .sum()
    }
}

/// 输出接口类型（视频接口 + 对应的音频接口）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OutputConnection {
    /// 复合视频 + 模拟音频
    Composite,
    /// 分量视频 + 模拟音频
    Component,
    /// HDMI 视频 + 嵌入音频
    Hdmi,
    /// SDI 视频 + 嵌入音频
    Sdi,
}

impl OutputConnection {
    /// 命令行编号：1..=4，0 表示保持设备当前设置
    pub fn from_index(index: u32) -> Result<Option<Self>> {
        match index {
            0 => Ok(None),
            1 => Ok(Some(OutputConnection::Composite)),
            2 => Ok(Some(OutputConnection::Component)),
            3 => Ok(Some(OutputConnection::Hdmi)),
            4 => Ok(Some(OutputConnection::Sdi)),
            other => Err(PlayerError::Other(format!("未知的输出接口编号: {}", other))),
        }
    }

    pub fn embedded_audio(&self) -> bool {
        matches!(self, OutputConnection::Hdmi | OutputConnection::Sdi)
    }
}

/// 一次播出会话的配置（由命令行参数生成）
#[derive(Debug, Clone, Serialize)]
pub struct PlayoutConfig {
    pub input: PathBuf,
    pub device_index: usize,
    pub mode_index: usize,
    pub connection: Option<OutputConnection>,
    pub pixel_depth: PixelDepth,
    #[serde(serialize_with = "serialize_millis")]
    pub prebuffer: Duration,
    pub aux_device: Option<PathBuf>,
    pub monitor_audio: bool,
}

impl PlayoutConfig {
    pub fn new(input: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            device_index: 0,
            mode_index: 2,
            connection: None,
            pixel_depth: PixelDepth::Eight,
            prebuffer: Duration::from_millis(DEFAULT_PREBUFFER_MS),
            aux_device: None,
            monitor_audio: false,
        }
    }
}

fn serialize_millis<S: serde::Serializer>(d: &Duration, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}
