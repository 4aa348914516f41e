use serde::Serialize;
use std::fmt;

/// 数据包所属的流类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    Video,
    Audio,
    /// 辅助数据流（例如字幕/控制数据，原样转发到串口）
    Auxiliary,
    Other,
}

impl StreamKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamKind::Video => "video",
            StreamKind::Audio => "audio",
            StreamKind::Auxiliary => "aux",
            StreamKind::Other => "other",
        }
    }
}

/// 有理数时间基（每个 tick 的秒数 = num / den）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Rational {
    pub num: i32,
    pub den: i32,
}

impl Rational {
    pub const fn new(num: i32, den: i32) -> Self {
        Self { num, den }
    }

    /// 把 `value`（以 `self` 为时间基）换算到 `target` 时间基，四舍五入（远离零）
    pub fn rescale(&self, value: i64, target: Rational) -> i64 {
        let b = self.num as i128 * target.den as i128;
        let c = self.den as i128 * target.num as i128;
        if c == 0 {
            return value;
        }
        // 统一成正分母
        let (b, c) = if c < 0 { (-b, -c) } else { (b, c) };
        let product = value as i128 * b;
        let half = c / 2;
        let rounded = if product >= 0 {
            (product + half) / c
        } else {
            -((-product + half) / c)
        };
        rounded.clamp(i64::MIN as i128, i64::MAX as i128) as i64
    }

    /// 每秒 tick 数（den / num），音频调度用作采样时间刻度
    pub fn ticks_per_second(&self) -> i64 {
        if self.num == 0 {
            0
        } else {
            self.den as i64 / self.num as i64
        }
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

impl From<ffmpeg_next::Rational> for Rational {
    fn from(r: ffmpeg_next::Rational) -> Self {
        Self::new(r.numerator(), r.denominator())
    }
}

/// 带时间戳的数据包
///
/// 队列之间通过移动所有权传递，最后持有者 drop 时释放 payload。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub kind: StreamKind,
    /// 显示时间戳（所属流时间基），None 表示未知
    pub pts: Option<i64>,
    /// 持续时间（同一时间基）
    pub duration: i64,
    pub data: Vec<u8>,
}

impl Packet {
    pub fn new(kind: StreamKind, pts: Option<i64>, duration: i64, data: Vec<u8>) -> Self {
        Self {
            kind,
            pts,
            duration,
            data,
        }
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }
}

/// 音频流参数（输出设备按交错 PCM 接收）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AudioFormat {
    pub channels: u16,
    /// 采样位深（16 / 32）
    pub sample_depth: u32,
    /// 单个声道单个采样占用的字节数
    pub bytes_per_sample: usize,
}

impl AudioFormat {
    /// 一个采样帧（所有声道）的字节跨度
    pub fn frame_stride(&self) -> usize {
        self.bytes_per_sample * self.channels as usize
    }
}

/// 流描述信息（由解封装器持有，核心只读引用）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamInfo {
    pub time_base: Rational,
    pub width: u32,
    pub height: u32,
    /// 仅音频流有值
    pub audio: Option<AudioFormat>,
}

/// 播出会话结束时的统计信息
#[derive(Debug, Clone, Default, Serialize)]
pub struct SessionStats {
    pub video_packets_read: u64,
    pub audio_packets_read: u64,
    pub aux_packets_read: u64,
    pub other_packets_dropped: u64,
    pub video_packets_left: usize,
    pub audio_packets_left: usize,
    pub frames_scheduled: u64,
    pub frames_displayed: u64,
    pub frames_late: u64,
    pub audio_samples_submitted: u64,
}
