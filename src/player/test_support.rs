// 测试用的协作者替身：内存媒体源、假解码器、记录型输出设备

use crate::core::{
    AudioFormat, DevicePixelLayout, OutputConnection, Packet, PlayerError, Rational, Result,
    StreamInfo,
};
use crate::device::{DisplayMode, OutputCallback, OutputDevice, VideoFrameBuffer};
use crate::player::decoder::{ColorConvert, VideoDecode};
use crate::player::demuxer_source::MediaSource;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::io::{self, Write};
use std::sync::Arc;

pub const STEREO_16: AudioFormat = AudioFormat {
    channels: 2,
    sample_depth: 16,
    bytes_per_sample: 2,
};

/// 按顺序吐出预置数据包的媒体源
pub struct VecSource {
    packets: VecDeque<Packet>,
    video: StreamInfo,
    audio: Option<StreamInfo>,
    fail_after: Option<usize>,
    read: usize,
}

impl VecSource {
    pub fn new(packets: Vec<Packet>, video_tb: Rational, audio_tb: Option<Rational>) -> Self {
        Self {
            packets: packets.into(),
            video: StreamInfo {
                time_base: video_tb,
                width: 16,
                height: 8,
                audio: None,
            },
            audio: audio_tb.map(|time_base| StreamInfo {
                time_base,
                width: 0,
                height: 0,
                audio: Some(STEREO_16),
            }),
            fail_after: None,
            read: 0,
        }
    }

    /// 读出 n 个包后返回错误
    pub fn failing_after(mut self, n: usize) -> Self {
        self.fail_after = Some(n);
        self
    }
}

impl MediaSource for VecSource {
    fn read_packet(&mut self) -> Result<Option<Packet>> {
        if self.fail_after == Some(self.read) {
            return Err(PlayerError::Other("模拟读取失败".to_string()));
        }
        self.read += 1;
        Ok(self.packets.pop_front())
    }

    fn video_stream(&self) -> StreamInfo {
        self.video
    }

    fn audio_stream(&self) -> Option<StreamInfo> {
        self.audio
    }

    fn description(&self) -> String {
        "内存测试源".to_string()
    }
}

/// 假解码图像：时间戳 + 用来填充帧缓冲的字节
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeImage {
    pub pts: Option<i64>,
    pub fill: u8,
}

/// 每个包解出 `images_per_packet` 个图像；payload 首字节为 0xff 时模拟解码失败
pub struct FakeDecoder {
    pub images_per_packet: usize,
    pending: VecDeque<FakeImage>,
}

impl FakeDecoder {
    pub fn new(images_per_packet: usize) -> Self {
        Self {
            images_per_packet,
            pending: VecDeque::new(),
        }
    }
}

impl VideoDecode for FakeDecoder {
    type Image = FakeImage;

    fn send_packet(&mut self, packet: &Packet) -> Result<()> {
        let fill = packet.data.first().copied().unwrap_or(0);
        if fill == 0xff {
            return Err(PlayerError::DecodeError("模拟解码失败".to_string()));
        }
        for i in 0..self.images_per_packet {
            self.pending.push_back(FakeImage {
                pts: packet.pts.map(|p| p + i as i64 * packet.duration),
                fill,
            });
        }
        Ok(())
    }

    fn receive_image(&mut self) -> Result<Option<FakeImage>> {
        Ok(self.pending.pop_front())
    }

    fn image_pts(image: &FakeImage) -> Option<i64> {
        image.pts
    }
}

pub struct FakeConverter;

impl ColorConvert<FakeImage> for FakeConverter {
    fn convert(&mut self, image: &FakeImage, frame: &mut VideoFrameBuffer) -> Result<()> {
        frame.data.iter_mut().for_each(|b| *b = image.fill);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledVideo {
    pub time: i64,
    pub duration: i64,
    pub time_scale: i64,
    pub first_byte: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledAudio {
    /// 本次提交的剩余字节数（包长减去它就是偏移）
    pub data_len: usize,
    pub requested: u32,
    pub accepted: u32,
    pub time: i64,
    pub time_scale: i64,
}

#[derive(Default)]
pub struct RecordingState {
    pub frames: Vec<ScheduledVideo>,
    pub audio: Vec<ScheduledAudio>,
    /// 依次返回的接收数；用完后全部接收
    pub accept_plan: VecDeque<u32>,
    pub buffered: u32,
    pub fail_schedule_video: bool,
    pub playback_started: u32,
    pub preroll_started: bool,
    pub stopped: bool,
    pub video_enabled: bool,
    pub audio_enabled: bool,
}

/// 记录所有调用的输出设备（不计时、不回调）
pub struct RecordingDevice {
    pub mode: DisplayMode,
    pub state: Mutex<RecordingState>,
}

impl RecordingDevice {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            mode: DisplayMode::new("test", 16, 8, 1000, 25000),
            state: Mutex::new(RecordingState::default()),
        })
    }
}

impl OutputDevice for RecordingDevice {
    fn model_name(&self) -> String {
        "recording".to_string()
    }

    fn display_modes(&self) -> Vec<DisplayMode> {
        vec![self.mode.clone()]
    }

    fn set_connection(&self, _connection: OutputConnection) -> Result<()> {
        Ok(())
    }

    fn set_callback(&self, _handler: Arc<dyn OutputCallback>) {}

    fn enable_video_output(&self, _mode: &DisplayMode) -> Result<()> {
        self.state.lock().video_enabled = true;
        Ok(())
    }

    fn enable_audio_output(&self, _sample_rate: u32, _format: AudioFormat) -> Result<()> {
        self.state.lock().audio_enabled = true;
        Ok(())
    }

    fn create_video_frame(
        &self,
        width: u32,
        height: u32,
        _row_bytes: usize,
        layout: DevicePixelLayout,
    ) -> Result<VideoFrameBuffer> {
        Ok(VideoFrameBuffer::new(width, height, layout))
    }

    fn schedule_video_frame(
        &self,
        frame: VideoFrameBuffer,
        time: i64,
        duration: i64,
        time_scale: i64,
    ) -> Result<()> {
        let mut state = self.state.lock();
        if state.fail_schedule_video {
            return Err(PlayerError::DeviceError("模拟调度失败".to_string()));
        }
        state.frames.push(ScheduledVideo {
            time,
            duration,
            time_scale,
            first_byte: frame.data.first().copied().unwrap_or(0),
        });
        Ok(())
    }

    fn buffered_audio_sample_frames(&self) -> u32 {
        self.state.lock().buffered
    }

    fn schedule_audio_samples(
        &self,
        data: &[u8],
        sample_frames: u32,
        time: i64,
        time_scale: i64,
    ) -> Result<u32> {
        let mut state = self.state.lock();
        let accepted = state
            .accept_plan
            .pop_front()
            .unwrap_or(sample_frames)
            .min(sample_frames);
        state.audio.push(ScheduledAudio {
            data_len: data.len(),
            requested: sample_frames,
            accepted,
            time,
            time_scale,
        });
        Ok(accepted)
    }

    fn begin_audio_preroll(&self) -> Result<()> {
        self.state.lock().preroll_started = true;
        Ok(())
    }

    fn start_scheduled_playback(&self, _start_time: i64, _time_scale: i64, _speed: f64) -> Result<()> {
        self.state.lock().playback_started += 1;
        Ok(())
    }

    fn stop_scheduled_playback(&self) -> Result<()> {
        self.state.lock().stopped = true;
        Ok(())
    }

    fn disable_audio_output(&self) {
        self.state.lock().audio_enabled = false;
    }

    fn disable_video_output(&self) {
        self.state.lock().video_enabled = false;
    }
}

/// 可在测试线程间共享的写入端（模拟串口）
#[derive(Clone, Default)]
pub struct SharedBuffer(pub Arc<Mutex<Vec<Vec<u8>>>>);

impl SharedBuffer {
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.0.lock().clone()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().push(buf.to_vec());
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
