use crate::core::{AudioFormat, Packet, PlayerError, Rational, Result, StreamInfo, StreamKind};
use crate::player::decoder::FfmpegVideoDecoder;
use crate::player::demuxer_source::MediaSource;
use ffmpeg_next as ffmpeg;
use ffmpeg_next::{codec, format, media};
use log::{debug, info, warn};
use std::path::Path;

/// 解封装器 - 负责读取媒体文件并按流类型给数据包分类
pub struct FfmpegSource {
    input_ctx: format::context::Input,
    /// 下标为流索引
    stream_kinds: Vec<StreamKind>,
    video_stream_index: usize,
    video: StreamInfo,
    audio: Option<StreamInfo>,
    source_path: String,
}

// Input 内部是裸指针，但整个实例只会移交给生产线程独占使用
unsafe impl Send for FfmpegSource {}

impl FfmpegSource {
    /// 打开媒体文件
    pub fn open(path: &Path) -> Result<Self> {
        let source_path = path.display().to_string();
        info!("正在打开文件: {}", source_path);

        let input_ctx = format::input(&path)
            .map_err(|e| PlayerError::OpenError(format!("无法打开文件 {}: {}", source_path, e)))?;

        let video_stream_index = input_ctx
            .streams()
            .best(media::Type::Video)
            .map(|s| s.index())
            .ok_or(PlayerError::NoVideoStream)?;

        let audio_stream_index = input_ctx
            .streams()
            .best(media::Type::Audio)
            .map(|s| s.index());

        let mut stream_kinds = Vec::with_capacity(input_ctx.nb_streams() as usize);
        for stream in input_ctx.streams() {
            let index = stream.index();
            let kind = if index == video_stream_index {
                StreamKind::Video
            } else if Some(index) == audio_stream_index {
                StreamKind::Audio
            } else if stream.parameters().medium() == media::Type::Data {
                StreamKind::Auxiliary
            } else {
                debug!("跳过流 #{} ({:?})", index, stream.parameters().medium());
                StreamKind::Other
            };
            stream_kinds.push(kind);
        }

        let video = Self::probe_video(&input_ctx, video_stream_index)?;
        let audio = match audio_stream_index {
            Some(index) => Some(Self::probe_audio(&input_ctx, index)?),
            None => {
                info!("未找到音频流 - 只播出视频");
                None
            }
        };

        format::context::input::dump(&input_ctx, 0, Some(&source_path));

        Ok(Self {
            input_ctx,
            stream_kinds,
            video_stream_index,
            video,
            audio,
            source_path,
        })
    }

    fn probe_video(input_ctx: &format::context::Input, index: usize) -> Result<StreamInfo> {
        let stream = input_ctx.stream(index).ok_or(PlayerError::NoVideoStream)?;
        let context = codec::context::Context::from_parameters(stream.parameters())?;
        let decoder = context.decoder().video()?;

        debug!(
            "视频流 #{}: {}x{}, 格式 {:?}, 时间基 {}",
            index,
            decoder.width(),
            decoder.height(),
            decoder.format(),
            Rational::from(stream.time_base())
        );

        Ok(StreamInfo {
            time_base: stream.time_base().into(),
            width: decoder.width(),
            height: decoder.height(),
            audio: None,
        })
    }

    fn probe_audio(input_ctx: &format::context::Input, index: usize) -> Result<StreamInfo> {
        let stream = input_ctx
            .stream(index)
            .ok_or_else(|| PlayerError::Other(format!("音频流 #{} 不存在", index)))?;
        let parameters = stream.parameters();
        let codec_id = parameters.id();
        let context = codec::context::Context::from_parameters(parameters)?;
        let decoder = context.decoder().audio()?;

        // 设备按原始 PCM 接收，位深取编码本身的精确位数
        let sample_depth =
            unsafe { ffmpeg::ffi::av_get_exact_bits_per_sample(codec_id.into()) }.max(0) as u32;
        if sample_depth == 0 {
            warn!("音频编码 {:?} 不是定长 PCM，设备可能无法正确播放", codec_id);
        }

        let format = AudioFormat {
            channels: decoder.channels(),
            sample_depth,
            bytes_per_sample: decoder.format().bytes(),
        };

        debug!(
            "音频流 #{}: {:?}, {} Hz, {} 声道, {} bit",
            index,
            codec_id,
            decoder.rate(),
            format.channels,
            format.sample_depth
        );

        Ok(StreamInfo {
            time_base: stream.time_base().into(),
            width: 0,
            height: 0,
            audio: Some(format),
        })
    }

    /// 为视频流创建解码器（只在调度线程中使用）
    pub fn video_decoder(&self) -> Result<FfmpegVideoDecoder> {
        let stream = self
            .input_ctx
            .stream(self.video_stream_index)
            .ok_or(PlayerError::NoVideoStream)?;
        FfmpegVideoDecoder::from_stream(stream)
    }
}

impl MediaSource for FfmpegSource {
    fn read_packet(&mut self) -> Result<Option<Packet>> {
        let mut packet = ffmpeg::Packet::empty();
        match packet.read(&mut self.input_ctx) {
            Ok(()) => {}
            Err(ffmpeg::Error::Eof) => return Ok(None),
            Err(e) => return Err(e.into()),
        }

        let kind = self
            .stream_kinds
            .get(packet.stream())
            .copied()
            .unwrap_or(StreamKind::Other);

        Ok(Some(Packet::new(
            kind,
            packet.pts(),
            packet.duration(),
            packet.data().map(|d| d.to_vec()).unwrap_or_default(),
        )))
    }

    fn video_stream(&self) -> StreamInfo {
        self.video
    }

    fn audio_stream(&self) -> Option<StreamInfo> {
        self.audio
    }

    fn description(&self) -> String {
        format!("FFmpeg Demuxer: {}", self.source_path)
    }
}
