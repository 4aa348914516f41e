use crate::core::{DevicePixelLayout, Packet, PlayerError, Result};
use crate::device::VideoFrameBuffer;
use ffmpeg_next as ffmpeg;
use ffmpeg_next::{codec, format, software, util};
use log::{debug, info};

/// 视频解码协作者
///
/// 一个包可能解出 0 个、1 个或多个图像：调度器先 `send_packet`，
/// 再循环 `receive_image` 直到返回 `None`。
pub trait VideoDecode: Send {
    type Image;

    fn send_packet(&mut self, packet: &Packet) -> Result<()>;

    /// 取出一个已解码图像；暂时没有更多图像时返回 `Ok(None)`
    fn receive_image(&mut self) -> Result<Option<Self::Image>>;

    /// 图像自带的时间戳（通常从送入的包继承）
    fn image_pts(image: &Self::Image) -> Option<i64>;
}

/// 像素格式转换协作者：把解码图像写进设备原生帧缓冲
pub trait ColorConvert<I>: Send {
    fn convert(&mut self, image: &I, frame: &mut VideoFrameBuffer) -> Result<()>;
}

/// FFmpeg 软件视频解码器
pub struct FfmpegVideoDecoder {
    decoder: codec::decoder::Video,
}

impl FfmpegVideoDecoder {
    /// 从视频流创建解码器
    pub fn from_stream(stream: format::stream::Stream) -> Result<Self> {
        let context = codec::context::Context::from_parameters(stream.parameters())?;
        let decoder = context.decoder().video()?;

        info!(
            "创建视频解码器: {:?} {}x{}",
            decoder.id(),
            decoder.width(),
            decoder.height()
        );

        Ok(Self { decoder })
    }
}

impl VideoDecode for FfmpegVideoDecoder {
    type Image = util::frame::Video;

    fn send_packet(&mut self, packet: &Packet) -> Result<()> {
        let mut av_packet = ffmpeg::Packet::copy(&packet.data);
        av_packet.set_pts(packet.pts);
        av_packet.set_duration(packet.duration);

        match self.decoder.send_packet(&av_packet) {
            Ok(()) => Ok(()),
            Err(ffmpeg::Error::Eof) => {
                debug!("视频解码器收到 EOF（send_packet），执行 flush 并忽略本次包");
                self.decoder.flush();
                Ok(())
            }
            Err(e) => Err(PlayerError::DecodeError(e.to_string())),
        }
    }

    fn receive_image(&mut self) -> Result<Option<Self::Image>> {
        let mut decoded = util::frame::Video::empty();
        match self.decoder.receive_frame(&mut decoded) {
            Ok(()) => Ok(Some(decoded)),
            Err(ffmpeg::Error::Other { errno }) if errno == ffmpeg::error::EAGAIN => Ok(None),
            Err(ffmpeg::Error::Eof) => Ok(None),
            Err(e) => Err(PlayerError::DecodeError(e.to_string())),
        }
    }

    fn image_pts(image: &Self::Image) -> Option<i64> {
        image.timestamp().or_else(|| image.pts())
    }
}

/// 目标参数变化时重建的缩放上下文
struct ScalerKey {
    src_format: format::Pixel,
    src_width: u32,
    src_height: u32,
    dst_format: format::Pixel,
    dst_width: u32,
    dst_height: u32,
}

/// swscale 像素格式转换（缩放到显示模式尺寸）
pub struct SwsConverter {
    scaler: Option<(ScalerKey, software::scaling::Context)>,
}

// SwsContext 本身不是 Send，但转换器只在调度回调线程中使用
unsafe impl Send for SwsConverter {}

impl SwsConverter {
    pub fn new() -> Self {
        Self { scaler: None }
    }

    fn scaler_for(
        &mut self,
        image: &util::frame::Video,
        frame: &VideoFrameBuffer,
    ) -> Result<&mut software::scaling::Context> {
        let key = ScalerKey {
            src_format: image.format(),
            src_width: image.width(),
            src_height: image.height(),
            dst_format: frame.layout.ffmpeg_pixel(),
            dst_width: frame.width,
            dst_height: frame.height,
        };

        let stale = match &self.scaler {
            Some((current, _)) => {
                current.src_format != key.src_format
                    || current.src_width != key.src_width
                    || current.src_height != key.src_height
                    || current.dst_format != key.dst_format
                    || current.dst_width != key.dst_width
                    || current.dst_height != key.dst_height
            }
            None => true,
        };

        if stale {
            debug!(
                "初始化 swscale: {:?} {}x{} -> {:?} {}x{}",
                key.src_format,
                key.src_width,
                key.src_height,
                key.dst_format,
                key.dst_width,
                key.dst_height
            );
            let context = software::scaling::Context::get(
                key.src_format,
                key.src_width,
                key.src_height,
                key.dst_format,
                key.dst_width,
                key.dst_height,
                software::scaling::Flags::BILINEAR,
            )
            .map_err(|e| PlayerError::ConvertError(e.to_string()))?;
            self.scaler = Some((key, context));
        }

        match self.scaler.as_mut() {
            Some((_, context)) => Ok(context),
            None => Err(PlayerError::ConvertError("缩放上下文未初始化".to_string())),
        }
    }
}

impl Default for SwsConverter {
    fn default() -> Self {
        Self::new()
    }
}

impl ColorConvert<util::frame::Video> for SwsConverter {
    fn convert(&mut self, image: &util::frame::Video, frame: &mut VideoFrameBuffer) -> Result<()> {
        let mut converted = util::frame::Video::empty();
        self.scaler_for(image, frame)?
            .run(image, &mut converted)
            .map_err(|e| PlayerError::ConvertError(e.to_string()))?;

        let planes: Vec<(&[u8], usize)> = (0..converted.planes())
            .map(|plane| (converted.data(plane), converted.stride(plane)))
            .collect();
        copy_planes(&planes, frame.layout, frame.width, frame.height, &mut frame.data)
    }
}

/// 把带行跨度的源平面逐行复制到紧密排列的设备缓冲
pub(crate) fn copy_planes(
    src: &[(&[u8], usize)],
    layout: DevicePixelLayout,
    width: u32,
    height: u32,
    dst: &mut [u8],
) -> Result<()> {
    let planes = layout.planes(width, height);
    if src.len() < planes.len() {
        return Err(PlayerError::ConvertError(format!(
            "{:?} 需要 {} 个平面，实际 {} 个",
            layout,
            planes.len(),
            src.len()
        )));
    }

    let mut offset = 0;
    for (plane, ((row_size, rows), &(data, stride))) in planes.into_iter().zip(src).enumerate() {
        for y in 0..rows {
            let src_offset = y * stride;
            let dst_offset = offset + y * row_size;
            if src_offset + row_size > data.len() || dst_offset + row_size > dst.len() {
                return Err(PlayerError::ConvertError(format!(
                    "平面 {} 第 {} 行越界",
                    plane, y
                )));
            }
            dst[dst_offset..dst_offset + row_size]
                .copy_from_slice(&data[src_offset..src_offset + row_size]);
        }
        offset += row_size * rows;
    }

    Ok(())
}
