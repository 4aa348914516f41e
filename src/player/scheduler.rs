use crate::core::{DevicePixelLayout, Packet, Rational, StreamKind};
use crate::device::{DisplayMode, OutputDevice, VideoFrameBuffer};
use crate::player::aux_output::AuxOutput;
use crate::player::decoder::{ColorConvert, VideoDecode};
use crate::player::packet_queue::QueueGet;
use crate::player::session::SessionContext;
use log::{debug, warn};
use parking_lot::Mutex;
use std::sync::Arc;

/// 开始播出前预先调度的帧数
pub const PREROLL_FRAMES: usize = 10;

struct CodecState<D, C> {
    decoder: D,
    converter: C,
    /// 上一帧结束时间，用于给没有时间戳的图像定时
    next_pts: Option<i64>,
}

/// 输出调度器
///
/// 每个设备帧完成回调调用一次：取一个视频包，解码出全部图像，
/// 转换到设备像素格式并按设备时间刻度调度。队列为空时什么都不做。
/// 解码器只在这里被访问。
pub struct OutputScheduler<D: VideoDecode, C> {
    device: Arc<dyn OutputDevice>,
    mode: DisplayMode,
    layout: DevicePixelLayout,
    time_base: Rational,
    codec: Mutex<CodecState<D, C>>,
    aux: Mutex<Option<AuxOutput>>,
}

impl<D, C> OutputScheduler<D, C>
where
    D: VideoDecode,
    C: ColorConvert<D::Image>,
{
    pub fn new(
        device: Arc<dyn OutputDevice>,
        mode: DisplayMode,
        layout: DevicePixelLayout,
        time_base: Rational,
        decoder: D,
        converter: C,
        aux: Option<AuxOutput>,
    ) -> Self {
        Self {
            device,
            mode,
            layout,
            time_base,
            codec: Mutex::new(CodecState {
                decoder,
                converter,
                next_pts: None,
            }),
            aux: Mutex::new(aux),
        }
    }

    /// 调度下一帧
    pub fn schedule_next_frame(&self, ctx: &SessionContext, prerolling: bool) {
        self.forward_aux(ctx);

        let packet = match ctx.video_queue.get(false) {
            QueueGet::Packet(packet) => packet,
            QueueGet::Empty | QueueGet::Aborted => {
                if !prerolling {
                    debug!("视频队列为空，跳过本次调度");
                }
                return;
            }
        };

        let frame = match self.create_frame() {
            Some(frame) => frame,
            None => return,
        };

        self.decode_and_schedule(&packet, frame);
    }

    /// 非阻塞取出一个辅助数据包并转发
    fn forward_aux(&self, ctx: &SessionContext) {
        if let QueueGet::Packet(packet) = ctx.aux_queue.get(false) {
            debug_assert_eq!(packet.kind, StreamKind::Auxiliary);
            if let Some(aux) = self.aux.lock().as_mut() {
                aux.forward(&packet.data);
            }
        }
    }

    fn create_frame(&self) -> Option<VideoFrameBuffer> {
        match self.device.create_video_frame(
            self.mode.width,
            self.mode.height,
            self.layout.row_bytes(self.mode.width),
            self.layout,
        ) {
            Ok(frame) => Some(frame),
            Err(e) => {
                warn!("创建视频帧失败: {}", e);
                None
            }
        }
    }

    fn decode_and_schedule(&self, packet: &Packet, first_frame: VideoFrameBuffer) {
        let mut codec = self.codec.lock();

        if let Err(e) = codec.decoder.send_packet(packet) {
            warn!("解码失败（已跳过）: {}", e);
            return;
        }

        let duration = if packet.duration > 0 {
            packet.duration
        } else {
            self.mode_frame_duration()
        };

        let mut spare = Some(first_frame);
        let mut index = 0usize;
        loop {
            let image = match codec.decoder.receive_image() {
                Ok(Some(image)) => image,
                Ok(None) => break,
                Err(e) => {
                    warn!("解码失败（已跳过）: {}", e);
                    break;
                }
            };

            let mut frame = match spare.take() {
                Some(frame) => frame,
                None => match self.create_frame() {
                    Some(frame) => frame,
                    None => break,
                },
            };

            let pts = D::image_pts(&image)
                .or(if index == 0 { packet.pts } else { None })
                .or(codec.next_pts)
                .unwrap_or(0);
            index += 1;
            codec.next_pts = Some(pts + duration);

            if let Err(e) = codec.converter.convert(&image, &mut frame) {
                warn!("像素格式转换失败（已跳过）: {}", e);
                continue;
            }

            if let Err(e) = self.device.schedule_video_frame(
                frame,
                pts * self.time_base.num as i64,
                duration * self.time_base.num as i64,
                self.time_base.den as i64,
            ) {
                warn!("调度视频帧失败: {}", e);
            }
        }

        if index > 1 {
            debug!("一个包解出 {} 帧", index);
        }
    }

    /// 显示模式的一帧时长换算到视频流时间基
    fn mode_frame_duration(&self) -> i64 {
        let frame = Rational::new(self.mode.frame_duration as i32, self.mode.time_scale as i32);
        frame.rescale(1, self.time_base).max(1)
    }
}
