use crate::core::{AudioFormat, Rational};
use crate::device::{OutputDevice, AUDIO_SAMPLE_RATE};
use crate::player::packet_queue::{PacketQueue, QueueGet};
use log::warn;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// 设备已缓冲的采样帧达到该值时不再补充（1/4 秒，低延迟）
pub const AUDIO_WATERLEVEL: u32 = AUDIO_SAMPLE_RATE / 4;

/// 音频补给
///
/// 由设备的音频回调驱动，不需要独立的音频线程：缓冲低于水位时取一个
/// 音频包，按设备实际接收的采样数循环提交直到整包写完。
pub struct AudioFeeder {
    device: Arc<dyn OutputDevice>,
    format: AudioFormat,
    time_base: Rational,
    /// 上一包结束的时间戳，用于没有时间戳的包
    next_pts: Mutex<Option<i64>>,
    samples_submitted: AtomicU64,
}

impl AudioFeeder {
    pub fn new(device: Arc<dyn OutputDevice>, format: AudioFormat, time_base: Rational) -> Self {
        Self {
            device,
            format,
            time_base,
            next_pts: Mutex::new(None),
            samples_submitted: AtomicU64::new(0),
        }
    }

    pub fn samples_submitted(&self) -> u64 {
        self.samples_submitted.load(Ordering::Relaxed)
    }

    pub fn write_next_audio_samples(&self, queue: &PacketQueue) {
        if self.device.buffered_audio_sample_frames() >= AUDIO_WATERLEVEL {
            return;
        }

        let packet = match queue.get(false) {
            QueueGet::Packet(packet) => packet,
            QueueGet::Empty | QueueGet::Aborted => return,
        };

        let stride = self.format.frame_stride();
        if stride == 0 {
            return;
        }

        let samples = (packet.data.len() / stride) as u32;
        let time_scale = self.time_base.ticks_per_second();
        let mut next_pts = self.next_pts.lock();
        let base = packet.pts.or(*next_pts).unwrap_or(0);

        let mut offset = 0u32;
        while offset < samples {
            let remaining = samples - offset;
            let start = offset as usize * stride;
            match self.device.schedule_audio_samples(
                &packet.data[start..],
                remaining,
                base + offset as i64,
                time_scale,
            ) {
                Ok(0) => {
                    warn!("设备音频缓冲已满，丢弃本包剩余 {} 个采样帧", remaining);
                    break;
                }
                Ok(written) => offset += written.min(remaining),
                Err(e) => {
                    warn!("写入音频采样失败，丢弃本包剩余 {} 个采样帧: {}", remaining, e);
                    break;
                }
            }
        }

        self.samples_submitted
            .fetch_add(offset as u64, Ordering::Relaxed);
        *next_pts = Some(base + samples as i64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Packet, StreamKind};
    use crate::device::{DisplayMode, OutputCallback, VirtualDevice};
    use crate::player::test_support::{RecordingDevice, STEREO_16};
    use std::thread;
    use std::time::Duration;

    const AUDIO_TB: Rational = Rational::new(1, 48000);

    fn audio(pts: Option<i64>, samples: usize) -> Packet {
        Packet::new(StreamKind::Audio, pts, samples as i64, vec![0u8; samples * 4])
    }

    #[test]
    fn at_watermark_queue_is_untouched() {
        let device = RecordingDevice::new();
        device.state.lock().buffered = AUDIO_WATERLEVEL;
        let feeder = AudioFeeder::new(device.clone(), STEREO_16, AUDIO_TB);
        let queue = PacketQueue::new("audio");
        queue.put(audio(Some(0), 100));
        queue.put(audio(Some(100), 100));

        feeder.write_next_audio_samples(&queue);
        feeder.write_next_audio_samples(&queue);
        assert_eq!(queue.len(), 2);
        assert!(device.state.lock().audio.is_empty());
    }

    #[test]
    fn below_watermark_consumes_one_packet() {
        let device = RecordingDevice::new();
        device.state.lock().buffered = AUDIO_WATERLEVEL - 1;
        let feeder = AudioFeeder::new(device.clone(), STEREO_16, AUDIO_TB);
        let queue = PacketQueue::new("audio");
        queue.put(audio(Some(0), 100));
        queue.put(audio(Some(100), 100));

        feeder.write_next_audio_samples(&queue);
        assert_eq!(queue.len(), 1);
        let calls = device.state.lock().audio.clone();
        assert_eq!(calls.len(), 1);
        assert_eq!((calls[0].requested, calls[0].time, calls[0].time_scale), (100, 0, 48000));
        assert_eq!(feeder.samples_submitted(), 100);
    }

    #[test]
    fn partial_writes_advance_offset_and_timestamp() {
        let device = RecordingDevice::new();
        device.state.lock().accept_plan = vec![400, 300, 300].into();
        let feeder = AudioFeeder::new(device.clone(), STEREO_16, AUDIO_TB);
        let queue = PacketQueue::new("audio");
        queue.put(audio(Some(4800), 1000));

        feeder.write_next_audio_samples(&queue);

        let calls = device.state.lock().audio.clone();
        assert_eq!(calls.len(), 3);
        assert_eq!(
            calls.iter().map(|c| c.requested).collect::<Vec<_>>(),
            vec![1000, 600, 300]
        );
        assert_eq!(
            calls.iter().map(|c| c.time).collect::<Vec<_>>(),
            vec![4800, 5200, 5500]
        );
        assert_eq!(
            calls.iter().map(|c| c.data_len).collect::<Vec<_>>(),
            vec![4000, 2400, 1200]
        );
        assert_eq!(feeder.samples_submitted(), 1000);
    }

    #[test]
    fn zero_acceptance_abandons_rest_of_packet() {
        let device = RecordingDevice::new();
        device.state.lock().accept_plan = vec![10, 0].into();
        let feeder = AudioFeeder::new(device.clone(), STEREO_16, AUDIO_TB);
        let queue = PacketQueue::new("audio");
        queue.put(audio(Some(0), 50));

        feeder.write_next_audio_samples(&queue);
        assert_eq!(device.state.lock().audio.len(), 2);
        assert_eq!(feeder.samples_submitted(), 10);
    }

    #[test]
    fn empty_queue_is_a_no_op() {
        let device = RecordingDevice::new();
        let feeder = AudioFeeder::new(device.clone(), STEREO_16, AUDIO_TB);
        feeder.write_next_audio_samples(&PacketQueue::new("audio"));
        assert!(device.state.lock().audio.is_empty());
    }

    #[test]
    fn unknown_pts_follows_previous_packet() {
        let device = RecordingDevice::new();
        let feeder = AudioFeeder::new(device.clone(), STEREO_16, AUDIO_TB);
        let queue = PacketQueue::new("audio");
        queue.put(audio(Some(960), 480));
        queue.put(audio(None, 480));

        feeder.write_next_audio_samples(&queue);
        feeder.write_next_audio_samples(&queue);
        let times: Vec<i64> = device.state.lock().audio.iter().map(|c| c.time).collect();
        assert_eq!(times, vec![960, 1440]);
    }

    /// 设备音频回调直接驱动补给，预滚回调启动播出
    struct Feeding {
        device: Arc<dyn OutputDevice>,
        feeder: AudioFeeder,
        queue: PacketQueue,
    }

    impl OutputCallback for Feeding {
        fn scheduled_frame_completed(&self, _result: crate::device::FrameCompletion) {}

        fn render_audio_samples(&self, preroll: bool) {
            self.feeder.write_next_audio_samples(&self.queue);
            if preroll {
                self.device.start_scheduled_playback(0, 100, 1.0).unwrap();
            }
        }
    }

    #[test]
    fn small_packets_keep_virtual_device_fed() {
        // 5ms 一帧：每个帧间隔消耗 240 个采样帧，每包只有 100 个
        let mode = DisplayMode::new("test", 16, 8, 5, 1000);
        let device: Arc<dyn OutputDevice> = Arc::new(VirtualDevice::with_modes(
            "test",
            vec![mode.clone()],
            48_000,
            false,
        ));
        let queue = PacketQueue::new("audio");
        for i in 0..400 {
            queue.put(audio(Some(i * 100), 100));
        }
        let feeding = Arc::new(Feeding {
            device: device.clone(),
            feeder: AudioFeeder::new(device.clone(), STEREO_16, AUDIO_TB),
            queue,
        });
        device.set_callback(feeding.clone());
        device.enable_video_output(&mode).unwrap();
        device.enable_audio_output(AUDIO_SAMPLE_RATE, STEREO_16).unwrap();

        device.begin_audio_preroll().unwrap();
        thread::sleep(Duration::from_millis(100));
        let buffered = device.buffered_audio_sample_frames();
        device.stop_scheduled_playback().unwrap();
        let stats = device.stats();
        device.disable_audio_output();
        device.disable_video_output();

        assert!(stats.audio_samples_played >= 240 * 5);
        assert_eq!(stats.audio_underruns, 0);
        // 缓冲能涨到远超单包的水平
        assert!(buffered >= 2400, "buffered {}", buffered);
    }
}
