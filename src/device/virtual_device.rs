use crate::core::{AudioFormat, DevicePixelLayout, OutputConnection, PlayerError, Result};
use crate::device::{
    standard_modes, AudioMonitor, DeviceStats, DisplayMode, FrameCompletion, OutputCallback,
    OutputDevice, VideoFrameBuffer, AUDIO_SAMPLE_RATE,
};
use crossbeam_channel::{select, tick, unbounded, Sender};
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::process;
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};

fn log_ctx() -> String {
    format!("[pid:{} tid:{:?}]", process::id(), thread::current().id())
}

/// 默认音频缓冲容量：1 秒 48kHz
pub const DEFAULT_AUDIO_CAPACITY: u32 = 48_000;

/// 每个帧间隔内，缓冲低于该值时持续请求音频（1/4 秒）
const AUDIO_REFILL_TARGET: u32 = AUDIO_SAMPLE_RATE / 4;

/// 单个帧间隔内最多的音频回调次数
const MAX_AUDIO_CALLBACKS_PER_TICK: usize = 32;

const DRIVER_THREAD_NAME: &str = "virtual-device";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    /// 已调用 begin_audio_preroll，等待 start_scheduled_playback
    Prerolling,
    Playing,
}

struct ScheduledFrame {
    // 播出完成前设备一直持有帧缓冲
    _frame: VideoFrameBuffer,
    time: i64,
    duration: i64,
    time_scale: i64,
}

struct DeviceState {
    connection: Option<OutputConnection>,
    mode: Option<DisplayMode>,
    audio: Option<(u32, AudioFormat)>,
    handler: Option<Arc<dyn OutputCallback>>,
    frames: VecDeque<ScheduledFrame>,
    audio_fifo: VecDeque<u8>,
    buffered_samples: u32,
    /// 播出开始后经过的硬件帧数
    ticks: u64,
    phase: Phase,
    stats: DeviceStats,
}

/// 设备回调事件（驱动线程在释放锁之后派发）
enum DeviceEvent {
    FrameCompleted(FrameCompletion),
    RenderAudio { preroll: bool },
}

struct Driver {
    handle: JoinHandle<()>,
    stop_tx: Sender<()>,
    thread_id: ThreadId,
}

/// 软件实现的定时输出设备
///
/// 驱动线程按显示模式的帧间隔计时：
/// - 预滚阶段每个间隔请求一次音频（`render_audio_samples(true)`）
/// - 播出阶段每个间隔取出一帧到期的视频帧并通知完成，同时消耗一个帧间隔的音频采样
///
/// 音频缓冲容量有限，超过容量的提交只被部分接收。
pub struct VirtualDevice {
    name: String,
    modes: Vec<DisplayMode>,
    audio_capacity: u32,
    monitor_audio: bool,
    state: Arc<Mutex<DeviceState>>,
    monitor: Arc<Mutex<Option<AudioMonitor>>>,
    driver: Mutex<Option<Driver>>,
}

impl VirtualDevice {
    pub fn new(name: &str, monitor_audio: bool) -> Self {
        Self::with_modes(name, standard_modes(), DEFAULT_AUDIO_CAPACITY, monitor_audio)
    }

    pub fn with_modes(
        name: &str,
        modes: Vec<DisplayMode>,
        audio_capacity: u32,
        monitor_audio: bool,
    ) -> Self {
        Self {
            name: name.to_string(),
            modes,
            audio_capacity,
            monitor_audio,
            state: Arc::new(Mutex::new(DeviceState {
                connection: None,
                mode: None,
                audio: None,
                handler: None,
                frames: VecDeque::new(),
                audio_fifo: VecDeque::new(),
                buffered_samples: 0,
                ticks: 0,
                phase: Phase::Idle,
                stats: DeviceStats::default(),
            })),
            monitor: Arc::new(Mutex::new(None)),
            driver: Mutex::new(None),
        }
    }

    pub fn connection(&self) -> Option<OutputConnection> {
        self.state.lock().connection
    }

    /// 确保驱动线程在运行
    fn ensure_driver(&self) -> Result<()> {
        let mut driver = self.driver.lock();
        if driver.is_some() {
            return Ok(());
        }

        // 驱动线程在自己的回调里发现驱动已被取走：设备正在停止
        if thread::current().name() == Some(DRIVER_THREAD_NAME) {
            return Err(PlayerError::DeviceError("设备正在停止，不再启动驱动".to_string()));
        }

        let interval = {
            let state = self.state.lock();
            if state.phase == Phase::Idle {
                return Err(PlayerError::DeviceError("设备未进入预滚或播出".to_string()));
            }
            state
                .mode
                .as_ref()
                .map(|m| m.frame_interval())
                .ok_or_else(|| PlayerError::DeviceError("视频输出未启用".to_string()))?
        };
        let audio_target = self.audio_capacity.min(AUDIO_REFILL_TARGET);

        let (stop_tx, stop_rx) = unbounded::<()>();
        let state = self.state.clone();
        let monitor = self.monitor.clone();

        let handle = thread::Builder::new()
            .name(DRIVER_THREAD_NAME.to_string())
            .spawn(move || {
                info!("{} 🎛 虚拟设备驱动线程启动，帧间隔 {:?}", log_ctx(), interval);
                let ticker = tick(interval);
                loop {
                    select! {
                        recv(ticker) -> _ => Self::on_tick(&state, &monitor, audio_target),
                        recv(stop_rx) -> _ => break,
                    }
                }
                info!("{} 🛑 虚拟设备驱动线程退出", log_ctx());
            })?;

        *driver = Some(Driver {
            thread_id: handle.thread().id(),
            handle,
            stop_tx,
        });
        Ok(())
    }

    fn stop_driver(&self) {
        let driver = self.driver.lock().take();
        if let Some(driver) = driver {
            let _ = driver.stop_tx.send(());
            if driver.thread_id == thread::current().id() {
                // 在驱动线程自身的回调里停止：不能 join 自己
                return;
            }
            if driver.handle.join().is_err() {
                error!("{} ❌ 虚拟设备驱动线程 panic", log_ctx());
            }
        }
    }

    /// 一个硬件帧间隔
    fn on_tick(state: &Mutex<DeviceState>, monitor: &Mutex<Option<AudioMonitor>>, audio_target: u32) {
        let (handler, events, played) = {
            let mut state = state.lock();
            let mut events = Vec::new();
            let mut played = Vec::new();

            match state.phase {
                Phase::Idle => {}
                Phase::Prerolling => {
                    if state.audio.is_some() {
                        events.push(DeviceEvent::RenderAudio { preroll: true });
                    }
                }
                Phase::Playing => {
                    if let Some(result) = Self::display_due_frame(&mut state) {
                        events.push(DeviceEvent::FrameCompleted(result));
                    }
                    if state.audio.is_some() {
                        played = Self::consume_audio(&mut state);
                        events.push(DeviceEvent::RenderAudio { preroll: false });
                    }
                    state.ticks += 1;
                }
            }

            (state.handler.clone(), events, played)
        };

        if !played.is_empty() {
            if let Some(monitor) = monitor.lock().as_ref() {
                monitor.write_pcm(&played);
            }
        }

        if let Some(handler) = handler {
            for event in events {
                match event {
                    DeviceEvent::FrameCompleted(result) => handler.scheduled_frame_completed(result),
                    DeviceEvent::RenderAudio { preroll } => {
                        Self::request_audio(state, &*handler, preroll, audio_target)
                    }
                }
            }
        }
    }

    /// 缓冲低于目标值且上一次回调有进展时继续请求音频
    fn request_audio(
        state: &Mutex<DeviceState>,
        handler: &dyn OutputCallback,
        preroll: bool,
        audio_target: u32,
    ) {
        for _ in 0..MAX_AUDIO_CALLBACKS_PER_TICK {
            let before = state.lock().buffered_samples;
            handler.render_audio_samples(preroll);

            let current = state.lock();
            if current.audio.is_none()
                || current.buffered_samples <= before
                || current.buffered_samples >= audio_target
            {
                break;
            }
        }
    }

    /// 取出一帧到期的视频帧（到期 = 帧时间不晚于当前播出时钟）
    fn display_due_frame(state: &mut DeviceState) -> Option<FrameCompletion> {
        let (clock, clock_scale) = {
            let mode = state.mode.as_ref()?;
            (state.ticks as i128 * mode.frame_duration as i128, mode.time_scale as i128)
        };

        let due = {
            let frame = state.frames.front()?;
            frame.time as i128 * clock_scale <= clock * frame.time_scale as i128
        };
        if !due {
            return None;
        }

        let frame = state.frames.pop_front()?;
        state.stats.frames_displayed += 1;

        let end = (frame.time + frame.duration) as i128 * clock_scale;
        if end < clock * frame.time_scale as i128 {
            state.stats.frames_late += 1;
            Some(FrameCompletion::DisplayedLate)
        } else {
            Some(FrameCompletion::Completed)
        }
    }

    /// 消耗一个帧间隔的音频，返回被“播出”的 PCM 字节
    fn consume_audio(state: &mut DeviceState) -> Vec<u8> {
        let (sample_rate, format) = match state.audio {
            Some(audio) => audio,
            None => return Vec::new(),
        };
        let per_tick = match state.mode.as_ref() {
            Some(mode) if mode.time_scale > 0 => {
                (sample_rate as i64 * mode.frame_duration / mode.time_scale) as u32
            }
            _ => return Vec::new(),
        };

        let samples = per_tick.min(state.buffered_samples);
        if samples < per_tick {
            state.stats.audio_underruns += 1;
        }
        state.buffered_samples -= samples;
        state.stats.audio_samples_played += samples as u64;

        let bytes = (samples as usize * format.frame_stride()).min(state.audio_fifo.len());
        state.audio_fifo.drain(..bytes).collect()
    }
}

impl OutputDevice for VirtualDevice {
    fn model_name(&self) -> String {
        self.name.clone()
    }

    fn display_modes(&self) -> Vec<DisplayMode> {
        self.modes.clone()
    }

    fn set_connection(&self, connection: OutputConnection) -> Result<()> {
        info!(
            "输出接口: {:?}（{}音频）",
            connection,
            if connection.embedded_audio() { "嵌入" } else { "模拟" }
        );
        self.state.lock().connection = Some(connection);
        Ok(())
    }

    fn set_callback(&self, handler: Arc<dyn OutputCallback>) {
        self.state.lock().handler = Some(handler);
    }

    fn enable_video_output(&self, mode: &DisplayMode) -> Result<()> {
        if !self.modes.contains(mode) {
            return Err(PlayerError::DeviceError(format!("不支持的显示模式: {}", mode)));
        }
        info!("启用视频输出: {}", mode);
        self.state.lock().mode = Some(mode.clone());
        Ok(())
    }

    fn enable_audio_output(&self, sample_rate: u32, format: AudioFormat) -> Result<()> {
        info!(
            "启用音频输出: {} Hz, {} 声道, {} bit",
            sample_rate, format.channels, format.sample_depth
        );
        self.state.lock().audio = Some((sample_rate, format));

        if self.monitor_audio {
            match AudioMonitor::new(sample_rate, format).and_then(|mut m| m.start().map(|_| m)) {
                Ok(monitor) => *self.monitor.lock() = Some(monitor),
                Err(e) => warn!("音频监听不可用，继续静默播出: {}", e),
            }
        }
        Ok(())
    }

    fn create_video_frame(
        &self,
        width: u32,
        height: u32,
        row_bytes: usize,
        layout: DevicePixelLayout,
    ) -> Result<VideoFrameBuffer> {
        let frame = VideoFrameBuffer::new(width, height, layout);
        if frame.row_bytes != row_bytes {
            return Err(PlayerError::DeviceError(format!(
                "行字节数 {} 与像素格式 {:?} 不匹配（应为 {}）",
                row_bytes, layout, frame.row_bytes
            )));
        }
        Ok(frame)
    }

    fn schedule_video_frame(
        &self,
        frame: VideoFrameBuffer,
        time: i64,
        duration: i64,
        time_scale: i64,
    ) -> Result<()> {
        if time_scale <= 0 {
            return Err(PlayerError::DeviceError(format!("无效的时间刻度 {}", time_scale)));
        }
        let mut state = self.state.lock();
        if state.mode.is_none() {
            return Err(PlayerError::DeviceError("视频输出未启用".to_string()));
        }
        state.frames.push_back(ScheduledFrame {
            _frame: frame,
            time,
            duration,
            time_scale,
        });
        state.stats.frames_scheduled += 1;
        Ok(())
    }

    fn buffered_audio_sample_frames(&self) -> u32 {
        self.state.lock().buffered_samples
    }

    fn schedule_audio_samples(
        &self,
        data: &[u8],
        sample_frames: u32,
        _time: i64,
        _time_scale: i64,
    ) -> Result<u32> {
        let mut state = self.state.lock();
        let format = match state.audio {
            Some((_, format)) => format,
            None => return Err(PlayerError::DeviceError("音频输出未启用".to_string())),
        };

        let stride = format.frame_stride();
        if sample_frames as usize * stride > data.len() {
            return Err(PlayerError::DeviceError(format!(
                "{} 个采样帧超出缓冲区长度 {}",
                sample_frames,
                data.len()
            )));
        }

        let room = self.audio_capacity.saturating_sub(state.buffered_samples);
        let accepted = sample_frames.min(room);
        state
            .audio_fifo
            .extend(&data[..accepted as usize * stride]);
        state.buffered_samples += accepted;
        state.stats.audio_samples_scheduled += accepted as u64;
        Ok(accepted)
    }

    fn begin_audio_preroll(&self) -> Result<()> {
        {
            let mut state = self.state.lock();
            if state.audio.is_none() {
                return Err(PlayerError::DeviceError("音频输出未启用".to_string()));
            }
            state.phase = Phase::Prerolling;
        }
        debug!("{} 开始音频预滚", log_ctx());
        self.ensure_driver()
    }

    fn start_scheduled_playback(&self, start_time: i64, time_scale: i64, speed: f64) -> Result<()> {
        {
            let mut state = self.state.lock();
            if state.phase == Phase::Playing {
                return Ok(());
            }
            state.phase = Phase::Playing;
            state.ticks = 0;
        }
        if let Err(e) = self.ensure_driver() {
            self.state.lock().phase = Phase::Idle;
            return Err(e);
        }
        info!(
            "{} ▶ 开始定时播出: start={}/{} speed={}",
            log_ctx(),
            start_time,
            time_scale,
            speed
        );
        Ok(())
    }

    fn stop_scheduled_playback(&self) -> Result<()> {
        {
            let mut state = self.state.lock();
            state.phase = Phase::Idle;
            let flushed = state.frames.len() as u64;
            state.frames.clear();
            state.stats.frames_flushed += flushed;
        }
        self.stop_driver();
        info!("{} ⏹ 定时播出已停止", log_ctx());
        Ok(())
    }

    fn disable_audio_output(&self) {
        {
            let mut state = self.state.lock();
            state.audio = None;
            state.audio_fifo.clear();
            state.buffered_samples = 0;
        }
        if let Some(mut monitor) = self.monitor.lock().take() {
            monitor.stop();
        }
    }

    fn disable_video_output(&self) {
        let mut state = self.state.lock();
        state.mode = None;
        state.frames.clear();
        // 断开回调，避免设备与回调对象相互持有
        state.handler = None;
    }

    fn stats(&self) -> DeviceStats {
        self.state.lock().stats.clone()
    }
}

impl Drop for VirtualDevice {
    fn drop(&mut self) {
        self.stop_driver();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Weak;
    use std::time::Duration;

    const STEREO_16: AudioFormat = AudioFormat {
        channels: 2,
        sample_depth: 16,
        bytes_per_sample: 2,
    };

    fn fast_mode() -> DisplayMode {
        // 5ms 一帧
        DisplayMode::new("test", 16, 8, 5, 1000)
    }

    fn device(capacity: u32) -> VirtualDevice {
        VirtualDevice::with_modes("test", vec![fast_mode()], capacity, false)
    }

    #[derive(Default)]
    struct Counter {
        completed: AtomicUsize,
        preroll: AtomicUsize,
        render: AtomicUsize,
    }

    impl OutputCallback for Counter {
        fn scheduled_frame_completed(&self, _result: FrameCompletion) {
            self.completed.fetch_add(1, Ordering::SeqCst);
        }

        fn render_audio_samples(&self, preroll: bool) {
            if preroll {
                self.preroll.fetch_add(1, Ordering::SeqCst);
            } else {
                self.render.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    #[test]
    fn audio_submission_is_partially_accepted_at_capacity() {
        let dev = device(100);
        dev.enable_video_output(&fast_mode()).unwrap();
        dev.enable_audio_output(48_000, STEREO_16).unwrap();

        let data = vec![0u8; 80 * 4];
        assert_eq!(dev.schedule_audio_samples(&data, 80, 0, 48_000).unwrap(), 80);
        assert_eq!(dev.schedule_audio_samples(&data, 80, 80, 48_000).unwrap(), 20);
        assert_eq!(dev.schedule_audio_samples(&data, 80, 100, 48_000).unwrap(), 0);
        assert_eq!(dev.buffered_audio_sample_frames(), 100);
    }

    #[test]
    fn audio_requires_enabled_output() {
        let dev = device(100);
        assert!(dev.schedule_audio_samples(&[0u8; 4], 1, 0, 48_000).is_err());
        assert!(dev.begin_audio_preroll().is_err());
    }

    #[test]
    fn rejects_short_audio_buffer() {
        let dev = device(100);
        dev.enable_audio_output(48_000, STEREO_16).unwrap();
        assert!(dev.schedule_audio_samples(&[0u8; 6], 2, 0, 48_000).is_err());
    }

    #[test]
    fn frame_buffer_geometry_is_checked() {
        let dev = device(100);
        let frame = dev
            .create_video_frame(16, 8, 32, DevicePixelLayout::Uyvy422)
            .unwrap();
        assert_eq!(frame.data.len(), 16 * 2 * 8);
        assert!(dev
            .create_video_frame(16, 8, 16, DevicePixelLayout::Uyvy422)
            .is_err());
    }

    #[test]
    fn scheduled_frames_complete_after_playback_starts() {
        let dev = device(100);
        let counter = Arc::new(Counter::default());
        dev.set_callback(counter.clone());
        dev.enable_video_output(&fast_mode()).unwrap();

        for i in 0..3 {
            let frame = VideoFrameBuffer::new(16, 8, DevicePixelLayout::Uyvy422);
            dev.schedule_video_frame(frame, i * 5, 5, 1000).unwrap();
        }
        dev.start_scheduled_playback(0, 100, 1.0).unwrap();

        thread::sleep(Duration::from_millis(150));
        dev.stop_scheduled_playback().unwrap();

        assert_eq!(counter.completed.load(Ordering::SeqCst), 3);
        let stats = dev.stats();
        assert_eq!(stats.frames_scheduled, 3);
        assert_eq!(stats.frames_displayed, 3);
    }

    #[test]
    fn preroll_requests_audio_until_playback_starts() {
        let dev = device(100);
        let counter = Arc::new(Counter::default());
        dev.set_callback(counter.clone());
        dev.enable_video_output(&fast_mode()).unwrap();
        dev.enable_audio_output(48_000, STEREO_16).unwrap();

        dev.begin_audio_preroll().unwrap();
        thread::sleep(Duration::from_millis(60));
        assert!(counter.preroll.load(Ordering::SeqCst) > 0);

        dev.start_scheduled_playback(0, 100, 1.0).unwrap();
        let prerolls = counter.preroll.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(60));
        dev.stop_scheduled_playback().unwrap();

        assert!(counter.render.load(Ordering::SeqCst) > 0);
        // 播出开始后最多还有一个已在途的预滚回调
        assert!(counter.preroll.load(Ordering::SeqCst) <= prerolls + 1);
    }

    #[test]
    fn playback_consumes_buffered_audio() {
        let dev = device(48_000);
        dev.enable_video_output(&fast_mode()).unwrap();
        dev.enable_audio_output(48_000, STEREO_16).unwrap();

        let data = vec![0u8; 2400 * 4];
        dev.schedule_audio_samples(&data, 2400, 0, 48_000).unwrap();
        dev.start_scheduled_playback(0, 100, 1.0).unwrap();
        thread::sleep(Duration::from_millis(100));
        dev.stop_scheduled_playback().unwrap();

        // 每 5ms 消耗 240 个采样帧
        assert!(dev.buffered_audio_sample_frames() < 2400);
        assert!(dev.stats().audio_samples_played > 0);
    }

    /// 第一次帧完成时在驱动线程里先停止再尝试重新启动
    #[derive(Default)]
    struct Restarter {
        device: Mutex<Weak<VirtualDevice>>,
        restart: Mutex<Option<Result<()>>>,
    }

    impl OutputCallback for Restarter {
        fn scheduled_frame_completed(&self, _result: FrameCompletion) {
            let device = match self.device.lock().upgrade() {
                Some(device) => device,
                None => return,
            };
            let mut restart = self.restart.lock();
            if restart.is_none() {
                device.stop_scheduled_playback().unwrap();
                *restart = Some(device.start_scheduled_playback(0, 100, 1.0));
            }
        }

        fn render_audio_samples(&self, _preroll: bool) {}
    }

    #[test]
    fn stopped_driver_is_not_restarted_from_its_own_callback() {
        let dev = Arc::new(device(100));
        let restarter = Arc::new(Restarter::default());
        *restarter.device.lock() = Arc::downgrade(&dev);
        dev.set_callback(restarter.clone());
        dev.enable_video_output(&fast_mode()).unwrap();

        let frame = VideoFrameBuffer::new(16, 8, DevicePixelLayout::Uyvy422);
        dev.schedule_video_frame(frame, 0, 5, 1000).unwrap();
        dev.start_scheduled_playback(0, 100, 1.0).unwrap();
        thread::sleep(Duration::from_millis(60));

        assert!(matches!(
            *restarter.restart.lock(),
            Some(Err(PlayerError::DeviceError(_)))
        ));
        assert!(dev.driver.lock().is_none());
        assert_eq!(dev.state.lock().phase, Phase::Idle);
        dev.disable_video_output();
    }

    /// 每次音频回调提交 100 个采样帧
    #[derive(Default)]
    struct SmallWrites {
        device: Mutex<Weak<VirtualDevice>>,
        calls: AtomicUsize,
    }

    impl OutputCallback for SmallWrites {
        fn scheduled_frame_completed(&self, _result: FrameCompletion) {}

        fn render_audio_samples(&self, _preroll: bool) {
            if let Some(device) = self.device.lock().upgrade() {
                self.calls.fetch_add(1, Ordering::SeqCst);
                device
                    .schedule_audio_samples(&[0u8; 400], 100, 0, 48_000)
                    .unwrap();
            }
        }
    }

    #[test]
    fn preroll_requests_audio_repeatedly_within_one_interval() {
        let dev = Arc::new(device(DEFAULT_AUDIO_CAPACITY));
        let writer = Arc::new(SmallWrites::default());
        *writer.device.lock() = Arc::downgrade(&dev);
        dev.set_callback(writer.clone());
        dev.enable_video_output(&fast_mode()).unwrap();
        dev.enable_audio_output(48_000, STEREO_16).unwrap();

        dev.begin_audio_preroll().unwrap();
        thread::sleep(Duration::from_millis(30));
        dev.stop_scheduled_playback().unwrap();

        // 一个间隔内多次回调；达到目标后每个间隔只剩一次
        let buffered = dev.buffered_audio_sample_frames();
        assert!(writer.calls.load(Ordering::SeqCst) > 6);
        assert!(buffered > 600);
        assert!(buffered <= AUDIO_REFILL_TARGET + 100 * 20, "buffered {}", buffered);
        dev.disable_video_output();
    }

    #[test]
    fn driver_needs_preroll_or_playback() {
        let dev = device(100);
        dev.enable_video_output(&fast_mode()).unwrap();
        assert!(dev.ensure_driver().is_err());
        assert!(dev.driver.lock().is_none());
    }

    #[test]
    fn connection_is_remembered() {
        let dev = device(100);
        assert_eq!(dev.connection(), None);
        dev.set_connection(OutputConnection::Sdi).unwrap();
        assert_eq!(dev.connection(), Some(OutputConnection::Sdi));
    }

    #[test]
    fn disable_video_output_drops_callback() {
        let dev = device(100);
        let counter = Arc::new(Counter::default());
        dev.set_callback(counter.clone());
        assert_eq!(Arc::strong_count(&counter), 2);
        dev.disable_video_output();
        assert_eq!(Arc::strong_count(&counter), 1);
    }
}
