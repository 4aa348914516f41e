use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info, warn};
use std::path::PathBuf;
use std::time::Duration;

mod core;
mod device;
mod player;

use crate::core::{OutputConnection, PixelDepth, PlayoutConfig, DEFAULT_PREBUFFER_MS};
use crate::player::aux_output::AuxOutput;
use crate::player::decoder::SwsConverter;
use crate::player::demuxer::FfmpegSource;
use crate::player::session::{Session, SessionOptions};
use crate::player::shutdown::{ShutdownReason, ShutdownSignal};

/// 把媒体文件按设备时钟定时播出到视频输出卡
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// 输入文件
    #[arg(short = 'f', value_name = "FILE")]
    input: Option<PathBuf>,

    /// 输出设备编号
    #[arg(short = 'C', default_value_t = 0)]
    device: usize,

    /// 显示模式编号（见 --list-devices）
    #[arg(short = 'm', default_value_t = 2)]
    mode: usize,

    /// 输出接口：1 复合 2 分量 3 HDMI 4 SDI
    #[arg(short = 'O', default_value_t = 0)]
    connection: u32,

    /// 像素位深：8 或 10
    #[arg(short = 'p', default_value_t = 8)]
    pixel_depth: u32,

    /// 预缓冲时长（毫秒）
    #[arg(short = 'b', default_value_t = DEFAULT_PREBUFFER_MS)]
    prebuffer_ms: u64,

    /// 辅助数据输出的串口设备
    #[arg(short = 'S', value_name = "SERIAL")]
    serial: Option<PathBuf>,

    /// 在本机声卡上监听设备消耗的音频
    #[arg(long)]
    monitor_audio: bool,

    /// 列出输出设备和显示模式后退出
    #[arg(long)]
    list_devices: bool,
}

impl Cli {
    fn into_config(self) -> Result<PlayoutConfig> {
        let input = self
            .input
            .context("缺少输入文件（-f），可用 --list-devices 查看设备")?;

        let mut config = PlayoutConfig::new(input);
        config.device_index = self.device;
        config.mode_index = self.mode;
        config.connection = OutputConnection::from_index(self.connection)?;
        config.pixel_depth = PixelDepth::from_bits(self.pixel_depth)?;
        config.prebuffer = Duration::from_millis(self.prebuffer_ms);
        config.aux_device = self.serial;
        config.monitor_audio = self.monitor_audio;
        Ok(config)
    }
}

fn list_devices() {
    for (index, device) in device::enumerate_devices(false).iter().enumerate() {
        println!("-> {} (-C {})", device.model_name(), index);
        for (mode_index, mode) in device.display_modes().iter().enumerate() {
            println!(
                "    {:>2}: {:<20} {} x {} {:.3} FPS",
                mode_index,
                mode.name,
                mode.width,
                mode.height,
                mode.frames_per_second()
            );
        }
    }
}

fn run(config: PlayoutConfig) -> Result<()> {
    info!("播出配置: {}", serde_json::to_string(&config)?);

    let source = FfmpegSource::open(&config.input)
        .with_context(|| format!("无法打开输入: {}", config.input.display()))?;
    let decoder = source.video_decoder()?;

    let device = device::open_device(config.device_index, config.monitor_audio)?;

    let aux = match &config.aux_device {
        Some(path) => match AuxOutput::open(path) {
            Ok(aux) => Some(aux),
            Err(e) => {
                warn!("无法打开串口 {}，继续播出: {}", path.display(), e);
                None
            }
        },
        None => None,
    };

    let shutdown = ShutdownSignal::new();
    let signal = shutdown.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        info!("收到中断信号，准备退出");
        signal.trigger(ShutdownReason::Interrupted);
    }) {
        error!("设置信号处理失败: {}", e);
    }

    let options = SessionOptions {
        mode_index: config.mode_index,
        connection: config.connection,
        pixel_depth: config.pixel_depth,
        prebuffer: config.prebuffer,
    };
    let session = Session::new(
        &source,
        decoder,
        SwsConverter::new(),
        device,
        aux,
        options,
        shutdown,
    )?;

    let stats = session.run(Box::new(source))?;
    info!(
        "剩余未播出: video {} audio {}",
        stats.video_packets_left, stats.audio_packets_left
    );
    info!("📊 会话统计: {}", serde_json::to_string(&stats)?);
    Ok(())
}

fn main() -> Result<()> {
    // 初始化日志
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        // cpal 的后端探测日志很吵
        .filter_module("cpal", log::LevelFilter::Warn)
        .init();

    let cli = Cli::parse();

    // 初始化 FFmpeg
    ffmpeg_next::init().map_err(|e| anyhow::anyhow!("FFmpeg 初始化失败: {}", e))?;
    info!("✅ FFmpeg 初始化成功");

    if cli.list_devices {
        list_devices();
        return Ok(());
    }

    let config = cli.into_config()?;
    run(config)
}
