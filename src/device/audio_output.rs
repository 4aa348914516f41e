use crate::core::{AudioFormat, PlayerError, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, Stream, StreamConfig, SupportedStreamConfigRange};
use crossbeam::queue::SegQueue;
use log::{debug, info, warn};
use std::sync::Arc;

/// 本地音频监听 - 把虚拟设备“播出”的采样用 cpal 在声卡上放出来
pub struct AudioMonitor {
    device: Device,
    config: StreamConfig,
    stream: Option<Stream>,
    buffer: Arc<SegQueue<f32>>,
    source: AudioFormat,
}

// cpal::Stream 本身不是 Send，但监听器只在虚拟设备内部创建和销毁，
// 跨线程的只有 SegQueue
unsafe impl Send for AudioMonitor {}

impl AudioMonitor {
    /// 创建音频监听（声卡不支持源声道数时回退到立体声）
    pub fn new(sample_rate: u32, source: AudioFormat) -> Result<Self> {
        info!("初始化音频监听: {} Hz, {} 声道", sample_rate, source.channels);

        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| PlayerError::AudioError("无法找到音频输出设备".to_string()))?;

        debug!("使用音频设备: {}", device.name().unwrap_or_default());

        let requested = StreamConfig {
            channels: source.channels,
            sample_rate: cpal::SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let config = if Self::is_supported(&device, &requested)? {
            requested
        } else {
            warn!(
                "⚠️  音频设备不支持 {} Hz, {} 声道配置，回退到立体声",
                sample_rate, source.channels
            );
            let fallback = StreamConfig {
                channels: 2,
                sample_rate: cpal::SampleRate(sample_rate),
                buffer_size: cpal::BufferSize::Default,
            };
            if !Self::is_supported(&device, &fallback)? {
                return Err(PlayerError::AudioError(format!(
                    "音频设备不支持 {} Hz 立体声",
                    sample_rate
                )));
            }
            fallback
        };

        Ok(Self {
            device,
            config,
            stream: None,
            buffer: Arc::new(SegQueue::new()),
            source,
        })
    }

    fn is_supported(device: &Device, config: &StreamConfig) -> Result<bool> {
        let supported_configs = device
            .supported_output_configs()
            .map_err(|e| PlayerError::AudioError(format!("无法获取支持的音频配置: {}", e)))?;

        let mut supported = false;
        for range in supported_configs {
            if Self::is_config_compatible(config, &range) {
                supported = true;
                break;
            }
        }
        Ok(supported)
    }

    /// 检查配置是否兼容
    fn is_config_compatible(config: &StreamConfig, supported: &SupportedStreamConfigRange) -> bool {
        let rate_in_range = config.sample_rate.0 >= supported.min_sample_rate().0
            && config.sample_rate.0 <= supported.max_sample_rate().0;

        let channels_match = config.channels == supported.channels();

        rate_in_range && channels_match
    }

    /// 开始播放
    pub fn start(&mut self) -> Result<()> {
        if self.stream.is_some() {
            return Ok(());
        }

        let buffer = self.buffer.clone();

        let stream = self
            .device
            .build_output_stream(
                &self.config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    for sample in data.iter_mut() {
                        *sample = buffer.pop().unwrap_or(0.0);
                    }
                },
                move |err| {
                    log::error!("音频流错误: {}", err);
                },
                None,
            )
            .map_err(|e| PlayerError::AudioError(format!("创建音频流失败: {}", e)))?;

        stream
            .play()
            .map_err(|e| PlayerError::AudioError(format!("启动音频流失败: {}", e)))?;

        self.stream = Some(stream);
        info!("音频监听已启动");

        Ok(())
    }

    /// 停止播放
    pub fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            drop(stream);
            info!("音频监听已停止");
        }
        while self.buffer.pop().is_some() {}
    }

    /// 写入设备已播出的交错 PCM 采样
    pub fn write_pcm(&self, pcm: &[u8]) {
        let out_channels = self.config.channels as usize;
        for frame in pcm_frames_to_f32(pcm, self.source) {
            for channel in 0..out_channels {
                self.buffer.push(frame.get(channel).copied().unwrap_or(0.0));
            }
        }
    }
}

impl Drop for AudioMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

/// 交错整型 PCM（小端 16/32 bit）转为逐帧的 f32 采样
pub fn pcm_frames_to_f32(pcm: &[u8], format: AudioFormat) -> Vec<Vec<f32>> {
    let stride = format.frame_stride();
    if stride == 0 {
        return Vec::new();
    }

    pcm.chunks_exact(stride)
        .map(|frame| {
            frame
                .chunks_exact(format.bytes_per_sample)
                .map(|sample| match sample.len() {
                    2 => i16::from_le_bytes([sample[0], sample[1]]) as f32 / 32768.0,
                    4 => {
                        i32::from_le_bytes([sample[0], sample[1], sample[2], sample[3]]) as f32
                            / 2_147_483_648.0
                    }
                    _ => 0.0,
                })
                .collect()
        })
        .collect()
}
