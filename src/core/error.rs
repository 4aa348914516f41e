use thiserror::Error;

#[derive(Error, Debug)]
pub enum PlayerError {
    #[error("FFmpeg 错误: {0}")]
    FFmpegError(#[from] ffmpeg_next::Error),

    #[error("IO 错误: {0}")]
    IoError(#[from] std::io::Error),

    #[error("无法打开文件: {0}")]
    OpenError(String),

    #[error("无法找到视频流")]
    NoVideoStream,

    #[error("找不到输出设备 #{0}")]
    NoDevice(usize),

    #[error("设备不支持显示模式 #{0}")]
    NoDisplayMode(usize),

    #[error("不支持的音频配置: {0}")]
    UnsupportedAudio(String),

    #[error("解码错误: {0}")]
    DecodeError(String),

    #[error("像素格式转换错误: {0}")]
    ConvertError(String),

    #[error("输出设备错误: {0}")]
    DeviceError(String),

    #[error("音频输出错误: {0}")]
    AudioError(String),

    #[error("其他错误: {0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, PlayerError>;
