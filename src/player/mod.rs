// 播出核心模块

pub mod packet_queue;
pub mod pts;
pub mod demuxer_source;  // 媒体源抽象
pub mod demuxer;         // ffmpeg 媒体源
pub mod demuxer_thread;  // 生产线程
pub mod decoder;
pub mod scheduler;
pub mod audio_feeder;
pub mod aux_output;
pub mod shutdown;
pub mod session;

#[cfg(test)]
mod test_support;
