use crate::core::{Packet, Result, StreamInfo};

/// 媒体源抽象接口
///
/// 生产线程只通过这个 trait 读包，决定“何时读”；
/// 解封装细节由具体实现负责（FFmpeg、测试用的内存源等）。
pub trait MediaSource: Send {
    /// 读取下一个已分类的数据包
    ///
    /// 返回：
    /// - Ok(Some(packet)): 成功读取一个包
    /// - Ok(None): 到达文件末尾
    /// - Err(e): 读取错误
    fn read_packet(&mut self) -> Result<Option<Packet>>;

    /// 视频流描述（必须存在）
    fn video_stream(&self) -> StreamInfo;

    /// 音频流描述（可能没有音频）
    fn audio_stream(&self) -> Option<StreamInfo>;

    /// 获取描述信息（用于调试）
    fn description(&self) -> String;
}
