use crate::core::Result;
use log::{debug, info, warn};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

/// 辅助数据输出（串口等原始字节流，尽力而为）
pub struct AuxOutput {
    sink: Box<dyn Write + Send>,
    description: String,
}

impl AuxOutput {
    pub fn new(sink: Box<dyn Write + Send>, description: &str) -> Self {
        Self {
            sink,
            description: description.to_string(),
        }
    }

    /// 打开串口设备（只写）
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new().write(true).open(path)?;
        info!("辅助数据输出: {}", path.display());
        Ok(Self::new(Box::new(file), &path.display().to_string()))
    }

    /// 原样写出一个辅助数据包
    ///
    /// 内容恰好是单个空格的包不写出。写失败只记录日志。
    pub fn forward(&mut self, payload: &[u8]) {
        if payload == b" " {
            return;
        }

        debug!("写出 {}: {}", self.description, String::from_utf8_lossy(payload));
        if let Err(e) = self.sink.write_all(payload).and_then(|_| self.sink.flush()) {
            warn!("写入 {} 失败: {}", self.description, e);
        }
    }
}
