use crate::core::{Rational, StreamKind};
use log::info;
use std::sync::OnceLock;

/// 会话时间原点（首次确定后只读）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PtsOrigins {
    /// 第一个带时间戳的包的原始 PTS（所属流时间基）
    pub first_pts: i64,
    /// 触发原点的流
    pub first_kind: StreamKind,
    pub first_video_pts: i64,
    /// 无音频流时为 None
    pub first_audio_pts: Option<i64>,
}

/// PTS 归一化状态
///
/// 第一个带时间戳的音频或视频包确定公共时间原点，另一条流的原点
/// 按时间基换算得到。`OnceLock` 保证 unset -> set 只发生一次，
/// 之后并发只读。
pub struct PtsNormalizer {
    video_time_base: Rational,
    audio_time_base: Option<Rational>,
    origins: OnceLock<PtsOrigins>,
}

impl PtsNormalizer {
    pub fn new(video_time_base: Rational, audio_time_base: Option<Rational>) -> Self {
        Self {
            video_time_base,
            audio_time_base,
            origins: OnceLock::new(),
        }
    }

    pub fn origins(&self) -> Option<PtsOrigins> {
        self.origins.get().copied()
    }

    /// 把包的 PTS 平移到以会话原点为 0 的时间轴
    ///
    /// 未知 PTS 原样返回；只处理音频/视频，其余类型原样返回。
    pub fn normalize(&self, kind: StreamKind, pts: Option<i64>) -> Option<i64> {
        let pts = pts?;
        let origins = match kind {
            StreamKind::Video => self.establish(kind, pts),
            StreamKind::Audio if self.audio_time_base.is_some() => self.establish(kind, pts),
            _ => return Some(pts),
        };

        let origin = match kind {
            StreamKind::Video => Some(origins.first_video_pts),
            _ => origins.first_audio_pts,
        };

        Some(match origin {
            Some(origin) => pts - origin,
            None => pts,
        })
    }

    fn establish(&self, kind: StreamKind, pts: i64) -> &PtsOrigins {
        self.origins.get_or_init(|| {
            let origins = match (kind, self.audio_time_base) {
                (StreamKind::Audio, Some(audio_tb)) => PtsOrigins {
                    first_pts: pts,
                    first_kind: kind,
                    first_video_pts: audio_tb.rescale(pts, self.video_time_base),
                    first_audio_pts: Some(pts),
                },
                _ => PtsOrigins {
                    first_pts: pts,
                    first_kind: StreamKind::Video,
                    first_video_pts: pts,
                    first_audio_pts: self
                        .audio_time_base
                        .map(|audio_tb| self.video_time_base.rescale(pts, audio_tb)),
                },
            };
            info!(
                "时间原点由 {} 流确定: first_pts={} video={} audio={:?}",
                origins.first_kind.as_str(),
                origins.first_pts,
                origins.first_video_pts,
                origins.first_audio_pts
            );
            origins
        })
    }
}
