//! 화면 배치 포트.
//!
//! 프레젠테이션 레이어가 선언한 스캔 영역과 비디오 요소 위치를 사이클마다 읽는다.

use crate::models::geometry::ViewLayout;

/// 화면 배치 제공자
pub trait ViewLayoutSource: Send + Sync {
    /// 현재 배치. 스캔 영역이 아직 없으면 `None` (해당 사이클은 건너뜀)
    fn current(&self) -> Option<ViewLayout>;
}

/// 고정 배치는 그 자체가 제공자
impl ViewLayoutSource for ViewLayout {
    fn current(&self) -> Option<ViewLayout> {
        Some(*self)
    }
}
