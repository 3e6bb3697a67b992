//! 화면/프레임 좌표계 사각형.
//!
//! 화면 좌표(`ScreenRect`)는 비디오 요소와 같은 장치 독립 픽셀 단위,
//! 프레임 좌표(`Roi`)는 카메라 프레임 픽셀 단위다.

use serde::{Deserialize, Serialize};

/// 화면 좌표계 사각형 (장치 독립 픽셀)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScreenRect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl ScreenRect {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    /// 너비/높이가 양의 유한값인지
    pub fn has_area(&self) -> bool {
        self.left.is_finite()
            && self.top.is_finite()
            && self.width.is_finite()
            && self.height.is_finite()
            && self.width > 0.0
            && self.height > 0.0
    }
}

/// 프레임 픽셀 좌표계의 관심 영역
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roi {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

/// 프레젠테이션 레이어가 선언한 화면 배치
///
/// `scan_region`은 스캔 가이드 박스, `video_rect`는 비디오 요소의 화면 위치.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewLayout {
    pub scan_region: ScreenRect,
    pub video_rect: ScreenRect,
}

impl ViewLayout {
    /// 비디오 전체를 스캔 영역으로 쓰는 배치
    pub fn full_frame(width: f64, height: f64) -> Self {
        let rect = ScreenRect::new(0.0, 0.0, width, height);
        Self {
            scan_region: rect,
            video_rect: rect,
        }
    }
}
