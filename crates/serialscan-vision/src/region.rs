//! 스캔 영역 추출.
//!
//! 화면 좌표의 스캔 가이드 박스를 프레임 픽셀 좌표로 변환하고,
//! 글자가 잘리지 않도록 패딩을 더한 뒤 프레임 경계로 자른다.

use image::{DynamicImage, GenericImageView};
use serialscan_core::models::geometry::{Roi, ScreenRect, ViewLayout};
use tracing::debug;

/// 기본 ROI 패딩 (프레임 픽셀)
pub const DEFAULT_PADDING_PX: u32 = 5;

/// 스캔 영역 → 프레임 ROI 계산
///
/// 입력 사각형의 면적이 0이거나, 배율이 유한하지 않거나, 결과 너비/높이가
/// 0 이하면 `None`. `None`은 에러가 아니라 해당 사이클을 건너뛰라는 뜻이다.
pub fn compute_roi(
    scan_region: &ScreenRect,
    video_rect: &ScreenRect,
    frame_width: u32,
    frame_height: u32,
    padding: u32,
) -> Option<Roi> {
    if !scan_region.has_area() || !video_rect.has_area() || frame_width == 0 || frame_height == 0
    {
        return None;
    }

    let (exact_x, exact_y, exact_w, exact_h) =
        exact_bounds(scan_region, video_rect, frame_width, frame_height)?;

    // 프레임 왼쪽/위쪽 바깥에 완전히 놓인 영역
    let pad = i64::from(padding);
    if exact_x.saturating_add(exact_w).saturating_add(pad) <= 0
        || exact_y.saturating_add(exact_h).saturating_add(pad) <= 0
    {
        return None;
    }

    let x = exact_x.saturating_sub(pad).max(0);
    let y = exact_y.saturating_sub(pad).max(0);
    let w = (i64::from(frame_width) - x).min(exact_w.saturating_add(pad.saturating_mul(2)));
    let h = (i64::from(frame_height) - y).min(exact_h.saturating_add(pad.saturating_mul(2)));

    if w <= 0 || h <= 0 {
        return None;
    }

    Some(Roi {
        x: x as u32,
        y: y as u32,
        w: w as u32,
        h: h as u32,
    })
}

/// 패딩 전 정확한 경계 (반올림된 프레임 픽셀, 음수 가능)
///
/// 좌표 중 하나라도 유한하지 않으면 `None`. 유한한 값은 `i64` 범위로 포화된다.
fn exact_bounds(
    scan_region: &ScreenRect,
    video_rect: &ScreenRect,
    frame_width: u32,
    frame_height: u32,
) -> Option<(i64, i64, i64, i64)> {
    let scale_x = f64::from(frame_width) / video_rect.width;
    let scale_y = f64::from(frame_height) / video_rect.height;

    let bounds = [
        (scan_region.left - video_rect.left) * scale_x,
        (scan_region.top - video_rect.top) * scale_y,
        scan_region.width * scale_x,
        scan_region.height * scale_y,
    ];
    if bounds.iter().any(|v| !v.is_finite()) {
        debug!(?bounds, "ROI 좌표가 유한하지 않음");
        return None;
    }

    let [x, y, w, h] = bounds.map(|v| v.round() as i64);
    Some((x, y, w, h))
}

/// 프레임에서 ROI 잘라내기
pub fn extract_region(frame: &DynamicImage, roi: &Roi) -> DynamicImage {
    frame.crop_imm(roi.x, roi.y, roi.w, roi.h)
}

/// 영역 추출기 — ROI 계산 + 크롭
#[derive(Debug, Clone, Copy)]
pub struct RegionExtractor {
    padding: u32,
}

impl RegionExtractor {
    pub fn new(padding: u32) -> Self {
        Self { padding }
    }

    pub fn padding(&self) -> u32 {
        self.padding
    }

    /// 배치에 맞춰 프레임에서 스캔 영역을 잘라낸다
    pub fn extract(&self, frame: &DynamicImage, layout: &ViewLayout) -> Option<(Roi, DynamicImage)> {
        let (fw, fh) = frame.dimensions();
        let Some(roi) = compute_roi(&layout.scan_region, &layout.video_rect, fw, fh, self.padding)
        else {
            debug!("스캔 영역 무효 — 사이클 건너뜀 (프레임 {fw}x{fh})");
            return None;
        };

        debug!(
            "스캔 영역: 프레임 {}x{} → ROI {}x{} at ({}, {})",
            fw, fh, roi.w, roi.h, roi.x, roi.y
        );

        Some((roi, extract_region(frame, &roi)))
    }
}

impl Default for RegionExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_PADDING_PX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbaImage;

    fn rect(l: f64, t: f64, w: f64, h: f64) -> ScreenRect {
        ScreenRect::new(l, t, w, h)
    }

    #[test]
    fn unit_scale_with_padding() {
        let scan = rect(320.0, 310.0, 640.0, 100.0);
        let video = rect(0.0, 0.0, 1280.0, 720.0);

        assert_eq!(exact_bounds(&scan, &video, 1280, 720), Some((320, 310, 640, 100)));

        let roi = compute_roi(&scan, &video, 1280, 720, 5).unwrap();
        assert_eq!(
            roi,
            Roi {
                x: 315,
                y: 305,
                w: 650,
                h: 110
            }
        );
    }

    #[test]
    fn scales_display_to_frame_pixels() {
        // 화면 640x360에 표시된 1920x1080 프레임 → 배율 3.0
        let scan = rect(100.0, 150.0, 200.0, 40.0);
        let video = rect(20.0, 30.0, 640.0, 360.0);
        let roi = compute_roi(&scan, &video, 1920, 1080, 0).unwrap();
        assert_eq!(
            roi,
            Roi {
                x: 240,
                y: 360,
                w: 600,
                h: 120
            }
        );
    }

    #[test]
    fn clamps_to_frame_bounds() {
        // 스캔 영역이 좌상단 모서리에 붙어 있음
        let scan = rect(0.0, 0.0, 100.0, 50.0);
        let video = rect(0.0, 0.0, 200.0, 100.0);
        let roi = compute_roi(&scan, &video, 200, 100, 5).unwrap();
        assert_eq!((roi.x, roi.y), (0, 0));
        assert_eq!((roi.w, roi.h), (110, 60));

        // 우하단 모서리 — 너비/높이가 프레임 밖으로 나가지 않음
        let scan = rect(150.0, 80.0, 50.0, 20.0);
        let roi = compute_roi(&scan, &video, 200, 100, 5).unwrap();
        assert_eq!((roi.x, roi.y), (145, 75));
        assert_eq!(roi.x + roi.w, 200);
        assert_eq!(roi.y + roi.h, 100);
    }

    #[test]
    fn zero_area_inputs_abort() {
        let video = rect(0.0, 0.0, 1280.0, 720.0);
        assert!(compute_roi(&rect(10.0, 10.0, 0.0, 50.0), &video, 1280, 720, 5).is_none());
        assert!(compute_roi(&rect(10.0, 10.0, 50.0, 50.0), &rect(0.0, 0.0, 0.0, 0.0), 1280, 720, 5).is_none());
        assert!(compute_roi(&rect(10.0, 10.0, 50.0, 50.0), &video, 0, 720, 5).is_none());
    }

    #[test]
    fn extreme_geometry_never_panics() {
        let video = rect(0.0, 0.0, 1280.0, 720.0);

        // 거대한 너비는 프레임 경계로 잘린다
        let roi = compute_roi(&rect(0.0, 0.0, 1e300, 50.0), &video, 1280, 720, 5).unwrap();
        assert_eq!((roi.x, roi.y, roi.w, roi.h), (0, 0, 1280, 60));

        // 프레임 왼쪽 멀리 떨어진 영역
        assert!(compute_roi(&rect(-1e300, 10.0, 100.0, 50.0), &video, 1280, 720, 5).is_none());
        assert!(compute_roi(&rect(10.0, -1e300, 100.0, 50.0), &video, 1280, 720, 5).is_none());

        // 비정규 너비 → 배율 무한대
        let tiny = rect(0.0, 0.0, 1e-320, 720.0);
        assert!(compute_roi(&rect(0.0, 0.0, 100.0, 50.0), &tiny, 1280, 720, 5).is_none());

        assert!(compute_roi(&rect(0.0, 0.0, 100.0, 50.0), &video, 1280, 720, u32::MAX).is_some());
    }

    #[test]
    fn region_outside_frame_aborts() {
        let scan = rect(2000.0, 10.0, 100.0, 50.0);
        let video = rect(0.0, 0.0, 1280.0, 720.0);
        assert!(compute_roi(&scan, &video, 1280, 720, 5).is_none());
    }

    #[test]
    fn extractor_crops_frame() {
        let frame = DynamicImage::ImageRgba8(RgbaImage::new(1280, 720));
        let layout = ViewLayout {
            scan_region: rect(320.0, 310.0, 640.0, 100.0),
            video_rect: rect(0.0, 0.0, 1280.0, 720.0),
        };
        let (roi, cropped) = RegionExtractor::default().extract(&frame, &layout).unwrap();
        assert_eq!(roi.w, 650);
        assert_eq!(cropped.dimensions(), (650, 110));
    }
}
