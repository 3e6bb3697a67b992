//! 인식 전 이미지 보정.
//!
//! 최소 크기 업스케일 → 그레이스케일 → 밝기/대비 → Otsu 전역 이진화.
//! 보정 백엔드가 없거나 실패하면 원본을 그대로 돌려준다 (에러 전파 없음).

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, GrayImage};
use imageproc::contrast::otsu_level;
use serialscan_core::config::EnhancementConfig;
use serialscan_core::error::CoreError;
use serialscan_core::ports::enhancer::ImageEnhancer;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Otsu 이진화 보정기 — `ImageEnhancer` 포트 구현
#[derive(Debug, Clone)]
pub struct OtsuEnhancer {
    min_side_px: u32,
    contrast_alpha: f32,
    brightness_beta: f32,
}

impl OtsuEnhancer {
    pub fn new(min_side_px: u32, contrast_alpha: f32, brightness_beta: f32) -> Self {
        Self {
            min_side_px,
            contrast_alpha,
            brightness_beta,
        }
    }

    pub fn from_config(config: &EnhancementConfig) -> Self {
        Self::new(
            config.min_side_px,
            config.contrast_alpha,
            config.brightness_beta,
        )
    }

    /// 최소 변 길이 미만이면 업스케일 후 그레이스케일 변환
    fn to_gray(&self, raster: &DynamicImage) -> GrayImage {
        let (w, h) = raster.dimensions();
        if w < self.min_side_px || h < self.min_side_px {
            let (nw, nh) = (w.max(self.min_side_px), h.max(self.min_side_px));
            debug!("보정 전 업스케일: {w}x{h} → {nw}x{nh}");
            raster
                .resize_exact(nw, nh, FilterType::CatmullRom)
                .to_luma8()
        } else {
            raster.to_luma8()
        }
    }
}

impl ImageEnhancer for OtsuEnhancer {
    fn enhance(&self, raster: &DynamicImage) -> Result<DynamicImage, CoreError> {
        let (w, h) = raster.dimensions();
        if w == 0 || h == 0 {
            return Err(CoreError::Enhancement(
                "빈 이미지: 너비 또는 높이가 0".to_string(),
            ));
        }

        let mut gray = self.to_gray(raster);

        // out = saturate(alpha * px + beta)
        for pixel in gray.pixels_mut() {
            let adjusted = self.contrast_alpha * f32::from(pixel.0[0]) + self.brightness_beta;
            pixel.0[0] = adjusted.round().clamp(0.0, 255.0) as u8;
        }

        let level = otsu_level(&gray);
        for pixel in gray.pixels_mut() {
            pixel.0[0] = if pixel.0[0] > level { 255 } else { 0 };
        }
        debug!("Otsu 임계값: {level}");

        Ok(DynamicImage::ImageLuma8(gray))
    }

    fn name(&self) -> &str {
        "otsu"
    }
}

/// 전처리 어댑터 — 보정 백엔드 선택적 사용
pub struct Preprocessor {
    enhancer: Option<Arc<dyn ImageEnhancer>>,
    /// 저하 모드 알림은 한 번만 기록
    degraded_noticed: AtomicBool,
}

impl Preprocessor {
    pub fn new(enhancer: Option<Arc<dyn ImageEnhancer>>) -> Self {
        Self {
            enhancer,
            degraded_noticed: AtomicBool::new(false),
        }
    }

    /// 설정에 따라 Otsu 보정기 장착 또는 통과 모드
    pub fn from_config(config: &EnhancementConfig) -> Self {
        if config.enabled {
            Self::new(Some(Arc::new(OtsuEnhancer::from_config(config))))
        } else {
            Self::passthrough()
        }
    }

    /// 보정 없이 원본 통과
    pub fn passthrough() -> Self {
        Self::new(None)
    }

    /// 보정 백엔드가 없는지
    pub fn is_degraded(&self) -> bool {
        self.enhancer.is_none()
    }

    /// 래스터 보정. 실패 시 원본 반환
    pub fn enhance(&self, raster: DynamicImage) -> DynamicImage {
        let Some(enhancer) = &self.enhancer else {
            if !self.degraded_noticed.swap(true, Ordering::Relaxed) {
                info!("이미지 보정 백엔드 없음 — 원본으로 인식 (저하 모드)");
            }
            return raster;
        };

        match enhancer.enhance(&raster) {
            Ok(enhanced) => enhanced,
            Err(e) => {
                warn!("이미지 보정 실패 ({}), 원본 사용: {e}", enhancer.name());
                raster
            }
        }
    }
}
