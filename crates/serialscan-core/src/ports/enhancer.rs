//! 이미지 보정 백엔드 포트 (선택적).

use image::DynamicImage;

use crate::error::CoreError;

/// 인식 전 래스터 보정 (동기)
pub trait ImageEnhancer: Send + Sync {
    /// 보정된 래스터 반환
    fn enhance(&self, raster: &DynamicImage) -> Result<DynamicImage, CoreError>;

    /// 백엔드 이름 (로그용)
    fn name(&self) -> &str;
}
