//! 카메라 포트.
//!
//! 구현: `serialscan-vision::capture` (이미지 폴더), 플랫폼 카메라 어댑터

use async_trait::async_trait;
use image::DynamicImage;
use serde::{Deserialize, Serialize};

use crate::config::CameraConfig;
use crate::error::CoreError;

/// 카메라 방향 제약
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FacingMode {
    /// 후면 카메라만 허용 (정확 일치)
    Environment,
    /// 아무 카메라
    Any,
}

/// 카메라 획득 제약
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraConstraints {
    pub facing: FacingMode,
    /// 이상 해상도 (강제 아님)
    pub ideal_width: u32,
    pub ideal_height: u32,
}

impl CameraConstraints {
    /// 후면 카메라 + 이상 해상도
    pub fn rear(config: &CameraConfig) -> Self {
        Self {
            facing: FacingMode::Environment,
            ideal_width: config.ideal_width,
            ideal_height: config.ideal_height,
        }
    }

    /// 방향 제약 없는 폴백
    pub fn any(config: &CameraConfig) -> Self {
        Self {
            facing: FacingMode::Any,
            ideal_width: config.ideal_width,
            ideal_height: config.ideal_height,
        }
    }
}

/// 카메라 소스 — 스트림 획득
#[async_trait]
pub trait CameraSource: Send + Sync {
    /// 제약에 맞는 스트림 획득 (권한 거부/장치 없음 → `CoreError::Camera`)
    async fn acquire(
        &self,
        constraints: &CameraConstraints,
    ) -> Result<Box<dyn CameraStream>, CoreError>;
}

/// 활성 카메라 스트림
pub trait CameraStream: Send {
    /// 현재 순간의 프레임 스냅샷
    fn grab_frame(&mut self) -> Result<DynamicImage, CoreError>;

    /// 모든 트랙 정지. 여러 번 호출해도 안전해야 한다
    fn release(&mut self);

    /// 트랙이 살아 있는지
    fn is_active(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constraints_from_config() {
        let config = CameraConfig::default();
        let rear = CameraConstraints::rear(&config);
        assert_eq!(rear.facing, FacingMode::Environment);
        assert_eq!((rear.ideal_width, rear.ideal_height), (1920, 1080));

        let any = CameraConstraints::any(&config);
        assert_eq!(any.facing, FacingMode::Any);
        assert_eq!(any.ideal_width, rear.ideal_width);
    }
}
