//! 위치 조회 포트.

use async_trait::async_trait;

use crate::error::CoreError;
use crate::models::scan::Position;

/// 단발성 장치 위치 조회
///
/// 타임아웃은 호출자(`GeolocationResolver`)가 적용한다.
#[async_trait]
pub trait LocationSource: Send + Sync {
    async fn current_position(&self, high_accuracy: bool) -> Result<Position, CoreError>;
}
