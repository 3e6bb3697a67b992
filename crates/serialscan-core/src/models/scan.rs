//! 스캔 결과 모델.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::serial::SerialNumber;

/// 장치 위치 (위도/경도/정확도 미터)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub lat: f64,
    pub lng: f64,
    pub accuracy: f64,
}

/// 세션에 채택된 시리얼 (생성 후 불변)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScannedSerial {
    /// 시리얼 번호
    pub number: SerialNumber,
    /// 채택 시점의 캐시된 위치
    pub location: Option<Position>,
    /// 채택 시각 (ISO-8601로 직렬화)
    pub timestamp: DateTime<Utc>,
}

impl ScannedSerial {
    /// 현재 시각으로 생성
    pub fn new(number: SerialNumber, location: Option<Position>) -> Self {
        Self {
            number,
            location,
            timestamp: Utc::now(),
        }
    }
}
