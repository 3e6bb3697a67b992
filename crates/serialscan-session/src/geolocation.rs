//! 위치 조회.
//!
//! 세션당 한 번만 시도하고 성공 값은 세션 동안 캐시한다.
//! 실패/타임아웃/미지원은 모두 `None`이며 스캔을 막지 않는다.

use parking_lot::Mutex;
use serialscan_core::config::GeolocationConfig;
use serialscan_core::models::scan::Position;
use serialscan_core::ports::location::LocationSource;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Default)]
struct GeoCache {
    attempted: bool,
    position: Option<Position>,
    /// `reset()`마다 증가. 이전 세션의 늦은 응답은 버린다
    generation: u64,
}

/// 세션 위치 리졸버
pub struct GeolocationResolver {
    source: Option<Arc<dyn LocationSource>>,
    config: GeolocationConfig,
    cache: Mutex<GeoCache>,
}

impl GeolocationResolver {
    pub fn new(source: Option<Arc<dyn LocationSource>>, config: GeolocationConfig) -> Self {
        Self {
            source,
            config,
            cache: Mutex::new(GeoCache::default()),
        }
    }

    /// 위치 소스 없는 리졸버 (항상 `None`)
    pub fn unavailable() -> Self {
        Self::new(None, GeolocationConfig::default())
    }

    /// 캐시된 위치
    pub fn cached(&self) -> Option<Position> {
        self.cache.lock().position
    }

    /// 한 번만 조회. 이미 시도했으면 캐시 값을 돌려준다
    pub async fn resolve_once(&self) -> Option<Position> {
        let generation = {
            let mut cache = self.cache.lock();
            if cache.attempted {
                return cache.position;
            }
            cache.attempted = true;
            cache.generation
        };

        let Some(source) = self.source.as_ref().filter(|_| self.config.enabled) else {
            debug!("위치 조회 비활성 또는 미지원");
            return None;
        };

        let lookup = source.current_position(self.config.high_accuracy);
        let position = match tokio::time::timeout(self.config.timeout(), lookup).await {
            Ok(Ok(position)) => position,
            Ok(Err(e)) => {
                warn!("위치 조회 실패: {e}");
                return None;
            }
            Err(_) => {
                warn!("위치 조회 타임아웃 ({}ms)", self.config.timeout_ms);
                return None;
            }
        };

        let mut cache = self.cache.lock();
        if cache.generation != generation {
            debug!("세션 초기화 이후 도착한 위치 폐기");
            return None;
        }
        cache.position = Some(position);
        info!(
            "위치 확보: ({:.5}, {:.5}) ±{:.0}m",
            position.lat, position.lng, position.accuracy
        );
        Some(position)
    }

    /// 캐시와 시도 플래그 초기화
    pub fn reset(&self) {
        let mut cache = self.cache.lock();
        cache.attempted = false;
        cache.position = None;
        cache.generation += 1;
    }
}
