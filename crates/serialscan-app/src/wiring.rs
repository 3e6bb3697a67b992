//! 어댑터 생성 (DI 와이어링).
//!
//! CLI 인자와 `AppConfig`로 카메라, 인식기, 화면 배치, 위치 소스,
//! 딜 저장소를 만들어 세션 컴포넌트에 연결한다.

use async_trait::async_trait;
use serialscan_core::config::{AppConfig, RecognizerConfig};
use serialscan_core::error::CoreError;
use serialscan_core::models::geometry::{ScreenRect, ViewLayout};
use serialscan_core::models::scan::Position;
use serialscan_core::ports::location::LocationSource;
use serialscan_core::ports::recognizer::TextRecognizer;
use serialscan_session::controller::ScanController;
use serialscan_vision::capture::ImageFolderCamera;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// `left,top,width,height` 형식 사각형 파싱 (clap value_parser)
pub fn parse_rect(value: &str) -> Result<ScreenRect, String> {
    let parts = parse_numbers(value, 4)?;
    let rect = ScreenRect::new(parts[0], parts[1], parts[2], parts[3]);
    if !rect.has_area() {
        return Err(format!("너비/높이는 양수여야 함: {value}"));
    }
    Ok(rect)
}

/// `lat,lng[,accuracy]` 형식 위치 파싱
pub fn parse_position(value: &str) -> Result<Position, String> {
    let expected = if value.matches(',').count() == 2 { 3 } else { 2 };
    let numbers = parse_numbers(value, expected)?;
    let (lat, lng) = (numbers[0], numbers[1]);
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
        return Err(format!("위도/경도 범위 밖: {value}"));
    }
    Ok(Position {
        lat,
        lng,
        accuracy: numbers.get(2).copied().unwrap_or(0.0),
    })
}

fn parse_numbers(value: &str, expected: usize) -> Result<Vec<f64>, String> {
    let numbers = value
        .split(',')
        .map(|part| part.trim().parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| format!("숫자 파싱 실패 '{value}': {e}"))?;
    if numbers.len() != expected {
        return Err(format!("값 {expected}개 필요: {value}"));
    }
    Ok(numbers)
}

/// 화면 배치 결정
///
/// 스캔 영역은 비디오 위치와 같은 좌표계일 때만 의미가 있다.
/// 비디오 위치가 없으면 프레임 전체를 스캔한다.
pub fn build_layout(scan_region: Option<ScreenRect>, video_rect: Option<ScreenRect>) -> ViewLayout {
    match video_rect {
        Some(video_rect) => ViewLayout {
            scan_region: scan_region.unwrap_or(video_rect),
            video_rect,
        },
        None => ViewLayout::full_frame(1.0, 1.0),
    }
}

/// 고정 위치 소스 (`--position`)
pub struct StaticLocation {
    position: Position,
}

impl StaticLocation {
    pub fn new(position: Position) -> Self {
        Self { position }
    }
}

#[async_trait]
impl LocationSource for StaticLocation {
    async fn current_position(&self, _high_accuracy: bool) -> Result<Position, CoreError> {
        Ok(self.position)
    }
}

/// OCR 기능 없이 빌드됐을 때의 인식기. 초기화가 항상 실패해 스캔이 비활성화된다
#[cfg_attr(feature = "ocr", allow(dead_code))]
pub struct UnavailableRecognizer;

#[async_trait]
impl TextRecognizer for UnavailableRecognizer {
    async fn initialize(&self, _settings: &RecognizerConfig) -> Result<(), CoreError> {
        Err(CoreError::RecognizerInit(
            "OCR 기능 없이 빌드됨 (--features ocr)".to_string(),
        ))
    }

    async fn recognize(&self, _raster: &image::DynamicImage) -> Result<String, CoreError> {
        Err(CoreError::Recognition("인식기 없음".to_string()))
    }

    fn name(&self) -> &str {
        "unavailable"
    }
}

/// 빌드 기능에 맞는 인식기
pub fn build_recognizer() -> Arc<dyn TextRecognizer> {
    #[cfg(feature = "ocr")]
    {
        Arc::new(serialscan_vision::ocr::TesseractRecognizer::new())
    }
    #[cfg(not(feature = "ocr"))]
    {
        Arc::new(UnavailableRecognizer)
    }
}

/// 스캔 컨트롤러 조립
pub fn build_scanner(
    config: &AppConfig,
    frames: &Path,
    layout: ViewLayout,
    position: Option<Position>,
) -> ScanController {
    let camera = Arc::new(ImageFolderCamera::new(frames));
    let recognizer = build_recognizer();
    info!(
        "스캐너 구성: 프레임={}, 인식기={}",
        frames.display(),
        recognizer.name()
    );
    debug!("화면 배치: {layout:?}");

    let scanner = ScanController::new(camera, recognizer, Arc::new(layout), config);
    match position {
        Some(position) => {
            scanner.with_location_source(Arc::new(StaticLocation::new(position)), config)
        }
        None => scanner,
    }
}
