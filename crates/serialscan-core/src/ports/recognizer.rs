//! 텍스트 인식 엔진 포트.
//!
//! 내장 Tesseract 등 OCR 엔진을 추상화한다. 숫자 화이트리스트 +
//! 단일 라인 분할 모드로 한 번 초기화한 뒤 사이클마다 한 번 호출된다.

use async_trait::async_trait;
use image::DynamicImage;

use crate::config::RecognizerConfig;
use crate::error::CoreError;

/// 텍스트 인식기
///
/// 구현체: `TesseractRecognizer` (`serialscan-vision`, `ocr` feature)
#[async_trait]
pub trait TextRecognizer: Send + Sync {
    /// 엔진 초기화. 실패는 치명적 — 스캔 기능 전체 비활성화
    async fn initialize(&self, settings: &RecognizerConfig) -> Result<(), CoreError>;

    /// 래스터에서 원시 텍스트 추출
    async fn recognize(&self, raster: &DynamicImage) -> Result<String, CoreError>;

    /// 엔진 이름 (예: "tesseract")
    fn name(&self) -> &str;
}
