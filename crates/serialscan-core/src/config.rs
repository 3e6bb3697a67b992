//! 애플리케이션 설정 구조체.
//!
//! 스캔 루프 주기, 카메라 제약, 인식기/보정 파라미터, 위치 조회, CRM 프록시,
//! 자산 할당 제출 방식 등 런타임 설정을 정의한다.
//! `ConfigManager`를 통해 JSON 파일에서 로드.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::CoreError;

/// 최상위 애플리케이션 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// 스캔 루프 설정
    #[serde(default)]
    pub scan: ScanConfig,
    /// 카메라 설정
    #[serde(default)]
    pub camera: CameraConfig,
    /// 텍스트 인식기 설정
    #[serde(default)]
    pub recognizer: RecognizerConfig,
    /// 이미지 보정 설정
    #[serde(default)]
    pub enhancement: EnhancementConfig,
    /// 위치 조회 설정
    #[serde(default)]
    pub geolocation: GeolocationConfig,
    /// CRM 프록시 연결 설정
    #[serde(default)]
    pub crm: CrmConfig,
    /// 자산 할당/제출 설정
    #[serde(default)]
    pub assignment: AssignmentConfig,
}

// ============================================================
// 스캔 루프 설정
// ============================================================

/// 스캔 루프 설정 — 사이클 간격, ROI 패딩, 인식 타임아웃
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// 사이클 완료 후 다음 사이클까지 대기 (밀리초)
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
    /// ROI 패딩 (프레임 픽셀)
    #[serde(default = "default_roi_padding_px")]
    pub roi_padding_px: u32,
    /// 인식 호출 타임아웃 (밀리초). None이면 무제한
    #[serde(default)]
    pub recognition_timeout_ms: Option<u64>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            settle_delay_ms: default_settle_delay_ms(),
            roi_padding_px: default_roi_padding_px(),
            recognition_timeout_ms: None,
        }
    }
}

impl ScanConfig {
    /// 사이클 간 대기 시간을 Duration으로 반환
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    /// 인식 타임아웃을 Duration으로 반환
    pub fn recognition_timeout(&self) -> Option<Duration> {
        self.recognition_timeout_ms.map(Duration::from_millis)
    }
}

// ============================================================
// 카메라 설정
// ============================================================

/// 카메라 설정 — 후면 카메라 우선, 이상 해상도
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraConfig {
    /// 후면 카메라 우선 요청
    #[serde(default = "default_true")]
    pub prefer_rear: bool,
    /// 이상 해상도 너비
    #[serde(default = "default_ideal_width")]
    pub ideal_width: u32,
    /// 이상 해상도 높이
    #[serde(default = "default_ideal_height")]
    pub ideal_height: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            prefer_rear: true,
            ideal_width: default_ideal_width(),
            ideal_height: default_ideal_height(),
        }
    }
}

// ============================================================
// 인식기 설정
// ============================================================

/// 텍스트 인식기 설정 — 숫자 화이트리스트, 단일 라인 모드
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognizerConfig {
    /// 인식 언어
    #[serde(default = "default_language")]
    pub language: String,
    /// Tesseract 데이터 경로 (None이면 시스템 기본값)
    #[serde(default)]
    pub tessdata_path: Option<PathBuf>,
    /// 허용 문자 목록
    #[serde(default = "default_char_whitelist")]
    pub char_whitelist: String,
    /// 페이지 분할 모드 (7 = 단일 텍스트 라인)
    #[serde(default = "default_page_seg_mode")]
    pub page_seg_mode: u8,
}

impl Default for RecognizerConfig {
    fn default() -> Self {
        Self {
            language: default_language(),
            tessdata_path: None,
            char_whitelist: default_char_whitelist(),
            page_seg_mode: default_page_seg_mode(),
        }
    }
}

// ============================================================
// 이미지 보정 설정
// ============================================================

/// 이미지 보정 설정 — 업스케일, 밝기/대비, 이진화
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnhancementConfig {
    /// 보정 사용 여부 (false면 원본 그대로 인식)
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// 최소 변 길이 (픽셀). 이보다 작으면 업스케일
    #[serde(default = "default_min_side_px")]
    pub min_side_px: u32,
    /// 대비 배율
    #[serde(default = "default_contrast_alpha")]
    pub contrast_alpha: f32,
    /// 밝기 오프셋
    #[serde(default = "default_brightness_beta")]
    pub brightness_beta: f32,
}

impl Default for EnhancementConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_side_px: default_min_side_px(),
            contrast_alpha: default_contrast_alpha(),
            brightness_beta: default_brightness_beta(),
        }
    }
}

// ============================================================
// 위치 조회 설정
// ============================================================

/// 위치 조회 설정 — 단발성, 타임아웃
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeolocationConfig {
    /// 위치 태깅 사용 여부
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// 조회 타임아웃 (밀리초)
    #[serde(default = "default_geolocation_timeout_ms")]
    pub timeout_ms: u64,
    /// 고정밀 모드 요청
    #[serde(default = "default_true")]
    pub high_accuracy: bool,
}

impl Default for GeolocationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_ms: default_geolocation_timeout_ms(),
            high_accuracy: true,
        }
    }
}

impl GeolocationConfig {
    /// 조회 타임아웃을 Duration으로 반환
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

// ============================================================
// CRM 프록시 설정
// ============================================================

/// CRM 프록시 연결 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrmConfig {
    /// 프록시 기본 URL (예: "http://localhost:3000/zoho")
    #[serde(default = "default_crm_base_url")]
    pub base_url: String,
    /// 요청 타임아웃 (밀리초)
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl Default for CrmConfig {
    fn default() -> Self {
        Self {
            base_url: default_crm_base_url(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl CrmConfig {
    /// 요청 타임아웃을 Duration으로 반환
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

// ============================================================
// 자산 할당 설정
// ============================================================

/// 슬롯당 제출 시리얼 수
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SerialCardinality {
    /// 슬롯에 누적된 시리얼 전부를 배열로 제출
    #[default]
    AllSerials,
    /// 슬롯의 첫 시리얼만 `Serial_N` 필드로 제출
    FirstSerialOnly,
}

/// 자산 할당/제출 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignmentConfig {
    /// 슬롯당 제출 시리얼 수
    #[serde(default)]
    pub cardinality: SerialCardinality,
    /// 제출 성공 메시지 표시 시간 (밀리초)
    #[serde(default = "default_confirmation_delay_ms")]
    pub confirmation_delay_ms: u64,
}

impl Default for AssignmentConfig {
    fn default() -> Self {
        Self {
            cardinality: SerialCardinality::AllSerials,
            confirmation_delay_ms: default_confirmation_delay_ms(),
        }
    }
}

impl AssignmentConfig {
    /// 확인 메시지 표시 시간을 Duration으로 반환
    pub fn confirmation_delay(&self) -> Duration {
        Duration::from_millis(self.confirmation_delay_ms)
    }
}

// ============================================================
// AppConfig impl
// ============================================================

/// ROI 패딩 상한 (픽셀)
const MAX_ROI_PADDING_PX: u32 = 100;

impl AppConfig {
    /// 기본 설정값 반환
    pub fn default_config() -> Self {
        Self {
            scan: ScanConfig::default(),
            camera: CameraConfig::default(),
            recognizer: RecognizerConfig::default(),
            enhancement: EnhancementConfig::default(),
            geolocation: GeolocationConfig::default(),
            crm: CrmConfig::default(),
            assignment: AssignmentConfig::default(),
        }
    }

    /// 설정값 유효성 검증
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.scan.roi_padding_px > MAX_ROI_PADDING_PX {
            return Err(CoreError::Validation {
                field: "scan.roi_padding_px".to_string(),
                message: format!("{MAX_ROI_PADDING_PX} 이하여야 함"),
            });
        }
        if self.scan.recognition_timeout_ms == Some(0) {
            return Err(CoreError::Validation {
                field: "scan.recognition_timeout_ms".to_string(),
                message: "0은 허용되지 않음 (무제한은 null)".to_string(),
            });
        }
        if self.camera.ideal_width == 0 || self.camera.ideal_height == 0 {
            return Err(CoreError::Validation {
                field: "camera".to_string(),
                message: "이상 해상도는 0보다 커야 함".to_string(),
            });
        }
        if self.recognizer.char_whitelist.is_empty() {
            return Err(CoreError::Validation {
                field: "recognizer.char_whitelist".to_string(),
                message: "비어 있을 수 없음".to_string(),
            });
        }
        if !(self.enhancement.contrast_alpha.is_finite() && self.enhancement.contrast_alpha > 0.0)
        {
            return Err(CoreError::Validation {
                field: "enhancement.contrast_alpha".to_string(),
                message: "양의 유한값이어야 함".to_string(),
            });
        }
        if self.crm.base_url.trim().is_empty() {
            return Err(CoreError::Validation {
                field: "crm.base_url".to_string(),
                message: "비어 있을 수 없음".to_string(),
            });
        }
        Ok(())
    }
}

// ============================================================
// 기본값 함수
// ============================================================

fn default_true() -> bool {
    true
}

fn default_settle_delay_ms() -> u64 {
    200
}
fn default_roi_padding_px() -> u32 {
    5
}
fn default_ideal_width() -> u32 {
    1920
}
fn default_ideal_height() -> u32 {
    1080
}
fn default_language() -> String {
    "eng".to_string()
}
fn default_char_whitelist() -> String {
    "0123456789".to_string()
}
fn default_page_seg_mode() -> u8 {
    7
}
fn default_min_side_px() -> u32 {
    100
}
fn default_contrast_alpha() -> f32 {
    1.5
}
fn default_brightness_beta() -> f32 {
    30.0
}
fn default_geolocation_timeout_ms() -> u64 {
    10_000
}
fn default_crm_base_url() -> String {
    "http://localhost:3000/zoho".to_string()
}
fn default_request_timeout_ms() -> u64 {
    30_000
}
fn default_confirmation_delay_ms() -> u64 {
    2_000
}
