//! SerialScan 핵심 에러 타입.
//!
//! 모든 어댑터 crate는 자체 에러 타입에서 `#[from] CoreError`로 래핑한다.

use thiserror::Error;

/// 코어 레이어 에러.
/// 직렬화, 설정, 외부 협력자(카메라/인식기/CRM) 경계 에러를 정의한다.
#[derive(Debug, Error)]
pub enum CoreError {
    /// JSON 직렬화/역직렬화 실패
    #[error("직렬화 에러: {0}")]
    Serialization(#[from] serde_json::Error),

    /// 설정값 오류
    #[error("설정 에러: {0}")]
    Config(String),

    /// 필드 유효성 검증 실패
    #[error("유효성 검증 실패 — {field}: {message}")]
    Validation {
        /// 검증 실패한 필드명
        field: String,
        /// 실패 사유
        message: String,
    },

    /// 인증 실패 (프록시가 401 반환)
    #[error("인증 에러: {0}")]
    Auth(String),

    /// 리소스를 찾을 수 없음
    #[error("{resource_type} 미발견: {id}")]
    NotFound {
        /// 리소스 종류 (예: "Deal", "Asset")
        resource_type: String,
        /// 리소스 식별자
        id: String,
    },

    /// 내부 에러 (예상치 못한 상황)
    #[error("내부 에러: {0}")]
    Internal(String),

    /// 네트워크 에러 (연결 실패, 타임아웃)
    #[error("네트워크 에러: {0}")]
    Network(String),

    /// 서비스 일시 불가 (503)
    #[error("서비스 일시 불가: {0}")]
    ServiceUnavailable(String),

    /// I/O 에러
    #[error("I/O 에러: {0}")]
    Io(#[from] std::io::Error),

    /// 카메라 획득/프레임 취득 실패 (권한 거부, 장치 없음)
    #[error("카메라 에러: {0}")]
    Camera(String),

    /// 텍스트 인식 엔진 초기화 실패 — 스캔 기능 전체 비활성화
    #[error("인식기 초기화 실패: {0}")]
    RecognizerInit(String),

    /// 텍스트 인식 실패
    #[error("인식 에러: {0}")]
    Recognition(String),

    /// 이미지 보정 실패
    #[error("이미지 보정 에러: {0}")]
    Enhancement(String),

    /// 위치 조회 실패 (권한 거부, 미지원)
    #[error("위치 조회 실패: {0}")]
    Location(String),
}
