//! 세션 이벤트 버스.
//!
//! `tokio::broadcast` 기반. 프레젠테이션 레이어는 구독만 하고
//! 상태 머신은 구독자 유무와 관계없이 발행한다.

use serialscan_core::models::deal::{Asset, Deal};
use serialscan_core::models::scan::ScannedSerial;
use tokio::sync::broadcast;
use tracing::debug;

use crate::assignment::AssignmentState;
use crate::controller::ScanState;

/// 카메라 획득 실패 메시지
pub const CAMERA_DENIED_MESSAGE: &str = "Camera access denied. Please check permissions.";
/// 사이클 처리 실패 메시지
pub const PROCESSING_ERROR_MESSAGE: &str = "Processing error. Please try again.";
/// 인식기 초기화 실패 메시지
pub const INIT_FAILED_MESSAGE: &str = "Scanner initialization failed. Please refresh and try again.";
/// 딜 목록 조회 실패 메시지
pub const DEALS_FAILED_MESSAGE: &str = "Failed to load deals. Please try again.";
/// 자산 조회 실패 메시지
pub const ASSETS_FAILED_MESSAGE: &str = "Failed to load deal assets. Please try again.";
/// 슬롯 스캔 시작 실패 메시지
pub const SCAN_START_FAILED_MESSAGE: &str = "Failed to start camera. Please try again.";
/// 제출 성공 메시지
pub const SUBMITTED_MESSAGE: &str = "Serial numbers successfully updated!";
/// 제출 실패 메시지
pub const SUBMIT_FAILED_MESSAGE: &str = "Failed to update serial numbers. Please try again.";

/// 스캔 루프 이벤트
#[derive(Debug, Clone)]
pub enum ScanEvent {
    /// 상태 전이
    StateChanged(ScanState),
    /// 새 시리얼 채택
    Matched(ScannedSerial),
    /// 목록에서 삭제됨
    SerialRemoved { index: usize, serial: ScannedSerial },
    /// 세션 초기화 (목록/위치 캐시 비움)
    SessionReset,
    /// 사용자 표시 메시지
    Error(String),
}

/// 자산 할당 이벤트
#[derive(Debug, Clone)]
pub enum AssignmentEvent {
    /// 상태 전이
    StateChanged(AssignmentState),
    /// 딜 목록 수신
    DealsLoaded(Vec<Deal>),
    /// 딜 선택 + 자산 슬롯 수신
    DealSelected { deal_id: String, assets: Vec<Asset> },
    /// 슬롯에 시리얼 추가
    SerialAssigned { slot: usize, serial: ScannedSerial },
    /// 제출 완료 (확인 메시지 표시 후 초기화)
    Submitted { deal_id: String, message: String },
    /// 사용자 표시 메시지
    Error(String),
}

/// 이벤트 버스
pub struct EventBus<E> {
    tx: broadcast::Sender<E>,
}

impl<E: Clone + std::fmt::Debug> EventBus<E> {
    /// 새 이벤트 버스 생성
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// 이벤트 발행 (구독자 없으면 버림)
    pub fn publish(&self, event: E) {
        debug!("이벤트 발행: {event:?}");
        let _ = self.tx.send(event);
    }

    /// 구독자 생성
    pub fn subscribe(&self) -> broadcast::Receiver<E> {
        self.tx.subscribe()
    }
}

impl<E: Clone + std::fmt::Debug> Default for EventBus<E> {
    fn default() -> Self {
        Self::new(128)
    }
}
