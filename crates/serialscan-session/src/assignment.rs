//! 딜 자산 할당 흐름.
//!
//! 딜 선택 → 자산 슬롯별 스캔 → 모든 슬롯이 채워지면 한 번에 제출.
//! 스캔은 `ScanController::scan()`에 위임하고 반환된 시리얼을 해당 슬롯에 붙인다.

use parking_lot::Mutex;
use serialscan_core::config::AssignmentConfig;
use serialscan_core::error::CoreError;
use serialscan_core::models::deal::{Asset, AssignmentPayload, Deal};
use serialscan_core::models::scan::ScannedSerial;
use serialscan_core::ports::deal_store::DealStore;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::controller::{ScanController, ScanError, ScanOutcome};
use crate::events::{
    AssignmentEvent, EventBus, ASSETS_FAILED_MESSAGE, DEALS_FAILED_MESSAGE,
    SCAN_START_FAILED_MESSAGE, SUBMITTED_MESSAGE, SUBMIT_FAILED_MESSAGE,
};

/// 할당 흐름 에러
#[derive(Debug, Error)]
pub enum AssignmentError {
    /// 딜 미선택
    #[error("선택된 딜 없음")]
    NoDealSelected,

    /// 딜에 자산 슬롯이 없음
    #[error("딜 {0}에 자산 슬롯 없음")]
    NoAssets(String),

    /// 슬롯 인덱스 범위 밖
    #[error("슬롯 인덱스 범위 밖: {index} (슬롯 {count}개)")]
    SlotOutOfRange { index: usize, count: usize },

    /// 비어 있는 슬롯이 있어 제출 불가
    #[error("모든 슬롯에 시리얼이 필요함")]
    Incomplete,

    /// 현재 상태에서 허용되지 않는 동작
    #[error("현재 상태({0:?})에서 불가")]
    InvalidState(AssignmentState),

    /// 스캔 실패
    #[error(transparent)]
    Scan(#[from] ScanError),

    /// 코어 에러 (CRM 조회/제출)
    #[error(transparent)]
    Core(#[from] CoreError),
}

/// 할당 흐름 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum AssignmentState {
    /// 딜 선택 대기
    SelectDeal,
    /// 스캔할 슬롯 선택 대기 (비어 있는 슬롯 있음)
    SelectingAsset,
    /// 슬롯 하나를 위해 스캔 중
    Scanning { slot: usize },
    /// 모든 슬롯이 채워짐
    ReadyToSubmit,
    /// 제출 중
    Submitting,
    /// 제출 완료 (확인 표시 후 초기화)
    Submitted,
    /// 제출 실패 (할당 유지, 재시도 가능)
    SubmitFailed,
}

#[derive(Debug)]
struct AssignmentSession {
    state: AssignmentState,
    deals: Vec<Deal>,
    deal_id: Option<String>,
    assets: Vec<Asset>,
    /// 슬롯 인덱스 → 채택 순서의 시리얼
    assignments: BTreeMap<usize, Vec<ScannedSerial>>,
}

impl AssignmentSession {
    fn new() -> Self {
        Self {
            state: AssignmentState::SelectDeal,
            deals: Vec::new(),
            deal_id: None,
            assets: Vec::new(),
            assignments: BTreeMap::new(),
        }
    }

    fn all_filled(&self) -> bool {
        !self.assets.is_empty()
            && (0..self.assets.len())
                .all(|slot| self.assignments.get(&slot).is_some_and(|s| !s.is_empty()))
    }

    /// 슬롯 채움 여부에 따른 대기 상태
    fn idle_state(&self) -> AssignmentState {
        if self.all_filled() {
            AssignmentState::ReadyToSubmit
        } else {
            AssignmentState::SelectingAsset
        }
    }

    fn is_busy(&self) -> bool {
        matches!(
            self.state,
            AssignmentState::Scanning { .. } | AssignmentState::Submitting | AssignmentState::Submitted
        )
    }
}

/// 제출 future가 끝나지 않고 버려졌을 때 상태 복구
struct SubmitGuard<'a> {
    flow: &'a AssignmentFlow,
}

impl Drop for SubmitGuard<'_> {
    fn drop(&mut self) {
        self.flow.abandon_submit();
    }
}

/// 딜 자산 할당 흐름
pub struct AssignmentFlow {
    store: Arc<dyn DealStore>,
    scanner: Arc<ScanController>,
    config: AssignmentConfig,
    session: Mutex<AssignmentSession>,
    events: EventBus<AssignmentEvent>,
}

impl AssignmentFlow {
    pub fn new(
        store: Arc<dyn DealStore>,
        scanner: Arc<ScanController>,
        config: AssignmentConfig,
    ) -> Self {
        Self {
            store,
            scanner,
            config,
            session: Mutex::new(AssignmentSession::new()),
            events: EventBus::default(),
        }
    }

    fn set_state(&self, state: AssignmentState) {
        self.session.lock().state = state;
        debug!("할당 상태: {state:?}");
        self.events.publish(AssignmentEvent::StateChanged(state));
    }

    // ============================================================
    // 딜 / 슬롯
    // ============================================================

    /// 진행 중인 딜 목록 조회
    pub async fn load_deals(&self) -> Result<Vec<Deal>, AssignmentError> {
        let deals = match self.store.list_active_deals().await {
            Ok(deals) => deals,
            Err(e) => {
                warn!("딜 목록 조회 실패: {e}");
                self.events
                    .publish(AssignmentEvent::Error(DEALS_FAILED_MESSAGE.to_string()));
                return Err(e.into());
            }
        };

        info!("딜 {}건 로드", deals.len());
        self.session.lock().deals = deals.clone();
        self.events
            .publish(AssignmentEvent::DealsLoaded(deals.clone()));
        Ok(deals)
    }

    /// 딜 선택 + 자산 슬롯 조회. 이전 할당은 버린다
    ///
    /// 저장소가 슬롯을 돌려주지 않으면 딜 목록의 장비 항목을 슬롯으로 쓴다.
    pub async fn select_deal(&self, deal_id: &str) -> Result<Vec<Asset>, AssignmentError> {
        {
            let session = self.session.lock();
            if session.is_busy() {
                return Err(AssignmentError::InvalidState(session.state));
            }
        }

        let fetched = match self.store.list_assets(deal_id).await {
            Ok(assets) => assets,
            Err(e) => {
                warn!("딜 {deal_id} 자산 조회 실패: {e}");
                self.events
                    .publish(AssignmentEvent::Error(ASSETS_FAILED_MESSAGE.to_string()));
                return Err(e.into());
            }
        };

        let assets = {
            let mut session = self.session.lock();
            let assets = if fetched.is_empty() {
                session
                    .deals
                    .iter()
                    .find(|d| d.id == deal_id)
                    .map(|d| d.models.clone())
                    .unwrap_or_default()
            } else {
                fetched
            };

            if assets.is_empty() {
                None
            } else {
                session.deal_id = Some(deal_id.to_string());
                session.assets = assets.clone();
                session.assignments.clear();
                Some(assets)
            }
        };

        let Some(assets) = assets else {
            self.events
                .publish(AssignmentEvent::Error(ASSETS_FAILED_MESSAGE.to_string()));
            return Err(AssignmentError::NoAssets(deal_id.to_string()));
        };

        info!("딜 {deal_id} 선택: 슬롯 {}개", assets.len());
        self.events.publish(AssignmentEvent::DealSelected {
            deal_id: deal_id.to_string(),
            assets: assets.clone(),
        });
        self.set_state(AssignmentState::SelectingAsset);
        Ok(assets)
    }

    // ============================================================
    // 스캔
    // ============================================================

    /// 슬롯 하나를 위해 스캔. 채택된 시리얼은 슬롯에 추가된다
    ///
    /// 스캔이 채택 없이 중지되면 `Ok(None)`.
    pub async fn scan_for_asset(
        &self,
        slot: usize,
    ) -> Result<Option<ScannedSerial>, AssignmentError> {
        {
            let mut session = self.session.lock();
            if session.deal_id.is_none() {
                return Err(AssignmentError::NoDealSelected);
            }
            if slot >= session.assets.len() {
                return Err(AssignmentError::SlotOutOfRange {
                    index: slot,
                    count: session.assets.len(),
                });
            }
            if session.is_busy() {
                return Err(AssignmentError::InvalidState(session.state));
            }
            session.state = AssignmentState::Scanning { slot };
        }
        self.events
            .publish(AssignmentEvent::StateChanged(AssignmentState::Scanning { slot }));

        let outcome = self.scanner.scan().await;

        let (result, next) = {
            let mut session = self.session.lock();
            let result = match outcome {
                Ok(ScanOutcome::Matched(serial)) => {
                    session
                        .assignments
                        .entry(slot)
                        .or_default()
                        .push(serial.clone());
                    Ok(Some(serial))
                }
                Ok(ScanOutcome::Stopped) => Ok(None),
                Err(e) => Err(e),
            };
            let next = session.idle_state();
            session.state = next;
            (result, next)
        };

        match &result {
            Ok(Some(serial)) => {
                info!("슬롯 {slot}에 시리얼 {} 할당", serial.number);
                self.events.publish(AssignmentEvent::SerialAssigned {
                    slot,
                    serial: serial.clone(),
                });
            }
            Ok(None) => debug!("슬롯 {slot} 스캔 취소"),
            Err(e) => {
                warn!("슬롯 {slot} 스캔 실패: {e}");
                self.events
                    .publish(AssignmentEvent::Error(SCAN_START_FAILED_MESSAGE.to_string()));
            }
        }
        self.events.publish(AssignmentEvent::StateChanged(next));

        result.map_err(AssignmentError::from)
    }

    /// 진행 중인 슬롯 스캔 취소
    pub fn cancel_scan(&self) {
        self.scanner.stop();
    }

    /// 슬롯의 시리얼 모두 제거. 제거된 번호는 다시 스캔할 수 있다
    pub fn clear_slot(&self, slot: usize) -> Result<Vec<ScannedSerial>, AssignmentError> {
        let (removed, next) = {
            let mut session = self.session.lock();
            if slot >= session.assets.len() {
                return Err(AssignmentError::SlotOutOfRange {
                    index: slot,
                    count: session.assets.len(),
                });
            }
            if session.is_busy() {
                return Err(AssignmentError::InvalidState(session.state));
            }
            let removed = session.assignments.remove(&slot).unwrap_or_default();
            let next = session.idle_state();
            session.state = next;
            (removed, next)
        };

        for serial in &removed {
            self.scanner.forget(&serial.number);
        }
        debug!("슬롯 {slot} 비움: {}개 제거", removed.len());
        self.events.publish(AssignmentEvent::StateChanged(next));
        Ok(removed)
    }

    /// 모든 슬롯에 시리얼이 하나 이상 있는지
    pub fn is_all_serials_filled(&self) -> bool {
        self.session.lock().all_filled()
    }

    // ============================================================
    // 제출
    // ============================================================

    /// 할당 스냅샷 제출 (저장소 한 번 호출)
    ///
    /// 성공하면 확인 지연 후 세션 전체를 초기화하고, 실패하면 할당을 유지한다.
    pub async fn submit(&self) -> Result<(), AssignmentError> {
        let (deal_id, payload) = {
            let mut session = self.session.lock();
            let Some(deal_id) = session.deal_id.clone() else {
                return Err(AssignmentError::NoDealSelected);
            };
            if session.is_busy() {
                return Err(AssignmentError::InvalidState(session.state));
            }
            if !session.all_filled() {
                return Err(AssignmentError::Incomplete);
            }
            session.state = AssignmentState::Submitting;
            let payload = AssignmentPayload::build(
                self.config.cardinality,
                &deal_id,
                &session.assets,
                &session.assignments,
            );
            (deal_id, payload)
        };
        self.events
            .publish(AssignmentEvent::StateChanged(AssignmentState::Submitting));
        debug!("제출 본문: {}", payload.to_body());

        // 호출자가 제출 도중/확인 지연 중 future를 버려도 세션이 잠기지 않도록
        let _guard = SubmitGuard { flow: self };

        if let Err(e) = self.store.submit_assignment(&deal_id, &payload).await {
            warn!("딜 {deal_id} 제출 실패: {e}");
            self.set_state(AssignmentState::SubmitFailed);
            self.events
                .publish(AssignmentEvent::Error(SUBMIT_FAILED_MESSAGE.to_string()));
            return Err(e.into());
        }

        info!("딜 {deal_id} 제출 완료 (시리얼 {}개)", payload.serial_count());
        self.set_state(AssignmentState::Submitted);
        self.events.publish(AssignmentEvent::Submitted {
            deal_id,
            message: SUBMITTED_MESSAGE.to_string(),
        });

        tokio::time::sleep(self.config.confirmation_delay()).await;
        self.reset();
        Ok(())
    }

    /// 끝나지 않은 제출 정리
    ///
    /// 확인 지연 중이었다면 이미 저장된 것이므로 초기화하고, 저장소 응답 전이었다면
    /// 결과를 알 수 없으니 할당을 유지한 채 재제출 가능 상태로 되돌린다.
    fn abandon_submit(&self) {
        let next = {
            let mut session = self.session.lock();
            match session.state {
                AssignmentState::Submitted => None,
                AssignmentState::Submitting => {
                    session.state = session.idle_state();
                    Some(session.state)
                }
                _ => return,
            }
        };
        match next {
            Some(state) => {
                warn!("제출 대기 중단 — 할당 유지");
                self.events.publish(AssignmentEvent::StateChanged(state));
            }
            None => self.reset(),
        }
    }

    /// 세션 전체 초기화 (딜, 슬롯, 할당, 스캔 목록, 카메라) 후 딜 선택으로
    pub fn reset(&self) {
        self.scanner.clear_session();
        {
            let mut session = self.session.lock();
            let deals = std::mem::take(&mut session.deals);
            *session = AssignmentSession {
                deals,
                ..AssignmentSession::new()
            };
        }
        info!("할당 세션 초기화");
        self.events
            .publish(AssignmentEvent::StateChanged(AssignmentState::SelectDeal));
    }

    // ============================================================
    // 조회
    // ============================================================

    pub fn state(&self) -> AssignmentState {
        self.session.lock().state
    }

    pub fn selected_deal(&self) -> Option<String> {
        self.session.lock().deal_id.clone()
    }

    pub fn deals(&self) -> Vec<Deal> {
        self.session.lock().deals.clone()
    }

    pub fn assets(&self) -> Vec<Asset> {
        self.session.lock().assets.clone()
    }

    /// 슬롯 인덱스 → 할당된 시리얼
    pub fn assignments(&self) -> BTreeMap<usize, Vec<ScannedSerial>> {
        self.session.lock().assignments.clone()
    }

    pub fn scanner(&self) -> &Arc<ScanController> {
        &self.scanner
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AssignmentEvent> {
        self.events.subscribe()
    }
}
