//! 스캔 루프 컨트롤러.
//!
//! 상태 머신: `Idle → Acquiring → Scanning ⇄ Processing → Stopped`.
//! 사이클 하나는 프레임 취득 → 영역 추출 → 보정 → 인식 → 검증 순서로 진행하며,
//! 동시에 하나만 실행된다 (처리 중 요청은 즉시 `Skipped`).
//!
//! 세션 상태는 짧게 잡는 `parking_lot::Mutex` 안에만 있고 await 중에는 잠그지 않는다.
//! `stop()`은 에포크를 올려 진행 중인 인식 결과를 무효화한다.

use parking_lot::Mutex;
use serialscan_core::config::{AppConfig, CameraConfig, RecognizerConfig, ScanConfig};
use serialscan_core::error::CoreError;
use serialscan_core::models::scan::ScannedSerial;
use serialscan_core::models::serial::{candidates, SerialNumber};
use serialscan_core::ports::camera::{CameraConstraints, CameraSource, CameraStream};
use serialscan_core::ports::layout::ViewLayoutSource;
use serialscan_core::ports::location::LocationSource;
use serialscan_core::ports::recognizer::TextRecognizer;
use serialscan_vision::preprocess::Preprocessor;
use serialscan_vision::region::RegionExtractor;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::collection::SerialCollection;
use crate::events::{
    EventBus, ScanEvent, CAMERA_DENIED_MESSAGE, INIT_FAILED_MESSAGE, PROCESSING_ERROR_MESSAGE,
};
use crate::geolocation::GeolocationResolver;

/// 스캔 루프 에러
#[derive(Debug, Error)]
pub enum ScanError {
    /// 인식기 초기화 실패로 스캔 비활성화 (새 컨트롤러 필요)
    #[error("스캔 비활성화: {0}")]
    Disabled(String),

    /// 카메라 획득 실패 (폴백 포함)
    #[error("카메라 사용 불가: {0}")]
    CameraUnavailable(String),

    /// 코어 에러
    #[error(transparent)]
    Core(#[from] CoreError),
}

/// 스캔 루프 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanState {
    /// 스트림 없음 (시작 전, 중지 후, 획득 실패 후)
    Idle,
    /// 카메라 요청 중
    Acquiring,
    /// 스트림 활성, 처리 중인 사이클 없음
    Scanning,
    /// 사이클 처리 중
    Processing,
    /// 시리얼 채택 후 카메라 해제됨
    Stopped,
}

/// 사이클 하나의 결과
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// 새 시리얼 채택 — 카메라 해제, `Stopped`
    Matched(ScannedSerial),
    /// 유효한 새 시리얼 없음 (빈 텍스트, 무효 토큰, 중복, 영역 무효, 인식 실패)
    NoMatch,
    /// 다른 사이클이 처리 중이거나 스캔 중이 아님
    Skipped,
    /// 처리 중 중지/재시작되어 결과 폐기
    Discarded,
}

/// `scan()` 결과
#[derive(Debug, Clone, PartialEq)]
pub enum ScanOutcome {
    /// 채택된 시리얼
    Matched(ScannedSerial),
    /// 채택 없이 루프 종료 (`stop()` 호출)
    Stopped,
}

#[derive(Debug, Clone, PartialEq)]
enum EngineState {
    Uninitialized,
    Ready,
    Disabled(String),
}

/// 세션 하나의 가변 상태
struct ScanSession {
    state: ScanState,
    scanning: bool,
    stream: Option<Box<dyn CameraStream>>,
    serials: SerialCollection,
}

impl ScanSession {
    fn new() -> Self {
        Self {
            state: ScanState::Idle,
            scanning: false,
            stream: None,
            serials: SerialCollection::new(),
        }
    }

    fn release_stream(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.release();
        }
    }
}

/// 처리 중 플래그 — 드롭 시 해제
struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// 스캔 루프 컨트롤러
pub struct ScanController {
    camera: Arc<dyn CameraSource>,
    recognizer: Arc<dyn TextRecognizer>,
    layout: Arc<dyn ViewLayoutSource>,
    extractor: RegionExtractor,
    preprocessor: Preprocessor,
    geolocation: Arc<GeolocationResolver>,
    scan_config: ScanConfig,
    camera_config: CameraConfig,
    recognizer_config: RecognizerConfig,
    engine: Mutex<EngineState>,
    session: Mutex<ScanSession>,
    busy: AtomicBool,
    epoch: AtomicU64,
    events: EventBus<ScanEvent>,
}

impl ScanController {
    /// 새 컨트롤러 생성. 위치 소스 없이 시작한다
    pub fn new(
        camera: Arc<dyn CameraSource>,
        recognizer: Arc<dyn TextRecognizer>,
        layout: Arc<dyn ViewLayoutSource>,
        config: &AppConfig,
    ) -> Self {
        Self {
            camera,
            recognizer,
            layout,
            extractor: RegionExtractor::new(config.scan.roi_padding_px),
            preprocessor: Preprocessor::from_config(&config.enhancement),
            geolocation: Arc::new(GeolocationResolver::new(None, config.geolocation.clone())),
            scan_config: config.scan.clone(),
            camera_config: config.camera.clone(),
            recognizer_config: config.recognizer.clone(),
            engine: Mutex::new(EngineState::Uninitialized),
            session: Mutex::new(ScanSession::new()),
            busy: AtomicBool::new(false),
            epoch: AtomicU64::new(0),
            events: EventBus::default(),
        }
    }

    /// 위치 소스 연결
    pub fn with_location_source(
        mut self,
        source: Arc<dyn LocationSource>,
        config: &AppConfig,
    ) -> Self {
        self.geolocation = Arc::new(GeolocationResolver::new(
            Some(source),
            config.geolocation.clone(),
        ));
        self
    }

    /// 전처리기 교체
    pub fn with_preprocessor(mut self, preprocessor: Preprocessor) -> Self {
        self.preprocessor = preprocessor;
        self
    }

    // ============================================================
    // 엔진
    // ============================================================

    /// 인식 엔진 초기화 (세션당 한 번). 실패하면 스캔 전체 비활성화
    pub async fn initialize(&self) -> Result<(), ScanError> {
        match self.engine_state() {
            EngineState::Ready => return Ok(()),
            EngineState::Disabled(reason) => return Err(ScanError::Disabled(reason)),
            EngineState::Uninitialized => {}
        }

        match self.recognizer.initialize(&self.recognizer_config).await {
            Ok(()) => {
                *self.engine.lock() = EngineState::Ready;
                info!("인식기 준비 완료: {}", self.recognizer.name());
                Ok(())
            }
            Err(e) => {
                error!("인식기 초기화 실패 — 스캔 비활성화: {e}");
                let reason = e.to_string();
                *self.engine.lock() = EngineState::Disabled(reason.clone());
                self.events
                    .publish(ScanEvent::Error(INIT_FAILED_MESSAGE.to_string()));
                Err(ScanError::Disabled(reason))
            }
        }
    }

    fn engine_state(&self) -> EngineState {
        self.engine.lock().clone()
    }

    /// 초기화 실패로 비활성화되었는지
    pub fn is_disabled(&self) -> bool {
        matches!(self.engine_state(), EngineState::Disabled(_))
    }

    // ============================================================
    // 카메라 / 루프 제어
    // ============================================================

    /// 카메라 획득 후 `Scanning` 진입. 기존 스트림은 먼저 해제한다
    pub async fn start(&self) -> Result<(), ScanError> {
        self.initialize().await?;

        self.halt(ScanState::Acquiring);
        let epoch = self.epoch.load(Ordering::SeqCst);
        self.events
            .publish(ScanEvent::StateChanged(ScanState::Acquiring));

        let stream = match self.acquire_stream().await {
            Ok(stream) => stream,
            Err(e) => {
                warn!("카메라 획득 실패: {e}");
                {
                    let mut session = self.session.lock();
                    if self.epoch.load(Ordering::SeqCst) == epoch {
                        session.state = ScanState::Idle;
                    }
                }
                self.events
                    .publish(ScanEvent::Error(CAMERA_DENIED_MESSAGE.to_string()));
                self.events.publish(ScanEvent::StateChanged(ScanState::Idle));
                return Err(ScanError::CameraUnavailable(e.to_string()));
            }
        };

        {
            let mut session = self.session.lock();
            if self.epoch.load(Ordering::SeqCst) != epoch || session.state != ScanState::Acquiring
            {
                debug!("획득 중 중지됨 — 스트림 해제");
                let mut stream = stream;
                stream.release();
                return Ok(());
            }
            session.stream = Some(stream);
            session.state = ScanState::Scanning;
            session.scanning = true;
        }

        info!("스캔 시작");
        self.events
            .publish(ScanEvent::StateChanged(ScanState::Scanning));

        // 위치는 스캔과 별개로 조회
        let geolocation = Arc::clone(&self.geolocation);
        tokio::spawn(async move {
            geolocation.resolve_once().await;
        });

        Ok(())
    }

    /// 후면 카메라 우선, 실패 시 제약 없이 한 번 더
    async fn acquire_stream(&self) -> Result<Box<dyn CameraStream>, CoreError> {
        let any = CameraConstraints::any(&self.camera_config);
        if !self.camera_config.prefer_rear {
            return self.camera.acquire(&any).await;
        }

        match self
            .camera
            .acquire(&CameraConstraints::rear(&self.camera_config))
            .await
        {
            Ok(stream) => Ok(stream),
            Err(e) => {
                warn!("후면 카메라 획득 실패, 제약 없이 재시도: {e}");
                self.camera.acquire(&any).await
            }
        }
    }

    /// 카메라 획득 후 시리얼이 채택되거나 중지될 때까지 사이클 반복
    pub async fn scan(&self) -> Result<ScanOutcome, ScanError> {
        self.start().await?;
        self.resume().await
    }

    /// 이미 활성인 스트림으로 루프 계속
    pub async fn resume(&self) -> Result<ScanOutcome, ScanError> {
        loop {
            if let CycleOutcome::Matched(serial) = self.run_cycle().await? {
                return Ok(ScanOutcome::Matched(serial));
            }
            if !self.is_scanning() {
                debug!("스캔 루프 종료");
                return Ok(ScanOutcome::Stopped);
            }
            tokio::time::sleep(self.scan_config.settle_delay()).await;
        }
    }

    /// 채택 후 다시 스캔 — 플래그/스트림 정리 후 재획득
    pub async fn scan_again(&self) -> Result<ScanOutcome, ScanError> {
        self.halt(ScanState::Idle);
        self.scan().await
    }

    /// 즉시 중지. 카메라 해제, 진행 중인 결과는 폐기된다
    pub fn stop(&self) {
        self.halt(ScanState::Idle);
        info!("스캔 중지");
        self.events.publish(ScanEvent::StateChanged(ScanState::Idle));
    }

    /// 에포크 증가 + 스트림 해제 + 플래그 정리
    fn halt(&self, next: ScanState) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        let mut session = self.session.lock();
        session.release_stream();
        session.scanning = false;
        session.state = next;
    }

    // ============================================================
    // 사이클
    // ============================================================

    /// 사이클 하나 실행
    pub async fn run_cycle(&self) -> Result<CycleOutcome, ScanError> {
        if let EngineState::Disabled(reason) = self.engine_state() {
            return Err(ScanError::Disabled(reason));
        }

        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("처리 중인 사이클 있음 — 건너뜀");
            return Ok(CycleOutcome::Skipped);
        }
        let _busy = BusyGuard(&self.busy);

        let grabbed = {
            let mut session = self.session.lock();
            if session.state != ScanState::Scanning {
                return Ok(CycleOutcome::Skipped);
            }
            let Some(stream) = session.stream.as_mut() else {
                return Ok(CycleOutcome::Skipped);
            };
            match stream.grab_frame() {
                Ok(frame) => {
                    session.state = ScanState::Processing;
                    Ok((self.epoch.load(Ordering::SeqCst), frame))
                }
                Err(e) => Err(e),
            }
        };

        let (epoch, frame) = match grabbed {
            Ok(grabbed) => grabbed,
            Err(e) => {
                warn!("프레임 취득 실패: {e}");
                self.events
                    .publish(ScanEvent::Error(PROCESSING_ERROR_MESSAGE.to_string()));
                return Ok(CycleOutcome::NoMatch);
            }
        };

        match self.recognize_frame(frame).await {
            Ok(Some(text)) => Ok(self.accept(epoch, &text)),
            Ok(None) => Ok(self.finish_without_match(epoch)),
            Err(e) => {
                warn!("인식 실패: {e}");
                let outcome = self.finish_without_match(epoch);
                if outcome == CycleOutcome::NoMatch {
                    self.events
                        .publish(ScanEvent::Error(PROCESSING_ERROR_MESSAGE.to_string()));
                }
                Ok(outcome)
            }
        }
    }

    /// 영역 추출 → 보정 → 인식. `None`은 사이클 중단 (배치 없음, 영역 무효, 타임아웃)
    async fn recognize_frame(
        &self,
        frame: image::DynamicImage,
    ) -> Result<Option<String>, CoreError> {
        let Some(layout) = self.layout.current() else {
            debug!("스캔 영역 미정 — 사이클 중단");
            return Ok(None);
        };
        let Some((_, region)) = self.extractor.extract(&frame, &layout) else {
            return Ok(None);
        };
        drop(frame);

        let prepared = self.preprocessor.enhance(region);
        let recognition = self.recognizer.recognize(&prepared);

        match self.scan_config.recognition_timeout() {
            Some(limit) => match tokio::time::timeout(limit, recognition).await {
                Ok(result) => result.map(Some),
                Err(_) => {
                    warn!("인식 타임아웃 ({}ms) — 사이클 중단", limit.as_millis());
                    Ok(None)
                }
            },
            None => recognition.await.map(Some),
        }
    }

    fn is_stale(&self, epoch: u64, session: &ScanSession) -> bool {
        self.epoch.load(Ordering::SeqCst) != epoch || session.state != ScanState::Processing
    }

    fn finish_without_match(&self, epoch: u64) -> CycleOutcome {
        let mut session = self.session.lock();
        if self.is_stale(epoch, &session) {
            debug!("중단된 사이클 결과 폐기");
            return CycleOutcome::Discarded;
        }
        session.state = ScanState::Scanning;
        CycleOutcome::NoMatch
    }

    /// 인식 순서대로 토큰을 검사해 처음 나온 새 시리얼 채택
    fn accept(&self, epoch: u64, text: &str) -> CycleOutcome {
        let position = self.geolocation.cached();

        let accepted = {
            let mut session = self.session.lock();
            if self.is_stale(epoch, &session) {
                debug!("중단된 사이클 결과 폐기");
                return CycleOutcome::Discarded;
            }

            let serials = &mut session.serials;
            let matched = candidates(text).find_map(|number| {
                if serials.try_add(number.clone(), position) {
                    serials.last().cloned()
                } else {
                    debug!("이미 채택된 시리얼 무시: {number}");
                    None
                }
            });

            match matched {
                Some(serial) => {
                    session.release_stream();
                    session.scanning = false;
                    session.state = ScanState::Stopped;
                    Some((serial, session.serials.len()))
                }
                None => {
                    session.state = ScanState::Scanning;
                    None
                }
            }
        };

        match accepted {
            Some((serial, total)) => {
                info!("시리얼 채택: {} (총 {total}개)", serial.number);
                self.events.publish(ScanEvent::Matched(serial.clone()));
                self.events
                    .publish(ScanEvent::StateChanged(ScanState::Stopped));
                CycleOutcome::Matched(serial)
            }
            None => {
                debug!("유효한 새 시리얼 없음");
                CycleOutcome::NoMatch
            }
        }
    }

    // ============================================================
    // 세션
    // ============================================================

    /// 목록에서 삭제. 마지막 항목이 지워지면 세션을 초기화하고 카메라 재시작
    pub async fn remove_serial(&self, index: usize) -> Result<Option<ScannedSerial>, ScanError> {
        let (removed, now_empty) = {
            let mut session = self.session.lock();
            let removed = session.serials.remove(index);
            (removed, session.serials.is_empty())
        };

        let Some(removed) = removed else {
            return Ok(None);
        };
        debug!("시리얼 삭제: {}", removed.number);
        self.events.publish(ScanEvent::SerialRemoved {
            index,
            serial: removed.clone(),
        });

        if now_empty {
            info!("목록이 비어 세션 재시작");
            self.reset_session().await?;
        }
        Ok(Some(removed))
    }

    /// 번호로 목록에서 제거 (카메라 재시작 없음). 다시 스캔할 수 있게 된다
    pub fn forget(&self, number: &SerialNumber) -> Option<ScannedSerial> {
        let removed = self.session.lock().serials.remove_number(number)?;
        debug!("시리얼 제거: {number}");
        Some(removed)
    }

    /// 세션 초기화 후 카메라 재획득
    pub async fn reset_session(&self) -> Result<(), ScanError> {
        self.clear_session();
        self.start().await
    }

    /// 세션 초기화 (카메라 해제, 목록/위치 캐시 비움). 재획득하지 않는다
    pub fn clear_session(&self) {
        self.halt(ScanState::Idle);
        self.session.lock().serials.clear();
        self.geolocation.reset();
        self.events.publish(ScanEvent::SessionReset);
        self.events.publish(ScanEvent::StateChanged(ScanState::Idle));
    }

    // ============================================================
    // 조회
    // ============================================================

    /// 채택된 시리얼 목록 (채택 순서)
    pub fn serials(&self) -> Vec<ScannedSerial> {
        self.session.lock().serials.snapshot()
    }

    pub fn state(&self) -> ScanState {
        self.session.lock().state
    }

    /// 스캔 루프가 돌아야 하는지 (`Scanning`/`Processing`)
    pub fn is_scanning(&self) -> bool {
        self.session.lock().scanning
    }

    /// 카메라 스트림이 살아 있는지
    pub fn has_active_stream(&self) -> bool {
        self.session
            .lock()
            .stream
            .as_ref()
            .map(|s| s.is_active())
            .unwrap_or(false)
    }

    pub fn geolocation(&self) -> &GeolocationResolver {
        &self.geolocation
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ScanEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fast_config, layout, MockCamera, ScriptedRecognizer};
    use async_trait::async_trait;
    use serialscan_core::models::scan::Position;
    use std::time::Duration;
    use tokio::sync::Notify;

    fn controller(camera: Arc<MockCamera>, recognizer: Arc<ScriptedRecognizer>) -> ScanController {
        ScanController::new(camera, recognizer, layout(), &fast_config())
            .with_preprocessor(Preprocessor::passthrough())
    }

    #[tokio::test]
    async fn invalid_text_is_no_match() {
        let camera = Arc::new(MockCamera::rear());
        let recognizer = Arc::new(ScriptedRecognizer::new(&["ABC1234567DEF"]));
        let ctrl = controller(camera, recognizer);

        ctrl.start().await.unwrap();
        assert_eq!(ctrl.run_cycle().await.unwrap(), CycleOutcome::NoMatch);
        assert!(ctrl.serials().is_empty());
        assert_eq!(ctrl.state(), ScanState::Scanning);
    }

    #[tokio::test]
    async fn valid_serial_stops_camera_and_duplicate_is_ignored() {
        let camera = Arc::new(MockCamera::rear());
        let recognizer = Arc::new(ScriptedRecognizer::new(&["2310211025", "2310211025"]));
        let ctrl = controller(camera.clone(), recognizer);

        ctrl.start().await.unwrap();
        let outcome = ctrl.run_cycle().await.unwrap();
        assert!(matches!(&outcome, CycleOutcome::Matched(s) if s.number.as_str() == "2310211025"));
        assert_eq!(ctrl.serials().len(), 1);
        assert_eq!(ctrl.state(), ScanState::Stopped);
        assert!(!ctrl.has_active_stream());
        assert_eq!(camera.releases(), 1);

        // 다시 스캔 — 같은 번호는 채택되지 않음
        ctrl.start().await.unwrap();
        assert_eq!(ctrl.run_cycle().await.unwrap(), CycleOutcome::NoMatch);
        assert_eq!(ctrl.serials().len(), 1);
        assert_eq!(ctrl.state(), ScanState::Scanning);
    }

    #[tokio::test]
    async fn first_new_serial_in_text_wins() {
        let camera = Arc::new(MockCamera::rear());
        let recognizer = Arc::new(ScriptedRecognizer::new(&[
            "2310211025",
            "12 2310211025\n23-1026-1085 4350216026",
        ]));
        let ctrl = controller(camera, recognizer);

        ctrl.start().await.unwrap();
        ctrl.run_cycle().await.unwrap();
        ctrl.start().await.unwrap();
        let outcome = ctrl.run_cycle().await.unwrap();

        assert!(matches!(&outcome, CycleOutcome::Matched(s) if s.number.as_str() == "2310261085"));
        let numbers: Vec<String> = ctrl.serials().iter().map(|s| s.number.to_string()).collect();
        assert_eq!(numbers, ["2310211025", "2310261085"]);
    }

    #[tokio::test]
    async fn scan_loops_until_match() {
        let camera = Arc::new(MockCamera::rear());
        let recognizer = Arc::new(
            ScriptedRecognizer::new(&["", "no digits here", "123"]).then("SN 2310211025"),
        );
        let ctrl = controller(camera, recognizer.clone());

        let outcome = ctrl.scan().await.unwrap();
        assert!(matches!(outcome, ScanOutcome::Matched(s) if s.number.as_str() == "2310211025"));
        assert_eq!(recognizer.calls(), 4);
    }

    #[tokio::test]
    async fn concurrent_cycle_is_skipped() {
        let gate = Arc::new(Notify::new());
        let camera = Arc::new(MockCamera::rear());
        let recognizer =
            Arc::new(ScriptedRecognizer::new(&["2310211025"]).gated(Arc::clone(&gate)));
        let ctrl = Arc::new(controller(camera, recognizer.clone()));
        ctrl.start().await.unwrap();

        let first = tokio::spawn({
            let ctrl = Arc::clone(&ctrl);
            async move { ctrl.run_cycle().await }
        });
        recognizer.entered.notified().await;
        assert_eq!(ctrl.state(), ScanState::Processing);

        assert_eq!(ctrl.run_cycle().await.unwrap(), CycleOutcome::Skipped);

        gate.notify_one();
        let outcome = first.await.unwrap().unwrap();
        assert!(matches!(outcome, CycleOutcome::Matched(_)));
        assert_eq!(recognizer.calls(), 1);
    }

    #[tokio::test]
    async fn stop_discards_in_flight_result() {
        let gate = Arc::new(Notify::new());
        let camera = Arc::new(MockCamera::rear());
        let recognizer =
            Arc::new(ScriptedRecognizer::new(&["2310211025"]).gated(Arc::clone(&gate)));
        let ctrl = Arc::new(controller(camera.clone(), recognizer.clone()));
        ctrl.start().await.unwrap();

        let cycle = tokio::spawn({
            let ctrl = Arc::clone(&ctrl);
            async move { ctrl.run_cycle().await }
        });
        recognizer.entered.notified().await;

        ctrl.stop();
        assert_eq!(ctrl.state(), ScanState::Idle);
        assert_eq!(camera.releases(), 1);

        gate.notify_one();
        assert_eq!(cycle.await.unwrap().unwrap(), CycleOutcome::Discarded);
        assert!(ctrl.serials().is_empty());
        assert_eq!(ctrl.state(), ScanState::Idle);
    }

    #[tokio::test]
    async fn scan_returns_stopped_after_stop() {
        let camera = Arc::new(MockCamera::rear());
        let recognizer = Arc::new(ScriptedRecognizer::new(&[]));
        let ctrl = Arc::new(controller(camera, recognizer));

        let scan = tokio::spawn({
            let ctrl = Arc::clone(&ctrl);
            async move { ctrl.scan().await }
        });
        while !ctrl.is_scanning() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        ctrl.stop();

        assert_eq!(scan.await.unwrap().unwrap(), ScanOutcome::Stopped);
    }

    #[tokio::test]
    async fn falls_back_to_any_camera() {
        let camera = Arc::new(MockCamera::front_only());
        let ctrl = controller(camera.clone(), Arc::new(ScriptedRecognizer::new(&[])));

        ctrl.start().await.unwrap();
        assert_eq!(camera.acquisitions(), 2);
        assert_eq!(ctrl.state(), ScanState::Scanning);
        assert!(ctrl.has_active_stream());
    }

    #[tokio::test]
    async fn camera_denied_returns_to_idle_with_message() {
        let camera = Arc::new(MockCamera::denied());
        let ctrl = controller(camera.clone(), Arc::new(ScriptedRecognizer::new(&[])));
        let mut events = ctrl.subscribe();

        let err = ctrl.start().await.unwrap_err();
        assert!(matches!(err, ScanError::CameraUnavailable(_)));
        assert_eq!(ctrl.state(), ScanState::Idle);
        assert_eq!(camera.acquisitions(), 2);

        let mut saw_message = false;
        while let Ok(event) = events.try_recv() {
            if let ScanEvent::Error(message) = event {
                saw_message = message == CAMERA_DENIED_MESSAGE;
            }
        }
        assert!(saw_message);
    }

    #[tokio::test]
    async fn init_failure_disables_scanning() {
        let camera = Arc::new(MockCamera::rear());
        let ctrl = controller(
            camera.clone(),
            Arc::new(ScriptedRecognizer::failing_init("tessdata missing")),
        );

        assert!(matches!(ctrl.initialize().await, Err(ScanError::Disabled(_))));
        assert!(ctrl.is_disabled());
        assert!(matches!(ctrl.start().await, Err(ScanError::Disabled(_))));
        assert!(matches!(ctrl.run_cycle().await, Err(ScanError::Disabled(_))));
        assert_eq!(camera.acquisitions(), 0);
    }

    #[tokio::test]
    async fn recognition_error_keeps_scanning() {
        let camera = Arc::new(MockCamera::rear());
        let recognizer = Arc::new(
            ScriptedRecognizer::new(&[])
                .with_failure("engine crashed")
                .then("2310211025"),
        );
        let ctrl = controller(camera, recognizer);
        let mut events = ctrl.subscribe();

        ctrl.start().await.unwrap();
        assert_eq!(ctrl.run_cycle().await.unwrap(), CycleOutcome::NoMatch);
        assert_eq!(ctrl.state(), ScanState::Scanning);
        assert!(matches!(ctrl.run_cycle().await.unwrap(), CycleOutcome::Matched(_)));

        let mut saw_message = false;
        while let Ok(event) = events.try_recv() {
            if matches!(&event, ScanEvent::Error(m) if m == PROCESSING_ERROR_MESSAGE) {
                saw_message = true;
            }
        }
        assert!(saw_message);
    }

    #[tokio::test]
    async fn missing_layout_skips_recognition() {
        struct NoLayout;
        impl ViewLayoutSource for NoLayout {
            fn current(&self) -> Option<serialscan_core::models::geometry::ViewLayout> {
                None
            }
        }

        let recognizer = Arc::new(ScriptedRecognizer::new(&["2310211025"]));
        let ctrl = ScanController::new(
            Arc::new(MockCamera::rear()),
            recognizer.clone(),
            Arc::new(NoLayout),
            &fast_config(),
        );

        ctrl.start().await.unwrap();
        assert_eq!(ctrl.run_cycle().await.unwrap(), CycleOutcome::NoMatch);
        assert_eq!(recognizer.calls(), 0);
    }

    #[tokio::test]
    async fn recognition_timeout_aborts_cycle() {
        let gate = Arc::new(Notify::new());
        let recognizer =
            Arc::new(ScriptedRecognizer::new(&["2310211025"]).gated(Arc::clone(&gate)));
        let mut config = fast_config();
        config.scan.recognition_timeout_ms = Some(10);
        let ctrl = ScanController::new(Arc::new(MockCamera::rear()), recognizer, layout(), &config)
            .with_preprocessor(Preprocessor::passthrough());

        ctrl.start().await.unwrap();
        assert_eq!(ctrl.run_cycle().await.unwrap(), CycleOutcome::NoMatch);
        assert!(ctrl.serials().is_empty());
        assert_eq!(ctrl.state(), ScanState::Scanning);
    }

    #[tokio::test]
    async fn removing_last_serial_restarts_camera() {
        let camera = Arc::new(MockCamera::rear());
        let recognizer = Arc::new(ScriptedRecognizer::new(&["2310211025"]));
        let ctrl = controller(camera.clone(), recognizer);

        ctrl.scan().await.unwrap();
        assert_eq!(ctrl.state(), ScanState::Stopped);

        assert!(ctrl.remove_serial(3).await.unwrap().is_none());
        let removed = ctrl.remove_serial(0).await.unwrap().unwrap();
        assert_eq!(removed.number.as_str(), "2310211025");
        assert!(ctrl.serials().is_empty());
        assert_eq!(ctrl.state(), ScanState::Scanning);
        assert_eq!(camera.acquisitions(), 2);
    }

    #[tokio::test]
    async fn accepted_serial_carries_cached_position() {
        struct Here;
        #[async_trait]
        impl LocationSource for Here {
            async fn current_position(&self, _high: bool) -> Result<Position, CoreError> {
                Ok(Position {
                    lat: 43.6532,
                    lng: -79.3832,
                    accuracy: 5.0,
                })
            }
        }

        let config = fast_config();
        let ctrl = ScanController::new(
            Arc::new(MockCamera::rear()),
            Arc::new(ScriptedRecognizer::new(&["2310211025"])),
            layout(),
            &config,
        )
        .with_preprocessor(Preprocessor::passthrough())
        .with_location_source(Arc::new(Here), &config);

        ctrl.start().await.unwrap();
        for _ in 0..100 {
            if ctrl.geolocation().cached().is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }

        let outcome = ctrl.run_cycle().await.unwrap();
        let CycleOutcome::Matched(serial) = outcome else {
            panic!("expected match, got {outcome:?}");
        };
        assert_eq!(serial.location.map(|p| p.lat), Some(43.6532));

        ctrl.clear_session();
        assert!(ctrl.geolocation().cached().is_none());
        assert!(ctrl.serials().is_empty());
    }
}
