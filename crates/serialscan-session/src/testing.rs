//! 단위 테스트용 포트 구현.

use async_trait::async_trait;
use image::DynamicImage;
use parking_lot::Mutex;
use serialscan_core::config::{AppConfig, RecognizerConfig};
use serialscan_core::error::CoreError;
use serialscan_core::models::deal::{Asset, AssignmentPayload, Deal};
use serialscan_core::models::geometry::ViewLayout;
use serialscan_core::models::serial::SerialNumber;
use serialscan_core::ports::camera::{CameraConstraints, CameraSource, CameraStream, FacingMode};
use serialscan_core::ports::deal_store::DealStore;
use serialscan_core::ports::recognizer::TextRecognizer;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

pub const FRAME_W: u32 = 640;
pub const FRAME_H: u32 = 360;

pub fn layout() -> Arc<ViewLayout> {
    Arc::new(ViewLayout::full_frame(f64::from(FRAME_W), f64::from(FRAME_H)))
}

/// 사이클 지연을 최소화한 설정
pub fn fast_config() -> AppConfig {
    let mut config = AppConfig::default_config();
    config.scan.settle_delay_ms = 1;
    config.assignment.confirmation_delay_ms = 1;
    config
}

pub struct MockCamera {
    pub acquisitions: AtomicUsize,
    pub releases: Arc<AtomicUsize>,
    pub rear_available: bool,
    pub available: bool,
}

impl MockCamera {
    pub fn rear() -> Self {
        Self {
            acquisitions: AtomicUsize::new(0),
            releases: Arc::new(AtomicUsize::new(0)),
            rear_available: true,
            available: true,
        }
    }

    pub fn front_only() -> Self {
        Self {
            rear_available: false,
            ..Self::rear()
        }
    }

    pub fn denied() -> Self {
        Self {
            available: false,
            ..Self::rear()
        }
    }

    pub fn acquisitions(&self) -> usize {
        self.acquisitions.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CameraSource for MockCamera {
    async fn acquire(
        &self,
        constraints: &CameraConstraints,
    ) -> Result<Box<dyn CameraStream>, CoreError> {
        self.acquisitions.fetch_add(1, Ordering::SeqCst);
        if !self.available {
            return Err(CoreError::Camera("permission denied".to_string()));
        }
        if constraints.facing == FacingMode::Environment && !self.rear_available {
            return Err(CoreError::Camera("no rear camera".to_string()));
        }
        Ok(Box::new(MockStream {
            active: true,
            releases: Arc::clone(&self.releases),
        }))
    }
}

struct MockStream {
    active: bool,
    releases: Arc<AtomicUsize>,
}

impl CameraStream for MockStream {
    fn grab_frame(&mut self) -> Result<DynamicImage, CoreError> {
        Ok(DynamicImage::new_rgba8(FRAME_W, FRAME_H))
    }

    fn release(&mut self) {
        if self.active {
            self.releases.fetch_add(1, Ordering::SeqCst);
        }
        self.active = false;
    }

    fn is_active(&self) -> bool {
        self.active
    }
}

/// 정해진 순서로 텍스트를 돌려주는 인식기. 스크립트가 끝나면 빈 문자열
pub struct ScriptedRecognizer {
    script: Mutex<VecDeque<Result<String, String>>>,
    calls: AtomicUsize,
    init_error: Option<String>,
    /// 설정되면 `recognize`가 이 신호를 기다린다
    gate: Option<Arc<Notify>>,
    /// `recognize` 진입 신호
    pub entered: Arc<Notify>,
}

impl ScriptedRecognizer {
    pub fn new(script: &[&str]) -> Self {
        Self {
            script: Mutex::new(script.iter().map(|s| Ok(s.to_string())).collect()),
            calls: AtomicUsize::new(0),
            init_error: None,
            gate: None,
            entered: Arc::new(Notify::new()),
        }
    }

    pub fn failing_init(reason: &str) -> Self {
        Self {
            init_error: Some(reason.to_string()),
            ..Self::new(&[])
        }
    }

    pub fn with_failure(self, message: &str) -> Self {
        self.script.lock().push_back(Err(message.to_string()));
        self
    }

    pub fn then(self, text: &str) -> Self {
        self.script.lock().push_back(Ok(text.to_string()));
        self
    }

    pub fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextRecognizer for ScriptedRecognizer {
    async fn initialize(&self, _settings: &RecognizerConfig) -> Result<(), CoreError> {
        match &self.init_error {
            Some(reason) => Err(CoreError::RecognizerInit(reason.clone())),
            None => Ok(()),
        }
    }

    async fn recognize(&self, _raster: &DynamicImage) -> Result<String, CoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.entered.notify_one();
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        let next = self.script.lock().pop_front();
        match next {
            Some(Ok(text)) => Ok(text),
            Some(Err(message)) => Err(CoreError::Recognition(message)),
            None => Ok(String::new()),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// 메모리 딜 저장소
pub struct MemoryDealStore {
    pub deals: Vec<Deal>,
    pub assets: Vec<Asset>,
    pub submissions: Mutex<Vec<(String, AssignmentPayload)>>,
    pub fail_submit: AtomicBool,
}

impl MemoryDealStore {
    pub fn with_slots(slots: &[&str]) -> Self {
        let assets: Vec<Asset> = slots
            .iter()
            .enumerate()
            .map(|(i, value)| Asset {
                id: "ca-1".to_string(),
                model: format!("Model {}", i + 1),
                model_value: value.to_string(),
                existing_serial: None,
            })
            .collect();

        Self {
            deals: vec![Deal {
                id: "d-1".to_string(),
                name: Some("Rooftop retrofit".to_string()),
                stage: Some("Install".to_string()),
                amount: None,
                street: Some("12 King St".to_string()),
                models: assets.clone(),
            }],
            assets,
            submissions: Mutex::new(Vec::new()),
            fail_submit: AtomicBool::new(false),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.fail_submit.store(failing, Ordering::SeqCst);
    }

    pub fn submissions(&self) -> Vec<(String, AssignmentPayload)> {
        self.submissions.lock().clone()
    }
}

#[async_trait]
impl DealStore for MemoryDealStore {
    async fn list_active_deals(&self) -> Result<Vec<Deal>, CoreError> {
        Ok(self.deals.clone())
    }

    async fn list_assets(&self, deal_id: &str) -> Result<Vec<Asset>, CoreError> {
        if self.deals.iter().any(|d| d.id == deal_id) {
            Ok(self.assets.clone())
        } else {
            Err(CoreError::NotFound {
                resource_type: "Deal".to_string(),
                id: deal_id.to_string(),
            })
        }
    }

    async fn submit_assignment(
        &self,
        deal_id: &str,
        payload: &AssignmentPayload,
    ) -> Result<(), CoreError> {
        if self.fail_submit.load(Ordering::SeqCst) {
            return Err(CoreError::ServiceUnavailable("crm down".to_string()));
        }
        self.submissions
            .lock()
            .push((deal_id.to_string(), payload.clone()));
        Ok(())
    }

    async fn find_deals_by_serial(&self, _serial: &SerialNumber) -> Result<Vec<Deal>, CoreError> {
        Ok(Vec::new())
    }
}
