//! Tesseract 텍스트 인식기.
//!
//! `leptess` 기반. `ocr` feature flag 활성화 시에만 빌드된다.
//!
//! 엔진은 세션 동안 한 번만 만든다. `LepTess`는 전용 워커 스레드가
//! 소유하고, 비동기 쪽은 채널로 래스터를 넘기고 oneshot으로 결과를 받는다.

use async_trait::async_trait;
use image::DynamicImage;
use parking_lot::Mutex;
use serialscan_core::config::RecognizerConfig;
use serialscan_core::error::CoreError;
use serialscan_core::ports::recognizer::TextRecognizer;
use std::sync::mpsc;
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{debug, info};

/// OCR 에러 타입
#[derive(Debug, Error)]
pub enum OcrError {
    /// Tesseract 초기화 실패
    #[error("OCR 초기화 실패: {0}")]
    Init(String),

    /// 엔진 변수 설정 실패
    #[error("OCR 변수 설정 실패: {0}")]
    Variable(String),

    /// 이미지 설정 실패
    #[error("OCR 이미지 설정 실패: {0}")]
    ImageSetup(String),

    /// 텍스트 추출 실패
    #[error("OCR 텍스트 추출 실패: {0}")]
    Extraction(String),

    /// 빈 이미지 입력
    #[error("빈 이미지: 너비 또는 높이가 0")]
    EmptyImage,

    /// 초기화 전 호출
    #[error("OCR 엔진이 초기화되지 않음")]
    NotInitialized,

    /// 워커 스레드 종료
    #[error("OCR 워커 종료: {0}")]
    Worker(String),
}

impl From<OcrError> for CoreError {
    fn from(e: OcrError) -> Self {
        match e {
            OcrError::Init(_) | OcrError::Variable(_) => CoreError::RecognizerInit(e.to_string()),
            _ => CoreError::Recognition(e.to_string()),
        }
    }
}

/// 워커로 보내는 인식 작업
struct Job {
    rgba: Vec<u8>,
    width: u32,
    height: u32,
    reply: oneshot::Sender<Result<String, OcrError>>,
}

/// Tesseract 인식기 — `TextRecognizer` 포트 구현
pub struct TesseractRecognizer {
    jobs: Mutex<Option<mpsc::Sender<Job>>>,
}

impl TesseractRecognizer {
    pub fn new() -> Self {
        Self {
            jobs: Mutex::new(None),
        }
    }

    /// 엔진 생성 + 숫자 화이트리스트/단일 라인 모드 설정
    fn build_engine(settings: &RecognizerConfig) -> Result<leptess::LepTess, OcrError> {
        let tessdata = settings
            .tessdata_path
            .as_ref()
            .map(|p| p.to_string_lossy().to_string());

        let mut lt = leptess::LepTess::new(tessdata.as_deref(), &settings.language)
            .map_err(|e| OcrError::Init(format!("{e}")))?;

        lt.set_variable(
            leptess::Variable::TesseditCharWhitelist,
            &settings.char_whitelist,
        )
        .map_err(|e| OcrError::Variable(format!("whitelist: {e}")))?;

        lt.set_variable(
            leptess::Variable::TesseditPagesegMode,
            &settings.page_seg_mode.to_string(),
        )
        .map_err(|e| OcrError::Variable(format!("psm: {e}")))?;

        Ok(lt)
    }

    fn run_job(lt: &mut leptess::LepTess, job: &Job) -> Result<String, OcrError> {
        lt.set_image_from_mem(
            &job.rgba,
            job.width as i32,
            job.height as i32,
            4,
            (job.width * 4) as i32,
        )
        .map_err(|_| OcrError::ImageSetup("이미지 메모리 설정 실패".to_string()))?;

        lt.get_utf8_text()
            .map_err(|e| OcrError::Extraction(format!("{e}")))
    }

    /// 워커 스레드 시작. 엔진 생성 결과를 기다렸다가 돌려준다
    async fn spawn_worker(settings: RecognizerConfig) -> Result<mpsc::Sender<Job>, OcrError> {
        let (job_tx, job_rx) = mpsc::channel::<Job>();
        let (ready_tx, ready_rx) = oneshot::channel::<Result<(), OcrError>>();

        std::thread::Builder::new()
            .name("tesseract-worker".to_string())
            .spawn(move || {
                let mut lt = match Self::build_engine(&settings) {
                    Ok(lt) => {
                        let _ = ready_tx.send(Ok(()));
                        lt
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                // 송신측이 모두 드롭되면 루프 종료
                while let Ok(job) = job_rx.recv() {
                    let result = Self::run_job(&mut lt, &job);
                    let _ = job.reply.send(result);
                }
                debug!("Tesseract 워커 종료");
            })
            .map_err(|e| OcrError::Worker(format!("스레드 생성 실패: {e}")))?;

        ready_rx
            .await
            .map_err(|_| OcrError::Worker("초기화 응답 없음".to_string()))??;

        Ok(job_tx)
    }
}

impl Default for TesseractRecognizer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TextRecognizer for TesseractRecognizer {
    async fn initialize(&self, settings: &RecognizerConfig) -> Result<(), CoreError> {
        let sender = Self::spawn_worker(settings.clone()).await?;
        *self.jobs.lock() = Some(sender);
        info!(
            "Tesseract 초기화 완료 (lang={}, psm={})",
            settings.language, settings.page_seg_mode
        );
        Ok(())
    }

    async fn recognize(&self, raster: &DynamicImage) -> Result<String, CoreError> {
        let rgba = raster.to_rgba8();
        let (width, height) = (rgba.width(), rgba.height());
        if width == 0 || height == 0 {
            return Err(OcrError::EmptyImage.into());
        }

        let sender = self
            .jobs
            .lock()
            .clone()
            .ok_or(OcrError::NotInitialized)?;

        let (reply, rx) = oneshot::channel();
        sender
            .send(Job {
                rgba: rgba.into_raw(),
                width,
                height,
                reply,
            })
            .map_err(|_| OcrError::Worker("작업 전송 실패".to_string()))?;

        let text = rx
            .await
            .map_err(|_| OcrError::Worker("응답 채널 닫힘".to_string()))??;

        debug!("OCR 원시 텍스트: {:?}", text.trim());
        Ok(text)
    }

    fn name(&self) -> &str {
        "tesseract"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbaImage;

    #[tokio::test]
    async fn recognize_before_initialize_fails() {
        let recognizer = TesseractRecognizer::new();
        let img = DynamicImage::ImageRgba8(RgbaImage::new(50, 20));
        let err = recognizer.recognize(&img).await.unwrap_err();
        assert!(matches!(err, CoreError::Recognition(_)));
    }

    #[tokio::test]
    async fn empty_image_is_rejected() {
        let recognizer = TesseractRecognizer::new();
        let img = DynamicImage::ImageRgba8(RgbaImage::new(0, 0));
        let err = recognizer.recognize(&img).await.unwrap_err();
        assert!(err.to_string().contains("빈 이미지"));
    }

    #[test]
    fn init_errors_map_to_recognizer_init() {
        let err: CoreError = OcrError::Init("no tessdata".to_string()).into();
        assert!(matches!(err, CoreError::RecognizerInit(_)));
        let err: CoreError = OcrError::Extraction("boom".to_string()).into();
        assert!(matches!(err, CoreError::Recognition(_)));
    }
}
