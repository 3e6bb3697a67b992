//! 이미지 폴더 카메라.
//!
//! 디렉토리의 이미지 파일을 이름 순서대로 프레임으로 내보내는
//! `CameraSource` 구현. 마지막 프레임 다음에는 처음으로 돌아간다.

use async_trait::async_trait;
use image::DynamicImage;
use serialscan_core::error::CoreError;
use serialscan_core::ports::camera::{CameraConstraints, CameraSource, CameraStream, FacingMode};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const FRAME_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "tif", "tiff"];

/// 이미지 폴더 카메라
pub struct ImageFolderCamera {
    dir: PathBuf,
    /// 이 카메라의 방향 (`Environment` 제약에는 후면만 응답)
    facing: FacingMode,
}

impl ImageFolderCamera {
    /// 후면 카메라로 취급되는 폴더 카메라
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            facing: FacingMode::Environment,
        }
    }

    /// 카메라 방향 지정
    pub fn with_facing(mut self, facing: FacingMode) -> Self {
        self.facing = facing;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// 프레임 파일 목록 (파일명 정렬)
    fn list_frames(&self) -> Result<Vec<PathBuf>, CoreError> {
        let entries = std::fs::read_dir(&self.dir).map_err(|e| {
            CoreError::Camera(format!("프레임 디렉토리 열기 실패 {}: {e}", self.dir.display()))
        })?;

        let mut frames: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && is_frame_file(path))
            .collect();
        frames.sort();
        Ok(frames)
    }
}

fn is_frame_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| FRAME_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

#[async_trait]
impl CameraSource for ImageFolderCamera {
    async fn acquire(
        &self,
        constraints: &CameraConstraints,
    ) -> Result<Box<dyn CameraStream>, CoreError> {
        if constraints.facing == FacingMode::Environment && self.facing != FacingMode::Environment {
            return Err(CoreError::Camera(
                "후면 카메라 제약을 만족하는 장치 없음".to_string(),
            ));
        }

        let frames = self.list_frames()?;
        if frames.is_empty() {
            return Err(CoreError::Camera(format!(
                "프레임 이미지 없음: {}",
                self.dir.display()
            )));
        }

        info!(
            "폴더 카메라 획득: {} ({}개 프레임, 요청 {}x{})",
            self.dir.display(),
            frames.len(),
            constraints.ideal_width,
            constraints.ideal_height
        );

        Ok(Box::new(ImageFolderStream {
            frames,
            cursor: 0,
            active: true,
        }))
    }
}

/// 폴더 카메라 스트림
pub struct ImageFolderStream {
    frames: Vec<PathBuf>,
    cursor: usize,
    active: bool,
}

impl CameraStream for ImageFolderStream {
    fn grab_frame(&mut self) -> Result<DynamicImage, CoreError> {
        if !self.active {
            return Err(CoreError::Camera("스트림이 정지됨".to_string()));
        }

        let path = &self.frames[self.cursor];
        self.cursor = (self.cursor + 1) % self.frames.len();

        let frame = image::open(path)
            .map_err(|e| CoreError::Camera(format!("프레임 로드 실패 {}: {e}", path.display())))?;
        debug!(
            "프레임 취득: {} ({}x{})",
            path.display(),
            frame.width(),
            frame.height()
        );
        Ok(frame)
    }

    fn release(&mut self) {
        if self.active {
            debug!("폴더 카메라 스트림 해제");
        }
        self.active = false;
    }

    fn is_active(&self) -> bool {
        self.active
    }
}
