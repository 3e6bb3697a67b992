//! 설정 파일 관리.
//!
//! `config.json` 한 파일을 읽고 쓴다. 파일이 없으면 기본값으로 만들고,
//! 저장은 임시 파일에 쓴 뒤 교체하므로 중간에 끊겨도 기존 파일이 남는다.

use crate::config::AppConfig;
use crate::error::CoreError;
use directories::ProjectDirs;
use parking_lot::RwLock;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

const CONFIG_FILE_NAME: &str = "config.json";

/// 설정 관리자
///
/// 메모리 사본과 디스크 파일을 함께 들고 있으며, 어느 쪽이든 검증을
/// 통과한 값만 반영된다.
#[derive(Debug, Clone)]
pub struct ConfigManager {
    current: Arc<RwLock<AppConfig>>,
    file: ConfigFile,
}

impl ConfigManager {
    /// 플랫폼 설정 디렉토리의 `config.json` 사용
    pub fn new() -> Result<Self, CoreError> {
        Self::with_path(Self::config_dir()?.join(CONFIG_FILE_NAME))
    }

    /// 지정 경로 사용. 파일이 없으면 기본 설정을 기록한다.
    pub fn with_path(path: PathBuf) -> Result<Self, CoreError> {
        let file = ConfigFile { path };
        let config = file.load_or_create()?;
        Ok(Self {
            current: Arc::new(RwLock::new(config)),
            file,
        })
    }

    pub fn get(&self) -> AppConfig {
        self.current.read().clone()
    }

    /// 검증 → 디스크 기록 → 메모리 반영 순서. 실패하면 아무것도 바뀌지 않는다.
    pub fn update(&self, next: AppConfig) -> Result<(), CoreError> {
        next.validate()?;
        self.file.store(&next)?;
        *self.current.write() = next;
        Ok(())
    }

    /// 현재 설정 사본을 고쳐 저장하고, 저장된 값을 돌려준다
    pub fn update_with<F>(&self, edit: F) -> Result<AppConfig, CoreError>
    where
        F: FnOnce(&mut AppConfig),
    {
        let mut next = self.get();
        edit(&mut next);
        self.update(next.clone())?;
        Ok(next)
    }

    pub fn config_path(&self) -> &Path {
        &self.file.path
    }

    /// 외부에서 수정된 파일 다시 읽기. 잘못된 파일이면 기존 값 유지.
    pub fn reload(&self) -> Result<(), CoreError> {
        let fresh = self.file.load().inspect_err(|e| {
            warn!("설정 다시 읽기 실패, 기존 값 유지: {}", e);
        })?;
        *self.current.write() = fresh;
        info!("설정 다시 읽음: {}", self.file.path.display());
        Ok(())
    }

    /// 플랫폼별 설정 디렉토리
    ///
    /// - macOS: `~/Library/Application Support/com.serialscan.scanner/`
    /// - Windows: `%APPDATA%\serialscan\scanner\config\`
    /// - Linux: `$XDG_CONFIG_HOME/scanner/` (기본 `~/.config/scanner/`)
    pub fn config_dir() -> Result<PathBuf, CoreError> {
        let dirs = ProjectDirs::from("com", "serialscan", "scanner")
            .ok_or_else(|| CoreError::Config("설정 디렉토리를 결정할 수 없음 (HOME 없음)".into()))?;
        Ok(dirs.config_dir().to_path_buf())
    }
}

/// 디스크상의 설정 파일
#[derive(Debug, Clone)]
struct ConfigFile {
    path: PathBuf,
}

impl ConfigFile {
    fn load_or_create(&self) -> Result<AppConfig, CoreError> {
        if self.path.is_file() {
            return self.load();
        }
        let defaults = AppConfig::default_config();
        self.store(&defaults)?;
        info!("기본 설정 기록: {}", self.path.display());
        Ok(defaults)
    }

    /// 읽기 + 파싱 + 검증. 빠진 섹션/필드는 serde 기본값으로 채워진다.
    fn load(&self) -> Result<AppConfig, CoreError> {
        let raw = fs::read_to_string(&self.path).map_err(|e| self.failure("읽기", e))?;
        let config: AppConfig =
            serde_json::from_str(&raw).map_err(|e| self.failure("파싱", e))?;
        config.validate()?;
        debug!(path = %self.path.display(), "설정 로드");
        Ok(config)
    }

    fn store(&self, config: &AppConfig) -> Result<(), CoreError> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|e| self.failure("디렉토리 생성", e))?;
        }

        let body = serde_json::to_vec_pretty(config).map_err(|e| self.failure("직렬화", e))?;
        let staging = self.path.with_extension("json.tmp");
        fs::write(&staging, body).map_err(|e| self.failure("임시 파일 기록", e))?;
        fs::rename(&staging, &self.path).map_err(|e| {
            let _ = fs::remove_file(&staging);
            self.failure("교체", e)
        })?;
        debug!(path = %self.path.display(), "설정 저장");
        Ok(())
    }

    fn failure(&self, stage: &str, cause: impl std::fmt::Display) -> CoreError {
        CoreError::Config(format!("{} {}: {}", self.path.display(), stage, cause))
    }
}
