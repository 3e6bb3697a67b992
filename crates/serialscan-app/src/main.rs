//! # serialscan-app
//!
//! SerialScan CLI 바이너리 진입점.
//! 설정 로드, 어댑터 와이어링, 스캔/딜 조회/자산 할당 실행.

mod commands;
mod wiring;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use serialscan_core::config::AppConfig;
use serialscan_core::config_manager::ConfigManager;
use serialscan_core::models::geometry::ScreenRect;
use serialscan_core::models::scan::Position;
use serialscan_network::deal_client::HttpDealStore;
use serialscan_session::assignment::AssignmentFlow;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// SerialScan — 장비 시리얼 스캔 및 CRM 자산 할당
#[derive(Parser, Debug)]
#[command(name = "serialscan")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// 설정 파일 경로 (기본: 플랫폼 설정 디렉토리의 config.json)
    #[arg(long, short = 'c', global = true)]
    config: Option<PathBuf>,

    /// CRM 프록시 URL (설정 파일 값 대신 사용)
    #[arg(long, short = 's', global = true)]
    server: Option<String>,

    /// 로그 레벨 (trace, debug, info, warn, error)
    #[arg(long, short = 'l', default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 이미지 폴더 프레임에서 시리얼 스캔
    Scan {
        #[command(flatten)]
        source: FrameArgs,

        /// 채택할 시리얼 수
        #[arg(long, default_value = "1")]
        count: usize,
    },
    /// 진행 중인 딜 목록
    Deals,
    /// 시리얼이 기록된 딜 검색
    Lookup {
        /// 10자리 시리얼
        #[arg(long)]
        serial: String,
    },
    /// 딜의 모든 자산 슬롯을 스캔해 제출
    Assign {
        /// 딜 ID
        #[arg(long)]
        deal: String,

        #[command(flatten)]
        source: FrameArgs,
    },
    /// 적용 중인 설정 출력
    ShowConfig,
}

/// 프레임 소스/화면 배치 인자
#[derive(clap::Args, Debug)]
struct FrameArgs {
    /// 프레임 이미지 디렉토리 (이름 순서로 반복)
    #[arg(long)]
    frames: PathBuf,

    /// 스캔 가이드 박스 `left,top,width,height` (화면 좌표)
    #[arg(long, value_parser = wiring::parse_rect, requires = "video_rect")]
    scan_region: Option<ScreenRect>,

    /// 비디오 요소 위치 `left,top,width,height` (화면 좌표)
    #[arg(long, value_parser = wiring::parse_rect)]
    video_rect: Option<ScreenRect>,

    /// 고정 위치 `lat,lng[,accuracy]`
    #[arg(long, value_parser = wiring::parse_position)]
    position: Option<Position>,

    /// 스캔 제한 시간 (초, 할당은 슬롯마다)
    #[arg(long, default_value = "30")]
    timeout_secs: u64,
}

/// 설정 로드 + CLI 오버라이드 + 검증
fn load_config(args: &Args) -> Result<(AppConfig, PathBuf)> {
    let manager = match &args.config {
        Some(path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new(),
    }
    .context("설정 로드 실패")?;

    let mut config = manager.get();
    if let Some(ref server_url) = args.server {
        config.crm.base_url = server_url.clone();
    }
    config.validate().context("설정 검증 실패")?;
    Ok((config, manager.config_path().to_path_buf()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // tracing 초기화 (결과 JSON은 stdout, 로그는 stderr)
    let log_filter = format!(
        "serialscan={},serialscan_core={},serialscan_vision={},serialscan_network={},serialscan_session={}",
        args.log_level, args.log_level, args.log_level, args.log_level, args.log_level
    );
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let (config, config_path) = load_config(&args)?;
    info!("설정: {}", config_path.display());

    match args.command {
        Command::Scan { source, count } => {
            let layout = wiring::build_layout(source.scan_region, source.video_rect);
            let scanner = wiring::build_scanner(&config, &source.frames, layout, source.position);
            commands::report_scan_events(scanner.subscribe());

            let deadline = Instant::now() + Duration::from_secs(source.timeout_secs);
            let serials = commands::run_scan(&scanner, count.max(1), deadline).await?;
            print_json(&serials)?;
        }
        Command::Deals => {
            let store = HttpDealStore::from_config(&config.crm)?;
            info!("CRM 프록시: {}", store.base_url());
            let deals = commands::run_deals(&store).await?;
            print_json(&deals)?;
        }
        Command::Lookup { serial } => {
            let store = HttpDealStore::from_config(&config.crm)?;
            let deals = commands::run_lookup(&store, &serial).await?;
            print_json(&deals)?;
        }
        Command::Assign { deal, source } => {
            let store = Arc::new(HttpDealStore::from_config(&config.crm)?);
            let layout = wiring::build_layout(source.scan_region, source.video_rect);
            let scanner = wiring::build_scanner(&config, &source.frames, layout, source.position);
            commands::report_scan_events(scanner.subscribe());

            let flow = AssignmentFlow::new(store, Arc::new(scanner), config.assignment.clone());
            commands::report_assignment_events(flow.subscribe());

            let report = commands::run_assign(
                &flow,
                &deal,
                Duration::from_secs(source.timeout_secs),
            )
            .await?;
            print_json(&report)?;
        }
        Command::ShowConfig => {
            eprintln!("📄 {}", config_path.display());
            print_json(&config)?;
        }
    }

    Ok(())
}
