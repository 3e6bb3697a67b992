//! 서브커맨드 실행.
//!
//! 결과는 호출자가 JSON으로 출력하고, 진행 메시지는 stderr로 보낸다.

use anyhow::{anyhow, bail, Result};
use serde::Serialize;
use serialscan_core::models::deal::Deal;
use serialscan_core::models::scan::ScannedSerial;
use serialscan_core::models::serial::SerialNumber;
use serialscan_core::ports::deal_store::DealStore;
use serialscan_session::assignment::AssignmentFlow;
use serialscan_session::controller::{ScanController, ScanOutcome};
use serialscan_session::events::{AssignmentEvent, ScanEvent};
use std::future::Future;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// 할당 결과 슬롯 하나
#[derive(Debug, Serialize)]
pub struct SlotReport {
    pub model: String,
    pub model_value: String,
    pub serials: Vec<ScannedSerial>,
}

/// 제출된 할당 요약
#[derive(Debug, Serialize)]
pub struct AssignmentReport {
    pub deal_id: String,
    pub slots: Vec<SlotReport>,
}

/// 마감 시각까지 스캔을 기다리고, 넘으면 취소한 뒤 정리된 결과를 받는다
///
/// 스캔 future를 버리지 않고 취소 신호로 끝내야 컨트롤러 상태가 남지 않는다.
async fn scan_until<F, T>(deadline: Instant, scan: F, cancel: impl FnOnce()) -> T
where
    F: Future<Output = T>,
{
    tokio::pin!(scan);
    tokio::select! {
        result = &mut scan => result,
        _ = tokio::time::sleep_until(deadline) => {
            warn!("스캔 제한 시간 초과, 중지");
            cancel();
            scan.await
        }
    }
}

/// 스캔 이벤트 중 사용자 메시지를 stderr로 출력
pub fn report_scan_events(mut rx: broadcast::Receiver<ScanEvent>) {
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(ScanEvent::Matched(serial)) => eprintln!("✅ {}", serial.number),
                Ok(ScanEvent::Error(message)) => eprintln!("⚠️  {message}"),
                Ok(event) => debug!("스캔 이벤트: {event:?}"),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!("스캔 이벤트 {skipped}개 건너뜀")
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}

/// 할당 이벤트 중 사용자 메시지를 stderr로 출력
pub fn report_assignment_events(mut rx: broadcast::Receiver<AssignmentEvent>) {
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(AssignmentEvent::Submitted { message, .. }) => eprintln!("✅ {message}"),
                Ok(AssignmentEvent::Error(message)) => eprintln!("⚠️  {message}"),
                Ok(event) => debug!("할당 이벤트: {event:?}"),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!("할당 이벤트 {skipped}개 건너뜀")
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}

/// 시리얼을 `count`개 채택하거나 마감 시각이 될 때까지 스캔
///
/// 채택될 때마다 카메라를 다시 획득한다. 시간 초과는 에러가 아니며
/// 그때까지 채택된 목록을 돌려준다.
pub async fn run_scan(
    scanner: &ScanController,
    count: usize,
    deadline: Instant,
) -> Result<Vec<ScannedSerial>> {
    let mut outcome = scan_until(deadline, scanner.scan(), || scanner.stop()).await?;
    loop {
        match outcome {
            ScanOutcome::Matched(serial) => {
                info!("시리얼 채택: {} ({}/{count})", serial.number, scanner.serials().len());
                if scanner.serials().len() >= count {
                    break;
                }
            }
            ScanOutcome::Stopped => break,
        }
        if Instant::now() >= deadline {
            break;
        }
        outcome = scan_until(deadline, scanner.scan_again(), || scanner.stop()).await?;
    }

    scanner.stop();
    Ok(scanner.serials())
}

/// 진행 중인 딜 목록
pub async fn run_deals(store: &dyn DealStore) -> Result<Vec<Deal>> {
    let deals = store.list_active_deals().await?;
    info!("딜 {}건", deals.len());
    Ok(deals)
}

/// 시리얼이 기록된 딜 검색
pub async fn run_lookup(store: &dyn DealStore, serial: &str) -> Result<Vec<Deal>> {
    let number = SerialNumber::parse(serial)
        .ok_or_else(|| anyhow!("시리얼 형식 아님 (숫자 10자리): {serial}"))?;
    let deals = store.find_deals_by_serial(&number).await?;
    info!("시리얼 {number}: 딜 {}건", deals.len());
    Ok(deals)
}

/// 딜의 모든 슬롯을 순서대로 스캔한 뒤 제출
///
/// 슬롯마다 제한 시간을 새로 적용한다.
pub async fn run_assign(
    flow: &AssignmentFlow,
    deal_id: &str,
    slot_timeout: std::time::Duration,
) -> Result<AssignmentReport> {
    flow.load_deals().await?;
    let assets = flow.select_deal(deal_id).await?;

    for (slot, asset) in assets.iter().enumerate() {
        eprintln!(
            "📷 슬롯 {}/{}: {} ({})",
            slot + 1,
            assets.len(),
            asset.model,
            asset.model_value
        );
        let deadline = Instant::now() + slot_timeout;
        let scanned =
            scan_until(deadline, flow.scan_for_asset(slot), || flow.cancel_scan()).await?;
        if scanned.is_none() {
            bail!("슬롯 {} 스캔 시간 초과 ({})", slot + 1, asset.model_value);
        }
    }

    let assignments = flow.assignments();
    let report = AssignmentReport {
        deal_id: deal_id.to_string(),
        slots: assets
            .iter()
            .enumerate()
            .map(|(slot, asset)| SlotReport {
                model: asset.model.clone(),
                model_value: asset.model_value.clone(),
                serials: assignments.get(&slot).cloned().unwrap_or_default(),
            })
            .collect(),
    };

    flow.submit().await?;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn scan_until_returns_result_before_deadline() {
        let deadline = Instant::now() + Duration::from_secs(5);
        let cancelled = AtomicBool::new(false);
        let value = scan_until(deadline, async { 7 }, || {
            cancelled.store(true, Ordering::SeqCst)
        })
        .await;
        assert_eq!(value, 7);
        assert!(!cancelled.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn scan_until_cancels_and_awaits_after_deadline() {
        let stop = std::sync::Arc::new(tokio::sync::Notify::new());
        let waiter = stop.clone();
        let deadline = Instant::now() + Duration::from_millis(10);

        let value = scan_until(
            deadline,
            async move {
                waiter.notified().await;
                "stopped"
            },
            || stop.notify_one(),
        )
        .await;
        assert_eq!(value, "stopped");
    }
}
