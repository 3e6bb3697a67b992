//! 딜/자산/제출 저장소 포트 (CRM 협력자).
//!
//! 구현: `serialscan-network` crate (reqwest, CRM 프록시)
//! 재시도/인증/전송은 프록시 책임이며 코어는 불투명한 호출로 취급한다.

use async_trait::async_trait;

use crate::error::CoreError;
use crate::models::deal::{Asset, AssignmentPayload, Deal};
use crate::models::serial::SerialNumber;

/// CRM 딜 저장소
#[async_trait]
pub trait DealStore: Send + Sync {
    /// 진행 중인 딜 목록
    async fn list_active_deals(&self) -> Result<Vec<Deal>, CoreError>;

    /// 딜의 자산 슬롯 목록
    async fn list_assets(&self, deal_id: &str) -> Result<Vec<Asset>, CoreError>;

    /// 할당 스냅샷 제출 (한 번 호출)
    async fn submit_assignment(
        &self,
        deal_id: &str,
        payload: &AssignmentPayload,
    ) -> Result<(), CoreError>;

    /// 시리얼이 이미 기록된 딜 검색
    async fn find_deals_by_serial(&self, serial: &SerialNumber) -> Result<Vec<Deal>, CoreError>;
}
