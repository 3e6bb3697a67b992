//! CRM 딜 저장소 HTTP 클라이언트.
//!
//! `DealStore` 포트 구현. CRM 프록시(`{base_url}/deals...`)와 통신한다.
//! 인증/재시도는 프록시 책임이므로 여기서는 한 번만 요청하고 상태 코드를 매핑한다.

use async_trait::async_trait;
use serde_json::{json, Value};
use serialscan_core::config::CrmConfig;
use serialscan_core::error::CoreError;
use serialscan_core::models::deal::{Asset, AssignmentPayload, Deal};
use serialscan_core::models::serial::SerialNumber;
use serialscan_core::ports::deal_store::DealStore;
use std::time::Duration;
use tracing::{debug, info, warn};

/// 딜 레코드의 장비 필드 개수 (`Model_1..=4`)
const DEAL_MODEL_FIELDS: usize = 4;

/// 고객 자산 레코드의 슬롯 개수 (`Model_1..=3`, `Serial_1..=3`)
const ASSET_SLOT_FIELDS: usize = 3;

/// CRM 프록시 클라이언트 — `DealStore` 포트 구현
pub struct HttpDealStore {
    client: reqwest::Client,
    base_url: String,
}

impl HttpDealStore {
    /// 새 클라이언트 생성
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, CoreError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CoreError::Network(format!("HTTP 클라이언트 빌드 실패: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &CrmConfig) -> Result<Self, CoreError> {
        Self::new(&config.base_url, config.request_timeout())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        self.client
            .request(method, &url)
            .header(reqwest::header::ACCEPT, "application/json")
    }

    /// 응답 상태 코드 확인 및 에러 매핑
    async fn check_response(
        &self,
        resp: reqwest::Response,
        resource: &str,
    ) -> Result<reqwest::Response, CoreError> {
        let status = resp.status();

        if status.is_success() {
            return Ok(resp);
        }

        let text = resp.text().await.unwrap_or_else(|e| {
            warn!("응답 본문 읽기 실패: {e}");
            String::new()
        });

        match status.as_u16() {
            401 | 403 => Err(CoreError::Auth(format!("CRM 인증 실패: {text}"))),
            404 => Err(CoreError::NotFound {
                resource_type: resource.to_string(),
                id: text,
            }),
            503 => Err(CoreError::ServiceUnavailable(text)),
            _ => Err(CoreError::Internal(format!("CRM 에러 ({status}): {text}"))),
        }
    }

    /// 본문을 JSON으로 읽는다. 빈 본문(204 등)은 `Value::Null`
    async fn read_json(resp: reqwest::Response) -> Result<Value, CoreError> {
        let text = resp
            .text()
            .await
            .map_err(|e| CoreError::Network(format!("응답 본문 읽기 실패: {e}")))?;

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text)?)
    }

    async fn send(
        &self,
        builder: reqwest::RequestBuilder,
        resource: &str,
    ) -> Result<Value, CoreError> {
        let resp = builder
            .send()
            .await
            .map_err(|e| CoreError::Network(format!("{resource} 요청 실패: {e}")))?;
        let resp = self.check_response(resp, resource).await?;
        Self::read_json(resp).await
    }
}

/// `{"data": [...]}`의 배열. 없으면 빈 슬라이스
fn data_records(body: &Value) -> &[Value] {
    body.get("data")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

fn string_field(record: &Value, key: &str) -> Option<String> {
    match record.get(key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// 딜 레코드 → `Deal` (장비는 `Model_1..=4` 중 값이 있는 것만)
fn parse_deal(record: &Value) -> Option<Deal> {
    let id = string_field(record, "id")?;

    let models = (1..=DEAL_MODEL_FIELDS)
        .filter_map(|slot| {
            string_field(record, &format!("Model_{slot}")).map(|value| Asset {
                id: id.clone(),
                model: format!("Model {slot}"),
                model_value: value,
                existing_serial: None,
            })
        })
        .collect();

    Some(Deal {
        name: string_field(record, "Deal_Name"),
        stage: string_field(record, "Stage"),
        amount: record.get("Amount").and_then(Value::as_f64),
        street: string_field(record, "Street"),
        models,
        id,
    })
}

fn parse_deals(body: &Value) -> Vec<Deal> {
    data_records(body)
        .iter()
        .filter_map(|record| {
            let deal = parse_deal(record);
            if deal.is_none() {
                warn!("id 없는 딜 레코드 무시");
            }
            deal
        })
        .collect()
}

/// `data[0].Client_Assets[0]`의 `Model_N`/`Serial_N` → 자산 슬롯 목록
fn parse_assets(body: &Value) -> Vec<Asset> {
    let Some(client_asset) = data_records(body)
        .first()
        .and_then(|deal| deal.get("Client_Assets"))
        .and_then(Value::as_array)
        .and_then(|assets| assets.first())
    else {
        return Vec::new();
    };

    let id = string_field(client_asset, "id").unwrap_or_default();

    (1..=ASSET_SLOT_FIELDS)
        .filter_map(|slot| {
            string_field(client_asset, &format!("Model_{slot}")).map(|value| Asset {
                id: id.clone(),
                model: format!("Model {slot}"),
                model_value: value,
                existing_serial: string_field(client_asset, &format!("Serial_{slot}")),
            })
        })
        .collect()
}

#[async_trait]
impl DealStore for HttpDealStore {
    async fn list_active_deals(&self) -> Result<Vec<Deal>, CoreError> {
        let body = self
            .send(self.request(reqwest::Method::GET, "/deals"), "Deal")
            .await?;

        if body.get("data").is_none() {
            warn!("딜 목록 응답에 data 없음 — 빈 목록으로 처리");
        }
        let deals = parse_deals(&body);
        debug!("딜 {}건 수신", deals.len());
        Ok(deals)
    }

    async fn list_assets(&self, deal_id: &str) -> Result<Vec<Asset>, CoreError> {
        let path = format!("/deals/{deal_id}?fields=Client_Assets");
        let body = self
            .send(self.request(reqwest::Method::GET, &path), "Asset")
            .await?;

        let assets = parse_assets(&body);
        debug!("딜 {deal_id}: 자산 슬롯 {}개", assets.len());
        Ok(assets)
    }

    async fn submit_assignment(
        &self,
        deal_id: &str,
        payload: &AssignmentPayload,
    ) -> Result<(), CoreError> {
        let path = match payload {
            AssignmentPayload::AllSerials(_) => format!("/deals/{deal_id}/assets"),
            AssignmentPayload::FirstSerialOnly { .. } => format!("/deals/{deal_id}"),
        };

        let body = self
            .send(
                self.request(reqwest::Method::PUT, &path)
                    .json(&payload.to_body()),
                "Deal",
            )
            .await?;

        if body.get("data").is_none() {
            return Err(CoreError::Internal(format!(
                "CRM 제출 응답 형식 오류: {body}"
            )));
        }

        info!(
            "딜 {deal_id}에 시리얼 {}개 제출 완료",
            payload.serial_count()
        );
        Ok(())
    }

    async fn find_deals_by_serial(&self, serial: &SerialNumber) -> Result<Vec<Deal>, CoreError> {
        let criteria = json!({
            "criteria": [{
                "field": "Serial_Numbers",
                "operator": "contains",
                "value": serial.as_str(),
            }]
        });

        let body = self
            .send(
                self.request(reqwest::Method::POST, "/deals/search")
                    .json(&criteria),
                "Deal",
            )
            .await?;

        Ok(parse_deals(&body))
    }
}
