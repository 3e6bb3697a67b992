//! CRM 딜/자산 모델과 제출 페이로드.
//!
//! 필드 이름은 CRM 레코드 이름(`Deal_Name`, `Model_Value` 등)으로 직렬화한다.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

use super::scan::ScannedSerial;
use crate::config::SerialCardinality;

/// 딜 (진행 중인 영업 건)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deal {
    pub id: String,
    #[serde(rename = "Deal_Name", default)]
    pub name: Option<String>,
    #[serde(rename = "Stage", default)]
    pub stage: Option<String>,
    #[serde(rename = "Amount", default)]
    pub amount: Option<f64>,
    #[serde(rename = "Street", default)]
    pub street: Option<String>,
    /// 딜 레코드의 `Model_N` 필드에서 추출한 장비 목록
    #[serde(default)]
    pub models: Vec<Asset>,
}

impl Deal {
    /// 선택 목록 표시용 라벨 (주소 우선)
    pub fn label(&self) -> String {
        self.street
            .clone()
            .or_else(|| self.name.clone())
            .unwrap_or_else(|| "No address available".to_string())
    }
}

/// 딜에 속한 장비 항목 (시리얼 할당 슬롯)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    pub id: String,
    /// 슬롯 라벨 (예: "Model 1")
    #[serde(rename = "Model")]
    pub model: String,
    /// 장비 모델명
    #[serde(rename = "Model_Value")]
    pub model_value: String,
    /// CRM에 이미 기록된 시리얼
    #[serde(rename = "Serial_Number", default)]
    pub existing_serial: Option<String>,
}

/// 제출 페이로드 — 슬롯 카디널리티별 형태
#[derive(Debug, Clone, PartialEq)]
pub enum AssignmentPayload {
    /// 자산별 시리얼 배열
    AllSerials(Vec<AssetSerials>),
    /// 딜 레코드의 `Serial_N` 필드 (슬롯당 첫 시리얼)
    FirstSerialOnly {
        deal_id: String,
        /// 슬롯 번호(1부터) → 시리얼
        serials: BTreeMap<usize, String>,
    },
}

/// 자산 하나에 할당된 시리얼 목록
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetSerials {
    pub id: String,
    #[serde(rename = "Serial_Numbers")]
    pub serial_numbers: Vec<String>,
}

impl AssignmentPayload {
    /// 할당 스냅샷에서 페이로드 생성
    ///
    /// `assignments`의 키는 `assets` 슬롯 인덱스(0부터).
    pub fn build(
        cardinality: SerialCardinality,
        deal_id: &str,
        assets: &[Asset],
        assignments: &BTreeMap<usize, Vec<ScannedSerial>>,
    ) -> Self {
        let numbers_of = |index: usize| -> Vec<String> {
            assignments
                .get(&index)
                .map(|serials| serials.iter().map(|s| s.number.to_string()).collect())
                .unwrap_or_default()
        };

        match cardinality {
            SerialCardinality::AllSerials => Self::AllSerials(
                assets
                    .iter()
                    .enumerate()
                    .map(|(index, asset)| AssetSerials {
                        id: asset.id.clone(),
                        serial_numbers: numbers_of(index),
                    })
                    .collect(),
            ),
            SerialCardinality::FirstSerialOnly => Self::FirstSerialOnly {
                deal_id: deal_id.to_string(),
                serials: (0..assets.len())
                    .filter_map(|index| {
                        numbers_of(index)
                            .into_iter()
                            .next()
                            .map(|first| (index + 1, first))
                    })
                    .collect(),
            },
        }
    }

    /// 요청 본문 JSON (`{"data": [...]}`)
    pub fn to_body(&self) -> Value {
        match self {
            Self::AllSerials(assets) => json!({ "data": assets }),
            Self::FirstSerialOnly { deal_id, serials } => {
                let mut record = Map::new();
                record.insert("id".to_string(), Value::String(deal_id.clone()));
                for (slot, serial) in serials {
                    record.insert(format!("Serial_{slot}"), Value::String(serial.clone()));
                }
                json!({ "data": [Value::Object(record)] })
            }
        }
    }

    /// 제출되는 시리얼 총 개수
    pub fn serial_count(&self) -> usize {
        match self {
            Self::AllSerials(assets) => assets.iter().map(|a| a.serial_numbers.len()).sum(),
            Self::FirstSerialOnly { serials, .. } => serials.len(),
        }
    }
}
