//! 시리얼 번호 정규화/검증.
//!
//! 인식기 출력 → 토큰 분리 → 숫자 외 문자 제거 → 정확히 10자리 숫자만 허용.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CoreError;

/// 시리얼 번호 자릿수
pub const SERIAL_LENGTH: usize = 10;

/// 검증된 10자리 시리얼 번호
///
/// `parse`/`TryFrom`으로만 생성되므로 항상 `^\d{10}$`를 만족한다.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SerialNumber(String);

impl SerialNumber {
    /// 후보 문자열 검증 후 생성
    pub fn parse(candidate: &str) -> Option<Self> {
        is_valid_serial(candidate).then(|| Self(candidate.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SerialNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SerialNumber {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for SerialNumber {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if is_valid_serial(&value) {
            Ok(Self(value))
        } else {
            Err(CoreError::Validation {
                field: "serial".to_string(),
                message: format!("{SERIAL_LENGTH}자리 숫자가 아님: {value:?}"),
            })
        }
    }
}

impl From<SerialNumber> for String {
    fn from(value: SerialNumber) -> Self {
        value.0
    }
}

/// 공백/개행 기준 토큰 분리 (빈 토큰 제외)
pub fn tokenize(text: &str) -> impl Iterator<Item = &str> + '_ {
    text.split_whitespace()
}

/// 숫자 외 문자 제거
pub fn to_candidate(token: &str) -> String {
    token.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// 정확히 10자리 ASCII 숫자인지
pub fn is_valid_serial(candidate: &str) -> bool {
    candidate.len() == SERIAL_LENGTH && candidate.bytes().all(|b| b.is_ascii_digit())
}

/// 인식 텍스트에서 유효한 시리얼 후보를 인식 순서대로 반환
///
/// 지연 평가 — 호출자가 첫 유효 항목을 채택하면 나머지 토큰은 평가하지 않는다.
pub fn candidates(text: &str) -> impl Iterator<Item = SerialNumber> + '_ {
    tokenize(text)
        .map(to_candidate)
        .filter(|c| !c.is_empty())
        .filter_map(|c| SerialNumber::parse(&c))
}
