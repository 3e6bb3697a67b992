//! 도메인 모델.
//!
//! 모든 모델은 `serde::Serialize` + `Deserialize`를 구현한다.

pub mod deal;
pub mod geometry;
pub mod scan;
pub mod serial;
