//! # serialscan-session
//!
//! 스캔 세션 크레이트.
//! 카메라 프레임을 주기적으로 인식해 새 시리얼을 채택하는 스캔 루프,
//! 세션 중복 제거 목록, 세션당 한 번의 위치 조회,
//! 딜 자산 슬롯에 시리얼을 붙여 CRM에 제출하는 할당 흐름을 담당한다.

pub mod assignment;
pub mod collection;
pub mod controller;
pub mod events;
pub mod geolocation;

#[cfg(test)]
mod testing;
