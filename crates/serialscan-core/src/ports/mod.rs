//! 포트 인터페이스 (trait).
//!
//! Hexagonal Architecture의 포트 레이어.
//! 카메라, 인식 엔진, 이미지 보정, 위치, CRM 저장소는 외부 협력자이며
//! 어댑터 crate가 이 trait들을 구현하고 `serialscan-app`에서 `Arc<dyn T>`로 와이어링한다.
//!
//! 모든 async trait은 `async_trait` 매크로를 사용하여 object safety를 보장한다.

pub mod camera;
pub mod deal_store;
pub mod enhancer;
pub mod layout;
pub mod location;
pub mod recognizer;
