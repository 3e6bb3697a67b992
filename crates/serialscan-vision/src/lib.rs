//! # serialscan-vision
//!
//! 프레임 처리 크레이트.
//! 스캔 영역 추출, 인식 전 이미지 보정, Tesseract 인식기,
//! 이미지 폴더 카메라 어댑터를 담당한다.

pub mod capture;
#[cfg(feature = "ocr")]
pub mod ocr;
pub mod preprocess;
pub mod region;
