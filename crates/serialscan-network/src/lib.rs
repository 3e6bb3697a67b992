//! # serialscan-network
//!
//! CRM 프록시 어댑터. `DealStore` 포트를 reqwest로 구현한다.

pub mod deal_client;
