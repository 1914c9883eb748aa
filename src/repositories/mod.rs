//! 데이터 접근 계층
//!
//! 저장소 구현은 [`DocumentStore`](crate::db::document_store::DocumentStore) 를 통해서만
//! 원본 데이터에 접근합니다.

pub mod profiles;
