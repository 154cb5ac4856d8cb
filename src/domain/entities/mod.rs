//! # Domain Entities Module
//!
//! 진도 추적용 읽기 모델의 MongoDB 문서 구조를 정의합니다.
//!
//! ## 저장 구조
//!
//! ```text
//! courses  { _id, ..., modules: [ { _id, ..., lessons: [ {...} ] } ] }
//! modules  { _id, course_id, ..., lessons: [ {...} ] }   (course_id 인덱스)
//! lessons  { _id, module_id, ... }                       (module_id 인덱스)
//! ```
//!
//! 모든 ID는 UUID 문자열이며 업데이트 간에 바뀌지 않습니다.
//! 타임스탬프는 BSON `DateTime`으로 저장되어 `created_at` 정렬에 사용됩니다.

pub mod courses;

pub use courses::*;
