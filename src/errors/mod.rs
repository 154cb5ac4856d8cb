//! 에러 처리 모듈
//!
//! [`AppError`](errors::AppError)와 [`AppResult`](errors::AppResult)를 제공합니다.

pub mod errors;

pub use errors::*;
