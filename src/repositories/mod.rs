//! 데이터 액세스 계층을 담당하는 리포지토리 모듈
//!
//! 진도 추적용 비정규화 코스 트리(courses → modules → lessons)를 관리합니다.
//! 이 문서들은 복제 수신자만 쓰며, 다른 컴포넌트는 읽기 연산만 사용합니다.
//!
//! # Examples
//!
//! ```rust,ignore
//! use enrollment_replication::repositories::courses::{CourseProgressRepository, MongoCourseProgressRepository};
//!
//! let repo = MongoCourseProgressRepository::new(database);
//! repo.create_indexes().await?;
//! let page = repo.find_all(1, 20).await?;
//! ```

pub mod courses;
