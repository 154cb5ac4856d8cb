//! # MongoDB 코스 트리 리포지토리
//!
//! `courses`, `modules`, `lessons` 세 컬렉션으로 구성된 비정규화 트리를 관리합니다.
//!
//! ## 컬렉션과 인덱스
//!
//! | 컬렉션 | 인덱스 |
//! |--------|--------|
//! | `courses` | `instructor_id`, `category`, `level`, `created_at`(desc) |
//! | `modules` | `course_id` |
//! | `lessons` | `module_id` |
//!
//! ## 임베드 배열 갱신
//!
//! 배열 요소 교체는 `$pull` 후 `$push` (`$each` + `$sort: { order_number: 1 }`)
//! 두 번의 쓰기로 수행됩니다. 같은 필드에 `$pull`과 `$push`를 한 번에 쓸 수 없기 때문입니다.
//! 두 쓰기 사이에 실패하면 요소가 빠진 상태로 남으며, 같은 이벤트가 재전달되면 복구됩니다.
//!
//! 코스/모듈 쓰기는 하위 문서를 단독 컬렉션에 먼저 기록한 뒤,
//! 부모 배열을 단독 컬렉션 기준으로 다시 만듭니다.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::TryStreamExt;
use log::{debug, warn};
use mongodb::bson::{Bson, Document, doc};
use mongodb::options::IndexOptions;
use mongodb::{Collection, IndexModel};
use serde::Serialize;

use super::{CoursePage, CourseProgressRepository, normalize_page};
use crate::db::Database;
use crate::domain::entities::{CourseDocument, LessonDocument, ModuleDocument};
use crate::errors::{AppResult, ErrorContext};

pub const COURSES_COLLECTION: &str = "courses";
pub const MODULES_COLLECTION: &str = "modules";
pub const LESSONS_COLLECTION: &str = "lessons";

/// `$pull: { field: { _id: id } }`
pub fn pull_embedded(field: &str, id: &str) -> Document {
    let mut target = Document::new();
    target.insert(field, doc! { "_id": id });
    doc! { "$pull": target }
}

/// `$push: { field: { $each: [element], $sort: { order_number: 1 } } }`
pub fn push_embedded_sorted(field: &str, element: Bson) -> Document {
    let mut target = Document::new();
    target.insert(
        field,
        doc! {
            "$each": [element],
            "$sort": { "order_number": 1 },
        },
    );
    doc! { "$push": target }
}

fn to_bson<T: Serialize>(value: &T) -> AppResult<Bson> {
    mongodb::bson::to_bson(value).context("BSON 직렬화 실패")
}

/// MongoDB 기반 코스 트리 리포지토리
#[derive(Clone)]
pub struct MongoCourseProgressRepository {
    db: Arc<Database>,
}

impl MongoCourseProgressRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    fn courses(&self) -> Collection<CourseDocument> {
        self.db.get_database().collection(COURSES_COLLECTION)
    }

    fn modules(&self) -> Collection<ModuleDocument> {
        self.db.get_database().collection(MODULES_COLLECTION)
    }

    fn lessons(&self) -> Collection<LessonDocument> {
        self.db.get_database().collection(LESSONS_COLLECTION)
    }

    /// 부모 문서의 배열 요소를 교체하거나 추가합니다.
    ///
    /// 부모가 없으면 `false`를 반환합니다.
    async fn replace_embedded<P, T>(
        &self,
        parent: &Collection<P>,
        parent_id: &str,
        field: &str,
        element: &T,
        element_id: &str,
    ) -> AppResult<bool>
    where
        P: Send + Sync,
        T: Serialize,
    {
        let filter = doc! { "_id": parent_id };

        let pulled = parent
            .update_one(filter.clone(), pull_embedded(field, element_id))
            .await?;

        if pulled.matched_count == 0 {
            return Ok(false);
        }

        parent
            .update_one(filter, push_embedded_sorted(field, to_bson(element)?))
            .await?;

        Ok(true)
    }

    async fn remove_embedded<P>(
        &self,
        parent: &Collection<P>,
        parent_id: &str,
        field: &str,
        element_id: &str,
    ) -> AppResult<()>
    where
        P: Send + Sync,
    {
        parent
            .update_one(doc! { "_id": parent_id }, pull_embedded(field, element_id))
            .await?;
        Ok(())
    }

    /// 단독 모듈 문서를 코스 배열에 다시 임베드합니다.
    ///
    /// 레슨 변경 후 `courses.modules[].lessons` 사본을 맞추는 데 사용합니다.
    async fn refresh_course_embed(&self, module_id: &str) -> AppResult<()> {
        if let Some(module) = self.modules().find_one(doc! { "_id": module_id }).await? {
            self.replace_embedded(&self.courses(), &module.course_id, "modules", &module, &module.id)
                .await?;
        }
        Ok(())
    }

    /// 모듈과 임베드 레슨을 단독 컬렉션에 반영하고 저장된 모듈을 반환합니다.
    ///
    /// 기존 모듈의 `created_at`은 유지하고, 레슨 배열은 `lessons` 컬렉션 기준으로 다시 만듭니다.
    /// 다른 코스로 옮겨진 모듈은 이전 코스 배열에서 제거됩니다.
    async fn upsert_module_tree(
        &self,
        course_id: &str,
        mut module: ModuleDocument,
    ) -> AppResult<ModuleDocument> {
        module.course_id = course_id.to_string();

        for mut lesson in std::mem::take(&mut module.lessons) {
            lesson.module_id = module.id.clone();
            self.lessons()
                .replace_one(doc! { "_id": lesson.id.as_str() }, &lesson)
                .upsert(true)
                .await?;
        }

        let existing = self.modules().find_one(doc! { "_id": module.id.as_str() }).await?;

        if let Some(previous) = existing.as_ref().filter(|e| e.course_id != course_id) {
            self.remove_embedded(&self.courses(), &previous.course_id, "modules", &module.id)
                .await?;
        }

        let mut merged = match &existing {
            Some(current) => current.merged_with(&module),
            None => module,
        };
        merged.lessons = self.find_lessons_by_module(&merged.id).await?;

        self.modules()
            .replace_one(doc! { "_id": merged.id.as_str() }, &merged)
            .upsert(true)
            .await?;

        Ok(merged)
    }

    /// 코스 문서를 쓰고 임베드 트리를 단독 컬렉션과 맞춥니다.
    ///
    /// 메시지에 실린 모듈/레슨은 단독 문서로 먼저 기록되고,
    /// 코스의 `modules` 배열은 `modules` 컬렉션 기준으로 다시 만들어집니다.
    async fn write_course_tree(&self, mut course: CourseDocument, keep_created_at: bool) -> AppResult<()> {
        if keep_created_at {
            if let Some(current) = self.courses().find_one(doc! { "_id": course.id.as_str() }).await? {
                course.created_at = current.created_at;
            }
        }

        for module in std::mem::take(&mut course.modules) {
            self.upsert_module_tree(&course.id, module).await?;
        }
        course.modules = self.find_modules_by_course(&course.id).await?;

        self.courses()
            .replace_one(doc! { "_id": course.id.as_str() }, &course)
            .upsert(true)
            .await?;
        Ok(())
    }

    async fn find_courses(&self, filter: Document) -> AppResult<Vec<CourseDocument>> {
        let cursor = self
            .courses()
            .find(filter)
            .sort(doc! { "created_at": -1 })
            .await?;
        Ok(cursor.try_collect().await?)
    }

    /// 데이터베이스 인덱스 생성
    ///
    /// 복제 쓰기(부모 ID 조회)와 진도 추적 읽기(강사/카테고리/레벨 조회)에 필요한
    /// 인덱스를 만듭니다. 애플리케이션 시작 시 한 번 호출합니다.
    pub async fn create_indexes(&self) -> AppResult<()> {
        let named = |keys: Document, name: &str| {
            IndexModel::builder()
                .keys(keys)
                .options(IndexOptions::builder().name(name.to_string()).build())
                .build()
        };

        self.courses()
            .create_indexes([
                named(doc! { "instructor_id": 1 }, "instructor_id_idx"),
                named(doc! { "category": 1 }, "category_idx"),
                named(doc! { "level": 1 }, "level_idx"),
                named(doc! { "created_at": -1 }, "created_at_desc"),
            ])
            .await?;

        self.modules()
            .create_indexes([named(doc! { "course_id": 1 }, "course_id_idx")])
            .await?;

        self.lessons()
            .create_indexes([named(doc! { "module_id": 1 }, "module_id_idx")])
            .await?;

        Ok(())
    }
}

#[async_trait]
impl CourseProgressRepository for MongoCourseProgressRepository {
    async fn save(&self, course: CourseDocument) -> AppResult<()> {
        self.write_course_tree(course, false).await
    }

    async fn update(&self, course: CourseDocument) -> AppResult<()> {
        self.write_course_tree(course, true).await
    }

    async fn delete(&self, course_id: &str) -> AppResult<bool> {
        let deleted = self.courses().delete_one(doc! { "_id": course_id }).await?;

        let modules = self
            .modules()
            .delete_many(doc! { "course_id": course_id })
            .await?;

        debug!(
            "course={} 삭제: course={} modules={}",
            course_id, deleted.deleted_count, modules.deleted_count
        );

        Ok(deleted.deleted_count > 0)
    }

    async fn add_module(&self, course_id: &str, module: ModuleDocument) -> AppResult<()> {
        let merged = self.upsert_module_tree(course_id, module).await?;

        let embedded = self
            .replace_embedded(&self.courses(), course_id, "modules", &merged, &merged.id)
            .await?;

        if !embedded {
            warn!("module={} 부모 course={} 가 아직 복제되지 않음", merged.id, course_id);
        }

        Ok(())
    }

    async fn update_module(&self, module: ModuleDocument) -> AppResult<()> {
        let course_id = module.course_id.clone();
        self.add_module(&course_id, module).await
    }

    async fn delete_module(&self, module_id: &str) -> AppResult<bool> {
        let existing = self.modules().find_one(doc! { "_id": module_id }).await?;

        self.lessons()
            .delete_many(doc! { "module_id": module_id })
            .await?;

        self.modules().delete_one(doc! { "_id": module_id }).await?;

        if let Some(module) = &existing {
            self.remove_embedded(&self.courses(), &module.course_id, "modules", module_id)
                .await?;
        }

        Ok(existing.is_some())
    }

    async fn add_lesson(&self, module_id: &str, mut lesson: LessonDocument) -> AppResult<()> {
        lesson.module_id = module_id.to_string();

        self.lessons()
            .replace_one(doc! { "_id": lesson.id.as_str() }, &lesson)
            .upsert(true)
            .await?;

        let embedded = self
            .replace_embedded(&self.modules(), module_id, "lessons", &lesson, &lesson.id)
            .await?;

        if !embedded {
            warn!("lesson={} 부모 module={} 가 아직 복제되지 않음", lesson.id, module_id);
            return Ok(());
        }

        self.refresh_course_embed(module_id).await
    }

    async fn update_lesson(&self, mut lesson: LessonDocument) -> AppResult<()> {
        let existing = self.lessons().find_one(doc! { "_id": lesson.id.as_str() }).await?;

        if let Some(current) = &existing {
            lesson.created_at = current.created_at;
        }

        self.lessons()
            .replace_one(doc! { "_id": lesson.id.as_str() }, &lesson)
            .upsert(true)
            .await?;

        if let Some(previous) = existing.filter(|e| e.module_id != lesson.module_id) {
            self.remove_embedded(&self.modules(), &previous.module_id, "lessons", &lesson.id)
                .await?;
            self.refresh_course_embed(&previous.module_id).await?;
        }

        if self
            .replace_embedded(&self.modules(), &lesson.module_id, "lessons", &lesson, &lesson.id)
            .await?
        {
            self.refresh_course_embed(&lesson.module_id).await?;
        }

        Ok(())
    }

    async fn delete_lesson(&self, lesson_id: &str) -> AppResult<bool> {
        let Some(lesson) = self.lessons().find_one(doc! { "_id": lesson_id }).await? else {
            return Ok(false);
        };

        self.lessons().delete_one(doc! { "_id": lesson_id }).await?;

        self.remove_embedded(&self.modules(), &lesson.module_id, "lessons", lesson_id)
            .await?;
        self.refresh_course_embed(&lesson.module_id).await?;

        Ok(true)
    }

    async fn find_by_id(&self, course_id: &str) -> AppResult<Option<CourseDocument>> {
        Ok(self.courses().find_one(doc! { "_id": course_id }).await?)
    }

    async fn find_all(&self, page: u64, limit: u64) -> AppResult<CoursePage> {
        let (page, limit) = normalize_page(page, limit);

        let total = self.courses().count_documents(doc! {}).await?;

        let cursor = self
            .courses()
            .find(doc! {})
            .sort(doc! { "created_at": -1 })
            .skip((page - 1) * limit)
            .limit(limit as i64)
            .await?;

        Ok(CoursePage {
            items: cursor.try_collect().await?,
            total,
            page,
            limit,
        })
    }

    async fn find_by_instructor(&self, instructor_id: &str) -> AppResult<Vec<CourseDocument>> {
        self.find_courses(doc! { "instructor_id": instructor_id }).await
    }

    async fn find_by_category(&self, category: &str) -> AppResult<Vec<CourseDocument>> {
        self.find_courses(doc! { "category": category }).await
    }

    async fn find_by_level(&self, level: &str) -> AppResult<Vec<CourseDocument>> {
        self.find_courses(doc! { "level": level }).await
    }

    async fn find_module_by_id(&self, module_id: &str) -> AppResult<Option<ModuleDocument>> {
        Ok(self.modules().find_one(doc! { "_id": module_id }).await?)
    }

    async fn find_lesson_by_id(&self, lesson_id: &str) -> AppResult<Option<LessonDocument>> {
        Ok(self.lessons().find_one(doc! { "_id": lesson_id }).await?)
    }

    async fn find_modules_by_course(&self, course_id: &str) -> AppResult<Vec<ModuleDocument>> {
        let cursor = self
            .modules()
            .find(doc! { "course_id": course_id })
            .sort(doc! { "order_number": 1 })
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn find_lessons_by_module(&self, module_id: &str) -> AppResult<Vec<LessonDocument>> {
        let cursor = self
            .lessons()
            .find(doc! { "module_id": module_id })
            .sort(doc! { "order_number": 1 })
            .await?;
        Ok(cursor.try_collect().await?)
    }
}
