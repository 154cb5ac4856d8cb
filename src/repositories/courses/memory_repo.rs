//! 프로세스 내부 코스 트리 리포지토리
//!
//! MongoDB 구현과 같은 단계를 같은 순서로 수행합니다.
//! 연산 하나가 잠금 하나 안에서 끝나므로 연산 단위로는 원자적입니다.

use std::cmp::Reverse;
use std::collections::HashMap;

use async_trait::async_trait;
use log::warn;
use tokio::sync::RwLock;

use super::{CoursePage, CourseProgressRepository, normalize_page};
use crate::domain::entities::{CourseDocument, LessonDocument, ModuleDocument};
use crate::errors::AppResult;

#[derive(Default)]
struct Collections {
    courses: HashMap<String, CourseDocument>,
    modules: HashMap<String, ModuleDocument>,
    lessons: HashMap<String, LessonDocument>,
}

impl Collections {
    fn modules_of(&self, course_id: &str) -> Vec<ModuleDocument> {
        let mut modules: Vec<_> = self
            .modules
            .values()
            .filter(|m| m.course_id == course_id)
            .cloned()
            .collect();
        modules.sort_by_key(|m| m.order_number);
        modules
    }

    fn lessons_of(&self, module_id: &str) -> Vec<LessonDocument> {
        let mut lessons: Vec<_> = self
            .lessons
            .values()
            .filter(|l| l.module_id == module_id)
            .cloned()
            .collect();
        lessons.sort_by_key(|l| l.order_number);
        lessons
    }

    /// 모듈과 임베드 레슨을 단독 컬렉션에 반영합니다.
    ///
    /// 기존 모듈의 `created_at`은 유지하고, 레슨 배열은 `lessons` 컬렉션 기준으로 다시 만듭니다.
    /// 다른 코스로 옮겨진 모듈은 이전 코스 배열에서 제거됩니다.
    fn upsert_module_tree(&mut self, course_id: &str, mut module: ModuleDocument) -> ModuleDocument {
        module.course_id = course_id.to_string();

        for mut lesson in std::mem::take(&mut module.lessons) {
            lesson.module_id = module.id.clone();
            self.lessons.insert(lesson.id.clone(), lesson);
        }

        let existing = self.modules.get(&module.id).cloned();

        if let Some(previous) = existing.as_ref().filter(|e| e.course_id != course_id) {
            if let Some(course) = self.courses.get_mut(&previous.course_id) {
                course.remove_module(&module.id);
            }
        }

        let mut merged = match &existing {
            Some(current) => current.merged_with(&module),
            None => module,
        };
        merged.lessons = self.lessons_of(&merged.id);

        self.modules.insert(merged.id.clone(), merged.clone());
        merged
    }

    /// 코스 문서를 쓰고 임베드 트리를 단독 컬렉션과 맞춥니다.
    fn write_course_tree(&mut self, mut course: CourseDocument, keep_created_at: bool) {
        if keep_created_at {
            if let Some(current) = self.courses.get(&course.id) {
                course.created_at = current.created_at;
            }
        }

        for module in std::mem::take(&mut course.modules) {
            self.upsert_module_tree(&course.id, module);
        }
        course.modules = self.modules_of(&course.id);

        self.courses.insert(course.id.clone(), course);
    }

    fn refresh_course_embed(&mut self, module_id: &str) {
        if let Some(module) = self.modules.get(module_id).cloned() {
            if let Some(course) = self.courses.get_mut(&module.course_id) {
                course.upsert_module(module);
            }
        }
    }

    fn courses_where(&self, predicate: impl Fn(&CourseDocument) -> bool) -> Vec<CourseDocument> {
        let mut found: Vec<_> = self.courses.values().filter(|c| predicate(c)).cloned().collect();
        found.sort_by_key(|c| Reverse(c.created_at.timestamp_millis()));
        found
    }
}

#[derive(Default)]
pub struct InMemoryCourseProgressRepository {
    collections: RwLock<Collections>,
}

impl InMemoryCourseProgressRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// 컬렉션별 문서 수 (courses, modules, lessons)
    pub async fn counts(&self) -> (usize, usize, usize) {
        let c = self.collections.read().await;
        (c.courses.len(), c.modules.len(), c.lessons.len())
    }
}

#[async_trait]
impl CourseProgressRepository for InMemoryCourseProgressRepository {
    async fn save(&self, course: CourseDocument) -> AppResult<()> {
        self.collections.write().await.write_course_tree(course, false);
        Ok(())
    }

    async fn update(&self, course: CourseDocument) -> AppResult<()> {
        self.collections.write().await.write_course_tree(course, true);
        Ok(())
    }

    async fn delete(&self, course_id: &str) -> AppResult<bool> {
        let mut c = self.collections.write().await;
        let deleted = c.courses.remove(course_id).is_some();
        c.modules.retain(|_, m| m.course_id != course_id);
        Ok(deleted)
    }

    async fn add_module(&self, course_id: &str, module: ModuleDocument) -> AppResult<()> {
        let mut c = self.collections.write().await;
        let merged = c.upsert_module_tree(course_id, module);

        match c.courses.get_mut(course_id) {
            Some(course) => course.upsert_module(merged),
            None => warn!("module={} 부모 course={} 가 아직 복제되지 않음", merged.id, course_id),
        }

        Ok(())
    }

    async fn update_module(&self, module: ModuleDocument) -> AppResult<()> {
        let course_id = module.course_id.clone();
        self.add_module(&course_id, module).await
    }

    async fn delete_module(&self, module_id: &str) -> AppResult<bool> {
        let mut c = self.collections.write().await;

        let existing = c.modules.get(module_id).cloned();

        c.lessons.retain(|_, l| l.module_id != module_id);
        c.modules.remove(module_id);

        if let Some(module) = &existing {
            if let Some(course) = c.courses.get_mut(&module.course_id) {
                course.remove_module(module_id);
            }
        }

        Ok(existing.is_some())
    }

    async fn add_lesson(&self, module_id: &str, mut lesson: LessonDocument) -> AppResult<()> {
        lesson.module_id = module_id.to_string();

        let mut c = self.collections.write().await;
        c.lessons.insert(lesson.id.clone(), lesson.clone());

        match c.modules.get_mut(module_id) {
            Some(module) => module.upsert_lesson(lesson),
            None => {
                warn!("lesson={} 부모 module={} 가 아직 복제되지 않음", lesson.id, module_id);
                return Ok(());
            }
        }

        c.refresh_course_embed(module_id);
        Ok(())
    }

    async fn update_lesson(&self, mut lesson: LessonDocument) -> AppResult<()> {
        let mut c = self.collections.write().await;

        let existing = c.lessons.get(&lesson.id).cloned();
        if let Some(current) = &existing {
            lesson.created_at = current.created_at;
        }
        c.lessons.insert(lesson.id.clone(), lesson.clone());

        if let Some(previous) = existing.filter(|e| e.module_id != lesson.module_id) {
            if let Some(module) = c.modules.get_mut(&previous.module_id) {
                module.remove_lesson(&lesson.id);
            }
            c.refresh_course_embed(&previous.module_id);
        }

        let module_id = lesson.module_id.clone();
        if let Some(module) = c.modules.get_mut(&module_id) {
            module.upsert_lesson(lesson);
            c.refresh_course_embed(&module_id);
        }

        Ok(())
    }

    async fn delete_lesson(&self, lesson_id: &str) -> AppResult<bool> {
        let mut c = self.collections.write().await;

        let Some(lesson) = c.lessons.remove(lesson_id) else {
            return Ok(false);
        };

        if let Some(module) = c.modules.get_mut(&lesson.module_id) {
            module.remove_lesson(lesson_id);
        }
        c.refresh_course_embed(&lesson.module_id);

        Ok(true)
    }

    async fn find_by_id(&self, course_id: &str) -> AppResult<Option<CourseDocument>> {
        Ok(self.collections.read().await.courses.get(course_id).cloned())
    }

    async fn find_all(&self, page: u64, limit: u64) -> AppResult<CoursePage> {
        let (page, limit) = normalize_page(page, limit);
        let c = self.collections.read().await;

        let all = c.courses_where(|_| true);
        let total = all.len() as u64;
        let items = all
            .into_iter()
            .skip(((page - 1) * limit) as usize)
            .take(limit as usize)
            .collect();

        Ok(CoursePage { items, total, page, limit })
    }

    async fn find_by_instructor(&self, instructor_id: &str) -> AppResult<Vec<CourseDocument>> {
        let c = self.collections.read().await;
        Ok(c.courses_where(|course| course.instructor_id == instructor_id))
    }

    async fn find_by_category(&self, category: &str) -> AppResult<Vec<CourseDocument>> {
        let c = self.collections.read().await;
        Ok(c.courses_where(|course| course.category == category))
    }

    async fn find_by_level(&self, level: &str) -> AppResult<Vec<CourseDocument>> {
        let c = self.collections.read().await;
        Ok(c.courses_where(|course| course.level == level))
    }

    async fn find_module_by_id(&self, module_id: &str) -> AppResult<Option<ModuleDocument>> {
        Ok(self.collections.read().await.modules.get(module_id).cloned())
    }

    async fn find_lesson_by_id(&self, lesson_id: &str) -> AppResult<Option<LessonDocument>> {
        Ok(self.collections.read().await.lessons.get(lesson_id).cloned())
    }

    async fn find_modules_by_course(&self, course_id: &str) -> AppResult<Vec<ModuleDocument>> {
        Ok(self.collections.read().await.modules_of(course_id))
    }

    async fn find_lessons_by_module(&self, module_id: &str) -> AppResult<Vec<LessonDocument>> {
        Ok(self.collections.read().await.lessons_of(module_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::DateTime;

    const COURSE: &str = "6f1c2a2e-1d7b-4a39-9a57-3f0f2b7b9c11";
    const MODULE_A: &str = "a3c5e9b0-52a4-4d3e-8a61-7d1f6f0c2b22";
    const MODULE_B: &str = "b4d6f0c1-63b5-4e4f-9b72-8e2a7a1d3c33";
    const LESSON_1: &str = "c5e7a1d2-74c6-4f5a-8c83-9f3b8b2e4d44";
    const LESSON_2: &str = "d6f8b2e3-85d7-4a6b-9d94-a04c9c3f5e55";

    fn course(id: &str, created_ms: i64) -> CourseDocument {
        CourseDocument {
            id: id.to_string(),
            name: "Go Basics".to_string(),
            category: "PROGRAMMING".to_string(),
            level: "BEGINNER".to_string(),
            instructor_id: "i1".to_string(),
            thumbnail_url: String::new(),
            language: "EN".to_string(),
            modules: vec![],
            created_at: DateTime::from_millis(created_ms),
            updated_at: DateTime::from_millis(created_ms),
        }
    }

    fn module(id: &str, order_number: i32) -> ModuleDocument {
        ModuleDocument {
            id: id.to_string(),
            course_id: COURSE.to_string(),
            title: format!("module {}", order_number),
            order_number,
            lessons: vec![],
            created_at: DateTime::from_millis(0),
            updated_at: DateTime::from_millis(0),
        }
    }

    fn lesson(id: &str, module_id: &str, order_number: i32) -> LessonDocument {
        LessonDocument {
            id: id.to_string(),
            module_id: module_id.to_string(),
            title: format!("lesson {}", order_number),
            content: "body".to_string(),
            content_type: "TEXT".to_string(),
            duration_minutes: 10,
            order_number,
            created_at: DateTime::from_millis(0),
            updated_at: DateTime::from_millis(0),
        }
    }

    async fn seeded() -> InMemoryCourseProgressRepository {
        let repo = InMemoryCourseProgressRepository::new();
        repo.save(course(COURSE, 1_000)).await.unwrap();
        repo.add_module(COURSE, module(MODULE_A, 1)).await.unwrap();
        repo.add_module(COURSE, module(MODULE_B, 2)).await.unwrap();
        repo.add_lesson(MODULE_A, lesson(LESSON_1, MODULE_A, 1)).await.unwrap();
        repo.add_lesson(MODULE_A, lesson(LESSON_2, MODULE_A, 2)).await.unwrap();
        repo
    }

    #[tokio::test]
    async fn test_save_twice_keeps_single_document_with_latest_values() {
        let repo = InMemoryCourseProgressRepository::new();
        repo.save(course(COURSE, 1_000)).await.unwrap();

        let mut renamed = course(COURSE, 1_000);
        renamed.name = "Go Advanced".to_string();
        repo.save(renamed).await.unwrap();

        let page = repo.find_all(1, 10).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].name, "Go Advanced");
    }

    #[tokio::test]
    async fn test_add_module_twice_does_not_duplicate_embedded_element() {
        let repo = seeded().await;
        repo.add_module(COURSE, module(MODULE_A, 1)).await.unwrap();

        let stored = repo.find_by_id(COURSE).await.unwrap().unwrap();
        assert_eq!(stored.modules.len(), 2);
        assert_eq!(repo.find_modules_by_course(COURSE).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_add_lesson_updates_module_and_nested_course_copy() {
        let repo = seeded().await;

        let module = repo.find_module_by_id(MODULE_A).await.unwrap().unwrap();
        assert_eq!(module.lessons.len(), 2);

        let course = repo.find_by_id(COURSE).await.unwrap().unwrap();
        assert_eq!(course.module(MODULE_A).unwrap().lessons.len(), 2);
    }

    #[tokio::test]
    async fn test_update_module_preserves_lessons() {
        let repo = seeded().await;

        let mut renamed = module(MODULE_A, 3);
        renamed.title = "Renamed".to_string();
        repo.update_module(renamed).await.unwrap();

        let stored = repo.find_module_by_id(MODULE_A).await.unwrap().unwrap();
        assert_eq!(stored.title, "Renamed");
        assert_eq!(stored.lessons.len(), 2);

        let course = repo.find_by_id(COURSE).await.unwrap().unwrap();
        let ids: Vec<_> = course.modules.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec![MODULE_B, MODULE_A]);
        assert_eq!(course.module(MODULE_A).unwrap().title, "Renamed");
    }

    #[tokio::test]
    async fn test_delete_module_cascades_to_lessons_and_course_array() {
        let repo = seeded().await;

        assert!(repo.delete_module(MODULE_A).await.unwrap());

        assert!(repo.find_module_by_id(MODULE_A).await.unwrap().is_none());
        assert!(repo.find_lessons_by_module(MODULE_A).await.unwrap().is_empty());

        let course = repo.find_by_id(COURSE).await.unwrap().unwrap();
        assert_eq!(course.modules.len(), 1);
        assert_eq!(course.modules[0].id, MODULE_B);
        assert!(repo.find_module_by_id(MODULE_B).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_delete_course_removes_modules_but_keeps_lessons() {
        let repo = seeded().await;

        assert!(repo.delete(COURSE).await.unwrap());

        assert!(repo.find_by_id(COURSE).await.unwrap().is_none());
        assert!(repo.find_modules_by_course(COURSE).await.unwrap().is_empty());
        assert_eq!(repo.find_lessons_by_module(MODULE_A).await.unwrap().len(), 2);
        assert_eq!(repo.counts().await, (0, 0, 2));
    }

    #[tokio::test]
    async fn test_lesson_for_unknown_module_is_orphaned() {
        let repo = InMemoryCourseProgressRepository::new();
        repo.save(course(COURSE, 1_000)).await.unwrap();

        repo.add_lesson(MODULE_A, lesson(LESSON_1, MODULE_A, 1)).await.unwrap();

        assert_eq!(repo.counts().await, (1, 0, 1));
        let course = repo.find_by_id(COURSE).await.unwrap().unwrap();
        assert!(course.modules.is_empty());
    }

    #[tokio::test]
    async fn test_orphan_lesson_is_embedded_when_its_module_arrives() {
        let repo = InMemoryCourseProgressRepository::new();
        repo.save(course(COURSE, 1_000)).await.unwrap();
        repo.add_lesson(MODULE_A, lesson(LESSON_1, MODULE_A, 1)).await.unwrap();

        repo.add_module(COURSE, module(MODULE_A, 1)).await.unwrap();

        let course = repo.find_by_id(COURSE).await.unwrap().unwrap();
        assert_eq!(course.module(MODULE_A).unwrap().lessons[0].id, LESSON_1);
    }

    #[tokio::test]
    async fn test_course_update_without_modules_keeps_replicated_modules() {
        let repo = InMemoryCourseProgressRepository::new();
        repo.save(course(COURSE, 1_000)).await.unwrap();
        repo.add_module(COURSE, module(MODULE_A, 1)).await.unwrap();

        let mut renamed = course(COURSE, 9_000);
        renamed.name = "Go Advanced".to_string();
        repo.update(renamed).await.unwrap();

        let stored = repo.find_by_id(COURSE).await.unwrap().unwrap();
        assert_eq!(stored.name, "Go Advanced");
        assert_eq!(stored.created_at, DateTime::from_millis(1_000));
        assert_eq!(stored.updated_at, DateTime::from_millis(9_000));
        assert_eq!(stored.modules.len(), 1);
        assert_eq!(stored.modules[0].id, MODULE_A);
        assert_eq!(repo.counts().await, (1, 1, 0));
    }

    #[tokio::test]
    async fn test_course_update_keeps_nested_lessons() {
        let repo = seeded().await;

        repo.update(course(COURSE, 5_000)).await.unwrap();

        let stored = repo.find_by_id(COURSE).await.unwrap().unwrap();
        assert_eq!(stored.modules.len(), 2);
        assert_eq!(stored.module(MODULE_A).unwrap().lessons.len(), 2);
    }

    #[tokio::test]
    async fn test_course_create_with_tree_writes_standalone_documents() {
        let repo = InMemoryCourseProgressRepository::new();

        let mut tree = course(COURSE, 1_000);
        let mut first = module(MODULE_A, 1);
        first.course_id = String::new();
        first.lessons.push(lesson(LESSON_1, "", 1));
        tree.modules.push(first);
        repo.save(tree).await.unwrap();

        assert_eq!(repo.counts().await, (1, 1, 1));
        let stored_module = repo.find_module_by_id(MODULE_A).await.unwrap().unwrap();
        assert_eq!(stored_module.course_id, COURSE);
        let stored_lesson = repo.find_lesson_by_id(LESSON_1).await.unwrap().unwrap();
        assert_eq!(stored_lesson.module_id, MODULE_A);

        assert!(repo.delete_module(MODULE_A).await.unwrap());

        let stored = repo.find_by_id(COURSE).await.unwrap().unwrap();
        assert!(stored.modules.is_empty());
        assert_eq!(repo.counts().await, (1, 0, 0));
    }

    #[tokio::test]
    async fn test_update_lesson_keeps_created_at() {
        let repo = InMemoryCourseProgressRepository::new();
        repo.save(course(COURSE, 1_000)).await.unwrap();
        repo.add_module(COURSE, module(MODULE_A, 1)).await.unwrap();

        let mut created = lesson(LESSON_1, MODULE_A, 1);
        created.created_at = DateTime::from_millis(2_000);
        repo.add_lesson(MODULE_A, created).await.unwrap();

        let mut edited = lesson(LESSON_1, MODULE_A, 1);
        edited.title = "Edited".to_string();
        edited.created_at = DateTime::from_millis(7_000);
        edited.updated_at = DateTime::from_millis(7_000);
        repo.update_lesson(edited).await.unwrap();

        let stored = repo.find_lesson_by_id(LESSON_1).await.unwrap().unwrap();
        assert_eq!(stored.title, "Edited");
        assert_eq!(stored.created_at, DateTime::from_millis(2_000));
        assert_eq!(stored.updated_at, DateTime::from_millis(7_000));

        let course = repo.find_by_id(COURSE).await.unwrap().unwrap();
        let embedded = &course.module(MODULE_A).unwrap().lessons[0];
        assert_eq!(embedded.created_at, DateTime::from_millis(2_000));
    }

    #[tokio::test]
    async fn test_module_moved_to_another_course_leaves_old_array() {
        let other = "e7a9c3f4-96e8-4b7c-8ea5-b15d0d4a6f66";
        let repo = seeded().await;
        repo.save(course(other, 2_000)).await.unwrap();

        let mut moved = module(MODULE_A, 1);
        moved.course_id = other.to_string();
        repo.update_module(moved).await.unwrap();

        let old = repo.find_by_id(COURSE).await.unwrap().unwrap();
        assert!(old.module(MODULE_A).is_none());

        let new = repo.find_by_id(other).await.unwrap().unwrap();
        assert_eq!(new.module(MODULE_A).unwrap().lessons.len(), 2);
    }

    #[tokio::test]
    async fn test_lesson_moved_to_another_module_leaves_old_array() {
        let repo = seeded().await;

        repo.update_lesson(lesson(LESSON_1, MODULE_B, 1)).await.unwrap();

        let course = repo.find_by_id(COURSE).await.unwrap().unwrap();
        let old_ids: Vec<_> = course.module(MODULE_A).unwrap().lessons.iter().map(|l| l.id.as_str()).collect();
        assert_eq!(old_ids, vec![LESSON_2]);
        assert_eq!(course.module(MODULE_B).unwrap().lessons[0].id, LESSON_1);
        assert_eq!(repo.find_lessons_by_module(MODULE_B).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_lesson_updates_both_parents() {
        let repo = seeded().await;

        assert!(repo.delete_lesson(LESSON_1).await.unwrap());

        let module = repo.find_module_by_id(MODULE_A).await.unwrap().unwrap();
        assert_eq!(module.lessons.len(), 1);
        assert_eq!(module.lessons[0].id, LESSON_2);

        let course = repo.find_by_id(COURSE).await.unwrap().unwrap();
        assert_eq!(course.module(MODULE_A).unwrap().lessons.len(), 1);
    }

    #[tokio::test]
    async fn test_deleting_absent_ids_is_not_an_error() {
        let repo = InMemoryCourseProgressRepository::new();
        assert!(!repo.delete(COURSE).await.unwrap());
        assert!(!repo.delete_module(MODULE_A).await.unwrap());
        assert!(!repo.delete_lesson(LESSON_1).await.unwrap());
    }

    #[tokio::test]
    async fn test_find_all_pages_by_created_at_desc() {
        let repo = InMemoryCourseProgressRepository::new();
        let ids = [
            "00000000-0000-4000-8000-000000000001",
            "00000000-0000-4000-8000-000000000002",
            "00000000-0000-4000-8000-000000000003",
        ];
        for (i, id) in ids.iter().enumerate() {
            repo.save(course(id, (i as i64 + 1) * 1_000)).await.unwrap();
        }

        let first = repo.find_all(1, 2).await.unwrap();
        assert_eq!(first.total, 3);
        assert_eq!(first.items.len(), 2);
        assert_eq!(first.items[0].id, ids[2]);
        assert_eq!(first.items[1].id, ids[1]);

        let second = repo.find_all(2, 2).await.unwrap();
        assert_eq!(second.items.len(), 1);
        assert_eq!(second.items[0].id, ids[0]);
    }

    #[tokio::test]
    async fn test_find_by_filters() {
        let repo = InMemoryCourseProgressRepository::new();
        repo.save(course(COURSE, 1_000)).await.unwrap();

        let mut other = course("00000000-0000-4000-8000-000000000009", 2_000);
        other.instructor_id = "i2".to_string();
        other.category = "DESIGN".to_string();
        other.level = "ADVANCED".to_string();
        repo.save(other).await.unwrap();

        assert_eq!(repo.find_by_instructor("i1").await.unwrap().len(), 1);
        assert_eq!(repo.find_by_category("DESIGN").await.unwrap().len(), 1);
        assert_eq!(repo.find_by_level("BEGINNER").await.unwrap()[0].id, COURSE);
        assert!(repo.find_by_level("EXPERT").await.unwrap().is_empty());
    }
}
