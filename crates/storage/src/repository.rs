use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lesson_core::model::{Lesson, LessonId, LessonProgress, SectionId, UserId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl StorageError {
    /// Whether retrying the same call may succeed.
    ///
    /// A `Conflict` is a refused write; resending the same payload meets the
    /// same refusal.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, StorageError::Connection(_))
    }
}

/// Read-only source of authored lessons.
#[async_trait]
pub trait LessonCatalog: Send + Sync {
    /// Fetch a lesson by ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn get_lesson(&self, id: &LessonId) -> Result<Arc<Lesson>, StorageError>;

    /// Lessons of a section ordered by `order`. Unknown sections are empty.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the catalog cannot be read.
    async fn list_lessons_by_section(
        &self,
        section_id: &SectionId,
    ) -> Result<Vec<Arc<Lesson>>, StorageError>;

    /// Every section that holds at least one lesson, sorted by id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the catalog cannot be read.
    async fn list_sections(&self) -> Result<Vec<SectionId>, StorageError>;
}

/// Durable per-user progress records.
#[async_trait]
pub trait ProgressRepository: Send + Sync {
    /// Load a user's progress. Users without a record get an empty one
    /// stamped with `now`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the record cannot be read or decoded.
    async fn load_progress(
        &self,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> Result<LessonProgress, StorageError>;

    /// Replace the stored record for `progress.user_id()` as a whole.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the record cannot be stored.
    async fn save_progress(&self, progress: &LessonProgress) -> Result<(), StorageError>;
}

/// In-memory catalog and progress store for tests and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    lessons: Arc<Mutex<HashMap<LessonId, Arc<Lesson>>>>,
    progress: Arc<Mutex<HashMap<UserId, LessonProgress>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Repository preloaded with `lessons`.
    #[must_use]
    pub fn with_lessons(lessons: impl IntoIterator<Item = Lesson>) -> Self {
        let map = lessons
            .into_iter()
            .map(|lesson| (lesson.id().clone(), Arc::new(lesson)))
            .collect();
        Self {
            lessons: Arc::new(Mutex::new(map)),
            progress: Arc::default(),
        }
    }

    /// Add or replace a lesson.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the lock is poisoned.
    pub fn insert_lesson(&self, lesson: Lesson) -> Result<(), StorageError> {
        let mut guard = self
            .lessons
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert(lesson.id().clone(), Arc::new(lesson));
        Ok(())
    }
}

#[async_trait]
impl LessonCatalog for InMemoryRepository {
    async fn get_lesson(&self, id: &LessonId) -> Result<Arc<Lesson>, StorageError> {
        let guard = self
            .lessons
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.get(id).cloned().ok_or(StorageError::NotFound)
    }

    async fn list_lessons_by_section(
        &self,
        section_id: &SectionId,
    ) -> Result<Vec<Arc<Lesson>>, StorageError> {
        let guard = self
            .lessons
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let mut found: Vec<_> = guard
            .values()
            .filter(|l| l.section_id() == section_id)
            .cloned()
            .collect();
        found.sort_by_key(|l| l.order());
        Ok(found)
    }

    async fn list_sections(&self) -> Result<Vec<SectionId>, StorageError> {
        let guard = self
            .lessons
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let mut sections: Vec<_> = guard.values().map(|l| l.section_id().clone()).collect();
        sections.sort();
        sections.dedup();
        Ok(sections)
    }
}

#[async_trait]
impl ProgressRepository for InMemoryRepository {
    async fn load_progress(
        &self,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> Result<LessonProgress, StorageError> {
        let guard = self
            .progress
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard
            .get(user_id)
            .cloned()
            .unwrap_or_else(|| LessonProgress::new(user_id.clone(), now)))
    }

    async fn save_progress(&self, progress: &LessonProgress) -> Result<(), StorageError> {
        let mut guard = self
            .progress
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert(progress.user_id().clone(), progress.clone());
        Ok(())
    }
}

/// Aggregates the catalog and progress store behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub catalog: Arc<dyn LessonCatalog>,
    pub progress: Arc<dyn ProgressRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_repository(InMemoryRepository::new())
    }

    /// Use one in-memory repository for both roles.
    #[must_use]
    pub fn from_repository(repo: InMemoryRepository) -> Self {
        let catalog: Arc<dyn LessonCatalog> = Arc::new(repo.clone());
        let progress: Arc<dyn ProgressRepository> = Arc::new(repo);
        Self { catalog, progress }
    }

    /// Combine any catalog with any progress store.
    #[must_use]
    pub fn new(catalog: Arc<dyn LessonCatalog>, progress: Arc<dyn ProgressRepository>) -> Self {
        Self { catalog, progress }
    }
}
