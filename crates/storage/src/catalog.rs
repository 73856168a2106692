//! Lesson catalog backed by authored JSON documents.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use lesson_core::model::{Lesson, LessonId, SectionId};
use thiserror::Error;
use tracing::{debug, info};

use crate::repository::{LessonCatalog, StorageError};

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CatalogError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid lesson in {origin}: {source}")]
    Parse {
        origin: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("lesson {id} is defined twice")]
    DuplicateLesson { id: LessonId },

    #[error("section {section} has two lessons at order {order}")]
    DuplicateOrder { section: SectionId, order: u32 },

    #[error("section {section} skips order {expected} (next is {found})")]
    OrderGap {
        section: SectionId,
        expected: u32,
        found: u32,
    },
}

/// Immutable catalog loaded once from lesson JSON.
///
/// Within a section, `order` values must run `1..=n` without gaps.
#[derive(Debug, Clone, Default)]
pub struct JsonCatalog {
    lessons: HashMap<LessonId, Arc<Lesson>>,
    sections: BTreeMap<SectionId, Vec<Arc<Lesson>>>,
}

impl JsonCatalog {
    /// Load every `*.json` file in `dir`.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` if a file cannot be read or parsed, or the
    /// lessons do not form valid sections.
    pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let dir = dir.as_ref();
        let io = |source| CatalogError::Io {
            path: dir.to_path_buf(),
            source,
        };

        let mut paths = Vec::new();
        for entry in std::fs::read_dir(dir).map_err(io)? {
            let path = entry.map_err(io)?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                paths.push(path);
            }
        }
        paths.sort();

        let mut lessons = Vec::with_capacity(paths.len());
        for path in paths {
            let raw = std::fs::read_to_string(&path).map_err(|source| CatalogError::Io {
                path: path.clone(),
                source,
            })?;
            let lesson = parse(&raw, &path.display().to_string())?;
            debug!(lesson = %lesson.id(), path = %path.display(), "loaded lesson");
            lessons.push(lesson);
        }

        let catalog = Self::from_lessons(lessons)?;
        info!(
            lessons = catalog.len(),
            sections = catalog.sections.len(),
            dir = %dir.display(),
            "lesson catalog loaded"
        );
        Ok(catalog)
    }

    /// Parse lessons from JSON documents already in memory.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` on parse failures or invalid sections.
    pub fn from_json_strs<'a>(docs: impl IntoIterator<Item = &'a str>) -> Result<Self, CatalogError> {
        let lessons = docs
            .into_iter()
            .enumerate()
            .map(|(i, raw)| parse(raw, &format!("document #{i}")))
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_lessons(lessons)
    }

    /// Index validated lessons.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` for duplicate ids or broken section ordering.
    pub fn from_lessons(lessons: impl IntoIterator<Item = Lesson>) -> Result<Self, CatalogError> {
        let mut by_id = HashMap::new();
        let mut sections: BTreeMap<SectionId, Vec<Arc<Lesson>>> = BTreeMap::new();

        for lesson in lessons {
            let lesson = Arc::new(lesson);
            if by_id.insert(lesson.id().clone(), Arc::clone(&lesson)).is_some() {
                return Err(CatalogError::DuplicateLesson {
                    id: lesson.id().clone(),
                });
            }
            sections
                .entry(lesson.section_id().clone())
                .or_default()
                .push(lesson);
        }

        for (section, lessons) in &mut sections {
            lessons.sort_by_key(|l| l.order());
            check_order(section, lessons)?;
        }

        Ok(Self {
            lessons: by_id,
            sections,
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lessons.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lessons.is_empty()
    }

    /// All lessons, grouped by section and sorted by order.
    pub fn lessons(&self) -> impl Iterator<Item = &Arc<Lesson>> {
        self.sections.values().flatten()
    }
}

fn parse(raw: &str, origin: &str) -> Result<Lesson, CatalogError> {
    serde_json::from_str(raw).map_err(|source| CatalogError::Parse {
        origin: origin.to_string(),
        source,
    })
}

fn check_order(section: &SectionId, sorted: &[Arc<Lesson>]) -> Result<(), CatalogError> {
    let mut expected = 1;
    for lesson in sorted {
        match lesson.order() {
            o if o == expected => expected += 1,
            o if o + 1 == expected => {
                return Err(CatalogError::DuplicateOrder {
                    section: section.clone(),
                    order: o,
                });
            }
            found => {
                return Err(CatalogError::OrderGap {
                    section: section.clone(),
                    expected,
                    found,
                });
            }
        }
    }
    Ok(())
}

#[async_trait]
impl LessonCatalog for JsonCatalog {
    async fn get_lesson(&self, id: &LessonId) -> Result<Arc<Lesson>, StorageError> {
        self.lessons.get(id).cloned().ok_or(StorageError::NotFound)
    }

    async fn list_lessons_by_section(
        &self,
        section_id: &SectionId,
    ) -> Result<Vec<Arc<Lesson>>, StorageError> {
        Ok(self.sections.get(section_id).cloned().unwrap_or_default())
    }

    async fn list_sections(&self) -> Result<Vec<SectionId>, StorageError> {
        Ok(self.sections.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GENESIS_1: &str = include_str!("../../../fixtures/lessons/genesis-1.json");
    const GENESIS_2: &str = include_str!("../../../fixtures/lessons/genesis-2.json");

    fn fixtures_dir() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("../../fixtures/lessons")
    }

    fn retitled(raw: &str, id: &str, order: u32) -> String {
        let mut value: serde_json::Value = serde_json::from_str(raw).unwrap();
        value["id"] = id.into();
        value["order"] = order.into();
        value.to_string()
    }

    #[tokio::test]
    async fn loads_fixture_directory() {
        let catalog = JsonCatalog::from_dir(fixtures_dir()).unwrap();
        assert_eq!(catalog.len(), 2);

        let section = catalog
            .list_lessons_by_section(&"genesis-creation".into())
            .await
            .unwrap();
        let ids: Vec<_> = section.iter().map(|l| l.id().as_str()).collect();
        assert_eq!(ids, ["genesis-1", "genesis-2"]);

        let lesson = catalog.get_lesson(&"genesis-1".into()).await.unwrap();
        assert_eq!(lesson.estimated_minutes(), 16);
    }

    #[test]
    fn duplicate_order_is_rejected() {
        let clash = retitled(GENESIS_2, "genesis-2b", 2);
        let err = JsonCatalog::from_json_strs([GENESIS_1, GENESIS_2, clash.as_str()]).unwrap_err();
        assert!(matches!(err, CatalogError::DuplicateOrder { order: 2, .. }));
    }

    #[test]
    fn order_gap_is_rejected() {
        let far = retitled(GENESIS_2, "genesis-9", 4);
        let err = JsonCatalog::from_json_strs([GENESIS_1, far.as_str()]).unwrap_err();
        assert!(matches!(
            err,
            CatalogError::OrderGap {
                expected: 2,
                found: 4,
                ..
            }
        ));
    }

    #[test]
    fn duplicate_id_is_rejected() {
        let err = JsonCatalog::from_json_strs([GENESIS_1, GENESIS_1]).unwrap_err();
        assert!(matches!(err, CatalogError::DuplicateLesson { .. }));
    }

    #[test]
    fn malformed_lesson_reports_origin() {
        let err = JsonCatalog::from_json_strs([GENESIS_1, "{ \"id\": 1 }"]).unwrap_err();
        assert!(err.to_string().contains("document #1"));
    }

    #[tokio::test]
    async fn unknown_section_is_empty() {
        let catalog = JsonCatalog::from_json_strs([GENESIS_1]).unwrap();
        let listed = catalog
            .list_lessons_by_section(&"exodus".into())
            .await
            .unwrap();
        assert!(listed.is_empty());
        assert_eq!(catalog.list_sections().await.unwrap().len(), 1);
    }
}
