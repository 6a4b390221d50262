use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::RwLock;
use crate::admin::{CourseQuery, FilterChoices};

/// A course in the catalogue, owned by one partner on one site.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Course {
    /// Course key, e.g. `course-v1:edX+DemoX+Demo_Course`.
    pub id: String,
    pub name: String,
    /// Partner short code.
    pub partner: String,
    /// Site domain.
    pub site: String,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
}

impl Course {
    pub fn new(id: &str, name: &str, partner: &str, site: &str) -> Self {
        let now = Utc::now();
        Self {
            id: id.to_string(),
            name: name.to_string(),
            partner: partner.to_string(),
            site: site.to_string(),
            created: now,
            modified: now,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Course not found: {0}")]
    NotFound(String),

    #[error("Invalid course query: {0}")]
    InvalidQuery(String),

    #[error("Course storage failed: {0}")]
    Storage(String),
}

/// Read access to courses for the admin listing.
#[async_trait]
pub trait CourseRepository: Send + Sync {
    async fn get_course(&self, id: &str) -> Result<Option<Course>, CatalogError>;

    /// Returns the matching page and the total number of matches.
    async fn list_courses(&self, query: &CourseQuery) -> Result<(Vec<Course>, u64), CatalogError>;

    async fn filter_choices(&self) -> Result<FilterChoices, CatalogError>;
}

/// Course store kept in process memory, ordered by course key.
#[derive(Default)]
pub struct InMemoryCourseRepository {
    courses: RwLock<BTreeMap<String, Course>>,
}

impl InMemoryCourseRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_courses(courses: Vec<Course>) -> Self {
        let repo = Self::new();
        for course in courses {
            repo.insert(course);
        }
        repo
    }

    pub fn insert(&self, course: Course) {
        if let Ok(mut courses) = self.courses.write() {
            courses.insert(course.id.clone(), course);
        }
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, BTreeMap<String, Course>>, CatalogError> {
        self.courses
            .read()
            .map_err(|_| CatalogError::Storage("course store lock poisoned".to_string()))
    }
}

#[async_trait]
impl CourseRepository for InMemoryCourseRepository {
    async fn get_course(&self, id: &str) -> Result<Option<Course>, CatalogError> {
        Ok(self.read()?.get(id).cloned())
    }

    async fn list_courses(&self, query: &CourseQuery) -> Result<(Vec<Course>, u64), CatalogError> {
        query.validate()?;
        let courses = self.read()?;
        let matching: Vec<&Course> = courses.values().filter(|c| query.matches(c)).collect();
        let total = matching.len() as u64;

        let page = matching
            .into_iter()
            .skip(query.offset() as usize)
            .take(query.limit() as usize)
            .cloned()
            .collect();

        Ok((page, total))
    }

    async fn filter_choices(&self) -> Result<FilterChoices, CatalogError> {
        let courses = self.read()?;
        Ok(FilterChoices::from_catalogs(courses.values()))
    }
}
