use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use crate::course::{Course, CatalogError, CourseRepository};

const DEFAULT_PAGE_SIZE: u32 = 100;
const MAX_PAGE_SIZE: u32 = 1000;

/// Admin listing configuration for courses.
pub struct CourseAdmin;

impl CourseAdmin {
    pub const LIST_DISPLAY: [&'static str; 4] = ["id", "name", "partner", "site"];
    pub const SEARCH_FIELDS: [&'static str; 4] = ["id", "name", "partner", "site"];
    pub const LIST_FILTER: [&'static str; 2] = ["site", "partner"];

    /// Runs a query and shapes the result as admin rows.
    pub async fn changelist(
        repo: &dyn CourseRepository,
        query: &CourseQuery,
    ) -> Result<CourseListPage, CatalogError> {
        query.validate()?;
        let (courses, count) = repo.list_courses(query).await?;
        let page_size = query.limit() as u64;

        Ok(CourseListPage {
            results: courses.iter().map(CourseRow::from).collect(),
            count,
            page: query.page(),
            num_pages: count.div_ceil(page_size).max(1) as u32,
        })
    }
}

/// Search and filter parameters of the course changelist.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CourseQuery {
    /// Case-insensitive substring matched against every search field.
    pub q: Option<String>,
    pub site: Option<String>,
    pub partner: Option<String>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

impl CourseQuery {
    pub fn search(term: &str) -> Self {
        Self { q: Some(term.to_string()), ..Default::default() }
    }

    pub fn validate(&self) -> Result<(), CatalogError> {
        if self.page == Some(0) {
            return Err(CatalogError::InvalidQuery("page starts at 1".to_string()));
        }
        if let Some(size) = self.page_size {
            if size == 0 || size > MAX_PAGE_SIZE {
                return Err(CatalogError::InvalidQuery(format!(
                    "page_size must be between 1 and {}",
                    MAX_PAGE_SIZE
                )));
            }
        }
        Ok(())
    }

    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn limit(&self) -> u32 {
        self.page_size.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
    }

    pub fn offset(&self) -> u64 {
        (self.page() as u64 - 1) * self.limit() as u64
    }

    /// Search term trimmed, `None` when blank.
    pub fn term(&self) -> Option<&str> {
        self.q.as_deref().map(str::trim).filter(|t| !t.is_empty())
    }

    pub fn matches(&self, course: &Course) -> bool {
        if let Some(site) = &self.site {
            if &course.site != site {
                return false;
            }
        }
        if let Some(partner) = &self.partner {
            if &course.partner != partner {
                return false;
            }
        }

        match self.term() {
            None => true,
            Some(term) => {
                let needle = term.to_lowercase();
                [&course.id, &course.name, &course.partner, &course.site]
                    .iter()
                    .any(|field| field.to_lowercase().contains(&needle))
            }
        }
    }
}

/// One changelist row, the `LIST_DISPLAY` columns.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CourseRow {
    pub id: String,
    pub name: String,
    pub partner: String,
    pub site: String,
}

impl From<&Course> for CourseRow {
    fn from(course: &Course) -> Self {
        Self {
            id: course.id.clone(),
            name: course.name.clone(),
            partner: course.partner.clone(),
            site: course.site.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseListPage {
    pub results: Vec<CourseRow>,
    pub count: u64,
    pub page: u32,
    pub num_pages: u32,
}

/// Distinct values offered by the `LIST_FILTER` sidebar.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FilterChoices {
    pub sites: Vec<String>,
    pub partners: Vec<String>,
}

impl FilterChoices {
    pub fn from_catalogs<'a>(courses: impl Iterator<Item = &'a Course>) -> Self {
        let mut sites = BTreeSet::new();
        let mut partners = BTreeSet::new();
        for course in courses {
            sites.insert(course.site.clone());
            partners.insert(course.partner.clone());
        }
        Self {
            sites: sites.into_iter().collect(),
            partners: partners.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::course::InMemoryCourseRepository;

    fn repo() -> InMemoryCourseRepository {
        InMemoryCourseRepository::with_courses(vec![
            Course::new("course-v1:edX+DemoX+Demo", "Demo Course", "edx", "shop.edx.org"),
            Course::new("course-v1:MITx+6.002x+2024", "Circuits and Electronics", "mitx", "shop.edx.org"),
            Course::new("course-v1:edX+Py101+2024", "Intro to Python", "edx", "business.edx.org"),
        ])
    }

    #[tokio::test]
    async fn test_search_is_case_insensitive_over_all_fields() {
        let repo = repo();

        let page = CourseAdmin::changelist(&repo, &CourseQuery::search("circuits")).await.unwrap();
        assert_eq!(page.count, 1);
        assert_eq!(page.results[0].partner, "mitx");

        let page = CourseAdmin::changelist(&repo, &CourseQuery::search("BUSINESS")).await.unwrap();
        assert_eq!(page.count, 1);
        assert_eq!(page.results[0].id, "course-v1:edX+Py101+2024");

        let page = CourseAdmin::changelist(&repo, &CourseQuery::search("edx")).await.unwrap();
        assert_eq!(page.count, 3);
    }

    #[tokio::test]
    async fn test_filters_are_exact() {
        let repo = repo();
        let query = CourseQuery {
            site: Some("shop.edx.org".to_string()),
            partner: Some("edx".to_string()),
            ..Default::default()
        };

        let page = CourseAdmin::changelist(&repo, &query).await.unwrap();
        assert_eq!(page.count, 1);
        assert_eq!(page.results[0].name, "Demo Course");

        let query = CourseQuery { partner: Some("ed".to_string()), ..Default::default() };
        assert_eq!(CourseAdmin::changelist(&repo, &query).await.unwrap().count, 0);
    }

    #[tokio::test]
    async fn test_pagination() {
        let repo = repo();
        let query = CourseQuery { page: Some(2), page_size: Some(2), ..Default::default() };

        let page = CourseAdmin::changelist(&repo, &query).await.unwrap();
        assert_eq!(page.count, 3);
        assert_eq!(page.num_pages, 2);
        assert_eq!(page.results.len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_page_rejected() {
        let repo = repo();
        let query = CourseQuery { page: Some(0), ..Default::default() };
        assert!(matches!(
            CourseAdmin::changelist(&repo, &query).await,
            Err(CatalogError::InvalidQuery(_))
        ));
    }

    #[tokio::test]
    async fn test_filter_choices_are_distinct_and_sorted() {
        let choices = repo().filter_choices().await.unwrap();
        assert_eq!(choices.sites, vec!["business.edx.org", "shop.edx.org"]);
        assert_eq!(choices.partners, vec!["edx", "mitx"]);
    }

    #[test]
    fn test_blank_search_matches_everything() {
        let course = Course::new("c", "n", "p", "s");
        assert!(CourseQuery::search("   ").matches(&course));
    }
}
