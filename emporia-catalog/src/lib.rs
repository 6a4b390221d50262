pub mod admin;
pub mod course;

pub use admin::{CourseAdmin, CourseListPage, CourseQuery, CourseRow, FilterChoices};
pub use course::{Course, CatalogError, CourseRepository, InMemoryCourseRepository};
