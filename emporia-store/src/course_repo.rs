use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};
use emporia_catalog::{Course, CatalogError, CourseQuery, CourseRepository, FilterChoices};

#[derive(sqlx::FromRow)]
struct CourseRow {
    id: String,
    name: String,
    partner: String,
    site: String,
    created: DateTime<Utc>,
    modified: DateTime<Utc>,
}

impl From<CourseRow> for Course {
    fn from(row: CourseRow) -> Self {
        Course {
            id: row.id,
            name: row.name,
            partner: row.partner,
            site: row.site,
            created: row.created,
            modified: row.modified,
        }
    }
}

fn storage(e: sqlx::Error) -> CatalogError {
    CatalogError::Storage(e.to_string())
}

/// Escapes LIKE wildcards so the search term matches literally.
fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

/// Appends the WHERE clause shared by the page and count queries.
fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, query: &CourseQuery) {
    builder.push(" WHERE TRUE");
    if let Some(site) = &query.site {
        builder.push(" AND site = ").push_bind(site.clone());
    }
    if let Some(partner) = &query.partner {
        builder.push(" AND partner = ").push_bind(partner.clone());
    }
    if let Some(term) = query.term() {
        let pattern = like_pattern(term);
        builder.push(" AND (");
        for (i, field) in ["id", "name", "partner", "site"].iter().enumerate() {
            if i > 0 {
                builder.push(" OR ");
            }
            builder.push(*field).push(" ILIKE ").push_bind(pattern.clone());
        }
        builder.push(")");
    }
}

pub struct PostgresCourseRepository {
    pub pool: PgPool,
}

#[async_trait]
impl CourseRepository for PostgresCourseRepository {
    async fn get_course(&self, id: &str) -> Result<Option<Course>, CatalogError> {
        let row = sqlx::query_as::<_, CourseRow>(
            "SELECT id, name, partner, site, created, modified FROM courses WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage)?;

        Ok(row.map(Course::from))
    }

    async fn list_courses(&self, query: &CourseQuery) -> Result<(Vec<Course>, u64), CatalogError> {
        query.validate()?;

        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM courses");
        push_filters(&mut count, query);
        let total: i64 = count
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .map_err(storage)?;

        let mut page = QueryBuilder::<Postgres>::new(
            "SELECT id, name, partner, site, created, modified FROM courses",
        );
        push_filters(&mut page, query);
        page.push(" ORDER BY id LIMIT ")
            .push_bind(query.limit() as i64)
            .push(" OFFSET ")
            .push_bind(query.offset() as i64);

        let rows = page
            .build_query_as::<CourseRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(storage)?;

        Ok((rows.into_iter().map(Course::from).collect(), total.max(0) as u64))
    }

    async fn filter_choices(&self) -> Result<FilterChoices, CatalogError> {
        let sites: Vec<String> = sqlx::query_scalar("SELECT DISTINCT site FROM courses ORDER BY site")
            .fetch_all(&self.pool)
            .await
            .map_err(storage)?;
        let partners: Vec<String> = sqlx::query_scalar("SELECT DISTINCT partner FROM courses ORDER BY partner")
            .fetch_all(&self.pool)
            .await
            .map_err(storage)?;

        Ok(FilterChoices { sites, partners })
    }
}
