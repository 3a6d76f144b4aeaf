//! Catalog query engine.
//!
//! Translates the public catalog filters into a single SQL query with keyset
//! cursor pagination. Age filters are applied as a birth-date window inside
//! the query, so pages stay full and the cursor walk visits every matching
//! profile exactly once regardless of the filter set.

use chrono::{Months, NaiveDate};
use serde::{Deserialize, Serialize};
use sqlx::QueryBuilder;
use tracing::warn;

use crate::db::{self, CatalogItem, DbPool, Psychologist};

pub const DEFAULT_PAGE_SIZE: u32 = 12;
pub const MAX_PAGE_SIZE: u32 = 50;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortBy {
    #[default]
    CreatedAt,
    Price,
    CertificationLevel,
    /// Sorts on the persisted birth date with the direction flipped, since
    /// age and birth date run in opposite directions
    Age,
}

impl SortBy {
    fn column(self) -> &'static str {
        match self {
            SortBy::CreatedAt => "created_at",
            SortBy::Price => "price",
            SortBy::CertificationLevel => "certification_level",
            SortBy::Age => "birth_date",
        }
    }
}

impl std::str::FromStr for SortBy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created_at" => Ok(SortBy::CreatedAt),
            "price" => Ok(SortBy::Price),
            "certification_level" => Ok(SortBy::CertificationLevel),
            "age" => Ok(SortBy::Age),
            _ => Err(format!("Unknown sort field: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    fn invert(self) -> Self {
        match self {
            SortOrder::Asc => SortOrder::Desc,
            SortOrder::Desc => SortOrder::Asc,
        }
    }

    fn comparator(self) -> &'static str {
        match self {
            SortOrder::Asc => ">",
            SortOrder::Desc => "<",
        }
    }

    fn keyword(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

impl std::str::FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            _ => Err(format!("Unknown sort order: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CatalogFilters {
    pub price_min: Option<i64>,
    pub price_max: Option<i64>,
    pub age_min: Option<u32>,
    pub age_max: Option<u32>,
    /// Match profiles carrying any of these paradigm tags
    pub paradigms: Vec<String>,
    pub certification_levels: Vec<i64>,
    pub city: Option<String>,
    pub gender: Option<String>,
    pub sort_by: SortBy,
    pub sort_order: SortOrder,
}

impl CatalogFilters {
    fn has_age_filter(&self) -> bool {
        self.age_min.is_some() || self.age_max.is_some()
    }

    /// Scan direction actually used in SQL; age sorts flip onto birth_date
    fn scan_order(&self) -> SortOrder {
        match self.sort_by {
            SortBy::Age => self.sort_order.invert(),
            _ => self.sort_order,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CatalogPagination {
    pub limit: u32,
    /// Id of the last row of the previous page
    pub cursor: Option<String>,
}

impl Default for CatalogPagination {
    fn default() -> Self {
        Self {
            limit: DEFAULT_PAGE_SIZE,
            cursor: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogPage {
    pub items: Vec<CatalogItem>,
    pub next_cursor: Option<String>,
    pub has_more: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("unknown catalog cursor")]
    UnknownCursor,
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Birth-date window equivalent to an [age_min, age_max] filter on the given
/// date. Returns (exclusive lower bound, inclusive upper bound):
/// age >= n  <=>  birth_date <= today - n years
/// age <= n  <=>  birth_date >  today - (n + 1) years
/// The strict lower bound keeps Feb 29 birthdays correct across the
/// clamped subtraction on non-leap years.
pub fn birth_date_window(
    today: NaiveDate,
    age_min: Option<u32>,
    age_max: Option<u32>,
) -> (Option<NaiveDate>, Option<NaiveDate>) {
    let born_on_or_before =
        age_min.and_then(|years| today.checked_sub_months(Months::new(12 * years)));
    let born_after =
        age_max.and_then(|years| today.checked_sub_months(Months::new(12 * (years + 1))));
    (born_after, born_on_or_before)
}

/// Run a catalog query as of now.
pub async fn query_catalog(
    pool: &DbPool,
    filters: &CatalogFilters,
    pagination: &CatalogPagination,
) -> Result<CatalogPage, CatalogError> {
    query_catalog_at(pool, filters, pagination, chrono::Utc::now().date_naive()).await
}

/// Run a catalog query as of the given date (ages and birth-date windows are
/// computed against it). Database-unavailable failures degrade to an empty
/// page so the public catalog renders on an unprovisioned environment.
pub async fn query_catalog_at(
    pool: &DbPool,
    filters: &CatalogFilters,
    pagination: &CatalogPagination,
    today: NaiveDate,
) -> Result<CatalogPage, CatalogError> {
    match fetch_page(pool, filters, pagination, today).await {
        Ok(page) => Ok(page),
        Err(CatalogError::Database(err)) if db::is_database_unavailable(&err) => {
            warn!(error = %err, "catalog query degraded to empty page: database unavailable");
            Ok(CatalogPage::default())
        }
        Err(err) => Err(err),
    }
}

async fn fetch_page(
    pool: &DbPool,
    filters: &CatalogFilters,
    pagination: &CatalogPagination,
    today: NaiveDate,
) -> Result<CatalogPage, CatalogError> {
    let limit = pagination.limit.clamp(1, MAX_PAGE_SIZE);
    let order = filters.scan_order();

    // The cursor is the id of the last row already served; its sort key
    // seeds the keyset predicate.
    let cursor_row: Option<Psychologist> = match &pagination.cursor {
        Some(id) => Some(
            sqlx::query_as("SELECT * FROM psychologists WHERE id = ?")
                .bind(id)
                .fetch_optional(pool)
                .await?
                .ok_or(CatalogError::UnknownCursor)?,
        ),
        None => None,
    };

    let mut qb: QueryBuilder<sqlx::Sqlite> =
        QueryBuilder::new("SELECT * FROM psychologists WHERE is_published = 1");

    if let Some(price) = filters.price_min {
        qb.push(" AND price >= ").push_bind(price);
    }
    if let Some(price) = filters.price_max {
        qb.push(" AND price <= ").push_bind(price);
    }

    if !filters.certification_levels.is_empty() {
        qb.push(" AND certification_level IN (");
        let mut sep = qb.separated(", ");
        for level in &filters.certification_levels {
            sep.push_bind(*level);
        }
        sep.push_unseparated(")");
    }

    if let Some(city) = &filters.city {
        qb.push(" AND city = ").push_bind(city.clone());
        qb.push(" COLLATE NOCASE");
    }
    if let Some(gender) = &filters.gender {
        qb.push(" AND gender = ").push_bind(gender.clone());
        qb.push(" COLLATE NOCASE");
    }

    if !filters.paradigms.is_empty() {
        qb.push(
            " AND main_paradigm IS NOT NULL AND EXISTS (\
             SELECT 1 FROM json_each(psychologists.main_paradigm) WHERE json_each.value IN (",
        );
        let mut sep = qb.separated(", ");
        for tag in &filters.paradigms {
            sep.push_bind(tag.clone());
        }
        sep.push_unseparated("))");
    }

    // Age filters and age sorting only make sense for profiles with a birth date
    if filters.has_age_filter() || filters.sort_by == SortBy::Age {
        qb.push(" AND birth_date IS NOT NULL");
    }
    let (born_after, born_on_or_before) =
        birth_date_window(today, filters.age_min, filters.age_max);
    if let Some(bound) = born_after {
        qb.push(" AND birth_date > ").push_bind(bound.to_string());
    }
    if let Some(bound) = born_on_or_before {
        qb.push(" AND birth_date <= ").push_bind(bound.to_string());
    }

    if let Some(cursor) = &cursor_row {
        let op = order.comparator();
        qb.push(" AND (");
        match filters.sort_by {
            SortBy::Price => push_keyset(&mut qb, "price", cursor.price, &cursor.id, op),
            SortBy::CertificationLevel => push_keyset(
                &mut qb,
                "certification_level",
                cursor.certification_level,
                &cursor.id,
                op,
            ),
            SortBy::CreatedAt => push_keyset(
                &mut qb,
                "created_at",
                cursor.created_at.clone(),
                &cursor.id,
                op,
            ),
            SortBy::Age => push_keyset(
                &mut qb,
                "birth_date",
                cursor.birth_date.clone().unwrap_or_default(),
                &cursor.id,
                op,
            ),
        }
        qb.push(")");
    }

    let dir = order.keyword();
    qb.push(" ORDER BY ")
        .push(filters.sort_by.column())
        .push(" ")
        .push(dir)
        .push(", id ")
        .push(dir);
    // One extra row detects whether a further page exists
    qb.push(" LIMIT ").push_bind(i64::from(limit) + 1);

    let mut rows: Vec<Psychologist> = qb.build_query_as().fetch_all(pool).await?;

    let has_more = rows.len() as u32 > limit;
    if has_more {
        rows.pop();
    }
    let next_cursor = if has_more {
        rows.last().map(|row| row.id.clone())
    } else {
        None
    };

    let items = rows
        .into_iter()
        .map(|row| row.into_catalog_item(today))
        .collect();

    Ok(CatalogPage {
        items,
        next_cursor,
        has_more,
    })
}

/// Keyset predicate: (key, id) strictly past the cursor tuple in scan order
fn push_keyset<'args, T>(
    qb: &mut QueryBuilder<'args, sqlx::Sqlite>,
    column: &str,
    key: T,
    id: &str,
    op: &str,
) where
    T: sqlx::Encode<'args, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite> + Clone + Send + 'args,
{
    qb.push(column)
        .push(" ")
        .push(op)
        .push(" ")
        .push_bind(key.clone());
    qb.push(" OR (")
        .push(column)
        .push(" = ")
        .push_bind(key)
        .push(" AND id ")
        .push(op)
        .push(" ")
        .push_bind(id.to_string())
        .push(")");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    struct Fixture {
        slug: String,
        city: String,
        gender: String,
        level: i64,
        price: i64,
        birth_date: Option<String>,
        paradigms: String,
        published: bool,
        created_at: String,
    }

    impl Default for Fixture {
        fn default() -> Self {
            Self {
                slug: "p".to_string(),
                city: "Москва".to_string(),
                gender: "female".to_string(),
                level: 1,
                price: 3000,
                birth_date: Some("1990-01-01".to_string()),
                paradigms: r#"["КПТ"]"#.to_string(),
                published: true,
                created_at: "2024-01-01T00:00:00+00:00".to_string(),
            }
        }
    }

    fn fixture(slug: &str) -> Fixture {
        Fixture {
            slug: slug.to_string(),
            ..Default::default()
        }
    }

    async fn insert(pool: &DbPool, fixture: Fixture) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        sqlx::query(
            "INSERT INTO psychologists \
             (id, slug, full_name, gender, birth_date, city, work_format, main_paradigm, \
              certification_level, short_bio, long_bio, price, education, is_published, \
              created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, 'online', ?, ?, '', '', ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&fixture.slug)
        .bind(&fixture.slug)
        .bind(&fixture.gender)
        .bind(&fixture.birth_date)
        .bind(&fixture.city)
        .bind(&fixture.paradigms)
        .bind(fixture.level)
        .bind(fixture.price)
        .bind(r#"[{"year":2010,"type":"университет","organization":"МГУ","title":"Психология","is_diploma":true}]"#)
        .bind(fixture.published)
        .bind(&fixture.created_at)
        .bind(&fixture.created_at)
        .execute(pool)
        .await
        .unwrap();
        id
    }

    async fn collect_all(
        pool: &DbPool,
        filters: &CatalogFilters,
        limit: u32,
    ) -> Vec<CatalogItem> {
        let mut items = Vec::new();
        let mut cursor = None;
        loop {
            let page = query_catalog_at(
                pool,
                filters,
                &CatalogPagination { limit, cursor },
                date(2024, 6, 1),
            )
            .await
            .unwrap();
            assert!(page.items.len() as u32 <= limit);
            assert_eq!(page.has_more, page.next_cursor.is_some());
            items.extend(page.items);
            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => return items,
            }
        }
    }

    #[test]
    fn birth_date_window_matches_completed_years() {
        // age >= 30 on 2024-06-01: born on or before 1994-06-01
        let (after, until) = birth_date_window(date(2024, 6, 1), Some(30), None);
        assert_eq!(after, None);
        assert_eq!(until, Some(date(1994, 6, 1)));

        // age <= 40: born strictly after 1983-06-01
        let (after, until) = birth_date_window(date(2024, 6, 1), None, Some(40));
        assert_eq!(after, Some(date(1983, 6, 1)));
        assert_eq!(until, None);
    }

    #[test]
    fn birth_date_window_keeps_leap_day_birthdays() {
        // On 2023-02-28 a person born 2019-02-29 is 3; with age_max = 3 the
        // strict bound 2019-02-28 keeps them inside the window.
        let (after, _) = birth_date_window(date(2023, 2, 28), None, Some(3));
        assert_eq!(after, Some(date(2019, 2, 28)));
        assert!(date(2019, 2, 29) > after.unwrap());
    }

    #[tokio::test]
    async fn only_published_profiles_are_returned() {
        let pool = init_memory().await;
        insert(&pool, fixture("a")).await;
        insert(&pool, Fixture { published: false, ..fixture("b") }).await;

        let page = query_catalog_at(
            &pool,
            &CatalogFilters::default(),
            &CatalogPagination::default(),
            date(2024, 6, 1),
        )
        .await
        .unwrap();

        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].slug, "a");
        assert!(!page.has_more);
        assert_eq!(page.next_cursor, None);
    }

    #[tokio::test]
    async fn certification_level_filter_is_set_membership() {
        let pool = init_memory().await;
        for (slug, level) in [("l1", 1), ("l2", 2), ("l3", 3)] {
            insert(&pool, Fixture { level, ..fixture(slug) }).await;
        }

        let filters = CatalogFilters {
            certification_levels: vec![2, 3],
            ..Default::default()
        };
        let items = collect_all(&pool, &filters, 10).await;
        assert_eq!(items.len(), 2);
        assert!(items.iter().all(|i| [2, 3].contains(&i.certification_level)));
    }

    #[tokio::test]
    async fn city_filter_is_case_insensitive() {
        let pool = init_memory().await;
        insert(&pool, Fixture { city: "Moscow".to_string(), ..fixture("msk") }).await;
        insert(&pool, Fixture { city: "Petersburg".to_string(), ..fixture("spb") }).await;

        let filters = CatalogFilters {
            city: Some("moscow".to_string()),
            ..Default::default()
        };
        let items = collect_all(&pool, &filters, 10).await;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].slug, "msk");
    }

    #[tokio::test]
    async fn example_scenario_levels_and_city() {
        let pool = init_memory().await;
        // Three matches, plus rows that differ in city or level
        for (slug, level, created_at) in [
            ("m1", 2, "2024-01-03T00:00:00+00:00"),
            ("m2", 3, "2024-01-02T00:00:00+00:00"),
            ("m3", 2, "2024-01-01T00:00:00+00:00"),
        ] {
            insert(
                &pool,
                Fixture { level, created_at: created_at.to_string(), ..fixture(slug) },
            )
            .await;
        }
        insert(&pool, Fixture { level: 2, city: "Казань".to_string(), ..fixture("other-city") }).await;
        insert(&pool, Fixture { level: 1, ..fixture("low-level") }).await;

        let filters = CatalogFilters {
            certification_levels: vec![2, 3],
            city: Some("Москва".to_string()),
            ..Default::default()
        };
        let page = query_catalog_at(
            &pool,
            &filters,
            &CatalogPagination { limit: 2, cursor: None },
            date(2024, 6, 1),
        )
        .await
        .unwrap();

        assert_eq!(page.items.len(), 2);
        assert!(page.has_more);
        assert!(page
            .items
            .iter()
            .all(|i| [2, 3].contains(&i.certification_level) && i.city == "Москва"));

        // The third match arrives on the next page
        let rest = query_catalog_at(
            &pool,
            &filters,
            &CatalogPagination { limit: 2, cursor: page.next_cursor.clone() },
            date(2024, 6, 1),
        )
        .await
        .unwrap();
        assert_eq!(rest.items.len(), 1);
        assert!(!rest.has_more);
    }

    #[tokio::test]
    async fn cursor_walk_yields_each_match_exactly_once_in_order() {
        let pool = init_memory().await;
        for i in 0..5 {
            insert(
                &pool,
                Fixture {
                    created_at: format!("2024-01-0{}T00:00:00+00:00", i + 1),
                    ..fixture(&format!("p{}", i))
                },
            )
            .await;
        }

        let items = collect_all(&pool, &CatalogFilters::default(), 2).await;
        assert_eq!(items.len(), 5);
        // Default sort: newest first
        let created: Vec<_> = items.iter().map(|i| i.created_at.clone()).collect();
        let mut sorted = created.clone();
        sorted.sort_by(|a, b| b.cmp(a));
        assert_eq!(created, sorted);
        // No duplicates
        let mut ids: Vec<_> = items.iter().map(|i| i.id.clone()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 5);
    }

    #[tokio::test]
    async fn price_sort_ascending_with_cursor() {
        let pool = init_memory().await;
        for (slug, price) in [("cheap", 1000), ("mid", 3000), ("posh", 9000)] {
            insert(&pool, Fixture { price, ..fixture(slug) }).await;
        }

        let filters = CatalogFilters {
            sort_by: SortBy::Price,
            sort_order: SortOrder::Asc,
            ..Default::default()
        };
        let items = collect_all(&pool, &filters, 1).await;
        let prices: Vec<_> = items.iter().map(|i| i.price).collect();
        assert_eq!(prices, vec![1000, 3000, 9000]);
    }

    #[tokio::test]
    async fn age_filter_selects_by_completed_years() {
        let pool = init_memory().await;
        // Ages on 2024-06-01: 24, 34, 44
        for (slug, birth) in [("young", "2000-01-15"), ("mid", "1990-01-15"), ("old", "1980-01-15")] {
            insert(&pool, Fixture { birth_date: Some(birth.to_string()), ..fixture(slug) }).await;
        }
        insert(&pool, Fixture { birth_date: None, ..fixture("no-birth") }).await;

        let filters = CatalogFilters {
            age_min: Some(30),
            age_max: Some(40),
            ..Default::default()
        };
        let items = collect_all(&pool, &filters, 10).await;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].slug, "mid");
        assert_eq!(items[0].age, Some(34));
    }

    #[tokio::test]
    async fn age_filtered_pages_stay_full_under_pagination() {
        let pool = init_memory().await;
        // Six profiles in the window interleaved with six outside it
        for i in 0..6 {
            let created = format!("2024-02-{:02}T00:00:00+00:00", i + 1);
            insert(
                &pool,
                Fixture {
                    birth_date: Some("1990-06-15".to_string()),
                    created_at: created.clone(),
                    ..fixture(&format!("in{}", i))
                },
            )
            .await;
            insert(
                &pool,
                Fixture {
                    birth_date: Some("2004-06-15".to_string()),
                    created_at: created,
                    ..fixture(&format!("out{}", i))
                },
            )
            .await;
        }

        let filters = CatalogFilters {
            age_min: Some(30),
            ..Default::default()
        };
        let mut cursor = None;
        let mut seen = Vec::new();
        loop {
            let page = query_catalog_at(
                &pool,
                &filters,
                &CatalogPagination { limit: 2, cursor },
                date(2024, 6, 1),
            )
            .await
            .unwrap();
            if page.has_more {
                // Every non-final page is full even though half the rows are
                // filtered by age
                assert_eq!(page.items.len(), 2);
            }
            seen.extend(page.items);
            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }
        assert_eq!(seen.len(), 6);
        assert!(seen.iter().all(|i| i.slug.starts_with("in")));
    }

    #[tokio::test]
    async fn age_sort_orders_oldest_first_on_desc() {
        let pool = init_memory().await;
        for (slug, birth) in [("young", "2000-01-15"), ("mid", "1990-01-15"), ("old", "1980-01-15")] {
            insert(&pool, Fixture { birth_date: Some(birth.to_string()), ..fixture(slug) }).await;
        }

        let filters = CatalogFilters {
            sort_by: SortBy::Age,
            sort_order: SortOrder::Desc,
            ..Default::default()
        };
        let items = collect_all(&pool, &filters, 2).await;
        let slugs: Vec<_> = items.iter().map(|i| i.slug.as_str()).collect();
        assert_eq!(slugs, vec!["old", "mid", "young"]);
    }

    #[tokio::test]
    async fn paradigm_filter_matches_any_tag() {
        let pool = init_memory().await;
        insert(&pool, Fixture { paradigms: r#"["КПТ"]"#.to_string(), ..fixture("cbt") }).await;
        insert(&pool, Fixture { paradigms: r#"["Гештальт"]"#.to_string(), ..fixture("gestalt") }).await;
        insert(&pool, Fixture { paradigms: r#"["КПТ","Гештальт"]"#.to_string(), ..fixture("both") }).await;

        let filters = CatalogFilters {
            paradigms: vec!["Гештальт".to_string()],
            ..Default::default()
        };
        let items = collect_all(&pool, &filters, 10).await;
        let mut slugs: Vec<_> = items.iter().map(|i| i.slug.as_str()).collect();
        slugs.sort();
        assert_eq!(slugs, vec!["both", "gestalt"]);
    }

    #[tokio::test]
    async fn unknown_cursor_is_rejected() {
        let pool = init_memory().await;
        let err = query_catalog_at(
            &pool,
            &CatalogFilters::default(),
            &CatalogPagination { limit: 2, cursor: Some("missing".to_string()) },
            date(2024, 6, 1),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, CatalogError::UnknownCursor));
    }

    #[tokio::test]
    async fn uninitialized_database_degrades_to_empty_page() {
        // A pool with no schema at all
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();

        let page = query_catalog_at(
            &pool,
            &CatalogFilters::default(),
            &CatalogPagination::default(),
            date(2024, 6, 1),
        )
        .await
        .unwrap();
        assert!(page.items.is_empty());
        assert!(!page.has_more);
        assert_eq!(page.next_cursor, None);
    }
}
