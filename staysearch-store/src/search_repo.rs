use async_trait::async_trait;
use sqlx::PgPool;
use staysearch_core::{SearchRepository, StoreError};
use staysearch_shared::{SearchCriteria, SearchRecord};

pub struct PostgresSearchRepository {
    pool: PgPool,
}

impl PostgresSearchRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// Internal struct for type-safe querying
#[derive(sqlx::FromRow)]
struct SearchRow {
    search_id: String,
    hotel_id: String,
    check_in: String,
    check_out: String,
    ages: Vec<i64>,
}

impl TryFrom<SearchRow> for SearchRecord {
    type Error = StoreError;

    fn try_from(row: SearchRow) -> Result<Self, Self::Error> {
        let ages = row
            .ages
            .iter()
            .map(|age| u32::try_from(*age))
            .collect::<Result<Vec<u32>, _>>()
            .map_err(|_| StoreError::Corrupt {
                id: row.search_id.clone(),
                reason: format!("ages out of range: {:?}", row.ages),
            })?;

        Ok(SearchRecord {
            id: row.search_id,
            criteria: SearchCriteria {
                hotel_id: row.hotel_id,
                check_in: row.check_in,
                check_out: row.check_out,
                ages,
            },
        })
    }
}

fn ages_param(ages: &[u32]) -> Vec<i64> {
    ages.iter().map(|age| i64::from(*age)).collect()
}

fn unavailable(e: sqlx::Error) -> StoreError {
    StoreError::Unavailable(e.to_string())
}

#[async_trait]
impl SearchRepository for PostgresSearchRepository {
    async fn exists(&self, search_id: &str) -> Result<bool, StoreError> {
        sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM searches WHERE search_id = $1)")
            .bind(search_id)
            .fetch_one(&self.pool)
            .await
            .map_err(unavailable)
    }

    async fn get_by_id(&self, search_id: &str) -> Result<Option<SearchRecord>, StoreError> {
        let row = sqlx::query_as::<_, SearchRow>(
            r#"
            SELECT search_id, hotel_id, check_in, check_out, ages
            FROM searches
            WHERE search_id = $1
            "#,
        )
        .bind(search_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unavailable)?;

        row.map(SearchRecord::try_from).transpose()
    }

    async fn upsert(&self, record: &SearchRecord) -> Result<(), StoreError> {
        // Redelivered events carry the same payload, so overwriting is a no-op.
        sqlx::query(
            r#"
            INSERT INTO searches (search_id, hotel_id, check_in, check_out, ages)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (search_id) DO UPDATE
            SET hotel_id = EXCLUDED.hotel_id,
                check_in = EXCLUDED.check_in,
                check_out = EXCLUDED.check_out,
                ages = EXCLUDED.ages
            "#,
        )
        .bind(&record.id)
        .bind(&record.criteria.hotel_id)
        .bind(&record.criteria.check_in)
        .bind(&record.criteria.check_out)
        .bind(ages_param(&record.criteria.ages))
        .execute(&self.pool)
        .await
        .map_err(unavailable)?;

        Ok(())
    }

    async fn count_by_criteria(&self, criteria: &SearchCriteria) -> Result<u64, StoreError> {
        // Array equality: same ages in the same order.
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM searches
            WHERE hotel_id = $1 AND check_in = $2 AND check_out = $3 AND ages = $4
            "#,
        )
        .bind(&criteria.hotel_id)
        .bind(&criteria.check_in)
        .bind(&criteria.check_out)
        .bind(ages_param(&criteria.ages))
        .fetch_one(&self.pool)
        .await
        .map_err(unavailable)?;

        Ok(count.max(0) as u64)
    }
}
