use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use std::time::Duration;
use tracing::{debug, error};

use crate::domain::rag::{fuzzy_words, InventoryMatch, InventoryRetriever, Stage, StageError};
use crate::domain::DomainError;

const SELECT_COLUMNS: &str = r#"
    SELECT
        p.id::text AS id,
        p.name,
        p.generic_name,
        p.brand_name,
        p.quantity,
        p.selling_price::float8 AS selling_price,
        p.dosage_form,
        p.unit,
        p.description,
        p.expiry_date,
        p.min_stock_level,
        c.name AS category_name,
        s.name AS supplier_name
    FROM products p
    LEFT JOIN categories c ON c.id = p.category_id
    LEFT JOIN suppliers s ON s.id = p.supplier_id
    WHERE p.deleted_at IS NULL"#;

/// Parameterized catalog search; `params` bind to `$1..$n` in order
#[derive(Debug, Clone, PartialEq)]
pub struct InventorySearchQuery {
    pub sql: String,
    pub params: Vec<String>,
    pub limit: i64,
}

/// Escape LIKE metacharacters so user input only ever matches literally
pub fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for ch in input.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

/// Build the ranked search for one term
///
/// `$1` is the exact (lower-cased) term used for ranking, `$2` the full-term
/// pattern, then one pattern per fuzzy word. The limit binds last.
pub fn build_search_query(term: &str, limit: usize) -> InventorySearchQuery {
    let term = term.trim();
    let mut params = vec![term.to_lowercase(), format!("%{}%", escape_like(term))];
    params.extend(fuzzy_words(term).iter().map(|w| format!("%{}%", escape_like(w))));

    let conditions: Vec<String> = (2..=params.len())
        .map(|i| {
            format!(
                r"p.name ILIKE ${i} ESCAPE '\' OR p.generic_name ILIKE ${i} ESCAPE '\' OR p.brand_name ILIKE ${i} ESCAPE '\'"
            )
        })
        .collect();

    let sql = format!(
        r#"{SELECT_COLUMNS}
      AND ({conditions})
    ORDER BY
        CASE
            WHEN LOWER(p.name) = $1 THEN 1
            WHEN LOWER(p.generic_name) = $1 THEN 2
            WHEN LOWER(p.brand_name) = $1 THEN 3
            ELSE 4
        END,
        CASE WHEN p.quantity > 0 THEN 0 ELSE 1 END,
        p.name
    LIMIT ${limit_param}"#,
        conditions = conditions.join("\n        OR "),
        limit_param = params.len() + 1,
    );

    InventorySearchQuery {
        sql,
        params,
        limit: i64::try_from(limit).unwrap_or(i64::MAX),
    }
}

/// Catalog lookups against the pharmacy's PostgreSQL products table (read-only)
#[derive(Debug, Clone)]
pub struct PostgresInventoryRetriever {
    pool: PgPool,
}

impl PostgresInventoryRetriever {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, DomainError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect(url)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to connect to PostgreSQL: {}", e)))?;

        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn map_row(row: &PgRow) -> Result<InventoryMatch, sqlx::Error> {
        let quantity: Option<i32> = row.try_get("quantity")?;
        let category: Option<String> = row.try_get("category_name")?;

        let mut item = InventoryMatch::new(
            row.try_get::<String, _>("id")?,
            row.try_get::<String, _>("name")?,
            quantity.unwrap_or(0),
        );
        item.generic_name = row.try_get("generic_name")?;
        item.brand = row.try_get("brand_name")?;
        if let Some(category) = category {
            item.category = category;
        }
        item.price = row.try_get("selling_price")?;
        item.description = row.try_get("description")?;
        item.dosage_form = row.try_get("dosage_form")?;
        item.unit = row.try_get("unit")?;
        item.supplier = row.try_get("supplier_name")?;
        item.expiry_date = row.try_get::<Option<NaiveDate>, _>("expiry_date")?;
        item.min_stock_level = row.try_get("min_stock_level")?;

        Ok(item)
    }
}

#[async_trait]
impl InventoryRetriever for PostgresInventoryRetriever {
    async fn retrieve(&self, term: &str, limit: usize) -> Result<Vec<InventoryMatch>, StageError> {
        if term.trim().is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        let search = build_search_query(term, limit);
        let mut query = sqlx::query(&search.sql);
        for param in &search.params {
            query = query.bind(param);
        }

        let rows = query
            .bind(search.limit)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                error!(term = %term, error = %e, "Inventory search failed");
                StageError::from_domain(
                    Stage::Inventory,
                    &DomainError::storage(format!("Inventory search failed: {}", e)),
                )
            })?;

        let matches = rows
            .iter()
            .map(Self::map_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| {
                StageError::from_domain(
                    Stage::Inventory,
                    &DomainError::storage(format!("Failed to decode product row: {}", e)),
                )
            })?;

        debug!(term = %term, rows = matches.len(), "Inventory search complete");
        Ok(matches)
    }

    async fn ping(&self) -> Result<(), DomainError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Health check failed: {}", e)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("100%"), r"100\%");
        assert_eq!(escape_like("a_b"), r"a\_b");
        assert_eq!(escape_like(r"c:\d"), r"c:\\d");
        assert_eq!(escape_like("ibuprofen"), "ibuprofen");
    }

    #[test]
    fn test_single_word_query() {
        let search = build_search_query(" Ibuprofen ", 10);

        assert_eq!(search.params, vec!["ibuprofen", "%Ibuprofen%"]);
        assert_eq!(search.limit, 10);
        assert!(search.sql.contains("p.deleted_at IS NULL"));
        assert!(search.sql.contains("p.brand_name ILIKE $2 ESCAPE '\\'"));
        assert!(search.sql.contains("LIMIT $3"));
        assert!(!search.sql.contains("$4"));
    }

    #[test]
    fn test_multi_word_query_adds_fuzzy_patterns() {
        let search = build_search_query("vitamin c 1000mg", 5);

        assert_eq!(
            search.params,
            vec!["vitamin c 1000mg", "%vitamin c 1000mg%", "%vitamin%", "%1000mg%"]
        );
        assert!(search.sql.contains("p.generic_name ILIKE $4"));
        assert!(search.sql.contains("LIMIT $5"));
    }

    #[test]
    fn test_query_ranking_and_joins() {
        let sql = build_search_query("panadol", 10).sql;

        assert!(sql.contains("WHEN LOWER(p.name) = $1 THEN 1"));
        assert!(sql.contains("WHEN LOWER(p.generic_name) = $1 THEN 2"));
        assert!(sql.contains("WHEN LOWER(p.brand_name) = $1 THEN 3"));
        assert!(sql.contains("CASE WHEN p.quantity > 0 THEN 0 ELSE 1 END"));
        assert!(sql.contains("LEFT JOIN categories c"));
        assert!(sql.contains("LEFT JOIN suppliers s"));
    }

    #[test]
    fn test_user_wildcards_are_escaped_in_params() {
        let search = build_search_query("50%_off", 10);
        assert_eq!(search.params[1], r"%50\%\_off%");
    }
}
