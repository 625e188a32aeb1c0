use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Sqlite, SqlitePool, Transaction};
use std::str::FromStr;
use tracing::{error, info};

use super::traits::RecordSink;
use crate::config::DatabaseConfig;
use crate::models::ProductRecord;
use crate::utils::error::PersistenceError;

const DB_SINK: &str = "database";

/// Upserts records into a WordPress-style table set: `<prefix>products` keyed on `url`,
/// plus images, categories and the product/category pivot.
pub struct DatabaseSink {
    pool: SqlitePool,
    prefix: String,
}

fn db_err(source: sqlx::Error) -> PersistenceError {
    PersistenceError::Database {
        sink: DB_SINK.to_string(),
        source,
    }
}

/// JSON text stored in the `attributes` and `tags` columns; `None` when empty.
struct JsonCells {
    attributes: Option<String>,
    tags: Option<String>,
}

impl JsonCells {
    fn encode(record: &ProductRecord) -> Result<Self, PersistenceError> {
        let encode_err = |e: serde_json::Error| PersistenceError::Encode {
            sink: DB_SINK.to_string(),
            message: format!("{}: {}", record.url, e),
        };
        let attributes = (!record.attributes.is_empty())
            .then(|| serde_json::to_string(&record.attributes))
            .transpose()
            .map_err(encode_err)?;
        let tags = (!record.tags.is_empty())
            .then(|| serde_json::to_string(&record.tags))
            .transpose()
            .map_err(encode_err)?;
        Ok(Self { attributes, tags })
    }
}

impl DatabaseSink {
    /// Open (creating if needed) the database and make sure the tables exist.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, PersistenceError> {
        let options = SqliteConnectOptions::from_str(&config.url)
            .map_err(db_err)?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await
            .map_err(db_err)?;

        let sink = Self::with_pool(pool, &config.table_prefix);
        sink.ensure_schema().await?;
        info!("Database ready: {}", config.url);
        Ok(sink)
    }

    pub fn with_pool(pool: SqlitePool, prefix: &str) -> Self {
        Self {
            pool,
            prefix: prefix.to_string(),
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    fn table(&self, name: &str) -> String {
        format!("{}{}", self.prefix, name)
    }

    pub async fn ensure_schema(&self) -> Result<(), PersistenceError> {
        let products = self.table("products");
        let images = self.table("product_images");
        let categories = self.table("categories");
        let pivot = self.table("product_categories");

        let statements = [
            format!(
                "CREATE TABLE IF NOT EXISTS {products} (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    wp_id TEXT,
                    title TEXT,
                    price TEXT,
                    description TEXT,
                    sku TEXT,
                    oem TEXT,
                    attributes TEXT,
                    tags TEXT,
                    url TEXT NOT NULL UNIQUE,
                    scraped_at TEXT,
                    created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
                    updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
                )"
            ),
            format!("CREATE INDEX IF NOT EXISTS idx_{products}_sku ON {products}(sku)"),
            format!("CREATE INDEX IF NOT EXISTS idx_{products}_oem ON {products}(oem)"),
            format!("CREATE INDEX IF NOT EXISTS idx_{products}_wp_id ON {products}(wp_id)"),
            format!(
                "CREATE TABLE IF NOT EXISTS {images} (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    product_id INTEGER NOT NULL REFERENCES {products}(id) ON DELETE CASCADE,
                    image_url TEXT NOT NULL,
                    image_order INTEGER NOT NULL DEFAULT 0,
                    created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
                )"
            ),
            format!(
                "CREATE TABLE IF NOT EXISTS {categories} (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL UNIQUE,
                    created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
                )"
            ),
            format!(
                "CREATE TABLE IF NOT EXISTS {pivot} (
                    product_id INTEGER NOT NULL REFERENCES {products}(id) ON DELETE CASCADE,
                    category_id INTEGER NOT NULL REFERENCES {categories}(id) ON DELETE CASCADE,
                    PRIMARY KEY (product_id, category_id)
                )"
            ),
        ];

        for statement in &statements {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(db_err)?;
        }
        Ok(())
    }

    /// Upsert one record with its images and categories in a single transaction.
    /// Returns the product row id.
    pub async fn save_product(&self, record: &ProductRecord) -> Result<i64, PersistenceError> {
        let cells = JsonCells::encode(record)?;
        self.save_encoded(record, &cells).await.map_err(db_err)
    }

    async fn save_encoded(&self, record: &ProductRecord, cells: &JsonCells) -> Result<i64, sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        let product_id = self.upsert_product(&mut tx, record, cells).await?;
        self.replace_images(&mut tx, product_id, &record.images).await?;
        self.replace_categories(&mut tx, product_id, &record.categories)
            .await?;
        tx.commit().await?;
        Ok(product_id)
    }

    async fn upsert_product(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        record: &ProductRecord,
        cells: &JsonCells,
    ) -> Result<i64, sqlx::Error> {
        let sql = format!(
            "INSERT INTO {} (wp_id, title, price, description, sku, oem, attributes, tags, url, scraped_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(url) DO UPDATE SET
                wp_id = excluded.wp_id,
                title = excluded.title,
                price = excluded.price,
                description = excluded.description,
                sku = excluded.sku,
                oem = excluded.oem,
                attributes = excluded.attributes,
                tags = excluded.tags,
                scraped_at = excluded.scraped_at,
                updated_at = CURRENT_TIMESTAMP
             RETURNING id",
            self.table("products")
        );

        sqlx::query_scalar::<_, i64>(&sql)
            .bind(record.wp_id.as_deref())
            .bind(record.title.as_deref())
            .bind(record.price.as_deref())
            .bind(record.description.as_deref())
            .bind(record.sku.as_deref())
            .bind(record.oem.as_deref())
            .bind(cells.attributes.as_deref())
            .bind(cells.tags.as_deref())
            .bind(record.url.as_str())
            .bind(record.scraped_at)
            .fetch_one(&mut **tx)
            .await
    }

    async fn replace_images(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        product_id: i64,
        images: &[String],
    ) -> Result<(), sqlx::Error> {
        let table = self.table("product_images");
        sqlx::query(&format!("DELETE FROM {} WHERE product_id = ?", table))
            .bind(product_id)
            .execute(&mut **tx)
            .await?;

        let insert = format!(
            "INSERT INTO {} (product_id, image_url, image_order) VALUES (?, ?, ?)",
            table
        );
        for (order, image) in images.iter().enumerate() {
            sqlx::query(&insert)
                .bind(product_id)
                .bind(image.as_str())
                .bind(order as i64)
                .execute(&mut **tx)
                .await?;
        }
        Ok(())
    }

    async fn replace_categories(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        product_id: i64,
        categories: &[String],
    ) -> Result<(), sqlx::Error> {
        let table = self.table("categories");
        let pivot = self.table("product_categories");

        sqlx::query(&format!("DELETE FROM {} WHERE product_id = ?", pivot))
            .bind(product_id)
            .execute(&mut **tx)
            .await?;

        let insert_category = format!(
            "INSERT INTO {} (name) VALUES (?) ON CONFLICT(name) DO NOTHING",
            table
        );
        let select_category = format!("SELECT id FROM {} WHERE name = ?", table);
        let link = format!(
            "INSERT OR IGNORE INTO {} (product_id, category_id) VALUES (?, ?)",
            pivot
        );

        for name in categories {
            sqlx::query(&insert_category)
                .bind(name.as_str())
                .execute(&mut **tx)
                .await?;
            let category_id: i64 = sqlx::query_scalar(&select_category)
                .bind(name.as_str())
                .fetch_one(&mut **tx)
                .await?;
            sqlx::query(&link)
                .bind(product_id)
                .bind(category_id)
                .execute(&mut **tx)
                .await?;
        }
        Ok(())
    }

    pub async fn count_products(&self) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", self.table("products")))
            .fetch_one(&self.pool)
            .await
    }
}

#[async_trait]
impl RecordSink for DatabaseSink {
    fn name(&self) -> &str {
        DB_SINK
    }

    /// A record that fails is logged and skipped; the sink fails only when nothing was saved.
    async fn write(&self, records: &[ProductRecord]) -> Result<String, PersistenceError> {
        let mut saved = 0usize;
        let mut last_error = None;
        for record in records {
            match self.save_product(record).await {
                Ok(_) => saved += 1,
                Err(e) => {
                    error!("Database save failed for {}: {}", record.url, e);
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(error) if saved == 0 => Err(error),
            _ => Ok(format!("{}/{} rows saved", saved, records.len())),
        }
    }
}
