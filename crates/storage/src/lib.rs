use anyhow::{Context, Result};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Pool, Row, Sqlite,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::debug;

use shared::domain::{CartItemId, CartLine, Product, ProductId, ProductSummary, UserId, UserRecord};

const IN_MEMORY_URL: &str = "sqlite::memory:";

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

/// A user row together with its stored bcrypt password hash.
#[derive(Debug, Clone)]
pub struct StoredUser {
    pub record: UserRecord,
    pub password_hash: String,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        // Every connection to `sqlite::memory:` opens its own database.
        let max_connections = if database_url.starts_with(IN_MEMORY_URL) {
            1
        } else {
            5
        };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(connect_options)
            .await
            .with_context(|| format!("failed to open sqlite database at '{database_url}'"))?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        debug!(%database_url, "storage ready");
        Ok(Self { pool })
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    pub async fn read_value(&self, key: &str) -> Result<Option<String>> {
        let row = sqlx::query("SELECT value FROM client_state WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("failed to read client state key '{key}'"))?;
        Ok(row.map(|r| r.get::<String, _>(0)))
    }

    /// Upserts every pair in one transaction; either all keys change or none do.
    pub async fn write_values(&self, entries: &[(&str, &str)]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for (key, value) in entries {
            sqlx::query(
                "INSERT INTO client_state (key, value) VALUES (?, ?)
                 ON CONFLICT(key) DO UPDATE SET value=excluded.value, updated_at=CURRENT_TIMESTAMP",
            )
            .bind(*key)
            .bind(*value)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("failed to write client state key '{key}'"))?;
        }
        tx.commit().await?;
        Ok(())
    }

    pub async fn remove_values(&self, keys: &[&str]) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        let mut removed = 0;
        for key in keys {
            let result = sqlx::query("DELETE FROM client_state WHERE key = ?")
                .bind(*key)
                .execute(&mut *tx)
                .await
                .with_context(|| format!("failed to remove client state key '{key}'"))?;
            removed += result.rows_affected();
        }
        tx.commit().await?;
        Ok(removed)
    }

    /// Returns `None` when the email is already registered.
    pub async fn create_user(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<Option<UserId>> {
        let rec = sqlx::query(
            "INSERT INTO users (username, email, password_hash) VALUES (?, ?, ?)
             ON CONFLICT(email) DO NOTHING
             RETURNING id",
        )
        .bind(username)
        .bind(email)
        .bind(password_hash)
        .fetch_optional(&self.pool)
        .await?;
        Ok(rec.map(|r| UserId(r.get::<i64, _>(0))))
    }

    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<StoredUser>> {
        let row = sqlx::query("SELECT id, username, email, password_hash FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| StoredUser {
            record: UserRecord {
                id: UserId(r.get::<i64, _>(0)),
                username: r.get::<String, _>(1),
                email: r.get::<String, _>(2),
            },
            password_hash: r.get::<String, _>(3),
        }))
    }

    pub async fn create_product(&self, name: &str, price: f64, img: &str) -> Result<ProductId> {
        let rec = sqlx::query("INSERT INTO products (name, price, img) VALUES (?, ?, ?) RETURNING id")
            .bind(name)
            .bind(price)
            .bind(img)
            .fetch_one(&self.pool)
            .await?;
        Ok(ProductId(rec.get::<i64, _>(0)))
    }

    pub async fn list_products(&self) -> Result<Vec<ProductSummary>> {
        let rows = sqlx::query("SELECT id, name, price, img FROM products ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .into_iter()
            .map(|r| ProductSummary {
                id: ProductId(r.get::<i64, _>(0)),
                name: r.get::<String, _>(1),
                price: r.get::<f64, _>(2),
                img: r.get::<String, _>(3),
            })
            .collect())
    }

    pub async fn product_exists(&self, product_id: ProductId) -> Result<bool> {
        let row = sqlx::query("SELECT 1 FROM products WHERE id = ?")
            .bind(product_id.0)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    pub async fn add_cart_item(&self, user_id: UserId, product_id: ProductId) -> Result<CartItemId> {
        let rec = sqlx::query(
            "INSERT INTO cart_items (user_id, product_id) VALUES (?, ?)
             ON CONFLICT(user_id, product_id) DO UPDATE SET product_id=excluded.product_id
             RETURNING id",
        )
        .bind(user_id.0)
        .bind(product_id.0)
        .fetch_one(&self.pool)
        .await?;
        Ok(CartItemId(rec.get::<i64, _>(0)))
    }

    pub async fn list_cart(&self, user_id: UserId) -> Result<Vec<CartLine>> {
        let rows = sqlx::query(
            "SELECT c.id, c.product_id, p.name, p.price, p.img
             FROM cart_items c
             INNER JOIN products p ON p.id = c.product_id
             WHERE c.user_id = ?
             ORDER BY c.id",
        )
        .bind(user_id.0)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|r| CartLine {
                id: CartItemId(r.get::<i64, _>(0)),
                product_id: ProductId(r.get::<i64, _>(1)),
                product: Product {
                    name: r.get::<String, _>(2),
                    price: r.get::<f64, _>(3),
                    img: r.get::<String, _>(4),
                },
            })
            .collect())
    }

    pub async fn remove_cart_item(&self, user_id: UserId, product_id: ProductId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM cart_items WHERE user_id = ? AND product_id = ?")
            .bind(user_id.0)
            .bind(product_id.0)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url.starts_with(IN_MEMORY_URL) || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
