//! Database Connection Pool Module
//!
//! PostgreSQL connection pooling using deadpool-postgres and the Postgres
//! implementation of the record store.
//!
//! Every write runs in one transaction, association rows included. Text
//! columns use `COLLATE "C"` so ordering is byte-wise and matches the
//! in-memory store exactly; export chunks rely on that for keyset pagination.

use async_trait::async_trait;
use deadpool_postgres::{Config, ManagerConfig, Pool, RecyclingMethod, Runtime, Transaction};
use polyglot_core::{
    normalize_tag_names, EntityIdType, ExportCursor, ExportRow, ExportScan, NewTranslation,
    NewUser, Page, PageRequest, PolyglotError, PolyglotResult, StorageError, Tag, TagFilter, TagId,
    Translation, TranslationFilter, TranslationId, TranslationPatch, TranslationWithTags,
    UserCredentials, UserId,
};
use polyglot_storage::{TranslationStore, UserStore};
use std::collections::HashMap;
use std::time::Duration;
use tokio_postgres::error::SqlState;
use tokio_postgres::types::ToSql;
use tokio_postgres::{NoTls, Row};
use tracing::{debug, info};

use crate::error::{ApiError, ApiResult};

// ============================================================================
// CONNECTION POOL CONFIGURATION
// ============================================================================

/// Database connection pool configuration.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// PostgreSQL host
    pub host: String,
    /// PostgreSQL port
    pub port: u16,
    /// Database name
    pub dbname: String,
    /// Database user
    pub user: String,
    /// Database password
    pub password: String,
    /// Maximum pool size
    pub max_size: usize,
    /// Connection timeout
    pub timeout: Duration,
    /// Apply the embedded schema at startup
    pub migrate: bool,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            dbname: "polyglot".to_string(),
            user: "postgres".to_string(),
            password: "".to_string(),
            max_size: 16,
            timeout: Duration::from_secs(30),
            migrate: true,
        }
    }
}

impl DbConfig {
    /// Create a new database configuration from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("POLYGLOT_DB_HOST").unwrap_or(defaults.host),
            port: std::env::var("POLYGLOT_DB_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.port),
            dbname: std::env::var("POLYGLOT_DB_NAME").unwrap_or(defaults.dbname),
            user: std::env::var("POLYGLOT_DB_USER").unwrap_or(defaults.user),
            password: std::env::var("POLYGLOT_DB_PASSWORD").unwrap_or_default(),
            max_size: std::env::var("POLYGLOT_DB_POOL_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_size),
            timeout: Duration::from_secs(
                std::env::var("POLYGLOT_DB_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
            migrate: std::env::var("POLYGLOT_DB_MIGRATE")
                .map(|s| !matches!(s.to_lowercase().as_str(), "false" | "0" | "no"))
                .unwrap_or(defaults.migrate),
        }
    }

    /// Create a connection pool from this configuration.
    pub fn create_pool(&self) -> ApiResult<Pool> {
        let mut cfg = Config::new();
        cfg.host = Some(self.host.clone());
        cfg.port = Some(self.port);
        cfg.dbname = Some(self.dbname.clone());
        cfg.user = Some(self.user.clone());
        cfg.password = Some(self.password.clone());
        cfg.connect_timeout = Some(self.timeout);

        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });

        let mut pool_cfg = deadpool_postgres::PoolConfig::new(self.max_size);
        pool_cfg.timeouts.wait = Some(self.timeout);
        cfg.pool = Some(pool_cfg);

        let pool = cfg
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| ApiError::database_error(format!("Failed to create pool: {}", e)))?;

        Ok(pool)
    }
}

// ============================================================================
// SCHEMA
// ============================================================================

/// Idempotent schema. Applied by [`PgStore::migrate`].
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS tags (
    id          BIGSERIAL PRIMARY KEY,
    name        VARCHAR(50) COLLATE "C" NOT NULL UNIQUE,
    created_at  TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at  TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE TABLE IF NOT EXISTS translations (
    id          BIGSERIAL PRIMARY KEY,
    key         VARCHAR(255) COLLATE "C" NOT NULL,
    locale      VARCHAR(16) COLLATE "C" NOT NULL,
    value       TEXT NOT NULL,
    created_at  TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at  TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT translations_locale_key_key UNIQUE (locale, key)
);

CREATE TABLE IF NOT EXISTS translation_tag (
    translation_id  BIGINT NOT NULL REFERENCES translations(id) ON DELETE CASCADE,
    tag_id          BIGINT NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
    PRIMARY KEY (translation_id, tag_id)
);

CREATE INDEX IF NOT EXISTS translation_tag_tag_id_idx ON translation_tag (tag_id);

CREATE TABLE IF NOT EXISTS users (
    id              BIGSERIAL PRIMARY KEY,
    email           VARCHAR(255) NOT NULL UNIQUE,
    name            VARCHAR(255) NOT NULL,
    password_salt   TEXT NOT NULL,
    password_hash   TEXT NOT NULL,
    created_at      TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at      TIMESTAMPTZ NOT NULL DEFAULT now()
);
"#;

const TRANSLATION_COLUMNS: &str = "t.id, t.key, t.locale, t.value, t.created_at, t.updated_at";
const TAG_COLUMNS: &str = "id, name, created_at, updated_at";
const USER_COLUMNS: &str = "id, email, name, password_salt, password_hash";

// ============================================================================
// ERROR MAPPING
// ============================================================================

fn pool_error(err: deadpool_postgres::PoolError) -> PolyglotError {
    StorageError::Unavailable {
        reason: err.to_string(),
    }
    .into()
}

/// Map a driver error, turning unique violations into conflicts on `entity`.
fn pg_error(
    operation: &'static str,
    entity: &'static str,
    conflict_reason: impl FnOnce() -> String,
) -> impl FnOnce(tokio_postgres::Error) -> PolyglotError {
    move |err| {
        if err.code() == Some(&SqlState::UNIQUE_VIOLATION) {
            return StorageError::Conflict {
                entity,
                reason: conflict_reason(),
            }
            .into();
        }
        query_failed(operation)(err)
    }
}

fn query_failed(operation: &'static str) -> impl FnOnce(tokio_postgres::Error) -> PolyglotError {
    move |err| {
        if err.is_closed() {
            return StorageError::Unavailable {
                reason: err.to_string(),
            }
            .into();
        }
        StorageError::QueryFailed {
            operation: operation.to_string(),
            reason: err.to_string(),
        }
        .into()
    }
}

fn tx_failed(err: tokio_postgres::Error) -> PolyglotError {
    StorageError::TransactionFailed {
        reason: err.to_string(),
    }
    .into()
}

// ============================================================================
// ROW MAPPING
// ============================================================================

fn translation_from_row(row: &Row) -> Translation {
    Translation {
        id: TranslationId::new(row.get("id")),
        key: row.get("key"),
        locale: row.get("locale"),
        value: row.get("value"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn tag_from_row(row: &Row) -> Tag {
    Tag {
        id: TagId::new(row.get("id")),
        name: row.get("name"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn user_from_row(row: &Row) -> UserCredentials {
    UserCredentials {
        id: UserId::new(row.get("id")),
        email: row.get("email"),
        name: row.get("name"),
        password_salt: row.get("password_salt"),
        password_hash: row.get("password_hash"),
    }
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// Positional parameters collected while building a dynamic WHERE clause.
#[derive(Default)]
struct QueryParams {
    values: Vec<Box<dyn ToSql + Sync + Send>>,
}

impl QueryParams {
    /// Push a value and return its placeholder, e.g. `$3`.
    fn push<T: ToSql + Sync + Send + 'static>(&mut self, value: T) -> String {
        self.values.push(Box::new(value));
        format!("${}", self.values.len())
    }

    fn refs(&self) -> Vec<&(dyn ToSql + Sync)> {
        self.values
            .iter()
            .map(|v| v.as_ref() as &(dyn ToSql + Sync))
            .collect()
    }
}

fn where_clause(conditions: &[String]) -> String {
    if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    }
}

fn any_tag_condition(placeholder: &str) -> String {
    format!(
        "EXISTS (SELECT 1 FROM translation_tag tt JOIN tags g ON g.id = tt.tag_id \
         WHERE tt.translation_id = t.id AND g.name = ANY({}))",
        placeholder
    )
}

// ============================================================================
// POSTGRES STORE
// ============================================================================

/// Postgres implementation of [`TranslationStore`] and [`UserStore`].
#[derive(Clone)]
pub struct PgStore {
    pool: Pool,
}

impl PgStore {
    /// Create a new store with the given pool.
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Create a new store from configuration.
    pub fn from_config(config: &DbConfig) -> ApiResult<Self> {
        let pool = config.create_pool()?;
        Ok(Self::new(pool))
    }

    /// Get the current pool size for observability.
    pub fn pool_size(&self) -> usize {
        self.pool.status().size
    }

    async fn get_conn(&self) -> PolyglotResult<deadpool_postgres::Client> {
        self.pool.get().await.map_err(pool_error)
    }

    /// Apply the embedded schema.
    pub async fn migrate(&self) -> PolyglotResult<()> {
        let conn = self.get_conn().await?;
        conn.batch_execute(SCHEMA)
            .await
            .map_err(query_failed("migrate"))?;
        info!("Database schema is up to date");
        Ok(())
    }

    /// Insert many translations in one statement, skipping existing
    /// `(locale, key)` pairs. Returns the number inserted.
    pub async fn bulk_insert_translations(
        &self,
        rows: &[(String, String, String)],
    ) -> PolyglotResult<u64> {
        if rows.is_empty() {
            return Ok(0);
        }
        let mut locales = Vec::with_capacity(rows.len());
        let mut keys = Vec::with_capacity(rows.len());
        let mut values = Vec::with_capacity(rows.len());
        for (locale, key, value) in rows {
            locales.push(locale.clone());
            keys.push(key.clone());
            values.push(value.clone());
        }

        let conn = self.get_conn().await?;
        conn.execute(
            "INSERT INTO translations (locale, key, value) \
             SELECT * FROM UNNEST($1::text[], $2::text[], $3::text[]) \
             ON CONFLICT (locale, key) DO NOTHING",
            &[&locales, &keys, &values],
        )
        .await
        .map_err(query_failed("bulk_insert_translations"))
    }

    /// Link many `(locale, key, tag name)` triples. Missing rows are skipped.
    pub async fn bulk_link_tags(&self, links: &[(String, String, String)]) -> PolyglotResult<u64> {
        if links.is_empty() {
            return Ok(0);
        }
        let mut locales = Vec::with_capacity(links.len());
        let mut keys = Vec::with_capacity(links.len());
        let mut tags = Vec::with_capacity(links.len());
        for (locale, key, tag) in links {
            locales.push(locale.clone());
            keys.push(key.clone());
            tags.push(tag.clone());
        }

        let conn = self.get_conn().await?;
        conn.execute(
            "INSERT INTO translation_tag (translation_id, tag_id) \
             SELECT t.id, g.id \
             FROM UNNEST($1::text[], $2::text[], $3::text[]) AS s(locale, key, tag) \
             JOIN translations t ON t.locale = s.locale AND t.key = s.key \
             JOIN tags g ON g.name = s.tag \
             ON CONFLICT DO NOTHING",
            &[&locales, &keys, &tags],
        )
        .await
        .map_err(query_failed("bulk_link_tags"))
    }

    /// Remove every translation, tag and association row.
    pub async fn truncate(&self) -> PolyglotResult<()> {
        let conn = self.get_conn().await?;
        conn.batch_execute("TRUNCATE translation_tag, translations, tags RESTART IDENTITY")
            .await
            .map_err(query_failed("truncate"))
    }

    async fn resolve_tag_ids(tx: &Transaction<'_>, names: &[String]) -> PolyglotResult<Vec<i64>> {
        let names = normalize_tag_names(names);
        if names.is_empty() {
            return Ok(Vec::new());
        }
        let rows = tx
            .query("SELECT id, name FROM tags WHERE name = ANY($1)", &[&names])
            .await
            .map_err(query_failed("resolve_tags"))?;
        let found: HashMap<String, i64> = rows
            .iter()
            .map(|r| (r.get::<_, String>("name"), r.get::<_, i64>("id")))
            .collect();

        let unknown: Vec<String> = names
            .iter()
            .filter(|n| !found.contains_key(n.as_str()))
            .cloned()
            .collect();
        if !unknown.is_empty() {
            return Err(StorageError::UnknownTags { names: unknown }.into());
        }
        Ok(names.iter().filter_map(|n| found.get(n).copied()).collect())
    }

    async fn replace_links(tx: &Transaction<'_>, id: i64, tag_ids: &[i64]) -> PolyglotResult<()> {
        tx.execute("DELETE FROM translation_tag WHERE translation_id = $1", &[&id])
            .await
            .map_err(query_failed("replace_links"))?;
        if !tag_ids.is_empty() {
            tx.execute(
                "INSERT INTO translation_tag (translation_id, tag_id) \
                 SELECT $1::bigint, UNNEST($2::bigint[])",
                &[&id, &tag_ids],
            )
            .await
            .map_err(query_failed("replace_links"))?;
        }
        Ok(())
    }

    /// Load the tags of each translation and pair them up, keeping input order.
    async fn attach_tags<C: deadpool_postgres::GenericClient>(
        conn: &C,
        translations: Vec<Translation>,
    ) -> PolyglotResult<Vec<TranslationWithTags>> {
        if translations.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<i64> = translations.iter().map(|t| t.id.get()).collect();
        let rows = conn
            .query(
                "SELECT tt.translation_id, g.id, g.name, g.created_at, g.updated_at \
                 FROM translation_tag tt JOIN tags g ON g.id = tt.tag_id \
                 WHERE tt.translation_id = ANY($1) \
                 ORDER BY g.name",
                &[&ids],
            )
            .await
            .map_err(query_failed("attach_tags"))?;

        let mut by_translation: HashMap<i64, Vec<Tag>> = HashMap::new();
        for row in &rows {
            by_translation
                .entry(row.get("translation_id"))
                .or_default()
                .push(tag_from_row(row));
        }

        Ok(translations
            .into_iter()
            .map(|translation| {
                let tags = by_translation
                    .remove(&translation.id.get())
                    .unwrap_or_default();
                TranslationWithTags { translation, tags }
            })
            .collect())
    }

    /// Load one translation with its tags, on a pooled client or inside a
    /// transaction.
    async fn load_translation<C: deadpool_postgres::GenericClient>(
        conn: &C,
        id: i64,
    ) -> PolyglotResult<Option<TranslationWithTags>> {
        let row = conn
            .query_opt(
                &format!("SELECT {} FROM translations t WHERE t.id = $1", TRANSLATION_COLUMNS),
                &[&id],
            )
            .await
            .map_err(query_failed("translation_get"))?;
        let Some(row) = row else {
            return Ok(None);
        };
        let mut loaded = Self::attach_tags(conn, vec![translation_from_row(&row)]).await?;
        Ok(loaded.pop())
    }
}

fn duplicate_translation(key: &str, locale: &str) -> String {
    format!("key '{}' already exists for locale '{}'", key, locale)
}

fn duplicate_tag(name: &str) -> String {
    format!("tag '{}' already exists", name)
}

#[async_trait]
impl TranslationStore for PgStore {
    async fn translation_create(&self, new: NewTranslation) -> PolyglotResult<TranslationWithTags> {
        let mut conn = self.get_conn().await?;
        let tx = conn.transaction().await.map_err(tx_failed)?;

        let tag_ids = Self::resolve_tag_ids(&tx, &new.tags).await?;
        let row = tx
            .query_one(
                "INSERT INTO translations (key, locale, value) VALUES ($1, $2, $3) RETURNING id",
                &[&new.key, &new.locale, &new.value],
            )
            .await
            .map_err(pg_error("translation_create", TranslationId::ENTITY_NAME, || {
                duplicate_translation(&new.key, &new.locale)
            }))?;
        let id: i64 = row.get("id");
        Self::replace_links(&tx, id, &tag_ids).await?;
        let created = Self::load_translation(&tx, id).await?.ok_or_else(|| {
            PolyglotError::from(StorageError::NotFound {
                entity: TranslationId::ENTITY_NAME,
                id,
            })
        })?;
        tx.commit().await.map_err(tx_failed)?;

        debug!(translation_id = id, locale = %new.locale, "translation created");
        Ok(created)
    }

    async fn translation_get(
        &self,
        id: TranslationId,
    ) -> PolyglotResult<Option<TranslationWithTags>> {
        let conn = self.get_conn().await?;
        Self::load_translation(&conn, id.get()).await
    }

    async fn translation_update(
        &self,
        id: TranslationId,
        patch: TranslationPatch,
    ) -> PolyglotResult<Option<TranslationWithTags>> {
        let mut conn = self.get_conn().await?;
        let tx = conn.transaction().await.map_err(tx_failed)?;

        let current = tx
            .query_opt(
                &format!(
                    "SELECT {} FROM translations t WHERE t.id = $1 FOR UPDATE",
                    TRANSLATION_COLUMNS
                ),
                &[&id.get()],
            )
            .await
            .map_err(query_failed("translation_update"))?;
        let Some(current) = current.as_ref().map(translation_from_row) else {
            return Ok(None);
        };

        let tag_ids = match &patch.tags {
            Some(names) => Some(Self::resolve_tag_ids(&tx, names).await?),
            None => None,
        };
        let key = patch.key.unwrap_or(current.key);
        let locale = patch.locale.unwrap_or(current.locale);
        let value = patch.value.unwrap_or(current.value);

        tx.execute(
            "UPDATE translations SET key = $2, locale = $3, value = $4, updated_at = now() \
             WHERE id = $1",
            &[&id.get(), &key, &locale, &value],
        )
        .await
        .map_err(pg_error("translation_update", TranslationId::ENTITY_NAME, || {
            duplicate_translation(&key, &locale)
        }))?;
        if let Some(tag_ids) = tag_ids {
            Self::replace_links(&tx, id.get(), &tag_ids).await?;
        }
        let updated = Self::load_translation(&tx, id.get()).await?;
        tx.commit().await.map_err(tx_failed)?;
        Ok(updated)
    }

    async fn translation_delete(&self, id: TranslationId) -> PolyglotResult<bool> {
        let conn = self.get_conn().await?;
        let deleted = conn
            .execute("DELETE FROM translations WHERE id = $1", &[&id.get()])
            .await
            .map_err(query_failed("translation_delete"))?;
        Ok(deleted > 0)
    }

    async fn translation_list(
        &self,
        filter: &TranslationFilter,
        page: PageRequest,
    ) -> PolyglotResult<Page<TranslationWithTags>> {
        let mut params = QueryParams::default();
        let mut conditions = Vec::new();
        if let Some(locale) = &filter.locale {
            conditions.push(format!("t.locale = {}", params.push(locale.clone())));
        }
        if let Some(prefix) = &filter.key_prefix {
            conditions.push(format!("starts_with(t.key, {})", params.push(prefix.clone())));
        }
        if let Some(query) = &filter.query {
            let p = params.push(query.to_lowercase());
            conditions.push(format!(
                "(strpos(lower(t.key), {p}) > 0 OR strpos(lower(t.value), {p}) > 0)"
            ));
        }
        if !filter.tags.is_empty() {
            let p = params.push(normalize_tag_names(&filter.tags));
            conditions.push(any_tag_condition(&p));
        }
        let where_sql = where_clause(&conditions);

        let conn = self.get_conn().await?;
        let total: i64 = conn
            .query_one(
                &format!("SELECT count(*) FROM translations t {}", where_sql),
                &params.refs(),
            )
            .await
            .map_err(query_failed("translation_list"))?
            .get(0);

        let limit = params.push(to_i64(page.limit()));
        let offset = params.push(to_i64(page.offset()));
        let rows = conn
            .query(
                &format!(
                    "SELECT {} FROM translations t {} \
                     ORDER BY t.locale, t.key LIMIT {} OFFSET {}",
                    TRANSLATION_COLUMNS, where_sql, limit, offset
                ),
                &params.refs(),
            )
            .await
            .map_err(query_failed("translation_list"))?;

        let translations = rows.iter().map(translation_from_row).collect();
        let data = Self::attach_tags(&conn, translations).await?;
        Ok(Page::new(data, page, u64::try_from(total).unwrap_or(0)))
    }

    async fn export_chunk(
        &self,
        scan: &ExportScan,
        after: Option<&ExportCursor>,
        limit: usize,
    ) -> PolyglotResult<Vec<ExportRow>> {
        let mut params = QueryParams::default();
        let mut conditions = Vec::new();
        if let Some(locale) = &scan.locale {
            conditions.push(format!("t.locale = {}", params.push(locale.clone())));
        }
        if let Some(cursor) = after {
            let locale = params.push(cursor.locale.clone());
            let key = params.push(cursor.key.clone());
            conditions.push(format!("(t.locale, t.key) > ({}, {})", locale, key));
        }
        if !scan.tags.is_empty() {
            let p = params.push(scan.tags.clone());
            conditions.push(any_tag_condition(&p));
        }
        let limit = params.push(i64::try_from(limit).unwrap_or(i64::MAX));

        let conn = self.get_conn().await?;
        let rows = conn
            .query(
                &format!(
                    "SELECT t.locale, t.key, t.value FROM translations t {} \
                     ORDER BY t.locale, t.key LIMIT {}",
                    where_clause(&conditions),
                    limit
                ),
                &params.refs(),
            )
            .await
            .map_err(query_failed("export_chunk"))?;

        Ok(rows
            .iter()
            .map(|r| ExportRow {
                locale: r.get("locale"),
                key: r.get("key"),
                value: r.get("value"),
            })
            .collect())
    }

    async fn locales_distinct(&self) -> PolyglotResult<Vec<String>> {
        let conn = self.get_conn().await?;
        let rows = conn
            .query(
                "SELECT DISTINCT locale FROM translations ORDER BY locale",
                &[],
            )
            .await
            .map_err(query_failed("locales_distinct"))?;
        Ok(rows.iter().map(|r| r.get("locale")).collect())
    }

    async fn tag_create(&self, name: &str) -> PolyglotResult<Tag> {
        let conn = self.get_conn().await?;
        let row = conn
            .query_one(
                &format!("INSERT INTO tags (name) VALUES ($1) RETURNING {}", TAG_COLUMNS),
                &[&name],
            )
            .await
            .map_err(pg_error("tag_create", TagId::ENTITY_NAME, || duplicate_tag(name)))?;
        Ok(tag_from_row(&row))
    }

    async fn tag_get(&self, id: TagId) -> PolyglotResult<Option<Tag>> {
        let conn = self.get_conn().await?;
        let row = conn
            .query_opt(
                &format!("SELECT {} FROM tags WHERE id = $1", TAG_COLUMNS),
                &[&id.get()],
            )
            .await
            .map_err(query_failed("tag_get"))?;
        Ok(row.as_ref().map(tag_from_row))
    }

    async fn tag_update(&self, id: TagId, name: &str) -> PolyglotResult<Option<Tag>> {
        let conn = self.get_conn().await?;
        let row = conn
            .query_opt(
                &format!(
                    "UPDATE tags SET name = $2, updated_at = now() WHERE id = $1 RETURNING {}",
                    TAG_COLUMNS
                ),
                &[&id.get(), &name],
            )
            .await
            .map_err(pg_error("tag_update", TagId::ENTITY_NAME, || duplicate_tag(name)))?;
        Ok(row.as_ref().map(tag_from_row))
    }

    async fn tag_delete(&self, id: TagId) -> PolyglotResult<bool> {
        let conn = self.get_conn().await?;
        let deleted = conn
            .execute("DELETE FROM tags WHERE id = $1", &[&id.get()])
            .await
            .map_err(query_failed("tag_delete"))?;
        Ok(deleted > 0)
    }

    async fn tag_list(&self, filter: &TagFilter, page: PageRequest) -> PolyglotResult<Page<Tag>> {
        let mut params = QueryParams::default();
        let mut conditions = Vec::new();
        if let Some(search) = &filter.search {
            let p = params.push(search.to_lowercase());
            conditions.push(format!("strpos(lower(name), {}) > 0", p));
        }
        let where_sql = where_clause(&conditions);

        let conn = self.get_conn().await?;
        let total: i64 = conn
            .query_one(&format!("SELECT count(*) FROM tags {}", where_sql), &params.refs())
            .await
            .map_err(query_failed("tag_list"))?
            .get(0);

        let limit = params.push(to_i64(page.limit()));
        let offset = params.push(to_i64(page.offset()));
        let rows = conn
            .query(
                &format!(
                    "SELECT {} FROM tags {} ORDER BY name LIMIT {} OFFSET {}",
                    TAG_COLUMNS, where_sql, limit, offset
                ),
                &params.refs(),
            )
            .await
            .map_err(query_failed("tag_list"))?;

        Ok(Page::new(
            rows.iter().map(tag_from_row).collect(),
            page,
            u64::try_from(total).unwrap_or(0),
        ))
    }

    async fn tag_all(&self) -> PolyglotResult<Vec<Tag>> {
        let conn = self.get_conn().await?;
        let rows = conn
            .query(&format!("SELECT {} FROM tags ORDER BY name", TAG_COLUMNS), &[])
            .await
            .map_err(query_failed("tag_all"))?;
        Ok(rows.iter().map(tag_from_row).collect())
    }

    async fn ping(&self) -> PolyglotResult<()> {
        let conn = self.get_conn().await?;
        conn.query_one("SELECT 1", &[])
            .await
            .map_err(query_failed("ping"))?;
        Ok(())
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn user_find_by_email(&self, email: &str) -> PolyglotResult<Option<UserCredentials>> {
        let conn = self.get_conn().await?;
        let row = conn
            .query_opt(
                &format!("SELECT {} FROM users WHERE email = $1", USER_COLUMNS),
                &[&email],
            )
            .await
            .map_err(query_failed("user_find_by_email"))?;
        Ok(row.as_ref().map(user_from_row))
    }

    async fn user_upsert(&self, user: NewUser) -> PolyglotResult<UserCredentials> {
        let conn = self.get_conn().await?;
        let row = conn
            .query_one(
                &format!(
                    "INSERT INTO users (email, name, password_salt, password_hash) \
                     VALUES ($1, $2, $3, $4) \
                     ON CONFLICT (email) DO UPDATE SET \
                       name = EXCLUDED.name, \
                       password_salt = EXCLUDED.password_salt, \
                       password_hash = EXCLUDED.password_hash, \
                       updated_at = now() \
                     RETURNING {}",
                    USER_COLUMNS
                ),
                &[&user.email, &user.name, &user.password_salt, &user.password_hash],
            )
            .await
            .map_err(query_failed("user_upsert"))?;
        Ok(user_from_row(&row))
    }
}

// ============================================================================
// TESTS
// ============================================================================
