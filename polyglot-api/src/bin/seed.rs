//! Database Seeder Binary
//!
//! Fills the Postgres store with generated translations spread across
//! locales and tags, and upserts an admin account for `POST /login`.
//!
//! Usage:
//!   cargo run -p polyglot-api --bin polyglot-seed -- [COUNT] [--fresh]
//!
//! `COUNT` defaults to 100000. `--fresh` truncates existing data first.
//! The admin account comes from `POLYGLOT_ADMIN_EMAIL` and
//! `POLYGLOT_ADMIN_PASSWORD`.

use std::time::Instant;

use polyglot_api::telemetry::{init_tracing, TelemetryConfig};
use polyglot_api::{generate_salt, hash_password, ApiError, ApiResult, DbConfig, PgStore};
use polyglot_core::{NewUser, StorageError};
use polyglot_storage::{TranslationStore, UserStore};
use rand::Rng;

const DEFAULT_COUNT: usize = 100_000;
const BATCH_SIZE: usize = 5_000;

const LOCALES: &[&str] = &["en", "fr", "de", "es", "it", "pt_BR", "ja", "zh-Hant"];
const TAGS: &[&str] = &["web", "mobile", "desktop", "email", "marketing", "admin"];
const SECTIONS: &[&str] = &[
    "auth", "checkout", "dashboard", "errors", "home", "nav", "profile", "settings",
];

struct SeedArgs {
    count: usize,
    fresh: bool,
}

fn parse_args() -> ApiResult<SeedArgs> {
    let mut args = SeedArgs {
        count: DEFAULT_COUNT,
        fresh: false,
    };
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--fresh" => args.fresh = true,
            other => {
                args.count = other.parse().map_err(|_| {
                    ApiError::invalid_input(format!("Invalid translation count: {}", other))
                })?;
            }
        }
    }
    Ok(args)
}

/// Row `i` of the generated set. Consecutive rows share a key across locales.
fn generated_row(i: usize) -> (String, String, String) {
    let locale = LOCALES[i % LOCALES.len()];
    let item = i / LOCALES.len();
    let section = SECTIONS[item % SECTIONS.len()];
    let key = format!("{}.item_{}", section, item);
    let value = format!("{} {} ({})", section, item, locale);
    (locale.to_string(), key, value)
}

async fn ensure_tags(store: &PgStore) -> ApiResult<()> {
    for name in TAGS {
        match store.tag_create(name).await {
            Ok(_) => {}
            Err(polyglot_core::PolyglotError::Storage(StorageError::Conflict { .. })) => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

async fn seed_admin(store: &PgStore) -> ApiResult<()> {
    let email =
        std::env::var("POLYGLOT_ADMIN_EMAIL").unwrap_or_else(|_| "admin@polyglot.local".to_string());
    let password = match std::env::var("POLYGLOT_ADMIN_PASSWORD") {
        Ok(password) => password,
        Err(_) => {
            tracing::warn!("POLYGLOT_ADMIN_PASSWORD not set, using the development default");
            "polyglot-dev-password".to_string()
        }
    };

    let salt = generate_salt();
    let password_hash = hash_password(&salt, &password)?;
    let user = store
        .user_upsert(NewUser {
            email,
            name: "Administrator".to_string(),
            password_salt: salt,
            password_hash,
        })
        .await?;
    tracing::info!(user_id = %user.id, email = %user.email, "Admin account ready");
    Ok(())
}

#[tokio::main]
async fn main() -> ApiResult<()> {
    init_tracing(&TelemetryConfig::default())?;
    let args = parse_args()?;

    let store = PgStore::from_config(&DbConfig::from_env())?;
    store.migrate().await?;
    if args.fresh {
        store.truncate().await?;
        tracing::info!("Existing translations and tags removed");
    }

    ensure_tags(&store).await?;

    let started = Instant::now();
    let mut rng = rand::rng();
    let mut inserted = 0u64;
    let mut linked = 0u64;

    for batch_start in (0..args.count).step_by(BATCH_SIZE) {
        let batch_end = (batch_start + BATCH_SIZE).min(args.count);
        let rows: Vec<_> = (batch_start..batch_end).map(generated_row).collect();

        let mut links = Vec::with_capacity(rows.len());
        for (locale, key, _) in &rows {
            for _ in 0..rng.random_range(0..=2) {
                let tag = TAGS[rng.random_range(0..TAGS.len())];
                links.push((locale.clone(), key.clone(), tag.to_string()));
            }
        }

        inserted += store.bulk_insert_translations(&rows).await?;
        linked += store.bulk_link_tags(&links).await?;
        tracing::info!(done = batch_end, total = args.count, "Seeded batch");
    }

    seed_admin(&store).await?;

    tracing::info!(
        inserted,
        linked,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Seeding complete"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_rows_are_unique_per_locale() {
        let rows: Vec<_> = (0..LOCALES.len() * 20).map(generated_row).collect();
        let unique: std::collections::HashSet<_> =
            rows.iter().map(|(l, k, _)| (l.clone(), k.clone())).collect();
        assert_eq!(unique.len(), rows.len());
    }

    #[test]
    fn test_consecutive_rows_share_key_across_locales() {
        let first: Vec<_> = (0..LOCALES.len()).map(generated_row).collect();
        assert!(first.iter().all(|(_, k, _)| k == &first[0].1));
        let locales: Vec<_> = first.iter().map(|(l, _, _)| l.as_str()).collect();
        assert_eq!(locales, LOCALES);
    }
}
