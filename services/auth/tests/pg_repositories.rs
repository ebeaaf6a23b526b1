//! PostgreSQL repository tests
//!
//! Skipped when `DATABASE_URL` is not set.

use chrono::{Duration, Utc};
use common::database::{DatabaseConfig, init_pool};
use pin_auth::{
    database::run_migrations,
    models::User,
    repositories::{
        PgPinRepository, PgTokenRepository, PgUserDirectory, PinRepository, TokenRepository,
        UserDirectory,
    },
};
use sqlx::PgPool;
use uuid::Uuid;

async fn test_pool() -> Option<PgPool> {
    if std::env::var("DATABASE_URL").is_err() {
        eprintln!("DATABASE_URL not set, skipping PostgreSQL repository test");
        return None;
    }

    let config = DatabaseConfig::from_env().unwrap();
    let pool = init_pool(&config).await.unwrap();
    run_migrations(&pool).await.unwrap();
    Some(pool)
}

async fn create_user(pool: &PgPool) -> User {
    let email = format!("user-{}@Example.com", Uuid::new_v4());
    sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (email, name)
        VALUES ($1, $2)
        RETURNING id, email, name, created_at, updated_at
        "#,
    )
    .bind(&email)
    .bind("Test User")
    .fetch_one(pool)
    .await
    .unwrap()
}

#[tokio::test]
async fn users_are_found_case_insensitively() {
    let Some(pool) = test_pool().await else { return };
    let user = create_user(&pool).await;
    let users = PgUserDirectory::new(pool);

    let found = users
        .find_by_email(&user.email.to_uppercase())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id, user.id);

    assert!(
        users
            .find_by_email("absent@example.com")
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn pin_upsert_keeps_one_row_per_user() {
    let Some(pool) = test_pool().await else { return };
    let user = create_user(&pool).await;
    let pins = PgPinRepository::new(pool.clone());

    let first = pins.upsert(user.id, "111111").await.unwrap();
    let second = pins.upsert(user.id, "222222").await.unwrap();

    assert_eq!(first.id, second.id);
    assert!(second.updated_at >= first.updated_at);

    let count: i64 = sqlx::query_scalar("SELECT count(*) FROM auth_pins WHERE user_id = $1")
        .bind(user.id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 1);

    let since = Utc::now() - Duration::minutes(5);
    assert!(
        pins.find_fresh(&user.email, "111111", since)
            .await
            .unwrap()
            .is_none()
    );
    assert!(
        pins.find_fresh(&user.email, "222222", since)
            .await
            .unwrap()
            .is_some()
    );
}

#[tokio::test]
async fn stale_pins_are_not_fresh() {
    let Some(pool) = test_pool().await else { return };
    let user = create_user(&pool).await;
    let pins = PgPinRepository::new(pool.clone());
    pins.upsert(user.id, "333333").await.unwrap();

    sqlx::query("UPDATE auth_pins SET updated_at = now() - interval '6 minutes' WHERE user_id = $1")
        .bind(user.id)
        .execute(&pool)
        .await
        .unwrap();

    let since = Utc::now() - Duration::minutes(5);
    assert!(
        pins.find_fresh(&user.email, "333333", since)
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn consuming_a_pin_rotates_the_token_once() {
    let Some(pool) = test_pool().await else { return };
    let user = create_user(&pool).await;
    let pins = PgPinRepository::new(pool.clone());
    let tokens = PgTokenRepository::new(pool.clone());

    tokens.rotate(user.id, &Uuid::new_v4().to_string()).await.unwrap();
    pins.upsert(user.id, "444444").await.unwrap();

    let since = Utc::now() - Duration::minutes(5);
    let pin = pins
        .find_fresh(&user.email, "444444", since)
        .await
        .unwrap()
        .unwrap();

    let new_token = Uuid::new_v4().to_string();
    let (first, second) = tokio::join!(
        pins.consume_and_rotate(&pin, since, &new_token),
        pins.consume_and_rotate(&pin, since, &new_token),
    );
    let rotated: Vec<_> = [first.unwrap(), second.unwrap()]
        .into_iter()
        .flatten()
        .collect();

    assert_eq!(rotated.len(), 1);
    assert_eq!(rotated[0].token, new_token);
    assert!(PinRepository::find_by_user(&pins, user.id).await.unwrap().is_none());

    let owner = tokens.find_user_by_token(&new_token).await.unwrap().unwrap();
    assert_eq!(owner.id, user.id);
}

#[tokio::test]
async fn rotating_replaces_the_previous_token() {
    let Some(pool) = test_pool().await else { return };
    let user = create_user(&pool).await;
    let tokens = PgTokenRepository::new(pool);

    let old = Uuid::new_v4().to_string();
    let new = Uuid::new_v4().to_string();
    let first = tokens.rotate(user.id, &old).await.unwrap();
    let second = tokens.rotate(user.id, &new).await.unwrap();

    assert_eq!(first.id, second.id);
    assert!(tokens.find_user_by_token(&old).await.unwrap().is_none());
    assert_eq!(
        tokens.find_by_user(user.id).await.unwrap().unwrap().token,
        new
    );
}
