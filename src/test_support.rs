use std::sync::{Arc, Mutex as StdMutex, OnceLock};

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request},
    Router,
};
use sqlx::PgPool;
use time::{macros::datetime, Duration, OffsetDateTime};
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::api;
use crate::core::{
    clock::Clock, config::Settings, redis::RedisHandle, security, state::AppState,
    time::to_primitive_utc,
};
use crate::db::models::{Exam, Question, User};
use crate::db::types::{OptionLabel, UserRole};
use crate::services::identity::{self, NewUser};
use crate::services::questions;
use crate::store::Stores;

const TEST_SECRET_KEY: &str = "test-secret";
const TEST_REDIS_DB: &str = "1";
pub(crate) const TEST_SUPERUSER_PASSWORD: &str = "admin-pass";

/// Clock that only moves when a test advances it.
pub(crate) struct ManualClock {
    now: StdMutex<OffsetDateTime>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self { now: StdMutex::new(datetime!(2025-03-10 09:00:00 UTC)) }
    }
}

impl ManualClock {
    pub(crate) fn advance(&self, by: Duration) {
        let mut now = self.now.lock().expect("clock lock");
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> OffsetDateTime {
        *self.now.lock().expect("clock lock")
    }
}

pub(crate) struct TestContext {
    pub(crate) state: AppState,
    pub(crate) app: Router,
    pub(crate) clock: Arc<ManualClock>,
    _guard: OwnedMutexGuard<()>,
}

pub(crate) async fn env_lock() -> OwnedMutexGuard<()> {
    static LOCK: OnceLock<Arc<Mutex<()>>> = OnceLock::new();
    let lock = LOCK.get_or_init(|| Arc::new(Mutex::new(()))).clone();
    lock.lock_owned().await
}

pub(crate) fn set_test_env() {
    std::env::set_var("CBT_ENV", "test");
    std::env::set_var("CBT_STRICT_CONFIG", "0");
    std::env::set_var("CBT_STORE_BACKEND", "memory");
    std::env::set_var("SECRET_KEY", TEST_SECRET_KEY);
    std::env::set_var("REDIS_HOST", "127.0.0.1");
    std::env::set_var("REDIS_PORT", "6379");
    std::env::set_var("REDIS_DB", TEST_REDIS_DB);
    std::env::remove_var("REDIS_PASSWORD");
    std::env::set_var("PROMETHEUS_ENABLED", "0");
    std::env::set_var("QUESTIONS_PER_PAGE", "5");
    std::env::set_var("LOGIN_RATE_LIMIT", "10");
    std::env::set_var("FIRST_SUPERUSER_LOGIN", "admin");
    std::env::set_var("FIRST_SUPERUSER_PASSWORD", TEST_SUPERUSER_PASSWORD);
}

/// App wired to the in-memory backend with a manual clock. Redis is never
/// connected, so rate limiting fails open.
pub(crate) async fn setup_test_context() -> TestContext {
    let guard = env_lock().await;
    set_test_env();

    let settings = Settings::load().expect("settings");
    let redis = RedisHandle::new(settings.redis().redis_url());
    let clock = Arc::new(ManualClock::default());

    let state = AppState::new(settings, redis, Stores::memory(), clock.clone());
    let app = api::router::router(state.clone());

    TestContext { state, app, clock, _guard: guard }
}

/// Live Postgres for store contract tests, migrated and emptied. `None` when
/// DATABASE_URL is unset so the tests skip.
pub(crate) async fn prepare_db() -> Option<(OwnedMutexGuard<()>, PgPool)> {
    static LOCK: OnceLock<Arc<Mutex<()>>> = OnceLock::new();

    dotenvy::dotenv().ok();
    let url = std::env::var("DATABASE_URL").ok().filter(|url| !url.trim().is_empty())?;
    let guard = LOCK.get_or_init(|| Arc::new(Mutex::new(()))).clone().lock_owned().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(8)
        .connect(&url)
        .await
        .expect("connect DATABASE_URL");
    ensure_schema(&pool).await.expect("schema");
    reset_db(&pool).await.expect("reset db");
    Some((guard, pool))
}

async fn ensure_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    let migrations_dir =
        std::env::var("CBT_MIGRATIONS_DIR").unwrap_or_else(|_| "migrations".to_string());
    let mut migrator = sqlx::migrate::Migrator::new(std::path::Path::new(&migrations_dir))
        .await
        .map_err(|error| sqlx::Error::Migrate(Box::new(error)))?;
    migrator.set_ignore_missing(true);
    migrator.run(pool).await.map_err(|error| sqlx::Error::Migrate(Box::new(error)))?;
    Ok(())
}

async fn reset_db(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query(
        "TRUNCATE session_answers, exam_sessions, questions, exams, users RESTART IDENTITY CASCADE",
    )
    .execute(pool)
    .await?;
    Ok(())
}

pub(crate) async fn insert_user(
    state: &AppState,
    login: &str,
    full_name: &str,
    password: &str,
    role: UserRole,
) -> User {
    let now = to_primitive_utc(state.clock().now());
    let user = identity::build_user(
        NewUser { login, full_name, department: Some("Computer Science"), role, password },
        now,
    )
    .expect("build user");

    state.stores().users.create_user(user).await.expect("insert user")
}

pub(crate) async fn insert_student(state: &AppState, login: &str) -> User {
    insert_user(state, login, "Test Student", "student-pass", UserRole::Student).await
}

pub(crate) async fn insert_admin(state: &AppState, login: &str) -> User {
    insert_user(state, login, "Test Admin", "admin-pass", UserRole::Admin).await
}

pub(crate) struct ExamFlags {
    pub(crate) visible: bool,
    pub(crate) allow_review: bool,
    pub(crate) allow_result: bool,
}

impl Default for ExamFlags {
    fn default() -> Self {
        Self { visible: true, allow_review: false, allow_result: true }
    }
}

pub(crate) async fn create_exam(
    state: &AppState,
    course_code: &str,
    duration_minutes: i32,
    flags: ExamFlags,
) -> Exam {
    let now = to_primitive_utc(state.clock().now());
    let exam = Exam {
        id: Uuid::new_v4().to_string(),
        course_code: course_code.to_string(),
        title: format!("{course_code} final examination"),
        duration_minutes,
        visible: flags.visible,
        allow_review: flags.allow_review,
        allow_result: flags.allow_result,
        created_at: now,
        updated_at: now,
    };

    state.stores().bank.create_exam(exam).await.expect("create exam")
}

/// Adds a question whose options are "w", "x", "y", "z".
pub(crate) async fn add_question(
    state: &AppState,
    exam_id: &str,
    text: &str,
    correct: OptionLabel,
) -> Question {
    let now = to_primitive_utc(state.clock().now());
    let draft = questions::draft(text, ["w", "x", "y", "z"], correct.as_str()).expect("draft");
    let question = questions::build(exam_id, draft, now);

    let inserted =
        state.stores().bank.insert_question(question.clone()).await.expect("insert question");
    assert!(inserted, "duplicate question text: {text}");
    question
}

pub(crate) fn bearer_token(user: &User, settings: &Settings) -> String {
    security::create_access_token(&user.id, user.role, settings, None).expect("token")
}

pub(crate) fn json_request(
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<serde_json::Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }

    if let Some(body) = body {
        builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("request")
    } else {
        builder.body(Body::empty()).expect("request")
    }
}

pub(crate) fn text_request(method: Method, uri: &str, token: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(header::CONTENT_TYPE, "text/csv")
        .body(Body::from(body.to_string()))
        .expect("request")
}

pub(crate) async fn read_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
    if bytes.is_empty() {
        return serde_json::Value::Null;
    }
    serde_json::from_slice(&bytes).expect("json body")
}
