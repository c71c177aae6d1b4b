pub(crate) mod error;
pub(crate) mod memory;
pub(crate) mod postgres;

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::PgPool;
use time::PrimitiveDateTime;

use crate::db::models::{Exam, ExamSession, Question, User};
use crate::db::types::{SessionStatus, UserRole};
use crate::services::grading::Score;

pub(crate) use error::ExamError;

/// Read side of exams and their question sets.
#[async_trait]
pub(crate) trait ExamCatalog: Send + Sync {
    /// Visible exams only; hidden or missing exams are `NotFound`.
    async fn get_exam(&self, exam_id: &str) -> Result<Exam, ExamError>;

    /// Any exam regardless of visibility.
    async fn find_exam(&self, exam_id: &str) -> Result<Option<Exam>, ExamError>;

    /// Ordered by creation time, then insertion order, so an import keeps file order.
    async fn list_questions(&self, exam_id: &str) -> Result<Vec<Question>, ExamError>;

    async fn list_visible_exams(&self) -> Result<Vec<Exam>, ExamError>;
}

#[derive(Debug, Clone)]
pub(crate) struct NewSession<'a> {
    pub(crate) student_id: &'a str,
    pub(crate) exam_id: &'a str,
    pub(crate) duration_seconds: i64,
    pub(crate) now: PrimitiveDateTime,
}

/// Result of a finalize call; `transitioned` is false when the session was
/// already in the requested terminal status.
#[derive(Debug, Clone)]
pub(crate) struct Finalized {
    pub(crate) session: ExamSession,
    pub(crate) transitioned: bool,
}

#[async_trait]
pub(crate) trait SessionStore: Send + Sync {
    /// Returns the single session for the pair, creating it on first call.
    async fn load_or_create(&self, new: NewSession<'_>) -> Result<ExamSession, ExamError>;

    /// Session with its answers.
    async fn find(&self, session_id: &str) -> Result<ExamSession, ExamError>;

    /// Durably stores the answer before returning, replacing any earlier one.
    async fn record_answer(
        &self,
        session_id: &str,
        question_id: &str,
        option_label: &str,
        now: PrimitiveDateTime,
    ) -> Result<(), ExamError>;

    /// Moves the session to `status`. A repeat with the same status is a no-op;
    /// a different terminal status is `InvalidState`.
    async fn finalize(
        &self,
        session_id: &str,
        status: SessionStatus,
        remaining_seconds: i64,
        now: PrimitiveDateTime,
    ) -> Result<Finalized, ExamError>;

    async fn record_grade(
        &self,
        session_id: &str,
        score: Score,
        now: PrimitiveDateTime,
    ) -> Result<(), ExamError>;

    /// In-progress sessions whose deadline is at or before `now`.
    async fn list_overdue(&self, now: PrimitiveDateTime) -> Result<Vec<ExamSession>, ExamError>;

    async fn list_terminal_by_exam(&self, exam_id: &str) -> Result<Vec<ExamSession>, ExamError>;
}

/// Admin-side writes to exams and questions.
#[async_trait]
pub(crate) trait QuestionBank: Send + Sync {
    async fn create_exam(&self, exam: Exam) -> Result<Exam, ExamError>;

    /// All exams ordered by creation time.
    async fn list_exams(&self) -> Result<Vec<Exam>, ExamError>;

    async fn update_exam(&self, exam: Exam) -> Result<Exam, ExamError>;

    /// Removes the exam with its questions, sessions and answers.
    async fn delete_exam(&self, exam_id: &str) -> Result<(), ExamError>;

    /// Returns false when the exam already holds a question with the same fingerprint.
    async fn insert_question(&self, question: Question) -> Result<bool, ExamError>;

    async fn find_question(&self, question_id: &str) -> Result<Question, ExamError>;

    async fn update_question(&self, question: Question) -> Result<Question, ExamError>;

    async fn delete_question(&self, question_id: &str) -> Result<(), ExamError>;
}

#[async_trait]
pub(crate) trait UserDirectory: Send + Sync {
    async fn find_by_login_key(&self, login_key: &str) -> Result<Option<User>, ExamError>;

    async fn find_user(&self, user_id: &str) -> Result<Option<User>, ExamError>;

    /// Fails with `InvalidInput` when the login key is taken.
    async fn create_user(&self, user: User) -> Result<User, ExamError>;

    async fn update_user(&self, user: User) -> Result<User, ExamError>;

    /// Users with the given role ordered by creation time.
    async fn list_users(&self, role: UserRole) -> Result<Vec<User>, ExamError>;

    /// Removes the user and every session they own.
    async fn delete_user(&self, user_id: &str) -> Result<(), ExamError>;

    /// Liveness check used by `/healthz`.
    async fn ping(&self) -> Result<(), ExamError>;
}

/// One backend seen through each of its roles.
#[derive(Clone)]
pub(crate) struct Stores {
    pub(crate) catalog: Arc<dyn ExamCatalog>,
    pub(crate) sessions: Arc<dyn SessionStore>,
    pub(crate) bank: Arc<dyn QuestionBank>,
    pub(crate) users: Arc<dyn UserDirectory>,
}

impl Stores {
    fn from_backend<S>(backend: Arc<S>) -> Self
    where
        S: ExamCatalog + SessionStore + QuestionBank + UserDirectory + 'static,
    {
        Self {
            catalog: backend.clone(),
            sessions: backend.clone(),
            bank: backend.clone(),
            users: backend,
        }
    }

    pub(crate) fn postgres(pool: PgPool) -> Self {
        Self::from_backend(Arc::new(postgres::PgStore::new(pool)))
    }

    pub(crate) fn memory() -> Self {
        Self::from_backend(Arc::new(memory::MemoryStore::default()))
    }
}
