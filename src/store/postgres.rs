use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::PgPool;
use time::PrimitiveDateTime;
use uuid::Uuid;

use crate::core::metrics;
use crate::db::models::{Exam, ExamSession, Question, QuestionRow, User};
use crate::db::types::{OptionLabel, SessionStatus, UserRole};
use crate::repositories;
use crate::repositories::sessions::CreateSession;
use crate::services::grading::Score;
use crate::store::{
    ExamCatalog, ExamError, Finalized, NewSession, QuestionBank, SessionStore, UserDirectory,
};

/// Postgres-backed implementation of every store role.
pub(crate) struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub(crate) fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn attach_answers(
        &self,
        mut sessions: Vec<ExamSession>,
    ) -> Result<Vec<ExamSession>, ExamError> {
        let ids = sessions.iter().map(|session| session.id.clone()).collect::<Vec<_>>();
        let rows = repositories::sessions::list_answers(&self.pool, &ids).await?;

        let mut by_session: HashMap<String, HashMap<String, OptionLabel>> = HashMap::new();
        for row in rows {
            let Some(label) = OptionLabel::parse(row.option_label.trim()) else {
                tracing::warn!(
                    session_id = %row.session_id,
                    question_id = %row.question_id,
                    option_label = %row.option_label,
                    "Skipping stored answer with unknown option label"
                );
                continue;
            };
            by_session.entry(row.session_id).or_default().insert(row.question_id, label);
        }

        for session in &mut sessions {
            session.answers = by_session.remove(&session.id).unwrap_or_default();
        }

        Ok(sessions)
    }

    async fn attach_one(&self, session: ExamSession) -> Result<ExamSession, ExamError> {
        self.attach_answers(vec![session])
            .await?
            .pop()
            .ok_or(ExamError::NotFound("Session"))
    }
}

fn question_from_row(row: QuestionRow) -> Result<Question, ExamError> {
    Question::try_from(row).map_err(|err| {
        tracing::error!(error = %err, "Stored question is malformed");
        ExamError::StoreUnavailable(err)
    })
}

/// Unique violations become `InvalidInput` with the given message.
fn map_write_error(err: sqlx::Error, duplicate: &str) -> ExamError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            return ExamError::invalid_input(duplicate);
        }
        if db_err.is_foreign_key_violation() {
            return ExamError::NotFound("Exam");
        }
    }
    err.into()
}

#[async_trait]
impl ExamCatalog for PgStore {
    async fn get_exam(&self, exam_id: &str) -> Result<Exam, ExamError> {
        repositories::exams::find_visible_by_id(&self.pool, exam_id)
            .await?
            .ok_or(ExamError::NotFound("Exam"))
    }

    async fn find_exam(&self, exam_id: &str) -> Result<Option<Exam>, ExamError> {
        Ok(repositories::exams::find_by_id(&self.pool, exam_id).await?)
    }

    async fn list_questions(&self, exam_id: &str) -> Result<Vec<Question>, ExamError> {
        repositories::questions::list_by_exam(&self.pool, exam_id)
            .await?
            .into_iter()
            .map(question_from_row)
            .collect()
    }

    async fn list_visible_exams(&self) -> Result<Vec<Exam>, ExamError> {
        Ok(repositories::exams::list_visible(&self.pool).await?)
    }
}

#[async_trait]
impl SessionStore for PgStore {
    async fn load_or_create(&self, new: NewSession<'_>) -> Result<ExamSession, ExamError> {
        let id = Uuid::new_v4().to_string();
        let created = repositories::sessions::create_if_absent(
            &self.pool,
            CreateSession {
                id: &id,
                exam_id: new.exam_id,
                student_id: new.student_id,
                started_at: new.now,
                duration_seconds: new.duration_seconds,
            },
        )
        .await?;

        if created {
            tracing::info!(
                session_id = %id,
                exam_id = %new.exam_id,
                student_id = %new.student_id,
                "Created exam session"
            );
            metrics::session_started();
        }

        let session =
            repositories::sessions::find_by_student_exam(&self.pool, new.student_id, new.exam_id)
                .await?
                .ok_or(ExamError::NotFound("Session"))?;

        self.attach_one(session).await
    }

    async fn find(&self, session_id: &str) -> Result<ExamSession, ExamError> {
        let session = repositories::sessions::find_by_id(&self.pool, session_id)
            .await?
            .ok_or(ExamError::NotFound("Session"))?;

        self.attach_one(session).await
    }

    async fn record_answer(
        &self,
        session_id: &str,
        question_id: &str,
        option_label: &str,
        now: PrimitiveDateTime,
    ) -> Result<(), ExamError> {
        let mut tx = self.pool.begin().await?;

        let Some((status, exam_id)) =
            repositories::sessions::lock_for_answer(&mut *tx, session_id).await?
        else {
            return Err(ExamError::NotFound("Session"));
        };

        if status != SessionStatus::InProgress {
            return Err(ExamError::invalid_state(format!("session is already {}", status.as_str())));
        }

        let label = OptionLabel::parse(option_label).ok_or_else(|| {
            ExamError::invalid_input(format!("'{option_label}' is not one of A, B, C, D"))
        })?;

        if !repositories::questions::belongs_to_exam(&mut *tx, question_id, &exam_id).await? {
            return Err(ExamError::invalid_input("question does not belong to this exam"));
        }

        repositories::sessions::upsert_answer(
            &mut *tx,
            session_id,
            question_id,
            label.as_str(),
            now,
        )
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn finalize(
        &self,
        session_id: &str,
        status: SessionStatus,
        remaining_seconds: i64,
        now: PrimitiveDateTime,
    ) -> Result<Finalized, ExamError> {
        if !status.is_terminal() {
            return Err(ExamError::invalid_input("finalize target must be a terminal status"));
        }

        let transitioned =
            repositories::sessions::finalize(&self.pool, session_id, status, remaining_seconds, now)
                .await?;
        let session = self.find(session_id).await?;

        if !transitioned && session.status != status {
            return Err(ExamError::invalid_state(format!(
                "session is already {}",
                session.status.as_str()
            )));
        }

        Ok(Finalized { session, transitioned })
    }

    async fn record_grade(
        &self,
        session_id: &str,
        score: Score,
        now: PrimitiveDateTime,
    ) -> Result<(), ExamError> {
        let updated = repositories::sessions::record_grade(
            &self.pool,
            session_id,
            score.correct as i32,
            score.total as i32,
            now,
        )
        .await?;

        if updated {
            return Ok(());
        }

        match repositories::sessions::find_by_id(&self.pool, session_id).await? {
            Some(_) => Err(ExamError::invalid_state("session is still in progress")),
            None => Err(ExamError::NotFound("Session")),
        }
    }

    async fn list_overdue(&self, now: PrimitiveDateTime) -> Result<Vec<ExamSession>, ExamError> {
        let sessions = repositories::sessions::list_overdue(&self.pool, now).await?;
        self.attach_answers(sessions).await
    }

    async fn list_terminal_by_exam(&self, exam_id: &str) -> Result<Vec<ExamSession>, ExamError> {
        let sessions = repositories::sessions::list_terminal_by_exam(&self.pool, exam_id).await?;
        self.attach_answers(sessions).await
    }
}

#[async_trait]
impl QuestionBank for PgStore {
    async fn create_exam(&self, exam: Exam) -> Result<Exam, ExamError> {
        repositories::exams::create(&self.pool, &exam).await?;
        Ok(exam)
    }

    async fn list_exams(&self) -> Result<Vec<Exam>, ExamError> {
        Ok(repositories::exams::list_all(&self.pool).await?)
    }

    async fn update_exam(&self, exam: Exam) -> Result<Exam, ExamError> {
        if repositories::exams::update(&self.pool, &exam).await? {
            Ok(exam)
        } else {
            Err(ExamError::NotFound("Exam"))
        }
    }

    async fn delete_exam(&self, exam_id: &str) -> Result<(), ExamError> {
        if repositories::exams::delete_by_id(&self.pool, exam_id).await? {
            Ok(())
        } else {
            Err(ExamError::NotFound("Exam"))
        }
    }

    async fn insert_question(&self, question: Question) -> Result<bool, ExamError> {
        repositories::questions::create_if_absent(&self.pool, &question)
            .await
            .map_err(|err| map_write_error(err, "question already exists in this exam"))
    }

    async fn find_question(&self, question_id: &str) -> Result<Question, ExamError> {
        let row = repositories::questions::find_by_id(&self.pool, question_id)
            .await?
            .ok_or(ExamError::NotFound("Question"))?;
        question_from_row(row)
    }

    async fn update_question(&self, question: Question) -> Result<Question, ExamError> {
        let updated = repositories::questions::update(&self.pool, &question)
            .await
            .map_err(|err| map_write_error(err, "another question in this exam has the same text"))?;

        if updated {
            Ok(question)
        } else {
            Err(ExamError::NotFound("Question"))
        }
    }

    async fn delete_question(&self, question_id: &str) -> Result<(), ExamError> {
        if repositories::questions::delete_by_id(&self.pool, question_id).await? {
            Ok(())
        } else {
            Err(ExamError::NotFound("Question"))
        }
    }
}

#[async_trait]
impl UserDirectory for PgStore {
    async fn find_by_login_key(&self, login_key: &str) -> Result<Option<User>, ExamError> {
        Ok(repositories::users::find_by_login_key(&self.pool, login_key).await?)
    }

    async fn find_user(&self, user_id: &str) -> Result<Option<User>, ExamError> {
        Ok(repositories::users::find_by_id(&self.pool, user_id).await?)
    }

    async fn create_user(&self, user: User) -> Result<User, ExamError> {
        if repositories::users::create(&self.pool, &user).await? {
            Ok(user)
        } else {
            Err(ExamError::invalid_input("login key is already registered"))
        }
    }

    async fn update_user(&self, user: User) -> Result<User, ExamError> {
        let updated = repositories::users::update(&self.pool, &user)
            .await
            .map_err(|err| map_write_error(err, "login key is already registered"))?;

        if updated {
            Ok(user)
        } else {
            Err(ExamError::NotFound("User"))
        }
    }

    async fn list_users(&self, role: UserRole) -> Result<Vec<User>, ExamError> {
        Ok(repositories::users::list_by_role(&self.pool, role).await?)
    }

    async fn delete_user(&self, user_id: &str) -> Result<(), ExamError> {
        if repositories::users::delete_by_id(&self.pool, user_id).await? {
            Ok(())
        } else {
            Err(ExamError::NotFound("User"))
        }
    }

    async fn ping(&self) -> Result<(), ExamError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
