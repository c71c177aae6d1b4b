use std::collections::HashMap;

use async_trait::async_trait;
use time::PrimitiveDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::core::metrics;
use crate::db::models::{Exam, ExamSession, Question, User};
use crate::db::types::{OptionLabel, SessionStatus, UserRole};
use crate::services::grading::Score;
use crate::services::session_timing;
use crate::store::{
    ExamCatalog, ExamError, Finalized, NewSession, QuestionBank, SessionStore, UserDirectory,
};

#[derive(Default)]
struct MemoryState {
    // Kept in insertion order so equal timestamps sort stably.
    exams: Vec<Exam>,
    questions: Vec<Question>,
    sessions: HashMap<String, ExamSession>,
    session_keys: HashMap<(String, String), String>,
    users: Vec<User>,
}

/// Process-local store behind one lock. Used for development and tests.
#[derive(Default)]
pub(crate) struct MemoryStore {
    state: RwLock<MemoryState>,
}

#[async_trait]
impl ExamCatalog for MemoryStore {
    async fn get_exam(&self, exam_id: &str) -> Result<Exam, ExamError> {
        let state = self.state.read().await;
        state
            .exams
            .iter()
            .find(|exam| exam.id == exam_id && exam.visible)
            .cloned()
            .ok_or(ExamError::NotFound("Exam"))
    }

    async fn find_exam(&self, exam_id: &str) -> Result<Option<Exam>, ExamError> {
        let state = self.state.read().await;
        Ok(state.exams.iter().find(|exam| exam.id == exam_id).cloned())
    }

    async fn list_questions(&self, exam_id: &str) -> Result<Vec<Question>, ExamError> {
        let state = self.state.read().await;
        let mut questions = state
            .questions
            .iter()
            .filter(|question| question.exam_id == exam_id)
            .cloned()
            .collect::<Vec<_>>();
        questions.sort_by_key(|question| question.created_at);
        Ok(questions)
    }

    async fn list_visible_exams(&self) -> Result<Vec<Exam>, ExamError> {
        let state = self.state.read().await;
        let mut exams = state.exams.iter().filter(|exam| exam.visible).cloned().collect::<Vec<_>>();
        exams.sort_by_key(|exam| exam.created_at);
        Ok(exams)
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn load_or_create(&self, new: NewSession<'_>) -> Result<ExamSession, ExamError> {
        let mut state = self.state.write().await;
        let key = (new.student_id.to_string(), new.exam_id.to_string());

        if let Some(existing) =
            state.session_keys.get(&key).and_then(|session_id| state.sessions.get(session_id))
        {
            return Ok(existing.clone());
        }

        let session = ExamSession {
            id: Uuid::new_v4().to_string(),
            exam_id: new.exam_id.to_string(),
            student_id: new.student_id.to_string(),
            status: SessionStatus::InProgress,
            started_at: new.now,
            duration_seconds: new.duration_seconds,
            remaining_seconds: new.duration_seconds,
            finalized_at: None,
            score: None,
            total_questions: None,
            graded_at: None,
            created_at: new.now,
            updated_at: new.now,
            answers: HashMap::new(),
        };

        tracing::info!(
            session_id = %session.id,
            exam_id = %session.exam_id,
            student_id = %session.student_id,
            "Created exam session"
        );
        metrics::session_started();

        state.session_keys.insert(key, session.id.clone());
        state.sessions.insert(session.id.clone(), session.clone());
        Ok(session)
    }

    async fn find(&self, session_id: &str) -> Result<ExamSession, ExamError> {
        let state = self.state.read().await;
        state.sessions.get(session_id).cloned().ok_or(ExamError::NotFound("Session"))
    }

    async fn record_answer(
        &self,
        session_id: &str,
        question_id: &str,
        option_label: &str,
        now: PrimitiveDateTime,
    ) -> Result<(), ExamError> {
        let mut guard = self.state.write().await;
        let state = &mut *guard;

        let session = state.sessions.get_mut(session_id).ok_or(ExamError::NotFound("Session"))?;

        if session.status != SessionStatus::InProgress {
            return Err(ExamError::invalid_state(format!(
                "session is already {}",
                session.status.as_str()
            )));
        }

        let label = OptionLabel::parse(option_label).ok_or_else(|| {
            ExamError::invalid_input(format!("'{option_label}' is not one of A, B, C, D"))
        })?;

        let belongs = state
            .questions
            .iter()
            .any(|question| question.id == question_id && question.exam_id == session.exam_id);
        if !belongs {
            return Err(ExamError::invalid_input("question does not belong to this exam"));
        }

        session.answers.insert(question_id.to_string(), label);
        session.updated_at = now;
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

        let mut state = self.state.write().await;
        let session = state.sessions.get_mut(session_id).ok_or(ExamError::NotFound("Session"))?;

        if session.status == SessionStatus::InProgress {
            session.status = status;
            session.remaining_seconds = remaining_seconds;
            session.finalized_at = Some(now);
            session.updated_at = now;
            return Ok(Finalized { session: session.clone(), transitioned: true });
        }

        if session.status == status {
            return Ok(Finalized { session: session.clone(), transitioned: false });
        }

        Err(ExamError::invalid_state(format!("session is already {}", session.status.as_str())))
    }

    async fn record_grade(
        &self,
        session_id: &str,
        score: Score,
        now: PrimitiveDateTime,
    ) -> Result<(), ExamError> {
        let mut state = self.state.write().await;
        let session = state.sessions.get_mut(session_id).ok_or(ExamError::NotFound("Session"))?;

        if !session.status.is_terminal() {
            return Err(ExamError::invalid_state("session is still in progress"));
        }

        session.score = Some(score.correct as i32);
        session.total_questions = Some(score.total as i32);
        session.graded_at = Some(now);
        session.updated_at = now;
        Ok(())
    }

    async fn list_overdue(&self, now: PrimitiveDateTime) -> Result<Vec<ExamSession>, ExamError> {
        let state = self.state.read().await;
        let mut sessions = state
            .sessions
            .values()
            .filter(|session| {
                session.status == SessionStatus::InProgress
                    && session_timing::deadline(session.started_at, session.duration_seconds) <= now
            })
            .cloned()
            .collect::<Vec<_>>();
        sessions.sort_by_key(|session| session.started_at);
        Ok(sessions)
    }

    async fn list_terminal_by_exam(&self, exam_id: &str) -> Result<Vec<ExamSession>, ExamError> {
        let state = self.state.read().await;
        let mut sessions = state
            .sessions
            .values()
            .filter(|session| session.exam_id == exam_id && session.status.is_terminal())
            .cloned()
            .collect::<Vec<_>>();
        sessions.sort_by_key(|session| session.started_at);
        Ok(sessions)
    }
}

#[async_trait]
impl QuestionBank for MemoryStore {
    async fn create_exam(&self, exam: Exam) -> Result<Exam, ExamError> {
        let mut state = self.state.write().await;
        state.exams.push(exam.clone());
        Ok(exam)
    }

    async fn list_exams(&self) -> Result<Vec<Exam>, ExamError> {
        let state = self.state.read().await;
        let mut exams = state.exams.clone();
        exams.sort_by_key(|exam| exam.created_at);
        Ok(exams)
    }

    async fn update_exam(&self, exam: Exam) -> Result<Exam, ExamError> {
        let mut state = self.state.write().await;
        let slot = state
            .exams
            .iter_mut()
            .find(|current| current.id == exam.id)
            .ok_or(ExamError::NotFound("Exam"))?;
        *slot = exam.clone();
        Ok(exam)
    }

    async fn delete_exam(&self, exam_id: &str) -> Result<(), ExamError> {
        let mut state = self.state.write().await;
        let before = state.exams.len();
        state.exams.retain(|exam| exam.id != exam_id);
        if state.exams.len() == before {
            return Err(ExamError::NotFound("Exam"));
        }

        state.questions.retain(|question| question.exam_id != exam_id);
        state.sessions.retain(|_, session| session.exam_id != exam_id);
        state.session_keys.retain(|(_, key_exam), _| key_exam != exam_id);
        Ok(())
    }

    async fn insert_question(&self, question: Question) -> Result<bool, ExamError> {
        let mut state = self.state.write().await;

        if !state.exams.iter().any(|exam| exam.id == question.exam_id) {
            return Err(ExamError::NotFound("Exam"));
        }

        let duplicate = state.questions.iter().any(|existing| {
            existing.exam_id == question.exam_id && existing.fingerprint == question.fingerprint
        });
        if duplicate {
            return Ok(false);
        }

        state.questions.push(question);
        Ok(true)
    }

    async fn find_question(&self, question_id: &str) -> Result<Question, ExamError> {
        let state = self.state.read().await;
        state
            .questions
            .iter()
            .find(|question| question.id == question_id)
            .cloned()
            .ok_or(ExamError::NotFound("Question"))
    }

    async fn update_question(&self, question: Question) -> Result<Question, ExamError> {
        let mut state = self.state.write().await;

        let clash = state.questions.iter().any(|existing| {
            existing.id != question.id
                && existing.exam_id == question.exam_id
                && existing.fingerprint == question.fingerprint
        });
        if clash {
            return Err(ExamError::invalid_input(
                "another question in this exam has the same text",
            ));
        }

        let slot = state
            .questions
            .iter_mut()
            .find(|current| current.id == question.id)
            .ok_or(ExamError::NotFound("Question"))?;
        *slot = question.clone();
        Ok(question)
    }

    async fn delete_question(&self, question_id: &str) -> Result<(), ExamError> {
        let mut state = self.state.write().await;
        let before = state.questions.len();
        state.questions.retain(|question| question.id != question_id);
        if state.questions.len() == before {
            return Err(ExamError::NotFound("Question"));
        }

        for session in state.sessions.values_mut() {
            session.answers.remove(question_id);
        }
        Ok(())
    }
}

#[async_trait]
impl UserDirectory for MemoryStore {
    async fn find_by_login_key(&self, login_key: &str) -> Result<Option<User>, ExamError> {
        let state = self.state.read().await;
        Ok(state.users.iter().find(|user| user.login_key == login_key).cloned())
    }

    async fn find_user(&self, user_id: &str) -> Result<Option<User>, ExamError> {
        let state = self.state.read().await;
        Ok(state.users.iter().find(|user| user.id == user_id).cloned())
    }

    async fn create_user(&self, user: User) -> Result<User, ExamError> {
        let mut state = self.state.write().await;
        if state.users.iter().any(|existing| existing.login_key == user.login_key) {
            return Err(ExamError::invalid_input("login key is already registered"));
        }
        state.users.push(user.clone());
        Ok(user)
    }

    async fn update_user(&self, user: User) -> Result<User, ExamError> {
        let mut state = self.state.write().await;
        if state
            .users
            .iter()
            .any(|existing| existing.id != user.id && existing.login_key == user.login_key)
        {
            return Err(ExamError::invalid_input("login key is already registered"));
        }

        let slot = state
            .users
            .iter_mut()
            .find(|current| current.id == user.id)
            .ok_or(ExamError::NotFound("User"))?;
        *slot = user.clone();
        Ok(user)
    }

    async fn list_users(&self, role: UserRole) -> Result<Vec<User>, ExamError> {
        let state = self.state.read().await;
        let mut users =
            state.users.iter().filter(|user| user.role == role).cloned().collect::<Vec<_>>();
        users.sort_by_key(|user| user.created_at);
        Ok(users)
    }

    async fn delete_user(&self, user_id: &str) -> Result<(), ExamError> {
        let mut state = self.state.write().await;
        let before = state.users.len();
        state.users.retain(|user| user.id != user_id);
        if state.users.len() == before {
            return Err(ExamError::NotFound("User"));
        }

        state.sessions.retain(|_, session| session.student_id != user_id);
        state.session_keys.retain(|(student, _), _| student != user_id);
        Ok(())
    }

    async fn ping(&self) -> Result<(), ExamError> {
        Ok(())
    }
}
