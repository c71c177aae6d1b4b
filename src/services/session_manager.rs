use std::collections::HashMap;
use std::sync::Arc;

use time::PrimitiveDateTime;

use crate::core::clock::SharedClock;
use crate::core::metrics;
use crate::core::time::to_primitive_utc;
use crate::db::models::{ExamSession, User};
use crate::db::types::{OptionLabel, SessionStatus};
use crate::services::grading::{self, QuestionReview, Score};
use crate::services::session_timing;
use crate::store::{ExamCatalog, ExamError, NewSession, SessionStore, Stores};

/// Session state as the client sees it, with remaining time recomputed from the clock.
#[derive(Debug, Clone)]
pub(crate) struct SessionView {
    pub(crate) session_id: String,
    pub(crate) exam_id: String,
    pub(crate) student_id: String,
    pub(crate) status: SessionStatus,
    pub(crate) started_at: PrimitiveDateTime,
    pub(crate) deadline_at: PrimitiveDateTime,
    pub(crate) duration_seconds: i64,
    pub(crate) remaining_seconds: i64,
    pub(crate) answers: HashMap<String, OptionLabel>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Tick {
    pub(crate) remaining_seconds: i64,
    pub(crate) status: SessionStatus,
}

/// A terminal session together with its grade.
#[derive(Debug, Clone)]
pub(crate) struct GradedSession {
    pub(crate) session: ExamSession,
    pub(crate) score: Score,
}

/// Result filtered through the exam's disclosure flags.
#[derive(Debug, Clone)]
pub(crate) struct SessionResult {
    pub(crate) session: ExamSession,
    pub(crate) score: Option<Score>,
    pub(crate) review: Option<Vec<QuestionReview>>,
}

#[derive(Clone)]
pub(crate) struct ExamSessionManager {
    catalog: Arc<dyn ExamCatalog>,
    sessions: Arc<dyn SessionStore>,
    clock: SharedClock,
}

impl ExamSessionManager {
    pub(crate) fn new(stores: &Stores, clock: SharedClock) -> Self {
        Self { catalog: stores.catalog.clone(), sessions: stores.sessions.clone(), clock }
    }

    fn now(&self) -> PrimitiveDateTime {
        to_primitive_utc(self.clock.now())
    }

    /// The student's extra time is added to the exam duration when the session
    /// is created; a resumed session keeps the allowance it started with.
    pub(crate) async fn start_session(
        &self,
        student: &User,
        exam_id: &str,
    ) -> Result<SessionView, ExamError> {
        let exam = self.catalog.get_exam(exam_id).await?;
        let now = self.now();

        let session = self
            .sessions
            .load_or_create(NewSession {
                student_id: &student.id,
                exam_id: &exam.id,
                duration_seconds: session_timing::allowance_seconds(
                    exam.duration_minutes,
                    student.extra_time_minutes,
                ),
                now,
            })
            .await?;

        let session = self.settle(session, now).await?;
        Ok(build_view(session, now))
    }

    /// Raw session record, used for ownership checks before other calls.
    pub(crate) async fn session(&self, session_id: &str) -> Result<ExamSession, ExamError> {
        self.sessions.find(session_id).await
    }

    pub(crate) async fn view(&self, session_id: &str) -> Result<SessionView, ExamError> {
        let now = self.now();
        let session = self.sessions.find(session_id).await?;
        let session = self.settle(session, now).await?;
        Ok(build_view(session, now))
    }

    pub(crate) async fn submit_answer(
        &self,
        session_id: &str,
        question_id: &str,
        option_label: &str,
    ) -> Result<(), ExamError> {
        let now = self.now();
        let session = self.sessions.find(session_id).await?;

        if session.status == SessionStatus::InProgress
            && session_timing::remaining_seconds(session.started_at, session.duration_seconds, now)
                == 0
        {
            let session = self.expire(session_id, now).await?;
            self.ensure_graded(session, now).await?;
            return Err(ExamError::invalid_state("time is up; the session has expired"));
        }

        self.sessions.record_answer(session_id, question_id, option_label, now).await?;
        metrics::answer_recorded();
        Ok(())
    }

    pub(crate) async fn tick(&self, session_id: &str) -> Result<Tick, ExamError> {
        let now = self.now();
        let session = self.sessions.find(session_id).await?;
        let session = self.settle(session, now).await?;

        let remaining_seconds = match session.status {
            SessionStatus::InProgress => session_timing::remaining_seconds(
                session.started_at,
                session.duration_seconds,
                now,
            ),
            _ => session.remaining_seconds,
        };

        Ok(Tick { remaining_seconds, status: session.status })
    }

    /// Finalizes as `submitted` and grades. A session that is already over
    /// (expired by the clock or finalized earlier) yields its existing grade.
    pub(crate) async fn submit(&self, session_id: &str) -> Result<GradedSession, ExamError> {
        let now = self.now();
        let session = self.sessions.find(session_id).await?;

        if session.status.is_terminal() {
            return self.ensure_graded(session, now).await;
        }

        let remaining =
            session_timing::remaining_seconds(session.started_at, session.duration_seconds, now);
        if remaining == 0 {
            let session = self.expire(session_id, now).await?;
            return self.ensure_graded(session, now).await;
        }

        match self.finalize(session_id, SessionStatus::Submitted, remaining, now).await {
            Ok(session) => self.ensure_graded(session, now).await,
            Err(ExamError::InvalidState(reason)) => {
                tracing::info!(session_id, reason = %reason, "Submit lost race to another finalize");
                let session = self.sessions.find(session_id).await?;
                self.ensure_graded(session, now).await
            }
            Err(err) => Err(err),
        }
    }

    /// Graded result of a terminal session, filtered by the exam's disclosure flags.
    pub(crate) async fn result(&self, session_id: &str) -> Result<SessionResult, ExamError> {
        let now = self.now();
        let session = self.sessions.find(session_id).await?;
        let session = self.settle(session, now).await?;

        if session.status == SessionStatus::InProgress {
            return Err(ExamError::invalid_state("session is still in progress"));
        }

        let graded = self.ensure_graded(session, now).await?;
        self.disclose(graded).await
    }

    pub(crate) async fn disclose(&self, graded: GradedSession) -> Result<SessionResult, ExamError> {
        let exam = self
            .catalog
            .find_exam(&graded.session.exam_id)
            .await?
            .ok_or(ExamError::NotFound("Exam"))?;

        let review = if exam.allow_review && graded.session.status.is_terminal() {
            let questions = self.catalog.list_questions(&exam.id).await?;
            Some(grading::review(&graded.session.answers, &questions))
        } else {
            None
        };

        Ok(SessionResult {
            score: exam.allow_result.then_some(graded.score),
            review,
            session: graded.session,
        })
    }

    /// Expires every in-progress session whose deadline has passed. Returns how
    /// many sessions this call closed.
    pub(crate) async fn expire_overdue(&self) -> Result<usize, ExamError> {
        let now = self.now();
        let overdue = self.sessions.list_overdue(now).await?;
        let mut closed = 0;

        for session in overdue {
            match self.finalize(&session.id, SessionStatus::Expired, 0, now).await {
                Ok(session) => {
                    self.ensure_graded(session, now).await?;
                    closed += 1;
                }
                Err(ExamError::InvalidState(reason)) => {
                    tracing::debug!(session_id = %session.id, reason = %reason, "Session already closed");
                }
                Err(err) => return Err(err),
            }
        }

        if closed > 0 {
            metrics::expired_sessions_closed(closed);
            tracing::info!(closed, "Closed expired exam sessions");
        }

        Ok(closed)
    }

    /// Recomputes the grade snapshot of every terminal session of an exam from
    /// its current question set.
    pub(crate) async fn regrade_exam(&self, exam_id: &str) -> Result<usize, ExamError> {
        if self.catalog.find_exam(exam_id).await?.is_none() {
            return Err(ExamError::NotFound("Exam"));
        }

        let now = self.now();
        let questions = self.catalog.list_questions(exam_id).await?;
        let sessions = self.sessions.list_terminal_by_exam(exam_id).await?;

        for session in &sessions {
            let score = grading::grade(&session.answers, &questions);
            self.sessions.record_grade(&session.id, score, now).await?;
        }

        tracing::info!(exam_id, regraded = sessions.len(), "Regraded exam sessions");
        Ok(sessions.len())
    }

    /// Expires an in-progress session that has run out of time; otherwise
    /// returns it unchanged.
    async fn settle(
        &self,
        session: ExamSession,
        now: PrimitiveDateTime,
    ) -> Result<ExamSession, ExamError> {
        if session.status != SessionStatus::InProgress {
            return Ok(session);
        }

        if session_timing::remaining_seconds(session.started_at, session.duration_seconds, now) > 0
        {
            return Ok(session);
        }

        let session = self.expire(&session.id, now).await?;
        Ok(self.ensure_graded(session, now).await?.session)
    }

    /// Finalizes as `expired`, falling back to the stored session when another
    /// caller already closed it.
    async fn expire(
        &self,
        session_id: &str,
        now: PrimitiveDateTime,
    ) -> Result<ExamSession, ExamError> {
        match self.finalize(session_id, SessionStatus::Expired, 0, now).await {
            Ok(session) => Ok(session),
            Err(ExamError::InvalidState(_)) => self.sessions.find(session_id).await,
            Err(err) => Err(err),
        }
    }

    async fn finalize(
        &self,
        session_id: &str,
        status: SessionStatus,
        remaining_seconds: i64,
        now: PrimitiveDateTime,
    ) -> Result<ExamSession, ExamError> {
        let finalized = self.sessions.finalize(session_id, status, remaining_seconds, now).await?;

        if finalized.transitioned {
            metrics::session_finalized(status);
            tracing::info!(
                session_id,
                exam_id = %finalized.session.exam_id,
                status = status.as_str(),
                "Finalized exam session"
            );
        }

        Ok(finalized.session)
    }

    async fn ensure_graded(
        &self,
        mut session: ExamSession,
        now: PrimitiveDateTime,
    ) -> Result<GradedSession, ExamError> {
        if let Some(score) = session.grade() {
            return Ok(GradedSession { session, score });
        }

        let questions = self.catalog.list_questions(&session.exam_id).await?;
        let score = grading::grade(&session.answers, &questions);
        self.sessions.record_grade(&session.id, score, now).await?;

        session.score = Some(score.correct as i32);
        session.total_questions = Some(score.total as i32);
        session.graded_at = Some(now);

        Ok(GradedSession { session, score })
    }
}

fn build_view(session: ExamSession, now: PrimitiveDateTime) -> SessionView {
    let remaining_seconds = match session.status {
        SessionStatus::InProgress => {
            session_timing::remaining_seconds(session.started_at, session.duration_seconds, now)
        }
        _ => session.remaining_seconds,
    };

    SessionView {
        deadline_at: session_timing::deadline(session.started_at, session.duration_seconds),
        session_id: session.id,
        exam_id: session.exam_id,
        student_id: session.student_id,
        status: session.status,
        started_at: session.started_at,
        duration_seconds: session.duration_seconds,
        remaining_seconds,
        answers: session.answers,
    }
}
