use std::collections::{BTreeMap, HashMap};

use anyhow::{Context, Result};
use sqlx::PgPool;
use time::PrimitiveDateTime;

use crate::core::time::primitive_now_utc;
use crate::db::models::User;
use crate::db::types::UserRole;
use crate::repositories;
use crate::services::identity;

/// One-off operations run by `cbt-maintenance` against the Postgres store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MaintenanceTask {
    AuditUsers,
    NormalizeLoginKeys { dry_run: bool },
    ClearSessions { exam_id: String },
}

#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct UserAudit {
    pub(crate) empty_keys: Vec<String>,
    pub(crate) non_normalized: Vec<String>,
    pub(crate) inactive_students: Vec<String>,
    /// Normalized key mapped to the ids of every user that would share it.
    pub(crate) duplicates: BTreeMap<String, Vec<String>>,
}

impl UserAudit {
    pub(crate) fn is_clean(&self) -> bool {
        self.empty_keys.is_empty()
            && self.non_normalized.is_empty()
            && self.inactive_students.is_empty()
            && self.duplicates.is_empty()
    }
}

pub(crate) fn audit(users: &[User]) -> UserAudit {
    let mut report = UserAudit::default();
    let mut by_key: HashMap<String, Vec<String>> = HashMap::new();

    for user in users {
        if user.login_key.trim().is_empty() {
            report.empty_keys.push(user.id.clone());
            continue;
        }
        if !identity::is_normalized(&user.login_key) {
            report.non_normalized.push(user.id.clone());
        }
        if user.role == UserRole::Student && !user.is_active {
            report.inactive_students.push(user.id.clone());
        }
        by_key.entry(identity::normalize_login_key(&user.login_key)).or_default().push(user.id.clone());
    }

    report.duplicates = by_key.into_iter().filter(|(_, ids)| ids.len() > 1).collect();
    report
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct KeyRename {
    pub(crate) user_id: String,
    pub(crate) from: String,
    pub(crate) to: String,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct NormalizationPlan {
    pub(crate) renames: Vec<KeyRename>,
    /// Renames refused because the target key is already used by another user.
    pub(crate) collisions: Vec<KeyRename>,
}

pub(crate) fn plan_normalization(users: &[User]) -> NormalizationPlan {
    let mut owners: HashMap<String, usize> = HashMap::new();
    for user in users {
        *owners.entry(identity::normalize_login_key(&user.login_key)).or_default() += 1;
    }

    let mut plan = NormalizationPlan::default();
    for user in users {
        let target = identity::normalize_login_key(&user.login_key);
        if target == user.login_key || target.is_empty() {
            continue;
        }

        let rename =
            KeyRename { user_id: user.id.clone(), from: user.login_key.clone(), to: target };
        if owners.get(&rename.to).copied().unwrap_or(0) > 1 {
            plan.collisions.push(rename);
        } else {
            plan.renames.push(rename);
        }
    }
    plan
}

pub(crate) async fn run_task(pool: &PgPool, task: MaintenanceTask) -> Result<()> {
    match task {
        MaintenanceTask::AuditUsers => audit_users(pool).await,
        MaintenanceTask::NormalizeLoginKeys { dry_run } => {
            normalize_login_keys(pool, dry_run, primitive_now_utc()).await
        }
        MaintenanceTask::ClearSessions { exam_id } => clear_sessions(pool, &exam_id).await,
    }
}

async fn audit_users(pool: &PgPool) -> Result<()> {
    let users = repositories::users::list_all(pool).await.context("Failed to list users")?;
    let report = audit(&users);

    tracing::info!(
        users = users.len(),
        empty_keys = report.empty_keys.len(),
        non_normalized = report.non_normalized.len(),
        inactive_students = report.inactive_students.len(),
        duplicate_keys = report.duplicates.len(),
        "User audit finished"
    );

    for id in &report.empty_keys {
        println!("empty-login-key\t{id}");
    }
    for id in &report.non_normalized {
        println!("non-normalized\t{id}");
    }
    for id in &report.inactive_students {
        println!("inactive-student\t{id}");
    }
    for (key, ids) in &report.duplicates {
        println!("duplicate-key\t{key}\t{}", ids.join(","));
    }

    if report.is_clean() {
        println!("no issues found");
    }
    Ok(())
}

async fn normalize_login_keys(pool: &PgPool, dry_run: bool, now: PrimitiveDateTime) -> Result<()> {
    let users = repositories::users::list_all(pool).await.context("Failed to list users")?;
    let plan = plan_normalization(&users);

    for collision in &plan.collisions {
        tracing::warn!(
            user_id = %collision.user_id,
            from = %collision.from,
            to = %collision.to,
            "Refusing rename; normalized key is shared with another user"
        );
    }

    for rename in &plan.renames {
        println!("{}\t{} -> {}", rename.user_id, rename.from, rename.to);
        if dry_run {
            continue;
        }
        repositories::users::update_login_key(pool, &rename.user_id, &rename.to, now)
            .await
            .with_context(|| format!("Failed to update login key of {}", rename.user_id))?;
    }

    tracing::info!(
        renamed = if dry_run { 0 } else { plan.renames.len() },
        planned = plan.renames.len(),
        collisions = plan.collisions.len(),
        dry_run,
        "Login key normalization finished"
    );
    Ok(())
}

async fn clear_sessions(pool: &PgPool, exam_id: &str) -> Result<()> {
    let exam = repositories::exams::find_by_id(pool, exam_id)
        .await
        .context("Failed to load exam")?
        .with_context(|| format!("Exam {exam_id} not found"))?;

    let deleted = repositories::sessions::delete_by_exam(pool, &exam.id)
        .await
        .context("Failed to delete sessions")?;

    tracing::info!(exam_id = %exam.id, deleted, "Cleared exam sessions");
    println!("deleted {deleted} session(s) of {} {}", exam.course_code, exam.title);
    Ok(())
}
