use std::collections::HashSet;

use serde::Serialize;
use thiserror::Error;
use time::PrimitiveDateTime;

use crate::core::security::SecurityError;
use crate::db::types::UserRole;
use crate::services::csv;
use crate::services::identity::{self, NewUser};
use crate::services::question_import::ImportWarning;
use crate::store::{ExamError, UserDirectory};

pub(crate) const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Error)]
pub(crate) enum RosterError {
    #[error(transparent)]
    Store(#[from] ExamError),
    #[error(transparent)]
    Security(#[from] SecurityError),
}

#[derive(Debug, Clone, Default, Serialize)]
pub(crate) struct RosterReport {
    pub(crate) created: usize,
    pub(crate) skipped_duplicates: usize,
    pub(crate) warnings: Vec<ImportWarning>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RosterRow {
    pub(crate) line: usize,
    pub(crate) login_key: String,
    pub(crate) full_name: String,
    pub(crate) password: String,
    pub(crate) department: Option<String>,
}

fn column(header: &[String], names: &[&str]) -> Option<usize> {
    header.iter().position(|name| names.contains(&name.as_str()))
}

/// Parses a student roster with a `matric,name,password` header and an
/// optional `department` column.
pub(crate) fn parse_roster_csv(
    text: &str,
) -> Result<(Vec<RosterRow>, Vec<ImportWarning>), ExamError> {
    let mut records = csv::records(text).into_iter();

    let Some(header) = records.next() else {
        return Err(ExamError::invalid_input("CSV is empty"));
    };
    let header = csv::header_names(&header);

    let missing = |name: &str| ExamError::invalid_input(format!("CSV header is missing column '{name}'"));
    let matric = column(&header, &["matric", "studentid", "login"]).ok_or_else(|| missing("matric"))?;
    let name = column(&header, &["name", "fullname", "full_name"]).ok_or_else(|| missing("name"))?;
    let password = column(&header, &["password"]).ok_or_else(|| missing("password"))?;
    let department = column(&header, &["department"]);

    let mut rows = Vec::new();
    let mut warnings = Vec::new();

    for record in records {
        let login_key = identity::normalize_login_key(record.field(matric));
        let full_name = record.field(name).trim();
        let secret = record.field(password);

        if login_key.is_empty() || full_name.is_empty() || secret.trim().is_empty() {
            warnings.push(ImportWarning {
                line: record.line,
                code: "missing_field",
                message: "matric, name and password are required".to_string(),
            });
            continue;
        }

        if secret.chars().count() < MIN_PASSWORD_LEN {
            warnings.push(ImportWarning {
                line: record.line,
                code: "invalid_row",
                message: format!("password must be at least {MIN_PASSWORD_LEN} characters"),
            });
            continue;
        }

        rows.push(RosterRow {
            line: record.line,
            login_key,
            full_name: full_name.to_string(),
            password: secret.to_string(),
            department: department
                .map(|position| record.field(position).trim().to_string())
                .filter(|value| !value.is_empty()),
        });
    }

    Ok((rows, warnings))
}

/// Creates a student account for every new matric number. Keys already
/// registered, or repeated earlier in the file, are skipped.
pub(crate) async fn import_students(
    users: &dyn UserDirectory,
    csv: &str,
    default_department: Option<&str>,
    now: PrimitiveDateTime,
) -> Result<RosterReport, RosterError> {
    let (rows, warnings) = parse_roster_csv(csv)?;
    let mut report = RosterReport { warnings, ..RosterReport::default() };
    let mut seen = HashSet::new();

    for row in rows {
        if !seen.insert(row.login_key.clone())
            || users.find_by_login_key(&row.login_key).await?.is_some()
        {
            report.skipped_duplicates += 1;
            continue;
        }

        let user = identity::build_user(
            NewUser {
                login: &row.login_key,
                full_name: &row.full_name,
                department: row.department.as_deref().or(default_department),
                role: UserRole::Student,
                password: &row.password,
            },
            now,
        )?;

        match users.create_user(user).await {
            Ok(_) => report.created += 1,
            Err(ExamError::InvalidInput(_)) => report.skipped_duplicates += 1,
            Err(err) => return Err(err.into()),
        }
    }

    tracing::info!(
        created = report.created,
        skipped_duplicates = report.skipped_duplicates,
        warnings = report.warnings.len(),
        "Imported student roster"
    );

    Ok(report)
}
