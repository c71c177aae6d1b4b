use serde::Serialize;
use time::PrimitiveDateTime;

use crate::services::csv;
use crate::services::questions::{self, QuestionDraft};
use crate::store::{ExamError, QuestionBank};

const COLUMNS: [&str; 6] = ["question", "optiona", "optionb", "optionc", "optiond", "correctanswer"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct ImportWarning {
    pub(crate) line: usize,
    pub(crate) code: &'static str,
    pub(crate) message: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub(crate) struct ImportReport {
    pub(crate) imported: usize,
    pub(crate) skipped_duplicates: usize,
    pub(crate) warnings: Vec<ImportWarning>,
}

#[derive(Debug)]
pub(crate) struct ParsedRow {
    pub(crate) line: usize,
    pub(crate) draft: QuestionDraft,
}

/// Parses the question CSV. The header row names the columns (any order, any
/// case); rows that fail validation are reported as warnings and skipped.
pub(crate) fn parse_questions_csv(
    text: &str,
) -> Result<(Vec<ParsedRow>, Vec<ImportWarning>), ExamError> {
    let mut records = csv::records(text).into_iter();

    let Some(header) = records.next() else {
        return Err(ExamError::invalid_input("CSV is empty"));
    };
    let header = csv::header_names(&header);

    let mut positions = [0usize; 6];
    for (slot, column) in positions.iter_mut().zip(COLUMNS) {
        *slot = header.iter().position(|name| name == column).ok_or_else(|| {
            ExamError::invalid_input(format!("CSV header is missing column '{column}'"))
        })?;
    }

    let mut rows = Vec::new();
    let mut warnings = Vec::new();

    for record in records {
        let line = record.line;
        let field = |position: usize| record.field(position);

        if positions.iter().any(|&position| field(position).trim().is_empty()) {
            warnings.push(ImportWarning {
                line,
                code: "missing_field",
                message: "every column must have a value".to_string(),
            });
            continue;
        }

        let [question, a, b, c, d, correct] = positions.map(field);
        match questions::draft(question, [a, b, c, d], correct) {
            Ok(draft) => rows.push(ParsedRow { line, draft }),
            Err(err) => warnings.push(ImportWarning {
                line,
                code: "invalid_row",
                message: match err {
                    ExamError::InvalidInput(message) => message,
                    other => other.to_string(),
                },
            }),
        }
    }

    Ok((rows, warnings))
}

/// Imports every valid row, skipping questions whose text already exists in
/// the exam (including repeats within the same file).
pub(crate) async fn import_questions(
    bank: &dyn QuestionBank,
    exam_id: &str,
    csv: &str,
    now: PrimitiveDateTime,
) -> Result<ImportReport, ExamError> {
    let (rows, warnings) = parse_questions_csv(csv)?;
    let mut report = ImportReport { warnings, ..ImportReport::default() };

    for row in rows {
        if bank.insert_question(questions::build(exam_id, row.draft, now)).await? {
            report.imported += 1;
        } else {
            report.skipped_duplicates += 1;
        }
    }

    tracing::info!(
        exam_id,
        imported = report.imported,
        skipped_duplicates = report.skipped_duplicates,
        warnings = report.warnings.len(),
        "Imported questions from CSV"
    );

    Ok(report)
}
