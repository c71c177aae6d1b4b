/// One CSV record and the 1-based line it starts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Record {
    pub(crate) line: usize,
    pub(crate) fields: Vec<String>,
}

impl Record {
    pub(crate) fn is_blank(&self) -> bool {
        self.fields.iter().all(|field| field.trim().is_empty())
    }

    pub(crate) fn field(&self, position: usize) -> &str {
        self.fields.get(position).map(String::as_str).unwrap_or("")
    }
}

/// Splits a CSV body into records. Quoted fields may hold commas, `""` escapes
/// and line breaks; `\r\n` and `\n` both end a record. Blank records are dropped.
pub(crate) fn records(text: &str) -> Vec<Record> {
    let text = text.trim_start_matches('\u{feff}');
    let mut out = Vec::new();
    let mut fields = Vec::new();
    let mut buf = String::new();
    let mut in_quotes = false;
    let mut line = 1;
    let mut record_line = 1;
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                buf.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => fields.push(std::mem::take(&mut buf)),
            '\r' if !in_quotes && chars.peek() == Some(&'\n') => {}
            '\n' if !in_quotes => {
                fields.push(std::mem::take(&mut buf));
                push_record(&mut out, record_line, std::mem::take(&mut fields));
                line += 1;
                record_line = line;
            }
            '\n' => {
                buf.push('\n');
                line += 1;
            }
            _ => buf.push(ch),
        }
    }

    if !buf.is_empty() || !fields.is_empty() {
        fields.push(buf);
        push_record(&mut out, record_line, fields);
    }
    out
}

fn push_record(out: &mut Vec<Record>, line: usize, fields: Vec<String>) {
    let record = Record { line, fields };
    if !record.is_blank() {
        out.push(record);
    }
}

/// Lowercased, trimmed header names.
pub(crate) fn header_names(header: &Record) -> Vec<String> {
    header.fields.iter().map(|name| name.trim().to_ascii_lowercase()).collect()
}
