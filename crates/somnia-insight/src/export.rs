//! Export of the message log as JSON or CSV.
//!
//! Both encoders consume the same `ExportRow` list, so the two formats always
//! describe the same rows in the same order. Output depends only on the rows
//! and the window bounds: fields are written in declaration order and
//! timestamps use a fixed RFC 3339 millisecond format.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use somnia_core::types::MessageRecord;

use crate::error::InsightError;

/// Supported export encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    Json,
    Csv,
}

impl ExportFormat {
    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Json => "application/json",
            ExportFormat::Csv => "text/csv; charset=utf-8",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ExportFormat {
    type Err = InsightError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            _ => Err(InsightError::UnsupportedFormat(s.to_string())),
        }
    }
}

/// One exported message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportRow {
    pub message_id: String,
    pub conversation_id: String,
    pub user_id: String,
    pub seq: u64,
    pub role: String,
    pub created_at: String,
    /// Empty for messages without a topic.
    pub topic: String,
    pub is_error: bool,
    pub content_length: usize,
    pub content: String,
}

const CSV_HEADER: [&str; 10] = [
    "message_id",
    "conversation_id",
    "user_id",
    "seq",
    "role",
    "created_at",
    "topic",
    "is_error",
    "content_length",
    "content",
];

impl From<&MessageRecord> for ExportRow {
    fn from(record: &MessageRecord) -> Self {
        let m = &record.message;
        Self {
            message_id: m.id.to_string(),
            conversation_id: m.conversation_id.to_string(),
            user_id: record.owner_user_id.clone(),
            seq: m.seq,
            role: m.role.as_str().to_string(),
            created_at: format_timestamp(&m.created_at),
            topic: m.topic.map(|t| t.as_str().to_string()).unwrap_or_default(),
            is_error: m.is_error,
            content_length: m.char_len(),
            content: m.content.clone(),
        }
    }
}

impl ExportRow {
    fn csv_fields(&self) -> [String; 10] {
        [
            self.message_id.clone(),
            self.conversation_id.clone(),
            self.user_id.clone(),
            self.seq.to_string(),
            self.role.clone(),
            self.created_at.clone(),
            self.topic.clone(),
            self.is_error.to_string(),
            self.content_length.to_string(),
            self.content.clone(),
        ]
    }
}

#[derive(Serialize)]
struct ExportDocument<'a> {
    period_start: String,
    period_end: String,
    row_count: usize,
    rows: &'a [ExportRow],
}

pub(crate) fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Encode rows in the requested format.
pub fn encode(
    rows: &[ExportRow],
    format: ExportFormat,
    period_start: &DateTime<Utc>,
    period_end: &DateTime<Utc>,
) -> Result<Vec<u8>, InsightError> {
    match format {
        ExportFormat::Json => encode_json(rows, period_start, period_end),
        ExportFormat::Csv => Ok(encode_csv(rows)),
    }
}

fn encode_json(
    rows: &[ExportRow],
    period_start: &DateTime<Utc>,
    period_end: &DateTime<Utc>,
) -> Result<Vec<u8>, InsightError> {
    let document = ExportDocument {
        period_start: format_timestamp(period_start),
        period_end: format_timestamp(period_end),
        row_count: rows.len(),
        rows,
    };
    Ok(serde_json::to_vec_pretty(&document)?)
}

fn encode_csv(rows: &[ExportRow]) -> Vec<u8> {
    let mut out = String::new();
    write_csv_line(&mut out, CSV_HEADER.iter().copied());
    for row in rows {
        let fields = row.csv_fields();
        write_csv_line(&mut out, fields.iter().map(String::as_str));
    }
    out.into_bytes()
}

fn write_csv_line<'a>(out: &mut String, fields: impl Iterator<Item = &'a str>) {
    for (i, field) in fields.enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&escape_csv(field));
    }
    out.push_str("\r\n");
}

/// Quote a field per RFC 4180 when it contains a delimiter, quote, or line break.
fn escape_csv(field: &str) -> String {
    if field.contains(&[',', '"', '\n', '\r'][..]) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Parse CSV produced by `encode` back into rows of fields.
#[cfg(test)]
pub(crate) fn parse_csv(input: &str) -> Vec<Vec<String>> {
    let mut rows = Vec::new();
    let mut row = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    field.push('"');
                    chars.next();
                }
                '"' => in_quotes = false,
                _ => field.push(c),
            }
        } else {
            match c {
                '"' => in_quotes = true,
                ',' => row.push(std::mem::take(&mut field)),
                '\r' => {}
                '\n' => {
                    row.push(std::mem::take(&mut field));
                    rows.push(std::mem::take(&mut row));
                }
                _ => field.push(c),
            }
        }
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn row(content: &str, topic: &str) -> ExportRow {
        ExportRow {
            message_id: "m-1".to_string(),
            conversation_id: "c-1".to_string(),
            user_id: "alice".to_string(),
            seq: 1,
            role: "user".to_string(),
            created_at: "2024-03-01T12:00:00.000Z".to_string(),
            topic: topic.to_string(),
            is_error: false,
            content_length: content.chars().count(),
            content: content.to_string(),
        }
    }

    fn bounds() -> (DateTime<Utc>, DateTime<Utc>) {
        (
            Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 2, 0, 0, 0).unwrap(),
        )
    }

    #[test]
    fn test_format_parse() {
        assert_eq!("json".parse::<ExportFormat>().unwrap(), ExportFormat::Json);
        assert_eq!("CSV".parse::<ExportFormat>().unwrap(), ExportFormat::Csv);
        assert!(matches!(
            "xml".parse::<ExportFormat>(),
            Err(InsightError::UnsupportedFormat(_))
        ));
        assert_eq!(ExportFormat::Csv.content_type(), "text/csv; charset=utf-8");
    }

    #[test]
    fn test_escape_csv() {
        assert_eq!(escape_csv("plain"), "plain");
        assert_eq!(escape_csv("a,b"), "\"a,b\"");
        assert_eq!(escape_csv("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(escape_csv("line\nbreak"), "\"line\nbreak\"");
        assert_eq!(escape_csv(""), "");
    }

    #[test]
    fn test_csv_header_and_rows() {
        let rows = vec![row("hello", "insomnia"), row("bye", "")];
        let csv = String::from_utf8(encode_csv(&rows)).unwrap();
        let lines: Vec<&str> = csv.split("\r\n").collect();
        assert_eq!(
            lines[0],
            "message_id,conversation_id,user_id,seq,role,created_at,topic,is_error,content_length,content"
        );
        assert_eq!(
            lines[1],
            "m-1,c-1,alice,1,user,2024-03-01T12:00:00.000Z,insomnia,false,5,hello"
        );
        assert_eq!(lines[2], "m-1,c-1,alice,1,user,2024-03-01T12:00:00.000Z,,false,3,bye");
        assert_eq!(lines[3], "");
    }

    #[test]
    fn test_csv_round_trips_awkward_content() {
        let rows = vec![row("commas, \"quotes\"\nand newlines", "sleep_quality")];
        let csv = String::from_utf8(encode_csv(&rows)).unwrap();
        let parsed = parse_csv(&csv);
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[1][9], "commas, \"quotes\"\nand newlines");
        assert_eq!(parsed[1].len(), CSV_HEADER.len());
    }

    #[test]
    fn test_json_document_shape() {
        let (start, end) = bounds();
        let rows = vec![row("hello", "insomnia")];
        let bytes = encode(&rows, ExportFormat::Json, &start, &end).unwrap();
        let doc: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(doc["period_start"], "2024-02-01T00:00:00.000Z");
        assert_eq!(doc["period_end"], "2024-03-02T00:00:00.000Z");
        assert_eq!(doc["row_count"], 1);
        assert_eq!(doc["rows"][0]["topic"], "insomnia");
        assert_eq!(doc["rows"][0]["content_length"], 5);
    }

    #[test]
    fn test_json_field_order_is_fixed() {
        let (start, end) = bounds();
        let bytes = encode(&[row("x", "")], ExportFormat::Json, &start, &end).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let period = text.find("\"period_start\"").unwrap();
        let rows = text.find("\"rows\"").unwrap();
        let message_id = text.find("\"message_id\"").unwrap();
        let content = text.find("\"content\"").unwrap();
        assert!(period < rows && rows < message_id && message_id < content);
    }

    #[test]
    fn test_empty_export() {
        let (start, end) = bounds();
        let csv = encode(&[], ExportFormat::Csv, &start, &end).unwrap();
        assert_eq!(parse_csv(&String::from_utf8(csv).unwrap()).len(), 1);

        let json = encode(&[], ExportFormat::Json, &start, &end).unwrap();
        let doc: serde_json::Value = serde_json::from_slice(&json).unwrap();
        assert_eq!(doc["row_count"], 0);
        assert!(doc["rows"].as_array().unwrap().is_empty());
    }
}
