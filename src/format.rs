use anyhow::{bail, Context, Result};
use serde_json::{Map, Value};

use crate::duration::format_duration;

/// 一覧表示やログ出力で項目を区切るための線。
pub const SEPARATOR: &str = "----------------------------------------";

/// サーバのレスポンスを人が読める形に整形する。
///
/// `columns`が空でない場合はその項目だけをその順番で表示する。
/// `lead`が指定されている場合は先頭にそのメッセージを表示する。
/// レスポンスが`error`を含む場合とJSONとして解釈できない場合はエラーを返す。
///
/// # Examples
///
/// ```
/// let text = render(r#"{"id":5}"#, &["id"], Some("created time entry with")).unwrap();
/// assert_eq!(text, "created time entry with\nid: 5");
/// ```
pub fn render(raw: &str, columns: &[&str], lead: Option<&str>) -> Result<String> {
    let value: Value = serde_json::from_str(raw)
        .with_context(|| format!("Failed to parse server response: {}", raw))?;

    if let Some(error) = value.as_object().and_then(|record| record.get("error")) {
        bail!("Server sent error: \n{}", display_value(error));
    }

    let mut lines = Vec::new();
    if let Some(lead) = lead {
        lines.push(lead.to_string());
    }
    match &value {
        Value::Array(records) => {
            for (index, record) in records.iter().enumerate() {
                if index > 0 {
                    lines.push(SEPARATOR.to_string());
                }
                render_value(record, columns, &mut lines);
            }
        }
        other => render_value(other, columns, &mut lines),
    }

    Ok(lines.join("\n"))
}

/// 1レコード分の値を整形する。レコード以外の値はそのまま表示する。
fn render_value(value: &Value, columns: &[&str], lines: &mut Vec<String>) {
    match value {
        Value::Object(record) => render_record(record, columns, lines),
        other => lines.push(display_value(other)),
    }
}

/// レコードの各項目を1行ずつ整形する。
///
/// `columns`が空の場合はレスポンスに現れた順番のまま全項目を表示する。
fn render_record(record: &Map<String, Value>, columns: &[&str], lines: &mut Vec<String>) {
    if columns.is_empty() {
        for (key, value) in record {
            lines.push(field_line(key, value));
        }
    } else {
        for column in columns {
            if let Some(value) = record.get(*column) {
                lines.push(field_line(column, value));
            }
        }
    }
}

/// 1項目分の行を整形する。`time`は分の数値ではなく`XhXXm`表記で表示する。
fn field_line(key: &str, value: &Value) -> String {
    if key == "time" {
        if let Some(minutes) = value.as_u64() {
            return format!("{}: {}", key, format_duration(minutes as u32));
        }
    }

    format!("{}: {}", key, display_value(value))
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
