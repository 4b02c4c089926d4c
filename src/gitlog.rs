use std::env;
use std::fs;
use std::io::Write;
use std::process::Command;

use anyhow::{ensure, Context, Result};
use chrono::{Local, NaiveDate};
use log::info;
#[cfg(test)]
use mockall::automock;

use crate::config::Config;
use crate::format::SEPARATOR;

/// エディタが指定されていない場合に使うコマンド。
const DEFAULT_EDITOR: &str = "vi";

/// コミット履歴の取得元を表すtrait。
#[cfg_attr(test, automock)]
pub trait CommitSource {
    /// コミット履歴全体を1つのテキストとして返す。
    fn full_log(&self) -> Result<String>;
}

/// `git log`を実行して履歴を取得する。
pub struct GitCli;

impl CommitSource for GitCli {
    fn full_log(&self) -> Result<String> {
        let output = Command::new("git")
            .arg("log")
            .output()
            .context("Failed to run git log")?;
        ensure!(
            output.status.success(),
            "git log exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr)
        );

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// `find-git-logs`コマンドの処理を行う。
///
/// 作者と日付で絞り込んだコミットを一時ファイルへ書き出してエディタで
/// 編集してもらい、編集後の内容を区切り線で挟んで返す。
pub fn run(config: &Config) -> Result<String> {
    let editor = env::var("EDITOR").unwrap_or_else(|_| DEFAULT_EDITOR.to_string());
    run_with(config, &GitCli, &editor)
}

fn run_with<T: CommitSource>(config: &Config, source: &T, editor: &str) -> Result<String> {
    let records = collect(config, source)?;
    if records.is_empty() {
        return Ok("no commits found".to_string());
    }

    let edited = review_in_editor(editor, &records.join(""))?;

    let mut framed = String::new();
    framed.push_str(SEPARATOR);
    framed.push('\n');
    framed.push_str(&edited);
    if !edited.ends_with('\n') {
        framed.push('\n');
    }
    framed.push_str(SEPARATOR);

    Ok(framed)
}

/// コミット履歴を取得し、作者と日付で絞り込んだレコードを返す。
fn collect<T: CommitSource>(config: &Config, source: &T) -> Result<Vec<String>> {
    let log = source.full_log()?;
    let author = config.get("by").unwrap_or_default();
    let needle = date_needle(config.get("date"))?;
    info!("filtering commits by author {:?} and date {:?}", author, needle);

    Ok(filter_commits(&log, author, &needle))
}

/// 絞り込みに使う`月略称 日`形式の文字列を組み立てる。
///
/// 日付はYYYYMMDD形式で受け取り、指定がなければ今日の日付を使う。
fn date_needle(date: Option<&str>) -> Result<String> {
    let date = match date {
        Some(text) => NaiveDate::parse_from_str(text, "%Y%m%d")
            .with_context(|| format!("invalid date: {}", text))?,
        None => Local::now().date_naive(),
    };

    Ok(date.format("%b %d").to_string())
}

/// 作者と日付の両方に一致するレコードだけを元の順番のまま返す。
fn filter_commits(log: &str, author: &str, date: &str) -> Vec<String> {
    split_commits(log)
        .into_iter()
        .filter(|record| matches_author(record, author) && record.contains(date))
        .collect()
}

/// コミット履歴をレコード単位に分割する。
///
/// レコードは`commit `で始まる行から次の境界の手前までとする。
fn split_commits(log: &str) -> Vec<String> {
    let mut records: Vec<String> = Vec::new();
    for line in log.lines() {
        if line.starts_with("commit ") {
            records.push(String::new());
        }
        if let Some(record) = records.last_mut() {
            record.push_str(line);
            record.push('\n');
        }
    }

    records
}

fn matches_author(record: &str, author: &str) -> bool {
    record
        .lines()
        .any(|line| line.starts_with("Author:") && line.contains(author))
}

/// 内容を一時ファイルへ書き出し、エディタで編集してもらった結果を返す。
///
/// 一時ファイルはエディタの成否に関わらずdrop時に削除される。
fn review_in_editor(editor: &str, text: &str) -> Result<String> {
    let mut file = tempfile::Builder::new()
        .prefix("rallyc-logs-")
        .suffix(".txt")
        .tempfile()
        .context("Failed to create temporary file")?;
    file.write_all(text.as_bytes())
        .context("Failed to write commits to temporary file")?;
    file.flush()
        .context("Failed to flush temporary file")?;

    let mut parts = editor.split_whitespace();
    let program = parts.next().context("editor command is empty")?;
    let status = Command::new(program)
        .args(parts)
        .arg(file.path())
        .status()
        .with_context(|| format!("Failed to launch editor: {}", editor))?;
    ensure!(status.success(), "editor {} exited with {}", editor, status);

    fs::read_to_string(file.path()).context("Failed to read back the edited file")
}
