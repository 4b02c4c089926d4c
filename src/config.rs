use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::warn;

/// 設定ファイルとコマンドラインフラグで指定できるオプション名。
const RECOGNIZED_KEYS: [&str; 16] = [
    "token", "username", "password", "email", "url", "from", "to", "id", "note", "date", "time",
    "code", "handle", "account", "prompt", "by",
];

/// 設定ファイルの名前。ホームディレクトリと作業ディレクトリの2箇所を参照する。
const CONFIG_FILE_NAME: &str = ".rally.rc";

/// 解決済みの設定。
///
/// 一度解決した後は読み取り専用で、各コマンドのハンドラへそのまま渡す。
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Config {
    values: BTreeMap<String, String>,
}

impl Config {
    /// 既定の設定ソースとコマンドラインフラグから設定を解決する。
    ///
    /// 優先順位は低い方から、ホームディレクトリの設定ファイル、
    /// 作業ディレクトリの設定ファイル、コマンドラインフラグの順。
    pub fn resolve(flags: Vec<(String, String)>) -> Result<Self> {
        let mut paths = Vec::new();
        if let Some(path) = user_config_path() {
            paths.push(path);
        }
        paths.push(PathBuf::from(CONFIG_FILE_NAME));

        Self::resolve_from(&paths, flags)
    }

    /// 指定された設定ファイル群とフラグから設定を解決する。
    ///
    /// ソースは前から順に読み込み、後のソースが同じキーの値を上書きする。
    /// フラグは常に最後に適用する。
    fn resolve_from(paths: &[PathBuf], flags: Vec<(String, String)>) -> Result<Self> {
        let mut values = BTreeMap::new();
        for path in paths {
            for (key, value) in load_source(path)? {
                values.insert(key, value);
            }
        }
        for (key, value) in flags {
            values.insert(key, value);
        }

        Ok(Self { values })
    }

    /// オプションの値を返す。
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// オプションの値を要求し、設定されていなければエラーを返す。
    pub fn require(&self, key: &str) -> Result<&str> {
        self.get(key)
            .with_context(|| format!("missing required option: {}", key))
    }

    /// booleanフラグが設定されているかを返す。
    pub fn is_set(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// 1つの値を差し替えた新しい設定を返す。
    pub fn with_value(&self, key: &str, value: &str) -> Self {
        let mut values = self.values.clone();
        values.insert(key.to_string(), value.to_string());
        Self { values }
    }
}

/// ホームディレクトリ側の設定ファイルのパスを返す。
pub fn user_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(CONFIG_FILE_NAME))
}

/// 設定ファイルを読み込み、キーと値の組のリストを返す。
///
/// ファイルが存在しない場合は空のリストを返す。各行は最初のコロンで
/// キーと値に分割し、コロンを含まない行は警告を出して読み飛ばす。
fn load_source(path: &Path) -> Result<Vec<(String, String)>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    let mut pairs = Vec::new();
    for (number, line) in content.lines().enumerate() {
        if line.is_empty() {
            continue;
        }
        // 値の中のコロンは保持するため、最初のコロンだけを区切りとして扱う
        let (key, value) = match line.split_once(':') {
            Some(pair) => pair,
            None => {
                warn!(
                    "ignoring malformed line {} in {}: {}",
                    number + 1,
                    path.display(),
                    line
                );
                continue;
            }
        };
        if !RECOGNIZED_KEYS.contains(&key) {
            warn!("unrecognized option {} in {}", key, path.display());
        }
        pairs.push((key.to_string(), value.to_string()));
    }

    Ok(pairs)
}

/// 認証結果をホームディレクトリ側の設定ファイルへ書き込む。
///
/// 書き込み途中で失敗しても壊れたファイルが残らないよう、同じディレクトリに
/// 一時ファイルを作ってからrenameで置き換える。
pub fn write_credentials(
    path: &Path,
    url: &str,
    username: &str,
    email: &str,
    token: &str,
) -> Result<()> {
    let dir = path
        .parent()
        .context("config path has no parent directory")?;
    let mut file = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create temporary file in {}", dir.display()))?;
    writeln!(file, "url:{}", url)?;
    writeln!(file, "username:{}", username)?;
    writeln!(file, "email:{}", email)?;
    writeln!(file, "token:{}", token)?;
    file.persist(path)
        .with_context(|| format!("Failed to write config file: {}", path.display()))?;

    Ok(())
}
