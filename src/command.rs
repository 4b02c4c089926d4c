use std::path::Path;

use anyhow::{bail, Context, Result};
use log::info;
use serde::Deserialize;

use crate::client::Transport;
use crate::config::{self, Config};
use crate::format;
use crate::gitlog;
use crate::request;

/// 利用できるコマンドを表す列挙型。
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Command {
    Ping,
    Auth,
    Signup,
    Whoami,
    Projects,
    Log,
    Entry,
    Create,
    Edit,
    FindGitLogs,
}

impl Command {
    /// コマンド名から対応するコマンドを返す。
    ///
    /// ハンドラの解決より先にこの許可リストで検証し、任意の文字列が
    /// 内部の処理に解決されないようにする。一覧にない名前は`None`を返す。
    pub fn from_name(name: &str) -> Option<Self> {
        // entriesとcommitは旧バージョンでのコマンド名
        match name {
            "ping" => Some(Self::Ping),
            "auth" => Some(Self::Auth),
            "signup" => Some(Self::Signup),
            "whoami" => Some(Self::Whoami),
            "projects" => Some(Self::Projects),
            "log" | "entries" => Some(Self::Log),
            "entry" => Some(Self::Entry),
            "create" | "commit" => Some(Self::Create),
            "edit" => Some(Self::Edit),
            "find-git-logs" => Some(Self::FindGitLogs),
            _ => None,
        }
    }
}

/// 認証レスポンスをデシリアライズするための構造体。
#[derive(Debug, Deserialize)]
struct SessionResponse {
    username: Option<String>,
    email: Option<String>,
    api_key: Option<String>,
    error: Option<String>,
}

/// コマンドの処理を行い、表示する文字列を返す。
///
/// # Arguments
///
/// * `command` - 実行するコマンド
/// * `config` - 解決済みの設定
/// * `transport` - サーバと通信するためのトランスポート
pub async fn run<T: Transport>(
    command: &Command,
    config: &Config,
    transport: &T,
) -> Result<String> {
    match command {
        Command::Auth => {
            let path = config::user_config_path().context("Failed to locate home directory")?;
            auth_command(config, transport, &path).await
        }
        Command::Create => {
            let raw = send(command, config, transport).await?;
            format::render(&raw, &["id"], Some("created time entry with"))
        }
        Command::FindGitLogs => gitlog::run(config),
        _ => {
            let raw = send(command, config, transport).await?;
            format::render(&raw, &[], None)
        }
    }
}

async fn send<T: Transport>(command: &Command, config: &Config, transport: &T) -> Result<String> {
    let request = request::build(command, config)?;
    info!("{} /{}", request.method, request.path.join("/"));
    transport.execute(&request).await
}

/// `auth`コマンドの処理を行う。
///
/// 認証に成功してapi keyを受け取れた場合だけ設定ファイルを書き込む。
async fn auth_command<T: Transport>(
    config: &Config,
    transport: &T,
    credentials_path: &Path,
) -> Result<String> {
    let raw = send(&Command::Auth, config, transport).await?;
    let session: SessionResponse = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse server response: {}", raw))?;
    if let Some(error) = session.error {
        bail!("Server sent error: \n{}", error);
    }

    let url = config.require("url")?;
    let username = session
        .username
        .context("response did not contain a username")?;
    let email = session.email.context("response did not contain an email")?;
    let token = session
        .api_key
        .context("response did not contain an api key")?;
    config::write_credentials(credentials_path, url, &username, &email, &token)?;
    info!("stored credentials for {}", username);

    Ok(format!("created {}", credentials_path.display()))
}
