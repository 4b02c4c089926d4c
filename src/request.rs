use anyhow::{bail, Result};
use reqwest::Method;

use crate::command::Command;
use crate::config::Config;

/// 送信するリクエストの内容。
///
/// パスはセグメント単位で保持し、URLへの組み立てとエスケープは
/// トランスポート側で行う。文字列連結でURLを作らない。
#[derive(Clone, Debug, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: Vec<String>,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Vec<(String, String)>,
}

impl ApiRequest {
    fn new(method: Method, path: &[&str]) -> Self {
        Self {
            method,
            path: path.iter().map(|segment| segment.to_string()).collect(),
            query: Vec::new(),
            headers: Vec::new(),
            body: Vec::new(),
        }
    }
}

/// コマンドと設定から送信するリクエストを組み立てる。
///
/// `find-git-logs`はネットワークを使わないため、このモジュールでは扱わない。
///
/// # Examples
///
/// ```
/// let request = build(&Command::Ping, &config).unwrap();
/// assert_eq!(request.path.join("/"), "api/v1/system/ping");
/// ```
pub fn build(command: &Command, config: &Config) -> Result<ApiRequest> {
    let request = match command {
        Command::Ping => ApiRequest::new(Method::GET, &["api", "v1", "system", "ping"]),
        Command::Auth => {
            let mut request = ApiRequest::new(Method::POST, &["api", "v1", "sessions"]);
            request.headers.push((
                "X_USERNAME".to_string(),
                config.require("username")?.to_string(),
            ));
            request.headers.push((
                "X_PASSWORD".to_string(),
                config.require("password")?.to_string(),
            ));
            request
        }
        Command::Signup => {
            let mut request = ApiRequest::new(Method::POST, &["api", "v1", "users"]);
            push_required(&mut request.body, "email", config)?;
            push_required(&mut request.body, "password", config)?;
            push_required(&mut request.body, "username", config)?;
            request
        }
        Command::Whoami => with_token(ApiRequest::new(Method::GET, &["api", "v1", "me"]), config),
        Command::Projects => with_token(
            ApiRequest::new(Method::GET, &["api", "v1", "me", "projects"]),
            config,
        ),
        Command::Log => {
            let mut request = with_token(
                ApiRequest::new(Method::GET, &["api", "v1", "me", "entries"]),
                config,
            );
            // fromとtoの有無は独立に判定し、指定されたものだけをクエリに載せる
            push_present(&mut request.query, "from", config);
            push_present(&mut request.query, "to", config);
            request
        }
        Command::Entry => {
            let id = config.require("id")?;
            with_token(
                ApiRequest::new(Method::GET, &["api", "v1", "me", "entries", id]),
                config,
            )
        }
        Command::Create => {
            let handle = config.require("handle")?;
            let account = config.require("account")?;
            let code = config.require("code")?;
            let mut request = with_token(
                ApiRequest::new(
                    Method::POST,
                    &[
                        "api", "v1", handle, "clients", account, "projects", code, "entries",
                    ],
                ),
                config,
            );
            push_entry_required(&mut request.body, "time", config)?;
            push_entry_required(&mut request.body, "note", config)?;
            push_entry_present(&mut request.body, "date", config);
            request
        }
        Command::Edit => {
            let id = config.require("id")?;
            let mut request = with_token(
                ApiRequest::new(Method::PUT, &["api", "v1", "me", "entries", id]),
                config,
            );
            push_entry_present(&mut request.body, "time", config);
            push_entry_present(&mut request.body, "date", config);
            push_entry_present(&mut request.body, "note", config);
            request
        }
        Command::FindGitLogs => bail!("find-git-logs does not use the network"),
    };

    Ok(request)
}

/// 認証トークンが設定されていればクエリパラメータ`t`として付与する。
fn with_token(mut request: ApiRequest, config: &Config) -> ApiRequest {
    if let Some(token) = config.get("token") {
        request.query.push(("t".to_string(), token.to_string()));
    }
    request
}

/// オプションが設定されている場合だけパラメータに加える。
fn push_present(params: &mut Vec<(String, String)>, key: &str, config: &Config) {
    if let Some(value) = config.get(key) {
        params.push((key.to_string(), value.to_string()));
    }
}

fn push_required(params: &mut Vec<(String, String)>, key: &str, config: &Config) -> Result<()> {
    params.push((key.to_string(), config.require(key)?.to_string()));
    Ok(())
}

/// `entry[...]`形式のボディパラメータ。設定されている場合だけ加える。
fn push_entry_present(params: &mut Vec<(String, String)>, key: &str, config: &Config) {
    if let Some(value) = config.get(key) {
        params.push((format!("entry[{}]", key), value.to_string()));
    }
}

fn push_entry_required(
    params: &mut Vec<(String, String)>,
    key: &str,
    config: &Config,
) -> Result<()> {
    params.push((format!("entry[{}]", key), config.require(key)?.to_string()));
    Ok(())
}
