use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use fern::colors::{Color, ColoredLevelConfig};

mod client;
mod command;
mod config;
mod duration;
mod format;
mod gitlog;
mod request;

use client::HttpClient;
use command::Command;
use config::Config;

/// RallyClockサーバで作業時間を記録するためのCLIアプリケーション。
///
/// # Examples
/// ```
/// $ rallyc auth -u karl -p secret -l http://rallyclock.com
/// $ rallyc log --from 2023-01-01 --to 2023-01-31
/// ```
#[derive(Debug, Parser)]
#[clap(version, about)]
struct Args {
    #[clap(
        help = "command to run: ping, auth, signup, whoami, projects, log, entry, create, edit, find-git-logs"
    )]
    command: Option<String>,

    #[clap(short = 'x', long = "token", help = "RallyClock api key")]
    token: Option<String>,

    #[clap(
        short = 'l',
        long = "url",
        help = "base url of the RallyClock server, e.g. 'http://rallyclock.com'"
    )]
    url: Option<String>,

    #[clap(short = 'u', long = "username", help = "your registered username")]
    username: Option<String>,

    #[clap(short = 'e', long = "email", help = "your registered email")]
    email: Option<String>,

    #[clap(short = 'p', long = "password", help = "your registered password")]
    password: Option<String>,

    #[clap(
        short = 'f',
        long = "from",
        help = "YYYY-MM-DD, returns entries starting from this date onwards. use with 'to' to filter"
    )]
    from: Option<String>,

    #[clap(
        short = 't',
        long = "to",
        help = "YYYY-MM-DD, returns entries up 'till this date. use with 'from' to filter"
    )]
    to: Option<String>,

    #[clap(
        short = 'd',
        long = "date",
        help = "YYYY-MM-DD, defaults to today's date"
    )]
    date: Option<String>,

    #[clap(short = 'i', long = "id", help = "returns the given entry by id")]
    id: Option<String>,

    #[clap(short = 'c', long = "project", help = "the project's code")]
    project: Option<String>,

    #[clap(short = 'g', long = "group", help = "the group's handle")]
    group: Option<String>,

    #[clap(short = 'a', long = "client", help = "the client's account")]
    client: Option<String>,

    #[clap(
        short = 'k',
        long = "time",
        help = "XhXXm, time to be entered",
        parse(try_from_str = crate::duration::parse_duration),
    )]
    time: Option<u32>,

    #[clap(
        short = 'n',
        long = "message",
        help = "detail your activity for an entry"
    )]
    message: Option<String>,

    #[clap(
        short = 'b',
        long = "by",
        help = "author substring to filter git logs by"
    )]
    by: Option<String>,

    #[clap(
        long = "prompt",
        help = "ask for the password interactively instead of passing it as a flag"
    )]
    prompt: bool,
}

impl Args {
    /// 指定されたフラグを設定のキーと値の組に変換する。
    ///
    /// from/to/dateはYYYYMMDD形式へ正規化し、timeはパース済みの分を使う。
    /// フラグ名と設定のキー名は一部異なる(project=code, group=handle,
    /// client=account, message=note)。
    fn to_flags(&self) -> Vec<(String, String)> {
        let mut flags = Vec::new();
        push_flag(&mut flags, "token", &self.token);
        push_flag(&mut flags, "url", &self.url);
        push_flag(&mut flags, "username", &self.username);
        push_flag(&mut flags, "email", &self.email);
        push_flag(&mut flags, "password", &self.password);
        push_date_flag(&mut flags, "from", &self.from);
        push_date_flag(&mut flags, "to", &self.to);
        push_date_flag(&mut flags, "date", &self.date);
        push_flag(&mut flags, "id", &self.id);
        push_flag(&mut flags, "code", &self.project);
        push_flag(&mut flags, "handle", &self.group);
        push_flag(&mut flags, "account", &self.client);
        push_flag(&mut flags, "note", &self.message);
        push_flag(&mut flags, "by", &self.by);
        if let Some(time) = self.time {
            flags.push(("time".to_string(), time.to_string()));
        }
        if self.prompt {
            flags.push(("prompt".to_string(), "true".to_string()));
        }

        flags
    }
}

fn push_flag(flags: &mut Vec<(String, String)>, key: &str, value: &Option<String>) {
    if let Some(value) = value {
        flags.push((key.to_string(), value.clone()));
    }
}

/// 日付のフラグは`-`を取り除いてYYYYMMDD形式で保存する。
fn push_date_flag(flags: &mut Vec<(String, String)>, key: &str, value: &Option<String>) {
    if let Some(value) = value {
        flags.push((key.to_string(), value.replace('-', "")));
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    setup_logger()?;

    let name = match &args.command {
        Some(name) => name.clone(),
        None => {
            Args::command()
                .print_help()
                .context("Failed to print usage")?;
            return Ok(());
        }
    };

    let config = Config::resolve(args.to_flags())?;

    // ハンドラの解決より先に許可リストで検証する
    let command = match Command::from_name(&name) {
        Some(command) => command,
        None => {
            println!("Unknown command {}.", name);
            std::process::exit(1);
        }
    };

    let config = prompt_password_if_requested(&command, config)?;

    let output = match command {
        Command::FindGitLogs => gitlog::run(&config)?,
        _ => {
            let url = config.require("url")?;
            let client = HttpClient::new(url)?;
            command::run(&command, &config, &client).await?
        }
    };
    println!("{}", output);

    Ok(())
}

/// `--prompt`が指定された認証系のコマンドでは、パスワードを画面に
/// 表示せずに入力してもらい、設定の値を差し替える。
fn prompt_password_if_requested(command: &Command, config: Config) -> Result<Config> {
    let wants_password = matches!(command, Command::Auth | Command::Signup);
    if !wants_password || !config.is_set("prompt") {
        return Ok(config);
    }

    let password = rpassword::prompt_password("password: ").context("Failed to read password")?;

    Ok(config.with_value("password", &password))
}

/// ログの出力先と書式を設定する。
fn setup_logger() -> Result<()> {
    let colors = ColoredLevelConfig::new()
        .info(Color::Green)
        .warn(Color::Yellow)
        .error(Color::Red);
    fern::Dispatch::new()
        .format(move |out, message, record| {
            out.finish(format_args!(
                "[{}][{}] {}",
                colors.color(record.level()),
                record.target(),
                message
            ))
        })
        .level(log::LevelFilter::Info)
        .chain(std::io::stderr())
        .apply()
        .context("Failed to initialize logger")
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::Args;

    /// 日付系のフラグがYYYYMMDD形式へ正規化されることを確認する。
    #[test]
    fn test_to_flags_normalizes_dates() {
        let args = Args::parse_from([
            "rallyc", "log", "--from", "2023-01-01", "--to", "2023-01-31",
        ]);

        let flags = args.to_flags();

        assert!(flags.contains(&("from".to_string(), "20230101".to_string())));
        assert!(flags.contains(&("to".to_string(), "20230131".to_string())));
    }

    /// timeフラグがパースの時点で分へ変換されることを確認する。
    #[test]
    fn test_to_flags_time_in_minutes() {
        let args = Args::parse_from(["rallyc", "create", "--time", "2h15m"]);

        let flags = args.to_flags();

        assert!(flags.contains(&("time".to_string(), "135".to_string())));
    }

    /// 解釈できないtimeフラグはパースの時点で弾かれることを確認する。
    #[test]
    fn test_invalid_time_flag() {
        assert!(Args::try_parse_from(["rallyc", "create", "--time", "abc"]).is_err());
    }

    /// フラグ名と設定のキー名の対応のテスト。
    #[test]
    fn test_to_flags_renames_options() {
        let args = Args::parse_from([
            "rallyc",
            "create",
            "--project",
            "site",
            "--group",
            "acme",
            "--client",
            "bigcorp",
            "--message",
            "built the thing",
        ]);

        let flags = args.to_flags();

        assert!(flags.contains(&("code".to_string(), "site".to_string())));
        assert!(flags.contains(&("handle".to_string(), "acme".to_string())));
        assert!(flags.contains(&("account".to_string(), "bigcorp".to_string())));
        assert!(flags.contains(&("note".to_string(), "built the thing".to_string())));
    }

    /// promptフラグの有無のテスト。
    #[test]
    fn test_to_flags_prompt() {
        let with_prompt = Args::parse_from(["rallyc", "auth", "--prompt"]);
        let without_prompt = Args::parse_from(["rallyc", "auth"]);

        assert!(with_prompt
            .to_flags()
            .contains(&("prompt".to_string(), "true".to_string())));
        assert!(!without_prompt
            .to_flags()
            .iter()
            .any(|(key, _)| key == "prompt"));
    }
}
