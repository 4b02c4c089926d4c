use anyhow::{bail, Context, Result};

/// `2h15m`形式の作業時間表記を分に変換する。
///
/// 時間と分はそれぞれ省略できるが、`[時間h][分m]`の順で少なくとも一方を記述する。
/// 解釈できない文字列は0に丸めず、エラーとして返す。
///
/// # Examples
///
/// ```
/// let minutes = parse_duration("2h15m").unwrap();
/// assert_eq!(minutes, 135);
/// ```
pub fn parse_duration(text: &str) -> Result<u32> {
    if text.is_empty() {
        bail!("duration is empty");
    }

    let mut rest = text;
    let mut hours: u32 = 0;
    if let Some(index) = rest.find('h') {
        hours = rest[..index]
            .parse()
            .with_context(|| format!("invalid hours in duration: {}", text))?;
        rest = &rest[index + 1..];
    }

    let minutes: u32 = match rest.strip_suffix('m') {
        Some(digits) => digits
            .parse()
            .with_context(|| format!("invalid minutes in duration: {}", text))?,
        None if rest.is_empty() => 0,
        None => bail!("invalid duration: {}", text),
    };

    Ok(hours * 60 + minutes)
}

/// 分を`{時間}h{分}m`形式の表記に変換する。
///
/// 1時間未満でも時間の桁は省略しない。
pub fn format_duration(minutes: u32) -> String {
    format!("{}h{}m", minutes / 60, minutes % 60)
}
