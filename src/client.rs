use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use reqwest::{Client, Url};

use crate::request::ApiRequest;

/// RallyClockサーバと通信するためのtrait。
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Transport {
    /// リクエストを送信し、レスポンスボディをそのまま返す。
    async fn execute(&self, request: &ApiRequest) -> Result<String>;
}

/// リクエスト全体に適用するタイムアウト。
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// reqwestを利用した`Transport`の実装。
///
/// # Examples
///
/// ```
/// let client = HttpClient::new("http://rallyclock.com").unwrap();
/// let body = client.execute(&request).await.unwrap();
/// ```
pub struct HttpClient {
    client: Client,
    base_url: Url,
}

impl HttpClient {
    /// 新しい`HttpClient`を返す。
    ///
    /// サーバのURLとして解釈できない文字列の場合はエラーを返す。
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build http client")?;
        let base_url = Url::parse(base_url)
            .with_context(|| format!("invalid server url: {}", base_url))?;

        Ok(Self { client, base_url })
    }
}

#[async_trait]
impl Transport for HttpClient {
    // パスのセグメントとクエリ、ボディはすべてreqwest側でエスケープさせる
    async fn execute(&self, request: &ApiRequest) -> Result<String> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow!("server url cannot be a base: {}", self.base_url))?
            .pop_if_empty()
            .extend(&request.path);

        let mut builder = self.client.request(request.method.clone(), url);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if !request.body.is_empty() {
            builder = builder.form(&request.body);
        }

        let response = builder
            .send()
            .await
            .with_context(|| format!("Failed to send request to {}", self.base_url))?;
        let body = response
            .text()
            .await
            .context("Failed to read response body")?;

        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use mockito::Matcher;
    use reqwest::Method;

    use super::HttpClient;
    use super::Transport;
    use crate::request::ApiRequest;

    fn request(method: Method, path: &[&str]) -> ApiRequest {
        ApiRequest {
            method,
            path: path.iter().map(|segment| segment.to_string()).collect(),
            query: Vec::new(),
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    /// クエリ付きのGETリクエストが期待通りのURLになることを確認する。
    #[tokio::test]
    async fn test_execute_get_with_query() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v1/me/entries")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("t".into(), "tok".into()),
                Matcher::UrlEncoded("from".into(), "20230101".into()),
            ]))
            .with_body("[]")
            .create_async()
            .await;
        let client = HttpClient::new(&server.url()).unwrap();
        let mut request = request(Method::GET, &["api", "v1", "me", "entries"]);
        request.query = vec![
            ("t".to_string(), "tok".to_string()),
            ("from".to_string(), "20230101".to_string()),
        ];

        let body = client.execute(&request).await.unwrap();

        assert_eq!(body, "[]");
        mock.assert_async().await;
    }

    /// ヘッダとフォームボディ付きのPOSTリクエストのテスト。
    #[tokio::test]
    async fn test_execute_post_with_headers_and_body() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/v1/sessions")
            .match_header("X_USERNAME", "karl")
            .match_header("X_PASSWORD", "secret")
            .with_body(r#"{"api_key":"tok"}"#)
            .create_async()
            .await;
        let client = HttpClient::new(&server.url()).unwrap();
        let mut request = request(Method::POST, &["api", "v1", "sessions"]);
        request.headers = vec![
            ("X_USERNAME".to_string(), "karl".to_string()),
            ("X_PASSWORD".to_string(), "secret".to_string()),
        ];

        let body = client.execute(&request).await.unwrap();

        assert_eq!(body, r#"{"api_key":"tok"}"#);
        mock.assert_async().await;
    }

    /// フォームボディがURLエンコードされて送られることを確認する。
    #[tokio::test]
    async fn test_execute_form_body_is_encoded() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/v1/acme/clients/bigcorp/projects/site/entries")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("entry[time]".into(), "135".into()),
                Matcher::UrlEncoded("entry[note]".into(), "worked & rested".into()),
            ]))
            .with_body(r#"{"id":5}"#)
            .create_async()
            .await;
        let client = HttpClient::new(&server.url()).unwrap();
        let mut request = request(
            Method::POST,
            &[
                "api", "v1", "acme", "clients", "bigcorp", "projects", "site", "entries",
            ],
        );
        request.body = vec![
            ("entry[time]".to_string(), "135".to_string()),
            ("entry[note]".to_string(), "worked & rested".to_string()),
        ];

        let body = client.execute(&request).await.unwrap();

        assert_eq!(body, r#"{"id":5}"#);
        mock.assert_async().await;
    }

    /// パスのセグメントがエスケープされることを確認する。
    #[tokio::test]
    async fn test_execute_escapes_path_segments() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v1/me/entries/a%20b")
            .with_body(r#"{"id":"a b"}"#)
            .create_async()
            .await;
        let client = HttpClient::new(&server.url()).unwrap();
        let request = request(Method::GET, &["api", "v1", "me", "entries", "a b"]);

        let body = client.execute(&request).await.unwrap();

        assert_eq!(body, r#"{"id":"a b"}"#);
        mock.assert_async().await;
    }

    /// エラーステータスでもボディをそのまま返すことを確認する。
    ///
    /// サーバ側のエラーはボディの`error`として返ってくるため、
    /// ステータスだけで失敗扱いにしない。
    #[tokio::test]
    async fn test_execute_returns_body_on_error_status() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/v1/me")
            .with_status(500)
            .with_body(r#"{"error":"boom"}"#)
            .create_async()
            .await;
        let client = HttpClient::new(&server.url()).unwrap();
        let request = request(Method::GET, &["api", "v1", "me"]);

        let body = client.execute(&request).await.unwrap();

        assert_eq!(body, r#"{"error":"boom"}"#);
    }

    /// 解釈できないURLはエラーになることを確認する。
    #[test]
    fn test_new_invalid_url() {
        assert!(HttpClient::new("not a url").is_err());
    }
}
