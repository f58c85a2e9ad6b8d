//! Hosted leads table, queried through the PostgREST API.

use super::LeadSource;
use crate::error::FetchError;
use crate::filter::Filter;
use crate::lead::Lead;
use std::time::Duration;

pub const DEFAULT_TABLE: &str = "NEW-FACEBOOK";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_PAGE_SIZE: usize = 1000;
const MAX_RETRIES: u32 = 3;
const INITIAL_BACKOFF_MS: u64 = 200;

const COL_ACCOUNT: &str = "compte";
const COL_ACTIVITY: &str = "activité";
const COL_COLLECTED_AT: &str = "date_collecte";
const COL_NAME: &str = "nom";
const COL_EMAIL: &str = "email";

#[derive(Debug, Clone)]
pub struct SupabaseConfig {
    pub url: String,
    pub api_key: String,
    pub table: String,
    pub timeout: Duration,
    pub page_size: usize,
}

impl SupabaseConfig {
    pub fn new(url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            api_key: api_key.into(),
            table: DEFAULT_TABLE.to_string(),
            timeout: DEFAULT_TIMEOUT,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn endpoint(&self) -> String {
        format!("{}/rest/v1/{}", self.url.trim_end_matches('/'), self.table)
    }
}

pub struct SupabaseSource {
    config: SupabaseConfig,
    client: reqwest::Client,
}

/// One response of a paged read. `total` is the row count PostgREST reports
/// in `Content-Range` when asked for `count=exact`.
struct Page {
    rows: Vec<Lead>,
    total: Option<usize>,
}

impl SupabaseSource {
    pub fn new(config: SupabaseConfig) -> Result<Self, FetchError> {
        if config.url.trim().is_empty() {
            return Err(FetchError::Config("backend URL is not set".into()));
        }
        if config.api_key.trim().is_empty() {
            return Err(FetchError::Config("backend API key is not set".into()));
        }
        if !config.url.starts_with("http://") && !config.url.starts_with("https://") {
            return Err(FetchError::Config(format!(
                "backend URL must start with http:// or https://, got '{}'",
                config.url
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(CONNECT_TIMEOUT.min(config.timeout))
            .build()?;

        Ok(Self { config, client })
    }

    pub fn config(&self) -> &SupabaseConfig {
        &self.config
    }

    async fn fetch_page(
        &self,
        query: &[(String, String)],
        offset: usize,
    ) -> Result<Page, FetchError> {
        let mut last_error = None;

        for attempt in 0..MAX_RETRIES {
            match self.request_page(query, offset).await {
                Ok(page) => return Ok(page),
                Err(e) if e.is_retryable() => {
                    tracing::debug!(attempt, offset, error = %e, "Lead fetch failed");
                    last_error = Some(e);
                    if attempt < MAX_RETRIES - 1 {
                        tokio::time::sleep(Duration::from_millis(
                            INITIAL_BACKOFF_MS * (1 << attempt),
                        ))
                        .await;
                    }
                }
                Err(e) => return Err(e),
            }
        }

        let err = last_error
            .unwrap_or_else(|| FetchError::Config("no fetch attempt was made".into()));
        tracing::warn!(retries = MAX_RETRIES, error = %err, "Lead fetch gave up");
        Err(err)
    }

    async fn request_page(
        &self,
        query: &[(String, String)],
        offset: usize,
    ) -> Result<Page, FetchError> {
        let last = offset + self.config.page_size - 1;
        let response = self
            .client
            .get(self.config.endpoint())
            .query(query)
            .header("apikey", &self.config.api_key)
            .header(
                reqwest::header::AUTHORIZATION,
                format!("Bearer {}", self.config.api_key),
            )
            .header(reqwest::header::ACCEPT, "application/json")
            .header("Range-Unit", "items")
            .header(reqwest::header::RANGE, format!("{}-{}", offset, last))
            .header("Prefer", "count=exact")
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::RANGE_NOT_SATISFIABLE && offset > 0 {
            return Ok(Page {
                rows: Vec::new(),
                total: None,
            });
        }

        let total = response
            .headers()
            .get(reqwest::header::CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .and_then(content_range_total);

        let body = response.text().await?;
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                body: error_message(&body),
            });
        }

        Ok(Page {
            rows: serde_json::from_str(&body)?,
            total,
        })
    }
}

#[async_trait::async_trait]
impl LeadSource for SupabaseSource {
    async fn fetch_leads(&self, filter: &Filter) -> Result<Vec<Lead>, FetchError> {
        let query = build_query(filter);
        let mut leads = Vec::new();
        let mut offset = 0;

        // The server may cap a page below `page_size` (PostgREST `max-rows`),
        // so a short page does not mean the end of the data.
        loop {
            let page = self.fetch_page(&query, offset).await?;
            if page.rows.is_empty() {
                break;
            }
            offset += page.rows.len();
            leads.extend(page.rows);
            if page.total.is_some_and(|total| offset >= total) {
                break;
            }
        }

        tracing::debug!(
            table = %self.config.table,
            rows = leads.len(),
            "Fetched leads from backend"
        );
        Ok(leads)
    }
}

/// PostgREST query parameters for `filter`, in a stable order.
pub fn build_query(filter: &Filter) -> Vec<(String, String)> {
    let mut query = vec![("select".to_string(), "*".to_string())];

    if !filter.accounts.is_empty() {
        let list = filter
            .accounts
            .iter()
            .map(|a| quote(a))
            .collect::<Vec<_>>()
            .join(",");
        query.push((COL_ACCOUNT.to_string(), format!("in.({})", list)));
    }

    if let Some(activity) = &filter.activity {
        query.push((COL_ACTIVITY.to_string(), format!("eq.{}", activity)));
    }

    if let Some(from) = filter.date_from {
        query.push((
            COL_COLLECTED_AT.to_string(),
            format!("gte.{}T00:00:00", from.format("%Y-%m-%d")),
        ));
    }

    // Exclusive bound on the next midnight so fractional seconds of the
    // last day are kept.
    if let Some(next) = filter.date_to.and_then(|to| to.succ_opt()) {
        query.push((
            COL_COLLECTED_AT.to_string(),
            format!("lt.{}T00:00:00", next.format("%Y-%m-%d")),
        ));
    }

    if let Some(term) = filter.search_term() {
        let pattern = quote_reserved(&format!("*{}*", term));
        query.push((
            "or".to_string(),
            format!(
                "({}.ilike.{},{}.ilike.{})",
                COL_NAME, pattern, COL_EMAIL, pattern
            ),
        ));
    }

    query.push(("order".to_string(), format!("{}.asc", COL_COLLECTED_AT)));
    query
}

fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Quote a value only when it contains characters PostgREST treats as
/// syntax inside logical filters.
fn quote_reserved(value: &str) -> String {
    if value.contains([',', '(', ')', ':', '"', '\\']) {
        quote(value)
    } else {
        value.to_string()
    }
}

/// Total row count from a `Content-Range` value such as `0-999/2500`.
/// `*` totals (count not requested) give `None`.
fn content_range_total(value: &str) -> Option<usize> {
    value.rsplit_once('/')?.1.trim().parse().ok()
}

/// PostgREST wraps failures in `{"message": ...}`; fall back to the raw body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(String::from))
        .unwrap_or_else(|| body.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::sync::{Arc, Mutex};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn param<'a>(query: &'a [(String, String)], key: &str) -> Vec<&'a str> {
        query
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    struct Reply {
        status: u16,
        content_range: Option<&'static str>,
        body: String,
    }

    impl Reply {
        fn range(mut self, content_range: &'static str) -> Self {
            self.content_range = Some(content_range);
            self
        }
    }

    fn reply(status: u16, body: impl Into<String>) -> Reply {
        Reply {
            status,
            content_range: None,
            body: body.into(),
        }
    }

    /// Minimal HTTP server answering each connection with the next scripted
    /// response, recording the raw request heads.
    async fn serve(responses: Vec<Reply>) -> (String, Arc<Mutex<Vec<String>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&requests);

        tokio::spawn(async move {
            for Reply {
                status,
                content_range,
                body,
            } in responses
            {
                let (mut socket, _) = listener.accept().await.unwrap();
                let mut buf = vec![0u8; 16 * 1024];
                let mut read = 0;
                loop {
                    let n = socket.read(&mut buf[read..]).await.unwrap();
                    read += n;
                    if n == 0 || buf[..read].windows(4).any(|w| w == b"\r\n\r\n") {
                        break;
                    }
                }
                seen.lock()
                    .unwrap()
                    .push(String::from_utf8_lossy(&buf[..read]).to_lowercase());

                let range = content_range
                    .map(|r| format!("content-range: {}\r\n", r))
                    .unwrap_or_default();
                let response = format!(
                    "HTTP/1.1 {} Scripted\r\ncontent-type: application/json\r\n{}content-length: {}\r\nconnection: close\r\n\r\n{}",
                    status,
                    range,
                    body.len(),
                    body
                );
                socket.write_all(response.as_bytes()).await.unwrap();
                let _ = socket.shutdown().await;
            }
        });

        (format!("http://{}", addr), requests)
    }

    fn rows(accounts: &[&str]) -> String {
        let rows: Vec<String> = accounts
            .iter()
            .map(|a| {
                format!(
                    r#"{{"compte":"{}","activité":"PV","date_collecte":"2024-01-01T10:00:00+00:00"}}"#,
                    a
                )
            })
            .collect();
        format!("[{}]", rows.join(","))
    }

    #[test]
    fn test_build_query_empty_filter() {
        let query = build_query(&Filter::new());
        assert_eq!(param(&query, "select"), vec!["*"]);
        assert_eq!(param(&query, "order"), vec!["date_collecte.asc"]);
        assert!(param(&query, "compte").is_empty());
        assert!(param(&query, "activité").is_empty());
        assert!(param(&query, "date_collecte").is_empty());
        assert!(param(&query, "or").is_empty());
    }

    #[test]
    fn test_build_query_full_filter() {
        let filter = Filter::new()
            .with_accounts(["INVF", "INVC3"])
            .with_activity(Some("PV".into()))
            .with_range(
                NaiveDate::from_ymd_opt(2024, 1, 1),
                NaiveDate::from_ymd_opt(2024, 1, 31),
            )
            .with_search(" dupont ");

        let query = build_query(&filter);
        assert_eq!(param(&query, "compte"), vec![r#"in.("INVC3","INVF")"#]);
        assert_eq!(param(&query, "activité"), vec!["eq.PV"]);
        assert_eq!(
            param(&query, "date_collecte"),
            vec!["gte.2024-01-01T00:00:00", "lt.2024-02-01T00:00:00"]
        );
        assert_eq!(
            param(&query, "or"),
            vec!["(nom.ilike.*dupont*,email.ilike.*dupont*)"]
        );
    }

    #[test]
    fn test_build_query_quotes_reserved_search() {
        let query = build_query(&Filter::new().with_search("a,b"));
        assert_eq!(
            param(&query, "or"),
            vec![r#"(nom.ilike."*a,b*",email.ilike."*a,b*")"#]
        );
    }

    #[test]
    fn test_config_validation() {
        assert!(matches!(
            SupabaseSource::new(SupabaseConfig::new("", "key")),
            Err(FetchError::Config(_))
        ));
        assert!(matches!(
            SupabaseSource::new(SupabaseConfig::new("https://x.supabase.co", " ")),
            Err(FetchError::Config(_))
        ));
        assert!(matches!(
            SupabaseSource::new(SupabaseConfig::new("x.supabase.co", "key")),
            Err(FetchError::Config(_))
        ));
        assert!(SupabaseSource::new(SupabaseConfig::new("https://x.supabase.co", "key")).is_ok());
    }

    #[test]
    fn test_endpoint() {
        let config = SupabaseConfig::new("https://x.supabase.co/", "key");
        assert_eq!(config.endpoint(), "https://x.supabase.co/rest/v1/NEW-FACEBOOK");
        let config = config.with_table("leads");
        assert_eq!(config.endpoint(), "https://x.supabase.co/rest/v1/leads");
    }

    #[test]
    fn test_error_message_extraction() {
        assert_eq!(
            error_message(r#"{"code":"42P01","message":"relation does not exist"}"#),
            "relation does not exist"
        );
        assert_eq!(error_message(" upstream down \n"), "upstream down");
    }

    #[test]
    fn test_content_range_total() {
        assert_eq!(content_range_total("0-999/2500"), Some(2500));
        assert_eq!(content_range_total("*/0"), Some(0));
        assert_eq!(content_range_total("0-1/*"), None);
        assert_eq!(content_range_total("garbage"), None);
    }

    #[tokio::test]
    async fn test_fetch_sends_credentials_and_decodes_rows() {
        let (url, requests) =
            serve(vec![reply(200, rows(&["INVF", "INVC3"])).range("0-1/2")]).await;
        let source = SupabaseSource::new(SupabaseConfig::new(url, "secret")).unwrap();

        let leads = source
            .fetch_leads(&Filter::new().with_accounts(["INVF"]))
            .await
            .unwrap();
        assert_eq!(leads.len(), 2);
        assert_eq!(leads[0].account, "INVF");

        let requests = requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].starts_with("get /rest/v1/new-facebook?select=*"));
        assert!(requests[0].contains("apikey: secret"));
        assert!(requests[0].contains("authorization: bearer secret"));
        assert!(requests[0].contains("range: 0-999"));
        assert!(requests[0].contains("prefer: count=exact"));
    }

    #[tokio::test]
    async fn test_fetch_paginates() {
        let (url, requests) = serve(vec![
            reply(206, rows(&["A", "B"])).range("0-1/5"),
            reply(206, rows(&["C", "D"])).range("2-3/5"),
            reply(206, rows(&["E"])).range("4-4/5"),
        ])
        .await;
        let source =
            SupabaseSource::new(SupabaseConfig::new(url, "key").with_page_size(2)).unwrap();

        let leads = source.fetch_leads(&Filter::new()).await.unwrap();
        let accounts: Vec<&str> = leads.iter().map(|l| l.account.as_str()).collect();
        assert_eq!(accounts, vec!["A", "B", "C", "D", "E"]);

        let requests = requests.lock().unwrap();
        assert_eq!(requests.len(), 3);
        assert!(requests[1].contains("range: 2-3"));
        assert!(requests[2].contains("range: 4-5"));
    }

    #[tokio::test]
    async fn test_fetch_continues_past_server_row_cap() {
        // Server caps every response at 2 rows while 3 are requested.
        let (url, requests) = serve(vec![
            reply(206, rows(&["A", "B"])).range("0-1/5"),
            reply(206, rows(&["C", "D"])).range("2-3/5"),
            reply(206, rows(&["E"])).range("4-4/5"),
        ])
        .await;
        let source =
            SupabaseSource::new(SupabaseConfig::new(url, "key").with_page_size(3)).unwrap();

        let leads = source.fetch_leads(&Filter::new()).await.unwrap();
        assert_eq!(leads.len(), 5);

        let requests = requests.lock().unwrap();
        assert_eq!(requests.len(), 3);
        assert!(requests[0].contains("range: 0-2"));
        assert!(requests[1].contains("range: 2-4"));
        assert!(requests[2].contains("range: 4-6"));
    }

    #[tokio::test]
    async fn test_fetch_without_total_stops_on_empty_page() {
        let (url, requests) = serve(vec![
            reply(200, rows(&["A", "B"])),
            reply(200, rows(&["C"])),
            reply(200, "[]"),
        ])
        .await;
        let source =
            SupabaseSource::new(SupabaseConfig::new(url, "key").with_page_size(3)).unwrap();

        let leads = source.fetch_leads(&Filter::new()).await.unwrap();
        assert_eq!(leads.len(), 3);
        assert_eq!(requests.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_fetch_stops_on_range_not_satisfiable() {
        let (url, requests) = serve(vec![
            reply(200, rows(&["A", "B"])),
            reply(416, r#"{"message":"Requested range not satisfiable"}"#),
        ])
        .await;
        let source =
            SupabaseSource::new(SupabaseConfig::new(url, "key").with_page_size(2)).unwrap();

        let leads = source.fetch_leads(&Filter::new()).await.unwrap();
        assert_eq!(leads.len(), 2);
        assert_eq!(requests.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_fetch_empty_table() {
        let (url, requests) = serve(vec![reply(200, "[]").range("*/0")]).await;
        let source = SupabaseSource::new(SupabaseConfig::new(url, "key")).unwrap();

        assert!(source.fetch_leads(&Filter::new()).await.unwrap().is_empty());
        assert_eq!(requests.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_fetch_retries_server_errors() {
        let (url, requests) = serve(vec![
            reply(503, "unavailable"),
            reply(429, "slow down"),
            reply(200, rows(&["A"])).range("0-0/1"),
        ])
        .await;
        let source = SupabaseSource::new(SupabaseConfig::new(url, "key")).unwrap();

        let leads = source.fetch_leads(&Filter::new()).await.unwrap();
        assert_eq!(leads.len(), 1);
        assert_eq!(requests.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_fetch_client_error_is_not_retried() {
        let (url, requests) = serve(vec![reply(401, r#"{"message":"Invalid API key"}"#)]).await;
        let source = SupabaseSource::new(SupabaseConfig::new(url, "bad")).unwrap();

        let err = source.fetch_leads(&Filter::new()).await.unwrap_err();
        match err {
            FetchError::Status { status, body } => {
                assert_eq!(status, 401);
                assert_eq!(body, "Invalid API key");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(requests.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_fetch_gives_up_after_retries() {
        let (url, _) = serve(vec![
            reply(500, "boom"),
            reply(500, "boom"),
            reply(500, "boom"),
        ])
        .await;
        let source = SupabaseSource::new(SupabaseConfig::new(url, "key")).unwrap();

        let err = source.fetch_leads(&Filter::new()).await.unwrap_err();
        assert!(matches!(err, FetchError::Status { status: 500, .. }));
    }

    #[tokio::test]
    async fn test_fetch_invalid_body_is_decode_error() {
        let (url, _) = serve(vec![reply(200, "{\"oops\": true}")]).await;
        let source = SupabaseSource::new(SupabaseConfig::new(url, "key")).unwrap();

        let err = source.fetch_leads(&Filter::new()).await.unwrap_err();
        assert!(matches!(err, FetchError::Decode(_)));
    }
}
