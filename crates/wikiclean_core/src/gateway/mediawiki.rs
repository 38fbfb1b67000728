use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::sleep;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use anyhow::Context;
use reqwest::blocking::Client;
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info};

use super::{DisambiguationReport, Gateway, GatewayResult, LinkedPage, PageContent, WriteResult};
use crate::config::{
    DEFAULT_MAX_PAGES_PER_QUERY, DEFAULT_USER_AGENT, WikicleanConfig, env_override, env_value_u64,
    env_value_usize,
};
use crate::error::GatewayError;

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub api_url: String,
    pub user_agent: String,
    pub timeout_ms: u64,
    pub rate_limit_read_ms: u64,
    pub rate_limit_write_ms: u64,
    pub max_retries: usize,
    pub max_write_retries: usize,
    pub retry_delay_ms: u64,
    pub max_pages_per_query: usize,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl GatewayConfig {
    pub fn from_env() -> Self {
        Self::from_env_with_defaults("", DEFAULT_USER_AGENT, DEFAULT_MAX_PAGES_PER_QUERY)
    }

    pub fn from_config(config: &WikicleanConfig) -> Self {
        let api_default = config.wiki.api_url.as_deref().unwrap_or("");
        Self::from_env_with_defaults(
            api_default,
            &config.user_agent(),
            config.max_pages_per_query(),
        )
    }

    fn from_env_with_defaults(
        api_url_default: &str,
        user_agent_default: &str,
        max_pages_per_query: usize,
    ) -> Self {
        Self {
            api_url: env_override("WIKI_API_URL").unwrap_or_else(|| api_url_default.to_string()),
            user_agent: env_override("WIKI_USER_AGENT")
                .unwrap_or_else(|| user_agent_default.to_string()),
            timeout_ms: env_value_u64("WIKI_HTTP_TIMEOUT_MS", 30_000),
            rate_limit_read_ms: env_value_u64("WIKI_RATE_LIMIT_READ", 300),
            rate_limit_write_ms: env_value_u64("WIKI_RATE_LIMIT_WRITE", 1_000),
            max_retries: env_value_usize("WIKI_HTTP_RETRIES", 2),
            max_write_retries: env_value_usize("WIKI_HTTP_WRITE_RETRIES", 1),
            retry_delay_ms: env_value_u64("WIKI_HTTP_RETRY_DELAY_MS", 500),
            max_pages_per_query,
            username: env_override("WIKI_USERNAME"),
            password: env_override("WIKI_PASSWORD"),
        }
    }
}

#[derive(Debug, Default)]
struct RequestPacing {
    next_read_at: Option<Instant>,
    next_write_at: Option<Instant>,
}

/// MediaWiki `api.php` client (JSON, formatversion 2).
///
/// Requests from concurrent workers are spaced by the read/write rate limits;
/// each caller reserves its start slot under a short lock and sleeps outside
/// it.
pub struct MediaWikiGateway {
    client: Client,
    api_url: Url,
    config: GatewayConfig,
    pacing: Mutex<RequestPacing>,
    csrf_token: Mutex<Option<String>>,
    request_count: AtomicUsize,
}

impl MediaWikiGateway {
    pub fn new(config: GatewayConfig) -> anyhow::Result<Self> {
        let api_url = Url::parse(&config.api_url)
            .with_context(|| format!("invalid WIKI_API_URL: {}", config.api_url))?;
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .cookie_store(true)
            .build()
            .context("failed to build MediaWiki HTTP client")?;

        Ok(Self {
            client,
            api_url,
            config,
            pacing: Mutex::new(RequestPacing::default()),
            csrf_token: Mutex::new(None),
            request_count: AtomicUsize::new(0),
        })
    }

    /// Build the client and log in when credentials are configured.
    pub fn connect(config: GatewayConfig) -> anyhow::Result<Self> {
        let credentials = config.username.clone().zip(config.password.clone());
        let gateway = Self::new(config)?;
        if let Some((username, password)) = credentials {
            gateway
                .login(&username, &password)
                .with_context(|| format!("failed to log in as {username}"))?;
            info!("logged in as {username}");
        }
        Ok(gateway)
    }

    pub fn login(&self, username: &str, password: &str) -> GatewayResult<()> {
        let token_response: TokenQueryResponse = self.get(&[
            ("action", "query".to_string()),
            ("meta", "tokens".to_string()),
            ("type", "login".to_string()),
        ])?;
        let login_token = token_response
            .query
            .tokens
            .and_then(|tokens| tokens.logintoken)
            .ok_or_else(|| GatewayError::MalformedResponse("missing login token".to_string()))?;

        let login: LoginResponse = self.post(
            &[
                ("action", "login".to_string()),
                ("lgname", username.to_string()),
                ("lgpassword", password.to_string()),
                ("lgtoken", login_token),
            ],
            true,
        )?;
        match login.login.result.as_deref() {
            Some("Success") => {
                self.store_csrf_token(None);
                Ok(())
            }
            other => Err(GatewayError::Authentication(
                login
                    .login
                    .reason
                    .or_else(|| other.map(ToString::to_string))
                    .unwrap_or_else(|| "unknown error".to_string()),
            )),
        }
    }

    fn get<T: DeserializeOwned>(&self, params: &[(&str, String)]) -> GatewayResult<T> {
        let payload = self.request_json(params, false, false)?;
        decode(payload)
    }

    fn post<T: DeserializeOwned>(&self, params: &[(&str, String)], is_write: bool) -> GatewayResult<T> {
        let payload = self.request_json(params, true, is_write)?;
        decode(payload)
    }

    fn request_json(
        &self,
        params: &[(&str, String)],
        use_post: bool,
        is_write: bool,
    ) -> GatewayResult<Value> {
        let max_retries = if is_write {
            self.config.max_write_retries
        } else {
            self.config.max_retries
        };
        let mut pairs = Vec::with_capacity(params.len() + 2);
        pairs.push(("format".to_string(), "json".to_string()));
        pairs.push(("formatversion".to_string(), "2".to_string()));
        for (key, value) in params {
            if !value.is_empty() {
                pairs.push(((*key).to_string(), value.clone()));
            }
        }

        let mut last_error = GatewayError::Network("no request attempted".to_string());
        for attempt in 0..=max_retries {
            self.apply_rate_limit(is_write);
            let request = if use_post {
                self.client.post(self.api_url.clone()).form(&pairs)
            } else {
                self.client.get(self.api_url.clone()).query(&pairs)
            };
            let response = request
                .header("User-Agent", self.config.user_agent.clone())
                .send();

            let error = match response {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        let payload: Value = response.json().map_err(|error| {
                            GatewayError::MalformedResponse(format!(
                                "failed to decode MediaWiki API JSON response: {error}"
                            ))
                        })?;
                        match api_error(&payload) {
                            None => return Ok(payload),
                            Some(error) => error,
                        }
                    } else if status == StatusCode::TOO_MANY_REQUESTS {
                        GatewayError::RateLimited
                    } else if is_retryable_status(status) {
                        GatewayError::Network(format!("HTTP {status}"))
                    } else {
                        return Err(GatewayError::Http(status.as_u16()));
                    }
                }
                Err(error) if is_retryable_error(&error) => GatewayError::Network(error.to_string()),
                Err(error) => return Err(GatewayError::Network(error.to_string())),
            };

            if !error.is_retryable() {
                return Err(error);
            }
            if attempt < max_retries {
                debug!("retrying MediaWiki request after: {error}");
                self.wait_before_retry(attempt, is_write);
            }
            last_error = error;
        }

        Err(last_error)
    }

    fn apply_rate_limit(&self, is_write: bool) {
        let delay = if is_write {
            Duration::from_millis(self.config.rate_limit_write_ms)
        } else {
            Duration::from_millis(self.config.rate_limit_read_ms)
        };
        let start_at = {
            let mut pacing = self
                .pacing
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            let now = Instant::now();
            let slot = if is_write {
                &mut pacing.next_write_at
            } else {
                &mut pacing.next_read_at
            };
            let start_at = slot.map_or(now, |next| next.max(now));
            *slot = Some(start_at + delay);
            start_at
        };
        let now = Instant::now();
        if start_at > now {
            sleep(start_at - now);
        }
        self.request_count.fetch_add(1, Ordering::Relaxed);
    }

    fn wait_before_retry(&self, attempt: usize, is_write: bool) {
        let exponent = u32::try_from(attempt).unwrap_or(16);
        let base = self
            .config
            .retry_delay_ms
            .saturating_mul(2u64.saturating_pow(exponent));
        let jitter = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|duration| u64::from(duration.subsec_millis() % 100))
            .unwrap_or(0);
        let multiplier = if is_write { 2u64 } else { 1u64 };
        sleep(Duration::from_millis(
            base.saturating_mul(multiplier).saturating_add(jitter),
        ));
    }

    fn store_csrf_token(&self, token: Option<String>) {
        let mut guard = self
            .csrf_token
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = token;
    }

    fn ensure_csrf_token(&self) -> GatewayResult<String> {
        {
            let guard = self
                .csrf_token
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if let Some(token) = guard.as_ref() {
                return Ok(token.clone());
            }
        }
        let response: TokenQueryResponse = self.get(&[
            ("action", "query".to_string()),
            ("meta", "tokens".to_string()),
        ])?;
        let token = response
            .query
            .tokens
            .and_then(|tokens| tokens.csrftoken)
            .ok_or_else(|| GatewayError::MalformedResponse("missing csrf token".to_string()))?;
        self.store_csrf_token(Some(token.clone()));
        Ok(token)
    }

    /// Run a query and follow `continue` until the wiki signals completion.
    fn query_all(
        &self,
        params: Vec<(&str, String)>,
        mut on_page: impl FnMut(QueryPayload),
    ) -> GatewayResult<()> {
        let mut continuation: BTreeMap<String, Value> = BTreeMap::new();
        loop {
            let mut owned: Vec<(String, String)> = params
                .iter()
                .map(|(key, value)| ((*key).to_string(), value.clone()))
                .collect();
            for (key, value) in &continuation {
                let value = match value {
                    Value::String(text) => text.clone(),
                    other => other.to_string(),
                };
                owned.push((key.clone(), value));
            }
            let borrowed: Vec<(&str, String)> = owned
                .iter()
                .map(|(key, value)| (key.as_str(), value.clone()))
                .collect();

            let response: QueryResponse = self.get(&borrowed)?;
            on_page(response.query);
            match response.continuation {
                Some(next) if !next.is_empty() => continuation = next,
                _ => break,
            }
        }
        Ok(())
    }
}

impl Gateway for MediaWikiGateway {
    fn max_pages_per_query(&self) -> usize {
        self.config.max_pages_per_query
    }

    fn fetch_content(&self, title: &str) -> GatewayResult<Option<PageContent>> {
        let response: QueryResponse = self.get(&[
            ("action", "query".to_string()),
            ("titles", title.to_string()),
            ("prop", "revisions".to_string()),
            ("rvprop", "content|timestamp|ids".to_string()),
            ("rvslots", "main".to_string()),
        ])?;

        let Some(page) = response.query.pages.into_iter().next() else {
            return Ok(None);
        };
        if page.missing || page.invalid {
            return Ok(None);
        }
        let Some(revision) = page.revisions.into_iter().next() else {
            return Ok(None);
        };
        let text = revision
            .slots
            .and_then(|slots| slots.main)
            .map(|slot| slot.content)
            .ok_or_else(|| {
                GatewayError::MalformedResponse(format!("no main slot content for {title}"))
            })?;
        Ok(Some(PageContent {
            title: page.title,
            namespace: page.ns,
            revision_id: revision.revid,
            timestamp: revision.timestamp,
            text,
        }))
    }

    fn fetch_links(&self, title: &str, namespace: Option<i32>) -> GatewayResult<Vec<LinkedPage>> {
        let mut pages: Vec<PageQueryItem> = Vec::new();
        let mut redirects: BTreeMap<String, String> = BTreeMap::new();
        let mut params = vec![
            ("action", "query".to_string()),
            ("titles", title.to_string()),
            ("generator", "links".to_string()),
            ("gpllimit", "max".to_string()),
            ("prop", "info".to_string()),
            ("redirects", "1".to_string()),
        ];
        if let Some(namespace) = namespace {
            params.push(("gplnamespace", namespace.to_string()));
        }
        self.query_all(params, |query| {
            pages.extend(query.pages);
            redirects.extend(query.redirects.into_iter().map(|item| (item.from, item.to)));
        })?;

        let namespaces: BTreeMap<&str, i32> = pages
            .iter()
            .map(|page| (page.title.as_str(), page.ns))
            .collect();
        let resolution = DisambiguationReport {
            statuses: BTreeMap::new(),
            redirects: redirects.clone(),
        };

        let mut out: Vec<LinkedPage> = Vec::new();
        for from in redirects.keys() {
            let chain = resolution.redirect_chain(from);
            let namespace = chain
                .last()
                .and_then(|target| namespaces.get(target.as_str()).copied())
                .unwrap_or_default();
            let mut linked = LinkedPage::new(from.clone(), namespace).redirecting_to(chain);
            linked.exists = Some(true);
            out.push(linked);
        }
        // Targets reached only through a redirect are not links of the page.
        let reached_through_redirect: BTreeSet<&String> = redirects.values().collect();
        for page in &pages {
            if reached_through_redirect.contains(&page.title) {
                continue;
            }
            let mut linked = LinkedPage::new(page.title.clone(), page.ns);
            linked.exists = Some(!page.missing);
            out.push(linked);
        }
        Ok(out)
    }

    fn fetch_backlinks(
        &self,
        title: &str,
        include_redirects: bool,
    ) -> GatewayResult<Vec<LinkedPage>> {
        let mut out = Vec::new();
        let mut params = vec![
            ("action", "query".to_string()),
            ("list", "backlinks".to_string()),
            ("bltitle", title.to_string()),
            ("bllimit", "max".to_string()),
        ];
        if !include_redirects {
            params.push(("blfilterredir", "nonredirects".to_string()));
        }
        self.query_all(params, |query| {
            for item in query.backlinks {
                let mut linked = LinkedPage::new(item.title, item.ns);
                linked.exists = Some(true);
                if item.redirect {
                    linked.redirect_targets = vec![title.to_string()];
                }
                out.push(linked);
            }
        })?;
        Ok(out)
    }

    fn fetch_templates(&self, title: &str) -> GatewayResult<Vec<String>> {
        let mut out = Vec::new();
        let params = vec![
            ("action", "query".to_string()),
            ("titles", title.to_string()),
            ("prop", "templates".to_string()),
            ("tllimit", "max".to_string()),
        ];
        self.query_all(params, |query| {
            for page in query.pages {
                out.extend(page.templates.into_iter().map(|item| item.title));
            }
        })?;
        Ok(out)
    }

    fn fetch_embedded_in(&self, title: &str, namespaces: &[i32]) -> GatewayResult<Vec<String>> {
        let mut out = Vec::new();
        let namespace_filter = namespaces
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("|");
        let params = vec![
            ("action", "query".to_string()),
            ("list", "embeddedin".to_string()),
            ("eititle", title.to_string()),
            ("einamespace", namespace_filter),
            ("eilimit", "max".to_string()),
        ];
        self.query_all(params, |query| {
            out.extend(query.embeddedin.into_iter().map(|item| item.title));
        })?;
        Ok(out)
    }

    fn fetch_disambiguation_status(
        &self,
        titles: &[String],
    ) -> GatewayResult<DisambiguationReport> {
        let mut report = DisambiguationReport::default();
        for batch in titles.chunks(self.config.max_pages_per_query.max(1)) {
            let params = vec![
                ("action", "query".to_string()),
                ("titles", batch.join("|")),
                ("prop", "pageprops".to_string()),
                ("ppprop", "disambiguation".to_string()),
                ("redirects", "1".to_string()),
            ];
            self.query_all(params, |query| {
                for item in query.redirects {
                    report.redirects.insert(item.from, item.to);
                }
                for page in query.pages {
                    let disambiguation = page
                        .pageprops
                        .as_ref()
                        .is_some_and(|props| props.get("disambiguation").is_some());
                    report.statuses.insert(page.title, disambiguation);
                }
            })?;
        }
        Ok(report)
    }

    fn write_page(
        &self,
        title: &str,
        text: &str,
        comment: &str,
        watch: bool,
    ) -> GatewayResult<WriteResult> {
        let token = self.ensure_csrf_token()?;
        let watchlist = if watch { "watch" } else { "nochange" };
        let result: GatewayResult<EditResponse> = self.post(
            &[
                ("action", "edit".to_string()),
                ("title", title.to_string()),
                ("text", text.to_string()),
                ("summary", comment.to_string()),
                ("watchlist", watchlist.to_string()),
                ("bot", "1".to_string()),
                ("token", token),
            ],
            true,
        );
        let response = match result {
            Err(GatewayError::Authentication(message)) if message.contains("badtoken") => {
                // Stale token: drop it so the next write fetches a new one.
                self.store_csrf_token(None);
                return Err(GatewayError::Authentication(message));
            }
            other => other?,
        };
        let edit = response.edit.ok_or_else(|| {
            GatewayError::MalformedResponse("missing edit payload in API response".to_string())
        })?;
        if edit.result.as_deref() != Some("Success") {
            return Err(GatewayError::Api {
                code: "editfailed".to_string(),
                info: format!(
                    "edit of {title} returned {}",
                    edit.result.unwrap_or_else(|| "unknown".to_string())
                ),
            });
        }
        Ok(WriteResult {
            title: edit.title.unwrap_or_else(|| title.to_string()),
            new_revision_id: edit.newrevid,
            changed: !edit.nochange,
        })
    }

    fn expand_templates(&self, title: &str, text: &str) -> GatewayResult<String> {
        let response: ExpandTemplatesResponse = self.post(
            &[
                ("action", "expandtemplates".to_string()),
                ("title", title.to_string()),
                ("text", text.to_string()),
                ("prop", "wikitext".to_string()),
            ],
            false,
        )?;
        Ok(response.expandtemplates.wikitext)
    }

    fn parse_to_html(&self, title: &str, text: &str) -> GatewayResult<String> {
        let response: ParseResponse = self.post(
            &[
                ("action", "parse".to_string()),
                ("title", title.to_string()),
                ("text", text.to_string()),
                ("prop", "text".to_string()),
                ("contentmodel", "wikitext".to_string()),
                ("disablelimitreport", "1".to_string()),
            ],
            false,
        )?;
        Ok(response.parse.text)
    }

    fn request_count(&self) -> usize {
        self.request_count.load(Ordering::Relaxed)
    }
}

fn decode<T: DeserializeOwned>(payload: Value) -> GatewayResult<T> {
    serde_json::from_value(payload)
        .map_err(|error| GatewayError::MalformedResponse(error.to_string()))
}

fn api_error(payload: &Value) -> Option<GatewayError> {
    let error = payload.get("error")?;
    let code = error
        .get("code")
        .and_then(Value::as_str)
        .unwrap_or("unknown_error");
    let info = error
        .get("info")
        .and_then(Value::as_str)
        .unwrap_or("unknown info");
    Some(GatewayError::from_api_code(code, info))
}

fn is_retryable_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::REQUEST_TIMEOUT
            | StatusCode::TOO_MANY_REQUESTS
            | StatusCode::INTERNAL_SERVER_ERROR
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    )
}

fn is_retryable_error(error: &reqwest::Error) -> bool {
    error.is_timeout() || error.is_connect() || error.is_request()
}

#[derive(Debug, Deserialize, Default)]
struct QueryResponse {
    #[serde(default)]
    query: QueryPayload,
    #[serde(default, rename = "continue")]
    continuation: Option<BTreeMap<String, Value>>,
}

#[derive(Debug, Deserialize, Default)]
struct QueryPayload {
    #[serde(default)]
    pages: Vec<PageQueryItem>,
    #[serde(default)]
    redirects: Vec<RedirectItem>,
    #[serde(default)]
    backlinks: Vec<BacklinkItem>,
    #[serde(default)]
    embeddedin: Vec<TitleQueryItem>,
}

#[derive(Debug, Deserialize)]
struct TitleQueryItem {
    title: String,
}

#[derive(Debug, Deserialize)]
struct RedirectItem {
    from: String,
    to: String,
}

#[derive(Debug, Deserialize)]
struct BacklinkItem {
    ns: i32,
    title: String,
    #[serde(default)]
    redirect: bool,
}

#[derive(Debug, Deserialize)]
struct PageQueryItem {
    #[serde(default)]
    ns: i32,
    title: String,
    #[serde(default)]
    missing: bool,
    #[serde(default)]
    invalid: bool,
    #[serde(default)]
    revisions: Vec<RevisionQueryItem>,
    #[serde(default)]
    templates: Vec<TitleQueryItem>,
    pageprops: Option<BTreeMap<String, Value>>,
}

#[derive(Debug, Deserialize)]
struct RevisionQueryItem {
    revid: Option<u64>,
    timestamp: Option<String>,
    slots: Option<RevisionSlotContainer>,
}

#[derive(Debug, Deserialize)]
struct RevisionSlotContainer {
    main: Option<RevisionMainSlot>,
}

#[derive(Debug, Deserialize)]
struct RevisionMainSlot {
    content: String,
}

#[derive(Debug, Deserialize, Default)]
struct TokenQueryResponse {
    #[serde(default)]
    query: TokenQueryPayload,
}

#[derive(Debug, Deserialize, Default)]
struct TokenQueryPayload {
    tokens: Option<TokenPayload>,
}

#[derive(Debug, Deserialize, Default)]
struct TokenPayload {
    logintoken: Option<String>,
    csrftoken: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct LoginResponse {
    #[serde(default)]
    login: LoginPayload,
}

#[derive(Debug, Deserialize, Default)]
struct LoginPayload {
    result: Option<String>,
    reason: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct EditResponse {
    edit: Option<EditPayload>,
}

#[derive(Debug, Deserialize, Default)]
struct EditPayload {
    result: Option<String>,
    title: Option<String>,
    newrevid: Option<u64>,
    #[serde(default)]
    nochange: bool,
}

#[derive(Debug, Deserialize)]
struct ExpandTemplatesResponse {
    expandtemplates: ExpandTemplatesPayload,
}

#[derive(Debug, Deserialize)]
struct ExpandTemplatesPayload {
    wikitext: String,
}

#[derive(Debug, Deserialize)]
struct ParseResponse {
    parse: ParsePayload,
}

#[derive(Debug, Deserialize)]
struct ParsePayload {
    text: String,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{
        EditResponse, GatewayConfig, MediaWikiGateway, QueryResponse, api_error, decode,
    };
    use crate::error::GatewayError;

    fn config(api_url: &str) -> GatewayConfig {
        GatewayConfig {
            api_url: api_url.to_string(),
            user_agent: "test".to_string(),
            timeout_ms: 1_000,
            rate_limit_read_ms: 0,
            rate_limit_write_ms: 0,
            max_retries: 0,
            max_write_retries: 0,
            retry_delay_ms: 0,
            max_pages_per_query: 50,
            username: None,
            password: None,
        }
    }

    #[test]
    fn rejects_invalid_api_url() {
        assert!(MediaWikiGateway::new(config("not a url")).is_err());
        assert!(MediaWikiGateway::new(config("https://example.org/w/api.php")).is_ok());
    }

    #[test]
    fn api_errors_are_categorized() {
        let payload = json!({"error": {"code": "ratelimited", "info": "slow down"}});
        assert_eq!(api_error(&payload), Some(GatewayError::RateLimited));
        assert_eq!(api_error(&json!({"query": {}})), None);
    }

    #[test]
    fn decodes_query_with_continuation() {
        let payload = json!({
            "continue": {"blcontinue": "0|123", "continue": "-||"},
            "query": {
                "backlinks": [
                    {"pageid": 1, "ns": 0, "title": "A"},
                    {"pageid": 2, "ns": 0, "title": "B", "redirect": true}
                ]
            }
        });
        let response: QueryResponse = decode(payload).expect("decode");
        assert_eq!(response.query.backlinks.len(), 2);
        assert!(response.query.backlinks[1].redirect);
        let continuation = response.continuation.expect("continuation");
        assert_eq!(continuation.len(), 2);
    }

    #[test]
    fn decodes_disambiguation_pageprops() {
        let payload = json!({
            "query": {
                "redirects": [{"from": "Mercury (disambiguation)", "to": "Mercury"}],
                "pages": [
                    {"ns": 0, "title": "Mercury", "pageprops": {"disambiguation": ""}},
                    {"ns": 0, "title": "Venus"},
                    {"ns": 0, "title": "Nowhere", "missing": true}
                ]
            }
        });
        let response: QueryResponse = decode(payload).expect("decode");
        assert_eq!(response.query.redirects[0].to, "Mercury");
        assert!(response.query.pages[0].pageprops.is_some());
        assert!(response.query.pages[2].missing);
    }

    #[test]
    fn decodes_noop_edit() {
        let payload = json!({"edit": {"result": "Success", "title": "A", "nochange": true}});
        let response: EditResponse = decode(payload).expect("decode");
        let edit = response.edit.expect("edit");
        assert!(edit.nochange);
        assert_eq!(edit.newrevid, None);
    }
}
