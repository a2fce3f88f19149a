//! Live GitHub REST client.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use labels::{
    ClientError, Issue, IssueNumber, IssueSearch, LabelClient, LabelState, OrgName, Repo, RepoName,
};
use reqwest::header::{self, HeaderMap};
use reqwest::{Client as HttpClient, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};

use crate::throttle::{RetryPolicy, Throttle, DEFAULT_TOKENS_PER_HOUR, DEFAULT_TOKEN_BURST};
use crate::wire::{
    AddLabels, CreateLabel, GitHubError, SearchPage, UpdateLabel, WireIssue, WireLabel, WireRepo,
};

/// Public GitHub API root.
pub const DEFAULT_ENDPOINT: &str = "https://api.github.com";

const PER_PAGE: &str = "100";
const ACCEPT: &str = "application/vnd.github+json";
const USER_AGENT: &str = concat!("label_sync/", env!("CARGO_PKG_VERSION"));
const TIMEOUT: Duration = Duration::from_secs(30);

/// GitHub REST client authenticated with an OAuth or app token.
///
/// Every request first takes a token from a shared [`Throttle`]. A response
/// reporting an exhausted rate limit is retried after the reset delay,
/// within the bounds of the client's [`RetryPolicy`].
#[derive(Clone)]
pub struct GitHubClient {
    http: HttpClient,
    base: Url,
    token: String,
    throttle: Arc<Throttle>,
    retry: RetryPolicy,
}

impl std::fmt::Debug for GitHubClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubClient")
            .field("base", &self.base.as_str())
            .finish_non_exhaustive()
    }
}

impl GitHubClient {
    /// Creates a client for the API rooted at `endpoint`
    /// (e.g. [`DEFAULT_ENDPOINT`] or `https://ghe.example.com/api/v3`).
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Transport`] when the endpoint is not a usable
    /// base URL or the HTTP client cannot be built.
    pub fn new(endpoint: &str, token: impl Into<String>) -> Result<Self, ClientError> {
        let base = Url::parse(endpoint)
            .map_err(|e| ClientError::Transport(format!("invalid endpoint {endpoint}: {e}")))?;
        if base.cannot_be_a_base() {
            return Err(ClientError::Transport(format!(
                "endpoint {endpoint} cannot be used as a base URL"
            )));
        }
        let http = HttpClient::builder()
            .user_agent(USER_AGENT)
            .timeout(TIMEOUT)
            .build()
            .map_err(|e| ClientError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            base,
            token: token.into(),
            throttle: Arc::new(Throttle::new(DEFAULT_TOKENS_PER_HOUR, DEFAULT_TOKEN_BURST)?),
            retry: RetryPolicy::default(),
        })
    }

    /// Replaces the request throttle.
    pub fn with_throttle(mut self, throttle: Throttle) -> Self {
        self.throttle = Arc::new(throttle);
        self
    }

    /// Replaces the rate-limit retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Builds an API URL from raw path segments, percent-encoding each one.
    ///
    /// Label names such as `area/foo` or `needs sig` stay a single segment.
    fn url(&self, segments: &[&str]) -> Result<Url, ClientError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| {
                ClientError::Transport(format!("endpoint {} cannot be a base URL", self.base))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, ClientError> {
        let request = request.bearer_auth(&self.token).header(header::ACCEPT, ACCEPT);
        let mut attempt = 0;
        loop {
            let Some(attempt_request) = request.try_clone() else {
                return Err(ClientError::Transport("request body cannot be replayed".to_string()));
            };
            self.throttle.acquire().await;
            let response = attempt_request
                .send()
                .await
                .map_err(|e| ClientError::Transport(e.to_string()))?;
            match check(response).await {
                Err(ClientError::RateLimited { reset_in }) => {
                    let Some(wait) = self.retry.wait_for(attempt, reset_in) else {
                        return Err(ClientError::RateLimited { reset_in });
                    };
                    attempt += 1;
                    warn!(attempt, wait_secs = wait.as_secs(), "rate limited, waiting to retry");
                    tokio::time::sleep(wait).await;
                }
                result => return result,
            }
        }
    }

    /// Fetches every page starting at `url`, following `Link: rel="next"`.
    async fn get_all<P, T>(
        &self,
        mut url: Url,
        items_of: impl Fn(P) -> Vec<T>,
    ) -> Result<Vec<T>, ClientError>
    where
        P: DeserializeOwned,
    {
        url.query_pairs_mut().append_pair("per_page", PER_PAGE);
        let mut items = Vec::new();
        let mut next = Some(url);
        while let Some(url) = next.take() {
            debug!(url = %url, "fetching page");
            let response = self.send(self.http.get(url)).await?;
            next = next_link(response.headers());
            let page: P = response
                .json()
                .await
                .map_err(|e| ClientError::Decode(e.to_string()))?;
            items.extend(items_of(page));
        }
        Ok(items)
    }
}

/// Turns a non-success response into a [`ClientError`].
async fn check(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if is_rate_limited(status, response.headers()) {
        let reset_in = reset_in(response.headers());
        warn!(status = status.as_u16(), ?reset_in, "rate limit exhausted");
        return Err(ClientError::RateLimited { reset_in });
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<GitHubError>(&body)
        .map(|e| e.message)
        .unwrap_or(body);
    if status == StatusCode::NOT_FOUND {
        Err(ClientError::NotFound(message))
    } else {
        Err(ClientError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

fn is_rate_limited(status: StatusCode, headers: &HeaderMap) -> bool {
    match status {
        StatusCode::TOO_MANY_REQUESTS => true,
        StatusCode::FORBIDDEN => {
            header_str(headers, "x-ratelimit-remaining") == Some("0")
                || headers.contains_key(header::RETRY_AFTER)
        }
        _ => false,
    }
}

/// Time until the limit resets, from `retry-after` or `x-ratelimit-reset`.
fn reset_in(headers: &HeaderMap) -> Option<Duration> {
    if let Some(seconds) = header_str(headers, header::RETRY_AFTER.as_str())
        .and_then(|s| s.parse::<u64>().ok())
    {
        return Some(Duration::from_secs(seconds));
    }
    header_str(headers, "x-ratelimit-reset")
        .and_then(|s| s.parse::<i64>().ok())
        .map(|reset| {
            let now = chrono::Utc::now().timestamp();
            Duration::from_secs(u64::try_from(reset - now).unwrap_or(0))
        })
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|h| h.to_str().ok())
}

/// Extracts the `rel="next"` target of a `Link` header.
fn next_link(headers: &HeaderMap) -> Option<Url> {
    let link = header_str(headers, header::LINK.as_str())?;
    link.split(',').find_map(|entry| {
        let mut parts = entry.split(';');
        let target = parts.next()?.trim();
        let is_next = parts.any(|p| p.trim() == r#"rel="next""#);
        if !is_next {
            return None;
        }
        let target = target.strip_prefix('<')?.strip_suffix('>')?;
        Url::parse(target).ok()
    })
}

fn wire_items<T, U: From<T>>(page: Vec<T>) -> Vec<U> {
    page.into_iter().map(U::from).collect()
}

#[async_trait]
impl LabelClient for GitHubClient {
    #[instrument(skip_all, fields(org = %org, is_user = is_user))]
    async fn get_repos(&self, org: &OrgName, is_user: bool) -> Result<Vec<Repo>, ClientError> {
        let owner_kind = if is_user { "users" } else { "orgs" };
        let url = self.url(&[owner_kind, org.as_str(), "repos"])?;
        let repos: Vec<WireRepo> = self.get_all(url, |page: Vec<WireRepo>| page).await?;
        repos.into_iter().map(Repo::try_from).collect()
    }

    #[instrument(skip_all, fields(org = %org, repo = %repo))]
    async fn get_repo_labels(
        &self,
        org: &OrgName,
        repo: &RepoName,
    ) -> Result<Vec<LabelState>, ClientError> {
        let url = self.url(&["repos", org.as_str(), repo.as_str(), "labels"])?;
        self.get_all(url, wire_items::<WireLabel, LabelState>).await
    }

    #[instrument(skip_all, fields(org = %org, repo = %repo, label = %name))]
    async fn add_repo_label(
        &self,
        org: &OrgName,
        repo: &RepoName,
        name: &str,
        description: &str,
        color: &str,
    ) -> Result<(), ClientError> {
        let url = self.url(&["repos", org.as_str(), repo.as_str(), "labels"])?;
        let body = CreateLabel {
            name,
            color,
            description,
        };
        self.send(self.http.post(url).json(&body)).await?;
        Ok(())
    }

    #[instrument(skip_all, fields(org = %org, repo = %repo, from = %current_name, to = %new_name))]
    async fn update_repo_label(
        &self,
        org: &OrgName,
        repo: &RepoName,
        current_name: &str,
        new_name: &str,
        description: &str,
        color: &str,
    ) -> Result<(), ClientError> {
        let url = self.url(&["repos", org.as_str(), repo.as_str(), "labels", current_name])?;
        let body = UpdateLabel {
            new_name,
            color,
            description,
        };
        self.send(self.http.patch(url).json(&body)).await?;
        Ok(())
    }

    #[instrument(skip_all, fields(org = %org, repo = %repo, label = %name))]
    async fn delete_repo_label(
        &self,
        org: &OrgName,
        repo: &RepoName,
        name: &str,
    ) -> Result<(), ClientError> {
        let url = self.url(&["repos", org.as_str(), repo.as_str(), "labels", name])?;
        self.send(self.http.delete(url)).await?;
        Ok(())
    }

    #[instrument(skip_all, fields(org = %org, repo = %repo, issue = %number, label = %name))]
    async fn add_label(
        &self,
        org: &OrgName,
        repo: &RepoName,
        number: IssueNumber,
        name: &str,
    ) -> Result<(), ClientError> {
        let issue = number.as_u64().to_string();
        let url = self.url(&["repos", org.as_str(), repo.as_str(), "issues", &issue, "labels"])?;
        let body = AddLabels { labels: [name] };
        self.send(self.http.post(url).json(&body)).await?;
        Ok(())
    }

    #[instrument(skip_all, fields(org = %org, repo = %repo, issue = %number, label = %name))]
    async fn remove_label(
        &self,
        org: &OrgName,
        repo: &RepoName,
        number: IssueNumber,
        name: &str,
    ) -> Result<(), ClientError> {
        let issue = number.as_u64().to_string();
        let url = self.url(&[
            "repos",
            org.as_str(),
            repo.as_str(),
            "issues",
            &issue,
            "labels",
            name,
        ])?;
        match self.send(self.http.delete(url)).await {
            Ok(_) => Ok(()),
            Err(ClientError::NotFound(_)) => {
                debug!("label already absent from issue");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    #[instrument(skip_all, fields(query = %query))]
    async fn find_issues(
        &self,
        query: &IssueSearch,
        order: &str,
        ascending: bool,
    ) -> Result<Vec<Issue>, ClientError> {
        let mut url = self.url(&["search", "issues"])?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("q", &query.to_string());
            if !order.is_empty() {
                pairs.append_pair("sort", order);
                if ascending {
                    pairs.append_pair("order", "asc");
                }
            }
        }
        self.get_all(url, |page: SearchPage| wire_items::<WireIssue, Issue>(page.items))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header as header_is, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn org() -> OrgName {
        OrgName::new("kubernetes").unwrap()
    }

    fn repo() -> RepoName {
        RepoName::new("test-infra").unwrap()
    }

    async fn server_and_client() -> (MockServer, GitHubClient) {
        let server = MockServer::start().await;
        let client = GitHubClient::new(&server.uri(), "secret-token").unwrap();
        (server, client)
    }

    fn rate_limited(retry_after: &str) -> ResponseTemplate {
        ResponseTemplate::new(403)
            .insert_header("x-ratelimit-remaining", "0")
            .insert_header("retry-after", retry_after)
            .set_body_json(json!({"message": "API rate limit exceeded"}))
    }

    #[test]
    fn test_label_names_are_single_encoded_segments() {
        let client = GitHubClient::new("https://ghe.example.com/api/v3/", "t").unwrap();
        let url = client
            .url(&["repos", "kubernetes", "test-infra", "labels", "area/foo bar"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://ghe.example.com/api/v3/repos/kubernetes/test-infra/labels/area%2Ffoo%20bar"
        );
    }

    #[test]
    fn test_invalid_endpoint_is_rejected() {
        assert!(matches!(
            GitHubClient::new("not a url", "t"),
            Err(ClientError::Transport(_))
        ));
    }

    #[test]
    fn test_next_link_is_found_among_relations() {
        let mut headers = HeaderMap::new();
        let link = concat!(
            r#"<https://api.github.com/repositories/1/labels?page=3>; rel="last", "#,
            r#"<https://api.github.com/repositories/1/labels?page=2>; rel="next""#,
        );
        headers.insert(header::LINK, link.parse().unwrap());
        assert_eq!(
            next_link(&headers).unwrap().as_str(),
            "https://api.github.com/repositories/1/labels?page=2"
        );

        headers.insert(
            header::LINK,
            r#"<https://api.github.com/repositories/1/labels?page=1>; rel="prev""#
                .parse()
                .unwrap(),
        );
        assert!(next_link(&headers).is_none());
    }

    #[tokio::test]
    async fn test_repo_labels_follow_pagination() {
        let (server, client) = server_and_client().await;
        let next = format!("{}/repositories/42/labels?per_page=100&page=2", server.uri());

        Mock::given(method("GET"))
            .and(path("/repos/kubernetes/test-infra/labels"))
            .and(query_param("per_page", "100"))
            .and(header_is("authorization", "Bearer secret-token"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("link", format!(r#"<{next}>; rel="next""#).as_str())
                    .set_body_json(json!([
                        {"name": "bug", "color": "d73a4a", "description": "Something is broken"}
                    ])),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repositories/42/labels"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"name": "lgtm", "color": "15dd18", "description": null}
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let labels = client.get_repo_labels(&org(), &repo()).await.unwrap();

        assert_eq!(
            labels,
            vec![
                LabelState::new("bug", "d73a4a", "Something is broken"),
                LabelState::new("lgtm", "15dd18", ""),
            ]
        );
    }

    #[tokio::test]
    async fn test_user_repositories_use_the_users_path() {
        let (server, client) = server_and_client().await;
        Mock::given(method("GET"))
            .and(path("/users/octocat/repos"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!([{"name": "hello-world"}])),
            )
            .mount(&server)
            .await;

        let repos = client
            .get_repos(&OrgName::new("octocat").unwrap(), true)
            .await
            .unwrap();

        assert_eq!(
            repos,
            vec![Repo {
                name: RepoName::new("hello-world").unwrap()
            }]
        );
    }

    #[tokio::test]
    async fn test_update_sends_new_name_colour_and_description() {
        let (server, client) = server_and_client().await;
        Mock::given(method("PATCH"))
            .and(path("/repos/kubernetes/test-infra/labels/BUG"))
            .and(body_json(json!({
                "new_name": "bug",
                "color": "d73a4a",
                "description": "Something is broken"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        client
            .update_repo_label(&org(), &repo(), "BUG", "bug", "Something is broken", "d73a4a")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_create_conflict_surfaces_the_api_message() {
        let (server, client) = server_and_client().await;
        Mock::given(method("POST"))
            .and(path("/repos/kubernetes/test-infra/labels"))
            .respond_with(
                ResponseTemplate::new(422).set_body_json(json!({"message": "Validation Failed"})),
            )
            .mount(&server)
            .await;

        let err = client
            .add_repo_label(&org(), &repo(), "bug", "", "d73a4a")
            .await
            .unwrap_err();

        assert_eq!(
            err,
            ClientError::Api {
                status: 422,
                message: "Validation Failed".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_removing_an_absent_issue_label_succeeds() {
        let (server, client) = server_and_client().await;
        Mock::given(method("DELETE"))
            .and(path("/repos/kubernetes/test-infra/issues/7/labels/needs-sig"))
            .respond_with(
                ResponseTemplate::new(404)
                    .set_body_json(json!({"message": "Label does not exist"})),
            )
            .mount(&server)
            .await;

        client
            .remove_label(&org(), &repo(), IssueNumber::new(7), "needs-sig")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_deleting_a_missing_repo_label_is_not_found() {
        let (server, client) = server_and_client().await;
        Mock::given(method("DELETE"))
            .and(path("/repos/kubernetes/test-infra/labels/stale"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({"message": "Not Found"})))
            .mount(&server)
            .await;

        let err = client
            .delete_repo_label(&org(), &repo(), "stale")
            .await
            .unwrap_err();

        assert_eq!(err, ClientError::NotFound("Not Found".to_string()));
    }

    #[tokio::test]
    async fn test_rate_limit_beyond_the_longest_wait_is_reported() {
        let (server, client) = server_and_client().await;
        Mock::given(method("POST"))
            .and(path("/repos/kubernetes/test-infra/issues/7/labels"))
            .and(body_json(json!({"labels": ["lgtm"]})))
            .respond_with(rate_limited("7200"))
            .expect(1)
            .mount(&server)
            .await;

        let err = client
            .add_label(&org(), &repo(), IssueNumber::new(7), "lgtm")
            .await
            .unwrap_err();

        assert_eq!(
            err,
            ClientError::RateLimited {
                reset_in: Some(Duration::from_secs(7200)),
            }
        );
    }

    #[tokio::test]
    async fn test_rate_limited_request_is_retried_after_the_reset() {
        let (server, client) = server_and_client().await;
        Mock::given(method("POST"))
            .and(path("/repos/kubernetes/test-infra/issues/7/labels"))
            .respond_with(rate_limited("0"))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/repos/kubernetes/test-infra/issues/7/labels"))
            .and(body_json(json!({"labels": ["lgtm"]})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(1)
            .mount(&server)
            .await;

        client
            .add_label(&org(), &repo(), IssueNumber::new(7), "lgtm")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_retries_stop_after_the_configured_attempts() {
        let (server, client) = server_and_client().await;
        let client = client.with_retry(RetryPolicy {
            attempts: 2,
            max_wait: Duration::from_secs(1),
            fallback_wait: Duration::ZERO,
        });
        Mock::given(method("DELETE"))
            .and(path("/repos/kubernetes/test-infra/labels/bug"))
            .respond_with(rate_limited("0"))
            .expect(3)
            .mount(&server)
            .await;

        let err = client
            .delete_repo_label(&org(), &repo(), "bug")
            .await
            .unwrap_err();

        assert!(matches!(err, ClientError::RateLimited { .. }));
    }

    #[tokio::test]
    async fn test_requests_beyond_the_burst_are_spaced() {
        let (server, client) = server_and_client().await;
        // 36000 per hour is one token every 100ms.
        let client = client.with_throttle(Throttle::new(36_000, 2).unwrap());
        Mock::given(method("GET"))
            .and(path("/repos/kubernetes/test-infra/labels"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(4)
            .mount(&server)
            .await;

        let start = std::time::Instant::now();
        for _ in 0..4 {
            client.get_repo_labels(&org(), &repo()).await.unwrap();
        }

        assert!(start.elapsed() >= Duration::from_millis(190));
    }

    #[tokio::test]
    async fn test_forbidden_without_rate_headers_is_an_api_error() {
        let (server, client) = server_and_client().await;
        Mock::given(method("DELETE"))
            .and(path("/repos/kubernetes/test-infra/labels/bug"))
            .respond_with(
                ResponseTemplate::new(403)
                    .insert_header("x-ratelimit-remaining", "4999")
                    .set_body_json(json!({"message": "Must have admin rights"})),
            )
            .mount(&server)
            .await;

        let err = client
            .delete_repo_label(&org(), &repo(), "bug")
            .await
            .unwrap_err();

        assert!(matches!(err, ClientError::Api { status: 403, .. }));
    }

    #[tokio::test]
    async fn test_issue_search_sends_the_rendered_query() {
        let (server, client) = server_and_client().await;
        let search = IssueSearch::open_with_without(
            &org(),
            &repo(),
            "needs-sig",
            "triage/needs-information",
        );
        Mock::given(method("GET"))
            .and(path("/search/issues"))
            .and(query_param(
                "q",
                r#"is:open repo:kubernetes/test-infra label:"needs-sig" -label:"triage/needs-information""#,
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "total_count": 2,
                "incomplete_results": false,
                "items": [
                    {"number": 7, "title": "flaky test"},
                    {"number": 9, "title": "docs"}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let issues = client.find_issues(&search, "", false).await.unwrap();

        let numbers: Vec<u64> = issues.iter().map(|i| i.number.as_u64()).collect();
        assert_eq!(numbers, vec![7, 9]);
        assert_eq!(issues[0].title, "flaky test");
    }
}
