use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, LINK};
use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::api_types::{
  ApiComment, ApiErrorBody, ApiIssue, IssueState, IssueStatePatch, NewComment, NewIssue,
  NewReaction,
};
use super::transport::{IssueQuery, IssueTransport, Page, PageRequest};
use crate::config::GithubConfig;
use crate::error::{Result, StoreError};

const USER_AGENT: &str = concat!("gh-store/", env!("CARGO_PKG_VERSION"));

/// GitHub REST client scoped to one repository.
#[derive(Clone)]
pub struct GithubClient {
  http: reqwest::Client,
  api_url: Url,
  owner: String,
  repo: String,
  token: Option<String>,
}

impl GithubClient {
  pub fn new(config: &GithubConfig, token: Option<String>) -> Result<Self> {
    let (owner, repo) = config
      .repo
      .split_once('/')
      .filter(|(o, r)| !o.is_empty() && !r.is_empty() && !r.contains('/'))
      .ok_or_else(|| {
        StoreError::InvalidConfig(format!(
          "repository must be in owner/name form, got '{}'",
          config.repo
        ))
      })?;

    let api_url = Url::parse(&config.api_url)
      .map_err(|e| StoreError::InvalidConfig(format!("invalid api_url '{}': {}", config.api_url, e)))?;
    if api_url.cannot_be_a_base() {
      return Err(StoreError::InvalidConfig(format!(
        "api_url '{}' cannot be used as a base URL",
        config.api_url
      )));
    }

    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
    headers.insert("x-github-api-version", HeaderValue::from_static("2022-11-28"));

    let http = reqwest::Client::builder()
      .user_agent(USER_AGENT)
      .default_headers(headers)
      .timeout(Duration::from_secs(config.timeout_secs))
      .build()?;

    Ok(Self {
      http,
      api_url,
      owner: owner.to_string(),
      repo: repo.to_string(),
      token,
    })
  }

  /// `{api_url}/repos/{owner}/{repo}/{segments...}`
  fn endpoint(&self, segments: &[&str]) -> Url {
    let mut url = self.api_url.clone();
    if let Ok(mut path) = url.path_segments_mut() {
      path
        .pop_if_empty()
        .extend(["repos", self.owner.as_str(), self.repo.as_str()])
        .extend(segments);
    }
    url
  }

  fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
    match &self.token {
      Some(token) => request.bearer_auth(token),
      None => request,
    }
  }

  async fn send(&self, request: RequestBuilder) -> Result<Response> {
    let response = self.authorize(request).send().await?;
    let status = response.status();
    debug!(status = status.as_u16(), url = %response.url(), "github response");

    if status.is_success() {
      return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ApiErrorBody>(&text)
      .map(|body| body.message)
      .unwrap_or(text);
    Err(StoreError::Transport {
      status: status.as_u16(),
      message,
    })
  }

  async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
    let response = self.send(request).await?;
    Ok(response.json().await?)
  }

  async fn send_page<T: DeserializeOwned>(
    &self,
    request: RequestBuilder,
    page: PageRequest,
  ) -> Result<Page<T>> {
    let request = request.query(&[
      ("per_page", page.per_page.to_string()),
      ("page", page.page.to_string()),
    ]);
    let response = self.send(request).await?;
    let has_next = response
      .headers()
      .get(LINK)
      .and_then(|v| v.to_str().ok())
      .is_some_and(has_next_link);
    let items = response.json().await?;

    Ok(Page {
      items,
      request: page,
      next: has_next.then(|| page.next()),
    })
  }
}

/// Whether a `Link` header advertises a `rel="next"` page.
fn has_next_link(link: &str) -> bool {
  link
    .split(',')
    .any(|part| part.split(';').skip(1).any(|p| p.trim() == r#"rel="next""#))
}

#[async_trait]
impl IssueTransport for GithubClient {
  fn is_authenticated(&self) -> bool {
    self.token.is_some()
  }

  async fn create_issue(&self, issue: &NewIssue) -> Result<ApiIssue> {
    let url = self.endpoint(&["issues"]);
    self.send_json(self.http.post(url).json(issue)).await
  }

  async fn get_issue(&self, number: u64) -> Result<ApiIssue> {
    let url = self.endpoint(&["issues", &number.to_string()]);
    self.send_json(self.http.get(url)).await
  }

  async fn list_issues(&self, query: &IssueQuery, page: PageRequest) -> Result<Page<ApiIssue>> {
    let url = self.endpoint(&["issues"]);
    let mut params = vec![
      ("labels", query.labels.join(",")),
      ("state", query.state.as_str().to_string()),
    ];
    if let Some(since) = query.since {
      params.push(("since", since.to_rfc3339()));
    }
    self.send_page(self.http.get(url).query(&params), page).await
  }

  async fn set_issue_state(&self, number: u64, state: IssueState) -> Result<ApiIssue> {
    let url = self.endpoint(&["issues", &number.to_string()]);
    let patch = IssueStatePatch { state };
    self.send_json(self.http.patch(url).json(&patch)).await
  }

  async fn create_comment(&self, number: u64, body: &str) -> Result<ApiComment> {
    let url = self.endpoint(&["issues", &number.to_string(), "comments"]);
    self
      .send_json(self.http.post(url).json(&NewComment { body }))
      .await
  }

  async fn list_comments(&self, number: u64, page: PageRequest) -> Result<Page<ApiComment>> {
    let url = self.endpoint(&["issues", &number.to_string(), "comments"]);
    self.send_page(self.http.get(url), page).await
  }

  async fn create_reaction(&self, comment_id: u64, content: &str) -> Result<()> {
    let url = self.endpoint(&["issues", "comments", &comment_id.to_string(), "reactions"]);
    self
      .send(self.http.post(url).json(&NewReaction { content }))
      .await?;
    Ok(())
  }
}
