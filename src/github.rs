use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::checks::{CheckRun, CheckRunPatch, NewCheckRun, RevisionKey};
use crate::platform::{ChecksPlatform, PullRequestLocator, PullRequestSnapshot};

/// GitHub REST implementation of [`ChecksPlatform`].
///
/// Authenticates with a pre-issued token; credential handling and rotation
/// live outside this service. The app id scopes check-suite enumeration to
/// suites created by our own GitHub App.
#[derive(Clone)]
pub struct GitHubClient {
    client: Client,
    token: String,
    app_id: u64,
}

#[derive(Debug, Deserialize)]
struct CheckSuitesResponse {
    check_suites: Vec<CheckSuiteResponse>,
}

#[derive(Debug, Deserialize)]
struct CheckSuiteResponse {
    id: u64,
}

#[derive(Debug, Deserialize)]
struct CheckRunsResponse {
    check_runs: Vec<CheckRun>,
}

#[derive(Debug, Serialize)]
struct CreateCheckRunRequest<'a> {
    head_sha: &'a str,
    #[serde(flatten)]
    run: NewCheckRun,
}

#[derive(Debug, Serialize)]
struct ReviewRequestBody {
    reviewers: Vec<String>,
    team_reviewers: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct PullRequestResponse {
    number: u64,
    body: Option<String>,
    user: UserResponse,
    head: PullRequestRefResponse,
    #[serde(default)]
    requested_reviewers: Vec<UserResponse>,
    #[serde(default)]
    requested_teams: Vec<TeamResponse>,
}

#[derive(Debug, Deserialize)]
struct PullRequestRefResponse {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct UserResponse {
    login: String,
}

#[derive(Debug, Deserialize)]
struct TeamResponse {
    slug: String,
}

impl GitHubClient {
    pub fn new(token: String, app_id: u64) -> Self {
        let client = Client::builder()
            .user_agent("reviewbot/0.1.0")
            .build()
            .expect("Failed to create HTTP client");

        GitHubClient {
            client,
            token,
            app_id,
        }
    }

    fn get(&self, url: &str) -> reqwest::RequestBuilder {
        self.client
            .get(url)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Accept", "application/vnd.github.v3+json")
    }

    async fn send_json<B: Serialize>(
        &self,
        builder: reqwest::RequestBuilder,
        body: &B,
        what: &str,
    ) -> Result<Response> {
        let response = builder
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Accept", "application/vnd.github.v3+json")
            .header("Content-Type", "application/json")
            .body(serde_json::to_string(body)?)
            .send()
            .await
            .with_context(|| format!("Failed to send {} request", what))?;
        ensure_success(response, what).await
    }
}

/// Surface a non-2xx response as an error carrying GitHub's message.
async fn ensure_success(response: Response, what: &str) -> Result<Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let error_text = response
        .text()
        .await
        .context("Failed to read error response body")?;
    error!("GitHub API error ({}): {} - {}", what, status, error_text);
    Err(anyhow!(
        "GitHub API error ({}): {} - {}",
        what,
        status,
        error_text
    ))
}

#[async_trait]
impl ChecksPlatform for GitHubClient {
    async fn list_check_suites(&self, key: &RevisionKey) -> Result<Vec<u64>> {
        let mut all_suites = Vec::new();
        let mut page = 1;
        let per_page = 100;

        loop {
            let url = format!(
                "https://api.github.com/repos/{}/{}/commits/{}/check-suites?app_id={}&page={}&per_page={}",
                key.repo_owner, key.repo_name, key.head_sha, self.app_id, page, per_page
            );

            let response = self
                .get(&url)
                .send()
                .await
                .context("Failed to send check suites request")?;
            let response = ensure_success(response, "list check suites").await?;

            let suites: CheckSuitesResponse = response
                .json()
                .await
                .context("Failed to parse check suites response")?;
            let count = suites.check_suites.len();
            all_suites.extend(suites.check_suites.into_iter().map(|suite| suite.id));

            if count < per_page {
                break;
            }
            page += 1;
        }

        Ok(all_suites)
    }

    async fn list_check_runs(&self, key: &RevisionKey, suite_id: u64) -> Result<Vec<CheckRun>> {
        let mut all_runs = Vec::new();
        let mut page = 1;
        let per_page = 100;

        loop {
            let url = format!(
                "https://api.github.com/repos/{}/{}/check-suites/{}/check-runs?page={}&per_page={}",
                key.repo_owner, key.repo_name, suite_id, page, per_page
            );

            let response = self
                .get(&url)
                .send()
                .await
                .context("Failed to send check runs request")?;
            let response = ensure_success(response, "list check runs").await?;

            let runs: CheckRunsResponse = response
                .json()
                .await
                .context("Failed to parse check runs response")?;
            let count = runs.check_runs.len();
            all_runs.extend(runs.check_runs);

            if count < per_page {
                break;
            }
            page += 1;
        }

        Ok(all_runs)
    }

    async fn create_check_run(&self, key: &RevisionKey, new_run: NewCheckRun) -> Result<CheckRun> {
        let url = format!(
            "https://api.github.com/repos/{}/{}/check-runs",
            key.repo_owner, key.repo_name
        );

        info!(
            "Creating check run {} on {} ({:?})",
            new_run.name, key.head_sha, new_run.status
        );

        let body = CreateCheckRunRequest {
            head_sha: &key.head_sha,
            run: new_run,
        };
        let response = self
            .send_json(self.client.post(&url), &body, "create check run")
            .await?;

        response
            .json()
            .await
            .context("Failed to parse created check run response")
    }

    async fn update_check_run(
        &self,
        key: &RevisionKey,
        check_run_id: u64,
        patch: CheckRunPatch,
    ) -> Result<CheckRun> {
        let url = format!(
            "https://api.github.com/repos/{}/{}/check-runs/{}",
            key.repo_owner, key.repo_name, check_run_id
        );

        info!("Updating check run {} on {}", check_run_id, key.head_sha);

        let response = self
            .send_json(self.client.patch(&url), &patch, "update check run")
            .await?;

        response
            .json()
            .await
            .context("Failed to parse updated check run response")
    }

    async fn create_review_request(
        &self,
        pr: &PullRequestLocator,
        reviewers: Vec<String>,
        team_reviewers: Vec<String>,
    ) -> Result<()> {
        let url = format!(
            "https://api.github.com/repos/{}/{}/pulls/{}/requested_reviewers",
            pr.repo_owner, pr.repo_name, pr.number
        );

        info!(
            "Requesting reviews on PR #{} from {:?} and teams {:?}",
            pr.number, reviewers, team_reviewers
        );

        // The API wants bare team slugs, while check runs carry the
        // qualified org/team form.
        let team_reviewers = team_reviewers
            .into_iter()
            .map(|team| match team.split_once('/') {
                Some((_org, slug)) => slug.to_string(),
                None => team,
            })
            .collect();

        let body = ReviewRequestBody {
            reviewers,
            team_reviewers,
        };
        self.send_json(self.client.post(&url), &body, "create review request")
            .await?;
        Ok(())
    }

    async fn get_pull_request(&self, pr: &PullRequestLocator) -> Result<PullRequestSnapshot> {
        let url = format!(
            "https://api.github.com/repos/{}/{}/pulls/{}",
            pr.repo_owner, pr.repo_name, pr.number
        );

        info!(
            "Fetching PR #{} from {}/{}",
            pr.number, pr.repo_owner, pr.repo_name
        );

        let response = self
            .get(&url)
            .send()
            .await
            .context("Failed to send get pull request request")?;
        let response = ensure_success(response, "get pull request").await?;

        let pr_response: PullRequestResponse = response
            .json()
            .await
            .context("Failed to parse pull request response")?;

        Ok(PullRequestSnapshot {
            number: pr_response.number,
            author: pr_response.user.login,
            body: pr_response.body,
            head_sha: pr_response.head.sha,
            requested_reviewers: pr_response
                .requested_reviewers
                .into_iter()
                .map(|user| user.login)
                .collect(),
            requested_teams: pr_response
                .requested_teams
                .into_iter()
                .map(|team| format!("{}/{}", pr.repo_owner, team.slug))
                .collect(),
        })
    }
}
