use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{Json, Response},
    routing::post,
    Router,
};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::platform::PullRequestLocator;
use crate::review_status::{ReviewEvent, ReviewVerdict};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct WebhookPayload {
    pub action: Option<String>,
    pub pull_request: Option<PullRequestPayload>,
    pub review: Option<ReviewPayload>,
    pub check_suite: Option<CheckSuitePayload>,
    pub requested_reviewer: Option<UserPayload>,
    pub repository: Option<RepositoryPayload>,
    pub sender: Option<UserPayload>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PullRequestPayload {
    pub number: u64,
    pub head: Option<PullRequestRefPayload>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PullRequestRefPayload {
    pub sha: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReviewPayload {
    pub user: UserPayload,
    pub state: ReviewVerdict,
    pub submitted_at: Option<chrono::DateTime<chrono::Utc>>,
    pub commit_id: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CheckSuitePayload {
    pub head_sha: String,
    #[serde(default)]
    pub pull_requests: Vec<PullRequestPayload>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RepositoryPayload {
    pub name: String,
    pub owner: UserPayload,
}

#[derive(Debug, Deserialize, Clone)]
pub struct UserPayload {
    pub login: String,
}

#[derive(Serialize)]
pub struct WebhookResponse {
    pub message: String,
}

type HmacSha256 = Hmac<Sha256>;

fn verify_github_signature(secret: &str, payload: &[u8], signature: &str) -> bool {
    let Some(signature_hex) = signature.strip_prefix("sha256=") else {
        return false;
    };

    let signature_bytes = match hex::decode(signature_hex) {
        Ok(bytes) => bytes,
        Err(_) => return false,
    };

    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return false,
    };

    mac.update(payload);

    // Constant-time verification
    mac.verify_slice(&signature_bytes).is_ok()
}

async fn verify_webhook_signature(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let (parts, body) = request.into_parts();
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .map_err(|_| StatusCode::BAD_REQUEST)?;

    let signature = parts
        .headers
        .get("x-hub-signature-256")
        .and_then(|h| h.to_str().ok())
        .ok_or(StatusCode::UNAUTHORIZED)?;

    if !verify_github_signature(&state.webhook_secret, &bytes, signature) {
        error!("Invalid webhook signature");
        return Err(StatusCode::UNAUTHORIZED);
    }

    let request = Request::from_parts(parts, axum::body::Body::from(bytes));
    Ok(next.run(request).await)
}

pub async fn github_webhook_handler(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Json<WebhookResponse>, StatusCode> {
    let event = request
        .headers()
        .get("x-github-event")
        .and_then(|h| h.to_str().ok())
        .unwrap_or("unknown")
        .to_string();

    let bytes = axum::body::to_bytes(request.into_body(), usize::MAX)
        .await
        .map_err(|_| StatusCode::BAD_REQUEST)?;
    let payload: WebhookPayload =
        serde_json::from_slice(&bytes).map_err(|_| StatusCode::BAD_REQUEST)?;

    info!(
        "Received {} event (action: {:?})",
        event,
        payload.action.as_deref()
    );

    match (event.as_str(), payload.action.as_deref().unwrap_or("")) {
        ("pull_request", "opened" | "reopened" | "edited") => {
            let Some(pr) = pull_request_locator(&payload) else {
                warn!("Pull request event missing repository or PR information");
                return Ok(ack());
            };
            tokio::spawn(async move {
                if let Err(e) = state.processor.on_pull_request_changed(&pr).await {
                    error!("Failed to process PR #{} change: {:#}", pr.number, e);
                }
            });
        }
        ("pull_request", "review_requested") => {
            let (Some(repo), Some(head), Some(reviewer), Some(sender)) = (
                payload.repository.as_ref(),
                payload
                    .pull_request
                    .as_ref()
                    .and_then(|pr| pr.head.as_ref()),
                reviewer_login(&payload),
                payload.sender.as_ref(),
            ) else {
                warn!("review_requested event missing required fields");
                return Ok(ack());
            };
            let key = crate::checks::RevisionKey {
                repo_owner: repo.owner.login.clone(),
                repo_name: repo.name.clone(),
                head_sha: head.sha.clone(),
            };
            let sender = sender.login.clone();
            tokio::spawn(async move {
                if let Err(e) = state
                    .processor
                    .on_review_requested(&key, &reviewer, &sender)
                    .await
                {
                    error!("Failed to process review request for {}: {:#}", reviewer, e);
                }
            });
        }
        ("pull_request_review", "submitted" | "dismissed") => {
            let (Some(repo), Some(review)) =
                (payload.repository.as_ref(), payload.review.as_ref())
            else {
                warn!("Review event missing repository or review information");
                return Ok(ack());
            };
            let repo_owner = repo.owner.login.clone();
            let repo_name = repo.name.clone();
            let review_event = ReviewEvent {
                reviewer: review.user.login.clone(),
                state: review.state,
                submitted_at: review.submitted_at,
                commit_id: review.commit_id.clone(),
            };
            tokio::spawn(async move {
                if let Err(e) = state
                    .processor
                    .on_review(&repo_owner, &repo_name, &review_event)
                    .await
                {
                    error!(
                        "Failed to record review from {}: {:#}",
                        review_event.reviewer, e
                    );
                }
            });
        }
        ("check_suite", "requested" | "rerequested") => {
            let (Some(repo), Some(suite)) =
                (payload.repository.as_ref(), payload.check_suite.as_ref())
            else {
                warn!("check_suite event missing repository or suite information");
                return Ok(ack());
            };
            let key = crate::checks::RevisionKey {
                repo_owner: repo.owner.login.clone(),
                repo_name: repo.name.clone(),
                head_sha: suite.head_sha.clone(),
            };
            let affected: Vec<PullRequestLocator> = suite
                .pull_requests
                .iter()
                .map(|pr| PullRequestLocator {
                    repo_owner: repo.owner.login.clone(),
                    repo_name: repo.name.clone(),
                    number: pr.number,
                })
                .collect();
            tokio::spawn(async move {
                if let Err(e) = state
                    .processor
                    .on_check_suite_requested(&key, &affected)
                    .await
                {
                    error!("Failed to process check suite request: {:#}", e);
                }
            });
        }
        _ => {
            info!("Ignoring {} event", event);
        }
    }

    Ok(ack())
}

fn ack() -> Json<WebhookResponse> {
    Json(WebhookResponse {
        message: "Webhook received".to_string(),
    })
}

fn pull_request_locator(payload: &WebhookPayload) -> Option<PullRequestLocator> {
    let repo = payload.repository.as_ref()?;
    let pr = payload.pull_request.as_ref()?;
    Some(PullRequestLocator {
        repo_owner: repo.owner.login.clone(),
        repo_name: repo.name.clone(),
        number: pr.number,
    })
}

fn reviewer_login(payload: &WebhookPayload) -> Option<String> {
    payload
        .requested_reviewer
        .as_ref()
        .map(|user| user.login.clone())
}

pub fn webhook_router(middleware_state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/webhook", post(github_webhook_handler))
        .route_layer(middleware::from_fn_with_state(
            middleware_state,
            verify_webhook_signature,
        ))
}
