pub mod check_index;
pub mod checks;
pub mod config;
pub mod github;
pub mod handlers;
pub mod mentions;
pub mod platform;
pub mod reconcile;
pub mod review_requests;
pub mod review_status;
pub mod webhook;

use github::GitHubClient;
use handlers::EventProcessor;

pub struct AppState {
    pub processor: EventProcessor<GitHubClient>,
    pub webhook_secret: String,
}
