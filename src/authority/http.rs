use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::Deserialize;
use tracing::debug;

use super::CreditsAuthority;
use crate::config::Config;
use crate::ledger::AuthorityError;
use crate::model::{Balance, RedemptionSubmission, UserId};

/// Error body returned by the REST API on non-success statuses.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    error: Option<String>,
}

/// Client for the credits endpoints of the remote REST API.
#[derive(Clone, Debug)]
pub struct HttpAuthority {
    client: Client,
    base: Url,
    token: Option<String>,
}

impl HttpAuthority {
    pub fn new(base: Url, config: &Config) -> Result<Self, AuthorityError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            base,
            token: config.api_token.clone(),
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, AuthorityError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| AuthorityError::Transport(format!("invalid base url {}", self.base)))?
            .pop_if_empty()
            .push("api")
            .extend(segments);
        Ok(url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn read_balance(user: &UserId, response: Response) -> Result<Balance, AuthorityError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }

        let text = response.text().await.unwrap_or_default();
        let body: ErrorBody = serde_json::from_str(&text).unwrap_or_default();
        let reason = body.message.or(body.error);

        Err(match status {
            StatusCode::NOT_FOUND => AuthorityError::UnknownUser(user.clone()),
            StatusCode::BAD_REQUEST | StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY => {
                AuthorityError::Rejected(reason.unwrap_or_else(|| status.to_string()))
            }
            _ => AuthorityError::Status {
                status: status.as_u16(),
                reason,
            },
        })
    }
}

#[async_trait]
impl CreditsAuthority for HttpAuthority {
    async fn fetch_balance(&self, user: &UserId) -> Result<Balance, AuthorityError> {
        let url = self.endpoint(&["credits", user.as_str()])?;
        debug!(user = %user, %url, "fetching balance");
        let response = self.authorize(self.client.get(url)).send().await?;
        Self::read_balance(user, response).await
    }

    async fn submit_redemption(
        &self,
        submission: &RedemptionSubmission,
    ) -> Result<Balance, AuthorityError> {
        let url = self.endpoint(&["credits", "redeem"])?;
        debug!(user = %submission.user_id, %url, "submitting redemption");
        let response = self
            .authorize(self.client.post(url))
            .json(submission)
            .send()
            .await?;
        Self::read_balance(&submission.user_id, response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amount::{Coins, Credits};
    use std::time::Duration;

    fn authority(base: &str) -> HttpAuthority {
        let config = Config::default();
        HttpAuthority::new(Url::parse(base).unwrap(), &config).unwrap()
    }

    #[test]
    fn endpoint_appends_to_base_path() {
        let root = authority("https://example.com/");
        let url = root.endpoint(&["credits", "user_1"]).unwrap();
        assert_eq!(url.as_str(), "https://example.com/api/credits/user_1");

        let nested = authority("https://example.com/v2");
        let url = nested.endpoint(&["credits", "redeem"]).unwrap();
        assert_eq!(url.as_str(), "https://example.com/v2/api/credits/redeem");
    }

    #[test]
    fn endpoint_escapes_user_ids() {
        let url = authority("https://example.com")
            .endpoint(&["credits", "a/b c"])
            .unwrap();
        assert_eq!(url.as_str(), "https://example.com/api/credits/a%2Fb%20c");
    }

    // In-process server standing in for the REST API.

    mod server {
        use axum::extract::Path;
        use axum::http::{HeaderMap, StatusCode};
        use axum::routing::{get, post};
        use axum::{Json, Router};
        use serde_json::{Value, json};
        use tokio::net::TcpListener;

        async fn balance(Path(user): Path<String>, headers: HeaderMap) -> (StatusCode, Json<Value>) {
            let authorized = headers
                .get("authorization")
                .is_some_and(|v| v == "Bearer secret");
            match (user.as_str(), authorized) {
                (_, false) => (StatusCode::UNAUTHORIZED, Json(json!({ "message": "missing token" }))),
                ("alice", true) => (StatusCode::OK, Json(json!({ "totalCredits": 2500, "coins": 1 }))),
                _ => (StatusCode::NOT_FOUND, Json(json!({ "message": "no such user" }))),
            }
        }

        async fn redeem(Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
            if body["creditsDeducted"] == 1000 && body["coinsGranted"] == 1 {
                (StatusCode::OK, Json(json!({ "credits": 1500, "coins": 2 })))
            } else if body["creditsDeducted"] == 2000 {
                (StatusCode::CONFLICT, Json(json!({ "error": "balance changed" })))
            } else {
                (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({})))
            }
        }

        async fn slow() -> Json<Value> {
            tokio::time::sleep(std::time::Duration::from_secs(5)).await;
            Json(json!({ "credits": 0, "coins": 0 }))
        }

        pub async fn start() -> String {
            let app = Router::new()
                .route("/api/credits/redeem", post(redeem))
                .route("/api/credits/:user", get(balance))
                .route("/slow/api/credits/:user", get(slow));
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            tokio::spawn(async move {
                axum::serve(listener, app).await.unwrap();
            });
            format!("http://{addr}")
        }
    }

    fn with_token(base: &str) -> HttpAuthority {
        let config = Config {
            api_token: Some("secret".into()),
            ..Config::default()
        };
        HttpAuthority::new(Url::parse(base).unwrap(), &config).unwrap()
    }

    fn submission(credits: u64, coins: u64) -> RedemptionSubmission {
        RedemptionSubmission {
            user_id: UserId::new("alice"),
            credits_deducted: Credits::new(credits),
            coins_granted: Coins::new(coins),
        }
    }

    #[tokio::test]
    async fn fetch_balance_sends_bearer_token() {
        let base = server::start().await;
        let balance = with_token(&base)
            .fetch_balance(&UserId::new("alice"))
            .await
            .unwrap();
        assert_eq!(balance, Balance::new(2500, 1));
    }

    #[tokio::test]
    async fn fetch_balance_without_token_reports_status() {
        let base = server::start().await;
        let err = authority(&base)
            .fetch_balance(&UserId::new("alice"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AuthorityError::Status { status: 401, reason: Some(ref r) } if r == "missing token"
        ));
    }

    #[tokio::test]
    async fn fetch_unknown_user() {
        let base = server::start().await;
        let err = with_token(&base)
            .fetch_balance(&UserId::new("mallory"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthorityError::UnknownUser(u) if u.as_str() == "mallory"));
    }

    #[tokio::test]
    async fn submit_returns_confirmed_balance() {
        let base = server::start().await;
        let balance = with_token(&base)
            .submit_redemption(&submission(1000, 1))
            .await
            .unwrap();
        assert_eq!(balance, Balance::new(1500, 2));
    }

    #[tokio::test]
    async fn submit_conflict_is_rejected_with_reason() {
        let base = server::start().await;
        let err = with_token(&base)
            .submit_redemption(&submission(2000, 2))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthorityError::Rejected(ref r) if r == "balance changed"));
    }

    #[tokio::test]
    async fn submit_server_error_without_body_reason() {
        let base = server::start().await;
        let err = with_token(&base)
            .submit_redemption(&submission(3000, 3))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthorityError::Status { status: 500, reason: None }));
    }

    #[tokio::test]
    async fn slow_authority_times_out() {
        let base = server::start().await;
        let config = Config {
            timeout: Duration::from_millis(100),
            ..Config::default()
        };
        let authority =
            HttpAuthority::new(Url::parse(&format!("{base}/slow")).unwrap(), &config).unwrap();
        let err = authority
            .fetch_balance(&UserId::new("alice"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthorityError::Timeout));
    }

    #[tokio::test]
    async fn unreachable_authority_is_a_transport_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = authority(&format!("http://{addr}"))
            .fetch_balance(&UserId::new("alice"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthorityError::Transport(_)));
    }
}
