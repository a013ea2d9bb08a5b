use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use reviewbot_core::config::ReviewApiConfig;
use reviewbot_core::{BusinessUnitId, Review, ReviewId, StarRating};

use crate::error::ApiError;
use crate::token::{parse_token_response, AccessToken};

const TOKEN_PATH: &str = "/v1/oauth/oauth-business-users-for-applications/accesstoken";

/// Operations the bot needs from the review platform.
#[async_trait]
pub trait ReviewApi: Send + Sync {
    /// Newest review without a reply, optionally limited to one star rating.
    async fn last_unanswered_review(
        &self,
        business_unit_id: &BusinessUnitId,
        stars: Option<StarRating>,
    ) -> Result<Option<Review>, ApiError>;

    async fn reply_to_review(&self, review_id: &ReviewId, message: &str) -> Result<(), ApiError>;

    async fn business_unit_display_name(
        &self,
        business_unit_id: &BusinessUnitId,
    ) -> Result<String, ApiError>;
}

#[derive(Deserialize)]
struct ReviewsPage {
    #[serde(default)]
    reviews: Vec<Review>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BusinessUnitPayload {
    display_name: String,
}

pub(crate) fn parse_first_review(body: &str) -> Result<Option<Review>, ApiError> {
    let page: ReviewsPage =
        serde_json::from_str(body).map_err(|error| ApiError::Decode(error.to_string()))?;
    Ok(page.reviews.into_iter().next())
}

pub(crate) fn parse_display_name(body: &str) -> Result<String, ApiError> {
    let payload: BusinessUnitPayload =
        serde_json::from_str(body).map_err(|error| ApiError::Decode(error.to_string()))?;
    Ok(payload.display_name)
}

pub(crate) fn reviews_query(stars: Option<StarRating>) -> Vec<(&'static str, String)> {
    vec![
        ("orderBy", "createdat.desc".to_owned()),
        ("responded", "false".to_owned()),
        ("stars", stars.map(|rating| rating.value().to_string()).unwrap_or_default()),
    ]
}

/// reqwest client authenticating as a business user. The access token is cached and
/// refreshed shortly before it expires, or after the platform answers 401.
pub struct HttpReviewApi {
    client: Client,
    base_url: String,
    api_key: SecretString,
    api_secret: SecretString,
    username: String,
    password: SecretString,
    token: Mutex<Option<AccessToken>>,
}

impl HttpReviewApi {
    pub fn new(config: &ReviewApiConfig) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|error| ApiError::Transport(error.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            api_key: config.api_key.clone(),
            api_secret: config.api_secret.clone(),
            username: config.business_user_name.clone(),
            password: config.business_user_password.clone(),
            token: Mutex::new(None),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn access_token(&self) -> Result<String, ApiError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref().filter(|token| token.is_fresh_at(Utc::now())) {
            return Ok(token.secret().to_owned());
        }

        let token = self.fetch_token().await?;
        let secret = token.secret().to_owned();
        info!(
            event_name = "review_api.token.refreshed",
            expires_at = %token.expires_at(),
            "review platform access token refreshed"
        );
        *cached = Some(token);
        Ok(secret)
    }

    async fn invalidate_token(&self) {
        self.token.lock().await.take();
    }

    async fn fetch_token(&self) -> Result<AccessToken, ApiError> {
        let response = self
            .client
            .get(self.url(TOKEN_PATH))
            .basic_auth(self.api_key.expose_secret(), Some(self.api_secret.expose_secret()))
            .form(&[
                ("grant_type", "password"),
                ("username", self.username.as_str()),
                ("password", self.password.expose_secret()),
            ])
            .send()
            .await
            .map_err(|error| ApiError::Transport(error.to_string()))?;

        let status = response.status();
        let body = response.text().await.map_err(|error| ApiError::Transport(error.to_string()))?;
        if !status.is_success() {
            return Err(ApiError::Auth(format!("token endpoint returned {status}")));
        }
        parse_token_response(&body, Utc::now())
    }

    /// Sends an authenticated request, retrying once with a fresh token on 401.
    async fn private_request<F>(&self, build: F) -> Result<String, ApiError>
    where
        F: Fn(&Client, &str) -> RequestBuilder,
    {
        match self.send_once(&build).await {
            Err(error) if error.is_unauthorized() => {
                warn!(
                    event_name = "review_api.token.rejected",
                    "access token rejected, refreshing once"
                );
                self.invalidate_token().await;
                self.send_once(&build).await
            }
            other => other,
        }
    }

    async fn send_once<F>(&self, build: &F) -> Result<String, ApiError>
    where
        F: Fn(&Client, &str) -> RequestBuilder,
    {
        let token = self.access_token().await?;
        let response = build(&self.client, &self.base_url)
            .bearer_auth(token)
            .header("apikey", self.api_key.expose_secret())
            .send()
            .await
            .map_err(|error| ApiError::Transport(error.to_string()))?;

        let status = response.status();
        let body = response.text().await.map_err(|error| ApiError::Transport(error.to_string()))?;
        if status.is_success() {
            return Ok(body);
        }
        Err(request_error(status, &body))
    }
}

fn request_error(status: StatusCode, body: &str) -> ApiError {
    let message = body.chars().take(200).collect::<String>();
    ApiError::Request { status: status.as_u16(), message }
}

#[async_trait]
impl ReviewApi for HttpReviewApi {
    async fn last_unanswered_review(
        &self,
        business_unit_id: &BusinessUnitId,
        stars: Option<StarRating>,
    ) -> Result<Option<Review>, ApiError> {
        let path = format!("/v1/private/business-units/{business_unit_id}/reviews");
        let query = reviews_query(stars);
        let body = self
            .private_request(|client, base| {
                client.request(Method::GET, format!("{base}{path}")).query(&query)
            })
            .await?;

        let review = parse_first_review(&body)?;
        debug!(
            event_name = "review_api.reviews.fetched",
            business_unit_id = %business_unit_id,
            found = review.is_some(),
            "fetched last unanswered review"
        );
        Ok(review)
    }

    async fn reply_to_review(&self, review_id: &ReviewId, message: &str) -> Result<(), ApiError> {
        let path = format!("/v1/private/reviews/{review_id}/reply");
        self.private_request(|client, base| {
            client.request(Method::POST, format!("{base}{path}")).form(&[("message", message)])
        })
        .await?;

        info!(event_name = "review_api.reply.sent", review_id = %review_id, "review reply sent");
        Ok(())
    }

    async fn business_unit_display_name(
        &self,
        business_unit_id: &BusinessUnitId,
    ) -> Result<String, ApiError> {
        let path = format!("/v1/private/business-units/{business_unit_id}");
        let body = self
            .private_request(|client, base| client.request(Method::GET, format!("{base}{path}")))
            .await?;
        parse_display_name(&body)
    }
}
