//! Review platform webhook: `POST /incoming-webhooks/{team_id}?businessUnitId=…`.

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing::{error, info, warn};

use reviewbot_core::{BusinessUnitId, Consumer, Review, ReviewId, StarRating, TeamId};
use reviewbot_slack::ReviewDelivery;

use crate::routes::{new_correlation_id, AppState};

pub const REVIEW_CREATED: &str = "service-review-created";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestQuery {
    pub business_unit_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WebhookBody {
    events: Option<Vec<WebhookEvent>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WebhookEvent {
    #[serde(default)]
    event_name: String,
    #[serde(default)]
    event_data: Value,
}

/// Review as carried by `service-review-created`; the consumer only has a `name`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatedReview {
    id: ReviewId,
    stars: StarRating,
    #[serde(default)]
    title: String,
    #[serde(default)]
    text: String,
    created_at: DateTime<Utc>,
    consumer: CreatedReviewConsumer,
    #[serde(default)]
    is_verified: bool,
    #[serde(default)]
    reference_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreatedReviewConsumer {
    #[serde(default)]
    name: String,
}

impl From<CreatedReview> for Review {
    fn from(created: CreatedReview) -> Self {
        Self {
            id: created.id,
            stars: created.stars,
            title: created.title,
            text: created.text,
            created_at: created.created_at,
            consumer: Consumer { display_name: created.consumer.name },
            is_verified: created.is_verified,
            reference_id: created.reference_id,
        }
    }
}

/// Extracts the reviews to route; other event kinds and unreadable reviews are skipped.
fn created_reviews(events: Vec<WebhookEvent>, team_id: &TeamId) -> Vec<Review> {
    events
        .into_iter()
        .filter(|event| event.event_name == REVIEW_CREATED)
        .filter_map(|event| match serde_json::from_value::<CreatedReview>(event.event_data) {
            Ok(created) => Some(created.into()),
            Err(rejection) => {
                warn!(
                    event_name = "ingest.review.unreadable",
                    team_id = %team_id,
                    error = %rejection,
                    "skipping malformed review event"
                );
                None
            }
        })
        .collect()
}

pub async fn incoming_webhook(
    State(state): State<AppState>,
    Path(team_id): Path<String>,
    Query(query): Query<IngestQuery>,
    body: Bytes,
) -> StatusCode {
    let team_id = TeamId(team_id);
    let events = match serde_json::from_slice::<WebhookBody>(&body) {
        Ok(WebhookBody { events: Some(events) }) => events,
        Ok(WebhookBody { events: None }) | Err(_) => {
            warn!(event_name = "ingest.request.rejected", team_id = %team_id, "bad incoming webhook request");
            return StatusCode::BAD_REQUEST;
        }
    };

    let Some(business_unit_id) = query
        .business_unit_id
        .filter(|id| !id.trim().is_empty())
        .map(BusinessUnitId)
        .or_else(|| state.default_business_unit.clone())
    else {
        warn!(event_name = "ingest.request.rejected", team_id = %team_id, "no business unit given");
        return StatusCode::BAD_REQUEST;
    };

    for review in created_reviews(events, &team_id) {
        let delivery =
            ReviewDelivery { review, team_id: team_id.clone(), business_unit_id: business_unit_id.clone() };
        let router = state.services.router.clone();
        let correlation_id = new_correlation_id();
        info!(
            event_name = "ingest.review.received",
            correlation_id = %correlation_id,
            team_id = %delivery.team_id,
            business_unit_id = %delivery.business_unit_id,
            review_id = %delivery.review.id,
            "posting new review"
        );
        tokio::spawn(async move {
            if let Err(failure) = router.route(&delivery, &correlation_id).await {
                error!(
                    event_name = "ingest.review.failed",
                    correlation_id = %correlation_id,
                    team_id = %delivery.team_id,
                    error = %failure,
                    "review routing failed"
                );
            }
        });
    }
    StatusCode::OK
}
