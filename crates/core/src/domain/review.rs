use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReviewId(pub String);

impl fmt::Display for ReviewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A star rating between 1 and 5 inclusive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct StarRating(u8);

impl StarRating {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    pub fn new(value: u8) -> Result<Self, DomainError> {
        if (Self::MIN..=Self::MAX).contains(&value) {
            Ok(Self(value))
        } else {
            Err(DomainError::InvalidStarRating(value))
        }
    }

    pub fn value(self) -> u8 {
        self.0
    }

    /// Four and five stars.
    pub fn is_positive(self) -> bool {
        self.0 >= 4
    }

    pub fn all() -> impl Iterator<Item = StarRating> {
        (Self::MIN..=Self::MAX).map(StarRating)
    }
}

impl TryFrom<u8> for StarRating {
    type Error = DomainError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<StarRating> for u8 {
    fn from(value: StarRating) -> Self {
        value.0
    }
}

impl fmt::Display for StarRating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Consumer {
    pub display_name: String,
}

/// A review as delivered by the review platform. Never persisted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: ReviewId,
    pub stars: StarRating,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub consumer: Consumer,
    #[serde(default)]
    pub is_verified: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_id: Option<String>,
}

impl Review {
    /// Fixed review used by the `test` command to check channel settings.
    pub fn self_test(created_at: DateTime<Utc>) -> Self {
        Self {
            id: ReviewId("self-test".to_owned()),
            stars: StarRating(5),
            title: "Test Review".to_owned(),
            text: "This is just a test to verify the settings on your Slack channels.".to_owned(),
            created_at,
            consumer: Consumer { display_name: "The Reviewbot Slack App".to_owned() },
            is_verified: false,
            reference_id: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    use super::{Review, StarRating};
    use crate::errors::DomainError;

    #[test]
    fn star_rating_rejects_out_of_range_values() {
        assert_eq!(StarRating::new(0), Err(DomainError::InvalidStarRating(0)));
        assert_eq!(StarRating::new(6), Err(DomainError::InvalidStarRating(6)));
        assert_eq!(StarRating::all().count(), 5);
    }

    #[test]
    fn review_deserializes_platform_payload() {
        let review: Review = serde_json::from_value(json!({
            "id": "r-1",
            "stars": 4,
            "title": "Great",
            "text": "Fast delivery",
            "createdAt": "2024-03-01T10:00:00Z",
            "consumer": { "displayName": "Jane" },
            "isVerified": true,
            "referenceId": "ORD-9"
        }))
        .expect("review payload");

        assert_eq!(review.stars.value(), 4);
        assert!(review.stars.is_positive());
        assert_eq!(review.consumer.display_name, "Jane");
        assert_eq!(review.reference_id.as_deref(), Some("ORD-9"));
        assert_eq!(review.created_at, Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap());
    }

    #[test]
    fn review_with_invalid_stars_fails_to_deserialize() {
        let result = serde_json::from_value::<Review>(json!({
            "id": "r-2",
            "stars": 9,
            "createdAt": "2024-03-01T10:00:00Z",
            "consumer": { "displayName": "Jane" }
        }));

        assert!(result.is_err());
    }
}
