use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::review::StarRating;
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TeamId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BusinessUnitId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(pub String);

impl ChannelId {
    /// Direct message conversations start with `D`.
    pub fn is_direct_message(&self) -> bool {
        self.0.starts_with('D')
    }

    /// Legacy private channels (groups) start with `G`.
    pub fn is_private_group(&self) -> bool {
        self.0.starts_with('G')
    }
}

macro_rules! display_newtype {
    ($($name:ident),*) => {
        $(
            impl fmt::Display for $name {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str(&self.0)
                }
            }
        )*
    };
}

display_newtype!(TeamId, BusinessUnitId, ChannelId);

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StarFilter {
    #[default]
    All,
    Positive,
    Negative,
}

impl StarFilter {
    pub fn accepts(self, rating: StarRating) -> bool {
        match self {
            Self::All => true,
            Self::Positive => rating.is_positive(),
            Self::Negative => !rating.is_positive(),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Positive => "positive",
            Self::Negative => "negative",
        }
    }
}

impl FromStr for StarFilter {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(Self::All),
            "positive" => Ok(Self::Positive),
            "negative" => Ok(Self::Negative),
            other => Err(DomainError::InvalidStarFilter(other.to_owned())),
        }
    }
}

/// A channel's subscription to a business unit's reviews.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedSetting {
    pub channel_id: ChannelId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_unit_id: Option<BusinessUnitId>,
    #[serde(default)]
    pub star_filter: StarFilter,
    #[serde(default)]
    pub can_reply: bool,
}

impl FeedSetting {
    pub fn new(channel_id: ChannelId) -> Self {
        Self { channel_id, business_unit_id: None, star_filter: StarFilter::All, can_reply: false }
    }

    /// Feeds without a business unit were configured before multiple business units existed
    /// and follow every business unit of the team.
    pub fn follows_business_unit(&self, business_unit_id: &BusinessUnitId) -> bool {
        self.business_unit_id.as_ref().map_or(true, |own| own == business_unit_id)
    }

    pub fn accepts(&self, business_unit_id: &BusinessUnitId, rating: StarRating) -> bool {
        self.follows_business_unit(business_unit_id) && self.star_filter.accepts(rating)
    }
}

/// Partial update of a feed. Unset fields keep their previous value.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FeedSettingsPatch {
    pub business_unit_id: Option<BusinessUnitId>,
    pub star_filter: Option<StarFilter>,
    pub can_reply: Option<bool>,
}

impl FeedSettingsPatch {
    pub fn apply_to(&self, feed: &mut FeedSetting) {
        if let Some(business_unit_id) = &self.business_unit_id {
            feed.business_unit_id = Some(business_unit_id.clone());
        }
        if let Some(star_filter) = self.star_filter {
            feed.star_filter = star_filter;
        }
        if let Some(can_reply) = self.can_reply {
            feed.can_reply = can_reply;
        }
    }
}

/// Single-channel webhook created by the legacy install flow.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomingWebhook {
    pub channel_id: ChannelId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotCredentials {
    pub user_id: String,
    pub name: String,
    pub access_token: String,
}

impl fmt::Debug for BotCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BotCredentials")
            .field("user_id", &self.user_id)
            .field("name", &self.name)
            .field("access_token", &"[REDACTED]")
            .finish()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub id: TeamId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot: Option<BotCredentials>,
    #[serde(default)]
    pub business_units: Vec<BusinessUnitId>,
    #[serde(default)]
    pub feeds: Vec<FeedSetting>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub incoming_webhook: Option<IncomingWebhook>,
}

impl Team {
    pub fn new(id: TeamId) -> Self {
        Self {
            id,
            name: None,
            bot: None,
            business_units: Vec::new(),
            feeds: Vec::new(),
            incoming_webhook: None,
        }
    }

    /// The only write path for business units. Keeps insertion order and ignores duplicates.
    pub fn register_business_unit(&mut self, business_unit_id: BusinessUnitId) -> bool {
        if self.business_units.contains(&business_unit_id) {
            return false;
        }
        self.business_units.push(business_unit_id);
        true
    }

    pub fn primary_business_unit(&self) -> Option<&BusinessUnitId> {
        self.business_units.first()
    }

    pub fn bot_name(&self) -> Option<&str> {
        self.bot.as_ref().map(|bot| bot.name.as_str())
    }
}
