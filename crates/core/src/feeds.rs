//! Feed settings lookup and mutation on a [`Team`] record.
//!
//! Everything here is pure; persisting the mutated team is the caller's job
//! (see `reviewbot_db::feed_store`).

use crate::domain::review::StarRating;
use crate::domain::team::{BusinessUnitId, ChannelId, FeedSetting, FeedSettingsPatch, Team};

/// Effective feeds of a team: the stored feeds plus a reply-enabled default for the legacy
/// webhook channel when no explicit entry exists for it.
pub fn team_feeds(team: &Team) -> Vec<FeedSetting> {
    let mut feeds = team.feeds.clone();
    if let Some(webhook) = &team.incoming_webhook {
        if !feeds.iter().any(|feed| feed.channel_id == webhook.channel_id) {
            feeds.push(FeedSetting {
                can_reply: true,
                ..FeedSetting::new(webhook.channel_id.clone())
            });
        }
    }
    feeds
}

pub fn business_unit_feeds_for_star_rating(
    team: &Team,
    business_unit_id: &BusinessUnitId,
    rating: StarRating,
) -> Vec<FeedSetting> {
    team_feeds(team).into_iter().filter(|feed| feed.accepts(business_unit_id, rating)).collect()
}

pub fn channel_feed_settings(team: &Team, channel_id: &ChannelId) -> Option<FeedSetting> {
    team_feeds(team).into_iter().find(|feed| &feed.channel_id == channel_id)
}

/// Settings for a channel, or a reply-disabled default without a business unit.
pub fn channel_feed_settings_or_default(team: &Team, channel_id: &ChannelId) -> FeedSetting {
    channel_feed_settings(team, channel_id).unwrap_or_else(|| FeedSetting::new(channel_id.clone()))
}

pub fn has_channel_feed_settings(team: &Team, channel_id: &ChannelId) -> bool {
    channel_feed_settings(team, channel_id).is_some()
}

/// Merges `patch` into the channel's effective entry (stored or legacy default) and stores
/// the result as an explicit feed. Returns the merged entry.
pub fn apply_feed_settings(
    team: &mut Team,
    channel_id: &ChannelId,
    patch: &FeedSettingsPatch,
) -> FeedSetting {
    let mut merged = channel_feed_settings_or_default(team, channel_id);
    patch.apply_to(&mut merged);

    match team.feeds.iter_mut().find(|feed| &feed.channel_id == channel_id) {
        Some(existing) => *existing = merged.clone(),
        None => team.feeds.push(merged.clone()),
    }
    merged
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FeedRemoval {
    pub channel_id: ChannelId,
    pub business_unit_id: Option<BusinessUnitId>,
}

/// Removes the channel's feed, including the legacy webhook default. Returns `None` when the
/// channel had no effective feed.
pub fn remove_feed_settings(team: &mut Team, channel_id: &ChannelId) -> Option<FeedRemoval> {
    let removed = channel_feed_settings(team, channel_id)?;
    team.feeds.retain(|feed| &feed.channel_id != channel_id);
    if team.incoming_webhook.as_ref().is_some_and(|hook| &hook.channel_id == channel_id) {
        team.incoming_webhook = None;
    }
    Some(FeedRemoval { channel_id: removed.channel_id, business_unit_id: removed.business_unit_id })
}

/// Drops every feed of the team, legacy webhook included.
pub fn clear_feeds(team: &mut Team) {
    team.feeds.clear();
    team.incoming_webhook = None;
}

#[cfg(test)]
mod tests {
    use super::{
        apply_feed_settings, business_unit_feeds_for_star_rating, channel_feed_settings_or_default,
        clear_feeds, remove_feed_settings, team_feeds,
    };
    use crate::domain::review::StarRating;
    use crate::domain::team::{
        BusinessUnitId, ChannelId, FeedSetting, FeedSettingsPatch, IncomingWebhook, StarFilter,
        Team, TeamId,
    };

    fn channel(id: &str) -> ChannelId {
        ChannelId(id.to_owned())
    }

    fn business_unit(id: &str) -> BusinessUnitId {
        BusinessUnitId(id.to_owned())
    }

    fn rating(value: u8) -> StarRating {
        StarRating::new(value).expect("valid rating")
    }

    fn legacy_team(webhook_channel: &str) -> Team {
        let mut team = Team::new(TeamId("T1".to_owned()));
        team.incoming_webhook =
            Some(IncomingWebhook { channel_id: channel(webhook_channel), channel: None, url: None });
        team
    }

    fn feed(channel_id: &str, business_unit_id: &str, star_filter: StarFilter) -> FeedSetting {
        FeedSetting {
            channel_id: channel(channel_id),
            business_unit_id: Some(business_unit(business_unit_id)),
            star_filter,
            can_reply: false,
        }
    }

    #[test]
    fn unconfigured_team_has_no_feeds() {
        let team = Team::new(TeamId("T1".to_owned()));
        assert!(team_feeds(&team).is_empty());
    }

    #[test]
    fn legacy_webhook_synthesizes_reply_enabled_feed() {
        let team = legacy_team("C1");
        let feeds = team_feeds(&team);

        assert_eq!(feeds.len(), 1);
        assert_eq!(feeds[0].channel_id, channel("C1"));
        assert!(feeds[0].can_reply);
    }

    #[test]
    fn explicit_entry_for_webhook_channel_wins_without_duplicate() {
        let mut team = legacy_team("C1");
        team.feeds.push(feed("C1", "bu-1", StarFilter::Negative));

        let feeds = team_feeds(&team);

        assert_eq!(feeds.len(), 1);
        assert!(!feeds[0].can_reply);
        assert_eq!(feeds[0].star_filter, StarFilter::Negative);
    }

    #[test]
    fn star_rating_lookup_applies_business_unit_and_filter() {
        let mut team = Team::new(TeamId("T1".to_owned()));
        team.feeds = vec![
            feed("C-all", "bu-1", StarFilter::All),
            feed("C-pos", "bu-1", StarFilter::Positive),
            feed("C-neg", "bu-1", StarFilter::Negative),
            feed("C-other", "bu-2", StarFilter::All),
        ];

        let channels = |stars: u8| {
            business_unit_feeds_for_star_rating(&team, &business_unit("bu-1"), rating(stars))
                .into_iter()
                .map(|feed| feed.channel_id.0)
                .collect::<Vec<_>>()
        };

        assert_eq!(channels(5), vec!["C-all", "C-pos"]);
        assert_eq!(channels(4), vec!["C-all", "C-pos"]);
        assert_eq!(channels(3), vec!["C-all", "C-neg"]);
        assert_eq!(channels(1), vec!["C-all", "C-neg"]);
    }

    #[test]
    fn legacy_feed_follows_every_business_unit() {
        let team = legacy_team("C1");
        let feeds = business_unit_feeds_for_star_rating(&team, &business_unit("bu-9"), rating(2));
        assert_eq!(feeds.len(), 1);
    }

    #[test]
    fn default_settings_disallow_replies() {
        let team = Team::new(TeamId("T1".to_owned()));
        let settings = channel_feed_settings_or_default(&team, &channel("C9"));

        assert!(!settings.can_reply);
        assert_eq!(settings.business_unit_id, None);
    }

    #[test]
    fn successive_patches_merge_field_by_field() {
        let mut team = Team::new(TeamId("T1".to_owned()));

        apply_feed_settings(
            &mut team,
            &channel("C1"),
            &FeedSettingsPatch { can_reply: Some(true), ..FeedSettingsPatch::default() },
        );
        let merged = apply_feed_settings(
            &mut team,
            &channel("C1"),
            &FeedSettingsPatch {
                star_filter: Some(StarFilter::Positive),
                ..FeedSettingsPatch::default()
            },
        );

        assert_eq!(team.feeds.len(), 1);
        assert!(merged.can_reply);
        assert_eq!(merged.star_filter, StarFilter::Positive);
        assert_eq!(team.feeds[0], merged);
    }

    #[test]
    fn patching_legacy_channel_starts_from_its_default() {
        let mut team = legacy_team("C1");

        let merged = apply_feed_settings(
            &mut team,
            &channel("C1"),
            &FeedSettingsPatch {
                business_unit_id: Some(business_unit("bu-1")),
                ..FeedSettingsPatch::default()
            },
        );

        assert!(merged.can_reply);
        assert_eq!(team_feeds(&team).len(), 1);
    }

    #[test]
    fn removing_feed_reports_business_unit_and_clears_webhook() {
        let mut team = legacy_team("C1");
        team.feeds.push(feed("C1", "bu-1", StarFilter::All));
        team.feeds.push(feed("C2", "bu-2", StarFilter::All));

        let removal = remove_feed_settings(&mut team, &channel("C1")).expect("feed removed");

        assert_eq!(removal.business_unit_id, Some(business_unit("bu-1")));
        assert!(team.incoming_webhook.is_none());
        assert_eq!(team_feeds(&team).len(), 1);
        assert!(remove_feed_settings(&mut team, &channel("C1")).is_none());
    }

    #[test]
    fn clearing_feeds_leaves_no_effective_feed() {
        let mut team = legacy_team("C1");
        team.feeds.push(feed("C2", "bu-1", StarFilter::All));

        clear_feeds(&mut team);

        assert!(team.feeds.is_empty());
        assert!(team_feeds(&team).is_empty());
    }
}
