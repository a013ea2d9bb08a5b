use std::path::Path;
use std::sync::Arc;

use reviewbot_core::feeds::{business_unit_feeds_for_star_rating, team_feeds};
use reviewbot_core::{
    BusinessUnitId, ChannelId, FeedSettingsPatch, IncomingWebhook, StarFilter, StarRating, Team,
    TeamId,
};
use reviewbot_db::{connect_with_settings, migrations, DbPool, FeedSettingsStore, SqlTeamRepository};

type FeedStoreTestResult<T = ()> = Result<T, String>;

macro_rules! require {
    ($cond:expr, $($arg:tt)*) => {
        if !$cond {
            return Err(format!($($arg)*));
        }
    };
}

macro_rules! require_eq {
    ($left:expr, $right:expr) => {
        if $left != $right {
            return Err(format!(
                "assertion failed: `left == right` (`{:?}` != `{:?}`)",
                $left,
                $right
            ));
        }
    };
}

async fn open(path: &Path) -> FeedStoreTestResult<(DbPool, FeedSettingsStore)> {
    let url = format!("sqlite://{}", path.display());
    let pool = connect_with_settings(&url, 2, 5).await.map_err(|error| error.to_string())?;
    migrations::run_pending(&pool).await.map_err(|error| error.to_string())?;
    let store = FeedSettingsStore::new(Arc::new(SqlTeamRepository::new(pool.clone())));
    Ok((pool, store))
}

fn installed_team() -> Team {
    let mut team = Team::new(TeamId("T1".to_owned()));
    team.register_business_unit(BusinessUnitId("bu-1".to_owned()));
    team.register_business_unit(BusinessUnitId("bu-2".to_owned()));
    team.incoming_webhook = Some(IncomingWebhook {
        channel_id: ChannelId("C0".to_owned()),
        channel: Some("#reviews".to_owned()),
        url: Some("https://hooks.slack.test/T1".to_owned()),
    });
    team
}

fn rating(value: u8) -> FeedStoreTestResult<StarRating> {
    StarRating::new(value).map_err(|error| error.to_string())
}

#[tokio::test]
async fn feed_settings_survive_a_restart() -> FeedStoreTestResult {
    let dir = tempfile::tempdir().map_err(|error| error.to_string())?;
    let path = dir.path().join("reviewbot.db");
    let team_id = TeamId("T1".to_owned());

    {
        let (pool, store) = open(&path).await?;
        store.save_team(installed_team()).await.map_err(|error| error.to_string())?;
        store
            .upsert(
                &team_id,
                &ChannelId("C9".to_owned()),
                &FeedSettingsPatch {
                    business_unit_id: Some(BusinessUnitId("bu-2".to_owned())),
                    star_filter: Some(StarFilter::Negative),
                    can_reply: Some(true),
                },
            )
            .await
            .map_err(|error| error.to_string())?;
        pool.close().await;
    }

    let (pool, store) = open(&path).await?;
    let team = store.find_team(&team_id).await.map_err(|error| error.to_string())?;
    let feeds = team_feeds(&team);
    require_eq!(feeds.len(), 2);
    require_eq!(team.business_units.len(), 2);

    let negative_bu2 = business_unit_feeds_for_star_rating(
        &team,
        &BusinessUnitId("bu-2".to_owned()),
        rating(1)?,
    );
    let channels: Vec<&str> = negative_bu2.iter().map(|feed| feed.channel_id.0.as_str()).collect();
    require!(channels.contains(&"C9"), "C9 should follow bu-2 negatives, got {channels:?}");
    require!(channels.contains(&"C0"), "legacy webhook feed follows every unit, got {channels:?}");

    let positive_bu2 = business_unit_feeds_for_star_rating(
        &team,
        &BusinessUnitId("bu-2".to_owned()),
        rating(5)?,
    );
    require!(
        positive_bu2.iter().all(|feed| feed.channel_id.0 != "C9"),
        "negative-only feed must not receive five stars"
    );

    pool.close().await;
    Ok(())
}

#[tokio::test]
async fn clearing_feeds_persists_the_removed_webhook() -> FeedStoreTestResult {
    let dir = tempfile::tempdir().map_err(|error| error.to_string())?;
    let path = dir.path().join("reviewbot.db");
    let team_id = TeamId("T1".to_owned());

    {
        let (pool, store) = open(&path).await?;
        store.save_team(installed_team()).await.map_err(|error| error.to_string())?;
        store.clear_all(&team_id).await.map_err(|error| error.to_string())?;
        pool.close().await;
    }

    let (pool, store) = open(&path).await?;
    let team = store.find_team(&team_id).await.map_err(|error| error.to_string())?;
    require!(team_feeds(&team).is_empty(), "no feed should survive a revoked integration");
    require_eq!(team.business_units.len(), 2);

    pool.close().await;
    Ok(())
}
