/// Temporary voice service - ownership lifecycle for bot-created channels
use std::{future::Future, sync::Arc, time::Duration};

use dashmap::DashMap;
use poise::serenity_prelude::{ChannelId, GuildId, UserId};
use tracing::{debug, error, info, warn};

use crate::{
    constants::VOICE_GRACE,
    models::{Error, VoiceOwnership, VoicePreference},
    store::{Store, StoreError},
    utils::{
        channel_utils::format_temp_channel_name,
        ownership::{
            self, ClaimOutcome, TransferOutcome, find_inactive_for_owner, remove_if_inactive,
            set_active, upsert_record,
        },
    },
};

/// What is needed to create a member's temporary channel
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelRequest {
    pub guild_id: GuildId,
    pub lobby_channel_id: ChannelId,
    pub category_id: Option<ChannelId>,
    pub owner_id: UserId,
    pub name: String,
    pub user_limit: Option<u32>,
    pub region: Option<String>,
}

/// Voice operations the lifecycle needs from the platform
pub trait VoicePlatform: Clone + Send + Sync + 'static {
    /// Members connected to a channel; `None` when the channel no longer exists
    fn member_count(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> impl Future<Output = Result<Option<usize>, Error>> + Send;

    fn create_channel(
        &self,
        request: ChannelRequest,
    ) -> impl Future<Output = Result<ChannelId, Error>> + Send;

    fn move_member(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        channel_id: ChannelId,
    ) -> impl Future<Output = Result<(), Error>> + Send;

    fn delete_channel(&self, channel_id: ChannelId) -> impl Future<Output = Result<(), Error>> + Send;

    /// Post the owner's welcome note into a freshly created channel
    fn announce(
        &self,
        channel_id: ChannelId,
        owner_id: UserId,
    ) -> impl Future<Output = Result<(), Error>> + Send;
}

/// Drives the `none -> active -> inactive -> deleted` state machine
#[derive(Clone)]
pub struct TempVoiceManager {
    store: Arc<Store>,
    grace: Duration,
    /// Pending grace timers: channel -> generation of the latest one
    pending: Arc<DashMap<ChannelId, u64>>,
}

impl TempVoiceManager {
    pub fn new(store: Arc<Store>) -> Self {
        Self::with_grace(store, VOICE_GRACE)
    }

    pub fn with_grace(store: Arc<Store>, grace: Duration) -> Self {
        Self {
            store,
            grace,
            pending: Arc::new(DashMap::new()),
        }
    }

    /// Ownership records for a guild
    pub async fn records(&self, guild_id: GuildId) -> Vec<VoiceOwnership> {
        self.store
            .guilds
            .read()
            .await
            .remove(&guild_id.get())
            .map(|config| config.owner_to_channel)
            .unwrap_or_default()
    }

    pub async fn record(&self, guild_id: GuildId, channel_id: ChannelId) -> Option<VoiceOwnership> {
        self.records(guild_id)
            .await
            .into_iter()
            .find(|r| r.channel_id == channel_id)
    }

    /// Run a mutation against a guild's ownership records under the table lock
    pub async fn update_records<R, F>(&self, guild_id: GuildId, mutate: F) -> Result<R, StoreError>
    where
        F: FnOnce(&mut Vec<VoiceOwnership>) -> R,
    {
        self.store
            .guilds
            .update(|guilds| mutate(&mut guilds.entry(guild_id.get()).or_default().owner_to_channel))
            .await
    }

    /// A member joined `channel_id`
    pub async fn on_join<P: VoicePlatform>(
        &self,
        platform: &P,
        guild_id: GuildId,
        user_id: UserId,
        display_name: &str,
        channel_id: ChannelId,
    ) -> Result<(), Error> {
        let config = self
            .store
            .guilds
            .read()
            .await
            .remove(&guild_id.get())
            .unwrap_or_default();

        if config.lobby_channel_id == Some(channel_id) {
            return self
                .provision(platform, guild_id, user_id, display_name, channel_id, config.temp_category_id)
                .await;
        }

        if ownership::find_record(&config.owner_to_channel, channel_id).is_some_and(|r| !r.is_active) {
            self.pending.remove(&channel_id);
            self.update_records(guild_id, |records| set_active(records, channel_id, true))
                .await?;
            info!("Temp channel {} re-joined, deletion aborted", channel_id);
        }

        Ok(())
    }

    /// A member left `channel_id`
    pub async fn on_leave<P: VoicePlatform>(
        &self,
        platform: &P,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<(), Error> {
        if self.record(guild_id, channel_id).await.is_none() {
            return Ok(());
        }

        if platform.member_count(guild_id, channel_id).await? == Some(0) {
            self.begin_grace(platform, guild_id, channel_id).await?;
        }

        Ok(())
    }

    /// Move a lobby joiner into their inactive channel, or create a new one
    async fn provision<P: VoicePlatform>(
        &self,
        platform: &P,
        guild_id: GuildId,
        user_id: UserId,
        display_name: &str,
        lobby_channel_id: ChannelId,
        category_id: Option<ChannelId>,
    ) -> Result<(), Error> {
        let reactivated = self
            .update_records(guild_id, |records| {
                let channel_id = find_inactive_for_owner(records, user_id)?;
                set_active(records, channel_id, true);
                Some(channel_id)
            })
            .await?;

        if let Some(channel_id) = reactivated {
            self.pending.remove(&channel_id);
            platform.move_member(guild_id, user_id, channel_id).await?;
            info!(
                "Moved user {} back into their temp channel {} in guild {}",
                user_id, channel_id, guild_id
            );
            return Ok(());
        }

        let prefs: VoicePreference = self
            .store
            .voice_prefs
            .read()
            .await
            .remove(&user_id.get())
            .unwrap_or_default();

        let name = prefs
            .channel_name
            .clone()
            .unwrap_or_else(|| format_temp_channel_name(display_name));

        let request = ChannelRequest {
            guild_id,
            lobby_channel_id,
            category_id,
            owner_id: user_id,
            name: name.clone(),
            user_limit: prefs.user_limit,
            region: prefs.region.clone(),
        };

        let channel_id = platform.create_channel(request).await?;

        self.update_records(guild_id, |records| {
            upsert_record(
                records,
                VoiceOwnership {
                    owner_id: user_id,
                    channel_id,
                    channel_name: name,
                    is_active: true,
                    region: prefs.region,
                },
            )
        })
        .await?;

        platform.move_member(guild_id, user_id, channel_id).await?;

        info!(
            "Created temp channel {} for user {} in guild {}",
            channel_id, user_id, guild_id
        );

        if let Err(e) = platform.announce(channel_id, user_id).await {
            warn!("Failed to post welcome in temp channel {}: {}", channel_id, e);
        }

        Ok(())
    }

    /// Mark a channel inactive and arm its grace timer.
    ///
    /// A newer grace timer for the same channel supersedes older ones.
    pub async fn begin_grace<P: VoicePlatform>(
        &self,
        platform: &P,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<(), StoreError> {
        self.update_records(guild_id, |records| set_active(records, channel_id, false))
            .await?;

        let generation = {
            let mut entry = self.pending.entry(channel_id).or_insert(0);
            *entry += 1;
            *entry
        };

        debug!(
            "Temp channel {} is empty, deleting in {:?} unless re-joined",
            channel_id, self.grace
        );

        let manager = self.clone();
        let platform = platform.clone();
        tokio::spawn(async move {
            tokio::time::sleep(manager.grace).await;
            manager
                .finish_grace(&platform, guild_id, channel_id, generation)
                .await;
        });

        Ok(())
    }

    /// Grace window elapsed: delete the channel if it is still empty
    async fn finish_grace<P: VoicePlatform>(
        &self,
        platform: &P,
        guild_id: GuildId,
        channel_id: ChannelId,
        generation: u64,
    ) {
        if self.pending.get(&channel_id).map(|g| *g) != Some(generation) {
            return;
        }
        self.pending.remove_if(&channel_id, |_, g| *g == generation);

        let count = match platform.member_count(guild_id, channel_id).await {
            Ok(count) => count,
            Err(e) => {
                warn!("Failed to check members of temp channel {}: {}", channel_id, e);
                return;
            }
        };

        if let Some(n) = count
            && n > 0
        {
            if let Err(e) = self
                .update_records(guild_id, |records| set_active(records, channel_id, true))
                .await
            {
                error!("Failed to reactivate temp channel {}: {}", channel_id, e);
            }
            return;
        }

        let removed = match self
            .update_records(guild_id, |records| remove_if_inactive(records, channel_id))
            .await
        {
            Ok(removed) => removed,
            Err(e) => {
                error!("Failed to remove ownership of temp channel {}: {}", channel_id, e);
                return;
            }
        };

        let Some(record) = removed else {
            return;
        };

        if count.is_none() {
            info!("Temp channel {} was already gone, record dropped", channel_id);
            return;
        }

        match platform.delete_channel(channel_id).await {
            Ok(()) => info!(
                "Deleted empty temp channel {} owned by {}",
                channel_id, record.owner_id
            ),
            Err(e) => error!("Failed to delete temp channel {}: {}", channel_id, e),
        }
    }

    /// Claim a channel whose owner is not connected to it
    pub async fn claim(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
        claimant: UserId,
        owner_present: bool,
    ) -> Result<ClaimOutcome, StoreError> {
        self.update_records(guild_id, |records| {
            ownership::apply_claim(records, channel_id, claimant, owner_present)
        })
        .await
    }

    pub async fn transfer(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
        actor: UserId,
        target: UserId,
        target_present: bool,
    ) -> Result<TransferOutcome, StoreError> {
        self.update_records(guild_id, |records| {
            ownership::apply_transfer(records, channel_id, actor, target, target_present)
        })
        .await
    }

    /// Drop records for vanished channels and start grace for empty ones
    pub async fn reconcile<P: VoicePlatform>(&self, platform: &P) -> Result<(), Error> {
        let guilds = self.store.guilds.read().await;
        let mut dropped = 0;
        let mut emptied = 0;

        for (guild_id, config) in guilds {
            let guild_id = GuildId::new(guild_id);
            for record in config.owner_to_channel {
                match platform.member_count(guild_id, record.channel_id).await {
                    Ok(None) => {
                        self.update_records(guild_id, |records| {
                            ownership::remove_record(records, record.channel_id)
                        })
                        .await?;
                        dropped += 1;
                    }
                    Ok(Some(0)) if !self.pending.contains_key(&record.channel_id) => {
                        self.begin_grace(platform, guild_id, record.channel_id).await?;
                        emptied += 1;
                    }
                    Ok(Some(_)) => {}
                    Err(e) => warn!(
                        "Failed to check temp channel {} during reconcile: {}",
                        record.channel_id, e
                    ),
                }
            }
        }

        info!(
            "Temp voice reconcile: {} stale records dropped, {} empty channels scheduled",
            dropped, emptied
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{
        collections::HashMap,
        sync::{
            Mutex,
            atomic::{AtomicU64, Ordering},
        },
    };
    use tokio::time::sleep;

    use crate::models::GuildConfig;

    const GUILD: u64 = 1;
    const LOBBY: u64 = 100;

    #[derive(Clone, Default)]
    struct FakePlatform {
        members: Arc<Mutex<HashMap<ChannelId, usize>>>,
        deleted: Arc<Mutex<Vec<ChannelId>>>,
        moves: Arc<Mutex<Vec<(UserId, ChannelId)>>>,
        created: Arc<Mutex<Vec<ChannelRequest>>>,
        announced: Arc<Mutex<Vec<ChannelId>>>,
        mute: bool,
        next_id: Arc<AtomicU64>,
    }

    impl FakePlatform {
        fn set_members(&self, channel: u64, count: usize) {
            self.members
                .lock()
                .unwrap()
                .insert(ChannelId::new(channel), count);
        }

        fn deleted(&self) -> Vec<ChannelId> {
            self.deleted.lock().unwrap().clone()
        }
    }

    impl VoicePlatform for FakePlatform {
        async fn member_count(
            &self,
            _guild_id: GuildId,
            channel_id: ChannelId,
        ) -> Result<Option<usize>, Error> {
            Ok(self.members.lock().unwrap().get(&channel_id).copied())
        }

        async fn create_channel(&self, request: ChannelRequest) -> Result<ChannelId, Error> {
            let id = ChannelId::new(500 + self.next_id.fetch_add(1, Ordering::SeqCst));
            self.created.lock().unwrap().push(request);
            self.members.lock().unwrap().insert(id, 0);
            Ok(id)
        }

        async fn move_member(
            &self,
            _guild_id: GuildId,
            user_id: UserId,
            channel_id: ChannelId,
        ) -> Result<(), Error> {
            self.moves.lock().unwrap().push((user_id, channel_id));
            Ok(())
        }

        async fn delete_channel(&self, channel_id: ChannelId) -> Result<(), Error> {
            self.deleted.lock().unwrap().push(channel_id);
            self.members.lock().unwrap().remove(&channel_id);
            Ok(())
        }

        async fn announce(&self, channel_id: ChannelId, _owner_id: UserId) -> Result<(), Error> {
            if self.mute {
                return Err("Missing Permissions".into());
            }
            self.announced.lock().unwrap().push(channel_id);
            Ok(())
        }
    }

    async fn setup(records: Vec<VoiceOwnership>) -> (tempfile::TempDir, TempVoiceManager) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(Store::open(dir.path()).await.unwrap());
        store
            .guilds
            .update(|guilds| {
                guilds.insert(
                    GUILD,
                    GuildConfig {
                        lobby_channel_id: Some(ChannelId::new(LOBBY)),
                        owner_to_channel: records,
                        ..Default::default()
                    },
                );
            })
            .await
            .unwrap();
        (dir, TempVoiceManager::new(store))
    }

    fn owned(owner: u64, channel: u64, active: bool) -> VoiceOwnership {
        VoiceOwnership {
            owner_id: UserId::new(owner),
            channel_id: ChannelId::new(channel),
            channel_name: "Test".to_string(),
            is_active: active,
            region: None,
        }
    }

    fn guild() -> GuildId {
        GuildId::new(GUILD)
    }

    #[tokio::test(start_paused = true)]
    async fn test_lobby_join_creates_channel() {
        let (_dir, manager) = setup(vec![]).await;
        let platform = FakePlatform::default();

        manager
            .on_join(&platform, guild(), UserId::new(7), "Alice", ChannelId::new(LOBBY))
            .await
            .unwrap();

        let created = platform.created.lock().unwrap().clone();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].name, "Alice's Channel");
        assert_eq!(created[0].owner_id, UserId::new(7));
        assert_eq!(platform.announced.lock().unwrap().len(), 1);

        let records = manager.records(guild()).await;
        assert_eq!(records.len(), 1);
        assert!(records[0].is_active);
        assert_eq!(records[0].owner_id, UserId::new(7));
        assert_eq!(
            platform.moves.lock().unwrap().clone(),
            vec![(UserId::new(7), records[0].channel_id)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_welcome_still_records_channel() {
        let (_dir, manager) = setup(vec![]).await;
        let platform = FakePlatform {
            mute: true,
            ..Default::default()
        };

        manager
            .on_join(&platform, guild(), UserId::new(7), "Alice", ChannelId::new(LOBBY))
            .await
            .unwrap();

        let records = manager.records(guild()).await;
        assert_eq!(records.len(), 1);
        assert_eq!(
            platform.moves.lock().unwrap().clone(),
            vec![(UserId::new(7), records[0].channel_id)]
        );
        assert!(platform.announced.lock().unwrap().is_empty());

        // Still tracked, so the grace flow cleans it up
        manager
            .on_leave(&platform, guild(), records[0].channel_id)
            .await
            .unwrap();
        sleep(VOICE_GRACE + Duration::from_secs(1)).await;
        assert_eq!(platform.deleted(), vec![records[0].channel_id]);
        assert!(manager.records(guild()).await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_lobby_join_reactivates_inactive_channel() {
        let (_dir, manager) = setup(vec![owned(7, 10, false)]).await;
        let platform = FakePlatform::default();
        platform.set_members(10, 0);

        manager
            .on_join(&platform, guild(), UserId::new(7), "Alice", ChannelId::new(LOBBY))
            .await
            .unwrap();

        assert!(platform.created.lock().unwrap().is_empty());
        assert_eq!(
            platform.moves.lock().unwrap().clone(),
            vec![(UserId::new(7), ChannelId::new(10))]
        );
        assert!(manager.records(guild()).await[0].is_active);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejoin_within_grace_is_not_deleted() {
        let (_dir, manager) = setup(vec![owned(7, 10, true)]).await;
        let platform = FakePlatform::default();
        platform.set_members(10, 0);

        manager
            .on_leave(&platform, guild(), ChannelId::new(10))
            .await
            .unwrap();
        assert!(!manager.records(guild()).await[0].is_active);

        sleep(Duration::from_secs(2)).await;
        platform.set_members(10, 1);
        manager
            .on_join(&platform, guild(), UserId::new(8), "Bob", ChannelId::new(10))
            .await
            .unwrap();

        sleep(Duration::from_secs(10)).await;
        assert!(platform.deleted().is_empty());
        let records = manager.records(guild()).await;
        assert_eq!(records.len(), 1);
        assert!(records[0].is_active);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_past_grace_is_deleted_once() {
        let (_dir, manager) = setup(vec![owned(7, 10, true)]).await;
        let platform = FakePlatform::default();
        platform.set_members(10, 0);

        manager
            .on_leave(&platform, guild(), ChannelId::new(10))
            .await
            .unwrap();
        manager
            .on_leave(&platform, guild(), ChannelId::new(10))
            .await
            .unwrap();

        sleep(Duration::from_secs(4)).await;
        assert!(platform.deleted().is_empty());

        sleep(Duration::from_secs(10)).await;
        assert_eq!(platform.deleted(), vec![ChannelId::new(10)]);
        assert!(manager.records(guild()).await.is_empty());

        manager.finish_grace(&platform, guild(), ChannelId::new(10), 1).await;
        manager.finish_grace(&platform, guild(), ChannelId::new(10), 2).await;
        assert_eq!(platform.deleted().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_leave_with_members_remaining_keeps_channel() {
        let (_dir, manager) = setup(vec![owned(7, 10, true)]).await;
        let platform = FakePlatform::default();
        platform.set_members(10, 2);

        manager
            .on_leave(&platform, guild(), ChannelId::new(10))
            .await
            .unwrap();

        sleep(Duration::from_secs(10)).await;
        assert!(platform.deleted().is_empty());
        assert!(manager.records(guild()).await[0].is_active);
    }

    #[tokio::test(start_paused = true)]
    async fn test_leave_untracked_channel_is_ignored() {
        let (_dir, manager) = setup(vec![]).await;
        let platform = FakePlatform::default();
        platform.set_members(55, 0);

        manager
            .on_leave(&platform, guild(), ChannelId::new(55))
            .await
            .unwrap();

        sleep(Duration::from_secs(10)).await;
        assert!(platform.deleted().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconcile_drops_vanished_and_schedules_empty() {
        let (_dir, manager) = setup(vec![owned(7, 10, true), owned(8, 11, true)]).await;
        let platform = FakePlatform::default();
        platform.set_members(11, 0);

        manager.reconcile(&platform).await.unwrap();
        let records = manager.records(guild()).await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].channel_id, ChannelId::new(11));

        sleep(Duration::from_secs(10)).await;
        assert_eq!(platform.deleted(), vec![ChannelId::new(11)]);
        assert!(manager.records(guild()).await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_claim_and_transfer() {
        let (_dir, manager) = setup(vec![owned(7, 10, true)]).await;
        let channel = ChannelId::new(10);

        let outcome = manager.claim(guild(), channel, UserId::new(8), true).await.unwrap();
        assert_eq!(outcome, ClaimOutcome::OwnerPresent);

        let outcome = manager.claim(guild(), channel, UserId::new(8), false).await.unwrap();
        assert_eq!(
            outcome,
            ClaimOutcome::Claimed {
                previous_owner: UserId::new(7)
            }
        );

        let outcome = manager
            .transfer(guild(), channel, UserId::new(8), UserId::new(9), true)
            .await
            .unwrap();
        assert_eq!(outcome, TransferOutcome::Transferred);
        assert_eq!(
            manager.record(guild(), channel).await.unwrap().owner_id,
            UserId::new(9)
        );
    }
}
