/// Pure functions for temporary voice ownership records (Discord-agnostic)
use poise::serenity_prelude::{ChannelId, UserId};

use crate::models::VoiceOwnership;

/// Result of a claim attempt on a temporary channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimOutcome {
    Claimed { previous_owner: UserId },
    NotTemporary,
    AlreadyOwner,
    OwnerPresent,
}

/// Result of an ownership transfer attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOutcome {
    Transferred,
    NotTemporary,
    NotOwner,
    TargetAbsent,
    SameUser,
}

pub fn find_record(records: &[VoiceOwnership], channel_id: ChannelId) -> Option<&VoiceOwnership> {
    records.iter().find(|r| r.channel_id == channel_id)
}

pub fn find_record_mut(
    records: &mut [VoiceOwnership],
    channel_id: ChannelId,
) -> Option<&mut VoiceOwnership> {
    records.iter_mut().find(|r| r.channel_id == channel_id)
}

/// An inactive channel owned by the user, if any
pub fn find_inactive_for_owner(records: &[VoiceOwnership], owner_id: UserId) -> Option<ChannelId> {
    records
        .iter()
        .find(|r| r.owner_id == owner_id && !r.is_active)
        .map(|r| r.channel_id)
}

/// Insert a record, replacing any existing record for the same channel
pub fn upsert_record(records: &mut Vec<VoiceOwnership>, record: VoiceOwnership) {
    match find_record_mut(records, record.channel_id) {
        Some(existing) => *existing = record,
        None => records.push(record),
    }
}

/// Set a record's active flag; returns whether the flag changed
pub fn set_active(records: &mut [VoiceOwnership], channel_id: ChannelId, active: bool) -> bool {
    match find_record_mut(records, channel_id) {
        Some(record) if record.is_active != active => {
            record.is_active = active;
            true
        }
        _ => false,
    }
}

/// Remove a record only if it is still inactive
pub fn remove_if_inactive(
    records: &mut Vec<VoiceOwnership>,
    channel_id: ChannelId,
) -> Option<VoiceOwnership> {
    let index = records
        .iter()
        .position(|r| r.channel_id == channel_id && !r.is_active)?;
    Some(records.remove(index))
}

pub fn remove_record(records: &mut Vec<VoiceOwnership>, channel_id: ChannelId) -> Option<VoiceOwnership> {
    let index = records.iter().position(|r| r.channel_id == channel_id)?;
    Some(records.remove(index))
}

/// Claim a channel whose owner has left it
pub fn apply_claim(
    records: &mut [VoiceOwnership],
    channel_id: ChannelId,
    claimant: UserId,
    owner_present: bool,
) -> ClaimOutcome {
    let Some(record) = find_record_mut(records, channel_id) else {
        return ClaimOutcome::NotTemporary;
    };

    if record.owner_id == claimant {
        return ClaimOutcome::AlreadyOwner;
    }
    if owner_present {
        return ClaimOutcome::OwnerPresent;
    }

    let previous_owner = record.owner_id;
    record.owner_id = claimant;
    ClaimOutcome::Claimed { previous_owner }
}

/// Hand a channel over to another member currently in it
pub fn apply_transfer(
    records: &mut [VoiceOwnership],
    channel_id: ChannelId,
    actor: UserId,
    target: UserId,
    target_present: bool,
) -> TransferOutcome {
    let Some(record) = find_record_mut(records, channel_id) else {
        return TransferOutcome::NotTemporary;
    };

    if record.owner_id != actor {
        return TransferOutcome::NotOwner;
    }
    if actor == target {
        return TransferOutcome::SameUser;
    }
    if !target_present {
        return TransferOutcome::TargetAbsent;
    }

    record.owner_id = target;
    TransferOutcome::Transferred
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(owner: u64, channel: u64, active: bool) -> VoiceOwnership {
        VoiceOwnership {
            owner_id: UserId::new(owner),
            channel_id: ChannelId::new(channel),
            channel_name: format!("{}'s Channel", owner),
            is_active: active,
            region: None,
        }
    }

    #[test]
    fn test_find_inactive_for_owner() {
        let records = vec![record(1, 10, true), record(1, 11, false), record(2, 12, false)];

        assert_eq!(
            find_inactive_for_owner(&records, UserId::new(1)),
            Some(ChannelId::new(11))
        );
        assert_eq!(find_inactive_for_owner(&records, UserId::new(3)), None);
    }

    #[test]
    fn test_upsert_keeps_one_record_per_channel() {
        let mut records = vec![record(1, 10, true)];
        upsert_record(&mut records, record(2, 10, false));
        upsert_record(&mut records, record(3, 11, true));

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].owner_id, UserId::new(2));
    }

    #[test]
    fn test_set_active_reports_change() {
        let mut records = vec![record(1, 10, true)];

        assert!(set_active(&mut records, ChannelId::new(10), false));
        assert!(!set_active(&mut records, ChannelId::new(10), false));
        assert!(set_active(&mut records, ChannelId::new(10), true));
        assert!(!set_active(&mut records, ChannelId::new(99), true));
    }

    #[test]
    fn test_remove_if_inactive() {
        let mut records = vec![record(1, 10, true), record(2, 11, false)];

        assert!(remove_if_inactive(&mut records, ChannelId::new(10)).is_none());
        assert!(remove_if_inactive(&mut records, ChannelId::new(11)).is_some());
        assert!(remove_if_inactive(&mut records, ChannelId::new(11)).is_none());
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn test_claim_requires_absent_owner() {
        let mut records = vec![record(1, 10, true)];
        let channel = ChannelId::new(10);

        assert_eq!(
            apply_claim(&mut records, channel, UserId::new(2), true),
            ClaimOutcome::OwnerPresent
        );
        assert_eq!(
            apply_claim(&mut records, channel, UserId::new(1), false),
            ClaimOutcome::AlreadyOwner
        );
        assert_eq!(
            apply_claim(&mut records, ChannelId::new(99), UserId::new(2), false),
            ClaimOutcome::NotTemporary
        );
        assert_eq!(
            apply_claim(&mut records, channel, UserId::new(2), false),
            ClaimOutcome::Claimed {
                previous_owner: UserId::new(1)
            }
        );
        assert_eq!(records[0].owner_id, UserId::new(2));
    }

    #[test]
    fn test_transfer_rules() {
        let mut records = vec![record(1, 10, true)];
        let channel = ChannelId::new(10);

        assert_eq!(
            apply_transfer(&mut records, channel, UserId::new(2), UserId::new(3), true),
            TransferOutcome::NotOwner
        );
        assert_eq!(
            apply_transfer(&mut records, channel, UserId::new(1), UserId::new(1), true),
            TransferOutcome::SameUser
        );
        assert_eq!(
            apply_transfer(&mut records, channel, UserId::new(1), UserId::new(3), false),
            TransferOutcome::TargetAbsent
        );
        assert_eq!(
            apply_transfer(&mut records, channel, UserId::new(1), UserId::new(3), true),
            TransferOutcome::Transferred
        );
        assert_eq!(records[0].owner_id, UserId::new(3));
    }
}
