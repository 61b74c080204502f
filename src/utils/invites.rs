/// Pure functions for invite attribution (Discord-agnostic)
use std::collections::HashMap;

/// Known use count of an invite and who created it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InviteUse {
    pub uses: u64,
    pub inviter: Option<u64>,
}

/// Find the invite a new member most likely used.
///
/// The first invite whose use count grew wins. When none grew, an invite
/// that disappeared (single-use invites are deleted once consumed) is
/// reported instead.
pub fn find_used_invite<'a>(
    before: &'a HashMap<String, InviteUse>,
    after: &'a HashMap<String, InviteUse>,
) -> Option<(&'a str, InviteUse)> {
    let mut grown: Vec<(&str, InviteUse)> = after
        .iter()
        .filter(|(code, now)| {
            let previous = before.get(code.as_str()).map_or(0, |b| b.uses);
            now.uses > previous
        })
        .map(|(code, now)| (code.as_str(), *now))
        .collect();
    grown.sort_by(|a, b| a.0.cmp(b.0));

    if let Some(hit) = grown.into_iter().next() {
        return Some(hit);
    }

    let mut vanished: Vec<(&str, InviteUse)> = before
        .iter()
        .filter(|(code, _)| !after.contains_key(code.as_str()))
        .map(|(code, invite)| (code.as_str(), *invite))
        .collect();
    vanished.sort_by(|a, b| a.0.cmp(b.0));

    if vanished.len() == 1 {
        vanished.into_iter().next()
    } else {
        None
    }
}
