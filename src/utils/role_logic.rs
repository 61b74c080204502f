//! Pure functions for verification role logic (Discord-agnostic)

/// Represents an action to take on a user's roles
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoleAction {
    Add,
    Remove,
    NoAction,
}

/// Determine what role action should be taken for a member
pub fn determine_role_action(should_have_role: bool, has_role: bool) -> RoleAction {
    match (should_have_role, has_role) {
        (true, false) => RoleAction::Add,
        (false, true) => RoleAction::Remove,
        _ => RoleAction::NoAction,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_determine_role_action() {
        assert_eq!(determine_role_action(true, false), RoleAction::Add);
        assert_eq!(determine_role_action(false, true), RoleAction::Remove);
        assert_eq!(determine_role_action(true, true), RoleAction::NoAction);
        assert_eq!(determine_role_action(false, false), RoleAction::NoAction);
    }
}
