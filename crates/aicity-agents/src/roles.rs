//! The static role capability table.
//!
//! One descriptor per role: allowed actions, the fallback default, and the
//! base earn range. Behaviors and the decision facade both read from here,
//! so role dispatch never happens over strings.

use aicity_types::{ActionKind, Role, RoleCapabilities};

/// Capability descriptor for a role.
pub const fn capabilities(role: Role) -> RoleCapabilities {
    match role {
        Role::Builder => RoleCapabilities {
            role,
            allowed: &[
                ActionKind::Work,
                ActionKind::StartProject,
                ActionKind::WorkOnProject,
                ActionKind::Report,
                ActionKind::Rest,
            ],
            default_action: ActionKind::Work,
            earn_min: 50,
            earn_max: 180,
            project_collaborator: None,
        },
        Role::Explorer => RoleCapabilities {
            role,
            allowed: &[
                ActionKind::Explore,
                ActionKind::WorkOnProject,
                ActionKind::Report,
                ActionKind::Rest,
            ],
            default_action: ActionKind::Explore,
            earn_min: 60,
            earn_max: 200,
            project_collaborator: None,
        },
        Role::Merchant => RoleCapabilities {
            role,
            allowed: &[
                ActionKind::Trade,
                ActionKind::StartProject,
                ActionKind::WorkOnProject,
                ActionKind::Report,
                ActionKind::Rest,
            ],
            default_action: ActionKind::Trade,
            earn_min: 40,
            earn_max: 160,
            project_collaborator: None,
        },
        Role::Police => RoleCapabilities {
            role,
            allowed: &[ActionKind::Patrol, ActionKind::Rest],
            default_action: ActionKind::Patrol,
            earn_min: 60,
            earn_max: 150,
            project_collaborator: None,
        },
        Role::Teacher => RoleCapabilities {
            role,
            allowed: &[
                ActionKind::Teach,
                ActionKind::WorkOnProject,
                ActionKind::Report,
                ActionKind::Rest,
            ],
            default_action: ActionKind::Teach,
            earn_min: 40,
            earn_max: 120,
            project_collaborator: None,
        },
        Role::Healer => RoleCapabilities {
            role,
            allowed: &[
                ActionKind::Heal,
                ActionKind::WorkOnProject,
                ActionKind::Report,
                ActionKind::Rest,
            ],
            default_action: ActionKind::Heal,
            earn_min: 40,
            earn_max: 120,
            project_collaborator: None,
        },
        Role::Messenger => RoleCapabilities {
            role,
            allowed: &[
                ActionKind::DeliverNews,
                ActionKind::WorkOnProject,
                ActionKind::Report,
                ActionKind::Rest,
            ],
            default_action: ActionKind::DeliverNews,
            earn_min: 30,
            earn_max: 100,
            project_collaborator: None,
        },
        Role::Lawyer => RoleCapabilities {
            role,
            allowed: &[ActionKind::Defend, ActionKind::Report, ActionKind::Rest],
            default_action: ActionKind::Defend,
            earn_min: 0,
            earn_max: 40,
            project_collaborator: None,
        },
        Role::Thief => RoleCapabilities {
            role,
            allowed: &[ActionKind::Steal, ActionKind::Lurk, ActionKind::Rest],
            default_action: ActionKind::Lurk,
            earn_min: 0,
            earn_max: 80,
            project_collaborator: None,
        },
        Role::Newborn => RoleCapabilities {
            role,
            allowed: &[ActionKind::Learn, ActionKind::Rest],
            default_action: ActionKind::Learn,
            earn_min: 0,
            earn_max: 50,
            project_collaborator: Some(Role::Teacher),
        },
        Role::GangLeader => RoleCapabilities {
            role,
            allowed: &[
                ActionKind::Recruit,
                ActionKind::Steal,
                ActionKind::Lurk,
                ActionKind::Rest,
            ],
            default_action: ActionKind::Lurk,
            earn_min: 0,
            earn_max: 80,
            project_collaborator: None,
        },
        Role::Blackmailer => RoleCapabilities {
            role,
            allowed: &[ActionKind::Blackmail, ActionKind::Lurk, ActionKind::Rest],
            default_action: ActionKind::Lurk,
            earn_min: 0,
            earn_max: 60,
            project_collaborator: None,
        },
        Role::Saboteur => RoleCapabilities {
            role,
            allowed: &[ActionKind::DestroyAsset, ActionKind::Lurk, ActionKind::Rest],
            default_action: ActionKind::Lurk,
            earn_min: 0,
            earn_max: 60,
            project_collaborator: None,
        },
    }
}

/// Roles a graduating newborn may choose from.
///
/// Criminal paths are reachable only through lived experience, not handed
/// out at graduation.
pub const GRADUATION_ALLOW_LIST: [Role; 8] = [
    Role::Builder,
    Role::Explorer,
    Role::Merchant,
    Role::Teacher,
    Role::Healer,
    Role::Messenger,
    Role::Lawyer,
    Role::Thief,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_role_allows_its_default() {
        for role in Role::ALL {
            let caps = capabilities(role);
            assert!(
                caps.allowed.contains(&caps.default_action),
                "{role:?} default not in allowed set"
            );
        }
    }

    #[test]
    fn earn_ranges_are_ordered() {
        for role in Role::ALL {
            let caps = capabilities(role);
            assert!(caps.earn_min <= caps.earn_max, "{role:?} range inverted");
        }
    }

    #[test]
    fn graduation_list_excludes_newborn() {
        assert!(!GRADUATION_ALLOW_LIST.contains(&Role::Newborn));
        assert!(!GRADUATION_ALLOW_LIST.contains(&Role::GangLeader));
    }
}
