//! Collaborative building projects.
//!
//! Joint action rules: a proposer starts a project; on each day, if every
//! required role contributed, progress advances by 1.0; if only some did,
//! by 0.5. Three consecutive days without a contribution abandon the
//! project. Reaching the goal completes it and hands the contributor list
//! to the asset registry.

use std::collections::{BTreeMap, BTreeSet};

use rust_decimal::Decimal;
use tracing::{debug, info};

use aicity_types::{
    AgentId, AssetKind, Project, ProjectId, ProjectStatus, Role, TilePos,
};

use crate::WorldError;

/// What each project type requires and how long it takes.
#[derive(Debug, Clone, Copy)]
pub struct ProjectSpec {
    pub kind: AssetKind,
    pub display_name: &'static str,
    /// (role, count) pairs that must all contribute on a day for full
    /// progress.
    pub required_roles: &'static [(Role, u8)],
    pub goal_days: u32,
    /// Whether the completed asset occupies a tile.
    pub has_footprint: bool,
}

/// The build plan for an asset kind. Single source of truth for goals
/// and required collaborators.
pub const fn spec_for(kind: AssetKind) -> ProjectSpec {
    match kind {
        AssetKind::Watchtower => ProjectSpec {
            kind,
            display_name: "Watchtower",
            required_roles: &[(Role::Builder, 2)],
            goal_days: 4,
            has_footprint: true,
        },
        AssetKind::Hospital => ProjectSpec {
            kind,
            display_name: "Hospital",
            required_roles: &[(Role::Builder, 1), (Role::Healer, 1)],
            goal_days: 5,
            has_footprint: true,
        },
        AssetKind::MarketStall => ProjectSpec {
            kind,
            display_name: "Market Stall",
            required_roles: &[(Role::Merchant, 1), (Role::Builder, 1)],
            goal_days: 3,
            has_footprint: true,
        },
        AssetKind::School => ProjectSpec {
            kind,
            display_name: "School",
            required_roles: &[(Role::Teacher, 1), (Role::Builder, 2)],
            goal_days: 4,
            has_footprint: true,
        },
        AssetKind::Road => ProjectSpec {
            kind,
            display_name: "Road",
            required_roles: &[(Role::Explorer, 1), (Role::Builder, 1)],
            goal_days: 2,
            has_footprint: false,
        },
        AssetKind::Archive => ProjectSpec {
            kind,
            display_name: "Archive",
            required_roles: &[(Role::Messenger, 1), (Role::Teacher, 1)],
            goal_days: 3,
            has_footprint: true,
        },
    }
}

/// Build priority when the vault funds public goods: easiest and most
/// impactful first.
pub const BUILD_PRIORITY: [AssetKind; 6] = [
    AssetKind::Road,
    AssetKind::MarketStall,
    AssetKind::Watchtower,
    AssetKind::School,
    AssetKind::Archive,
    AssetKind::Hospital,
];

/// A completed project, ready for asset creation.
#[derive(Debug, Clone)]
pub struct Completion {
    pub project: ProjectId,
    pub kind: AssetKind,
    pub name: String,
    /// Contributors with at least one full day.
    pub builders: Vec<AgentId>,
    pub tile: Option<TilePos>,
}

/// All projects and the day's pending contributions.
#[derive(Debug, Clone, Default)]
pub struct ProjectBoard {
    projects: Vec<Project>,
    /// (project, agent, role) contributions noted today; consumed by
    /// [`ProjectBoard::advance_day`].
    today: Vec<(ProjectId, AgentId, Role)>,
    /// Days without contribution before abandonment.
    abandon_days: u32,
}

impl ProjectBoard {
    pub fn new(abandon_days: u32) -> Self {
        Self {
            projects: Vec::new(),
            today: Vec::new(),
            abandon_days,
        }
    }

    pub fn from_projects(abandon_days: u32, projects: Vec<Project>) -> Self {
        Self {
            projects,
            today: Vec::new(),
            abandon_days,
        }
    }

    pub fn all(&self) -> &[Project] {
        &self.projects
    }

    pub fn get(&self, id: ProjectId) -> Option<&Project> {
        self.projects.iter().find(|p| p.id == id)
    }

    /// Active projects, oldest first.
    pub fn active(&self) -> Vec<&Project> {
        self.projects
            .iter()
            .filter(|p| p.status == ProjectStatus::Active)
            .collect()
    }

    /// The active project matching a kind, if any.
    pub fn active_of_kind(&self, kind: AssetKind) -> Option<&Project> {
        self.active().into_iter().find(|p| p.kind == kind)
    }

    /// The highest-priority active project under [`BUILD_PRIORITY`].
    pub fn highest_priority_active(&self) -> Option<&Project> {
        BUILD_PRIORITY
            .iter()
            .find_map(|kind| self.active_of_kind(*kind))
    }

    /// An active project this role can usefully contribute to.
    pub fn active_needing_role(&self, role: Role) -> Option<&Project> {
        self.active().into_iter().find(|p| {
            spec_for(p.kind)
                .required_roles
                .iter()
                .any(|(r, _)| *r == role)
        })
    }

    /// Start a new project. One project (or standing asset) per kind at a
    /// time; the caller checks the asset side.
    pub fn start(
        &mut self,
        day: u32,
        kind: AssetKind,
        proposer: AgentId,
        target_tile: Option<TilePos>,
    ) -> Result<ProjectId, WorldError> {
        if self.active_of_kind(kind).is_some() {
            return Err(WorldError::AlreadyExists(kind));
        }
        let spec = spec_for(kind);
        let project = Project {
            id: ProjectId::new(),
            name: spec.display_name.to_owned(),
            kind,
            proposer,
            goal_builder_days: Decimal::from(spec.goal_days),
            contributors: BTreeMap::new(),
            progress: Decimal::ZERO,
            status: ProjectStatus::Active,
            day_started: day,
            last_contribution_day: day,
            day_completed: None,
            target_tile,
        };
        let id = project.id;
        info!(project = %id, kind = ?kind, proposer = %proposer, day, "project started");
        self.projects.push(project);
        Ok(id)
    }

    /// Note that an agent worked on a project today. Progress is applied
    /// at [`ProjectBoard::advance_day`].
    pub fn note_contribution(
        &mut self,
        id: ProjectId,
        agent: AgentId,
        role: Role,
    ) -> Result<(), WorldError> {
        let project = self
            .projects
            .iter()
            .find(|p| p.id == id)
            .ok_or(WorldError::UnknownProject(id))?;
        if project.status != ProjectStatus::Active {
            return Err(WorldError::NotActive(id));
        }
        if !self
            .today
            .iter()
            .any(|(p, a, _)| *p == id && *a == agent)
        {
            self.today.push((id, agent, role));
        }
        Ok(())
    }

    /// Agents who contributed to a project today (for bond updates).
    pub fn todays_contributors(&self, id: ProjectId) -> Vec<AgentId> {
        self.today
            .iter()
            .filter(|(p, ..)| *p == id)
            .map(|(_, a, _)| *a)
            .collect()
    }

    /// Apply the day's contributions: full-crew days advance 1.0, partial
    /// days 0.5, idle streaks abandon. Returns completions.
    pub fn advance_day(&mut self, day: u32) -> Vec<Completion> {
        let today = std::mem::take(&mut self.today);
        let mut completions = Vec::new();

        for project in &mut self.projects {
            if project.status != ProjectStatus::Active {
                continue;
            }
            let contributions: Vec<&(ProjectId, AgentId, Role)> =
                today.iter().filter(|(p, ..)| *p == project.id).collect();

            if contributions.is_empty() {
                if project.progress < project.goal_builder_days
                    && day.saturating_sub(project.last_contribution_day) >= self.abandon_days
                {
                    project.status = ProjectStatus::Abandoned;
                    info!(project = %project.id, day, "project abandoned");
                    continue;
                }
            } else {
                let spec = spec_for(project.kind);
                let step = if full_crew(&spec, &contributions) {
                    Decimal::ONE
                } else {
                    Decimal::new(5, 1)
                };
                project.progress += step;
                project.last_contribution_day = day;
                for (_, agent, _) in &contributions {
                    *project.contributors.entry(*agent).or_insert(Decimal::ZERO) += step;
                }
                debug!(project = %project.id, %step, progress = %project.progress, "progress");
            }

            // Vault-funded progress from the public-goods policy counts
            // toward completion too.
            if project.progress >= project.goal_builder_days {
                project.status = ProjectStatus::Completed;
                project.day_completed = Some(day);
                let builders: Vec<AgentId> = project
                    .contributors
                    .iter()
                    .filter(|(_, days)| **days >= Decimal::ONE)
                    .map(|(id, _)| *id)
                    .collect();
                info!(project = %project.id, kind = ?project.kind, day, "project completed");
                completions.push(Completion {
                    project: project.id,
                    kind: project.kind,
                    name: project.name.clone(),
                    builders,
                    tile: project.target_tile,
                });
            }
        }

        completions
    }

    /// Fund one day of full progress from the vault (public-goods policy).
    pub fn fund_day(&mut self, id: ProjectId, day: u32) -> Result<(), WorldError> {
        let project = self
            .projects
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(WorldError::UnknownProject(id))?;
        if project.status != ProjectStatus::Active {
            return Err(WorldError::NotActive(id));
        }
        project.progress += Decimal::ONE;
        project.last_contribution_day = day;
        Ok(())
    }

    /// Projects touched on `day`, for the persistence delta.
    pub fn changed_on(&self, day: u32) -> Vec<&Project> {
        self.projects
            .iter()
            .filter(|p| {
                p.day_started == day
                    || p.last_contribution_day == day
                    || p.day_completed == Some(day)
            })
            .collect()
    }
}

/// Whether every required role slot is covered by today's contributors.
fn full_crew(spec: &ProjectSpec, contributions: &[&(ProjectId, AgentId, Role)]) -> bool {
    spec.required_roles.iter().all(|(role, count)| {
        let distinct: BTreeSet<AgentId> = contributions
            .iter()
            .filter(|(_, _, r)| r == role)
            .map(|(_, a, _)| *a)
            .collect();
        distinct.len() >= *count as usize
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn full_crew_advances_one_day() {
        let mut board = ProjectBoard::new(3);
        let builder = AgentId::new();
        let healer = AgentId::new();
        let id = board.start(1, AssetKind::Hospital, builder, None).unwrap();
        board.note_contribution(id, builder, Role::Builder).unwrap();
        board.note_contribution(id, healer, Role::Healer).unwrap();
        let done = board.advance_day(1);
        assert!(done.is_empty());
        assert_eq!(board.get(id).unwrap().progress, Decimal::ONE);
    }

    #[test]
    fn partial_crew_advances_half() {
        let mut board = ProjectBoard::new(3);
        let builder = AgentId::new();
        let id = board.start(1, AssetKind::Hospital, builder, None).unwrap();
        board.note_contribution(id, builder, Role::Builder).unwrap();
        let _ = board.advance_day(1);
        assert_eq!(board.get(id).unwrap().progress, Decimal::new(5, 1));
    }

    #[test]
    fn completion_fires_at_the_goal() {
        let mut board = ProjectBoard::new(3);
        let builder = AgentId::new();
        let healer = AgentId::new();
        let id = board.start(1, AssetKind::Hospital, builder, None).unwrap();
        for day in 1..=5 {
            board.note_contribution(id, builder, Role::Builder).unwrap();
            board.note_contribution(id, healer, Role::Healer).unwrap();
            let done = board.advance_day(day);
            if day < 5 {
                assert!(done.is_empty());
            } else {
                assert_eq!(done.len(), 1);
                assert_eq!(done[0].kind, AssetKind::Hospital);
                // Both crossed one full day of contribution.
                assert_eq!(done[0].builders.len(), 2);
            }
        }
        assert_eq!(board.get(id).unwrap().status, ProjectStatus::Completed);
    }

    #[test]
    fn idle_projects_are_abandoned() {
        let mut board = ProjectBoard::new(3);
        let builder = AgentId::new();
        let id = board.start(1, AssetKind::Road, builder, None).unwrap();
        for day in 2..=4 {
            let _ = board.advance_day(day);
        }
        assert_eq!(board.get(id).unwrap().status, ProjectStatus::Abandoned);
    }

    #[test]
    fn one_active_project_per_kind() {
        let mut board = ProjectBoard::new(3);
        let a = AgentId::new();
        let _ = board.start(1, AssetKind::Road, a, None).unwrap();
        assert!(matches!(
            board.start(1, AssetKind::Road, a, None),
            Err(WorldError::AlreadyExists(_))
        ));
    }

    #[test]
    fn priority_prefers_roads() {
        let mut board = ProjectBoard::new(3);
        let a = AgentId::new();
        let _ = board.start(1, AssetKind::Hospital, a, None).unwrap();
        let road = board.start(1, AssetKind::Road, a, None).unwrap();
        assert_eq!(board.highest_priority_active().map(|p| p.id), Some(road));
    }

    #[test]
    fn funded_progress_completes_at_the_next_advance() {
        let mut board = ProjectBoard::new(3);
        let a = AgentId::new();
        let id = board.start(1, AssetKind::Road, a, None).unwrap();
        board.fund_day(id, 2).unwrap();
        board.fund_day(id, 3).unwrap();
        assert_eq!(board.get(id).unwrap().progress, Decimal::from(2));
        // Road goal is 2: the next daily pass completes it without any
        // contributor that day.
        let done = board.advance_day(4);
        assert_eq!(done.len(), 1);
        assert_eq!(board.get(id).unwrap().status, ProjectStatus::Completed);
    }
}
