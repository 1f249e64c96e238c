//! Release resolver
//!
//! Classifies the applications listed under a prefix into active, inactive,
//! older and interim roles. The classification is a pure function of the
//! listing; nothing about previous runs is remembered.

use cutover_models::{ApplicationSummary, NamingStrategy};

use crate::naming::{self, ReleaseName};

/// How the active application is recognised
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActiveSelector {
    /// The member holding any of these production routes
    Routes(Vec<String>),
    /// The canonical member, else the newest member with instances
    LatestRunning,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    #[error("Invalid infra state: more than one application holds the production routes: {}", .0.join(", "))]
    AmbiguousActive(Vec<String>),

    #[error("Invalid infra state: more than one inactive candidate: {}", .0.join(", "))]
    AmbiguousInactive(Vec<String>),
}

/// Roles within the applications sharing a prefix
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReleaseSet {
    pub prefix: String,
    pub active: Option<ApplicationSummary>,
    pub inactive: Option<ApplicationSummary>,
    /// Oldest first
    pub older: Vec<ApplicationSummary>,
    pub interim: Vec<ApplicationSummary>,
    /// Highest numeric revision among all members
    pub max_revision: Option<u32>,
}

impl ReleaseSet {
    pub fn is_first_deployment(&self) -> bool {
        self.members().next().is_none()
    }

    pub fn next_revision(&self) -> u32 {
        naming::next_revision(self.max_revision)
    }

    pub fn members(&self) -> impl Iterator<Item = &ApplicationSummary> {
        self.active
            .iter()
            .chain(self.inactive.iter())
            .chain(self.older.iter())
            .chain(self.interim.iter())
    }

    pub fn find_by_guid(&self, guid: &str) -> Option<&ApplicationSummary> {
        self.members().find(|app| app.guid == guid)
    }

    pub fn find_by_name(&self, name: &str) -> Option<&ApplicationSummary> {
        self.members().find(|app| app.name == name)
    }
}

struct Member<'a> {
    kind: ReleaseName,
    app: &'a ApplicationSummary,
    position: usize,
}

/// Resolve `releases` into roles for `prefix`.
pub fn resolve(
    prefix: &str,
    releases: &[ApplicationSummary],
    selector: &ActiveSelector,
    strategy: NamingStrategy,
) -> Result<ReleaseSet, ResolveError> {
    let members: Vec<Member<'_>> = releases
        .iter()
        .enumerate()
        .filter_map(|(position, app)| {
            naming::parse_release_name(prefix, &app.name).map(|kind| Member {
                kind,
                app,
                position,
            })
        })
        .collect();

    let max_revision = members
        .iter()
        .filter_map(|m| match m.kind {
            ReleaseName::Revision(n) => Some(n),
            _ => None,
        })
        .max();

    let active = match selector {
        ActiveSelector::Routes(routes) if !routes.is_empty() => route_holder(&members, routes)?,
        _ => latest_running(&members, strategy)?,
    };

    let candidates: Vec<&Member<'_>> = members
        .iter()
        .filter(|m| Some(m.position) != active && m.kind != ReleaseName::Interim)
        .collect();
    let inactive = match candidates.iter().map(|m| m.kind.rank()).max() {
        Some(top) => {
            let at_top: Vec<&&Member<'_>> =
                candidates.iter().filter(|m| m.kind.rank() == top).collect();
            if at_top.len() > 1 {
                return Err(ResolveError::AmbiguousInactive(
                    at_top.iter().map(|m| m.app.name.clone()).collect(),
                ));
            }
            at_top.first().map(|m| m.position)
        }
        None => None,
    };

    let mut older: Vec<&Member<'_>> = candidates
        .into_iter()
        .filter(|m| Some(m.position) != inactive)
        .collect();
    older.sort_by_key(|m| (m.kind.rank(), m.position));

    let pick = |position: Option<usize>| {
        position.and_then(|p| members.iter().find(|m| m.position == p).map(|m| m.app.clone()))
    };

    Ok(ReleaseSet {
        prefix: prefix.to_string(),
        active: pick(active),
        inactive: pick(inactive),
        older: older.into_iter().map(|m| m.app.clone()).collect(),
        interim: members
            .iter()
            .filter(|m| m.kind == ReleaseName::Interim && Some(m.position) != active)
            .map(|m| m.app.clone())
            .collect(),
        max_revision,
    })
}

fn route_holder(members: &[Member<'_>], routes: &[String]) -> Result<Option<usize>, ResolveError> {
    let holders: Vec<&Member<'_>> = members.iter().filter(|m| m.app.has_any_route(routes)).collect();
    if holders.len() > 1 {
        return Err(ResolveError::AmbiguousActive(
            holders.iter().map(|m| m.app.name.clone()).collect(),
        ));
    }
    Ok(holders.first().map(|m| m.position))
}

fn latest_running(
    members: &[Member<'_>],
    strategy: NamingStrategy,
) -> Result<Option<usize>, ResolveError> {
    if strategy == NamingStrategy::NonVersioned {
        if let Some(canonical) = members.iter().find(|m| m.kind == ReleaseName::Canonical) {
            return Ok(Some(canonical.position));
        }
    }

    let running: Vec<&Member<'_>> = members
        .iter()
        .filter(|m| matches!(m.kind, ReleaseName::Canonical | ReleaseName::Revision(_)))
        .filter(|m| m.app.instance_count > 0)
        .collect();
    let Some(top) = running.iter().map(|m| m.kind.rank()).max() else {
        return Ok(None);
    };

    let newest: Vec<&&Member<'_>> = running.iter().filter(|m| m.kind.rank() == top).collect();
    if newest.len() > 1 {
        return Err(ResolveError::AmbiguousActive(
            newest.iter().map(|m| m.app.name.clone()).collect(),
        ));
    }
    Ok(newest.first().map(|m| m.position))
}
