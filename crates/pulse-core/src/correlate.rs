use crate::event::{Event, MetaValue};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const PUSH_BATCH_WINDOW_SECS: i64 = 5 * 60;
const DEPLOY_LIFECYCLE_WINDOW_SECS: i64 = 30 * 60;
const PR_UPDATES_WINDOW_SECS: i64 = 10 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupType {
    PushBatch,
    DeployLifecycle,
    PrUpdates,
    Single,
}

/// A display-level cluster of related raw events. Derived on demand from a
/// snapshot of events, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventGroup {
    pub id: String,
    #[serde(rename = "type")]
    pub group_type: GroupType,
    pub summary_title: String,
    /// Member events, oldest first.
    pub events: Vec<Event>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub group_metadata: BTreeMap<String, MetaValue>,
}

/// Whether two events belong to the same logical unit. Absence of a
/// correlation field (repo, branch, project, PR number) never matches.
pub fn related(first: &Event, second: &Event) -> bool {
    let delta = (first.created_at - second.created_at).num_seconds().abs();

    if first.event_type == "github.push" && second.event_type == "github.push" {
        return same_meta(first, second, "repo")
            && same_meta(first, second, "branch")
            && delta <= PUSH_BATCH_WINDOW_SECS;
    }

    if is_deploy_family(first) && is_deploy_family(second) {
        let project = |event: &Event| event.meta_ident(&["project", "project_name"]);
        return match (project(first), project(second)) {
            (Some(a), Some(b)) => a == b && delta <= DEPLOY_LIFECYCLE_WINDOW_SECS,
            _ => false,
        };
    }

    if first.event_type == "github.pr" && second.event_type == "github.pr" {
        let number = |event: &Event| event.meta_ident(&["pr_number", "number"]);
        return match (number(first), number(second)) {
            (Some(a), Some(b)) => {
                a == b && same_meta(first, second, "repo") && delta <= PR_UPDATES_WINDOW_SECS
            }
            _ => false,
        };
    }

    false
}

/// Cluster a snapshot of events into connected components under `related`.
///
/// Membership is transitive: an event joins a group when it relates to any
/// current member, not only the anchor, so a chain of pushes each within the
/// window of its neighbor collapses into one group even when its ends are
/// further apart than the nominal threshold.
pub fn group(events: &[Event]) -> Vec<EventGroup> {
    let mut order: Vec<usize> = (0..events.len()).collect();
    order.sort_by(|a, b| events[*b].created_at.cmp(&events[*a].created_at));

    let mut visited = vec![false; events.len()];
    let mut groups = Vec::with_capacity(events.len());

    for &anchor in &order {
        if visited[anchor] {
            continue;
        }
        visited[anchor] = true;
        let mut members = vec![anchor];

        // Grow to a fixpoint so the component is independent of scan order.
        let mut grew = true;
        while grew {
            grew = false;
            for &candidate in &order {
                if visited[candidate] {
                    continue;
                }
                if members
                    .iter()
                    .any(|&member| related(&events[member], &events[candidate]))
                {
                    visited[candidate] = true;
                    members.push(candidate);
                    grew = true;
                }
            }
        }

        members.sort_by(|a, b| events[*a].created_at.cmp(&events[*b].created_at));
        let members: Vec<Event> = members.iter().map(|&index| events[index].clone()).collect();
        groups.push(build_group(&events[anchor].id, members));
    }

    groups.sort_by(|a, b| b.end_time.cmp(&a.end_time));
    groups
}

fn build_group(anchor_id: &str, events: Vec<Event>) -> EventGroup {
    let group_type = classify(&events);
    let summary_title = summary_title(group_type, &events);
    let group_metadata = group_metadata(group_type, &events);
    let start_time = events[0].created_at;
    let end_time = events[events.len() - 1].created_at;
    EventGroup {
        id: format!("group-{anchor_id}"),
        group_type,
        summary_title,
        events,
        start_time,
        end_time,
        group_metadata,
    }
}

fn classify(events: &[Event]) -> GroupType {
    if events.len() == 1 {
        return GroupType::Single;
    }
    let first = &events[0];
    if first.event_type == "github.push" {
        GroupType::PushBatch
    } else if first.event_type == "github.pr" {
        GroupType::PrUpdates
    } else if is_deploy_family(first) {
        GroupType::DeployLifecycle
    } else {
        GroupType::Single
    }
}

fn summary_title(group_type: GroupType, events: &[Event]) -> String {
    let first = &events[0];
    let last = &events[events.len() - 1];
    match group_type {
        GroupType::PushBatch => {
            let repo = first.meta_str("repo").unwrap_or("repository");
            let branch = first
                .meta_str("branch")
                .map(strip_ref_prefix)
                .unwrap_or("branch");
            format!("{} pushes to {repo}/{branch}", events.len())
        }
        GroupType::DeployLifecycle => {
            let project = first
                .meta_ident(&["project", "project_name"])
                .unwrap_or_else(|| "project".to_string());
            let status = last.meta_str("status").unwrap_or("deploying");
            format!("{project} deployment: {status}")
        }
        GroupType::PrUpdates => {
            let number = first
                .meta_ident(&["pr_number", "number"])
                .unwrap_or_default();
            let repo = first.meta_str("repo").unwrap_or("repository");
            format!("PR #{number} - {} updates in {repo}", events.len())
        }
        GroupType::Single => first.title.clone(),
    }
}

fn group_metadata(group_type: GroupType, events: &[Event]) -> BTreeMap<String, MetaValue> {
    let first = &events[0];
    let last = &events[events.len() - 1];
    let mut metadata = BTreeMap::new();
    match group_type {
        GroupType::PushBatch => {
            if let Some(repo) = first.meta_str("repo") {
                metadata.insert("repo".to_string(), MetaValue::Str(repo.to_string()));
            }
            if let Some(branch) = first.meta_str("branch") {
                metadata.insert(
                    "branch".to_string(),
                    MetaValue::Str(strip_ref_prefix(branch).to_string()),
                );
            }
        }
        GroupType::DeployLifecycle => {
            if let Some(project) = first.meta_ident(&["project", "project_name"]) {
                metadata.insert("project".to_string(), MetaValue::Str(project));
            }
            if let Some(status) = last.meta_str("status") {
                metadata.insert("status".to_string(), MetaValue::Str(status.to_string()));
            }
        }
        GroupType::PrUpdates => {
            if let Some(repo) = first.meta_str("repo") {
                metadata.insert("repo".to_string(), MetaValue::Str(repo.to_string()));
            }
            if let Some(number) = first.meta_ident(&["pr_number", "number"]) {
                metadata.insert("pr_number".to_string(), MetaValue::Str(number));
            }
        }
        GroupType::Single => {}
    }
    metadata
}

fn is_deploy_family(event: &Event) -> bool {
    event.event_type.starts_with("vercel.")
        || event.event_type.starts_with("railway.")
        || event.event_type.contains("deploy")
}

fn same_meta(first: &Event, second: &Event, key: &str) -> bool {
    match (first.meta_str(key), second.meta_str(key)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

fn strip_ref_prefix(branch: &str) -> &str {
    branch.strip_prefix("refs/heads/").unwrap_or(branch)
}
