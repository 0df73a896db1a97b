use serde::Serialize;

use crate::asana::{Task, UserDetail, UserWithTasks, Workspace};

/// The records published by one completed fetch cycle.
///
/// Each cycle's set replaces the previous one outright; nothing is merged.
/// Serializes as a plain array of records.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ResultSet {
    Workspaces(Vec<Workspace>),
    Users(Vec<UserDetail>),
    Tasks(Vec<Task>),
    UsersWithTasks(Vec<UserWithTasks>),
}

impl ResultSet {
    pub fn len(&self) -> usize {
        match self {
            Self::Workspaces(v) => v.len(),
            Self::Users(v) => v.len(),
            Self::Tasks(v) => v.len(),
            Self::UsersWithTasks(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Record ids in published order.
    pub fn ids(&self) -> Vec<&str> {
        match self {
            Self::Workspaces(v) => v.iter().map(|w| w.gid.as_str()).collect(),
            Self::Users(v) => v.iter().map(|u| u.gid.as_str()).collect(),
            Self::Tasks(v) => v.iter().map(|t| t.gid.as_str()).collect(),
            Self::UsersWithTasks(v) => v.iter().map(|u| u.user.gid.as_str()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_as_plain_array() {
        let set = ResultSet::Workspaces(vec![Workspace::new("1", "A"), Workspace::new("2", "B")]);
        let value = serde_json::to_value(&set).unwrap();

        assert!(value.is_array());
        assert_eq!(value[1]["name"], "B");
    }

    #[test]
    fn ids_follow_published_order() {
        let set = ResultSet::Tasks(vec![Task::new("b", "B"), Task::new("a", "A")]);
        assert_eq!(set.ids(), vec!["b", "a"]);
        assert_eq!(set.len(), 2);
        assert!(!set.is_empty());
    }
}
