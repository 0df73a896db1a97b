//! Records returned by the Asana API.
//!
//! Only the fields the dashboard reads are typed.  Everything else the API
//! sends is kept in `extra` so the records are republished to the host
//! unmodified.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workspace {
    pub gid: String,
    pub name: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Workspace {
    pub fn new(gid: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            gid: gid.into(),
            name: name.into(),
            extra: Map::new(),
        }
    }
}

/// Compact user record, as listed per workspace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRef {
    pub gid: String,
    #[serde(default)]
    pub name: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl UserRef {
    pub fn new(gid: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            gid: gid.into(),
            name: name.into(),
            extra: Map::new(),
        }
    }
}

/// Profile picture URLs.  Asana sends `photo: null` for users without one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Photo {
    pub image_36x36: Option<String>,
    pub image_128x128: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Full user profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserDetail {
    pub gid: String,
    #[serde(default)]
    pub name: String,
    pub email: Option<String>,
    pub photo: Option<Photo>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl UserDetail {
    pub fn new(gid: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            gid: gid.into(),
            name: name.into(),
            email: None,
            photo: None,
            extra: Map::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectRef {
    pub gid: String,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub gid: String,
    #[serde(default)]
    pub name: String,
    pub assignee_status: Option<String>,
    #[serde(default)]
    pub completed: bool,
    pub due_on: Option<NaiveDate>,
    #[serde(default)]
    pub projects: Vec<ProjectRef>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Task {
    pub fn new(gid: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            gid: gid.into(),
            name: name.into(),
            assignee_status: None,
            completed: false,
            due_on: None,
            projects: Vec::new(),
            extra: Map::new(),
        }
    }
}

/// A user profile together with the tasks assigned to them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserWithTasks {
    #[serde(flatten)]
    pub user: UserDetail,
    pub tasks: Vec<Task>,
}
