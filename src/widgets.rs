//! HTML fragments for dashboard widgets.
//!
//! Widgets consume a published [`ResultSet`] and produce markup; they never
//! talk to Asana themselves.  Templates are rendered with [`handlebars`],
//! which HTML-escapes every interpolated value.

use chrono::NaiveDate;
use handlebars::{Handlebars, RenderError, TemplateError};
use serde_json::json;

use crate::asana::{Task, UserDetail, UserWithTasks};
use crate::source::ResultSet;

/// Image shown for users without a profile photo.
pub const PLACEHOLDER_IMAGE: &str = "img/asana-avatar-placeholder.png";

const USER_PROFILES: &str = r#"<div class="asana-user-profiles">{{#each users}}<div class="asana-user"><a href="mailto:{{email}}"><img title="{{name}}" src="{{image}}"></a></div>{{/each}}</div>"#;

const USER_PROFILE: &str = r#"<div class="asana-user-profile"><a class="asana-user-profile-header" href="mailto:{{email}}"><img title="{{name}}" src="{{image}}"><strong>{{name}}</strong><br><em>{{email}}</em></a><h4>Tasks Scheduled for Today</h4><ul>{{#each tasks}}<li>{{this}}</li>{{else}}<li class="empty">Nothing due today</li>{{/each}}</ul></div>"#;

const NAME_LIST: &str = r#"<ul class="asana-{{kind}}">{{#each names}}<li>{{this}}</li>{{/each}}</ul>"#;

/// Renders widget markup from published result sets.
pub struct WidgetRenderer {
    templates: Handlebars<'static>,
}

impl WidgetRenderer {
    pub fn new() -> Result<Self, TemplateError> {
        let mut templates = Handlebars::new();
        templates.set_strict_mode(true);
        templates.register_template_string("user_profiles", USER_PROFILES)?;
        templates.register_template_string("user_profile", USER_PROFILE)?;
        templates.register_template_string("name_list", NAME_LIST)?;
        Ok(Self { templates })
    }

    /// A row of avatar links, one per user.
    pub fn user_profiles(&self, users: &[UserDetail]) -> Result<String, RenderError> {
        let users: Vec<_> = users
            .iter()
            .map(|u| {
                json!({
                    "name": u.name,
                    "email": u.email.as_deref().unwrap_or_default(),
                    "image": photo_url(u, Size::Large),
                })
            })
            .collect();
        self.templates
            .render("user_profiles", &json!({ "users": users }))
    }

    /// One user's header plus the open tasks scheduled for `today`.
    pub fn user_profile(&self, entry: &UserWithTasks, today: NaiveDate) -> Result<String, RenderError> {
        let user = &entry.user;
        let due: Vec<&str> = scheduled_for(&entry.tasks, today)
            .map(|t| t.name.as_str())
            .collect();
        self.templates.render(
            "user_profile",
            &json!({
                "name": user.name,
                "email": user.email.as_deref().unwrap_or_default(),
                "image": photo_url(user, Size::Small),
                "tasks": due,
            }),
        )
    }

    /// Default markup for any result set.
    pub fn render(&self, results: &ResultSet, today: NaiveDate) -> Result<String, RenderError> {
        match results {
            ResultSet::Users(users) => self.user_profiles(users),
            ResultSet::UsersWithTasks(entries) => entries
                .iter()
                .map(|e| self.user_profile(e, today))
                .collect::<Result<Vec<_>, _>>()
                .map(|parts| parts.concat()),
            ResultSet::Workspaces(workspaces) => {
                let names: Vec<_> = workspaces.iter().map(|w| w.name.as_str()).collect();
                self.name_list("workspaces", &names)
            }
            ResultSet::Tasks(tasks) => {
                let names: Vec<_> = tasks.iter().map(|t| t.name.as_str()).collect();
                self.name_list("tasks", &names)
            }
        }
    }

    fn name_list(&self, kind: &str, names: &[&str]) -> Result<String, RenderError> {
        self.templates
            .render("name_list", &json!({ "kind": kind, "names": names }))
    }
}

#[derive(Clone, Copy)]
enum Size {
    Small,
    Large,
}

fn photo_url(user: &UserDetail, size: Size) -> &str {
    user.photo
        .as_ref()
        .and_then(|p| match size {
            Size::Small => p.image_36x36.as_deref(),
            Size::Large => p.image_128x128.as_deref(),
        })
        .unwrap_or(PLACEHOLDER_IMAGE)
}

/// `assignee_status` of tasks the assignee has put in their Today list.
pub const TODAY_STATUS: &str = "today";

/// Incomplete tasks scheduled for `today`: those the assignee marked for
/// Today, plus those due on that date.
pub fn scheduled_for(tasks: &[Task], today: NaiveDate) -> impl Iterator<Item = &Task> {
    tasks.iter().filter(move |t| {
        !t.completed
            && (t.assignee_status.as_deref() == Some(TODAY_STATUS) || t.due_on == Some(today))
    })
}

/// Widget height in dashboard blocks from the widget's `size` setting.
///
/// `"big"` is two blocks; numeric sizes are taken as-is.  Anything else,
/// including zero, is one block.
pub fn widget_height(size: &str) -> u16 {
    match size.trim() {
        "big" => 2,
        other => other.parse::<u16>().ok().filter(|h| *h > 0).unwrap_or(1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asana::Photo;
    use serde_json::Map;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
    }

    fn user(name: &str, email: &str, photo: Option<(&str, &str)>) -> UserDetail {
        UserDetail {
            email: Some(email.to_string()),
            photo: photo.map(|(small, large)| Photo {
                image_36x36: Some(small.to_string()),
                image_128x128: Some(large.to_string()),
                extra: Map::new(),
            }),
            ..UserDetail::new("1", name)
        }
    }

    fn task(name: &str, due: Option<NaiveDate>, completed: bool) -> Task {
        Task {
            due_on: due,
            completed,
            ..Task::new(name, name)
        }
    }

    fn marked_today(name: &str, completed: bool) -> Task {
        Task {
            assignee_status: Some(TODAY_STATUS.to_string()),
            completed,
            ..Task::new(name, name)
        }
    }

    #[test]
    fn profiles_link_each_user() {
        let renderer = WidgetRenderer::new().unwrap();
        let html = renderer
            .user_profiles(&[
                user("Ada", "ada@example.com", Some(("a36.png", "a128.png"))),
                user("Bob", "bob@example.com", None),
            ])
            .unwrap();

        assert_eq!(html.matches(r#"<div class="asana-user">"#).count(), 2);
        assert!(html.contains(r#"href="mailto:ada@example.com""#));
        assert!(html.contains(r#"src="a128.png""#));
        assert!(html.contains(PLACEHOLDER_IMAGE));
    }

    #[test]
    fn names_are_escaped() {
        let renderer = WidgetRenderer::new().unwrap();
        let html = renderer
            .user_profiles(&[user("<script>", "x@example.com", None)])
            .unwrap();

        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
    }

    #[test]
    fn profile_lists_only_open_tasks_due_today() {
        let renderer = WidgetRenderer::new().unwrap();
        let entry = UserWithTasks {
            user: user("Ada", "ada@example.com", Some(("a36.png", "a128.png"))),
            tasks: vec![
                task("Due today", Some(today()), false),
                task("Done today", Some(today()), true),
                task("Due tomorrow", today().succ_opt(), false),
                task("Undated", None, false),
            ],
        };

        let html = renderer.user_profile(&entry, today()).unwrap();

        assert!(html.contains("<strong>Ada</strong>"));
        assert!(html.contains(r#"src="a36.png""#));
        assert!(html.contains("<li>Due today</li>"));
        assert!(!html.contains("Done today"));
        assert!(!html.contains("Due tomorrow"));
        assert!(!html.contains("Undated"));
    }

    #[test]
    fn profile_lists_tasks_marked_for_today() {
        let renderer = WidgetRenderer::new().unwrap();
        let upcoming = Task {
            assignee_status: Some("upcoming".to_string()),
            ..Task::new("u", "Next week")
        };
        let entry = UserWithTasks {
            user: user("Ada", "ada@example.com", None),
            tasks: vec![
                marked_today("Triage inbox", false),
                marked_today("Already done", true),
                upcoming,
            ],
        };

        let html = renderer.user_profile(&entry, today()).unwrap();

        assert!(html.contains("<li>Triage inbox</li>"));
        assert!(!html.contains("Already done"));
        assert!(!html.contains("Next week"));
        assert!(!html.contains("Nothing due today"));
    }

    #[test]
    fn scheduled_keeps_task_order() {
        let tasks = vec![
            task("Due", Some(today()), false),
            marked_today("Marked", false),
            task("Later", today().succ_opt(), false),
        ];
        let names: Vec<_> = scheduled_for(&tasks, today()).map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["Due", "Marked"]);
    }

    #[test]
    fn profile_without_tasks_says_so() {
        let renderer = WidgetRenderer::new().unwrap();
        let entry = UserWithTasks {
            user: user("Ada", "ada@example.com", None),
            tasks: vec![],
        };

        let html = renderer.user_profile(&entry, today()).unwrap();
        assert!(html.contains("Nothing due today"));
    }

    #[test]
    fn workspaces_render_as_a_list() {
        let renderer = WidgetRenderer::new().unwrap();
        let results = ResultSet::Workspaces(vec![
            crate::asana::Workspace::new("1", "A"),
            crate::asana::Workspace::new("2", "B"),
        ]);

        let html = renderer.render(&results, today()).unwrap();
        assert_eq!(html, r#"<ul class="asana-workspaces"><li>A</li><li>B</li></ul>"#);
    }

    #[test]
    fn height_follows_size_setting() {
        assert_eq!(widget_height("3"), 3);
        assert_eq!(widget_height(" 2 "), 2);
        assert_eq!(widget_height("0"), 1);
        assert_eq!(widget_height("big"), 2);
        assert_eq!(widget_height("small"), 1);
    }
}
