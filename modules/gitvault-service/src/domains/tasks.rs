use std::cmp::Ordering;

use chrono::{DateTime, NaiveDate, Utc};
use gitvault_types::{
    CreateTaskRequest, RecordFile, Recurrence, Relations, TaskFile, TaskFilter, TaskFrontmatter, TaskIndexRecord,
    TaskStatus, UpdateTaskRequest,
};

use super::{day_of, sharded_path, timestamp};
use crate::codec::{Frontmatter, HeaderReader, HeaderWriter};
use crate::error::StoreError;
use crate::event_log::parse_date;
use crate::index::{Domain, IndexEntry};

const DEFAULT_PRIORITY: i32 = 3;

/// Recurring routines seeded under the self-growth project
pub const DAILY_TASK_TITLES: [&str; 4] = ["深度閱讀", "無壓力寫作", "腦力激盪", "AI 技術探索"];

pub struct Tasks;

impl Domain for Tasks {
    type Frontmatter = TaskFrontmatter;
    type Entry = TaskIndexRecord;

    const LABEL: &'static str = "task";
    const INDEX_PATH: &'static str = "tasks/_index/index.json";

    fn key(fm: &TaskFrontmatter) -> &str {
        &fm.id
    }

    fn title(fm: &TaskFrontmatter) -> &str {
        &fm.title
    }

    fn record_path(fm: &TaskFrontmatter) -> String {
        sharded_path("tasks", &fm.id, &fm.created_at, "md")
    }

    fn project(fm: &TaskFrontmatter, file_path: &str) -> TaskIndexRecord {
        TaskIndexRecord {
            id: fm.id.clone(),
            project_id: fm.project_id.clone(),
            title: fm.title.clone(),
            status: fm.status,
            priority: fm.priority,
            position: fm.position,
            tags: fm.tags.clone(),
            created_at: fm.created_at.clone(),
            updated_at: fm.updated_at.clone(),
            due_date: fm.due_date.clone(),
            completed_at: fm.completed_at.clone(),
            recurring: fm.recurring,
            focus_exclude: fm.focus_exclude,
            file_path: file_path.to_string(),
        }
    }
}

impl IndexEntry for TaskIndexRecord {
    fn key(&self) -> &str {
        &self.id
    }

    fn file_path(&self) -> &str {
        &self.file_path
    }
}

impl Frontmatter for TaskFrontmatter {
    fn write_header(&self, w: &mut HeaderWriter) {
        w.text("id", &self.id)
            .text("project_id", &self.project_id)
            .text("title", &self.title)
            .text("description", &self.description)
            .text("created_at", &self.created_at)
            .text("updated_at", &self.updated_at)
            .text("status", self.status.as_str())
            .number("priority", self.priority)
            .list("tags", &self.tags)
            .optional_text("due_date", self.due_date.as_deref())
            .optional_text("completed_at", self.completed_at.as_deref())
            .optional_text("recurring", self.recurring.as_ref().map(Recurrence::as_str))
            .flag("focus_exclude", self.focus_exclude);
        if let Some(estimate) = self.estimate {
            w.number("estimate", estimate);
        }
        w.optional_text("assignee", self.assignee.as_deref())
            .number("position", self.position)
            .section("relations", |s| {
                s.list("links", &self.relations.links);
            });
    }

    fn read_header(r: &HeaderReader<'_>) -> Self {
        Self {
            id: r.text("id"),
            project_id: r.text("project_id"),
            title: r.text("title"),
            description: r.text("description"),
            created_at: r.text("created_at"),
            updated_at: r.text("updated_at"),
            status: TaskStatus::parse(&r.text("status")).unwrap_or_default(),
            priority: i32::try_from(r.int("priority")).unwrap_or(DEFAULT_PRIORITY),
            tags: r.list("tags"),
            due_date: r.non_empty("due_date"),
            completed_at: r.non_empty("completed_at"),
            recurring: r.non_empty("recurring").and_then(|s| Recurrence::parse(&s)),
            focus_exclude: r.flag("focus_exclude"),
            estimate: r.optional_float("estimate"),
            assignee: r.non_empty("assignee"),
            position: r.int("position"),
            relations: Relations {
                links: r.section("relations").list("links"),
            },
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

pub fn daily_task(id: String, now: DateTime<Utc>, project_id: &str, title: &str) -> TaskFile {
    new_task(
        id,
        now,
        CreateTaskRequest {
            project_id: Some(project_id.to_string()),
            title: Some(title.to_string()),
            status: Some("todo".to_string()),
            priority: Some(DEFAULT_PRIORITY),
            recurring: Some("daily".to_string()),
            ..CreateTaskRequest::default()
        },
    )
}

pub fn new_task(id: String, now: DateTime<Utc>, req: CreateTaskRequest) -> TaskFile {
    let created_at = timestamp(now);
    RecordFile {
        frontmatter: TaskFrontmatter {
            id,
            project_id: req.project_id.unwrap_or_default(),
            title: non_empty(req.title).unwrap_or_else(|| "Untitled Task".to_string()),
            description: req.description.unwrap_or_default(),
            created_at: created_at.clone(),
            updated_at: created_at,
            status: req
                .status
                .as_deref()
                .and_then(TaskStatus::parse)
                .unwrap_or_default(),
            priority: req.priority.unwrap_or(DEFAULT_PRIORITY),
            tags: req.tags.unwrap_or_default(),
            due_date: non_empty(req.due_date),
            completed_at: None,
            recurring: req.recurring.as_deref().and_then(Recurrence::parse),
            focus_exclude: req.focus_exclude.unwrap_or(false),
            estimate: req.estimate,
            assignee: non_empty(req.assignee),
            position: req.position.unwrap_or_else(|| now.timestamp_millis()),
            relations: Relations::default(),
        },
        content: req.content.unwrap_or_default(),
    }
}

/// Apply a save request. `completed_at` follows the status: an explicit
/// value wins; moving to done stamps it (daily tasks re-stamp on every save,
/// others only when newly done or unset); a daily task leaving done clears it.
pub fn apply_update(file: &mut TaskFile, req: &UpdateTaskRequest, now: DateTime<Utc>) {
    let stamp = timestamp(now);
    let fm = &mut file.frontmatter;
    let previous = fm.status;

    if let Some(title) = &req.title {
        fm.title = title.clone();
    }
    if let Some(description) = &req.description {
        fm.description = description.clone();
    }
    if let Some(status) = req.status.as_deref().and_then(TaskStatus::parse) {
        fm.status = status;
    }
    if let Some(priority) = req.priority {
        fm.priority = priority;
    }
    if let Some(tags) = &req.tags {
        fm.tags = tags.clone();
    }
    if let Some(position) = req.position {
        fm.position = position;
    }
    if let Some(project_id) = &req.project_id {
        fm.project_id = project_id.clone();
    }
    if let Some(due_date) = &req.due_date {
        fm.due_date = non_empty(Some(due_date.clone()));
    }
    if let Some(recurring) = &req.recurring {
        fm.recurring = Recurrence::parse(recurring);
    }

    let daily = fm.recurring == Some(Recurrence::Daily);
    if let Some(completed_at) = &req.completed_at {
        fm.completed_at = non_empty(Some(completed_at.clone()));
    } else if fm.status == TaskStatus::Done {
        if daily || previous != TaskStatus::Done || fm.completed_at.is_none() {
            fm.completed_at = Some(stamp.clone());
        }
    } else if daily {
        fm.completed_at = None;
    }

    if let Some(focus_exclude) = req.focus_exclude {
        fm.focus_exclude = focus_exclude;
    }
    if let Some(estimate) = req.estimate {
        fm.estimate = Some(estimate);
    }
    if let Some(assignee) = &req.assignee {
        fm.assignee = non_empty(Some(assignee.clone()));
    }
    fm.updated_at = stamp;
    if let Some(content) = &req.content {
        file.content = content.clone();
    }
}

/// Whether a task shows up on the default board: archived never, done only
/// when it is a daily task not yet completed `today`.
fn visible_by_default(task: &TaskIndexRecord, today: NaiveDate) -> bool {
    match task.status {
        TaskStatus::Archived => false,
        TaskStatus::Done => {
            task.recurring == Some(Recurrence::Daily)
                && task.completed_at.as_deref().and_then(day_of) != Some(today)
        }
        _ => true,
    }
}

fn board_order(a: &TaskIndexRecord, b: &TaskIndexRecord) -> Ordering {
    a.position
        .cmp(&b.position)
        .then_with(|| b.priority.cmp(&a.priority))
        .then_with(|| b.updated_at.cmp(&a.updated_at))
}

fn bound(value: Option<&str>) -> Result<Option<NaiveDate>, StoreError> {
    value.filter(|v| !v.trim().is_empty()).map(parse_date).transpose()
}

pub fn filter_tasks(
    mut list: Vec<TaskIndexRecord>,
    filter: &TaskFilter,
    today: NaiveDate,
) -> Result<Vec<TaskIndexRecord>, StoreError> {
    let from = bound(filter.from.as_deref())?;
    let to = bound(filter.to.as_deref())?;

    if let Some(project_id) = filter.project_id.as_deref().filter(|p| !p.is_empty()) {
        list.retain(|t| t.project_id == project_id);
    }
    if let Some(status) = filter.status.as_deref().filter(|s| !s.is_empty()) {
        list.retain(|t| t.status.as_str() == status);
    }
    if let Some(tag) = filter.tag.as_deref().filter(|t| !t.is_empty()) {
        list.retain(|t| t.tags.iter().any(|x| x == tag));
    }
    if !filter.include_done && !filter.completed_only {
        list.retain(|t| visible_by_default(t, today));
    }

    if filter.nodate && !filter.completed_only {
        list.retain(|t| t.due_date.is_none());
    } else if from.is_some() || to.is_some() {
        list.retain(|t| {
            let stamp = if filter.completed_only {
                t.completed_at.as_deref()
            } else {
                t.due_date.as_deref()
            };
            match stamp.and_then(day_of) {
                Some(day) => from.is_none_or(|f| day >= f) && to.is_none_or(|l| day <= l),
                None => false,
            }
        });
    }

    list.sort_by(board_order);
    Ok(list)
}
