use chrono::{DateTime, Utc};
use gitvault_types::{
    CreateProjectRequest, ProjectFile, ProjectFrontmatter, ProjectIndexRecord, ProjectStatus, RecordFile, Relations,
    UpdateProjectRequest,
};

use super::journal::SELF_GROWTH_PROJECT;
use super::{sharded_path, timestamp};
use crate::codec::{Frontmatter, HeaderReader, HeaderWriter};
use crate::index::{Domain, IndexEntry};

const DEFAULT_PRIORITY: i32 = 3;

pub const SELF_GROWTH_DESCRIPTION: &str = "日常精進與持續學習";

pub struct Projects;

impl Domain for Projects {
    type Frontmatter = ProjectFrontmatter;
    type Entry = ProjectIndexRecord;

    const LABEL: &'static str = "project";
    const INDEX_PATH: &'static str = "projects/_index/index.json";

    fn key(fm: &ProjectFrontmatter) -> &str {
        &fm.id
    }

    fn title(fm: &ProjectFrontmatter) -> &str {
        &fm.title
    }

    fn record_path(fm: &ProjectFrontmatter) -> String {
        sharded_path("projects", &fm.id, &fm.created_at, "md")
    }

    fn project(fm: &ProjectFrontmatter, file_path: &str) -> ProjectIndexRecord {
        ProjectIndexRecord {
            id: fm.id.clone(),
            title: fm.title.clone(),
            status: fm.status,
            priority: fm.priority,
            tags: fm.tags.clone(),
            created_at: fm.created_at.clone(),
            updated_at: fm.updated_at.clone(),
            file_path: file_path.to_string(),
        }
    }
}

impl IndexEntry for ProjectIndexRecord {
    fn key(&self) -> &str {
        &self.id
    }

    fn file_path(&self) -> &str {
        &self.file_path
    }
}

impl Frontmatter for ProjectFrontmatter {
    fn write_header(&self, w: &mut HeaderWriter) {
        w.text("id", &self.id)
            .text("title", &self.title)
            .text("description", &self.description)
            .text("created_at", &self.created_at)
            .text("updated_at", &self.updated_at)
            .text("status", self.status.as_str())
            .number("priority", self.priority)
            .list("tags", &self.tags)
            .section("relations", |s| {
                s.list("links", &self.relations.links);
            });
    }

    fn read_header(r: &HeaderReader<'_>) -> Self {
        Self {
            id: r.text("id"),
            title: r.text("title"),
            description: r.text("description"),
            created_at: r.text("created_at"),
            updated_at: r.text("updated_at"),
            status: ProjectStatus::parse(&r.text("status")).unwrap_or_default(),
            priority: i32::try_from(r.int("priority")).unwrap_or(DEFAULT_PRIORITY),
            tags: r.list("tags"),
            relations: Relations {
                links: r.section("relations").list("links"),
            },
        }
    }
}

pub fn new_project(id: String, now: DateTime<Utc>, req: CreateProjectRequest) -> ProjectFile {
    let created_at = timestamp(now);
    RecordFile {
        frontmatter: ProjectFrontmatter {
            id,
            title: req
                .title
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| "Untitled Project".to_string()),
            description: req.description.unwrap_or_default(),
            created_at: created_at.clone(),
            updated_at: created_at,
            status: req
                .status
                .as_deref()
                .and_then(ProjectStatus::parse)
                .unwrap_or_default(),
            priority: req.priority.unwrap_or(DEFAULT_PRIORITY),
            tags: req.tags.unwrap_or_default(),
            relations: Relations::default(),
        },
        content: req.content.unwrap_or_default(),
    }
}

pub fn apply_update(file: &mut ProjectFile, req: &UpdateProjectRequest, now: DateTime<Utc>) {
    let fm = &mut file.frontmatter;
    if let Some(title) = &req.title {
        fm.title = title.clone();
    }
    if let Some(description) = &req.description {
        fm.description = description.clone();
    }
    if let Some(status) = req.status.as_deref().and_then(ProjectStatus::parse) {
        fm.status = status;
    }
    if let Some(priority) = req.priority {
        fm.priority = priority;
    }
    if let Some(tags) = &req.tags {
        fm.tags = tags.clone();
    }
    fm.updated_at = timestamp(now);
    if let Some(content) = &req.content {
        file.content = content.clone();
    }
}

/// Id of the first project with exactly this title
/// The project daily routines and journal XP are filed under.
pub fn self_growth_project(id: String, now: DateTime<Utc>) -> ProjectFile {
    new_project(
        id,
        now,
        CreateProjectRequest {
            title: Some(SELF_GROWTH_PROJECT.to_string()),
            description: Some(SELF_GROWTH_DESCRIPTION.to_string()),
            status: Some("active".to_string()),
            priority: Some(DEFAULT_PRIORITY),
            ..CreateProjectRequest::default()
        },
    )
}

pub fn find_by_title<'a>(projects: &'a [ProjectIndexRecord], title: &str) -> Option<&'a ProjectIndexRecord> {
    projects.iter().find(|p| p.title == title)
}
