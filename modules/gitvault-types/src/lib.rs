//! Shared types for the gitvault service and its RPC clients.

use serde::{Deserialize, Serialize};

// =====================================================
// Status Enums
// =====================================================

/// Lifecycle of a captured idea
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdeaStatus {
    #[default]
    Draft,
    Curating,
    Todo,
    Done,
    Archived,
}

impl IdeaStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IdeaStatus::Draft => "draft",
            IdeaStatus::Curating => "curating",
            IdeaStatus::Todo => "todo",
            IdeaStatus::Done => "done",
            IdeaStatus::Archived => "archived",
        }
    }

    pub fn parse(input: &str) -> Option<Self> {
        match input {
            "draft" => Some(IdeaStatus::Draft),
            "curating" => Some(IdeaStatus::Curating),
            "todo" => Some(IdeaStatus::Todo),
            "done" => Some(IdeaStatus::Done),
            "archived" => Some(IdeaStatus::Archived),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    #[default]
    Active,
    Archived,
}

impl ProjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectStatus::Active => "active",
            ProjectStatus::Archived => "archived",
        }
    }

    pub fn parse(input: &str) -> Option<Self> {
        match input {
            "active" => Some(ProjectStatus::Active),
            "archived" => Some(ProjectStatus::Archived),
            _ => None,
        }
    }
}

/// Board column of a task
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Backlog,
    Todo,
    InProgress,
    Blocked,
    Done,
    Archived,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Backlog => "backlog",
            TaskStatus::Todo => "todo",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Blocked => "blocked",
            TaskStatus::Done => "done",
            TaskStatus::Archived => "archived",
        }
    }

    pub fn parse(input: &str) -> Option<Self> {
        match input {
            "backlog" => Some(TaskStatus::Backlog),
            "todo" => Some(TaskStatus::Todo),
            "in_progress" => Some(TaskStatus::InProgress),
            "blocked" => Some(TaskStatus::Blocked),
            "done" => Some(TaskStatus::Done),
            "archived" => Some(TaskStatus::Archived),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recurrence {
    Daily,
}

impl Recurrence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Recurrence::Daily => "daily",
        }
    }

    pub fn parse(input: &str) -> Option<Self> {
        match input {
            "daily" => Some(Recurrence::Daily),
            _ => None,
        }
    }
}

// =====================================================
// Record Files (frontmatter + body)
// =====================================================

/// A primary record file: structured header plus free-form text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordFile<F> {
    pub frontmatter: F,
    pub content: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Relations {
    #[serde(default)]
    pub links: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AudioMeta {
    pub url: String,
    pub duration_sec: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TranscriptMeta {
    pub model: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IdeaFrontmatter {
    pub id: String,
    pub title: String,
    pub created_at: String,
    pub updated_at: String,
    pub status: IdeaStatus,
    pub importance: i32,
    pub tags: Vec<String>,
    pub project_id: String,
    pub audio: AudioMeta,
    pub transcript: TranscriptMeta,
    pub summary: String,
    pub relations: Relations,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectFrontmatter {
    pub id: String,
    pub title: String,
    pub description: String,
    pub created_at: String,
    pub updated_at: String,
    pub status: ProjectStatus,
    pub priority: i32,
    pub tags: Vec<String>,
    pub relations: Relations,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskFrontmatter {
    pub id: String,
    pub project_id: String,
    pub title: String,
    pub description: String,
    pub created_at: String,
    pub updated_at: String,
    pub status: TaskStatus,
    pub priority: i32,
    pub tags: Vec<String>,
    pub due_date: Option<String>,
    pub completed_at: Option<String>,
    pub recurring: Option<Recurrence>,
    pub focus_exclude: bool,
    pub estimate: Option<f64>,
    pub assignee: Option<String>,
    pub position: i64,
    pub relations: Relations,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JournalSections {
    pub accomplishment: String,
    pub gratitude: String,
    pub insight: String,
    pub reflection: String,
    pub focus: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JournalFrontmatter {
    pub date: String,
    pub created_at: String,
    pub updated_at: String,
    pub sections: JournalSections,
}

pub type IdeaFile = RecordFile<IdeaFrontmatter>;
pub type ProjectFile = RecordFile<ProjectFrontmatter>;
pub type TaskFile = RecordFile<TaskFrontmatter>;
pub type JournalFile = RecordFile<JournalFrontmatter>;

// =====================================================
// Index Records
// =====================================================

/// Listing projection of an idea, held in `ideas/_index/index.json`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdeaIndexRecord {
    pub id: String,
    pub title: String,
    pub created_at: String,
    pub updated_at: String,
    pub tags: Vec<String>,
    pub status: IdeaStatus,
    pub importance: i32,
    pub audio_url: String,
    pub project_id: String,
    pub file_path: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectIndexRecord {
    pub id: String,
    pub title: String,
    pub status: ProjectStatus,
    pub priority: i32,
    pub tags: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
    pub file_path: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskIndexRecord {
    pub id: String,
    pub project_id: String,
    pub title: String,
    pub status: TaskStatus,
    pub priority: i32,
    pub position: i64,
    pub tags: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recurring: Option<Recurrence>,
    pub focus_exclude: bool,
    pub file_path: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JournalIndexRecord {
    pub date: String,
    pub updated_at: String,
    pub file_path: String,
}

// =====================================================
// Event Log Entries
// =====================================================

/// One XP grant, a line in `game/xp/{yyyy-mm}.jsonl`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct XpEntry {
    pub date: String,
    pub ts: String,
    pub source: String,
    pub task_id: String,
    pub task_title: String,
    pub project_id: String,
    pub minutes: i64,
    pub xp: i64,
    pub attributes: Vec<String>,
    pub skill_key: String,
    pub idempotency_key: String,
}

/// One completed focus session, a line in `game/focus/{yyyy-mm}.jsonl`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FocusEntry {
    pub date: String,
    pub started_at: String,
    pub ended_at: String,
    pub seconds: i64,
    pub task_id: String,
    pub task_title: String,
    pub mode: String,
    pub completed: bool,
    pub valid_threshold_sec: i64,
    pub valid: bool,
    pub source: String,
    pub idempotency_key: String,
}

// =====================================================
// RPC Request Types
// =====================================================

/// Base64 payload committed next to a record (e.g. recorded audio)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BinaryUpload {
    pub content_type: String,
    pub data_base64: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct CaptureIdeaRequest {
    pub title: Option<String>,
    pub text: Option<String>,
    pub tags: Option<Vec<String>>,
    pub importance: Option<i32>,
    pub status: Option<String>,
    pub project_id: Option<String>,
    pub duration_sec: Option<f64>,
    pub audio: Option<BinaryUpload>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct UpdateIdeaRequest {
    pub id: String,
    pub title: Option<String>,
    pub tags: Option<Vec<String>>,
    pub importance: Option<i32>,
    pub status: Option<String>,
    pub transcript: Option<String>,
    pub summary: Option<String>,
    pub project_id: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct CreateProjectRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
    pub priority: Option<i32>,
    pub tags: Option<Vec<String>>,
    pub content: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct UpdateProjectRequest {
    pub id: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
    pub priority: Option<i32>,
    pub tags: Option<Vec<String>>,
    pub content: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct CreateTaskRequest {
    pub project_id: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
    pub priority: Option<i32>,
    pub tags: Option<Vec<String>>,
    pub due_date: Option<String>,
    pub recurring: Option<String>,
    pub focus_exclude: Option<bool>,
    pub estimate: Option<f64>,
    pub assignee: Option<String>,
    pub position: Option<i64>,
    pub content: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct UpdateTaskRequest {
    pub id: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
    pub priority: Option<i32>,
    pub tags: Option<Vec<String>>,
    pub content: Option<String>,
    pub position: Option<i64>,
    pub project_id: Option<String>,
    pub due_date: Option<String>,
    pub completed_at: Option<String>,
    pub recurring: Option<String>,
    pub focus_exclude: Option<bool>,
    pub estimate: Option<f64>,
    pub assignee: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IdRequest {
    pub id: String,
}

/// Filters for listing tasks
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct TaskFilter {
    pub project_id: Option<String>,
    pub status: Option<String>,
    pub tag: Option<String>,
    #[serde(default)]
    pub include_done: bool,
    #[serde(default)]
    pub completed_only: bool,
    #[serde(default)]
    pub nodate: bool,
    /// Inclusive lower bound, YYYY-MM-DD
    pub from: Option<String>,
    /// Inclusive upper bound, YYYY-MM-DD
    pub to: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct SaveJournalRequest {
    pub date: Option<String>,
    pub accomplishment: Option<String>,
    pub gratitude: Option<String>,
    pub insight: Option<String>,
    pub reflection: Option<String>,
    pub focus: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct JournalQuery {
    pub date: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct AwardXpRequest {
    pub source: Option<String>,
    #[serde(default)]
    pub task_id: String,
    #[serde(default)]
    pub task_title: String,
    #[serde(default)]
    pub project_id: String,
    #[serde(default)]
    pub minutes: f64,
    pub date: Option<String>,
    pub attributes: Option<Vec<String>>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct CompleteFocusRequest {
    #[serde(default)]
    pub started_at: String,
    #[serde(default)]
    pub ended_at: String,
    #[serde(default)]
    pub seconds: i64,
    #[serde(default)]
    pub task_id: String,
    #[serde(default)]
    pub task_title: String,
    pub date: Option<String>,
}

/// Date range query over an event log
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct HistoryQuery {
    pub from: Option<String>,
    pub to: Option<String>,
    /// Comma separated list of sources to keep
    pub source: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CommitFileRequest {
    pub path: String,
    pub content: String,
    /// `utf-8` (default) or `base64`
    pub encoding: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CommitRequest {
    pub message: Option<String>,
    #[serde(default)]
    pub files: Vec<CommitFileRequest>,
}

// =====================================================
// RPC Response Types
// =====================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct RpcResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> RpcResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(msg.into()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedRecord {
    pub id: String,
    pub file_path: String,
}

/// An index entry together with the parsed primary file it points at
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordView<I, F> {
    pub item: I,
    pub file: RecordFile<F>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AwardOutcome {
    pub skipped: bool,
    pub xp: i64,
    pub attributes: Vec<String>,
    pub project_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FocusOutcome {
    pub skipped: bool,
    pub valid: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FocusStats {
    pub streak: u32,
    pub best: u32,
    pub week_count: u32,
    pub week_minutes: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct XpProfile {
    pub total_xp: i64,
    pub level: u32,
    pub progress: f64,
    pub next_req: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JournalStats {
    pub streak: u32,
    pub has_today: bool,
    pub highlight: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalSaved {
    pub entry: JournalFrontmatter,
    pub xp: Option<AwardOutcome>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitResponse {
    pub commit_sha: String,
    pub branch: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SeedOutcome {
    /// Daily tasks added by this run
    pub created: usize,
    pub project_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

// =====================================================
// Service Status
// =====================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub running: bool,
    /// `remote`, `fallback` or `misconfigured`
    pub mode: String,
    pub repository: Option<String>,
    /// Explicitly configured branch; absent means the repository default
    pub branch: Option<String>,
    pub uptime_secs: u64,
}
