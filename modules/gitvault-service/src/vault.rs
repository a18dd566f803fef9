//! The document store as seen by request handlers: record domains, event logs
//! and raw commits over either the remote repository or the in-memory fallback.

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, NaiveDate, Utc};
use gitvault_types::{
    AwardOutcome, AwardXpRequest, CaptureIdeaRequest, CommitRequest, CommitResponse, CreateProjectRequest,
    CreateTaskRequest, CreatedRecord, FocusEntry, IdeaFile, IdeaIndexRecord, JournalFrontmatter, JournalSaved,
    JournalStats, ProjectFile, SaveJournalRequest, SeedOutcome, TaskFile, TaskFilter, TaskIndexRecord,
    UpdateIdeaRequest, UpdateProjectRequest, UpdateTaskRequest, XpEntry,
};

use crate::codec;
use crate::commit::FileChange;
use crate::config::StoreSettings;
use crate::domains::ideas::{self, Ideas};
use crate::domains::journal::{self, JOURNAL_ATTRIBUTES, JOURNAL_XP_MINUTES, Journal, SELF_GROWTH_PROJECT};
use crate::domains::projects::{self, Projects};
use crate::domains::tasks::{self, Tasks};
use crate::domains::generate_id;
use crate::error::StoreError;
use crate::event_log::{EventLog, parse_date};
use crate::fallback::{FallbackLog, FallbackRecords};
use crate::game;
use crate::graph::ObjectGraph;
use crate::index::{Domain, Records, RemoteRecords, absorb_conflict, index_change, read_index_at};
use crate::remote::RemoteFiles;

const DEFAULT_COMMIT_MESSAGE: &str = "chore: update files";
const SEED_COMMIT_MESSAGE: &str = "feat(seed): add daily tasks and project 自我成長";

pub struct Vault {
    pub ideas: Records<Ideas>,
    pub projects: Records<Projects>,
    pub tasks: Records<Tasks>,
    pub journal: Records<Journal>,
    pub xp: EventLog<XpEntry>,
    pub focus: EventLog<FocusEntry>,
    files: Option<Arc<RemoteFiles>>,
    branch: Option<String>,
    conflict_retries: u32,
}

impl Vault {
    pub fn remote(graph: Arc<dyn ObjectGraph>, settings: &StoreSettings) -> Self {
        let files = Arc::new(RemoteFiles::new(graph, settings.branch.clone(), settings.retry));
        let retries = settings.conflict_retries;
        Self {
            ideas: Records::new(Arc::new(RemoteRecords::<Ideas>::new(files.clone(), retries))),
            projects: Records::new(Arc::new(RemoteRecords::<Projects>::new(files.clone(), retries))),
            tasks: Records::new(Arc::new(RemoteRecords::<Tasks>::new(files.clone(), retries))),
            journal: Records::new(Arc::new(RemoteRecords::<Journal>::new(files.clone(), retries))),
            xp: EventLog::new(files.clone(), retries),
            focus: EventLog::new(files.clone(), retries),
            files: Some(files),
            branch: settings.branch.clone(),
            conflict_retries: retries,
        }
    }

    pub fn fallback() -> Self {
        Self {
            ideas: Records::new(Arc::new(FallbackRecords::<Ideas>::new())),
            projects: Records::new(Arc::new(FallbackRecords::<Projects>::new())),
            tasks: Records::new(Arc::new(FallbackRecords::<Tasks>::new())),
            journal: Records::new(Arc::new(FallbackRecords::<Journal>::new())),
            xp: EventLog::new(Arc::new(FallbackLog::new()), 0),
            focus: EventLog::new(Arc::new(FallbackLog::new()), 0),
            files: None,
            branch: None,
            conflict_retries: 0,
        }
    }

    pub fn is_remote(&self) -> bool {
        self.files.is_some()
    }

    pub fn mode(&self) -> &'static str {
        if self.is_remote() { "remote" } else { "fallback" }
    }

    pub fn describe(&self) -> Option<String> {
        self.files.as_ref().map(|f| f.describe())
    }

    /// Branch pinned by configuration; `None` means the repository default.
    pub fn branch(&self) -> Option<&str> {
        self.branch.as_deref()
    }

    // =====================================================
    // Ideas
    // =====================================================

    pub async fn capture_idea(&self, req: CaptureIdeaRequest, now: DateTime<Utc>) -> Result<CreatedRecord, StoreError> {
        let (file, attachments) = ideas::capture(generate_id("idea"), now, req)?;
        let entry = self.ideas.create_with(file, attachments).await?;
        log::info!("[VAULT] Captured idea {}", entry.id);
        Ok(CreatedRecord {
            id: entry.id,
            file_path: entry.file_path,
        })
    }

    pub async fn list_ideas(&self) -> Result<Vec<IdeaIndexRecord>, StoreError> {
        let mut items = self.ideas.list().await?;
        ideas::sort_newest_first(&mut items);
        Ok(items)
    }

    pub async fn save_idea(&self, req: &UpdateIdeaRequest, now: DateTime<Utc>) -> Result<Option<IdeaFile>, StoreError> {
        self.ideas
            .update(&req.id, |file| ideas::apply_update(file, req, now))
            .await
    }

    // =====================================================
    // Projects
    // =====================================================

    pub async fn create_project(
        &self,
        req: CreateProjectRequest,
        now: DateTime<Utc>,
    ) -> Result<CreatedRecord, StoreError> {
        let file = projects::new_project(generate_id("project"), now, req);
        let entry = self.projects.create(file).await?;
        Ok(CreatedRecord {
            id: entry.id,
            file_path: entry.file_path,
        })
    }

    pub async fn save_project(
        &self,
        req: &UpdateProjectRequest,
        now: DateTime<Utc>,
    ) -> Result<Option<ProjectFile>, StoreError> {
        self.projects
            .update(&req.id, |file| projects::apply_update(file, req, now))
            .await
    }

    // =====================================================
    // Tasks
    // =====================================================

    pub async fn create_task(&self, req: CreateTaskRequest, now: DateTime<Utc>) -> Result<CreatedRecord, StoreError> {
        let file = tasks::new_task(generate_id("task"), now, req);
        let entry = self.tasks.create(file).await?;
        Ok(CreatedRecord {
            id: entry.id,
            file_path: entry.file_path,
        })
    }

    pub async fn list_tasks(&self, filter: &TaskFilter, today: NaiveDate) -> Result<Vec<TaskIndexRecord>, StoreError> {
        tasks::filter_tasks(self.tasks.list().await?, filter, today)
    }

    pub async fn save_task(&self, req: &UpdateTaskRequest, now: DateTime<Utc>) -> Result<Option<TaskFile>, StoreError> {
        self.tasks
            .update(&req.id, |file| tasks::apply_update(file, req, now))
            .await
    }

    /// Ensure the self-growth project and its daily tasks exist. Everything
    /// missing lands in one commit together with both indexes. Remote mode only.
    pub async fn seed_daily(&self, now: DateTime<Utc>) -> Result<SeedOutcome, StoreError> {
        let Some(files) = &self.files else {
            return Err(StoreError::Config(
                "seeding needs GITHUB_REPO and GITHUB_TOKEN".to_string(),
            ));
        };

        let mut attempt = 0;
        loop {
            let base = files.head().await?;
            let mut project_index = read_index_at::<Projects>(files, &base).await?;
            let mut task_index = read_index_at::<Tasks>(files, &base).await?;
            let mut changes = Vec::new();

            let project_id = match projects::find_by_title(&project_index, SELF_GROWTH_PROJECT) {
                Some(existing) => existing.id.clone(),
                None => {
                    let file = projects::self_growth_project(generate_id("project"), now);
                    let path = Projects::record_path(&file.frontmatter);
                    Projects::insert(&mut project_index, Projects::project(&file.frontmatter, &path));
                    changes.push(FileChange::text(&path, codec::serialize(&file)));
                    changes.push(index_change::<Projects>(&project_index)?);
                    file.frontmatter.id
                }
            };

            let mut created = 0;
            for title in tasks::DAILY_TASK_TITLES {
                if task_index
                    .iter()
                    .any(|t| t.title == title && t.project_id == project_id)
                {
                    continue;
                }
                let file = tasks::daily_task(generate_id("task"), now, &project_id, title);
                let path = Tasks::record_path(&file.frontmatter);
                Tasks::insert(&mut task_index, Tasks::project(&file.frontmatter, &path));
                changes.push(FileChange::text(&path, codec::serialize(&file)));
                created += 1;
            }
            if created > 0 {
                changes.push(index_change::<Tasks>(&task_index)?);
            }

            if changes.is_empty() {
                return Ok(SeedOutcome {
                    created: 0,
                    project_id,
                    message: Some("Already seeded".to_string()),
                });
            }
            match files.commit_on(&base, SEED_COMMIT_MESSAGE, changes).await {
                Ok(_) => {
                    log::info!("[VAULT] Seeded {} daily tasks under project {}", created, project_id);
                    return Ok(SeedOutcome {
                        created,
                        project_id,
                        message: None,
                    });
                }
                Err(e) => absorb_conflict("SEED", &mut attempt, self.conflict_retries, e)?,
            }
        }
    }

    // =====================================================
    // Journal
    // =====================================================

    fn journal_day(date: Option<&str>, today: NaiveDate) -> Result<NaiveDate, StoreError> {
        match date.map(str::trim).filter(|d| !d.is_empty()) {
            Some(d) => parse_date(d),
            None => Ok(today),
        }
    }

    /// Entry for a date, or an empty one when nothing readable exists there.
    pub async fn get_journal(&self, date: Option<&str>, today: NaiveDate) -> Result<JournalFrontmatter, StoreError> {
        let day = Self::journal_day(date, today)?;
        let key = day.format("%Y-%m-%d").to_string();
        match self.journal.read_path(&journal::journal_path(&key)).await {
            Ok(Some(file)) => return Ok(file.frontmatter),
            Ok(None) => {}
            Err(StoreError::Parse { path, source }) => {
                log::warn!("[VAULT] Unreadable journal entry {}: {}", path, source);
            }
            Err(e) => return Err(e),
        }
        let index = self.journal.list().await?;
        Ok(journal::empty_entry(day, index.iter().find(|e| e.date == key)))
    }

    /// Upsert the entry for a date, then grant journal XP. A failed award is
    /// logged and reported as `xp: None`; the saved entry stands.
    pub async fn save_journal(
        &self,
        req: SaveJournalRequest,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<JournalSaved, StoreError> {
        let day = Self::journal_day(req.date.as_deref(), today)?;
        let key = day.format("%Y-%m-%d").to_string();

        let existing_created_at = match self.journal.read_path(&journal::journal_path(&key)).await {
            Ok(file) => file.map(|f| f.frontmatter.created_at),
            Err(StoreError::Parse { path, source }) => {
                log::warn!("[VAULT] Replacing unreadable journal entry {}: {}", path, source);
                None
            }
            Err(e) => return Err(e),
        };

        let file = journal::build_entry(day, existing_created_at, now, req);
        let entry = file.frontmatter.clone();
        self.journal.create(file).await?;

        let xp = match self.award_journal_xp(&key, today, now).await {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                log::warn!("[VAULT] Journal XP for {} not granted: {}", key, e);
                None
            }
        };
        Ok(JournalSaved { entry, xp })
    }

    async fn award_journal_xp(&self, date: &str, today: NaiveDate, now: DateTime<Utc>) -> Result<AwardOutcome, StoreError> {
        let project_id = match self.projects.list().await {
            Ok(list) => projects::find_by_title(&list, SELF_GROWTH_PROJECT)
                .map(|p| p.id.clone())
                .unwrap_or_default(),
            Err(e) => {
                log::warn!("[VAULT] Project lookup for journal XP failed: {}", e);
                String::new()
            }
        };
        let req = AwardXpRequest {
            source: Some("journal".to_string()),
            task_id: format!("journal-{}", date),
            task_title: format!("日記 {}", date),
            project_id,
            minutes: JOURNAL_XP_MINUTES,
            date: Some(date.to_string()),
            attributes: Some(JOURNAL_ATTRIBUTES.iter().map(|a| a.to_string()).collect()),
        };
        game::award_xp(&self.xp, req, today, now).await
    }

    pub async fn journal_stats(&self, today: NaiveDate) -> Result<JournalStats, StoreError> {
        Ok(journal::stats(&self.journal.list().await?, today))
    }

    // =====================================================
    // Raw commits
    // =====================================================

    /// Commit caller supplied files as one commit. Remote mode only.
    pub async fn commit_raw(&self, req: CommitRequest) -> Result<CommitResponse, StoreError> {
        let Some(files) = &self.files else {
            return Err(StoreError::Config(
                "raw commits need GITHUB_REPO and GITHUB_TOKEN".to_string(),
            ));
        };
        let message = req
            .message
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_COMMIT_MESSAGE.to_string());
        let changes = commit_changes(req.files)?;
        let outcome = files.commit(&message, changes).await?;
        Ok(CommitResponse {
            commit_sha: outcome.commit_sha,
            branch: outcome.branch,
        })
    }
}

fn commit_changes(files: Vec<gitvault_types::CommitFileRequest>) -> Result<Vec<FileChange>, StoreError> {
    if files.is_empty() {
        return Err(StoreError::Invalid("No files provided".to_string()));
    }
    files
        .into_iter()
        .map(|f| {
            let path = f.path.trim().trim_start_matches('/').to_string();
            if path.is_empty() {
                return Err(StoreError::Invalid("file path must not be empty".to_string()));
            }
            match f.encoding.as_deref() {
                Some("base64") => {
                    let bytes = BASE64
                        .decode(f.content.trim())
                        .map_err(|e| StoreError::Invalid(format!("{} is not valid base64: {}", path, e)))?;
                    Ok(FileChange::binary(path, bytes))
                }
                _ => Ok(FileChange::text(path, f.content)),
            }
        })
        .collect()
}
