use chrono::{DateTime, Days, NaiveDate, Utc};
use gitvault_types::{
    JournalFile, JournalFrontmatter, JournalIndexRecord, JournalSections, JournalStats, RecordFile, SaveJournalRequest,
};

use super::timestamp;
use crate::codec::{Frontmatter, HeaderReader, HeaderWriter};
use crate::index::{Domain, IndexEntry};

/// Streak length at which the journal streak is highlighted
pub const HIGHLIGHT_STREAK: u32 = 5;
/// Project whose id receives journal XP
pub const SELF_GROWTH_PROJECT: &str = "自我成長";
pub const JOURNAL_XP_MINUTES: f64 = 10.0;
pub const JOURNAL_ATTRIBUTES: [&str; 4] = ["C", "R", "T", "EV"];

pub struct Journal;

impl Domain for Journal {
    type Frontmatter = JournalFrontmatter;
    type Entry = JournalIndexRecord;

    const LABEL: &'static str = "journal";
    const INDEX_PATH: &'static str = "journal/_index/index.json";

    fn key(fm: &JournalFrontmatter) -> &str {
        &fm.date
    }

    fn title(fm: &JournalFrontmatter) -> &str {
        &fm.date
    }

    fn record_path(fm: &JournalFrontmatter) -> String {
        journal_path(&fm.date)
    }

    fn project(fm: &JournalFrontmatter, file_path: &str) -> JournalIndexRecord {
        JournalIndexRecord {
            date: fm.date.clone(),
            updated_at: fm.updated_at.clone(),
            file_path: file_path.to_string(),
        }
    }

    /// Most recent date first
    fn insert(index: &mut Vec<JournalIndexRecord>, entry: JournalIndexRecord) {
        index.retain(|e| e.date != entry.date);
        index.push(entry);
        index.sort_by(|a, b| b.date.cmp(&a.date));
    }

    fn create_message(fm: &JournalFrontmatter) -> String {
        format!("feat(journal): save {}", fm.date)
    }

    fn update_message(fm: &JournalFrontmatter) -> String {
        format!("feat(journal): save {}", fm.date)
    }
}

impl IndexEntry for JournalIndexRecord {
    fn key(&self) -> &str {
        &self.date
    }

    fn file_path(&self) -> &str {
        &self.file_path
    }
}

impl Frontmatter for JournalFrontmatter {
    fn write_header(&self, w: &mut HeaderWriter) {
        w.text("date", &self.date)
            .text("created_at", &self.created_at)
            .text("updated_at", &self.updated_at)
            .section("sections", |s| {
                s.text("accomplishment", &self.sections.accomplishment)
                    .text("gratitude", &self.sections.gratitude)
                    .text("insight", &self.sections.insight)
                    .text("reflection", &self.sections.reflection)
                    .text("focus", &self.sections.focus);
            });
    }

    fn read_header(r: &HeaderReader<'_>) -> Self {
        let sections = r.section("sections");
        Self {
            date: r.text("date"),
            created_at: r.text("created_at"),
            updated_at: r.text("updated_at"),
            sections: JournalSections {
                accomplishment: sections.text("accomplishment"),
                gratitude: sections.text("gratitude"),
                insight: sections.text("insight"),
                reflection: sections.text("reflection"),
                focus: sections.text("focus"),
            },
        }
    }
}

/// `journal/{yyyy}/{mm}/{date}.md`
pub fn journal_path(date: &str) -> String {
    match (date.get(..4), date.get(5..7)) {
        (Some(year), Some(month)) => format!("journal/{}/{}/{}.md", year, month, date),
        _ => format!("journal/{}.md", date),
    }
}

pub fn render_body(sections: &JournalSections) -> String {
    [
        "## 成果與感謝 (Accomplishments & Gratitude)",
        "### 今日成就",
        sections.accomplishment.as_str(),
        "",
        "### 今日感謝",
        sections.gratitude.as_str(),
        "",
        "## 學習與洞察 (Learning & Insight)",
        "### 今日洞察",
        sections.insight.as_str(),
        "",
        "### 自我反思",
        sections.reflection.as_str(),
        "",
        "## 明日的準備 (Preparation for Tomorrow)",
        "### 明日焦點",
        sections.focus.as_str(),
    ]
    .join("\n")
}

/// Build the entry for `date`, keeping `created_at` of an existing entry.
pub fn build_entry(
    date: NaiveDate,
    existing_created_at: Option<String>,
    now: DateTime<Utc>,
    req: SaveJournalRequest,
) -> JournalFile {
    let stamp = timestamp(now);
    let sections = JournalSections {
        accomplishment: req.accomplishment.unwrap_or_default(),
        gratitude: req.gratitude.unwrap_or_default(),
        insight: req.insight.unwrap_or_default(),
        reflection: req.reflection.unwrap_or_default(),
        focus: req.focus.unwrap_or_default(),
    };
    let content = render_body(&sections);
    RecordFile {
        frontmatter: JournalFrontmatter {
            date: date.format("%Y-%m-%d").to_string(),
            created_at: existing_created_at
                .filter(|c| !c.is_empty())
                .unwrap_or_else(|| stamp.clone()),
            updated_at: stamp,
            sections,
        },
        content,
    }
}

/// An empty entry for a date nothing was written for yet
pub fn empty_entry(date: NaiveDate, indexed: Option<&JournalIndexRecord>) -> JournalFrontmatter {
    let stamp = indexed.map(|e| e.updated_at.clone()).unwrap_or_default();
    JournalFrontmatter {
        date: date.format("%Y-%m-%d").to_string(),
        created_at: stamp.clone(),
        updated_at: stamp,
        sections: JournalSections::default(),
    }
}

/// Consecutive days with an entry, ending `today`.
pub fn stats(index: &[JournalIndexRecord], today: NaiveDate) -> JournalStats {
    let has = |day: NaiveDate| {
        let key = day.format("%Y-%m-%d").to_string();
        index.iter().any(|e| e.date == key)
    };
    let mut streak = 0;
    let mut cursor = Some(today);
    while let Some(day) = cursor.filter(|d| has(*d)) {
        streak += 1;
        cursor = day.checked_sub_days(Days::new(1));
    }
    JournalStats {
        streak,
        has_today: has(today),
        highlight: streak >= HIGHLIGHT_STREAK,
    }
}
