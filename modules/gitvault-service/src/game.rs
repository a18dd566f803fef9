//! XP awards, focus sessions and the stats derived from their logs.

use std::collections::HashSet;

use chrono::{DateTime, Datelike, Days, Local, NaiveDate, Utc};
use gitvault_types::{
    AwardOutcome, AwardXpRequest, CompleteFocusRequest, FocusEntry, FocusOutcome, FocusStats, HistoryQuery, XpEntry,
    XpProfile,
};

use crate::attributes;
use crate::domains::timestamp;
use crate::error::StoreError;
use crate::event_log::{AppendOutcome, EventLog, LogEntry, idempotency_key, parse_date};

/// A focus session counts toward stats from 20 minutes on
pub const FOCUS_VALID_THRESHOLD_SEC: i64 = 20 * 60;
pub const PROFILE_WINDOW_DAYS: u64 = 180;
pub const FOCUS_WINDOW_DAYS: u64 = 90;
/// Upper bound of one grant, a full day
pub const MAX_AWARD_MINUTES: f64 = 24.0 * 60.0;
/// Upper bound of one focus session
pub const MAX_FOCUS_SECONDS: i64 = 24 * 60 * 60;

const LEVEL_BASE_XP: i64 = 100;
const LEVEL_GROWTH: f64 = 1.2;

impl LogEntry for XpEntry {
    const FAMILY: &'static str = "game/xp";

    fn date(&self) -> &str {
        &self.date
    }

    fn source(&self) -> &str {
        &self.source
    }

    fn idempotency_key(&self) -> &str {
        &self.idempotency_key
    }

    fn tiebreak(&self) -> &str {
        &self.task_title
    }

    fn commit_message(&self) -> String {
        let subject = if self.task_title.is_empty() {
            &self.task_id
        } else {
            &self.task_title
        };
        format!("chore(xp): {} {} +{}", self.source, subject, self.xp)
    }
}

impl LogEntry for FocusEntry {
    const FAMILY: &'static str = "game/focus";

    fn date(&self) -> &str {
        &self.date
    }

    fn source(&self) -> &str {
        &self.source
    }

    fn idempotency_key(&self) -> &str {
        &self.idempotency_key
    }

    fn tiebreak(&self) -> &str {
        &self.started_at
    }

    fn commit_message(&self) -> String {
        let subject = if self.task_title.is_empty() {
            &self.task_id
        } else {
            &self.task_title
        };
        format!("chore(focus): log {} {}", self.date, subject)
    }
}

fn day_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Local calendar day of an RFC 3339 timestamp
fn local_day(value: &str) -> Option<NaiveDate> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|t| t.with_timezone(&Local).date_naive())
}

fn requested_day(value: Option<&str>) -> Result<Option<NaiveDate>, StoreError> {
    value.filter(|v| !v.trim().is_empty()).map(parse_date).transpose()
}

// =====================================================
// XP
// =====================================================

pub fn build_xp_entry(req: AwardXpRequest, today: NaiveDate, now: DateTime<Utc>) -> Result<XpEntry, StoreError> {
    let source = req
        .source
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| "manual".to_string());
    let date = day_key(requested_day(req.date.as_deref())?.unwrap_or(today));
    if !req.minutes.is_finite() || req.minutes > MAX_AWARD_MINUTES {
        return Err(StoreError::Invalid(format!(
            "minutes must be a number up to {}",
            MAX_AWARD_MINUTES
        )));
    }
    let xp = req.minutes.round().max(0.0) as i64;
    let attributes = match req.attributes {
        Some(given) if !given.is_empty() => attributes::normalize(&given),
        _ => attributes::detect(&req.task_title),
    };

    Ok(XpEntry {
        idempotency_key: idempotency_key(&source, &req.task_id, &date),
        date,
        ts: timestamp(now),
        source,
        task_id: req.task_id,
        task_title: req.task_title,
        skill_key: req.project_id.clone(),
        project_id: req.project_id,
        minutes: xp,
        xp,
        attributes,
    })
}

pub async fn award_xp(
    log: &EventLog<XpEntry>,
    req: AwardXpRequest,
    today: NaiveDate,
    now: DateTime<Utc>,
) -> Result<AwardOutcome, StoreError> {
    let entry = build_xp_entry(req, today, now)?;
    let outcome = log.append(&entry).await?;
    if outcome == AppendOutcome::Appended {
        let labels: Vec<&str> = entry.attributes.iter().filter_map(|a| attributes::label(a)).collect();
        log::info!("[XP] +{} for {} [{}]", entry.xp, entry.task_id, labels.join(", "));
    }
    Ok(AwardOutcome {
        skipped: outcome == AppendOutcome::Skipped,
        xp: entry.xp,
        attributes: entry.attributes,
        project_id: entry.project_id,
    })
}

pub async fn xp_history(log: &EventLog<XpEntry>, query: &HistoryQuery) -> Result<Vec<XpEntry>, StoreError> {
    let (Some(from), Some(to)) = (
        requested_day(query.from.as_deref())?,
        requested_day(query.to.as_deref())?,
    ) else {
        return Err(StoreError::Invalid("from/to required (YYYY-MM-DD)".to_string()));
    };
    let sources: Vec<String> = query
        .source
        .as_deref()
        .unwrap_or("")
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    log.read_range(from, to, &sources).await
}

/// Level 1 needs 100 XP, each next level 1.2× the previous requirement.
pub fn level_from_xp(total: i64) -> XpProfile {
    let mut level = 1;
    let mut need = LEVEL_BASE_XP;
    let mut remain = total.max(0);
    while remain >= need {
        remain -= need;
        level += 1;
        need = (need as f64 * LEVEL_GROWTH).round() as i64;
    }
    XpProfile {
        total_xp: total,
        level,
        progress: remain as f64 / need as f64,
        next_req: need,
    }
}

pub async fn xp_profile(log: &EventLog<XpEntry>, today: NaiveDate) -> Result<XpProfile, StoreError> {
    let from = today
        .checked_sub_days(Days::new(PROFILE_WINDOW_DAYS - 1))
        .unwrap_or(today);
    let total = log
        .read_range(from, today, &[])
        .await?
        .iter()
        .fold(0i64, |acc, e| acc.saturating_add(e.xp));
    Ok(level_from_xp(total))
}

// =====================================================
// Focus
// =====================================================

pub fn build_focus_entry(req: CompleteFocusRequest, today: NaiveDate) -> Result<FocusEntry, StoreError> {
    if req.started_at.trim().is_empty() {
        return Err(StoreError::Invalid("started_at required".to_string()));
    }
    if req.seconds > MAX_FOCUS_SECONDS {
        return Err(StoreError::Invalid(format!(
            "seconds must be at most {}",
            MAX_FOCUS_SECONDS
        )));
    }
    let date = match requested_day(req.date.as_deref())? {
        Some(day) => day,
        None => local_day(&req.ended_at).unwrap_or(today),
    };
    let date = day_key(date);
    let subject = format!("{}@{}", req.task_id, req.started_at);

    Ok(FocusEntry {
        idempotency_key: idempotency_key("focus", &subject, &date),
        date,
        started_at: req.started_at,
        ended_at: req.ended_at,
        seconds: req.seconds.max(0),
        task_id: req.task_id,
        task_title: req.task_title,
        mode: "focus".to_string(),
        completed: true,
        valid_threshold_sec: FOCUS_VALID_THRESHOLD_SEC,
        valid: req.seconds >= FOCUS_VALID_THRESHOLD_SEC,
        source: "focus".to_string(),
    })
}

pub async fn complete_focus(
    log: &EventLog<FocusEntry>,
    req: CompleteFocusRequest,
    today: NaiveDate,
) -> Result<FocusOutcome, StoreError> {
    let entry = build_focus_entry(req, today)?;
    let outcome = log.append(&entry).await?;
    Ok(FocusOutcome {
        skipped: outcome == AppendOutcome::Skipped,
        valid: entry.valid,
    })
}

fn session_day(entry: &FocusEntry) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(&entry.date, "%Y-%m-%d")
        .ok()
        .or_else(|| local_day(&entry.ended_at))
}

/// Streaks over the last `FOCUS_WINDOW_DAYS` and this week's (Mon-Sun) totals.
pub fn summarize_focus(entries: &[FocusEntry], today: NaiveDate) -> FocusStats {
    let valid: Vec<&FocusEntry> = entries
        .iter()
        .filter(|e| e.mode == "focus" && e.valid)
        .collect();
    let days: HashSet<NaiveDate> = valid.iter().filter_map(|e| session_day(e)).collect();
    let back = |n: u64| today.checked_sub_days(Days::new(n));

    let mut streak = 0;
    for n in 0..FOCUS_WINDOW_DAYS {
        match back(n) {
            Some(day) if days.contains(&day) => streak += 1,
            _ => break,
        }
    }

    let (mut best, mut run) = (0, 0);
    for n in (0..=FOCUS_WINDOW_DAYS).rev() {
        if back(n).is_some_and(|day| days.contains(&day)) {
            run += 1;
            best = u32::max(best, run);
        } else {
            run = 0;
        }
    }

    let monday = back(u64::from(today.weekday().num_days_from_monday())).unwrap_or(today);
    let sunday = monday.checked_add_days(Days::new(6)).unwrap_or(today);
    let this_week: Vec<&&FocusEntry> = valid
        .iter()
        .filter(|e| {
            local_day(&e.ended_at)
                .or_else(|| session_day(e))
                .is_some_and(|d| d >= monday && d <= sunday)
        })
        .collect();
    let seconds = this_week.iter().fold(0i64, |acc, e| acc.saturating_add(e.seconds));

    FocusStats {
        streak,
        best,
        week_count: this_week.len() as u32,
        week_minutes: (seconds as f64 / 60.0).round() as i64,
    }
}

pub async fn focus_stats(log: &EventLog<FocusEntry>, today: NaiveDate) -> Result<FocusStats, StoreError> {
    let from = today
        .checked_sub_days(Days::new(FOCUS_WINDOW_DAYS))
        .unwrap_or(today);
    let entries = log.read_range(from, today, &[]).await?;
    Ok(summarize_focus(&entries, today))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_log::LogBackend;
    use crate::fallback::FallbackLog;
    use chrono::TimeZone;
    use std::sync::Arc;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).unwrap()
    }

    fn award(task_id: &str, title: &str, minutes: f64) -> AwardXpRequest {
        AwardXpRequest {
            source: Some("task".into()),
            task_id: task_id.into(),
            task_title: title.into(),
            project_id: "p1".into(),
            minutes,
            date: Some("2024-05-01".into()),
            attributes: None,
        }
    }

    fn session(date: &str, ended_at: &str, seconds: i64) -> FocusEntry {
        FocusEntry {
            date: date.into(),
            started_at: format!("{}T08:00:00.000Z", date),
            ended_at: ended_at.into(),
            seconds,
            mode: "focus".into(),
            completed: true,
            valid_threshold_sec: FOCUS_VALID_THRESHOLD_SEC,
            valid: seconds >= FOCUS_VALID_THRESHOLD_SEC,
            source: "focus".into(),
            ..FocusEntry::default()
        }
    }

    #[test]
    fn test_xp_entry_fields() {
        let entry = build_xp_entry(award("t1", "深度閱讀", 24.6), day(2024, 5, 10), now()).unwrap();
        assert_eq!(entry.idempotency_key, "task:t1:2024-05-01");
        assert_eq!(entry.xp, 25);
        assert_eq!(entry.minutes, 25);
        assert_eq!(entry.attributes, vec!["C"]);
        assert_eq!(entry.skill_key, "p1");
        assert_eq!(entry.ts, "2024-05-10T12:00:00.000Z");
    }

    #[test]
    fn test_xp_defaults_and_clamping() {
        let mut req = award("t1", "x", -5.0);
        req.source = None;
        req.date = None;
        req.attributes = Some(vec!["T".into(), "C".into()]);
        let entry = build_xp_entry(req, day(2024, 5, 10), now()).unwrap();
        assert_eq!(entry.source, "manual");
        assert_eq!(entry.date, "2024-05-10");
        assert_eq!(entry.xp, 0);
        assert_eq!(entry.attributes, vec!["C", "T"]);
    }

    #[test]
    fn test_xp_rejects_oversized_or_non_numeric_minutes() {
        for minutes in [1e300, f64::INFINITY, f64::NAN, MAX_AWARD_MINUTES + 1.0] {
            let result = build_xp_entry(award("t1", "x", minutes), day(2024, 5, 10), now());
            assert!(matches!(result, Err(StoreError::Invalid(_))), "minutes {}", minutes);
        }
        let full_day = build_xp_entry(award("t1", "x", MAX_AWARD_MINUTES), day(2024, 5, 10), now()).unwrap();
        assert_eq!(full_day.xp, 1440);
    }

    #[tokio::test]
    async fn test_profile_total_saturates_on_hand_edited_log() {
        let backend = Arc::new(FallbackLog::new());
        let huge = |task_id: &str| {
            serde_json::to_string(&XpEntry {
                date: "2024-05-01".into(),
                task_id: task_id.into(),
                xp: i64::MAX,
                idempotency_key: idempotency_key("task", task_id, "2024-05-01"),
                ..XpEntry::default()
            })
            .unwrap()
        };
        let content = format!("{}\n{}\n", huge("t1"), huge("t2"));
        backend.write("game/xp/2024-05.jsonl", content, "seed", None).await.unwrap();
        let log: EventLog<XpEntry> = EventLog::new(backend, 3);

        let profile = xp_profile(&log, day(2024, 5, 10)).await.unwrap();
        assert_eq!(profile.total_xp, i64::MAX);
    }

    #[tokio::test]
    async fn test_award_twice_is_skipped() {
        let log: EventLog<XpEntry> = EventLog::new(Arc::new(FallbackLog::new()), 3);
        let first = award_xp(&log, award("t1", "a", 25.0), day(2024, 5, 10), now())
            .await
            .unwrap();
        let second = award_xp(&log, award("t1", "a", 25.0), day(2024, 5, 10), now())
            .await
            .unwrap();
        assert!(!first.skipped);
        assert_eq!(first.xp, 25);
        assert!(second.skipped);
        assert_eq!(log.read_month("2024-05").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_history_requires_range() {
        let log: EventLog<XpEntry> = EventLog::new(Arc::new(FallbackLog::new()), 3);
        let result = xp_history(
            &log,
            &HistoryQuery {
                from: Some("2024-05-01".into()),
                ..HistoryQuery::default()
            },
        )
        .await;
        assert!(matches!(result, Err(StoreError::Invalid(_))));
    }

    #[tokio::test]
    async fn test_history_source_filter() {
        let log: EventLog<XpEntry> = EventLog::new(Arc::new(FallbackLog::new()), 3);
        award_xp(&log, award("t1", "b", 5.0), day(2024, 5, 10), now()).await.unwrap();
        let mut journal = award("journal-2024-05-01", "日記 2024-05-01", 10.0);
        journal.source = Some("journal".into());
        award_xp(&log, journal, day(2024, 5, 10), now()).await.unwrap();

        let query = |source: Option<&str>| HistoryQuery {
            from: Some("2024-05-01".into()),
            to: Some("2024-05-31".into()),
            source: source.map(String::from),
        };
        assert_eq!(xp_history(&log, &query(None)).await.unwrap().len(), 2);
        let journal_only = xp_history(&log, &query(Some("journal, focus"))).await.unwrap();
        assert_eq!(journal_only.len(), 1);
        assert_eq!(journal_only[0].source, "journal");
    }

    #[test]
    fn test_level_curve() {
        let start = level_from_xp(0);
        assert_eq!((start.level, start.next_req), (1, 100));
        assert_eq!(start.progress, 0.0);

        let two = level_from_xp(100);
        assert_eq!((two.level, two.next_req), (2, 120));

        let three = level_from_xp(250);
        assert_eq!((three.level, three.next_req), (3, 144));
        assert!((three.progress - 30.0 / 144.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_profile_sums_recent_window() {
        let log: EventLog<XpEntry> = EventLog::new(Arc::new(FallbackLog::new()), 3);
        let mut old = award("t0", "old", 500.0);
        old.date = Some("2023-01-01".into());
        award_xp(&log, old, day(2024, 5, 10), now()).await.unwrap();
        award_xp(&log, award("t1", "a", 60.0), day(2024, 5, 10), now()).await.unwrap();
        let mut recent = award("t2", "b", 50.0);
        recent.date = Some("2024-05-10".into());
        award_xp(&log, recent, day(2024, 5, 10), now()).await.unwrap();

        let profile = xp_profile(&log, day(2024, 5, 10)).await.unwrap();
        assert_eq!(profile.total_xp, 110);
        assert_eq!(profile.level, 2);
    }

    #[test]
    fn test_focus_entry_key_uses_session_start() {
        let req = |started: &str| CompleteFocusRequest {
            started_at: started.into(),
            ended_at: "2024-05-10T09:30:00+00:00".into(),
            seconds: 1500,
            task_id: "t1".into(),
            task_title: "Write".into(),
            date: Some("2024-05-10".into()),
        };
        let a = build_focus_entry(req("2024-05-10T09:00:00.000Z"), day(2024, 5, 10)).unwrap();
        let b = build_focus_entry(req("2024-05-10T14:00:00.000Z"), day(2024, 5, 10)).unwrap();
        assert_eq!(a.idempotency_key, "focus:t1@2024-05-10T09:00:00.000Z:2024-05-10");
        assert_ne!(a.idempotency_key, b.idempotency_key);
        assert!(a.valid);

        let short = CompleteFocusRequest {
            seconds: 600,
            ..req("2024-05-10T15:00:00.000Z")
        };
        assert!(!build_focus_entry(short, day(2024, 5, 10)).unwrap().valid);
    }

    #[tokio::test]
    async fn test_focus_retry_is_suppressed() {
        let log: EventLog<FocusEntry> = EventLog::new(Arc::new(FallbackLog::new()), 3);
        let req = || CompleteFocusRequest {
            started_at: "2024-05-10T09:00:00.000Z".into(),
            ended_at: "2024-05-10T09:30:00.000Z".into(),
            seconds: 1800,
            task_id: "t1".into(),
            task_title: "Write".into(),
            date: Some("2024-05-10".into()),
        };
        assert!(!complete_focus(&log, req(), day(2024, 5, 10)).await.unwrap().skipped);
        assert!(complete_focus(&log, req(), day(2024, 5, 10)).await.unwrap().skipped);
    }

    #[test]
    fn test_summarize_focus() {
        // 2024-05-10 is a Friday; the week runs 05-06 .. 05-12
        let entries = vec![
            session("2024-05-10", "2024-05-10T12:00:00+00:00", 1800),
            session("2024-05-09", "2024-05-09T12:00:00+00:00", 1500),
            session("2024-05-08", "2024-05-08T12:00:00+00:00", 1200),
            session("2024-05-07", "2024-05-07T12:00:00+00:00", 600),
            session("2024-05-01", "2024-05-01T12:00:00+00:00", 1200),
            session("2024-05-02", "2024-05-02T12:00:00+00:00", 1200),
            session("2024-05-03", "2024-05-03T12:00:00+00:00", 1200),
            session("2024-05-04", "2024-05-04T12:00:00+00:00", 1200),
        ];
        let stats = summarize_focus(&entries, day(2024, 5, 10));
        assert_eq!(stats.streak, 3);
        assert_eq!(stats.best, 4);
        assert_eq!(stats.week_count, 3);
        assert_eq!(stats.week_minutes, 75);
    }

    #[test]
    fn test_focus_rejects_oversized_session() {
        let req = CompleteFocusRequest {
            started_at: "2024-05-10T09:00:00.000Z".into(),
            ended_at: "2024-05-10T09:30:00.000Z".into(),
            seconds: i64::MAX,
            task_id: "t1".into(),
            ..CompleteFocusRequest::default()
        };
        assert!(matches!(
            build_focus_entry(req, day(2024, 5, 10)),
            Err(StoreError::Invalid(_))
        ));
    }

    #[test]
    fn test_week_minutes_saturate_on_hand_edited_log() {
        let entries = vec![
            session("2024-05-10", "2024-05-10T12:00:00+00:00", i64::MAX),
            session("2024-05-09", "2024-05-09T12:00:00+00:00", i64::MAX),
        ];
        let stats = summarize_focus(&entries, day(2024, 5, 10));
        assert_eq!(stats.week_count, 2);
        assert!(stats.week_minutes > 0);
    }
}
