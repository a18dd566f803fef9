use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, Utc};
use gitvault_types::{
    AudioMeta, BinaryUpload, CaptureIdeaRequest, IdeaFile, IdeaFrontmatter, IdeaIndexRecord, IdeaStatus,
    RecordFile, Relations, TranscriptMeta, UpdateIdeaRequest,
};

use super::{month_shard, sharded_path, timestamp};
use crate::codec::{Frontmatter, HeaderReader, HeaderWriter};
use crate::commit::FileChange;
use crate::error::StoreError;
use crate::index::{Domain, IndexEntry};

const DEFAULT_IMPORTANCE: i32 = 3;
const TITLE_MAX_CHARS: usize = 80;

pub struct Ideas;

impl Domain for Ideas {
    type Frontmatter = IdeaFrontmatter;
    type Entry = IdeaIndexRecord;

    const LABEL: &'static str = "idea";
    const INDEX_PATH: &'static str = "ideas/_index/index.json";

    fn key(fm: &IdeaFrontmatter) -> &str {
        &fm.id
    }

    fn title(fm: &IdeaFrontmatter) -> &str {
        &fm.title
    }

    fn record_path(fm: &IdeaFrontmatter) -> String {
        sharded_path("ideas", &fm.id, &fm.created_at, "md")
    }

    fn project(fm: &IdeaFrontmatter, file_path: &str) -> IdeaIndexRecord {
        IdeaIndexRecord {
            id: fm.id.clone(),
            title: fm.title.clone(),
            created_at: fm.created_at.clone(),
            updated_at: fm.updated_at.clone(),
            tags: fm.tags.clone(),
            status: fm.status,
            importance: fm.importance,
            audio_url: fm.audio.url.clone(),
            project_id: fm.project_id.clone(),
            file_path: file_path.to_string(),
        }
    }
}

impl IndexEntry for IdeaIndexRecord {
    fn key(&self) -> &str {
        &self.id
    }

    fn file_path(&self) -> &str {
        &self.file_path
    }
}

impl Frontmatter for IdeaFrontmatter {
    fn write_header(&self, w: &mut HeaderWriter) {
        w.text("id", &self.id)
            .text("title", &self.title)
            .text("created_at", &self.created_at)
            .text("updated_at", &self.updated_at)
            .text("status", self.status.as_str())
            .number("importance", self.importance)
            .list("tags", &self.tags)
            .text("project_id", &self.project_id)
            .section("audio", |s| {
                s.text("url", &self.audio.url)
                    .number("duration_sec", self.audio.duration_sec);
            })
            .section("transcript", |s| {
                s.text("model", &self.transcript.model)
                    .number("confidence", self.transcript.confidence);
            })
            .text("summary", &self.summary)
            .section("relations", |s| {
                s.list("links", &self.relations.links);
            });
    }

    fn read_header(r: &HeaderReader<'_>) -> Self {
        let audio = r.section("audio");
        let transcript = r.section("transcript");
        Self {
            id: r.text("id"),
            title: r.text("title"),
            created_at: r.text("created_at"),
            updated_at: r.text("updated_at"),
            status: IdeaStatus::parse(&r.text("status")).unwrap_or_default(),
            importance: i32::try_from(r.int("importance")).unwrap_or(DEFAULT_IMPORTANCE),
            tags: r.list("tags"),
            project_id: r.text("project_id"),
            audio: AudioMeta {
                url: audio.text("url"),
                duration_sec: audio.float("duration_sec"),
            },
            transcript: TranscriptMeta {
                model: transcript.text("model"),
                confidence: transcript.float("confidence"),
            },
            summary: r.text("summary"),
            relations: Relations {
                links: r.section("relations").list("links"),
            },
        }
    }
}

/// File extension for an uploaded audio content type
pub fn audio_extension(content_type: &str) -> &'static str {
    let ct = content_type.to_ascii_lowercase();
    if ct.contains("mp4") || ct.contains("aac") || ct.contains("m4a") {
        "m4a"
    } else if ct.contains("mpeg") {
        "mp3"
    } else {
        "webm"
    }
}

/// `public/audio/{yyyy}/{mm}/{id}.{ext}`
pub fn audio_path(id: &str, created_at: &str, ext: &str) -> String {
    format!("public/audio/{}/{}.{}", month_shard(created_at), id, ext)
}

fn title_from_text(text: &str) -> String {
    let first = text.lines().next().unwrap_or("").trim();
    if first.is_empty() {
        return "Untitled".to_string();
    }
    first.chars().take(TITLE_MAX_CHARS).collect()
}

fn decode_upload(upload: &BinaryUpload) -> Result<Vec<u8>, StoreError> {
    BASE64
        .decode(upload.data_base64.trim())
        .map_err(|e| StoreError::Invalid(format!("audio is not valid base64: {}", e)))
}

/// Build a new idea and its optional audio attachment.
pub fn capture(id: String, now: DateTime<Utc>, req: CaptureIdeaRequest) -> Result<(IdeaFile, Vec<FileChange>), StoreError> {
    let text = req.text.unwrap_or_default();
    if text.trim().is_empty() && req.audio.is_none() {
        return Err(StoreError::Invalid("No audio or text provided".to_string()));
    }

    let created_at = timestamp(now);
    let mut attachments = Vec::new();
    let mut audio = AudioMeta {
        url: String::new(),
        duration_sec: req.duration_sec.unwrap_or(0.0),
    };
    if let Some(upload) = &req.audio {
        let bytes = decode_upload(upload)?;
        let path = audio_path(&id, &created_at, audio_extension(&upload.content_type));
        audio.url = path.clone();
        attachments.push(FileChange::binary(path, bytes));
    }

    let title = match req.title.map(|t| t.trim().to_string()) {
        Some(t) if !t.is_empty() => t,
        _ => title_from_text(&text),
    };

    let frontmatter = IdeaFrontmatter {
        id,
        title,
        created_at: created_at.clone(),
        updated_at: created_at,
        status: req
            .status
            .as_deref()
            .and_then(IdeaStatus::parse)
            .unwrap_or_default(),
        importance: req.importance.unwrap_or(DEFAULT_IMPORTANCE),
        tags: req.tags.unwrap_or_default(),
        project_id: req.project_id.unwrap_or_default(),
        audio,
        transcript: TranscriptMeta::default(),
        summary: String::new(),
        relations: Relations::default(),
    };
    Ok((
        RecordFile {
            frontmatter,
            content: text,
        },
        attachments,
    ))
}

pub fn apply_update(file: &mut IdeaFile, req: &UpdateIdeaRequest, now: DateTime<Utc>) {
    let fm = &mut file.frontmatter;
    if let Some(title) = &req.title {
        fm.title = title.clone();
    }
    if let Some(tags) = &req.tags {
        fm.tags = tags.clone();
    }
    if let Some(importance) = req.importance {
        fm.importance = importance;
    }
    if let Some(status) = req.status.as_deref().and_then(IdeaStatus::parse) {
        fm.status = status;
    }
    if let Some(project_id) = &req.project_id {
        fm.project_id = project_id.clone();
    }
    if let Some(summary) = &req.summary {
        fm.summary = summary.clone();
    }
    if let Some(transcript) = &req.transcript {
        file.content = transcript.clone();
    }
    file.frontmatter.updated_at = timestamp(now);
}

/// Newest first by creation time
pub fn sort_newest_first(items: &mut [IdeaIndexRecord]) {
    items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap()
    }

    #[test]
    fn test_capture_from_text() {
        let (file, attachments) = capture(
            "idea_1_abcdef".into(),
            now(),
            CaptureIdeaRequest {
                text: Some("Build a garden shed\nwith a green roof".into()),
                tags: Some(vec!["home".into()]),
                ..CaptureIdeaRequest::default()
            },
        )
        .unwrap();

        assert!(attachments.is_empty());
        assert_eq!(file.frontmatter.title, "Build a garden shed");
        assert_eq!(file.frontmatter.status, IdeaStatus::Draft);
        assert_eq!(file.frontmatter.importance, 3);
        assert_eq!(file.frontmatter.created_at, "2024-05-01T10:00:00.000Z");
        assert_eq!(Ideas::record_path(&file.frontmatter), "ideas/2024/05/idea_1_abcdef.md");
    }

    #[test]
    fn test_capture_requires_text_or_audio() {
        let result = capture("idea_1".into(), now(), CaptureIdeaRequest::default());
        assert!(matches!(result, Err(StoreError::Invalid(_))));
    }

    #[test]
    fn test_capture_with_audio_attachment() {
        let (file, attachments) = capture(
            "idea_2".into(),
            now(),
            CaptureIdeaRequest {
                audio: Some(BinaryUpload {
                    content_type: "audio/mp4".into(),
                    data_base64: BASE64.encode([1u8, 2, 3]),
                }),
                duration_sec: Some(12.5),
                ..CaptureIdeaRequest::default()
            },
        )
        .unwrap();

        assert_eq!(file.frontmatter.title, "Untitled");
        assert_eq!(file.frontmatter.audio.url, "public/audio/2024/05/idea_2.m4a");
        assert_eq!(file.frontmatter.audio.duration_sec, 12.5);
        assert_eq!(
            attachments,
            vec![FileChange::binary("public/audio/2024/05/idea_2.m4a", vec![1, 2, 3])]
        );
        assert_eq!(Ideas::project(&file.frontmatter, "x").audio_url, file.frontmatter.audio.url);
    }

    #[test]
    fn test_long_first_line_is_truncated() {
        let text = "x".repeat(200);
        let (file, _) = capture(
            "idea_3".into(),
            now(),
            CaptureIdeaRequest {
                text: Some(text),
                ..CaptureIdeaRequest::default()
            },
        )
        .unwrap();
        assert_eq!(file.frontmatter.title.chars().count(), 80);
    }

    #[test]
    fn test_idea_file_round_trip() {
        let (mut file, _) = capture(
            "idea_4".into(),
            now(),
            CaptureIdeaRequest {
                title: Some("Q3: revisit [pricing], \"tiers\"".into()),
                text: Some("Notes\n\n- one\n- two\n".into()),
                tags: Some(vec!["biz, maybe".into(), "pricing".into()]),
                ..CaptureIdeaRequest::default()
            },
        )
        .unwrap();
        file.frontmatter.transcript = TranscriptMeta {
            model: "whisper-1".into(),
            confidence: 0.92,
        };
        file.frontmatter.relations.links = vec!["task_1".into()];

        let parsed: IdeaFile = codec::parse(&codec::serialize(&file)).unwrap();
        assert_eq!(parsed, file);
    }

    #[test]
    fn test_out_of_range_importance_falls_back_to_default() {
        let (file, _) = capture(
            "idea_6".into(),
            now(),
            CaptureIdeaRequest {
                text: Some("x".into()),
                ..CaptureIdeaRequest::default()
            },
        )
        .unwrap();
        let text = codec::serialize(&file).replace("importance: 3", "importance: 3000000000");
        let parsed: IdeaFile = codec::parse(&text).unwrap();
        assert_eq!(parsed.frontmatter.importance, DEFAULT_IMPORTANCE);
    }

    #[test]
    fn test_apply_update() {
        let (mut file, _) = capture(
            "idea_5".into(),
            now(),
            CaptureIdeaRequest {
                text: Some("draft text".into()),
                ..CaptureIdeaRequest::default()
            },
        )
        .unwrap();
        let later = Utc.with_ymd_and_hms(2024, 5, 2, 9, 0, 0).unwrap();
        apply_update(
            &mut file,
            &UpdateIdeaRequest {
                id: "idea_5".into(),
                status: Some("curating".into()),
                transcript: Some("cleaned text".into()),
                importance: Some(5),
                ..UpdateIdeaRequest::default()
            },
            later,
        );
        assert_eq!(file.frontmatter.status, IdeaStatus::Curating);
        assert_eq!(file.frontmatter.importance, 5);
        assert_eq!(file.content, "cleaned text");
        assert_eq!(file.frontmatter.updated_at, "2024-05-02T09:00:00.000Z");
        assert_eq!(file.frontmatter.created_at, "2024-05-01T10:00:00.000Z");
    }
}
