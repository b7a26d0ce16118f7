//! File-based hand-off of finished interviews.
//!
//! Writes two documents next to the call's recordings:
//! - `transcript.json` - call id, completion flag and the ordered transcript
//! - `metadata.json` - the flattened applicant profile plus `call_id` and
//!   `is_job_seeking`, the flag the recommendation pipeline flips once it has placed
//!   the applicant

use async_trait::async_trait;
use serde::Serialize;
use tracing::info;

use super::{ApplicantProfile, CollaboratorResult, InterviewRecord, TranscriptSink};
use crate::core::artifacts::SessionArtifacts;
use crate::core::dialogue::TranscriptLine;

#[derive(Serialize)]
struct TranscriptDocument<'a> {
    call_id: &'a str,
    completed: bool,
    history: &'a [TranscriptLine],
    /// Lines as spoken, `AI : ...` / `User : ...`
    text: Vec<String>,
}

#[derive(Serialize)]
struct MetadataDocument<'a> {
    call_id: &'a str,
    #[serde(flatten)]
    profile: &'a ApplicantProfile,
    is_job_seeking: bool,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct FileTranscriptSink;

impl FileTranscriptSink {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TranscriptSink for FileTranscriptSink {
    async fn emit(&self, record: &InterviewRecord) -> CollaboratorResult<()> {
        tokio::fs::create_dir_all(&record.artifact_dir).await?;

        let transcript = TranscriptDocument {
            call_id: &record.call_id,
            completed: record.completed,
            history: &record.history,
            text: record.history.iter().map(TranscriptLine::render).collect(),
        };
        let metadata = MetadataDocument {
            call_id: &record.call_id,
            profile: &record.profile,
            is_job_seeking: false,
        };

        let transcript_path = record.artifact_dir.join(SessionArtifacts::TRANSCRIPT_FILE);
        let metadata_path = record.artifact_dir.join(SessionArtifacts::METADATA_FILE);
        tokio::fs::write(&transcript_path, serde_json::to_vec_pretty(&transcript)?).await?;
        tokio::fs::write(&metadata_path, serde_json::to_vec_pretty(&metadata)?).await?;

        info!(
            call_id = %record.call_id,
            dir = %record.artifact_dir.display(),
            "Interview record written"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::dialogue::Speaker;

    #[tokio::test]
    async fn test_writes_transcript_and_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let record = InterviewRecord {
            call_id: "CA1".to_string(),
            artifact_dir: dir.path().join("20250101_090000_CA1"),
            history: vec![
                TranscriptLine::new(Speaker::Ai, "어디에 사세요?"),
                TranscriptLine::new(Speaker::User, "수원이요"),
            ],
            profile: ApplicantProfile {
                location: "수원".to_string(),
                location_tag: Some("경기".to_string()),
                ..Default::default()
            },
            completed: true,
        };

        FileTranscriptSink::new().emit(&record).await.unwrap();

        let transcript: serde_json::Value = serde_json::from_slice(
            &std::fs::read(record.artifact_dir.join("transcript.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(transcript["completed"], true);
        assert_eq!(transcript["text"][0], "AI : 어디에 사세요?");
        assert_eq!(transcript["text"][1], "User : 수원이요");

        let metadata: serde_json::Value = serde_json::from_slice(
            &std::fs::read(record.artifact_dir.join("metadata.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(metadata["call_id"], "CA1");
        assert_eq!(metadata["location"], "수원");
        assert_eq!(metadata["location_tag"], "경기");
        assert_eq!(metadata["is_job_seeking"], false);
    }
}
