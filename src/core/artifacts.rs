//! Per-call artifact directory
//!
//! Recordings, the transcript and the extracted profile of one call live together in
//! `{recordings_dir}/{YYYYMMDD_HHMMSS}_{call_id}`, with the timestamp taken in Korea
//! Standard Time when the call's driver starts.

use std::path::{Path, PathBuf};

use time::{OffsetDateTime, UtcOffset};

/// Offset of Korea Standard Time from UTC, in hours.
const KST_OFFSET_HOURS: i8 = 9;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionArtifacts {
    dir: PathBuf,
}

impl SessionArtifacts {
    pub const TRANSCRIPT_FILE: &'static str = "transcript.json";
    pub const METADATA_FILE: &'static str = "metadata.json";

    /// Directory for `call_id` stamped with the current time.
    pub fn for_call(root: &Path, call_id: &str) -> Self {
        Self::at(root, call_id, OffsetDateTime::now_utc())
    }

    pub fn at(root: &Path, call_id: &str, when: OffsetDateTime) -> Self {
        let name = format!("{}_{}", kst_stamp(when), sanitize(call_id));
        Self {
            dir: root.join(name),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Audio file for the answer to zero-based `phase`: `USER_0001.wav` for phase 0.
    pub fn answer_path(&self, phase: usize) -> PathBuf {
        self.dir.join(format!("USER_{:04}.wav", phase + 1))
    }

    pub fn transcript_path(&self) -> PathBuf {
        self.dir.join(Self::TRANSCRIPT_FILE)
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.dir.join(Self::METADATA_FILE)
    }

    pub async fn ensure(&self) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.dir).await
    }
}

fn kst_stamp(when: OffsetDateTime) -> String {
    let offset = UtcOffset::from_hms(KST_OFFSET_HOURS, 0, 0).unwrap_or(UtcOffset::UTC);
    let local = when.to_offset(offset);
    format!(
        "{:04}{:02}{:02}_{:02}{:02}{:02}",
        local.year(),
        u8::from(local.month()),
        local.day(),
        local.hour(),
        local.minute(),
        local.second()
    )
}

/// Keep call ids usable as a path component.
fn sanitize(call_id: &str) -> String {
    call_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
