use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
    fs::operations::{read_text, write_text},
    utils::time::date_to_record_name,
};

const FRONT_MATTER_MARKER: &str = "---\n";
const NOTE_EXTENSION: &str = "txt";

/// Free text notes and tags attached to activities. Kept apart from the activity records so both
/// storage backends share them.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NoteStore: Send + Sync {
    /// Replaces notes and tags of an activity.
    async fn save(&self, activity_id: &str, date: NaiveDate, notes: &str, tags: &[String])
        -> Result<()>;

    /// Notes and tags of an activity. Both are empty when nothing was saved.
    async fn get(&self, activity_id: &str, date: NaiveDate) -> Result<(String, Vec<String>)>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct NoteData {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    tags: Vec<String>,
}

/// Keeps one file per activity at `<base>/<YYYY-MM-DD>/<activity id>.txt`. Tags are stored as a
/// YAML front matter block in front of the note text.
pub struct FileNoteStore {
    base: PathBuf,
}

impl FileNoteStore {
    pub fn new(base: PathBuf) -> Self {
        Self { base }
    }

    fn note_path(&self, activity_id: &str, date: NaiveDate) -> PathBuf {
        self.base
            .join(date_to_record_name(date))
            .join(activity_id)
            .with_extension(NOTE_EXTENSION)
    }
}

#[async_trait]
impl NoteStore for FileNoteStore {
    async fn save(
        &self,
        activity_id: &str,
        date: NaiveDate,
        notes: &str,
        tags: &[String],
    ) -> Result<()> {
        let path = self.note_path(activity_id, date);

        let mut content = String::new();
        if !tags.is_empty() {
            let data = NoteData {
                tags: tags.to_vec(),
            };
            content.push_str(FRONT_MATTER_MARKER);
            content.push_str(&serde_yaml::to_string(&data).context("Failed to encode tags")?);
            content.push_str(FRONT_MATTER_MARKER);
        }
        content.push_str(notes);

        debug!("Saving notes to {path:?}");
        write_text(&path, &content)
            .await
            .with_context(|| format!("Failed to save notes for {activity_id}"))
    }

    async fn get(&self, activity_id: &str, date: NaiveDate) -> Result<(String, Vec<String>)> {
        let path = self.note_path(activity_id, date);
        let Some(content) = read_text(&path).await? else {
            return Ok((String::new(), vec![]));
        };
        Ok(parse_note(&content, &path))
    }
}

fn parse_note(content: &str, path: &std::path::Path) -> (String, Vec<String>) {
    if !content.starts_with(FRONT_MATTER_MARKER) {
        return (content.trim().to_string(), vec![]);
    }

    let mut parts = content.splitn(3, FRONT_MATTER_MARKER);
    let (Some(_), Some(front_matter), Some(body)) = (parts.next(), parts.next(), parts.next())
    else {
        return (content.trim().to_string(), vec![]);
    };

    let tags = match serde_yaml::from_str::<Option<NoteData>>(front_matter) {
        Ok(data) => data.unwrap_or_default().tags,
        Err(e) => {
            warn!("Ignoring front matter of {path:?}: {e}");
            vec![]
        }
    };
    (body.trim().to_string(), tags)
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use anyhow::Result;
    use chrono::NaiveDate;
    use tempfile::tempdir;

    use super::{parse_note, FileNoteStore, NoteStore};

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 14).unwrap()
    }

    #[tokio::test]
    async fn test_save_and_get() -> Result<()> {
        let dir = tempdir()?;
        let store = FileNoteStore::new(dir.path().to_path_buf());
        let tags = vec!["work".to_string(), "important".to_string()];

        store
            .save("1715670000", day(), "This is a test note.", &tags)
            .await?;

        let path = dir.path().join("2024-05-14").join("1715670000.txt");
        assert_eq!(
            std::fs::read_to_string(&path)?,
            "---\ntags:\n- work\n- important\n---\nThis is a test note."
        );
        assert_eq!(
            store.get("1715670000", day()).await?,
            ("This is a test note.".to_string(), tags)
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_without_tags_is_raw_text() -> Result<()> {
        let dir = tempdir()?;
        let store = FileNoteStore::new(dir.path().to_path_buf());

        store.save("42", day(), "  just text\n", &[]).await?;

        let path = dir.path().join("2024-05-14").join("42.txt");
        assert_eq!(std::fs::read_to_string(&path)?, "  just text\n");
        assert_eq!(
            store.get("42", day()).await?,
            ("just text".to_string(), vec![])
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_note() -> Result<()> {
        let dir = tempdir()?;
        let store = FileNoteStore::new(dir.path().to_path_buf());

        assert_eq!(store.get("42", day()).await?, (String::new(), vec![]));
        Ok(())
    }

    #[test]
    fn test_broken_front_matter() {
        let path = Path::new("note.txt");
        assert_eq!(
            parse_note("---\ntags: [unclosed\n---\nbody\n", path),
            ("body".to_string(), vec![])
        );
        assert_eq!(
            parse_note("---\nno closing marker", path),
            ("---\nno closing marker".to_string(), vec![])
        );
        assert_eq!(
            parse_note("---\n---\nonly body", path),
            ("only body".to_string(), vec![])
        );
    }
}
