//! Per-course client cache
//!
//! Keeps each course's accumulated analysis and rolling mistake list in a
//! [`CourseStore`], under `loominary_data_<course>` and
//! `loominary_mistakes_<course>`.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use loominary_config::constants::storage::{ANALYSIS_KEY_PREFIX, MISTAKES_KEY_PREFIX};
use loominary_core::{CourseAnalysis, CourseStore, RecentMistakes};

use crate::AgentError;

pub fn analysis_key(course_id: &str) -> String {
    format!("{}{}", ANALYSIS_KEY_PREFIX, course_id)
}

pub fn mistakes_key(course_id: &str) -> String {
    format!("{}{}", MISTAKES_KEY_PREFIX, course_id)
}

/// Typed access to the cached course state
#[derive(Clone)]
pub struct CourseCache {
    store: Arc<dyn CourseStore>,
}

impl CourseCache {
    pub fn new(store: Arc<dyn CourseStore>) -> Self {
        Self { store }
    }

    pub fn load_analysis(&self, course_id: &str) -> Result<Option<CourseAnalysis>, AgentError> {
        match self.store.get(&analysis_key(course_id))? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Append a new upload's documents after the ones already cached
    pub fn append_documents(
        &self,
        course_id: &str,
        upload: CourseAnalysis,
    ) -> Result<CourseAnalysis, AgentError> {
        let mut analysis = self.load_analysis(course_id)?.unwrap_or_default();
        analysis.extend(upload);
        self.save_analysis(course_id, &analysis)?;
        Ok(analysis)
    }

    /// Remove a document by file name.
    ///
    /// Returns the remaining analysis, or `None` once the course has no
    /// documents left (the key is deleted then).
    pub fn remove_document(
        &self,
        course_id: &str,
        file_name: &str,
    ) -> Result<Option<CourseAnalysis>, AgentError> {
        let Some(mut analysis) = self.load_analysis(course_id)? else {
            return Ok(None);
        };

        analysis.remove(file_name);
        if analysis.is_empty() {
            self.store.delete(&analysis_key(course_id))?;
            return Ok(None);
        }

        self.save_analysis(course_id, &analysis)?;
        Ok(Some(analysis))
    }

    pub fn load_mistakes(&self, course_id: &str) -> Result<RecentMistakes, AgentError> {
        match self.store.get(&mistakes_key(course_id))? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(RecentMistakes::default()),
        }
    }

    /// Merge newly reported mistakes and persist the result
    pub fn record_mistakes<I, S>(
        &self,
        course_id: &str,
        mistakes: I,
    ) -> Result<RecentMistakes, AgentError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut recent = self.load_mistakes(course_id)?;
        if recent.merge(mistakes) {
            let raw = serde_json::to_string(&recent)?;
            self.store.set(&mistakes_key(course_id), &raw)?;
        }
        Ok(recent)
    }

    /// Forget everything cached for the course
    pub fn reset(&self, course_id: &str) -> Result<(), AgentError> {
        self.store.delete(&analysis_key(course_id))?;
        self.store.delete(&mistakes_key(course_id))?;
        tracing::info!(%course_id, "Course cache reset");
        Ok(())
    }

    fn save_analysis(&self, course_id: &str, analysis: &CourseAnalysis) -> Result<(), AgentError> {
        let raw = serde_json::to_string(analysis)?;
        self.store.set(&analysis_key(course_id), &raw)?;
        Ok(())
    }
}

/// One file per key under a data directory
pub struct FileCourseStore {
    dir: PathBuf,
}

impl FileCourseStore {
    /// Creates the directory if needed
    pub fn open(dir: impl Into<PathBuf>) -> loominary_core::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", encode_key(key)))
    }
}

/// Course ids are free text; keep file names portable
fn encode_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for byte in key.bytes() {
        match byte {
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'-' | b'_' => out.push(byte as char),
            other => out.push_str(&format!("%{:02X}", other)),
        }
    }
    out
}

impl CourseStore for FileCourseStore {
    fn get(&self, key: &str) -> loominary_core::Result<Option<String>> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> loominary_core::Result<()> {
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn delete(&self, key: &str) -> loominary_core::Result<()> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loominary_core::{DocumentAnalysis, InMemoryCourseStore, Pitfall, VoiceConfig};

    fn doc(name: &str) -> DocumentAnalysis {
        DocumentAnalysis {
            file_name: name.to_string(),
            summary: "s".to_string(),
            questions: vec!["q".to_string()],
            mistakes: vec![Pitfall::new("p", "c")],
            voice_config: VoiceConfig {
                system_prompt: "sp".to_string(),
                first_question: "q".to_string(),
            },
        }
    }

    fn memory_cache() -> (CourseCache, Arc<InMemoryCourseStore>) {
        let store = Arc::new(InMemoryCourseStore::new());
        (CourseCache::new(store.clone()), store)
    }

    #[test]
    fn test_append_then_remove_last_deletes_key() {
        let (cache, store) = memory_cache();

        cache
            .append_documents("bio", CourseAnalysis::new(vec![doc("a.pdf")]))
            .unwrap();
        let all = cache
            .append_documents("bio", CourseAnalysis::new(vec![doc("b.txt")]))
            .unwrap();
        assert_eq!(all.documents.len(), 2);
        assert!(store.get("loominary_data_bio").unwrap().is_some());

        let left = cache.remove_document("bio", "a.pdf").unwrap().unwrap();
        assert_eq!(left.documents[0].file_name, "b.txt");

        assert!(cache.remove_document("bio", "b.txt").unwrap().is_none());
        assert!(store.get("loominary_data_bio").unwrap().is_none());
    }

    #[test]
    fn test_record_mistakes_persists_bounded_list() {
        let (cache, store) = memory_cache();

        for i in 0..15 {
            cache
                .record_mistakes("chem", [format!("mistake {}", i)])
                .unwrap();
        }
        cache.record_mistakes("chem", ["mistake 14"]).unwrap();

        let recent = cache.load_mistakes("chem").unwrap();
        assert_eq!(recent.len(), 10);
        assert_eq!(recent.to_vec()[0], "mistake 5");

        let raw = store.get("loominary_mistakes_chem").unwrap().unwrap();
        let stored: Vec<String> = serde_json::from_str(&raw).unwrap();
        assert_eq!(stored.len(), 10);
    }

    #[test]
    fn test_reset_clears_both_keys() {
        let (cache, store) = memory_cache();
        cache
            .append_documents("math", CourseAnalysis::new(vec![doc("a.pdf")]))
            .unwrap();
        cache.record_mistakes("math", ["sign error"]).unwrap();
        assert_eq!(store.len(), 2);

        cache.reset("math").unwrap();
        assert!(store.is_empty());
        assert!(cache.load_analysis("math").unwrap().is_none());
    }

    #[test]
    fn test_file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCourseStore::open(dir.path().join("cache")).unwrap();

        store.set("loominary_data_Physics 101/A", "{}").unwrap();
        assert_eq!(
            store.get("loominary_data_Physics 101/A").unwrap().as_deref(),
            Some("{}")
        );
        assert!(store.get("loominary_data_other").unwrap().is_none());

        store.delete("loominary_data_Physics 101/A").unwrap();
        store.delete("loominary_data_Physics 101/A").unwrap();
        assert!(store.get("loominary_data_Physics 101/A").unwrap().is_none());
    }

    #[test]
    fn test_cache_over_file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let cache = CourseCache::new(Arc::new(FileCourseStore::open(dir.path()).unwrap()));
            cache
                .append_documents("bio", CourseAnalysis::new(vec![doc("cells.pdf")]))
                .unwrap();
        }

        let cache = CourseCache::new(Arc::new(FileCourseStore::open(dir.path()).unwrap()));
        let analysis = cache.load_analysis("bio").unwrap().unwrap();
        assert_eq!(analysis.documents[0].file_name, "cells.pdf");
    }

    #[test]
    fn test_key_encoding() {
        assert_eq!(encode_key("loominary_data_a b"), "loominary_data_a%20b");
        assert_eq!(encode_key("x/../y"), "x%2F%2E%2E%2Fy");
    }
}
