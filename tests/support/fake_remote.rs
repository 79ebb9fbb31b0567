use std::collections::HashMap;
use std::sync::Mutex;

use capsync::remote::{RemoteError, RemoteStore, UploadRecord};

/// Remote store double: keeps upserted records and fails on a script.
#[derive(Default)]
pub struct FakeRemote {
    records: Mutex<Vec<UploadRecord>>,
    objects: Mutex<Vec<String>>,
    record_failures: Mutex<HashMap<String, u32>>,
    always_fail: Mutex<Vec<String>>,
}

impl FakeRemote {
    /// Reject the next `times` record upserts for `folder`.
    pub fn fail_records(&self, folder: &str, times: u32) {
        self.record_failures
            .lock()
            .unwrap()
            .insert(folder.to_string(), times);
    }

    /// Reject every record upsert for `folder`.
    pub fn always_fail(&self, folder: &str) {
        self.always_fail.lock().unwrap().push(folder.to_string());
    }

    pub fn records(&self) -> Vec<UploadRecord> {
        self.records.lock().unwrap().clone()
    }

    pub fn attempts_for(&self, folder: &str) -> usize {
        self.records()
            .iter()
            .filter(|record| record.folder_name == folder)
            .count()
    }

    pub fn last_record(&self, folder: &str) -> Option<UploadRecord> {
        self.records()
            .into_iter()
            .rev()
            .find(|record| record.folder_name == folder)
    }

    pub fn objects(&self) -> Vec<String> {
        self.objects.lock().unwrap().clone()
    }
}

impl RemoteStore for FakeRemote {
    fn ensure_bucket(&self, _bucket: &str) -> Result<(), RemoteError> {
        Ok(())
    }

    fn upload_object(
        &self,
        bucket: &str,
        segments: &[&str],
        _bytes: Vec<u8>,
        _content_type: &str,
    ) -> Result<String, RemoteError> {
        let url = format!("https://remote.test/public/{bucket}/{}", segments.join("/"));
        self.objects.lock().unwrap().push(url.clone());
        Ok(url)
    }

    fn upsert_record(&self, _table: &str, record: &UploadRecord) -> Result<(), RemoteError> {
        if self
            .always_fail
            .lock()
            .unwrap()
            .contains(&record.folder_name)
        {
            return Err(RemoteError::Transport("connection refused".into()));
        }
        if let Some(remaining) = self
            .record_failures
            .lock()
            .unwrap()
            .get_mut(&record.folder_name)
            .filter(|remaining| **remaining > 0)
        {
            *remaining -= 1;
            return Err(RemoteError::Status {
                code: 503,
                body: "unavailable".into(),
            });
        }
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }
}
