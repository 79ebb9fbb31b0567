use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Outcome derived from a folder's result descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    Pending,
    Passed,
    Failed,
}

impl TestStatus {
    /// No descriptor means pending; a non-empty `result` field means passed.
    pub fn from_descriptor(descriptor: Option<&Value>) -> Self {
        let Some(descriptor) = descriptor else {
            return Self::Pending;
        };
        let passed = descriptor
            .get("result")
            .is_some_and(|result| match result {
                Value::Null => false,
                Value::Bool(flag) => *flag,
                Value::Number(number) => number.as_f64().is_some_and(|value| value != 0.0),
                Value::String(text) => !text.is_empty(),
                Value::Array(items) => !items.is_empty(),
                Value::Object(fields) => !fields.is_empty(),
            });
        if passed { Self::Passed } else { Self::Failed }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Passed => "passed",
            Self::Failed => "failed",
        }
    }
}

/// Descriptive fields stored alongside each uploaded record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadMetadata {
    pub upload_timestamp: String,
    pub total_images: usize,
    pub files_processed: Vec<String>,
    pub folder_hash: String,
    pub image_urls: Vec<String>,
    pub upload_batch_id: Option<String>,
    pub device_id: String,
    pub device_name: String,
    pub device_type: String,
}

/// One remote row per capture folder, upserted on `(folder_name, device_id)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadRecord {
    pub folder_name: String,
    pub device_id: String,
    /// Public URLs of uploaded images; bare file names for images that failed.
    pub images: Vec<String>,
    pub test_results: Option<Value>,
    pub test_date: String,
    pub test_status: TestStatus,
    pub upload_batch: String,
    pub metadata: UploadMetadata,
    pub data_type: String,
}
