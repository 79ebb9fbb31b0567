pub(super) const MAX_BATCH_SIZE: usize = 10_000;

pub(super) fn default_table() -> String {
    "device_test".to_string()
}

pub(super) fn default_bucket() -> String {
    "images".to_string()
}

pub(super) fn default_data_type() -> String {
    "image_analysis".to_string()
}

pub(super) fn default_device_name() -> String {
    "capture-station".to_string()
}

pub(super) fn default_device_type() -> String {
    "image_analyzer".to_string()
}

pub(super) fn default_batch_size() -> usize {
    50
}

pub(super) fn default_max_retries() -> u32 {
    3
}

pub(super) fn default_batch_delay_ms() -> u64 {
    1_000
}

pub(super) fn default_retry_delay_ms() -> u64 {
    5_000
}

pub(super) fn default_readiness_timeout_secs() -> u64 {
    300
}

pub(super) fn default_stable_secs() -> u64 {
    5
}

pub(super) fn default_poll_interval_ms() -> u64 {
    1_000
}

pub(super) fn default_descriptor_name() -> String {
    "stats.json".to_string()
}

pub(super) fn default_image_extensions() -> Vec<String> {
    ["jpg", "jpeg", "png", "gif", "bmp"]
        .into_iter()
        .map(str::to_string)
        .collect()
}

pub(super) fn default_success_file() -> String {
    "success.json".to_string()
}

pub(super) fn default_failed_file() -> String {
    "failed.json".to_string()
}
