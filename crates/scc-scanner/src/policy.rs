//! Scan selection policy.

/// Parameters controlling which files a scan returns and in what order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanPolicy {
    pub recent_n: usize,
    pub min_size_bytes: u64,
    pub extensions: Vec<String>,
    pub skip_if_caption_exists: bool,
    pub subtree_priority: Vec<String>,
    pub scan_timeout_secs: u64,
}

impl Default for ScanPolicy {
    fn default() -> Self {
        Self {
            recent_n: 5,
            min_size_bytes: 10 * 1024 * 1024,
            extensions: vec!["mp4".into(), "mov".into(), "mkv".into(), "m4v".into()],
            skip_if_caption_exists: true,
            subtree_priority: vec!["recordings".into()],
            scan_timeout_secs: 10,
        }
    }
}

impl ScanPolicy {
    pub fn matches_extension(&self, ext: &str) -> bool {
        self.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext))
    }
}
