use std::collections::BTreeSet;
use crate::errors::FuzzchainError;
use super::state::{DiscoveredPath, RawScanReport};

/// Lines starting with this are discovered URLs; everything else is noise.
pub const URL_SCHEME_PREFIX: &str = "http";

/// Extract discovered URLs from report text.
///
/// The brute-forcer's report layout is not ours to control, so this is a
/// permissive line filter rather than a grammar: headers, summaries and blank
/// lines fall through, duplicates collapse.
pub fn parse_report_content(content: &str) -> BTreeSet<DiscoveredPath> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with(URL_SCHEME_PREFIX))
        .map(DiscoveredPath::new)
        .collect()
}

/// Invalid UTF-8 is replaced, not rejected; such lines still parse.
pub async fn parse_report(report: &RawScanReport) -> Result<BTreeSet<DiscoveredPath>, FuzzchainError> {
    let bytes = tokio::fs::read(&report.path).await?;
    Ok(parse_report_content(&String::from_utf8_lossy(&bytes)))
}
