use serde::{Deserialize, Serialize};

use super::playlist::Attributes;

/// Single guide entry. Times are epoch milliseconds, UTC, with
/// `start_time < end_time` guaranteed by every guide parser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Program {
    pub id: String,
    pub channel_id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub start_time: i64,
    pub end_time: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub categories: Option<Vec<String>>,
    #[serde(default)]
    pub attributes: Attributes,
}

impl Program {
    /// Stable id for a programme: `{channel}_{startMillis}`
    pub fn make_id(channel_id: &str, start_time: i64) -> String {
        format!("{}_{}", channel_id, start_time)
    }

    pub fn duration_ms(&self) -> i64 {
        self.end_time - self.start_time
    }

    /// True if `at` (epoch millis) falls inside `[start, end)`
    pub fn is_airing_at(&self, at: i64) -> bool {
        self.start_time <= at && at < self.end_time
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn program(start: i64, end: i64) -> Program {
        Program {
            id: Program::make_id("c1", start),
            channel_id: "c1".to_string(),
            title: "News".to_string(),
            description: None,
            start_time: start,
            end_time: end,
            categories: None,
            attributes: Attributes::new(),
        }
    }

    #[test]
    fn test_make_id() {
        assert_eq!(Program::make_id("bbc1.uk", 1_672_574_400_000), "bbc1.uk_1672574400000");
    }

    #[test]
    fn test_is_airing_at_is_half_open() {
        let p = program(1_000, 2_000);
        assert!(p.is_airing_at(1_000));
        assert!(p.is_airing_at(1_999));
        assert!(!p.is_airing_at(2_000));
        assert_eq!(p.duration_ms(), 1_000);
    }
}
