//! Log template normalisation and repeated-pattern mining.

use aiops_core::types::Severity;
use aiops_sources::LogEntry;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Placeholder for a variable token in Drain templates
pub const WILDCARD: &str = "<*>";

/// Exemplar logs kept per pattern
pub const MAX_PATTERN_EXAMPLES: usize = 3;

struct Rewrite {
    regex: Regex,
    replacement: &'static str,
}

/// Ordered rewrites used by [`normalize`]
fn rewrites() -> &'static [Rewrite] {
    static REWRITES: OnceLock<Vec<Rewrite>> = OnceLock::new();
    REWRITES.get_or_init(|| {
        [
            (
                r"\d{4}-\d{2}-\d{2}[T ]\d{2}:\d{2}:\d{2}(?:[.,]\d+)?(?:Z|[+-]\d{2}:?\d{2})?",
                "",
            ),
            (
                r"(?i)\b[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}\b",
                "UUID",
            ),
            (r"\b\d{1,3}(?:\.\d{1,3}){3}\b", "IP"),
            (r"\b0[xX][0-9a-fA-F]+\b", "HEX"),
            (r"\d+", "N"),
            (r"\s+", " "),
        ]
        .into_iter()
        .filter_map(|(pattern, replacement)| {
            Regex::new(pattern)
                .ok()
                .map(|regex| Rewrite { regex, replacement })
        })
        .collect()
    })
}

fn variable_token() -> Option<&'static Regex> {
    static TOKEN: OnceLock<Option<Regex>> = OnceLock::new();
    TOKEN
        .get_or_init(|| {
            Regex::new(
                r"^(?:[-+]?\d+(?:\.\d+)?%?|\d{1,3}(?:\.\d{1,3}){3}(?::\d+)?|0[xX][0-9a-fA-F]+)$",
            )
            .ok()
        })
        .as_ref()
}

fn stack_frame() -> Option<&'static Regex> {
    static FRAME: OnceLock<Option<Regex>> = OnceLock::new();
    FRAME
        .get_or_init(|| Regex::new(r"(?m)^\s+at\s+.+$").ok())
        .as_ref()
}

/// Collapse a log message into its template.
///
/// Timestamps are removed, then UUIDs, IPv4 addresses, hex literals and
/// remaining digit runs become `UUID`, `IP`, `HEX` and `N`.
pub fn normalize(message: &str) -> String {
    let mut template = message.to_string();
    for rewrite in rewrites() {
        template = rewrite
            .regex
            .replace_all(&template, rewrite.replacement)
            .into_owned();
    }
    template.trim().to_string()
}

/// Whitespace tokens of a message with numbers, IPs and hex replaced by [`WILDCARD`]
pub fn token_template(message: &str) -> Vec<String> {
    message
        .split_whitespace()
        .map(|token| {
            let core = token.trim_end_matches(&[',', ';', ':', ')', ']'][..]);
            match variable_token() {
                Some(re) if re.is_match(core) => WILDCARD.to_string(),
                _ => token.to_string(),
            }
        })
        .collect()
}

/// Indented `at ...` frames found in a raw log line
pub fn stack_frames(raw: &str) -> Vec<String> {
    match stack_frame() {
        Some(re) => re
            .find_iter(raw)
            .map(|m| m.as_str().trim().to_string())
            .collect(),
        None => Vec::new(),
    }
}

/// A template seen at least `min_count` times for one service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogPattern {
    pub service: String,
    pub template: String,
    pub count: usize,
    pub severity: Severity,
    pub score: f64,
    pub examples: Vec<LogEntry>,
}

impl LogPattern {
    fn severity_for(count: usize) -> Severity {
        if count >= 10 {
            Severity::Critical
        } else if count >= 5 {
            Severity::High
        } else {
            Severity::Medium
        }
    }
}

/// Count normalised templates per service.
///
/// Patterns are returned in order of first occurrence.
pub fn mine_patterns(logs: &[&LogEntry], min_count: usize) -> Vec<LogPattern> {
    let mut patterns: Vec<LogPattern> = Vec::new();

    for log in logs {
        let template = normalize(&log.message);
        match patterns
            .iter_mut()
            .find(|p| p.service == log.service && p.template == template)
        {
            Some(pattern) => {
                pattern.count += 1;
                if pattern.examples.len() < MAX_PATTERN_EXAMPLES {
                    pattern.examples.push((*log).clone());
                }
            }
            None => patterns.push(LogPattern {
                service: log.service.clone(),
                template,
                count: 1,
                severity: Severity::Medium,
                score: 0.0,
                examples: vec![(*log).clone()],
            }),
        }
    }

    patterns.retain(|p| p.count >= min_count);
    for pattern in &mut patterns {
        pattern.severity = LogPattern::severity_for(pattern.count);
        pattern.score = (pattern.count as f64 / 10.0).min(1.0);
    }
    patterns
}
