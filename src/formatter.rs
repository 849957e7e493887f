//! Output formatters for a finished matcher run.
//!
//! One trait with a component-rendering method per field of
//! [`MatchReport`], plus a
//! default `format_report` that concatenates them, so a caller can mix
//! and match which sections of a report get shown without re-deriving
//! the whole render.

use crate::types::{MatchReport, SafetyRecord};

/// Trait for formatting a completed matcher run.
pub trait ReportFormatter {
    /// Format the symbol bindings table.
    fn format_bindings(&self, report: &MatchReport) -> Option<String>;

    /// Format the accumulated safety records.
    fn format_safety_records(&self, report: &MatchReport) -> Option<String>;

    /// Format the complete report.
    ///
    /// Default implementation concatenates all component outputs.
    fn format_report(&self, report: &MatchReport) -> String {
        let mut parts = Vec::new();
        if let Some(s) = self.format_bindings(report) {
            parts.push(s);
        }
        if let Some(s) = self.format_safety_records(report) {
            parts.push(s);
        }
        parts.join("")
    }
}

/// Human-readable output formatter.
#[derive(Debug, Clone, Default)]
pub struct HumanFormatter {
    /// Show safety records as well as bindings.
    pub verbose: bool,
}

impl HumanFormatter {
    /// Create a new human formatter with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a verbose formatter that also prints safety records.
    pub fn verbose() -> Self {
        Self { verbose: true }
    }
}

impl ReportFormatter for HumanFormatter {
    fn format_bindings(&self, report: &MatchReport) -> Option<String> {
        if report.bindings.is_empty() {
            return None;
        }
        let mut names: Vec<&String> = report.bindings.keys().collect();
        names.sort();
        let mut s = String::from("Bindings:\n");
        for name in names {
            s.push_str(&format!("  {name:<24} {:#018x}\n", report.bindings[name]));
        }
        Some(s)
    }

    fn format_safety_records(&self, report: &MatchReport) -> Option<String> {
        if !self.verbose || report.safety_records.is_empty() {
            return None;
        }
        let mut s = String::from("Safety records:\n");
        for record in &report.safety_records {
            s.push_str(&format!(
                "  {:#018x} + {:#06x} bytes{}\n",
                record.run_addr,
                record.size,
                if record.care { " (care)" } else { "" }
            ));
        }
        Some(s)
    }
}

/// JSON output formatter.
#[derive(Debug, Clone, Default)]
pub struct JsonFormatter {
    /// Pretty-print JSON.
    pub pretty: bool,
}

impl JsonFormatter {
    /// Create a new pretty-printing JSON formatter.
    pub fn new() -> Self {
        Self { pretty: true }
    }

    /// Create a compact single-line JSON formatter.
    pub fn compact() -> Self {
        Self { pretty: false }
    }
}

impl ReportFormatter for JsonFormatter {
    fn format_bindings(&self, _report: &MatchReport) -> Option<String> {
        None // handled in format_report
    }

    fn format_safety_records(&self, _report: &MatchReport) -> Option<String> {
        None
    }

    fn format_report(&self, report: &MatchReport) -> String {
        #[derive(serde::Serialize)]
        struct SafetyRecordJson {
            run_addr: u64,
            size: u64,
            care: bool,
        }

        #[derive(serde::Serialize)]
        struct ReportJson<'a> {
            bindings: &'a std::collections::HashMap<String, i64>,
            safety_records: Vec<SafetyRecordJson>,
        }

        let output = ReportJson {
            bindings: &report.bindings,
            safety_records: report
                .safety_records
                .iter()
                .map(|r: &SafetyRecord| SafetyRecordJson {
                    run_addr: r.run_addr,
                    size: r.size,
                    care: r.care,
                })
                .collect(),
        };

        if self.pretty {
            serde_json::to_string_pretty(&output).unwrap_or_else(|_| "{}".to_string())
        } else {
            serde_json::to_string(&output).unwrap_or_else(|_| "{}".to_string())
        }
    }
}

/// Compact single-line output formatter (one `name=addr` pair per
/// binding, space-separated).
#[derive(Debug, Clone, Default)]
pub struct ShortFormatter;

impl ShortFormatter {
    /// Create a new short formatter.
    pub fn new() -> Self {
        Self
    }
}

impl ReportFormatter for ShortFormatter {
    fn format_bindings(&self, _report: &MatchReport) -> Option<String> {
        None
    }

    fn format_safety_records(&self, _report: &MatchReport) -> Option<String> {
        None
    }

    fn format_report(&self, report: &MatchReport) -> String {
        let mut names: Vec<&String> = report.bindings.keys().collect();
        names.sort();
        let pairs: Vec<String> = names
            .into_iter()
            .map(|name| format!("{name}={:#x}", report.bindings[name]))
            .collect();
        format!("{}\n", pairs.join(" "))
    }
}
