//! Best-effort extraction of test counters from test-runner output.
//!
//! Parsing is not authoritative: output no registered parser recognizes
//! yields zero counts, never an error.

use std::sync::{Arc, OnceLock};

use regex::Regex;

use crate::model::{TestError, TestResults};

pub trait TestOutputParser: Send + Sync {
    fn name(&self) -> &str;

    /// `None` when the output is not in this parser's format.
    fn parse(&self, output: &str) -> Option<TestResults>;
}

fn jest_count_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(\d+) (passed|failed|skipped|todo|total)").expect("JEST_COUNT regex is valid")
    })
}

fn mocha_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(\d+) (passing|failing|pending)\b").expect("MOCHA_COUNT regex is valid")
    })
}

/// Jest summary line, e.g. `Tests: 8 passed, 2 failed, 0 skipped, 10 total`.
#[derive(Debug, Default)]
pub struct JestParser;

impl TestOutputParser for JestParser {
    fn name(&self) -> &str {
        "jest"
    }

    fn parse(&self, output: &str) -> Option<TestResults> {
        let mut results: Option<TestResults> = None;
        let lines: Vec<&str> = output.lines().collect();

        for line in &lines {
            if !line.contains("Tests:") {
                continue;
            }
            let mut found = TestResults::default();
            let mut any = false;
            for cap in jest_count_re().captures_iter(line) {
                let Ok(n) = cap[1].parse::<u64>() else {
                    continue;
                };
                any = true;
                match &cap[2] {
                    "passed" => found.passed = n,
                    "failed" => found.failed = n,
                    "skipped" | "todo" => found.skipped += n,
                    _ => found.total = n,
                }
            }
            if any {
                if found.total == 0 {
                    found.total = found.passed + found.failed + found.skipped;
                }
                // last summary line wins, as in multi-project runs
                results = Some(found);
            }
        }

        let mut results = results?;
        results.errors = jest_failures(&lines);
        Some(results)
    }
}

/// `● Suite › name` headers followed by their first message line.
fn jest_failures(lines: &[&str]) -> Vec<TestError> {
    let mut errors = Vec::new();
    for (idx, line) in lines.iter().enumerate() {
        let Some(test) = line.trim_start().strip_prefix('●') else {
            continue;
        };
        let test = test.trim();
        if test.is_empty() || test.starts_with("Console") {
            continue;
        }
        let error = lines[idx + 1..]
            .iter()
            .map(|l| l.trim())
            .find(|l| !l.is_empty())
            .filter(|l| !l.starts_with('●'))
            .unwrap_or_default();
        errors.push(TestError {
            test: test.to_string(),
            error: error.to_string(),
            stack: None,
        });
    }
    errors
}

/// Mocha reporter footer: `P passing`, `F failing`, `K pending`.
#[derive(Debug, Default)]
pub struct MochaParser;

impl TestOutputParser for MochaParser {
    fn name(&self) -> &str {
        "mocha"
    }

    fn parse(&self, output: &str) -> Option<TestResults> {
        let mut results = TestResults::default();
        let mut any = false;
        for cap in output.lines().flat_map(|l| mocha_re().captures_iter(l)) {
            let Ok(n) = cap[1].parse::<u64>() else {
                continue;
            };
            any = true;
            match &cap[2] {
                "passing" => results.passed = n,
                "failing" => results.failed = n,
                _ => results.skipped = n,
            }
        }
        if !any {
            return None;
        }
        results.total = results.passed + results.failed;
        Some(results)
    }
}

/// Ordered set of parsers; the first that recognizes the output wins.
#[derive(Clone)]
pub struct ParserRegistry {
    parsers: Vec<Arc<dyn TestOutputParser>>,
}

impl Default for ParserRegistry {
    fn default() -> Self {
        Self {
            parsers: vec![Arc::new(JestParser), Arc::new(MochaParser)],
        }
    }
}

impl ParserRegistry {
    pub fn empty() -> Self {
        Self {
            parsers: Vec::new(),
        }
    }

    /// Registers `parser` ahead of the existing ones.
    pub fn prepend(&mut self, parser: Arc<dyn TestOutputParser>) {
        self.parsers.insert(0, parser);
    }

    pub fn push(&mut self, parser: Arc<dyn TestOutputParser>) {
        self.parsers.push(parser);
    }

    pub fn names(&self) -> Vec<&str> {
        self.parsers.iter().map(|p| p.name()).collect()
    }

    pub fn parse(&self, output: &str) -> TestResults {
        for parser in &self.parsers {
            if let Some(results) = parser.parse(output) {
                tracing::debug!(parser = parser.name(), total = results.total, "test output recognized");
                return results;
            }
        }
        tracing::debug!("test output not recognized");
        TestResults::default()
    }
}
