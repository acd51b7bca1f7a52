//! Service registration calls and the environment checks that gate them.

use once_cell::sync::Lazy;
use regex::Regex;

use polydep_core::dependency::Environment;
use polydep_core::project::Language;

use crate::lexer::LineParts;

/// Registration call names and the platform service each one binds.
pub const REGISTRATION_CALLS: [(&str, &str); 9] = [
    ("AddDiscoveryClient", "service-registry"),
    ("UseDiscoveryClient", "service-registry"),
    ("AddServiceDiscovery", "service-registry"),
    ("AddConfigServer", "config-server"),
    ("AddCloudFoundryActuators", "cloud-foundry-actuators"),
    ("UseCloudFoundryActuators", "cloud-foundry-actuators"),
    ("AddCloudFoundryConfiguration", "cloud-foundry-config"),
    ("AddDynamicConsole", "dynamic-logging"),
    ("AddDynamicLogger", "dynamic-logging"),
];

const ENVIRONMENT_TESTS: [(&str, &str); 3] = [
    ("IsDevelopment", "Development"),
    ("IsProduction", "Production"),
    ("IsStaging", "Staging"),
];

/// A registration call found on one line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub call: &'static str,
    pub service: &'static str,
    pub line: usize,
    /// `Unknown` for commented-out calls, the gating environment otherwise.
    pub condition: Option<Environment>,
}

static RE_CALL: Lazy<Regex> = Lazy::new(|| {
    let names: Vec<&str> = REGISTRATION_CALLS.iter().map(|(call, _)| *call).collect();
    Regex::new(&format!(r"\b({})\s*[(<]", names.join("|"))).unwrap()
});

static RE_NAMED_TEST: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\.(IsDevelopment|IsProduction|IsStaging)\s*\(").unwrap());

static RE_ENVIRONMENT_TEST: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\.(IsEnvironment)\s*\(\s*"([^"]*)""#).unwrap());

/// `!receiver.` or `Not receiver.` right before a method name.
static RE_NEGATED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:!|(?:^|\s)(?i:not))\s*[\w.]*$").unwrap());

/// Registration calls (and only those) in column order.
fn find_calls(text: &str) -> Vec<(usize, &'static str, &'static str)> {
    RE_CALL
        .captures_iter(text)
        .filter_map(|caps| {
            let name = caps.get(1)?;
            REGISTRATION_CALLS
                .iter()
                .find(|(call, _)| *call == name.as_str())
                .map(|(call, service)| (name.start(), *call, *service))
        })
        .collect()
}

/// Environment tests in column order: `env.IsDevelopment()`,
/// `IsEnvironment("QA")`. A negated test (`!env.IsProduction()`) gates on an
/// unknown environment.
fn find_tests(code: &str) -> Vec<(usize, Environment)> {
    let mut found = Vec::new();
    for caps in RE_NAMED_TEST.captures_iter(code) {
        let Some(method) = caps.get(1) else { continue };
        let env = ENVIRONMENT_TESTS
            .iter()
            .find(|(name, _)| *name == method.as_str())
            .map(|(_, env)| Environment::named(*env));
        if let Some(env) = env {
            found.push((method.start(), env));
        }
    }
    for caps in RE_ENVIRONMENT_TEST.captures_iter(code) {
        let (Some(method), Some(name)) = (caps.get(1), caps.get(2)) else {
            continue;
        };
        let name = name.as_str().trim();
        if !name.is_empty() {
            found.push((method.start(), Environment::named(name)));
        }
    }

    for (start, env) in &mut found {
        if RE_NEGATED.is_match(&code[..*start]) {
            *env = Environment::Unknown;
        }
    }
    found.sort_by_key(|f| f.0);
    found
}

/// Tracks which environment gate is open while lines stream past.
struct Gating {
    language: Language,
    /// Open gates: (nesting level, environment).
    gates: Vec<(usize, Environment)>,
    /// Brace depth (C#), `If` depth (VB).
    depth: usize,
    /// C#: environment test on a previous line whose block has not opened yet.
    pending: Option<Environment>,
}

impl Gating {
    fn new(language: Language) -> Self {
        Self {
            language,
            gates: Vec::new(),
            depth: 0,
            pending: None,
        }
    }

    fn current(&self) -> Option<Environment> {
        self.gates.last().map(|g| g.1.clone())
    }

    /// Conditions for the live calls on `line`, in column order.
    fn step(&mut self, line: &LineParts) -> Vec<(usize, Option<Environment>)> {
        let calls = find_calls(&line.code);
        let tests = find_tests(&line.code);
        match self.language {
            Language::CSharp => self.step_braces(&line.code, &calls, &tests),
            Language::VisualBasic => self.step_basic(&line.code, &calls, &tests),
            Language::FSharp => self.step_indent(&line.code, &calls, &tests),
        }
    }

    fn same_line(
        tests: &[(usize, Environment)],
        col: usize,
    ) -> Option<Environment> {
        tests.iter().filter(|t| t.0 < col).last().map(|t| t.1.clone())
    }

    fn step_braces(
        &mut self,
        code: &str,
        calls: &[(usize, &str, &str)],
        tests: &[(usize, Environment)],
    ) -> Vec<(usize, Option<Environment>)> {
        let trimmed = code.trim();
        if trimmed.is_empty() {
            return Vec::new();
        }
        let carried = self.pending.take();
        let single = if trimmed.starts_with('{') { None } else { carried.clone() };
        let mut open_pending = if trimmed.starts_with('{') { carried } else { None };

        let mut out = Vec::new();
        let mut next_call = 0;
        let mut next_test = 0;
        for (col, ch) in code.char_indices() {
            while next_test < tests.len() && tests[next_test].0 == col {
                open_pending = Some(tests[next_test].1.clone());
                next_test += 1;
            }
            while next_call < calls.len() && calls[next_call].0 == col {
                let cond = Self::same_line(tests, col)
                    .or_else(|| single.clone())
                    .or_else(|| self.current());
                out.push((col, cond));
                next_call += 1;
            }
            match ch {
                '{' => {
                    self.depth += 1;
                    if let Some(env) = open_pending.take() {
                        self.gates.push((self.depth, env));
                    }
                }
                '}' => {
                    while self.gates.last().is_some_and(|g| g.0 >= self.depth) {
                        self.gates.pop();
                    }
                    self.depth = self.depth.saturating_sub(1);
                }
                _ => {}
            }
        }
        if open_pending.is_some() && !tests.is_empty() && trimmed.ends_with(')') {
            self.pending = open_pending;
        }
        out
    }

    fn step_basic(
        &mut self,
        code: &str,
        calls: &[(usize, &str, &str)],
        tests: &[(usize, Environment)],
    ) -> Vec<(usize, Option<Environment>)> {
        let lower = code.trim().to_ascii_lowercase();
        if lower.starts_with("end if") {
            if self.gates.last().is_some_and(|g| g.0 == self.depth) {
                self.gates.pop();
            }
            self.depth = self.depth.saturating_sub(1);
            return Vec::new();
        }
        if lower.starts_with("else") && self.gates.last().is_some_and(|g| g.0 == self.depth) {
            self.gates.pop();
        }

        let out = calls
            .iter()
            .map(|(col, _, _)| (*col, Self::same_line(tests, *col).or_else(|| self.current())))
            .collect();

        let opens_block = lower.ends_with("then");
        if opens_block && lower.starts_with("if ") {
            self.depth += 1;
        }
        if opens_block && (lower.starts_with("if ") || lower.starts_with("elseif ")) {
            if let Some((_, env)) = tests.last() {
                self.gates.push((self.depth, env.clone()));
            }
        }
        out
    }

    fn step_indent(
        &mut self,
        code: &str,
        calls: &[(usize, &str, &str)],
        tests: &[(usize, Environment)],
    ) -> Vec<(usize, Option<Environment>)> {
        if code.trim().is_empty() {
            return Vec::new();
        }
        let indent = code.len() - code.trim_start().len();
        while self.gates.last().is_some_and(|g| g.0 >= indent) {
            self.gates.pop();
        }
        let out = calls
            .iter()
            .map(|(col, _, _)| (*col, Self::same_line(tests, *col).or_else(|| self.current())))
            .collect();
        if code.trim_end().ends_with("then") {
            if let Some((_, env)) = tests.last() {
                self.gates.push((indent, env.clone()));
            }
        }
        out
    }
}

/// Every registration call in a file, live or commented out, in line order.
pub fn registrations(lines: &[LineParts], language: Language) -> Vec<Registration> {
    let mut gating = Gating::new(language);
    let mut out = Vec::new();
    for line in lines {
        let live = find_calls(&line.code);
        let conditions = gating.step(line);
        for ((_, call, service), (_, condition)) in live.into_iter().zip(conditions) {
            out.push(Registration {
                call,
                service,
                line: line.number,
                condition,
            });
        }
        for (_, call, service) in find_calls(&line.comment) {
            out.push(Registration {
                call,
                service,
                line: line.number,
                condition: Some(Environment::Unknown),
            });
        }
    }
    out
}
