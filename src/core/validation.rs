//! Stage-skill content validation.
//!
//! A pure function over one candidate version. It decides whether content may
//! be published, activated or rolled back to, and is reused by the dry-run and
//! by the runtime resolver. No I/O, no clock.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::skill::TOOL_CATALOG;
use super::stage::{SearchPolicy, Stage};

/// Headings every skill document must carry (as `## <name>` lines).
pub const MANDATORY_SECTIONS: [&str; 6] = [
    "Objective",
    "Input Context",
    "Tool Policy",
    "Output Contract",
    "Guardrails",
    "Done Criteria",
];

static NEXT_HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^##\s+").expect("static regex"));

static OUTPUT_KEY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*-\s*([a-zA-Z_][a-zA-Z0-9_]*)\b").expect("static regex")
});

static EXPLICIT_SEARCH_POLICY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)searchPolicy:\s*(active|passive)\b").expect("static regex")
});

static BODY_SEARCH_POLICY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)google_search\s*\((active|passive)\s+mode").expect("static regex")
});

static DECLARED_TOOLS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^\s*allowedTools\s*:\s*(.+)$").expect("static regex")
});

static PERSIST_COMPILE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)mode\s*:\s*["']persist["']"#).expect("static regex")
});

static LIVING_OUTLINE_CONTEXT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)living outline|checkedAt|checkedBy|editHistory").expect("static regex")
});

static FORBIDDEN_PHRASES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)\bignore\s+stage\s+lock\b",
        r"(?i)\bbypass\s+stage\s+lock\b",
        r"(?i)\boverride\s+tool\s+routing\b",
        r"(?i)\bignore\s+tool\s+routing\b",
        r"(?i)\bcall\s+google_search\s+and\s+updateStageData\s+in\s+the\s+same\s+turn\b",
        r"(?i)\bsubmit\s+without\s+ringkasan\b",
        r"(?i)\bsubmit\s+without\s+user\s+confirmation\b",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("static regex"))
    .collect()
});

/// One reason a skill version cannot go live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub code: String,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// Facts extracted while validating, recorded in audit metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationMetadata {
    pub declared_search_policy: Option<SearchPolicy>,
    pub expected_search_policy: SearchPolicy,
    pub output_keys: Vec<String>,
    pub declared_tools: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub ok: bool,
    pub issues: Vec<ValidationIssue>,
    pub metadata: ValidationMetadata,
}

impl ValidationReport {
    /// Issue codes, in the order they were raised.
    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.issues.iter().map(|issue| issue.code.as_str())
    }

    #[must_use]
    pub fn has_issue(&self, code: &str) -> bool {
        self.codes().any(|c| c == code)
    }
}

/// Everything the validator looks at for one version.
#[derive(Debug, Clone, Copy)]
pub struct ValidationInput<'a> {
    pub stage: Stage,
    pub skill_id: &'a str,
    pub name: &'a str,
    pub description: &'a str,
    pub content: &'a str,
    pub allowed_tools: &'a [String],
}

/// Validate one skill version's content against its stage contract.
#[must_use]
pub fn validate(input: &ValidationInput<'_>) -> ValidationReport {
    let mut issues = Vec::new();
    let content = input.content.trim();
    let stage = input.stage;

    if content.is_empty() {
        issues.push(ValidationIssue::new(
            "empty_content",
            "skill content must not be empty",
        ));
    }

    for section in MANDATORY_SECTIONS {
        if !has_section(content, section) {
            issues.push(ValidationIssue::new(
                format!(
                    "missing_section_{}",
                    section.to_lowercase().replace(' ', "_")
                ),
                format!("mandatory section \"{section}\" not found"),
            ));
        }
    }

    if input.name.trim().is_empty() || input.description.trim().is_empty() {
        issues.push(ValidationIssue::new(
            "missing_metadata",
            "name and description must both be filled in",
        ));
    }

    let declared_tools = parse_declared_tools(content);
    let mut unknown_tools: Vec<&str> = input
        .allowed_tools
        .iter()
        .map(String::as_str)
        .chain(declared_tools.iter().map(String::as_str))
        .filter(|tool| !TOOL_CATALOG.contains(tool))
        .collect();
    unknown_tools.sort_unstable();
    unknown_tools.dedup();
    if !unknown_tools.is_empty() {
        issues.push(ValidationIssue::new(
            "unknown_tool_reference",
            format!(
                "tools not in the global catalog: {}",
                unknown_tools.join(", ")
            ),
        ));
    }

    let output_keys = extract_output_keys(&section_body(content, "Output Contract"));
    let unknown_keys: Vec<&str> = output_keys
        .iter()
        .map(String::as_str)
        .filter(|key| !stage.is_whitelisted_key(key))
        .collect();
    if !unknown_keys.is_empty() {
        issues.push(ValidationIssue::new(
            "output_keys_not_whitelisted",
            format!(
                "Output Contract lists keys outside the \"{stage}\" whitelist: {}",
                unknown_keys.join(", ")
            ),
        ));
    }

    let declared_search_policy = parse_declared_search_policy(content);
    let expected_search_policy = stage.expected_search_policy();
    if let Some(declared) = declared_search_policy {
        if declared != expected_search_policy {
            issues.push(ValidationIssue::new(
                "search_policy_mismatch",
                format!(
                    "searchPolicy \"{declared}\" does not match stage \"{stage}\" (expected \"{expected_search_policy}\")"
                ),
            ));
        }
    }

    let persists = PERSIST_COMPILE.is_match(content);
    if stage == Stage::DaftarPustaka && !persists {
        issues.push(ValidationIssue::new(
            "persist_compile_required",
            "daftar_pustaka must instruct compileDaftarPustaka in persist mode",
        ));
    } else if stage != Stage::DaftarPustaka && persists {
        issues.push(ValidationIssue::new(
            "persist_compile_forbidden",
            format!("stage \"{stage}\" must not instruct compileDaftarPustaka in persist mode"),
        ));
    }

    if FORBIDDEN_PHRASES.iter().any(|re| re.is_match(content)) {
        issues.push(ValidationIssue::new(
            "forbidden_phrase_detected",
            "content instructs the model to override a runtime guard (stage lock, tool routing or submit guard)",
        ));
    }

    if stage == Stage::Outline {
        let lower = content.to_lowercase();
        let lists_lifecycle = ["checkedat", "checkedby", "edithistory"]
            .iter()
            .all(|needle| lower.contains(needle));
        if !lists_lifecycle {
            issues.push(ValidationIssue::new(
                "outline_living_checklist_missing",
                "outline skill must name the checklist lifecycle (checkedAt, checkedBy, editHistory)",
            ));
        }
    }

    if stage.is_post_outline() && !LIVING_OUTLINE_CONTEXT.is_match(content) {
        issues.push(ValidationIssue::new(
            "post_outline_context_missing",
            format!("stage \"{stage}\" must read the living outline checklist context"),
        ));
    }

    tracing::trace!(
        skill_id = input.skill_id,
        stage = %stage,
        issues = issues.len(),
        "validated skill content"
    );

    ValidationReport {
        ok: issues.is_empty(),
        issues,
        metadata: ValidationMetadata {
            declared_search_policy,
            expected_search_policy,
            output_keys,
            declared_tools,
        },
    }
}

/// Declared search policy, if the content states one.
#[must_use]
pub fn parse_declared_search_policy(content: &str) -> Option<SearchPolicy> {
    EXPLICIT_SEARCH_POLICY
        .captures(content)
        .or_else(|| BODY_SEARCH_POLICY.captures(content))
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

fn heading_regex(section: &str) -> Regex {
    Regex::new(&format!(r"(?im)^##\s+{}\s*$", regex::escape(section))).expect("escaped heading")
}

fn has_section(body: &str, section: &str) -> bool {
    heading_regex(section).is_match(body)
}

fn section_body(body: &str, section: &str) -> String {
    let Some(found) = heading_regex(section).find(body) else {
        return String::new();
    };
    let rest = &body[found.end()..];
    let end = NEXT_HEADING.find(rest).map_or(rest.len(), |m| m.start());
    rest[..end].trim().to_string()
}

fn extract_output_keys(section: &str) -> Vec<String> {
    let mut keys: Vec<String> = Vec::new();
    for line in section.lines() {
        if let Some(caps) = OUTPUT_KEY.captures(line) {
            let key = caps[1].to_string();
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
    }
    keys
}

fn parse_declared_tools(content: &str) -> Vec<String> {
    let mut tools: Vec<String> = Vec::new();
    for caps in DECLARED_TOOLS.captures_iter(content) {
        for raw in caps[1].split([',', ' ', '\t']) {
            let tool = raw.trim().trim_matches('`');
            if !tool.is_empty() && !tools.iter().any(|t| t == tool) {
                tools.push(tool.to_string());
            }
        }
    }
    tools
}
