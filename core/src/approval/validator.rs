//! Static command/code validation (spec.md §4.5 stage 1): a block-list with
//! severity, checked before a command or code snippet is ever queued for
//! approval. No teacher counterpart; the block-list shape follows spec.md
//! verbatim.

/// Severity of a static-validation finding. `Blocked` commands never reach
/// the approval gate at all; `Warning` ones are surfaced to the approver as
/// risk context but do not themselves stop execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Warning,
    Blocked,
}

#[derive(Debug, Clone)]
pub struct ValidationFinding {
    pub pattern: String,
    pub severity: Severity,
    pub message: String,
}

/// `(substring, severity, message)` block-list. Matching is a plain
/// case-insensitive substring search — adequate for the destructive-pattern
/// categories spec.md §4.5 names (filesystem destruction, privilege
/// escalation); not a full shell parser.
const RULES: &[(&str, Severity, &str)] = &[
    ("rm -rf /", Severity::Blocked, "recursive delete of root or a root-adjacent path"),
    ("mkfs", Severity::Blocked, "filesystem format"),
    ("dd if=", Severity::Blocked, "raw disk write"),
    (":(){ :|:& };:", Severity::Blocked, "fork bomb"),
    ("sudo ", Severity::Blocked, "privilege escalation"),
    ("chmod 777", Severity::Warning, "overly permissive file mode"),
    ("curl ", Severity::Warning, "outbound network fetch"),
    ("wget ", Severity::Warning, "outbound network fetch"),
    ("| sh", Severity::Warning, "piping a remote fetch directly into a shell"),
    ("| bash", Severity::Warning, "piping a remote fetch directly into a shell"),
];

/// Runs `input` (a shell command or a code snippet) against the block-list,
/// returning every matching finding in rule order.
pub fn validate(input: &str) -> Vec<ValidationFinding> {
    let lower = input.to_lowercase();
    RULES
        .iter()
        .filter(|(pattern, _, _)| lower.contains(&pattern.to_lowercase()))
        .map(|(pattern, severity, message)| ValidationFinding {
            pattern: pattern.to_string(),
            severity: *severity,
            message: message.to_string(),
        })
        .collect()
}

/// True if any finding is `Blocked` — the command must not run at all, with
/// or without approval.
pub fn is_blocked(input: &str) -> bool {
    validate(input).iter().any(|f| f.severity == Severity::Blocked)
}
