//! Input sanitization for learner submissions
//!
//! Every submission passes through [`sanitize`] before anything is executed.
//! A shared denylist catches shell-injection and host-probing patterns; each
//! language then applies its own positive rules. The check is total: any
//! string is either accepted or rejected with a reason.

use std::sync::LazyLock;

use regex::Regex;

use crate::{
    constants::{
        GIT_ALLOWED_PREFIXES, REDIS_ALLOWED_COMMANDS, SQL_BLOCKED_KEYWORDS,
        SQL_BLOCKED_META_COMMANDS,
    },
    models::Language,
};

/// A denylisted pattern and the languages allowed to use it anyway
struct DangerousPattern {
    regex: Regex,
    reason: &'static str,
    allowed_for: &'static [Language],
}

impl DangerousPattern {
    fn new(pattern: &str, reason: &'static str, allowed_for: &'static [Language]) -> Self {
        Self {
            regex: Regex::new(&format!("(?i){pattern}")).expect("denylist pattern is valid"),
            reason,
            allowed_for,
        }
    }
}

static DANGEROUS_PATTERNS: LazyLock<Vec<DangerousPattern>> = LazyLock::new(|| {
    vec![
        DangerousPattern::new(r"\$\(", "Command substitution is not allowed", &[]),
        DangerousPattern::new(r"`", "Backtick command substitution is not allowed", &[]),
        DangerousPattern::new(r"\$\{", "Variable expansion is not allowed", &[]),
        DangerousPattern::new(r"\$[a-z_]", "Variable expansion is not allowed", &[]),
        DangerousPattern::new(r"\benv\b", "Environment access is not allowed", &[]),
        DangerousPattern::new(r"\bexport\b", "Exporting variables is not allowed", &[]),
        DangerousPattern::new(r"\bsource\b", "Sourcing files is not allowed", &[]),
        DangerousPattern::new(r"\beval\b", "eval is not allowed", &[]),
        DangerousPattern::new(r"\bexec\b", "exec is not allowed", &[]),
        DangerousPattern::new(r"\bcurl\b", "Network access is not allowed", &[Language::Llm]),
        DangerousPattern::new(r"\bwget\b", "Network access is not allowed", &[]),
        DangerousPattern::new(r"\bnc\b", "Network access is not allowed", &[]),
        DangerousPattern::new(
            r"\brm\s+-rf\b",
            "Recursive deletion is not allowed",
            &[Language::Bash],
        ),
        DangerousPattern::new(r"/etc/", "Access to system files is not allowed", &[]),
        DangerousPattern::new(r"/proc/", "Access to system files is not allowed", &[]),
        DangerousPattern::new(r"\bsudo\b", "Privilege escalation is not allowed", &[]),
        DangerousPattern::new(
            r"\bchmod\b",
            "Changing permissions is not allowed",
            &[Language::Bash],
        ),
        DangerousPattern::new(r"\bchown\b", "Changing ownership is not allowed", &[]),
        DangerousPattern::new(r"\b(kill|pkill|killall)\b", "Killing processes is not allowed", &[]),
        DangerousPattern::new(r"\bps\s", "Listing processes is not allowed", &[]),
        DangerousPattern::new(
            r"\bcat\s+/",
            "Reading absolute paths is not allowed",
            &[Language::Bash],
        ),
    ]
});

static SQL_BLOCKED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i)\b({})\b", SQL_BLOCKED_KEYWORDS.join("|")))
        .expect("SQL keyword pattern is valid")
});

/// Check a submission before execution
///
/// Returns the reason when the submission is rejected.
pub fn sanitize(language: Language, code: &str) -> Result<(), String> {
    let trimmed = code.trim();
    if trimmed.is_empty() {
        return Err("Empty input".to_string());
    }

    for pattern in DANGEROUS_PATTERNS.iter() {
        if pattern.allowed_for.contains(&language) {
            continue;
        }
        if pattern.regex.is_match(trimmed) {
            return Err(pattern.reason.to_string());
        }
    }

    match language {
        Language::Redis => check_redis(trimmed),
        Language::Sql => check_sql(trimmed),
        Language::Git => check_git(trimmed),
        // Manifest and prompt content is written to a file, never interpreted
        // by a shell, so the shared denylist is all that applies.
        Language::Docker | Language::Llm | Language::Bash => Ok(()),
    }
}

fn check_redis(code: &str) -> Result<(), String> {
    let command = code
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_ascii_uppercase();

    if REDIS_ALLOWED_COMMANDS.contains(&command.as_str()) {
        Ok(())
    } else {
        Err(format!("Redis command '{command}' is not allowed"))
    }
}

fn check_sql(code: &str) -> Result<(), String> {
    if let Some(found) = SQL_BLOCKED.find(code) {
        return Err(format!(
            "SQL statement '{}' is not allowed: the lesson database is read-only",
            found.as_str().to_ascii_uppercase()
        ));
    }

    for line in code.lines() {
        let line = line.trim_start().to_ascii_lowercase();
        if let Some(meta) = SQL_BLOCKED_META_COMMANDS
            .iter()
            .find(|meta| line.starts_with(*meta))
        {
            return Err(format!("sqlite3 meta-command '{meta}' is not allowed"));
        }
    }

    Ok(())
}

fn check_git(code: &str) -> Result<(), String> {
    for clause in code.split("&&").map(str::trim) {
        if !GIT_ALLOWED_PREFIXES
            .iter()
            .any(|prefix| clause.starts_with(prefix))
        {
            return Err(format!("Command '{clause}' is not allowed in git lessons"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_empty_input() {
        for language in Language::ALL {
            assert_eq!(sanitize(language, ""), Err("Empty input".to_string()));
            assert_eq!(sanitize(language, "  \n\t "), Err("Empty input".to_string()));
        }
    }

    #[test]
    fn test_classification_is_total() {
        let samples = [
            "PING",
            "SELECT * FROM employees;",
            "git status",
            "FROM alpine:3.19",
            "What is a token?",
            "ls -la",
            "$(whoami)",
            "`id`",
            "echo ${HOME}",
            "\u{0}\u{1b}[31m",
            "' OR 1=1 --",
            "&&&&",
        ];
        for language in Language::ALL {
            for sample in samples {
                if let Err(reason) = sanitize(language, sample) {
                    assert!(!reason.is_empty());
                }
            }
        }
    }

    #[test]
    fn test_shared_denylist_applies_everywhere() {
        for language in Language::ALL {
            assert!(sanitize(language, "echo $(cat secret)").is_err());
            assert!(sanitize(language, "echo `id`").is_err());
            assert!(sanitize(language, "echo $HOME").is_err());
            assert!(sanitize(language, "sudo ls").is_err());
            assert!(sanitize(language, "wget http://evil").is_err());
            assert!(sanitize(language, "ls /proc/1").is_err());
            assert!(sanitize(language, "EVAL 'x'").is_err());
        }
    }

    #[test]
    fn test_bash_allows_basic_commands() {
        let safe_commands = [
            "ls -la",
            "mkdir camp",
            "touch file.txt",
            "grep -i ERROR server.log",
            "find . -name '*.tmp'",
            "cat access.log | sort | uniq | wc -l",
            "find . -name '*.tmp' | xargs rm",
            "awk '{print $1}' access.log | sort | uniq -c",
            "echo 'hello' | sed 's/hello/world/'",
            "rm -rf camp",
            "cat /workspace/server.log",
        ];
        for cmd in safe_commands {
            assert!(sanitize(Language::Bash, cmd).is_ok(), "should allow: {cmd}");
        }
    }

    #[test]
    fn test_bash_blocks_dangerous() {
        for cmd in ["sudo rm -rf /", "eval 'dangerous'", "export SECRET=hack"] {
            assert!(sanitize(Language::Bash, cmd).is_err(), "should block: {cmd}");
        }
    }

    #[test]
    fn test_chmod_only_for_bash() {
        assert!(sanitize(Language::Bash, "chmod +x script.sh").is_ok());
        assert!(sanitize(Language::Git, "chmod +x script.sh").is_err());
        assert!(sanitize(Language::Redis, "chmod +x script.sh").is_err());
    }

    #[test]
    fn test_curl_only_for_llm() {
        let cmd = "curl -s https://api.example.com/v1/chat -d '{\"model\": \"x\"}'";
        assert!(sanitize(Language::Llm, cmd).is_ok());
        assert_eq!(
            sanitize(Language::Bash, cmd),
            Err("Network access is not allowed".to_string())
        );
    }

    #[test]
    fn test_redis_allowlist() {
        assert!(sanitize(Language::Redis, "PING").is_ok());
        assert!(sanitize(Language::Redis, "set suspect \"Murphy\"").is_ok());
        assert!(sanitize(Language::Redis, "  hgetall case:101").is_ok());
        assert_eq!(
            sanitize(Language::Redis, "FLUSHALL"),
            Err("Redis command 'FLUSHALL' is not allowed".to_string())
        );
        assert!(sanitize(Language::Redis, "CONFIG SET dir /tmp").is_err());
    }

    #[test]
    fn test_sql_is_read_only() {
        assert!(sanitize(Language::Sql, "SELECT name FROM employees WHERE dept = 'IT';").is_ok());
        assert!(sanitize(Language::Sql, "select count(*) from orders").is_ok());
        for stmt in [
            "DROP TABLE employees",
            "delete from employees",
            "INSERT INTO t VALUES (1)",
            "update employees set salary = 0",
            "ATTACH DATABASE 'x.db' AS x",
            "SELECT 1; CREATE TABLE t(a)",
        ] {
            assert!(sanitize(Language::Sql, stmt).is_err(), "should block: {stmt}");
        }
        // keyword match is on whole words
        assert!(sanitize(Language::Sql, "SELECT updated_at FROM orders").is_ok());
    }

    #[test]
    fn test_sql_blocks_shell_meta_commands() {
        assert_eq!(
            sanitize(Language::Sql, ".shell ls"),
            Err("sqlite3 meta-command '.shell' is not allowed".to_string())
        );
        assert!(sanitize(Language::Sql, "SELECT 1;\n.system id").is_err());
        assert!(sanitize(Language::Sql, ".tables").is_ok());
    }

    #[test]
    fn test_git_clauses_need_allowed_prefix() {
        assert!(sanitize(Language::Git, "git status").is_ok());
        assert!(sanitize(Language::Git, "ls").is_ok());
        assert!(
            sanitize(
                Language::Git,
                "touch notes.txt && git add notes.txt && git commit -m 'add notes'"
            )
            .is_ok()
        );
        assert_eq!(
            sanitize(Language::Git, "git status && python -c 'x'"),
            Err("Command 'python -c 'x'' is not allowed in git lessons".to_string())
        );
        assert!(sanitize(Language::Git, "git status &&").is_err());
    }

    #[test]
    fn test_content_languages_only_use_denylist() {
        let dockerfile = "FROM python:3.12-slim\nWORKDIR /app\nCOPY . .\nCMD [\"python\", \"app.py\"]";
        assert!(sanitize(Language::Docker, dockerfile).is_ok());
        assert!(sanitize(Language::Llm, "Summarize the case notes in one sentence.").is_ok());
        assert!(sanitize(Language::Docker, "RUN cat /etc/passwd").is_err());
    }
}
