//! Translation of a submission into the process invocation that runs it
//!
//! The same builder serves both backends. What differs between a grading
//! container and the host is captured by [`Layout`]: where the lesson state
//! lives and how validator tools are reached.

use std::fmt;

use base64::{engine::general_purpose::STANDARD, Engine};

use crate::{
    config::LocalConfig,
    constants::{
        container_paths, DOCKER_DIRECT_PREFIXES, LLM_DIRECT_PREFIXES, LLM_DISPATCH_SCRIPT,
        MOCK_DOCKER_SCRIPT, TOOL_SCRIPTS,
    },
    models::Language,
};

/// A process to run: the argument vector and an optional working directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub argv: Vec<String>,
    pub working_dir: Option<String>,
}

impl Invocation {
    /// Run a script through `sh -c`
    pub fn shell(script: impl Into<String>) -> Self {
        Self::direct(["sh".to_string(), "-c".to_string(), script.into()])
    }

    /// Run an argument vector without a shell
    pub fn direct<I, S>(argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            argv: argv.into_iter().map(Into::into).collect(),
            working_dir: None,
        }
    }

    pub fn in_dir(mut self, dir: impl Into<String>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn program(&self) -> &str {
        self.argv.first().map(String::as_str).unwrap_or_default()
    }

    pub fn args(&self) -> &[String] {
        self.argv.get(1..).unwrap_or_default()
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(dir) = &self.working_dir {
            write!(f, "(in {dir}) ")?;
        }
        f.write_str(&self.argv.join(" "))
    }
}

/// How validator tools and the docker CLI are reached
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolResolution {
    /// Installed on `PATH` inside the grading image
    OnPath,
    /// Python scripts under a scripts directory on the host
    Scripts { dir: String },
}

/// Where lesson state lives for one backend
#[derive(Debug, Clone)]
pub struct Layout {
    pub sql_database: String,
    /// Directory git commands run in; `None` uses the process default
    pub git_repo: Option<String>,
    pub workspace: String,
    pub user_input: String,
    pub user_script: String,
    /// Shell fragment that runs the LLM dispatcher on the input file
    pub llm_dispatch: String,
    pub tools: ToolResolution,
}

impl Layout {
    /// Fixed paths baked into the grading images
    pub fn container() -> Self {
        Self {
            sql_database: container_paths::SQL_DATABASE.to_string(),
            git_repo: None,
            workspace: container_paths::WORKSPACE.to_string(),
            user_input: container_paths::USER_INPUT.to_string(),
            user_script: container_paths::USER_SCRIPT.to_string(),
            llm_dispatch: container_paths::LLM_DISPATCH.to_string(),
            tools: ToolResolution::OnPath,
        }
    }

    /// Host paths used by the subprocess backend
    pub fn local(config: &LocalConfig) -> Self {
        let scripts = config.scripts_dir.to_string_lossy().into_owned();
        let dispatcher = format!("{scripts}/{LLM_DISPATCH_SCRIPT}");

        Self {
            sql_database: config.sql_database.to_string_lossy().into_owned(),
            git_repo: Some(config.git_repo.to_string_lossy().into_owned()),
            workspace: config.workspace.to_string_lossy().into_owned(),
            user_input: config.user_input.to_string_lossy().into_owned(),
            user_script: config.user_script.to_string_lossy().into_owned(),
            llm_dispatch: format!("python3 {}", quote(&dispatcher)),
            tools: ToolResolution::Scripts { dir: scripts },
        }
    }
}

/// Builds invocations for a fixed [`Layout`]
#[derive(Debug, Clone)]
pub struct CommandBuilder {
    layout: Layout,
}

impl CommandBuilder {
    pub fn new(layout: Layout) -> Self {
        Self { layout }
    }

    /// Build the invocation running `code` as a `language` command
    ///
    /// Used for learner code as well as lesson setup and validation commands.
    pub fn build(&self, language: Language, code: &str) -> Invocation {
        match language {
            Language::Redis => {
                let mut argv = vec!["redis-cli".to_string()];
                argv.extend(split_arguments(code));
                Invocation::direct(argv)
            }
            Language::Sql => Invocation::shell(format!(
                "printf '%s\\n' '{}' | sqlite3 {}",
                escape_single_quotes(code),
                quote(&self.layout.sql_database)
            )),
            Language::Git => {
                let invocation = Invocation::shell(code);
                match &self.layout.git_repo {
                    Some(repo) => invocation.in_dir(repo.clone()),
                    None => invocation,
                }
            }
            Language::Docker => self.build_docker(code),
            Language::Llm => self.build_llm(code),
            Language::Bash => self.build_bash(code),
        }
    }

    fn build_docker(&self, code: &str) -> Invocation {
        let trimmed = code.trim();
        if has_prefix(trimmed, DOCKER_DIRECT_PREFIXES) {
            return self.direct_tool(trimmed);
        }

        let input = quote(&self.layout.user_input);
        Invocation::shell(format!("{} && cat {input}", self.write_input(code)))
    }

    fn build_llm(&self, code: &str) -> Invocation {
        let trimmed = code.trim();
        if has_prefix(trimmed, LLM_DIRECT_PREFIXES) {
            return self.direct_tool(trimmed);
        }

        Invocation::shell(format!(
            "{} && {}",
            self.write_input(code),
            self.layout.llm_dispatch
        ))
    }

    fn build_bash(&self, code: &str) -> Invocation {
        let workspace = quote(&self.layout.workspace);

        if code.trim_start().starts_with("#!") || code.trim().contains('\n') {
            let script = quote(&self.layout.user_script);
            return Invocation::shell(format!(
                "echo '{}' | base64 -d > {script} && chmod +x {script} && cd {workspace} && bash {script}",
                STANDARD.encode(code)
            ));
        }

        Invocation::shell(format!("cd {workspace} && {code}"))
    }

    /// Shell fragment writing `code` to the input file without interpreting it
    fn write_input(&self, code: &str) -> String {
        format!(
            "echo '{}' | base64 -d > {}",
            STANDARD.encode(code),
            quote(&self.layout.user_input)
        )
    }

    fn direct_tool(&self, command: &str) -> Invocation {
        let argv = split_arguments(command);
        match &self.layout.tools {
            ToolResolution::OnPath => Invocation::direct(argv),
            ToolResolution::Scripts { dir } => self.resolve_script(dir, argv),
        }
    }

    fn resolve_script(&self, dir: &str, argv: Vec<String>) -> Invocation {
        let Some((program, args)) = argv.split_first() else {
            return Invocation::direct(argv);
        };

        if program == "docker" {
            let mut resolved = vec!["sh".to_string(), format!("{dir}/{MOCK_DOCKER_SCRIPT}")];
            resolved.extend(args.iter().cloned());
            return Invocation::direct(resolved);
        }

        let Some((_, script)) = TOOL_SCRIPTS.iter().find(|(tool, _)| tool == program) else {
            return Invocation::direct(argv);
        };

        let mut resolved = vec!["python3".to_string(), format!("{dir}/{script}")];
        if args.is_empty() {
            resolved.push(self.layout.user_input.clone());
        } else {
            resolved.extend(args.iter().map(|arg| {
                if arg == container_paths::USER_INPUT {
                    self.layout.user_input.clone()
                } else {
                    arg.clone()
                }
            }));
        }
        Invocation::direct(resolved)
    }
}

fn has_prefix(code: &str, prefixes: &[&str]) -> bool {
    prefixes.iter().any(|prefix| code.starts_with(prefix))
}

/// Escape text for embedding between single quotes in a POSIX shell
fn escape_single_quotes(text: &str) -> String {
    text.replace('\'', r"'\''")
}

/// Single-quote a path for the shell unless it is made of safe characters only
fn quote(path: &str) -> String {
    let safe = !path.is_empty()
        && path
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | '.' | '_' | '-'));
    if safe {
        path.to_string()
    } else {
        format!("'{}'", escape_single_quotes(path))
    }
}

/// Split a command line into arguments the way a shell would, without
/// expanding anything
///
/// Single quotes are literal, double quotes allow `\"` and `\\`, and an
/// unterminated quote runs to the end of the input.
pub fn split_arguments(input: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\'' => {
                in_token = true;
                for inner in chars.by_ref() {
                    if inner == '\'' {
                        break;
                    }
                    current.push(inner);
                }
            }
            '"' => {
                in_token = true;
                while let Some(inner) = chars.next() {
                    match inner {
                        '"' => break,
                        '\\' if matches!(chars.peek(), Some('"') | Some('\\')) => {
                            if let Some(escaped) = chars.next() {
                                current.push(escaped);
                            }
                        }
                        other => current.push(other),
                    }
                }
            }
            '\\' => {
                in_token = true;
                if let Some(escaped) = chars.next() {
                    current.push(escaped);
                }
            }
            c if c.is_whitespace() => {
                if in_token {
                    args.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            other => {
                in_token = true;
                current.push(other);
            }
        }
    }

    if in_token {
        args.push(current);
    }
    args
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn container() -> CommandBuilder {
        CommandBuilder::new(Layout::container())
    }

    fn local() -> CommandBuilder {
        CommandBuilder::new(Layout::local(&LocalConfig::rooted_at(Path::new("/srv/grader"))))
    }

    fn script(invocation: &Invocation) -> &str {
        assert_eq!(invocation.program(), "sh");
        assert_eq!(invocation.args()[0], "-c");
        &invocation.args()[1]
    }

    #[test]
    fn test_split_arguments() {
        assert_eq!(split_arguments("PING"), vec!["PING"]);
        assert_eq!(
            split_arguments("SET suspect \"Colonel Mustard\""),
            vec!["SET", "suspect", "Colonel Mustard"]
        );
        assert_eq!(split_arguments("ECHO 'a \"b\"'"), vec!["ECHO", "a \"b\""]);
        assert_eq!(split_arguments("SET k ''"), vec!["SET", "k", ""]);
        assert_eq!(split_arguments("  GET   key  "), vec!["GET", "key"]);
        assert_eq!(split_arguments("ECHO \"unterminated"), vec!["ECHO", "unterminated"]);
        assert!(split_arguments("   ").is_empty());
    }

    #[test]
    fn test_redis_runs_without_shell() {
        let invocation = container().build(Language::Redis, "SET note \"hello world\"");
        assert_eq!(invocation.argv, vec!["redis-cli", "SET", "note", "hello world"]);
        assert!(invocation.working_dir.is_none());
    }

    #[test]
    fn test_sql_escapes_single_quotes() {
        let invocation = container().build(
            Language::Sql,
            "SELECT name FROM employees WHERE dept = 'IT';",
        );
        assert_eq!(
            script(&invocation),
            r"printf '%s\n' 'SELECT name FROM employees WHERE dept = '\''IT'\'';' | sqlite3 /data/company.db"
        );
    }

    #[test]
    fn test_sql_keeps_backslashes_literal() {
        let invocation = local().build(Language::Sql, r"SELECT 'a\nb';");
        assert_eq!(
            script(&invocation),
            r"printf '%s\n' 'SELECT '\''a\nb'\'';' | sqlite3 /srv/grader/company.db"
        );
    }

    #[test]
    fn test_git_runs_in_repo_dir_when_configured() {
        let in_container = container().build(Language::Git, "git log --oneline");
        assert_eq!(script(&in_container), "git log --oneline");
        assert!(in_container.working_dir.is_none());

        let on_host = local().build(Language::Git, "git status");
        assert_eq!(on_host.working_dir.as_deref(), Some("/srv/grader/git-repo"));
    }

    #[test]
    fn test_docker_content_is_written_then_echoed() {
        let dockerfile = "FROM alpine:3.19\nRUN echo 'hi'";
        let invocation = container().build(Language::Docker, dockerfile);
        let expected = format!(
            "echo '{}' | base64 -d > /tmp/user_input && cat /tmp/user_input",
            STANDARD.encode(dockerfile)
        );
        assert_eq!(script(&invocation), expected);
    }

    #[test]
    fn test_docker_tools_run_directly() {
        let invocation = container().build(Language::Docker, "validate-dockerfile /tmp/user_input");
        assert_eq!(invocation.argv, vec!["validate-dockerfile", "/tmp/user_input"]);

        let invocation = container().build(Language::Docker, "docker ps -a");
        assert_eq!(invocation.argv, vec!["docker", "ps", "-a"]);
    }

    #[test]
    fn test_local_layout_resolves_tool_scripts() {
        let invocation = local().build(Language::Docker, "validate-compose /tmp/user_input");
        assert_eq!(
            invocation.argv,
            vec![
                "python3",
                "/srv/grader/scripts/docker/validate_compose.py",
                "/srv/grader/user-input"
            ]
        );

        let invocation = local().build(Language::Llm, "tokenize-text");
        assert_eq!(
            invocation.argv,
            vec![
                "python3",
                "/srv/grader/scripts/llm/tokenize_text.py",
                "/srv/grader/user-input"
            ]
        );

        let invocation = local().build(Language::Docker, "docker images");
        assert_eq!(
            invocation.argv,
            vec!["sh", "/srv/grader/scripts/docker/mock_docker.sh", "images"]
        );
    }

    #[test]
    fn test_llm_prompt_goes_through_dispatcher() {
        let prompt = "Explain tokens to a detective.";
        let invocation = container().build(Language::Llm, prompt);
        let expected = format!(
            "echo '{}' | base64 -d > /tmp/user_input && cd /scripts && python llm_dispatch.py",
            STANDARD.encode(prompt)
        );
        assert_eq!(script(&invocation), expected);

        let invocation = local().build(Language::Llm, prompt);
        assert!(script(&invocation)
            .ends_with("&& python3 /srv/grader/scripts/llm/llm_dispatch.py"));
    }

    #[test]
    fn test_llm_direct_commands() {
        let invocation = container().build(Language::Llm, "call-llm /tmp/user_input");
        assert_eq!(invocation.argv, vec!["call-llm", "/tmp/user_input"]);
    }

    #[test]
    fn test_single_line_bash_runs_in_workspace() {
        let invocation = container().build(Language::Bash, "ls -la");
        assert_eq!(script(&invocation), "cd /workspace && ls -la");
    }

    #[test]
    fn test_multiline_bash_takes_script_path() {
        let code = "for f in *.tmp; do\n  rm \"$f\"\ndone";
        let invocation = container().build(Language::Bash, code);
        let script = script(&invocation);

        assert!(script.starts_with(&format!("echo '{}' | base64 -d > /tmp/user_script.sh", STANDARD.encode(code))));
        assert!(script.ends_with("chmod +x /tmp/user_script.sh && cd /workspace && bash /tmp/user_script.sh"));
        // raw code never reaches the shell line
        assert!(!script.contains("rm \"$f\""));
    }

    #[test]
    fn test_shebang_bash_takes_script_path() {
        let invocation = container().build(Language::Bash, "#!/bin/bash\necho hi");
        assert!(script(&invocation).contains("bash /tmp/user_script.sh"));

        let invocation = container().build(Language::Bash, "#!/bin/sh echo hi");
        assert!(script(&invocation).contains("base64 -d"));
    }

    #[test]
    fn test_paths_with_spaces_are_quoted() {
        let builder = CommandBuilder::new(Layout::local(&LocalConfig::rooted_at(Path::new(
            "/tmp/my grader",
        ))));
        let invocation = builder.build(Language::Bash, "pwd");
        assert_eq!(script(&invocation), "cd '/tmp/my grader/workspace' && pwd");
    }

    #[test]
    fn test_display_includes_working_dir() {
        let invocation = Invocation::shell("git status").in_dir("/repo");
        assert_eq!(invocation.to_string(), "(in /repo) sh -c git status");
    }
}
