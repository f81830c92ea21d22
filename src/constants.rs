//! Application-wide constants
//!
//! This module contains all constant values used throughout the application.
//! Constants are grouped by their purpose for better organization.

// =============================================================================
// SERVER DEFAULTS
// =============================================================================

/// Default server host address
pub const DEFAULT_SERVER_HOST: &str = "0.0.0.0";

/// Default server port
pub const DEFAULT_SERVER_PORT: u16 = 8080;

/// Maximum accepted request body in bytes
pub const MAX_REQUEST_BODY_BYTES: usize = 256 * 1024;

// =============================================================================
// GRADER DEFAULTS
// =============================================================================

/// Number of warm containers kept per language
pub const DEFAULT_POOL_SIZE: usize = 3;

/// Per-call timeout for grading commands
pub const DEFAULT_EXECUTION_TIMEOUT_SECONDS: u64 = 10;

/// Per-call timeout for commands that may reach an upstream LLM API
pub const DEFAULT_LLM_TIMEOUT_SECONDS: u64 = 30;

/// Default memory limit per grading container in megabytes
pub const DEFAULT_CONTAINER_MEMORY_LIMIT_MB: u64 = 256;

/// Process limit per grading container
pub const CONTAINER_PIDS_LIMIT: i64 = 64;

/// Maximum submission size in bytes (64 KB)
pub const MAX_USER_CODE_SIZE: u64 = 64 * 1024;

/// Exit code reported when a command is cut off by the timeout
pub const TIMEOUT_EXIT_CODE: i64 = 124;

/// Output reported when a command is cut off by the timeout
pub const TIMEOUT_MESSAGE: &str = "Error: command timed out";

/// Name of the environment variable carrying the LLM API key
pub const LLM_API_KEY_ENV: &str = "LLM_API_KEY";

/// Feedback for a passing submission
pub const CORRECT_FEEDBACK: &str = "Correct!";

// =============================================================================
// SUPPORTED LANGUAGES
// =============================================================================

/// Language identifiers
pub mod languages {
    pub const REDIS: &str = "redis";
    pub const SQL: &str = "sql";
    pub const GIT: &str = "git";
    pub const DOCKER: &str = "docker";
    pub const LLM: &str = "llm";
    pub const BASH: &str = "bash";

    /// All supported language identifiers
    pub const ALL: &[&str] = &[REDIS, SQL, GIT, DOCKER, LLM, BASH];
}

/// Container images for each language
pub mod container_images {
    pub const REDIS: &str = "grader-image-redis";
    pub const SQL: &str = "grader-image-sql";
    pub const GIT: &str = "grader-image-git";
    pub const DOCKER: &str = "grader-image-docker";
    pub const LLM: &str = "grader-image-llm";
    pub const BASH: &str = "grader-image-bash";
}

/// Fixed paths inside the grading containers
pub mod container_paths {
    pub const SQL_DATABASE: &str = "/data/company.db";
    pub const WORKSPACE: &str = "/workspace";
    pub const USER_INPUT: &str = "/tmp/user_input";
    pub const USER_SCRIPT: &str = "/tmp/user_script.sh";
    pub const LLM_MODE: &str = "/tmp/llm_mode";
    pub const LLM_DISPATCH: &str = "cd /scripts && python llm_dispatch.py";
}

/// Default paths used by the subprocess backend
pub mod local_paths {
    pub const SQL_SOURCE: &str = "docker/sql/company.db";
    pub const SQL_DATABASE: &str = "/tmp/grader-company.db";
    pub const GIT_REPO: &str = "/tmp/grader-git-repo";
    pub const WORKSPACE: &str = "/tmp/grader-workspace";
    pub const USER_INPUT: &str = "/tmp/grader-user-input";
    pub const USER_SCRIPT: &str = "/tmp/grader-user-script.sh";
    pub const LLM_MODE: &str = "/tmp/llm_mode";
    pub const SCRIPTS_DIR: &str = "docker";
}

// =============================================================================
// SANITIZER POLICY
// =============================================================================

/// Redis commands a learner may issue
pub const REDIS_ALLOWED_COMMANDS: &[&str] = &[
    "PING", "ECHO", "SET", "GET", "GETSET", "SETNX", "SETEX", "MSET", "MGET", "DEL",
    "EXISTS", "KEYS", "SCAN", "TYPE", "RENAME", "EXPIRE", "PEXPIRE", "TTL", "PTTL",
    "PERSIST", "INCR", "INCRBY", "DECR", "DECRBY", "APPEND", "STRLEN", "GETRANGE",
    "HSET", "HGET", "HMSET", "HMGET", "HGETALL", "HDEL", "HEXISTS", "HKEYS", "HVALS",
    "HLEN", "HINCRBY", "LPUSH", "RPUSH", "LPOP", "RPOP", "LRANGE", "LLEN", "LINDEX",
    "LSET", "LREM", "LTRIM", "SADD", "SREM", "SMEMBERS", "SISMEMBER", "SCARD",
    "SINTER", "SUNION", "SDIFF", "ZADD", "ZREM", "ZRANGE", "ZREVRANGE", "ZRANGEBYSCORE",
    "ZSCORE", "ZRANK", "ZREVRANK", "ZCARD", "ZCOUNT", "ZINCRBY", "DBSIZE", "PUBLISH",
    "XADD", "XRANGE", "XLEN", "PFADD", "PFCOUNT", "PFMERGE", "GEOADD", "GEODIST",
    "GEOPOS", "SETBIT", "GETBIT", "BITCOUNT",
];

/// SQL statements the read-only sandbox refuses
pub const SQL_BLOCKED_KEYWORDS: &[&str] = &[
    "DROP", "DELETE", "TRUNCATE", "ALTER", "CREATE", "INSERT", "UPDATE", "ATTACH",
    "DETACH",
];

/// sqlite3 meta-commands that escape to the host shell
pub const SQL_BLOCKED_META_COMMANDS: &[&str] = &[".shell", ".system"];

/// Prefixes every `&&` clause of a git submission must start with
pub const GIT_ALLOWED_PREFIXES: &[&str] = &["git ", "touch ", "echo ", "cat ", "ls"];

// =============================================================================
// COMMAND ROUTING
// =============================================================================

/// Prefixes of docker-tutorial commands that run directly
pub const DOCKER_DIRECT_PREFIXES: &[&str] = &["docker", "validate-"];

/// Prefixes of LLM-tutorial commands that run directly
pub const LLM_DIRECT_PREFIXES: &[&str] =
    &["validate-", "call-llm", "tokenize-", "compute-", "curl"];

/// Validator tools and the script implementing each one, relative to the scripts dir
pub const TOOL_SCRIPTS: &[(&str, &str)] = &[
    ("validate-dockerfile", "docker/validate_dockerfile.py"),
    ("validate-compose", "docker/validate_compose.py"),
    ("validate-api-request", "llm/validate_api_request.py"),
    ("tokenize-text", "llm/tokenize_text.py"),
    ("compute-similarity", "llm/compute_similarity.py"),
    ("call-llm", "llm/call_llm.py"),
];

/// Mock docker CLI used by the subprocess backend, relative to the scripts dir
pub const MOCK_DOCKER_SCRIPT: &str = "docker/mock_docker.sh";

/// LLM dispatcher used by the subprocess backend, relative to the scripts dir
pub const LLM_DISPATCH_SCRIPT: &str = "llm/llm_dispatch.py";

// =============================================================================
// SHELL WORKSPACE SAMPLES
// =============================================================================

/// Files seeded into the shell-lesson workspace
pub mod workspace_samples {
    pub const SERVER_LOG: &str = "\
2024-03-01 08:00:01 INFO server started on port 8080
2024-03-01 08:00:05 INFO accepted connection from 192.168.1.10
2024-03-01 08:01:12 ERROR connection reset by peer 192.168.1.10
2024-03-01 08:02:40 WARN slow response 1200ms /api/orders
2024-03-01 08:03:02 error connection timeout to database
2024-03-01 08:04:17 INFO accepted connection from 10.0.0.7
2024-03-01 08:05:55 ERROR disk usage above 90 percent
";

    pub const ACCESS_LOG: &str = "\
192.168.1.10 - - [01/Mar/2024:08:00:05] \"GET / HTTP/1.1\" 200
192.168.1.10 - - [01/Mar/2024:08:00:06] \"GET /login HTTP/1.1\" 200
10.0.0.7 - - [01/Mar/2024:08:04:17] \"GET / HTTP/1.1\" 200
10.0.0.7 - - [01/Mar/2024:08:04:19] \"POST /login HTTP/1.1\" 302
192.168.1.22 - - [01/Mar/2024:08:06:30] \"GET /admin HTTP/1.1\" 403
10.0.0.9 - - [01/Mar/2024:08:07:02] \"GET /health HTTP/1.1\" 200
192.168.1.10 - - [01/Mar/2024:08:00:05] \"GET / HTTP/1.1\" 200
";

    /// Junk files recreated on every reset
    pub const JUNK_FILES: &[&str] = &["junk1.tmp", "junk2.tmp", "subdir/junk3.tmp"];

    /// Directories learners are asked to create
    pub const LESSON_OUTPUTS: &[&str] = &["camp", "mysite", "signal.txt", "backup.txt"];
}
