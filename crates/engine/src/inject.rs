//! Rewrites a build recipe so that it launches the resolved command.
//!
//! Two recipe formats are supported: a container build file, whose trailing
//! `ENTRYPOINT`/`CMD` line is replaced (or an `ENTRYPOINT` appended), and a
//! unikernel `Kraftfile`, whose `cmd` key is replaced. Both rewrites are
//! idempotent: injecting the same command twice yields byte-identical text.

use mcp_hub_types::RunDescriptor;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_yaml::{Mapping, Value};
use thiserror::Error;
use tracing::debug;

static LAUNCH_DIRECTIVE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*(ENTRYPOINT|CMD)(\s|\[|$)").expect("launch directive regex should compile"));

/// The build recipe cannot be rewritten.
#[derive(Debug, Error)]
pub enum InjectError {
    #[error("build file is empty")]
    Empty,

    #[error("command line is empty")]
    EmptyCommand,

    #[error("trailing directive spans several lines and cannot be replaced: {line}")]
    Continuation { line: String },

    #[error("Kraftfile must be a YAML mapping, found {found}")]
    KraftfileShape { found: &'static str },

    #[error("Kraftfile YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("failed to render entrypoint: {0}")]
    Render(#[from] serde_json::Error),
}

/// Rewrites a build file so its final directive launches `descriptor`.
///
/// Property references render as their `$name` placeholder; callers that substitute
/// values first should use [`inject_command`].
pub fn inject(build_file: &str, descriptor: &RunDescriptor) -> Result<String, InjectError> {
    inject_command(build_file, &descriptor.placeholder_command_line())
}

/// Rewrites a build file so its final directive is `ENTRYPOINT [<command_line>]`.
///
/// Blank lines are dropped; every other line before the trailing directive is kept
/// byte-for-byte. A trailing `ENTRYPOINT` or `CMD` line is replaced, otherwise the
/// directive is appended.
pub fn inject_command(build_file: &str, command_line: &[String]) -> Result<String, InjectError> {
    if command_line.is_empty() {
        return Err(InjectError::EmptyCommand);
    }

    let newline = dominant_newline(build_file);
    let mut lines: Vec<&str> = build_file.lines().filter(|line| !line.trim().is_empty()).collect();
    let Some(last) = lines.last().copied() else {
        return Err(InjectError::Empty);
    };

    if continues(last) {
        return Err(InjectError::Continuation { line: last.to_string() });
    }

    // First line of the trailing instruction, following `\` continuations backwards.
    let mut start = lines.len() - 1;
    while start > 0 && continues(lines[start - 1]) {
        start -= 1;
    }
    if LAUNCH_DIRECTIVE.is_match(lines[start]) {
        if start != lines.len() - 1 {
            return Err(InjectError::Continuation {
                line: lines[start].to_string(),
            });
        }
        debug!(directive = %last, "replacing trailing launch directive");
        lines.pop();
    }

    let entrypoint = render_entrypoint(command_line)?;
    let mut rewritten = String::with_capacity(build_file.len() + entrypoint.len() + newline.len());
    for line in lines {
        rewritten.push_str(line);
        rewritten.push_str(newline);
    }
    rewritten.push_str(&entrypoint);
    rewritten.push_str(newline);
    Ok(rewritten)
}

/// CRLF only when most line breaks in the file are CRLF.
fn dominant_newline(text: &str) -> &'static str {
    let crlf = text.matches("\r\n").count();
    let lf = text.matches('\n').count() - crlf;
    if crlf > lf { "\r\n" } else { "\n" }
}

fn continues(line: &str) -> bool {
    line.trim_end().ends_with('\\')
}

/// Exec-form directive; each element is JSON-escaped.
pub fn render_entrypoint(command_line: &[String]) -> Result<String, InjectError> {
    Ok(format!("ENTRYPOINT {}", serde_json::to_string(command_line)?))
}

/// Sets the `cmd` key of a Kraftfile, keeping every other key and its position.
pub fn inject_kraftfile(kraftfile: &str, command_line: &[String]) -> Result<String, InjectError> {
    if command_line.is_empty() {
        return Err(InjectError::EmptyCommand);
    }
    if kraftfile.trim().is_empty() {
        return Err(InjectError::Empty);
    }

    let mut document: Mapping = match serde_yaml::from_str::<Value>(kraftfile)? {
        Value::Mapping(mapping) => mapping,
        Value::Sequence(_) => return Err(InjectError::KraftfileShape { found: "a sequence" }),
        _ => return Err(InjectError::KraftfileShape { found: "a scalar" }),
    };
    let command = Value::Sequence(command_line.iter().cloned().map(Value::String).collect());
    document.insert(Value::String("cmd".to_string()), command);
    Ok(serde_yaml::to_string(&document)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcp_hub_types::{ArgValue, TransportType};

    fn descriptor(command: &str, args: &[&str]) -> RunDescriptor {
        let mut descriptor = RunDescriptor::new(command, TransportType::Stdio);
        descriptor.args = args.iter().map(|arg| ArgValue::Literal(arg.to_string())).collect();
        descriptor
    }

    const BUILD_FILE: &str = "FROM node:22-alpine\nWORKDIR /app\n\nCOPY . .\nRUN npm ci && npm run build\nENTRYPOINT [\"node\",\"old.js\"]\n";

    #[test]
    fn replaces_trailing_entrypoint_and_keeps_earlier_lines() {
        let rewritten = inject(BUILD_FILE, &descriptor("node", &["dist/index.js", "start"])).unwrap();
        assert_eq!(
            rewritten,
            "FROM node:22-alpine\nWORKDIR /app\nCOPY . .\nRUN npm ci && npm run build\nENTRYPOINT [\"node\",\"dist/index.js\",\"start\"]\n"
        );
    }

    #[test]
    fn is_idempotent() {
        let target = descriptor("node", &["dist/index.js"]);
        let once = inject(BUILD_FILE, &target).unwrap();
        let twice = inject(&once, &target).unwrap();
        assert_eq!(once, twice);

        let appended_once = inject("FROM scratch", &target).unwrap();
        assert_eq!(inject(&appended_once, &target).unwrap(), appended_once);
    }

    #[test]
    fn appends_when_no_launch_directive_is_present() {
        let rewritten = inject("FROM python:3.12\nRUN pip install .", &descriptor("python", &["-m", "server"])).unwrap();
        assert_eq!(
            rewritten,
            "FROM python:3.12\nRUN pip install .\nENTRYPOINT [\"python\",\"-m\",\"server\"]\n"
        );
    }

    #[test]
    fn replaces_trailing_cmd_and_renders_placeholders() {
        let mut target = descriptor("node", &["index.js"]);
        target.args.push(ArgValue::Reference("port".into()));
        let rewritten = inject("FROM node\ncmd node index.js", &target).unwrap();
        assert_eq!(rewritten, "FROM node\nENTRYPOINT [\"node\",\"index.js\",\"$port\"]\n");
    }

    #[test]
    fn preserves_crlf_line_endings() {
        let rewritten = inject("FROM node\r\nENTRYPOINT [\"x\"]\r\n", &descriptor("node", &[])).unwrap();
        assert_eq!(rewritten, "FROM node\r\nENTRYPOINT [\"node\"]\r\n");
    }

    #[test]
    fn recognizes_lf_directive_in_a_mostly_crlf_file() {
        let mixed = "FROM node\r\nWORKDIR /app\r\nCOPY . .\r\nENTRYPOINT [\"x\"]\n";
        let rewritten = inject(mixed, &descriptor("node", &[])).unwrap();
        assert_eq!(rewritten, "FROM node\r\nWORKDIR /app\r\nCOPY . .\r\nENTRYPOINT [\"node\"]\r\n");
        assert_eq!(rewritten.matches("ENTRYPOINT").count(), 1);

        let mostly_lf = "FROM node\nRUN a\nRUN b\r\nCMD [\"x\"]\n";
        assert_eq!(inject(mostly_lf, &descriptor("node", &[])).unwrap(), "FROM node\nRUN a\nRUN b\nENTRYPOINT [\"node\"]\n");
    }

    #[test]
    fn escapes_quotes_in_arguments() {
        let rewritten = inject("FROM node", &descriptor("sh", &["-c", "echo \"hi\""])).unwrap();
        assert!(rewritten.ends_with("ENTRYPOINT [\"sh\",\"-c\",\"echo \\\"hi\\\"\"]\n"), "{rewritten}");
    }

    #[test]
    fn rejects_empty_build_files() {
        assert!(matches!(inject("", &descriptor("node", &[])), Err(InjectError::Empty)));
        assert!(matches!(inject("\n \n\t\n", &descriptor("node", &[])), Err(InjectError::Empty)));
    }

    #[test]
    fn rejects_multi_line_trailing_directives() {
        let error = inject("FROM node\nENTRYPOINT [\"node\", \\\n  \"a.js\"]", &descriptor("node", &[])).unwrap_err();
        assert!(matches!(error, InjectError::Continuation { .. }));

        let error = inject("FROM node\nRUN apk add \\", &descriptor("node", &[])).unwrap_err();
        assert!(matches!(error, InjectError::Continuation { .. }));
    }

    #[test]
    fn appends_after_a_multi_line_run_instruction() {
        let rewritten = inject("FROM node\nRUN apk add \\\n  git", &descriptor("node", &[])).unwrap();
        assert_eq!(rewritten, "FROM node\nRUN apk add \\\n  git\nENTRYPOINT [\"node\"]\n");
    }

    #[test]
    fn rejects_empty_command_line() {
        assert!(matches!(inject_command("FROM node", &[]), Err(InjectError::EmptyCommand)));
    }

    #[test]
    fn sets_kraftfile_cmd_and_keeps_other_keys() {
        let kraftfile = "spec: v0.6\nruntime: node:21\nrootfs: ./Dockerfile\ncmd: [\"/usr/bin/node\", \"old.js\"]\nlabels:\n  cloud.unikraft.v1.instances/scale_to_zero.policy: idle\n";
        let command = vec!["node".to_string(), "dist/index.js".to_string()];
        let rewritten = inject_kraftfile(kraftfile, &command).unwrap();

        let parsed: Value = serde_yaml::from_str(&rewritten).unwrap();
        assert_eq!(parsed["cmd"], Value::Sequence(vec!["node".into(), "dist/index.js".into()]));
        assert_eq!(parsed["runtime"], Value::String("node:21".into()));
        let keys: Vec<_> = parsed.as_mapping().unwrap().keys().filter_map(Value::as_str).collect();
        assert_eq!(keys, vec!["spec", "runtime", "rootfs", "cmd", "labels"]);

        assert_eq!(inject_kraftfile(&rewritten, &command).unwrap(), rewritten);
    }

    #[test]
    fn rejects_non_mapping_kraftfiles() {
        let command = vec!["node".to_string()];
        assert!(matches!(inject_kraftfile("- a\n- b\n", &command), Err(InjectError::KraftfileShape { .. })));
        assert!(matches!(inject_kraftfile("  ", &command), Err(InjectError::Empty)));
    }
}
