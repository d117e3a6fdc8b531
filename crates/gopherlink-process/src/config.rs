//! Process configuration

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for spawning a process
#[derive(Debug, Clone)]
pub struct ProcessConfig {
    /// Executable command (bare name or resolved path)
    pub command: String,
    /// Command arguments
    pub args: Vec<String>,
    /// Working directory (None = current dir)
    pub working_dir: Option<PathBuf>,
    /// Environment variables (added to parent env)
    pub env: HashMap<String, String>,
    /// Text written to stdin, which is then closed
    pub stdin: Option<String>,
    /// Timeout for process execution (None = no timeout)
    pub timeout: Option<Duration>,
    /// Capture stdout
    pub capture_stdout: bool,
    /// Capture stderr
    pub capture_stderr: bool,
}

impl ProcessConfig {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: vec![],
            working_dir: None,
            env: HashMap::new(),
            stdin: None,
            timeout: None,
            capture_stdout: true,
            capture_stderr: true,
        }
    }

    /// Build from a resolved executable path
    pub fn for_path(path: impl Into<PathBuf>) -> Self {
        Self::new(path.into().to_string_lossy().into_owned())
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Append arguments after the ones already set
    pub fn extend_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Merge a whole environment map
    pub fn envs(mut self, env: &HashMap<String, String>) -> Self {
        self.env
            .extend(env.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    /// Feed `input` on stdin and close it
    pub fn stdin(mut self, input: impl Into<String>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    pub fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = Some(duration);
        self
    }

    pub fn capture_stdout(mut self, capture: bool) -> Self {
        self.capture_stdout = capture;
        self
    }

    pub fn capture_stderr(mut self, capture: bool) -> Self {
        self.capture_stderr = capture;
        self
    }

    /// Command line for log messages
    pub fn display(&self) -> String {
        if self.args.is_empty() {
            self.command.clone()
        } else {
            format!("{} {}", self.command, self.args.join(" "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let mut extra = HashMap::new();
        extra.insert("GO111MODULE".to_string(), "on".to_string());

        let config = ProcessConfig::new("gofmt")
            .args(["-e"])
            .extend_args(["-s"])
            .envs(&extra)
            .stdin("package main\n");

        assert_eq!(config.args, vec!["-e", "-s"]);
        assert_eq!(config.env.get("GO111MODULE").unwrap(), "on");
        assert_eq!(config.stdin.as_deref(), Some("package main\n"));
        assert!(config.timeout.is_none());
        assert_eq!(config.display(), "gofmt -e -s");
    }
}
