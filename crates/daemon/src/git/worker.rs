// Thin wrapper over the `git` executable.
//
// Every call is one child process rooted at the working tree. The executor is
// a trait so unit tests can script responses without a real repository.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::process::Command;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitCommandOutput {
    pub stdout: String,
    pub stderr: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GitWorkerError {
    SpawnFailed { command: String, message: String },
    CommandFailed { command: String, code: Option<i32>, stderr: String },
    /// The blocking task running the command panicked or was cancelled.
    TaskFailed { command: String, message: String },
}

impl GitWorkerError {
    /// Exit code of a command that ran but failed.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            GitWorkerError::CommandFailed { code, .. } => *code,
            _ => None,
        }
    }
}

impl Display for GitWorkerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            GitWorkerError::SpawnFailed { command, message } => {
                write!(f, "failed to run `{command}`: {message}")
            }
            GitWorkerError::CommandFailed { command, code, stderr } => {
                write!(f, "`{command}` failed with code {:?}: {}", code, stderr.trim())
            }
            GitWorkerError::TaskFailed { command, message } => {
                write!(f, "`{command}` did not complete: {message}")
            }
        }
    }
}

impl Error for GitWorkerError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

pub trait CommandExecutor: Send + Sync {
    fn execute(
        &self,
        program: &str,
        args: &[String],
        envs: &[(String, String)],
        cwd: &Path,
    ) -> Result<CommandResult, std::io::Error>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessCommandExecutor;

impl CommandExecutor for ProcessCommandExecutor {
    fn execute(
        &self,
        program: &str,
        args: &[String],
        envs: &[(String, String)],
        cwd: &Path,
    ) -> Result<CommandResult, std::io::Error> {
        let output = Command::new(program)
            .args(args)
            .envs(envs.iter().map(|(key, value)| (key.as_str(), value.as_str())))
            .current_dir(cwd)
            .output()?;
        Ok(CommandResult {
            success: output.status.success(),
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct GitWorker<E = ProcessCommandExecutor> {
    repo_path: PathBuf,
    executor: E,
}

impl GitWorker<ProcessCommandExecutor> {
    pub fn new(repo_path: impl Into<PathBuf>) -> Self {
        Self { repo_path: repo_path.into(), executor: ProcessCommandExecutor }
    }
}

impl<E: CommandExecutor> GitWorker<E> {
    pub fn with_executor(repo_path: impl Into<PathBuf>, executor: E) -> Self {
        Self { repo_path: repo_path.into(), executor }
    }

    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }

    pub fn run<S: AsRef<str>>(&self, args: &[S]) -> Result<GitCommandOutput, GitWorkerError> {
        self.run_with_env(args, &[])
    }

    /// Run `git <args>` with extra environment variables set on the child only.
    pub fn run_with_env<S: AsRef<str>>(
        &self,
        args: &[S],
        envs: &[(String, String)],
    ) -> Result<GitCommandOutput, GitWorkerError> {
        let args: Vec<String> = args.iter().map(|arg| arg.as_ref().to_string()).collect();
        let command = format!("git {}", args.join(" "));
        let result =
            self.executor.execute("git", &args, envs, &self.repo_path).map_err(|error| {
                GitWorkerError::SpawnFailed { command: command.clone(), message: error.to_string() }
            })?;

        if result.success {
            return Ok(GitCommandOutput { stdout: result.stdout, stderr: result.stderr });
        }

        let stderr = if result.stderr.trim().is_empty() { result.stdout } else { result.stderr };

        Err(GitWorkerError::CommandFailed { command, code: result.code, stderr })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub(crate) struct Invocation {
        pub program: String,
        pub args: Vec<String>,
        pub envs: Vec<(String, String)>,
        pub cwd: PathBuf,
    }

    #[derive(Clone, Default)]
    pub(crate) struct MockExecutor {
        calls: Arc<Mutex<Vec<Invocation>>>,
        responses: Arc<Mutex<VecDeque<Result<CommandResult, std::io::Error>>>>,
    }

    impl MockExecutor {
        pub(crate) fn new(responses: Vec<Result<CommandResult, std::io::Error>>) -> Self {
            Self {
                calls: Arc::new(Mutex::new(Vec::new())),
                responses: Arc::new(Mutex::new(VecDeque::from(responses))),
            }
        }

        pub(crate) fn calls(&self) -> Vec<Invocation> {
            self.calls.lock().expect("mock calls lock poisoned").clone()
        }
    }

    impl CommandExecutor for MockExecutor {
        fn execute(
            &self,
            program: &str,
            args: &[String],
            envs: &[(String, String)],
            cwd: &Path,
        ) -> Result<CommandResult, std::io::Error> {
            self.calls.lock().expect("mock calls lock poisoned").push(Invocation {
                program: program.to_string(),
                args: args.to_vec(),
                envs: envs.to_vec(),
                cwd: cwd.to_path_buf(),
            });

            self.responses
                .lock()
                .expect("mock responses lock poisoned")
                .pop_front()
                .expect("missing mock response")
        }
    }

    pub(crate) fn ok(stdout: &str) -> Result<CommandResult, std::io::Error> {
        Ok(CommandResult { success: true, code: Some(0), stdout: stdout.to_string(), stderr: String::new() })
    }

    pub(crate) fn fail(code: i32, stderr: &str) -> Result<CommandResult, std::io::Error> {
        Ok(CommandResult {
            success: false,
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.to_string(),
        })
    }

    #[test]
    fn run_passes_args_and_cwd() {
        let mock = MockExecutor::new(vec![ok(" M README.md\n")]);

        let worker = GitWorker::with_executor("/tmp/repo", mock.clone());
        let output = worker.run(&["status", "--short"]).expect("status should succeed");

        assert_eq!(output.stdout, " M README.md\n");
        let calls = mock.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].program, "git");
        assert_eq!(calls[0].args, vec!["status", "--short"]);
        assert!(calls[0].envs.is_empty());
        assert_eq!(calls[0].cwd, PathBuf::from("/tmp/repo"));
    }

    #[test]
    fn run_with_env_forwards_variables() {
        let mock = MockExecutor::new(vec![ok("")]);
        let worker = GitWorker::with_executor("/tmp/repo", mock.clone());

        let envs = vec![("GIT_AUTHOR_DATE".to_string(), "2024-01-01T00:00:00+00:00".to_string())];
        worker.run_with_env(&["commit", "-m", "msg"], &envs).expect("commit should succeed");

        assert_eq!(mock.calls()[0].envs, envs);
    }

    #[test]
    fn failure_reports_stderr_and_code() {
        let mock = MockExecutor::new(vec![fail(1, "fatal: bad revision\n")]);
        let worker = GitWorker::with_executor("/tmp/repo", mock);

        let error = worker.run(&["pull"]).expect_err("pull should fail");
        assert_eq!(
            error,
            GitWorkerError::CommandFailed {
                command: "git pull".to_string(),
                code: Some(1),
                stderr: "fatal: bad revision\n".to_string(),
            }
        );
        assert_eq!(error.exit_code(), Some(1));
    }

    #[test]
    fn failure_falls_back_to_stdout_when_stderr_empty() {
        let mock = MockExecutor::new(vec![Ok(CommandResult {
            success: false,
            code: Some(1),
            stdout: "nothing to commit, working tree clean\n".to_string(),
            stderr: String::new(),
        })]);
        let worker = GitWorker::with_executor("/tmp/repo", mock);

        let error = worker.run(&["commit", "-m", "x"]).expect_err("commit should fail");
        assert!(error.to_string().contains("nothing to commit"));
    }

    #[test]
    fn spawn_failure_is_reported() {
        let mock = MockExecutor::new(vec![Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "git not found",
        ))]);
        let worker = GitWorker::with_executor("/tmp/repo", mock);

        let error = worker.run(&["status"]).expect_err("spawn should fail");
        assert!(matches!(error, GitWorkerError::SpawnFailed { .. }));
        assert_eq!(error.exit_code(), None);
    }
}
