// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Build tool invocation.
//!
//! Projects are built through the build tool wrapper script that lives at
//! their top-level, e.g., `gradlew`. The wrapper is always launched with the
//! project as the working directory of the child process itself. The working
//! directory of the current process is never changed.
//!
//! # Output Streaming
//!
//! Standard error of the build is redirected onto standard output by the
//! shell that launches the wrapper, so both streams share a single pipe and
//! lines arrive in the order the build wrote them. Output is forwarded line
//! by line as it is produced. Lines that are not valid UTF-8 are forwarded
//! lossily.

use std::{
    ffi::OsString,
    path::{Path, PathBuf},
    process::{ExitStatus, Stdio},
};
use tokio::{
    io::{AsyncBufReadExt, AsyncRead, BufReader},
    process::Command,
};
use tracing::{info, instrument, warn};

/// Runs build tool wrapper scripts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRunner {
    wrapper: String,
}

impl BuildRunner {
    /// Construct new build runner for wrapper script name.
    pub fn new(wrapper: impl Into<String>) -> Self {
        Self {
            wrapper: wrapper.into(),
        }
    }

    /// Run build task in project directory.
    ///
    /// The task is split on whitespace into wrapper arguments. Every line of
    /// output is handed to `sink` as soon as it is read. Succeeds if and only
    /// if the wrapper exits with status zero. Nothing is retried.
    ///
    /// # Errors
    ///
    /// - Return [`BuildError::MissingWrapper`] if project lacks wrapper script.
    /// - Return [`BuildError::Launch`] if wrapper cannot be launched.
    /// - Return [`BuildError::Status`] if wrapper exits with non-zero status.
    #[instrument(skip(self, project, sink), level = "debug")]
    pub async fn run(
        &self,
        project: impl AsRef<Path>,
        task: &str,
        mut sink: impl FnMut(&str),
    ) -> Result<()> {
        let project = project.as_ref();
        let wrapper = project.join(&self.wrapper);
        if !wrapper.is_file() {
            return Err(BuildError::MissingWrapper(wrapper));
        }

        info!("run {} {task} in {:?}", self.wrapper, project.display());
        let mut child = self
            .command(project, task)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|err| BuildError::Launch {
                source: err,
                wrapper: wrapper.clone(),
            })?;

        if let Some(stdout) = child.stdout.take() {
            forward_lines(stdout, &mut sink).await;
        }

        let status = child.wait().await.map_err(|err| BuildError::Launch {
            source: err,
            wrapper: wrapper.clone(),
        })?;

        if !status.success() {
            return Err(BuildError::Status {
                status,
                project: project.to_path_buf(),
            });
        }

        info!("build of {:?} succeeded", project.display());
        Ok(())
    }

    // INVARIANT: Standard error is merged into standard output at the source.
    fn command(&self, project: &Path, task: &str) -> Command {
        let tasks = task.split_whitespace().map(OsString::from);
        let (program, args): (&str, Vec<OsString>) = if cfg!(windows) {
            let mut args: Vec<OsString> = vec!["/C".into(), self.wrapper.clone().into()];
            args.extend(tasks);
            args.push("2>&1".into());
            ("cmd", args)
        } else {
            let mut args: Vec<OsString> = vec![
                "-c".into(),
                r#"exec sh "$0" "$@" 2>&1"#.into(),
                Path::new(".").join(&self.wrapper).into_os_string(),
            ];
            args.extend(tasks);
            ("sh", args)
        };

        let mut command = Command::new(program);
        command.args(args).current_dir(project);
        command
    }
}

async fn forward_lines(pipe: impl AsyncRead + Unpin, sink: &mut impl FnMut(&str)) {
    let mut reader = BufReader::new(pipe);
    let mut buffer = Vec::new();
    loop {
        buffer.clear();
        match reader.read_until(b'\n', &mut buffer).await {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buffer);
                sink(line.trim_end_matches(['\r', '\n']));
            }
            Err(error) => {
                warn!("failed to read build output: {error}");
                break;
            }
        }
    }
}

/// Build error types.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// Project does not contain wrapper script.
    #[error("build wrapper {:?} does not exist", .0.display())]
    MissingWrapper(PathBuf),

    /// Wrapper process cannot be launched or awaited.
    #[error("failed to launch build wrapper {:?}", wrapper.display())]
    Launch {
        #[source]
        source: std::io::Error,
        wrapper: PathBuf,
    },

    /// Wrapper exits with non-zero status.
    #[error("build in {:?} failed with {status}", project.display())]
    Status { status: ExitStatus, project: PathBuf },
}

/// Friendly result alias :3
type Result<T, E = BuildError> = std::result::Result<T, E>;

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use std::{env::current_dir, fs::write};

    fn project_with_wrapper(script: &str) -> anyhow::Result<tempfile::TempDir> {
        let project = tempfile::tempdir()?;
        write(project.path().join("gradlew"), script)?;
        Ok(project)
    }

    #[tokio::test]
    async fn run_succeeds_on_zero_status() -> anyhow::Result<()> {
        let project = project_with_wrapper(indoc! {r#"
            echo "running $1 in $(basename "$PWD")"
            echo "warning: deprecated api" >&2
            exit 0
        "#})?;
        let before = current_dir()?;

        let mut lines = Vec::new();
        BuildRunner::new("gradlew")
            .run(project.path(), "shadowJar", |line| lines.push(line.to_string()))
            .await?;

        let name = project.path().file_name().unwrap().to_string_lossy().into_owned();
        assert_eq!(
            lines,
            vec![format!("running shadowJar in {name}"), "warning: deprecated api".to_string()]
        );
        assert_eq!(current_dir()?, before);

        Ok(())
    }

    #[tokio::test]
    async fn run_fails_on_non_zero_status() -> anyhow::Result<()> {
        let project = project_with_wrapper("echo compiling\nexit 2\n")?;
        let before = current_dir()?;

        let mut lines = Vec::new();
        let result = BuildRunner::new("gradlew")
            .run(project.path(), "app:release:assembleRelease", |line| {
                lines.push(line.to_string())
            })
            .await;

        assert!(matches!(
            result,
            Err(BuildError::Status { status, .. }) if status.code() == Some(2)
        ));
        assert_eq!(lines, vec!["compiling".to_string()]);
        assert_eq!(current_dir()?, before);

        Ok(())
    }

    #[tokio::test]
    async fn run_keeps_order_across_output_streams() -> anyhow::Result<()> {
        let project = project_with_wrapper(indoc! {r#"
            echo "> Task :compileJava"
            echo "warning: [deprecation] old api" >&2
            echo "> Task :shadowJar"
            echo "error: disk full" >&2
            echo "BUILD SUCCESSFUL"
        "#})?;

        for _ in 0..10 {
            let mut lines = Vec::new();
            BuildRunner::new("gradlew")
                .run(project.path(), "shadowJar", |line| lines.push(line.to_string()))
                .await?;

            assert_eq!(
                lines,
                vec![
                    "> Task :compileJava",
                    "warning: [deprecation] old api",
                    "> Task :shadowJar",
                    "error: disk full",
                    "BUILD SUCCESSFUL",
                ]
            );
        }

        Ok(())
    }

    #[tokio::test]
    async fn run_passes_every_task_word() -> anyhow::Result<()> {
        let project = project_with_wrapper("echo \"$#:$1:$2\"\n")?;

        let mut lines = Vec::new();
        BuildRunner::new("gradlew")
            .run(project.path(), "clean  assemble", |line| lines.push(line.to_string()))
            .await?;

        assert_eq!(lines, vec!["2:clean:assemble".to_string()]);

        Ok(())
    }

    #[tokio::test]
    async fn run_rejects_missing_wrapper() -> anyhow::Result<()> {
        let project = tempfile::tempdir()?;
        let result = BuildRunner::new("gradlew")
            .run(project.path(), "shadowJar", |_| {})
            .await;

        assert!(matches!(result, Err(BuildError::MissingWrapper(_))));

        Ok(())
    }
}
