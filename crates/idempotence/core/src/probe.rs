//! Probes: named, repeatable actions under test.

use crate::error::{IdempotenceError, IdempotenceResult};
use crate::observation::{ExitInfo, Observation};
use crate::types::{ProbeCategory, Tolerance};
use serde::Serialize;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Instant;

/// Makefile names recognised by `make`, in lookup order.
const MAKEFILE_NAMES: [&str; 3] = ["GNUmakefile", "makefile", "Makefile"];

/// Something that can be executed repeatedly and observed.
pub trait ProbeAction: Send {
    /// Execute once and return what was observed.
    ///
    /// Watched paths are captured by the [`Probe`] afterwards, so an
    /// implementation only fills in exit status, output and state.
    fn execute(&mut self, run: u32) -> IdempotenceResult<Observation>;

    /// Path whose absence means the probe cannot run at all.
    fn required_path(&self) -> Option<&Path> {
        None
    }

    /// One-line description of what is executed.
    fn describe(&self) -> String;
}

/// An external process invocation.
#[derive(Debug, Clone)]
pub struct CommandAction {
    program: String,
    args: Vec<OsString>,
    cwd: Option<PathBuf>,
    required: Option<PathBuf>,
}

impl CommandAction {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            required: None,
        }
    }

    /// `<shell> <script>`; the script file must exist.
    pub fn script(shell: impl Into<String>, script: impl Into<PathBuf>) -> Self {
        let script = script.into();
        Self::new(shell).arg(script.clone()).requires(script)
    }

    /// `<make> [-C dir] <target>`; a makefile must exist in `dir`.
    pub fn make_target(
        make_program: impl Into<String>,
        target: impl Into<OsString>,
        dir: Option<PathBuf>,
    ) -> Self {
        let base = dir.clone().unwrap_or_default();
        let makefile = MAKEFILE_NAMES
            .iter()
            .map(|name| base.join(name))
            .find(|path| path.is_file())
            .unwrap_or_else(|| base.join("Makefile"));

        let mut action = Self::new(make_program);
        if let Some(dir) = dir {
            action = action.arg("-C").arg(dir);
        }
        action.arg(target).requires(makefile)
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn requires(mut self, path: impl Into<PathBuf>) -> Self {
        self.required = Some(path.into());
        self
    }

    /// Display form of the invocation; non-UTF-8 arguments are shown lossily.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.clone())
            .chain(self.args.iter().map(|arg| arg.to_string_lossy().into_owned()))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl ProbeAction for CommandAction {
    fn execute(&mut self, run: u32) -> IdempotenceResult<Observation> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        if let Some(cwd) = &self.cwd {
            cmd.current_dir(cwd);
        }

        let output = cmd.output().map_err(|source| IdempotenceError::Spawn {
            program: self.program.clone(),
            source,
        })?;

        let mut observation = Observation::new(run, ExitInfo::from_status(output.status));
        observation.stdout = output.stdout;
        observation.stderr = output.stderr;
        Ok(observation)
    }

    fn required_path(&self) -> Option<&Path> {
        self.required.as_deref()
    }

    fn describe(&self) -> String {
        self.command_line()
    }
}

/// An in-process mutation over an explicitly owned state object.
///
/// Each run applies `apply` to the state, then the state is serialized and
/// recorded as the observation's read-back value.
pub struct FnAction<S, F> {
    state: S,
    apply: F,
}

impl<S, F> FnAction<S, F>
where
    S: Serialize + Send,
    F: FnMut(&mut S) -> IdempotenceResult<()> + Send,
{
    pub fn new(state: S, apply: F) -> Self {
        Self { state, apply }
    }
}

impl<S, F> ProbeAction for FnAction<S, F>
where
    S: Serialize + Send,
    F: FnMut(&mut S) -> IdempotenceResult<()> + Send,
{
    fn execute(&mut self, run: u32) -> IdempotenceResult<Observation> {
        (self.apply)(&mut self.state)?;
        let mut observation = Observation::new(run, ExitInfo::ok());
        observation.state = Some(serde_json::to_value(&self.state)?);
        Ok(observation)
    }

    fn describe(&self) -> String {
        format!("in-process {}", std::any::type_name::<S>())
    }
}

/// A named action plus how its observations are judged.
pub struct Probe {
    pub name: String,
    pub description: String,
    pub category: ProbeCategory,
    pub tolerance: Tolerance,
    /// Overrides the verifier's `compare_output` setting when set.
    pub compare_output: Option<bool>,
    watch: Vec<PathBuf>,
    action: Box<dyn ProbeAction>,
}

impl Probe {
    pub fn new(
        name: impl Into<String>,
        category: ProbeCategory,
        action: impl ProbeAction + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            category,
            tolerance: Tolerance::Strict,
            compare_output: None,
            watch: Vec::new(),
            action: Box::new(action),
        }
    }

    /// Arbitrary command line.
    pub fn command<I, S>(name: impl Into<String>, program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        Self::new(
            name,
            ProbeCategory::Command,
            CommandAction::new(program).args(args),
        )
    }

    /// Script run through `shell`; skipped when the script does not exist.
    pub fn script(
        name: impl Into<String>,
        script: impl Into<PathBuf>,
        shell: impl Into<String>,
    ) -> Self {
        Self::new(
            name,
            ProbeCategory::Script,
            CommandAction::script(shell, script),
        )
    }

    /// Build target; skipped when no makefile exists in `dir`.
    pub fn make_target(
        target: impl Into<String>,
        dir: Option<PathBuf>,
        make_program: impl Into<String>,
    ) -> Self {
        let target = target.into();
        Self::new(
            format!("make_{}", target),
            ProbeCategory::BuildTarget,
            CommandAction::make_target(make_program, target, dir),
        )
    }

    /// In-process mutation of `state`; the serialized state is compared.
    pub fn function<S, F>(name: impl Into<String>, state: S, apply: F) -> Self
    where
        S: Serialize + Send + 'static,
        F: FnMut(&mut S) -> IdempotenceResult<()> + Send + 'static,
    {
        Self::new(name, ProbeCategory::State, FnAction::new(state, apply))
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_category(mut self, category: ProbeCategory) -> Self {
        self.category = category;
        self
    }

    /// Snapshot `path` after every run.
    pub fn watch(mut self, path: impl Into<PathBuf>) -> Self {
        self.watch.push(path.into());
        self
    }

    pub fn tolerate_failures(mut self) -> Self {
        self.tolerance = Tolerance::WarnOnFailure;
        self
    }

    pub fn compare_output(mut self, compare: bool) -> Self {
        self.compare_output = Some(compare);
        self
    }

    pub fn watched_paths(&self) -> &[PathBuf] {
        &self.watch
    }

    pub fn required_path(&self) -> Option<&Path> {
        self.action.required_path()
    }

    /// `Some(path)` when the probe's target is absent and the probe should be skipped.
    pub fn missing_target(&self) -> Option<&Path> {
        self.required_path().filter(|path| !path.exists())
    }

    pub fn describe(&self) -> String {
        self.action.describe()
    }

    /// Execute once, capture watched paths and time the run.
    pub(crate) fn run_once(&mut self, run: u32) -> IdempotenceResult<Observation> {
        let start = Instant::now();
        let mut observation = self.action.execute(run)?;
        observation.capture_paths(&self.watch)?;
        observation.duration = start.elapsed();
        Ok(observation)
    }
}

impl std::fmt::Debug for Probe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Probe")
            .field("name", &self.name)
            .field("category", &self.category)
            .field("tolerance", &self.tolerance)
            .field("action", &self.action.describe())
            .field("watch", &self.watch)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_requires_script_path() {
        let probe = Probe::script("setup", "/nonexistent/setup_env.sh", "bash");
        assert_eq!(
            probe.missing_target(),
            Some(Path::new("/nonexistent/setup_env.sh"))
        );
        assert_eq!(probe.describe(), "bash /nonexistent/setup_env.sh");
        assert_eq!(probe.category, ProbeCategory::Script);
    }

    #[test]
    fn test_make_target_command_line() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Makefile"), "help:\n\t@echo help\n").unwrap();

        let probe = Probe::make_target("help", Some(dir.path().to_path_buf()), "make");
        assert_eq!(probe.name, "make_help");
        assert!(probe.missing_target().is_none());
        assert!(probe.describe().starts_with("make -C "));
        assert!(probe.describe().ends_with(" help"));
    }

    #[test]
    fn test_make_target_missing_makefile() {
        let dir = tempfile::tempdir().unwrap();
        let probe = Probe::make_target("lint", Some(dir.path().to_path_buf()), "make");
        assert_eq!(
            probe.missing_target(),
            Some(dir.path().join("Makefile").as_path())
        );
    }

    #[test]
    fn test_function_probe_records_state() {
        let mut probe = Probe::function("counter", 0u32, |n| {
            *n = 7;
            Ok(())
        });
        let observation = probe.run_once(1).unwrap();
        assert_eq!(observation.state, Some(serde_json::json!(7)));
        assert!(observation.exit.success);
        assert!(probe.missing_target().is_none());
    }

    #[test]
    fn test_builder_options() {
        let probe = Probe::command("echo", "echo", ["hi"])
            .with_description("prints hi")
            .watch("/tmp/x")
            .tolerate_failures()
            .compare_output(true);
        assert_eq!(probe.description, "prints hi");
        assert_eq!(probe.tolerance, Tolerance::WarnOnFailure);
        assert_eq!(probe.compare_output, Some(true));
        assert_eq!(probe.watched_paths(), &[PathBuf::from("/tmp/x")]);
    }

    #[cfg(unix)]
    #[test]
    fn test_command_captures_output_and_exit() {
        let mut probe = Probe::command("sh", "sh", ["-c", "echo out; echo err >&2; exit 3"]);
        let observation = probe.run_once(1).unwrap();
        assert_eq!(observation.exit.code, Some(3));
        assert!(!observation.exit.success);
        assert_eq!(observation.output_lossy(), "out\nerr\n");
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_script_path_is_passed_through_unmangled() {
        use std::os::unix::ffi::OsStrExt;

        let dir = tempfile::tempdir().unwrap();
        let name = std::ffi::OsStr::from_bytes(b"setup_\xff.sh");
        let script = dir.path().join(name);
        std::fs::write(&script, "echo ran\n").unwrap();

        let mut probe = Probe::script("raw", &script, "sh");
        assert!(probe.missing_target().is_none());
        let observation = probe.run_once(1).unwrap();
        assert!(observation.exit.success, "{}", observation.output_lossy());
        assert_eq!(observation.output_lossy(), "ran\n");
    }

    #[test]
    fn test_spawn_failure_is_error() {
        let mut probe = Probe::command("missing", "idem-no-such-program-xyz", Vec::<String>::new());
        let err = probe.run_once(1).unwrap_err();
        assert!(matches!(err, IdempotenceError::Spawn { .. }));
    }
}
