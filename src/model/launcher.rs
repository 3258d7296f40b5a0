//! Starts an exported model as a subprocess and tears it down again.
//!
//! An exported model directory holds one start script per platform
//! (`<project>_linux.sh`, `<project>_mac`, `<project>_windows.bat`). The script
//! forwards its own arguments to the JVM through `$*` (`%*` on Windows); the
//! launcher writes a private copy of the script with the port arguments spliced
//! in front of that marker, so concurrent launches never rewrite a shared file.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{Error, Result};

const TERMINATE_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Linux,
    MacOs,
    Windows,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(target_os = "windows") {
            Platform::Windows
        } else if cfg!(target_os = "macos") {
            Platform::MacOs
        } else {
            Platform::Linux
        }
    }

    pub fn artifact_suffix(self) -> &'static str {
        match self {
            Platform::Linux => "_linux.sh",
            Platform::MacOs => "_mac",
            Platform::Windows => "_windows.bat",
        }
    }

    /// Token through which the start script forwards its arguments.
    pub fn marker(self) -> &'static str {
        match self {
            Platform::Windows => "%*",
            Platform::Linux | Platform::MacOs => "$*",
        }
    }

    fn copy_extension(self) -> &'static str {
        match self {
            Platform::Linux => ".sh",
            Platform::MacOs => "",
            Platform::Windows => ".bat",
        }
    }

    fn command(self, script: &Path, show_terminal: bool) -> Command {
        let mut command = match (self, show_terminal) {
            (Platform::Linux, false) => {
                let mut c = Command::new("bash");
                c.arg(script);
                c
            }
            (Platform::Linux, true) => {
                let mut c = Command::new("gnome-terminal");
                c.arg("--").arg(script);
                c
            }
            (Platform::MacOs, false) => Command::new(script),
            (Platform::MacOs, true) => {
                let mut c = Command::new("open");
                c.arg(script);
                c
            }
            (Platform::Windows, false) => {
                let mut c = Command::new("cmd");
                c.arg("/C").arg(script);
                c
            }
            (Platform::Windows, true) => {
                let mut c = Command::new("cmd");
                c.args(["/C", "start", "cmd.exe", "/C"]).arg(script);
                c
            }
        };
        command.stdin(Stdio::null());
        detach(&mut command);
        command
    }
}

/// Splices the port arguments in front of the last argument-forwarding marker.
///
/// Returns `None` when the script has no marker.
pub fn inject_ports(script: &str, marker: &str, control_port: u16, callback_port: u16) -> Option<String> {
    let at = script.rfind(marker)?;
    Some(format!(
        "{}-jp {control_port} -pp {callback_port} {}",
        &script[..at],
        &script[at..]
    ))
}

#[derive(Debug, Clone)]
pub struct ModelLauncher {
    model_dir: PathBuf,
    project: String,
    platform: Platform,
    show_terminal: bool,
}

impl ModelLauncher {
    pub fn new(model_dir: impl Into<PathBuf>, show_terminal: bool) -> Result<Self> {
        Self::for_platform(model_dir, show_terminal, Platform::current())
    }

    pub fn for_platform(
        model_dir: impl Into<PathBuf>,
        show_terminal: bool,
        platform: Platform,
    ) -> Result<Self> {
        let model_dir = model_dir.into();
        if !model_dir.is_dir() {
            return Err(Error::Launch(format!(
                "could not find exported model folder '{}'; export the model there first",
                model_dir.display()
            )));
        }
        let project = find_project(&model_dir, platform)?;
        debug!(project = %project, dir = %model_dir.display(), "Found exported model");
        Ok(Self {
            model_dir,
            project,
            platform,
            show_terminal,
        })
    }

    pub fn project_name(&self) -> &str {
        &self.project
    }

    pub fn artifact_path(&self) -> PathBuf {
        self.model_dir
            .join(format!("{}{}", self.project, self.platform.artifact_suffix()))
    }

    /// Writes a private start script carrying both ports and runs it detached.
    pub fn launch(&self, control_port: u16, callback_port: u16) -> Result<ProcessHandle> {
        let artifact = self.artifact_path();
        let original = fs::read_to_string(&artifact).map_err(|e| {
            Error::Launch(format!("could not read '{}': {e}", artifact.display()))
        })?;
        let script = inject_ports(&original, self.platform.marker(), control_port, callback_port)
            .ok_or_else(|| {
                Error::Launch(format!(
                    "'{}' has no `{}` argument marker to receive the ports",
                    artifact.display(),
                    self.platform.marker()
                ))
            })?;

        let copy = self.model_dir.join(format!(
            "{}-{}{}",
            self.project,
            Uuid::new_v4().simple(),
            self.platform.copy_extension()
        ));
        write_script(&copy, &script)
            .map_err(|e| Error::Launch(format!("could not write '{}': {e}", copy.display())))?;

        let child = match self.platform.command(&copy, self.show_terminal).spawn() {
            Ok(child) => child,
            Err(e) => {
                let _ = fs::remove_file(&copy);
                return Err(Error::Launch(format!(
                    "could not start '{}': {e}",
                    copy.display()
                )));
            }
        };
        debug!(
            project = %self.project,
            pid = child.id(),
            control_port,
            callback_port,
            "Model launched"
        );
        Ok(ProcessHandle {
            child,
            script: copy,
            show_terminal: self.show_terminal,
        })
    }
}

fn find_project(model_dir: &Path, platform: Platform) -> Result<String> {
    let suffix = platform.artifact_suffix();
    let entries = fs::read_dir(model_dir).map_err(|e| {
        Error::Launch(format!("could not list '{}': {e}", model_dir.display()))
    })?;
    let mut projects: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter_map(|name| name.strip_suffix(suffix).map(str::to_string))
        .filter(|project| !project.is_empty())
        .collect();
    projects.sort();
    projects.into_iter().next().ok_or_else(|| {
        Error::Launch(format!(
            "could not find any `*{suffix}` executable in '{}'; was the model exported correctly?",
            model_dir.display()
        ))
    })
}

fn write_script(path: &Path, contents: &str) -> io::Result<()> {
    fs::write(path, contents)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o755))?;
    }
    Ok(())
}

#[cfg(unix)]
fn detach(command: &mut Command) {
    use std::os::unix::process::CommandExt;
    command.process_group(0);
}

#[cfg(windows)]
fn detach(command: &mut Command) {
    use std::os::windows::process::CommandExt;
    const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;
    command.creation_flags(CREATE_NEW_PROCESS_GROUP);
}

/// A launched model. Owns the process group and the private start script.
#[derive(Debug)]
pub struct ProcessHandle {
    child: Child,
    script: PathBuf,
    show_terminal: bool,
}

impl ProcessHandle {
    pub fn id(&self) -> u32 {
        self.child.id()
    }

    pub fn script(&self) -> &Path {
        &self.script
    }

    /// Removes the private script and stops the model.
    ///
    /// Models started in a visible terminal run outside the tracked process
    /// group and have to be closed by the operator. Only the terminal
    /// launcher is waited on, off the calling thread.
    pub fn terminate(mut self) -> Result<()> {
        let removed = fs::remove_file(&self.script).map_err(|e| {
            Error::Launch(format!("could not remove '{}': {e}", self.script.display()))
        });
        if self.show_terminal {
            let pid = self.child.id();
            warn!(pid, "Model was started in a visible terminal and must be closed manually");
            let mut launcher = self.child;
            std::thread::spawn(move || {
                if let Err(e) = launcher.wait() {
                    debug!(pid, error = %e, "Could not reap terminal launcher");
                }
            });
            return removed;
        }
        self.stop_group()
            .map_err(|e| Error::Launch(format!("could not stop model process: {e}")))?;
        debug!(pid = self.child.id(), "Model process group terminated");
        removed
    }

    fn stop_group(&mut self) -> io::Result<()> {
        signal_group(&mut self.child)?;
        let deadline = Instant::now() + TERMINATE_GRACE;
        while Instant::now() < deadline {
            if self.child.try_wait()?.is_some() {
                return Ok(());
            }
            std::thread::sleep(Duration::from_millis(50));
        }
        warn!(pid = self.child.id(), "Model ignored termination, killing it");
        self.child.kill()?;
        self.child.wait().map(|_| ())
    }
}

#[cfg(unix)]
fn signal_group(child: &mut Child) -> io::Result<()> {
    let pgid = child.id() as libc::pid_t;
    // SAFETY: killpg only delivers a signal; the group was created for this child.
    if unsafe { libc::killpg(pgid, libc::SIGTERM) } == -1 {
        let err = io::Error::last_os_error();
        if err.raw_os_error() != Some(libc::ESRCH) {
            return Err(err);
        }
    }
    Ok(())
}

#[cfg(not(unix))]
fn signal_group(child: &mut Child) -> io::Result<()> {
    child.kill()
}
