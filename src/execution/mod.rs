//! Command dispatch
//!
//! [`CommandExecutor`] decides how a command line runs (builtin, Windows
//! shell, direct executable or "not found") and runs it against an
//! [`ExecutionContext`]. Commands that need a real process get a
//! [`ProcessSession`], which is attached to the context so other tasks can
//! write to it, resize it or kill it while the executor awaits the exit.

pub mod strategy;

use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

use crate::builtins::{BuiltinRegistry, BuiltinTable};
use crate::config::{Config, WindowsShellConfig};
use crate::context::ExecutionContext;
use crate::error::{Error, Result};
use crate::executables::{ExecutableLookup, PathExecutables};
use crate::models::PtyProcess;
use crate::pty::{ProcessSession, SessionHost};

pub use strategy::{
    resolve_windows_shell, select_first, windows_shell_args, HostOs, StrategyKind,
};

/// Resolves commands to strategies and runs them
pub struct CommandExecutor {
    builtins: Arc<dyn BuiltinTable>,
    executables: Arc<dyn ExecutableLookup>,
    host: SessionHost,
    windows_shell: WindowsShellConfig,
    kill_signal: String,
    host_os: HostOs,
}

impl std::fmt::Debug for CommandExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandExecutor")
            .field("host", &self.host)
            .field("host_os", &self.host_os)
            .field("windows_shell", &self.windows_shell)
            .finish_non_exhaustive()
    }
}

impl CommandExecutor {
    /// Executor over the given builtin table and executable lookup
    pub fn new(
        builtins: Arc<dyn BuiltinTable>,
        executables: Arc<dyn ExecutableLookup>,
        config: &Config,
    ) -> Self {
        Self {
            builtins,
            executables,
            host: SessionHost::resolve(config.session.host_program.as_deref()),
            windows_shell: config.windows_shell.clone(),
            kill_signal: config.execution.kill_signal.clone(),
            host_os: HostOs::current(),
        }
    }

    /// Executor with the default builtins and a PATH cache
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            Arc::new(BuiltinRegistry::default()),
            Arc::new(PathExecutables::new(config.path_cache.refresh_interval())),
            config,
        )
    }

    /// Pretend to run on `host_os` (tests exercise the Windows path on Unix)
    pub fn with_host_os(mut self, host_os: HostOs) -> Self {
        self.host_os = host_os;
        self
    }

    /// Use a specific PTY host executable
    pub fn with_host(mut self, host: SessionHost) -> Self {
        self.host = host;
        self
    }

    pub fn host(&self) -> &SessionHost {
        &self.host
    }

    /// Whether `kind` accepts `command_name`
    pub async fn can_execute(&self, kind: StrategyKind, command_name: &str) -> bool {
        match kind {
            StrategyKind::BuiltIn => self.builtins.exists(command_name),
            StrategyKind::WindowsShell => self.host_os.is_windows(),
            StrategyKind::UnixExecutable => self.executables.contains(command_name).await,
            StrategyKind::NullFallback => true,
        }
    }

    /// Pick the strategy for `command_name`. Always succeeds.
    pub async fn resolve(&self, command_name: &str) -> StrategyKind {
        select_first(&StrategyKind::PRECEDENCE, move |kind| {
            self.can_execute(kind, command_name)
        })
        .await
        .unwrap_or(StrategyKind::NullFallback)
    }

    /// Run the context's command line to completion.
    ///
    /// A session created here stays attached to the context after it exits.
    pub async fn execute(&self, context: &mut ExecutionContext) -> Result<()> {
        let command_name = context.command_name().to_string();
        let kind = self.resolve(&command_name).await;
        debug!("Resolved '{}' to {} strategy", command_name, kind);

        match kind {
            StrategyKind::BuiltIn => self.run_builtin(&command_name, context),
            StrategyKind::WindowsShell => self.run_windows_shell(context).await,
            StrategyKind::UnixExecutable => self.run_executable(&command_name, context).await,
            StrategyKind::NullFallback => Err(Error::CommandNotFound {
                command: command_name,
            }),
        }
    }

    /// [`execute`](Self::execute) with a deadline.
    ///
    /// When the deadline passes, the session started by this call is sent the
    /// configured kill signal and `CommandTimeout` is returned whatever the
    /// process's eventual exit code.
    pub async fn execute_with_timeout(
        &self,
        context: &mut ExecutionContext,
        duration: Duration,
    ) -> Result<()> {
        let slot = context.session_slot();
        let before = slot.current().map(|s| s.id());
        let command = context.command_name().to_string();

        match timeout(duration, self.execute(context)).await {
            Ok(result) => result,
            Err(_) => {
                let started = slot.live().filter(|s| Some(s.id()) != before);
                if let Some(session) = started {
                    warn!(
                        "'{}' timed out after {:?}, sending {}",
                        command, duration, self.kill_signal
                    );
                    session.kill(&self.kill_signal);
                }
                Err(Error::CommandTimeout { command, duration })
            }
        }
    }

    fn run_builtin(&self, name: &str, context: &mut ExecutionContext) -> Result<()> {
        let args = context.arguments();
        self.builtins
            .invoke(name, &args, context)
            .map_err(|e| Error::BuiltinFailed {
                command: name.to_string(),
                message: e.to_string(),
            })
    }

    async fn run_executable(&self, name: &str, context: &mut ExecutionContext) -> Result<()> {
        let session = self.start_session(name.to_string(), context.arguments(), context).await?;
        match session.wait().await? {
            0 => Ok(()),
            code => Err(Error::NonZeroExit {
                command: name.to_string(),
                code,
            }),
        }
    }

    async fn run_windows_shell(&self, context: &mut ExecutionContext) -> Result<()> {
        let shell = resolve_windows_shell(self.windows_shell.program.as_deref(), |name| {
            context.env_var(name).map(str::to_string)
        });
        let args = windows_shell_args(&self.windows_shell.flags, context.expanded_tokens());
        let session = self.start_session(shell, args, context).await?;

        // The interpreter's exit code is not an error on this path
        let code = session.wait().await?;
        debug!("Windows shell exited with code {}", code);
        Ok(())
    }

    async fn start_session(
        &self,
        program: String,
        args: Vec<String>,
        context: &ExecutionContext,
    ) -> Result<ProcessSession> {
        let process = PtyProcess::new(
            program,
            args,
            context.working_directory().to_path_buf(),
            context.environment().clone(),
            context.dimensions(),
        );
        let session = ProcessSession::spawn(&self.host, process, context.output()).await?;
        context.attach_session(session.clone());
        Ok(session)
    }
}
