//! Builtin commands
//!
//! Commands that run inside the host process instead of spawning a PTY
//! session. The resolver only needs the [`BuiltinTable`] trait; the
//! [`BuiltinRegistry`] is the table the binaries use.

use anyhow::{bail, Context as _};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::context::ExecutionContext;

/// Lookup and invocation of builtin commands
pub trait BuiltinTable: Send + Sync {
    /// Whether `name` is a builtin
    fn exists(&self, name: &str) -> bool;

    /// Run builtin `name`. The error's message is what the user sees.
    fn invoke(&self, name: &str, args: &[String], context: &mut ExecutionContext)
        -> anyhow::Result<()>;
}

/// Signature of a builtin handler
pub type BuiltinHandler =
    Box<dyn Fn(&[String], &mut ExecutionContext) -> anyhow::Result<()> + Send + Sync>;

/// Name-indexed table of builtin handlers
pub struct BuiltinRegistry {
    handlers: HashMap<String, BuiltinHandler>,
}

impl std::fmt::Debug for BuiltinRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&String> = self.handlers.keys().collect();
        names.sort();
        f.debug_struct("BuiltinRegistry")
            .field("builtins", &names)
            .finish()
    }
}

impl BuiltinRegistry {
    /// A registry with no builtins at all
    pub fn empty() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register (or replace) a builtin
    pub fn register<F>(&mut self, name: impl Into<String>, handler: F)
    where
        F: Fn(&[String], &mut ExecutionContext) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.handlers.insert(name.into(), Box::new(handler));
    }

    /// Sorted builtin names
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl Default for BuiltinRegistry {
    /// The standard builtins: `cd`
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register("cd", change_directory);
        registry
    }
}

impl BuiltinTable for BuiltinRegistry {
    fn exists(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    fn invoke(
        &self,
        name: &str,
        args: &[String],
        context: &mut ExecutionContext,
    ) -> anyhow::Result<()> {
        match self.handlers.get(name) {
            Some(handler) => handler(args, context),
            None => bail!("{}: not a builtin", name),
        }
    }
}

/// `cd [dir]`: change the context's working directory
fn change_directory(args: &[String], context: &mut ExecutionContext) -> anyhow::Result<()> {
    let target = match args.first().map(String::as_str) {
        None | Some("~") => home_directory(context)?,
        Some(path) => resolve_path(path, context)?,
    };

    if !target.is_dir() {
        bail!("cd: no such directory: {}", target.display());
    }

    let target = target
        .canonicalize()
        .with_context(|| format!("cd: cannot resolve {}", target.display()))?;
    debug!("cd: {} -> {}", context.working_directory().display(), target.display());
    context.set_working_directory(target);
    Ok(())
}

fn home_directory(context: &ExecutionContext) -> anyhow::Result<PathBuf> {
    context
        .environment()
        .get("HOME")
        .filter(|home| !home.is_empty())
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .context("cd: cannot determine home directory")
}

fn resolve_path(path: &str, context: &ExecutionContext) -> anyhow::Result<PathBuf> {
    if let Some(rest) = path.strip_prefix("~/") {
        return Ok(home_directory(context)?.join(rest));
    }
    let path = Path::new(path);
    Ok(if path.is_absolute() {
        path.to_path_buf()
    } else {
        context.working_directory().join(path)
    })
}
