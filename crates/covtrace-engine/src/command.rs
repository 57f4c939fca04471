use std::collections::BTreeMap;
use std::path::PathBuf;

/// Description of the target executable to launch under tracing.
#[derive(Debug)]
pub struct Command {
    /// Program to spawn.
    pub program: PathBuf,

    /// Program arguments for the process to spawn.
    pub args: Vec<String>,

    /// Environment variables for the process to spawn.
    pub env: CommandEnv,

    /// Working directory for the process to spawn.
    pub current_dir: Option<PathBuf>,
}

impl Command {
    /// Constructs a new `Command` for launching the program at path
    /// `program`, with no arguments and the current process's environment
    /// and working directory.
    ///
    /// Builder methods are provided to change these defaults.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: CommandEnv::Inherit(BTreeMap::new()),
            current_dir: None,
        }
    }

    /// Adds an argument to pass to the program.
    ///
    /// To pass multiple arguments see [`args`](Self::args).
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Adds multiple arguments to pass to the program.
    ///
    /// To pass a single argument see [`arg`](Self::arg).
    pub fn args<I, S>(self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        args.into_iter().fold(self, |cmd, arg| cmd.arg(arg))
    }

    /// Inserts or updates an explicit environment variable mapping.
    ///
    /// Explicitly set variables take precedence over inherited ones.
    pub fn env<K, V>(mut self, key: K, val: V) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        match self.env {
            CommandEnv::Inherit(ref mut env) => {
                env.insert(key.into(), Some(val.into()));
            }
            CommandEnv::NoInherit(ref mut env) => {
                env.insert(key.into(), val.into());
            }
        }

        self
    }

    /// Removes an explicitly set environment variable and prevents
    /// inheriting it from the parent process.
    pub fn env_remove(mut self, key: impl Into<String>) -> Self {
        match self.env {
            CommandEnv::Inherit(ref mut env) => {
                env.insert(key.into(), None);
            }
            CommandEnv::NoInherit(ref mut env) => {
                env.remove(&key.into());
            }
        }

        self
    }

    /// Clears all explicitly set environment variables and prevents
    /// inheriting any from the parent process.
    pub fn env_clear(mut self) -> Self {
        self.env = CommandEnv::NoInherit(BTreeMap::new());
        self
    }

    /// Sets the working directory for the process to spawn.
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    pub(crate) fn to_std(&self) -> std::process::Command {
        let mut command = std::process::Command::new(&self.program);

        command.args(&self.args);

        if let Some(env) = self.env.captured() {
            command.env_clear();
            command.envs(env);
        }

        if let Some(dir) = &self.current_dir {
            command.current_dir(dir);
        }

        command
    }
}

/// Environment variables attached to a [Command].
#[derive(Debug)]
pub enum CommandEnv {
    /// Environment variables the process to spawn will have, in addition to
    /// the ones inherited from the parent process.
    ///
    /// A `None` value indicates that the environment variable will be
    /// removed from the process to spawn, even if it was inherited.
    Inherit(BTreeMap<String, Option<String>>),

    /// Environment variables the process to spawn will have, without
    /// inheriting any from the parent process.
    NoInherit(BTreeMap<String, String>),
}

impl CommandEnv {
    /// Captures the current environment with the specified changes applied.
    ///
    /// Returns `None` when the spawned process should simply inherit the
    /// parent environment untouched.
    pub fn captured(&self) -> Option<BTreeMap<String, String>> {
        let mut captured_env = BTreeMap::new();

        match self {
            Self::Inherit(env) if env.is_empty() => return None,
            Self::Inherit(env) => {
                captured_env.extend(std::env::vars());
                for (k, v) in env {
                    if let Some(v) = v {
                        captured_env.insert(k.clone(), v.clone());
                    } else {
                        captured_env.remove(k);
                    }
                }
            }
            Self::NoInherit(env) => {
                captured_env.extend(env.iter().map(|(k, v)| (k.clone(), v.clone())));
            }
        }

        Some(captured_env)
    }
}
