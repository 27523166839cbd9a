//! Command type for building executable commands

use async_process::Command as AsyncCommand;
use std::collections::HashMap;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};

/// How a child's output pipes are cut into events
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFraming {
    /// One event per line, line terminator stripped
    #[default]
    Lines,
    /// One event per read, bytes passed through untouched
    Chunks,
}

/// A command to be executed
///
/// This is a builder for creating commands that can be converted to `async_process::Command`
/// when needed. Unlike `AsyncCommand`, this type is `Clone` and can be reused multiple times.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// The program to execute
    program: OsString,
    /// The arguments to pass to the program
    args: Vec<OsString>,
    /// Environment variables to set
    env: HashMap<OsString, OsString>,
    /// Working directory for the command
    current_dir: Option<PathBuf>,
    /// How output is delivered to the event stream
    framing: OutputFraming,
}

impl Command {
    /// Create a new command for the given program
    pub fn new<S: AsRef<OsStr>>(program: S) -> Self {
        Self {
            program: program.as_ref().to_owned(),
            args: Vec::new(),
            env: HashMap::new(),
            current_dir: None,
            framing: OutputFraming::Lines,
        }
    }

    /// Build a command from a base invocation and trailing arguments.
    ///
    /// The base invocation may carry its own sub-command words
    /// (`"ns-process-data images"`): it is split on whitespace, the first word
    /// becomes the program and the rest lead the argument list. Everything in
    /// `rest` is appended verbatim, without further splitting.
    ///
    /// Returns `None` when the base invocation is empty.
    pub fn from_invocation<I, S>(base: &str, rest: I) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut words = base.split_whitespace();
        let mut cmd = Command::new(words.next()?);
        cmd.args(words).args(rest);
        Some(cmd)
    }

    /// Add an argument to the command
    pub fn arg<S: AsRef<OsStr>>(&mut self, arg: S) -> &mut Self {
        self.args.push(arg.as_ref().to_owned());
        self
    }

    /// Add multiple arguments to the command
    pub fn args<I, S>(&mut self, args: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        for arg in args {
            self.arg(arg);
        }
        self
    }

    /// Set an environment variable
    pub fn env<K, V>(&mut self, key: K, val: V) -> &mut Self
    where
        K: AsRef<OsStr>,
        V: AsRef<OsStr>,
    {
        self.env
            .insert(key.as_ref().to_owned(), val.as_ref().to_owned());
        self
    }

    /// Set the working directory for the command
    pub fn current_dir<P: AsRef<Path>>(&mut self, dir: P) -> &mut Self {
        self.current_dir = Some(dir.as_ref().to_owned());
        self
    }

    /// Choose how output is delivered
    pub fn output_framing(&mut self, framing: OutputFraming) -> &mut Self {
        self.framing = framing;
        self
    }

    /// Get the program name
    pub fn get_program(&self) -> &OsStr {
        &self.program
    }

    /// Get the arguments
    pub fn get_args(&self) -> &[OsString] {
        &self.args
    }

    /// Get the environment variables
    pub fn get_envs(&self) -> &HashMap<OsString, OsString> {
        &self.env
    }

    /// Get the current directory
    pub fn get_current_dir(&self) -> Option<&Path> {
        self.current_dir.as_deref()
    }

    /// Get the output framing
    pub fn get_output_framing(&self) -> OutputFraming {
        self.framing
    }

    /// Human readable rendering used in log lines
    pub fn display(&self) -> String {
        let mut out = self.program.to_string_lossy().into_owned();
        for arg in &self.args {
            out.push(' ');
            out.push_str(&shell_escape(&arg.to_string_lossy()));
        }
        out
    }

    /// Prepare this command for execution by converting to an `async_process::Command`
    pub fn prepare(&self) -> AsyncCommand {
        let mut cmd = AsyncCommand::new(&self.program);
        cmd.args(&self.args);

        for (key, val) in &self.env {
            cmd.env(key, val);
        }

        if let Some(dir) = &self.current_dir {
            cmd.current_dir(dir);
        }

        cmd
    }
}

/// Builder pattern helper
impl Command {
    /// Create a builder for this command (for chaining)
    pub fn builder<S: AsRef<OsStr>>(program: S) -> CommandBuilder {
        CommandBuilder(Command::new(program))
    }
}

/// Builder wrapper for more ergonomic command construction
pub struct CommandBuilder(Command);

impl CommandBuilder {
    /// Add an argument
    pub fn arg<S: AsRef<OsStr>>(mut self, arg: S) -> Self {
        self.0.arg(arg);
        self
    }

    /// Add multiple arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.0.args(args);
        self
    }

    /// Set an environment variable
    pub fn env<K, V>(mut self, key: K, val: V) -> Self
    where
        K: AsRef<OsStr>,
        V: AsRef<OsStr>,
    {
        self.0.env(key, val);
        self
    }

    /// Set the working directory
    pub fn current_dir<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.0.current_dir(dir);
        self
    }

    /// Choose how output is delivered
    pub fn output_framing(mut self, framing: OutputFraming) -> Self {
        self.0.output_framing(framing);
        self
    }

    /// Build the command
    pub fn build(self) -> Command {
        self.0
    }
}

/// Render a base invocation and its tokens as one shell command line.
///
/// The base invocation is emitted verbatim so that multi-word invocations keep
/// working once the line reaches `sh -c`. Following tokens are escaped.
pub fn shell_line<S: AsRef<str>>(base: &str, rest: &[S]) -> String {
    let mut line = base.trim().to_string();
    for token in rest {
        if !line.is_empty() {
            line.push(' ');
        }
        line.push_str(&shell_escape(token.as_ref()));
    }
    line
}

/// Escape a string for safe inclusion in a shell command
pub fn shell_escape(s: &str) -> String {
    if s.is_empty() {
        return "''".to_string();
    }
    if s.contains(|c: char| c.is_whitespace() || "\"'\\$`!*?<>|&;()[]{}#~".contains(c)) {
        format!("'{}'", s.replace('\'', "'\"'\"'"))
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_with_args() {
        let mut cmd = Command::new("ls");
        cmd.arg("-la").arg("/tmp");

        assert_eq!(cmd.get_args().len(), 2);
        assert_eq!(cmd.get_args()[0], "-la");
        assert_eq!(cmd.get_args()[1], "/tmp");
    }

    #[test]
    fn test_command_builder() {
        let cmd = Command::builder("echo")
            .arg("hello")
            .arg("world")
            .env("TEST_VAR", "test_value")
            .current_dir("/tmp")
            .build();

        assert_eq!(cmd.get_program(), "echo");
        assert_eq!(cmd.get_args(), &["hello", "world"]);
        assert_eq!(
            cmd.get_envs().get(OsStr::new("TEST_VAR")),
            Some(&OsString::from("test_value"))
        );
        assert_eq!(cmd.get_current_dir(), Some(Path::new("/tmp")));
        assert_eq!(cmd.get_output_framing(), OutputFraming::Lines);
    }

    #[test]
    fn test_from_invocation_splits_base_only() {
        let cmd = Command::from_invocation("ns-process-data images", ["--data", "/a b/c"]).unwrap();

        assert_eq!(cmd.get_program(), "ns-process-data");
        assert_eq!(cmd.get_args(), &["images", "--data", "/a b/c"]);
    }

    #[test]
    fn test_from_invocation_empty_base() {
        assert!(Command::from_invocation("   ", Vec::<String>::new()).is_none());
    }

    #[test]
    fn test_shell_escape() {
        assert_eq!(shell_escape("simple"), "simple");
        assert_eq!(shell_escape("with space"), "'with space'");
        assert_eq!(shell_escape("with'quote"), "'with'\"'\"'quote'");
        assert_eq!(shell_escape("$variable"), "'$variable'");
        assert_eq!(shell_escape("path/to/file"), "path/to/file");
        assert_eq!(shell_escape("--pipeline.model.some-arg"), "--pipeline.model.some-arg");
        assert_eq!(shell_escape(""), "''");
    }

    #[test]
    fn test_shell_line_keeps_base_verbatim() {
        let line = shell_line("ns-train nerfacto", &["--data", "/ns_temp_data/my images"]);
        assert_eq!(line, "ns-train nerfacto --data '/ns_temp_data/my images'");
    }

    #[test]
    fn test_display() {
        let cmd = Command::builder("echo").arg("hello world").build();
        assert_eq!(cmd.display(), "echo 'hello world'");
    }
}
