//! Device abstraction.
//!
//! A compute device owns three things the dispatch layer needs:
//! - **Compiler**: turns program source plus build options into a [`Program`]
//! - **Allocator**: hands out [`Buffer`]s and moves bytes in and out of them
//! - **Queue**: an in-order command queue that runs kernels asynchronously
//!
//! The queue contract is the only ordering guarantee: commands enqueued on a
//! device complete in submission order, and blocking transfers observe every
//! command enqueued before them.

use std::any::Any;
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use crate::buffer::{Buffer, MemFlags};
use crate::error::Result;
use crate::queue::{KernelArg, NdRange};

/// Textual kernel program handed to a device compiler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramSource {
    /// Program name (for diagnostics).
    pub name: Cow<'static, str>,
    /// Kernel source text.
    pub text: Cow<'static, str>,
}

impl ProgramSource {
    pub const fn from_static(name: &'static str, text: &'static str) -> Self {
        Self { name: Cow::Borrowed(name), text: Cow::Borrowed(text) }
    }

    pub fn new(name: impl Into<Cow<'static, str>>, text: impl Into<Cow<'static, str>>) -> Self {
        Self { name: name.into(), text: text.into() }
    }
}

/// Compiler flags used to specialize generic kernel source.
///
/// Preprocessor definitions are kept in insertion order; when a name is
/// defined twice the later definition wins, matching compiler behavior.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildOptions {
    defines: Vec<(String, String)>,
    flags: Vec<String>,
}

impl BuildOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a `-D name=value` definition.
    pub fn define(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.defines.push((name.into(), value.into()));
        self
    }

    /// Add a raw compiler flag.
    pub fn flag(mut self, flag: impl Into<String>) -> Self {
        self.flags.push(flag.into());
        self
    }

    /// Append everything from `other` after the current options.
    pub fn extend(mut self, other: BuildOptions) -> Self {
        self.defines.extend(other.defines);
        self.flags.extend(other.flags);
        self
    }

    /// Effective value of a definition.
    pub fn value(&self, name: &str) -> Option<&str> {
        self.defines.iter().rev().find(|(n, _)| n == name).map(|(_, v)| v.as_str())
    }

    pub fn defines(&self) -> impl Iterator<Item = (&str, &str)> {
        self.defines.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn flags(&self) -> impl Iterator<Item = &str> {
        self.flags.iter().map(String::as_str)
    }

    /// Parse a compiler command line.
    ///
    /// Accepts both `-D NAME=VALUE` and `-DNAME=VALUE`; a definition without a
    /// value is recorded as `1`. Returns the offending token on malformed
    /// input.
    pub fn parse(line: &str) -> std::result::Result<Self, String> {
        let mut options = Self::new();
        let mut tokens = line.split_whitespace();
        while let Some(token) = tokens.next() {
            let definition = match token.strip_prefix("-D") {
                Some("") => tokens.next().ok_or_else(|| token.to_string())?,
                Some(rest) => rest,
                None => {
                    options.flags.push(token.to_string());
                    continue;
                }
            };
            let (name, value) = definition.split_once('=').unwrap_or((definition, "1"));
            if name.is_empty() || name.starts_with('-') {
                return Err(definition.to_string());
            }
            options.defines.push((name.to_string(), value.to_string()));
        }
        Ok(options)
    }
}

impl fmt::Display for BuildOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in &self.defines {
            write!(f, " -D {name}={value}")?;
        }
        for flag in &self.flags {
            write!(f, " {flag}")?;
        }
        Ok(())
    }
}

/// A built program for one device.
pub trait Program: Send + Sync + fmt::Debug {
    /// Program name (for debugging).
    fn name(&self) -> &str;

    /// Options the program was built with.
    fn options(&self) -> &BuildOptions;

    /// Compiler diagnostics emitted while building (may be empty).
    fn build_log(&self) -> &str;

    /// Extract a named entry point.
    fn kernel(&self, name: &str) -> Result<Arc<dyn Kernel>>;
}

/// Entry point of a built program, ready to be enqueued.
pub trait Kernel: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    fn as_any(&self) -> &dyn Any;
}

/// A device together with its compiler and in-order command queue.
pub trait ComputeDevice: Send + Sync + fmt::Debug {
    /// Index of this device in its manager.
    fn id(&self) -> usize;

    fn name(&self) -> &str;

    /// Allocate `size` bytes of device memory.
    fn alloc(&self, size: usize, flags: MemFlags) -> Result<Buffer>;

    /// Copy host bytes into `buffer` at `offset`.
    ///
    /// With `blocking` the call returns once the bytes are in device memory;
    /// otherwise the copy is enqueued and `data` is captured.
    fn write_buffer(&self, buffer: &Buffer, offset: usize, data: &[u8], blocking: bool) -> Result<()>;

    /// Blocking copy of device bytes at `offset` into `dst`.
    fn read_buffer(&self, buffer: &Buffer, offset: usize, dst: &mut [u8]) -> Result<()>;

    /// Compile `source` with `options`.
    fn build_program(&self, source: &ProgramSource, options: &BuildOptions) -> Result<Arc<dyn Program>>;

    /// Enqueue a kernel over `range`. Returns without waiting for completion.
    fn enqueue_kernel(&self, kernel: &Arc<dyn Kernel>, args: Vec<KernelArg>, range: NdRange) -> Result<()>;

    /// Block until every enqueued command has completed.
    fn finish(&self) -> Result<()>;
}
