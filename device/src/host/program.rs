//! Host "compiler": validates program source and build options, then binds
//! entry points to native kernel bodies registered by name.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use bilat_dtype::ScalarDType;
use once_cell::sync::Lazy;
use parking_lot::RwLock;

use crate::buffer::Buffer;
use crate::device::{BuildOptions, Kernel, Program, ProgramSource};
use crate::error::{BuildSnafu, KernelNotFoundSnafu, LaunchSnafu, Result};
use crate::host::memory::HostMemory;
use crate::queue::{KernelArg, NdRange};

/// Definitions that name element types and must resolve to a known type.
const TYPE_DEFINES: &[&str] = &["T", "dim_type"];

/// Native body executing one kernel launch on the host.
pub type HostKernelFn = Arc<dyn Fn(&HostLaunch<'_>) -> Result<()> + Send + Sync>;

static HOST_KERNELS: Lazy<RwLock<HashMap<String, HostKernelFn>>> = Lazy::new(|| RwLock::new(HashMap::new()));

/// Register the native body for an entry point name.
///
/// Registering the same name again replaces the previous body.
pub fn register_host_kernel(name: &str, body: HostKernelFn) {
    HOST_KERNELS.write().insert(name.to_string(), body);
}

fn host_kernel(name: &str) -> Option<HostKernelFn> {
    HOST_KERNELS.read().get(name).cloned()
}

/// Arguments and geometry of a launch, as seen by a native kernel body.
pub struct HostLaunch<'a> {
    pub kernel: &'a str,
    pub options: &'a BuildOptions,
    pub args: &'a [KernelArg],
    pub range: NdRange,
}

impl<'a> HostLaunch<'a> {
    fn arg(&self, index: usize) -> Result<&'a KernelArg> {
        match self.args.get(index) {
            Some(arg) => Ok(arg),
            None => LaunchSnafu { reason: format!("{}: missing argument {index}", self.kernel) }.fail(),
        }
    }

    fn mismatch<T>(&self, index: usize, expected: &str) -> Result<T> {
        let got = self.args.get(index).map(KernelArg::kind);
        LaunchSnafu { reason: format!("{}: argument {index} expected {expected}, got {got:?}", self.kernel) }.fail()
    }

    pub fn buffer(&self, index: usize) -> Result<&'a Buffer> {
        match self.arg(index)? {
            KernelArg::Buffer(buffer) => Ok(buffer),
            _ => self.mismatch(index, "buffer"),
        }
    }

    pub fn memory(&self, index: usize) -> Result<&'a HostMemory> {
        match self.buffer(index)?.downcast::<HostMemory>() {
            Some(memory) => Ok(memory),
            None => self.mismatch(index, "host buffer"),
        }
    }

    pub fn local_bytes(&self, index: usize) -> Result<usize> {
        match self.arg(index)? {
            KernelArg::Local { bytes } => Ok(*bytes),
            _ => self.mismatch(index, "local reservation"),
        }
    }

    pub fn f32(&self, index: usize) -> Result<f32> {
        match self.arg(index)? {
            KernelArg::F32(value) => Ok(*value),
            _ => self.mismatch(index, "f32"),
        }
    }

    pub fn i64(&self, index: usize) -> Result<i64> {
        match self.arg(index)? {
            KernelArg::I64(value) => Ok(*value),
            _ => self.mismatch(index, "i64"),
        }
    }

    /// Element type bound to a type definition such as `T`.
    pub fn dtype(&self, define: &str) -> Result<ScalarDType> {
        self.options.value(define).and_then(ScalarDType::from_device_name).ok_or_else(|| {
            LaunchSnafu { reason: format!("{}: program built without a valid '{define}'", self.kernel) }.build()
        })
    }
}

/// Program built by [`HostDevice`](crate::host::HostDevice).
#[derive(Debug)]
pub struct HostProgram {
    name: String,
    options: BuildOptions,
    log: String,
    entry_points: Vec<String>,
}

impl HostProgram {
    /// Validate `source` against `options` the way a device compiler would.
    pub(crate) fn build(source: &ProgramSource, options: &BuildOptions) -> Result<Self> {
        let program = source.name.to_string();
        let mut log = String::new();

        for name in TYPE_DEFINES {
            if let Some(value) = options.value(name)
                && ScalarDType::from_device_name(value).is_none()
            {
                log.push_str(&format!("{program}: error: unknown type name '{value}' (from -D {name}={value})\n"));
            }
        }

        let mut depth = 0i64;
        for (line, text) in source.text.lines().enumerate() {
            for c in text.chars() {
                match c {
                    '{' => depth += 1,
                    '}' => depth -= 1,
                    _ => {}
                }
                if depth < 0 {
                    log.push_str(&format!("{program}:{}: error: extraneous closing brace\n", line + 1));
                    depth = 0;
                }
            }
        }
        if depth > 0 {
            log.push_str(&format!("{program}: error: expected '}}' at end of input\n"));
        }

        let entry_points = entry_points(&source.text);
        if entry_points.is_empty() {
            log.push_str(&format!("{program}: error: no kernel entry points\n"));
        }

        if !log.is_empty() {
            return BuildSnafu { program, log }.fail();
        }

        Ok(Self { name: program, options: options.clone(), log, entry_points })
    }

    pub fn entry_points(&self) -> &[String] {
        &self.entry_points
    }
}

impl Program for HostProgram {
    fn name(&self) -> &str {
        &self.name
    }

    fn options(&self) -> &BuildOptions {
        &self.options
    }

    fn build_log(&self) -> &str {
        &self.log
    }

    fn kernel(&self, name: &str) -> Result<Arc<dyn Kernel>> {
        let body = self
            .entry_points
            .iter()
            .any(|entry| entry == name)
            .then(|| host_kernel(name))
            .flatten()
            .ok_or_else(|| KernelNotFoundSnafu { program: self.name.clone(), name }.build())?;
        Ok(Arc::new(HostKernel { name: name.to_string(), options: self.options.clone(), body }))
    }
}

/// Entry point bound to its native body.
pub struct HostKernel {
    name: String,
    options: BuildOptions,
    body: HostKernelFn,
}

impl HostKernel {
    pub(crate) fn run(&self, args: &[KernelArg], range: NdRange) -> Result<()> {
        let launch = HostLaunch { kernel: &self.name, options: &self.options, args, range };
        (self.body)(&launch)
    }
}

impl fmt::Debug for HostKernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostKernel").field("name", &self.name).field("options", &self.options).finish()
    }
}

impl Kernel for HostKernel {
    fn name(&self) -> &str {
        &self.name
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Names declared as `__kernel void <name>(` in the source.
fn entry_points(text: &str) -> Vec<String> {
    text.match_indices("__kernel")
        .filter_map(|(index, keyword)| {
            let rest = text[index + keyword.len()..].trim_start().strip_prefix("void")?;
            let name: String = rest.trim_start().chars().take_while(|c| c.is_alphanumeric() || *c == '_').collect();
            (!name.is_empty()).then_some(name)
        })
        .collect()
}
