use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use snafu::ensure;

use crate::buffer::{Buffer, MemFlags};
use crate::device::{BuildOptions, ComputeDevice, Kernel, Program, ProgramSource};
use crate::error::{AllocationSnafu, LaunchSnafu, OutOfBoundsSnafu, Result, TransferSnafu};
use crate::host::memory::HostMemory;
use crate::host::program::{HostKernel, HostProgram};
use crate::queue::{KernelArg, NdRange};

/// Pending command in the host queue.
enum Command {
    Write { buffer: Buffer, offset: usize, data: Vec<u8> },
    Launch { kernel: Arc<dyn Kernel>, args: Vec<KernelArg>, range: NdRange },
}

/// Snapshot of host device activity counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HostStats {
    pub compilations: u64,
    pub allocations: u64,
    pub launches: u64,
    pub executed: u64,
    pub bytes_written: u64,
    pub bytes_read: u64,
}

#[derive(Debug, Default)]
struct Counters {
    compilations: AtomicU64,
    allocations: AtomicU64,
    launches: AtomicU64,
    executed: AtomicU64,
    bytes_written: AtomicU64,
    bytes_read: AtomicU64,
}

/// A kernel submission as it was enqueued.
#[derive(Debug, Clone)]
pub struct LaunchRecord {
    pub kernel: String,
    pub args: Vec<KernelArg>,
    pub range: NdRange,
}

/// Reference compute device backed by host memory.
///
/// The queue is in-order and deferred: launches and non-blocking writes are
/// held until [`ComputeDevice::finish`] or the next blocking transfer, then
/// executed in submission order.
#[derive(Debug)]
pub struct HostDevice {
    id: usize,
    name: String,
    max_alloc_size: Option<usize>,
    pending: Mutex<Vec<Command>>,
    /// Serializes queue drains so commands never overtake each other.
    drain: Mutex<()>,
    counters: Counters,
    launches: Mutex<Vec<LaunchRecord>>,
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Command::Write { offset, data, .. } => {
                f.debug_struct("Write").field("offset", offset).field("len", &data.len()).finish()
            }
            Command::Launch { kernel, range, .. } => {
                f.debug_struct("Launch").field("kernel", &kernel.name()).field("range", range).finish()
            }
        }
    }
}

impl HostDevice {
    pub fn new(id: usize) -> Self {
        Self {
            id,
            name: format!("HOST:{id}"),
            max_alloc_size: None,
            pending: Mutex::new(Vec::new()),
            drain: Mutex::new(()),
            counters: Counters::default(),
            launches: Mutex::new(Vec::new()),
        }
    }

    /// Reject allocations larger than `bytes`, simulating a small device.
    pub fn with_max_alloc_size(mut self, bytes: usize) -> Self {
        self.max_alloc_size = Some(bytes);
        self
    }

    pub fn stats(&self) -> HostStats {
        let c = &self.counters;
        HostStats {
            compilations: c.compilations.load(Ordering::Relaxed),
            allocations: c.allocations.load(Ordering::Relaxed),
            launches: c.launches.load(Ordering::Relaxed),
            executed: c.executed.load(Ordering::Relaxed),
            bytes_written: c.bytes_written.load(Ordering::Relaxed),
            bytes_read: c.bytes_read.load(Ordering::Relaxed),
        }
    }

    /// Every launch enqueued so far, oldest first.
    pub fn launch_records(&self) -> Vec<LaunchRecord> {
        self.launches.lock().clone()
    }

    /// Number of commands waiting in the queue.
    pub fn pending(&self) -> usize {
        self.pending.lock().len()
    }

    fn host_memory<'a>(&self, buffer: &'a Buffer) -> Result<&'a HostMemory> {
        ensure!(
            buffer.device_id() == self.id,
            TransferSnafu { reason: format!("buffer belongs to device {}, not {}", buffer.device_id(), self.id) }
        );
        buffer.downcast::<HostMemory>().ok_or_else(|| TransferSnafu { reason: "foreign buffer handle" }.build())
    }

    fn check_bounds(buffer: &Buffer, offset: usize, size: usize) -> Result<()> {
        let buffer_size = buffer.size();
        ensure!(
            offset.checked_add(size).is_some_and(|end| end <= buffer_size),
            OutOfBoundsSnafu { offset, size, buffer_size }
        );
        Ok(())
    }

    fn copy_in(&self, buffer: &Buffer, offset: usize, data: &[u8]) -> Result<()> {
        let memory = self.host_memory(buffer)?;
        memory.write()[offset..offset + data.len()].copy_from_slice(data);
        self.counters.bytes_written.fetch_add(data.len() as u64, Ordering::Relaxed);
        Ok(())
    }

    fn execute(&self, command: Command) -> Result<()> {
        match command {
            Command::Write { buffer, offset, data } => self.copy_in(&buffer, offset, &data),
            Command::Launch { kernel, args, range } => {
                let host = kernel
                    .as_any()
                    .downcast_ref::<HostKernel>()
                    .ok_or_else(|| LaunchSnafu { reason: format!("{} is not a host kernel", kernel.name()) }.build())?;
                host.run(&args, range)?;
                self.counters.executed.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
        }
    }

    /// Run every pending command in submission order.
    ///
    /// Stops at the first failing command; the remaining commands are dropped.
    fn flush(&self) -> Result<()> {
        let _drain = self.drain.lock();
        let commands = std::mem::take(&mut *self.pending.lock());
        if !commands.is_empty() {
            tracing::trace!(device.id = self.id, count = commands.len(), "draining host queue");
        }
        commands.into_iter().try_for_each(|command| self.execute(command))
    }
}

impl ComputeDevice for HostDevice {
    fn id(&self) -> usize {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn alloc(&self, size: usize, flags: MemFlags) -> Result<Buffer> {
        if let Some(max) = self.max_alloc_size
            && size > max
        {
            return AllocationSnafu { size, reason: format!("exceeds device limit of {max} bytes") }.fail();
        }
        self.counters.allocations.fetch_add(1, Ordering::Relaxed);
        Ok(Buffer::new(self.id, flags, Arc::new(HostMemory::zeroed(size))))
    }

    fn write_buffer(&self, buffer: &Buffer, offset: usize, data: &[u8], blocking: bool) -> Result<()> {
        self.host_memory(buffer)?;
        Self::check_bounds(buffer, offset, data.len())?;
        if blocking {
            self.flush()?;
            self.copy_in(buffer, offset, data)
        } else {
            let command = Command::Write { buffer: buffer.clone(), offset, data: data.to_vec() };
            self.pending.lock().push(command);
            Ok(())
        }
    }

    fn read_buffer(&self, buffer: &Buffer, offset: usize, dst: &mut [u8]) -> Result<()> {
        let memory = self.host_memory(buffer)?;
        Self::check_bounds(buffer, offset, dst.len())?;
        self.flush()?;
        dst.copy_from_slice(&memory.read()[offset..offset + dst.len()]);
        self.counters.bytes_read.fetch_add(dst.len() as u64, Ordering::Relaxed);
        Ok(())
    }

    fn build_program(&self, source: &ProgramSource, options: &BuildOptions) -> Result<Arc<dyn Program>> {
        self.counters.compilations.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(device.id = self.id, program = %source.name, options = %options, "building program");
        let program = HostProgram::build(source, options)?;
        Ok(Arc::new(program))
    }

    fn enqueue_kernel(&self, kernel: &Arc<dyn Kernel>, args: Vec<KernelArg>, range: NdRange) -> Result<()> {
        ensure!(
            kernel.as_any().is::<HostKernel>(),
            LaunchSnafu { reason: format!("{} was not built by {}", kernel.name(), self.name) }
        );
        ensure!(range.is_uniform(), LaunchSnafu { reason: format!("non-uniform range {range:?}") });
        for arg in &args {
            if let KernelArg::Buffer(buffer) = arg {
                self.host_memory(buffer)?;
            }
        }

        self.counters.launches.fetch_add(1, Ordering::Relaxed);
        self.launches.lock().push(LaunchRecord { kernel: kernel.name().to_string(), args: args.clone(), range });
        self.pending.lock().push(Command::Launch { kernel: Arc::clone(kernel), args, range });
        Ok(())
    }

    fn finish(&self) -> Result<()> {
        self.flush()
    }
}
