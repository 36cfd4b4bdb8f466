//! In-memory collaborators for tests. `MockCompute` and
//! `MockCommandChannel` can share one [`CallLog`] so a test can assert
//! ordering across the compute control plane and the command channel.

use crate::{CommandChannel, CommandInvocation, ComputeProvider, RegistryStore};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use warden_common::ServerRecord;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallRecord {
    InstanceStatus { instance_id: String },
    PublicAddress { instance_id: String },
    StartInstance { instance_id: String, dry_run: bool },
    StopInstance { instance_id: String, dry_run: bool },
    TerminateInstance { instance_id: String, dry_run: bool },
    SendCommand { instance_id: String, commands: Vec<String> },
    CommandInvocation { command_id: String },
}

impl CallRecord {
    /// True for calls that mutate cloud state for real (dry runs excluded).
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            CallRecord::StartInstance { dry_run: false, .. }
                | CallRecord::StopInstance { dry_run: false, .. }
                | CallRecord::TerminateInstance { dry_run: false, .. }
        )
    }
}

pub type CallLog = Arc<Mutex<Vec<CallRecord>>>;

pub fn new_call_log() -> CallLog {
    Arc::new(Mutex::new(Vec::new()))
}

fn record(log: &CallLog, call: CallRecord) {
    log.lock().expect("call log poisoned").push(call);
}

/// Scripted compute control plane. Status codes are consumed from a queue
/// (the last entry repeats once the queue is down to one), and each
/// mutating operation can be forced to fail persistently.
pub struct MockCompute {
    pub calls: CallLog,
    status_codes: Mutex<VecDeque<Option<i32>>>,
    address: Mutex<Option<String>>,
    status_error: Mutex<Option<String>>,
    start_error: Mutex<Option<String>>,
    stop_error: Mutex<Option<String>>,
    terminate_error: Mutex<Option<String>>,
}

impl MockCompute {
    pub fn new(calls: CallLog) -> Self {
        Self {
            calls,
            status_codes: Mutex::new(VecDeque::new()),
            address: Mutex::new(None),
            status_error: Mutex::new(None),
            start_error: Mutex::new(None),
            stop_error: Mutex::new(None),
            terminate_error: Mutex::new(None),
        }
    }

    /// Queue the status codes successive `instance_status` calls observe.
    /// `None` entries model "provider reports no status for this id".
    pub fn script_status(&self, codes: &[Option<i32>]) {
        let mut q = self.status_codes.lock().expect("status queue poisoned");
        q.clear();
        q.extend(codes.iter().copied());
    }

    pub fn set_address(&self, address: Option<&str>) {
        *self.address.lock().expect("address poisoned") = address.map(|a| a.to_string());
    }

    pub fn fail_status(&self, message: &str) {
        *self.status_error.lock().expect("status error poisoned") = Some(message.to_string());
    }

    pub fn fail_start(&self, message: &str) {
        *self.start_error.lock().expect("start error poisoned") = Some(message.to_string());
    }

    pub fn fail_stop(&self, message: &str) {
        *self.stop_error.lock().expect("stop error poisoned") = Some(message.to_string());
    }

    pub fn fail_terminate(&self, message: &str) {
        *self.terminate_error.lock().expect("terminate error poisoned") = Some(message.to_string());
    }

    /// Number of real (non-dry-run) mutating calls recorded so far.
    pub fn mutation_count(&self) -> usize {
        self.calls
            .lock()
            .expect("call log poisoned")
            .iter()
            .filter(|c| c.is_mutation())
            .count()
    }

    fn next_status(&self) -> Option<i32> {
        let mut q = self.status_codes.lock().expect("status queue poisoned");
        match q.len() {
            0 => None,
            1 => *q.front().expect("checked non-empty"),
            _ => q.pop_front().expect("checked non-empty"),
        }
    }
}

#[async_trait]
impl ComputeProvider for MockCompute {
    async fn instance_status(&self, instance_id: &str) -> Result<Option<i32>> {
        record(
            &self.calls,
            CallRecord::InstanceStatus {
                instance_id: instance_id.to_string(),
            },
        );
        if let Some(msg) = self.status_error.lock().expect("status error poisoned").clone() {
            return Err(anyhow!(msg));
        }
        Ok(self.next_status())
    }

    async fn public_address(&self, instance_id: &str) -> Result<Option<String>> {
        record(
            &self.calls,
            CallRecord::PublicAddress {
                instance_id: instance_id.to_string(),
            },
        );
        Ok(self.address.lock().expect("address poisoned").clone())
    }

    async fn start_instance(&self, instance_id: &str, dry_run: bool) -> Result<()> {
        record(
            &self.calls,
            CallRecord::StartInstance {
                instance_id: instance_id.to_string(),
                dry_run,
            },
        );
        match self.start_error.lock().expect("start error poisoned").clone() {
            Some(msg) => Err(anyhow!(msg)),
            None => Ok(()),
        }
    }

    async fn stop_instance(&self, instance_id: &str, dry_run: bool) -> Result<()> {
        record(
            &self.calls,
            CallRecord::StopInstance {
                instance_id: instance_id.to_string(),
                dry_run,
            },
        );
        match self.stop_error.lock().expect("stop error poisoned").clone() {
            Some(msg) => Err(anyhow!(msg)),
            None => Ok(()),
        }
    }

    async fn terminate_instance(&self, instance_id: &str, dry_run: bool) -> Result<()> {
        record(
            &self.calls,
            CallRecord::TerminateInstance {
                instance_id: instance_id.to_string(),
                dry_run,
            },
        );
        match self
            .terminate_error
            .lock()
            .expect("terminate error poisoned")
            .clone()
        {
            Some(msg) => Err(anyhow!(msg)),
            None => Ok(()),
        }
    }
}

/// Scripted command channel. Invocation statuses are consumed from a queue
/// (last entry repeats); sends return `cmd-1`, `cmd-2`, ... in order.
pub struct MockCommandChannel {
    pub calls: CallLog,
    statuses: Mutex<VecDeque<String>>,
    stdout: Mutex<String>,
    stderr: Mutex<String>,
    send_error: Mutex<Option<String>>,
    next_id: AtomicU64,
}

impl MockCommandChannel {
    pub fn new(calls: CallLog) -> Self {
        Self {
            calls,
            statuses: Mutex::new(VecDeque::from([String::from("Success")])),
            stdout: Mutex::new(String::new()),
            stderr: Mutex::new(String::new()),
            send_error: Mutex::new(None),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn script_statuses(&self, statuses: &[&str]) {
        let mut q = self.statuses.lock().expect("status queue poisoned");
        q.clear();
        q.extend(statuses.iter().map(|s| s.to_string()));
    }

    pub fn set_output(&self, stdout: &str, stderr: &str) {
        *self.stdout.lock().expect("stdout poisoned") = stdout.to_string();
        *self.stderr.lock().expect("stderr poisoned") = stderr.to_string();
    }

    pub fn fail_send(&self, message: &str) {
        *self.send_error.lock().expect("send error poisoned") = Some(message.to_string());
    }

    fn next_status(&self) -> String {
        let mut q = self.statuses.lock().expect("status queue poisoned");
        match q.len() {
            0 => String::from("Success"),
            1 => q.front().expect("checked non-empty").clone(),
            _ => q.pop_front().expect("checked non-empty"),
        }
    }
}

#[async_trait]
impl CommandChannel for MockCommandChannel {
    async fn send_command(
        &self,
        instance_id: &str,
        commands: &[String],
        _working_directory: &str,
    ) -> Result<String> {
        record(
            &self.calls,
            CallRecord::SendCommand {
                instance_id: instance_id.to_string(),
                commands: commands.to_vec(),
            },
        );
        if let Some(msg) = self.send_error.lock().expect("send error poisoned").clone() {
            return Err(anyhow!(msg));
        }
        Ok(format!("cmd-{}", self.next_id.fetch_add(1, Ordering::SeqCst)))
    }

    async fn command_invocation(
        &self,
        command_id: &str,
        _instance_id: &str,
    ) -> Result<CommandInvocation> {
        record(
            &self.calls,
            CallRecord::CommandInvocation {
                command_id: command_id.to_string(),
            },
        );
        Ok(CommandInvocation {
            status: self.next_status(),
            stdout: self.stdout.lock().expect("stdout poisoned").clone(),
            stderr: self.stderr.lock().expect("stderr poisoned").clone(),
        })
    }
}

/// Registry backed by a process-local map.
#[derive(Default)]
pub struct MemoryRegistry {
    records: Mutex<HashMap<String, ServerRecord>>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RegistryStore for MemoryRegistry {
    async fn put(&self, record: &ServerRecord) -> Result<()> {
        self.records
            .lock()
            .expect("registry poisoned")
            .insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn get(&self, server_id: &str) -> Result<Option<ServerRecord>> {
        Ok(self
            .records
            .lock()
            .expect("registry poisoned")
            .get(server_id)
            .cloned())
    }

    async fn list(&self) -> Result<Vec<ServerRecord>> {
        let mut records: Vec<ServerRecord> = self
            .records
            .lock()
            .expect("registry poisoned")
            .values()
            .cloned()
            .collect();
        records.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(records)
    }

    async fn delete(&self, server_id: &str) -> Result<()> {
        self.records
            .lock()
            .expect("registry poisoned")
            .remove(server_id);
        Ok(())
    }
}
