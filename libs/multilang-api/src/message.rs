use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Opaque tuple value: null / bool / number / string / array / object.
pub type Value = serde_json::Value;

/// Host-assigned task instance id.
pub type TaskId = i64;

/// Reply to a non-direct emission: the tasks that received the tuple.
pub type TaskIds = Vec<TaskId>;

/// Literal name of the topology's default stream.
pub const DEFAULT_STREAM: &str = "default";

/// Stream the host uses for bolt liveness probes.
pub const HEARTBEAT_STREAM: &str = "__heartbeat";

/// Task id the host puts on heartbeat tuples.
pub const HEARTBEAT_TASK: TaskId = -1;

// ════════════════════════════════════════════════════════════════
//  Handshake
// ════════════════════════════════════════════════════════════════

/// Topology placement of this worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopologyContext {
    /// Every task in the topology and the component it runs.
    /// Task ids arrive as JSON object keys and are decoded into integers.
    #[serde(rename = "task->component", default)]
    pub task_component: BTreeMap<TaskId, String>,
    /// Task id of this worker.
    #[serde(rename = "taskid")]
    pub task_id: TaskId,
    /// Component id, sent by newer hosts only.
    #[serde(rename = "componentid", default, skip_serializing_if = "Option::is_none")]
    pub component_id: Option<String>,
}

/// First message of every session.
///
/// ```json
/// {
///     "conf": {"topology.message.timeout.secs": 3},
///     "context": {"task->component": {"1": "sentences", "3": "split"}, "taskid": 3},
///     "pidDir": "/var/run/storm/pids"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandshakeConfig {
    /// Topology configuration entries, uninterpreted.
    #[serde(default)]
    pub conf: BTreeMap<String, Value>,
    pub context: TopologyContext,
    /// Directory for the pid marker file. Empty means the working directory.
    #[serde(rename = "pidDir", default)]
    pub pid_dir: String,
}

impl HandshakeConfig {
    pub fn task_id(&self) -> TaskId {
        self.context.task_id
    }

    /// Name of the component this worker runs as.
    pub fn component(&self) -> Option<&str> {
        self.context
            .task_component
            .get(&self.context.task_id)
            .or(self.context.component_id.as_ref())
            .map(String::as_str)
    }

    pub fn conf_value(&self, key: &str) -> Option<&Value> {
        self.conf.get(key)
    }
}

/// `{"pid": 1234}`, the only reply to the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessIdentity {
    pub pid: u32,
}

// ════════════════════════════════════════════════════════════════
//  Inbound
// ════════════════════════════════════════════════════════════════

/// One unit of work delivered to a bolt.
///
/// `id` is an anchor token: it is forwarded verbatim in acks, fails and
/// anchored emissions and never parsed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    #[serde(rename = "comp", default)]
    pub source_component: String,
    #[serde(rename = "stream", default)]
    pub source_stream: String,
    #[serde(rename = "task")]
    pub source_task: TaskId,
    #[serde(rename = "tuple", default)]
    pub values: Vec<Value>,
}

impl Record {
    /// Heartbeat tuples must be answered with `sync`, never acked.
    pub fn is_heartbeat(&self) -> bool {
        self.source_task == HEARTBEAT_TASK && self.source_stream == HEARTBEAT_STREAM
    }
}

/// Control message driving a spout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "lowercase")]
pub enum SpoutCommand {
    Next,
    Ack { id: String },
    Fail { id: String },
    Activate,
    Deactivate,
}

// ════════════════════════════════════════════════════════════════
//  Outbound
// ════════════════════════════════════════════════════════════════

/// Emitted tuple, shared by both roles.
///
/// Spout emissions carry `id` (absent for unreliable emits), bolt emissions
/// carry `anchors`. Construct through [`Emission::spout`] / [`Emission::bolt`]
/// so the stream name is normalized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Emission {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchors: Option<Vec<String>>,
    /// `None` is the default stream; omitted on the wire.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<String>,
    #[serde(rename = "task", default, skip_serializing_if = "Option::is_none")]
    pub direct_task: Option<TaskId>,
    #[serde(rename = "tuple")]
    pub values: Vec<Value>,
}

impl Emission {
    pub fn spout(values: Vec<Value>, id: Option<&str>, stream: &str) -> Self {
        Self {
            id: id.map(str::to_owned),
            anchors: None,
            stream: normalize_stream(stream),
            direct_task: None,
            values,
        }
    }

    pub fn bolt(values: Vec<Value>, anchors: &[&str], stream: &str) -> Self {
        Self {
            id: None,
            anchors: Some(anchors.iter().map(|a| (*a).to_owned()).collect()),
            stream: normalize_stream(stream),
            direct_task: None,
            values,
        }
    }

    /// Address the emission to one task instance. The host sends no reply.
    pub fn direct(mut self, task: TaskId) -> Self {
        self.direct_task = Some(task);
        self
    }

    pub fn is_direct(&self) -> bool {
        self.direct_task.is_some()
    }
}

/// `""` and `"default"` both name the default stream.
pub fn normalize_stream(stream: &str) -> Option<String> {
    if stream.is_empty() || stream == DEFAULT_STREAM {
        None
    } else {
        Some(stream.to_owned())
    }
}

/// Every message the worker sends after the pid report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "lowercase")]
pub enum Command {
    Log { msg: String },
    Ack { id: String },
    Fail { id: String },
    Sync,
    Emit(Emission),
}
