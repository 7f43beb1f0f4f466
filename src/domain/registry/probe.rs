use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::domain::resource::node::Node;
use crate::domain::resource::resource::Resource;
use crate::domain::utils::id::NodeId;
use crate::error::{Error, Result};

pub const DEFAULT_PROBE_SCRIPT: &str = "scripts/available.sh";
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(30);

/// One resource reported by a probe, before the registry assigns its index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Discovery {
    pub typ: String,
    pub name: String,
}

impl Discovery {
    pub fn new(typ: impl Into<String>, name: impl Into<String>) -> Self {
        Discovery { typ: typ.into(), name: name.into() }
    }
}

/// How to reach a node over SSH.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeDescriptor {
    pub id: NodeId,
    pub address: String,
    pub port: u16,
    pub ssh_user: String,
}

impl From<&Node> for NodeDescriptor {
    fn from(node: &Node) -> Self {
        NodeDescriptor { id: node.id.clone(), address: node.address.clone(), port: node.port, ssh_user: node.ssh_user.clone() }
    }
}

/// Discovers the physical inventory of a node. May block on the network, never call it while holding a registry lock.
#[async_trait]
pub trait NodeProbe: Send + Sync {
    async fn probe(&self, node: &NodeDescriptor) -> Result<Vec<Discovery>>;
}

/// Parses `type:name` lines. Lines without a type or a name are ignored.
pub fn parse_probe_output(stdout: &str) -> Vec<Discovery> {
    stdout
        .lines()
        .filter_map(|line| {
            let (typ, name) = line.trim().split_once(':')?;
            let (typ, name) = (typ.trim(), name.trim());
            if typ.is_empty() || name.is_empty() { None } else { Some(Discovery::new(typ, name)) }
        })
        .collect()
}

/// Turns discoveries into resources, numbering each type from 0 in discovery order.
pub fn assign_indices(discoveries: Vec<Discovery>) -> Vec<Resource> {
    let mut counters: HashMap<String, u32> = HashMap::new();
    discoveries
        .into_iter()
        .map(|discovery| {
            let counter = counters.entry(discovery.typ.clone()).or_insert(0);
            let resource = Resource::new(discovery.typ, discovery.name, *counter);
            *counter += 1;
            resource
        })
        .collect()
}

/// Runs a shell script on the node through `ssh <user>@<address> -p <port> bash -s`.
///
/// The script and `export` lines for the configured environment are written to the remote
/// shell's stdin.
#[derive(Debug, Clone)]
pub struct SshProbe {
    script_path: PathBuf,
    env: BTreeMap<String, String>,
    timeout: Duration,
}

impl SshProbe {
    pub fn new(script_path: impl Into<PathBuf>) -> Self {
        SshProbe { script_path: script_path.into(), env: BTreeMap::new(), timeout: DEFAULT_PROBE_TIMEOUT }
    }

    pub fn with_env(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(name.into(), value.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn stdin_payload(&self, script: &str) -> String {
        let mut payload: String = self.env.iter().map(|(name, value)| format!("export {}={}\n", name, value)).collect();
        payload.push_str(script);
        payload.push('\n');
        payload
    }

    async fn run_script(&self, node: &NodeDescriptor) -> std::result::Result<String, String> {
        let script = tokio::fs::read_to_string(&self.script_path)
            .await
            .map_err(|e| format!("problem reading script '{}': {}", self.script_path.display(), e))?;

        let address = format!("{}@{}", node.ssh_user, node.address);
        log::debug!("Running script '{}' on '{}' (port {}).", self.script_path.display(), address, node.port);

        let mut child = Command::new("ssh")
            .arg(&address)
            .arg("-p")
            .arg(node.port.to_string())
            .arg("bash -s")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| format!("failed to spawn ssh: {}", e))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(self.stdin_payload(&script).as_bytes()).await.map_err(|e| format!("failed to send script: {}", e))?;
        }

        let output = child.wait_with_output().await.map_err(|e| format!("failed to wait for ssh: {}", e))?;
        if !output.status.success() {
            return Err(format!("{} ({})", output.status, String::from_utf8_lossy(&output.stderr).trim()));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl NodeProbe for SshProbe {
    async fn probe(&self, node: &NodeDescriptor) -> Result<Vec<Discovery>> {
        let stdout = match tokio::time::timeout(self.timeout, self.run_script(node)).await {
            Ok(Ok(stdout)) => stdout,
            Ok(Err(reason)) => return Err(Error::ProbeFailed { node: node.id.clone(), reason }),
            Err(_) => return Err(Error::ProbeFailed { node: node.id.clone(), reason: format!("timed out after {:?}", self.timeout) }),
        };

        let discoveries = parse_probe_output(&stdout);
        log::debug!("Probe of node {} reported {} resources.", node.id, discoveries.len());
        Ok(discoveries)
    }
}
