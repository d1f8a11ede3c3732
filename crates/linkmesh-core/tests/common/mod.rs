//! Shared fixtures: a scripted remote shell and a fixed allocator

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Barrier;
use linkmesh_core::{
    Credential, InMemoryRegistry, InterfaceAllocator, NewNode, NodeSummary, Orchestrator,
    RemoteShell, SessionError, SshTarget, TunnelType,
};

/// Remote shell that never opens a socket
///
/// Every host succeeds with empty output unless told otherwise. Executed
/// commands are recorded in call order as `(host, command)`.
#[derive(Default)]
pub struct ScriptedShell {
    calls: Mutex<Vec<(String, String)>>,
    failing: Mutex<HashSet<String>>,
    unreachable: Mutex<HashSet<String>>,
    replies: Mutex<HashMap<String, String>>,
}

impl ScriptedShell {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make `execute` against `host` fail with a connection error
    pub fn fail_host(&self, host: &str) {
        self.failing.lock().unwrap().insert(host.to_string());
    }

    pub fn heal_host(&self, host: &str) {
        self.failing.lock().unwrap().remove(host);
    }

    /// Make `probe` against `host` return false
    pub fn unreachable_host(&self, host: &str) {
        self.unreachable.lock().unwrap().insert(host.to_string());
    }

    /// Canned output for any command starting with `prefix`
    pub fn reply(&self, prefix: &str, output: &str) {
        self.replies
            .lock()
            .unwrap()
            .insert(prefix.to_string(), output.to_string());
    }

    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn commands_on(&self, host: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|(h, _)| h == host)
            .map(|(_, command)| command)
            .collect()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }
}

#[async_trait]
impl RemoteShell for ScriptedShell {
    async fn execute(&self, target: &SshTarget, command: &str) -> Result<String, SessionError> {
        self.calls
            .lock()
            .unwrap()
            .push((target.host.clone(), command.to_string()));

        if self.failing.lock().unwrap().contains(&target.host) {
            return Err(SessionError::Connection(format!(
                "connection to {} refused",
                target.address()
            )));
        }

        let replies = self.replies.lock().unwrap();
        let output = replies
            .iter()
            .find(|(prefix, _)| command.starts_with(prefix.as_str()))
            .map(|(_, output)| output.clone())
            .unwrap_or_default();
        Ok(output)
    }

    async fn probe(&self, target: &SshTarget) -> bool {
        !self.unreachable.lock().unwrap().contains(&target.host)
    }
}

/// Remote shell whose commands only complete once two are in flight
///
/// A caller that awaits one endpoint before starting the other never gets
/// past the first `execute`.
pub struct RendezvousShell {
    barrier: Barrier,
    calls: Mutex<Vec<(String, String)>>,
}

impl RendezvousShell {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            barrier: Barrier::new(2),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl RemoteShell for RendezvousShell {
    async fn execute(&self, target: &SshTarget, command: &str) -> Result<String, SessionError> {
        self.calls
            .lock()
            .unwrap()
            .push((target.host.clone(), command.to_string()));
        self.barrier.wait().await;
        Ok(String::new())
    }

    async fn probe(&self, _target: &SshTarget) -> bool {
        true
    }
}

/// Allocator that always hands out the same suffix and VNI
pub struct FixedAllocator {
    pub suffix: u32,
    pub vni: u32,
}

impl InterfaceAllocator for FixedAllocator {
    fn interface_name(&self, tunnel_type: TunnelType) -> String {
        format!("{}t{}", tunnel_type, self.suffix)
    }

    fn vxlan_id(&self) -> u32 {
        self.vni
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("linkmesh_core=debug")
        .with_test_writer()
        .try_init();
}

pub fn orchestrator(shell: Arc<dyn RemoteShell>) -> Orchestrator {
    init_tracing();
    Orchestrator::new(Arc::new(InMemoryRegistry::new()), shell).with_allocator(Arc::new(
        FixedAllocator {
            suffix: 42,
            vni: 4242,
        },
    ))
}

pub fn new_node(name: &str, address: &str) -> NewNode {
    NewNode {
        name: name.to_string(),
        address: address.to_string(),
        port: 22,
        username: "root".to_string(),
        credential: Credential::password("secret"),
    }
}

pub async fn admit(orchestrator: &Orchestrator, name: &str, address: &str) -> NodeSummary {
    orchestrator
        .add_node(new_node(name, address))
        .await
        .expect("node admission should succeed")
}
