//! Both endpoints of a tunnel are driven at the same time

mod common;

use std::time::Duration;

use common::{admit, orchestrator, RendezvousShell};
use linkmesh_core::{TunnelSpec, TunnelType};

const DEADLINE: Duration = Duration::from_secs(2);

fn vxlan_spec(local: &str, remote: &str) -> TunnelSpec {
    TunnelSpec {
        name: None,
        tunnel_type: TunnelType::Vxlan,
        local_node_id: local.to_string(),
        remote_node_id: remote.to_string(),
        local_ip: "10.20.0.1".parse().unwrap(),
        remote_ip: "10.20.0.2".parse().unwrap(),
    }
}

#[tokio::test]
async fn test_provisioning_and_teardown_dispatch_both_sides_together() {
    let shell = RendezvousShell::new();
    let orch = orchestrator(shell.clone());
    let a = admit(&orch, "edge-a", "192.0.2.1").await;
    let b = admit(&orch, "edge-b", "192.0.2.2").await;

    let tunnel = tokio::time::timeout(DEADLINE, orch.create_tunnel(vxlan_spec(&a.id, &b.id)))
        .await
        .expect("provisioning stalled waiting on one endpoint")
        .unwrap();
    assert_eq!(shell.calls().len(), 2);

    tokio::time::timeout(DEADLINE, orch.delete_tunnel(&tunnel.id))
        .await
        .expect("teardown stalled waiting on one endpoint")
        .unwrap();

    let calls = shell.calls();
    assert_eq!(calls.len(), 4);
    assert!(calls[2..]
        .iter()
        .all(|(_, command)| command == "ip link delete vxlant42"));
    assert!(orch.list_tunnels().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_node_cascade_tears_down_both_sides_together() {
    let shell = RendezvousShell::new();
    let orch = orchestrator(shell.clone());
    let a = admit(&orch, "edge-a", "192.0.2.1").await;
    let b = admit(&orch, "edge-b", "192.0.2.2").await;

    tokio::time::timeout(DEADLINE, orch.create_tunnel(vxlan_spec(&a.id, &b.id)))
        .await
        .expect("provisioning stalled waiting on one endpoint")
        .unwrap();

    tokio::time::timeout(DEADLINE, orch.remove_node(&a.id))
        .await
        .expect("node removal stalled waiting on one endpoint")
        .unwrap();

    let hosts: Vec<String> = shell.calls()[2..].iter().map(|(h, _)| h.clone()).collect();
    assert_eq!(hosts.len(), 2);
    assert!(hosts.contains(&"192.0.2.1".to_string()));
    assert!(hosts.contains(&"192.0.2.2".to_string()));
    assert!(orch.list_tunnels().await.unwrap().is_empty());
}
