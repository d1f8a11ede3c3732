//! End-to-end orchestration against a scripted remote shell

mod common;

use common::{admit, new_node, orchestrator, ScriptedShell};
use linkmesh_core::{
    OrchestratorError, RegistryError, TunnelSpec, TunnelStatus, TunnelType,
};

fn gre_spec(local: &str, remote: &str, name: Option<&str>) -> TunnelSpec {
    TunnelSpec {
        name: name.map(str::to_string),
        tunnel_type: TunnelType::Gre,
        local_node_id: local.to_string(),
        remote_node_id: remote.to_string(),
        local_ip: "10.10.0.1".parse().unwrap(),
        remote_ip: "10.10.0.2".parse().unwrap(),
    }
}

#[tokio::test]
async fn test_gre_tunnel_is_persisted_after_both_sides_dispatch() {
    let shell = ScriptedShell::new();
    let orch = orchestrator(shell.clone());
    let a = admit(&orch, "edge-a", "192.0.2.1").await;
    let b = admit(&orch, "edge-b", "192.0.2.2").await;

    let tunnel = orch.create_tunnel(gre_spec(&a.id, &b.id, None)).await.unwrap();

    assert_eq!(tunnel.name, "gret42");
    assert_eq!(tunnel.tunnel_type, TunnelType::Gre);
    assert_eq!(tunnel.status, TunnelStatus::Active);
    assert_eq!(tunnel.local_ip, "10.10.0.1");
    assert_eq!(tunnel.remote_ip, "10.10.0.2");

    let on_a = shell.commands_on("192.0.2.1");
    let on_b = shell.commands_on("192.0.2.2");
    assert_eq!(on_a.len(), 1);
    assert_eq!(on_b.len(), 1);
    assert!(on_a[0].starts_with("ip tunnel add gret42 mode gre remote 192.0.2.2 local 192.0.2.1"));
    assert!(on_a[0].ends_with("ip addr add 10.10.0.1/30 dev gret42"));
    assert!(on_b[0].starts_with("ip tunnel add gret42 mode gre remote 192.0.2.1 local 192.0.2.2"));
    assert!(on_b[0].ends_with("ip addr add 10.10.0.2/30 dev gret42"));

    let listed = orch.list_tunnels().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].tunnel, tunnel);
    assert_eq!(listed[0].local_node.as_ref().unwrap().name, "edge-a");
    assert_eq!(listed[0].remote_node.as_ref().unwrap().name, "edge-b");
}

#[tokio::test]
async fn test_vxlan_pair_shares_identifier() {
    let shell = ScriptedShell::new();
    let orch = orchestrator(shell.clone());
    let a = admit(&orch, "edge-a", "192.0.2.1").await;
    let b = admit(&orch, "edge-b", "192.0.2.2").await;

    let spec = TunnelSpec {
        tunnel_type: TunnelType::Vxlan,
        ..gre_spec(&a.id, &b.id, Some("overlay"))
    };
    let tunnel = orch.create_tunnel(spec).await.unwrap();
    assert_eq!(tunnel.name, "overlay");

    for host in ["192.0.2.1", "192.0.2.2"] {
        let commands = shell.commands_on(host);
        assert!(commands[0].starts_with("ip link add vxlant42 type vxlan id 4242"));
        assert!(commands[0].contains("dstport 4789"));
        assert!(commands[0].contains("/24 dev vxlant42"));
    }
}

#[tokio::test]
async fn test_one_sided_failure_persists_nothing() {
    let shell = ScriptedShell::new();
    let orch = orchestrator(shell.clone());
    let a = admit(&orch, "edge-a", "192.0.2.1").await;
    let b = admit(&orch, "edge-b", "192.0.2.2").await;

    shell.fail_host("192.0.2.2");

    match orch.create_tunnel(gre_spec(&a.id, &b.id, None)).await {
        Err(OrchestratorError::TunnelProvisioningFailed {
            tunnel_type,
            detail,
        }) => {
            assert_eq!(tunnel_type, TunnelType::Gre);
            assert!(detail.contains("remote side failed"));
            assert!(detail.contains("local side was configured"));
        }
        other => panic!("Expected provisioning failure, got {:?}", other),
    }

    // Both sides were still attempted
    assert_eq!(shell.commands_on("192.0.2.1").len(), 1);
    assert_eq!(shell.commands_on("192.0.2.2").len(), 1);
    assert!(orch.list_tunnels().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_command_exit_status_is_not_inspected() {
    let shell = ScriptedShell::new();
    let orch = orchestrator(shell.clone());
    let a = admit(&orch, "edge-a", "192.0.2.1").await;
    let b = admit(&orch, "edge-b", "192.0.2.2").await;

    shell.reply("ip tunnel add", "add tunnel \"gre0\" failed: File exists");

    let tunnel = orch.create_tunnel(gre_spec(&a.id, &b.id, None)).await.unwrap();
    assert_eq!(orch.list_tunnels().await.unwrap()[0].tunnel.id, tunnel.id);
}

#[tokio::test]
async fn test_create_tunnel_rejects_unknown_and_identical_nodes() {
    let shell = ScriptedShell::new();
    let orch = orchestrator(shell.clone());
    let a = admit(&orch, "edge-a", "192.0.2.1").await;

    assert!(matches!(
        orch.create_tunnel(gre_spec(&a.id, "missing", None)).await,
        Err(OrchestratorError::NodeNotFound(id)) if id == "missing"
    ));
    assert!(matches!(
        orch.create_tunnel(gre_spec(&a.id, &a.id, None)).await,
        Err(OrchestratorError::InvalidTunnelSpec(_))
    ));
    assert!(shell.calls().is_empty());
}

#[tokio::test]
async fn test_teardown_removes_record_even_when_hosts_fail() {
    let shell = ScriptedShell::new();
    let orch = orchestrator(shell.clone());
    let a = admit(&orch, "edge-a", "192.0.2.1").await;
    let b = admit(&orch, "edge-b", "192.0.2.2").await;
    let tunnel = orch.create_tunnel(gre_spec(&a.id, &b.id, None)).await.unwrap();

    shell.clear_calls();
    shell.fail_host("192.0.2.1");
    shell.fail_host("192.0.2.2");

    orch.delete_tunnel(&tunnel.id).await.unwrap();

    assert_eq!(shell.commands_on("192.0.2.1"), vec!["ip link delete gret42"]);
    assert_eq!(shell.commands_on("192.0.2.2"), vec!["ip link delete gret42"]);
    assert!(orch.list_tunnels().await.unwrap().is_empty());

    assert!(matches!(
        orch.delete_tunnel(&tunnel.id).await,
        Err(OrchestratorError::TunnelNotFound(_))
    ));
}

#[tokio::test]
async fn test_operator_named_tunnel_skips_remote_teardown() {
    let shell = ScriptedShell::new();
    let orch = orchestrator(shell.clone());
    let a = admit(&orch, "edge-a", "192.0.2.1").await;
    let b = admit(&orch, "edge-b", "192.0.2.2").await;
    let tunnel = orch
        .create_tunnel(gre_spec(&a.id, &b.id, Some("backbone")))
        .await
        .unwrap();

    shell.clear_calls();
    orch.delete_tunnel(&tunnel.id).await.unwrap();

    assert!(shell.calls().is_empty());
    assert!(orch.list_tunnels().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_node_removal_cascades_to_every_tunnel() {
    let shell = ScriptedShell::new();
    let orch = orchestrator(shell.clone());
    let a = admit(&orch, "edge-a", "192.0.2.1").await;
    let b = admit(&orch, "edge-b", "192.0.2.2").await;
    let c = admit(&orch, "edge-c", "192.0.2.3").await;

    orch.create_tunnel(gre_spec(&a.id, &b.id, None)).await.unwrap();
    orch.create_tunnel(gre_spec(&c.id, &a.id, None)).await.unwrap();
    let survivor = orch.create_tunnel(gre_spec(&b.id, &c.id, None)).await.unwrap();

    shell.clear_calls();
    shell.fail_host("192.0.2.1");

    orch.remove_node(&a.id).await.unwrap();

    // One delete per tunnel per endpoint
    assert_eq!(shell.commands_on("192.0.2.1").len(), 2);
    assert_eq!(shell.commands_on("192.0.2.2").len(), 1);
    assert_eq!(shell.commands_on("192.0.2.3").len(), 1);

    let remaining = orch.list_tunnels().await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].tunnel.id, survivor.id);

    let nodes = orch.list_nodes().await.unwrap();
    assert_eq!(nodes.len(), 2);
    assert!(nodes.iter().all(|n| n.id != a.id));

    assert!(matches!(
        orch.remove_node(&a.id).await,
        Err(OrchestratorError::NodeNotFound(_))
    ));
}

#[tokio::test]
async fn test_unreachable_node_is_not_admitted() {
    let shell = ScriptedShell::new();
    let orch = orchestrator(shell.clone());
    shell.unreachable_host("192.0.2.9");

    match orch.add_node(new_node("dark", "192.0.2.9")).await {
        Err(OrchestratorError::NodeUnreachable(address)) => {
            assert_eq!(address, "192.0.2.9:22")
        }
        other => panic!("Expected NodeUnreachable, got {:?}", other),
    }
    assert!(orch.list_nodes().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_duplicate_address_and_port_conflicts() {
    let shell = ScriptedShell::new();
    let orch = orchestrator(shell);
    admit(&orch, "edge-a", "192.0.2.1").await;

    let err = orch
        .add_node(new_node("edge-a-again", "192.0.2.1"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        OrchestratorError::Registry(RegistryError::Conflict(_))
    ));
    assert_eq!(err.code(), "CONFLICT");
}

#[tokio::test]
async fn test_invalid_node_fails_before_probe() {
    let shell = ScriptedShell::new();
    let orch = orchestrator(shell);

    let mut node = new_node("edge", "10.0.0.1;reboot");
    assert!(matches!(
        orch.add_node(node.clone()).await,
        Err(OrchestratorError::InvalidNode(_))
    ));

    node.address = "10.0.0.1".to_string();
    node.port = 0;
    assert!(matches!(
        orch.add_node(node).await,
        Err(OrchestratorError::InvalidNode(_))
    ));
}
