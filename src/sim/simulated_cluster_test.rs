use std::collections::BTreeSet;
use std::time::Duration;

use tokio::time::advance;

use crate::test_utils::enable_logger;
use crate::ClientConfig;
use crate::ClientId;
use crate::ClusterRuntime;
use crate::HarnessError;
use crate::MemberConfig;
use crate::MemberId;
use crate::RoutingMode;
use crate::SimPolicy;
use crate::SimulatedCluster;

fn seeded_sim() -> SimulatedCluster {
    SimulatedCluster::new(SimPolicy {
        seed: Some(42),
        ..Default::default()
    })
}

fn gateway_of(
    sim: &SimulatedCluster,
    members: &[MemberId],
    client: ClientId,
) -> Option<MemberId> {
    members
        .iter()
        .copied()
        .find(|m| sim.connection_view(*m).map(|view| view.contains(&client)).unwrap_or(false))
}

#[tokio::test(start_paused = true)]
async fn test_membership_propagates_after_one_delay() {
    enable_logger();
    let sim = seeded_sim();

    let m1 = sim.start_member(&MemberConfig::default()).expect("m1");
    let m2 = sim.start_member(&MemberConfig::default()).expect("m2");

    // Self-visibility is immediate, peers lag one propagation delay.
    assert_eq!(sim.cluster_view(m1).expect("view"), BTreeSet::from([m1]));
    assert_eq!(sim.cluster_view(m2).expect("view"), BTreeSet::from([m2]));

    advance(Duration::from_millis(50)).await;

    assert_eq!(sim.cluster_view(m1).expect("view"), BTreeSet::from([m1, m2]));
    assert_eq!(sim.cluster_view(m2).expect("view"), BTreeSet::from([m1, m2]));
}

#[tokio::test(start_paused = true)]
async fn test_late_joiner_measures_delay_from_its_own_join() {
    let sim = seeded_sim();

    let m1 = sim.start_member(&MemberConfig::default()).expect("m1");
    advance(Duration::from_millis(200)).await;
    let m2 = sim.start_member(&MemberConfig::default()).expect("m2");

    // The old member does not see the newcomer before the newcomer's own
    // announcement had time to spread.
    assert_eq!(sim.cluster_view(m1).expect("view").len(), 1);

    advance(Duration::from_millis(50)).await;
    assert_eq!(sim.cluster_view(m1).expect("view").len(), 2);
    assert_eq!(sim.cluster_view(m2).expect("view").len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_client_discovers_full_membership_in_both_routing_modes() {
    let sim = seeded_sim();
    let members: BTreeSet<MemberId> = (0..3)
        .map(|_| sim.start_member(&MemberConfig::default()).expect("member"))
        .collect();

    let smart = sim.start_client(&ClientConfig::default()).expect("smart client");
    let pinned = sim
        .start_client(&ClientConfig::with_routing(RoutingMode::SingleGateway))
        .expect("pinned client");

    // Discovery lags one propagation delay, like member-to-member gossip.
    assert!(sim.client_cluster_view(smart).expect("view").is_empty());

    advance(Duration::from_millis(50)).await;

    // Routing mode is about operation dispatch, not membership visibility.
    assert_eq!(sim.client_cluster_view(smart).expect("view"), members);
    assert_eq!(sim.client_cluster_view(pinned).expect("view"), members);
}

#[tokio::test(start_paused = true)]
async fn test_client_cluster_view_on_terminated_client_fails() {
    let sim = seeded_sim();
    sim.start_member(&MemberConfig::default()).expect("member");
    let client = sim.start_client(&ClientConfig::default()).expect("client");

    sim.terminate_client(client).expect("terminate");

    assert!(matches!(
        sim.client_cluster_view(client),
        Err(HarnessError::HandleTerminated { .. })
    ));
}

#[tokio::test(start_paused = true)]
async fn test_start_client_without_members_is_rejected() {
    let sim = seeded_sim();

    let result = sim.start_client(&ClientConfig::default());

    assert!(matches!(result, Err(HarnessError::RuntimeUnavailable)));
}

#[tokio::test(start_paused = true)]
async fn test_touch_establishes_exactly_one_lazy_connection() {
    let sim = seeded_sim();
    let members: Vec<MemberId> = (0..3)
        .map(|_| sim.start_member(&MemberConfig::default()).expect("member"))
        .collect();

    let client = sim.start_client(&ClientConfig::default()).expect("client");

    // No connection before the first touch.
    advance(Duration::from_millis(100)).await;
    assert_eq!(gateway_of(&sim, &members, client), None);

    sim.touch(client).expect("touch");

    // Registration needs one propagation delay to show up.
    assert_eq!(gateway_of(&sim, &members, client), None);
    advance(Duration::from_millis(50)).await;

    let connected: Vec<MemberId> = members
        .iter()
        .copied()
        .filter(|m| sim.connection_view(*m).expect("view").contains(&client))
        .collect();
    assert_eq!(connected.len(), 1, "exactly one responsible member per client");
}

#[tokio::test(start_paused = true)]
async fn test_single_gateway_client_keeps_its_gateway() {
    let sim = seeded_sim();
    let members: Vec<MemberId> = (0..3)
        .map(|_| sim.start_member(&MemberConfig::default()).expect("member"))
        .collect();

    let client = sim
        .start_client(&ClientConfig::with_routing(RoutingMode::SingleGateway))
        .expect("client");

    sim.touch(client).expect("first touch");
    advance(Duration::from_millis(50)).await;
    let pinned = gateway_of(&sim, &members, client).expect("pinned gateway");

    for _ in 0..5 {
        sim.touch(client).expect("re-touch");
        advance(Duration::from_millis(50)).await;
        assert_eq!(gateway_of(&sim, &members, client), Some(pinned));
    }
}

#[tokio::test(start_paused = true)]
async fn test_single_gateway_client_does_not_fail_over() {
    let sim = seeded_sim();
    let members: Vec<MemberId> = (0..3)
        .map(|_| sim.start_member(&MemberConfig::default()).expect("member"))
        .collect();

    let client = sim
        .start_client(&ClientConfig::with_routing(RoutingMode::SingleGateway))
        .expect("client");
    sim.touch(client).expect("touch");
    advance(Duration::from_millis(50)).await;
    let pinned = gateway_of(&sim, &members, client).expect("pinned gateway");

    sim.terminate_member(pinned).expect("terminate gateway");

    assert!(matches!(sim.touch(client), Err(HarnessError::RuntimeUnavailable)));
}

#[tokio::test(start_paused = true)]
async fn test_full_awareness_client_repins_when_gateway_dies() {
    let sim = seeded_sim();
    let members: Vec<MemberId> = (0..3)
        .map(|_| sim.start_member(&MemberConfig::default()).expect("member"))
        .collect();

    let client = sim.start_client(&ClientConfig::default()).expect("client");
    sim.touch(client).expect("touch");
    advance(Duration::from_millis(50)).await;
    let first = gateway_of(&sim, &members, client).expect("first gateway");

    sim.terminate_member(first).expect("terminate gateway");
    sim.touch(client).expect("re-touch picks a new gateway");
    advance(Duration::from_millis(50)).await;

    let survivors: Vec<MemberId> = members.iter().copied().filter(|m| *m != first).collect();
    let second = gateway_of(&sim, &survivors, client).expect("new gateway");
    assert_ne!(second, first);
}

#[tokio::test(start_paused = true)]
async fn test_views_on_terminated_member_fail() {
    let sim = seeded_sim();
    let m1 = sim.start_member(&MemberConfig::default()).expect("m1");
    let m2 = sim.start_member(&MemberConfig::default()).expect("m2");
    advance(Duration::from_millis(50)).await;

    sim.terminate_member(m2).expect("terminate");

    assert!(matches!(
        sim.cluster_view(m2),
        Err(HarnessError::HandleTerminated { .. })
    ));
    assert!(matches!(
        sim.connection_view(m2),
        Err(HarnessError::HandleTerminated { .. })
    ));
    // Survivors drop the terminated member from their views right away.
    assert_eq!(sim.cluster_view(m1).expect("view"), BTreeSet::from([m1]));
}

#[tokio::test(start_paused = true)]
async fn test_touch_on_terminated_client_fails() {
    let sim = seeded_sim();
    sim.start_member(&MemberConfig::default()).expect("member");
    let client = sim.start_client(&ClientConfig::default()).expect("client");

    sim.terminate_client(client).expect("terminate");

    assert!(matches!(
        sim.touch(client),
        Err(HarnessError::HandleTerminated { .. })
    ));
}

#[tokio::test(start_paused = true)]
async fn test_termination_is_idempotent() {
    let sim = seeded_sim();
    let member = sim.start_member(&MemberConfig::default()).expect("member");
    let client = sim.start_client(&ClientConfig::default()).expect("client");

    sim.terminate_client(client).expect("terminate client");
    sim.terminate_client(client).expect("terminate client again");
    sim.terminate_member(member).expect("terminate member");
    sim.terminate_member(member).expect("terminate member again");
}
