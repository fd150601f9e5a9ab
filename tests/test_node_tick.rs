use anyhow::Result;
use async_trait::async_trait;
use snowsim::{
    Color, Network, Node, NodeId, Protocol, QueryError, QueryTransport, RoundScheduler,
    SimulatedTransport,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Barrier;
use tokio::time::Duration;

/// Reads the responder, then waits until every query of the round has been
/// read, so no node sees another node's update from the same round.
struct LockstepTransport {
    barrier: Barrier,
}

#[async_trait]
impl QueryTransport for LockstepTransport {
    async fn query(&self, target: &Node, proposed: Color) -> Result<Color, QueryError> {
        let color = target.respond(proposed).await;
        self.barrier.wait().await;
        Ok(color)
    }
}

/// Counts queries and answers immediately
#[derive(Default)]
struct CountingTransport {
    queries: AtomicUsize,
}

#[async_trait]
impl QueryTransport for CountingTransport {
    async fn query(&self, target: &Node, proposed: Color) -> Result<Color, QueryError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        Ok(target.respond(proposed).await)
    }
}

fn lockstep_pair() -> Result<Network> {
    let transport = Arc::new(LockstepTransport {
        barrier: Barrier::new(2),
    });
    Ok(Network::builder()
        .node(Color::A, [1])
        .node(Color::B, [0])
        .with_transport(transport)
        .build()?)
}

#[tokio::test]
async fn test_two_node_slush_oscillates() -> Result<()> {
    let network = Arc::new(lockstep_pair()?);
    let scheduler = RoundScheduler::new(Arc::clone(&network), Protocol::Slush.policy(0), 1, 0.5);

    scheduler.run_fixed(1).await?;
    assert_eq!(network.colors().await, vec![Color::B, Color::A]);

    // No memory: the next round swaps them straight back.
    scheduler.run_fixed(1).await?;
    assert_eq!(network.colors().await, vec![Color::A, Color::B]);
    Ok(())
}

#[tokio::test]
async fn test_two_node_snowball_confidence_damps_swap() -> Result<()> {
    let network = Arc::new(lockstep_pair()?);
    let scheduler = RoundScheduler::new(Arc::clone(&network), Protocol::Snowball.policy(4), 1, 0.5);

    scheduler.run_round(&[NodeId(0), NodeId(1)]).await?;
    assert_eq!(network.colors().await, vec![Color::B, Color::A]);

    // Second round: confidence in the old color only ties the new one.
    scheduler.run_round(&[NodeId(0), NodeId(1)]).await?;
    assert_eq!(network.colors().await, vec![Color::B, Color::A]);

    let first = network.node(NodeId(0)).unwrap().snapshot().await;
    assert_eq!(first.confidence(Color::A), 1);
    assert_eq!(first.confidence(Color::B), 1);
    assert_eq!(first.previous_proposal, Color::A);
    assert_eq!(first.consecutive, 0);
    Ok(())
}

#[tokio::test]
async fn test_uncolored_node_does_not_initiate() -> Result<()> {
    let transport = Arc::new(CountingTransport::default());
    let network = Network::builder()
        .node(Color::Uncolored, [1])
        .node(Color::Uncolored, [0])
        .with_transport(transport.clone())
        .build()?;
    let policy = Protocol::Snowball.policy(4);

    network.tick(NodeId(0), 1, 0.5, policy.as_ref()).await;

    assert_eq!(transport.queries.load(Ordering::SeqCst), 0);
    assert_eq!(network.colors().await, vec![Color::Uncolored; 2]);
    Ok(())
}

#[tokio::test]
async fn test_query_bootstraps_uncolored_peer() -> Result<()> {
    let transport = Arc::new(CountingTransport::default());
    let network = Network::builder()
        .node(Color::B, [1, 2])
        .node(Color::Uncolored, [0])
        .node(Color::Uncolored, [0])
        .with_transport(transport.clone())
        .build()?;
    let policy = Protocol::Slush.policy(0);

    network.tick(NodeId(0), 2, 0.7, policy.as_ref()).await;

    assert_eq!(transport.queries.load(Ordering::SeqCst), 2);
    assert_eq!(network.colors().await, vec![Color::B; 3]);

    // Once colored, the adopted nodes take part in rounds themselves.
    network.tick(NodeId(1), 2, 0.7, policy.as_ref()).await;
    assert_eq!(transport.queries.load(Ordering::SeqCst), 3);
    Ok(())
}

#[tokio::test]
async fn test_bootstrapped_node_restarts_snowball_streak() -> Result<()> {
    let network = Network::builder()
        .node(Color::A, [1])
        .node(Color::Uncolored, [0])
        .with_transport(Arc::new(CountingTransport::default()))
        .build()?;
    let policy = Protocol::Snowball.policy(4);

    network.tick(NodeId(0), 1, 1.0, policy.as_ref()).await;
    let adopted = network.node(NodeId(1)).unwrap().snapshot().await;
    assert_eq!(adopted.color, Color::A);
    assert_eq!(adopted.previous_proposal, Color::Uncolored);

    // First quorum after adoption opens the streak instead of extending it.
    network.tick(NodeId(1), 1, 1.0, policy.as_ref()).await;
    let state = network.node(NodeId(1)).unwrap().snapshot().await;
    assert_eq!(state.previous_proposal, Color::A);
    assert_eq!(state.confidence(Color::A), 1);
    assert_eq!(state.consecutive, 0);
    Ok(())
}

#[tokio::test]
async fn test_sample_never_exceeds_k() -> Result<()> {
    let transport = Arc::new(CountingTransport::default());
    let mut builder = Network::builder().node(Color::A, 1..=8);
    for _ in 1..=8 {
        builder = builder.node(Color::A, [0]);
    }
    let network = builder.with_transport(transport.clone()).build()?;
    let policy = Protocol::Snowflake.policy(4);

    network.tick(NodeId(0), 3, 0.7, policy.as_ref()).await;
    assert_eq!(transport.queries.load(Ordering::SeqCst), 3);

    // Fewer peers than k: everyone is asked once.
    network.tick(NodeId(0), 20, 0.7, policy.as_ref()).await;
    assert_eq!(transport.queries.load(Ordering::SeqCst), 3 + 8);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_no_quorum_round_is_a_noop() -> Result<()> {
    for protocol in [Protocol::Slush, Protocol::Snowflake, Protocol::Snowball] {
        let network = Network::builder()
            .node(Color::A, [1, 2])
            .node(Color::A, [0])
            .node(Color::B, [0])
            .build()?;
        let policy = protocol.policy(4);
        let node = network.node(NodeId(0)).unwrap();

        let before = node.snapshot().await;
        // Split one-one with a quorum of two.
        network.tick(NodeId(0), 2, 1.0, policy.as_ref()).await;
        assert_eq!(node.snapshot().await, before, "{} changed state", protocol);
    }
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_timed_out_responses_are_not_counted() -> Result<()> {
    let build = |slow: bool| -> Result<Network> {
        let mut transport = SimulatedTransport::default();
        if slow {
            transport = transport.with_fixed_delay(NodeId(2), Duration::from_millis(200));
        }
        Ok(Network::builder()
            .node(Color::A, [1, 2])
            .node(Color::B, [0])
            .node(Color::B, [0])
            .with_transport(Arc::new(transport))
            .build()?)
    };
    let policy = Protocol::Slush.policy(0);

    // Both answers arrive: two B votes reach the quorum of two.
    let network = build(false)?;
    network.tick(NodeId(0), 2, 1.0, policy.as_ref()).await;
    assert_eq!(network.colors().await[0], Color::B);

    // The slow answer is dropped, leaving one vote.
    let network = build(true)?;
    network.tick(NodeId(0), 2, 1.0, policy.as_ref()).await;
    assert_eq!(network.colors().await[0], Color::A);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_all_queries_timing_out_leaves_state_untouched() -> Result<()> {
    let mut transport = SimulatedTransport::default();
    for id in 1..=5 {
        transport = transport.with_fixed_delay(NodeId(id), Duration::from_secs(1));
    }
    let mut builder = Network::builder().node(Color::A, 1..=5);
    for _ in 1..=5 {
        builder = builder.node(Color::B, [0]);
    }
    let network = builder.with_transport(Arc::new(transport)).build()?;
    let policy = Protocol::Snowball.policy(4);
    let node = network.node(NodeId(0)).unwrap();

    let before = node.snapshot().await;
    network.tick(NodeId(0), 5, 0.7, policy.as_ref()).await;
    assert_eq!(node.snapshot().await, before);
    Ok(())
}
