
use std::sync::Arc;
use std::time::Duration;

use quorum_lite::directory::{LocalDirectory, PeerDirectory};
use quorum_lite::election::Role;
use quorum_lite::node::Elector;
use test_harness::{test_config, TestCluster};

/// Three peers, quorum 2: exactly one wins and everyone converges on it.
#[tokio::test]
async fn test_three_node_cluster_elects_single_leader() {
    let cluster = TestCluster::new(3).await;

    let leader = cluster
        .wait_for_leader(Duration::from_secs(5))
        .await
        .expect("Leader should be elected");
    assert!(
        cluster.wait_for_agreement(leader, Duration::from_secs(5)).await,
        "All nodes should agree on the leader"
    );

    let snapshot = cluster.get_node(leader).unwrap().inspect().await.unwrap();
    assert_eq!(snapshot.role, Role::Leader);
    assert_eq!(snapshot.leader, Some(leader));
    assert!(snapshot.term >= 1);
    assert_eq!(cluster.leaders(), vec![leader], "Exactly one leadership flag");
}

/// A single-node cluster satisfies quorum 1 with the self-vote alone.
#[tokio::test]
async fn test_single_node_cluster_elects_itself() {
    let cluster = TestCluster::new(1).await;

    let leader = cluster
        .wait_for_leader(Duration::from_secs(5))
        .await
        .expect("Leader should be elected");
    assert_eq!(leader, 1);

    let snapshot = cluster.get_node(1).unwrap().inspect().await.unwrap();
    assert_eq!(snapshot.role, Role::Leader);
    assert_eq!(snapshot.leader, Some(1));
    assert_eq!(snapshot.cluster_size, 1);
}

/// When the leader leaves the group, the survivors re-elect at a higher term.
#[tokio::test]
async fn test_reelection_after_leader_leaves() {
    let mut cluster = TestCluster::new(3).await;

    let old_leader = cluster
        .wait_for_leader(Duration::from_secs(5))
        .await
        .expect("Leader should be elected");
    assert!(cluster.wait_for_agreement(old_leader, Duration::from_secs(5)).await);
    let old_term = cluster
        .get_node(old_leader)
        .unwrap()
        .inspect()
        .await
        .unwrap()
        .term;

    cluster.stop(old_leader).await;

    let new_leader = cluster
        .wait_for_leader(Duration::from_secs(5))
        .await
        .expect("A new leader should be elected");
    assert_ne!(new_leader, old_leader);

    let snapshot = cluster.get_node(new_leader).unwrap().inspect().await.unwrap();
    assert!(snapshot.term > old_term, "Re-election should advance the term");
}

/// The lock-free leadership flag mirrors the coordinator's role.
#[tokio::test]
async fn test_leadership_flag_matches_snapshot() {
    let cluster = TestCluster::new(3).await;

    let leader = cluster
        .wait_for_leader(Duration::from_secs(5))
        .await
        .expect("Leader should be elected");
    assert!(cluster.wait_for_agreement(leader, Duration::from_secs(5)).await);

    for node in cluster.nodes.values() {
        let snapshot = node.inspect().await.unwrap();
        assert_eq!(
            node.is_leader(),
            snapshot.role == Role::Leader,
            "Flag and role diverge on node {}",
            node.id()
        );
    }
}

/// Subscribers hear about the election outcome.
#[tokio::test]
async fn test_subscriber_notified_on_election() {
    let directory = LocalDirectory::new();
    let (changes_tx, mut changes_rx) = tokio::sync::mpsc::unbounded_channel();
    let mut config = test_config(1, 1);
    config.subscriptions.push(changes_tx);

    let elector = Elector::spawn(config, Arc::clone(&directory) as Arc<dyn PeerDirectory>)
        .await
        .unwrap();

    let change = tokio::time::timeout(Duration::from_secs(5), changes_rx.recv())
        .await
        .expect("Leadership change within timeout")
        .expect("Subscription should stay open");
    assert_eq!(change.leader, Some(1));
    assert!(change.term >= 1);

    elector.shutdown().await;
}

/// A peer joining after the election converges on the existing leader via
/// the debounced leadership reassertion.
#[tokio::test]
async fn test_late_joiner_adopts_leader() {
    let cluster = TestCluster::new(3).await;

    let leader = cluster
        .wait_for_leader(Duration::from_secs(5))
        .await
        .expect("Leader should be elected");
    assert!(cluster.wait_for_agreement(leader, Duration::from_secs(5)).await);

    // Long election timeout so the leader's reassertion lands well before
    // the newcomer's first candidacy.
    let config = test_config(4, 3).with_election_timeout(2000, 3000);
    let newcomer = Elector::spawn(
        config,
        Arc::clone(&cluster.directory) as Arc<dyn PeerDirectory>,
    )
    .await
    .unwrap();

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    let mut adopted = false;
    while tokio::time::Instant::now() < deadline {
        let snapshot = newcomer.inspect().await.unwrap();
        if snapshot.leader == Some(leader) {
            assert_eq!(snapshot.role, Role::Follower);
            adopted = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(adopted, "Late joiner should adopt the established leader");

    newcomer.shutdown().await;
}

/// `LeaderCheck` lets a quiet peer discover the leader on demand.
#[tokio::test]
async fn test_leader_check_round_trip() {
    let cluster = TestCluster::new(3).await;

    let leader = cluster
        .wait_for_leader(Duration::from_secs(5))
        .await
        .expect("Leader should be elected");
    assert!(cluster.wait_for_agreement(leader, Duration::from_secs(5)).await);

    // A peer that never campaigns on its own (long timeouts, no reassertion
    // aimed at it yet) asks a cluster member who leads.
    let config = test_config(4, 3)
        .with_election_timeout(5000, 6000);
    let asker = Elector::spawn(
        config,
        Arc::clone(&cluster.directory) as Arc<dyn PeerDirectory>,
    )
    .await
    .unwrap();

    asker.leader_check(leader).await;

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    let mut learned = false;
    while tokio::time::Instant::now() < deadline {
        let snapshot = asker.inspect().await.unwrap();
        if snapshot.leader == Some(leader) {
            learned = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(learned, "LeaderCheck should surface the current leader");

    asker.shutdown().await;
}

/// A `NewLeader` announcement at a strictly newer term demotes the current
/// leader without any election.
#[tokio::test]
async fn test_newer_term_announcement_demotes_leader() {
    let cluster = TestCluster::new(3).await;

    let leader_id = cluster
        .wait_for_leader(Duration::from_secs(5))
        .await
        .expect("Leader should be elected");
    assert!(cluster.wait_for_agreement(leader_id, Duration::from_secs(5)).await);

    let leader = cluster.get_node(leader_id).unwrap();
    let term = leader.inspect().await.unwrap().term;

    let usurper_id = if leader_id == 1 { 2 } else { 1 };
    let usurper = cluster.get_node(usurper_id).unwrap();
    usurper.new_leader(leader_id, term + 5).await;

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    let mut demoted = false;
    while tokio::time::Instant::now() < deadline {
        if !leader.is_leader() {
            let snapshot = leader.inspect().await.unwrap();
            assert_eq!(snapshot.role, Role::Follower);
            assert_eq!(snapshot.leader, Some(usurper_id));
            assert_eq!(snapshot.term, term + 5);
            demoted = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(demoted, "Strictly newer term must demote the leader");
}
