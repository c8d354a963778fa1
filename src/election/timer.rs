use std::time::Duration;

use rand::Rng;
use tokio::sync::mpsc;

use crate::election::coordinator::Message;

/// Generates a random election delay within the configured range.
///
/// The jitter desynchronizes peers that would otherwise start candidacies in
/// lockstep, reducing the odds of a split vote.
pub fn random_election_delay(min_ms: u64, max_ms: u64) -> Duration {
    let mut rng = rand::thread_rng();
    Duration::from_millis(rng.gen_range(min_ms..=max_ms))
}

/// Deliver `msg` to the coordinator's own mailbox after `delay`.
///
/// Timers are never cancelled. Superseded timers still fire and are filtered
/// by the role/term re-validation in the handlers, so a stale firing is a
/// no-op.
pub fn schedule(tx: mpsc::Sender<Message>, delay: Duration, msg: Message) {
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        let _ = tx.send(msg).await;
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_stays_within_range() {
        for _ in 0..100 {
            let delay = random_election_delay(150, 300);
            assert!(delay >= Duration::from_millis(150));
            assert!(delay <= Duration::from_millis(300));
        }
    }

    #[test]
    fn degenerate_range_is_allowed() {
        let delay = random_election_delay(50, 50);
        assert_eq!(delay, Duration::from_millis(50));
    }

    #[tokio::test]
    async fn schedule_delivers_after_delay() {
        let (tx, mut rx) = mpsc::channel(1);
        schedule(tx, Duration::from_millis(10), Message::AssertLeader);

        let msg = tokio::time::timeout(Duration::from_millis(200), rx.recv())
            .await
            .expect("Timer should fire")
            .expect("Channel should stay open");
        assert!(matches!(msg, Message::AssertLeader));
    }
}
