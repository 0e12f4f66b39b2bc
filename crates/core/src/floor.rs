//! Floor-request queue
//!
//! Requests are ordered by the backend-stamped request time so every
//! observer sees the same queue. Rows without a stamp sort last; ties
//! fall back to participant id.

use std::cmp::Ordering;

use crate::models::Participant;

/// Resolve a toggle-or-set request against the current flag
pub fn resolve_request(current: bool, desired: Option<bool>) -> bool {
    desired.unwrap_or(!current)
}

/// One line of the speakers list
#[derive(Debug, Clone, PartialEq)]
pub struct FloorEntry<'a> {
    pub participant: &'a Participant,
    /// 1-based position in the queue
    pub position: usize,
    /// Asking for an aside ("aparte") rather than a full speech
    pub is_intervention: bool,
}

fn queue_order(a: &Participant, b: &Participant) -> Ordering {
    match (a.floor_requested_at, b.floor_requested_at) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
    .then_with(|| a.id.cmp(&b.id))
}

/// Participants currently requesting the floor, in queue order
pub fn floor_queue<'a, I>(participants: I) -> Vec<FloorEntry<'a>>
where
    I: IntoIterator<Item = &'a Participant>,
{
    let mut requesting: Vec<&Participant> = participants
        .into_iter()
        .filter(|p| p.is_requesting_floor)
        .collect();
    requesting.sort_by(|a, b| queue_order(a, b));

    requesting
        .into_iter()
        .enumerate()
        .map(|(i, p)| FloorEntry {
            participant: p,
            position: i + 1,
            is_intervention: p.is_requesting_intervention,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ParticipantId;
    use chrono::{DateTime, Utc};

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap()
    }

    fn member(id: &str) -> Participant {
        Participant::new(ParticipantId::new(id), id.into(), "PV".into(), "Almenara".into())
    }

    #[test]
    fn test_toggle_or_set() {
        assert!(resolve_request(false, None));
        assert!(!resolve_request(true, None));
        assert!(resolve_request(true, Some(true)));
        assert!(!resolve_request(false, Some(false)));
    }

    #[test]
    fn test_queue_follows_request_time() {
        let mut a = member("a");
        let mut b = member("b");
        let mut c = member("c");
        let d = member("d");
        a.set_floor_request(true, at(30));
        b.set_floor_request(true, at(10));
        c.set_floor_request(true, at(20));
        c.is_requesting_intervention = true;

        let roster = vec![a, b, c, d];
        let queue = floor_queue(&roster);
        let ids: Vec<&str> = queue.iter().map(|e| e.participant.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c", "a"]);
        assert_eq!(queue[1].position, 2);
        assert!(queue[1].is_intervention);
    }

    #[test]
    fn test_unstamped_requests_sort_last_by_id() {
        let mut x = member("x");
        x.is_requesting_floor = true;
        let mut m = member("m");
        m.is_requesting_floor = true;
        let mut z = member("z");
        z.set_floor_request(true, at(99));

        let roster = vec![x, z, m];
        let ids: Vec<String> = floor_queue(&roster)
            .iter()
            .map(|e| e.participant.id.to_string())
            .collect();
        assert_eq!(ids, vec!["z", "m", "x"]);
    }
}
