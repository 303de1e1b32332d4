//! Scan debouncer
//!
//! A camera decodes the same physical ticket many times per second. The
//! debouncer turns that stream into at most one intake trigger per
//! presentation, re-arming for the same reference once the cool-down has
//! elapsed since its last trigger.
//!
//! Re-triggering is time-based only: it does not know whether the previous
//! attempt was recorded or rejected as a duplicate.

use std::time::{Duration, Instant};

use super::parser::ParsedTicket;

/// Advisory shown while the camera sees a code that isn't a ticket
pub const UNKNOWN_ADVISORY: &str = "QR unknown";

/// What the scanner last announced to the operator
#[derive(Debug, Clone, PartialEq, Eq)]
enum Announced {
    Nothing,
    Unknown,
    Reference(String),
}

/// Change to the transient advisory line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advisory {
    Show(&'static str),
    Clear,
}

/// Result of feeding one decode event
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DebounceDecision {
    pub advisory: Option<Advisory>,
    /// Ticket to submit now
    pub trigger: Option<ParsedTicket>,
}

#[derive(Debug)]
pub struct ScanDebouncer {
    cooldown: Duration,
    last_announced: Announced,
    last_acted: Option<(String, Instant)>,
}

impl ScanDebouncer {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_announced: Announced::Nothing,
            last_acted: None,
        }
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Feed one decode event observed at `now`
    ///
    /// The acted-on reference and time are recorded before returning, so a
    /// decode arriving while the triggered attempt is still in flight is
    /// suppressed.
    pub fn observe(&mut self, decoded: Option<ParsedTicket>, now: Instant) -> DebounceDecision {
        let mut decision = DebounceDecision::default();

        let ticket = match decoded {
            None => {
                if self.last_announced != Announced::Unknown {
                    self.last_announced = Announced::Unknown;
                    decision.advisory = Some(Advisory::Show(UNKNOWN_ADVISORY));
                }
                return decision;
            }
            Some(ticket) => ticket,
        };

        if !matches!(&self.last_announced, Announced::Reference(r) if *r == ticket.reference) {
            self.last_announced = Announced::Reference(ticket.reference.clone());
            decision.advisory = Some(Advisory::Clear);
        }

        let eligible = match &self.last_acted {
            Some((reference, at)) if *reference == ticket.reference => {
                now.saturating_duration_since(*at) >= self.cooldown
            }
            _ => true,
        };

        if eligible {
            self.last_acted = Some((ticket.reference.clone(), now));
            decision.trigger = Some(ticket);
        }

        decision
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ticket(reference: &str) -> Option<ParsedTicket> {
        Some(ParsedTicket {
            reference: reference.to_string(),
            person_count: 2,
        })
    }

    fn debouncer() -> ScanDebouncer {
        ScanDebouncer::new(Duration::from_millis(2000))
    }

    #[test]
    fn test_burst_within_cooldown_triggers_once() {
        let mut d = debouncer();
        let t0 = Instant::now();

        let triggers = (0..10)
            .filter(|i| {
                d.observe(ticket("AB123"), t0 + Duration::from_millis(i * 50))
                    .trigger
                    .is_some()
            })
            .count();

        assert_eq!(triggers, 1);
    }

    #[test]
    fn test_rearms_after_cooldown() {
        let mut d = debouncer();
        let t0 = Instant::now();

        assert!(d.observe(ticket("AB123"), t0).trigger.is_some());
        assert!(d.observe(ticket("AB123"), t0 + Duration::from_millis(500)).trigger.is_none());
        assert!(d.observe(ticket("AB123"), t0 + Duration::from_millis(2500)).trigger.is_some());
    }

    #[test]
    fn test_cooldown_measured_from_last_trigger() {
        let mut d = debouncer();
        let t0 = Instant::now();

        assert!(d.observe(ticket("AB123"), t0).trigger.is_some());
        assert!(d.observe(ticket("AB123"), t0 + Duration::from_millis(1900)).trigger.is_none());
        // Suppressed events don't extend the window
        assert!(d.observe(ticket("AB123"), t0 + Duration::from_millis(2000)).trigger.is_some());
    }

    #[test]
    fn test_different_reference_triggers_immediately() {
        let mut d = debouncer();
        let t0 = Instant::now();

        assert!(d.observe(ticket("AB123"), t0).trigger.is_some());
        assert!(d.observe(ticket("CD456"), t0 + Duration::from_millis(10)).trigger.is_some());
        // Switching back re-triggers: only the last acted reference is remembered
        assert!(d.observe(ticket("AB123"), t0 + Duration::from_millis(20)).trigger.is_some());
    }

    #[test]
    fn test_unparseable_shows_advisory_once() {
        let mut d = debouncer();
        let t0 = Instant::now();

        let first = d.observe(None, t0);
        assert_eq!(first.advisory, Some(Advisory::Show(UNKNOWN_ADVISORY)));
        assert!(first.trigger.is_none());

        let second = d.observe(None, t0 + Duration::from_millis(10));
        assert_eq!(second, DebounceDecision::default());
    }

    #[test]
    fn test_unparseable_does_not_reset_acted_reference() {
        let mut d = debouncer();
        let t0 = Instant::now();

        assert!(d.observe(ticket("AB123"), t0).trigger.is_some());
        d.observe(None, t0 + Duration::from_millis(100));

        let again = d.observe(ticket("AB123"), t0 + Duration::from_millis(200));
        assert_eq!(again.advisory, Some(Advisory::Clear));
        assert!(again.trigger.is_none());
    }

    #[test]
    fn test_same_reference_does_not_reannounce() {
        let mut d = debouncer();
        let t0 = Instant::now();

        assert_eq!(d.observe(ticket("AB123"), t0).advisory, Some(Advisory::Clear));
        assert_eq!(d.observe(ticket("AB123"), t0 + Duration::from_millis(5)).advisory, None);
    }
}
