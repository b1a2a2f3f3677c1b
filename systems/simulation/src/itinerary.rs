//! Minimal stand-in for the strategic and tactical decision layers.
//!
//! An itinerary is an ordered list of stops. The strategic update hands out the
//! next stop as a goal; the tactical update notices arrival, dwells (standing
//! or seated) and then releases the agent to the next stop.

use std::time::Duration;

use terminal_crowd_core::{ActivityHints, ChairId, Position};

/// One planned activity.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ItineraryStop {
    /// Where the activity takes place.
    pub position: Position,
    /// How long the agent stays once there.
    pub dwell: Duration,
    /// Chair to sit on while dwelling.
    pub chair: Option<ChairId>,
    /// Whether the activity is a checkpoint screening.
    pub screening: bool,
}

impl ItineraryStop {
    /// Creates a standing stop with the given dwell time.
    #[must_use]
    pub const fn new(position: Position, dwell: Duration) -> Self {
        Self {
            position,
            dwell,
            chair: None,
            screening: false,
        }
    }

    /// Sits on `chair` while dwelling.
    #[must_use]
    pub fn seated_on(mut self, chair: ChairId) -> Self {
        self.chair = Some(chair);
        self
    }

    /// Marks the stop as a checkpoint screening.
    #[must_use]
    pub fn screening(mut self) -> Self {
        self.screening = true;
        self
    }
}

/// Instruction from the plan to the agent's navigation and movement.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PlanOrder {
    /// Head for the position.
    Walk(Position),
    /// Hold still for the duration.
    Dwell(Duration),
    /// Sit on the chair.
    Sit(ChairId),
    /// Leave the chair.
    Stand,
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Phase {
    Pending,
    Walking,
    Dwelling { remaining: Duration },
    Finished,
}

/// Ordered stops visited one after another.
#[derive(Clone, Debug, PartialEq)]
pub struct Itinerary {
    stops: Vec<ItineraryStop>,
    current: usize,
    phase: Phase,
}

impl Itinerary {
    /// Creates an itinerary starting at the first stop.
    #[must_use]
    pub fn new(stops: Vec<ItineraryStop>) -> Self {
        let phase = if stops.is_empty() {
            Phase::Finished
        } else {
            Phase::Pending
        };
        Self {
            stops,
            current: 0,
            phase,
        }
    }

    /// All stops, in visiting order.
    #[must_use]
    pub fn stops(&self) -> &[ItineraryStop] {
        &self.stops
    }

    /// Stop currently being walked to or dwelt at.
    #[must_use]
    pub fn current_stop(&self) -> Option<&ItineraryStop> {
        if self.phase == Phase::Finished {
            return None;
        }
        self.stops.get(self.current)
    }

    /// Reports whether every stop has been visited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.phase == Phase::Finished
    }

    /// Chooses the next destination once the previous activity has ended.
    pub fn strategic_update(&mut self) -> Option<PlanOrder> {
        if self.phase != Phase::Pending {
            return None;
        }
        let stop = self.stops.get(self.current)?;
        self.phase = Phase::Walking;
        Some(PlanOrder::Walk(stop.position))
    }

    /// Reacts to arrival and counts dwell time down.
    pub fn tactical_update(&mut self, dt: Duration, reached_goal: bool) -> Option<PlanOrder> {
        match self.phase {
            Phase::Walking if reached_goal => {
                let stop = *self.stops.get(self.current)?;
                if let Some(chair) = stop.chair {
                    self.phase = Phase::Dwelling {
                        remaining: stop.dwell,
                    };
                    return Some(PlanOrder::Sit(chair));
                }
                if stop.dwell.is_zero() {
                    self.advance();
                    return None;
                }
                self.phase = Phase::Dwelling {
                    remaining: stop.dwell,
                };
                Some(PlanOrder::Dwell(stop.dwell))
            }
            Phase::Dwelling { remaining } => {
                let remaining = remaining.saturating_sub(dt);
                if !remaining.is_zero() {
                    self.phase = Phase::Dwelling { remaining };
                    return None;
                }
                let seated = self
                    .stops
                    .get(self.current)
                    .is_some_and(|stop| stop.chair.is_some());
                self.advance();
                seated.then_some(PlanOrder::Stand)
            }
            _ => None,
        }
    }

    fn advance(&mut self) {
        self.current += 1;
        self.phase = if self.current < self.stops.len() {
            Phase::Pending
        } else {
            Phase::Finished
        };
    }
}

impl ActivityHints for Itinerary {
    fn has_blocking_activity(&self) -> bool {
        matches!(self.phase, Phase::Dwelling { .. })
    }

    /// Idle whenever no dwell is running, including between stops.
    fn is_idle(&self) -> bool {
        !matches!(self.phase, Phase::Dwelling { .. })
    }

    fn next_activity_position(&self) -> Option<Position> {
        self.current_stop().map(|stop| stop.position)
    }

    fn is_screening(&self) -> bool {
        self.current_stop().is_some_and(|stop| stop.screening)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TICK: Duration = Duration::from_millis(100);

    #[test]
    fn walks_dwells_and_moves_on() {
        let first = Position::new(1.0, 1.0);
        let second = Position::new(5.0, 1.0);
        let mut plan = Itinerary::new(vec![
            ItineraryStop::new(first, Duration::from_millis(200)),
            ItineraryStop::new(second, Duration::ZERO),
        ]);

        assert_eq!(plan.strategic_update(), Some(PlanOrder::Walk(first)));
        assert_eq!(plan.strategic_update(), None);
        assert_eq!(plan.tactical_update(TICK, false), None);

        assert_eq!(
            plan.tactical_update(TICK, true),
            Some(PlanOrder::Dwell(Duration::from_millis(200)))
        );
        assert!(plan.has_blocking_activity());
        assert!(!plan.is_idle());
        assert_eq!(plan.tactical_update(TICK, true), None);
        assert_eq!(plan.tactical_update(TICK, true), None);
        assert!(!plan.has_blocking_activity());
        assert!(plan.is_idle());
        assert_eq!(plan.next_activity_position(), Some(second));

        assert_eq!(plan.strategic_update(), Some(PlanOrder::Walk(second)));
        assert_eq!(plan.tactical_update(TICK, true), None);
        assert!(plan.is_finished());
        assert!(plan.is_idle());
        assert_eq!(plan.next_activity_position(), None);
    }

    #[test]
    fn seated_stops_sit_then_stand() {
        let chair = ChairId::new(2);
        let mut plan = Itinerary::new(vec![ItineraryStop::new(
            Position::new(3.0, 3.0),
            TICK,
        )
        .seated_on(chair)]);

        let _ = plan.strategic_update();
        assert_eq!(plan.tactical_update(TICK, true), Some(PlanOrder::Sit(chair)));
        assert_eq!(plan.tactical_update(TICK, true), Some(PlanOrder::Stand));
        assert!(plan.is_finished());
    }

    #[test]
    fn screening_flag_follows_the_current_stop() {
        let mut plan = Itinerary::new(vec![
            ItineraryStop::new(Position::new(1.0, 0.0), Duration::ZERO).screening(),
            ItineraryStop::new(Position::new(2.0, 0.0), Duration::ZERO),
        ]);
        assert!(plan.is_screening());
        let _ = plan.strategic_update();
        let _ = plan.tactical_update(TICK, true);
        assert!(!plan.is_screening());
    }

    #[test]
    fn walking_without_a_dwell_points_at_the_stop() {
        let stop = Position::new(4.0, 2.0);
        let mut plan = Itinerary::new(vec![ItineraryStop::new(stop, TICK)]);

        assert!(plan.is_idle());
        assert_eq!(plan.next_activity_position(), Some(stop));
        let _ = plan.strategic_update();
        assert!(plan.is_idle());
        assert_eq!(plan.next_activity_position(), Some(stop));
    }

    #[test]
    fn empty_itinerary_is_idle() {
        let mut plan = Itinerary::new(Vec::new());
        assert!(plan.is_idle());
        assert_eq!(plan.strategic_update(), None);
    }
}
