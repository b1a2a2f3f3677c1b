use std::{sync::Arc, time::Duration};

use terminal_crowd_core::{AgentId, ChairId, ConfigurationError, MapId, Polygon, Position, StopOrder};
use terminal_crowd_system_movement::MovementKind;
use terminal_crowd_system_navigation::Escalation;
use terminal_crowd_system_simulation::{
    apply, query, AgentSpec, Command, Event, Itinerary, ItineraryStop, ScenarioConfig, Settings,
    Simulation,
};
use terminal_crowd_world::{Chair, TerminalMap};

const TICK: Duration = Duration::from_millis(100);

fn wall() -> Polygon {
    Polygon::rectangle(Position::new(4.8, 0.0), Position::new(5.2, 8.0))
}

fn terminal() -> Arc<TerminalMap> {
    let map = TerminalMap::new(MapId::new(1), 10.0, 10.0)
        .expect("map")
        .with_obstacle(wall())
        .with_chair(Chair::new(
            ChairId::new(1),
            Polygon::rectangle(Position::new(8.2, 9.0), Position::new(8.8, 9.6)),
        ));
    Arc::new(map)
}

fn simulation() -> Simulation {
    Simulation::new(terminal(), &Settings::default()).expect("simulation")
}

fn run(simulation: &mut Simulation, ticks: usize, events: &mut Vec<Event>) {
    for _ in 0..ticks {
        apply(simulation, Command::Tick { dt: TICK }, events);
    }
}

fn idle(position: Position) -> AgentSpec {
    AgentSpec::passenger(position, Itinerary::new(Vec::new()))
}

#[test]
fn itinerary_walks_around_the_wall_dwells_and_sits() {
    let mut simulation = simulation();
    let first_stop = Position::new(8.5, 5.0);
    let seat_stop = Position::new(8.5, 8.7);
    let spec = AgentSpec {
        movement: MovementKind::Basic,
        ..AgentSpec::passenger(
            Position::new(1.0, 5.0),
            Itinerary::new(vec![
                ItineraryStop::new(first_stop, Duration::from_millis(500)),
                ItineraryStop::new(seat_stop, Duration::from_secs(1)).seated_on(ChairId::new(1)),
            ]),
        )
    };
    let mut events = Vec::new();
    apply(&mut simulation, Command::SpawnAgent { spec }, &mut events);
    let agent = AgentId::new(0);

    for _ in 0..400 {
        apply(&mut simulation, Command::Tick { dt: TICK }, &mut events);
        let position = simulation.agent(agent).expect("agent").position();
        assert!(!wall().contains(position), "walked into the wall at {position:?}");
    }

    let milestones: Vec<&Event> = events
        .iter()
        .filter(|event| !matches!(event, Event::TimeAdvanced { .. }))
        .collect();
    assert!(matches!(milestones[0], Event::AgentSpawned { .. }));
    assert!(matches!(
        milestones[1],
        Event::GoalAssigned { goal, waypoints, .. } if *goal == first_stop && *waypoints > 1
    ));
    assert!(matches!(milestones[2], Event::GoalReached { .. }));
    assert!(matches!(
        milestones[3],
        Event::StopOrderIssued { order: StopOrder::StoppedFor(duration), .. }
            if *duration == Duration::from_millis(500)
    ));
    assert!(matches!(
        milestones[4],
        Event::GoalAssigned { goal, waypoints: 1, .. } if *goal == seat_stop
    ));
    assert!(matches!(milestones[5], Event::GoalReached { .. }));
    assert_eq!(
        milestones[6],
        &Event::AgentSeated {
            agent,
            chair: ChairId::new(1)
        }
    );
    assert_eq!(
        milestones[7],
        &Event::AgentStood {
            agent,
            chair: ChairId::new(1)
        }
    );
    assert_eq!(milestones.len(), 8);

    let walker = simulation.agent(agent).expect("agent");
    assert!(walker.itinerary().is_finished());
    assert!(!walker.movement().is_seated());
    assert!(walker.position().distance(Position::new(8.5, 9.3)) < 1e-9);

    let summary = query::summary(&simulation);
    assert_eq!(summary.goals_reached, 2);
    assert_eq!(summary.escalations(), 0);
    assert_eq!(summary.ticks, 400);
}

#[test]
fn seated_agents_stay_pinned_to_the_chair() {
    let mut simulation = simulation();
    let mut events = Vec::new();
    apply(
        &mut simulation,
        Command::SpawnAgent {
            spec: idle(Position::new(7.0, 9.0)),
        },
        &mut events,
    );
    let agent = AgentId::new(0);
    apply(
        &mut simulation,
        Command::Sit {
            agent,
            chair: ChairId::new(1),
        },
        &mut events,
    );
    apply(
        &mut simulation,
        Command::SetGoal {
            agent,
            goal: Position::new(1.0, 9.0),
        },
        &mut events,
    );
    run(&mut simulation, 30, &mut events);

    let seated = simulation.agent(agent).expect("agent");
    assert!(seated.position().distance(Position::new(8.5, 9.3)) < 1e-9);
    assert_eq!(seated.navigation().stuck_detector().elapsed(), Duration::ZERO);
    assert_eq!(query::summary(&simulation).seated_agents, 1);

    apply(&mut simulation, Command::Stand { agent }, &mut events);
    run(&mut simulation, 5, &mut events);
    let walking = simulation.agent(agent).expect("agent");
    assert!(walking.position().x() < 8.5);
    assert!(events.contains(&Event::AgentStood {
        agent,
        chair: ChairId::new(1)
    }));
}

#[test]
fn overlapping_agents_push_apart_on_the_first_tick() {
    let mut simulation = simulation();
    let mut events = Vec::new();
    for position in [Position::new(2.0, 5.0), Position::new(2.3, 5.0)] {
        apply(
            &mut simulation,
            Command::SpawnAgent {
                spec: idle(position),
            },
            &mut events,
        );
    }
    run(&mut simulation, 1, &mut events);

    let snapshots = query::agent_snapshots(&simulation);
    assert!(snapshots[0].position.x() < 2.0);
    assert!(snapshots[1].position.x() > 2.3);
    assert!(snapshots[0].velocity.x() < 0.0 && snapshots[1].velocity.x() > 0.0);
}

#[test]
fn stop_orders_hold_an_agent_in_place() {
    let mut simulation = simulation();
    let mut events = Vec::new();
    apply(
        &mut simulation,
        Command::SpawnAgent {
            spec: idle(Position::new(1.0, 9.0)),
        },
        &mut events,
    );
    let agent = AgentId::new(0);
    apply(
        &mut simulation,
        Command::SetGoal {
            agent,
            goal: Position::new(4.0, 9.0),
        },
        &mut events,
    );
    apply(
        &mut simulation,
        Command::IssueStopOrder {
            agent,
            order: StopOrder::StoppedIndefinitely,
        },
        &mut events,
    );
    run(&mut simulation, 300, &mut events);

    let snapshot = simulation.agent(agent).expect("agent").snapshot();
    assert_eq!(snapshot.position, Position::new(1.0, 9.0));
    assert_eq!(snapshot.goal, Some(Position::new(4.0, 9.0)));
    assert!(!events
        .iter()
        .any(|event| matches!(event, Event::StuckEscalated { .. })));

    apply(
        &mut simulation,
        Command::IssueStopOrder {
            agent,
            order: StopOrder::NotStopped,
        },
        &mut events,
    );
    run(&mut simulation, 120, &mut events);
    assert!(simulation.agent(agent).expect("agent").navigation().reached_goal());
    assert!(events
        .iter()
        .any(|event| matches!(event, Event::GoalReached { agent: reached, .. } if *reached == agent)));
}

#[test]
fn unknown_targets_are_rejected() {
    let mut simulation = simulation();
    let mut events = Vec::new();

    apply(
        &mut simulation,
        Command::SetGoal {
            agent: AgentId::new(42),
            goal: Position::new(1.0, 1.0),
        },
        &mut events,
    );
    apply(
        &mut simulation,
        Command::SpawnAgent {
            spec: idle(Position::new(1.0, 1.0)),
        },
        &mut events,
    );
    apply(
        &mut simulation,
        Command::Sit {
            agent: AgentId::new(0),
            chair: ChairId::new(7),
        },
        &mut events,
    );
    apply(
        &mut simulation,
        Command::SpawnAgent {
            spec: AgentSpec {
                radius: 0.0,
                ..idle(Position::new(2.0, 2.0))
            },
        },
        &mut events,
    );
    apply(
        &mut simulation,
        Command::SpawnAgent {
            spec: AgentSpec {
                desired_speed: -1.0,
                ..idle(Position::new(2.0, 2.0))
            },
        },
        &mut events,
    );

    assert_eq!(
        events,
        vec![
            Event::CommandRejected {
                reason: ConfigurationError::UnknownAgent(42)
            },
            Event::AgentSpawned {
                agent: AgentId::new(0),
                position: Position::new(1.0, 1.0),
            },
            Event::CommandRejected {
                reason: ConfigurationError::UnknownChair(7)
            },
            Event::CommandRejected {
                reason: ConfigurationError::InvalidParameter {
                    name: "radius",
                    value: 0.0
                }
            },
            Event::CommandRejected {
                reason: ConfigurationError::NegativeDesiredSpeed(-1.0)
            },
        ]
    );
    assert_eq!(simulation.agents().len(), 1);
}

#[test]
fn removed_agents_leave_the_update_order() {
    let mut simulation = simulation();
    let mut events = Vec::new();
    for x in [1.0, 2.0, 3.0] {
        apply(
            &mut simulation,
            Command::SpawnAgent {
                spec: idle(Position::new(x, 9.0)),
            },
            &mut events,
        );
    }
    apply(
        &mut simulation,
        Command::RemoveAgent {
            agent: AgentId::new(1),
        },
        &mut events,
    );
    apply(
        &mut simulation,
        Command::SpawnAgent {
            spec: idle(Position::new(4.0, 9.0)),
        },
        &mut events,
    );

    let ids: Vec<u32> = simulation.agents().iter().map(|agent| agent.id().get()).collect();
    assert_eq!(ids, vec![0, 2, 3]);
    assert!(events.contains(&Event::AgentRemoved {
        agent: AgentId::new(1)
    }));
}

#[test]
fn short_term_goals_are_visited_before_the_final_goal() {
    let mut simulation = simulation();
    let mut events = Vec::new();
    apply(
        &mut simulation,
        Command::SpawnAgent {
            spec: idle(Position::new(1.0, 9.0)),
        },
        &mut events,
    );
    let agent = AgentId::new(0);
    apply(
        &mut simulation,
        Command::SetGoal {
            agent,
            goal: Position::new(4.0, 9.0),
        },
        &mut events,
    );
    apply(
        &mut simulation,
        Command::SetShortTermGoals {
            agent,
            waypoints: vec![Position::new(2.0, 8.5)],
        },
        &mut events,
    );

    let navigation = simulation.agent(agent).expect("agent").navigation();
    assert_eq!(navigation.goal_position(), Some(Position::new(2.0, 8.5)));
    assert_eq!(navigation.final_goal(), Some(Position::new(4.0, 9.0)));
    assert_eq!(
        events.last(),
        Some(&Event::ShortTermGoalsAssigned {
            agent,
            waypoints: 2
        })
    );
}

const REPLAY: &str = r#"
    [simulation]
    seed = 17

    [map]
    width = 12.0
    height = 10.0

    [[map.obstacles]]
    vertices = [[5.8, 0.0], [6.2, 0.0], [6.2, 7.0], [5.8, 7.0]]

    [[map.queue_areas]]
    vertices = [[0.0, 0.0], [4.0, 0.0], [4.0, 2.0], [0.0, 2.0]]
    entrance = [0.5, 1.0]
    exit = [3.5, 1.0]

    [[agents]]
    position = [1.0, 4.0]
    [[agents.itinerary]]
    position = [10.0, 4.0]
    dwell_secs = 1.0

    [[agents]]
    position = [1.2, 5.0]
    [[agents.itinerary]]
    position = [10.5, 5.0]

    [[agents]]
    position = [10.0, 2.0]
    [[agents.itinerary]]
    position = [1.0, 5.0]

    [[agents]]
    position = [3.0, 8.0]
    movement = "random"
    desired_speed = 0.5

    [[agents]]
    role = "operator"
    position = [8.0, 8.0]
    movement = "static"
"#;

fn replay() -> (Vec<Event>, Vec<terminal_crowd_system_simulation::AgentSnapshot>) {
    let mut simulation = ScenarioConfig::from_toml(REPLAY)
        .expect("parse")
        .build()
        .expect("build");
    let mut events = Vec::new();
    run(&mut simulation, 300, &mut events);
    (events, query::agent_snapshots(&simulation))
}

#[test]
fn replaying_a_scenario_is_bit_identical() {
    let (first_events, first_agents) = replay();
    let (second_events, second_agents) = replay();

    assert_eq!(first_agents.len(), 5);
    assert_eq!(first_events, second_events);
    assert_eq!(first_agents, second_agents);
    assert!(first_events
        .iter()
        .any(|event| matches!(event, Event::GoalAssigned { .. })));
}

#[test]
fn escalations_are_reported_as_events() {
    let map = TerminalMap::new(MapId::new(3), 10.0, 10.0)
        .expect("map")
        .with_obstacle(Polygon::rectangle(
            Position::new(3.0, 3.0),
            Position::new(3.4, 7.0),
        ));
    let mut simulation = Simulation::new(Arc::new(map), &Settings::default()).expect("simulation");
    let mut events = Vec::new();
    let spec = AgentSpec {
        movement: MovementKind::Static,
        ..idle(Position::new(1.0, 5.0))
    };
    apply(&mut simulation, Command::SpawnAgent { spec }, &mut events);
    apply(
        &mut simulation,
        Command::SetGoal {
            agent: AgentId::new(0),
            goal: Position::new(8.0, 5.0),
        },
        &mut events,
    );
    run(&mut simulation, 205, &mut events);

    let escalation = events.iter().find_map(|event| match event {
        Event::StuckEscalated { escalation, .. } => Some(*escalation),
        _ => None,
    });
    assert!(matches!(
        escalation,
        Some(Escalation::Replanned { goal, .. }) if goal == Position::new(8.0, 5.0)
    ));
    assert_eq!(query::summary(&simulation).replans, 1);
}

#[test]
fn idle_stuck_agent_is_sent_to_its_next_activity() {
    let map = TerminalMap::new(MapId::new(4), 10.0, 10.0)
        .expect("map")
        .with_obstacle(Polygon::rectangle(
            Position::new(3.0, 3.0),
            Position::new(3.4, 7.0),
        ));
    let mut simulation = Simulation::new(Arc::new(map), &Settings::default()).expect("simulation");
    let stop = Position::new(8.0, 5.0);
    let spec = AgentSpec {
        movement: MovementKind::Static,
        ..AgentSpec::passenger(
            Position::new(1.0, 5.0),
            Itinerary::new(vec![ItineraryStop::new(stop, Duration::from_secs(1))]),
        )
    };
    let agent = AgentId::new(0);
    let mut events = Vec::new();
    apply(&mut simulation, Command::SpawnAgent { spec }, &mut events);
    run(&mut simulation, 1, &mut events);
    apply(
        &mut simulation,
        Command::SetGoal {
            agent,
            goal: Position::NONE,
        },
        &mut events,
    );
    assert!(simulation
        .agent(agent)
        .expect("agent")
        .navigation()
        .goal_positions()
        .next()
        .is_none());

    run(&mut simulation, 205, &mut events);

    let escalation = events.iter().find_map(|event| match event {
        Event::StuckEscalated { escalation, .. } => Some(*escalation),
        _ => None,
    });
    assert_eq!(escalation, Some(Escalation::NextActivity { target: stop }));
    let summary = query::summary(&simulation);
    assert_eq!(summary.next_activity, 1);
    assert_eq!(summary.replans, 0);
}
