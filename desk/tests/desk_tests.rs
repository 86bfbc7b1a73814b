//! End-to-end tests of the queue desk facade over in-memory stores.

#![allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect

use chrono::Duration;
use queue_desk::{QueueDesk, Registration};
use queue_desk_core::environment::Clock;
use queue_desk_core::{
    BranchConfig, BranchDirectory, Purpose, QueueError, ServeScope, StaticBranchDirectory,
    TicketStatus,
};
use queue_desk_testing::fixtures::directory_with_cap;
use queue_desk_testing::{
    FixedClock, InMemorySequenceStore, InMemoryTicketStore, default_directory, test_clock,
};
use std::sync::Arc;

struct Harness {
    desk: QueueDesk,
    tickets: InMemoryTicketStore,
    sequences: InMemorySequenceStore,
    clock: FixedClock,
}

fn harness_with(directory: impl BranchDirectory + 'static) -> Harness {
    let tickets = InMemoryTicketStore::new();
    let sequences = InMemorySequenceStore::new();
    let clock = test_clock();
    let desk = QueueDesk::new(
        Arc::new(directory),
        Arc::new(tickets.clone()),
        Arc::new(sequences.clone()),
        Arc::new(clock.clone()),
    );
    Harness {
        desk,
        tickets,
        sequences,
        clock,
    }
}

fn harness() -> Harness {
    harness_with(default_directory())
}

fn customer(category: &str) -> Registration {
    Registration::new("Test Customer", "0800000000", category)
}

#[tokio::test]
async fn registration_stores_a_waiting_ticket() {
    let h = harness();

    let ticket = h
        .desk
        .register(
            "main",
            &Registration::new(" Ada ", "0812", " SUV ").with_purpose(Purpose::Purchase),
        )
        .await
        .unwrap();

    assert_eq!(ticket.queue_no.to_string(), "A-001");
    assert_eq!(ticket.branch.as_str(), "MAIN");
    assert_eq!(ticket.date_key.to_string(), "2025-01-01");
    assert_eq!(ticket.status, TicketStatus::Waiting);
    assert_eq!(ticket.full_name, "Ada");
    assert_eq!(ticket.category, "SUV");
    assert_eq!(ticket.purpose, Purpose::Purchase);
    assert_eq!(h.tickets.len(), 1);
}

#[tokio::test]
async fn invalid_registration_consumes_no_number() {
    let h = harness();

    let err = h.desk.register("MAIN", &customer("  ")).await.unwrap_err();
    assert!(matches!(err, QueueError::InvalidRegistration(_)));
    assert!(h.sequences.is_empty());
    assert!(h.tickets.is_empty());

    let err = h.desk.register("WEST", &customer("SUV")).await.unwrap_err();
    assert_eq!(err, QueueError::InvalidBranch("WEST".to_string()));
    assert!(h.tickets.is_empty());
}

#[tokio::test]
async fn full_queue_rejects_registration() {
    let h = harness_with(directory_with_cap(2));

    h.desk.register("MAIN", &customer("SUV")).await.unwrap();
    h.desk.register("MAIN", &customer("SUV")).await.unwrap();
    let err = h.desk.register("MAIN", &customer("SUV")).await.unwrap_err();

    assert_eq!(err.code(), "QUEUE_FULL");
    assert_eq!(h.tickets.len(), 2);

    let stats = h.desk.queue_stats("MAIN").await.unwrap();
    assert_eq!(stats.total_generated, 2);
    assert_eq!(stats.remaining, 0);
    assert!((stats.percentage_full - 100.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn blank_category_calls_across_the_branch() {
    let h = harness();
    h.desk.register("MAIN", &customer("SUV")).await.unwrap();
    h.desk.register("MAIN", &customer("SEDAN")).await.unwrap();

    let first = h.desk.call_next_ticket("MAIN", Some("   ")).await.unwrap();
    assert_eq!(first.queue_no.to_string(), "A-001");
    assert_eq!(first.serve_scope, Some(ServeScope::Branch));

    let second = h.desk.call_next_ticket("MAIN", None).await.unwrap();
    assert_eq!(second.queue_no.to_string(), "A-002");

    assert_eq!(
        h.desk.call_next_ticket("MAIN", None).await.unwrap_err(),
        QueueError::NoTicketsInQueue
    );
}

#[tokio::test]
async fn a_morning_at_the_desk() {
    let h = harness();
    for category in ["SUV", "SEDAN", "SUV", "SUV"] {
        h.desk.register("MAIN", &customer(category)).await.unwrap();
    }

    let a1 = h.desk.call_next_ticket("MAIN", Some("SUV")).await.unwrap();
    assert_eq!(a1.queue_no.to_string(), "A-001");
    assert!(matches!(
        h.desk.call_next_ticket("MAIN", Some("SUV")).await,
        Err(QueueError::AlreadyServing { .. })
    ));

    h.clock.advance(Duration::minutes(10));
    let done = h.desk.mark_ticket_done("MAIN", "A-001").await.unwrap();
    assert_eq!(done.status, TicketStatus::Done);
    assert_eq!(done.completed_at, Some(h.clock.now()));

    let advanced = h.desk.current_serving_ticket("MAIN").await.unwrap().unwrap();
    assert_eq!(advanced.queue_no.to_string(), "A-003");

    let a2 = h.desk.call_specific_ticket("MAIN", "A-002").await.unwrap();
    assert_eq!(a2.status, TicketStatus::Serving);

    let current = h.desk.current_serving_ticket("MAIN").await.unwrap().unwrap();
    assert_eq!(current.queue_no.to_string(), "A-002");
    let state = h.desk.queue_state("MAIN").await.unwrap();
    assert_eq!(state.current_serving.unwrap().to_string(), "A-002");
    assert_eq!(state.next_queue_no.unwrap().to_string(), "A-005");

    let no_show = h.desk.mark_ticket_no_show("MAIN", "A-004").await.unwrap();
    assert_eq!(no_show.status, TicketStatus::NoShow);

    let err = h.desk.mark_ticket_done("MAIN", "A-004").await.unwrap_err();
    assert_eq!(
        err,
        QueueError::InvalidTransition {
            from: TicketStatus::NoShow,
            to: TicketStatus::Done
        }
    );

    let counts = h.desk.queue_statistics("MAIN").await.unwrap();
    assert_eq!(counts.waiting, 0);
    assert_eq!(counts.serving, 1);
    assert_eq!(counts.done, 2);
    assert_eq!(counts.no_show, 1);
    assert_eq!(counts.total, 4);
}

#[tokio::test]
async fn numbers_restart_on_a_new_day() {
    let h = harness();
    h.desk.register("MAIN", &customer("SUV")).await.unwrap();
    h.desk.register("MAIN", &customer("SUV")).await.unwrap();

    h.clock.advance(Duration::days(1));

    let ticket = h.desk.register("MAIN", &customer("SUV")).await.unwrap();
    assert_eq!(ticket.queue_no.to_string(), "A-001");
    assert_eq!(ticket.date_key.to_string(), "2025-01-02");

    // Yesterday's A-002 is out of scope today.
    assert_eq!(
        h.desk.call_specific_ticket("MAIN", "A-002").await.unwrap_err(),
        QueueError::TicketNotFound("A-002".to_string())
    );

    let called = h.desk.call_next_ticket("MAIN", None).await.unwrap();
    assert_eq!(called.id, ticket.id);
}

#[tokio::test]
async fn branch_offset_decides_the_operating_day() {
    let east = BranchConfig::new("EAST".parse().unwrap(), "East", "E".parse().unwrap())
        .with_utc_offset_minutes(14 * 60);
    let h = harness_with(StaticBranchDirectory::new(vec![east], 999).unwrap());

    // 19:00 UTC on 2025-01-01 is 09:00 on 2025-01-02 at UTC+14.
    h.clock.advance(Duration::hours(10));
    let ticket = h.desk.register("EAST", &customer("SUV")).await.unwrap();
    assert_eq!(ticket.queue_no.to_string(), "E-001");
    assert_eq!(ticket.date_key.to_string(), "2025-01-02");
}

#[tokio::test]
async fn reset_restarts_the_counter() {
    let h = harness();
    h.desk.allocate_queue_number("MAIN").await.unwrap();
    h.desk.allocate_queue_number("MAIN").await.unwrap();

    let record = h.desk.reset_queue("MAIN").await.unwrap();
    assert_eq!(record.last_number, 0);
    assert_eq!(h.desk.allocate_queue_number("MAIN").await.unwrap().to_string(), "A-001");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_registrations_get_distinct_numbers() {
    let h = harness();

    let registrations = (0..25).map(|i| {
        let desk = h.desk.clone();
        async move {
            desk.register("MAIN", &Registration::new(format!("Customer {i}"), "0800000000", "SUV"))
                .await
        }
    });
    let tickets: Vec<_> = futures::future::join_all(registrations)
        .await
        .into_iter()
        .collect::<Result<_, _>>()
        .unwrap();

    let mut numbers: Vec<u32> = tickets.iter().map(|t| t.queue_no.number()).collect();
    numbers.sort_unstable();
    assert_eq!(numbers, (1..=25).collect::<Vec<u32>>());
    assert_eq!(h.tickets.len(), 25);
}
