//! Queue Desk Demo
//!
//! Walks one branch through a morning at the desk:
//! - Customers register and receive numbers
//! - Staff call by category and by number
//! - Completing a category ticket advances that category's queue
//! - Calling a specific number hands the desk over to it
//! - A no-show, then the day's statistics and metrics
//!
//! # Usage
//!
//! ```bash
//! # In-memory stores
//! cargo run --bin demo
//!
//! # PostgreSQL stores (DATABASE_URL must point at a reachable database)
//! cargo run --bin demo -- --postgres
//! ```

use queue_desk::{Config, Registration, bootstrap};
use queue_desk_core::Purpose;
use queue_desk_runtime::metrics::MetricsServer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env()?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.server.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut metrics = MetricsServer::new(config.metrics_addr()?);
    metrics.start()?;

    let use_postgres = std::env::args().any(|arg| arg == "--postgres");
    let desk = if use_postgres {
        bootstrap::postgres_desk(&config).await?
    } else {
        bootstrap::in_memory_desk(&config)?
    };

    println!("\n============================================");
    println!("   Queue Desk - Live Demo");
    println!("============================================\n");

    // Step 1: registrations
    println!("1. Customers register at MAIN...");
    let customers = [
        ("Ada Lovelace", "0811111111", "SUV", Purpose::TestDrive),
        ("Alan Turing", "0822222222", "SEDAN", Purpose::Purchase),
        ("Grace Hopper", "0833333333", "SUV", Purpose::Service),
        ("Edsger Dijkstra", "0844444444", "SUV", Purpose::Inquiry),
    ];
    for (name, mobile, category, purpose) in customers {
        let ticket = desk
            .register("MAIN", &Registration::new(name, mobile, category).with_purpose(purpose))
            .await?;
        println!("   {} -> {} ({category})", ticket.queue_no, ticket.full_name);
    }

    // Step 2: call by category
    println!("\n2. SUV desk calls next...");
    let serving = desk.call_next_ticket("MAIN", Some("SUV")).await?;
    println!("   Now serving {} ({})", serving.queue_no, serving.full_name);

    match desk.call_next_ticket("MAIN", Some("SUV")).await {
        Err(e) => println!("   Second call on SUV rejected: {e}"),
        Ok(ticket) => println!("   Unexpectedly served {}", ticket.queue_no),
    }

    // Step 3: complete the SUV ticket; the SUV queue advances
    println!("\n3. SUV desk completes {}...", serving.queue_no);
    desk.mark_ticket_done("MAIN", &serving.queue_no.to_string()).await?;
    if let Some(current) = desk.current_serving_ticket("MAIN").await? {
        println!("   SUV queue advanced to {} ({})", current.queue_no, current.full_name);
    }

    // Step 4: call a specific number; whoever is being served is completed
    println!("\n4. Front desk calls A-002 directly...");
    let sedan = desk.call_specific_ticket("MAIN", "A-002").await?;
    println!("   Now serving {} ({})", sedan.queue_no, sedan.category);

    // Step 5: no-show
    println!("\n5. A-004 never showed up...");
    let no_show = desk.mark_ticket_no_show("MAIN", "A-004").await?;
    println!("   {} marked {}", no_show.queue_no, no_show.status);

    // Step 6: the day so far
    println!("\n6. Today at MAIN:");
    let stats = desk.queue_stats("MAIN").await?;
    let counts = desk.queue_statistics("MAIN").await?;
    println!(
        "   Issued {}/{} ({:.2}% full), now serving {}",
        stats.total_generated,
        stats.max_allowed,
        stats.percentage_full,
        stats
            .current_serving
            .map_or_else(|| "-".to_string(), |q| q.to_string())
    );
    println!(
        "   Waiting {}, serving {}, done {}, no-show {}",
        counts.waiting, counts.serving, counts.done, counts.no_show
    );

    if let Some(text) = metrics.render() {
        println!("\n7. Metrics ({}):\n{text}", metrics.addr());
    }

    Ok(())
}
