//! Example: route a wire from a pin to an existing bus and print each step
//!
//! Run with: cargo run --example route_scenario -p routegraph

use routegraph::prelude::*;
use routegraph::OwnerId;

fn main() -> Result<(), RouteGraphError> {
    let mut session = Session::new(&PolicyConfig::manhattan(10.0), EngineOptions::default())?;

    // A component pin and a vertical bus to connect it to
    let owner = OwnerId::new();
    let pin = session
        .engine_mut()
        .apply(&InsertVertex::pin(Point::new(0.0, 0.0), owner, "1"))
        .vertex;
    println!("Placed pin {:?} for {}", pin, owner);

    let events = [
        RouteEvent::tap(0.0, 40.0),
        RouteEvent::tap(60.0, 40.0),
        RouteEvent::Commit,
        RouteEvent::tap(0.0, 0.0),
        RouteEvent::move_to(32.0, 19.0),
        RouteEvent::tap(30.0, 40.0),
    ];

    for event in events {
        let name = event.name();
        let output = session.handle(event);
        println!(
            "{:<10} state={:?} changed={} committed={:?}",
            name,
            session.route_state(),
            output.changed.len(),
            output.committed
        );
        if let Some(preview) = output.preview {
            let points: Vec<String> = preview.iter().map(|p| p.to_string()).collect();
            println!("           preview {}", points.join(" -> "));
        }
    }

    println!("\nFinal graph:");
    for vertex in session.graph().vertices() {
        println!(
            "  {} at {} degree {} {:?}",
            vertex.id,
            vertex.point,
            session.graph().degree(vertex.id),
            vertex.ownership
        );
    }
    for edge in session.graph().edges() {
        println!("  {} {} -> {}", edge.id, edge.start, edge.end);
    }
    println!("Islands: {}", session.graph().islands().len());

    Ok(())
}
