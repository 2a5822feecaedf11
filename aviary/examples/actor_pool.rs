use std::time::Duration;

use anyhow::Result;
use tracing::info;

use aviary::logging;
use aviary::{
    make_pool, ActorSystem, Address, Behavior, Context, ExitReason, Message, RoutingPolicyKind,
    SpawnError, SysMessage, SystemConfig,
};

const TIMEOUT: Duration = Duration::from_secs(1);

// Worker that squares numbers and tells the caller who did the work
fn spawn_squarer(system: &ActorSystem) -> Result<Address, SpawnError> {
    system.spawn(
        0u64,
        Behavior::new().respond(|handled: &mut u64, _: &mut Context<u64>, n: &u64| {
            *handled += 1;
            Ok(n * n)
        }),
    )
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init_development();

    let system = ActorSystem::new(SystemConfig {
        name: "pool-demo".to_string(),
        ..Default::default()
    })?;
    let mut me = system.scoped_actor();

    // Round-robin pool that grows at runtime
    let pool = make_pool(&system, 3, spawn_squarer, RoutingPolicyKind::RoundRobin)?;
    me.send_message(&pool, Message::Sys(SysMessage::Put(spawn_squarer(&system)?)));

    for n in 1..=8u64 {
        let response = me.request(&pool, n, TIMEOUT).await?;
        info!(n, square = response.value::<u64>()?, worker = %response.sender, "round robin");
    }

    let workers = me
        .request_message(&pool, Message::Sys(SysMessage::Get), TIMEOUT)
        .await?
        .value::<Vec<Address>>()?;
    info!(workers = workers.len(), "pool membership");

    // Kill one worker; the pool notices and keeps serving
    me.monitor(&workers[0]);
    me.send_exit(&workers[0], ExitReason::abnormal("demo crash"));
    if let Some(down) = me.receive_down(TIMEOUT).await {
        info!(worker = %down.source, reason = %down.reason, "worker down");
    }
    let response = me.ask(&pool, 12u64).await?;
    info!(square = response.value::<u64>()?, "still serving");

    // Broadcast pool of round-robin pools: one message, every sub-pool answers
    let fanout = make_pool(
        &system,
        3,
        |system| make_pool(system, 2, spawn_squarer, RoutingPolicyKind::RoundRobin),
        RoutingPolicyKind::Broadcast,
    )?;
    me.send(&fanout, 7u64);
    for _ in 0..3 {
        if let Some(square) = me.receive_value::<u64>(TIMEOUT).await {
            info!(square, "broadcast reply");
        }
    }

    system.shutdown().await?;
    info!(running = system.running_actors(), "done");
    Ok(())
}
