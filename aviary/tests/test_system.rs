use std::time::Duration;

use anyhow::Result;
use aviary::{
    ActorConfig, ActorSystem, Behavior, Context, ExitMsg, ExitReason, SchedulingMode, SpawnError,
    SystemConfig, SystemError,
};

use test_helpers::{setup_test_system, spawn_adder, wait_all_done, TIMEOUT};

#[derive(Debug, Clone)]
struct WhereAmI;

#[test]
fn system_requires_a_runtime() {
    let result = ActorSystem::new(SystemConfig::default());
    assert!(matches!(result, Err(SystemError::NoRuntime)));
}

#[test]
fn system_can_use_an_explicit_handle() -> Result<()> {
    let runtime = tokio::runtime::Runtime::new()?;
    let system = ActorSystem::with_handle(SystemConfig::default(), runtime.handle().clone());
    let adder = spawn_adder(&system)?;

    let value = runtime.block_on(async {
        let response = system.request(&adder, (2i32, 3i32), TIMEOUT).await?;
        Ok::<i32, anyhow::Error>(response.value::<i32>()?)
    })?;
    assert_eq!(value, 5);
    runtime.block_on(system.shutdown())?;
    Ok(())
}

#[tokio::test]
async fn running_actor_count_tracks_lifecycles() -> Result<()> {
    let system = setup_test_system()?;
    assert_eq!(system.running_actors(), 0);

    let first = spawn_adder(&system)?;
    let second = spawn_adder(&system)?;
    assert_eq!(system.running_actors(), 2);
    assert!(system.is_registered(&first));

    // Scoped actors are not counted.
    let _scoped = system.scoped_actor();
    assert_eq!(system.running_actors(), 2);

    system.send_exit(&first, ExitReason::UserShutdown);
    system.send_exit(&second, ExitReason::Normal);
    wait_all_done(&system).await?;
    assert_eq!(system.running_actors(), 0);
    assert!(!system.is_registered(&first));
    Ok(())
}

#[tokio::test]
async fn shutdown_stops_everything_and_refuses_spawns() -> Result<()> {
    let system = setup_test_system()?;
    for _ in 0..10 {
        spawn_adder(&system)?;
    }
    let pool = aviary::make_pool(&system, 3, spawn_adder, aviary::RoutingPolicyKind::RoundRobin)?;

    system.shutdown().await?;
    assert_eq!(system.running_actors(), 0);
    assert!(!pool.is_alive());
    assert!(system.death_watch().is_empty());

    assert!(matches!(spawn_adder(&system), Err(SpawnError::SystemShutdown)));
    assert!(matches!(system.shutdown().await, Err(SystemError::ShuttingDown)));
    Ok(())
}

#[tokio::test]
async fn shutdown_times_out_on_stubborn_actors() -> Result<()> {
    let system = ActorSystem::new(SystemConfig {
        shutdown_timeout: Duration::from_millis(100),
        ..Default::default()
    })?;
    let stubborn = system.spawn_with_config(
        ActorConfig::named("stubborn").with_trap_exit(true),
        (),
        Behavior::<()>::new().on_exit(|_: &mut (), ctx: &mut Context<()>, exit: &ExitMsg| {
            if exit.reason != ExitReason::UserShutdown {
                ctx.quit(exit.reason.clone());
            }
            Ok(())
        }),
    )?;

    let outcome = system.shutdown().await;
    assert!(matches!(outcome, Err(SystemError::ShutdownTimeout(_))));
    assert!(stubborn.is_alive());

    system.send_exit(&stubborn, ExitReason::abnormal("forced"));
    wait_all_done(&system).await
}

#[tokio::test]
async fn dedicated_thread_actor_runs_on_its_own_thread() -> Result<()> {
    let system = setup_test_system()?;
    let mut scoped = system.scoped_actor();
    let actor = system.spawn_with_config(
        ActorConfig::named("pinned").with_scheduling_mode(SchedulingMode::DedicatedThread),
        (),
        Behavior::<()>::new().respond(|_: &mut (), _: &mut Context<()>, _: &WhereAmI| {
            Ok(std::thread::current().name().map(str::to_string))
        }),
    )?;

    let response = scoped.request(&actor, WhereAmI, TIMEOUT).await?;
    let thread = response.value::<Option<String>>()?.expect("named thread");
    assert!(thread.starts_with("aviary-test-actor-"), "thread was {}", thread);

    scoped.monitor(&actor);
    scoped.send_exit(&actor, ExitReason::UserShutdown);
    scoped.receive_down(TIMEOUT).await.expect("down");
    Ok(())
}

#[tokio::test]
async fn actors_can_spawn_actors() -> Result<()> {
    let system = setup_test_system()?;
    let mut scoped = system.scoped_actor();
    let parent = system.spawn(
        (),
        Behavior::<()>::new().respond(|_: &mut (), ctx: &mut Context<()>, count: &usize| {
            let children = (0..*count)
                .map(|_| spawn_adder(ctx.system()))
                .collect::<Result<Vec<_>, _>>()
                .map_err(aviary::ActorError::handler)?;
            Ok(children)
        }),
    )?;

    let children = scoped
        .request(&parent, 3usize, TIMEOUT)
        .await?
        .value::<Vec<aviary::Address>>()?;
    assert_eq!(children.len(), 3);
    for child in &children {
        let sum = scoped.request(child, (1i32, 2i32), TIMEOUT).await?.value::<i32>()?;
        assert_eq!(sum, 3);
    }
    assert_eq!(system.running_actors(), 4);

    system.shutdown().await?;
    Ok(())
}
