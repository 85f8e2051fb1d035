//! Integration tests for module lifecycle: init/launch idempotence, the
//! readiness gate, and launch failure isolation.

mod common;

use cmdispatch::{handler, Command, Dispatcher, Event, Module};
use common::{base_config, guild_message, test_dispatcher};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

async fn ready(client: &Arc<Dispatcher>) {
    client.handle_event(Event::Ready).await;
}

#[tokio::test]
async fn test_not_ready_module_blocks_without_affecting_others() {
    let (client, transport) = test_dispatcher(base_config());

    let fast = Module::new("fast");
    fast.register(Command::build(
        "ping",
        handler(|ctx| async move {
            ctx.reply("pong").await?;
            Ok(())
        }),
    ));
    client.register_module(fast).unwrap();
    ready(&client).await;

    // Registered after launch: never launched, never ready.
    let slow = Module::new("slow");
    slow.register(Command::build(
        "wait",
        handler(|ctx| async move {
            ctx.reply("unblocked").await?;
            Ok(())
        }),
    ));
    client.register_module(slow.clone()).unwrap();

    let msg = guild_message(1, "!wait");
    let blocked = {
        let client = client.clone();
        let msg = msg.clone();
        tokio::spawn(async move {
            client.handle_event(Event::MessageCreate(msg)).await;
        })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    // The command is parked at the readiness gate, not failed.
    assert!(client.is_active(msg.id));
    assert!(transport.sent_texts().is_empty());

    // Unrelated commands keep working.
    client
        .handle_event(Event::MessageCreate(guild_message(2, "!ping")))
        .await;
    assert_eq!(transport.sent_texts(), ["pong"]);

    // Launching the module releases the gate.
    slow.launch(&client).await.unwrap();
    blocked.await.unwrap();
    assert!(!client.is_active(msg.id));
    assert_eq!(transport.sent_texts(), ["pong", "unblocked"]);
}

#[tokio::test]
async fn test_initialise_runs_tasks_exactly_once() {
    let (client, _transport) = test_dispatcher(base_config());
    let module = Module::new("core");
    let runs = Arc::new(AtomicUsize::new(0));
    module.add_init_task(Box::new({
        let runs = runs.clone();
        move |_client| {
            runs.fetch_add(1, Ordering::SeqCst);
        }
    }));
    client.register_module(module).unwrap();

    client.initialise_modules();
    client.initialise_modules();
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_launch_runs_tasks_exactly_once_and_sets_ready() {
    let (client, _transport) = test_dispatcher(base_config());
    let module = Module::new("core");
    let runs = Arc::new(AtomicUsize::new(0));
    module.add_launch_task(Box::new({
        let runs = runs.clone();
        move |_client| {
            let runs = runs.clone();
            Box::pin(async move {
                runs.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
        }
    }));
    client.register_module(module.clone()).unwrap();
    assert!(!module.is_ready());

    client.launch_modules().await;
    client.launch_modules().await;
    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert!(module.is_ready());
}

#[tokio::test]
async fn test_launch_failure_leaves_module_gated_but_isolated() {
    let (client, transport) = test_dispatcher(base_config());

    let broken = Module::new("broken");
    broken.add_launch_task(Box::new(|_client| {
        Box::pin(async { anyhow::bail!("no database") })
    }));
    broken.register(Command::build("query", handler(|_ctx| async { Ok(()) })));

    let healthy = Module::new("healthy");
    healthy.register(Command::build(
        "ping",
        handler(|ctx| async move {
            ctx.reply("pong").await?;
            Ok(())
        }),
    ));

    client.register_module(broken.clone()).unwrap();
    client.register_module(healthy.clone()).unwrap();
    ready(&client).await;

    assert!(!broken.is_ready());
    assert!(healthy.is_ready());

    client
        .handle_event(Event::MessageCreate(guild_message(1, "!ping")))
        .await;
    assert_eq!(transport.sent_texts(), ["pong"]);
}
