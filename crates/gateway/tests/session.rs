//! Session behaviour: debouncing, typing, retry and interruption, driven
//! through [`SessionHandle`] on tokio's paused clock.

mod common;

use std::time::Duration;

use pal_domain::model::USER_SENDER_ID;
use pal_gateway::runtime::{spawn_session, DeliveryOrigin};
use tokio::time::{sleep, Instant};

use common::{last_text, Harness, ScriptedProvider, USER_NAME};

#[tokio::test(start_paused = true)]
async fn quick_messages_are_sent_as_one() {
    let mut h = Harness::new(ScriptedProvider::replying(&["got both"]));
    let rin = h.friend("Rin").await;
    let chat = h.private_chat(&rin).await;
    let session = spawn_session(h.state.clone(), chat.id.clone());

    let started = Instant::now();
    session.submit("hello", Vec::new()).await.unwrap();
    session.submit("  are you there?  ", Vec::new()).await.unwrap();

    let delivery = h.next_delivery().await;
    assert!(started.elapsed() >= Duration::from_millis(3_000));
    assert_eq!(delivery.message.content, "got both");
    assert_eq!(h.llm.calls(), 1);
    assert_eq!(
        last_text(&h.llm.requests()[0]),
        format!("[{USER_NAME}]: hello\nare you there?")
    );

    // Both user messages are stored individually, before the reply.
    let stored = h.store().get_messages(&chat.id, 10, 0).await.unwrap();
    let senders: Vec<_> = stored.iter().map(|m| m.sender_id.as_str()).collect();
    assert_eq!(senders, vec![USER_SENDER_ID, USER_SENDER_ID, rin.id.as_str()]);
    assert_eq!(stored[1].content, "are you there?");

    session.close().await;
}

#[tokio::test(start_paused = true)]
async fn typing_extends_the_window() {
    let mut h = Harness::new(ScriptedProvider::replying(&["hi"]));
    let rin = h.friend("Rin").await;
    let chat = h.private_chat(&rin).await;
    let session = spawn_session(h.state.clone(), chat.id.clone());

    let started = Instant::now();
    session.submit("so", Vec::new()).await.unwrap();
    sleep(Duration::from_millis(2_000)).await;
    session.typing().await.unwrap();
    sleep(Duration::from_millis(2_000)).await;
    assert_eq!(h.llm.calls(), 0);

    h.next_delivery().await;
    assert!(started.elapsed() >= Duration::from_millis(5_000));
    assert_eq!(h.llm.calls(), 1);

    session.close().await;
}

#[tokio::test(start_paused = true)]
async fn typing_alone_sends_nothing() {
    let mut h = Harness::new(ScriptedProvider::replying(&[]));
    let rin = h.friend("Rin").await;
    let chat = h.private_chat(&rin).await;
    let session = spawn_session(h.state.clone(), chat.id.clone());

    session.typing().await.unwrap();
    sleep(Duration::from_secs(10)).await;

    assert_eq!(h.llm.calls(), 0);
    assert!(h.no_pending_delivery());
    session.close().await;
}

#[tokio::test(start_paused = true)]
async fn cancel_drops_buffered_input() {
    let mut h = Harness::new(ScriptedProvider::replying(&[]));
    let rin = h.friend("Rin").await;
    let chat = h.private_chat(&rin).await;
    let session = spawn_session(h.state.clone(), chat.id.clone());

    session.submit("never mind", Vec::new()).await.unwrap();
    session.cancel().await.unwrap();
    sleep(Duration::from_secs(10)).await;

    assert_eq!(h.llm.calls(), 0);
    assert!(h.no_pending_delivery());
    // The user message itself is kept.
    assert_eq!(h.store().message_count(&chat.id).await.unwrap(), 1);
    session.close().await;
}

#[tokio::test(start_paused = true)]
async fn close_discards_pending_input() {
    let h = Harness::new(ScriptedProvider::replying(&[]));
    let rin = h.friend("Rin").await;
    let chat = h.private_chat(&rin).await;
    let session = spawn_session(h.state.clone(), chat.id.clone());

    session.submit("bye", Vec::new()).await.unwrap();
    session.close().await;
    sleep(Duration::from_secs(10)).await;

    assert_eq!(h.llm.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn retry_resends_the_last_user_message() {
    let mut h = Harness::new(ScriptedProvider::replying(&["first try", "second try"]));
    let rin = h.friend("Rin").await;
    let chat = h.private_chat(&rin).await;
    let session = spawn_session(h.state.clone(), chat.id.clone());

    session.submit("tell me a joke", Vec::new()).await.unwrap();
    let first = h.next_delivery().await;
    assert_eq!(first.origin, DeliveryOrigin::User);

    let before_retry = Instant::now();
    session.retry().await.unwrap();
    let second = h.next_delivery().await;
    assert_eq!(second.origin, DeliveryOrigin::Retry);
    assert_eq!(second.message.content, "second try");
    // No debounce window for a retry.
    assert!(before_retry.elapsed() < Duration::from_millis(3_000));

    let requests = h.llm.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(last_text(&requests[1]), format!("[{USER_NAME}]: tell me a joke"));
    // Retry does not store the user message again.
    assert_eq!(h.store().message_count(&chat.id).await.unwrap(), 3);

    session.close().await;
}

#[tokio::test(start_paused = true)]
async fn status_tracks_waiting_and_generating() {
    let mut h = Harness::new(ScriptedProvider::replying(&["hey"]));
    let rin = h.friend("Rin").await;
    let chat = h.private_chat(&rin).await;
    let session = spawn_session(h.state.clone(), chat.id.clone());
    let mut status = session.status();

    assert!(status.borrow().is_idle());
    session.submit("hi", Vec::new()).await.unwrap();
    status.wait_for(|s| s.waiting).await.unwrap();

    h.next_delivery().await;
    status.wait_for(|s| s.is_idle()).await.unwrap();

    session.close().await;
}

#[tokio::test(start_paused = true)]
async fn new_message_interrupts_a_group_reply() {
    let mut h = Harness::new(ScriptedProvider::replying(&["a", "b", "c"]));
    let rin = h.friend("Rin").await;
    let yuki = h.friend("Yuki").await;
    let group = h.group(&[&rin, &yuki]).await;
    let session = spawn_session(h.state.clone(), group.id.clone());

    session.submit("hi all", Vec::new()).await.unwrap();
    let first = h.next_delivery().await;
    assert_eq!(first.message.sender_id, rin.id);

    // Yuki has not answered yet; the user cuts in.
    session.submit("actually, one question", Vec::new()).await.unwrap();

    // The next pass starts over with Rin; Yuki's first turn never happened.
    let second = h.next_delivery().await;
    assert_eq!(second.message.sender_id, rin.id);
    assert_eq!(second.message.content, "b");
    let third = h.next_delivery().await;
    assert_eq!(third.message.sender_id, yuki.id);
    assert_eq!(third.message.content, "c");
    assert_eq!(h.llm.calls(), 3);

    session.close().await;
}
