use std::collections::BTreeSet;
use std::time::Duration;

use aviary_api::{
    Address, DownMsg, Envelope, ExitReason, Message, Payload, RequestError, Response,
    ResponsePromise, SysMessage,
};

#[test]
fn payload_downcasts_by_type() {
    let payload = Payload::new((1i32, 2i32));
    assert!(payload.is::<(i32, i32)>());
    assert_eq!(payload.get::<(i32, i32)>(), Some(&(1, 2)));
    assert!(payload.get::<i64>().is_none());

    let payload = match payload.downcast::<String>() {
        Ok(_) => panic!("tuple payload downcast to String"),
        Err(payload) => payload,
    };
    assert_eq!(*payload.downcast::<(i32, i32)>().unwrap(), (1, 2));
}

#[test]
fn cloned_messages_share_the_payload() {
    let message = Message::user(vec![1u8, 2, 3]);
    let copy = message.clone();
    assert_eq!(copy.payload().unwrap().get::<Vec<u8>>(), Some(&vec![1, 2, 3]));
    assert_eq!(message.tag(), copy.tag());
}

#[test]
fn system_messages_have_readable_tags() {
    assert_eq!(Message::Sys(SysMessage::Get).tag(), "sys:get");
    assert_eq!(Message::Sys(SysMessage::Put(Address::invalid())).tag(), "sys:put");
    let down = Message::Down(DownMsg {
        source: Address::invalid(),
        reason: ExitReason::Normal,
    });
    assert_eq!(down.tag(), "down");
    assert!(down.payload().is_none());
}

#[test]
fn addresses_order_and_compare_by_identity() {
    let a = Address::invalid();
    let b = Address::default();
    assert_eq!(a, b);

    let set: BTreeSet<Address> = [a.clone(), b].into_iter().collect();
    assert_eq!(set.len(), 1);
    assert_eq!(a.to_string(), "invalid-actor");
}

#[test]
fn exit_reasons_display() {
    assert_eq!(ExitReason::Normal.to_string(), "normal");
    assert_eq!(ExitReason::UserShutdown.to_string(), "user_shutdown");
    assert_eq!(ExitReason::abnormal("disk full").to_string(), "abnormal: disk full");
    assert!(ExitReason::Normal.is_normal());
    assert!(!ExitReason::Unknown.is_normal());
}

#[tokio::test]
async fn request_envelope_carries_promise() {
    let (promise, handle) = ResponsePromise::channel();
    let envelope = Envelope::new(Address::invalid(), Message::user("ping")).with_response(promise);
    assert!(envelope.is_request());

    let forwarded = envelope.response.clone().unwrap();
    forwarded.deliver(Response::new(Address::invalid(), Payload::new("pong")));
    assert!(!forwarded.is_pending());

    let response = handle.wait(Duration::from_secs(1)).await.unwrap();
    assert_eq!(response.value::<&str>().unwrap(), "pong");
}

#[tokio::test]
async fn reply_of_wrong_type_is_reported() {
    let (promise, handle) = ResponsePromise::channel();
    promise.deliver(Response::new(Address::invalid(), Payload::new(7u8)));
    let response = handle.wait(Duration::from_secs(1)).await.unwrap();

    match response.value::<String>() {
        Err(RequestError::UnexpectedReply { .. }) => {}
        other => panic!("expected UnexpectedReply, got {:?}", other),
    }
}

#[tokio::test]
async fn unanswered_request_times_out() {
    let (promise, handle) = ResponsePromise::channel();
    let timeout = Duration::from_millis(20);
    let result = handle.wait(timeout).await;
    assert_eq!(result.unwrap_err(), RequestError::Timeout(timeout));
    drop(promise);
}
