use super::*;
use crate::error::Error;
use crate::message::{DeleteProperty, Message, Payload, PingRequest, ServerMessage};
use crate::property::Status;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio_stream::StreamExt;

async fn local_server() -> (TcpListener, Endpoint) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    (listener, Endpoint::new("127.0.0.1", port))
}

fn parse_msg(xml: &str) -> Message {
    let raw = crate::xml::parse_element(xml).unwrap();
    Message::from_raw(&raw).unwrap()
}

#[tokio::test]
async fn test_handshake_and_auto_ping_round_trip() {
    let (listener, endpoint) = local_server().await;
    let session = Session::new(endpoint);
    let mut messages = session.messages().await.unwrap();
    session.connect().await.unwrap();
    session.send_handshake().await.unwrap();

    let (stream, _) = listener.accept().await.unwrap();
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    let mut line = String::new();
    reader.read_line(&mut line).await.unwrap();
    assert_eq!(line, "<getProperties version='1.7'/>\n");

    write_half
        .write_all(b"<pingRequest uid=\"abc\"/>\n")
        .await
        .unwrap();

    // The request is forwarded to subscribers...
    let message = messages.next().await.unwrap();
    assert_eq!(
        message.payload,
        Payload::PingRequest(PingRequest {
            uid: Some("abc".to_string())
        })
    );

    // ...and answered on the wire without any caller involvement.
    line.clear();
    reader.read_line(&mut line).await.unwrap();
    assert_eq!(line, "<pingReply uid=\"abc\"/>\n");

    session.disconnect().await.unwrap();
}

#[tokio::test]
async fn test_send_requires_connection() {
    let (_listener, endpoint) = local_server().await;
    let session = Session::new(endpoint);
    assert!(matches!(
        session.send(&Message::get_properties()).await,
        Err(Error::NotConnected)
    ));
}

#[tokio::test]
async fn test_send_rejects_variants_outside_session_subset() {
    let (_listener, endpoint) = local_server().await;
    let session = Session::new(endpoint);
    let message = Message::new(Payload::DeleteProperty(DeleteProperty {
        device: None,
        name: None,
        timestamp: None,
        comment: None,
    }));
    assert!(matches!(
        session.send(&message).await,
        Err(Error::NotSerializable("DeleteProperty"))
    ));

    // Commentary is serializable for bridge use, yet the session send set
    // is only getProperties/new*/enableBLOB/pingReply.
    let commentary = Message::new(Payload::ServerMessage(ServerMessage {
        device: None,
        timestamp: None,
        text: "relayed".to_string(),
    }));
    assert!(commentary.to_xml().is_ok());
    assert!(matches!(
        session.send(&commentary).await,
        Err(Error::NotSerializable("ServerMessage"))
    ));
}

#[tokio::test]
async fn test_connect_idempotent_and_disconnect_semantics() {
    let (listener, endpoint) = local_server().await;
    let session = Session::new(endpoint);
    let mut messages = session.messages().await.unwrap();

    assert!(!session.is_connected().await);
    session.connect().await.unwrap();
    session.connect().await.unwrap();
    assert!(session.is_connected().await);
    let _accepted = listener.accept().await.unwrap();

    session.disconnect().await.unwrap();
    assert!(!session.is_connected().await);
    assert!(matches!(
        session.send_bytes(b"<pingReply/>\n".to_vec()).await,
        Err(Error::NotConnected)
    ));
    // Both fan-out streams end on disconnect.
    assert!(messages.next().await.is_none());
}

#[tokio::test]
async fn test_connect_failure_surfaces_error() {
    let (listener, endpoint) = local_server().await;
    drop(listener);
    let session = Session::new(endpoint);
    assert!(session.connect().await.is_err());
    assert_eq!(session.state().await, SessionState::Failed);
}

#[tokio::test]
async fn test_connect_disconnect_interleaving_resolves_every_caller() {
    let (listener, endpoint) = local_server().await;
    let session = Session::new(endpoint);

    let connecting = {
        let session = session.clone();
        tokio::spawn(async move { session.connect().await.map(|_| ()) })
    };
    let disconnecting = {
        let session = session.clone();
        tokio::spawn(async move { session.disconnect().await })
    };

    // Whatever the interleaving, each pending operation resolves exactly
    // once; neither caller hangs.
    let _ = connecting.await.unwrap();
    disconnecting.await.unwrap().unwrap();
    drop(listener);
}

#[tokio::test]
async fn test_raw_and_parsed_fan_out() {
    let (listener, endpoint) = local_server().await;
    let session = Session::new(endpoint);
    let mut messages = session.messages().await.unwrap();
    let mut raw = session.connect().await.unwrap();

    let (mut stream, _) = listener.accept().await.unwrap();
    stream.write_all(b"<pingReply uid=\"u1\"/>\n").await.unwrap();

    let chunk = raw.next().await.unwrap();
    assert!(std::str::from_utf8(&chunk).unwrap().contains("pingReply"));

    let message = messages.next().await.unwrap();
    assert!(matches!(message.payload, Payload::PingReply(_)));

    session.disconnect().await.unwrap();
}

#[tokio::test]
async fn test_registry_define_then_update_preserves_metadata() {
    let (_listener, endpoint) = local_server().await;
    let registry = Registry::new(endpoint);

    registry
        .process_message(parse_msg(
            "<defNumberVector device=\"T\" name=\"EQUATORIAL_EOD_COORD\" state=\"Idle\" perm=\"rw\">\
             <defNumber name=\"RA\" format=\"%010.6m\" min=\"0\" max=\"24\" unit=\"hours\">12.0</defNumber>\
             </defNumberVector>",
        ))
        .await;
    registry
        .process_message(parse_msg(
            "<setNumberVector device=\"T\" name=\"EQUATORIAL_EOD_COORD\" state=\"Busy\">\
             <oneNumber name=\"RA\">15.5</oneNumber>\
             </setNumberVector>",
        ))
        .await;

    let device = registry.device("T").await.unwrap();
    let property = device.property("EQUATORIAL_EOD_COORD").unwrap();
    assert_eq!(property.state, Some(Status::Busy));
    let ra = property.value("RA").unwrap();
    assert_eq!(ra.as_number(), Some(15.5));
    assert_eq!(ra.format.as_deref(), Some("%010.6m"));
    assert_eq!(ra.min, Some(0.0));
    assert_eq!(ra.max, Some(24.0));
    assert_eq!(ra.unit.as_deref(), Some("hours"));
}

#[tokio::test]
async fn test_registry_delete_cascade() {
    let (_listener, endpoint) = local_server().await;
    let registry = Registry::new(endpoint);

    registry
        .process_message(parse_msg(
            "<defSwitchVector device=\"T\" name=\"CONNECTION\" rule=\"OneOfMany\">\
             <defSwitch name=\"CONNECT\">Off</defSwitch>\
             <defSwitch name=\"DISCONNECT\">On</defSwitch>\
             </defSwitchVector>",
        ))
        .await;
    registry
        .process_message(parse_msg(
            "<defNumberVector device=\"T\" name=\"EQUATORIAL_EOD_COORD\">\
             <defNumber name=\"RA\">0</defNumber>\
             </defNumberVector>",
        ))
        .await;
    registry
        .process_message(parse_msg(
            "<defNumberVector device=\"F\" name=\"FILTER_SLOT\">\
             <defNumber name=\"FILTER_SLOT_VALUE\">1</defNumber>\
             </defNumberVector>",
        ))
        .await;

    registry
        .process_message(parse_msg("<delProperty device=\"T\" name=\"CONNECTION\"/>"))
        .await;
    let t = registry.device("T").await.unwrap();
    assert!(t.property("CONNECTION").is_none());
    assert!(t.property("EQUATORIAL_EOD_COORD").is_some());

    registry
        .process_message(parse_msg("<delProperty device=\"T\"/>"))
        .await;
    assert!(registry.device("T").await.is_none());
    assert!(registry.device("F").await.is_some());

    registry.process_message(parse_msg("<delProperty/>")).await;
    assert!(registry.devices().await.is_empty());
}

#[tokio::test]
async fn test_registry_callbacks_fire_and_panics_are_isolated() {
    let (_listener, endpoint) = local_server().await;
    let registry = Registry::new(endpoint);

    let devices_created = Arc::new(AtomicUsize::new(0));
    let properties_updated = Arc::new(AtomicUsize::new(0));
    {
        let devices_created = Arc::clone(&devices_created);
        registry
            .set_on_device_update(move |_| {
                devices_created.fetch_add(1, Ordering::SeqCst);
            })
            .await;
    }
    {
        let properties_updated = Arc::clone(&properties_updated);
        registry
            .set_on_property_update(move |_, _| {
                properties_updated.fetch_add(1, Ordering::SeqCst);
            })
            .await;
    }

    let define = "<defSwitchVector device=\"T\" name=\"CONNECTION\" rule=\"OneOfMany\">\
                  <defSwitch name=\"CONNECT\">Off</defSwitch>\
                  <defSwitch name=\"DISCONNECT\">On</defSwitch>\
                  </defSwitchVector>";
    registry.process_message(parse_msg(define)).await;
    registry
        .process_message(parse_msg(
            "<setSwitchVector device=\"T\" name=\"CONNECTION\">\
             <oneSwitch name=\"CONNECT\">On</oneSwitch>\
             <oneSwitch name=\"DISCONNECT\">Off</oneSwitch>\
             </setSwitchVector>",
        ))
        .await;

    assert_eq!(devices_created.load(Ordering::SeqCst), 1);
    assert_eq!(properties_updated.load(Ordering::SeqCst), 2);

    // A panicking callback is caught; dispatch continues and state applies.
    registry
        .set_on_property_update(|_, _| panic!("user code misbehaved"))
        .await;
    registry
        .process_message(parse_msg(
            "<setSwitchVector device=\"T\" name=\"CONNECTION\">\
             <oneSwitch name=\"CONNECT\">Off</oneSwitch>\
             <oneSwitch name=\"DISCONNECT\">On</oneSwitch>\
             </setSwitchVector>",
        ))
        .await;
    let device = registry.device("T").await.unwrap();
    assert_eq!(
        device.property("CONNECTION").unwrap().switch_value("CONNECT"),
        Some(false)
    );
}

#[tokio::test]
async fn test_registry_ping_bookkeeping() {
    let (_listener, endpoint) = local_server().await;
    let registry = Registry::new(endpoint);

    assert!(registry.last_ping_seen().await.is_none());
    registry
        .process_message(parse_msg("<pingRequest uid=\"k1\"/>"))
        .await;
    assert!(registry.last_ping_seen().await.is_some());

    registry
        .process_message(parse_msg("<pingReply uid=\"k1\"/>"))
        .await;
    assert!(registry.ping_roundtrips().await.contains_key("k1"));
}

#[tokio::test]
async fn test_registry_server_message_channel() {
    let (_listener, endpoint) = local_server().await;
    let registry = Registry::new(endpoint);
    let mut channel = registry.server_messages();

    registry
        .process_message(parse_msg(
            "<message device=\"T\" message=\"Slew complete\"/>",
        ))
        .await;

    let sm = channel.recv().await.unwrap();
    assert_eq!(sm.device.as_deref(), Some("T"));
    assert_eq!(sm.text, "Slew complete");
}

#[tokio::test]
async fn test_registry_target_write_and_flush() {
    let (listener, endpoint) = local_server().await;
    let registry = Registry::new(endpoint);
    registry.connect().await.unwrap();

    let (stream, _) = listener.accept().await.unwrap();
    let (read_half, _write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    let mut line = String::new();
    reader.read_line(&mut line).await.unwrap();
    assert_eq!(line, "<getProperties version='1.7'/>\n");

    registry
        .process_message(parse_msg(
            "<defSwitchVector device=\"T\" name=\"CONNECTION\" rule=\"OneOfMany\" perm=\"rw\">\
             <defSwitch name=\"CONNECT\">Off</defSwitch>\
             <defSwitch name=\"DISCONNECT\">On</defSwitch>\
             </defSwitchVector>",
        ))
        .await;

    // Nothing to flush yet.
    registry.send_target_values("T", "CONNECTION").await.unwrap();

    registry
        .set_target_switch("T", "CONNECTION", "CONNECT", true)
        .await
        .unwrap();
    assert_eq!(
        registry.connection_status("T").await,
        ConnectionStatus::Connecting
    );

    registry.send_target_values("T", "CONNECTION").await.unwrap();
    line.clear();
    reader.read_line(&mut line).await.unwrap();
    assert_eq!(
        line,
        "<newSwitchVector device=\"T\" name=\"CONNECTION\">\
         <oneSwitch name=\"CONNECT\">On</oneSwitch>\
         <oneSwitch name=\"DISCONNECT\">Off</oneSwitch>\
         </newSwitchVector>\n"
    );

    registry.disconnect().await.unwrap();
}

#[tokio::test]
async fn test_registry_projects_server_stream() {
    let (listener, endpoint) = local_server().await;
    let registry = Registry::new(endpoint);
    registry.connect().await.unwrap();

    let (stream, _) = listener.accept().await.unwrap();
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    let mut line = String::new();
    reader.read_line(&mut line).await.unwrap();

    write_half
        .write_all(
            b"<defSwitchVector device=\"T\" name=\"CONNECTION\" rule=\"OneOfMany\">\
              <defSwitch name=\"CONNECT\">Off</defSwitch>\
              <defSwitch name=\"DISCONNECT\">On</defSwitch>\
              </defSwitchVector>\n",
        )
        .await
        .unwrap();

    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if registry.device("T").await.is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("projection of the server stream");

    assert_eq!(
        registry.connection_status("T").await,
        ConnectionStatus::Disconnected
    );
    registry.disconnect().await.unwrap();
}
