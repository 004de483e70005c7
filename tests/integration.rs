//! Black-box integration tests for the SMTP sink, driving the server over
//! a real loopback `TcpStream` exactly as a client would.

use std::time::Duration;

use smtp_sink::smtp::Server;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

async fn connect(server: &Server) -> (BufReader<tokio::net::tcp::OwnedReadHalf>, tokio::net::tcp::OwnedWriteHalf) {
    let stream = TcpStream::connect(("127.0.0.1", server.port()))
        .await
        .expect("connect to sink");
    let (read_half, write_half) = stream.into_split();
    (BufReader::new(read_half), write_half)
}

async fn expect(reader: &mut BufReader<tokio::net::tcp::OwnedReadHalf>, prefix: &str) -> String {
    let mut line = String::new();
    reader.read_line(&mut line).await.expect("read response line");
    assert!(
        line.starts_with(prefix),
        "expected response starting with {prefix:?}, got {line:?}"
    );
    line
}

async fn send(writer: &mut tokio::net::tcp::OwnedWriteHalf, line: &str) {
    writer.write_all(format!("{line}\r\n").as_bytes()).await.expect("write line");
}

#[tokio::test]
async fn full_transaction_round_trip_over_a_real_socket() {
    let server = Server::start_on(0).await.expect("start sink");
    let (mut reader, mut writer) = connect(&server).await;

    expect(&mut reader, "220").await;
    send(&mut writer, "HELO test").await;
    expect(&mut reader, "250").await;
    send(&mut writer, "MAIL FROM:<a@x>").await;
    expect(&mut reader, "250").await;
    send(&mut writer, "RCPT TO:<b@y>").await;
    expect(&mut reader, "250").await;
    send(&mut writer, "DATA").await;
    expect(&mut reader, "354").await;
    send(&mut writer, "Subject: Hi").await;
    send(&mut writer, "").await;
    send(&mut writer, "Hello").await;
    send(&mut writer, ".").await;
    expect(&mut reader, "250").await;
    send(&mut writer, "QUIT").await;
    expect(&mut reader, "221").await;

    drop(writer);
    drop(reader);

    // Give the connection task a moment to enqueue before asserting.
    tokio::time::sleep(Duration::from_millis(50)).await;

    let snapshot = server.snapshot();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].header_value("Subject"), Some("Hi"));
    assert_eq!(snapshot[0].body(), "Hello\n");

    server.stop().await;
}

#[tokio::test]
async fn reset_empties_the_queue_and_is_idempotent() {
    let server = Server::start_on(0).await.expect("start sink");
    let (mut reader, mut writer) = connect(&server).await;

    expect(&mut reader, "220").await;
    send(&mut writer, "HELO test").await;
    expect(&mut reader, "250").await;
    send(&mut writer, "MAIL FROM:<a@x>").await;
    expect(&mut reader, "250").await;
    send(&mut writer, "RCPT TO:<b@y>").await;
    expect(&mut reader, "250").await;
    send(&mut writer, "DATA").await;
    expect(&mut reader, "354").await;
    send(&mut writer, "").await;
    send(&mut writer, ".").await;
    expect(&mut reader, "250").await;
    send(&mut writer, "QUIT").await;
    expect(&mut reader, "221").await;

    drop(writer);
    drop(reader);
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(server.snapshot().len(), 1);
    server.reset();
    server.reset();
    assert!(server.snapshot().is_empty());

    server.stop().await;
}

#[tokio::test]
async fn stop_is_idempotent_and_closes_the_listener() {
    let server = Server::start_on(0).await.expect("start sink");
    let port = server.port();

    server.stop().await;
    server.stop().await;

    assert!(
        TcpStream::connect(("127.0.0.1", port)).await.is_err(),
        "listener should be closed after stop()"
    );
}

#[tokio::test]
async fn bad_sequence_response_is_exact() {
    let server = Server::start_on(0).await.expect("start sink");
    let (mut reader, mut writer) = connect(&server).await;

    expect(&mut reader, "220").await;
    send(&mut writer, "RCPT TO:<b@y>").await;
    let line = expect(&mut reader, "503").await;
    assert!(line.contains("Bad sequence of commands"));

    server.stop().await;
}

#[tokio::test]
async fn port_zero_is_resolved_to_an_ephemeral_port() {
    let server = Server::start_on(0).await.expect("start sink");
    assert_ne!(server.port(), 0);
    server.stop().await;
}
