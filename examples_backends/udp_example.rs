use log_sink_adapters::udp::{TokioBinder, UdpAdapter};
use log_sink_adapters::{Level, LogRecord, LogSink};
use tokio::net::UdpSocket;

/// Sends a single record and then a two-record transaction to a local
/// listener, printing every datagram it receives.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let listener = UdpSocket::bind("127.0.0.1:0").await?;
    let port = listener.local_addr()?.port();

    let mut adapter = UdpAdapter::new(Box::new(TokioBinder::default()), "127.0.0.1", port);

    adapter
        .process(&LogRecord::new(Level::Info, "service started").with_context("pid", std::process::id()))
        .await?;

    adapter.begin().await?;
    adapter.process(&LogRecord::new(Level::Error, "order failed")).await?;
    adapter.process(&LogRecord::new(Level::Warning, "retry scheduled")).await?;
    adapter.shutdown().await?;

    let mut buf = vec![0u8; 65_536];
    for _ in 0..2 {
        let (len, _) = listener.recv_from(&mut buf).await?;
        println!("{}", String::from_utf8_lossy(&buf[..len]));
    }
    Ok(())
}
