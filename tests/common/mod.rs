//! Fake Redis servers answering `INFO replication`

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// How a fake server answers
#[derive(Debug, Clone)]
pub enum Reply {
    /// Bulk string carrying this INFO body
    Info(String),
    /// RESP error reply
    Error(String),
    /// Accept and never answer
    Silent,
    /// Accept and hang up straight away
    Close,
    /// These bytes verbatim
    Raw(Vec<u8>),
}

/// Bind a fake server on 127.0.0.1 and serve `reply` to every connection.
pub async fn spawn_server(reply: Reply) -> SocketAddr {
    spawn_counting_server(reply).await.0
}

/// Like [`spawn_server`], also counting accepted connections.
pub async fn spawn_counting_server(reply: Reply) -> (SocketAddr, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let accepted = Arc::new(AtomicUsize::new(0));
    let counter = accepted.clone();

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            counter.fetch_add(1, Ordering::SeqCst);
            let reply = reply.clone();
            tokio::spawn(async move {
                let mut buf = [0u8; 256];
                let _ = socket.read(&mut buf).await;
                match reply {
                    Reply::Info(body) => {
                        let frame = format!("${}\r\n{}\r\n", body.len(), body);
                        let _ = socket.write_all(frame.as_bytes()).await;
                    }
                    Reply::Error(msg) => {
                        let _ = socket.write_all(format!("-{}\r\n", msg).as_bytes()).await;
                    }
                    Reply::Silent => {
                        tokio::time::sleep(Duration::from_secs(30)).await;
                    }
                    Reply::Close => {}
                    Reply::Raw(bytes) => {
                        let _ = socket.write_all(&bytes).await;
                    }
                }
            });
        }
    });

    (addr, accepted)
}

/// A port on 127.0.0.1 with nothing listening
pub async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}

pub fn master_info(replicas: &[(u32, &str, u16, u64)]) -> String {
    let mut body = format!(
        "# Replication\r\nrole:master\r\nconnected_slaves:{}\r\n",
        replicas.len()
    );
    for (n, ip, port, lag) in replicas {
        body.push_str(&format!(
            "slave{}:ip={},port={},state=online,offset=1000,lag={}\r\n",
            n, ip, port, lag
        ));
    }
    body.push_str("master_replid:3f1c0e0d7a\r\nmaster_repl_offset:1000\r\n");
    body
}

pub fn slave_info(master_port: u16) -> String {
    format!(
        "# Replication\r\nrole:slave\r\nmaster_host:127.0.0.1\r\nmaster_port:{}\r\n\
         master_link_status:up\r\nslave_repl_offset:1000\r\nslave_read_only:1\r\n\
         connected_slaves:0\r\n",
        master_port
    )
}
