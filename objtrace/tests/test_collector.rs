use std::io::Write;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crossbeam_channel::bounded;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::oneshot;

use objtrace::collector::{build_processor, spawn_processor, CollectorServer, ProcessorKind, ServerStats};
use objtrace::config::AgentOptions;
use objtrace::dispatch::Dispatcher;
use objtrace::domain::{MethodId, ObjectRef, ThreadRef};
use objtrace::host::{HostEventSource, HostStep, MethodDef, ScriptedHost};
use objtrace::state::TracerState;
use objtrace::trace::Frame;

#[derive(Clone, Default)]
struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl SharedBuf {
    fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap_or_else(PoisonError::into_inner)).into_owned()
    }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

async fn wait_for_lines(stats: &ServerStats, expected: u64) {
    for _ in 0..200 {
        if stats.lines_received() >= expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("collector received {} of {expected} lines", stats.lines_received());
}

#[tokio::test]
async fn test_collector_echoes_lines_from_many_connections() {
    let server = CollectorServer::bind("127.0.0.1:0").await.expect("bind");
    let addr = server.local_addr().unwrap();
    let stats = server.stats();

    let out = SharedBuf::default();
    let (queue_tx, queue_rx) = bounded(64);
    let processor = spawn_processor(queue_rx, build_processor(ProcessorKind::Stdout, Box::new(out.clone())));

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let serving = tokio::spawn(server.serve(queue_tx, async {
        let _ = stop_rx.await;
    }));

    for conn in 0..3u64 {
        let mut stream = TcpStream::connect(addr).await.expect("connect");
        stream
            .write_all(format!("c_{conn}_U_100_<empty>\r\nd_{conn}_200\n").as_bytes())
            .await
            .unwrap();
        stream.shutdown().await.unwrap();
    }

    wait_for_lines(&stats, 6).await;
    stop_tx.send(()).unwrap();
    serving.await.expect("server task");

    let processed = processor.join().expect("processor thread");
    assert_eq!(processed.processed, 6);
    assert_eq!(processed.parse_errors, 0);
    assert_eq!(stats.connections(), 3);
    assert_eq!(stats.lines_dropped(), 0);

    let text = out.text();
    for conn in 0..3 {
        assert!(text.contains(&format!("d_{conn}_200\n")));
    }
}

#[tokio::test]
async fn test_full_queue_drops_lines() {
    let server = CollectorServer::bind("127.0.0.1:0").await.expect("bind");
    let addr = server.local_addr().unwrap();
    let stats = server.stats();

    // Nobody drains this queue until the server stops.
    let (queue_tx, queue_rx) = bounded(2);
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let serving = tokio::spawn(server.serve(queue_tx, async {
        let _ = stop_rx.await;
    }));

    let mut stream = TcpStream::connect(addr).await.expect("connect");
    stream.write_all(b"d_1_1\nd_2_1\nd_3_1\nd_4_1\nd_5_1\n").await.unwrap();
    stream.shutdown().await.unwrap();

    wait_for_lines(&stats, 5).await;
    stop_tx.send(()).unwrap();
    serving.await.expect("server task");

    assert_eq!(stats.lines_dropped(), 3);
    assert_eq!(queue_rx.iter().count(), 2);
}

#[tokio::test]
async fn test_summary_keeps_agents_apart() {
    let server = CollectorServer::bind("127.0.0.1:0").await.expect("bind");
    let addr = server.local_addr().unwrap();
    let stats = server.stats();

    let out = SharedBuf::default();
    let (queue_tx, queue_rx) = bounded(64);
    let processor = spawn_processor(queue_rx, build_processor(ProcessorKind::Summary, Box::new(out.clone())));
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let serving = tokio::spawn(server.serve(queue_tx, async {
        let _ = stop_rx.await;
    }));

    // both agents start numbering at 1
    let mut first = TcpStream::connect(addr).await.expect("connect");
    first.write_all(b"c_1_U_100_Lapp/A;.run@1[A.java:5]\n").await.unwrap();
    wait_for_lines(&stats, 1).await;
    let mut second = TcpStream::connect(addr).await.expect("connect");
    second.write_all(b"c_1_U_100_Lapp/B;.run@1[B.java:5]\nd_1_150\n").await.unwrap();
    first.shutdown().await.unwrap();
    second.shutdown().await.unwrap();

    wait_for_lines(&stats, 3).await;
    stop_tx.send(()).unwrap();
    serving.await.expect("server task");
    processor.join().expect("processor thread");

    let text = out.text();
    assert!(text.contains("2 created, 1 destroyed, 1 live"), "summary was:\n{text}");
    assert!(text.contains("Lapp/A;.run@1[A.java:5]"));
    assert!(!text.contains("unmatched"));
}

#[tokio::test]
async fn test_tracer_to_collector_summary() {
    let server = CollectorServer::bind("127.0.0.1:0").await.expect("bind");
    let port = server.local_addr().unwrap().port();
    let stats = server.stats();

    let out = SharedBuf::default();
    let (queue_tx, queue_rx) = bounded(64);
    let processor = spawn_processor(queue_rx, build_processor(ProcessorKind::Summary, Box::new(out.clone())));
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let serving = tokio::spawn(server.serve(queue_tx, async {
        let _ = stop_rx.await;
    }));

    // The tracer side uses blocking sockets, as inside a host runtime.
    tokio::task::spawn_blocking(move || {
        let host = Arc::new(ScriptedHost::new());
        host.define_method(MethodId(1), MethodDef::new("Lapp/Pool;", "acquire", "Pool.java", 31));
        host.set_stack(ThreadRef(1), vec![Frame::new(MethodId(1), 4)]);

        let options = AgentOptions { port, ..AgentOptions::default() };
        let dispatcher =
            Arc::new(Dispatcher::new(Arc::new(TracerState::start(options)), Arc::clone(&host)));
        let listener: Arc<dyn HostEventSource> = dispatcher.clone();
        host.attach(&listener);

        host.replay(
            &[
                HostStep::Start,
                HostStep::Init,
                HostStep::Create { thread: Some(ThreadRef(1)), object: ObjectRef(1) },
                HostStep::Create { thread: Some(ThreadRef(1)), object: ObjectRef(2) },
                HostStep::Create { thread: Some(ThreadRef(1)), object: ObjectRef(3) },
                HostStep::Unreachable(ObjectRef(2)),
                HostStep::Shutdown,
            ],
            dispatcher.as_ref(),
        );
    })
    .await
    .expect("tracer thread");

    wait_for_lines(&stats, 4).await;
    stop_tx.send(()).unwrap();
    serving.await.expect("server task");
    processor.join().expect("processor thread");

    let text = out.text();
    assert!(text.contains("3 created, 1 destroyed, 2 live"), "summary was:\n{text}");
    assert!(text.contains("Lapp/Pool;.acquire@4[Pool.java:31]"));
}
