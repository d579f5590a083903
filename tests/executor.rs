use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use samsung_mdc::{
    commands,
    executor::{run_all, Script, ScriptOptions, Step, Target},
    fields::Value,
    proto::{pack_response, Packet},
    ConnectionConfig, Error, MDCConnection,
};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpListener,
};

type Reply = dyn Fn(usize, &Packet) -> Vec<u8> + Send + Sync;

/// Display on a local TCP port answering every request through `reply`
struct FakeDisplay {
    address: String,
    requests: Arc<Mutex<Vec<Packet>>>,
    connections: Arc<AtomicUsize>
}

impl FakeDisplay {
    async fn spawn(reply: impl Fn(usize, &Packet) -> Vec<u8> + Send + Sync + 'static) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let connections = Arc::new(AtomicUsize::new(0));
        let reply: Arc<Reply> = Arc::new(reply);

        let (log, count) = (requests.clone(), connections.clone());
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                count.fetch_add(1, Ordering::SeqCst);
                let (log, reply) = (log.clone(), reply.clone());
                tokio::spawn(async move {
                    let mut buffer = Vec::new();
                    let mut chunk = [0_u8; 256];
                    loop {
                        while let Ok((packet, _)) = Packet::from_bytes(&mut buffer) {
                            let index = {
                                let mut log = log.lock().unwrap();
                                log.push(packet.clone());
                                log.len() - 1
                            };
                            if socket.write_all(&reply(index, &packet)).await.is_err() {
                                return;
                            }
                        }
                        match socket.read(&mut chunk).await {
                            Ok(0) | Err(_) => return,
                            Ok(n) => buffer.extend_from_slice(&chunk[..n])
                        }
                    }
                });
            }
        });

        Self { address, requests, connections }
    }

    fn target(&self, display_id: u8) -> Target {
        let config = ConnectionConfig::default().with_timeout(Duration::from_secs(2));
        Target::new(display_id, MDCConnection::new(self.address.clone(), config))
    }

    fn codes(&self) -> Vec<u8> {
        self.requests.lock().unwrap().iter().map(|p| p.command).collect()
    }

    fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }
}

/// ACK echoing SET data, or answering 1 to a GET
fn ack(packet: &Packet) -> Vec<u8> {
    let data = if packet.data.is_empty() { vec![1] } else { packet.data.clone() };
    pack_response(packet.command, None, packet.display_id, true, &data)
}

fn garbage(_: &Packet) -> Vec<u8> {
    vec![0x00, 0x00, 0x00, 0x00]
}

fn power_on_then_volume() -> Script {
    let on = commands::POWER_STATE.member_named("ON").unwrap();
    Script {
        steps: vec![
            Step::Command { command: &commands::POWER, args: vec![on.into()] },
            Step::Command { command: &commands::VOLUME, args: vec![Value::Int(10)] },
        ]
    }
}

async fn run(targets: &mut [Target], script: &Script, options: &ScriptOptions) -> Vec<Result<Vec<Vec<Value>>, Error>> {
    run_all(targets, script, options, &|_, _, _| {}).await
        .into_iter()
        .map(|report| report.result)
        .collect()
}

#[tokio::test]
async fn should_retry_command_until_success(){
    let display = FakeDisplay::spawn(|index, packet| if index < 2 { garbage(packet) } else { ack(packet) }).await;
    let mut targets = vec![display.target(1)];
    let options = ScriptOptions { retry_command: 2, ..Default::default() };

    let results = run(&mut targets, &power_on_then_volume(), &options).await;
    let outputs = results.into_iter().next().unwrap().unwrap();
    assert_eq!(outputs.len(), 2);
    assert_eq!(outputs[1], vec![Value::Int(10)]);
    // volume is only sent once power went through
    assert_eq!(display.codes(), vec![0x11, 0x11, 0x11, 0x12]);
    assert_eq!(display.connections(), 3);
    assert!(!targets[0].connection.is_open());
}

#[tokio::test]
async fn should_give_up_when_retries_are_exhausted(){
    let display = FakeDisplay::spawn(|index, packet| if index < 2 { garbage(packet) } else { ack(packet) }).await;
    let mut targets = vec![display.target(1)];
    let options = ScriptOptions { retry_command: 1, ..Default::default() };

    let results = run(&mut targets, &power_on_then_volume(), &options).await;
    assert!(matches!(results[0], Err(Error::InvalidResponse { .. })));
    assert_eq!(display.codes(), vec![0x11, 0x11]);
}

#[tokio::test]
async fn should_retry_whole_script(){
    // volume fails once, the retried script starts over from power
    let display = FakeDisplay::spawn(|index, packet| if index == 1 { garbage(packet) } else { ack(packet) }).await;
    let mut targets = vec![display.target(0)];
    let options = ScriptOptions { retry_script: 1, ..Default::default() };

    let results = run(&mut targets, &power_on_then_volume(), &options).await;
    assert!(results[0].is_ok());
    assert_eq!(display.codes(), vec![0x11, 0x12, 0x11, 0x12]);
}

#[tokio::test]
async fn should_skip_nak_when_ignored(){
    let nak = |_: usize, packet: &Packet| {
        if packet.command == 0x11 {
            pack_response(0x11, None, packet.display_id, false, &[0x02])
        } else {
            ack(packet)
        }
    };
    let display = FakeDisplay::spawn(nak).await;
    let mut targets = vec![display.target(0)];

    let options = ScriptOptions { ignore_nak: true, retry_command: 3, ..Default::default() };
    let results = run(&mut targets, &power_on_then_volume(), &options).await;
    assert_eq!(results[0].as_ref().unwrap(), &vec![vec![], vec![Value::Int(10)]]);
    assert_eq!(display.codes(), vec![0x11, 0x12]);

    let results = run(&mut targets, &power_on_then_volume(), &ScriptOptions::default()).await;
    assert!(matches!(results[0], Err(Error::Nak(0x02))));
}

#[tokio::test]
async fn should_reconnect_after_disconnect(){
    let display = FakeDisplay::spawn(|_, packet| ack(packet)).await;
    let mut targets = vec![display.target(0)];
    let script = Script {
        steps: vec![
            Step::Command { command: &commands::POWER, args: vec![] },
            Step::Disconnect,
            Step::Command { command: &commands::POWER, args: vec![] },
        ]
    };

    let results = run(&mut targets, &script, &ScriptOptions::default()).await;
    assert_eq!(results[0].as_ref().unwrap().len(), 2);
    assert_eq!(display.connections(), 2);
}

#[tokio::test]
async fn should_isolate_failing_targets(){
    let display = FakeDisplay::spawn(|_, packet| ack(packet)).await;
    let closed = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().to_string()
    };
    let mut targets = vec![
        Target::new(0, MDCConnection::new(closed.clone(), ConnectionConfig::default())),
        display.target(5),
    ];
    let steps = Mutex::new(Vec::new());

    let reports = run_all(&mut targets, &Script::single(&commands::POWER, vec![]), &ScriptOptions::default(), &|label, _, result| {
        steps.lock().unwrap().push((label.to_owned(), result.is_ok()));
    })
    .await;

    assert!(matches!(reports[0].result, Err(Error::Io(_))));
    assert!(reports[1].is_ok());
    assert_eq!(display.requests.lock().unwrap()[0].display_id, 5);
    let mut steps = steps.into_inner().unwrap();
    steps.sort();
    assert_eq!(steps, vec![
        (format!("0@{closed}"), false),
        (format!("5@{}", display.address), true)
    ]);
}

#[tokio::test]
async fn should_report_tls_requirement(){
    let display = FakeDisplay::spawn(|_, _| b"MDCSTART<<TLS>>".to_vec()).await;
    let mut targets = vec![display.target(0)];

    let results = run(&mut targets, &Script::single(&commands::POWER, vec![]), &ScriptOptions::default()).await;
    assert!(matches!(&results[0], Err(Error::TlsRequired(raw)) if raw == b"MDCSTART<<TLS>>"));
}
