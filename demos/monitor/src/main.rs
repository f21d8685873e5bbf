use iotwatch::prelude::*;

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

fn render_snapshot(snapshot: &TelemetrySnapshot) {
    let reading = match &snapshot.reading {
        Some(r) => format!("{:.1} °C at {}", r.temperature, r.observed_at.format("%H:%M:%S")),
        None => "no reading yet".to_string(),
    };
    match &snapshot.fault {
        Some(fault) => println!("[{}] {reading} ({fault})", snapshot.state),
        None => println!("[{}] {reading}", snapshot.state),
    }
}

fn render_session(session: &Session) {
    match session.user() {
        Some(user) => println!("session: {} as {} <{}>", session.mode(), user.name, user.email),
        None => println!("session: {}", session.mode()),
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<(), IotWatchError> {
    iotwatch::init_tracing();

    let config = match std::env::args().nth(1) {
        Some(path) => ClientConfig::load(path).await?,
        None => ClientConfig::default(),
    };

    let watch = IotWatch::connect(config)?;
    let mut sessions = watch.subscribe_session();
    let mut snapshots = watch.telemetry().subscribe();

    watch.session().check_auth().await;
    render_session(&sessions.borrow_and_update());

    watch.telemetry().start().await?;
    render_snapshot(&snapshots.borrow_and_update());

    loop {
        tokio::select! {
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                render_snapshot(&snapshots.borrow_and_update());
            }
            changed = sessions.changed() => {
                if changed.is_err() {
                    break;
                }
                render_session(&sessions.borrow_and_update());
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted, stopping telemetry");
                break;
            }
        }
    }

    watch.telemetry().stop().await?;
    watch.shutdown().await
}
