use super::chat::print_status_details;
use super::AppContext;
use crate::events::StatusEvent;
use crate::session::StatusMonitor;
use std::sync::Arc;

pub async fn show_status(ctx: &AppContext, watch: bool) -> anyhow::Result<()> {
    let monitor = Arc::new(StatusMonitor::new(ctx.remote.clone()));
    println!("Server: {}", ctx.remote.base_url());

    if !watch {
        let status = monitor.poll_once().await;
        print_status_details(&status);
        return Ok(());
    }

    let mut events = monitor.subscribe();
    let poller = monitor.clone().spawn(ctx.settings.status_interval());
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(StatusEvent::Updated(status)) => {
                    println!("--- {} ---", chrono::Local::now().format("%H:%M:%S"));
                    print_status_details(&status);
                }
                None => break,
            },
            signal = tokio::signal::ctrl_c() => {
                signal?;
                break;
            }
        }
    }
    poller.abort();
    Ok(())
}
