use std::error::Error;
use tokio::sync::broadcast;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use radio_request_rs::{RadioClient, RadioEvent};

/// Follows the station from the command line.
///
/// Reads `RADIO_API_URL` (and optionally `RADIO_SESSION_COOKIE`) from the
/// environment or a `.env` file. Any command-line arguments are joined and
/// typed into the search box; with a privileged session the first result is
/// requested.
#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let client = RadioClient::from_env()?;
    let mut events = client.event_receiver();

    let privileged = client.start().await;
    if !privileged {
        println!("Not signed in. Sign in at {}", client.login_url());
    }

    let query = std::env::args().skip(1).collect::<Vec<_>>().join(" ");
    if !query.is_empty() {
        client.search_input(&query);
    }

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = events.recv() => {
                let event = match event {
                    Ok(event) => event,
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                };
                match event {
                    RadioEvent::NowPlayingChanged(np) if np.is_nothing_playing() => {
                        println!("Nothing playing right now");
                    }
                    RadioEvent::NowPlayingChanged(np) => {
                        println!(
                            "Now playing: {} - {} ({}s left)",
                            np.track.title,
                            np.track.artist_line(),
                            np.remaining_ms() / 1000
                        );
                    }
                    RadioEvent::QueueChanged(queue) => {
                        println!("Up next:");
                        for (i, track) in queue.iter().enumerate() {
                            println!("  {}. {} ({} votes)", i + 1, track.title, track.votes);
                        }
                    }
                    RadioEvent::SearchCompleted { query, results } => {
                        println!("{} results for \"{}\"", results, query);
                        if privileged {
                            if let Some(first) = client.search_results().tracks.first() {
                                match client.request(first).await {
                                    Ok(track) => println!("Requested {} ({} votes)", track.title, track.votes),
                                    Err(e) => println!("Request failed: {}", e),
                                }
                            }
                        }
                    }
                    RadioEvent::SearchFailed { query } => println!("Search for \"{}\" failed", query),
                    other => tracing::debug!(event = other.event_type(), "Event"),
                }
            }
        }
    }

    client.stop();
    Ok(())
}
