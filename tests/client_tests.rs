mod common;

use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;

use common::{playing, settle, track, FakeRadio};
use radio_request_rs::{RadioClient, RadioError, RadioEvent, Settings, SyncState};

fn client(fake: &Arc<FakeRadio>) -> RadioClient {
    RadioClient::with_service(fake.clone(), &Settings::default())
}

#[tokio::test(start_paused = true)]
async fn test_start_syncs_and_resolves_session() {
    let fake = Arc::new(FakeRadio::with_now_playing(playing("a", 200_000, 0)));
    fake.set_authenticated(Some(true));
    fake.set_my_requests(vec![track("mine", 1_000)]);
    let client = client(&fake);
    let mut events = client.event_receiver();

    assert!(!client.is_privileged());
    assert!(client.start().await);
    assert!(client.is_privileged());
    assert!(client.submitter().is_requested("mine"));

    let mut np = client.subscribe_now_playing();
    np.wait_for(|s| s.track().track_id == "a").await.unwrap();
    assert_eq!(client.now_playing().track().title, "Title a");

    let mut resolved = false;
    while let Ok(event) = events.try_recv() {
        resolved |= matches!(event, RadioEvent::SessionResolved { privileged: true });
    }
    assert!(resolved);
}

#[tokio::test(start_paused = true)]
async fn test_unprivileged_client_prompts_sign_in() {
    let fake = Arc::new(FakeRadio::new());
    fake.set_authenticated(Some(false));
    let client = client(&fake);

    assert!(!client.start().await);
    let err = client.request(&track("song-1", 1_000)).await.unwrap_err();
    assert!(matches!(err, RadioError::Unauthorized));
    assert_eq!(client.login_url(), "http://localhost:8000/api/login");
    assert_eq!(fake.submit_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_visibility_change_triggers_resync() {
    let fake = Arc::new(FakeRadio::with_now_playing(playing("a", 200_000, 0)));
    fake.set_authenticated(Some(false));
    let client = client(&fake);

    client.start().await;
    let mut state = client.synchronizer().subscribe_state();
    state.wait_for(|s| s.is_scheduled()).await.unwrap();
    let polls = fake.now_playing_count();

    client.on_visibility_change(false);
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    assert_eq!(fake.now_playing_count(), polls);

    client.on_visibility_change(true);
    settle(|| fake.now_playing_count() == polls + 1).await;
}

#[tokio::test(start_paused = true)]
async fn test_search_then_request_flow() {
    let fake = Arc::new(FakeRadio::new());
    fake.set_authenticated(Some(true));
    fake.set_search_results("one more time", vec![track("omt", 320_000)]);
    fake.echo_votes(Some(2));
    let client = client(&fake);
    client.start().await;

    client.search_input("one more time");
    sleep(Duration::from_millis(501)).await;
    let picked = client.search_results().tracks[0].clone();

    let updated = client.request(&picked).await.unwrap();
    assert_eq!(updated.votes, 2);
    assert!(matches!(
        client.request(&picked).await,
        Err(RadioError::DuplicateRequest(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_stop_halts_polling_and_clears_search() {
    let fake = Arc::new(FakeRadio::with_now_playing(playing("a", 1_000, 0)));
    fake.set_authenticated(Some(false));
    let client = client(&fake);

    client.start().await;
    client.search_input("pending");
    client.stop();

    assert_eq!(client.synchronizer().state(), SyncState::Idle);
    assert!(!client.search().is_pending());
    let polls = fake.now_playing_count();

    sleep(Duration::from_secs(30)).await;
    assert_eq!(fake.now_playing_count(), polls);
    assert!(fake.searches().is_empty());
}
