use std::thread;
use std::time::{Duration, Instant};

use compositor_scheduler::{
    DrawAndSwapResult, NullFrameSource, Scheduler, SchedulerClient, SchedulerRequest,
    SchedulerRequests, SchedulerSettings, VERSION, scheduler_channel,
};

#[derive(Default)]
struct EmbedderClient {
    dispatched: Vec<&'static str>,
    last_anticipated_draw_time: Option<Instant>,
}

impl SchedulerClient for EmbedderClient {
    fn scheduled_action_begin_frame(&mut self, _requests: &mut SchedulerRequests<'_>) {
        self.dispatched.push("begin_frame");
    }

    fn scheduled_action_commit(&mut self, _requests: &mut SchedulerRequests<'_>) {
        self.dispatched.push("commit");
    }

    fn scheduled_action_draw_and_swap_if_possible(
        &mut self,
        _requests: &mut SchedulerRequests<'_>,
    ) -> DrawAndSwapResult {
        self.dispatched.push("draw_if_possible");
        DrawAndSwapResult::drew_and_swapped()
    }

    fn scheduled_action_draw_and_swap_forced(
        &mut self,
        _requests: &mut SchedulerRequests<'_>,
    ) -> DrawAndSwapResult {
        self.dispatched.push("draw_forced");
        DrawAndSwapResult::drew_and_swapped()
    }

    fn scheduled_action_begin_context_recreation(&mut self, _requests: &mut SchedulerRequests<'_>) {
        self.dispatched.push("begin_context_recreation");
    }

    fn scheduled_action_acquire_layer_textures_for_main_thread(
        &mut self,
        _requests: &mut SchedulerRequests<'_>,
    ) {
        self.dispatched.push("acquire_layer_textures");
    }

    fn did_anticipated_draw_time_change(&mut self, time: Instant) {
        self.last_anticipated_draw_time = Some(time);
    }
}

fn ready_scheduler(client: &mut EmbedderClient) -> Scheduler {
    let mut scheduler = Scheduler::new(
        Box::new(NullFrameSource::new()),
        SchedulerSettings::default(),
    );
    scheduler.set_can_begin_frame(true, client);
    scheduler.set_visible(true, client);
    scheduler.set_can_draw(true, client);
    scheduler
}

#[test]
fn scenarios_binary_smoke_runs() {
    assert!(!VERSION.is_empty());
}

#[test]
fn commit_and_draw_through_the_public_api() {
    let mut client = EmbedderClient::default();
    let mut scheduler = ready_scheduler(&mut client);

    scheduler.set_needs_commit(&mut client);
    scheduler.begin_frame_complete(&mut client);
    scheduler.vsync_tick(false, &mut client);

    assert_eq!(
        client.dispatched,
        vec!["begin_frame", "commit", "draw_if_possible"]
    );
    assert!(client.last_anticipated_draw_time.is_some());
    assert!(!scheduler.commit_pending());
}

#[test]
fn throttled_ticks_do_not_draw() {
    let mut client = EmbedderClient::default();
    let mut scheduler = ready_scheduler(&mut client);
    scheduler.set_timebase_and_interval(Instant::now(), Duration::from_millis(8));

    scheduler.set_needs_redraw(&mut client);
    scheduler.vsync_tick(true, &mut client);
    assert!(client.dispatched.is_empty());

    scheduler.vsync_tick(false, &mut client);
    assert_eq!(client.dispatched, vec!["draw_if_possible"]);
    assert!(scheduler.anticipated_draw_time() >= Instant::now() - Duration::from_millis(8));
}

#[test]
fn context_loss_and_recovery_through_the_public_api() {
    let mut client = EmbedderClient::default();
    let mut scheduler = ready_scheduler(&mut client);

    scheduler.set_needs_commit(&mut client);
    client.dispatched.clear();

    scheduler.did_lose_context(&mut client);
    assert_eq!(client.dispatched, vec!["begin_context_recreation"]);

    client.dispatched.clear();
    scheduler.did_recreate_context(&mut client);
    scheduler.begin_frame_complete(&mut client);
    scheduler.vsync_tick(false, &mut client);
    assert_eq!(
        client.dispatched,
        vec!["begin_frame", "commit", "draw_if_possible"]
    );
}

#[test]
fn main_thread_requests_cross_threads_through_the_proxy() {
    let (proxy, mailbox) = scheduler_channel();

    let producer = thread::spawn(move || {
        proxy
            .post(SchedulerRequest::NeedsCommit)
            .expect("mailbox alive");
        proxy
            .post(SchedulerRequest::BeginFrameComplete)
            .expect("mailbox alive");
    });
    producer.join().expect("producer thread panicked");

    let mut client = EmbedderClient::default();
    let mut scheduler = ready_scheduler(&mut client);
    client.dispatched.clear();

    let applied = mailbox.drain_into(&mut scheduler, &mut client);
    assert_eq!(applied, 2);
    assert_eq!(client.dispatched, vec!["begin_frame", "commit"]);
}
