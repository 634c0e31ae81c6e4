//! Async side of the room: runs controller effects on tokio.
//!
//! The controller queues `Effect` values; `RoomDriver::dispatch` spawns a task
//! for each one and the task sends a `RoomEvent` back over an mpsc channel.
//! Tasks are grouped by session epoch so `CancelSession` can abort everything
//! a finished session still had in flight.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep, sleep_until, Duration, Instant};

use crate::models::MessageId;

use super::controller::{Effect, RoomEvent};
use super::media::MediaDevices;
use super::session::SessionEpoch;
use super::simulation::{ScriptAction, SimulationScript};

/// Effect executor. Owns the media backend and the simulation script.
pub struct RoomDriver<D> {
    devices: Arc<D>,
    script: Arc<SimulationScript>,
    event_tx: mpsc::UnboundedSender<RoomEvent>,
    event_rx: mpsc::UnboundedReceiver<RoomEvent>,
    tasks: HashMap<SessionEpoch, Vec<JoinHandle<()>>>,
}

/// Send an event, stopping any stream it carries if nobody is listening.
fn emit(tx: &mpsc::UnboundedSender<RoomEvent>, event: RoomEvent) {
    if let Err(mpsc::error::SendError(event)) = tx.send(event) {
        tracing::debug!("Room event channel closed -- event dropped");
        event.discard();
    }
}

impl<D: MediaDevices + 'static> RoomDriver<D> {
    pub fn new(devices: D, script: SimulationScript) -> Self {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        Self {
            devices: Arc::new(devices),
            script: Arc::new(script),
            event_tx,
            event_rx,
            tasks: HashMap::new(),
        }
    }

    /// Receive the next event.
    ///
    /// The driver keeps a sender alive, so this only suspends; it never
    /// reports a closed channel. Designed to be used inside `tokio::select!`.
    pub async fn recv(&mut self) -> Option<RoomEvent> {
        self.event_rx.recv().await
    }

    /// Tasks for `epoch` that have not finished yet.
    #[cfg(test)]
    pub fn pending_tasks(&self, epoch: SessionEpoch) -> usize {
        self.tasks
            .get(&epoch)
            .map(|handles| handles.iter().filter(|h| !h.is_finished()).count())
            .unwrap_or(0)
    }

    fn spawn<F>(&mut self, epoch: SessionEpoch, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handles = self.tasks.entry(epoch).or_default();
        handles.retain(|h| !h.is_finished());
        handles.push(tokio::spawn(task));
    }

    /// Execute a batch of effects, in order.
    pub fn dispatch(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            self.execute(effect);
        }
    }

    fn execute(&mut self, effect: Effect) {
        tracing::debug!(?effect, "Dispatching effect");
        let tx = self.event_tx.clone();
        match effect {
            Effect::AcquireCameraAndMic { epoch } => {
                let devices = Arc::clone(&self.devices);
                self.spawn(epoch, async move {
                    let result = devices.open_user_media().await;
                    emit(&tx, RoomEvent::CameraAndMicResolved { epoch, result });
                });
            }
            Effect::StartDisplayCapture { epoch } => {
                let devices = Arc::clone(&self.devices);
                self.spawn(epoch, async move {
                    let capture = match devices.open_display_media().await {
                        Ok(capture) => capture,
                        Err(e) => {
                            emit(
                                &tx,
                                RoomEvent::DisplayCaptureResolved {
                                    epoch,
                                    result: Err(e),
                                },
                            );
                            return;
                        }
                    };
                    let stream = capture.stream.id().clone();
                    emit(
                        &tx,
                        RoomEvent::DisplayCaptureResolved {
                            epoch,
                            result: Ok(capture.stream),
                        },
                    );
                    // A dropped sender means the backend let go of the capture
                    // without an out-of-band end.
                    if capture.ended.await.is_ok() {
                        tracing::info!(%stream, "Screen capture ended outside the app");
                        emit(&tx, RoomEvent::ScreenShareEnded { epoch, stream });
                    }
                });
            }
            Effect::ScheduleAdmission { epoch, after } => {
                self.spawn(epoch, async move {
                    sleep(after).await;
                    emit(&tx, RoomEvent::AdmissionGranted { epoch });
                });
            }
            Effect::StartSimulation {
                epoch,
                meeting,
                local_name,
                local_is_host,
            } => {
                let steps = self.script.plan(&meeting, &local_name, local_is_host);
                tracing::debug!(%epoch, steps = steps.len(), "Starting simulation");
                self.spawn(epoch, async move {
                    let start = Instant::now();
                    for step in steps {
                        sleep_until(start + step.after).await;
                        let event = match step.action {
                            ScriptAction::Join { name } => {
                                RoomEvent::ParticipantJoined { epoch, name }
                            }
                            ScriptAction::Arrive { name } => {
                                RoomEvent::ParticipantArrived { epoch, name }
                            }
                            ScriptAction::Say { author, text } => RoomEvent::RemoteMessage {
                                epoch,
                                author,
                                text,
                            },
                        };
                        emit(&tx, event);
                    }
                });
            }
            Effect::ScheduleReplies {
                epoch,
                message,
                author,
            } => self.schedule_reply(epoch, message, author, tx),
            Effect::CancelSession { epoch } => {
                let handles = self.tasks.remove(&epoch).unwrap_or_default();
                let aborted = handles.iter().filter(|h| !h.is_finished()).count();
                for handle in handles {
                    handle.abort();
                }
                tracing::debug!(%epoch, aborted, "Session tasks cancelled");
            }
        }
    }

    fn schedule_reply(
        &mut self,
        epoch: SessionEpoch,
        message: MessageId,
        author: String,
        tx: mpsc::UnboundedSender<RoomEvent>,
    ) {
        let Some(reaction) = self.script.reaction.as_ref() else {
            return;
        };
        let after = Duration::from_millis(reaction.after_ms);
        let emoji = reaction.emoji.clone();
        self.spawn(epoch, async move {
            sleep(after).await;
            emit(
                &tx,
                RoomEvent::RemoteReaction {
                    epoch,
                    message,
                    author,
                    emoji,
                },
            );
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Meeting;
    use crate::room::controller::{JoinOutcome, MeetingController, RoomPhase, RoomSettings};
    use crate::room::sim_devices::{PromptOutcome, SimulatedDeviceConfig, SimulatedDevices};
    use crate::room::session::LocalMedia;

    fn meeting() -> Meeting {
        Meeting {
            id: "prayer".to_string(),
            title: "Morning Prayer".to_string(),
            host: "Pastor John".to_string(),
            start_time: "Mon 6:30 AM".to_string(),
            description: String::new(),
            participants: 0,
        }
    }

    fn setup(
        camera: PromptOutcome,
    ) -> (
        MeetingController,
        RoomDriver<SimulatedDevices>,
        SimulatedDevices,
    ) {
        let devices = SimulatedDevices::new(SimulatedDeviceConfig {
            camera,
            screen: PromptOutcome::Grant,
            prompt_delay_ms: 300,
        });
        let driver = RoomDriver::new(devices.clone(), SimulationScript::default());
        (MeetingController::new(RoomSettings::default()), driver, devices)
    }

    /// Dispatch pending effects, then apply the next event.
    async fn step(c: &mut MeetingController, d: &mut RoomDriver<SimulatedDevices>) -> bool {
        d.dispatch(c.drain_effects());
        let event = tokio::time::timeout(Duration::from_secs(60), d.recv())
            .await
            .expect("no event within a minute")
            .expect("channel open");
        let applied = c.handle_event(event);
        d.dispatch(c.drain_effects());
        applied
    }

    #[tokio::test(start_paused = true)]
    async fn test_host_gets_camera_and_seeded_roster() {
        let (mut c, mut d, devices) = setup(PromptOutcome::Grant);
        c.request_join(meeting()).unwrap();
        assert_eq!(c.submit_name("Pastor John").unwrap(), JoinOutcome::Admitted);

        // Seeded participants join at t=0, before the 300ms camera prompt.
        for _ in 0..3 {
            assert!(step(&mut c, &mut d).await);
        }
        let session = c.session().unwrap();
        assert_eq!(session.roster().len(), 3);
        assert!(matches!(session.local_media(), LocalMedia::Live(_)));
        assert_eq!(devices.live_tracks(), 2);

        c.leave();
        d.dispatch(c.drain_effects());
        assert_eq!(devices.live_tracks(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_guest_admitted_after_delay() {
        let (mut c, mut d, _) = setup(PromptOutcome::Grant);
        c.request_join(meeting()).unwrap();
        assert_eq!(c.submit_name("Ruth").unwrap(), JoinOutcome::Waiting);
        let start = Instant::now();

        // Camera prompt resolves while still waiting.
        assert!(step(&mut c, &mut d).await);
        assert_eq!(c.phase(), RoomPhase::WaitingForAdmission);

        assert!(step(&mut c, &mut d).await);
        assert_eq!(c.phase(), RoomPhase::Active);
        assert!(start.elapsed() >= Duration::from_millis(3000));

        // The meeting host is now in the room alongside the script's cast.
        step(&mut c, &mut d).await;
        let roster = c.session().unwrap().roster();
        assert!(roster.remote_participants()[0].is_host);
    }

    #[tokio::test(start_paused = true)]
    async fn test_denied_camera_degrades() {
        let (mut c, mut d, devices) = setup(PromptOutcome::Deny);
        c.request_join(meeting()).unwrap();
        c.submit_name("Pastor John").unwrap();
        while matches!(c.session().unwrap().local_media(), LocalMedia::Pending) {
            step(&mut c, &mut d).await;
        }
        assert!(matches!(
            c.session().unwrap().local_media(),
            LocalMedia::Unavailable(_)
        ));
        assert_eq!(c.phase(), RoomPhase::Active);
        assert!(devices.probes().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_leave_during_prompt_cancels_work() {
        let (mut c, mut d, devices) = setup(PromptOutcome::Grant);
        let epoch = c.request_join(meeting()).unwrap();
        c.submit_name("Ruth").unwrap();
        d.dispatch(c.drain_effects());
        assert!(d.pending_tasks(epoch) > 0);

        c.leave();
        d.dispatch(c.drain_effects());
        assert_eq!(d.pending_tasks(epoch), 0);

        let next = tokio::time::timeout(Duration::from_secs(10), d.recv()).await;
        assert!(next.is_err(), "cancelled session still produced an event");
        assert!(devices.probes().is_empty());
        assert_eq!(c.phase(), RoomPhase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_out_of_band_screen_end() {
        let (mut c, mut d, devices) = setup(PromptOutcome::Grant);
        c.request_join(meeting()).unwrap();
        c.submit_name("Pastor John").unwrap();
        while !matches!(c.session().unwrap().local_media(), LocalMedia::Live(_)) {
            step(&mut c, &mut d).await;
        }

        c.toggle_screen_share().unwrap();
        while !c.session().unwrap().is_presenting() {
            step(&mut c, &mut d).await;
        }
        assert!(c.session().unwrap().pip_visible());

        assert!(devices.end_screen_share());
        while c.session().unwrap().is_presenting() {
            step(&mut c, &mut d).await;
        }
        assert!(!c.session().unwrap().pip_visible());
        let screen = devices
            .probes()
            .into_iter()
            .find(|p| p.kind() == crate::room::media::TrackKind::Screen)
            .unwrap();
        assert_eq!(screen.stop_calls(), 1);
        assert_eq!(c.open_tracks(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_remote_reaction_to_local_message() {
        let (mut c, mut d, _) = setup(PromptOutcome::Grant);
        c.request_join(meeting()).unwrap();
        c.submit_name("Pastor John").unwrap();
        // Wait for someone to be in the room to answer.
        while c.session().unwrap().roster().remote_participants().is_empty() {
            step(&mut c, &mut d).await;
        }

        let id = c.send_message("Let us pray").unwrap().unwrap();
        let summary = loop {
            step(&mut c, &mut d).await;
            let summary = c.session().unwrap().chat().reaction_summary(&id, "Pastor John");
            if !summary.is_empty() {
                break summary;
            }
        };
        assert_eq!(summary[0].emoji, "🙏");
        assert_eq!(summary[0].count, 1);
        assert!(!summary[0].mine);
    }

    #[tokio::test(start_paused = true)]
    async fn test_removed_participant_stays_quiet() {
        let (mut c, mut d, _) = setup(PromptOutcome::Grant);
        c.request_join(meeting()).unwrap();
        c.submit_name("Pastor John").unwrap();
        while c.session().unwrap().roster().len() < 3 {
            step(&mut c, &mut d).await;
        }
        let sarah = c
            .session()
            .unwrap()
            .roster()
            .remote_participants()
            .iter()
            .find(|p| p.name == "Sarah")
            .unwrap()
            .id
            .clone();
        assert!(c.remove(&sarah));

        let id = c.send_message("Let us pray").unwrap().unwrap();
        let start = Instant::now();
        while start.elapsed() < Duration::from_secs(5) {
            step(&mut c, &mut d).await;
        }

        let chat = c.session().unwrap().chat();
        let authors: Vec<_> = chat.messages().iter().map(|m| m.author.as_str()).collect();
        assert_eq!(authors, vec!["Pastor John", "Mike"]);
        let reactions = &chat.get(&id).unwrap().reactions;
        assert_eq!(
            reactions["🙏"].iter().cloned().collect::<Vec<_>>(),
            vec!["Mike".to_string()]
        );
    }
}
