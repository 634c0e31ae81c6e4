//! Headless room run: join a meeting, let the simulation play out for a
//! while, log every transition, then leave.
//!
//! Acts on behalf of the local user the way a person at the keyboard would:
//! a host admits everyone who knocks, and everyone says hello once inside.

use tokio::time::{sleep, Duration};

use crate::models::Meeting;

use super::controller::{MeetingController, RoomPhase, RoomSettings};
use super::driver::RoomDriver;
use super::error::RoomError;
use super::media::MediaDevices;
use super::simulation::SimulationScript;

/// What happened during a headless run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Phases passed through, starting with `joining`.
    pub phases: Vec<RoomPhase>,
    /// Roster names at the end of the run, local participant first.
    pub roster: Vec<String>,
    /// `author: text` lines of the chat log.
    pub transcript: Vec<String>,
    /// Tracks the session still held when it left, all stopped by `leave`.
    pub tracks_released: usize,
}

pub async fn run_headless<D: MediaDevices + 'static>(
    settings: RoomSettings,
    devices: D,
    script: SimulationScript,
    meeting: Meeting,
    name: &str,
    duration: Duration,
) -> Result<RunSummary, RoomError> {
    let mut controller = MeetingController::new(settings);
    let mut driver = RoomDriver::new(devices, script);

    controller.request_join(meeting)?;
    let mut phases = vec![controller.phase()];
    let outcome = controller.submit_name(name)?;
    tracing::info!(?outcome, "Submitted name \"{}\"", name.trim());

    let deadline = sleep(duration);
    tokio::pin!(deadline);
    let mut greeted = false;

    loop {
        if phases.last() != Some(&controller.phase()) {
            tracing::info!(
                from = phases.last().map(|p| p.as_str()).unwrap_or("-"),
                to = controller.phase().as_str(),
                "Phase changed"
            );
            phases.push(controller.phase());
        }

        if controller.phase() == RoomPhase::Active {
            if !greeted {
                greeted = true;
                controller.send_message(&format!("Hello everyone, {} here", name.trim()))?;
            }
            admit_everyone(&mut controller);
        }

        driver.dispatch(controller.drain_effects());

        tokio::select! {
            _ = &mut deadline => break,
            Some(event) = driver.recv() => {
                tracing::debug!(?event, "Room event");
                controller.handle_event(event);
            }
        }
    }

    let (roster, transcript) = match controller.session() {
        Some(session) => (
            session
                .roster()
                .participants()
                .iter()
                .map(|p| p.name.clone())
                .collect(),
            session
                .chat()
                .messages()
                .iter()
                .map(|m| format!("{}: {}", m.author, m.text))
                .collect(),
        ),
        None => (Vec::new(), Vec::new()),
    };

    let tracks_released = controller.open_tracks();
    controller.leave();
    driver.dispatch(controller.drain_effects());
    tracing::info!(tracks_released, "Left the meeting");

    Ok(RunSummary {
        phases,
        roster,
        transcript,
        tracks_released,
    })
}

fn admit_everyone(controller: &mut MeetingController) {
    let waiting: Vec<_> = match controller.session() {
        Some(session) if session.roster().local_is_host() => {
            session.roster().waiting().map(|w| w.id.clone()).collect()
        }
        _ => return,
    };
    for id in waiting {
        controller.admit(&id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::room::sim_devices::{PromptOutcome, SimulatedDeviceConfig, SimulatedDevices};
    use crate::store::seed_meetings;

    fn bible_study() -> Meeting {
        seed_meetings()
            .into_iter()
            .find(|m| m.id == "bible-study")
            .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_host_run_admits_arrivals() {
        let devices = SimulatedDevices::new(SimulatedDeviceConfig::default());
        let summary = run_headless(
            RoomSettings::default(),
            devices.clone(),
            SimulationScript::default(),
            bible_study(),
            "Pastor John",
            Duration::from_secs(20),
        )
        .await
        .unwrap();

        assert_eq!(summary.phases, vec![RoomPhase::Joining, RoomPhase::Active]);
        assert_eq!(summary.roster[0], "Pastor John");
        assert!(summary.roster.contains(&"Grace".to_string()));
        assert!(summary.roster.contains(&"Daniel".to_string()));
        assert!(summary
            .transcript
            .contains(&"Pastor John: Hello everyone, Pastor John here".to_string()));
        assert_eq!(summary.tracks_released, 2);
        assert_eq!(devices.live_tracks(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_guest_run_waits_then_enters_without_camera() {
        let devices = SimulatedDevices::new(SimulatedDeviceConfig {
            camera: PromptOutcome::Deny,
            ..SimulatedDeviceConfig::default()
        });
        let summary = run_headless(
            RoomSettings::default(),
            devices.clone(),
            SimulationScript::default(),
            bible_study(),
            "Ruth",
            Duration::from_secs(10),
        )
        .await
        .unwrap();

        assert_eq!(
            summary.phases,
            vec![
                RoomPhase::Joining,
                RoomPhase::WaitingForAdmission,
                RoomPhase::Active
            ]
        );
        assert_eq!(summary.roster[0], "Ruth");
        assert!(summary.roster.contains(&"Pastor John".to_string()));
        assert_eq!(summary.tracks_released, 0);
        assert_eq!(devices.live_tracks(), 0);
    }

    #[tokio::test]
    async fn test_blank_name_is_rejected() {
        let devices = SimulatedDevices::new(SimulatedDeviceConfig::default());
        let err = run_headless(
            RoomSettings::default(),
            devices,
            SimulationScript::default(),
            bible_study(),
            "   ",
            Duration::from_secs(1),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, RoomError::Validation(_)));
    }
}
