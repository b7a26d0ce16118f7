//! Wiring of a fresh call session to its interview driver.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{Instrument, info, info_span};

use super::driver::{Collaborators, DialogueDriver, DialoguePolicy};
use super::script::InterviewScript;
use crate::core::artifacts::SessionArtifacts;
use crate::core::session::{CallSession, DriverLauncher};
use crate::core::transport::{CallTransport, ControlPlane, TelephonyApi, TransportTimeouts};

/// Builds the transport and driver for every new call and runs it on its own task.
#[derive(Clone)]
pub struct InterviewLauncher {
    control: Arc<dyn ControlPlane>,
    telephony: Arc<dyn TelephonyApi>,
    collaborators: Collaborators,
    script: Arc<InterviewScript>,
    policy: DialoguePolicy,
    timeouts: TransportTimeouts,
    recordings_dir: PathBuf,
}

impl InterviewLauncher {
    pub fn new(
        control: Arc<dyn ControlPlane>,
        telephony: Arc<dyn TelephonyApi>,
        collaborators: Collaborators,
        script: Arc<InterviewScript>,
        policy: DialoguePolicy,
        timeouts: TransportTimeouts,
        recordings_dir: PathBuf,
    ) -> Self {
        Self {
            control,
            telephony,
            collaborators,
            script,
            policy,
            timeouts,
            recordings_dir,
        }
    }
}

impl DriverLauncher for InterviewLauncher {
    fn launch(&self, session: Arc<CallSession>) -> JoinHandle<()> {
        let call_id = session.id().to_string();
        let artifacts = SessionArtifacts::for_call(&self.recordings_dir, &call_id);
        let artifact_dir = artifacts.dir().to_path_buf();

        let transport = CallTransport::new(
            session.clone(),
            self.control.clone(),
            self.telephony.clone(),
            artifacts,
            self.timeouts,
        );
        let driver = DialogueDriver::new(
            call_id.clone(),
            Arc::new(transport),
            self.collaborators.clone(),
            self.script.clone(),
            self.policy,
            session.cancel_token().clone(),
            artifact_dir,
        )
        .with_session(session);

        let span = info_span!("interview", call_id = %call_id);
        tokio::spawn(
            async move {
                let outcome = driver.run().await;
                info!(?outcome, "Interview driver finished");
            }
            .instrument(span),
        )
    }
}
