use std::fmt;
use std::sync::Arc;

use tracing::{debug, info};

use crate::client::{EbecoClient, EbecoClientBuilder};
use crate::device::DeviceData;
use crate::settings::DeviceSettings;
use crate::token::Credentials;
use crate::types::Regulator;
use crate::{Error, Result};

/// A thermostat found on the account, ready to be added to the host.
#[derive(Debug, Clone, PartialEq)]
pub struct PairingCandidate {
    pub name: String,
    pub data: DeviceData,
    pub settings: DeviceSettings,
}

type BuilderFn = Box<dyn Fn(Credentials) -> EbecoClientBuilder + Send + Sync>;

enum Step {
    Start,
    LoggedIn,
    Listed(Vec<PairingCandidate>),
    Selected(PairingCandidate),
}

impl Step {
    fn name(&self) -> &'static str {
        match self {
            Step::Start => "start",
            Step::LoggedIn => "logged in",
            Step::Listed(_) => "device list",
            Step::Selected(_) => "device selected",
        }
    }
}

/// Adding a thermostat: `login`, `list_devices`, `select_device`, then
/// `select_regulator`. Each step needs the previous one to have succeeded.
pub struct PairingSession {
    builder: BuilderFn,
    client: Option<Arc<EbecoClient>>,
    credentials: Option<Credentials>,
    step: Step,
}

impl PairingSession {
    pub fn new() -> Self {
        Self::with_builder(EbecoClient::builder)
    }

    /// Use `builder` to create the account client, e.g. to point at another
    /// endpoint.
    pub fn with_builder<F>(builder: F) -> Self
    where
        F: Fn(Credentials) -> EbecoClientBuilder + Send + Sync + 'static,
    {
        Self {
            builder: Box::new(builder),
            client: None,
            credentials: None,
            step: Step::Start,
        }
    }

    /// Validate the credentials against the vendor. May be repeated to switch
    /// account; doing so discards earlier progress.
    pub async fn login(&mut self, credentials: Credentials) -> Result<()> {
        let client = (self.builder)(credentials.clone()).build()?;
        client.login().await?;
        info!("pairing login succeeded");
        self.client = Some(Arc::new(client));
        self.credentials = Some(credentials);
        self.step = Step::LoggedIn;
        Ok(())
    }

    pub async fn list_devices(&mut self) -> Result<Vec<PairingCandidate>> {
        let (Some(client), Some(credentials)) = (&self.client, &self.credentials) else {
            return Err(self.out_of_order("list_devices"));
        };
        let candidates: Vec<PairingCandidate> = client
            .get_user_devices()
            .await?
            .into_iter()
            .map(|d| PairingCandidate {
                name: d.display_name.clone(),
                data: DeviceData {
                    id: d.id,
                    name: d.display_name,
                },
                settings: DeviceSettings::new(credentials.clone()),
            })
            .collect();
        debug!(count = candidates.len(), "pairing candidates");
        self.step = Step::Listed(candidates.clone());
        Ok(candidates)
    }

    pub fn select_device(&mut self, id: u64) -> Result<PairingCandidate> {
        let candidate = match &self.step {
            Step::Listed(candidates) => candidates
                .iter()
                .find(|c| c.data.id == id)
                .cloned()
                .ok_or(Error::DeviceNotFound(id))?,
            _ => return Err(self.out_of_order("select_device")),
        };
        self.step = Step::Selected(candidate.clone());
        Ok(candidate)
    }

    /// Final step. Returns the candidate with its regulator setting applied.
    pub fn select_regulator(&mut self, regulator: Regulator) -> Result<PairingCandidate> {
        if let Step::Selected(candidate) = &mut self.step {
            candidate.settings.regulator = regulator;
            return Ok(candidate.clone());
        }
        Err(self.out_of_order("select_regulator"))
    }

    /// The account client, once logged in. Devices paired in this session
    /// can share it.
    pub fn client(&self) -> Option<Arc<EbecoClient>> {
        self.client.clone()
    }

    fn out_of_order(&self, op: &str) -> Error {
        Error::Pairing(format!("{op} is not allowed at step '{}'", self.step.name()))
    }
}

impl Default for PairingSession {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PairingSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PairingSession")
            .field("step", &self.step.name())
            .field("credentials", &self.credentials)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn steps_must_run_in_order() {
        let mut session = PairingSession::new();
        assert!(matches!(session.list_devices().await, Err(Error::Pairing(_))));
        assert!(matches!(session.select_device(1), Err(Error::Pairing(_))));
        assert!(matches!(
            session.select_regulator(Regulator::Room),
            Err(Error::Pairing(_))
        ));
    }

    #[tokio::test]
    async fn mock_account_pairs_without_network() {
        let mut session = PairingSession::new();
        session.login(Credentials::new("test", "test")).await.unwrap();
        let devices = session.list_devices().await.unwrap();
        assert_eq!(devices.len(), 3);
        assert!(devices.iter().all(|d| d.settings.interval == 30));
        assert!(devices.iter().all(|d| d.settings.regulator == Regulator::Floor));

        assert_eq!(session.select_device(2).unwrap().name, "Living Room");
        let paired = session.select_regulator(Regulator::Room).unwrap();
        assert_eq!(paired.data, DeviceData { id: 2, name: "Living Room".into() });
        assert_eq!(paired.settings.regulator, Regulator::Room);
        assert_eq!(paired.settings.username, "test");
    }

    #[tokio::test]
    async fn unknown_device_keeps_the_list() {
        let mut session = PairingSession::new();
        session.login(Credentials::new("test", "test")).await.unwrap();
        session.list_devices().await.unwrap();
        assert!(matches!(session.select_device(42), Err(Error::DeviceNotFound(42))));
        assert!(session.select_device(1).is_ok());
    }
}
