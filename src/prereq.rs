//! Startup prerequisites checked before the model is loaded.

use std::time::Duration;

use anyhow::{anyhow, Result};

pub trait Prerequisite {
    fn name(&self) -> &str;

    fn check(&self) -> Result<()>;
}

/// Used when the operator runs offline.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoPrerequisite;

impl Prerequisite for NoPrerequisite {
    fn name(&self) -> &str {
        "none"
    }

    fn check(&self) -> Result<()> {
        Ok(())
    }
}

/// HTTP reachability probe. Any HTTP response, including an error status,
/// proves the network is up; only transport failures count as offline.
#[derive(Clone, Debug)]
pub struct ConnectivityProbe {
    url: String,
    timeout: Duration,
}

impl ConnectivityProbe {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            timeout,
        }
    }
}

impl Prerequisite for ConnectivityProbe {
    fn name(&self) -> &str {
        "connectivity"
    }

    fn check(&self) -> Result<()> {
        let agent = ureq::AgentBuilder::new().timeout(self.timeout).build();
        match agent.get(&self.url).call() {
            Ok(_) => Ok(()),
            Err(ureq::Error::Status(code, _)) => {
                log::debug!("connectivity probe {} answered {}", self.url, code);
                Ok(())
            }
            Err(ureq::Error::Transport(err)) => {
                Err(anyhow!("could not reach {}: {}", self.url, err))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offline_prerequisite_always_passes() {
        assert!(NoPrerequisite.check().is_ok());
    }

    #[test]
    fn unreachable_probe_fails() {
        let probe = ConnectivityProbe::new("http://127.0.0.1:9/", Duration::from_millis(500));
        let err = probe.check().unwrap_err();
        assert!(err.to_string().contains("127.0.0.1:9"));
    }
}
