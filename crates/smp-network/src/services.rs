//! The set of network services a server is connected to

use std::sync::Arc;

use tracing::info;

use crate::directory::DirectoryClient;
use crate::locator::LocatorClient;

/// Locator and directory clients, either of which may be absent
#[derive(Clone, Default)]
pub struct NetworkServices {
    locator: Option<Arc<dyn LocatorClient>>,
    directory: Option<Arc<dyn DirectoryClient>>,
}

impl std::fmt::Debug for NetworkServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkServices")
            .field("locator", &self.locator.as_ref().map(|l| l.name().to_string()))
            .field("directory", &self.directory.as_ref().map(|d| d.name().to_string()))
            .finish()
    }
}

impl NetworkServices {
    /// No network services
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_locator(mut self, locator: Arc<dyn LocatorClient>) -> Self {
        info!(sml = locator.name(), "Connected locator service");
        self.locator = Some(locator);
        self
    }

    pub fn with_directory(mut self, directory: Arc<dyn DirectoryClient>) -> Self {
        info!(directory = directory.name(), "Connected directory service");
        self.directory = Some(directory);
        self
    }

    pub fn locator(&self) -> Option<&Arc<dyn LocatorClient>> {
        self.locator.as_ref()
    }

    pub fn directory(&self) -> Option<&Arc<dyn DirectoryClient>> {
        self.directory.as_ref()
    }
}
