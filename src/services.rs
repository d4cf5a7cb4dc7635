//! Host collaborators shared by onboarding and the tour.

use std::sync::Arc;

use crate::navigation::Navigator;
use crate::profile::ProfileStore;
use crate::storage::FlagStore;

/// Everything a guided flow talks to outside its own session.
#[derive(Clone)]
pub struct GuideServices {
    pub profiles: Arc<dyn ProfileStore>,
    pub flags: FlagStore,
    pub navigator: Arc<dyn Navigator>,
}

impl GuideServices {
    pub fn new(
        profiles: Arc<dyn ProfileStore>,
        flags: FlagStore,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self {
            profiles,
            flags,
            navigator,
        }
    }
}
