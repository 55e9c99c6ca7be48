//! An `AppDriver` that calls a `Dispatcher` living in the same process
//!
//! Stands in for the device automation layer when the app model runs next
//! to the tests. It honours platform export naming: only the name the
//! platform would actually expose is callable.

use std::sync::Arc;

use crate::backdoor::client::{AppDriver, Platform};
use crate::backdoor::dispatcher::Dispatcher;
use crate::error::{Result, StagehandError};
use crate::fixtures::BACKDOOR_EXPORT;

pub struct InProcessDriver {
    platform: Platform,
    export: String,
    dispatcher: Arc<Dispatcher>,
}

impl InProcessDriver {
    /// Expose `dispatcher` under the default backdoor export name.
    pub fn new(platform: Platform, dispatcher: Arc<Dispatcher>) -> Self {
        Self::with_export(platform, BACKDOOR_EXPORT, dispatcher)
    }

    pub fn with_export(platform: Platform, export: &str, dispatcher: Arc<Dispatcher>) -> Self {
        InProcessDriver {
            platform,
            export: platform.export_name(export),
            dispatcher,
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }
}

impl AppDriver for InProcessDriver {
    fn platform(&self) -> Platform {
        self.platform
    }

    fn invoke_export(&self, name: &str, argument: &str) -> Result<String> {
        if name != self.export {
            return Err(StagehandError::Invocation(format!(
                "no export named '{}' on {} (expected '{}')",
                name, self.platform, self.export
            )));
        }
        Ok(self.dispatcher.invoke(argument))
    }
}
