//! Light/heavy classification.
//!
//! [`classify`] is the pure decision function; [`ClassifierStage`] plugs it
//! into a [`DispatchLoop`](crate::dispatch::DispatchLoop) and picks the
//! destination topic.

pub mod stage;

use serde::{Deserialize, Serialize};

use crate::job::JobAttributes;

pub use stage::ClassifierStage;

/// Jobs at or above any of these sizes are heavy.
pub const HEAVY_FILE_SIZE_MB: u32 = 50;
pub const HEAVY_PAGE_COUNT: u32 = 200;
pub const HEAVY_IMAGE_COUNT: u32 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Route {
    Light,
    Heavy,
}

impl Route {
    pub fn as_str(&self) -> &'static str {
        match self {
            Route::Light => "light",
            Route::Heavy => "heavy",
        }
    }
}

impl std::fmt::Display for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Route a job by its declared size. Thresholds are inclusive; first match wins.
pub fn classify(attributes: &JobAttributes) -> Route {
    if attributes.file_size_mb >= HEAVY_FILE_SIZE_MB {
        return Route::Heavy;
    }
    if attributes.page_count >= HEAVY_PAGE_COUNT {
        return Route::Heavy;
    }
    if attributes.image_count >= HEAVY_IMAGE_COUNT {
        return Route::Heavy;
    }
    Route::Light
}
