//! Provenance metadata capture.
//!
//! Resolves where a copy came from at the moment it is detected. Copies
//! that originate from the host app's own editor get the host's fixed
//! identity: by the time polling observes the change, OS focus may already
//! have moved on, so sampling the frontmost app would attribute the copy
//! to the wrong application.

use std::sync::Arc;

use crate::models::EntryOrigin;

/// Best-effort snapshot of the frontmost application. Any field may be
/// absent; absent values are carried through as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrontmostApp {
    pub name: Option<String>,
    pub bundle_id: Option<String>,
    pub pid: Option<i32>,
    pub window_title: Option<String>,
}

pub trait AppInfoProvider: Send + Sync {
    fn frontmost_app(&self) -> FrontmostApp;
}

/// Provider for headless hosts and tests: reports nothing.
pub struct NoFrontmostApp;

impl AppInfoProvider for NoFrontmostApp {
    fn frontmost_app(&self) -> FrontmostApp {
        FrontmostApp::default()
    }
}

/// The host application's own identity, substituted for editor-origin
/// copies.
#[derive(Debug, Clone)]
pub struct HostIdentity {
    pub app_name: String,
    pub bundle_identifier: String,
    pub editor_window_title: String,
}

pub struct MetadataCapture {
    provider: Arc<dyn AppInfoProvider>,
    host: HostIdentity,
}

impl MetadataCapture {
    pub fn new(provider: Arc<dyn AppInfoProvider>, host: HostIdentity) -> Self {
        Self { provider, host }
    }

    /// Resolve provenance for a copy detected now.
    pub fn capture(&self, from_editor: bool) -> EntryOrigin {
        if from_editor {
            return EntryOrigin {
                source_app: Some(self.host.app_name.clone()),
                window_title: Some(self.host.editor_window_title.clone()),
                bundle_identifier: Some(self.host.bundle_identifier.clone()),
                process_id: Some(std::process::id() as i32),
                is_from_editor: true,
            };
        }

        let app = self.provider.frontmost_app();
        EntryOrigin {
            source_app: app.name,
            window_title: app.window_title,
            bundle_identifier: app.bundle_id,
            process_id: app.pid,
            is_from_editor: false,
        }
    }
}
