use async_trait::async_trait;
use tracing::debug;

use super::FileHandle;

/// Current access state of a handle, as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionState {
    Granted,
    Denied,
    /// Access is possible but the user has to be asked first.
    Prompt,
}

/// Result of [`ensure_permission`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionOutcome {
    Granted,
    Denied,
    PromptDeclined,
}

impl PermissionOutcome {
    #[must_use]
    pub fn is_granted(self) -> bool {
        matches!(self, Self::Granted)
    }
}

#[async_trait]
pub trait PermissionGate: Send + Sync {
    /// Report the current state without asking the user anything.
    async fn query(&self, handle: &FileHandle) -> PermissionState;

    /// Ask the user for access. Only called while the state is `Prompt`.
    async fn request(&self, handle: &FileHandle) -> PermissionState;
}

/// Check access and, if the gate is undecided, ask exactly once.
pub async fn ensure_permission(gate: &dyn PermissionGate, handle: &FileHandle) -> PermissionOutcome {
    match gate.query(handle).await {
        PermissionState::Granted => PermissionOutcome::Granted,
        PermissionState::Denied => PermissionOutcome::Denied,
        PermissionState::Prompt => match gate.request(handle).await {
            PermissionState::Granted => PermissionOutcome::Granted,
            PermissionState::Denied | PermissionState::Prompt => {
                debug!(path = %handle.path().display(), "permission prompt declined");
                PermissionOutcome::PromptDeclined
            }
        },
    }
}

/// How [`FsPermissionGate`] answers a prompt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PromptPolicy {
    Accept,
    #[default]
    Decline,
}

/// Permission gate backed by filesystem metadata.
///
/// An existing writable file is granted, a read-only file or a missing parent
/// directory is denied, and a file that does not exist yet needs a prompt
/// before it is created.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsPermissionGate {
    policy: PromptPolicy,
}

impl FsPermissionGate {
    #[must_use]
    pub fn new(policy: PromptPolicy) -> Self {
        Self { policy }
    }
}

#[async_trait]
impl PermissionGate for FsPermissionGate {
    async fn query(&self, handle: &FileHandle) -> PermissionState {
        match tokio::fs::metadata(handle.path()).await {
            Ok(meta) if meta.is_file() && !meta.permissions().readonly() => {
                PermissionState::Granted
            }
            Ok(_) => PermissionState::Denied,
            Err(_) => {
                let parent = handle
                    .path()
                    .parent()
                    .filter(|p| !p.as_os_str().is_empty())
                    .unwrap_or_else(|| std::path::Path::new("."));
                match tokio::fs::metadata(parent).await {
                    Ok(meta) if meta.is_dir() => PermissionState::Prompt,
                    _ => PermissionState::Denied,
                }
            }
        }
    }

    async fn request(&self, _handle: &FileHandle) -> PermissionState {
        match self.policy {
            PromptPolicy::Accept => PermissionState::Granted,
            PromptPolicy::Decline => PermissionState::Prompt,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedGate {
        state: PermissionState,
        answer: PermissionState,
        requests: AtomicUsize,
    }

    impl ScriptedGate {
        fn new(state: PermissionState, answer: PermissionState) -> Self {
            Self {
                state,
                answer,
                requests: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl PermissionGate for ScriptedGate {
        async fn query(&self, _handle: &FileHandle) -> PermissionState {
            self.state
        }

        async fn request(&self, _handle: &FileHandle) -> PermissionState {
            self.requests.fetch_add(1, Ordering::SeqCst);
            self.answer
        }
    }

    #[tokio::test]
    async fn granted_and_denied_skip_the_prompt() {
        let handle = FileHandle::new("x.json");
        let granted = ScriptedGate::new(PermissionState::Granted, PermissionState::Denied);
        assert_eq!(
            ensure_permission(&granted, &handle).await,
            PermissionOutcome::Granted
        );
        let denied = ScriptedGate::new(PermissionState::Denied, PermissionState::Granted);
        assert_eq!(
            ensure_permission(&denied, &handle).await,
            PermissionOutcome::Denied
        );
        assert_eq!(granted.requests.load(Ordering::SeqCst), 0);
        assert_eq!(denied.requests.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn prompt_is_requested_once() {
        let handle = FileHandle::new("x.json");
        let accepting = ScriptedGate::new(PermissionState::Prompt, PermissionState::Granted);
        assert_eq!(
            ensure_permission(&accepting, &handle).await,
            PermissionOutcome::Granted
        );
        let declining = ScriptedGate::new(PermissionState::Prompt, PermissionState::Prompt);
        assert_eq!(
            ensure_permission(&declining, &handle).await,
            PermissionOutcome::PromptDeclined
        );
        assert_eq!(accepting.requests.load(Ordering::SeqCst), 1);
        assert_eq!(declining.requests.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn fs_gate_reads_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let existing = dir.path().join("progress.json");
        std::fs::write(&existing, "{}").unwrap();

        let gate = FsPermissionGate::new(PromptPolicy::Decline);
        assert_eq!(
            gate.query(&FileHandle::new(&existing)).await,
            PermissionState::Granted
        );
        assert_eq!(
            gate.query(&FileHandle::new(dir.path().join("new.json"))).await,
            PermissionState::Prompt
        );
        assert_eq!(
            gate.query(&FileHandle::new(dir.path().join("missing/new.json")))
                .await,
            PermissionState::Denied
        );
        assert_eq!(
            gate.query(&FileHandle::new(dir.path())).await,
            PermissionState::Denied
        );
    }
}
