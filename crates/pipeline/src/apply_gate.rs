//! Two-phase apply: validate, then apply.
//!
//! Both passes hand the identical bundle to the identical executable. The
//! real apply runs only after validation succeeded, so a manifest the cluster
//! rejects never mutates live state.

use tracing::{info, instrument, warn};

use crate::{ApplyMode, ApplyOutcome, ClusterApplier, ManifestBundle};

/// Runs bundles through a [`ClusterApplier`] using the validate-then-apply
/// protocol.
pub struct ApplyGate<'a> {
    applier: &'a dyn ClusterApplier,
}

impl<'a> ApplyGate<'a> {
    /// Creates a gate over `applier`.
    pub fn new(applier: &'a dyn ClusterApplier) -> Self {
        Self { applier }
    }

    /// Validates and then applies `bundle`.
    ///
    /// If validation fails its output is returned and the real apply is never
    /// attempted. The returned output is always the combined output of the
    /// last pass that ran.
    #[instrument(skip_all, fields(namespace = %bundle.namespace()))]
    pub async fn apply(&self, bundle: &ManifestBundle) -> ApplyOutcome {
        let manifests = bundle.render();

        let validation = self.pass(bundle, &manifests, ApplyMode::Validate).await;
        if !validation.success {
            warn!("validation failed; skipping apply");
            return validation;
        }

        let applied = self.pass(bundle, &manifests, ApplyMode::Apply).await;
        if applied.success {
            info!("applied");
        }
        applied
    }

    async fn pass(&self, bundle: &ManifestBundle, manifests: &str, mode: ApplyMode) -> ApplyOutcome {
        match self.applier.apply(bundle.namespace(), manifests, mode).await {
            Ok(out) if out.success => ApplyOutcome::succeeded(out.output),
            Ok(out) => {
                let detail = match out.exit_code {
                    Some(code) => format!("{mode} failed with exit code {code}"),
                    None => format!("{mode} terminated by signal"),
                };
                ApplyOutcome::failed(out.output, detail)
            }
            Err(err) => ApplyOutcome::failed(String::new(), format!("{mode} failed: {err}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::{ClusterError, CommandOutput, Namespace};

    #[derive(Default)]
    struct ScriptedCluster {
        fail_validation: bool,
        fail_apply: bool,
        calls: Mutex<Vec<(String, String, ApplyMode)>>,
    }

    #[async_trait]
    impl ClusterApplier for ScriptedCluster {
        async fn apply(
            &self,
            namespace: &Namespace,
            manifests: &str,
            mode: ApplyMode,
        ) -> Result<CommandOutput, ClusterError> {
            self.calls
                .lock()
                .unwrap()
                .push((namespace.to_string(), manifests.to_string(), mode));
            let fail = match mode {
                ApplyMode::Validate => self.fail_validation,
                ApplyMode::Apply => self.fail_apply,
            };
            Ok(CommandOutput {
                success: !fail,
                exit_code: Some(if fail { 1 } else { 0 }),
                output: format!("{mode} output"),
            })
        }
    }

    struct Unstartable;

    #[async_trait]
    impl ClusterApplier for Unstartable {
        async fn apply(
            &self,
            _: &Namespace,
            _: &str,
            _: ApplyMode,
        ) -> Result<CommandOutput, ClusterError> {
            Err(ClusterError::Spawn {
                program: "kubectl".into(),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            })
        }
    }

    fn bundle() -> ManifestBundle {
        ManifestBundle::new(Namespace::new("app").unwrap(), vec!["kind: Service\n".into()]).unwrap()
    }

    #[tokio::test]
    async fn validates_then_applies_identical_input() {
        let cluster = ScriptedCluster::default();
        let outcome = ApplyGate::new(&cluster).apply(&bundle()).await;

        assert!(outcome.success);
        assert_eq!(outcome.output, "apply output");
        let calls = cluster.calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].2, ApplyMode::Validate);
        assert_eq!(calls[1].2, ApplyMode::Apply);
        assert_eq!(calls[0].1, calls[1].1);
        assert_eq!(calls[0].0, "app");
    }

    #[tokio::test]
    async fn failed_validation_never_applies() {
        let cluster = ScriptedCluster {
            fail_validation: true,
            ..Default::default()
        };
        let outcome = ApplyGate::new(&cluster).apply(&bundle()).await;

        assert!(!outcome.success);
        assert_eq!(outcome.output, "validation output");
        assert_eq!(
            outcome.error.as_deref(),
            Some("validation failed with exit code 1")
        );
        assert_eq!(cluster.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failed_apply_returns_apply_output() {
        let cluster = ScriptedCluster {
            fail_apply: true,
            ..Default::default()
        };
        let outcome = ApplyGate::new(&cluster).apply(&bundle()).await;

        assert!(!outcome.success);
        assert_eq!(outcome.output, "apply output");
        assert_eq!(cluster.calls.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn same_bundle_same_outcome() {
        let cluster = ScriptedCluster {
            fail_validation: true,
            ..Default::default()
        };
        let gate = ApplyGate::new(&cluster);
        let first = gate.apply(&bundle()).await;
        let second = gate.apply(&bundle()).await;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn unstartable_executable_is_a_failed_outcome() {
        let outcome = ApplyGate::new(&Unstartable).apply(&bundle()).await;
        assert!(!outcome.success);
        assert!(outcome.error.unwrap().starts_with("validation failed: failed to start kubectl"));
    }
}
