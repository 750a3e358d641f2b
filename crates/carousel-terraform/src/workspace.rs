//! Workspace selection

use crate::RunnableFactory;
use carousel_core::{ControllerError, Runnable};
use std::sync::Arc;

/// Runnables used to prepare a workspace
#[derive(Clone)]
pub struct WorkspaceSelector {
    init: Arc<dyn Runnable>,
    show: Arc<dyn Runnable>,
    list: Arc<dyn Runnable>,
    select: RunnableFactory,
    create: RunnableFactory,
}

impl WorkspaceSelector {
    /// Create from `init`, `workspace show`, `workspace list` and builders for
    /// `workspace select <name>` and `workspace new <name>`
    pub fn new(
        init: Arc<dyn Runnable>,
        show: Arc<dyn Runnable>,
        list: Arc<dyn Runnable>,
        select: RunnableFactory,
        create: RunnableFactory,
    ) -> Self {
        Self {
            init,
            show,
            list,
            select,
            create,
        }
    }

    /// Initialize, then switch to `workspace`, creating it if needed
    ///
    /// An empty name keeps the currently selected workspace.
    ///
    /// # Errors
    /// `ControllerError::Workspace` naming the step that failed
    pub async fn select_workspace(&self, workspace: &str) -> Result<(), ControllerError> {
        let fail = |action: &'static str| {
            move |source| ControllerError::Workspace {
                action,
                workspace: workspace.to_string(),
                source,
            }
        };

        self.init.output().await.map_err(fail("initialize"))?;
        if workspace.is_empty() {
            return Ok(());
        }

        let current = self.show.output().await.map_err(fail("show"))?;
        if String::from_utf8_lossy(&current).trim() == workspace {
            tracing::debug!(workspace, "workspace already selected");
            return Ok(());
        }

        let listing = self.list.output().await.map_err(fail("list"))?;
        let exists = String::from_utf8_lossy(&listing)
            .lines()
            .any(|line| line.trim_start_matches('*').trim() == workspace);

        if exists {
            (self.select)(workspace).output().await.map_err(fail("select"))?;
            tracing::info!(workspace, "selected workspace");
        } else {
            (self.create)(workspace).output().await.map_err(fail("create"))?;
            tracing::info!(workspace, "created workspace");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use carousel_core::RunnableError;
    use parking_lot::Mutex;

    /// Runnable returning fixed output and recording its runs
    struct Fixed {
        name: String,
        output: Result<Vec<u8>, RunnableError>,
        log: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait::async_trait]
    impl Runnable for Fixed {
        async fn output(&self) -> Result<Vec<u8>, RunnableError> {
            self.log.lock().push(self.name.clone());
            self.output.clone()
        }

        fn describe(&self) -> String {
            self.name.clone()
        }
    }

    fn fixed(log: &Arc<Mutex<Vec<String>>>, name: &str, output: &str) -> Arc<dyn Runnable> {
        Arc::new(Fixed {
            name: name.to_string(),
            output: Ok(output.as_bytes().to_vec()),
            log: Arc::clone(log),
        })
    }

    fn selector(log: &Arc<Mutex<Vec<String>>>, show: &str, list: &str) -> WorkspaceSelector {
        let select_log = Arc::clone(log);
        let create_log = Arc::clone(log);
        WorkspaceSelector::new(
            fixed(log, "init", ""),
            fixed(log, "show", show),
            fixed(log, "list", list),
            Arc::new(move |name: &str| fixed(&select_log, &format!("select {name}"), "")),
            Arc::new(move |name: &str| fixed(&create_log, &format!("new {name}"), "")),
        )
    }

    #[tokio::test]
    async fn empty_name_only_initializes() {
        let log = Arc::new(Mutex::new(Vec::new()));
        selector(&log, "default\n", "").select_workspace("").await.unwrap();
        assert_eq!(*log.lock(), vec!["init"]);
    }

    #[tokio::test]
    async fn current_workspace_is_kept() {
        let log = Arc::new(Mutex::new(Vec::new()));
        selector(&log, "staging\n", "").select_workspace("staging").await.unwrap();
        assert_eq!(*log.lock(), vec!["init", "show"]);
    }

    #[tokio::test]
    async fn existing_workspace_is_selected() {
        let log = Arc::new(Mutex::new(Vec::new()));
        selector(&log, "default\n", "* default\n  staging\n")
            .select_workspace("staging")
            .await
            .unwrap();
        assert_eq!(*log.lock(), vec!["init", "show", "list", "select staging"]);
    }

    #[tokio::test]
    async fn missing_workspace_is_created() {
        let log = Arc::new(Mutex::new(Vec::new()));
        selector(&log, "default\n", "* default\n")
            .select_workspace("staging")
            .await
            .unwrap();
        assert_eq!(*log.lock(), vec!["init", "show", "list", "new staging"]);
    }

    #[tokio::test]
    async fn failed_init_names_action() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let broken = WorkspaceSelector {
            init: Arc::new(Fixed {
                name: "init".into(),
                output: Err(RunnableError::new("exit status 1")),
                log: Arc::clone(&log),
            }),
            ..selector(&log, "", "")
        };
        let err = broken.select_workspace("staging").await.unwrap_err();
        assert!(err.to_string().starts_with("failed to initialize workspace \"staging\""));
    }
}
