use crate::error::Result;
use crate::hook::HookContext;
use crate::paths::{self, StatePaths, LOCAL_STATE_FILE};
use crate::state::ActivityState;
use crate::toml_update;
use crate::types::Scope;
use std::collections::BTreeMap;
use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use tracing::debug;

// ---------------------------------------------------------------------------
// StateManager
// ---------------------------------------------------------------------------

/// Owns the three activation layers for one invocation and routes every
/// mutation to the right one.
///
/// Outside a [`Batch`] each mutation persists its layer immediately. The
/// session layer is only ever written when running inside a hook shell.
#[derive(Debug)]
pub struct StateManager {
    paths: StatePaths,
    hook: HookContext,
    cwd: PathBuf,
    initialized: bool,
    batch: bool,
    global: ActivityState,
    session: ActivityState,
    direnv: Option<ActivityState>,
}

impl StateManager {
    pub fn new(paths: StatePaths, hook: HookContext, cwd: impl Into<PathBuf>) -> Self {
        let session = ActivityState::new(paths.session_file(&hook.session_id));
        let global = ActivityState::new(paths.global_file.clone());
        StateManager {
            paths,
            hook,
            cwd: cwd.into(),
            initialized: false,
            batch: false,
            global,
            session,
            direnv: None,
        }
    }

    /// Construct and load all layers.
    pub fn load(paths: StatePaths, hook: HookContext, cwd: impl Into<PathBuf>) -> Result<Self> {
        let mut manager = Self::new(paths, hook, cwd);
        manager.init()?;
        Ok(manager)
    }

    /// Load global, directory and (inside a hook shell) session state.
    /// Calling it again is a no-op.
    pub fn init(&mut self) -> Result<()> {
        if self.initialized {
            return Ok(());
        }
        self.global = ActivityState::load(&self.paths.global_file)?;

        self.direnv = match paths::find_in_parent_dirs(&self.cwd, LOCAL_STATE_FILE) {
            Some(file) => {
                debug!(file = %file.display(), "found directory state");
                Some(ActivityState::load(&file)?)
            }
            None => None,
        };

        let session_file = self.paths.session_file(&self.hook.session_id);
        self.session = if self.hook.in_hook() {
            paths::validate_session_id(&self.hook.session_id)?;
            ActivityState::load(&session_file)?
        } else {
            ActivityState::new(session_file)
        };

        self.initialized = true;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Views
    // -----------------------------------------------------------------------

    pub fn hook(&self) -> &HookContext {
        &self.hook
    }

    pub fn state_paths(&self) -> &StatePaths {
        &self.paths
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    pub fn global(&self) -> &ActivityState {
        &self.global
    }

    pub fn session(&self) -> &ActivityState {
        &self.session
    }

    pub fn direnv(&self) -> Option<&ActivityState> {
        self.direnv.as_ref()
    }

    pub fn scope(&self, scope: Scope) -> Option<&ActivityState> {
        match scope {
            Scope::Global => Some(&self.global),
            Scope::Session => Some(&self.session),
            Scope::Directory => self.direnv.as_ref(),
        }
    }

    /// Effective state: global, then directory, then session on top.
    pub fn resolved(&self) -> ActivityState {
        let mut view = self.global.clone();
        if let Some(direnv) = &self.direnv {
            view.merge(direnv);
        }
        view.merge(&self.session);
        view
    }

    pub fn in_batch(&self) -> bool {
        self.batch
    }

    // -----------------------------------------------------------------------
    // Mutation
    // -----------------------------------------------------------------------

    pub fn activate_sdks(
        &mut self,
        scope: Scope,
        sdks: &BTreeMap<String, String>,
        envs: &BTreeMap<String, String>,
        paths: &[String],
    ) -> Result<()> {
        self.mutate(scope, |s| s.add_tools_with_envs_paths(sdks, envs, paths))
    }

    pub fn deactivate_sdks(
        &mut self,
        scope: Scope,
        names: &[String],
        env_names: &[String],
        paths: &[String],
    ) -> Result<()> {
        self.mutate(scope, |s| s.del_tools_with_envs_paths(names, env_names, paths))
    }

    pub fn set_envs(&mut self, scope: Scope, envs: &BTreeMap<String, String>) -> Result<()> {
        self.mutate(scope, |s| s.add_tools_with_envs_paths(&BTreeMap::new(), envs, &[]))
    }

    pub fn unset_envs(&mut self, scope: Scope, names: &[String]) -> Result<()> {
        self.mutate(scope, |s| s.unset_envs(names))
    }

    /// Returns the paths that were not already active.
    pub fn add_paths(&mut self, scope: Scope, paths: &[String]) -> Result<Vec<String>> {
        let mut added = Vec::new();
        self.mutate(scope, |s| {
            for p in paths {
                if s.add_active_path(p) {
                    added.push(p.clone());
                }
            }
        })?;
        Ok(added)
    }

    pub fn remove_paths(&mut self, scope: Scope, paths: &[String]) -> Result<()> {
        self.mutate(scope, |s| s.remove_paths(paths))
    }

    pub fn add_tools(&mut self, scope: Scope, tools: &BTreeMap<String, String>) -> Result<()> {
        self.mutate(scope, |s| s.add_tools(tools))
    }

    pub fn remove_tools(&mut self, scope: Scope, names: &[String]) -> Result<()> {
        self.mutate(scope, |s| s.remove_tools(names))
    }

    /// Empty one layer. The backing file is kept, rewritten without entries.
    pub fn reset_scope(&mut self, scope: Scope) -> Result<()> {
        self.mutate(scope, ActivityState::reset)
    }

    fn mutate<F>(&mut self, scope: Scope, f: F) -> Result<()>
    where
        F: FnOnce(&mut ActivityState),
    {
        self.init()?;
        f(self.layer_mut(scope));
        if !self.batch {
            self.save_scope(scope)?;
        }
        Ok(())
    }

    fn layer_mut(&mut self, scope: Scope) -> &mut ActivityState {
        match scope {
            Scope::Global => &mut self.global,
            Scope::Session => &mut self.session,
            Scope::Directory => self
                .direnv
                .get_or_insert_with(|| ActivityState::new(self.cwd.join(LOCAL_STATE_FILE))),
        }
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    /// Write every dirty layer. Stops at the first failure; layers written
    /// before it stay written.
    pub fn save_state_file(&mut self) -> Result<()> {
        for scope in Scope::all() {
            self.save_scope(*scope)?;
        }
        Ok(())
    }

    fn save_scope(&mut self, scope: Scope) -> Result<()> {
        if scope == Scope::Session && !self.hook.in_hook() {
            if self.session.has_update() {
                debug!("not in a hook shell, session state is not persisted");
            }
            return Ok(());
        }
        let state = match scope {
            Scope::Global => &mut self.global,
            Scope::Session => &mut self.session,
            Scope::Directory => match self.direnv.as_mut() {
                Some(s) => s,
                None => return Ok(()),
            },
        };
        if !state.has_update() {
            return Ok(());
        }
        toml_update::update_file(state)?;
        state.mark_clean();
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Batch
    // -----------------------------------------------------------------------

    /// Defer persistence until the returned batch is committed.
    pub fn begin_batch(&mut self) -> Result<Batch<'_>> {
        self.init()?;
        let snapshot = Snapshot {
            global: self.global.clone(),
            session: self.session.clone(),
            direnv: self.direnv.clone(),
        };
        let was_batch = self.batch;
        self.batch = true;
        Ok(Batch {
            manager: self,
            snapshot: Some(snapshot),
            was_batch,
        })
    }
}

// ---------------------------------------------------------------------------
// Batch
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct Snapshot {
    global: ActivityState,
    session: ActivityState,
    direnv: Option<ActivityState>,
}

/// A group of mutations persisted together.
///
/// Dereferences to the [`StateManager`]. `commit` writes the dirty layers,
/// `discard` (or dropping the batch) restores the layers to how they were
/// when the batch began.
#[derive(Debug)]
pub struct Batch<'m> {
    manager: &'m mut StateManager,
    snapshot: Option<Snapshot>,
    was_batch: bool,
}

impl Batch<'_> {
    pub fn commit(mut self) -> Result<()> {
        self.snapshot = None;
        self.manager.batch = self.was_batch;
        if self.was_batch {
            return Ok(());
        }
        self.manager.save_state_file()
    }

    pub fn discard(self) {
        // Drop restores the snapshot.
    }
}

impl Drop for Batch<'_> {
    fn drop(&mut self) {
        if let Some(snapshot) = self.snapshot.take() {
            debug!("discarding uncommitted batch");
            self.manager.global = snapshot.global;
            self.manager.session = snapshot.session;
            self.manager.direnv = snapshot.direnv;
            self.manager.batch = self.was_batch;
        }
    }
}

impl Deref for Batch<'_> {
    type Target = StateManager;

    fn deref(&self) -> &StateManager {
        &*self.manager
    }
}

impl DerefMut for Batch<'_> {
    fn deref_mut(&mut self) -> &mut StateManager {
        &mut *self.manager
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hook::HookContext;
    use tempfile::TempDir;

    struct Env {
        home: TempDir,
        work: TempDir,
    }

    impl Env {
        fn new() -> Self {
            Env {
                home: TempDir::new().unwrap(),
                work: TempDir::new().unwrap(),
            }
        }

        fn paths(&self) -> StatePaths {
            StatePaths::for_home(self.home.path())
        }

        fn manager(&self, in_hook: bool) -> StateManager {
            let hook = HookContext {
                hook_shell: in_hook.then(|| "bash".to_string()),
                session_id: "test-session".to_string(),
                debug: false,
            };
            StateManager::load(self.paths(), hook, self.work.path()).unwrap()
        }
    }

    fn map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn init_with_no_files_is_empty() {
        let env = Env::new();
        let mut m = env.manager(false);
        assert!(m.global().is_empty());
        assert!(m.session().is_empty());
        assert!(m.direnv().is_none());
        m.init().unwrap();
        assert!(m.resolved().is_empty());
    }

    #[test]
    fn global_mutation_persists_immediately() {
        let env = Env::new();
        let mut m = env.manager(false);
        m.set_envs(Scope::Global, &map(&[("EDITOR", "vim")])).unwrap();
        let content = std::fs::read_to_string(&env.paths().global_file).unwrap();
        assert!(content.contains("EDITOR = \"vim\""));
        assert!(!m.global().has_update());
    }

    #[test]
    fn session_not_persisted_outside_hook() {
        let env = Env::new();
        let mut m = env.manager(false);
        m.activate_sdks(Scope::Session, &map(&[("go", "1.22")]), &BTreeMap::new(), &[])
            .unwrap();
        assert_eq!(m.session().sdks().get("go").unwrap(), "1.22");
        assert!(!env.paths().session_file("test-session").exists());
    }

    #[test]
    fn session_persisted_inside_hook() {
        let env = Env::new();
        let mut m = env.manager(true);
        m.add_paths(Scope::Session, &["/opt/tool/bin".to_string()])
            .unwrap();
        let file = env.paths().session_file("test-session");
        assert!(std::fs::read_to_string(file).unwrap().contains("/opt/tool/bin"));

        let reloaded = env.manager(true);
        assert!(reloaded.session().exists_path("/opt/tool/bin"));
    }

    #[test]
    fn directory_scope_creates_file_in_cwd() {
        let env = Env::new();
        let mut m = env.manager(false);
        m.activate_sdks(Scope::Directory, &map(&[("node", "20")]), &BTreeMap::new(), &[])
            .unwrap();
        let file = env.work.path().join(LOCAL_STATE_FILE);
        assert!(std::fs::read_to_string(file).unwrap().contains("node = \"20\""));
    }

    #[test]
    fn directory_state_found_in_parent() {
        let env = Env::new();
        std::fs::write(
            env.work.path().join(LOCAL_STATE_FILE),
            "[sdks]\njava = \"17\"\n",
        )
        .unwrap();
        let nested = env.work.path().join("src/main");
        std::fs::create_dir_all(&nested).unwrap();
        let m = StateManager::load(env.paths(), HookContext::default(), &nested).unwrap();
        assert_eq!(m.direnv().unwrap().sdks().get("java").unwrap(), "17");
    }

    #[test]
    fn session_wins_over_directory_over_global() {
        let env = Env::new();
        let mut m = env.manager(true);
        let none = BTreeMap::new();
        m.activate_sdks(Scope::Global, &map(&[("go", "1.20"), ("node", "18")]), &none, &[])
            .unwrap();
        m.activate_sdks(Scope::Directory, &map(&[("go", "1.21"), ("node", "20")]), &none, &[])
            .unwrap();
        m.activate_sdks(Scope::Session, &map(&[("go", "1.22")]), &none, &[])
            .unwrap();

        let view = m.resolved();
        assert_eq!(view.sdks().get("go").unwrap(), "1.22");
        assert_eq!(view.sdks().get("node").unwrap(), "20");
    }

    #[test]
    fn batch_defers_until_commit() {
        let env = Env::new();
        let mut m = env.manager(false);
        let global_file = env.paths().global_file;
        {
            let mut batch = m.begin_batch().unwrap();
            batch.set_envs(Scope::Global, &map(&[("A", "1")])).unwrap();
            batch.set_envs(Scope::Global, &map(&[("B", "2")])).unwrap();
            assert!(batch.in_batch());
            assert!(!global_file.exists());
            batch.commit().unwrap();
        }
        assert!(!m.in_batch());
        let content = std::fs::read_to_string(&global_file).unwrap();
        assert!(content.contains("A = \"1\""));
        assert!(content.contains("B = \"2\""));
    }

    #[test]
    fn discarded_batch_restores_state() {
        let env = Env::new();
        let mut m = env.manager(false);
        m.set_envs(Scope::Global, &map(&[("KEEP", "1")])).unwrap();

        let mut batch = m.begin_batch().unwrap();
        batch.set_envs(Scope::Global, &map(&[("DROP", "1")])).unwrap();
        batch.discard();

        assert!(m.global().envs().contains_key("KEEP"));
        assert!(!m.global().envs().contains_key("DROP"));
        assert!(!m.in_batch());
    }

    #[test]
    fn dropped_batch_is_discarded() {
        let env = Env::new();
        let mut m = env.manager(false);
        {
            let mut batch = m.begin_batch().unwrap();
            batch.add_paths(Scope::Global, &["/x".to_string()]).unwrap();
        }
        assert!(m.global().paths().is_empty());
        m.save_state_file().unwrap();
        assert!(!env.paths().global_file.exists());
    }

    #[test]
    fn malformed_global_is_fatal() {
        let env = Env::new();
        let file = env.paths().global_file;
        std::fs::create_dir_all(file.parent().unwrap()).unwrap();
        std::fs::write(&file, "paths = [").unwrap();
        let err = StateManager::load(env.paths(), HookContext::default(), env.work.path())
            .unwrap_err();
        assert!(err.to_string().contains("global.toml"));
    }

    #[test]
    fn session_id_cannot_leave_session_dir() {
        let env = Env::new();
        let hook = HookContext {
            hook_shell: Some("bash".to_string()),
            session_id: "../../.config/xenv/global".to_string(),
            debug: false,
        };
        let err = StateManager::load(env.paths(), hook, env.work.path()).unwrap_err();
        assert!(matches!(err, crate::XenvError::InvalidSessionId(_)));
    }

    #[test]
    fn reset_scope_empties_the_layer() {
        let env = Env::new();
        let mut m = env.manager(false);
        m.set_envs(Scope::Global, &map(&[("EDITOR", "vim")])).unwrap();
        m.add_tools(Scope::Global, &map(&[("jq", "1.7")])).unwrap();
        m.reset_scope(Scope::Global).unwrap();
        assert!(m.global().is_empty());

        let reloaded = env.manager(false);
        assert!(reloaded.global().is_empty());
        assert!(env.paths().global_file.exists());
    }

    #[test]
    fn tools_are_added_and_removed() {
        let env = Env::new();
        let mut m = env.manager(false);
        m.add_tools(Scope::Global, &map(&[("jq", "1.7"), ("fd", "9")])).unwrap();
        m.remove_tools(Scope::Global, &["jq".to_string()]).unwrap();
        let content = std::fs::read_to_string(env.paths().global_file).unwrap();
        assert!(content.contains("[tools]\nfd = \"9\""));
        assert!(!content.contains("jq"));
    }

    #[test]
    fn add_paths_reports_new_entries_only() {
        let env = Env::new();
        let mut m = env.manager(false);
        let first = m
            .add_paths(Scope::Global, &["/a".to_string(), "/b".to_string()])
            .unwrap();
        let second = m
            .add_paths(Scope::Global, &["/b".to_string(), "/c".to_string()])
            .unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(second, vec!["/c".to_string()]);
    }
}
