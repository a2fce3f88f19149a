//! The `sync` command: build the client, run the engine, report.

use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Args;
use engine::{Engine, OrgReport};
use github::{
    DryRunClient, GitHubClient, Throttle, DEFAULT_ENDPOINT, DEFAULT_TOKENS_PER_HOUR,
    DEFAULT_TOKEN_BURST,
};
use labels::{
    count_updates, Configuration, LabelClient, OrgSpec, RepoFilter, SyncConfig, Timestamp,
    DEFAULT_WORKERS,
};
use tracing::{info, warn};

/// Flags of the `sync` command.
#[derive(Debug, Args)]
pub struct SyncArgs {
    /// File holding the GitHub OAuth token.
    #[arg(long)]
    pub token: PathBuf,

    /// Apply the planned changes. Without it nothing is mutated.
    #[arg(long)]
    pub confirm: bool,

    /// GitHub API endpoint. Exactly one is used; put a caching proxy behind
    /// this URL rather than listing fallbacks.
    #[arg(long, default_value = DEFAULT_ENDPOINT)]
    pub endpoint: String,

    /// Requests allowed per hour once the burst is spent.
    #[arg(long, default_value_t = DEFAULT_TOKENS_PER_HOUR)]
    pub tokens_per_hour: u32,

    /// Requests allowed back to back before throttling starts.
    #[arg(long, default_value_t = DEFAULT_TOKEN_BURST)]
    pub token_burst: u32,

    /// Comma-separated organisations to sync; `user:NAME` syncs a user's repositories.
    #[arg(long, value_delimiter = ',', required = true)]
    pub orgs: Vec<String>,

    /// Only sync these `org/repo` entries.
    #[arg(long, value_delimiter = ',')]
    pub only: Vec<String>,

    /// Skip these `org/repo` entries.
    #[arg(long, value_delimiter = ',')]
    pub skip: Vec<String>,

    /// Number of concurrent workers for fetching and applying.
    #[arg(long, default_value_t = DEFAULT_WORKERS)]
    pub workers: usize,

    /// Write the planned updates of every organisation to this file as JSON.
    #[arg(long)]
    pub plan_output: Option<PathBuf>,
}

impl SyncArgs {
    /// Turns the flags into a validated run configuration.
    pub fn sync_config(&self) -> Result<SyncConfig> {
        let orgs = self
            .orgs
            .iter()
            .map(|org| OrgSpec::parse(org))
            .collect::<Result<Vec<_>, _>>()?;
        let filter = RepoFilter::from_lists(&self.only, &self.skip)?;
        Ok(SyncConfig::new(orgs, filter, self.confirm, self.workers)?)
    }
}

/// Reads and trims the token stored at `path`.
pub fn read_token(path: &Path) -> Result<String> {
    if path.as_os_str().is_empty() {
        bail!("--token unset");
    }
    let token = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read --token={}", path.display()))?;
    let token = token.trim();
    if token.is_empty() {
        bail!("token file {} is empty", path.display());
    }
    Ok(token.to_string())
}

/// Runs a sync of every requested organisation against `taxonomy`.
///
/// # Errors
///
/// Returns an error if the flags are invalid, the client cannot be built, or
/// any organisation, repository or update failed. Failures are reported
/// only after every organisation has been processed.
pub async fn run(args: &SyncArgs, taxonomy: &Configuration) -> Result<()> {
    let config = args.sync_config()?;
    let token = read_token(&args.token)?;
    let throttle = Throttle::new(args.tokens_per_hour, args.token_burst)
        .context("invalid --tokens-per-hour or --token-burst")?;
    let live = GitHubClient::new(&args.endpoint, token)
        .context("failed to create GitHub client")?
        .with_throttle(throttle);
    let client: Arc<dyn LabelClient> = if config.confirm {
        Arc::new(live)
    } else {
        Arc::new(DryRunClient::new(live))
    };

    let engine = Engine::new(client, config);
    let outcome = engine.run(taxonomy, Timestamp::now()).await?;

    for report in &outcome.reports {
        info!(
            org = %report.org,
            repos = report.repos,
            updates = count_updates(&report.updates),
            applied = report.applied,
            "finished org"
        );
    }
    if let Some(path) = &args.plan_output {
        write_plan(path, &outcome.reports)?;
    }

    match outcome.error() {
        Some(err) => {
            warn!(error = %err, "sync finished with errors");
            Err(err).context("sync finished with errors")
        }
        None => Ok(()),
    }
}

/// Writes the per-organisation plans as pretty JSON.
pub fn write_plan(path: &Path, reports: &[OrgReport]) -> Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("failed to create plan output {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, reports)
        .map_err(std::io::Error::from)
        .and_then(|()| writer.flush())
        .with_context(|| format!("failed to write plan output {}", path.display()))?;
    info!(path = %path.display(), "wrote plan");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use labels::{LabelState, OrgName, RepoName, RepoUpdates, SyncError, Update};

    fn args(orgs: &[&str]) -> SyncArgs {
        SyncArgs {
            token: PathBuf::from("/etc/github/oauth"),
            confirm: false,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            tokens_per_hour: DEFAULT_TOKENS_PER_HOUR,
            token_burst: DEFAULT_TOKEN_BURST,
            orgs: orgs.iter().map(|s| (*s).to_string()).collect(),
            only: Vec::new(),
            skip: Vec::new(),
            workers: DEFAULT_WORKERS,
            plan_output: None,
        }
    }

    #[test]
    fn test_token_is_trimmed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("oauth");
        std::fs::write(&path, "  abc123\n").unwrap();

        assert_eq!(read_token(&path).unwrap(), "abc123");
    }

    #[test]
    fn test_missing_or_blank_token_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let blank = dir.path().join("blank");
        std::fs::write(&blank, "\n").unwrap();

        assert!(read_token(Path::new("")).is_err());
        assert!(read_token(&dir.path().join("absent")).is_err());
        assert!(read_token(&blank).is_err());
    }

    #[test]
    fn test_flags_become_a_sync_config() {
        let mut args = args(&["kubernetes", "user:octocat"]);
        args.skip = vec!["kubernetes/website".to_string()];

        let config = args.sync_config().unwrap();

        assert_eq!(config.orgs.len(), 2);
        assert!(config.orgs[1].is_user);
        assert_eq!(config.workers, DEFAULT_WORKERS);
        assert!(!config.filter.allows(
            &OrgName::new("kubernetes").unwrap(),
            &RepoName::new("website").unwrap()
        ));
    }

    #[test]
    fn test_zero_workers_and_conflicting_filters_are_rejected() {
        let mut zero = args(&["kubernetes"]);
        zero.workers = 0;
        let mut both = args(&["kubernetes"]);
        both.only = vec!["kubernetes/a".to_string()];
        both.skip = vec!["kubernetes/b".to_string()];

        for args in [zero, both] {
            let err = args.sync_config().unwrap_err();
            assert!(matches!(
                err.downcast_ref::<SyncError>(),
                Some(SyncError::ConfigInvalid { .. })
            ));
        }
    }

    #[test]
    fn test_plan_is_written_as_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plan.json");
        let repo = RepoName::new("test-infra").unwrap();
        let mut updates = RepoUpdates::new();
        updates.insert(
            repo.clone(),
            vec![Update::missing(repo, LabelState::new("bug", "d73a4a", ""))],
        );
        let reports = [OrgReport {
            org: OrgName::new("kubernetes").unwrap(),
            repos: 1,
            updates,
            applied: false,
        }];

        write_plan(&path, &reports).unwrap();

        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written[0]["org"], "kubernetes");
        assert_eq!(written[0]["updates"]["test-infra"][0]["wanted"]["name"], "bug");
        assert_eq!(written[0]["applied"], false);
    }
}
