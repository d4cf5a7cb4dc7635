//! Configuration types.

use std::time::Duration;

use crate::error::ConfigError;
use crate::locator::geometry::PlacementConfig;
use crate::transition::TransitionEffect;

/// What the tour does when a step's anchor never resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnchorTimeoutPolicy {
    /// Keep polling while the step is active. The tooltip shows without a
    /// spotlight in the meantime.
    WaitForever,
    /// Auto-advance once the anchor has been missing for this long.
    SkipAfter(Duration),
}

impl Default for AnchorTimeoutPolicy {
    fn default() -> Self {
        Self::WaitForever
    }
}

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct GuideConfig {
    /// Effect used when `advance` is called without one.
    pub default_effect: TransitionEffect,
    /// Retry interval while an anchor is missing.
    pub anchor_poll_interval: Duration,
    /// Policy for anchors that never show up.
    pub anchor_timeout: AnchorTimeoutPolicy,
    /// How long an anchor may be missing before a warning is logged.
    pub anchor_warn_after: Duration,
    /// Delay between `navigate_to` and the first anchor lookup.
    pub navigation_settle: Duration,
    /// Length of the level-up celebration.
    pub level_up_celebration: Duration,
    /// Auto-dismiss delay for achievement toasts.
    pub toast_duration: Duration,
    /// XP bonus granted for each newly unlocked achievement.
    pub achievement_bonus: u32,
    /// Tooltip / spotlight geometry.
    pub placement: PlacementConfig,
}

impl Default for GuideConfig {
    fn default() -> Self {
        Self {
            default_effect: TransitionEffect::Slide,
            anchor_poll_interval: Duration::from_millis(100),
            anchor_timeout: AnchorTimeoutPolicy::WaitForever,
            anchor_warn_after: Duration::from_secs(5),
            navigation_settle: Duration::from_millis(350),
            level_up_celebration: Duration::from_secs(3),
            toast_duration: Duration::from_secs(4),
            achievement_bonus: 25,
            placement: PlacementConfig::default(),
        }
    }
}

impl GuideConfig {
    /// Build config from `GUIDE_*` environment variables.
    ///
    /// Unset values keep their defaults. Unparseable values are logged and
    /// fall back to their defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from any key lookup, e.g. a map in tests.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let env = EnvReader { lookup: &lookup };

        let default_effect = env
            .parsed("GUIDE_DEFAULT_EFFECT", |s| {
                s.parse::<TransitionEffect>().map_err(|e| e.to_string())
            })
            .unwrap_or(defaults.default_effect);

        let anchor_timeout = match env.millis("GUIDE_ANCHOR_TIMEOUT_MS", 1) {
            Some(d) => AnchorTimeoutPolicy::SkipAfter(d),
            None => AnchorTimeoutPolicy::WaitForever,
        };

        Self {
            default_effect,
            anchor_poll_interval: env
                .millis("GUIDE_ANCHOR_POLL_MS", 1)
                .unwrap_or(defaults.anchor_poll_interval),
            anchor_timeout,
            anchor_warn_after: env
                .millis("GUIDE_ANCHOR_WARN_MS", 0)
                .unwrap_or(defaults.anchor_warn_after),
            navigation_settle: env
                .millis("GUIDE_NAV_SETTLE_MS", 0)
                .unwrap_or(defaults.navigation_settle),
            level_up_celebration: env
                .millis("GUIDE_LEVEL_UP_MS", 0)
                .unwrap_or(defaults.level_up_celebration),
            toast_duration: env
                .millis("GUIDE_TOAST_MS", 0)
                .unwrap_or(defaults.toast_duration),
            achievement_bonus: env
                .parsed("GUIDE_ACHIEVEMENT_BONUS", |s| {
                    s.parse::<u32>().map_err(|e| e.to_string())
                })
                .unwrap_or(defaults.achievement_bonus),
            placement: defaults.placement,
        }
    }
}

struct EnvReader<'a, L: Fn(&str) -> Option<String>> {
    lookup: &'a L,
}

impl<L: Fn(&str) -> Option<String>> EnvReader<'_, L> {
    /// `None` when unset or invalid; invalid values are logged.
    fn parsed<T>(&self, key: &str, parse: impl FnOnce(&str) -> Result<T, String>) -> Option<T> {
        let raw = (self.lookup)(key)?;
        match parse(raw.trim()) {
            Ok(value) => Some(value),
            Err(message) => {
                let err = ConfigError::InvalidValue {
                    key: key.to_string(),
                    message,
                };
                tracing::warn!("{err}; using default");
                None
            }
        }
    }

    fn millis(&self, key: &str, min: u64) -> Option<Duration> {
        self.parsed(key, |s| {
            let ms = s.parse::<u64>().map_err(|e| e.to_string())?;
            if ms < min {
                return Err(format!("must be at least {min}ms"));
            }
            Ok(Duration::from_millis(ms))
        })
    }
}

/// Host process configuration (binary only).
#[derive(Debug, Clone)]
pub struct HostConfig {
    pub http_port: u16,
    pub state_path: std::path::PathBuf,
    pub user_id: String,
    pub log_dir: Option<std::path::PathBuf>,
}

impl HostConfig {
    pub fn from_env() -> Self {
        let http_port: u16 = std::env::var("GUIDE_HTTP_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(8787);

        let state_path = std::env::var("GUIDE_STATE_PATH")
            .unwrap_or_else(|_| "./data/guide-flags.json".to_string())
            .into();

        let user_id = std::env::var("GUIDE_USER_ID").unwrap_or_else(|_| "local".to_string());

        Self {
            http_port,
            state_path,
            user_id,
            log_dir: std::env::var("GUIDE_LOG_DIR").ok().map(Into::into),
        }
    }
}
