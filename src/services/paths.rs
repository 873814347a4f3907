use crate::error::{EnvError, Result};
use crate::models::Location;
use camino::{Utf8Path, Utf8PathBuf};
use std::sync::OnceLock;

/// Assets folder of the install-dir layout, relative to the root
const INSTALL_ASSETS_DIR: &str = "StreamingAssets";

/// Where the base directories come from on the current platform.
///
/// Both variants expose the same three bases (root, assets, cache); every
/// other location is derived from them the same way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformPaths {
    /// Desktop build with a stable installation directory
    InstallDir {
        root: Utf8PathBuf,
        assets: Utf8PathBuf,
        /// Defaults to `<root>/Cache`
        cache: Option<Utf8PathBuf>,
    },
    /// Sandboxed per-user data directory plus a temporary cache directory
    Sandboxed {
        data_dir: Utf8PathBuf,
        cache_dir: Utf8PathBuf,
    },
}

impl PlatformPaths {
    /// Pick the layout for the running platform.
    ///
    /// Windows keeps everything next to the executable; other platforms use
    /// the user's data and cache directories under `app_name`.
    pub fn detect(app_name: &str) -> Result<Self> {
        if std::env::consts::OS == "windows" {
            let exe = std::env::current_exe()
                .map_err(|e| EnvError::PlatformDirs(format!("current executable: {}", e)))?;
            let exe = Utf8PathBuf::try_from(exe)
                .map_err(|e| EnvError::PlatformDirs(format!("non UTF-8 install path: {}", e)))?;
            let root = exe
                .parent()
                .map(Utf8Path::to_path_buf)
                .ok_or_else(|| EnvError::PlatformDirs(format!("{} has no parent", exe)))?;
            Ok(Self::install_dir(root))
        } else {
            let data_dir = base_dir(dirs::data_dir(), "data")?.join(app_name);
            let cache_dir = base_dir(dirs::cache_dir(), "cache")?.join(app_name);
            Ok(Self::Sandboxed {
                data_dir,
                cache_dir,
            })
        }
    }

    /// Install-dir layout with the assets folder at `<root>/StreamingAssets`
    pub fn install_dir<P: AsRef<Utf8Path>>(root: P) -> Self {
        let root = root.as_ref().to_path_buf();
        Self::InstallDir {
            assets: root.join(INSTALL_ASSETS_DIR),
            root,
            cache: None,
        }
    }

    /// Same variant with the root and cache replaced where given.
    ///
    /// On the install-dir layout an assets folder that sat at the default
    /// `<root>/StreamingAssets` moves with the root; a host-provided one stays.
    pub fn with_overrides(self, root: Option<Utf8PathBuf>, cache: Option<Utf8PathBuf>) -> Self {
        match self {
            Self::InstallDir {
                root: old_root,
                assets,
                cache: old_cache,
            } => {
                let (root, assets) = match root {
                    Some(root) if assets == old_root.join(INSTALL_ASSETS_DIR) => {
                        let assets = root.join(INSTALL_ASSETS_DIR);
                        (root, assets)
                    }
                    Some(root) => (root, assets),
                    None => (old_root, assets),
                };
                Self::InstallDir {
                    root,
                    assets,
                    cache: cache.or(old_cache),
                }
            }
            Self::Sandboxed {
                data_dir,
                cache_dir,
            } => Self::Sandboxed {
                data_dir: root.unwrap_or(data_dir),
                cache_dir: cache.unwrap_or(cache_dir),
            },
        }
    }

    /// Whether the native media backend can be loaded on this layout
    pub fn supports_native_media(&self) -> bool {
        matches!(self, Self::InstallDir { .. })
    }

    fn root(&self) -> Utf8PathBuf {
        match self {
            Self::InstallDir { root, .. } => root.clone(),
            Self::Sandboxed { data_dir, .. } => data_dir.clone(),
        }
    }

    fn assets(&self) -> Utf8PathBuf {
        match self {
            Self::InstallDir { assets, .. } => assets.clone(),
            Self::Sandboxed { data_dir, .. } => data_dir.join("ExtStreamingAssets"),
        }
    }

    fn cache(&self) -> Utf8PathBuf {
        match self {
            Self::InstallDir { root, cache, .. } => {
                cache.clone().unwrap_or_else(|| root.join("Cache"))
            }
            Self::Sandboxed { cache_dir, .. } => cache_dir.clone(),
        }
    }
}

fn base_dir(dir: Option<std::path::PathBuf>, what: &str) -> Result<Utf8PathBuf> {
    let dir = dir.ok_or_else(|| EnvError::PlatformDirs(format!("no user {} directory", what)))?;
    Utf8PathBuf::try_from(dir)
        .map_err(|e| EnvError::PlatformDirs(format!("non UTF-8 {} directory: {}", what, e)))
}

/// Resolves and memoizes every well-known location.
///
/// Each path is computed on first request and cached for the life of the
/// resolver, so a caller never observes a location change mid-run. Reads
/// after the first are lock-free.
#[derive(Debug)]
pub struct PathResolver {
    platform: PlatformPaths,
    cache: [OnceLock<Utf8PathBuf>; Location::ALL.len()],
}

impl PathResolver {
    pub fn new(platform: PlatformPaths) -> Self {
        Self {
            platform,
            cache: std::array::from_fn(|_| OnceLock::new()),
        }
    }

    pub fn platform(&self) -> &PlatformPaths {
        &self.platform
    }

    pub fn path(&self, location: Location) -> &Utf8Path {
        self.cache[location.index()].get_or_init(|| self.compute(location))
    }

    fn compute(&self, location: Location) -> Utf8PathBuf {
        match location {
            Location::Root => self.platform.root(),
            Location::Assets => self.platform.assets(),
            Location::Cache => self.platform.cache(),
            Location::NetCache => self.path(Location::Cache).join("Net"),
            Location::RuntimeCache => self.path(Location::Cache).join("Runtime"),
            Location::Chart => self.path(Location::Root).join("MaiCharts"),
            Location::Settings => self.path(Location::Root).join("settings.json"),
            Location::Skin => self.path(Location::Root).join("Skins"),
            Location::Logs => self.path(Location::Root).join("Logs"),
            Location::Lang => self.path(Location::Assets).join("Langs"),
            Location::ScoreDb => self.path(Location::Root).join("ScoreDatabase.db"),
            Location::LogFile => self.path(Location::Logs).join(crate::LOG_FILE_NAME),
            Location::RecordOutputs => self.path(Location::Root).join("RecordOutputs"),
        }
    }

    pub fn root(&self) -> &Utf8Path {
        self.path(Location::Root)
    }

    pub fn assets(&self) -> &Utf8Path {
        self.path(Location::Assets)
    }

    pub fn cache(&self) -> &Utf8Path {
        self.path(Location::Cache)
    }

    pub fn chart(&self) -> &Utf8Path {
        self.path(Location::Chart)
    }

    pub fn settings(&self) -> &Utf8Path {
        self.path(Location::Settings)
    }

    pub fn skins(&self) -> &Utf8Path {
        self.path(Location::Skin)
    }

    pub fn logs(&self) -> &Utf8Path {
        self.path(Location::Logs)
    }

    pub fn lang(&self) -> &Utf8Path {
        self.path(Location::Lang)
    }

    pub fn score_db(&self) -> &Utf8Path {
        self.path(Location::ScoreDb)
    }

    pub fn log_file(&self) -> &Utf8Path {
        self.path(Location::LogFile)
    }

    pub fn record_outputs(&self) -> &Utf8Path {
        self.path(Location::RecordOutputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sandboxed() -> PathResolver {
        PathResolver::new(PlatformPaths::Sandboxed {
            data_dir: Utf8PathBuf::from("/home/player/.local/share/stage"),
            cache_dir: Utf8PathBuf::from("/home/player/.cache/stage"),
        })
    }

    #[test]
    fn test_sandboxed_layout() {
        let paths = sandboxed();

        assert_eq!(paths.root().as_str(), "/home/player/.local/share/stage");
        assert_eq!(paths.assets().as_str(), "/home/player/.local/share/stage/ExtStreamingAssets");
        assert_eq!(paths.cache().as_str(), "/home/player/.cache/stage");
        assert_eq!(paths.chart().as_str(), "/home/player/.local/share/stage/MaiCharts");
        assert_eq!(paths.settings().as_str(), "/home/player/.local/share/stage/settings.json");
        assert_eq!(
            paths.lang().as_str(),
            "/home/player/.local/share/stage/ExtStreamingAssets/Langs"
        );
        assert_eq!(
            paths.log_file().as_str(),
            "/home/player/.local/share/stage/Logs/Runtime.log"
        );
        assert_eq!(paths.path(Location::NetCache).as_str(), "/home/player/.cache/stage/Net");
    }

    #[test]
    fn test_install_dir_layout() {
        let paths = PathResolver::new(PlatformPaths::install_dir("C:/Games/Stage"));

        assert_eq!(paths.assets().as_str(), "C:/Games/Stage/StreamingAssets");
        assert_eq!(paths.cache().as_str(), "C:/Games/Stage/Cache");
        assert_eq!(paths.path(Location::RuntimeCache).as_str(), "C:/Games/Stage/Cache/Runtime");
        assert_eq!(paths.skins().as_str(), "C:/Games/Stage/Skins");
        assert_eq!(paths.lang().as_str(), "C:/Games/Stage/StreamingAssets/Langs");
        assert_eq!(paths.score_db().as_str(), "C:/Games/Stage/ScoreDatabase.db");
        assert_eq!(paths.record_outputs().as_str(), "C:/Games/Stage/RecordOutputs");
    }

    #[test]
    fn test_paths_are_memoized() {
        let paths = sandboxed();

        for location in Location::ALL {
            let first = paths.path(location);
            let second = paths.path(location);
            assert_eq!(first, second);
            assert!(std::ptr::eq(first, second), "{} recomputed", location);
        }
    }

    #[test]
    fn test_overrides() {
        let platform = PlatformPaths::Sandboxed {
            data_dir: Utf8PathBuf::from("/a"),
            cache_dir: Utf8PathBuf::from("/b"),
        }
        .with_overrides(Some(Utf8PathBuf::from("/c")), None);

        let paths = PathResolver::new(platform);
        assert_eq!(paths.root().as_str(), "/c");
        assert_eq!(paths.cache().as_str(), "/b");
    }

    #[test]
    fn test_install_dir_cache_override() {
        let platform = PlatformPaths::install_dir("/opt/stage")
            .with_overrides(None, Some(Utf8PathBuf::from("/tmp/cache")));

        let paths = PathResolver::new(platform);
        assert_eq!(paths.root().as_str(), "/opt/stage");
        assert_eq!(paths.cache().as_str(), "/tmp/cache");
        assert_eq!(paths.path(Location::NetCache).as_str(), "/tmp/cache/Net");
    }

    #[test]
    fn test_install_dir_root_override_moves_default_assets() {
        let platform = PlatformPaths::install_dir("/opt/stage")
            .with_overrides(Some(Utf8PathBuf::from("/srv/x")), None);

        let paths = PathResolver::new(platform);
        assert_eq!(paths.root().as_str(), "/srv/x");
        assert_eq!(paths.assets().as_str(), "/srv/x/StreamingAssets");
        assert_eq!(paths.cache().as_str(), "/srv/x/Cache");
    }

    #[test]
    fn test_install_dir_root_override_keeps_custom_assets() {
        let platform = PlatformPaths::InstallDir {
            root: Utf8PathBuf::from("/opt/stage"),
            assets: Utf8PathBuf::from("/mnt/assets"),
            cache: None,
        }
        .with_overrides(Some(Utf8PathBuf::from("/srv/x")), None);

        let paths = PathResolver::new(platform);
        assert_eq!(paths.assets().as_str(), "/mnt/assets");
        assert_eq!(paths.lang().as_str(), "/mnt/assets/Langs");
    }

    #[test]
    fn test_native_media_support() {
        assert!(PlatformPaths::install_dir("/opt/stage").supports_native_media());
        assert!(!sandboxed().platform().supports_native_media());
    }
}
