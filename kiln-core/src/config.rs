/// Configuration of kiln.
///
/// Defaults are overridden by `kiln/config.json` found in xdg config
/// directories, which is in turn overridden by environment variables.
///
/// KILN_DEBUG is bitmask
/// 0000 0001 - type inference
/// 0000 0010 - passes
/// 0000 0100 - kernels and interpreter
/// 0000 1000 - graph in dot format after every pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Debug bitmask, see above
    pub debug: u32,
    /// Run graph validation after every pass
    pub per_pass_validation: bool,
    /// Number of execution arenas kernels are sharded across
    pub arenas: usize,
    /// Alignment of planned buffers in bytes
    pub alignment: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            debug: 0,
            per_pass_validation: false,
            arenas: 1,
            alignment: 64,
        }
    }
}

#[cfg(feature = "std")]
use nanoserde::DeJson;

#[cfg(feature = "std")]
#[derive(nanoserde::DeJson, Debug, Default)]
struct ConfigFile {
    debug: Option<u32>,
    per_pass_validation: Option<bool>,
    arenas: Option<usize>,
    alignment: Option<usize>,
}

impl Config {
    /// Load configuration. Never fails, broken sources are skipped.
    #[must_use]
    pub fn load() -> Self {
        let mut config = Self::default();
        // Debug first, so that loading itself can be debugged
        if let Some(debug) = env_var("KILN_DEBUG") {
            config.debug = debug;
        }
        #[cfg(feature = "std")]
        config.apply_file();
        config.apply_env();
        config
    }

    // Search through config directories and find kiln/config.json
    #[cfg(feature = "std")]
    fn apply_file(&mut self) {
        use nanoserde::DeJson;
        let debug = self.debug_passes();
        let file = xdg::BaseDirectories::new()
            .map_err(|e| {
                if debug {
                    log::debug!("Failed to find config directories for config.json, {e}");
                }
            })
            .ok()
            .map(|bd| {
                let mut dirs = bd.get_config_dirs();
                dirs.push(bd.get_config_home());
                dirs
            })
            .and_then(|paths| {
                paths.into_iter().find_map(|mut path| {
                    path.push("kiln/config.json");
                    std::fs::read_to_string(&path).ok()
                })
            })
            .and_then(|file| {
                ConfigFile::deserialize_json(&file)
                    .map_err(|e| log::warn!("Failed to parse kiln/config.json, {e}"))
                    .ok()
            });
        let Some(file) = file else {
            if debug {
                log::debug!("kiln/config.json not found, using defaults.");
            }
            return;
        };
        if let Some(x) = file.debug {
            self.debug = x;
        }
        if let Some(x) = file.per_pass_validation {
            self.per_pass_validation = x;
        }
        if let Some(x) = file.arenas {
            self.arenas = x;
        }
        if let Some(x) = file.alignment {
            self.alignment = x;
        }
    }

    fn apply_env(&mut self) {
        if let Some(x) = env_var("KILN_DEBUG") {
            self.debug = x;
        }
        if let Some(x) = env_var::<u8>("KILN_PER_PASS_VALIDATION") {
            self.per_pass_validation = x != 0;
        }
        if let Some(x) = env_var("KILN_ARENAS") {
            self.arenas = x;
        }
        if let Some(x) = env_var("KILN_ALIGNMENT") {
            self.alignment = x;
        }
        self.arenas = self.arenas.max(1);
        self.alignment = self.alignment.max(1);
    }

    /// Print type inference steps
    #[must_use]
    pub const fn debug_types(&self) -> bool {
        self.debug % 2 == 1
    }

    /// Print pass statistics
    #[must_use]
    pub const fn debug_passes(&self) -> bool {
        (self.debug >> 1) % 2 == 1
    }

    /// Print kernel dispatch
    #[must_use]
    pub const fn debug_kernels(&self) -> bool {
        (self.debug >> 2) % 2 == 1
    }

    /// Dump graph in dot format after every pass
    #[must_use]
    pub const fn debug_dot(&self) -> bool {
        (self.debug >> 3) % 2 == 1
    }
}

fn env_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|x| x.trim().parse().ok())
}

#[test]
fn debug_bits() {
    let config = Config {
        debug: 0b1010,
        ..Config::default()
    };
    assert!(!config.debug_types());
    assert!(config.debug_passes());
    assert!(!config.debug_kernels());
    assert!(config.debug_dot());
}
