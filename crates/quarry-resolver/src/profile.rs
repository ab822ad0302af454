//! Profile activation.
//!
//! A resolver has no running JVM to ask for its version, so profiles gated on the JDK are
//! treated as always active: a library that adds dependencies for newer JDKs should resolve
//! the same way on every machine. Every other activation kind is evaluated against an
//! [`ActivationContext`] describing the host.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use quarry_config::ProfilesConfig;
use quarry_core::{Version, VersionConstraint};

use crate::pom::{Activation, Profile};

/// Facts about the environment that profile activations are evaluated against.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivationContext {
    pub jdk: Option<String>,
    pub os_name: String,
    pub os_family: String,
    pub os_arch: String,
    pub os_version: Option<String>,
    pub properties: BTreeMap<String, String>,
    /// Directory relative `<file>` activations are resolved against.
    pub base_dir: Option<PathBuf>,
}

impl ActivationContext {
    /// Describe the current host using Java's naming for `os.name`, `os.arch` and families.
    #[must_use]
    pub fn host() -> Self {
        let os = std::env::consts::OS;
        let os_name = match os {
            "linux" => "Linux",
            "macos" => "Mac OS X",
            "windows" => "Windows",
            "freebsd" => "FreeBSD",
            other => other,
        };
        let os_family = match os {
            "windows" => "windows",
            "macos" => "mac",
            _ => "unix",
        };
        let os_arch = match std::env::consts::ARCH {
            "x86_64" => "amd64",
            "x86" => "x86",
            other => other,
        };
        Self {
            jdk: None,
            os_name: os_name.to_string(),
            os_family: os_family.to_string(),
            os_arch: os_arch.to_string(),
            os_version: None,
            properties: BTreeMap::new(),
            base_dir: None,
        }
    }

    /// The host context with any values pinned in configuration applied on top.
    #[must_use]
    pub fn from_config(config: &ProfilesConfig) -> Self {
        let mut ctx = Self::host();
        if let Some(jdk) = &config.jdk {
            ctx.jdk = Some(jdk.clone());
        }
        if let Some(name) = &config.os_name {
            ctx.os_name = name.clone();
        }
        if let Some(family) = &config.os_family {
            ctx.os_family = family.clone();
        }
        if let Some(arch) = &config.os_arch {
            ctx.os_arch = arch.clone();
        }
        if let Some(version) = &config.os_version {
            ctx.os_version = Some(version.clone());
        }
        ctx.properties.extend(config.properties.clone());
        ctx
    }

    fn property(&self, name: &str) -> Option<&str> {
        self.properties.get(name).map(String::as_str)
    }
}

/// Decides whether a profile contributes to the effective model.
pub trait ProfileActivator: Send + Sync {
    fn is_active(&self, profile: &Profile, ctx: &ActivationContext) -> bool;

    /// Whether the profile declares the kind of activation this activator understands.
    fn presents_in_config(&self, profile: &Profile, ctx: &ActivationContext) -> bool;
}

fn activation(profile: &Profile) -> Option<&Activation> {
    profile.activation.as_ref()
}

/// Strip a leading `!`, reporting whether it was there.
fn split_negation(text: &str) -> (bool, &str) {
    match text.strip_prefix('!') {
        Some(rest) => (true, rest.trim()),
        None => (false, text.trim()),
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct JdkVersionProfileActivator;

impl JdkVersionProfileActivator {
    fn matches(spec: &str, jdk: &str) -> bool {
        let (negated, spec) = split_negation(spec);
        let matched = if spec.starts_with('[') || spec.starts_with('(') {
            match VersionConstraint::parse(spec) {
                Ok(range) => range.contains(&Version::new(jdk)),
                Err(_) => false,
            }
        } else {
            jdk.starts_with(spec)
        };
        matched != negated
    }
}

impl ProfileActivator for JdkVersionProfileActivator {
    fn is_active(&self, profile: &Profile, ctx: &ActivationContext) -> bool {
        let Some(spec) = activation(profile).and_then(|a| a.jdk.as_deref()) else {
            return false;
        };
        ctx.jdk
            .as_deref()
            .is_some_and(|jdk| Self::matches(spec, jdk))
    }

    fn presents_in_config(&self, profile: &Profile, _ctx: &ActivationContext) -> bool {
        activation(profile).is_some_and(|a| a.jdk.is_some())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PropertyProfileActivator;

impl ProfileActivator for PropertyProfileActivator {
    fn is_active(&self, profile: &Profile, ctx: &ActivationContext) -> bool {
        let Some(property) = activation(profile).and_then(|a| a.property.as_ref()) else {
            return false;
        };
        let (negated_name, name) = split_negation(&property.name);
        if name.is_empty() {
            return false;
        }
        let actual = ctx.property(name);

        match property.value.as_deref() {
            None => actual.is_some() != negated_name,
            Some(expected) => {
                let (negated_value, expected) = split_negation(expected);
                (actual == Some(expected)) != negated_value
            }
        }
    }

    fn presents_in_config(&self, profile: &Profile, _ctx: &ActivationContext) -> bool {
        activation(profile).is_some_and(|a| a.property.is_some())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct OperatingSystemProfileActivator;

impl OperatingSystemProfileActivator {
    fn check(expected: Option<&str>, matches: impl Fn(&str) -> bool) -> bool {
        let Some(expected) = expected else {
            return true;
        };
        let (negated, expected) = split_negation(expected);
        matches(&expected.to_ascii_lowercase()) != negated
    }
}

impl ProfileActivator for OperatingSystemProfileActivator {
    fn is_active(&self, profile: &Profile, ctx: &ActivationContext) -> bool {
        let Some(os) = activation(profile).and_then(|a| a.os.as_ref()) else {
            return false;
        };
        let family = ctx.os_family.to_ascii_lowercase();

        Self::check(os.name.as_deref(), |name| {
            ctx.os_name.eq_ignore_ascii_case(name)
        }) && Self::check(os.family.as_deref(), |wanted| {
            wanted == family || (wanted == "unix" && family == "mac")
        }) && Self::check(os.arch.as_deref(), |arch| {
            ctx.os_arch.eq_ignore_ascii_case(arch)
        }) && Self::check(os.version.as_deref(), |version| {
            ctx.os_version
                .as_deref()
                .is_some_and(|actual| actual.eq_ignore_ascii_case(version))
        })
    }

    fn presents_in_config(&self, profile: &Profile, _ctx: &ActivationContext) -> bool {
        activation(profile).is_some_and(|a| a.os.is_some())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct FileProfileActivator;

impl FileProfileActivator {
    fn resolve(path: &str, ctx: &ActivationContext) -> PathBuf {
        let base = ctx
            .base_dir
            .as_deref()
            .map(|dir| dir.to_string_lossy().into_owned())
            .unwrap_or_else(|| ".".to_string());
        let path = path
            .replace("${basedir}", &base)
            .replace("${project.basedir}", &base);
        let path = Path::new(&path);
        match &ctx.base_dir {
            Some(dir) if path.is_relative() => dir.join(path),
            _ => path.to_path_buf(),
        }
    }
}

impl ProfileActivator for FileProfileActivator {
    fn is_active(&self, profile: &Profile, ctx: &ActivationContext) -> bool {
        let Some(file) = activation(profile).and_then(|a| a.file.as_ref()) else {
            return false;
        };
        if let Some(exists) = &file.exists {
            return Self::resolve(exists, ctx).exists();
        }
        if let Some(missing) = &file.missing {
            return !Self::resolve(missing, ctx).exists();
        }
        false
    }

    fn presents_in_config(&self, profile: &Profile, _ctx: &ActivationContext) -> bool {
        activation(profile)
            .and_then(|a| a.file.as_ref())
            .is_some_and(|f| f.exists.is_some() || f.missing.is_some())
    }
}

/// Combines the per-kind activators so that resolution does not depend on the running JDK.
///
/// A profile with a `<jdk>` activation is always active. Otherwise the profile is active when
/// at least one delegate recognises its activation and every recognising delegate agrees.
pub struct DeterministicProfileActivator {
    delegates: Vec<Box<dyn ProfileActivator>>,
}

impl std::fmt::Debug for DeterministicProfileActivator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeterministicProfileActivator")
            .field("delegates", &self.delegates.len())
            .finish()
    }
}

impl Default for DeterministicProfileActivator {
    fn default() -> Self {
        Self::new(vec![
            Box::new(JdkVersionProfileActivator),
            Box::new(PropertyProfileActivator),
            Box::new(OperatingSystemProfileActivator),
            Box::new(FileProfileActivator),
        ])
    }
}

impl DeterministicProfileActivator {
    pub fn new(delegates: Vec<Box<dyn ProfileActivator>>) -> Self {
        Self { delegates }
    }
}

impl ProfileActivator for DeterministicProfileActivator {
    fn is_active(&self, profile: &Profile, ctx: &ActivationContext) -> bool {
        if activation(profile).is_some_and(|a| a.jdk.is_some()) {
            return true;
        }

        let mut present = false;
        for delegate in &self.delegates {
            if delegate.presents_in_config(profile, ctx) {
                present = true;
                if !delegate.is_active(profile, ctx) {
                    return false;
                }
            }
        }
        present
    }

    fn presents_in_config(&self, profile: &Profile, ctx: &ActivationContext) -> bool {
        self.delegates
            .iter()
            .any(|delegate| delegate.presents_in_config(profile, ctx))
    }
}

/// Profiles of one POM that apply: those the activator accepts, or the `activeByDefault`
/// ones when none is accepted.
pub fn select_active_profiles<'a>(
    profiles: &'a [Profile],
    activator: &dyn ProfileActivator,
    ctx: &ActivationContext,
) -> Vec<&'a Profile> {
    let active: Vec<&Profile> = profiles
        .iter()
        .filter(|profile| activator.is_active(profile, ctx))
        .collect();
    if !active.is_empty() {
        return active;
    }
    profiles
        .iter()
        .filter(|profile| activation(profile).is_some_and(|a| a.active_by_default))
        .collect()
}
