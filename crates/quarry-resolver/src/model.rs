//! Effective POM: the raw model after parent inheritance, profile injection, property
//! interpolation and `import`-scope BOMs.

use std::collections::{BTreeMap, HashSet};
use std::sync::OnceLock;

use regex::Regex;

use crate::error::{ResolutionError, Result};
use crate::pom::{Dependency, RawPom};
use crate::profile::{select_active_profiles, ActivationContext, ProfileActivator};

const MAX_PARENT_DEPTH: usize = 64;
const MAX_INTERPOLATION_PASSES: usize = 16;

/// Supplies raw POMs by coordinate.
pub trait PomSource {
    /// The parsed POM for `group_id:artifact_id:version`.
    ///
    /// Fails with [`ResolutionError::ArtifactNotFound`] when no repository has it.
    fn load_pom(&self, group_id: &str, artifact_id: &str, version: &str) -> Result<RawPom>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EffectiveModel {
    pub group_id: String,
    pub artifact_id: String,
    pub version: String,
    pub packaging: String,
    pub properties: BTreeMap<String, String>,
    /// Declared dependencies with managed versions and scopes filled in.
    pub dependencies: Vec<Dependency>,
    /// Keyed by [`Dependency::management_key`].
    pub dependency_management: BTreeMap<String, Dependency>,
}

impl EffectiveModel {
    #[must_use]
    pub fn managed(&self, dependency: &Dependency) -> Option<&Dependency> {
        self.dependency_management
            .get(&dependency.management_key())
    }
}

pub struct ModelBuilder<'a> {
    source: &'a dyn PomSource,
    activator: &'a dyn ProfileActivator,
    ctx: &'a ActivationContext,
}

impl<'a> ModelBuilder<'a> {
    pub fn new(
        source: &'a dyn PomSource,
        activator: &'a dyn ProfileActivator,
        ctx: &'a ActivationContext,
    ) -> Self {
        Self {
            source,
            activator,
            ctx,
        }
    }

    pub fn build(&self, group_id: &str, artifact_id: &str, version: &str) -> Result<EffectiveModel> {
        let mut importing = Vec::new();
        self.build_model(group_id, artifact_id, version, &mut importing)
    }

    fn build_model(
        &self,
        group_id: &str,
        artifact_id: &str,
        version: &str,
        importing: &mut Vec<String>,
    ) -> Result<EffectiveModel> {
        let raw = self.source.load_pom(group_id, artifact_id, version)?;
        let chain = self.parent_chain(raw, group_id, artifact_id, version)?;
        let chain: Vec<RawPom> = chain
            .into_iter()
            .map(|pom| self.inject_profiles(pom))
            .collect();

        let mut model = inherit(&chain, group_id, artifact_id, version);
        let lookup = self.lookup_table(&model, &chain);
        for dep in model
            .dependencies
            .iter_mut()
            .chain(model.dependency_management.values_mut())
        {
            interpolate_dependency(dep, &lookup);
        }
        model.properties = lookup;
        model.dependency_management = model
            .dependency_management
            .into_values()
            .map(|dep| (dep.management_key(), dep))
            .collect();

        self.import_boms(&mut model, importing)?;
        apply_management(&mut model);
        Ok(model)
    }

    /// The POM followed by its ancestors, nearest first.
    fn parent_chain(
        &self,
        raw: RawPom,
        group_id: &str,
        artifact_id: &str,
        version: &str,
    ) -> Result<Vec<RawPom>> {
        let origin = format!("{group_id}:{artifact_id}:{version}");
        let mut seen = HashSet::from([origin.clone()]);
        let mut chain = vec![raw];

        while let Some(parent) = chain.last().and_then(|pom| pom.parent.clone()) {
            let key = format!(
                "{}:{}:{}",
                parent.group_id, parent.artifact_id, parent.version
            );
            if !seen.insert(key.clone()) || chain.len() > MAX_PARENT_DEPTH {
                return Err(ResolutionError::ParentCycle {
                    artifact: origin,
                    parent: key,
                });
            }
            let pom = self
                .source
                .load_pom(&parent.group_id, &parent.artifact_id, &parent.version)?;
            chain.push(pom);
        }
        Ok(chain)
    }

    fn inject_profiles(&self, mut pom: RawPom) -> RawPom {
        let profiles = std::mem::take(&mut pom.profiles);
        for profile in select_active_profiles(&profiles, self.activator, self.ctx) {
            tracing::trace!(
                target = "quarry.resolver",
                profile = %profile.id,
                artifact = pom.artifact_id.as_deref().unwrap_or(""),
                "activating profile"
            );
            pom.properties.extend(profile.properties.clone());
            merge_dependencies(&mut pom.dependencies, &profile.dependencies);
            merge_dependencies(
                &mut pom.dependency_management,
                &profile.dependency_management,
            );
        }
        pom.profiles = profiles;
        pom
    }

    /// Every property visible to `${...}` expressions, with nested references expanded.
    fn lookup_table(&self, model: &EffectiveModel, chain: &[RawPom]) -> BTreeMap<String, String> {
        let mut props = BTreeMap::new();
        if let Some(jdk) = &self.ctx.jdk {
            props.insert("java.version".to_string(), jdk.clone());
        }
        props.extend(self.ctx.properties.clone());
        props.extend(model.properties.clone());

        for prefix in ["project", "pom"] {
            props.insert(format!("{prefix}.groupId"), model.group_id.clone());
            props.insert(format!("{prefix}.artifactId"), model.artifact_id.clone());
            props.insert(format!("{prefix}.version"), model.version.clone());
            props.insert(format!("{prefix}.packaging"), model.packaging.clone());
        }
        if let Some(parent) = chain.first().and_then(|pom| pom.parent.as_ref()) {
            props.insert("project.parent.groupId".into(), parent.group_id.clone());
            props.insert("project.parent.artifactId".into(), parent.artifact_id.clone());
            props.insert("project.parent.version".into(), parent.version.clone());
        }

        let snapshot = props.clone();
        for value in props.values_mut() {
            *value = resolve_placeholders(value, &snapshot);
        }
        props
    }

    fn import_boms(&self, model: &mut EffectiveModel, importing: &mut Vec<String>) -> Result<()> {
        let imports: Vec<Dependency> = model
            .dependency_management
            .values()
            .filter(|dep| is_import(dep))
            .cloned()
            .collect();
        if imports.is_empty() {
            return Ok(());
        }
        model.dependency_management.retain(|_, dep| !is_import(dep));

        let self_key = format!("{}:{}:{}", model.group_id, model.artifact_id, model.version);
        importing.push(self_key);
        for bom in imports {
            let Some(version) = bom.version.as_deref() else {
                tracing::warn!(
                    target = "quarry.resolver",
                    bom = %bom.management_key(),
                    "skipping imported BOM without a version"
                );
                continue;
            };
            let key = format!("{}:{}:{version}", bom.group_id, bom.artifact_id);
            if importing.contains(&key) {
                tracing::warn!(
                    target = "quarry.resolver",
                    bom = %key,
                    "skipping BOM import cycle"
                );
                continue;
            }
            let imported =
                match self.build_model(&bom.group_id, &bom.artifact_id, version, importing) {
                    Ok(imported) => imported,
                    Err(err) => {
                        importing.pop();
                        return Err(err);
                    }
                };
            for (key, dep) in imported.dependency_management {
                model.dependency_management.entry(key).or_insert(dep);
            }
        }
        importing.pop();
        Ok(())
    }
}

fn is_import(dep: &Dependency) -> bool {
    dep.scope.as_deref() == Some("import") && dep.type_.as_deref() == Some("pom")
}

/// Add `extra` to `target`, replacing entries with the same management key.
fn merge_dependencies(target: &mut Vec<Dependency>, extra: &[Dependency]) {
    for dep in extra {
        let key = dep.management_key();
        match target.iter_mut().find(|d| d.management_key() == key) {
            Some(existing) => *existing = dep.clone(),
            None => target.push(dep.clone()),
        }
    }
}

/// Flatten the chain: nearer POMs win, their declarations come first.
fn inherit(chain: &[RawPom], group_id: &str, artifact_id: &str, version: &str) -> EffectiveModel {
    let pom = &chain[0];
    let mut model = EffectiveModel {
        group_id: pom.effective_group_id().unwrap_or(group_id).to_string(),
        artifact_id: pom.artifact_id.as_deref().unwrap_or(artifact_id).to_string(),
        version: pom.effective_version().unwrap_or(version).to_string(),
        packaging: pom.packaging.clone().unwrap_or_else(|| "jar".to_string()),
        ..EffectiveModel::default()
    };

    for ancestor in chain.iter().rev() {
        model.properties.extend(ancestor.properties.clone());
    }

    let mut seen = HashSet::new();
    for ancestor in chain {
        for dep in &ancestor.dependencies {
            if seen.insert(dep.management_key()) {
                model.dependencies.push(dep.clone());
            }
        }
        for dep in &ancestor.dependency_management {
            model
                .dependency_management
                .entry(dep.management_key())
                .or_insert_with(|| dep.clone());
        }
    }
    model
}

fn interpolate_dependency(dep: &mut Dependency, props: &BTreeMap<String, String>) {
    dep.group_id = resolve_placeholders(&dep.group_id, props);
    dep.artifact_id = resolve_placeholders(&dep.artifact_id, props);
    for field in [
        &mut dep.version,
        &mut dep.type_,
        &mut dep.classifier,
        &mut dep.scope,
        &mut dep.system_path,
    ] {
        if let Some(value) = field.as_mut() {
            *value = resolve_placeholders(value, props);
        }
    }
    for exclusion in &mut dep.exclusions {
        exclusion.group_id = resolve_placeholders(&exclusion.group_id, props);
        exclusion.artifact_id = resolve_placeholders(&exclusion.artifact_id, props);
    }
}

/// Fill versions, scopes and exclusions of declared dependencies from dependency management.
fn apply_management(model: &mut EffectiveModel) {
    let management = &model.dependency_management;
    let coordinate = format!("{}:{}", model.group_id, model.artifact_id);
    model.dependencies.retain_mut(|dep| {
        if let Some(managed) = management.get(&dep.management_key()) {
            if dep.version.is_none() {
                dep.version = managed.version.clone();
            }
            if dep.scope.is_none() {
                dep.scope = managed.scope.clone();
            }
            if dep.exclusions.is_empty() {
                dep.exclusions = managed.exclusions.clone();
            }
        }
        if dep.version.is_none() && dep.scope() != "system" {
            tracing::warn!(
                target = "quarry.resolver",
                project = %coordinate,
                dependency = %dep.management_key(),
                "dropping dependency without a version"
            );
            return false;
        }
        true
    });
}

/// Expand `${name}` references; unknown names are left as written.
pub fn resolve_placeholders(text: &str, props: &BTreeMap<String, String>) -> String {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"\$\{([^}]+)\}").expect("valid regex"));

    let mut current = text.to_string();
    for _ in 0..MAX_INTERPOLATION_PASSES {
        if !current.contains("${") {
            break;
        }
        let next = re
            .replace_all(&current, |caps: &regex::Captures<'_>| {
                let key = &caps[1];
                props
                    .get(key)
                    .cloned()
                    .unwrap_or_else(|| caps[0].to_string())
            })
            .into_owned();
        if next == current {
            break;
        }
        current = next;
    }
    current
}
