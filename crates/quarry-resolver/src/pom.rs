//! Raw `pom.xml` model, exactly as declared: no inheritance, interpolation or profiles.

use std::collections::BTreeMap;

use crate::xml::{child_element, child_text};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exclusion {
    pub group_id: String,
    pub artifact_id: String,
}

impl Exclusion {
    /// `*` in either position matches anything.
    #[must_use]
    pub fn matches(&self, group_id: &str, artifact_id: &str) -> bool {
        (self.group_id == "*" || self.group_id == group_id)
            && (self.artifact_id == "*" || self.artifact_id == artifact_id)
    }

    /// Parse a `groupId:artifactId` exclusion; a bare `groupId` excludes every artifact in it.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        let (group_id, artifact_id) = text.split_once(':').unwrap_or((text, "*"));
        Some(Self {
            group_id: group_id.to_string(),
            artifact_id: artifact_id.to_string(),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dependency {
    pub group_id: String,
    pub artifact_id: String,
    pub version: Option<String>,
    pub type_: Option<String>,
    pub classifier: Option<String>,
    pub scope: Option<String>,
    pub optional: bool,
    pub system_path: Option<String>,
    pub exclusions: Vec<Exclusion>,
}

impl Dependency {
    #[must_use]
    pub fn extension(&self) -> &str {
        match self.type_.as_deref() {
            None | Some("" | "jar" | "bundle" | "maven-plugin" | "test-jar" | "ejb-client") => {
                "jar"
            }
            Some(other) => other,
        }
    }

    #[must_use]
    pub fn effective_classifier(&self) -> &str {
        match (self.type_.as_deref(), self.classifier.as_deref()) {
            (_, Some(classifier)) if !classifier.is_empty() => classifier,
            (Some("test-jar"), _) => "tests",
            (Some("ejb-client"), _) => "client",
            _ => "",
        }
    }

    #[must_use]
    pub fn scope(&self) -> &str {
        self.scope.as_deref().unwrap_or(quarry_core::COMPILE_SCOPE)
    }

    /// `groupId:artifactId:type[:classifier]`, the key dependency management is indexed by.
    #[must_use]
    pub fn management_key(&self) -> String {
        let mut key = format!(
            "{}:{}:{}",
            self.group_id,
            self.artifact_id,
            self.type_.as_deref().unwrap_or("jar")
        );
        if let Some(classifier) = self.classifier.as_deref().filter(|c| !c.is_empty()) {
            key.push(':');
            key.push_str(classifier);
        }
        key
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parent {
    pub group_id: String,
    pub artifact_id: String,
    pub version: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivationOs {
    pub name: Option<String>,
    pub family: Option<String>,
    pub arch: Option<String>,
    pub version: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationProperty {
    pub name: String,
    pub value: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivationFile {
    pub exists: Option<String>,
    pub missing: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Activation {
    pub active_by_default: bool,
    pub jdk: Option<String>,
    pub os: Option<ActivationOs>,
    pub property: Option<ActivationProperty>,
    pub file: Option<ActivationFile>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Profile {
    pub id: String,
    pub activation: Option<Activation>,
    pub properties: BTreeMap<String, String>,
    pub dependencies: Vec<Dependency>,
    pub dependency_management: Vec<Dependency>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawPom {
    pub group_id: Option<String>,
    pub artifact_id: Option<String>,
    pub version: Option<String>,
    pub packaging: Option<String>,
    pub parent: Option<Parent>,
    pub properties: BTreeMap<String, String>,
    pub dependencies: Vec<Dependency>,
    pub dependency_management: Vec<Dependency>,
    pub profiles: Vec<Profile>,
}

impl RawPom {
    #[must_use]
    pub fn effective_group_id(&self) -> Option<&str> {
        self.group_id
            .as_deref()
            .or_else(|| self.parent.as_ref().map(|p| p.group_id.as_str()))
    }

    #[must_use]
    pub fn effective_version(&self) -> Option<&str> {
        self.version
            .as_deref()
            .or_else(|| self.parent.as_ref().map(|p| p.version.as_str()))
    }
}

pub fn parse_pom(text: &str) -> Result<RawPom, roxmltree::Error> {
    let options = roxmltree::ParsingOptions {
        allow_dtd: true,
        ..roxmltree::ParsingOptions::default()
    };
    let doc = roxmltree::Document::parse_with_options(text, options)?;
    let project = doc.root_element();

    let mut pom = RawPom {
        group_id: child_text(project, "groupId"),
        artifact_id: child_text(project, "artifactId"),
        version: child_text(project, "version"),
        packaging: child_text(project, "packaging"),
        ..RawPom::default()
    };

    if let Some(parent) = child_element(project, "parent") {
        let group_id = child_text(parent, "groupId");
        let artifact_id = child_text(parent, "artifactId");
        let version = child_text(parent, "version");
        if let (Some(group_id), Some(artifact_id), Some(version)) = (group_id, artifact_id, version)
        {
            pom.parent = Some(Parent {
                group_id,
                artifact_id,
                version,
            });
        }
    }

    pom.properties = parse_properties(project);
    pom.dependencies = child_element(project, "dependencies")
        .map(parse_dependencies)
        .unwrap_or_default();
    pom.dependency_management = parse_dependency_management(project);

    if let Some(profiles) = child_element(project, "profiles") {
        pom.profiles = profiles
            .children()
            .filter(|n| n.is_element() && n.has_tag_name("profile"))
            .map(parse_profile)
            .collect();
    }

    Ok(pom)
}

fn parse_properties(node: roxmltree::Node<'_, '_>) -> BTreeMap<String, String> {
    let Some(props) = child_element(node, "properties") else {
        return BTreeMap::new();
    };
    props
        .children()
        .filter(|n| n.is_element())
        .map(|n| {
            let value = n.text().map(str::trim).unwrap_or_default();
            (n.tag_name().name().to_string(), value.to_string())
        })
        .collect()
}

fn parse_dependency_management(node: roxmltree::Node<'_, '_>) -> Vec<Dependency> {
    child_element(node, "dependencyManagement")
        .and_then(|dm| child_element(dm, "dependencies"))
        .map(parse_dependencies)
        .unwrap_or_default()
}

fn parse_dependencies(deps_node: roxmltree::Node<'_, '_>) -> Vec<Dependency> {
    deps_node
        .children()
        .filter(|n| n.is_element() && n.has_tag_name("dependency"))
        .filter_map(|dep_node| {
            let group_id = child_text(dep_node, "groupId")?;
            let artifact_id = child_text(dep_node, "artifactId")?;
            let exclusions = child_element(dep_node, "exclusions")
                .map(|node| {
                    node.children()
                        .filter(|n| n.is_element() && n.has_tag_name("exclusion"))
                        .filter_map(|n| {
                            Some(Exclusion {
                                group_id: child_text(n, "groupId")?,
                                artifact_id: child_text(n, "artifactId")
                                    .unwrap_or_else(|| "*".to_string()),
                            })
                        })
                        .collect()
                })
                .unwrap_or_default();

            Some(Dependency {
                group_id,
                artifact_id,
                version: child_text(dep_node, "version"),
                type_: child_text(dep_node, "type"),
                classifier: child_text(dep_node, "classifier"),
                scope: child_text(dep_node, "scope"),
                optional: child_text(dep_node, "optional").is_some_and(|v| v == "true"),
                system_path: child_text(dep_node, "systemPath"),
                exclusions,
            })
        })
        .collect()
}

fn parse_profile(node: roxmltree::Node<'_, '_>) -> Profile {
    Profile {
        id: child_text(node, "id").unwrap_or_else(|| "default".to_string()),
        activation: child_element(node, "activation").map(parse_activation),
        properties: parse_properties(node),
        dependencies: child_element(node, "dependencies")
            .map(parse_dependencies)
            .unwrap_or_default(),
        dependency_management: parse_dependency_management(node),
    }
}

fn parse_activation(node: roxmltree::Node<'_, '_>) -> Activation {
    Activation {
        active_by_default: child_text(node, "activeByDefault").is_some_and(|v| v == "true"),
        jdk: child_text(node, "jdk"),
        os: child_element(node, "os").map(|os| ActivationOs {
            name: child_text(os, "name"),
            family: child_text(os, "family"),
            arch: child_text(os, "arch"),
            version: child_text(os, "version"),
        }),
        property: child_element(node, "property").and_then(|prop| {
            Some(ActivationProperty {
                name: child_text(prop, "name")?,
                value: child_text(prop, "value"),
            })
        }),
        file: child_element(node, "file").map(|file| ActivationFile {
            exists: child_text(file, "exists"),
            missing: child_text(file, "missing"),
        }),
    }
}
