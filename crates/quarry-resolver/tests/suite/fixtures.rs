use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use quarry_core::RemoteRepository;
use quarry_resolver::ArtifactRepositoryManager;
use quarry_retry::Retry;
use tempfile::TempDir;

/// A `file://` Maven repository laid out in a temp directory.
pub struct RemoteFixture {
    dir: TempDir,
    id: String,
}

impl RemoteFixture {
    pub fn new(id: &str) -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
            id: id.to_string(),
        }
    }

    pub fn repository(&self) -> RemoteRepository {
        let url = url::Url::from_directory_path(self.dir.path()).unwrap();
        RemoteRepository::new(self.id.as_str(), url.as_str()).unwrap()
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.dir.path().join(relative)
    }

    fn version_dir(&self, group_id: &str, artifact_id: &str, version: &str) -> PathBuf {
        let base = version
            .split_once("-20")
            .filter(|_| !version.ends_with("-SNAPSHOT"))
            .map(|(prefix, _)| format!("{prefix}-SNAPSHOT"))
            .unwrap_or_else(|| version.to_string());
        self.dir
            .path()
            .join(group_id.replace('.', "/"))
            .join(artifact_id)
            .join(base)
    }

    /// Publish a POM whose body (dependencies, profiles...) is spliced into `<project>`.
    pub fn pom(&self, group_id: &str, artifact_id: &str, version: &str, body: &str) -> &Self {
        let dir = self.version_dir(group_id, artifact_id, version);
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join(format!("{artifact_id}-{version}.pom")),
            format!(
                r#"<?xml version="1.0" encoding="UTF-8"?>
<project xmlns="http://maven.apache.org/POM/4.0.0">
  <modelVersion>4.0.0</modelVersion>
  <groupId>{group_id}</groupId>
  <artifactId>{artifact_id}</artifactId>
  <version>{version}</version>
  {body}
</project>
"#
            ),
        )
        .unwrap();
        self
    }

    /// Publish a small valid jar; an empty classifier publishes the main artifact.
    pub fn jar(&self, group_id: &str, artifact_id: &str, version: &str, classifier: &str) -> &Self {
        let dir = self.version_dir(group_id, artifact_id, version);
        let name = if classifier.is_empty() {
            format!("{artifact_id}-{version}.jar")
        } else {
            format!("{artifact_id}-{version}-{classifier}.jar")
        };
        write_jar(&dir.join(name));
        self
    }

    /// POM plus main jar.
    pub fn library(&self, group_id: &str, artifact_id: &str, version: &str, body: &str) -> &Self {
        self.pom(group_id, artifact_id, version, body)
            .jar(group_id, artifact_id, version, "")
    }

    pub fn metadata(&self, group_id: &str, artifact_id: &str, versions: &[&str]) -> &Self {
        let dir = self
            .dir
            .path()
            .join(group_id.replace('.', "/"))
            .join(artifact_id);
        fs::create_dir_all(&dir).unwrap();
        let listed: String = versions
            .iter()
            .map(|v| format!("      <version>{v}</version>\n"))
            .collect();
        fs::write(
            dir.join("maven-metadata.xml"),
            format!(
                r#"<?xml version="1.0" encoding="UTF-8"?>
<metadata>
  <groupId>{group_id}</groupId>
  <artifactId>{artifact_id}</artifactId>
  <versioning>
    <versions>
{listed}    </versions>
  </versioning>
</metadata>
"#
            ),
        )
        .unwrap();
        self
    }
}

pub fn write_jar(path: &Path) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let mut zip = zip::ZipWriter::new(File::create(path).unwrap());
    zip.start_file("META-INF/MANIFEST.MF", zip::write::SimpleFileOptions::default())
        .unwrap();
    zip.write_all(b"Manifest-Version: 1.0\n").unwrap();
    zip.finish().unwrap();
}

/// `<dependency>` element.
pub fn dep(group_id: &str, artifact_id: &str, version: &str) -> String {
    dep_with(group_id, artifact_id, version, "")
}

/// `<dependency>` element with extra child elements (scope, exclusions...).
pub fn dep_with(group_id: &str, artifact_id: &str, version: &str, extra: &str) -> String {
    format!(
        "<dependency><groupId>{group_id}</groupId><artifactId>{artifact_id}</artifactId><version>{version}</version>{extra}</dependency>"
    )
}

pub fn deps(items: &[String]) -> String {
    format!("<dependencies>{}</dependencies>", items.concat())
}

pub fn manager(local: &Path, repositories: Vec<RemoteRepository>) -> ArtifactRepositoryManager {
    ArtifactRepositoryManager::new(local, repositories, None).with_retry(Retry::disabled())
}

pub fn file_names(artifacts: &[quarry_resolver::ResolvedArtifact]) -> Vec<String> {
    artifacts
        .iter()
        .map(|a| a.file.file_name().unwrap().to_string_lossy().into_owned())
        .collect()
}
