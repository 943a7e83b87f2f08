//! Mock artifact server and manifest fixtures

use std::time::Duration;

use modpack_dl::{ArtifactDescriptor, Config, InstallLayout, Manifest, ModpackInstaller, Target};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Serve `body` at `/files/<file_name>` and redirect `/download/<id>` to it
///
/// Mirrors mod hosting sites, where the manifest URL redirects to a CDN path
/// whose last segment is the real file name.
pub async fn mount_artifact(server: &MockServer, id: &str, file_name: &str, body: &[u8]) {
    Mock::given(method("GET"))
        .and(path(format!("/download/{id}")))
        .respond_with(
            ResponseTemplate::new(302)
                .insert_header("Location", format!("{}/files/{file_name}", server.uri())),
        )
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/files/{file_name}")))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.to_vec()))
        .mount(server)
        .await;
}

/// Answer `/download/<id>` with `status` every time
pub async fn mount_failure(server: &MockServer, id: &str, status: u16) {
    Mock::given(method("GET"))
        .and(path(format!("/download/{id}")))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}

/// Artifact fetched from the mock server
pub fn remote(server: &MockServer, id: &str, name: &str) -> ArtifactDescriptor {
    ArtifactDescriptor::new(id, name, format!("{}/download/{id}", server.uri()))
}

/// Artifact the user has to fetch by hand
pub fn manual(id: &str, name: &str) -> ArtifactDescriptor {
    ArtifactDescriptor::new(id, name, format!("https://www.example.com/{id}")).manual()
}

/// Standard pack: two shared mods, one client-only, one manual
pub fn sample_manifest(server: &MockServer) -> Manifest {
    Manifest::new(vec![
        remote(server, "jei", "Just Enough Items"),
        remote(server, "create", "Create"),
        remote(server, "oculus", "Oculus").with_target(Target::Client),
        manual("mekanism", "Mekanism"),
    ])
    .unwrap()
}

/// Mount every automatic artifact of [`sample_manifest`]
pub async fn mount_sample(server: &MockServer) {
    mount_artifact(server, "jei", "jei-1.20.1-15.2.jar", b"jei-bytes").await;
    mount_artifact(server, "create", "create-1.20.1-0.5.1.jar", b"create-bytes").await;
    mount_artifact(server, "oculus", "oculus-mc1.20.1-1.6.9.jar", b"oculus-bytes").await;
}

/// Installer with fast retries, plus a layout in a fresh temp dir
pub fn create_test_installer() -> (ModpackInstaller, InstallLayout, TempDir) {
    let temp_dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.retry.delay = Duration::from_millis(10);
    let layout = InstallLayout::new(temp_dir.path().join("mods"), &config);
    let installer = ModpackInstaller::new(config).unwrap();
    (installer, layout, temp_dir)
}
