//! Fixture builders shared by the daemon's unit tests.

use handshake_common::{CONTRACT_FILE, INTERFACE_FILE, MockGitTransport, SERVICE_FILE};

pub fn remote(name: &str) -> String {
    format!("https://github.com/acme/{name}.git")
}

/// Describes the published documents of one fixture repository.
#[derive(Default)]
pub struct Fixture<'a> {
    pub version: Option<&'a str>,
    pub interface: Option<&'a [&'a str]>,
    /// `(key, repo name, dependency name)` entries of `desiredState`.
    pub desired: Option<&'a [(&'a str, &'a str, &'a str)]>,
}

impl Fixture<'_> {
    pub fn files(&self) -> Vec<(&'static str, String)> {
        let mut files = Vec::new();
        if let Some(version) = self.version {
            files.push((CONTRACT_FILE, format!("version: {version}\n")));
        }
        if let Some(names) = self.interface {
            let mut yaml = String::from("dependencies:\n");
            for name in names {
                yaml.push_str(&format!("  - name: {name}\n"));
            }
            if names.is_empty() {
                yaml = String::from("dependencies: []\n");
            }
            files.push((INTERFACE_FILE, yaml));
        }
        if let Some(entries) = self.desired {
            let mut yaml = String::from("metadata:\n  owner: team-payments\n");
            if entries.is_empty() {
                yaml.push_str("desiredState: {}\n");
            } else {
                yaml.push_str("desiredState:\n");
                for (key, repo, dep) in entries {
                    yaml.push_str(&format!(
                        "  {key}:\n    repo: {}\n    dependencies:\n      - name: {dep}\n",
                        remote(repo)
                    ));
                }
            }
            files.push((SERVICE_FILE, yaml));
        }
        files
    }
}

/// Publish `fixture` as the remote `acme/<name>`.
pub fn publish(mock: MockGitTransport, name: &str, fixture: Fixture<'_>) -> MockGitTransport {
    let files = fixture.files();
    let borrowed: Vec<(&str, &str)> = files.iter().map(|(n, c)| (*n, c.as_str())).collect();
    mock.with_remote(&remote(name), &borrowed)
}

/// `checkout` depends on `billing`; both publish `checkout_version`/`billing_version`.
pub fn checkout_and_billing(checkout_version: &str, billing_version: &str) -> MockGitTransport {
    let mock = publish(
        MockGitTransport::new(),
        "checkout",
        Fixture {
            version: Some(checkout_version),
            interface: Some(&["billing"]),
            desired: Some(&[("billing", "billing", "billing")]),
        },
    );
    publish(
        mock,
        "billing",
        Fixture {
            version: Some(billing_version),
            interface: Some(&[]),
            desired: Some(&[]),
        },
    )
}
