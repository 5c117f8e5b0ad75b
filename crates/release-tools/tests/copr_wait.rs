use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use release_tools::copr_wait::{COOLDOWN, COPR_OWNER, COPR_PROJECT};
use release_tools::{
    copr_dependencies, wait_for_dependencies, CoprDependency, PackageVersions, ReleaseError,
    WaitEvent,
};
use validation_core::fakes::FakeClock;

/// Versions handed out in order per package; the last one sticks.
#[derive(Default)]
struct ScriptedVersions {
    script: Mutex<HashMap<String, Vec<Option<String>>>>,
    lookups: Mutex<Vec<String>>,
}

impl ScriptedVersions {
    fn script(self, package: &str, versions: &[Option<&str>]) -> Self {
        self.script.lock().unwrap().insert(
            package.to_string(),
            versions.iter().map(|v| v.map(str::to_string)).collect(),
        );
        self
    }
}

#[async_trait]
impl PackageVersions for ScriptedVersions {
    async fn latest_succeeded_version(
        &self,
        owner: &str,
        project: &str,
        package: &str,
    ) -> release_tools::Result<Option<String>> {
        assert_eq!((owner, project), (COPR_OWNER, COPR_PROJECT));
        self.lookups.lock().unwrap().push(package.to_string());
        let mut script = self.script.lock().unwrap();
        let versions = script.get_mut(package).expect("unscripted package");
        if versions.len() > 1 {
            Ok(versions.remove(0))
        } else {
            Ok(versions[0].clone())
        }
    }
}

fn stable_of(dependency: &CoprDependency) -> release_tools::Result<String> {
    Ok(match dependency.repository {
        "ogr" => "1a2b3c4".to_string(),
        "specfile" => "9f8e7d6".to_string(),
        other => panic!("unexpected repository {other}"),
    })
}

#[tokio::test]
async fn requeues_until_stable_builds_exist() {
    let versions = ScriptedVersions::default()
        .script(
            "python-ogr",
            &[
                Some("0.48.0.20240301gitaaaaaaa"),
                Some("0.49.0.20240305git1a2b3c4"),
            ],
        )
        .script("python-specfile", &[Some("0.28.1.git9f8e7d6")]);
    let clock = FakeClock::new();
    let mut events = Vec::new();

    wait_for_dependencies(
        copr_dependencies("packit"),
        &versions,
        &clock,
        stable_of,
        |event| events.push(event),
    )
    .await
    .unwrap();

    let deps = copr_dependencies("packit");
    let (ogr, specfile) = (deps[0], deps[1]);
    assert_eq!(
        events,
        vec![
            WaitEvent::Checking(ogr),
            WaitEvent::Requeued(ogr),
            WaitEvent::Checking(specfile),
            WaitEvent::Finished(specfile),
            WaitEvent::CoolingDown,
            WaitEvent::Checking(ogr),
            WaitEvent::Finished(ogr),
        ]
    );
    assert_eq!(clock.sleeps(), vec![COOLDOWN]);
    assert_eq!(COOLDOWN, Duration::from_secs(30));
}

#[tokio::test]
async fn missing_build_keeps_waiting() {
    let versions = ScriptedVersions::default().script("packit", &[None, None, Some("1.0.0.git0c0ffee")]);
    let clock = FakeClock::new();

    wait_for_dependencies(
        copr_dependencies("packit-service"),
        &versions,
        &clock,
        |_| Ok("0c0ffee".to_string()),
        |_| {},
    )
    .await
    .unwrap();

    assert_eq!(versions.lookups.lock().unwrap().len(), 3);
    assert_eq!(clock.sleeps().len(), 2);
}

#[tokio::test]
async fn repository_without_dependencies_returns_immediately() {
    let versions = ScriptedVersions::default();
    let clock = FakeClock::new();
    let mut events = Vec::new();

    wait_for_dependencies(
        copr_dependencies("sandcastle"),
        &versions,
        &clock,
        stable_of,
        |event| events.push(event),
    )
    .await
    .unwrap();

    assert!(events.is_empty());
    assert!(clock.sleeps().is_empty());
}

#[tokio::test]
async fn stable_ref_errors_abort_the_wait() {
    let versions = ScriptedVersions::default();
    let clock = FakeClock::new();

    let err = wait_for_dependencies(
        copr_dependencies("packit-service"),
        &versions,
        &clock,
        |_| Err(ReleaseError::Invalid("no clone".to_string())),
        |_| {},
    )
    .await
    .unwrap_err();

    assert!(matches!(err, ReleaseError::Invalid(_)));
    assert!(versions.lookups.lock().unwrap().is_empty());
}
