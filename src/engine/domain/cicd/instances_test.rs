use serde_json::json;

use super::instances::CiCdInstance;
use super::jobs::CiCdJob;
use crate::test_helpers::TestTenant;

fn jenkins(t: &TestTenant) -> CiCdInstance {
    CiCdInstance {
        url: Some("https://ci.lens.dev".into()),
        instance_type: Some("jenkins".into()),
        integration_id: Some(t.integration_id.clone()),
        ..CiCdInstance::new("jenkins-main")
    }
}

#[test]
fn reinsert_refreshes_config_and_keeps_integration() {
    let t = TestTenant::new();
    let instance = CiCdInstance {
        config: Some(json!({"poll_minutes": 5})),
        ..jenkins(&t)
    };
    let id = t.engine.cicd_instances.insert(&t.tenant, &instance).unwrap();
    assert_eq!(id, instance.id);

    let other = t.integration("azure", "azure_devops");
    let again = CiCdInstance {
        url: None,
        integration_id: Some(other),
        config: Some(json!({"poll_minutes": 30})),
        ..instance.clone()
    };
    assert_eq!(t.engine.cicd_instances.insert(&t.tenant, &again).unwrap(), instance.id);

    let stored = t.engine.cicd_instances.get(&t.tenant, &instance.id).unwrap().unwrap();
    assert_eq!(stored.config, Some(json!({"poll_minutes": 30})));
    assert_eq!(stored.url, instance.url);
    assert_eq!(stored.integration_id, Some(t.integration_id.clone()));
    assert_eq!(t.engine.cicd_instances.list(&t.tenant, None, None).unwrap().total_count, 1);
}

#[test]
fn upsert_keeps_integration_and_unset_fields() {
    let t = TestTenant::new();
    let instance = jenkins(&t);
    t.engine.cicd_instances.upsert(&t.tenant, &instance).unwrap();

    let other = t.integration("azure", "azure_devops");
    let refresh = CiCdInstance {
        id: instance.id.clone(),
        name: Some("jenkins-renamed".into()),
        url: None,
        integration_id: Some(other),
        instance_type: None,
        config: None,
        created_at: None,
        updated_at: None,
    };
    assert_eq!(t.engine.cicd_instances.upsert(&t.tenant, &refresh).unwrap(), instance.id);

    let stored = t.engine.cicd_instances.get(&t.tenant, &instance.id).unwrap().unwrap();
    assert_eq!(stored.name.as_deref(), Some("jenkins-renamed"));
    assert_eq!(stored.url, instance.url);
    assert_eq!(stored.instance_type.as_deref(), Some("jenkins"));
    assert_eq!(stored.integration_id, Some(t.integration_id.clone()));
}

#[test]
fn upsert_refreshes_config_when_given() {
    let t = TestTenant::new();
    let instance = jenkins(&t);
    t.engine.cicd_instances.upsert(&t.tenant, &instance).unwrap();

    let refresh = CiCdInstance {
        config: Some(json!({"folders": ["release"]})),
        ..instance.clone()
    };
    t.engine.cicd_instances.upsert(&t.tenant, &refresh).unwrap();
    let stored = t.engine.cicd_instances.get(&t.tenant, &instance.id).unwrap().unwrap();
    assert_eq!(stored.config, Some(json!({"folders": ["release"]})));

    t.engine.cicd_instances.upsert(&t.tenant, &instance).unwrap();
    let stored = t.engine.cicd_instances.get(&t.tenant, &instance.id).unwrap().unwrap();
    assert_eq!(stored.config, Some(json!({"folders": ["release"]})));
}

#[test]
fn config_round_trips_as_json() {
    let t = TestTenant::new();
    let instance = jenkins(&t);
    t.engine.cicd_instances.insert(&t.tenant, &instance).unwrap();

    let config = json!({"poll_minutes": 15, "folders": ["release", "nightly"]});
    assert!(t.engine.cicd_instances.update_config(&t.tenant, &instance.id, &config).unwrap());
    assert!(!t.engine.cicd_instances.update_config(&t.tenant, "missing", &config).unwrap());

    let stored = t.engine.cicd_instances.get(&t.tenant, &instance.id).unwrap().unwrap();
    assert_eq!(stored.config, Some(config));
}

#[test]
fn deleting_instance_removes_its_jobs() {
    let t = TestTenant::new();
    let instance = jenkins(&t);
    t.engine.cicd_instances.insert(&t.tenant, &instance).unwrap();
    let job = t
        .engine
        .cicd_jobs
        .upsert(&t.tenant, &CiCdJob::new(&instance.id, "deploy"))
        .unwrap();

    assert!(t.engine.cicd_instances.delete(&t.tenant, &instance.id).unwrap());
    assert!(t.engine.cicd_jobs.get(&t.tenant, &job).unwrap().is_none());
    assert_eq!(t.engine.cicd_instances.list(&t.tenant, None, None).unwrap().total_count, 0);
}

#[test]
fn job_upsert_is_keyed_by_instance_and_name() {
    let t = TestTenant::new();
    let instance = jenkins(&t);
    t.engine.cicd_instances.insert(&t.tenant, &instance).unwrap();

    let mut job = CiCdJob::new(&instance.id, "deploy");
    job.project_name = Some("lens-api".into());
    let id = t.engine.cicd_jobs.upsert(&t.tenant, &job).unwrap();

    let again = t
        .engine
        .cicd_jobs
        .upsert(&t.tenant, &CiCdJob::new(&instance.id, "deploy"))
        .unwrap();
    assert_eq!(again, id);

    let stored = t
        .engine
        .cicd_jobs
        .get_by_name(&t.tenant, &instance.id, "deploy")
        .unwrap()
        .unwrap();
    assert_eq!(stored.project_name.as_deref(), Some("lens-api"));

    let err = t
        .engine
        .cicd_jobs
        .upsert(&t.tenant, &CiCdJob::new("no-such-instance", "deploy"))
        .unwrap_err();
    assert!(err.is_constraint());
}
