use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use serde_json::json;

use super::common::*;
use crate::portal::{
    Actor, Application, EntityKind, EntityRepository, Job, JobSeeker, ListQuery, Organization,
    PortalService, PortalServiceError, PortalSettings, QueryError, RecordId, Recruiter,
    RepositoryError, Role, User,
};

#[test]
fn create_then_load_returns_the_stored_record() {
    let (service, _) = build_service();
    let actor = hr_manager();

    let created: User = service
        .create(&actor, user_payload("a@example.com"))
        .expect("user created");
    let loaded: User = service.get(&actor, &created.id).expect("user loads");

    assert_eq!(loaded, created);
    assert_eq!(loaded.email, "a@example.com");
    assert_eq!(loaded.first_name.as_deref(), Some("Ada"));
    assert_eq!(loaded.created_at, loaded.updated_at);
}

#[test]
fn missing_required_fields_are_reported_together() {
    let (service, repository) = build_service();

    let err = service
        .create::<User>(&hr_manager(), object(json!({ "first_name": "Ada" })))
        .expect_err("payload is incomplete");

    match err {
        PortalServiceError::Validation(errors) => {
            assert_eq!(errors.message_for("email"), Some("email is a required field"));
            assert_eq!(
                errors.message_for("roq_user_id"),
                Some("roq_user_id is a required field")
            );
            assert_eq!(
                errors.message_for("tenant_id"),
                Some("tenant_id is a required field")
            );
        }
        other => panic!("expected validation error, got {other:?}"),
    }

    let page = EntityRepository::<User>::list(&repository, &ListQuery::default()).expect("list");
    assert_eq!(page.total, 0);
}

#[test]
fn invalid_payloads_never_reach_the_repository() {
    let service = PortalService::new(Arc::new(UnavailableRepository), PortalSettings::default());

    let err = service
        .create::<Job>(
            &hr_manager(),
            object(json!({ "title": "Engineer", "salary": 12.5 })),
        )
        .expect_err("payload is invalid");

    match err {
        PortalServiceError::Validation(errors) => {
            assert_eq!(errors.message_for("salary"), Some("salary must be an integer"));
            assert_eq!(
                errors.message_for("recruiter_id"),
                Some("recruiter_id is a required field")
            );
        }
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[test]
fn valid_payloads_surface_storage_failures() {
    let service = PortalService::new(Arc::new(UnavailableRepository), PortalSettings::default());

    let err = service
        .create::<User>(&hr_manager(), user_payload("a@example.com"))
        .expect_err("storage is offline");

    assert!(matches!(
        err,
        PortalServiceError::Repository(RepositoryError::Unavailable(_))
    ));
}

#[test]
fn dangling_references_are_rejected() {
    let (service, _) = build_service();

    let err = service
        .create::<Recruiter>(
            &hr_manager(),
            recruiter_payload(RecordId::new(), RecordId::new()),
        )
        .expect_err("parents do not exist");

    match err {
        PortalServiceError::UnknownReference { entity, fields } => {
            assert_eq!(entity, EntityKind::Recruiter);
            assert_eq!(fields, vec!["user_id", "organization_id"]);
        }
        other => panic!("expected unknown reference, got {other:?}"),
    }
}

#[test]
fn partial_update_keeps_untouched_fields() {
    let (service, _) = build_service();
    let actor = hr_manager();
    let seeded = seed_portal(&service);
    thread::sleep(Duration::from_millis(2));

    let updated: Job = service
        .update(
            &actor,
            &seeded.job.id,
            object(json!({ "title": "Senior Engineer" })),
        )
        .expect("job updated");

    assert_eq!(updated.title, "Senior Engineer");
    assert_eq!(updated.description, seeded.job.description);
    assert_eq!(updated.salary, Some(90000));
    assert_eq!(updated.recruiter_id, seeded.recruiter.id);
    assert_eq!(updated.created_at, seeded.job.created_at);
    assert!(updated.updated_at > seeded.job.updated_at);
    assert!(updated.updated_at > updated.created_at);

    let reloaded: Job = service.get(&actor, &seeded.job.id).expect("job reloads");
    assert_eq!(reloaded, updated);
}

#[test]
fn update_validates_the_merged_record() {
    let (service, _) = build_service();
    let seeded = seed_portal(&service);

    let err = service
        .update::<Organization>(
            &hr_manager(),
            &seeded.organization.id,
            object(json!({ "name": null })),
        )
        .expect_err("name is required");

    match err {
        PortalServiceError::Validation(errors) => {
            assert_eq!(errors.message_for("name"), Some("name is a required field"));
        }
        other => panic!("expected validation error, got {other:?}"),
    }

    let unchanged: Organization = service
        .get(&hr_manager(), &seeded.organization.id)
        .expect("organization loads");
    assert_eq!(unchanged.name, "Acme");
}

#[test]
fn duplicate_email_is_a_conflict() {
    let (service, _) = build_service();
    let actor = hr_manager();
    service
        .create::<User>(&actor, user_payload("a@example.com"))
        .expect("first user");

    let err = service
        .create::<User>(&actor, user_payload("A@EXAMPLE.com"))
        .expect_err("email already taken");

    assert!(matches!(
        err,
        PortalServiceError::Repository(RepositoryError::Conflict(_))
    ));
}

#[test]
fn second_job_seeker_profile_for_a_user_conflicts() {
    let (service, _) = build_service();
    let seeded = seed_portal(&service);

    let err = service
        .create::<JobSeeker>(&hr_manager(), job_seeker_payload(seeded.applicant.id))
        .expect_err("user already has a profile");

    assert!(matches!(
        err,
        PortalServiceError::Repository(RepositoryError::Conflict(_))
    ));
}

#[test]
fn forbidden_operations_carry_the_fixed_message() {
    let (service, _) = build_service();
    let seeded = seed_portal(&service);
    let customer = Actor::new(Role::Customer);

    let err = service
        .create::<Job>(&customer, job_payload(seeded.recruiter.id))
        .expect_err("customers cannot post jobs");

    assert!(matches!(err, PortalServiceError::Forbidden(_)));
    assert_eq!(
        err.to_string(),
        "You don't have permissions to create this resource"
    );
}

#[test]
fn forbidden_checks_run_before_validation() {
    let (service, _) = build_service();

    let err = service
        .create::<Organization>(&Actor::new(Role::JobSeeker), object(json!({})))
        .expect_err("job seekers cannot create organizations");

    assert!(matches!(err, PortalServiceError::Forbidden(_)));
}

#[test]
fn list_pages_and_reports_totals() {
    let (service, _) = build_service();
    let actor = hr_manager();
    for index in 0..5 {
        service
            .create::<User>(&actor, user_payload(&format!("user{index}@example.com")))
            .expect("user created");
    }

    let page = service
        .list::<User>(&actor, &ListQuery::default().window(2, 2))
        .expect("list");

    let everything = service
        .list::<User>(&actor, &ListQuery::default())
        .expect("list");

    assert_eq!(page.total, 5);
    assert_eq!(page.limit, 2);
    assert_eq!(page.offset, 2);
    assert_eq!(page.items, everything.items[2..4].to_vec());
}

#[test]
fn list_filters_by_reference() {
    let (service, _) = build_service();
    let actor = hr_manager();
    let seeded = seed_portal(&service);
    service
        .create::<Job>(&actor, job_payload(seeded.recruiter.id))
        .expect("second job");

    let query = ListQuery::default().filter("recruiter_id", seeded.recruiter.id.to_string());
    let page = service.list::<Job>(&actor, &query).expect("list");
    assert_eq!(page.total, 2);

    let none = ListQuery::default().filter("recruiter_id", RecordId::new().to_string());
    assert_eq!(service.list::<Job>(&actor, &none).expect("list").total, 0);
}

#[test]
fn list_rejects_unknown_filters() {
    let (service, _) = build_service();

    let err = service
        .list::<User>(
            &hr_manager(),
            &ListQuery::default().filter("password", "secret"),
        )
        .expect_err("unknown filter");

    assert!(matches!(
        err,
        PortalServiceError::Query(QueryError::UnknownFilter(field)) if field == "password"
    ));
}

#[test]
fn view_expands_parents_and_counts_children() {
    let (service, _) = build_service();
    let seeded = seed_portal(&service);

    let view = service
        .view::<Application>(
            &hr_manager(),
            &seeded.application.id,
            &["job".to_string(), "job_seeker".to_string()],
        )
        .expect("application view");
    assert_eq!(view.record, seeded.application);
    assert_eq!(view.relations["job"]["title"], "Engineer");
    assert_eq!(
        view.relations["job_seeker"]["id"],
        seeded.job_seeker.id.to_string()
    );
    assert!(view.counts.is_empty());

    let view = service
        .view::<User>(&hr_manager(), &seeded.user.id, &[])
        .expect("user view");
    assert_eq!(view.counts["job_seeker"], 0);
    assert_eq!(view.counts["organization"], 1);
    assert_eq!(view.counts["recruiter"], 1);

    let view = service
        .view::<User>(&hr_manager(), &seeded.applicant.id, &[])
        .expect("applicant view");
    assert_eq!(view.counts["job_seeker"], 1);
    assert_eq!(view.counts["organization"], 0);
}

#[test]
fn view_counts_only_children_the_actor_may_read() {
    let (service, _) = build_service();
    let seeded = seed_portal(&service);

    let view = service
        .view::<Organization>(&hr_manager(), &seeded.organization.id, &[])
        .expect("organization view");
    assert_eq!(view.counts["recruiter"], 1);

    let customer = Actor::new(Role::Customer);
    let view = service
        .view::<Organization>(&customer, &seeded.organization.id, &[])
        .expect("customers read organizations");
    assert!(view.counts.is_empty());

    let view = service
        .view::<Job>(&customer, &seeded.job.id, &[])
        .expect("customers read jobs");
    assert_eq!(view.counts["application"], 1);
}

#[test]
fn view_rejects_unknown_relations() {
    let (service, _) = build_service();
    let seeded = seed_portal(&service);

    let err = service
        .view::<Job>(&hr_manager(), &seeded.job.id, &["salary".to_string()])
        .expect_err("salary is not a relation");

    assert!(matches!(
        err,
        PortalServiceError::Query(QueryError::UnknownRelation(name)) if name == "salary"
    ));
}

#[test]
fn delete_is_restricted_while_children_exist() {
    let (service, _) = build_service();
    let actor = hr_manager();
    let seeded = seed_portal(&service);

    let err = service
        .delete::<Job>(&actor, &seeded.job.id)
        .expect_err("application still references the job");
    match err {
        PortalServiceError::StillReferenced { dependents, .. } => {
            assert_eq!(dependents, vec!["1 application".to_string()]);
        }
        other => panic!("expected still referenced, got {other:?}"),
    }

    service
        .delete::<Application>(&actor, &seeded.application.id)
        .expect("application deleted");
    let removed = service
        .delete::<Job>(&actor, &seeded.job.id)
        .expect("job deleted");
    assert_eq!(removed.id, seeded.job.id);

    assert!(matches!(
        service.get::<Job>(&actor, &seeded.job.id),
        Err(PortalServiceError::NotFound { entity: EntityKind::Job, .. })
    ));
}

#[test]
fn racing_delete_and_child_create_never_leave_a_dangling_child() {
    let actor = hr_manager();
    for _ in 0..200 {
        let (service, _) = build_service();
        let seeded = seed_portal(&service);
        service
            .delete::<Application>(&actor, &seeded.application.id)
            .expect("seeded application deleted");

        let start = Barrier::new(2);
        let (deleted, created) = thread::scope(|scope| {
            let deleting = scope.spawn(|| {
                start.wait();
                service.delete::<Job>(&actor, &seeded.job.id)
            });
            let creating = scope.spawn(|| {
                start.wait();
                service.create::<Application>(
                    &actor,
                    application_payload(seeded.job_seeker.id, seeded.job.id),
                )
            });
            (
                deleting.join().expect("delete thread"),
                creating.join().expect("create thread"),
            )
        });

        match (&deleted, &created) {
            (Ok(_), Err(PortalServiceError::UnknownReference { fields, .. })) => {
                assert_eq!(fields, &vec!["job_id"]);
            }
            (Err(PortalServiceError::StillReferenced { dependents, .. }), Ok(_)) => {
                assert_eq!(dependents, &vec!["1 application".to_string()]);
            }
            other => panic!("exactly one side must win, got {other:?}"),
        }

        let query = ListQuery::default().filter("job_id", seeded.job.id.to_string());
        let orphans = service
            .list::<Application>(&actor, &query)
            .expect("list applications");
        let job_remains = service.get::<Job>(&actor, &seeded.job.id).is_ok();
        assert_eq!(orphans.total > 0, job_remains);
    }
}

#[test]
fn delete_of_missing_record_is_not_found() {
    let (service, _) = build_service();

    assert!(matches!(
        service.delete::<User>(&hr_manager(), &RecordId::new()),
        Err(PortalServiceError::NotFound { .. })
    ));
}

#[test]
fn default_role_applies_when_none_is_named() {
    let repository = Arc::new(crate::portal::InMemoryPortalRepository::new());
    let service = PortalService::new(
        repository,
        PortalSettings {
            default_role: Role::Customer,
            page_limit: 10,
        },
    );

    assert_eq!(service.actor(None).role, Role::Customer);
    assert_eq!(service.actor(Some(Role::Recruiter)).role, Role::Recruiter);
}
