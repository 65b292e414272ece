use clap::Args;
use job_portal::error::AppError;
use job_portal::portal::{
    Actor, Application, Entity, InMemoryPortalRepository, Job, JobSeeker, ListQuery,
    Organization, PortalRepository, PortalService, PortalServiceError, PortalSettings,
    Recruiter, Role, SqlitePortalRepository, User,
};
use serde_json::{json, Map, Value};
use std::path::PathBuf;

use crate::infra::portal_service;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Write demo records to this SQLite file instead of memory.
    #[arg(long)]
    pub(crate) database: Option<PathBuf>,
    /// Email for the recruiting user.
    #[arg(long, default_value = "a@example.com")]
    pub(crate) email: String,
    /// Email for the applicant user.
    #[arg(long, default_value = "b@example.com")]
    pub(crate) applicant_email: String,
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    println!("Job portal demo");
    match args.database.clone() {
        Some(path) => {
            println!("Store: SQLite ({})", path.display());
            let repository = SqlitePortalRepository::open(&path)?;
            walk_through(&args, portal_service(repository, PortalSettings::default()).as_ref())
        }
        None => {
            println!("Store: in-memory");
            walk_through(
                &args,
                portal_service(InMemoryPortalRepository::new(), PortalSettings::default())
                    .as_ref(),
            )
        }
    }
}

fn walk_through<R>(args: &DemoArgs, service: &PortalService<R>) -> Result<(), AppError>
where
    R: PortalRepository + 'static,
{
    let admin = Actor::new(Role::HrManager);

    println!("\nCreating records");
    let user: User = step(
        service,
        &admin,
        json!({
            "email": args.email,
            "first_name": "Avery",
            "roq_user_id": "demo-recruiter",
            "tenant_id": "demo",
        }),
    )?;
    let organization: Organization = step(
        service,
        &admin,
        json!({
            "name": "Acme",
            "city": "Berlin",
            "user_id": user.id,
            "tenant_id": "demo",
        }),
    )?;
    let recruiter: Recruiter = step(
        service,
        &admin,
        json!({ "user_id": user.id, "organization_id": organization.id }),
    )?;
    let job: Job = step(
        service,
        &admin,
        json!({
            "title": "Engineer",
            "recruiter_id": recruiter.id,
            "job_type": "full-time",
            "salary": 85000,
        }),
    )?;
    let applicant: User = step(
        service,
        &admin,
        json!({
            "email": args.applicant_email,
            "roq_user_id": "demo-applicant",
            "tenant_id": "demo",
        }),
    )?;
    let job_seeker: JobSeeker = step(
        service,
        &admin,
        json!({ "user_id": applicant.id, "skills": "rust, sql" }),
    )?;
    let application: Application = step(
        service,
        &admin,
        json!({
            "job_seeker_id": job_seeker.id,
            "job_id": job.id,
            "status": "submitted",
        }),
    )?;

    println!("\nLoading application {}", application.id);
    let view = service.view::<Application>(
        &admin,
        &application.id,
        &["job".to_string(), "job_seeker".to_string()],
    )?;
    match serde_json::to_string_pretty(&view) {
        Ok(json) => println!("{json}"),
        Err(err) => println!("  Application payload unavailable: {err}"),
    }

    let jobs = service.list::<Job>(&admin, &ListQuery::default())?;
    println!("\nJobs listed: {} of {}", jobs.items.len(), jobs.total);

    println!("\nPermission check");
    let customer = Actor::new(Role::Customer);
    match service.delete::<Job>(&customer, &job.id) {
        Err(PortalServiceError::Forbidden(denied)) => {
            println!("- {} deleting a job: {}", customer.role, denied)
        }
        Err(err) => println!("- unexpected failure: {err}"),
        Ok(_) => println!("- {} deleted a job", customer.role),
    }
    match service.delete::<Job>(&admin, &job.id) {
        Err(PortalServiceError::StillReferenced { dependents, .. }) => println!(
            "- {} deleting a job with applications: blocked by {}",
            admin.role,
            dependents.join(", ")
        ),
        Err(err) => println!("- unexpected failure: {err}"),
        Ok(_) => println!("- {} deleted the job", admin.role),
    }

    Ok(())
}

fn step<E, R>(service: &PortalService<R>, actor: &Actor, payload: Value) -> Result<E, AppError>
where
    E: Entity,
    R: PortalRepository + job_portal::portal::EntityRepository<E> + 'static,
{
    let payload: Map<String, Value> = match payload {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    let record = service.create::<E>(actor, payload)?;
    println!("- {} {}", E::KIND, record.id());
    Ok(record)
}
