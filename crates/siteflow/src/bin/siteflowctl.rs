use siteflow::db;
use siteflow::jobs::{Job, JobStore, PgJobStore, DEFAULT_JOB_TTL};
use std::env;

const USAGE: &str = "siteflowctl <command>\n\
                     Commands:\n\
                     - list\n\
                     - show <job_id>\n\
                     - delete <job_id>\n\
                     - purge\n\
                     - migrate\n\
                     \n\
                     Uses SITEFLOW_DATABASE_URL, DATABASE_URL or TEST_DATABASE_URL.\n";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!("{USAGE}");
        std::process::exit(2);
    }

    let url = env::var("SITEFLOW_DATABASE_URL")
        .or_else(|_| env::var("DATABASE_URL"))
        .or_else(|_| env::var("TEST_DATABASE_URL"))
        .map_err(|_| anyhow::anyhow!("DATABASE_URL or TEST_DATABASE_URL must be set"))?;

    let pool = db::make_pool(&url).await?;
    let store = PgJobStore::with_ttl(pool.clone(), DEFAULT_JOB_TTL);

    match args[1].as_str() {
        "list" => {
            let jobs = store.get_all_jobs().await?;
            println!("{} live job(s)", jobs.len());
            for job in &jobs {
                print_row(job);
            }
        }
        "show" => {
            let id = job_arg(&args, "show")?;
            match store.get_job(id).await? {
                Some(job) => println!("{}", serde_json::to_string_pretty(&job)?),
                None => {
                    eprintln!("job {id} not found (or expired)");
                    std::process::exit(1);
                }
            }
        }
        "delete" => {
            let id = job_arg(&args, "delete")?;
            store.delete_job(id).await?;
            println!("deleted {id}");
        }
        "purge" => {
            let n = store.purge_expired().await?;
            println!("purged {n} expired job(s)");
        }
        "migrate" => {
            db::run_migrations(&pool).await?;
            println!("migrations OK");
        }
        other => {
            eprintln!("Unknown command: {other}\n\n{USAGE}");
            std::process::exit(2);
        }
    }

    Ok(())
}

fn job_arg<'a>(args: &'a [String], command: &str) -> anyhow::Result<&'a str> {
    args.get(2)
        .map(String::as_str)
        .ok_or_else(|| anyhow::anyhow!("usage: siteflowctl {command} <job_id>"))
}

fn print_row(job: &Job) {
    println!(
        "{:<40} {:<10} {:>3}%  {}  {}",
        job.job_id,
        job.status.as_str(),
        job.progress,
        job.started_at.format("%Y-%m-%d %H:%M:%S"),
        job.error.as_deref().unwrap_or(&job.message),
    );
}
