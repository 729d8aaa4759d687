//! Gigboard CLI client - post jobs, apply, plan work and invoice from a terminal

mod client;
mod messages;

use anyhow::Result;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use crate::client::GigboardClient;
use crate::messages::{
    CreateJobRequest, CreateWorkPlanRequest, InvoiceStatus, Job, RegisterRequest, Role,
    UpdateWorkPlanRequest, WorkPlan, WorkPlanStatus,
};

#[derive(Parser)]
#[command(name = "gigboard")]
#[command(about = "CLI client for the Gigboard job marketplace")]
#[command(version)]
struct Cli {
    /// Server URL
    #[arg(short, long, env = "GIGBOARD_SERVER", default_value = "http://localhost:3000")]
    server: String,

    /// Bearer token from `login`
    #[arg(short, long, env = "GIGBOARD_TOKEN", hide_env_values = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an account
    Register {
        #[arg(short, long)]
        name: String,

        #[arg(short, long, value_enum)]
        role: Role,

        #[arg(short, long)]
        password: String,

        #[arg(long)]
        email: Option<String>,

        #[arg(long)]
        contact_number: Option<String>,

        #[arg(long)]
        skills: Option<String>,

        #[arg(long)]
        education: Option<String>,
    },

    /// Log in and print a bearer token
    Login {
        /// User ID printed by `register`
        #[arg(short, long)]
        user: Uuid,

        #[arg(short, long)]
        password: String,
    },

    /// Show the logged-in user
    Whoami,

    /// Browse and post jobs
    #[command(subcommand)]
    Jobs(JobsCommand),

    /// Apply to an open job
    Apply {
        #[arg(short, long)]
        job: Uuid,

        /// Proposed cost
        #[arg(short, long)]
        cost: f64,
    },

    /// Review applications
    #[command(subcommand)]
    Applications(ApplicationsCommand),

    /// Manage the work plan of an assigned job
    #[command(subcommand)]
    Plan(PlanCommand),

    /// Submit and settle invoices
    #[command(subcommand)]
    Invoice(InvoiceCommand),
}

#[derive(Subcommand)]
enum JobsCommand {
    /// List open jobs
    List {
        /// Case-insensitive title filter
        #[arg(short, long)]
        search: Option<String>,
    },

    /// Show one job
    Show { id: Uuid },

    /// Post a new job (agent)
    Post {
        #[arg(short, long)]
        title: String,

        #[arg(short, long)]
        description: Option<String>,

        #[arg(short, long)]
        budget: Option<f64>,
    },

    /// Jobs you posted (agent)
    Mine,

    /// Jobs assigned to you (contractor)
    Assigned,
}

#[derive(Subcommand)]
enum ApplicationsCommand {
    /// Applications received for a job you posted (agent)
    ForJob { job: Uuid },

    /// Your applications (contractor)
    Mine,

    /// Approve an application; the others on the job are rejected (agent)
    Approve { id: Uuid },

    /// Reject an application (agent)
    Reject { id: Uuid },
}

#[derive(Subcommand)]
enum PlanCommand {
    /// Create the work plan (contractor)
    Create {
        #[arg(short, long)]
        job: Uuid,

        #[arg(short, long)]
        description: String,

        /// YYYY-MM-DD
        #[arg(long)]
        start: Option<NaiveDate>,

        /// YYYY-MM-DD
        #[arg(long)]
        end: Option<NaiveDate>,
    },

    /// Change some fields of the work plan (contractor)
    Update {
        #[arg(short, long)]
        job: Uuid,

        #[arg(short, long)]
        description: Option<String>,

        #[arg(long)]
        start: Option<NaiveDate>,

        #[arg(long)]
        end: Option<NaiveDate>,

        #[arg(long, value_enum)]
        status: Option<WorkPlanStatus>,
    },

    /// Show the work plan
    Show {
        #[arg(short, long)]
        job: Uuid,

        /// View as the job's agent
        #[arg(long)]
        agent: bool,
    },
}

#[derive(Subcommand)]
enum InvoiceCommand {
    /// Invoice a job whose plan is completed (contractor)
    Submit {
        #[arg(short, long)]
        job: Uuid,

        #[arg(short, long)]
        amount: f64,
    },

    /// Move an invoice to APPROVED or PAID (agent)
    Status {
        /// Invoice ID
        id: Uuid,

        #[arg(value_enum)]
        status: InvoiceStatus,
    },

    /// Show the invoice of a job
    ForJob {
        job: Uuid,

        /// Your own invoice (contractor) rather than the agent view
        #[arg(long)]
        mine: bool,
    },

    /// Your invoices (contractor)
    Mine,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gigboard_cli=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let cli = Cli::parse();
    let client = GigboardClient::new(&cli.server, cli.token)?;

    match cli.command {
        Commands::Register {
            name,
            role,
            password,
            email,
            contact_number,
            skills,
            education,
        } => {
            let user = client
                .register(&RegisterRequest {
                    name,
                    role,
                    password,
                    email,
                    contact_number,
                    skills,
                    education,
                })
                .await?;
            println!("Registered {} ({:?})", user.name, user.role);
            println!("User ID: {}", user.id);
        }
        Commands::Login { user, password } => {
            let token = client.login(user, password).await?;
            println!("{}", token.access_token);
        }
        Commands::Whoami => {
            let user = client.me().await?;
            println!("{} - {} ({:?})", user.id, user.name, user.role);
        }
        Commands::Jobs(command) => run_jobs(&client, command).await?,
        Commands::Apply { job, cost } => {
            let application = client.apply(job, cost).await?;
            println!("Applied: {} ({:?})", application.id, application.status);
        }
        Commands::Applications(command) => run_applications(&client, command).await?,
        Commands::Plan(command) => run_plan(&client, command).await?,
        Commands::Invoice(command) => run_invoice(&client, command).await?,
    }

    Ok(())
}

async fn run_jobs(client: &GigboardClient, command: JobsCommand) -> Result<()> {
    match command {
        JobsCommand::List { search } => print_jobs(&client.list_open_jobs(search.as_deref()).await?),
        JobsCommand::Show { id } => {
            let job = client.get_job(id).await?;
            print_jobs(std::slice::from_ref(&job));
            if let Some(description) = &job.description {
                println!();
                println!("{}", description);
            }
        }
        JobsCommand::Post {
            title,
            description,
            budget,
        } => {
            let job = client
                .post_job(&CreateJobRequest {
                    title,
                    description,
                    budget,
                })
                .await?;
            println!("Posted job {}", job.id);
        }
        JobsCommand::Mine => print_jobs(&client.my_posted_jobs().await?),
        JobsCommand::Assigned => print_jobs(&client.my_assigned_jobs().await?),
    }
    Ok(())
}

async fn run_applications(client: &GigboardClient, command: ApplicationsCommand) -> Result<()> {
    match command {
        ApplicationsCommand::ForJob { job } => {
            let views = client.applications_for_job(job).await?;
            if views.is_empty() {
                println!("No applications yet.");
            }
            for view in views {
                let who = view
                    .contractor
                    .as_ref()
                    .map(|c| c.name.as_str())
                    .unwrap_or("unknown");
                println!(
                    "  {} - {} offers {:.2} ({:?})",
                    view.application.id, who, view.application.proposed_cost, view.application.status
                );
            }
        }
        ApplicationsCommand::Mine => {
            for application in client.my_applications().await? {
                println!(
                    "  {} - job {} at {:.2} ({:?})",
                    application.id, application.job_id, application.proposed_cost, application.status
                );
            }
        }
        ApplicationsCommand::Approve { id } => {
            let outcome = client.approve(id).await?;
            println!(
                "Approved {}; job {} is now {:?}",
                outcome.application.id, outcome.job.id, outcome.job.status
            );
            if !outcome.rejected_application_ids.is_empty() {
                println!(
                    "Rejected {} other application(s)",
                    outcome.rejected_application_ids.len()
                );
            }
        }
        ApplicationsCommand::Reject { id } => {
            let application = client.reject(id).await?;
            println!("Rejected {}", application.id);
        }
    }
    Ok(())
}

async fn run_plan(client: &GigboardClient, command: PlanCommand) -> Result<()> {
    let plan = match command {
        PlanCommand::Create {
            job,
            description,
            start,
            end,
        } => {
            client
                .create_plan(
                    job,
                    &CreateWorkPlanRequest {
                        plan_description: description,
                        start_date: start,
                        end_date: end,
                        status: None,
                    },
                )
                .await?
        }
        PlanCommand::Update {
            job,
            description,
            start,
            end,
            status,
        } => {
            client
                .update_plan(
                    job,
                    &UpdateWorkPlanRequest {
                        plan_description: description,
                        start_date: start,
                        end_date: end,
                        status,
                    },
                )
                .await?
        }
        PlanCommand::Show { job, agent: true } => client.get_plan_as_agent(job).await?,
        PlanCommand::Show { job, agent: false } => client.get_plan(job).await?,
    };
    print_plan(&plan);
    Ok(())
}

async fn run_invoice(client: &GigboardClient, command: InvoiceCommand) -> Result<()> {
    let invoices = match command {
        InvoiceCommand::Submit { job, amount } => vec![client.submit_invoice(job, amount).await?],
        InvoiceCommand::Status { id, status } => {
            vec![client.set_invoice_status(id, status).await?]
        }
        InvoiceCommand::ForJob { job, mine: true } => vec![client.my_invoice_for_job(job).await?],
        InvoiceCommand::ForJob { job, mine: false } => vec![client.invoice_for_job(job).await?],
        InvoiceCommand::Mine => client.my_invoices().await?,
    };

    if invoices.is_empty() {
        println!("No invoices found.");
    }
    for invoice in invoices {
        println!(
            "  {} - job {} amount {:.2} ({:?})",
            invoice.id, invoice.job_id, invoice.amount, invoice.status
        );
    }
    Ok(())
}

fn print_jobs(jobs: &[Job]) {
    if jobs.is_empty() {
        println!("No jobs found.");
        return;
    }
    println!("Jobs:");
    println!("{:─<60}", "");
    for job in jobs {
        let budget = job
            .budget
            .map(|b| format!("{:.2}", b))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  {} - {} [{:?}] budget {} (posted: {})",
            job.id,
            job.title,
            job.status,
            budget,
            job.created_at.format("%Y-%m-%d %H:%M")
        );
    }
}

fn print_plan(plan: &WorkPlan) {
    let date = |d: Option<NaiveDate>| d.map(|d| d.to_string()).unwrap_or_else(|| "-".into());
    println!("Work plan {} for job {}", plan.id, plan.job_id);
    println!("  status: {:?}", plan.status);
    println!("  from {} to {}", date(plan.start_date), date(plan.end_date));
    if let Some(description) = &plan.plan_description {
        println!("  {}", description);
    }
}
