//! GradeLens - AI feedback on students' written work
//!
//! A CLI tool that keeps a class roster, sends photos of student work
//! to a vision model for grammar and spelling analysis, and reports
//! per-student error statistics.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (configuration, storage, failed analysis, etc.)

mod analysis;
mod cli;
mod config;
mod gateway;
mod models;
mod report;
mod roster;
mod session;
mod store;

use anyhow::{Context, Result};
use cli::{Args, Command, OutputFormat, StudentCommand};
use config::Config;
use gateway::{GatewayConfig, GeminiGateway, ImagePayload};
use indicatif::{ProgressBar, ProgressStyle};
use report::StudentReport;
use session::{Action, ScanStep, ScanWorkflow, View};
use std::io::Read;
use std::path::Path;
use std::time::Duration;
use store::Store;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle init-config early (no logging needed)
    if matches!(args.command, Command::InitConfig) {
        return handle_init_config();
    }

    // Initialize logging
    init_logging(&args);

    info!("GradeLens v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args.command);

    match run(args).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Command failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle init-config: generate a default .gradelens.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(config::CONFIG_FILE_NAME);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            config::CONFIG_FILE_NAME
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", config::CONFIG_FILE_NAME))?;

    println!("✅ Created {} with default settings.", config::CONFIG_FILE_NAME);
    println!("   Edit it to customize the model, data directory and report defaults.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", config::CONFIG_FILE_NAME);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}

/// Run the selected command. Returns the process exit code.
async fn run(args: Args) -> Result<i32> {
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);

    let mut store = Store::open(&config.general.data_dir).with_context(|| {
        format!(
            "Failed to open data directory {}",
            config.general.data_dir.display()
        )
    })?;
    debug!("Using data directory {}", store.dir().display());

    match args.command.clone() {
        Command::Student(StudentCommand::Add { name, grade }) => {
            let view = View::Dashboard.update(Action::AddStudents);
            let student = roster::RosterEntry {
                name: name.trim().to_string(),
                grade,
            }
            .into_student();
            info!("Adding student {} ({})", student.name, student.id);
            store.add_student(student)?;
            render_view(&view.update(Action::StudentsAdded), &store);
            Ok(0)
        }
        Command::Student(StudentCommand::Import { file }) => {
            let view = View::Dashboard.update(Action::AddStudents);
            let text = read_roster(&file)?;
            let entries = roster::parse_bulk(&text);

            if entries.is_empty() {
                warn!("No students found in {}", file.display());
                println!("No students to add.");
                return Ok(0);
            }

            let students = entries
                .into_iter()
                .map(roster::RosterEntry::into_student)
                .collect::<Vec<_>>();
            println!("➕ Adding {} students", students.len());
            store.add_students(students)?;
            render_view(&view.update(Action::StudentsAdded), &store);
            Ok(0)
        }
        Command::Student(StudentCommand::List) => {
            render_view(&View::Dashboard, &store);
            Ok(0)
        }
        Command::Scan { student, image } => {
            run_scan(&args, &config, &mut store, &student, &image).await
        }
        Command::Report {
            student,
            format,
            output,
            all_categories,
        } => {
            let student = store
                .find_student(&student)
                .cloned()
                .with_context(|| format!("Student not found: {}", student))?;

            let scans = store.scans_for(&student.id);
            let report = StudentReport::new(
                student,
                &scans,
                all_categories || config.report.include_zero_categories,
            );

            let content = match format.unwrap_or(config.report.format) {
                OutputFormat::Json => report::generate_json_report(&report)?,
                OutputFormat::Markdown => report::generate_markdown_report(&report),
            };

            match output {
                Some(path) => {
                    std::fs::write(&path, &content)
                        .with_context(|| format!("Failed to write report to {}", path.display()))?;
                    println!("✅ Report saved to: {}", path.display());
                }
                None => print!("{}", content),
            }
            Ok(0)
        }
        Command::InitConfig => {
            handle_init_config()?;
            Ok(0)
        }
    }
}

/// Analyze one image for a student and record the result.
async fn run_scan(
    args: &Args,
    config: &Config,
    store: &mut Store,
    student_key: &str,
    image: &str,
) -> Result<i32> {
    let student = store
        .find_student(student_key)
        .cloned()
        .with_context(|| format!("Student not found: {}", student_key))?;

    let view = View::Dashboard
        .update(Action::OpenStudent(student.id.clone()))
        .update(Action::ScanStudent);
    let preselected = match &view {
        View::Scanner { preselected } => preselected.clone(),
        _ => None,
    };

    let mut workflow = ScanWorkflow::new(preselected);
    if workflow.step() == ScanStep::SelectStudent {
        workflow.select_student(student.id.clone())?;
    }

    let payload = ImagePayload::from_input(image).context("Failed to load image")?;
    workflow.capture(payload)?;
    debug!(
        "Captured {:?} for student {:?}",
        workflow.image(),
        workflow.student_id()
    );
    workflow.submit()?;

    let gateway = GeminiGateway::new(GatewayConfig {
        base_url: config.model.base_url.clone(),
        model_name: config.model.name.clone(),
        api_key: args.resolved_api_key().unwrap_or_default(),
        temperature: config.model.temperature,
        timeout_seconds: config.model.timeout_seconds,
    })?;

    println!("🔬 Analyzing work for {}...", student.name);
    println!("   Model: {}", config.model.name);

    let spinner = (!args.quiet).then(|| {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed}] {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message("Checking grammar and spelling");
        pb.enable_steady_tick(Duration::from_millis(120));
        pb
    });

    let outcome = workflow.run(&gateway).await;

    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }

    match outcome {
        Ok(scan) => {
            let issues = scan.errors.len();
            store.add_scan(scan)?;
            println!("✅ Analysis complete: {} issues found", issues);

            let view = view.update(Action::ScanCompleted {
                student_id: student.id.clone(),
            });
            render_view(&view, store);
            Ok(0)
        }
        Err(e) => {
            debug!("Scan failed: {:?}", e);
            eprintln!("\n❌ Failed to analyze image. Please try again.");
            eprintln!("   {}", e);
            Ok(1)
        }
    }
}

/// Read a bulk roster from a file, or stdin for "-".
fn read_roster(file: &Path) -> Result<String> {
    if file == Path::new("-") {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read roster from stdin")?;
        return Ok(text);
    }

    std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read roster file: {}", file.display()))
}

/// Print the screen a view describes.
fn render_view(view: &View, store: &Store) {
    match view {
        View::Dashboard => {
            let students = store.students();
            if students.is_empty() {
                println!("No students yet. Add one with `gradelens student add <NAME>`.");
                return;
            }

            println!("\n👩‍🏫 Students ({}):", students.len());
            for student in students {
                let scans = analysis::scans_for_student(store.scans(), &student.id).len();
                println!(
                    "   ({}) {:<24} {:<10} {} scans  [{}]",
                    student.initial(),
                    student.name,
                    student.grade_level.as_deref().unwrap_or("-"),
                    scans,
                    student.id
                );
            }
        }
        View::StudentDetail { student_id } => {
            let Some(student) = store.student(student_id) else {
                println!("Student not found");
                return;
            };
            let scans = store.scans_for(student_id);
            let stats = analysis::StudentStats::from_scans(&scans);

            println!("\n📊 {}", student.name);
            for line in analysis::generate_summary_text(&stats).lines() {
                println!("   {}", line);
            }
            if let Some(latest) = analysis::recent_first(&scans).first() {
                println!("\n   Latest: {}", latest.summary);
            }
        }
        View::NewStudent | View::Scanner { .. } => {}
    }
}
