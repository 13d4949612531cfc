//! One handler per subcommand. Each loads what it needs through the query
//! cache and prints plain text tables.

use std::future::Future;
use std::io::{self, Write};

use anyhow::{bail, Context, Result};
use chrono::Utc;
use tracing::{info, warn};

use clubdesk_core::auth::CredentialStore;
use clubdesk_core::models::{
    Application, ApplicationStatus, ChangePassword, Club, ExternalCourse,
    ExternalCourseInput, LoginResponse, ProfileUpdate, Student, TimeRange,
};
use clubdesk_core::stats::{self, CapacityState};
use clubdesk_core::{ApiError, Config, FilterState, StudentApi};

use crate::format::{column, format_date, format_optional, format_phone, truncate_string};
use crate::{browse, Commands, CourseArgs, CourseCommand};

pub(crate) async fn run(
    api: &StudentApi,
    config: &mut Config,
    credentials: &CredentialStore,
    command: Commands,
) -> Result<()> {
    match command {
        Commands::Login { student_id, remember } => {
            login(api, config, credentials, student_id, remember).await
        }
        Commands::Logout { forget } => logout(api, config, credentials, forget),
        Commands::Profile { email } => {
            require_login(api)?;
            profile(api, email).await
        }
        Commands::ChangePassword => {
            require_login(api)?;
            change_password(api).await
        }
        Commands::Dashboard => {
            require_login(api)?;
            dashboard(api).await
        }
        Commands::Clubs { faculty, category, search, page } => {
            require_login(api)?;
            let mut filters = FilterState::clubs();
            if let Some(faculty) = faculty {
                filters.set_filter("facultyId", faculty);
            }
            if let Some(category) = category {
                filters.set_filter("categoryId", category);
            }
            if let Some(search) = search {
                filters.set_search(&search);
                filters.flush();
            }
            filters.set_page(page);
            clubs(api, &filters).await
        }
        Commands::Club { id } => {
            require_login(api)?;
            club(api, &id).await
        }
        Commands::Apply { id } => {
            require_login(api)?;
            apply(api, &id).await
        }
        Commands::Applications => {
            require_login(api)?;
            applications(api).await
        }
        Commands::MyClubs => {
            require_login(api)?;
            my_clubs(api).await
        }
        Commands::Attendance { club, from, to } => {
            require_login(api)?;
            let mut filters = FilterState::attendance();
            if let Some(club) = club {
                filters.set_filter("clubId", club);
            }
            if let Some(from) = from {
                filters.set_filter("startDate", from);
            }
            if let Some(to) = to {
                filters.set_filter("endDate", to);
            }
            attendance(api, &filters).await
        }
        Commands::Courses { command } => {
            require_login(api)?;
            match command {
                CourseCommand::List => list_courses(api).await,
                CourseCommand::Add(args) => add_course(api, args).await,
                CourseCommand::Update { id, args } => update_course(api, &id, args).await,
                CourseCommand::Delete { id } => delete_course(api, &id).await,
            }
        }
        Commands::Browse => {
            require_login(api)?;
            browse::run(api).await
        }
    }
}

fn require_login(api: &StudentApi) -> Result<()> {
    if !api.session().is_authenticated() {
        bail!("Not logged in. Run `clubdesk login` first.");
    }
    Ok(())
}

fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line).context("Failed to read input")?;
    Ok(line.trim().to_string())
}

// ============================================================================
// Session
// ============================================================================

async fn login(
    api: &StudentApi,
    config: &mut Config,
    credentials: &CredentialStore,
    student_id: Option<String>,
    remember: bool,
) -> Result<()> {
    let student_id = match student_id.or_else(|| config.last_student_id.clone()) {
        Some(id) => id,
        None => prompt("Student ID: ")?,
    };
    if student_id.is_empty() {
        bail!("Student ID is required");
    }

    let remembered = credentials.recall(&student_id).unwrap_or_else(|e| {
        warn!(error = %e, "Keychain unavailable");
        None
    });
    let had_remembered = remembered.is_some();
    let id = student_id.as_str();

    let outcome = login_with_fallback(
        remembered,
        || rpassword::prompt_password("Password: ").context("Failed to read password"),
        |password| async move { api.login(id, &password).await },
    )
    .await?;
    let LoginOutcome { response, password, used_remembered } = outcome;

    // A rejected remembered password is replaced by the one that worked
    if remember || (had_remembered && !used_remembered) {
        if let Err(e) = credentials.remember(&student_id, &password) {
            warn!(error = %e, "Failed to remember password");
            eprintln!("Warning: could not remember password: {:#}", e);
        }
    }

    config.last_student_id = Some(student_id);
    if let Err(e) = config.save() {
        warn!(error = %e, "Failed to save config");
    }

    println!("Logged in as {}", response.student.display_name());
    if response.first_login {
        println!("First login: consider setting your own password with `clubdesk change-password`.");
    }
    Ok(())
}

struct LoginOutcome {
    response: LoginResponse,
    password: String,
    used_remembered: bool,
}

/// Try the remembered password first. When the server rejects it, ask for
/// the password instead of failing every login until it is forgotten.
async fn login_with_fallback<A, L, Fut>(remembered: Option<String>, ask: A, attempt: L) -> Result<LoginOutcome>
where
    A: FnOnce() -> Result<String>,
    L: Fn(String) -> Fut,
    Fut: Future<Output = Result<LoginResponse, ApiError>>,
{
    if let Some(password) = remembered {
        info!("Using remembered password");
        match attempt(password.clone()).await {
            Ok(response) => {
                return Ok(LoginOutcome { response, password, used_remembered: true });
            }
            Err(e) if e.is_auth_failure() => {
                warn!(error = %e, "Remembered password rejected");
                eprintln!("The remembered password was rejected.");
            }
            Err(e) => return Err(e.into()),
        }
    }

    let password = ask()?;
    let response = attempt(password.clone()).await?;
    Ok(LoginOutcome { response, password, used_remembered: false })
}

fn logout(api: &StudentApi, config: &Config, credentials: &CredentialStore, forget: bool) -> Result<()> {
    let student_id = api
        .session()
        .student()
        .and_then(|s| s.student_id_number)
        .or_else(|| config.last_student_id.clone());

    api.logout()?;

    if forget {
        if let Some(id) = student_id {
            match credentials.forget(&id) {
                Ok(true) => println!("Remembered password deleted."),
                Ok(false) => {}
                Err(e) => eprintln!("Warning: could not delete remembered password: {:#}", e),
            }
        }
    }
    println!("Logged out.");
    Ok(())
}

fn print_student(student: &Student) {
    println!("{}", student.display_name());
    println!("  Student ID:  {}", format_optional(student.student_id_number.as_deref(), "-"));
    println!(
        "  Group:       {}",
        student.group.as_ref().map(|g| g.display_name()).unwrap_or("-")
    );
    println!(
        "  Department:  {}",
        student.department.as_ref().map(|d| d.display_name()).unwrap_or("-")
    );
    println!("  Email:       {}", format_optional(student.email.as_deref(), "-"));
    println!(
        "  Phone:       {}",
        student.phone.as_deref().map(format_phone).unwrap_or_else(|| "-".to_string())
    );
}

async fn profile(api: &StudentApi, email: Option<String>) -> Result<()> {
    let student = match email {
        Some(email) => {
            let student = api.update_profile(&ProfileUpdate { email: Some(email) }).await?;
            println!("Profile updated.\n");
            student
        }
        None => api.refresh_profile().await?,
    };
    print_student(&student);
    Ok(())
}

async fn change_password(api: &StudentApi) -> Result<()> {
    let old_password = rpassword::prompt_password("Current password: ")?;
    let new_password = rpassword::prompt_password("New password: ")?;
    let confirm_password = rpassword::prompt_password("Confirm new password: ")?;
    if new_password != confirm_password {
        bail!("New passwords do not match");
    }

    let envelope = api
        .change_password(&ChangePassword {
            old_password,
            new_password,
            confirm_password,
        })
        .await?;
    println!("{}", envelope.message.unwrap_or_else(|| "Password changed.".to_string()));
    Ok(())
}

// ============================================================================
// Dashboard
// ============================================================================

async fn dashboard(api: &StudentApi) -> Result<()> {
    let mut dashboard = api.dashboard();
    let mut applications = api.applications();
    let (dashboard, applications) = futures::join!(dashboard.wait(), applications.wait());
    let dashboard = dashboard?;

    if let Some(ref profile) = dashboard.profile {
        println!("Welcome, {}\n", profile.display_name());
    }

    let s = &dashboard.statistics;
    println!("Enrolled clubs:       {}", s.enrolled_clubs);
    println!("Pending applications: {}", s.pending_applications);
    println!("External courses:     {}", s.external_courses);
    println!(
        "Attendance:           {:.1}% ({})",
        s.attendance_percentage,
        stats::attendance_level(s.attendance_percentage)
    );
    println!(
        "This month:           {} classes, {} present, {} absent",
        s.this_month_attendance,
        s.this_month_present,
        s.this_month_absent()
    );

    if !dashboard.active_clubs.is_empty() {
        println!("\nActive clubs:");
        for club in &dashboard.active_clubs {
            let schedule = club.schedule.as_ref().map(|s| s.to_string()).unwrap_or_default();
            println!("  {} {}", column(&club.name, 32), schedule);
        }
    }

    if !dashboard.external_courses.is_empty() {
        let now = Utc::now();
        println!("\nExternal courses:");
        for course in &dashboard.external_courses {
            println!(
                "  {} {}",
                column(&course.course_name, 32),
                stats::course_status(course, now)
            );
        }
    }

    // Notifications are a side panel; a failure here does not fail the dashboard
    match applications {
        Ok(apps) => print_notifications(&apps),
        Err(e) => warn!(error = %e, "Failed to load notifications"),
    }
    Ok(())
}

fn print_notifications(applications: &[Application]) {
    let unread = stats::unread_notifications(applications);
    if unread.is_empty() {
        return;
    }
    println!("\nNotifications ({}):", unread.len());
    for app in unread {
        match app.status {
            ApplicationStatus::Approved => println!("  Accepted into {}", app.club_name()),
            _ => println!(
                "  Not accepted into {}{}",
                app.club_name(),
                app.rejection_reason
                    .as_deref()
                    .map(|r| format!(": {}", r))
                    .unwrap_or_default()
            ),
        }
    }
}

// ============================================================================
// Clubs and applications
// ============================================================================

fn club_status(club: &Club) -> String {
    match club.enrollment_status {
        Some(status) if status != ApplicationStatus::Unknown => status.to_string(),
        _ => match stats::capacity_state(club) {
            CapacityState::Full => "Full".to_string(),
            CapacityState::Open => "Open".to_string(),
        },
    }
}

pub(crate) fn print_club_table(clubs: &[Club]) {
    if clubs.is_empty() {
        println!("No clubs found.");
        return;
    }
    println!(
        "{} {} {} {} {}",
        column("ID", 24),
        column("NAME", 30),
        column("CATEGORY", 18),
        column("SEATS", 9),
        "STATUS"
    );
    for club in clubs {
        println!(
            "{} {} {} {} {}",
            column(club.id(), 24),
            column(&club.name, 30),
            column(
                club.category.as_ref().map(|c| c.display_name()).unwrap_or("-"),
                18
            ),
            column(&club.seats_display(), 9),
            club_status(club)
        );
    }
}

async fn clubs(api: &StudentApi, filters: &FilterState) -> Result<()> {
    let page = api.clubs(filters.params()).wait().await?;
    print_club_table(&page.clubs);
    println!(
        "\nPage {} of {} ({} clubs)",
        page.pagination.page.unwrap_or(filters.page()),
        page.pagination.pages(),
        page.pagination.total.unwrap_or(page.clubs.len() as u32)
    );
    Ok(())
}

async fn club(api: &StudentApi, id: &str) -> Result<()> {
    let club = api.club(id).wait().await?;

    println!("{}", club.name);
    if let Some(ref description) = club.description {
        println!("{}\n", description);
    }
    println!(
        "  Faculty:   {}",
        club.faculty.as_ref().map(|f| f.display_name()).unwrap_or("-")
    );
    println!(
        "  Category:  {}",
        club.category.as_ref().map(|c| c.display_name()).unwrap_or("-")
    );
    println!(
        "  Tutor:     {}",
        club.tutor.as_ref().and_then(|t| t.name()).unwrap_or("-")
    );
    println!(
        "  Schedule:  {}",
        club.schedule.as_ref().map(|s| s.to_string()).unwrap_or_else(|| "-".to_string())
    );
    if let Some(clubdesk_core::models::ClubSchedule::Detailed(ref s)) = club.schedule {
        if let Some(week) = s.week_type {
            println!("             {}", week);
        }
    }
    println!("  Location:  {}", format_optional(club.location.as_deref(), "-"));
    match stats::capacity_fill(&club) {
        Some(fill) => println!("  Seats:     {} ({:.0}% full)", club.seats_display(), fill),
        None => println!("  Seats:     {}", club.seats_display()),
    }
    println!("  Status:    {}", club_status(&club));
    if let Some(ref link) = club.telegram_channel_link {
        println!("  Telegram:  {}", link);
    }
    Ok(())
}

async fn apply(api: &StudentApi, id: &str) -> Result<()> {
    let envelope = api.apply(id).await?;
    println!(
        "{}",
        envelope
            .message
            .unwrap_or_else(|| "Application submitted.".to_string())
    );
    Ok(())
}

async fn applications(api: &StudentApi) -> Result<()> {
    let apps = api.applications().wait().await?;
    if apps.is_empty() {
        println!("No applications yet.");
        return Ok(());
    }

    println!("{} {} {} {}", column("CLUB", 30), column("STATUS", 10), column("SUBMITTED", 12), "NOTE");
    for app in &apps {
        println!(
            "{} {} {} {}",
            column(app.club_name(), 30),
            column(&app.status.to_string(), 10),
            column(&app.created_at.as_deref().map(format_date).unwrap_or_default(), 12),
            app.rejection_reason.as_deref().unwrap_or("")
        );
    }

    let counts = stats::application_counts(&apps);
    println!(
        "\n{} pending, {} approved, {} rejected",
        counts.pending, counts.approved, counts.rejected
    );
    Ok(())
}

async fn my_clubs(api: &StudentApi) -> Result<()> {
    let clubs = api.my_clubs().wait().await?;
    if clubs.is_empty() {
        println!("You are not enrolled in any club yet.");
        return Ok(());
    }
    for club in &clubs {
        println!("{}", club.name);
        println!(
            "  Schedule: {}",
            club.schedule.as_ref().map(|s| s.to_string()).unwrap_or_else(|| "-".to_string())
        );
        println!("  Location: {}", format_optional(club.location.as_deref(), "-"));
        if let Some(ref enrolled) = club.enrolled_at {
            println!("  Enrolled: {}", format_date(enrolled));
        }
        if let Some(ref link) = club.telegram_channel_link {
            println!("  Telegram: {}", link);
        }
    }
    Ok(())
}

// ============================================================================
// Attendance
// ============================================================================

async fn attendance(api: &StudentApi, filters: &FilterState) -> Result<()> {
    let mut records = api.attendance(filters.params());
    let mut clubs = api.my_clubs();
    let (records, clubs) = futures::join!(records.wait(), clubs.wait());
    let records = records?;

    let summary = stats::attendance_summary(&records);
    println!(
        "{} classes, {} present, {} absent: {:.1}% ({})",
        summary.total,
        summary.present_count,
        summary.absent_count,
        summary.percentage,
        summary.level()
    );
    if summary.is_low() {
        println!("Warning: attendance is below 75%.");
    }

    if filters.filter("clubId").is_none() {
        match clubs {
            Ok(clubs) if !clubs.is_empty() => {
                println!("\nBy club:");
                for row in stats::club_breakdown(&records, &clubs) {
                    println!(
                        "  {} {:>3}/{:<3} {:>5.1}%",
                        column(&row.club_name, 30),
                        row.summary.present_count,
                        row.summary.total,
                        row.summary.percentage
                    );
                }
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "Failed to load clubs for breakdown"),
        }
    }

    if records.is_empty() {
        println!("\nNo attendance records.");
        return Ok(());
    }
    println!("\n{} {} {} {}", column("DATE", 12), column("CLUB", 30), column("PRESENT", 8), "REASON");
    for record in &records {
        println!(
            "{} {} {} {}",
            column(&record.date.as_deref().map(format_date).unwrap_or_default(), 12),
            column(record.club_name(), 30),
            column(if record.present { "yes" } else { "no" }, 8),
            record.reason.as_deref().unwrap_or("")
        );
    }
    Ok(())
}

// ============================================================================
// External courses
// ============================================================================

async fn list_courses(api: &StudentApi) -> Result<()> {
    let courses = api.external_courses().wait().await?;
    if courses.is_empty() {
        println!("No external courses.");
        return Ok(());
    }

    let now = Utc::now();
    println!(
        "{} {} {} {} {}",
        column("ID", 24),
        column("COURSE", 24),
        column("INSTITUTION", 24),
        column("ENDS", 12),
        "STATUS"
    );
    for course in &courses {
        println!(
            "{} {} {} {} {}",
            column(course.id.as_deref().unwrap_or("-"), 24),
            column(&course.course_name, 24),
            column(course.institution_name.as_deref().unwrap_or("-"), 24),
            column(&course.end_date.as_deref().map(format_date).unwrap_or_default(), 12),
            stats::course_status(course, now)
        );
    }

    let counts = stats::course_counts(&courses, now);
    println!("\n{} courses, {} active, {} expired", counts.total, counts.active, counts.expired);
    Ok(())
}

/// Overlay command-line values on a course submission.
fn apply_args(input: &mut ExternalCourseInput, args: CourseArgs) {
    if let Some(name) = args.name {
        input.course_name = name;
    }
    if let Some(institution) = args.institution {
        input.institution_name = institution;
    }
    if args.address.is_some() {
        input.address = args.address;
    }
    if !args.days.is_empty() {
        input.schedule.days = args.days;
    }
    if args.start_time.is_some() || args.end_time.is_some() {
        let current = input.schedule.time.take().unwrap_or_default();
        input.schedule.time = Some(TimeRange {
            start: args.start_time.or(current.start),
            end: args.end_time.or(current.end),
        });
    }
    if args.instructor.is_some() {
        input.instructor_name = args.instructor;
    }
    if args.instructor_phone.is_some() {
        input.instructor_phone = args.instructor_phone;
    }
    if args.phone.is_some() {
        input.student_phone = args.phone;
    }
    if let Some(start) = args.start_date {
        input.start_date = Some(start.format("%Y-%m-%d").to_string());
    }
    if let Some(end) = args.end_date {
        input.end_date = Some(end.format("%Y-%m-%d").to_string());
    }
}

async fn add_course(api: &StudentApi, args: CourseArgs) -> Result<()> {
    let mut input = ExternalCourseInput::default();
    apply_args(&mut input, args);
    if input.course_name.trim().is_empty() || input.institution_name.trim().is_empty() {
        bail!("--name and --institution are required");
    }

    api.add_course(&input).await?;
    println!("Added {}.", input.course_name);
    Ok(())
}

async fn find_course(api: &StudentApi, id: &str) -> Result<ExternalCourse> {
    let courses = api.external_courses().wait().await?;
    courses
        .into_iter()
        .find(|c| c.id.as_deref() == Some(id))
        .with_context(|| format!("No external course with id {}", id))
}

async fn update_course(api: &StudentApi, id: &str, args: CourseArgs) -> Result<()> {
    let course = find_course(api, id).await?;
    let mut input = ExternalCourseInput::from_course(&course);
    apply_args(&mut input, args);

    api.update_course(id, &input).await?;
    println!("Updated {}.", truncate_string(&input.course_name, 40));
    Ok(())
}

async fn delete_course(api: &StudentApi, id: &str) -> Result<()> {
    api.delete_course(id).await?;
    println!("Deleted course {}.", id);
    Ok(())
}
